// [libs/infra/db/src/repositories/event_repository.rs]
/*!
 * =================================================================
 * APARATO: AUTH EVENT LEDGER REPOSITORY (V15.0 - WINDOWED ORACLE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LEDGER APPEND-ONLY Y VENTANAS CONDUCTUALES POR IP
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DEDUP BY UUID: 'INSERT OR IGNORE' sobre la llave primaria
 *    event_uuid sella la semántica at-least-once del plano de control.
 * 2. WINDOWED ORACLE: Las estadísticas conductuales (ráfagas, usuarios
 *    únicos, racha de fallos) se derivan del Ledger, jamás de caché
 *    autoritativa en RAM.
 * 3. WEAK AGENT REFERENCE: Los eventos sobreviven al decomiso del
 *    centinela con la referencia anulada.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::{DateTime, Duration, Utc};
use guardian_domain_detection::features::{BehavioralWindow, UserGeoProfile};
use guardian_domain_models::event::AuthEvent;
use libsql::params;
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::instrument;

pub struct EventRepository {
    database_client: DbClient,
}

impl EventRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    /**
     * Cristaliza un evento en el Ledger.
     *
     * @returns true si la fila fue insertada, false si el event_uuid ya existía.
     */
    #[instrument(skip(self, event), fields(ip = %event.source_ip))]
    pub async fn insert_event(&self, event: &AuthEvent, batch_uuid: Option<&str>) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let packed_ip = pack_ip(&event.source_ip);

        let inserted_rows = connection
            .execute(
                r#"INSERT OR IGNORE INTO auth_events
                   (event_uuid, timestamp, source_type, agent_id, simulation_run_id, event_type,
                    auth_method, source_ip, source_ip_packed, target_username, target_port,
                    failure_reason, geo_ip, batch_uuid, raw_line)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
                params![
                    event.event_uuid.clone(),
                    event.timestamp.to_rfc3339(),
                    source_type_label(event),
                    event.agent_id.clone(),
                    event.simulation_run_id.clone(),
                    event_type_label(event),
                    auth_method_label(event),
                    event.source_ip.clone(),
                    packed_ip,
                    event.target_username.clone(),
                    event.target_port.map(|p| p as i64),
                    event.failure_reason.clone(),
                    event.source_ip.clone(),
                    batch_uuid.map(|b| b.to_string()),
                    event.raw_line.clone()
                ],
            )
            .await?;

        Ok(inserted_rows == 1)
    }

    /// Vincula el bloqueo resultante al evento disparador.
    pub async fn attach_block(&self, event_uuid: &str, block_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE auth_events SET block_id = ?1 WHERE event_uuid = ?2",
                params![block_id.to_string(), event_uuid.to_string()],
            )
            .await?;
        Ok(())
    }

    /**
     * Deriva la ventana conductual completa para una IP en el instante dado.
     *
     * # Performance:
     * Siete consultas acotadas por el índice (source_ip, timestamp); el
     * costo es O(log N + K) por ventana.
     */
    #[instrument(skip(self), fields(ip = %source_ip))]
    pub async fn behavioral_window(
        &self,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<BehavioralWindow, DbError> {
        let connection = self.database_client.get_connection()?;
        let ip_owned = source_ip.to_string();

        let count_since = |cutoff: DateTime<Utc>, only_failed: bool| {
            let connection = connection.clone();
            let ip = ip_owned.clone();
            async move {
                let sql = if only_failed {
                    "SELECT COUNT(*) FROM auth_events
                     WHERE source_ip = ?1 AND timestamp >= ?2 AND event_type = 'failed'"
                } else {
                    "SELECT COUNT(*) FROM auth_events WHERE source_ip = ?1 AND timestamp >= ?2"
                };
                let mut query_result =
                    connection.query(sql, params![ip, cutoff.to_rfc3339()]).await?;
                let observed = match query_result.next().await? {
                    Some(row) => row.get::<i64>(0)? as u32,
                    None => 0,
                };
                Ok::<u32, DbError>(observed)
            }
        };

        let attempts_last_minute = count_since(now - Duration::minutes(1), false).await?;
        let attempts_last_hour = count_since(now - Duration::hours(1), false).await?;
        let failures_last_10m = count_since(now - Duration::minutes(10), true).await?;

        // Usuarios y destinos únicos en la última hora.
        let hour_cutoff = (now - Duration::hours(1)).to_rfc3339();
        let mut distinct_query = connection
            .query(
                "SELECT COUNT(DISTINCT target_username), COUNT(DISTINCT agent_id)
                 FROM auth_events WHERE source_ip = ?1 AND timestamp >= ?2",
                params![ip_owned.clone(), hour_cutoff],
            )
            .await?;
        let (unique_usernames_last_hour, unique_targets_last_hour) =
            match distinct_query.next().await? {
                Some(row) => (row.get::<i64>(0)? as u32, row.get::<i64>(1)? as u32),
                None => (0, 0),
            };

        // Tasa de fallo 24h.
        let day_cutoff = (now - Duration::hours(24)).to_rfc3339();
        let mut rate_query = connection
            .query(
                "SELECT COUNT(*),
                        SUM(CASE WHEN event_type = 'failed' THEN 1 ELSE 0 END)
                 FROM auth_events WHERE source_ip = ?1 AND timestamp >= ?2",
                params![ip_owned.clone(), day_cutoff],
            )
            .await?;
        let failure_rate_24h = match rate_query.next().await? {
            Some(row) => {
                let total: i64 = row.get(0)?;
                let failed: Option<i64> = row.get(1)?;
                if total > 0 { failed.unwrap_or(0) as f64 / total as f64 } else { 0.0 }
            }
            None => 0.0,
        };

        // Racha de fallos consecutivos desde el último éxito.
        let mut streak_query = connection
            .query(
                "SELECT COUNT(*) FROM auth_events
                 WHERE source_ip = ?1 AND event_type = 'failed'
                   AND timestamp > COALESCE(
                       (SELECT MAX(timestamp) FROM auth_events
                        WHERE source_ip = ?1 AND event_type = 'successful'),
                       '1970-01-01T00:00:00+00:00')",
                params![ip_owned.clone()],
            )
            .await?;
        let consecutive_failures = match streak_query.next().await? {
            Some(row) => row.get::<i64>(0)? as u32,
            None => 0,
        };

        // Último avistaje y totales de vida.
        let mut lifetime_query = connection
            .query(
                "SELECT COUNT(*),
                        SUM(CASE WHEN event_type = 'successful' THEN 1 ELSE 0 END),
                        MAX(timestamp)
                 FROM auth_events WHERE source_ip = ?1",
                params![ip_owned.clone()],
            )
            .await?;

        let (lifetime_total, lifetime_success, last_seen_raw) = match lifetime_query.next().await? {
            Some(row) => {
                let total: i64 = row.get(0)?;
                let success: Option<i64> = row.get(1)?;
                let last_seen: Option<String> = row.get(2)?;
                (total, success.unwrap_or(0), last_seen)
            }
            None => (0, 0, None),
        };

        let seconds_since_last_attempt = last_seen_raw
            .as_deref()
            .and_then(crate::repositories::agent_repository::parse_rfc3339)
            .map(|instant| (now - instant).num_seconds());

        Ok(BehavioralWindow {
            attempts_last_minute,
            attempts_last_hour,
            failures_last_10m,
            unique_usernames_last_hour,
            unique_targets_last_hour,
            failure_rate_24h,
            consecutive_failures,
            seconds_since_last_attempt,
            is_first_sighting: lifetime_total == 0,
            lifetime_success_rate: if lifetime_total > 0 {
                lifetime_success as f64 / lifetime_total as f64
            } else {
                0.0
            },
        })
    }

    /**
     * Perfil geográfico del usuario objetivo: centroide de sus accesos
     * exitosos recientes y catálogo de países conocidos.
     */
    #[instrument(skip(self))]
    pub async fn user_geo_profile(
        &self,
        target_username: &str,
        now: DateTime<Utc>,
    ) -> Result<UserGeoProfile, DbError> {
        let connection = self.database_client.get_connection()?;
        let history_cutoff = (now - Duration::days(90)).to_rfc3339();

        let mut profile_query = connection
            .query(
                r#"SELECT g.latitude, g.longitude, g.utc_offset_seconds, g.country_code
                   FROM auth_events e JOIN ip_geo g ON g.ip = e.source_ip
                   WHERE e.target_username = ?1 AND e.event_type = 'successful'
                     AND e.timestamp >= ?2
                   ORDER BY e.timestamp DESC LIMIT 50"#,
                params![target_username.to_string(), history_cutoff],
            )
            .await?;

        let mut latitude_sum = 0.0f64;
        let mut longitude_sum = 0.0f64;
        let mut offset_sum = 0.0f64;
        let mut coordinate_samples = 0u32;
        let mut offset_samples = 0u32;
        let mut known_country_codes: HashSet<String> = HashSet::new();

        while let Some(row) = profile_query.next().await? {
            let latitude: Option<f64> = row.get(0)?;
            let longitude: Option<f64> = row.get(1)?;
            let offset_seconds: Option<i64> = row.get(2)?;
            let country_code: Option<String> = row.get(3)?;

            if let (Some(lat), Some(lon)) = (latitude, longitude) {
                latitude_sum += lat;
                longitude_sum += lon;
                coordinate_samples += 1;
            }
            if let Some(offset) = offset_seconds {
                offset_sum += offset as f64 / 3600.0;
                offset_samples += 1;
            }
            if let Some(code) = country_code {
                known_country_codes.insert(code);
            }
        }

        Ok(UserGeoProfile {
            typical_latitude: (coordinate_samples > 0)
                .then(|| latitude_sum / coordinate_samples as f64),
            typical_longitude: (coordinate_samples > 0)
                .then(|| longitude_sum / coordinate_samples as f64),
            typical_utc_offset_hours: (offset_samples > 0)
                .then(|| offset_sum / offset_samples as f64),
            known_country_codes,
        })
    }

    /// Conteo total de eventos en el Ledger (diagnóstico del operador).
    pub async fn total_events(&self) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection.query("SELECT COUNT(*) FROM auth_events", ()).await?;
        let total = match query_result.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };
        Ok(total)
    }
}

fn source_type_label(event: &AuthEvent) -> String {
    match event.source_type {
        guardian_domain_models::event::SourceType::Agent => "agent".to_string(),
        guardian_domain_models::event::SourceType::Simulation => "simulation".to_string(),
    }
}

fn event_type_label(event: &AuthEvent) -> String {
    match event.event_type {
        guardian_domain_models::event::EventType::Failed => "failed".to_string(),
        guardian_domain_models::event::EventType::Successful => "successful".to_string(),
    }
}

fn auth_method_label(event: &AuthEvent) -> String {
    match event.auth_method {
        guardian_domain_models::event::AuthMethod::Password => "password".to_string(),
        guardian_domain_models::event::AuthMethod::Publickey => "publickey".to_string(),
    }
}

/// Representación binaria de la IP para índices compactos.
fn pack_ip(textual_ip: &str) -> Option<Vec<u8>> {
    textual_ip.parse::<IpAddr>().ok().map(|address| match address {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    })
}
