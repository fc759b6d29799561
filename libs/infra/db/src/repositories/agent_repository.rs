// [libs/infra/db/src/repositories/agent_repository.rs]
/*!
 * =================================================================
 * APARATO: AGENT REGISTRY REPOSITORY (V10.0 - IDENTITY GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO, APROBACIÓN Y VITALIDAD DE CENTINELAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. KEY ISSUANCE ONCE: La llave API se genera en el primer registro y
 *    se retransmite en claro únicamente en esa respuesta; un registro
 *    repetido solo la eco-devuelve si el llamante ya la presenta.
 * 2. IDENTITY PERMANENCE: La desactivación jamás recicla identidad ni
 *    llaves entre centinelas.
 * 3. DISCONNECT SWEEP: Un centinela sin latido durante 3x su intervalo
 *    transita a 'disconnected' en el siguiente barrido.
 * 4. CASCADE POLICY: El borrado de un centinela arrastra su telemetría
 *    cruda (latidos, lotes, estado UFW, comandos) y anula la referencia
 *    en eventos y bloqueos históricos.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::{DateTime, Duration, Utc};
use guardian_domain_models::agent::{AgentHealth, AgentRecord, AgentStatus};
use guardian_domain_models::wire::{HeartbeatRequest, RegisterRequest};
use libsql::{params, Row};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Longitud del material aleatorio de la llave API.
const API_KEY_MATERIAL_LENGTH: usize = 48;

/// Resultado del handshake de registro.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub agent_uuid: String,
    pub status: AgentStatus,
    pub is_approved: bool,
    /// Presente solo cuando corresponde transmitir la llave al llamante.
    pub api_key_echo: Option<String>,
    pub freshly_registered: bool,
}

pub struct AgentRepository {
    database_client: DbClient,
}

impl AgentRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    /**
     * Orquesta el handshake de registro de un centinela.
     *
     * # Logic:
     * - agent_id desconocido: genera UUID + llave API, persiste como
     *   'pending' y retorna la llave (única transmisión en claro).
     * - agent_id conocido: refresca hostname/versión/system_info y solo
     *   eco-devuelve la llave si el llamante ya la presenta.
     *
     * # Errors:
     * - `DbError::QueryError`: Si el Ledger rechaza la mutación.
     */
    #[instrument(skip(self, registration, presented_api_key), fields(agent = %registration.agent_id))]
    pub async fn register(
        &self,
        registration: &RegisterRequest,
        presented_api_key: Option<&str>,
    ) -> Result<RegistrationOutcome, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut existing_query = connection
            .query(
                "SELECT id, api_key, status, is_approved FROM agents WHERE agent_id = ?1",
                params![registration.agent_id.clone()],
            )
            .await?;

        if let Some(existing_row) = existing_query.next().await? {
            let agent_uuid: String = existing_row.get(0)?;
            let stored_api_key: String = existing_row.get(1)?;
            let status_label: String = existing_row.get(2)?;
            let is_approved: i64 = existing_row.get(3)?;

            connection
                .execute(
                    r#"UPDATE agents SET hostname = ?1, version = ?2, system_info = ?3,
                       heartbeat_interval_sec = ?4 WHERE agent_id = ?5"#,
                    params![
                        registration.hostname.clone(),
                        registration.version.clone(),
                        registration.system_info.to_string(),
                        registration.heartbeat_interval_sec as i64,
                        registration.agent_id.clone()
                    ],
                )
                .await?;

            let key_matches = presented_api_key.map(|key| key == stored_api_key).unwrap_or(false);
            debug!("🔁 [REGISTRY]: Known sentinel re-registered (key echo: {}).", key_matches);

            return Ok(RegistrationOutcome {
                agent_uuid,
                status: parse_status(&status_label),
                is_approved: is_approved == 1,
                api_key_echo: if key_matches { Some(stored_api_key) } else { None },
                freshly_registered: false,
            });
        }

        // Primer contacto: génesis de identidad.
        let agent_uuid = Uuid::new_v4().to_string();
        let issued_api_key = generate_api_key();

        connection
            .execute(
                r#"INSERT INTO agents
                   (id, agent_id, api_key, hostname, version, system_info,
                    heartbeat_interval_sec, is_approved, is_active, status, health)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 1, 'pending', 'unknown')"#,
                params![
                    agent_uuid.clone(),
                    registration.agent_id.clone(),
                    issued_api_key.clone(),
                    registration.hostname.clone(),
                    registration.version.clone(),
                    registration.system_info.to_string(),
                    registration.heartbeat_interval_sec as i64
                ],
            )
            .await?;

        info!("🆕 [REGISTRY]: Sentinel [{}] enrolled pending approval.", registration.agent_id);

        Ok(RegistrationOutcome {
            agent_uuid,
            status: AgentStatus::Pending,
            is_approved: false,
            api_key_echo: Some(issued_api_key),
            freshly_registered: true,
        })
    }

    /**
     * Valida el par (agent_id, llave API) contra un centinela aprobado y activo.
     */
    #[instrument(skip(self, api_key), fields(agent = %agent_id))]
    pub async fn authenticate(
        &self,
        agent_id: &str,
        api_key: &str,
    ) -> Result<Option<AgentRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {AGENT_COLUMNS} FROM agents
                     WHERE agent_id = ?1 AND api_key = ?2 AND is_approved = 1 AND is_active = 1"
                ),
                params![agent_id.to_string(), api_key.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(row) => Ok(Some(map_agent_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn find(&self, agent_id: &str) -> Result<Option<AgentRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?1"),
                params![agent_id.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(row) => Ok(Some(map_agent_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list(&self) -> Result<Vec<AgentRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY registered_at ASC"),
                (),
            )
            .await?;

        let mut catalog = Vec::new();
        while let Some(row) = query_result.next().await? {
            catalog.push(map_agent_row(&row)?);
        }
        Ok(catalog)
    }

    /// Aprueba un centinela pendiente y lo promueve a 'active'.
    #[instrument(skip(self))]
    pub async fn approve(&self, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let mutated_rows = connection
            .execute(
                "UPDATE agents SET is_approved = 1, status = 'active' WHERE agent_id = ?1",
                params![agent_id.to_string()],
            )
            .await?;

        if mutated_rows == 0 {
            return Err(DbError::AgentNotFound);
        }
        info!("✅ [REGISTRY]: Sentinel [{}] approved by operator.", agent_id);
        Ok(())
    }

    /// Deshabilita administrativamente sin reciclar identidad.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let mutated_rows = connection
            .execute(
                "UPDATE agents SET is_active = 0, status = 'inactive' WHERE agent_id = ?1",
                params![agent_id.to_string()],
            )
            .await?;

        if mutated_rows == 0 {
            return Err(DbError::AgentNotFound);
        }
        Ok(())
    }

    /**
     * Registra un latido: actualiza vitalidad del centinela y agrega la
     * fila de biometría.
     */
    #[instrument(skip(self, heartbeat), fields(agent = %heartbeat.agent_id))]
    pub async fn record_heartbeat(
        &self,
        heartbeat: &HeartbeatRequest,
        received_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        let mutated_rows = transaction
            .execute(
                r#"UPDATE agents SET last_heartbeat_at = ?1, health = ?2,
                   status = CASE WHEN is_approved = 1 AND is_active = 1 THEN 'active' ELSE status END
                   WHERE agent_id = ?3"#,
                params![
                    received_at.to_rfc3339(),
                    health_label(heartbeat.health_status).to_string(),
                    heartbeat.agent_id.clone()
                ],
            )
            .await?;

        if mutated_rows == 0 {
            return Err(DbError::AgentNotFound);
        }

        transaction
            .execute(
                r#"INSERT INTO agent_heartbeats
                   (agent_id, cpu_percent, memory_percent, disk_percent, uptime_seconds, health, received_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    heartbeat.agent_id.clone(),
                    heartbeat.metrics.cpu_percent as f64,
                    heartbeat.metrics.memory_percent as f64,
                    heartbeat.metrics.disk_percent as f64,
                    heartbeat.metrics.uptime_seconds as i64,
                    health_label(heartbeat.health_status).to_string(),
                    received_at.to_rfc3339()
                ],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(())
    }

    /**
     * Barrido de desconexión: centinelas activos sin latido durante
     * 3x su intervalo declarado transitan a 'disconnected'.
     */
    #[instrument(skip(self))]
    pub async fn sweep_disconnected(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;

        // La ventana se evalúa por centinela con su propio intervalo.
        let mut stale_query = connection
            .query(
                "SELECT agent_id, last_heartbeat_at, heartbeat_interval_sec
                 FROM agents WHERE status = 'active'",
                (),
            )
            .await?;

        let mut disconnected_count = 0u64;
        let mut stale_identifiers: Vec<String> = Vec::new();

        while let Some(row) = stale_query.next().await? {
            let agent_id: String = row.get(0)?;
            let last_heartbeat: Option<String> = row.get(1)?;
            let interval_seconds: i64 = row.get(2)?;

            let cutoff = now - Duration::seconds(interval_seconds * 3);
            let is_stale = match last_heartbeat.as_deref().and_then(parse_rfc3339) {
                Some(instant) => instant < cutoff,
                None => true,
            };

            if is_stale {
                stale_identifiers.push(agent_id);
            }
        }

        for agent_id in stale_identifiers {
            connection
                .execute(
                    "UPDATE agents SET status = 'disconnected' WHERE agent_id = ?1 AND status = 'active'",
                    params![agent_id.clone()],
                )
                .await?;
            warn!("🔕 [REGISTRY]: Sentinel [{}] marked disconnected (heartbeat silence).", agent_id);
            disconnected_count += 1;
        }

        Ok(disconnected_count)
    }

    /// Poda de latidos más antiguos que el corte de retención (7 días).
    pub async fn prune_heartbeats(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let purged = connection
            .execute(
                "DELETE FROM agent_heartbeats WHERE received_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await?;
        Ok(purged)
    }

    /**
     * Decomisiona un centinela aplicando la política de cascada del
     * contrato: telemetría cruda eliminada, referencias históricas
     * anuladas (los eventos y bloqueos sobreviven al decomiso).
     */
    #[instrument(skip(self))]
    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        for owned_table in ["agent_heartbeats", "agent_log_batches", "agent_ufw_rules", "agent_ufw_commands"] {
            transaction
                .execute(
                    &format!("DELETE FROM {owned_table} WHERE agent_id = ?1"),
                    params![agent_id.to_string()],
                )
                .await?;
        }
        transaction
            .execute("DELETE FROM agent_ufw_state WHERE agent_id = ?1", params![agent_id.to_string()])
            .await?;

        transaction
            .execute("UPDATE auth_events SET agent_id = NULL WHERE agent_id = ?1", params![agent_id.to_string()])
            .await?;
        transaction
            .execute("UPDATE ip_blocks SET agent_id = NULL WHERE agent_id = ?1", params![agent_id.to_string()])
            .await?;

        let deleted = transaction
            .execute("DELETE FROM agents WHERE agent_id = ?1", params![agent_id.to_string()])
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        if deleted == 0 {
            return Err(DbError::AgentNotFound);
        }
        info!("🗑️ [REGISTRY]: Sentinel [{}] decommissioned with cascade policy.", agent_id);
        Ok(())
    }
}

const AGENT_COLUMNS: &str = "id, agent_id, hostname, display_name, environment_tag, version, \
     supported_features, is_approved, is_active, status, health, heartbeat_interval_sec, \
     last_heartbeat_at, registered_at";

fn map_agent_row(row: &Row) -> Result<AgentRecord, DbError> {
    let supported_features_raw: String = row.get(6)?;
    let status_label: String = row.get(9)?;
    let health_label: String = row.get(10)?;
    let last_heartbeat_raw: Option<String> = row.get(12)?;
    let registered_raw: String = row.get(13)?;

    Ok(AgentRecord {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        hostname: row.get(2)?,
        display_name: row.get(3)?,
        environment_tag: row.get(4)?,
        version: row.get(5)?,
        supported_features: serde_json::from_str(&supported_features_raw)
            .unwrap_or(serde_json::Value::Null),
        is_approved: row.get::<i64>(7)? == 1,
        is_active: row.get::<i64>(8)? == 1,
        status: parse_status(&status_label),
        health: parse_health(&health_label),
        heartbeat_interval_sec: row.get::<i64>(11)? as u32,
        last_heartbeat_at: last_heartbeat_raw.as_deref().and_then(parse_rfc3339),
        registered_at: parse_rfc3339(&registered_raw).unwrap_or_else(Utc::now),
    })
}

fn parse_status(label: &str) -> AgentStatus {
    match label {
        "active" => AgentStatus::Active,
        "inactive" => AgentStatus::Inactive,
        "disconnected" => AgentStatus::Disconnected,
        _ => AgentStatus::Pending,
    }
}

fn parse_health(label: &str) -> AgentHealth {
    match label {
        "healthy" => AgentHealth::Healthy,
        "degraded" => AgentHealth::Degraded,
        "unhealthy" => AgentHealth::Unhealthy,
        _ => AgentHealth::Unknown,
    }
}

fn health_label(health: AgentHealth) -> &'static str {
    match health {
        AgentHealth::Healthy => "healthy",
        AgentHealth::Degraded => "degraded",
        AgentHealth::Unhealthy => "unhealthy",
        AgentHealth::Unknown => "unknown",
    }
}

/// Acepta tanto RFC-3339 como el formato DATETIME plano de SQLite.
pub(crate) fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn generate_api_key() -> String {
    let random_material: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_MATERIAL_LENGTH)
        .map(char::from)
        .collect();
    format!("sgk_{random_material}")
}
