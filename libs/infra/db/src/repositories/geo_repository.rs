// [libs/infra/db/src/repositories/geo_repository.rs]
/*!
 * =================================================================
 * APARATO: IP ENRICHMENT CACHE REPOSITORY (V11.0 - TTL STRATA)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CACHÉ FUSIONADA DE GEOLOCALIZACIÓN Y REPUTACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TTL STRATA: Cada familia de datos porta su propia expiración
 *    (Geo 24h, AbuseIPDB 5min, VirusTotal 1h, negativo 1h).
 * 2. THREAT DERIVATION: El nivel de amenaza se re-deriva en cada
 *    upsert de reputación; la fila fusionada es la autoridad.
 * 3. NEGATIVE CACHING: Los fallos externos siembran una fila negativa
 *    de TTL corto; el pipeline continúa con lo presente.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::agent_repository::parse_rfc3339;
use crate::DbClient;
use chrono::{DateTime, Utc};
use guardian_domain_models::enrichment::{IpGeoRecord, ThreatLevel};
use libsql::{params, Row};
use tracing::{debug, instrument};

pub struct GeoRepository {
    database_client: DbClient,
}

impl GeoRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    pub async fn find(&self, ip: &str) -> Result<Option<IpGeoRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {GEO_COLUMNS} FROM ip_geo WHERE ip = ?1"),
                params![ip.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(row) => Ok(Some(map_geo_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Garantiza la existencia de la fila base para la IP.
    async fn ensure_row(&self, ip: &str, now: DateTime<Utc>) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT OR IGNORE INTO ip_geo (ip, updated_at) VALUES (?1, ?2)",
                params![ip.to_string(), now.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Upsert de la familia geográfica (TTL 24h).
    #[instrument(skip_all, fields(ip = %record.ip))]
    pub async fn upsert_geolocation(
        &self,
        record: &IpGeoRecord,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        self.ensure_row(&record.ip, record.updated_at).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE ip_geo SET
                     country_code = ?1, country_name = ?2, city = ?3, asn = ?4, isp = ?5,
                     latitude = ?6, longitude = ?7, utc_offset_seconds = ?8,
                     is_proxy = ?9, is_vpn = ?10, is_tor = ?11, is_datacenter = ?12,
                     geo_expires_at = ?13, updated_at = ?14
                   WHERE ip = ?15"#,
                params![
                    record.country_code.clone(),
                    record.country_name.clone(),
                    record.city.clone(),
                    record.asn.map(|a| a as i64),
                    record.isp.clone(),
                    record.latitude,
                    record.longitude,
                    record.utc_offset_seconds.map(|o| o as i64),
                    record.is_proxy as i64,
                    record.is_vpn as i64,
                    record.is_tor as i64,
                    record.is_datacenter as i64,
                    expires_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                    record.ip.clone()
                ],
            )
            .await?;
        Ok(())
    }

    /// Upsert de la familia AbuseIPDB (TTL 5min) con re-derivación de amenaza.
    #[instrument(skip(self))]
    pub async fn upsert_abuse(
        &self,
        ip: &str,
        confidence_score: u8,
        report_count: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let now = Utc::now();
        self.ensure_row(ip, now).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE ip_geo SET abuse_confidence_score = ?1, abuse_report_count = ?2,
                     abuse_expires_at = ?3, updated_at = ?4 WHERE ip = ?5"#,
                params![
                    confidence_score as i64,
                    report_count as i64,
                    expires_at.to_rfc3339(),
                    now.to_rfc3339(),
                    ip.to_string()
                ],
            )
            .await?;
        self.rederive_threat_level(ip).await
    }

    /// Upsert de la familia VirusTotal (TTL 1h) con re-derivación de amenaza.
    #[instrument(skip(self))]
    pub async fn upsert_virustotal(
        &self,
        ip: &str,
        positives: u32,
        total: u32,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let now = Utc::now();
        self.ensure_row(ip, now).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE ip_geo SET vt_positives = ?1, vt_total = ?2,
                     vt_expires_at = ?3, updated_at = ?4 WHERE ip = ?5"#,
                params![
                    positives as i64,
                    total as i64,
                    expires_at.to_rfc3339(),
                    now.to_rfc3339(),
                    ip.to_string()
                ],
            )
            .await?;
        self.rederive_threat_level(ip).await
    }

    /// Siembra negativa tras un fallo externo (TTL corto, sin propagación).
    #[instrument(skip(self))]
    pub async fn mark_negative(&self, ip: &str, expires_at: DateTime<Utc>) -> Result<(), DbError> {
        let now = Utc::now();
        self.ensure_row(ip, now).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE ip_geo SET abuse_expires_at = COALESCE(abuse_expires_at, ?1),
                     vt_expires_at = COALESCE(vt_expires_at, ?1),
                     geo_expires_at = COALESCE(geo_expires_at, ?1),
                     updated_at = ?2 WHERE ip = ?3"#,
                params![expires_at.to_rfc3339(), now.to_rfc3339(), ip.to_string()],
            )
            .await?;
        debug!("🕳️ [ENRICH_CACHE]: Negative entry sealed for [{}].", ip);
        Ok(())
    }

    /// Fila sintética 'clean' para IPs privadas/loopback.
    pub async fn store_synthetic_clean(&self, ip: &str) -> Result<IpGeoRecord, DbError> {
        let now = Utc::now();
        self.ensure_row(ip, now).await?;
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE ip_geo SET threat_level = 'clean', abuse_confidence_score = 0,
                     abuse_report_count = 0, vt_positives = 0, vt_total = 0, updated_at = ?1
                   WHERE ip = ?2"#,
                params![now.to_rfc3339(), ip.to_string()],
            )
            .await?;
        Ok(IpGeoRecord::synthetic_clean(ip, now))
    }

    /// Poda de filas completamente expiradas.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let purged = connection
            .execute(
                r#"DELETE FROM ip_geo
                   WHERE threat_level != 'clean'
                     AND COALESCE(geo_expires_at, '1970-01-01') < ?1
                     AND COALESCE(abuse_expires_at, '1970-01-01') < ?1
                     AND COALESCE(vt_expires_at, '1970-01-01') < ?1"#,
                params![now.to_rfc3339()],
            )
            .await?;
        Ok(purged)
    }

    /// Re-deriva el nivel de amenaza desde la fila fusionada.
    async fn rederive_threat_level(&self, ip: &str) -> Result<(), DbError> {
        let merged_row = self.find(ip).await?.ok_or(DbError::MappingError(format!(
            "enrichment row vanished for {ip}"
        )))?;

        let derived = derive_threat_level(&merged_row);
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE ip_geo SET threat_level = ?1 WHERE ip = ?2",
                params![derived.as_str().to_string(), ip.to_string()],
            )
            .await?;
        Ok(())
    }
}

/// Derivación del nivel de amenaza desde la fila fusionada.
pub fn derive_threat_level(record: &IpGeoRecord) -> ThreatLevel {
    let abuse = record.abuse_confidence_score.unwrap_or(0);
    let vt_ratio = match (record.vt_positives, record.vt_total) {
        (Some(p), Some(t)) if t > 0 => p as f64 / t as f64,
        _ => 0.0,
    };

    if abuse >= 75 || vt_ratio >= 0.1 {
        ThreatLevel::Critical
    } else if abuse >= 50 || record.is_tor {
        ThreatLevel::High
    } else if abuse >= 25 || record.is_proxy || record.is_vpn {
        ThreatLevel::Medium
    } else if abuse > 0 || vt_ratio > 0.0 {
        ThreatLevel::Low
    } else if record.abuse_confidence_score.is_some() {
        ThreatLevel::Clean
    } else {
        ThreatLevel::Unknown
    }
}

const GEO_COLUMNS: &str = "ip, country_code, country_name, city, asn, isp, latitude, longitude, \
     utc_offset_seconds, is_proxy, is_vpn, is_tor, is_datacenter, abuse_confidence_score, \
     abuse_report_count, vt_positives, vt_total, threat_level, geo_expires_at, abuse_expires_at, \
     vt_expires_at, updated_at";

fn map_geo_row(row: &Row) -> Result<IpGeoRecord, DbError> {
    let threat_label: String = row.get(17)?;
    let geo_expires_raw: Option<String> = row.get(18)?;
    let abuse_expires_raw: Option<String> = row.get(19)?;
    let vt_expires_raw: Option<String> = row.get(20)?;
    let updated_raw: String = row.get(21)?;

    Ok(IpGeoRecord {
        ip: row.get(0)?,
        country_code: row.get(1)?,
        country_name: row.get(2)?,
        city: row.get(3)?,
        asn: row.get::<Option<i64>>(4)?.map(|a| a as u32),
        isp: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        utc_offset_seconds: row.get::<Option<i64>>(8)?.map(|o| o as i32),
        is_proxy: row.get::<i64>(9)? == 1,
        is_vpn: row.get::<i64>(10)? == 1,
        is_tor: row.get::<i64>(11)? == 1,
        is_datacenter: row.get::<i64>(12)? == 1,
        abuse_confidence_score: row.get::<Option<i64>>(13)?.map(|s| s as u8),
        abuse_report_count: row.get::<Option<i64>>(14)?.map(|c| c as u32),
        vt_positives: row.get::<Option<i64>>(15)?.map(|p| p as u32),
        vt_total: row.get::<Option<i64>>(16)?.map(|t| t as u32),
        threat_level: match threat_label.as_str() {
            "clean" => ThreatLevel::Clean,
            "low" => ThreatLevel::Low,
            "medium" => ThreatLevel::Medium,
            "high" => ThreatLevel::High,
            "critical" => ThreatLevel::Critical,
            _ => ThreatLevel::Unknown,
        },
        geo_expires_at: geo_expires_raw.as_deref().and_then(parse_rfc3339),
        abuse_expires_at: abuse_expires_raw.as_deref().and_then(parse_rfc3339),
        vt_expires_at: vt_expires_raw.as_deref().and_then(parse_rfc3339),
        updated_at: parse_rfc3339(&updated_raw).unwrap_or_else(Utc::now),
    })
}
