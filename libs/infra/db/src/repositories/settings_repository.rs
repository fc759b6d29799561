// [libs/infra/db/src/repositories/settings_repository.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM SETTINGS REPOSITORY (V7.0 - RUNTIME GOVERNANCE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: AJUSTES DE RUNTIME DEL DETECTOR Y DEL BLOQUEADOR
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RUNTIME WEIGHTS: Los pesos del detector viven aquí, jamás en
 *    duro; el operador puede invertir la precedencia regla/reputación
 *    sin redesplegar.
 * 2. IDEMPOTENT SEED: La siembra por llave respeta valores ya
 *    sintonizados por el operador.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use chrono::Utc;
use guardian_domain_detection::scorer::ScoringWeights;
use libsql::params;
use tracing::{info, instrument};

// Llaves nominales del catálogo de ajustes.
pub const KEY_WEIGHT_RULE: &str = "scoring.weight.rule";
pub const KEY_WEIGHT_ANOMALY: &str = "scoring.weight.anomaly";
pub const KEY_WEIGHT_REPUTATION: &str = "scoring.weight.reputation";
pub const KEY_WEIGHT_GEOGRAPHIC: &str = "scoring.weight.geographic";
pub const KEY_ML_EMIT_THRESHOLD: &str = "blocking.ml_emit_threshold";
pub const KEY_DEFAULT_BLOCK_MINUTES: &str = "blocking.default_duration_minutes";
pub const KEY_HIGH_RISK_COUNTRIES: &str = "geo.high_risk_countries";
pub const KEY_MAX_INFLIGHT_BATCHES: &str = "ingest.max_inflight_batches";

pub struct SettingsRepository {
    database_client: DbClient,
}

impl SettingsRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    pub async fn get_real(&self, key: &str) -> Result<Option<f64>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query("SELECT value_real FROM system_settings WHERE key = ?1", params![key.to_string()])
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(None),
        }
    }

    pub async fn get_text(&self, key: &str) -> Result<Option<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query("SELECT value_text FROM system_settings WHERE key = ?1", params![key.to_string()])
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn set_real(&self, key: &str, value: f64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT INTO system_settings (key, value_real, updated_at) VALUES (?1, ?2, ?3)
                   ON CONFLICT(key) DO UPDATE SET value_real = excluded.value_real,
                   updated_at = excluded.updated_at"#,
                params![key.to_string(), value, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    pub async fn set_text(&self, key: &str, value: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT INTO system_settings (key, value_text, updated_at) VALUES (?1, ?2, ?3)
                   ON CONFLICT(key) DO UPDATE SET value_text = excluded.value_text,
                   updated_at = excluded.updated_at"#,
                params![key.to_string(), value.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Pesos vigentes del detector (con respaldo en los valores nominales).
    pub async fn scoring_weights(&self) -> Result<ScoringWeights, DbError> {
        let defaults = ScoringWeights::default();
        Ok(ScoringWeights {
            rule: self.get_real(KEY_WEIGHT_RULE).await?.unwrap_or(defaults.rule),
            anomaly: self.get_real(KEY_WEIGHT_ANOMALY).await?.unwrap_or(defaults.anomaly),
            reputation: self.get_real(KEY_WEIGHT_REPUTATION).await?.unwrap_or(defaults.reputation),
            geographic: self.get_real(KEY_WEIGHT_GEOGRAPHIC).await?.unwrap_or(defaults.geographic),
        })
    }

    pub async fn ml_emit_threshold(&self) -> Result<f64, DbError> {
        Ok(self.get_real(KEY_ML_EMIT_THRESHOLD).await?.unwrap_or(61.0))
    }

    pub async fn default_block_minutes(&self) -> Result<i64, DbError> {
        Ok(self.get_real(KEY_DEFAULT_BLOCK_MINUTES).await?.unwrap_or(60.0) as i64)
    }

    pub async fn max_inflight_batches(&self) -> Result<u32, DbError> {
        Ok(self.get_real(KEY_MAX_INFLIGHT_BATCHES).await?.unwrap_or(4.0) as u32)
    }

    /// Catálogo de países de alto riesgo (códigos ISO-3166, JSON array).
    pub async fn high_risk_countries(&self) -> Result<Vec<String>, DbError> {
        let raw_catalog = self.get_text(KEY_HIGH_RISK_COUNTRIES).await?.unwrap_or_default();
        if raw_catalog.is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&raw_catalog)
            .map_err(|fault| DbError::MappingError(fault.to_string()))
    }

    /**
     * Siembra idempotente: 'INSERT OR IGNORE' respeta la sintonía del
     * operador ya persistida.
     */
    #[instrument(skip(self))]
    pub async fn seed_defaults(&self) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let numeric_defaults: &[(&str, f64)] = &[
            (KEY_WEIGHT_RULE, 0.25),
            (KEY_WEIGHT_ANOMALY, 0.30),
            (KEY_WEIGHT_REPUTATION, 0.35),
            (KEY_WEIGHT_GEOGRAPHIC, 0.10),
            (KEY_ML_EMIT_THRESHOLD, 61.0),
            (KEY_DEFAULT_BLOCK_MINUTES, 60.0),
            (KEY_MAX_INFLIGHT_BATCHES, 4.0),
        ];

        for (key, value) in numeric_defaults {
            connection
                .execute(
                    "INSERT OR IGNORE INTO system_settings (key, value_real, updated_at) VALUES (?1, ?2, ?3)",
                    params![key.to_string(), *value, now.clone()],
                )
                .await?;
        }

        connection
            .execute(
                "INSERT OR IGNORE INTO system_settings (key, value_text, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    KEY_HIGH_RISK_COUNTRIES.to_string(),
                    "[\"KP\",\"IR\",\"SY\",\"CU\"]".to_string(),
                    now
                ],
            )
            .await?;

        info!("🌱 [SETTINGS]: Runtime governance defaults seeded.");
        Ok(())
    }
}
