// [libs/infra/db/src/repositories/rule_repository.rs]
/*!
 * =================================================================
 * APARATO: BLOCKING RULE CATALOG REPOSITORY (V9.0 - SEEDED DEFAULTS)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CATÁLOGO DE REGLAS Y SIEMBRA IDEMPOTENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. AUDIT RETENTION: Las reglas deshabilitadas se retienen; solo el
 *    evaluador filtra por 'enabled'.
 * 2. SEEDED DEFAULTS: Umbral clásico de fuerza bruta (5 fallos / 10
 *    minutos), ráfaga de usuarios inválidos, reputación hostil y
 *    cerco geográfico, sembrados una sola vez por nombre.
 * =================================================================
 */

use crate::errors::DbError;
use crate::DbClient;
use guardian_domain_models::blocking::{BlockingRuleRecord, RuleKind};
use libsql::{params, Row};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct RuleRepository {
    database_client: DbClient,
}

impl RuleRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    pub async fn list_enabled(&self) -> Result<Vec<BlockingRuleRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM blocking_rules WHERE enabled = 1 ORDER BY priority ASC"
                ),
                (),
            )
            .await?;

        let mut catalog = Vec::new();
        while let Some(row) = query_result.next().await? {
            catalog.push(map_rule_row(&row)?);
        }
        Ok(catalog)
    }

    #[instrument(skip(self, rule), fields(rule = %rule.name))]
    pub async fn insert(&self, rule: &BlockingRuleRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT OR IGNORE INTO blocking_rules
                   (id, name, rule_type, priority, enabled, conditions, severity,
                    block_duration_minutes, auto_unblock, notification_channels)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                params![
                    rule.id.clone(),
                    rule.name.clone(),
                    kind_label(rule.rule_type).to_string(),
                    rule.priority as i64,
                    rule.enabled as i64,
                    rule.conditions.to_string(),
                    rule.severity as i64,
                    rule.block_duration_minutes,
                    rule.auto_unblock as i64,
                    rule.notification_channels.to_string()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn set_enabled(&self, rule_name: &str, enabled: bool) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE blocking_rules SET enabled = ?1 WHERE name = ?2",
                params![enabled as i64, rule_name.to_string()],
            )
            .await?;
        Ok(())
    }

    /**
     * Siembra idempotente del catálogo por defecto (por nombre único).
     */
    #[instrument(skip(self, high_risk_country_codes))]
    pub async fn seed_defaults(&self, high_risk_country_codes: &[String]) -> Result<(), DbError> {
        let default_catalog = vec![
            BlockingRuleRecord {
                id: Uuid::new_v4().to_string(),
                name: "bruteforce_threshold".to_string(),
                rule_type: RuleKind::Threshold,
                priority: 10,
                enabled: true,
                conditions: json!({"all": [
                    {"metric": "failures_last_10m", "op": "gte", "value": 5}
                ]}),
                severity: 80,
                block_duration_minutes: Some(60),
                auto_unblock: true,
                notification_channels: json!([]),
            },
            BlockingRuleRecord {
                id: Uuid::new_v4().to_string(),
                name: "username_spray".to_string(),
                rule_type: RuleKind::Pattern,
                priority: 15,
                enabled: true,
                conditions: json!({"any": [
                    {"metric": "unique_usernames_last_hour", "op": "gte", "value": 10},
                    {"metric": "attempts_per_minute", "op": "gte", "value": 30}
                ]}),
                severity: 85,
                block_duration_minutes: Some(240),
                auto_unblock: true,
                notification_channels: json!([]),
            },
            BlockingRuleRecord {
                id: Uuid::new_v4().to_string(),
                name: "hostile_reputation".to_string(),
                rule_type: RuleKind::Threshold,
                priority: 5,
                enabled: true,
                conditions: json!({"all": [
                    {"metric": "abuse_confidence_score", "op": "gte", "value": 75}
                ]}),
                severity: 100,
                block_duration_minutes: Some(1440),
                auto_unblock: true,
                notification_channels: json!([]),
            },
            BlockingRuleRecord {
                id: Uuid::new_v4().to_string(),
                name: "geo_fence".to_string(),
                rule_type: RuleKind::Geo,
                priority: 30,
                enabled: true,
                conditions: json!({"all": [
                    {"field": "country_code", "op": "in", "value": high_risk_country_codes},
                    {"metric": "failures_last_10m", "op": "gte", "value": 3}
                ]}),
                severity: 70,
                block_duration_minutes: Some(120),
                auto_unblock: true,
                notification_channels: json!([]),
            },
        ];

        for rule in &default_catalog {
            self.insert(rule).await?;
        }

        info!("🌱 [RULE_CATALOG]: Default catalog seeded ({} rules).", default_catalog.len());
        Ok(())
    }
}

fn kind_label(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::Threshold => "threshold",
        RuleKind::Pattern => "pattern",
        RuleKind::Geo => "geo",
        RuleKind::TimeBased => "time_based",
        RuleKind::Ml => "ml",
    }
}

const RULE_COLUMNS: &str =
    "id, name, rule_type, priority, enabled, conditions, severity, block_duration_minutes, \
     auto_unblock, notification_channels";

fn map_rule_row(row: &Row) -> Result<BlockingRuleRecord, DbError> {
    let kind_raw: String = row.get(2)?;
    let conditions_raw: String = row.get(5)?;
    let channels_raw: String = row.get(9)?;

    Ok(BlockingRuleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        rule_type: match kind_raw.as_str() {
            "pattern" => RuleKind::Pattern,
            "geo" => RuleKind::Geo,
            "time_based" => RuleKind::TimeBased,
            "ml" => RuleKind::Ml,
            _ => RuleKind::Threshold,
        },
        priority: row.get::<i64>(3)? as i32,
        enabled: row.get::<i64>(4)? == 1,
        conditions: serde_json::from_str(&conditions_raw)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?,
        severity: row.get::<i64>(6)? as u8,
        block_duration_minutes: row.get(7)?,
        auto_unblock: row.get::<i64>(8)? == 1,
        notification_channels: serde_json::from_str(&channels_raw)
            .unwrap_or(serde_json::Value::Array(vec![])),
    })
}
