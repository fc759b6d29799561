// [libs/infra/db/src/repositories/ufw_state_repository.rs]
/*!
 * =================================================================
 * APARATO: UFW STATE MIRROR REPOSITORY (V8.0 - ATOMIC SWAP)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESPEJO DEL CORTAFUEGOS DE CADA CENTINELA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC SWAP: Cada sincronización reemplaza el espejo completo
 *    (estado + reglas numeradas) en una transacción; jamás se fusiona.
 * 2. RECONCILER FEED: Expone las reglas deny por IP para el auditor de
 *    paridad borde<->Ledger.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::agent_repository::parse_rfc3339;
use crate::DbClient;
use chrono::{DateTime, Utc};
use guardian_domain_models::firewall::{FirewallInventory, UfwRuleEntry, UfwStatusSnapshot};
use libsql::params;
use tracing::{info, instrument};

pub struct UfwStateRepository {
    database_client: DbClient,
}

impl UfwStateRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    /**
     * Reemplaza el espejo completo del inventario en una transacción.
     */
    #[instrument(skip(self, inventory), fields(agent = %agent_id, rules = inventory.rules.len()))]
    pub async fn replace_inventory(
        &self,
        agent_id: &str,
        inventory: &FirewallInventory,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        transaction
            .execute(
                r#"INSERT INTO agent_ufw_state
                   (agent_id, status, default_incoming, default_outgoing, default_routed,
                    logging_level, ipv6_enabled, version, rules_count, collected_at, synced_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                   ON CONFLICT(agent_id) DO UPDATE SET
                     status = excluded.status,
                     default_incoming = excluded.default_incoming,
                     default_outgoing = excluded.default_outgoing,
                     default_routed = excluded.default_routed,
                     logging_level = excluded.logging_level,
                     ipv6_enabled = excluded.ipv6_enabled,
                     version = excluded.version,
                     rules_count = excluded.rules_count,
                     collected_at = excluded.collected_at,
                     synced_at = excluded.synced_at"#,
                params![
                    agent_id.to_string(),
                    inventory.status.status.clone(),
                    inventory.status.default_incoming.clone(),
                    inventory.status.default_outgoing.clone(),
                    inventory.status.default_routed.clone(),
                    inventory.status.logging_level.clone(),
                    inventory.status.ipv6_enabled as i64,
                    inventory.status.version.clone(),
                    inventory.status.rules_count as i64,
                    inventory.collected_at.to_rfc3339(),
                    synced_at.to_rfc3339()
                ],
            )
            .await?;

        transaction
            .execute("DELETE FROM agent_ufw_rules WHERE agent_id = ?1", params![agent_id.to_string()])
            .await?;

        for rule in &inventory.rules {
            transaction
                .execute(
                    r#"INSERT INTO agent_ufw_rules
                       (agent_id, position, raw_text, action, direction, from_source, to_destination)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        agent_id.to_string(),
                        rule.position as i64,
                        rule.raw_text.clone(),
                        rule.action.clone(),
                        rule.direction.clone(),
                        rule.from_source.clone(),
                        rule.to_destination.clone()
                    ],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        info!("🧱 [UFW_MIRROR]: Inventory swap sealed for [{}].", agent_id);
        Ok(())
    }

    pub async fn status_snapshot(
        &self,
        agent_id: &str,
    ) -> Result<Option<(UfwStatusSnapshot, DateTime<Utc>)>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"SELECT status, default_incoming, default_outgoing, default_routed,
                          logging_level, ipv6_enabled, version, rules_count, synced_at
                   FROM agent_ufw_state WHERE agent_id = ?1"#,
                params![agent_id.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(row) => {
                let synced_raw: String = row.get(8)?;
                Ok(Some((
                    UfwStatusSnapshot {
                        status: row.get(0)?,
                        default_incoming: row.get(1)?,
                        default_outgoing: row.get(2)?,
                        default_routed: row.get(3)?,
                        logging_level: row.get(4)?,
                        ipv6_enabled: row.get::<i64>(5)? == 1,
                        version: row.get(6)?,
                        rules_count: row.get::<i64>(7)? as u32,
                    },
                    parse_rfc3339(&synced_raw).unwrap_or_else(Utc::now),
                )))
            }
            None => Ok(None),
        }
    }

    pub async fn rules_for_agent(&self, agent_id: &str) -> Result<Vec<UfwRuleEntry>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"SELECT position, raw_text, action, direction, from_source, to_destination
                   FROM agent_ufw_rules WHERE agent_id = ?1 ORDER BY position ASC"#,
                params![agent_id.to_string()],
            )
            .await?;

        let mut mirror = Vec::new();
        while let Some(row) = query_result.next().await? {
            mirror.push(UfwRuleEntry {
                position: row.get::<i64>(0)? as u32,
                raw_text: row.get(1)?,
                action: row.get(2)?,
                direction: row.get(3)?,
                from_source: row.get(4)?,
                to_destination: row.get(5)?,
            });
        }
        Ok(mirror)
    }

    /// IPs con regla DENY en el espejo del centinela (insumo del reconciliador).
    pub async fn denied_sources(&self, agent_id: &str) -> Result<Vec<String>, DbError> {
        let rules = self.rules_for_agent(agent_id).await?;
        Ok(rules
            .into_iter()
            .filter(|rule| {
                rule.action.as_deref().map(|a| a.eq_ignore_ascii_case("deny")).unwrap_or(false)
            })
            .filter_map(|rule| rule.from_source)
            .filter(|source| source != "Anywhere" && !source.is_empty())
            .collect())
    }
}
