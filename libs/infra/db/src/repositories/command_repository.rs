// [libs/infra/db/src/repositories/command_repository.rs]
/*!
 * =================================================================
 * APARATO: EDGE COMMAND QUEUE REPOSITORY (V14.0 - MONOTONE SEAL)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: COLA DE COMANDOS CON ENTREGA EXACTLY-ONCE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EXACTLY-ONCE CLAIM: El sondeo reclama los comandos pendientes en
 *    orden de creación dentro de una transacción, transitándolos a
 *    'sent'; dos sondeos concurrentes jamás entregan el mismo UUID.
 * 2. MONOTONE LIFECYCLE: pending -> sent -> (completed | failed); los
 *    resultados sobre comandos terminales no mutan fila alguna.
 * 3. UNKNOWN TOLERANCE: Un resultado para un UUID desconocido se
 *    acepta y registra sin crear filas.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::agent_repository::parse_rfc3339;
use crate::DbClient;
use chrono::{DateTime, Utc};
use guardian_domain_models::firewall::{
    CommandDirective, CommandStatus, FirewallAction, UfwCommandRecord,
};
use libsql::{params, Row};
use tracing::{info, instrument, warn};

/// Veredicto de la ingesta de un resultado de borde.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultIngestOutcome {
    Applied,
    UnknownCommand,
    AlreadyTerminal,
}

pub struct CommandRepository {
    database_client: DbClient,
}

impl CommandRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    /**
     * Encola una instrucción saliente para un centinela.
     *
     * El UUID del comando es también el UUID de la acción de bloqueo
     * correspondiente (llave de join-back).
     */
    #[instrument(skip(self, action), fields(agent = %agent_id))]
    pub async fn enqueue(
        &self,
        command_uuid: &str,
        agent_id: &str,
        action: &FirewallAction,
        raw_command: &str,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let action_json = serde_json::to_string(action)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let target_ip = match action {
            FirewallAction::DenyFrom { ip, .. } | FirewallAction::DeleteDenyFrom { ip, .. } => {
                Some(ip.clone())
            }
            _ => None,
        };

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT INTO agent_ufw_commands
                   (command_uuid, agent_id, action_json, raw_command, target_ip, status, created_by, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)"#,
                params![
                    command_uuid.to_string(),
                    agent_id.to_string(),
                    action_json,
                    raw_command.to_string(),
                    target_ip,
                    created_by.to_string(),
                    created_at.to_rfc3339()
                ],
            )
            .await?;

        info!("📬 [COMMAND_QUEUED]: [{}] for sentinel [{}].", raw_command, agent_id);
        Ok(())
    }

    /**
     * Reclama los comandos pendientes del centinela en orden de creación
     * y los transita a 'sent' atómicamente.
     *
     * # Performance:
     * Dos sondeos concurrentes para el mismo centinela quedan
     * serializados por la transacción; el perdedor observa cola vacía.
     */
    #[instrument(skip(self), fields(agent = %agent_id))]
    pub async fn claim_pending(
        &self,
        agent_id: &str,
        claimed_at: DateTime<Utc>,
    ) -> Result<Vec<CommandDirective>, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        let mut pending_query = transaction
            .query(
                "SELECT command_uuid, action_json, created_at FROM agent_ufw_commands
                 WHERE agent_id = ?1 AND status = 'pending' ORDER BY created_at ASC, rowid ASC",
                params![agent_id.to_string()],
            )
            .await?;

        let mut claimed_directives = Vec::new();
        let mut claimed_uuids = Vec::new();

        while let Some(row) = pending_query.next().await? {
            let command_uuid: String = row.get(0)?;
            let action_json: String = row.get(1)?;
            let created_raw: String = row.get(2)?;

            let action: FirewallAction = serde_json::from_str(&action_json)
                .map_err(|fault| DbError::MappingError(fault.to_string()))?;

            claimed_directives.push(CommandDirective {
                command_uuid: command_uuid.clone(),
                action,
                created_at: parse_rfc3339(&created_raw).unwrap_or_else(Utc::now),
            });
            claimed_uuids.push(command_uuid);
        }

        for command_uuid in &claimed_uuids {
            transaction
                .execute(
                    "UPDATE agent_ufw_commands SET status = 'sent', sent_at = ?1
                     WHERE command_uuid = ?2 AND status = 'pending'",
                    params![claimed_at.to_rfc3339(), command_uuid.clone()],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(claimed_directives)
    }

    /**
     * Ingesta el resultado reportado por el borde.
     *
     * # Logic:
     * - UUID desconocido: se acepta y registra, sin mutación.
     * - Comando terminal: sin transición retrógrada, sin mutación.
     * - Comando 'sent' (o 'pending' tras redespliegue): sella estado.
     */
    #[instrument(skip(self, message))]
    pub async fn record_result(
        &self,
        command_uuid: &str,
        success: bool,
        message: &str,
        executed_at: DateTime<Utc>,
    ) -> Result<ResultIngestOutcome, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut status_query = connection
            .query(
                "SELECT status FROM agent_ufw_commands WHERE command_uuid = ?1",
                params![command_uuid.to_string()],
            )
            .await?;

        let current_status: Option<String> = match status_query.next().await? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };

        let Some(current_status) = current_status else {
            warn!("❓ [RESULT_ORPHAN]: Result for unknown command [{}] accepted and logged.", command_uuid);
            return Ok(ResultIngestOutcome::UnknownCommand);
        };

        if current_status == "completed" || current_status == "failed" {
            return Ok(ResultIngestOutcome::AlreadyTerminal);
        }

        let terminal_status = if success { "completed" } else { "failed" };
        connection
            .execute(
                r#"UPDATE agent_ufw_commands
                   SET status = ?1, result_message = ?2, executed_at = ?3
                   WHERE command_uuid = ?4 AND status IN ('pending', 'sent')"#,
                params![
                    terminal_status.to_string(),
                    message.to_string(),
                    executed_at.to_rfc3339(),
                    command_uuid.to_string()
                ],
            )
            .await?;

        Ok(ResultIngestOutcome::Applied)
    }

    pub async fn find(&self, command_uuid: &str) -> Result<Option<UfwCommandRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {COMMAND_COLUMNS} FROM agent_ufw_commands WHERE command_uuid = ?1"),
                params![command_uuid.to_string()],
            )
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(Some(map_command_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Comando deny_from más reciente para (centinela, IP) — reconciliación.
    pub async fn latest_deny_from(
        &self,
        agent_id: &str,
        ip: &str,
    ) -> Result<Option<UfwCommandRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {COMMAND_COLUMNS} FROM agent_ufw_commands
                     WHERE agent_id = ?1 AND target_ip = ?2
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![agent_id.to_string(), ip.to_string()],
            )
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(Some(map_command_row(&row)?)),
            None => Ok(None),
        }
    }
}

const COMMAND_COLUMNS: &str = "command_uuid, agent_id, action_json, raw_command, status, \
     result_message, created_by, created_at, sent_at, executed_at";

fn map_command_row(row: &Row) -> Result<UfwCommandRecord, DbError> {
    let action_json: String = row.get(2)?;
    let status_label: String = row.get(4)?;
    let created_raw: String = row.get(7)?;
    let sent_raw: Option<String> = row.get(8)?;
    let executed_raw: Option<String> = row.get(9)?;

    Ok(UfwCommandRecord {
        command_uuid: row.get(0)?,
        agent_id: row.get(1)?,
        action: serde_json::from_str(&action_json)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?,
        raw_command: row.get(3)?,
        status: match status_label.as_str() {
            "sent" => CommandStatus::Sent,
            "completed" => CommandStatus::Completed,
            "failed" => CommandStatus::Failed,
            _ => CommandStatus::Pending,
        },
        result_message: row.get(5)?,
        created_by: row.get(6)?,
        created_at: parse_rfc3339(&created_raw).unwrap_or_else(Utc::now),
        sent_at: sent_raw.as_deref().and_then(parse_rfc3339),
        executed_at: executed_raw.as_deref().and_then(parse_rfc3339),
    })
}
