// [libs/infra/db/src/repositories/block_repository.rs]
/*!
 * =================================================================
 * APARATO: IP BLOCK REGISTRY REPOSITORY (V16.0 - SINGLE ACTIVE SEAL)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE BLOQUEOS Y AUDITORÍA APPEND-ONLY
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONDITIONAL INSERT SEAL: El invariante de fila activa única por
 *    (ip, agente) se sella con el índice único parcial; la colisión de
 *    inserción se reporta como 'AlreadyActive', jamás como fallo.
 * 2. APPEND-ONLY AUDIT: Cada transición (block/unblock/extend/modify)
 *    agrega una fila en blocking_actions con el UUID del comando
 *    emitido como llave de join-back.
 * 3. SWEEP CONTRACT: 'due_for_unblock' entrega los bloqueos activos
 *    con unblock_at vencido y auto_unblock habilitado.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::agent_repository::parse_rfc3339;
use crate::DbClient;
use chrono::{DateTime, Utc};
use guardian_domain_models::blocking::{
    BlockActionKind, BlockSource, BlockingActionRecord, IpBlockRecord,
};
use libsql::{params, Row};
use tracing::{info, instrument};

/// Resultado de la inserción condicional contra el invariante activo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockInsertOutcome {
    Created,
    AlreadyActive,
}

pub struct BlockRepository {
    database_client: DbClient,
}

impl BlockRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    pub async fn find(&self, block_id: &str) -> Result<Option<IpBlockRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {BLOCK_COLUMNS} FROM ip_blocks WHERE id = ?1"),
                params![block_id.to_string()],
            )
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(Some(map_block_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn find_active(
        &self,
        ip: &str,
        agent_id: &str,
    ) -> Result<Option<IpBlockRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM ip_blocks
                     WHERE ip_address = ?1 AND agent_id = ?2 AND is_active = 1"
                ),
                params![ip.to_string(), agent_id.to_string()],
            )
            .await?;
        match query_result.next().await? {
            Some(row) => Ok(Some(map_block_row(&row)?)),
            None => Ok(None),
        }
    }

    /**
     * Inserción condicional contra el índice único parcial.
     *
     * La colisión con un bloqueo ya activo se observa como
     * 'AlreadyActive'; el emisor concurrente perdedor corto-circuita.
     */
    #[instrument(skip(self, block), fields(ip = %block.ip))]
    pub async fn try_create(&self, block: &IpBlockRecord) -> Result<BlockInsertOutcome, DbError> {
        let connection = self.database_client.get_connection()?;

        let insert_attempt = connection
            .execute(
                r#"INSERT INTO ip_blocks
                   (id, ip_address, cidr_range, reason, source, rule_id, event_uuid, agent_id,
                    block_type, is_active, blocked_at, unblock_at, auto_unblock)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11, ?12)"#,
                params![
                    block.id.clone(),
                    block.ip.clone(),
                    block.cidr_range.clone(),
                    block.reason.clone(),
                    source_label(block.source).to_string(),
                    block.triggering_rule_id.clone(),
                    block.triggering_event_uuid.clone(),
                    block.agent_id.clone(),
                    block.block_type.clone(),
                    block.blocked_at.to_rfc3339(),
                    block.unblock_at.map(|at| at.to_rfc3339()),
                    block.auto_unblock as i64
                ],
            )
            .await;

        match insert_attempt {
            Ok(_) => {
                info!("⛔ [BLOCK_SEALED]: IP [{}] blocked for agent [{:?}].", block.ip, block.agent_id);
                Ok(BlockInsertOutcome::Created)
            }
            Err(insert_fault) => {
                let message = insert_fault.to_string();
                if message.contains("UNIQUE constraint failed") {
                    Ok(BlockInsertOutcome::AlreadyActive)
                } else {
                    Err(DbError::QueryError(insert_fault))
                }
            }
        }
    }

    /// Extiende la ventana de un bloqueo activo.
    #[instrument(skip(self))]
    pub async fn extend(
        &self,
        block_id: &str,
        new_unblock_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let mutated = connection
            .execute(
                "UPDATE ip_blocks SET unblock_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![new_unblock_at.to_rfc3339(), block_id.to_string()],
            )
            .await?;
        if mutated == 0 {
            return Err(DbError::BlockNotFound);
        }
        Ok(())
    }

    /// Desactiva un bloqueo registrando motivo y autoría.
    #[instrument(skip(self))]
    pub async fn deactivate(
        &self,
        block_id: &str,
        unblock_reason: &str,
        unblocked_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let mutated = connection
            .execute(
                r#"UPDATE ip_blocks SET is_active = 0, unblocked_at = ?1, unblock_reason = ?2
                   WHERE id = ?3 AND is_active = 1"#,
                params![unblocked_at.to_rfc3339(), unblock_reason.to_string(), block_id.to_string()],
            )
            .await?;
        if mutated == 0 {
            return Err(DbError::BlockNotFound);
        }
        Ok(())
    }

    /// Sella la etiqueta de tipo (ej. 'reconciled') de un bloqueo.
    pub async fn set_block_type(&self, block_id: &str, block_type: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE ip_blocks SET block_type = ?1 WHERE id = ?2",
                params![block_type.to_string(), block_id.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Bloqueos activos con ventana vencida y auto-desbloqueo habilitado.
    pub async fn due_for_unblock(&self, now: DateTime<Utc>) -> Result<Vec<IpBlockRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM ip_blocks
                     WHERE is_active = 1 AND auto_unblock = 1
                       AND unblock_at IS NOT NULL AND unblock_at <= ?1"
                ),
                params![now.to_rfc3339()],
            )
            .await?;

        let mut due = Vec::new();
        while let Some(row) = query_result.next().await? {
            due.push(map_block_row(&row)?);
        }
        Ok(due)
    }

    pub async fn active_for_agent(&self, agent_id: &str) -> Result<Vec<IpBlockRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM ip_blocks
                     WHERE agent_id = ?1 AND is_active = 1 ORDER BY blocked_at ASC"
                ),
                params![agent_id.to_string()],
            )
            .await?;

        let mut catalog = Vec::new();
        while let Some(row) = query_result.next().await? {
            catalog.push(map_block_row(&row)?);
        }
        Ok(catalog)
    }

    pub async fn list_active(&self) -> Result<Vec<IpBlockRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM ip_blocks WHERE is_active = 1 ORDER BY blocked_at DESC"
                ),
                (),
            )
            .await?;

        let mut catalog = Vec::new();
        while let Some(row) = query_result.next().await? {
            catalog.push(map_block_row(&row)?);
        }
        Ok(catalog)
    }

    /// Agrega la fila de auditoría append-only de una transición.
    #[instrument(skip(self, action), fields(block = %action.block_id))]
    pub async fn record_action(&self, action: &BlockingActionRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT INTO blocking_actions (action_uuid, block_id, kind, performed_by, reason, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    action.action_uuid.clone(),
                    action.block_id.clone(),
                    action_kind_label(action.kind).to_string(),
                    action.performed_by.clone(),
                    action.reason.clone(),
                    action.created_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn actions_for_block(
        &self,
        block_id: &str,
    ) -> Result<Vec<BlockingActionRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                "SELECT action_uuid, block_id, kind, performed_by, reason, created_at
                 FROM blocking_actions WHERE block_id = ?1 ORDER BY created_at ASC",
                params![block_id.to_string()],
            )
            .await?;

        let mut trail = Vec::new();
        while let Some(row) = query_result.next().await? {
            let kind_label: String = row.get(2)?;
            let created_raw: String = row.get(5)?;
            trail.push(BlockingActionRecord {
                action_uuid: row.get(0)?,
                block_id: row.get(1)?,
                kind: match kind_label.as_str() {
                    "unblock" => BlockActionKind::Unblock,
                    "extend" => BlockActionKind::Extend,
                    "modify" => BlockActionKind::Modify,
                    _ => BlockActionKind::Block,
                },
                performed_by: row.get(3)?,
                reason: row.get(4)?,
                created_at: parse_rfc3339(&created_raw).unwrap_or_else(Utc::now),
            });
        }
        Ok(trail)
    }
}

fn source_label(source: BlockSource) -> &'static str {
    match source {
        BlockSource::Manual => "manual",
        BlockSource::Rule => "rule",
        BlockSource::Ml => "ml",
        BlockSource::Api => "api",
        BlockSource::Fail2ban => "fail2ban",
        BlockSource::Ufw => "ufw",
    }
}

fn action_kind_label(kind: BlockActionKind) -> &'static str {
    match kind {
        BlockActionKind::Block => "block",
        BlockActionKind::Unblock => "unblock",
        BlockActionKind::Extend => "extend",
        BlockActionKind::Modify => "modify",
    }
}

const BLOCK_COLUMNS: &str = "id, ip_address, cidr_range, reason, source, rule_id, event_uuid, \
     agent_id, block_type, is_active, blocked_at, unblock_at, auto_unblock, unblocked_at, unblock_reason";

fn map_block_row(row: &Row) -> Result<IpBlockRecord, DbError> {
    let source_raw: String = row.get(4)?;
    let blocked_raw: String = row.get(10)?;
    let unblock_raw: Option<String> = row.get(11)?;
    let unblocked_raw: Option<String> = row.get(13)?;

    Ok(IpBlockRecord {
        id: row.get(0)?,
        ip: row.get(1)?,
        cidr_range: row.get(2)?,
        reason: row.get(3)?,
        source: match source_raw.as_str() {
            "manual" => BlockSource::Manual,
            "ml" => BlockSource::Ml,
            "api" => BlockSource::Api,
            "fail2ban" => BlockSource::Fail2ban,
            "ufw" => BlockSource::Ufw,
            _ => BlockSource::Rule,
        },
        triggering_rule_id: row.get(5)?,
        triggering_event_uuid: row.get(6)?,
        agent_id: row.get(7)?,
        block_type: row.get(8)?,
        is_active: row.get::<i64>(9)? == 1,
        blocked_at: parse_rfc3339(&blocked_raw).unwrap_or_else(Utc::now),
        unblock_at: unblock_raw.as_deref().and_then(parse_rfc3339),
        auto_unblock: row.get::<i64>(12)? == 1,
        unblocked_at: unblocked_raw.as_deref().and_then(parse_rfc3339),
        unblock_reason: row.get(14)?,
    })
}
