// [libs/infra/db/src/repositories/batch_repository.rs]
/*!
 * =================================================================
 * APARATO: LOG BATCH REPOSITORY (V8.0 - REPLAY SHIELD)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: IDEMPOTENCIA DE LOTES Y CONTRA-PRESIÓN POR CENTINELA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. REPLAY SHIELD: La segunda llegada de un batch_uuid completado
 *    retorna los conteos almacenados del primer procesamiento, jamás
 *    reprocesa.
 * 2. LIFECYCLE: received -> processing -> (completed | failed) con
 *    conteos de eventos cristalizados.
 * 3. RETENTION: Los lotes se retienen 30 días antes de la poda.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::agent_repository::parse_rfc3339;
use crate::DbClient;
use chrono::{DateTime, Utc};
use guardian_domain_models::batch::{BatchStatus, LogBatchRecord};
use guardian_domain_models::wire::LogBatchRequest;
use libsql::{params, Row};
use tracing::{info, instrument};

pub struct BatchRepository {
    database_client: DbClient,
}

impl BatchRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    pub async fn find(&self, batch_uuid: &str) -> Result<Option<LogBatchRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                &format!("SELECT {BATCH_COLUMNS} FROM agent_log_batches WHERE batch_uuid = ?1"),
                params![batch_uuid.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(row) => Ok(Some(map_batch_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Cristaliza la fila de lote en estado 'received'.
    #[instrument(skip(self, request), fields(batch = %request.batch_uuid))]
    pub async fn create_received(
        &self,
        request: &LogBatchRequest,
        received_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT INTO agent_log_batches
                   (batch_uuid, agent_id, hostname, source_filename, declared_count, status, received_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, 'received', ?6)"#,
                params![
                    request.batch_uuid.clone(),
                    request.agent_id.clone(),
                    request.hostname.clone(),
                    request.source_filename.clone(),
                    request.log_lines.len() as i64,
                    received_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_processing(&self, batch_uuid: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agent_log_batches SET status = 'processing' WHERE batch_uuid = ?1",
                params![batch_uuid.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Sella el lote con los conteos definitivos del parseo.
    #[instrument(skip(self))]
    pub async fn finalize_completed(
        &self,
        batch_uuid: &str,
        events_created: u32,
        events_failed: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE agent_log_batches
                   SET status = 'completed', events_created = ?1, events_failed = ?2, completed_at = ?3
                   WHERE batch_uuid = ?4"#,
                params![
                    events_created as i64,
                    events_failed as i64,
                    completed_at.to_rfc3339(),
                    batch_uuid.to_string()
                ],
            )
            .await?;

        info!(
            "📦 [BATCH_SEALED]: Batch [{}] completed ({} created / {} failed).",
            batch_uuid, events_created, events_failed
        );
        Ok(())
    }

    pub async fn finalize_failed(&self, batch_uuid: &str, reason: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"UPDATE agent_log_batches
                   SET status = 'failed', failure_reason = ?1, completed_at = ?2
                   WHERE batch_uuid = ?3"#,
                params![reason.to_string(), Utc::now().to_rfc3339(), batch_uuid.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Lotes en vuelo por centinela (cota de contra-presión).
    pub async fn count_in_flight(&self, agent_id: &str) -> Result<u32, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                "SELECT COUNT(*) FROM agent_log_batches
                 WHERE agent_id = ?1 AND status IN ('received', 'processing')",
                params![agent_id.to_string()],
            )
            .await?;

        let in_flight = match query_result.next().await? {
            Some(row) => row.get::<i64>(0)? as u32,
            None => 0,
        };
        Ok(in_flight)
    }

    /// Poda de lotes más antiguos que el corte de retención (30 días).
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let purged = connection
            .execute(
                "DELETE FROM agent_log_batches WHERE received_at < ?1 AND status IN ('completed', 'failed')",
                params![cutoff.to_rfc3339()],
            )
            .await?;
        Ok(purged)
    }
}

const BATCH_COLUMNS: &str = "batch_uuid, agent_id, hostname, source_filename, declared_count, \
     events_created, events_failed, status, failure_reason, received_at, completed_at";

fn map_batch_row(row: &Row) -> Result<LogBatchRecord, DbError> {
    let status_label: String = row.get(7)?;
    let received_raw: String = row.get(9)?;
    let completed_raw: Option<String> = row.get(10)?;

    Ok(LogBatchRecord {
        batch_uuid: row.get(0)?,
        agent_id: row.get(1)?,
        hostname: row.get(2)?,
        source_filename: row.get(3)?,
        declared_count: row.get::<i64>(4)? as u32,
        events_created: row.get::<i64>(5)? as u32,
        events_failed: row.get::<i64>(6)? as u32,
        status: match status_label.as_str() {
            "processing" => BatchStatus::Processing,
            "completed" => BatchStatus::Completed,
            "failed" => BatchStatus::Failed,
            _ => BatchStatus::Received,
        },
        failure_reason: row.get(8)?,
        received_at: parse_rfc3339(&received_raw).unwrap_or_else(Utc::now),
        completed_at: completed_raw.as_deref().and_then(parse_rfc3339),
    })
}
