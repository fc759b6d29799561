use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Received,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Received => "received",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Lote de líneas crudas sometido en una sola llamada (dedup por UUID).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatchRecord {
    pub batch_uuid: String,
    pub agent_id: String,
    pub hostname: String,
    pub source_filename: Option<String>,

    /// Conteo declarado por el centinela al someter.
    #[typeshare(serialized_as = "number")]
    pub declared_count: u32,

    /// Eventos realmente cristalizados tras el parseo.
    #[typeshare(serialized_as = "number")]
    pub events_created: u32,
    #[typeshare(serialized_as = "number")]
    pub events_failed: u32,

    pub status: BatchStatus,
    pub failure_reason: Option<String>,

    #[typeshare(serialized_as = "String")]
    pub received_at: DateTime<Utc>,
    #[typeshare(serialized_as = "String")]
    pub completed_at: Option<DateTime<Utc>>,
}
