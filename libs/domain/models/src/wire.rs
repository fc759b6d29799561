// [libs/domain/models/src/wire.rs]
/*!
 * =================================================================
 * APARATO: WIRE PROTOCOL ENVELOPES (V19.0 - CONTRACT SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRES JSON DEL PLANO DE CONTROL CENTINELA<->CENTRO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IDEMPOTENCY KEYS: Todo sobre porta su UUID RFC-4122 relevante como
 *    llave de idempotencia (batch_uuid, command_id, event_uuid).
 * 2. STABLE ERROR ENVELOPE: Los fallos viajan como {success:false, error}
 *    sin filtración de stack traces.
 * 3. ISO-8601 ONLY: Todas las marcas temporales del protocolo son
 *    RFC-3339 sobre chrono::DateTime<Utc>.
 * =================================================================
 */

use crate::agent::{AgentHealth, HostMetrics};
use crate::firewall::{CommandDirective, FirewallInventory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub hostname: String,
    /// Inventario declarativo del hospedaje (OS, kernel, features).
    pub system_info: serde_json::Value,
    pub version: String,
    #[typeshare(serialized_as = "number")]
    pub heartbeat_interval_sec: u32,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    /// Solo presente en el primer registro (única transmisión en claro).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    pub metrics: HostMetrics,
    pub status: String,
    pub health_status: AgentHealth,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatchRequest {
    pub batch_uuid: String,
    pub agent_id: String,
    pub hostname: String,
    pub log_lines: Vec<String>,
    #[typeshare(serialized_as = "number")]
    pub batch_size: u32,
    pub source_filename: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatchResponse {
    pub success: bool,
    #[typeshare(serialized_as = "number")]
    pub events_created: u32,
    #[typeshare(serialized_as = "number")]
    pub events_failed: u32,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfwSyncRequest {
    pub agent_id: String,
    pub hostname: String,
    pub ufw_data: FirewallInventory,
    #[typeshare(serialized_as = "String")]
    pub submitted_at: DateTime<Utc>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfwSyncResponse {
    pub success: bool,
    #[typeshare(serialized_as = "number")]
    pub rules_count: u32,
    pub ufw_status: String,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCommandsResponse {
    pub commands: Vec<CommandDirective>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResultReport {
    pub agent_id: String,
    pub command_id: String,
    pub success: bool,
    pub message: String,
    #[typeshare(serialized_as = "String")]
    pub executed_at: DateTime<Utc>,
}

/// Sobre estable de error para cualquier endpoint del plano de control.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self { success: false, error: error.into() }
    }
}
