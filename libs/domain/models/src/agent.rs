use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Ciclo de vida administrativo de un centinela en el registro central.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Registrado pero aún sin aprobación del operador.
    Pending,
    /// Aprobado y reportando telemetría de forma nominal.
    Active,
    /// Deshabilitado administrativamente; la identidad no se recicla.
    Inactive,
    /// Sin latido durante 3x el intervalo declarado.
    Disconnected,
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// UUID generado por el servidor en el primer registro.
    pub id: String,

    #[serde(rename = "agent_identifier")]
    pub agent_id: String,

    #[serde(rename = "hostname_identity")]
    pub hostname: String,

    pub display_name: Option<String>,
    pub environment_tag: Option<String>,
    pub version: Option<String>,

    /// Capacidades declaradas por el centinela (JSON crudo del registro).
    pub supported_features: serde_json::Value,

    pub is_approved: bool,
    pub is_active: bool,

    pub status: AgentStatus,
    pub health: AgentHealth,

    #[serde(rename = "heartbeat_interval_seconds")]
    pub heartbeat_interval_sec: u32,

    #[typeshare(serialized_as = "String")]
    pub last_heartbeat_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub registered_at: DateTime<Utc>,
}

/// Biometría instantánea del hospedaje capturada en cada latido.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostMetrics {
    #[serde(rename = "cpu_load_percentage")]
    pub cpu_percent: f32,
    #[serde(rename = "memory_usage_percentage")]
    pub memory_percent: f32,
    #[serde(rename = "disk_usage_percentage")]
    pub disk_percent: f32,
    #[serde(rename = "uptime_seconds")]
    #[typeshare(serialized_as = "number")]
    pub uptime_seconds: u64,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub agent_id: String,
    pub metrics: HostMetrics,
    pub health: AgentHealth,
    #[typeshare(serialized_as = "String")]
    pub received_at: DateTime<Utc>,
}
