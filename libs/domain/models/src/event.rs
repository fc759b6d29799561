// [libs/domain/models/src/event.rs]
/*!
 * =================================================================
 * APARATO: AUTH EVENT DOMAIN MODELS (V14.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO SOBERANO DE EVENTOS DE AUTENTICACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. IMMUTABILITY SEAL: Un AuthEvent es inmutable una vez escrito; el
 *    'event_uuid' actúa como llave de deduplicación en el Ledger.
 * 2. SOURCE EXCLUSIVITY: Exactamente uno de {agent, simulation_run}
 *    está presente en cada evento, nunca ambos.
 * 3. DROP SEMANTICS: Las líneas no reconocidas se descartan aguas
 *    arriba; no existe la variante 'invalid'.
 * 4. TYPESHARE SYNERGY: Paridad de contrato con el Dashboard externo.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Failed,
    Successful,
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    Publickey,
}

/// Origen del evento: telemetría real de un centinela o corrida sintética.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Agent,
    Simulation,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthEvent {
    /// Llave de deduplicación RFC-4122.
    pub event_uuid: String,

    #[typeshare(serialized_as = "String")]
    pub timestamp: DateTime<Utc>,

    pub source_type: SourceType,

    /// Referencia débil al centinela emisor (SET NULL al decomisar).
    pub agent_id: Option<String>,

    /// Identificador de la corrida sintética cuando source_type=Simulation.
    pub simulation_run_id: Option<String>,

    pub event_type: EventType,
    pub auth_method: AuthMethod,

    #[serde(rename = "source_ip_address")]
    pub source_ip: String,

    pub target_username: String,
    pub target_port: Option<u16>,

    /// Motivo de fallo enriquecido por el parser (ej. 'invalid_user').
    pub failure_reason: Option<String>,

    pub raw_line: String,
}

/// Veredicto del detector híbrido adjunto a un evento (sidecar ML).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlAssessment {
    pub event_uuid: String,
    pub model_identifier: String,

    /// Riesgo normalizado del ensamble de anomalías (0.0 - 1.0).
    pub risk_score: f64,

    pub threat_type: Option<String>,
    pub confidence: f64,
    pub is_anomaly: bool,

    /// Instantánea bit-perfecta del vector de características evaluado.
    pub features_snapshot: serde_json::Value,

    #[serde(rename = "inference_latency_milliseconds")]
    pub inference_latency_ms: f64,

    pub operator_feedback: Option<String>,
    pub resulted_in_block: bool,
}
