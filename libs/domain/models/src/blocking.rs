// [libs/domain/models/src/blocking.rs]
/*!
 * =================================================================
 * APARATO: BLOCKING DOMAIN MODELS (V22.0 - LIFECYCLE SEALED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DEL CICLO DE VIDA DE BLOQUEOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE ACTIVE INVARIANT: A lo sumo una fila 'is_active=true' por
 *    par (ip, agente) en cualquier instante.
 * 2. ACTION JOIN KEY: Cada transición porta el mismo UUID que el
 *    comando emitido, resolviendo el ciclo block<->command<->action
 *    mediante filas append-only indexables.
 * 3. AUDIT RETENTION: Las reglas deshabilitadas jamás disparan pero
 *    se retienen para auditoría.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Origen de un bloqueo en el registro central.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    Manual,
    Rule,
    Ml,
    Api,
    Fail2ban,
    /// Regla observada en el borde sin contraparte central (reconciliación).
    Ufw,
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Threshold,
    Pattern,
    Geo,
    TimeBased,
    Ml,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingRuleRecord {
    pub id: String,
    pub name: String,
    pub rule_type: RuleKind,

    /// Menor valor gana en empates cuando la semántica de emisión difiere.
    pub priority: i32,

    pub enabled: bool,

    /// Árbol de condiciones evaluado contra el evento y sus ventanas.
    pub conditions: serde_json::Value,

    /// Severidad 0-100 que aporta la regla al puntaje compuesto.
    pub severity: u8,

    #[serde(rename = "block_duration_minutes")]
    #[typeshare(serialized_as = "number")]
    pub block_duration_minutes: Option<i64>,

    /// None en duración => bloqueo permanente.
    pub auto_unblock: bool,

    pub notification_channels: serde_json::Value,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpBlockRecord {
    pub id: String,

    #[serde(rename = "ip_address")]
    pub ip: String,
    pub cidr_range: Option<String>,

    pub reason: String,
    pub source: BlockSource,

    pub triggering_rule_id: Option<String>,
    pub triggering_event_uuid: Option<String>,

    /// Referencia débil al centinela objetivo (SET NULL al decomisar).
    pub agent_id: Option<String>,

    pub block_type: Option<String>,
    pub is_active: bool,

    #[typeshare(serialized_as = "String")]
    pub blocked_at: DateTime<Utc>,

    /// None => permanente.
    #[typeshare(serialized_as = "String")]
    pub unblock_at: Option<DateTime<Utc>>,

    pub auto_unblock: bool,

    #[typeshare(serialized_as = "String")]
    pub unblocked_at: Option<DateTime<Utc>>,
    pub unblock_reason: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockActionKind {
    Block,
    Unblock,
    Extend,
    Modify,
}

/// Auditoría append-only de cada transición de bloqueo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingActionRecord {
    /// Mismo UUID que el comando emitido al borde (join-back).
    pub action_uuid: String,
    pub block_id: String,
    pub kind: BlockActionKind,
    pub performed_by: String,
    pub reason: Option<String>,
    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fail2banEventRecord {
    pub id: String,
    pub agent_id: Option<String>,
    #[serde(rename = "ip_address")]
    pub ip: String,
    pub jail: String,
    /// true = ban, false = unban.
    pub is_ban: bool,
    pub raw_line: String,
    #[typeshare(serialized_as = "String")]
    pub observed_at: DateTime<Utc>,
}
