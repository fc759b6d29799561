// [libs/domain/models/src/firewall.rs]
/*!
 * =================================================================
 * APARATO: FIREWALL DOMAIN CONTRACT (V31.0 - TAGGED DISPATCH)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO SOBERANO DE INVENTARIO Y MANDO DE BORDE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAGGED UNION DISPATCH: El tipo de comando es una unión discriminada
 *    serde ('action' + 'params'); las variantes desconocidas se rechazan
 *    en la frontera de deserialización, jamás en el despachador.
 * 2. MONOTONE LIFECYCLE: Los comandos avanzan pending -> sent ->
 *    (completed | failed) sin transiciones retrógradas.
 * 3. ATOMIC SWAP MIRROR: El inventario UFW se reemplaza completo por
 *    sincronización; nunca se fusiona.
 * 4. TYPESHARE SYNERGY: Paridad de contrato con el Dashboard externo.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDirection {
    Incoming,
    Outgoing,
    Routed,
}

impl PolicyDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDirection::Incoming => "incoming",
            PolicyDirection::Outgoing => "outgoing",
            PolicyDirection::Routed => "routed",
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    Allow,
    Deny,
    Reject,
}

impl DefaultPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultPolicy::Allow => "allow",
            DefaultPolicy::Deny => "deny",
            DefaultPolicy::Reject => "reject",
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingLevel {
    Off,
    Low,
    Medium,
    High,
    Full,
}

impl LoggingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Off => "off",
            LoggingLevel::Low => "low",
            LoggingLevel::Medium => "medium",
            LoggingLevel::High => "high",
            LoggingLevel::Full => "full",
        }
    }
}

fn default_tcp() -> Protocol {
    Protocol::Tcp
}

/// Unión discriminada de instrucciones de cortafuegos ejecutables en el borde.
///
/// La deserialización rechaza cualquier 'action' fuera de este catálogo.
#[typeshare]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum FirewallAction {
    Allow {
        port: u16,
        protocol: Option<Protocol>,
        from_ip: Option<String>,
    },
    /// Al menos uno de {port, from_ip} es obligatorio (validado al despachar).
    Deny {
        port: Option<u16>,
        protocol: Option<Protocol>,
        from_ip: Option<String>,
    },
    Reject {
        port: u16,
        protocol: Option<Protocol>,
    },
    Limit {
        port: u16,
        #[serde(default = "default_tcp")]
        protocol: Protocol,
    },
    Delete {
        rule_number: u32,
    },
    DeleteByRule {
        action: String,
        port: Option<u16>,
        protocol: Option<Protocol>,
        from_ip: Option<String>,
    },
    Enable,
    Disable,
    Reset,
    Reload,
    Default {
        direction: PolicyDirection,
        policy: DefaultPolicy,
    },
    Logging {
        level: LoggingLevel,
    },
    /// Reordenamiento atómico en dos pasos; el fallo del paso 2 se
    /// reporta tal cual como resultado parcial.
    Reorder {
        delete_cmd: String,
        insert_cmd: String,
        from_index: u32,
        to_index: u32,
    },
    DenyFrom {
        ip: String,
        block_id: Option<String>,
    },
    DeleteDenyFrom {
        ip: String,
        block_id: Option<String>,
    },
    /// Escotilla de escape del operador; el payload DEBE comenzar con el
    /// nombre del ejecutable del cortafuegos.
    Raw {
        command: String,
    },
}

#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Sent,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Sent => "sent",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }
}

/// Instrucción tal como viaja al centinela en la respuesta de sondeo.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDirective {
    #[serde(rename = "id")]
    pub command_uuid: String,

    #[serde(flatten)]
    pub action: FirewallAction,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Fila persistida de un comando de borde (una por instrucción saliente).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfwCommandRecord {
    pub command_uuid: String,
    pub agent_id: String,
    pub action: FirewallAction,
    /// Representación plana para auditoría del operador.
    pub raw_command: String,
    pub status: CommandStatus,
    pub result_message: Option<String>,
    pub created_by: String,
    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
    #[typeshare(serialized_as = "String")]
    pub sent_at: Option<DateTime<Utc>>,
    #[typeshare(serialized_as = "String")]
    pub executed_at: Option<DateTime<Utc>>,
}

// --- INVENTARIO DE BORDE ---

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfwStatusSnapshot {
    /// active | inactive | not_installed
    pub status: String,
    pub default_incoming: Option<String>,
    pub default_outgoing: Option<String>,
    pub default_routed: Option<String>,
    pub logging_level: Option<String>,
    pub ipv6_enabled: bool,
    pub version: Option<String>,
    #[typeshare(serialized_as = "number")]
    pub rules_count: u32,
}

/// Regla numerada 1..N en el mismo orden que la presenta el cortafuegos.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UfwRuleEntry {
    #[typeshare(serialized_as = "number")]
    pub position: u32,
    pub raw_text: String,
    pub action: Option<String>,
    pub direction: Option<String>,
    pub from_source: Option<String>,
    pub to_destination: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningPortEntry {
    pub port: u16,
    pub protocol: Protocol,
    #[typeshare(serialized_as = "number")]
    pub process_id: Option<u32>,
    pub process_name: Option<String>,
    /// Marcado cuando el puerto pertenece al set de servicios protegidos.
    pub is_protected: bool,
    pub service_label: Option<String>,
}

/// Documento completo de inventario empujado por el centinela.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallInventory {
    pub status: UfwStatusSnapshot,
    pub rules: Vec<UfwRuleEntry>,
    pub listening_ports: Vec<ListeningPortEntry>,
    #[typeshare(serialized_as = "number[]")]
    pub protected_ports: Vec<u16>,
    #[typeshare(serialized_as = "String")]
    pub collected_at: DateTime<Utc>,
}
