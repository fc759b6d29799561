// [apps/sentinel-agent/src/firewall/mod.rs]
/*!
 * =================================================================
 * APARATO: FIREWALL CAPABILITY BOUNDARY (V8.0 - ADAPTER SEAM)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: COSTURA DE CAPACIDAD {inventory, execute}
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CAPABILITY SEAM: El resto del centinela solo conoce la costura
 *    {inventory(), execute(cmd) -> (ok, msg)}; el adaptador concreto
 *    se selecciona en el arranque.
 * 2. PROTECTED SERVICES: Catálogo fijo (puerto -> servicio) para que
 *    la superficie del operador rechace bloqueos peligrosos; SSH y el
 *    puerto del Dashboard como mínimo obligatorio.
 * =================================================================
 */

pub mod sockets;
pub mod ufw;

use guardian_domain_models::firewall::{FirewallAction, FirewallInventory};
use thiserror::Error;

/// Catálogo fijo de servicios protegidos (puerto -> etiqueta).
pub const PROTECTED_SERVICES: &[(u16, &str)] = &[
    (22, "ssh"),
    (80, "http"),
    (443, "https"),
    (3306, "mysql"),
    (5432, "postgresql"),
    (6379, "redis"),
    (27017, "mongodb"),
    (8000, "guardian-dashboard"),
];

pub fn protected_service_label(port: u16) -> Option<&'static str> {
    PROTECTED_SERVICES
        .iter()
        .find(|(protected_port, _)| *protected_port == port)
        .map(|(_, label)| *label)
}

#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("FIREWALL_ABSENT: executable not found at {0}")]
    BinaryAbsent(String),

    #[error("SUBPROCESS_FAULT: {0}")]
    SubprocessFault(#[from] std::io::Error),

    #[error("INVENTORY_PARSE_FAULT: {0}")]
    ParseFault(String),

    #[error("DIRECTIVE_REJECTED: {0}")]
    DirectiveRejected(String),
}

/**
 * Costura de capacidad del cortafuegos del hospedaje.
 *
 * 'execute' retorna siempre (éxito, mensaje): los timeouts se reportan
 * como fallo con el mensaje 'Command timed out', jamás como pánico.
 */
pub trait FirewallAdapter: Send + Sync {
    fn inventory(
        &self,
    ) -> impl std::future::Future<Output = Result<FirewallInventory, FirewallError>> + Send;

    fn execute(
        &self,
        directive: &FirewallAction,
    ) -> impl std::future::Future<Output = (bool, String)> + Send;
}
