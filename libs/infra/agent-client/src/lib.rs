// INICIO DEL ARCHIVO [libs/infra/agent-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: AGENT CLIENT LIBRARY BARREL (V3.1 - EXPORTS LEVEL)
 * CLASIFICACIÓN: INFRASTRUCTURE LIB (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DE MÓDULOS DE UPLINK
 *
 * VISION HIPER-HOLÍSTICA:
 * Centraliza la exportación del cliente de enlace y su catálogo de
 * errores para el consumo en apps/sentinel-agent.
 * =================================================================
 */

pub mod client;
pub mod errors;

pub use client::AgentUplink;
pub use errors::UplinkError;
// FIN DEL ARCHIVO [libs/infra/agent-client/src/lib.rs]
