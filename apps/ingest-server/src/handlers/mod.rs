// [apps/ingest-server/src/handlers/mod.rs]
//! =================================================================
//! APARATO: HANDLER BARREL (V4.0)
//! RESPONSABILIDAD: ADAPTADORES DE ENTRADA DEL PLANO DE CONTROL
//! =================================================================

/// Registro, latidos e ingesta de lotes de centinelas.
pub mod agents;
/// Sincronía de inventario, sondeo de comandos y resultados.
pub mod firewall;
/// Superficie administrativa mínima del operador.
pub mod admin;

pub use admin::OperatorAdministrationHandler;
pub use agents::SentinelControlHandler;
pub use firewall::FirewallControlHandler;
