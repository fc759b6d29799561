// [apps/ingest-server/src/lib.rs]
/*!
 * =================================================================
 * APARATO: INGEST SERVER LIBRARY ROOT (V5.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY HARDENING: Autoridad única de módulos para que
 *    'crate::' se resuelva de forma determinista en librería y binario.
 * 2. PUBLIC INTERFACE: Expone 'prelude' para la ignición mínima del
 *    Kernel desde 'main.rs' y desde las suites de certificación.
 * =================================================================
 */

// --- ESTRATO DE CONFIGURACIÓN Y ARRANQUE ---
/// Registro de configuración cargado una sola vez e inyectado.
pub mod config;
/// Núcleo de mando para la ignición de daemons y transporte HTTP.
pub mod kernel;

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Placa base neural: repositorios, cerrojos por llave y bus de mando.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para ráfagas HTTP del plano de control.
pub mod handlers;
/// Topología de rutas del plano de control y administración.
pub mod routes;

// --- ESTRATO DE SEGURIDAD Y SERVICIOS ---
/// Guardianes perimetrales de autenticación de centinelas y operador.
pub mod middleware;
/// Pipeline de ingesta, enriquecimiento, bloqueo y daemons de fondo.
pub mod services;

/**
 * PRELUDIO DEL CENTRO DE INGESTA
 *
 * Re-exportación estratégica de los componentes de ignición mínima.
 */
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::kernel::IngestKernel;
    pub use crate::state::AppState;
}
