// [apps/sentinel-agent/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL LIBRARY ROOT (V4.0 - SOVEREIGN AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 * =================================================================
 */

/// Registro de configuración: archivo JSON < SSH_GUARDIAN_* < defaults.
pub mod config;
/// Persistencia del token de posición del vigía (inode + offset).
pub mod state;
/// Vigía incremental del log de autenticación (rotación + truncamiento).
pub mod tailer;
/// Adaptador de cortafuegos: inventario + ejecución de directivas.
pub mod firewall;
/// Biometría instantánea del hospedaje (CPU, memoria, disco, uptime).
pub mod metrics;
/// El bucle cooperativo único que coordina todos los componentes.
pub mod reporter;
/// Gestión del servicio systemd (install/start/stop/logs/update).
pub mod service;
/// Chequeos de salud del centinela (el código de salida es el conteo).
pub mod health;
