// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY ACCESS MATRIX (V6.0 - TOPOLOGY MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ORQUESTACIÓN DE SUBSISTEMAS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ACCESS SOVEREIGNTY: Centraliza la visibilidad de los repositorios
 *    tácticos para permitir la inyección de dependencias en el Centro
 *    de Ingesta.
 * 2. SQL CONFINEMENT: Ningún otro estrato del tejido emite SQL; la
 *    política de transacciones y reintentos vive aquí.
 * 3. NOMINAL PARITY: Un repositorio por agregado del dominio.
 * =================================================================
 */

// --- ESTRATO 1: PLANO DE CONTROL (CENTINELAS) ---

/// Registro, aprobación, latidos y barrido de desconexión de centinelas.
pub mod agent_repository;
/// Lotes de líneas crudas con idempotencia por batch_uuid.
pub mod batch_repository;
/// Ledger append-only de eventos de autenticación y ventanas conductuales.
pub mod event_repository;

// --- ESTRATO 2: ENRIQUECIMIENTO Y DETECCIÓN ---

/// Caché de geolocalización y reputación con expiración por familia.
pub mod geo_repository;
/// Catálogo de reglas de bloqueo y siembra de valores por defecto.
pub mod rule_repository;
/// Veredictos del detector híbrido (sidecar ML por evento).
pub mod ml_repository;

// --- ESTRATO 3: CICLO DE VIDA DE BLOQUEOS Y MANDO ---

/// Registro de bloqueos con invariante de fila activa única.
pub mod block_repository;
/// Cola de comandos de borde con ciclo de vida monótono.
pub mod command_repository;
/// Espejo del inventario de cortafuegos de cada centinela (swap atómico).
pub mod ufw_state_repository;
/// Eventos ban/unban reportados por fail2ban en el borde.
pub mod fail2ban_repository;

// --- ESTRATO 4: GOBERNANZA ---

/// Ajustes de runtime (pesos del detector, umbrales, catálogos).
pub mod settings_repository;

// --- RE-EXPORTACIONES SOBERANAS (NOMINAL ACCESS API) ---

pub use agent_repository::{AgentRepository, RegistrationOutcome};
pub use batch_repository::BatchRepository;
pub use block_repository::{BlockInsertOutcome, BlockRepository};
pub use command_repository::{CommandRepository, ResultIngestOutcome};
pub use event_repository::EventRepository;
pub use fail2ban_repository::Fail2banRepository;
pub use geo_repository::GeoRepository;
pub use ml_repository::MlRepository;
pub use rule_repository::RuleRepository;
pub use settings_repository::SettingsRepository;
pub use ufw_state_repository::UfwStateRepository;
