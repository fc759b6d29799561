// [apps/ingest-server/src/services/mod.rs]
/*!
 * =================================================================
 * APARATO: INGEST SERVICES BARREL (V5.0 - PIPELINE TOPOLOGY)
 * CLASIFICACIÓN: SERVICE LAYER (ESTRATO L3/L4)
 * RESPONSABILIDAD: EXPOSICIÓN DEL PIPELINE Y LOS DAEMONS DE FONDO
 * =================================================================
 */

// --- ESTRATO DE PIPELINE SÍNCRONO (POR PETICIÓN) ---

/// Clasificación de líneas crudas (primera coincidencia gana).
pub mod parser;
/// Geo + reputación con cerrojo por huella y caché TTL.
pub mod enrichment;
/// Línea -> evento -> puntaje compuesto -> decisión.
pub mod pipeline;
/// Emisión de bloqueos y comandos con cerrojo por (ip, agente).
pub mod blocker;

// --- ESTRATO DE DAEMONS DE FONDO ---

/// Barrido de desconexión y retención del Ledger.
pub mod reaper;
/// Liberación automática de bloqueos vencidos.
pub mod unblock_warden;
/// Auditor de paridad borde <-> Ledger.
pub mod reconciler;

pub use blocker::{BlockDecision, BlockingEngine};
pub use enrichment::EnrichmentService;
pub use pipeline::{BatchOutcome, IngestPipeline};
pub use reaper::spawn_reaper;
pub use reconciler::{reconcile_agent, spawn_reconciler};
pub use unblock_warden::spawn_unblock_warden;
