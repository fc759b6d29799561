// [apps/ingest-server/src/services/reaper.rs]
/**
 * =================================================================
 * APARATO: THE REAPER SYSTEM SERVICE (V9.0 - HYGIENE HARDENED)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: BARRIDO DE DESCONEXIÓN Y RETENCIÓN DEL LEDGER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DISCONNECT SWEEP: Centinelas sin latido durante 3x su intervalo
 *    transitan a 'disconnected' en cada ciclo.
 * 2. RETENTION POLICY: Latidos 7 días, lotes 30 días, filas de
 *    enriquecimiento hasta su expiración total.
 * 3. ATOMICITY: La purga jamás interrumpe la telemetría activa.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

/// Cadencia del daemon de higiene.
const REAPER_CYCLE_SECONDS: u64 = 60;
/// Retención de latidos (días).
const HEARTBEAT_RETENTION_DAYS: i64 = 7;
/// Retención de lotes sellados (días).
const BATCH_RETENTION_DAYS: i64 = 30;

/**
 * Inicia el servicio de limpieza perpetua en el runtime de Tokio.
 */
pub async fn spawn_reaper(application_state: AppState) {
    let mut maintenance_ticker = interval(Duration::from_secs(REAPER_CYCLE_SECONDS));

    tokio::spawn(async move {
        info!("💀 [REAPER_ACTIVE]: Infrastructure hygiene daemon initiated.");

        loop {
            maintenance_ticker.tick().await;
            let now = Utc::now();

            // 1. BARRIDO DE DESCONEXIÓN (latidos silenciosos)
            match application_state.agent_repository.sweep_disconnected(now).await {
                Ok(disconnected_count) if disconnected_count > 0 => {
                    warn!("🔕 [REAPER_SWEEP]: {} sentinels marked disconnected.", disconnected_count);
                }
                Ok(_) => {}
                Err(sweep_fault) => warn!("💀 [REAPER_BYPASS]: Disconnect sweep failed: {}", sweep_fault),
            }

            // 2. RETENCIÓN DE LATIDOS (7 días)
            let heartbeat_cutoff = now - ChronoDuration::days(HEARTBEAT_RETENTION_DAYS);
            match application_state.agent_repository.prune_heartbeats(heartbeat_cutoff).await {
                Ok(purged) if purged > 0 => {
                    info!("💀 [REAPER_CLEANUP]: Evicted {} stale heartbeat rows.", purged);
                }
                Ok(_) => {}
                Err(prune_fault) => warn!("💀 [REAPER_BYPASS]: Heartbeat prune failed: {}", prune_fault),
            }

            // 3. RETENCIÓN DE LOTES (30 días)
            let batch_cutoff = now - ChronoDuration::days(BATCH_RETENTION_DAYS);
            match application_state.batch_repository.prune_older_than(batch_cutoff).await {
                Ok(purged) if purged > 0 => {
                    info!("💀 [REAPER_CLEANUP]: Evicted {} sealed batch rows.", purged);
                }
                Ok(_) => {}
                Err(prune_fault) => warn!("💀 [REAPER_BYPASS]: Batch prune failed: {}", prune_fault),
            }

            // 4. FILAS DE ENRIQUECIMIENTO TOTALMENTE EXPIRADAS
            match application_state.geo_repository.prune_expired(now).await {
                Ok(purged) if purged > 0 => {
                    info!("💀 [REAPER_CLEANUP]: Evicted {} expired enrichment rows.", purged);
                }
                Ok(_) => {}
                Err(prune_fault) => warn!("💀 [REAPER_BYPASS]: Enrichment prune failed: {}", prune_fault),
            }
        }
    });
}
