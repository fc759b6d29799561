// [apps/ingest-server/src/services/unblock_warden.rs]
/**
 * =================================================================
 * APARATO: UNBLOCK WARDEN SERVICE (V7.0 - WINDOW EXPIRY)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: LIBERACIÓN AUTOMÁTICA DE BLOQUEOS VENCIDOS
 *
 * # Logic:
 * Barre ip_blocks con is_active=1, auto_unblock=1 y unblock_at
 * vencido; desactiva la fila, encola 'delete_deny_from' hacia el
 * centinela y agrega la acción 'unblock' al rastro de auditoría.
 * =================================================================
 */

use crate::state::AppState;
use chrono::Utc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

/// Cadencia del barrido de desbloqueo.
const WARDEN_CYCLE_SECONDS: u64 = 30;

pub async fn spawn_unblock_warden(application_state: AppState) {
    let mut expiry_ticker = interval(Duration::from_secs(WARDEN_CYCLE_SECONDS));

    tokio::spawn(async move {
        info!("🗝️ [WARDEN_ACTIVE]: Unblock expiry daemon initiated.");

        loop {
            expiry_ticker.tick().await;
            let now = Utc::now();

            let due_blocks = match application_state.block_repository.due_for_unblock(now).await {
                Ok(due_blocks) => due_blocks,
                Err(sweep_fault) => {
                    warn!("🗝️ [WARDEN_BYPASS]: Expiry sweep failed: {}", sweep_fault);
                    continue;
                }
            };

            for expired_block in due_blocks {
                match application_state
                    .blocker
                    .release_block(&expired_block, "guardian-warden", "block window expired", now)
                    .await
                {
                    Ok(_) => info!(
                        "🗝️ [WARDEN_RELEASE]: IP [{}] released from agent [{:?}].",
                        expired_block.ip, expired_block.agent_id
                    ),
                    Err(release_fault) => {
                        warn!("🗝️ [WARDEN_BYPASS]: Release of [{}] failed: {}", expired_block.ip, release_fault)
                    }
                }
            }
        }
    });
}
