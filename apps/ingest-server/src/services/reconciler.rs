// [apps/ingest-server/src/services/reconciler.rs]
/*!
 * =================================================================
 * APARATO: EDGE PARITY RECONCILER (V11.0 - GROUND TRUTH AUDIT)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: PARIDAD ip_blocks <-> REALIDAD DEL BORDE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. EDGE WINS GENESIS: Una regla deny observada en el borde sin
 *    bloqueo central activo engendra un IPBlock 'source=ufw' de tipo
 *    'reconciled' (sin emisión de comando: ya existe en el borde).
 * 2. LEDGER WINS RE-EMIT: Un bloqueo activo ausente en el borde
 *    re-encola el comando deny si el último intento tiene >= 5 min;
 *    la desactivación queda en manos del operador.
 * 3. ON DEMAND + PERIODIC: El operador puede disparar la auditoría
 *    por centinela; el daemon la ejecuta para toda la flota.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{Duration as ChronoDuration, Utc};
use guardian_domain_models::blocking::BlockSource;
use guardian_domain_models::firewall::FirewallAction;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Cadencia del auditor de paridad para toda la flota.
const RECONCILER_CYCLE_SECONDS: u64 = 300;
/// Edad mínima del último intento antes de re-encolar el deny.
const REDELIVERY_MIN_AGE_MINUTES: i64 = 5;

/// Resumen de una pasada de reconciliación sobre un centinela.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub adopted_from_edge: u32,
    pub redelivered_to_edge: u32,
}

pub async fn spawn_reconciler(application_state: AppState) {
    let mut parity_ticker = interval(Duration::from_secs(RECONCILER_CYCLE_SECONDS));

    tokio::spawn(async move {
        info!("🧭 [RECONCILER_ACTIVE]: Edge parity auditor initiated.");

        loop {
            parity_ticker.tick().await;

            let fleet = match application_state.agent_repository.list().await {
                Ok(fleet) => fleet,
                Err(registry_fault) => {
                    warn!("🧭 [RECONCILER_BYPASS]: Fleet listing failed: {}", registry_fault);
                    continue;
                }
            };

            for sentinel in fleet.iter().filter(|record| record.is_approved && record.is_active) {
                match reconcile_agent(&application_state, &sentinel.agent_id).await {
                    Ok(summary)
                        if summary.adopted_from_edge > 0 || summary.redelivered_to_edge > 0 =>
                    {
                        info!(
                            "🧭 [RECONCILED]: Agent [{}]: {} adopted, {} redelivered.",
                            sentinel.agent_id, summary.adopted_from_edge, summary.redelivered_to_edge
                        );
                    }
                    Ok(_) => {}
                    Err(parity_fault) => warn!(
                        "🧭 [RECONCILER_BYPASS]: Agent [{}] audit failed: {}",
                        sentinel.agent_id, parity_fault
                    ),
                }
            }
        }
    });
}

/**
 * Audita la paridad de un centinela contra su último inventario.
 */
#[instrument(skip(state))]
pub async fn reconcile_agent(state: &AppState, agent_id: &str) -> anyhow::Result<ReconcileSummary> {
    let now = Utc::now();
    let mut summary = ReconcileSummary::default();

    let edge_denied: HashSet<String> =
        state.ufw_state_repository.denied_sources(agent_id).await?.into_iter().collect();
    let central_blocks = state.block_repository.active_for_agent(agent_id).await?;
    let central_ips: HashSet<String> =
        central_blocks.iter().map(|block| block.ip.clone()).collect();

    // 1. EL BORDE TIENE REGLA, EL LEDGER NO: adopción como 'reconciled'.
    for orphan_ip in edge_denied.difference(&central_ips) {
        let adoption = state
            .blocker
            .emit_block(
                orphan_ip,
                agent_id,
                BlockSource::Ufw,
                "deny rule observed at edge without central block".to_string(),
                None,
                None,
                None,
                false,
                now,
            )
            .await?;

        if let crate::services::blocker::BlockDecision::Blocked { block_id, .. } = adoption {
            // Sello del tipo reconciliado para la superficie del operador.
            state.block_repository.set_block_type(&block_id, "reconciled").await?;
            summary.adopted_from_edge += 1;
        }
    }

    // 2. EL LEDGER TIENE BLOQUEO, EL BORDE NO: re-entrega acotada.
    for standing_block in central_blocks.iter().filter(|block| !edge_denied.contains(&block.ip)) {
        let last_attempt = state.command_repository.latest_deny_from(agent_id, &standing_block.ip).await?;

        let attempt_is_stale = match &last_attempt {
            Some(command) => now - command.created_at >= ChronoDuration::minutes(REDELIVERY_MIN_AGE_MINUTES),
            None => true,
        };

        if !attempt_is_stale {
            continue;
        }

        let command_uuid = Uuid::new_v4().to_string();
        let deny_action = FirewallAction::DenyFrom {
            ip: standing_block.ip.clone(),
            block_id: Some(standing_block.id.clone()),
        };
        state
            .command_repository
            .enqueue(
                &command_uuid,
                agent_id,
                &deny_action,
                &format!("ufw deny from {}", standing_block.ip),
                "guardian-reconciler",
                now,
            )
            .await?;
        state.command_wakeups.signal(agent_id).await;
        summary.redelivered_to_edge += 1;
    }

    Ok(summary)
}
