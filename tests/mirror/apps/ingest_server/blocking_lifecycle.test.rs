// [tests/mirror/apps/ingest_server/blocking_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO DE VIDA DE BLOQUEOS (V5.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: EMISIÓN ÚNICA, EXTENSIÓN Y LIBERACIÓN AUDITADA
 *
 * # Mathematical Proof (Emission Gate):
 * El cerrojo por (ip, agente) serializa las rutas de emisión: bajo
 * concurrencia real, exactamente un emisor sella el bloqueo y el otro
 * observa 'AlreadyBlocked' sin segundo comando.
 * =================================================================
 */

use guardian_domain_models::blocking::{BlockActionKind, BlockSource};
use guardian_domain_models::firewall::FirewallAction;
use guardian_ingest_server::prelude::*;
use guardian_ingest_server::services::BlockDecision;
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};
use std::sync::Arc;

async fn ignite_state(memory_label: &str) -> AppState {
    let database_url = format!("file:{memory_label}?mode=memory&cache=shared");
    let database_client = DbClient::connect(&database_url, None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
    let state = AppState::new(database_client, ServerConfig::for_tests(&database_url));
    state.settings_repository.seed_defaults().await.expect("settings seed");
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Dos emisores concurrentes, un solo bloqueo y un
     * solo comando deny_from.
     */
    #[tokio::test]
    async fn certify_concurrent_emission_single_block_single_command() {
        println!("\n⚔️ [INICIO]: Auditoría de Emisión Concurrente V5.0...");
        let state = ignite_state("mem_life_race").await;
        let now = Utc::now();

        let blocker_alpha = Arc::clone(&state.blocker);
        let blocker_beta = Arc::clone(&state.blocker);
        let window = Some(now + Duration::minutes(60));

        let emit = |blocker: Arc<guardian_ingest_server::services::BlockingEngine>| async move {
            blocker
                .emit_block(
                    "198.51.100.44",
                    "sentinel-race",
                    BlockSource::Rule,
                    "concurrent certification".to_string(),
                    None,
                    None,
                    window,
                    true,
                    now,
                )
                .await
                .expect("emission path")
        };

        let (outcome_alpha, outcome_beta) =
            tokio::join!(emit(blocker_alpha), emit(blocker_beta));

        let outcomes = [outcome_alpha, outcome_beta];
        let blocked_count = outcomes
            .iter()
            .filter(|decision| matches!(decision, BlockDecision::Blocked { .. }))
            .count();
        let observed_count = outcomes
            .iter()
            .filter(|decision| matches!(decision, BlockDecision::AlreadyBlocked { .. }))
            .count();

        assert_eq!(blocked_count, 1, "exactly one emission path seals the block");
        assert_eq!(observed_count, 1, "the loser observes the standing block");

        let claimed = state
            .command_repository
            .claim_pending("sentinel-race", Utc::now())
            .await
            .expect("claim");
        assert_eq!(claimed.len(), 1, "no second deny command is emitted");

        println!("🏁 Emisión Concurrente: GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Un veredicto con ventana mayor extiende el bloqueo
     * activo y agrega la acción 'extend' al rastro.
     */
    #[tokio::test]
    async fn certify_longer_window_extends_standing_block() {
        let state = ignite_state("mem_life_extend").await;
        let now = Utc::now();

        let genesis = state
            .blocker
            .emit_block(
                "198.51.100.45",
                "sentinel-extend",
                BlockSource::Rule,
                "genesis".to_string(),
                None,
                None,
                Some(now + Duration::minutes(30)),
                true,
                now,
            )
            .await
            .expect("genesis emission");
        let BlockDecision::Blocked { block_id, .. } = genesis else {
            panic!("genesis must seal a block");
        };

        let extension = state
            .blocker
            .emit_block(
                "198.51.100.45",
                "sentinel-extend",
                BlockSource::Rule,
                "longer verdict".to_string(),
                None,
                None,
                Some(now + Duration::minutes(240)),
                true,
                now,
            )
            .await
            .expect("extension emission");
        assert!(matches!(extension, BlockDecision::Extended { .. }));

        let standing = state
            .block_repository
            .find(&block_id)
            .await
            .expect("lookup")
            .expect("present");
        let extended_window = standing.unblock_at.expect("window present");
        assert!(extended_window > now + Duration::minutes(200));

        let trail = state.block_repository.actions_for_block(&block_id).await.expect("trail");
        assert!(trail.iter().any(|action| action.kind == BlockActionKind::Extend));
    }

    /**
     * CERTIFICACIÓN: La liberación desactiva, encola delete_deny_from y
     * audita con autoría del operador.
     */
    #[tokio::test]
    async fn certify_release_enqueues_delete_and_audits() {
        let state = ignite_state("mem_life_release").await;
        let now = Utc::now();

        let genesis = state
            .blocker
            .emit_block(
                "198.51.100.46",
                "sentinel-release",
                BlockSource::Manual,
                "operator seed".to_string(),
                None,
                None,
                Some(now + Duration::minutes(60)),
                true,
                now,
            )
            .await
            .expect("genesis emission");
        let BlockDecision::Blocked { block_id, .. } = genesis else {
            panic!("genesis must seal a block");
        };

        // Drenar el deny_from de génesis.
        let _ = state.command_repository.claim_pending("sentinel-release", Utc::now()).await;

        let standing = state.block_repository.find(&block_id).await.expect("lookup").expect("present");
        state
            .blocker
            .release_block(&standing, "operator:llopez", "false positive confirmed", Utc::now())
            .await
            .expect("release");

        let archived = state.block_repository.find(&block_id).await.expect("lookup").expect("present");
        assert!(!archived.is_active);
        assert_eq!(archived.unblock_reason.as_deref(), Some("false positive confirmed"));

        let claimed = state
            .command_repository
            .claim_pending("sentinel-release", Utc::now())
            .await
            .expect("claim");
        assert_eq!(claimed.len(), 1);
        assert!(matches!(
            claimed[0].action,
            FirewallAction::DeleteDenyFrom { ref ip, .. } if ip == "198.51.100.46"
        ));

        let trail = state.block_repository.actions_for_block(&block_id).await.expect("trail");
        let unblock_action = trail
            .iter()
            .find(|action| action.kind == BlockActionKind::Unblock)
            .expect("unblock audited");
        assert_eq!(unblock_action.performed_by, "operator:llopez");
    }

    /**
     * CERTIFICACIÓN: El barrido de vencimiento libera exactamente los
     * bloqueos con ventana vencida y auto-desbloqueo.
     */
    #[tokio::test]
    async fn certify_expiry_sweep_releases_due_blocks() {
        let state = ignite_state("mem_life_expiry").await;
        let past = Utc::now() - Duration::minutes(90);

        state
            .blocker
            .emit_block(
                "198.51.100.47",
                "sentinel-expiry",
                BlockSource::Rule,
                "expired seed".to_string(),
                None,
                None,
                Some(past + Duration::minutes(60)),
                true,
                past,
            )
            .await
            .expect("expired genesis");

        let due = state.block_repository.due_for_unblock(Utc::now()).await.expect("sweep");
        assert_eq!(due.len(), 1);

        for expired_block in due {
            state
                .blocker
                .release_block(&expired_block, "guardian-warden", "block window expired", Utc::now())
                .await
                .expect("warden release");
        }

        let still_active = state
            .block_repository
            .find_active("198.51.100.47", "sentinel-expiry")
            .await
            .expect("lookup");
        assert!(still_active.is_none());
    }
}
