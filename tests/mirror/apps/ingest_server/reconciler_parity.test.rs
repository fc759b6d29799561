// [tests/mirror/apps/ingest_server/reconciler_parity.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE PARIDAD BORDE<->LEDGER (V4.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: ADOPCIÓN DESDE EL BORDE Y RE-ENTREGA ACOTADA
 *
 * # Mathematical Proof (Ground Truth Audit):
 * La reconciliación converge en ambas direcciones: las reglas huérfanas
 * del borde engendran bloqueos 'reconciled' sin comando, y los bloqueos
 * sin regla re-encolan el deny solo cuando el último intento envejeció.
 * =================================================================
 */

use guardian_domain_models::blocking::BlockSource;
use guardian_domain_models::firewall::{
    FirewallInventory, UfwRuleEntry, UfwStatusSnapshot,
};
use guardian_ingest_server::prelude::*;
use guardian_ingest_server::services::reconcile_agent;
use guardian_ingest_server::services::BlockDecision;
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};

async fn ignite_state(memory_label: &str) -> AppState {
    let database_url = format!("file:{memory_label}?mode=memory&cache=shared");
    let database_client = DbClient::connect(&database_url, None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
    let state = AppState::new(database_client, ServerConfig::for_tests(&database_url));
    state.settings_repository.seed_defaults().await.expect("settings seed");
    state
}

fn edge_inventory_with_deny(denied_ip: &str) -> FirewallInventory {
    FirewallInventory {
        status: UfwStatusSnapshot {
            status: "active".to_string(),
            default_incoming: Some("deny".to_string()),
            default_outgoing: Some("allow".to_string()),
            default_routed: Some("disabled".to_string()),
            logging_level: Some("low".to_string()),
            ipv6_enabled: false,
            version: Some("0.36.1".to_string()),
            rules_count: 2,
        },
        rules: vec![
            UfwRuleEntry {
                position: 1,
                raw_text: "22/tcp ALLOW IN Anywhere".to_string(),
                action: Some("ALLOW".to_string()),
                direction: Some("IN".to_string()),
                from_source: Some("Anywhere".to_string()),
                to_destination: Some("22/tcp".to_string()),
            },
            UfwRuleEntry {
                position: 2,
                raw_text: format!("Anywhere DENY IN {denied_ip}"),
                action: Some("DENY".to_string()),
                direction: Some("IN".to_string()),
                from_source: Some(denied_ip.to_string()),
                to_destination: Some("Anywhere".to_string()),
            },
        ],
        listening_ports: vec![],
        protected_ports: vec![22, 8000],
        collected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Regla del borde sin bloqueo central => adopción
     * como 'reconciled' sin emisión de comando.
     */
    #[tokio::test]
    async fn certify_edge_orphan_rule_is_adopted() {
        println!("\n🧭 [INICIO]: Auditoría de Adopción desde el Borde V4.0...");
        let state = ignite_state("mem_parity_adopt").await;

        state
            .ufw_state_repository
            .replace_inventory("sentinel-parity", &edge_inventory_with_deny("198.18.5.5"), Utc::now())
            .await
            .expect("mirror swap");

        let summary = reconcile_agent(&state, "sentinel-parity").await.expect("audit");
        assert_eq!(summary.adopted_from_edge, 1);
        assert_eq!(summary.redelivered_to_edge, 0);

        let adopted = state
            .block_repository
            .find_active("198.18.5.5", "sentinel-parity")
            .await
            .expect("lookup")
            .expect("adopted block");
        assert!(matches!(adopted.source, BlockSource::Ufw));
        assert_eq!(adopted.block_type.as_deref(), Some("reconciled"));
        assert!(adopted.unblock_at.is_none(), "adopted blocks carry no expiry window");

        // El borde ya porta la regla: jamás se encola un deny redundante.
        let claimed = state
            .command_repository
            .claim_pending("sentinel-parity", Utc::now())
            .await
            .expect("claim");
        assert!(claimed.is_empty());

        // La segunda auditoría es idempotente.
        let replay = reconcile_agent(&state, "sentinel-parity").await.expect("replay audit");
        assert_eq!(replay.adopted_from_edge, 0);

        println!("🏁 Adopción desde el Borde: GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Bloqueo central sin regla en el borde => re-entrega
     * solo cuando el último intento envejeció (>= 5 minutos).
     */
    #[tokio::test]
    async fn certify_stale_delivery_is_redelivered() {
        let state = ignite_state("mem_parity_redeliver").await;

        // Inventario del borde SIN la regla del bloqueo central.
        state
            .ufw_state_repository
            .replace_inventory("sentinel-parity", &edge_inventory_with_deny("203.0.113.250"), Utc::now())
            .await
            .expect("mirror swap");

        // Bloqueo emitido hace 10 minutos (comando original igual de viejo).
        let stale_instant = Utc::now() - Duration::minutes(10);
        let genesis = state
            .blocker
            .emit_block(
                "198.18.6.6",
                "sentinel-parity",
                BlockSource::Rule,
                "stale delivery seed".to_string(),
                None,
                None,
                Some(Utc::now() + Duration::minutes(60)),
                true,
                stale_instant,
            )
            .await
            .expect("stale genesis");
        assert!(matches!(genesis, BlockDecision::Blocked { .. }));

        let summary = reconcile_agent(&state, "sentinel-parity").await.expect("audit");
        assert_eq!(summary.redelivered_to_edge, 1, "aged attempt must be redelivered");

        // La re-entrega inmediata siguiente NO duplica (intento fresco).
        let immediate_replay = reconcile_agent(&state, "sentinel-parity").await.expect("replay");
        assert_eq!(immediate_replay.redelivered_to_edge, 0);
    }

    /**
     * CERTIFICACIÓN: Un intento fresco suprime la re-entrega.
     */
    #[tokio::test]
    async fn certify_fresh_delivery_is_not_redelivered() {
        let state = ignite_state("mem_parity_fresh").await;

        state
            .ufw_state_repository
            .replace_inventory("sentinel-parity", &edge_inventory_with_deny("203.0.113.251"), Utc::now())
            .await
            .expect("mirror swap");

        // Bloqueo y comando recién emitidos.
        state
            .blocker
            .emit_block(
                "198.18.7.7",
                "sentinel-parity",
                BlockSource::Rule,
                "fresh delivery seed".to_string(),
                None,
                None,
                Some(Utc::now() + Duration::minutes(60)),
                true,
                Utc::now(),
            )
            .await
            .expect("fresh genesis");

        let summary = reconcile_agent(&state, "sentinel-parity").await.expect("audit");
        assert_eq!(summary.redelivered_to_edge, 0, "fresh attempts are never duplicated");
    }
}
