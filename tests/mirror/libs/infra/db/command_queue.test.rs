// [tests/mirror/libs/infra/db/command_queue.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA COLA DE COMANDOS (V4.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: ENTREGA EXACTLY-ONCE Y CICLO DE VIDA MONÓTONO
 *
 * # Mathematical Proof (Monotone Delivery):
 * La reclamación transaccional pending->sent garantiza que cada UUID
 * se entregue exactamente una vez en orden de creación; los estados
 * terminales son absorbentes (sin transiciones retrógradas).
 * =================================================================
 */

use guardian_domain_models::firewall::{CommandStatus, FirewallAction};
use guardian_infra_db::repositories::{CommandRepository, ResultIngestOutcome};
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};
use uuid::Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Reclamación en orden de creación, una sola vez.
     */
    #[tokio::test]
    async fn certify_claim_preserves_creation_order_exactly_once() {
        println!("\n📬 [INICIO]: Auditoría de Entrega Exactly-Once V4.0...");

        let database_client = DbClient::connect("file:mem_cmd_order?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let command_repository = CommandRepository::new(database_client.clone());

        // FASE 1: Tres directivas encoladas con separación temporal.
        println!("   🧪 Fase 1: Encolando tres directivas...");
        let base_instant = Utc::now();
        let mut enqueued_uuids = Vec::new();
        for (index, target_ip) in ["198.18.2.1", "198.18.2.2", "198.18.2.3"].iter().enumerate() {
            let command_uuid = Uuid::new_v4().to_string();
            command_repository
                .enqueue(
                    &command_uuid,
                    "sentinel-queue",
                    &FirewallAction::DenyFrom { ip: target_ip.to_string(), block_id: None },
                    &format!("ufw deny from {target_ip}"),
                    "guardian-detector",
                    base_instant + Duration::milliseconds(index as i64 * 10),
                )
                .await
                .expect("enqueue");
            enqueued_uuids.push(command_uuid);
        }

        // FASE 2: Reclamación única en orden de creación.
        println!("   🧪 Fase 2: Reclamando la cola completa...");
        let claimed = command_repository.claim_pending("sentinel-queue", Utc::now()).await.expect("claim");
        let claimed_uuids: Vec<String> =
            claimed.iter().map(|directive| directive.command_uuid.clone()).collect();
        assert_eq!(claimed_uuids, enqueued_uuids, "delivery preserves creation order");

        // FASE 3: La segunda reclamación observa cola vacía.
        println!("   🧪 Fase 3: Certificando el vaciado de la cola...");
        let replayed_claim =
            command_repository.claim_pending("sentinel-queue", Utc::now()).await.expect("claim");
        assert!(replayed_claim.is_empty(), "claimed commands are never re-delivered");

        for command_uuid in &enqueued_uuids {
            let record = command_repository.find(command_uuid).await.expect("lookup").expect("present");
            assert_eq!(record.status, CommandStatus::Sent);
        }

        println!("🏁 [INFORME]: Entrega Exactly-Once certificada GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Los estados terminales son absorbentes.
     */
    #[tokio::test]
    async fn certify_terminal_states_are_absorbing() {
        let database_client = DbClient::connect("file:mem_cmd_terminal?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let command_repository = CommandRepository::new(database_client);

        let command_uuid = Uuid::new_v4().to_string();
        command_repository
            .enqueue(
                &command_uuid,
                "sentinel-terminal",
                &FirewallAction::DenyFrom { ip: "198.18.3.1".to_string(), block_id: None },
                "ufw deny from 198.18.3.1",
                "guardian-detector",
                Utc::now(),
            )
            .await
            .expect("enqueue");
        command_repository.claim_pending("sentinel-terminal", Utc::now()).await.expect("claim");

        // Primer resultado: sella 'completed'.
        let first_result = command_repository
            .record_result(&command_uuid, true, "Rule added", Utc::now())
            .await
            .expect("first result");
        assert_eq!(first_result, ResultIngestOutcome::Applied);

        // Resultado tardío contradictorio: absorbido sin mutación.
        let late_result = command_repository
            .record_result(&command_uuid, false, "Command timed out", Utc::now())
            .await
            .expect("late result");
        assert_eq!(late_result, ResultIngestOutcome::AlreadyTerminal);

        let record = command_repository.find(&command_uuid).await.expect("lookup").expect("present");
        assert_eq!(record.status, CommandStatus::Completed);
        assert_eq!(record.result_message.as_deref(), Some("Rule added"));
    }

    /**
     * CERTIFICACIÓN: Un resultado huérfano se acepta sin crear filas.
     */
    #[tokio::test]
    async fn certify_orphan_result_creates_nothing() {
        let database_client = DbClient::connect("file:mem_cmd_orphan?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let command_repository = CommandRepository::new(database_client);

        let phantom_uuid = Uuid::new_v4().to_string();
        let orphan_outcome = command_repository
            .record_result(&phantom_uuid, true, "ghost execution", Utc::now())
            .await
            .expect("orphan result");
        assert_eq!(orphan_outcome, ResultIngestOutcome::UnknownCommand);

        let lookup = command_repository.find(&phantom_uuid).await.expect("lookup");
        assert!(lookup.is_none(), "orphan results never materialize rows");
    }

    /**
     * CERTIFICACIÓN: latest_deny_from entrega el intento más reciente.
     */
    #[tokio::test]
    async fn certify_latest_deny_lookup_for_reconciliation() {
        let database_client = DbClient::connect("file:mem_cmd_latest?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let command_repository = CommandRepository::new(database_client);

        let stale_uuid = Uuid::new_v4().to_string();
        let fresh_uuid = Uuid::new_v4().to_string();
        let deny = FirewallAction::DenyFrom { ip: "198.18.4.1".to_string(), block_id: None };

        command_repository
            .enqueue(&stale_uuid, "sentinel-latest", &deny, "ufw deny from 198.18.4.1",
                     "guardian-reconciler", Utc::now() - Duration::minutes(30))
            .await
            .expect("stale enqueue");
        command_repository
            .enqueue(&fresh_uuid, "sentinel-latest", &deny, "ufw deny from 198.18.4.1",
                     "guardian-reconciler", Utc::now())
            .await
            .expect("fresh enqueue");

        let latest = command_repository
            .latest_deny_from("sentinel-latest", "198.18.4.1")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(latest.command_uuid, fresh_uuid);
    }
}
