// [tests/mirror/libs/infra/db/block_registry.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL REGISTRO DE BLOQUEOS (V4.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL INVARIANTE DE FILA ACTIVA ÚNICA
 *
 * # Mathematical Proof (Single Active Seal):
 * El índice único parcial sobre (ip, agente) restringido a filas
 * activas convierte la carrera de emisores en una colisión observable:
 * exactamente un INSERT gana y el perdedor corto-circuita.
 * =================================================================
 */

use guardian_domain_models::blocking::{BlockActionKind, BlockSource, BlockingActionRecord, IpBlockRecord};
use guardian_infra_db::repositories::{BlockInsertOutcome, BlockRepository};
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};
use uuid::Uuid;

fn block_record(ip: &str, agent_id: &str, minutes: Option<i64>) -> IpBlockRecord {
    let now = Utc::now();
    IpBlockRecord {
        id: Uuid::new_v4().to_string(),
        ip: ip.to_string(),
        cidr_range: None,
        reason: "certification".to_string(),
        source: BlockSource::Rule,
        triggering_rule_id: None,
        triggering_event_uuid: None,
        agent_id: Some(agent_id.to_string()),
        block_type: None,
        is_active: true,
        blocked_at: now,
        unblock_at: minutes.map(|m| now + Duration::minutes(m)),
        auto_unblock: true,
        unblocked_at: None,
        unblock_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: A lo sumo una fila activa por (ip, agente).
     */
    #[tokio::test]
    async fn certify_single_active_row_per_pair() {
        println!("\n⛔ [INICIO]: Auditoría del Invariante de Fila Activa V4.0...");

        let database_client = DbClient::connect("file:mem_block_single?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let block_repository = BlockRepository::new(database_client.clone());

        println!("   🧪 Fase 1: Primer emisor sella el bloqueo...");
        let first = block_repository
            .try_create(&block_record("198.51.100.7", "sentinel-alpha", Some(60)))
            .await
            .expect("first insert");
        assert_eq!(first, BlockInsertOutcome::Created);

        println!("   🧪 Fase 2: El segundo emisor observa la colisión...");
        let second = block_repository
            .try_create(&block_record("198.51.100.7", "sentinel-alpha", Some(120)))
            .await
            .expect("second insert");
        assert_eq!(second, BlockInsertOutcome::AlreadyActive);

        // El mismo IP hacia OTRO centinela sí abre su propio bloqueo.
        let cross_agent = block_repository
            .try_create(&block_record("198.51.100.7", "sentinel-beta", Some(60)))
            .await
            .expect("cross agent insert");
        assert_eq!(cross_agent, BlockInsertOutcome::Created);

        println!("🏁 [INFORME]: Invariante certificado GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Dos emisores CONCURRENTES producen exactamente
     * una fila activa (la carrera es observable, jamás duplicada).
     */
    #[tokio::test]
    async fn certify_concurrent_emitters_single_winner() {
        let database_client =
            DbClient::connect("file:mem_block_race?mode=memory&cache=shared", None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let repository_alpha = BlockRepository::new(database_client.clone());
        let repository_beta = BlockRepository::new(database_client.clone());

        let task_alpha = tokio::spawn(async move {
            repository_alpha.try_create(&block_record("203.0.113.99", "sentinel-race", Some(60))).await
        });
        let task_beta = tokio::spawn(async move {
            repository_beta.try_create(&block_record("203.0.113.99", "sentinel-race", Some(60))).await
        });

        let outcome_alpha = task_alpha.await.expect("join").expect("insert alpha");
        let outcome_beta = task_beta.await.expect("join").expect("insert beta");

        let created_count = [outcome_alpha, outcome_beta]
            .iter()
            .filter(|outcome| **outcome == BlockInsertOutcome::Created)
            .count();
        assert_eq!(created_count, 1, "exactly one concurrent emitter wins");

        let verification_repository = BlockRepository::new(database_client);
        let standing = verification_repository
            .find_active("203.0.113.99", "sentinel-race")
            .await
            .expect("lookup");
        assert!(standing.is_some(), "one active row stands after the race");
    }

    /**
     * CERTIFICACIÓN: La desactivación reabre el par para un ciclo nuevo.
     */
    #[tokio::test]
    async fn certify_deactivation_reopens_the_pair() {
        let database_client =
            DbClient::connect("file:mem_block_cycle?mode=memory&cache=shared", None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let block_repository = BlockRepository::new(database_client.clone());

        let genesis = block_record("192.0.2.50", "sentinel-cycle", Some(1));
        let genesis_id = genesis.id.clone();
        block_repository.try_create(&genesis).await.expect("genesis");

        block_repository
            .deactivate(&genesis_id, "window expired", Utc::now())
            .await
            .expect("deactivation");

        let reopened = block_repository
            .try_create(&block_record("192.0.2.50", "sentinel-cycle", Some(60)))
            .await
            .expect("second cycle");
        assert_eq!(reopened, BlockInsertOutcome::Created);

        // La fila histórica sobrevive desactivada con su motivo.
        let archived = block_repository.find(&genesis_id).await.expect("lookup").expect("present");
        assert!(!archived.is_active);
        assert_eq!(archived.unblock_reason.as_deref(), Some("window expired"));
    }

    /**
     * CERTIFICACIÓN: El barrido entrega solo vencidos con auto-desbloqueo.
     */
    #[tokio::test]
    async fn certify_due_sweep_filters_precisely() {
        let database_client =
            DbClient::connect("file:mem_block_sweep?mode=memory&cache=shared", None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let block_repository = BlockRepository::new(database_client.clone());

        // Vencido con auto-desbloqueo: DEBE aparecer.
        let mut expired = block_record("198.18.1.1", "sentinel-sweep", None);
        expired.unblock_at = Some(Utc::now() - Duration::minutes(5));
        block_repository.try_create(&expired).await.expect("expired genesis");

        // Vigente: NO aparece.
        block_repository
            .try_create(&block_record("198.18.1.2", "sentinel-sweep", Some(60)))
            .await
            .expect("standing genesis");

        // Permanente (sin ventana): NO aparece.
        let mut permanent = block_record("198.18.1.3", "sentinel-sweep", None);
        permanent.auto_unblock = false;
        block_repository.try_create(&permanent).await.expect("permanent genesis");

        let due = block_repository.due_for_unblock(Utc::now()).await.expect("sweep");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].ip, "198.18.1.1");
    }

    /**
     * CERTIFICACIÓN: El rastro append-only conserva cada transición.
     */
    #[tokio::test]
    async fn certify_action_trail_is_append_only() {
        let database_client =
            DbClient::connect("file:mem_block_trail?mode=memory&cache=shared", None)
                .await
                .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let block_repository = BlockRepository::new(database_client.clone());

        let genesis = block_record("192.0.2.77", "sentinel-trail", Some(60));
        let block_id = genesis.id.clone();
        block_repository.try_create(&genesis).await.expect("genesis");

        for (kind, actor) in [
            (BlockActionKind::Block, "guardian-detector"),
            (BlockActionKind::Extend, "guardian-detector"),
            (BlockActionKind::Unblock, "operator:llopez"),
        ] {
            block_repository
                .record_action(&BlockingActionRecord {
                    action_uuid: Uuid::new_v4().to_string(),
                    block_id: block_id.clone(),
                    kind,
                    performed_by: actor.to_string(),
                    reason: None,
                    created_at: Utc::now(),
                })
                .await
                .expect("trail append");
        }

        let trail = block_repository.actions_for_block(&block_id).await.expect("trail read");
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].kind, BlockActionKind::Block);
        assert_eq!(trail[2].kind, BlockActionKind::Unblock);
        assert_eq!(trail[2].performed_by, "operator:llopez");
    }
}
