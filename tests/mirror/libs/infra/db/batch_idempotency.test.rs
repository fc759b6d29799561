// [tests/mirror/libs/infra/db/batch_idempotency.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE IDEMPOTENCIA DE LOTES (V3.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL ESCUDO DE REPLAY POR BATCH_UUID
 *
 * # Mathematical Proof (Replay Shield):
 * El test certifica que el Ledger actúa como memoria de resultados: la
 * segunda llegada de un batch_uuid sellado entrega los conteos del
 * primer procesamiento sin crear filas adicionales.
 * =================================================================
 */

use guardian_domain_models::batch::BatchStatus;
use guardian_domain_models::wire::LogBatchRequest;
use guardian_infra_db::repositories::BatchRepository;
use guardian_infra_db::DbClient;
use chrono::Utc;
use uuid::Uuid;

fn batch_request(batch_uuid: &str, lines: Vec<String>) -> LogBatchRequest {
    LogBatchRequest {
        batch_uuid: batch_uuid.to_string(),
        agent_id: "sentinel-bastion-01".to_string(),
        hostname: "bastion".to_string(),
        log_lines: lines,
        batch_size: 100,
        source_filename: Some("/var/log/auth.log".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: El sello de un lote es la autoridad del replay.
     */
    #[tokio::test]
    async fn certify_completed_batch_serves_stored_counts() {
        println!("\n📦 [INICIO]: Auditoría del Escudo de Replay V3.0...");

        let database_client = DbClient::connect("file:mem_batch_replay?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let batch_repository = BatchRepository::new(database_client.clone());

        let batch_uuid = Uuid::new_v4().to_string();
        let request = batch_request(
            &batch_uuid,
            vec![
                "noise line one".to_string(),
                "Jan 10 03:14:07 bastion sshd[991]: Failed password for root from 203.0.113.5 port 22 ssh2".to_string(),
                "noise line three".to_string(),
            ],
        );

        // FASE 1: Ciclo de vida received -> processing -> completed.
        println!("   🧪 Fase 1: Sellando el lote con conteos definitivos...");
        batch_repository.create_received(&request, Utc::now()).await.expect("genesis");
        batch_repository.mark_processing(&batch_uuid).await.expect("transition");
        batch_repository.finalize_completed(&batch_uuid, 1, 0, Utc::now()).await.expect("seal");

        // FASE 2: El replay entrega los conteos almacenados.
        println!("   🧪 Fase 2: Validando la autoridad del sello en el replay...");
        let sealed = batch_repository
            .find(&batch_uuid)
            .await
            .expect("lookup")
            .expect("sealed batch present");
        assert_eq!(sealed.status, BatchStatus::Completed);
        assert_eq!(sealed.events_created, 1);
        assert_eq!(sealed.events_failed, 0);

        // FASE 3: La re-inserción del mismo UUID es rechazada por el Ledger.
        println!("   🧪 Fase 3: Certificando la restricción única de batch_uuid...");
        let duplicate_genesis = batch_repository.create_received(&request, Utc::now()).await;
        assert!(duplicate_genesis.is_err(), "UNIQUE constraint must reject the duplicate row");

        println!("🏁 [INFORME]: Escudo de Replay certificado GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Un lote sin líneas parseables sella con ceros.
     */
    #[tokio::test]
    async fn certify_empty_batch_completes_with_zeros() {
        let database_client = DbClient::connect("file:mem_batch_empty?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let batch_repository = BatchRepository::new(database_client.clone());

        let batch_uuid = Uuid::new_v4().to_string();
        batch_repository
            .create_received(&batch_request(&batch_uuid, vec![]), Utc::now())
            .await
            .expect("genesis");
        batch_repository.finalize_completed(&batch_uuid, 0, 0, Utc::now()).await.expect("seal");

        let sealed = batch_repository.find(&batch_uuid).await.expect("lookup").expect("present");
        assert_eq!(sealed.status, BatchStatus::Completed);
        assert_eq!(sealed.declared_count, 0);
        assert_eq!(sealed.events_created, 0);
        assert_eq!(sealed.events_failed, 0);
    }

    /**
     * CERTIFICACIÓN: La cota de contra-presión cuenta solo lotes en vuelo.
     */
    #[tokio::test]
    async fn certify_inflight_bound_counts_open_batches_only() {
        let database_client = DbClient::connect("file:mem_batch_bound?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let batch_repository = BatchRepository::new(database_client.clone());

        let open_uuid = Uuid::new_v4().to_string();
        let sealed_uuid = Uuid::new_v4().to_string();

        batch_repository
            .create_received(&batch_request(&open_uuid, vec!["sshd line".into()]), Utc::now())
            .await
            .expect("genesis open");
        batch_repository
            .create_received(&batch_request(&sealed_uuid, vec!["sshd line".into()]), Utc::now())
            .await
            .expect("genesis sealed");
        batch_repository.finalize_completed(&sealed_uuid, 1, 0, Utc::now()).await.expect("seal");

        let in_flight = batch_repository.count_in_flight("sentinel-bastion-01").await.expect("bound");
        assert_eq!(in_flight, 1, "only the open batch counts toward backpressure");
    }

    /**
     * CERTIFICACIÓN: La retención poda solo lotes sellados y viejos.
     */
    #[tokio::test]
    async fn certify_retention_prunes_sealed_batches_only() {
        let database_client = DbClient::connect("file:mem_batch_prune?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let batch_repository = BatchRepository::new(database_client.clone());

        let ancient_sealed = Uuid::new_v4().to_string();
        let ancient_open = Uuid::new_v4().to_string();
        let thirty_one_days_ago = Utc::now() - chrono::Duration::days(31);

        batch_repository
            .create_received(&batch_request(&ancient_sealed, vec![]), thirty_one_days_ago)
            .await
            .expect("genesis sealed");
        batch_repository
            .finalize_completed(&ancient_sealed, 0, 0, thirty_one_days_ago)
            .await
            .expect("seal");
        batch_repository
            .create_received(&batch_request(&ancient_open, vec![]), thirty_one_days_ago)
            .await
            .expect("genesis open");

        let cutoff = Utc::now() - chrono::Duration::days(30);
        let purged = batch_repository.prune_older_than(cutoff).await.expect("prune");
        assert_eq!(purged, 1, "the open batch survives retention until sealed");

        assert!(batch_repository.find(&ancient_sealed).await.expect("lookup").is_none());
        assert!(batch_repository.find(&ancient_open).await.expect("lookup").is_some());
    }
}
