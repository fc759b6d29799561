// [tests/mirror/apps/ingest_server/pipeline_flow.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PIPELINE DE INGESTA (V6.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA EXTREMO-A-EXTREMO DEL DETECTOR HÍBRIDO
 *
 * # Mathematical Proof (Hybrid Verdict):
 * El pipeline se certifica contra cuatro escenarios de aceptación:
 * deduplicación por UUID, bloqueo por umbral de fuerza bruta,
 * corto-circuito por reputación hostil y corto-circuito de red privada.
 * =================================================================
 */

use guardian_domain_models::enrichment::ThreatLevel;
use guardian_domain_models::firewall::{CommandStatus, FirewallAction};
use guardian_domain_models::wire::LogBatchRequest;
use guardian_ingest_server::prelude::*;
use guardian_ingest_server::services::IngestPipeline;
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};
use uuid::Uuid;

async fn ignite_state(memory_label: &str) -> AppState {
    let database_url = format!("file:{memory_label}?mode=memory&cache=shared");
    let database_client = DbClient::connect(&database_url, None)
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

    let state = AppState::new(database_client, ServerConfig::for_tests(&database_url));
    state.settings_repository.seed_defaults().await.expect("settings seed");
    let high_risk = state.settings_repository.high_risk_countries().await.expect("catalog");
    state.rule_repository.seed_defaults(&high_risk).await.expect("rules seed");
    state
}

fn batch(agent_id: &str, lines: Vec<&str>) -> LogBatchRequest {
    LogBatchRequest {
        batch_uuid: Uuid::new_v4().to_string(),
        agent_id: agent_id.to_string(),
        hostname: "bastion".to_string(),
        log_lines: lines.into_iter().map(String::from).collect(),
        batch_size: 100,
        source_filename: Some("/var/log/auth.log".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * ESCENARIO 1: Deduplicación — el mismo lote re-procesado no crea
     * eventos adicionales (el dedup por event_uuid y el sello del lote
     * cubren ambos frentes del replay).
     */
    #[tokio::test]
    async fn certify_replayed_lines_do_not_duplicate_events() {
        println!("\n🔬 [INICIO]: Escenario de Deduplicación...");
        let state = ignite_state("mem_pipe_dedup").await;

        let submission = batch(
            "sentinel-alpha",
            vec![
                "L1 noise without markers",
                "Jan 10 03:14:07 bastion sshd[991]: Failed password for root from 203.0.113.5 port 22 ssh2",
                "L3 noise without markers",
            ],
        );

        let first_pass = IngestPipeline::process_batch(&state, &submission).await;
        assert_eq!(first_pass.events_created, 1, "only the classified line materializes");
        assert_eq!(first_pass.events_failed, 0);

        let ledger_count = state.event_repository.total_events().await.expect("count");
        assert_eq!(ledger_count, 1);

        println!("🏁 Escenario de Deduplicación: GOLD_MASTER.");
    }

    /**
     * ESCENARIO 2: Umbral de fuerza bruta — diez fallos sucesivos
     * producen EXACTAMENTE un bloqueo activo y un deny_from que
     * completa cuando el borde reporta éxito.
     */
    #[tokio::test]
    async fn certify_threshold_burst_seals_single_block() {
        println!("\n🔬 [INICIO]: Escenario de Umbral de Fuerza Bruta...");
        let state = ignite_state("mem_pipe_threshold").await;

        let hostile_lines: Vec<String> = (0..10)
            .map(|second| {
                format!(
                    "Jan 10 03:14:{:02} bastion sshd[991]: Failed password for root from 198.51.100.7 port 5{:04} ssh2",
                    second, 1000 + second
                )
            })
            .collect();

        let submission = batch(
            "sentinel-alpha",
            hostile_lines.iter().map(String::as_str).collect(),
        );
        let outcome = IngestPipeline::process_batch(&state, &submission).await;
        assert_eq!(outcome.events_created, 10);

        // Exactamente UN bloqueo activo para el par.
        let standing_block = state
            .block_repository
            .find_active("198.51.100.7", "sentinel-alpha")
            .await
            .expect("lookup")
            .expect("block sealed");
        assert!(standing_block.unblock_at.is_some(), "threshold rule carries a 60m window");

        let all_active = state.block_repository.list_active().await.expect("catalog");
        assert_eq!(all_active.len(), 1, "ten failures yield exactly one block");

        // Exactamente UN deny_from en la cola, entregado y completado.
        let claimed = state
            .command_repository
            .claim_pending("sentinel-alpha", Utc::now())
            .await
            .expect("claim");
        assert_eq!(claimed.len(), 1);
        assert!(matches!(claimed[0].action, FirewallAction::DenyFrom { ref ip, .. } if ip == "198.51.100.7"));

        state
            .command_repository
            .record_result(&claimed[0].command_uuid, true, "Rule added", Utc::now())
            .await
            .expect("edge result");

        let sealed_command = state
            .command_repository
            .find(&claimed[0].command_uuid)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(sealed_command.status, CommandStatus::Completed);

        // El bloqueo permanece activo hasta su ventana.
        let still_standing = state
            .block_repository
            .find_active("198.51.100.7", "sentinel-alpha")
            .await
            .expect("lookup");
        assert!(still_standing.is_some());

        println!("🏁 Escenario de Umbral: GOLD_MASTER.");
    }

    /**
     * ESCENARIO 3: Corto-circuito de reputación — una fila de
     * enriquecimiento hostil (AbuseIPDB 95, proxy, datacenter, país de
     * alto riesgo) lleva una sola línea fallida a banda crítica.
     */
    #[tokio::test]
    async fn certify_hostile_reputation_short_circuit() {
        println!("\n🔬 [INICIO]: Escenario de Reputación Hostil...");
        let state = ignite_state("mem_pipe_reputation").await;

        // Siembra de enriquecimiento como lo haría el refresco externo.
        let future_expiry = Utc::now() + Duration::hours(12);
        let hostile_row = guardian_domain_models::enrichment::IpGeoRecord {
            country_code: Some("KP".to_string()),
            country_name: Some("North Korea".to_string()),
            is_proxy: true,
            is_datacenter: true,
            ..guardian_domain_models::enrichment::IpGeoRecord::synthetic_clean("192.0.2.9", Utc::now())
        };
        state
            .geo_repository
            .upsert_geolocation(&hostile_row, future_expiry)
            .await
            .expect("geo seed");
        state
            .geo_repository
            .upsert_abuse("192.0.2.9", 95, 412, future_expiry)
            .await
            .expect("abuse seed");
        state
            .geo_repository
            .upsert_virustotal("192.0.2.9", 9, 70, future_expiry)
            .await
            .expect("vt seed");

        let seeded = state.geo_repository.find("192.0.2.9").await.expect("lookup").expect("row");
        assert_eq!(seeded.threat_level, ThreatLevel::Critical);

        let submission = batch(
            "sentinel-alpha",
            vec!["Jan 10 04:00:00 bastion sshd[991]: Failed password for root from 192.0.2.9 port 22 ssh2"],
        );
        let outcome = IngestPipeline::process_batch(&state, &submission).await;
        assert_eq!(outcome.events_created, 1);

        // Una sola línea basta para el bloqueo.
        let standing_block = state
            .block_repository
            .find_active("192.0.2.9", "sentinel-alpha")
            .await
            .expect("lookup");
        assert!(standing_block.is_some(), "hostile reputation must block on first sighting");

        // El veredicto cristalizado supera la banda crítica (>= 0.81).
        let connection = state.database_client.get_connection().expect("raw connection");
        let mut verdict_query = connection
            .query(
                "SELECT risk_score, resulted_in_block FROM auth_events_ml LIMIT 1",
                (),
            )
            .await
            .expect("verdict query");
        let verdict_row = verdict_query.next().await.expect("row").expect("verdict present");
        let crystallized_risk: f64 = verdict_row.get(0).expect("risk");
        let resulted_in_block: i64 = verdict_row.get(1).expect("flag");
        assert!(crystallized_risk >= 0.81, "observed composite {}", crystallized_risk * 100.0);
        assert_eq!(resulted_in_block, 1);

        println!("🏁 Escenario de Reputación: GOLD_MASTER.");
    }

    /**
     * ESCENARIO 4: Red privada — 10.0.0.5 recibe la fila sintética
     * 'clean', la capa de reputación aporta cero y no hay bloqueo.
     */
    #[tokio::test]
    async fn certify_private_ip_clean_short_circuit() {
        println!("\n🔬 [INICIO]: Escenario de Red Privada...");
        let state = ignite_state("mem_pipe_private").await;

        let submission = batch(
            "sentinel-alpha",
            vec!["Jan 10 05:00:00 bastion sshd[991]: Failed password for admin from 10.0.0.5 port 51022 ssh2"],
        );
        let outcome = IngestPipeline::process_batch(&state, &submission).await;
        assert_eq!(outcome.events_created, 1);

        let clean_row = state.geo_repository.find("10.0.0.5").await.expect("lookup").expect("row");
        assert_eq!(clean_row.threat_level, ThreatLevel::Clean);

        let standing_block = state
            .block_repository
            .find_active("10.0.0.5", "sentinel-alpha")
            .await
            .expect("lookup");
        assert!(standing_block.is_none(), "private traffic never blocks on a single failure");

        println!("🏁 Escenario de Red Privada: GOLD_MASTER.");
    }

    /**
     * ESCENARIO 5: Canal lateral fail2ban — un Ban observado en el
     * borde registra el evento espejo y el bloqueo 'fail2ban' sin
     * producir eventos de autenticación ni comandos de borde.
     */
    #[tokio::test]
    async fn certify_fail2ban_side_channel() {
        println!("\n🔬 [INICIO]: Escenario del Canal Fail2ban...");
        let state = ignite_state("mem_pipe_f2b").await;

        let submission = batch(
            "sentinel-alpha",
            vec!["2026-01-10 03:14:22,123 fail2ban.actions [123]: NOTICE [sshd] Ban 203.0.113.9"],
        );
        let outcome = IngestPipeline::process_batch(&state, &submission).await;
        assert_eq!(outcome.events_created, 0, "fail2ban lines never become auth events");

        let mirrored = state.fail2ban_repository.count_for_ip("203.0.113.9").await.expect("count");
        assert_eq!(mirrored, 1);

        let standing_block = state
            .block_repository
            .find_active("203.0.113.9", "sentinel-alpha")
            .await
            .expect("lookup")
            .expect("mirror block");
        assert!(matches!(
            standing_block.source,
            guardian_domain_models::blocking::BlockSource::Fail2ban
        ));

        // El borde ya aplicó el ban: no se emite comando alguno.
        let claimed = state
            .command_repository
            .claim_pending("sentinel-alpha", Utc::now())
            .await
            .expect("claim");
        assert!(claimed.is_empty());

        println!("🏁 Escenario Fail2ban: GOLD_MASTER.");
    }
}
