// [tests/mirror/libs/infra/db/agent_registry.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL REGISTRO DE CENTINELAS (V5.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: IDENTIDAD PERMANENTE, LLAVE ÚNICA Y BARRIDO
 *
 * # Mathematical Proof (Identity Permanence):
 * Dos registros con el mismo agent_id convergen al mismo UUID sin
 * resetear la aprobación; la llave API viaja en claro exactamente una
 * vez y solo se eco-devuelve al portador legítimo.
 * =================================================================
 */

use guardian_domain_models::agent::{AgentHealth, AgentStatus, HostMetrics};
use guardian_domain_models::wire::{HeartbeatRequest, RegisterRequest};
use guardian_infra_db::repositories::AgentRepository;
use guardian_infra_db::DbClient;
use chrono::{Duration, Utc};
use serde_json::json;

fn registration(agent_id: &str) -> RegisterRequest {
    RegisterRequest {
        agent_id: agent_id.to_string(),
        hostname: "bastion".to_string(),
        system_info: json!({"os": "linux"}),
        version: "0.4.0".to_string(),
        heartbeat_interval_sec: 60,
    }
}

fn heartbeat(agent_id: &str) -> HeartbeatRequest {
    HeartbeatRequest {
        agent_id: agent_id.to_string(),
        metrics: HostMetrics {
            cpu_percent: 12.0,
            memory_percent: 38.0,
            disk_percent: 51.0,
            uptime_seconds: 86_400,
        },
        status: "active".to_string(),
        health_status: AgentHealth::Healthy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Registro doble = mismo UUID, aprobación intacta,
     * llave solo para el portador.
     */
    #[tokio::test]
    async fn certify_double_registration_preserves_identity() {
        println!("\n🛡️ [INICIO]: Auditoría de Permanencia de Identidad V5.0...");

        let database_client = DbClient::connect("file:mem_agent_identity?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let agent_repository = AgentRepository::new(database_client.clone());

        // FASE 1: Génesis — única transmisión en claro de la llave.
        println!("   🧪 Fase 1: Primer registro con emisión de llave...");
        let genesis = agent_repository.register(&registration("sentinel-alpha"), None).await.expect("genesis");
        assert!(genesis.freshly_registered);
        assert_eq!(genesis.status, AgentStatus::Pending);
        let issued_key = genesis.api_key_echo.clone().expect("key issued on genesis");

        // FASE 2: Aprobación del operador.
        println!("   🧪 Fase 2: Aprobando al centinela...");
        agent_repository.approve("sentinel-alpha").await.expect("approval");

        // FASE 3: Re-registro SIN llave — sin eco, sin reset de aprobación.
        println!("   🧪 Fase 3: Re-registro sin portar la llave...");
        let keyless_replay = agent_repository.register(&registration("sentinel-alpha"), None).await.expect("replay");
        assert_eq!(keyless_replay.agent_uuid, genesis.agent_uuid, "identity converges to one UUID");
        assert!(keyless_replay.api_key_echo.is_none(), "key is never re-broadcast to strangers");
        assert!(keyless_replay.is_approved, "approval survives re-registration");

        // FASE 4: Re-registro CON llave — eco de verificación.
        println!("   🧪 Fase 4: Re-registro portando la llave legítima...");
        let keyed_replay = agent_repository
            .register(&registration("sentinel-alpha"), Some(&issued_key))
            .await
            .expect("keyed replay");
        assert_eq!(keyed_replay.api_key_echo.as_deref(), Some(issued_key.as_str()));

        println!("🏁 [INFORME]: Permanencia de Identidad certificada GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: Las llaves jamás se comparten entre centinelas.
     */
    #[tokio::test]
    async fn certify_keys_are_never_reused_across_agents() {
        let database_client = DbClient::connect("file:mem_agent_keys?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let agent_repository = AgentRepository::new(database_client);

        let alpha = agent_repository.register(&registration("sentinel-alpha"), None).await.expect("alpha");
        let beta = agent_repository.register(&registration("sentinel-beta"), None).await.expect("beta");

        assert_ne!(alpha.agent_uuid, beta.agent_uuid);
        assert_ne!(
            alpha.api_key_echo.expect("alpha key"),
            beta.api_key_echo.expect("beta key"),
            "each sentinel carries its own key material"
        );
    }

    /**
     * CERTIFICACIÓN: Autenticación exige aprobación + actividad + llave.
     */
    #[tokio::test]
    async fn certify_authentication_gate() {
        let database_client = DbClient::connect("file:mem_agent_auth?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let agent_repository = AgentRepository::new(database_client);

        let genesis = agent_repository.register(&registration("sentinel-gate"), None).await.expect("genesis");
        let issued_key = genesis.api_key_echo.expect("key");

        // Pendiente de aprobación: la puerta permanece cerrada.
        let before_approval =
            agent_repository.authenticate("sentinel-gate", &issued_key).await.expect("gate");
        assert!(before_approval.is_none());

        agent_repository.approve("sentinel-gate").await.expect("approval");
        let after_approval =
            agent_repository.authenticate("sentinel-gate", &issued_key).await.expect("gate");
        assert!(after_approval.is_some());

        // Llave equivocada: cerrada.
        let wrong_key = agent_repository.authenticate("sentinel-gate", "sgk_forged").await.expect("gate");
        assert!(wrong_key.is_none());

        // Desactivación administrativa: cerrada sin reciclar identidad.
        agent_repository.deactivate("sentinel-gate").await.expect("deactivation");
        let after_deactivation =
            agent_repository.authenticate("sentinel-gate", &issued_key).await.expect("gate");
        assert!(after_deactivation.is_none());
    }

    /**
     * CERTIFICACIÓN: Silencio de 3x el intervalo => 'disconnected'.
     */
    #[tokio::test]
    async fn certify_disconnect_sweep_after_silence() {
        let database_client = DbClient::connect("file:mem_agent_sweep?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let agent_repository = AgentRepository::new(database_client);

        agent_repository.register(&registration("sentinel-silent"), None).await.expect("genesis");
        agent_repository.approve("sentinel-silent").await.expect("approval");

        // Latido antiguo: 10 minutos atrás con intervalo de 60s (3x = 180s).
        let stale_instant = Utc::now() - Duration::minutes(10);
        agent_repository
            .record_heartbeat(&heartbeat("sentinel-silent"), stale_instant)
            .await
            .expect("stale heartbeat");

        let disconnected = agent_repository.sweep_disconnected(Utc::now()).await.expect("sweep");
        assert_eq!(disconnected, 1);

        let record = agent_repository.find("sentinel-silent").await.expect("lookup").expect("present");
        assert_eq!(record.status, AgentStatus::Disconnected);

        // Un latido fresco lo regresa a 'active'.
        agent_repository
            .record_heartbeat(&heartbeat("sentinel-silent"), Utc::now())
            .await
            .expect("fresh heartbeat");
        let revived = agent_repository.find("sentinel-silent").await.expect("lookup").expect("present");
        assert_eq!(revived.status, AgentStatus::Active);
    }

    /**
     * CERTIFICACIÓN: El decomiso cascada la telemetría y anula las
     * referencias históricas sin borrarlas.
     */
    #[tokio::test]
    async fn certify_decommission_cascade_policy() {
        let database_client = DbClient::connect("file:mem_agent_cascade?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");
        let agent_repository = AgentRepository::new(database_client.clone());

        agent_repository.register(&registration("sentinel-doomed"), None).await.expect("genesis");
        agent_repository.approve("sentinel-doomed").await.expect("approval");
        agent_repository
            .record_heartbeat(&heartbeat("sentinel-doomed"), Utc::now())
            .await
            .expect("heartbeat");

        // Evento histórico que debe sobrevivir con referencia anulada.
        let connection = database_client.get_connection().expect("raw connection");
        connection
            .execute(
                "INSERT INTO auth_events (event_uuid, timestamp, source_type, agent_id, event_type,
                 auth_method, source_ip, target_username, raw_line)
                 VALUES ('evt-hist', ?1, 'agent', 'sentinel-doomed', 'failed', 'password',
                 '203.0.113.5', 'root', 'raw')",
                libsql::params![Utc::now().to_rfc3339()],
            )
            .await
            .expect("historic event");

        agent_repository.delete_agent("sentinel-doomed").await.expect("decommission");

        assert!(agent_repository.find("sentinel-doomed").await.expect("lookup").is_none());

        let mut orphan_query = connection
            .query("SELECT agent_id FROM auth_events WHERE event_uuid = 'evt-hist'", ())
            .await
            .expect("orphan query");
        let orphan_row = orphan_query.next().await.expect("row").expect("event survives");
        let orphan_reference: Option<String> = orphan_row.get(0).expect("column");
        assert!(orphan_reference.is_none(), "historic event reference is nulled, not deleted");
    }
}
