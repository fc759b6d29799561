// [apps/ingest-server/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V9.0 - CONTROL PLANE GOLD)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, CERROJOS Y MANDO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. COMPOSITION ROOT: Centraliza los once repositorios, el servicio
 *    de enriquecimiento, el motor de bloqueo y el bus de despertar de
 *    sondeos.
 * 2. KEYED MUTEX REGISTRIES: Cerrojos por llave (IP y par ip/agente)
 *    sellan los invariantes de a-lo-sumo-una-acción concurrente; se
 *    reconstruyen vacíos en cada arranque (el Ledger es la autoridad).
 * 3. NOMINAL PURITY: Uso de 'Arc<T>' para inmutabilidad compartida.
 * =================================================================
 */

pub mod wakeup_bus;

use crate::config::ServerConfig;
use crate::services::blocker::BlockingEngine;
use crate::services::enrichment::EnrichmentService;
use guardian_domain_detection::anomaly::IsolationEnsemble;
use guardian_infra_db::repositories::{
    AgentRepository, BatchRepository, BlockRepository, CommandRepository, EventRepository,
    Fail2banRepository, GeoRepository, MlRepository, RuleRepository, SettingsRepository,
    UfwStateRepository,
};
use guardian_infra_db::DbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/**
 * Registro de cerrojos por llave textual.
 *
 * Garantiza a-lo-sumo-una ruta de código en vuelo por llave; los
 * llamantes concurrentes esperan y observan el resultado del ganador.
 */
#[derive(Default)]
pub struct KeyedMutexRegistry {
    guard_registry: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let keyed_mutex = {
            let mut registry_guard = self.guard_registry.lock().await;
            registry_guard.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        keyed_mutex.lock_owned().await
    }
}

/**
 * Contenedor de estado compartido (Thread-Safe) del Centro de Ingesta.
 * Actúa como la placa base neural donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico para el Ledger libSQL.
    pub database_client: DbClient,
    /// Registro de configuración inyectado (carga única).
    pub config: Arc<ServerConfig>,

    // --- MATRIZ DE REPOSITORIOS (ESTRATO L3) ---
    pub agent_repository: Arc<AgentRepository>,
    pub batch_repository: Arc<BatchRepository>,
    pub event_repository: Arc<EventRepository>,
    pub geo_repository: Arc<GeoRepository>,
    pub rule_repository: Arc<RuleRepository>,
    pub block_repository: Arc<BlockRepository>,
    pub command_repository: Arc<CommandRepository>,
    pub ufw_state_repository: Arc<UfwStateRepository>,
    pub settings_repository: Arc<SettingsRepository>,
    pub ml_repository: Arc<MlRepository>,
    pub fail2ban_repository: Arc<Fail2banRepository>,

    // --- SERVICIOS DE DETECCIÓN Y MANDO ---
    /// Enriquecimiento con cerrojo por IP y caché TTL.
    pub enrichment: Arc<EnrichmentService>,
    /// Motor de emisión de bloqueos con cerrojo por (ip, agente).
    pub blocker: Arc<BlockingEngine>,
    /// Ensamble de anomalías activo (consumo, no entrenamiento).
    pub anomaly_ensemble: Arc<IsolationEnsemble>,
    /// Bus de despertar para el long-poll de comandos por centinela.
    pub command_wakeups: Arc<wakeup_bus::CommandWakeupBus>,
}

impl AppState {
    /**
     * Forja una nueva instancia del Estado Maestro inyectando todas las
     * dependencias en orden de estratos.
     */
    pub fn new(database_client: DbClient, config: ServerConfig) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V9.0...");

        let shared_config = Arc::new(config);

        // Pre-hidratación de repositorios soberanos.
        let agent_repository = Arc::new(AgentRepository::new(database_client.clone()));
        let batch_repository = Arc::new(BatchRepository::new(database_client.clone()));
        let event_repository = Arc::new(EventRepository::new(database_client.clone()));
        let geo_repository = Arc::new(GeoRepository::new(database_client.clone()));
        let rule_repository = Arc::new(RuleRepository::new(database_client.clone()));
        let block_repository = Arc::new(BlockRepository::new(database_client.clone()));
        let command_repository = Arc::new(CommandRepository::new(database_client.clone()));
        let ufw_state_repository = Arc::new(UfwStateRepository::new(database_client.clone()));
        let settings_repository = Arc::new(SettingsRepository::new(database_client.clone()));
        let ml_repository = Arc::new(MlRepository::new(database_client.clone()));
        let fail2ban_repository = Arc::new(Fail2banRepository::new(database_client.clone()));

        let command_wakeups = Arc::new(wakeup_bus::CommandWakeupBus::new());

        let enrichment = Arc::new(EnrichmentService::new(
            geo_repository.clone(),
            shared_config.clone(),
        ));

        let blocker = Arc::new(BlockingEngine::new(
            block_repository.clone(),
            command_repository.clone(),
            event_repository.clone(),
            ml_repository.clone(),
            settings_repository.clone(),
            command_wakeups.clone(),
        ));

        Self {
            database_client,
            config: shared_config,
            agent_repository,
            batch_repository,
            event_repository,
            geo_repository,
            rule_repository,
            block_repository,
            command_repository,
            ufw_state_repository,
            settings_repository,
            ml_repository,
            fail2ban_repository,
            enrichment,
            blocker,
            anomaly_ensemble: Arc::new(IsolationEnsemble::baseline()),
            command_wakeups,
        }
    }
}
