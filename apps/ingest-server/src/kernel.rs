// INICIO DEL ARCHIVO [apps/ingest-server/src/kernel.rs]
/**
 * =================================================================
 * APARATO: INGEST SOVEREIGN KERNEL (V14.0 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios: la
 * siembra de gobernanza (ajustes + catálogo de reglas) ocurre ANTES de
 * abrir el socket TCP, previniendo que un lote temprano se puntúe sin
 * pesos ni reglas en el Ledger.
 * =================================================================
 */

use crate::config::ServerConfig;
use crate::routes::create_control_plane_router;
use crate::services::{spawn_reaper, spawn_reconciler, spawn_unblock_warden};
use crate::state::AppState;
use guardian_infra_db::DbClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument};

pub struct IngestKernel {
    pub server_network_port: u16,
    pub application_shared_state: AppState,
}

impl IngestKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado neural.
     * Establece la conexión al Ledger antes de levantar servicios.
     */
    #[instrument(skip(config))]
    pub async fn ignite(config: ServerConfig) -> anyhow::Result<Self> {
        let database_client =
            DbClient::connect(&config.database_url, config.database_token.clone()).await?;

        let listening_port = config.listening_port;
        let application_shared_state = AppState::new(database_client, config);

        // SIEMBRA DE GOBERNANZA: pesos, umbrales y catálogo de reglas.
        application_shared_state.settings_repository.seed_defaults().await?;
        let high_risk_catalog =
            application_shared_state.settings_repository.high_risk_countries().await?;
        application_shared_state.rule_repository.seed_defaults(&high_risk_catalog).await?;

        Ok(Self { server_network_port: listening_port, application_shared_state })
    }

    /**
     * Lanza los daemons de mantenimiento y el servidor HTTP principal.
     */
    pub async fn launch_control_plane(self) {
        let shared_application_state = self.application_shared_state.clone();

        // --- 1. DAEMONS DE MANTENIMIENTO TÁCTICO ---

        // A. Higiene del Ledger (desconexión + retención)
        spawn_reaper(shared_application_state.clone()).await;

        // B. Liberación de bloqueos vencidos
        spawn_unblock_warden(shared_application_state.clone()).await;

        // C. Auditor de paridad borde <-> Ledger
        spawn_reconciler(shared_application_state.clone()).await;

        // --- 2. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let control_plane_router = create_control_plane_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static bind address"),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Guardian Ingest Center listening at {}", bind_address);

        let tcp_listener = match tokio::net::TcpListener::bind(bind_address).await {
            Ok(listener) => listener,
            Err(bind_fault) => {
                error!("💀 [KERNEL_COLLAPSE]: Failed to bind network port: {}", bind_fault);
                std::process::exit(1);
            }
        };

        if let Err(server_error) = axum::serve(tcp_listener, control_plane_router).await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }
    }
}
// FIN DEL ARCHIVO [apps/ingest-server/src/kernel.rs]
