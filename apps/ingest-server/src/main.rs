// [apps/ingest-server/src/main.rs]
/*!
 * =================================================================
 * APARATO: INGEST SERVER MAIN ENTRY POINT (V8.0 - GOLD MASTER)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * # Mathematical Proof (Deterministic Ignition):
 * El proceso garantiza que la siembra de gobernanza (pesos + reglas)
 * ocurra antes que la apertura del socket TCP, previniendo estados de
 * carrera donde un lote temprano se puntúe sin catálogo en el Ledger.
 * =================================================================
 */

use guardian_ingest_server::prelude::*;

use dotenvy::dotenv;
use guardian_shared_watchtower::init_tracing;
use tracing::{error, info};

/**
 * Punto de ignición supremo del binario del Centro de Ingesta.
 */
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD NEURAL (WATCHTOWER)
    init_tracing("guardian_ingest_server");

    // 3. RUNTIME SOBERANO MULTI-HILO
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        info!("🛰️  [INGEST_CENTER]: Global ignition sequence starting...");

        // 4. CAPTURA ÚNICA DE CONFIGURACIÓN
        let server_config = match ServerConfig::from_env() {
            Ok(config) => config,
            Err(config_fault) => {
                error!("❌ [CONFIG_FAULT]: {}", config_fault);
                std::process::exit(1);
            }
        };

        // 5. CONSTRUCCIÓN DEL KERNEL SOBERANO (ESTRATO L1-APP)
        let kernel_instance = match IngestKernel::ignite(server_config).await {
            Ok(kernel) => kernel,
            Err(ignition_fault) => {
                error!("❌ [IGNITION_FAULT]: {}", ignition_fault);
                std::process::exit(1);
            }
        };

        // 6. IGNICIÓN DE OPERACIONES DEL PLANO DE CONTROL
        info!(
            "🚀 [GUARDIAN_ONLINE]: System fully operational on port {}.",
            kernel_instance.server_network_port
        );
        kernel_instance.launch_control_plane().await;

        Ok(())
    })
}
