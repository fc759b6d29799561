// [apps/sentinel-agent/src/main.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL SHELL (V11.0 - ZENITH SHELL)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: INTERFAZ DE MANDO E IGNICIÓN DEL BUCLE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VERB CONTRACT: install/uninstall/status/start/stop/restart/logs/
 *    logs-full/config/edit-config/test/health/update/info + run (el
 *    verbo de primer plano que ejecuta la unidad systemd).
 * 2. EXIT CODES: 0 éxito, 1 fallo genérico, 2 no instalado, 3 el
 *    servicio falló; 'health' retorna el conteo de chequeos fallidos.
 * 3. COOPERATIVE STOP: Ctrl-C baja la bandera atómica; el bucle vacía
 *    estado y sale dentro de un check_interval.
 * =================================================================
 */

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use guardian_infra_agent_client::AgentUplink;
use guardian_sentinel_lib::config::{AgentConfig, DEFAULT_CONFIG_PATH};
use guardian_sentinel_lib::firewall::ufw::UfwAdapter;
use guardian_sentinel_lib::health;
use guardian_sentinel_lib::reporter::SentinelReporter;
use guardian_sentinel_lib::service;

/**
 * Directivas de mando del centinela soberano.
 */
#[derive(Parser, Debug)]
#[command(
    name = "sentinel-agent",
    author = "Raz Podesta <metaShark Tech>",
    version,
    about = "SSH Guardian Sentinel // Edge telemetry and firewall actuator"
)]
struct SentinelDirectives {
    /// Ruta del archivo de configuración del centinela.
    #[arg(long, env = "SSH_GUARDIAN_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    verb: SentinelVerb,
}

#[derive(Subcommand, Debug)]
enum SentinelVerb {
    /// Ejecuta el bucle cooperativo en primer plano (usado por systemd).
    Run,
    /// Instala binario, configuración semilla y unidad systemd.
    Install,
    /// Remueve la unidad systemd (configuración y estado se preservan).
    Uninstall,
    /// Estado de la unidad (exit 2 si no está instalada).
    Status,
    /// Arranca el servicio.
    Start,
    /// Detiene el servicio.
    Stop,
    /// Reinicia el servicio.
    Restart,
    /// Últimas 100 líneas del journal.
    Logs,
    /// Journal completo de la unidad.
    LogsFull,
    /// Imprime la configuración vigente (llave API enmascarada).
    Config,
    /// Abre la configuración en $EDITOR.
    EditConfig,
    /// Prueba la cadena completa: config, vigía y alcance del servidor.
    Test,
    /// Chequeos de salud; el código de salida es el conteo de fallos.
    Health,
    /// Redespliega el binario en curso y reinicia la unidad.
    Update,
    /// Resumen operacional del centinela.
    Info,
}

fn main() {
    let directives = SentinelDirectives::parse();

    let exit_code = match directives.verb {
        SentinelVerb::Run => run_foreground(&directives.config),
        SentinelVerb::Install => service::install(&directives.config),
        SentinelVerb::Uninstall => service::uninstall(),
        SentinelVerb::Status => service::status(),
        SentinelVerb::Start => service::start(),
        SentinelVerb::Stop => service::stop(),
        SentinelVerb::Restart => service::restart(),
        SentinelVerb::Logs => service::logs(false),
        SentinelVerb::LogsFull => service::logs(true),
        SentinelVerb::Config => print_config(&directives.config),
        SentinelVerb::EditConfig => service::edit_config(&directives.config),
        SentinelVerb::Test => run_async(run_chain_test(&directives.config)),
        SentinelVerb::Health => run_async(run_health(&directives.config)),
        SentinelVerb::Update => service::update(),
        SentinelVerb::Info => service::print_info(&directives.config),
    };

    exit(exit_code);
}

/**
 * Verbo 'run': el bucle cooperativo de primer plano.
 */
fn run_foreground(config_path: &PathBuf) -> i32 {
    tracing_subscriber::fmt::init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(runtime_fault) => {
            eprintln!("FATAL: runtime ignition failed: {runtime_fault}");
            return service::EXIT_GENERIC_FAILURE;
        }
    };

    runtime.block_on(async {
        info!("💠 [SHELL]: Sentinel ignition sequence starting...");

        // 1. CAPAS DE CONFIGURACIÓN (archivo < entorno < defaults)
        let config = match AgentConfig::load(config_path) {
            Ok(config) => config,
            Err(config_fault) => {
                warn!("❌ [CONFIG_FAULT]: {}", config_fault);
                return service::EXIT_GENERIC_FAILURE;
            }
        };

        // 2. PROTOCOLO DE SEÑALES (terminación ordenada)
        let termination_signal = Arc::new(AtomicBool::new(true));
        let signal_flag_reference = Arc::clone(&termination_signal);
        tokio::spawn(async move {
            if (tokio::signal::ctrl_c().await).is_ok() {
                warn!("⚠️ [SIGNAL]: Termination requested by host. Sealing state...");
                signal_flag_reference.store(false, Ordering::SeqCst);
            }
        });

        // 3. ENLACE TÁCTICO CON EL CENTRO DE INGESTA
        let uplink = match AgentUplink::new(
            config.server_url.clone(),
            config.agent_id.clone(),
            config.api_key.clone(),
        ) {
            Ok(uplink) => uplink,
            Err(uplink_fault) => {
                warn!("❌ [UPLINK_FAULT]: {}", uplink_fault);
                return service::EXIT_GENERIC_FAILURE;
            }
        };

        // 4. ADAPTADOR DE CORTAFUEGOS (degradación sin ufw)
        let firewall = if config.firewall_enabled {
            match UfwAdapter::discover() {
                Ok(adapter) => Some(adapter),
                Err(absence) => {
                    warn!("🧱 [DEGRADED]: {} — firewall management disabled.", absence);
                    None
                }
            }
        } else {
            None
        };

        // 5. IGNICIÓN DEL BUCLE COOPERATIVO
        let reporter = SentinelReporter::new(
            config,
            config_path.clone(),
            uplink,
            firewall,
            termination_signal,
        );
        reporter.run().await;

        service::EXIT_OK
    })
}

/// Verbo 'config': volcado con la llave API enmascarada.
fn print_config(config_path: &PathBuf) -> i32 {
    match AgentConfig::load(config_path) {
        Ok(mut config) => {
            if config.api_key.is_some() {
                config.api_key = Some("********".to_string());
            }
            match serde_json::to_string_pretty(&config) {
                Ok(rendered) => {
                    println!("{rendered}");
                    service::EXIT_OK
                }
                Err(_) => service::EXIT_GENERIC_FAILURE,
            }
        }
        Err(load_fault) => {
            eprintln!("config unreadable: {load_fault}");
            service::EXIT_GENERIC_FAILURE
        }
    }
}

/// Verbo 'test': cadena config -> vigía -> servidor.
async fn run_chain_test(config_path: &PathBuf) -> i32 {
    let config = match AgentConfig::load(config_path) {
        Ok(config) => config,
        Err(load_fault) => {
            println!("❌ config: {load_fault}");
            return service::EXIT_GENERIC_FAILURE;
        }
    };
    println!("✅ config: loaded ({})", config_path.display());

    let tailer = guardian_sentinel_lib::tailer::LogTailer::new(config.auth_log_path.clone());
    let pass = tailer.collect_new_lines(0, 0);
    println!("✅ tailer: {} relevant lines visible", pass.lines.len());

    let health_url = format!("{}/health", config.server_url.trim_end_matches('/'));
    match reqwest::get(&health_url).await {
        Ok(response) if response.status().is_success() => {
            println!("✅ server: reachable ({health_url})");
            service::EXIT_OK
        }
        Ok(response) => {
            println!("❌ server: HTTP_{}", response.status());
            service::EXIT_GENERIC_FAILURE
        }
        Err(transport_fault) => {
            println!("❌ server: {transport_fault}");
            service::EXIT_GENERIC_FAILURE
        }
    }
}

/// Verbo 'health': el código de salida es el conteo de fallos.
async fn run_health(config_path: &PathBuf) -> i32 {
    let probes = health::run_health_probes(config_path).await;
    for probe in &probes {
        let marker = if probe.passed { "✅" } else { "❌" };
        println!("{marker} {}: {}", probe.name, probe.detail);
    }
    health::failed_count(&probes)
}

fn run_async(future: impl std::future::Future<Output = i32>) -> i32 {
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(future),
        Err(_) => service::EXIT_GENERIC_FAILURE,
    }
}
