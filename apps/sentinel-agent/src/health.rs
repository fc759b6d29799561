// [apps/sentinel-agent/src/health.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL HEALTH PROBES (V5.0 - EXIT CODE CONTRACT)
 * CLASIFICACIÓN: WORKER SUPPORT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CHEQUEOS DE SALUD; EL CÓDIGO DE SALIDA ES EL CONTEO
 * =================================================================
 */

use crate::config::AgentConfig;
use crate::firewall::ufw::UfwAdapter;
use std::path::Path;
use std::time::Duration;

/// Veredicto individual de un chequeo.
#[derive(Debug)]
pub struct HealthProbe {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/**
 * Ejecuta la batería completa; el código de salida del verbo 'health'
 * es exactamente la cantidad de chequeos fallidos.
 */
pub async fn run_health_probes(config_path: &Path) -> Vec<HealthProbe> {
    let mut probes = Vec::new();

    // 1. Configuración legible.
    let loaded_config = AgentConfig::load(config_path);
    probes.push(match &loaded_config {
        Ok(_) => probe_ok("config_readable", format!("{}", config_path.display())),
        Err(load_fault) => probe_failed("config_readable", load_fault.to_string()),
    });

    let Ok(config) = loaded_config else {
        return probes; // Sin configuración, el resto no es evaluable.
    };

    // 2. Log de autenticación legible.
    probes.push(match std::fs::File::open(&config.auth_log_path) {
        Ok(_) => probe_ok("auth_log_readable", format!("{}", config.auth_log_path.display())),
        Err(open_fault) => probe_failed("auth_log_readable", open_fault.to_string()),
    });

    // 3. Directorio de estado escribible.
    let state_directory = config.state_file.parent().unwrap_or(Path::new("/"));
    let writability_probe = state_directory.join(".guardian-health-probe");
    probes.push(match std::fs::write(&writability_probe, b"probe") {
        Ok(_) => {
            let _ = std::fs::remove_file(&writability_probe);
            probe_ok("state_dir_writable", format!("{}", state_directory.display()))
        }
        Err(write_fault) => probe_failed("state_dir_writable", write_fault.to_string()),
    });

    // 4. Cortafuegos presente (solo si la gestión está habilitada).
    if config.firewall_enabled {
        probes.push(match UfwAdapter::discover() {
            Ok(_) => probe_ok("firewall_present", "ufw located".to_string()),
            Err(absence) => probe_failed("firewall_present", absence.to_string()),
        });
    }

    // 5. Centro de ingesta alcanzable.
    let health_url = format!("{}/health", config.server_url.trim_end_matches('/'));
    let reachability = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .ok();
    let server_probe = match reachability {
        Some(client) => match client.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => {
                probe_ok("server_reachable", health_url)
            }
            Ok(response) => probe_failed("server_reachable", format!("HTTP_{}", response.status())),
            Err(transport_fault) => probe_failed("server_reachable", transport_fault.to_string()),
        },
        None => probe_failed("server_reachable", "client construction failed".to_string()),
    };
    probes.push(server_probe);

    probes
}

pub fn failed_count(probes: &[HealthProbe]) -> i32 {
    probes.iter().filter(|probe| !probe.passed).count() as i32
}

fn probe_ok(name: &'static str, detail: String) -> HealthProbe {
    HealthProbe { name, passed: true, detail }
}

fn probe_failed(name: &'static str, detail: String) -> HealthProbe {
    HealthProbe { name, passed: false, detail }
}
