// [apps/sentinel-agent/src/service.rs]
/*!
 * =================================================================
 * APARATO: SYSTEMD SERVICE MANAGER (V10.0 - LIFECYCLE VERBS)
 * CLASIFICACIÓN: WORKER SUPPORT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: INSTALACIÓN Y CICLO DE VIDA DEL SERVICIO
 *
 * # Exit codes del contrato CLI:
 * 0 éxito, 1 fallo genérico, 2 'no instalado', 3 'el servicio falló'.
 * =================================================================
 */

use crate::config::{AgentConfig, DEFAULT_CONFIG_PATH};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Nombre nominal de la unidad systemd.
pub const SERVICE_UNIT_NAME: &str = "ssh-guardian-agent";
/// Ruta de la unidad en el hospedaje.
pub const SERVICE_UNIT_PATH: &str = "/etc/systemd/system/ssh-guardian-agent.service";
/// Destino del binario instalado.
pub const INSTALLED_BINARY_PATH: &str = "/usr/local/bin/sentinel-agent";

// Códigos de salida del contrato CLI.
pub const EXIT_OK: i32 = 0;
pub const EXIT_GENERIC_FAILURE: i32 = 1;
pub const EXIT_NOT_INSTALLED: i32 = 2;
pub const EXIT_SERVICE_FAILED: i32 = 3;

pub fn is_installed() -> bool {
    Path::new(SERVICE_UNIT_PATH).exists()
}

/**
 * Instala binario + configuración por defecto + unidad systemd.
 */
pub fn install(config_path: &Path) -> i32 {
    // 1. Binario: copia del ejecutable en curso al destino nominal.
    let running_binary = match std::env::current_exe() {
        Ok(path) => path,
        Err(locate_fault) => {
            warn!("❌ [INSTALL]: Cannot locate running binary: {}", locate_fault);
            return EXIT_GENERIC_FAILURE;
        }
    };
    if running_binary != PathBuf::from(INSTALLED_BINARY_PATH) {
        if let Err(copy_fault) = fs::copy(&running_binary, INSTALLED_BINARY_PATH) {
            warn!("❌ [INSTALL]: Binary deployment failed: {}", copy_fault);
            return EXIT_GENERIC_FAILURE;
        }
    }

    // 2. Configuración inicial (solo si no existe: respeta la sintonía).
    if !config_path.exists() {
        let seeded_config = AgentConfig::default();
        if let Err(seed_fault) = seeded_config.save(config_path) {
            warn!("❌ [INSTALL]: Config seeding failed: {}", seed_fault);
            return EXIT_GENERIC_FAILURE;
        }
    }

    // 3. Unidad systemd.
    let unit_document = render_unit_document(config_path);
    if let Err(unit_fault) = fs::write(SERVICE_UNIT_PATH, unit_document) {
        warn!("❌ [INSTALL]: Unit write failed: {}", unit_fault);
        return EXIT_GENERIC_FAILURE;
    }

    if !systemctl(&["daemon-reload"]) || !systemctl(&["enable", SERVICE_UNIT_NAME]) {
        return EXIT_SERVICE_FAILED;
    }

    info!("✅ [INSTALLED]: Unit [{}] enabled. Start with 'sentinel-agent start'.", SERVICE_UNIT_NAME);
    EXIT_OK
}

pub fn uninstall() -> i32 {
    if !is_installed() {
        return EXIT_NOT_INSTALLED;
    }

    let _ = systemctl(&["stop", SERVICE_UNIT_NAME]);
    let _ = systemctl(&["disable", SERVICE_UNIT_NAME]);

    if let Err(removal_fault) = fs::remove_file(SERVICE_UNIT_PATH) {
        warn!("❌ [UNINSTALL]: Unit removal failed: {}", removal_fault);
        return EXIT_GENERIC_FAILURE;
    }
    let _ = systemctl(&["daemon-reload"]);

    info!("🗑️ [UNINSTALLED]: Unit removed (config and state preserved).");
    EXIT_OK
}

pub fn start() -> i32 {
    lifecycle_verb(&["start", SERVICE_UNIT_NAME])
}

pub fn stop() -> i32 {
    lifecycle_verb(&["stop", SERVICE_UNIT_NAME])
}

pub fn restart() -> i32 {
    lifecycle_verb(&["restart", SERVICE_UNIT_NAME])
}

pub fn status() -> i32 {
    if !is_installed() {
        println!("not installed");
        return EXIT_NOT_INSTALLED;
    }

    let probe = Command::new("systemctl").args(["is-active", SERVICE_UNIT_NAME]).output();
    match probe {
        Ok(output) => {
            let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
            println!("{state}");
            if output.status.success() {
                EXIT_OK
            } else {
                EXIT_SERVICE_FAILED
            }
        }
        Err(_) => EXIT_SERVICE_FAILED,
    }
}

/// Últimas 100 líneas del journal de la unidad.
pub fn logs(full_journal: bool) -> i32 {
    if !is_installed() {
        return EXIT_NOT_INSTALLED;
    }

    let mut arguments = vec!["-u", SERVICE_UNIT_NAME, "--no-pager"];
    if !full_journal {
        arguments.extend(["-n", "100"]);
    }

    match Command::new("journalctl").args(&arguments).status() {
        Ok(status) if status.success() => EXIT_OK,
        _ => EXIT_SERVICE_FAILED,
    }
}

/// Redespliegue del binario en curso + reinicio de la unidad.
pub fn update() -> i32 {
    if !is_installed() {
        return EXIT_NOT_INSTALLED;
    }

    let running_binary = match std::env::current_exe() {
        Ok(path) => path,
        Err(_) => return EXIT_GENERIC_FAILURE,
    };
    if running_binary != PathBuf::from(INSTALLED_BINARY_PATH) {
        if let Err(copy_fault) = fs::copy(&running_binary, INSTALLED_BINARY_PATH) {
            warn!("❌ [UPDATE]: Binary redeployment failed: {}", copy_fault);
            return EXIT_GENERIC_FAILURE;
        }
    }
    restart()
}

/// Abre la configuración en $EDITOR (vi como respaldo).
pub fn edit_config(config_path: &Path) -> i32 {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    match Command::new(editor).arg(config_path).status() {
        Ok(status) if status.success() => EXIT_OK,
        _ => EXIT_GENERIC_FAILURE,
    }
}

/// Resumen operacional del centinela para el operador.
pub fn print_info(config_path: &Path) -> i32 {
    println!("sentinel-agent {}", env!("CARGO_PKG_VERSION"));
    println!("unit:        {SERVICE_UNIT_PATH}");
    println!("binary:      {INSTALLED_BINARY_PATH}");
    println!("config:      {}", config_path.display());

    match AgentConfig::load(config_path) {
        Ok(config) => {
            println!("server_url:  {}", config.server_url);
            println!("agent_id:    {}", config.agent_id);
            println!("auth_log:    {}", config.auth_log_path.display());
            println!("state_file:  {}", config.state_file.display());
            println!("firewall:    {}", if config.firewall_enabled { "enabled" } else { "disabled" });
            println!("api_key:     {}", if config.api_key.is_some() { "present" } else { "absent" });
            EXIT_OK
        }
        Err(load_fault) => {
            println!("config:      unreadable ({load_fault})");
            EXIT_GENERIC_FAILURE
        }
    }
}

fn lifecycle_verb(arguments: &[&str]) -> i32 {
    if !is_installed() {
        return EXIT_NOT_INSTALLED;
    }
    if systemctl(arguments) {
        EXIT_OK
    } else {
        EXIT_SERVICE_FAILED
    }
}

fn systemctl(arguments: &[&str]) -> bool {
    Command::new("systemctl")
        .args(arguments)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn render_unit_document(config_path: &Path) -> String {
    format!(
        "[Unit]\n\
         Description=SSH Guardian Sentinel Agent\n\
         After=network-online.target\n\
         Wants=network-online.target\n\n\
         [Service]\n\
         Type=simple\n\
         ExecStart={INSTALLED_BINARY_PATH} --config {} run\n\
         Restart=on-failure\n\
         RestartSec=10\n\
         User=root\n\n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        config_path.display()
    )
}

/// Ruta de configuración nominal para los verbos del servicio.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_document_points_at_run_verb() {
        let document = render_unit_document(Path::new("/etc/ssh-guardian/agent-config.json"));
        assert!(document.contains("ExecStart=/usr/local/bin/sentinel-agent"));
        assert!(document.contains(" run"));
        assert!(document.contains("Restart=on-failure"));
    }
}
