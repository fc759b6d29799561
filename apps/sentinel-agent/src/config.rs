// [apps/sentinel-agent/src/config.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL CONFIGURATION LAYERS (V9.0 - TRIPLE OVERRIDE)
 * CLASIFICACIÓN: WORKER SUPPORT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: CAPAS DE CONFIGURACIÓN CON MODO 0600
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRIPLE OVERRIDE: Variables SSH_GUARDIAN_* > archivo JSON >
 *    defaults compilados, resuelto campo a campo.
 * 2. SECRET HYGIENE: El archivo porta la llave API; se escribe
 *    atómicamente (temporal + rename) con modo 0600.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Ruta nominal del archivo de configuración del centinela.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ssh-guardian/agent-config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub agent_id: String,
    pub hostname: String,

    /// Segundos de sueño entre ticks del bucle cooperativo.
    pub check_interval: u64,
    /// Líneas por rebanada de lote.
    pub batch_size: usize,
    pub heartbeat_interval: u64,
    pub firewall_sync_interval: u64,
    pub firewall_enabled: bool,

    pub auth_log_path: PathBuf,
    /// Log de fail2ban si está presente en el borde (canal lateral).
    pub fail2ban_log_path: Option<PathBuf>,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            api_key: None,
            agent_id: default_agent_identifier(),
            hostname: read_hostname(),
            check_interval: 10,
            batch_size: 100,
            heartbeat_interval: 60,
            firewall_sync_interval: 300,
            firewall_enabled: true,
            auth_log_path: PathBuf::from("/var/log/auth.log"),
            fail2ban_log_path: Some(PathBuf::from("/var/log/fail2ban.log")),
            state_file: PathBuf::from("/var/lib/ssh-guardian/agent-state.json"),
            log_file: PathBuf::from("/var/log/ssh-guardian/agent.log"),
        }
    }
}

impl AgentConfig {
    /**
     * Hidrata la configuración: defaults <- archivo <- entorno.
     *
     * Un archivo ausente no es fatal (primera instalación); un archivo
     * malformado sí lo es (configuración corrupta jamás se adivina).
     */
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let mut resolved_config = if config_path.exists() {
            let raw_document = fs::read_to_string(config_path)?;
            serde_json::from_str::<AgentConfig>(&raw_document)?
        } else {
            AgentConfig::default()
        };

        resolved_config.apply_environment_overrides();
        Ok(resolved_config)
    }

    /// Capa superior: variables de entorno SSH_GUARDIAN_*.
    pub fn apply_environment_overrides(&mut self) {
        if let Ok(value) = env::var("SSH_GUARDIAN_SERVER_URL") {
            self.server_url = value;
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_API_KEY") {
            self.api_key = Some(value);
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_AGENT_ID") {
            self.agent_id = value;
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_HOSTNAME") {
            self.hostname = value;
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_CHECK_INTERVAL") {
            if let Ok(parsed) = value.parse() {
                self.check_interval = parsed;
            }
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_BATCH_SIZE") {
            if let Ok(parsed) = value.parse() {
                self.batch_size = parsed;
            }
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_HEARTBEAT_INTERVAL") {
            if let Ok(parsed) = value.parse() {
                self.heartbeat_interval = parsed;
            }
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_FIREWALL_SYNC_INTERVAL") {
            if let Ok(parsed) = value.parse() {
                self.firewall_sync_interval = parsed;
            }
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_FIREWALL_ENABLED") {
            self.firewall_enabled = value != "0" && value.to_lowercase() != "false";
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_AUTH_LOG_PATH") {
            self.auth_log_path = PathBuf::from(value);
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_FAIL2BAN_LOG_PATH") {
            self.fail2ban_log_path =
                if value.is_empty() { None } else { Some(PathBuf::from(value)) };
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_STATE_FILE") {
            self.state_file = PathBuf::from(value);
        }
        if let Ok(value) = env::var("SSH_GUARDIAN_LOG_FILE") {
            self.log_file = PathBuf::from(value);
        }
    }

    /**
     * Escritura atómica con modo 0600 (el archivo porta la llave API).
     */
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent_directory) = config_path.parent() {
            fs::create_dir_all(parent_directory)?;
        }

        let serialized_document = serde_json::to_string_pretty(self)?;
        let staging_path = config_path.with_extension("json.tmp");
        fs::write(&staging_path, serialized_document)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&staging_path, config_path)?;
        Ok(())
    }
}

fn default_agent_identifier() -> String {
    format!("sentinel-{}", read_hostname())
}

fn read_hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .map(|raw| raw.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown-host".to_string())
}
