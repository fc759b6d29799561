// [apps/sentinel-agent/src/state.rs]
/*!
 * =================================================================
 * APARATO: TAIL POSITION STATE (V6.0 - CRASH SAFE)
 * CLASIFICACIÓN: WORKER SUPPORT (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: PERSISTENCIA DEL TOKEN DE POSICIÓN DEL VIGÍA
 *
 * # Logic:
 * El documento JSON porta (identidad de archivo, offset) más los
 * contadores acumulados. La escritura es atómica (temporal + rename,
 * modo 0600). Un fallo de escritura se registra y la siguiente
 * escritura exitosa reconcilia; los duplicados resultantes los
 * deduplica el servidor por UUID.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailPositionState {
    /// Identidad del archivo vigilado (inode en Unix).
    pub last_inode: u64,
    /// Offset en bytes al final de la última línea confirmada.
    pub last_position: u64,
    /// Token de posición del canal lateral fail2ban (si está presente).
    #[serde(default)]
    pub fail2ban_inode: u64,
    #[serde(default)]
    pub fail2ban_position: u64,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub last_firewall_sync: Option<DateTime<Utc>>,
    pub total_logs_sent: u64,
    pub total_batches_sent: u64,
    pub agent_start_time: DateTime<Utc>,
}

impl Default for TailPositionState {
    fn default() -> Self {
        Self {
            last_inode: 0,
            last_position: 0,
            fail2ban_inode: 0,
            fail2ban_position: 0,
            last_heartbeat: None,
            last_firewall_sync: None,
            total_logs_sent: 0,
            total_batches_sent: 0,
            agent_start_time: Utc::now(),
        }
    }
}

impl TailPositionState {
    /// Carga el estado persistido; ausente o corrupto arranca de cero.
    pub fn load(state_path: &Path) -> Self {
        match fs::read_to_string(state_path) {
            Ok(raw_document) => serde_json::from_str(&raw_document).unwrap_or_else(|decode_fault| {
                warn!("⚠️ [STATE_RESET]: Corrupt state document ({}); starting fresh.", decode_fault);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /**
     * Escritura atómica con modo 0600.
     *
     * Un fallo aquí NO es fatal: el vigía re-lee desde el último offset
     * confirmado y el servidor deduplica el replay.
     */
    pub fn save(&self, state_path: &Path) -> anyhow::Result<()> {
        if let Some(parent_directory) = state_path.parent() {
            fs::create_dir_all(parent_directory)?;
        }

        let serialized_document = serde_json::to_string_pretty(self)?;
        let staging_path = state_path.with_extension("json.tmp");
        fs::write(&staging_path, serialized_document)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staging_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&staging_path, state_path)?;
        Ok(())
    }
}
