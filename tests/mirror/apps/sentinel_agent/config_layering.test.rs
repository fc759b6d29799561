// [tests/mirror/apps/sentinel_agent/config_layering.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CAPAS DE CONFIGURACIÓN (V3.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: PRECEDENCIA entorno > archivo > defaults
 * =================================================================
 */

use guardian_sentinel_lib::config::AgentConfig;
use std::env;
use std::path::PathBuf;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /**
     * CERTIFICACIÓN: La precedencia de capas se resuelve campo a campo
     * (secuencial en un solo test: el entorno del proceso es global).
     */
    #[test]
    fn certify_layer_precedence_field_by_field() {
        println!("\n⚙️ [INICIO]: Auditoría de Capas de Configuración V3.0...");
        let workspace = tempdir().expect("ephemeral dir");
        let config_path = workspace.path().join("agent-config.json");

        // FASE 1: Solo defaults (archivo ausente, entorno limpio).
        println!("   🧪 Fase 1: Defaults compilados...");
        let defaults = AgentConfig::load(&config_path).expect("defaults");
        assert_eq!(defaults.batch_size, 100);
        assert_eq!(defaults.check_interval, 10);

        // FASE 2: El archivo sobreescribe los defaults.
        println!("   🧪 Fase 2: El archivo gana a los defaults...");
        std::fs::write(
            &config_path,
            r#"{
                "server_url": "https://guardian.example.org",
                "agent_id": "sentinel-from-file",
                "batch_size": 50,
                "auth_log_path": "/var/log/secure"
            }"#,
        )
        .expect("config document");

        let from_file = AgentConfig::load(&config_path).expect("file layer");
        assert_eq!(from_file.server_url, "https://guardian.example.org");
        assert_eq!(from_file.agent_id, "sentinel-from-file");
        assert_eq!(from_file.batch_size, 50);
        assert_eq!(from_file.auth_log_path, PathBuf::from("/var/log/secure"));
        assert_eq!(from_file.heartbeat_interval, 60, "untouched fields inherit defaults");

        // FASE 3: El entorno SSH_GUARDIAN_* gana al archivo.
        println!("   🧪 Fase 3: El entorno gana al archivo...");
        env::set_var("SSH_GUARDIAN_SERVER_URL", "https://env-wins.example.org");
        env::set_var("SSH_GUARDIAN_BATCH_SIZE", "25");
        env::set_var("SSH_GUARDIAN_FIREWALL_ENABLED", "false");

        let from_environment = AgentConfig::load(&config_path).expect("environment layer");
        assert_eq!(from_environment.server_url, "https://env-wins.example.org");
        assert_eq!(from_environment.batch_size, 25);
        assert!(!from_environment.firewall_enabled);
        assert_eq!(from_environment.agent_id, "sentinel-from-file", "file survives where env is silent");

        // FASE 4: Higiene del entorno del proceso.
        env::remove_var("SSH_GUARDIAN_SERVER_URL");
        env::remove_var("SSH_GUARDIAN_BATCH_SIZE");
        env::remove_var("SSH_GUARDIAN_FIREWALL_ENABLED");

        println!("🏁 [INFORME]: Capas de Configuración certificadas GOLD_MASTER.");
    }

    /**
     * CERTIFICACIÓN: El guardado persiste la llave API con modo 0600.
     */
    #[cfg(unix)]
    #[test]
    fn certify_saved_config_carries_0600_mode() {
        use std::os::unix::fs::PermissionsExt;

        let workspace = tempdir().expect("ephemeral dir");
        let config_path = workspace.path().join("agent-config.json");

        let mut config = AgentConfig::default();
        config.api_key = Some("sgk_certification_material".to_string());
        config.save(&config_path).expect("config sealed");

        let mode = std::fs::metadata(&config_path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "the key-bearing file must be 0600");

        let replayed = AgentConfig::load(&config_path).expect("replay");
        assert_eq!(replayed.api_key.as_deref(), Some("sgk_certification_material"));
    }
}
