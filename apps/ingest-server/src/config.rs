// [apps/ingest-server/src/config.rs]
/*!
 * =================================================================
 * APARATO: SERVER CONFIGURATION RECORD (V6.0 - SINGLE LOAD)
 * CLASIFICACIÓN: COMPOSITION SUPPORT (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA ÚNICA DE ENTORNO E INYECCIÓN EXPLÍCITA
 *
 * # Logic:
 * La configuración se hidrata UNA vez en el arranque y viaja inyectada
 * a cada componente; ningún estrato vuelve a leer el entorno.
 * =================================================================
 */

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub database_token: Option<String>,
    pub listening_port: u16,

    /// Token del operador para la superficie administrativa mínima.
    pub admin_token: Option<String>,

    // --- ENRIQUECIMIENTO EXTERNO ---
    pub abuseipdb_api_key: Option<String>,
    pub virustotal_api_key: Option<String>,
    /// Apagado maestro de consultas externas (suites de certificación).
    pub external_lookups_enabled: bool,
    pub geolocation_timeout: Duration,
    pub reputation_timeout: Duration,

    /// Espera máxima del long-poll de comandos, lado servidor.
    pub command_poll_wait: Duration,
}

impl ServerConfig {
    /**
     * Hidrata el registro desde el entorno del proceso.
     *
     * # Errors:
     * Retorna error si DATABASE_URL no está definida.
     */
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment."))?;

        let listening_port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .unwrap_or(8000);

        Ok(Self {
            database_url,
            database_token: env::var("GUARDIAN_DB_TOKEN").ok(),
            listening_port,
            admin_token: env::var("GUARDIAN_ADMIN_TOKEN").ok(),
            abuseipdb_api_key: env::var("ABUSEIPDB_API_KEY").ok(),
            virustotal_api_key: env::var("VIRUSTOTAL_API_KEY").ok(),
            external_lookups_enabled: env::var("GUARDIAN_EXTERNAL_LOOKUPS")
                .map(|flag| flag != "0" && flag.to_lowercase() != "false")
                .unwrap_or(true),
            geolocation_timeout: Duration::from_secs(5),
            reputation_timeout: Duration::from_secs(10),
            command_poll_wait: Duration::from_secs(
                env::var("GUARDIAN_POLL_WAIT_SECONDS")
                    .ok()
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(20),
            ),
        })
    }

    /// Configuración hermética para las suites de certificación.
    pub fn for_tests(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            database_token: None,
            listening_port: 0,
            admin_token: Some("observer".to_string()),
            abuseipdb_api_key: None,
            virustotal_api_key: None,
            external_lookups_enabled: false,
            geolocation_timeout: Duration::from_secs(1),
            reputation_timeout: Duration::from_secs(1),
            command_poll_wait: Duration::from_millis(50),
        }
    }
}
