// [libs/infra/agent-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL UPLINK CLIENT (V12.0 - CONTROL PLANE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TÚNEL HTTP CENTINELA -> CENTRO DE INGESTA
 *
 * VISION HIPER-HOLÍSTICA:
 * Implementa las seis llamadas del plano de control con autenticación
 * dual de cabeceras (X-API-Key + X-Agent-ID). El registro es la única
 * llamada sin llave. Los estados 401/403 se reportan como identidad
 * revocada; el 429 como contra-presión diferida.
 * =================================================================
 */

use crate::errors::UplinkError;
use guardian_domain_models::wire::{
    Acknowledgement, CommandResultReport, HeartbeatRequest, LogBatchRequest, LogBatchResponse,
    PendingCommandsResponse, RegisterRequest, RegisterResponse, UfwSyncRequest, UfwSyncResponse,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Cabecera de llave API del plano de control.
const HEADER_API_KEY: &str = "X-API-Key";
/// Cabecera de identidad del centinela.
const HEADER_AGENT_ID: &str = "X-Agent-ID";

/// Presupuesto extremo-a-extremo para la ingesta de un lote.
const BATCH_TIMEOUT_SECONDS: u64 = 30;
/// Presupuesto nominal del resto de llamadas de control.
const CONTROL_TIMEOUT_SECONDS: u64 = 15;

pub struct AgentUplink {
    network_session_client: Client,
    ingest_base_endpoint: String,
    agent_identifier: String,
    api_key: Option<String>,
}

impl AgentUplink {
    /**
     * Inicializa el cliente de enlace.
     *
     * @param base_url Endpoint raíz del centro de ingesta.
     * @param agent_identifier Identidad estable del centinela.
     * @param api_key Llave emitida por el servidor, si ya se posee.
     */
    pub fn new(
        base_url: String,
        agent_identifier: String,
        api_key: Option<String>,
    ) -> Result<Self, UplinkError> {
        let network_session_client = Client::builder()
            .user_agent("Guardian-Sentinel/0.4")
            .timeout(Duration::from_secs(BATCH_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            network_session_client,
            ingest_base_endpoint: base_url.trim_end_matches('/').to_string(),
            agent_identifier,
            api_key,
        })
    }

    /// Adopta la llave emitida por el servidor tras el primer registro.
    pub fn adopt_api_key(&mut self, issued_key: String) {
        self.api_key = Some(issued_key);
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /**
     * Registro inicial (única llamada sin llave obligatoria).
     */
    #[instrument(skip(self, registration))]
    pub async fn register(
        &self,
        registration: &RegisterRequest,
    ) -> Result<RegisterResponse, UplinkError> {
        let target_url = format!("{}/api/agents/register", self.ingest_base_endpoint);

        let mut request_builder = self
            .network_session_client
            .post(&target_url)
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .header(HEADER_AGENT_ID, &self.agent_identifier);

        // Si ya poseemos llave, presentarla habilita el eco de verificación.
        if let Some(existing_key) = &self.api_key {
            request_builder = request_builder.header(HEADER_API_KEY, existing_key);
        }

        let network_response = request_builder.json(registration).send().await?;
        self.decode_envelope::<RegisterResponse>(network_response).await
    }

    #[instrument(skip(self, heartbeat))]
    pub async fn send_heartbeat(
        &self,
        heartbeat: &HeartbeatRequest,
    ) -> Result<Acknowledgement, UplinkError> {
        let target_url = format!("{}/api/agents/heartbeat", self.ingest_base_endpoint);
        let network_response = self
            .authorized_post(&target_url)?
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .json(heartbeat)
            .send()
            .await?;
        self.decode_envelope::<Acknowledgement>(network_response).await
    }

    /**
     * Somete un lote de líneas crudas.
     *
     * # Errors:
     * - `Deferred`: contra-presión del servidor; reintentar al próximo tick.
     * - `Unauthorized`: centinela sin aprobación o llave revocada.
     */
    #[instrument(skip(self, batch), fields(batch = %batch.batch_uuid, lines = batch.log_lines.len()))]
    pub async fn submit_log_batch(
        &self,
        batch: &LogBatchRequest,
    ) -> Result<LogBatchResponse, UplinkError> {
        let target_url = format!("{}/api/agents/logs", self.ingest_base_endpoint);
        let network_response = self.authorized_post(&target_url)?.json(batch).send().await?;
        self.decode_envelope::<LogBatchResponse>(network_response).await
    }

    #[instrument(skip(self, sync_payload), fields(rules = sync_payload.ufw_data.rules.len()))]
    pub async fn sync_firewall(
        &self,
        sync_payload: &UfwSyncRequest,
    ) -> Result<UfwSyncResponse, UplinkError> {
        let target_url = format!("{}/api/agents/ufw/sync", self.ingest_base_endpoint);
        let network_response = self
            .authorized_post(&target_url)?
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .json(sync_payload)
            .send()
            .await?;
        self.decode_envelope::<UfwSyncResponse>(network_response).await
    }

    /// Sondeo de comandos pendientes (long-poll acotado por el servidor).
    #[instrument(skip(self))]
    pub async fn poll_commands(&self) -> Result<PendingCommandsResponse, UplinkError> {
        let target_url = format!(
            "{}/api/agents/ufw/commands?agent_id={}",
            self.ingest_base_endpoint, self.agent_identifier
        );

        let mut request_builder = self
            .network_session_client
            .get(&target_url)
            .header(HEADER_AGENT_ID, &self.agent_identifier);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.header(HEADER_API_KEY, key);
        }

        let network_response = request_builder.send().await?;
        self.decode_envelope::<PendingCommandsResponse>(network_response).await
    }

    #[instrument(skip(self, report), fields(command = %report.command_id, success = report.success))]
    pub async fn report_command_result(
        &self,
        report: &CommandResultReport,
    ) -> Result<Acknowledgement, UplinkError> {
        let target_url = format!("{}/api/agents/firewall/command-result", self.ingest_base_endpoint);
        let network_response = self
            .authorized_post(&target_url)?
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECONDS))
            .json(report)
            .send()
            .await?;
        self.decode_envelope::<Acknowledgement>(network_response).await
    }

    // --- SOPORTE INTERNO DE TÚNEL ---

    fn authorized_post(&self, target_url: &str) -> Result<reqwest::RequestBuilder, UplinkError> {
        let api_key = self.api_key.as_deref().ok_or(UplinkError::Unauthorized)?;
        Ok(self
            .network_session_client
            .post(target_url)
            .header(HEADER_API_KEY, api_key)
            .header(HEADER_AGENT_ID, &self.agent_identifier))
    }

    async fn decode_envelope<T: serde::de::DeserializeOwned>(
        &self,
        network_response: reqwest::Response,
    ) -> Result<T, UplinkError> {
        match network_response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(network_response.json::<T>().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("🔐 [UPLINK]: Identity rejected by Ingest Center.");
                Err(UplinkError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                debug!("🐌 [UPLINK]: Backpressure signal received; deferring.");
                Err(UplinkError::Deferred)
            }
            other => Err(UplinkError::ServerRejection(format!("HTTP_{}", other))),
        }
    }
}
