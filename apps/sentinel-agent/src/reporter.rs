// [apps/sentinel-agent/src/reporter.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL REPORTER LOOP (V17.0 - COOPERATIVE CORE)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: EL BUCLE COOPERATIVO ÚNICO DEL CENTINELA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE LOOP: Un proceso, un bucle lógico; sin trabajadores
 *    paralelos ni estado mutable compartido más allá del archivo de
 *    estado y la sesión en memoria.
 * 2. NO ADVANCE ON FAILURE: La posición persistida solo avanza tras un
 *    envío exitoso; el siguiente tick re-lee desde el offset guardado
 *    y el servidor deduplica el replay.
 * 3. SERIALIZED COMMANDS: A lo sumo un subproceso de cortafuegos en
 *    vuelo; las directivas se ejecutan en orden y cada resultado se
 *    reporta individualmente.
 * 4. NEVER EXIT ON RECOVERABLE: Los fallos de transporte se registran;
 *    el próximo tick ES el reintento.
 * =================================================================
 */

use crate::config::AgentConfig;
use crate::firewall::FirewallAdapter;
use crate::metrics::HostMonitor;
use crate::state::TailPositionState;
use crate::tailer::{LogTailer, TailedLine};
use chrono::Utc;
use guardian_domain_models::wire::{
    CommandResultReport, HeartbeatRequest, LogBatchRequest, RegisterRequest, UfwSyncRequest,
};
use guardian_infra_agent_client::AgentUplink;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct SentinelReporter<F: FirewallAdapter> {
    config: AgentConfig,
    config_path: PathBuf,
    uplink: AgentUplink,
    auth_tailer: LogTailer,
    fail2ban_tailer: Option<LogTailer>,
    firewall: Option<F>,
    is_operational_signal: Arc<AtomicBool>,
    state: TailPositionState,
}

impl<F: FirewallAdapter> SentinelReporter<F> {
    pub fn new(
        config: AgentConfig,
        config_path: PathBuf,
        uplink: AgentUplink,
        firewall: Option<F>,
        is_operational_signal: Arc<AtomicBool>,
    ) -> Self {
        let state = TailPositionState::load(&config.state_file);
        let auth_tailer = LogTailer::new(config.auth_log_path.clone());
        let fail2ban_tailer = config.fail2ban_log_path.clone().map(LogTailer::new);

        Self {
            config,
            config_path,
            uplink,
            auth_tailer,
            fail2ban_tailer,
            firewall,
            is_operational_signal,
            state,
        }
    }

    /**
     * Bucle principal del centinela.
     *
     * Cada tick: (1) vigía -> lotes, (2) latido si vence, (3) sincronía
     * de cortafuegos si vence, (4) sondeo + ejecución de comandos.
     * La señal de parada vacía el estado y sale limpiamente.
     */
    #[instrument(skip(self), fields(agent = %self.config.agent_id))]
    pub async fn run(mut self) {
        info!("🛡️ [SENTINEL]: Cooperative loop ignition (tick = {}s).", self.config.check_interval);

        self.attempt_registration().await;

        while self.is_operational_signal.load(Ordering::SeqCst) {
            // Sin llave no hay plano de control: reintentar el handshake.
            if !self.uplink.has_api_key() {
                self.attempt_registration().await;
            }

            // 1. VIGÍA DEL LOG DE AUTENTICACIÓN
            self.drain_auth_log().await;

            // 1b. CANAL LATERAL FAIL2BAN (si está presente en el borde)
            self.drain_fail2ban_log().await;

            // 2. LATIDO DE VIDA
            let heartbeat_due = match self.state.last_heartbeat {
                Some(last_heartbeat) => {
                    (Utc::now() - last_heartbeat).num_seconds() as u64
                        >= self.config.heartbeat_interval
                }
                None => true,
            };
            if heartbeat_due {
                self.send_heartbeat().await;
            }

            // 3. SINCRONÍA DE INVENTARIO DE CORTAFUEGOS
            if self.config.firewall_enabled && self.firewall.is_some() {
                let sync_due = match self.state.last_firewall_sync {
                    Some(last_sync) => {
                        (Utc::now() - last_sync).num_seconds() as u64
                            >= self.config.firewall_sync_interval
                    }
                    None => true,
                };
                if sync_due {
                    self.push_firewall_inventory().await;
                }

                // 4. SONDEO Y EJECUCIÓN SERIALIZADA DE COMANDOS
                self.poll_and_execute_commands().await;
            }

            sleep(Duration::from_secs(self.config.check_interval)).await;
        }

        // PARADA COOPERATIVA: vaciar estado y salir.
        if let Err(flush_fault) = self.state.save(&self.config.state_file) {
            warn!("⚠️ [STATE_FLUSH]: Final state flush failed: {}", flush_fault);
        }
        info!("🏁 [SENTINEL]: Cooperative loop sealed. Sentinel offline.");
    }

    /**
     * Handshake de registro. Jamás fatal: sin llave se opera degradado
     * y se registra que falta la aprobación del operador.
     */
    async fn attempt_registration(&mut self) {
        let registration = RegisterRequest {
            agent_id: self.config.agent_id.clone(),
            hostname: self.config.hostname.clone(),
            system_info: json!({
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "features": {
                    "firewall": self.config.firewall_enabled,
                    "fail2ban": self.fail2ban_tailer.is_some(),
                },
            }),
            version: env!("CARGO_PKG_VERSION").to_string(),
            heartbeat_interval_sec: self.config.heartbeat_interval as u32,
        };

        match self.uplink.register(&registration).await {
            Ok(response) => {
                if let Some(issued_key) = response.api_key {
                    let is_fresh_key = self.config.api_key.as_deref() != Some(issued_key.as_str());
                    self.uplink.adopt_api_key(issued_key.clone());
                    if is_fresh_key {
                        self.config.api_key = Some(issued_key);
                        if let Err(persist_fault) = self.config.save(&self.config_path) {
                            warn!("⚠️ [KEY_PERSIST]: API key not persisted: {}", persist_fault);
                        }
                        info!("🔑 [REGISTERED]: API key issued and persisted.");
                    }
                } else if !self.uplink.has_api_key() {
                    warn!("⏳ [PENDING]: Registered without key; operator approval required.");
                }
                debug!("🤝 [REGISTRY]: {}", response.message);
            }
            Err(handshake_fault) => {
                warn!("⚠️ [REGISTER_RETRY]: Registration failed this tick: {}", handshake_fault);
            }
        }
    }

    /// Drena el log de autenticación en rebanadas de batch_size.
    async fn drain_auth_log(&mut self) {
        let pass = self
            .auth_tailer
            .collect_new_lines(self.state.last_inode, self.state.last_position);

        if pass.file_identity == 0 {
            return; // Archivo ausente este tick.
        }

        if pass.lines.is_empty() {
            // Sin emisiones: avanzar el token es seguro (nada que perder).
            let token_moved = self.state.last_inode != pass.file_identity
                || self.state.last_position != pass.final_offset;
            if token_moved {
                self.state.last_inode = pass.file_identity;
                self.state.last_position = pass.final_offset;
                if let Err(persist_fault) = self.state.save(&self.config.state_file) {
                    warn!("⚠️ [STATE_WRITE]: Position not persisted: {}", persist_fault);
                }
            }
            return;
        }

        let source_filename = self.auth_tailer.path().display().to_string();
        for slice in pass.lines.chunks(self.config.batch_size) {
            if !self.submit_slice(slice, pass.file_identity, &source_filename, false).await {
                return; // Sin avance: el próximo tick re-lee desde aquí.
            }
        }
    }

    /// Drena el log de fail2ban como lotes independientes.
    async fn drain_fail2ban_log(&mut self) {
        let Some(fail2ban_tailer) = &self.fail2ban_tailer else { return };

        let pass = fail2ban_tailer
            .collect_new_lines(self.state.fail2ban_inode, self.state.fail2ban_position);

        if pass.file_identity == 0 {
            return;
        }

        if pass.lines.is_empty() {
            let token_moved = self.state.fail2ban_inode != pass.file_identity
                || self.state.fail2ban_position != pass.final_offset;
            if token_moved {
                self.state.fail2ban_inode = pass.file_identity;
                self.state.fail2ban_position = pass.final_offset;
                let _ = self.state.save(&self.config.state_file);
            }
            return;
        }

        let source_filename = fail2ban_tailer.path().display().to_string();
        let slices: Vec<Vec<TailedLine>> = pass
            .lines
            .chunks(self.config.batch_size)
            .map(|slice| slice.to_vec())
            .collect();
        for slice in &slices {
            if !self.submit_slice(slice, pass.file_identity, &source_filename, true).await {
                return;
            }
        }
    }

    /**
     * Somete una rebanada; solo el éxito avanza el token persistido.
     */
    async fn submit_slice(
        &mut self,
        slice: &[TailedLine],
        file_identity: u64,
        source_filename: &str,
        is_fail2ban_channel: bool,
    ) -> bool {
        let batch = LogBatchRequest {
            batch_uuid: Uuid::new_v4().to_string(),
            agent_id: self.config.agent_id.clone(),
            hostname: self.config.hostname.clone(),
            log_lines: slice.iter().map(|line| line.content.clone()).collect(),
            batch_size: self.config.batch_size as u32,
            source_filename: Some(source_filename.to_string()),
        };

        match self.uplink.submit_log_batch(&batch).await {
            Ok(receipt) => {
                let confirmed_offset = slice.last().map(|line| line.end_offset).unwrap_or(0);

                if is_fail2ban_channel {
                    self.state.fail2ban_inode = file_identity;
                    self.state.fail2ban_position = confirmed_offset;
                } else {
                    self.state.last_inode = file_identity;
                    self.state.last_position = confirmed_offset;
                }
                self.state.total_logs_sent += slice.len() as u64;
                self.state.total_batches_sent += 1;

                if let Err(persist_fault) = self.state.save(&self.config.state_file) {
                    warn!("⚠️ [STATE_WRITE]: Position not persisted: {}", persist_fault);
                }

                debug!(
                    "📦 [BATCH_OK]: {} lines accepted ({} created / {} failed).",
                    slice.len(),
                    receipt.events_created,
                    receipt.events_failed
                );
                true
            }
            Err(transport_fault) => {
                warn!("📡 [BATCH_DEFER]: Submission failed; position held: {}", transport_fault);
                false
            }
        }
    }

    async fn send_heartbeat(&mut self) {
        let metrics = HostMonitor::capture_instantaneous_metrics();
        let health = HostMonitor::derive_health(&metrics);

        let heartbeat = HeartbeatRequest {
            agent_id: self.config.agent_id.clone(),
            metrics,
            status: "active".to_string(),
            health_status: health,
        };

        match self.uplink.send_heartbeat(&heartbeat).await {
            Ok(_) => {
                self.state.last_heartbeat = Some(Utc::now());
                let _ = self.state.save(&self.config.state_file);
                debug!("💓 [HEARTBEAT]: Vitals reported ({:?}).", health);
            }
            Err(transport_fault) => {
                warn!("💔 [HEARTBEAT_DEFER]: {}", transport_fault);
            }
        }
    }

    async fn push_firewall_inventory(&mut self) {
        let Some(firewall) = &self.firewall else { return };

        let inventory = match firewall.inventory().await {
            Ok(inventory) => inventory,
            Err(inventory_fault) => {
                warn!("🧱 [INVENTORY_DEFER]: {}", inventory_fault);
                return;
            }
        };

        let sync_request = UfwSyncRequest {
            agent_id: self.config.agent_id.clone(),
            hostname: self.config.hostname.clone(),
            ufw_data: inventory,
            submitted_at: Utc::now(),
        };

        match self.uplink.sync_firewall(&sync_request).await {
            Ok(receipt) => {
                self.state.last_firewall_sync = Some(Utc::now());
                let _ = self.state.save(&self.config.state_file);
                debug!(
                    "🧱 [SYNC_OK]: {} rules mirrored (status {}).",
                    receipt.rules_count, receipt.ufw_status
                );
            }
            Err(transport_fault) => {
                warn!("🧱 [SYNC_DEFER]: {}", transport_fault);
            }
        }
    }

    /**
     * Sondea y ejecuta las directivas pendientes EN ORDEN, reportando
     * cada resultado (éxito o fallo) individualmente.
     */
    async fn poll_and_execute_commands(&mut self) {
        let Some(firewall) = &self.firewall else { return };

        let pending = match self.uplink.poll_commands().await {
            Ok(response) => response.commands,
            Err(poll_fault) => {
                debug!("📭 [POLL_IDLE]: {}", poll_fault);
                return;
            }
        };

        for directive in pending {
            let (success, message) = firewall.execute(&directive.action).await;

            if success {
                info!("✅ [DIRECTIVE_OK]: [{}] executed.", directive.command_uuid);
            } else {
                error!("❌ [DIRECTIVE_FAILED]: [{}]: {}", directive.command_uuid, message);
            }

            let report = CommandResultReport {
                agent_id: self.config.agent_id.clone(),
                command_id: directive.command_uuid.clone(),
                success,
                message,
                executed_at: Utc::now(),
            };

            if let Err(report_fault) = self.uplink.report_command_result(&report).await {
                warn!("📡 [RESULT_DEFER]: Result not delivered: {}", report_fault);
            }
        }
    }
}
