// [apps/ingest-server/src/services/blocker.rs]
/*!
 * =================================================================
 * APARATO: BLOCKING DECISION ENGINE (V18.0 - SINGLE EMISSION GATE)
 * CLASIFICACIÓN: INGEST SERVICE (ESTRATO L3)
 * RESPONSABILIDAD: TRADUCCIÓN DE VEREDICTOS EN BLOQUEOS Y COMANDOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PAIR GATE: A lo sumo UNA ruta de emisión por (ip, agente); los
 *    puntuadores concurrentes esperan u observan el bloqueo ya activo
 *    y corto-circuitan.
 * 2. JOIN KEY: El UUID del comando emitido ES el UUID de la acción de
 *    auditoría (blocking_actions), resolviendo el ciclo
 *    block<->command<->action.
 * 3. EXTEND SEMANTICS: Un evento que alargaría la ventana de un
 *    bloqueo activo actualiza 'unblock_at' y agrega acción 'extend'.
 * 4. ML THRESHOLD: Las emisiones de origen ML por debajo del umbral
 *    configurado se omiten.
 * =================================================================
 */

use crate::state::wakeup_bus::CommandWakeupBus;
use crate::state::KeyedMutexRegistry;
use chrono::{DateTime, Duration, Utc};
use guardian_domain_detection::rules::RuleVerdict;
use guardian_domain_detection::scorer::{CompositeAssessment, RiskBand};
use guardian_domain_models::blocking::{
    BlockActionKind, BlockSource, BlockingActionRecord, IpBlockRecord,
};
use guardian_domain_models::firewall::FirewallAction;
use guardian_infra_db::repositories::{
    BlockInsertOutcome, BlockRepository, CommandRepository, EventRepository, MlRepository,
    SettingsRepository,
};
use guardian_infra_db::DbError;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Autoría registrada para las emisiones automáticas del detector.
const SYSTEM_ACTOR: &str = "guardian-detector";

/// Severidad mínima con la que una regla coincidente bloquea por sí
/// misma, aunque la fusión ponderada diluya el compuesto bajo la banda
/// alta (las reglas portan su propia duración de bloqueo).
const RULE_BLOCK_SEVERITY_FLOOR: u8 = 61;

/// Desenlace de una consideración de bloqueo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDecision {
    /// Sin acción (banda baja, umbral ML o alerta solamente).
    NoAction,
    /// Alerta registrada sin bloqueo (banda media).
    AlertOnly,
    /// Bloqueo nuevo sellado y comando encolado.
    Blocked { block_id: String, command_uuid: String },
    /// Bloqueo activo preexistente; ventana extendida.
    Extended { block_id: String },
    /// Bloqueo activo preexistente; sin cambios.
    AlreadyBlocked { block_id: String },
}

pub struct BlockingEngine {
    block_repository: Arc<BlockRepository>,
    command_repository: Arc<CommandRepository>,
    event_repository: Arc<EventRepository>,
    ml_repository: Arc<MlRepository>,
    settings_repository: Arc<SettingsRepository>,
    command_wakeups: Arc<CommandWakeupBus>,
    /// Cerrojo de emisión por par (ip, agente).
    emission_gate: KeyedMutexRegistry,
}

impl BlockingEngine {
    pub fn new(
        block_repository: Arc<BlockRepository>,
        command_repository: Arc<CommandRepository>,
        event_repository: Arc<EventRepository>,
        ml_repository: Arc<MlRepository>,
        settings_repository: Arc<SettingsRepository>,
        command_wakeups: Arc<CommandWakeupBus>,
    ) -> Self {
        Self {
            block_repository,
            command_repository,
            event_repository,
            ml_repository,
            settings_repository,
            command_wakeups,
            emission_gate: KeyedMutexRegistry::new(),
        }
    }

    /**
     * Considera un veredicto puntuado contra las bandas de riesgo.
     *
     * Bandas: baja registra, media alerta, alta bloquea temporal,
     * crítica bloquea según la regla (permanente si la regla lo dice).
     */
    #[instrument(skip(self, assessment, rule_verdict), fields(ip = %source_ip, agent = %agent_id))]
    pub async fn consider(
        &self,
        assessment: &CompositeAssessment,
        rule_verdict: Option<&RuleVerdict>,
        source_ip: &str,
        agent_id: &str,
        event_uuid: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockDecision, DbError> {
        let rule_triggers_block = rule_verdict
            .map(|verdict| verdict.severity >= RULE_BLOCK_SEVERITY_FLOOR)
            .unwrap_or(false);

        match assessment.band {
            RiskBand::Low if !rule_triggers_block => return Ok(BlockDecision::NoAction),
            RiskBand::Medium if !rule_triggers_block => {
                info!(
                    "🔔 [RISK_ALERT]: IP [{}] scored {:.1} (medium). Alert only.",
                    source_ip, assessment.composite_score
                );
                return Ok(BlockDecision::AlertOnly);
            }
            _ => {}
        }

        let source = if rule_verdict.is_some() { BlockSource::Rule } else { BlockSource::Ml };

        // Umbral de emisión para el origen ML.
        if source == BlockSource::Ml {
            let ml_emit_threshold = self.settings_repository.ml_emit_threshold().await?;
            if assessment.composite_score < ml_emit_threshold {
                debug!(
                    "🤖 [ML_GATE]: Score {:.1} below emit threshold {:.1}; skipping.",
                    assessment.composite_score, ml_emit_threshold
                );
                return Ok(BlockDecision::NoAction);
            }
        }

        // Duración: de la regla, o el valor por defecto configurado.
        let duration_minutes = match rule_verdict {
            Some(verdict) => verdict.block_duration_minutes,
            None => Some(self.settings_repository.default_block_minutes().await?),
        };
        let auto_unblock = rule_verdict.map(|v| v.auto_unblock).unwrap_or(true);
        let unblock_at = duration_minutes.map(|minutes| now + Duration::minutes(minutes));

        let reason = match rule_verdict {
            Some(verdict) => format!(
                "rule '{}' matched (composite {:.1}, {} dominant)",
                verdict.rule_name,
                assessment.composite_score,
                assessment.dominant_layer.as_str()
            ),
            None => format!(
                "hybrid detector composite {:.1} ({} dominant)",
                assessment.composite_score,
                assessment.dominant_layer.as_str()
            ),
        };

        self.emit_block(
            source_ip,
            agent_id,
            source,
            reason,
            rule_verdict.map(|v| v.rule_id.clone()),
            Some(event_uuid.to_string()),
            unblock_at,
            auto_unblock,
            now,
        )
        .await
    }

    /**
     * Ruta única de emisión bajo el cerrojo del par (ip, agente).
     */
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(ip = %source_ip, agent = %agent_id))]
    pub async fn emit_block(
        &self,
        source_ip: &str,
        agent_id: &str,
        source: BlockSource,
        reason: String,
        rule_id: Option<String>,
        event_uuid: Option<String>,
        unblock_at: Option<DateTime<Utc>>,
        auto_unblock: bool,
        now: DateTime<Utc>,
    ) -> Result<BlockDecision, DbError> {
        let gate_key = format!("{source_ip}|{agent_id}");
        let _emission_guard = self.emission_gate.acquire(&gate_key).await;

        // Idempotencia: el par ya porta un bloqueo activo.
        if let Some(active_block) = self.block_repository.find_active(source_ip, agent_id).await? {
            let extends_window = match (active_block.unblock_at, unblock_at) {
                (Some(current_window), Some(candidate_window)) => candidate_window > current_window,
                (Some(_), None) => true, // temporal -> permanente
                _ => false,
            };

            if extends_window {
                match unblock_at {
                    Some(candidate_window) => {
                        self.block_repository.extend(&active_block.id, candidate_window).await?
                    }
                    None => {
                        // Promoción a permanente: se modela como extensión abierta.
                        self.block_repository
                            .extend(&active_block.id, now + Duration::days(36500))
                            .await?
                    }
                }

                self.block_repository
                    .record_action(&BlockingActionRecord {
                        action_uuid: Uuid::new_v4().to_string(),
                        block_id: active_block.id.clone(),
                        kind: BlockActionKind::Extend,
                        performed_by: SYSTEM_ACTOR.to_string(),
                        reason: Some(reason),
                        created_at: now,
                    })
                    .await?;

                return Ok(BlockDecision::Extended { block_id: active_block.id });
            }

            return Ok(BlockDecision::AlreadyBlocked { block_id: active_block.id });
        }

        // Génesis: bloque + comando con UUID compartido (join-back).
        let block_id = Uuid::new_v4().to_string();
        let command_uuid = Uuid::new_v4().to_string();

        let block_record = IpBlockRecord {
            id: block_id.clone(),
            ip: source_ip.to_string(),
            cidr_range: None,
            reason,
            source,
            triggering_rule_id: rule_id,
            triggering_event_uuid: event_uuid.clone(),
            agent_id: Some(agent_id.to_string()),
            block_type: None,
            is_active: true,
            blocked_at: now,
            unblock_at,
            auto_unblock,
            unblocked_at: None,
            unblock_reason: None,
        };

        match self.block_repository.try_create(&block_record).await? {
            BlockInsertOutcome::AlreadyActive => {
                // Carrera perdida contra otro emisor: observar y corto-circuitar.
                let standing_block = self
                    .block_repository
                    .find_active(source_ip, agent_id)
                    .await?
                    .ok_or(DbError::BlockNotFound)?;
                return Ok(BlockDecision::AlreadyBlocked { block_id: standing_block.id });
            }
            BlockInsertOutcome::Created => {}
        }

        // Los bloqueos reconciliados y de fail2ban ya existen en el borde.
        let requires_edge_command = !matches!(source, BlockSource::Fail2ban | BlockSource::Ufw);

        if requires_edge_command {
            let deny_action = FirewallAction::DenyFrom {
                ip: source_ip.to_string(),
                block_id: Some(block_id.clone()),
            };
            self.command_repository
                .enqueue(
                    &command_uuid,
                    agent_id,
                    &deny_action,
                    &format!("ufw deny from {source_ip}"),
                    SYSTEM_ACTOR,
                    now,
                )
                .await?;
            self.command_wakeups.signal(agent_id).await;
        }

        self.block_repository
            .record_action(&BlockingActionRecord {
                action_uuid: command_uuid.clone(),
                block_id: block_id.clone(),
                kind: BlockActionKind::Block,
                performed_by: SYSTEM_ACTOR.to_string(),
                reason: None,
                created_at: now,
            })
            .await?;

        if let Some(event_uuid) = event_uuid {
            self.event_repository.attach_block(&event_uuid, &block_id).await?;
            self.ml_repository.mark_blocked(&event_uuid).await?;
        }

        info!("⛔ [BLOCK_EMITTED]: IP [{}] -> agent [{}] (source {:?}).", source_ip, agent_id, source);
        Ok(BlockDecision::Blocked { block_id, command_uuid })
    }

    /**
     * Desbloqueo (barrido automático u operador): desactiva la fila,
     * encola 'delete_deny_from' y agrega la acción de auditoría.
     */
    #[instrument(skip(self, block), fields(ip = %block.ip))]
    pub async fn release_block(
        &self,
        block: &IpBlockRecord,
        performed_by: &str,
        unblock_reason: &str,
        now: DateTime<Utc>,
    ) -> Result<String, DbError> {
        self.block_repository.deactivate(&block.id, unblock_reason, now).await?;

        let command_uuid = Uuid::new_v4().to_string();
        if let Some(agent_id) = block.agent_id.as_deref() {
            let release_action = FirewallAction::DeleteDenyFrom {
                ip: block.ip.clone(),
                block_id: Some(block.id.clone()),
            };
            self.command_repository
                .enqueue(
                    &command_uuid,
                    agent_id,
                    &release_action,
                    &format!("ufw delete deny from {}", block.ip),
                    performed_by,
                    now,
                )
                .await?;
            self.command_wakeups.signal(agent_id).await;
        } else {
            warn!("⚠️ [RELEASE_ORPHAN]: Block [{}] has no agent reference; edge untouched.", block.id);
        }

        self.block_repository
            .record_action(&BlockingActionRecord {
                action_uuid: command_uuid.clone(),
                block_id: block.id.clone(),
                kind: BlockActionKind::Unblock,
                performed_by: performed_by.to_string(),
                reason: Some(unblock_reason.to_string()),
                created_at: now,
            })
            .await?;

        Ok(command_uuid)
    }
}
