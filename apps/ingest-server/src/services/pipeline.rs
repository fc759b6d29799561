// [apps/ingest-server/src/services/pipeline.rs]
/*!
 * =================================================================
 * APARATO: EVENT INGESTION PIPELINE (V16.0 - HYBRID VERDICT)
 * CLASIFICACIÓN: INGEST SERVICE (ESTRATO L3)
 * RESPONSABILIDAD: LÍNEA CRUDA -> EVENTO -> PUNTAJE -> DECISIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DEDUP FIRST: La inserción 'OR IGNORE' por event_uuid hace inocuo
 *    el replay; los duplicados no re-puntúan ni re-bloquean.
 * 2. WINDOW BEFORE INSERT: La ventana conductual se deriva ANTES de
 *    cristalizar el evento (preserva 'primer avistaje') y absorbe el
 *    intento en curso después.
 * 3. SNAPSHOT PARITY: El vector de características se cristaliza con
 *    el veredicto para reproducir las entradas bit-perfectas.
 * 4. FAIL2BAN SIDE-CHANNEL: Las líneas Ban/Unban registran eventos
 *    fail2ban y bloqueos espejo sin producir eventos de autenticación.
 * =================================================================
 */

use crate::services::blocker::BlockDecision;
use crate::services::parser::AuthLogParser;
use crate::state::AppState;
use chrono::Utc;
use guardian_domain_detection::features::FeatureExtractor;
use guardian_domain_detection::reputation::reputation_layer_score;
use guardian_domain_detection::rules::{RuleContext, RuleEvaluator};
use guardian_domain_detection::scorer::{CompositeScorer, LayerScores};
use guardian_domain_models::blocking::{BlockSource, Fail2banEventRecord};
use guardian_domain_models::event::{AuthEvent, EventType, MlAssessment, SourceType};
use guardian_domain_models::wire::LogBatchRequest;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Umbral de anomalía para la bandera booleana del sidecar ML.
const ANOMALY_FLAG_THRESHOLD: f64 = 0.65;

/// Conteos finales de un lote procesado.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub events_created: u32,
    pub events_failed: u32,
}

pub struct IngestPipeline;

impl IngestPipeline {
    /**
     * Procesa el lote completo línea a línea.
     *
     * Las líneas no reconocidas se descartan sin contar; los fallos de
     * procesamiento de líneas reconocidas suman a 'events_failed'.
     */
    #[instrument(skip(state, batch), fields(batch = %batch.batch_uuid, agent = %batch.agent_id))]
    pub async fn process_batch(state: &AppState, batch: &LogBatchRequest) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for raw_line in &batch.log_lines {
            // Canal lateral fail2ban: registro espejo, sin evento de auth.
            if let Some(observation) = AuthLogParser::parse_fail2ban(raw_line) {
                if let Err(side_channel_fault) =
                    Self::absorb_fail2ban(state, &batch.agent_id, raw_line, observation).await
                {
                    warn!("⚠️ [F2B_FAULT]: {}", side_channel_fault);
                }
                continue;
            }

            let Some(parsed_line) = AuthLogParser::parse_line(raw_line, Utc::now()) else {
                continue; // Descarte silencioso: jamás se almacena 'invalid'.
            };

            match Self::absorb_auth_line(state, batch, raw_line, parsed_line).await {
                Ok(true) => outcome.events_created += 1,
                Ok(false) => debug!("♻️ [DEDUP]: Replayed event ignored."),
                Err(processing_fault) => {
                    warn!("⚠️ [LINE_FAULT]: {}", processing_fault);
                    outcome.events_failed += 1;
                }
            }
        }

        outcome
    }

    /**
     * Cristaliza, enriquece y puntúa una línea clasificada.
     *
     * @returns true si el evento fue creado; false en replay deduplicado.
     */
    async fn absorb_auth_line(
        state: &AppState,
        batch: &LogBatchRequest,
        raw_line: &str,
        parsed_line: crate::services::parser::ParsedAuthLine,
    ) -> anyhow::Result<bool> {
        let inference_started = Instant::now();

        // 1. VENTANA CONDUCTUAL PREVIA (preserva primer avistaje)
        let mut behavioral_window = state
            .event_repository
            .behavioral_window(&parsed_line.source_ip, parsed_line.timestamp)
            .await?;

        // 2. CRISTALIZACIÓN CON DEDUP
        let event = AuthEvent {
            event_uuid: Uuid::new_v4().to_string(),
            timestamp: parsed_line.timestamp,
            source_type: SourceType::Agent,
            agent_id: Some(batch.agent_id.clone()),
            simulation_run_id: None,
            event_type: parsed_line.event_type,
            auth_method: parsed_line.auth_method,
            source_ip: parsed_line.source_ip.clone(),
            target_username: parsed_line.target_username.clone(),
            target_port: parsed_line.source_port,
            failure_reason: parsed_line.failure_reason.clone(),
            raw_line: raw_line.to_string(),
        };

        if !state.event_repository.insert_event(&event, Some(&batch.batch_uuid)).await? {
            return Ok(false);
        }

        behavioral_window.absorb_current(parsed_line.event_type == EventType::Failed);

        // 3. ENRIQUECIMIENTO BEST-EFFORT
        let enrichment_row = state.enrichment.enrich(&parsed_line.source_ip).await;

        // 4. EXTRACCIÓN DE CARACTERÍSTICAS
        let high_risk_catalog: HashSet<String> =
            state.settings_repository.high_risk_countries().await?.into_iter().collect();

        let user_profile = state
            .event_repository
            .user_geo_profile(&parsed_line.target_username, parsed_line.timestamp)
            .await?;

        let extractor = FeatureExtractor::new(high_risk_catalog);
        let features = extractor.extract(
            parsed_line.timestamp,
            parsed_line.event_type,
            parsed_line.source_port,
            &behavioral_window,
            enrichment_row.as_ref(),
            &user_profile,
        );

        // 5. LAS CUATRO CAPAS DEL DETECTOR
        let rule_context = build_rule_context(&behavioral_window, enrichment_row.as_ref(), &parsed_line);
        let enabled_rules = state.rule_repository.list_enabled().await?;
        let rule_verdict = RuleEvaluator::evaluate(&enabled_rules, &rule_context);

        let anomaly_score = state
            .anomaly_ensemble
            .score(&features.as_vector())
            .unwrap_or_else(|arity_fault| {
                warn!("🤖 [MODEL_FAULT]: {}", arity_fault);
                0.0
            });

        let layers = LayerScores {
            rule: rule_verdict.as_ref().map(|v| v.severity as f64).unwrap_or(0.0),
            anomaly: anomaly_score * 100.0,
            reputation: enrichment_row.as_ref().map(reputation_layer_score).unwrap_or(0.0),
            geographic: features.geographic_layer_score(),
        };

        let weights = state.settings_repository.scoring_weights().await?;
        let assessment = CompositeScorer::score(layers, weights);

        // 6. SIDECAR ML (instantánea bit-perfecta + latencia de inferencia)
        let assessment_record = MlAssessment {
            event_uuid: event.event_uuid.clone(),
            model_identifier: state.anomaly_ensemble.model_identifier.clone(),
            risk_score: assessment.composite_score / 100.0,
            threat_type: Some(format!(
                "{}_{}",
                assessment.dominant_layer.as_str(),
                assessment.band.as_str()
            )),
            confidence: anomaly_score,
            is_anomaly: anomaly_score >= ANOMALY_FLAG_THRESHOLD,
            features_snapshot: features.to_snapshot(),
            inference_latency_ms: inference_started.elapsed().as_secs_f64() * 1000.0,
            operator_feedback: None,
            resulted_in_block: false,
        };
        state.ml_repository.insert(&assessment_record).await?;

        // 7. DECISIÓN DE BLOQUEO
        let decision = state
            .blocker
            .consider(
                &assessment,
                rule_verdict.as_ref(),
                &parsed_line.source_ip,
                &batch.agent_id,
                &event.event_uuid,
                parsed_line.timestamp,
            )
            .await?;

        if let BlockDecision::Blocked { ref block_id, .. } = decision {
            debug!("⛔ [PIPELINE]: Event [{}] sealed block [{}].", event.event_uuid, block_id);
        }

        Ok(true)
    }

    /// Registro espejo de un Ban/Unban reportado por fail2ban.
    async fn absorb_fail2ban(
        state: &AppState,
        agent_id: &str,
        raw_line: &str,
        observation: crate::services::parser::Fail2banObservation,
    ) -> anyhow::Result<()> {
        let now = Utc::now();

        state
            .fail2ban_repository
            .record(&Fail2banEventRecord {
                id: Uuid::new_v4().to_string(),
                agent_id: Some(agent_id.to_string()),
                ip: observation.ip.clone(),
                jail: observation.jail.clone(),
                is_ban: observation.is_ban,
                raw_line: raw_line.to_string(),
                observed_at: now,
            })
            .await?;

        if observation.is_ban {
            state
                .blocker
                .emit_block(
                    &observation.ip,
                    agent_id,
                    BlockSource::Fail2ban,
                    format!("fail2ban jail '{}' ban observed at edge", observation.jail),
                    None,
                    None,
                    None,
                    false,
                    now,
                )
                .await?;
        } else if let Some(standing_block) =
            state.block_repository.find_active(&observation.ip, agent_id).await?
        {
            if standing_block.source == BlockSource::Fail2ban {
                state
                    .block_repository
                    .deactivate(&standing_block.id, "fail2ban unban observed at edge", now)
                    .await?;
            }
        }

        Ok(())
    }
}

fn build_rule_context(
    window: &guardian_domain_detection::features::BehavioralWindow,
    enrichment_row: Option<&guardian_domain_models::enrichment::IpGeoRecord>,
    parsed_line: &crate::services::parser::ParsedAuthLine,
) -> RuleContext {
    let mut context = RuleContext::default()
        .with_metric("failures_last_10m", window.failures_last_10m as f64)
        .with_metric("attempts_per_minute", window.attempts_last_minute as f64)
        .with_metric("attempts_last_hour", window.attempts_last_hour as f64)
        .with_metric("unique_usernames_last_hour", window.unique_usernames_last_hour as f64)
        .with_metric("consecutive_failures", window.consecutive_failures as f64)
        .with_metric("failure_rate_24h", window.failure_rate_24h)
        .with_field("target_username", parsed_line.target_username.clone());

    if let Some(geo_row) = enrichment_row {
        context = context
            .with_metric(
                "abuse_confidence_score",
                geo_row.abuse_confidence_score.unwrap_or(0) as f64,
            )
            .with_metric(
                "vt_positive_ratio",
                match (geo_row.vt_positives, geo_row.vt_total) {
                    (Some(p), Some(t)) if t > 0 => p as f64 / t as f64,
                    _ => 0.0,
                },
            );
        if let Some(country_code) = geo_row.country_code.as_deref() {
            context = context.with_field("country_code", country_code);
        }
    }

    context
}
