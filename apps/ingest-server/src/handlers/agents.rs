// [apps/ingest-server/src/handlers/agents.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL CONTROL PLANE HANDLER (V17.0 - SWISS PRECISION)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO, LATIDOS E INGESTA DE LOTES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. KEY ONCE: El registro inicial es la única transmisión en claro de
 *    la llave API; el re-registro solo la eco-devuelve al portador.
 * 2. REPLAY SHIELD: Un batch_uuid ya completado retorna los conteos
 *    almacenados sin reprocesar (P-idempotencia del plano de control).
 * 3. BACKPRESSURE: La cota de lotes en vuelo por centinela responde
 *    con soft-fail 429; el siguiente tick del centinela reintenta.
 * =================================================================
 */

use crate::middleware::{SentinelPrincipal, HEADER_API_KEY};
use crate::services::IngestPipeline;
use crate::state::AppState;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use guardian_domain_models::batch::BatchStatus;
use guardian_domain_models::wire::{
    Acknowledgement, ErrorEnvelope, HeartbeatRequest, LogBatchRequest, LogBatchResponse,
    RegisterRequest, RegisterResponse,
};
use tracing::{error, info, instrument, warn};

pub struct SentinelControlHandler;

impl SentinelControlHandler {
    /**
     * Endpoint: POST /api/agents/register
     *
     * Handshake de identidad. Sin registro previo: génesis de UUID +
     * llave (transmitida en claro solo aquí). Conocido: refresco de
     * metadatos y eco condicional de la llave.
     */
    #[instrument(skip(application_state, request_headers, registration), fields(agent = %registration.agent_id))]
    pub async fn handle_register(
        State(application_state): State<AppState>,
        request_headers: HeaderMap,
        Json(registration): Json<RegisterRequest>,
    ) -> impl IntoResponse {
        if registration.agent_id.trim().is_empty() || registration.hostname.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope::new("agent_id and hostname are mandatory")),
            )
                .into_response();
        }

        let presented_key = request_headers
            .get(HEADER_API_KEY)
            .and_then(|value| value.to_str().ok());

        match application_state.agent_repository.register(&registration, presented_key).await {
            Ok(outcome) => {
                let message = if outcome.freshly_registered {
                    "Sentinel enrolled; awaiting operator approval".to_string()
                } else if outcome.is_approved {
                    "Sentinel registration refreshed".to_string()
                } else {
                    "Sentinel known; still awaiting operator approval".to_string()
                };

                (
                    StatusCode::OK,
                    Json(RegisterResponse { success: true, message, api_key: outcome.api_key_echo }),
                )
                    .into_response()
            }
            Err(registry_fault) => {
                error!("❌ [REGISTER_FAULT]: {}", registry_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("registry unavailable")),
                )
                    .into_response()
            }
        }
    }

    /**
     * Endpoint: POST /api/agents/heartbeat
     */
    #[instrument(skip(application_state, principal, heartbeat), fields(agent = %heartbeat.agent_id))]
    pub async fn handle_heartbeat(
        State(application_state): State<AppState>,
        Extension(principal): Extension<SentinelPrincipal>,
        Json(heartbeat): Json<HeartbeatRequest>,
    ) -> impl IntoResponse {
        if heartbeat.agent_id != principal.record.agent_id {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorEnvelope::new("agent identity mismatch")),
            )
                .into_response();
        }

        match application_state.agent_repository.record_heartbeat(&heartbeat, Utc::now()).await {
            Ok(()) => (StatusCode::OK, Json(Acknowledgement { success: true })).into_response(),
            Err(heartbeat_fault) => {
                error!("❌ [HEARTBEAT_FAULT]: {}", heartbeat_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("heartbeat not recorded")),
                )
                    .into_response()
            }
        }
    }

    /**
     * Endpoint: POST /api/agents/logs
     *
     * Ingesta de lote con escudo de replay y contra-presión.
     */
    #[instrument(skip(application_state, principal, batch), fields(batch = %batch.batch_uuid, lines = batch.log_lines.len()))]
    pub async fn handle_log_batch(
        State(application_state): State<AppState>,
        Extension(principal): Extension<SentinelPrincipal>,
        Json(batch): Json<LogBatchRequest>,
    ) -> impl IntoResponse {
        if batch.agent_id != principal.record.agent_id {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorEnvelope::new("agent identity mismatch")),
            )
                .into_response();
        }

        // 1. ESCUDO DE REPLAY (idempotencia por batch_uuid)
        match application_state.batch_repository.find(&batch.batch_uuid).await {
            Ok(Some(known_batch)) if known_batch.status == BatchStatus::Completed => {
                info!("♻️ [REPLAY]: Batch [{}] served from seal.", batch.batch_uuid);
                return (
                    StatusCode::OK,
                    Json(LogBatchResponse {
                        success: true,
                        events_created: known_batch.events_created,
                        events_failed: known_batch.events_failed,
                    }),
                )
                    .into_response();
            }
            Ok(Some(_)) => {
                // Aún en vuelo (doble envío agresivo): diferir al próximo tick.
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorEnvelope::new("batch still processing; retry next tick")),
                )
                    .into_response();
            }
            Ok(None) => {}
            Err(lookup_fault) => {
                error!("❌ [BATCH_LOOKUP_FAULT]: {}", lookup_fault);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("batch registry unavailable")),
                )
                    .into_response();
            }
        }

        // 2. CONTRA-PRESIÓN POR CENTINELA
        let inflight_bound = application_state
            .settings_repository
            .max_inflight_batches()
            .await
            .unwrap_or(4);
        match application_state.batch_repository.count_in_flight(&batch.agent_id).await {
            Ok(in_flight) if in_flight >= inflight_bound => {
                warn!("🐌 [BACKPRESSURE]: Agent [{}] exceeded in-flight bound.", batch.agent_id);
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorEnvelope::new("in-flight batch bound exceeded; retry next tick")),
                )
                    .into_response();
            }
            Ok(_) => {}
            Err(bound_fault) => {
                error!("❌ [BOUND_FAULT]: {}", bound_fault);
            }
        }

        // 3. CICLO DE VIDA DEL LOTE: received -> processing -> completed
        let received_at = Utc::now();
        if let Err(genesis_fault) =
            application_state.batch_repository.create_received(&batch, received_at).await
        {
            error!("❌ [BATCH_GENESIS_FAULT]: {}", genesis_fault);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorEnvelope::new("batch row not created")),
            )
                .into_response();
        }

        if let Err(transition_fault) =
            application_state.batch_repository.mark_processing(&batch.batch_uuid).await
        {
            error!("❌ [BATCH_TRANSITION_FAULT]: {}", transition_fault);
        }

        let outcome = IngestPipeline::process_batch(&application_state, &batch).await;

        if let Err(seal_fault) = application_state
            .batch_repository
            .finalize_completed(
                &batch.batch_uuid,
                outcome.events_created,
                outcome.events_failed,
                Utc::now(),
            )
            .await
        {
            error!("❌ [BATCH_SEAL_FAULT]: {}", seal_fault);
            let _ = application_state
                .batch_repository
                .finalize_failed(&batch.batch_uuid, "seal transition failed")
                .await;
        }

        (
            StatusCode::OK,
            Json(LogBatchResponse {
                success: true,
                events_created: outcome.events_created,
                events_failed: outcome.events_failed,
            }),
        )
            .into_response()
    }
}
