// [apps/ingest-server/src/handlers/firewall.rs]
/*!
 * =================================================================
 * APARATO: FIREWALL SYNC & COMMAND HANDLER (V13.0 - EXACTLY ONCE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SINCRONÍA DE INVENTARIO, SONDEO Y RESULTADOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ATOMIC SWAP: Cada sincronía reemplaza el espejo completo del
 *    inventario del centinela; jamás se fusiona.
 * 2. LONG POLL: El sondeo sin comandos pendientes espera acotado en el
 *    bus de despertar y reclama de nuevo antes de responder.
 * 3. ORPHAN TOLERANCE: Un resultado para UUID desconocido se acepta y
 *    registra sin crear filas (contrato del plano de control).
 * =================================================================
 */

use crate::middleware::SentinelPrincipal;
use crate::state::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use guardian_domain_models::wire::{
    Acknowledgement, CommandResultReport, ErrorEnvelope, PendingCommandsResponse, UfwSyncRequest,
    UfwSyncResponse,
};
use guardian_infra_db::repositories::ResultIngestOutcome;
use serde::Deserialize;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct CommandPollQuery {
    pub agent_id: String,
}

pub struct FirewallControlHandler;

impl FirewallControlHandler {
    /**
     * Endpoint: POST /api/agents/ufw/sync
     */
    #[instrument(skip(application_state, principal, sync_request), fields(agent = %sync_request.agent_id))]
    pub async fn handle_ufw_sync(
        State(application_state): State<AppState>,
        Extension(principal): Extension<SentinelPrincipal>,
        Json(sync_request): Json<UfwSyncRequest>,
    ) -> impl IntoResponse {
        if sync_request.agent_id != principal.record.agent_id {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorEnvelope::new("agent identity mismatch")),
            )
                .into_response();
        }

        let rules_count = sync_request.ufw_data.rules.len() as u32;
        let ufw_status = sync_request.ufw_data.status.status.clone();

        match application_state
            .ufw_state_repository
            .replace_inventory(&sync_request.agent_id, &sync_request.ufw_data, Utc::now())
            .await
        {
            Ok(()) => (
                StatusCode::OK,
                Json(UfwSyncResponse { success: true, rules_count, ufw_status }),
            )
                .into_response(),
            Err(mirror_fault) => {
                error!("❌ [UFW_MIRROR_FAULT]: {}", mirror_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("inventory swap failed")),
                )
                    .into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/agents/ufw/commands?agent_id=...
     *
     * Entrega exactly-once: reclama pendientes (transición a 'sent') en
     * orden de creación; sin pendientes, espera acotada en el bus y
     * reclama de nuevo.
     */
    #[instrument(skip(application_state, principal), fields(agent = %poll_query.agent_id))]
    pub async fn handle_command_poll(
        State(application_state): State<AppState>,
        Extension(principal): Extension<SentinelPrincipal>,
        Query(poll_query): Query<CommandPollQuery>,
    ) -> impl IntoResponse {
        if poll_query.agent_id != principal.record.agent_id {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorEnvelope::new("agent identity mismatch")),
            )
                .into_response();
        }

        let first_claim = application_state
            .command_repository
            .claim_pending(&poll_query.agent_id, Utc::now())
            .await;

        let claimed = match first_claim {
            Ok(commands) if commands.is_empty() => {
                // Espera acotada a la próxima señal y segunda reclamación.
                application_state
                    .command_wakeups
                    .wait(&poll_query.agent_id, application_state.config.command_poll_wait)
                    .await;
                application_state
                    .command_repository
                    .claim_pending(&poll_query.agent_id, Utc::now())
                    .await
            }
            other => other,
        };

        match claimed {
            Ok(commands) => {
                if !commands.is_empty() {
                    info!(
                        "📤 [COMMAND_DISPATCH]: {} directives delivered to [{}].",
                        commands.len(),
                        poll_query.agent_id
                    );
                }
                (StatusCode::OK, Json(PendingCommandsResponse { commands })).into_response()
            }
            Err(queue_fault) => {
                error!("❌ [QUEUE_FAULT]: {}", queue_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("command queue unavailable")),
                )
                    .into_response()
            }
        }
    }

    /**
     * Endpoint: POST /api/agents/firewall/command-result
     */
    #[instrument(skip(application_state, principal, result_report), fields(command = %result_report.command_id))]
    pub async fn handle_command_result(
        State(application_state): State<AppState>,
        Extension(principal): Extension<SentinelPrincipal>,
        Json(result_report): Json<CommandResultReport>,
    ) -> impl IntoResponse {
        if result_report.agent_id != principal.record.agent_id {
            return (
                StatusCode::FORBIDDEN,
                Json(ErrorEnvelope::new("agent identity mismatch")),
            )
                .into_response();
        }

        match application_state
            .command_repository
            .record_result(
                &result_report.command_id,
                result_report.success,
                &result_report.message,
                result_report.executed_at,
            )
            .await
        {
            Ok(ResultIngestOutcome::Applied) => {
                info!(
                    "📥 [RESULT_SEALED]: Command [{}] -> {}.",
                    result_report.command_id,
                    if result_report.success { "completed" } else { "failed" }
                );
                (StatusCode::OK, Json(Acknowledgement { success: true })).into_response()
            }
            Ok(ResultIngestOutcome::UnknownCommand) | Ok(ResultIngestOutcome::AlreadyTerminal) => {
                // Aceptado y registrado; sin mutación de filas.
                (StatusCode::OK, Json(Acknowledgement { success: true })).into_response()
            }
            Err(result_fault) => {
                error!("❌ [RESULT_FAULT]: {}", result_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("result ingestion failed")),
                )
                    .into_response()
            }
        }
    }
}
