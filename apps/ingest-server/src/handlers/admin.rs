// [apps/ingest-server/src/handlers/admin.rs]
/*!
 * =================================================================
 * APARATO: OPERATOR ADMINISTRATION HANDLER (V9.0 - MINIMAL SURFACE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: SUPERFICIE MÍNIMA DEL CICLO DE VIDA DE BLOQUEOS
 *
 * # Logic:
 * La superficie cubre exactamente lo que el ciclo de vida exige del
 * operador: flota, aprobación, bloqueo/desbloqueo manual y disparo de
 * reconciliación. Sin HTML, sin RBAC (colaboradores externos).
 * =================================================================
 */

use crate::services::reconciler::reconcile_agent;
use crate::state::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use guardian_domain_models::blocking::BlockSource;
use guardian_domain_models::wire::{Acknowledgement, ErrorEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct ApproveAgentPayload {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualBlockPayload {
    pub ip: String,
    pub agent_id: String,
    pub reason: String,
    /// None => bloqueo permanente.
    pub duration_minutes: Option<i64>,
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualUnblockPayload {
    pub block_id: String,
    pub reason: String,
    pub performed_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ReconcilePayload {
    pub agent_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub success: bool,
    pub adopted_from_edge: u32,
    pub redelivered_to_edge: u32,
}

pub struct OperatorAdministrationHandler;

impl OperatorAdministrationHandler {
    /// Endpoint: GET /api/admin/agents
    #[instrument(skip(application_state))]
    pub async fn handle_list_agents(State(application_state): State<AppState>) -> impl IntoResponse {
        match application_state.agent_repository.list().await {
            Ok(fleet) => (StatusCode::OK, Json(json!({ "success": true, "agents": fleet }))).into_response(),
            Err(registry_fault) => {
                error!("❌ [FLEET_FAULT]: {}", registry_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("registry unavailable")),
                )
                    .into_response()
            }
        }
    }

    /// Endpoint: POST /api/admin/agents/approve
    #[instrument(skip(application_state), fields(agent = %payload.agent_id))]
    pub async fn handle_approve_agent(
        State(application_state): State<AppState>,
        Json(payload): Json<ApproveAgentPayload>,
    ) -> impl IntoResponse {
        match application_state.agent_repository.approve(&payload.agent_id).await {
            Ok(()) => (StatusCode::OK, Json(Acknowledgement { success: true })).into_response(),
            Err(guardian_infra_db::DbError::AgentNotFound) => (
                StatusCode::NOT_FOUND,
                Json(ErrorEnvelope::new("unknown agent_id")),
            )
                .into_response(),
            Err(approval_fault) => {
                error!("❌ [APPROVAL_FAULT]: {}", approval_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("approval failed")),
                )
                    .into_response()
            }
        }
    }

    /// Endpoint: GET /api/admin/blocks
    #[instrument(skip(application_state))]
    pub async fn handle_list_blocks(State(application_state): State<AppState>) -> impl IntoResponse {
        match application_state.block_repository.list_active().await {
            Ok(active_blocks) => {
                (StatusCode::OK, Json(json!({ "success": true, "blocks": active_blocks }))).into_response()
            }
            Err(registry_fault) => {
                error!("❌ [BLOCKS_FAULT]: {}", registry_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("block registry unavailable")),
                )
                    .into_response()
            }
        }
    }

    /// Endpoint: POST /api/admin/blocks (bloqueo manual)
    #[instrument(skip(application_state, payload), fields(ip = %payload.ip, agent = %payload.agent_id))]
    pub async fn handle_manual_block(
        State(application_state): State<AppState>,
        Json(payload): Json<ManualBlockPayload>,
    ) -> impl IntoResponse {
        let now = Utc::now();
        let unblock_at = payload.duration_minutes.map(|minutes| now + Duration::minutes(minutes));

        match application_state
            .blocker
            .emit_block(
                &payload.ip,
                &payload.agent_id,
                BlockSource::Manual,
                format!("manual block by {}: {}", payload.performed_by, payload.reason),
                None,
                None,
                unblock_at,
                payload.duration_minutes.is_some(),
                now,
            )
            .await
        {
            Ok(decision) => {
                info!("👤 [MANUAL_BLOCK]: {:?}", decision);
                (StatusCode::OK, Json(json!({ "success": true, "decision": format!("{decision:?}") })))
                    .into_response()
            }
            Err(emission_fault) => {
                error!("❌ [MANUAL_BLOCK_FAULT]: {}", emission_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("manual block failed")),
                )
                    .into_response()
            }
        }
    }

    /// Endpoint: POST /api/admin/blocks/unblock (desbloqueo manual)
    #[instrument(skip(application_state, payload), fields(block = %payload.block_id))]
    pub async fn handle_manual_unblock(
        State(application_state): State<AppState>,
        Json(payload): Json<ManualUnblockPayload>,
    ) -> impl IntoResponse {
        let standing_block = match application_state.block_repository.find(&payload.block_id).await {
            Ok(Some(block)) if block.is_active => block,
            Ok(_) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(ErrorEnvelope::new("block not found or already inactive")),
                )
                    .into_response();
            }
            Err(lookup_fault) => {
                error!("❌ [UNBLOCK_LOOKUP_FAULT]: {}", lookup_fault);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("block registry unavailable")),
                )
                    .into_response();
            }
        };

        match application_state
            .blocker
            .release_block(&standing_block, &payload.performed_by, &payload.reason, Utc::now())
            .await
        {
            Ok(command_uuid) => (
                StatusCode::OK,
                Json(json!({ "success": true, "release_command": command_uuid })),
            )
                .into_response(),
            Err(release_fault) => {
                error!("❌ [MANUAL_UNBLOCK_FAULT]: {}", release_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("manual unblock failed")),
                )
                    .into_response()
            }
        }
    }

    /// Endpoint: POST /api/admin/reconcile (auditoría de paridad por centinela)
    #[instrument(skip(application_state), fields(agent = %payload.agent_id))]
    pub async fn handle_reconcile(
        State(application_state): State<AppState>,
        Json(payload): Json<ReconcilePayload>,
    ) -> impl IntoResponse {
        match reconcile_agent(&application_state, &payload.agent_id).await {
            Ok(summary) => (
                StatusCode::OK,
                Json(ReconcileReport {
                    success: true,
                    adopted_from_edge: summary.adopted_from_edge,
                    redelivered_to_edge: summary.redelivered_to_edge,
                }),
            )
                .into_response(),
            Err(parity_fault) => {
                error!("❌ [RECONCILE_FAULT]: {}", parity_fault);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorEnvelope::new("reconciliation failed")),
                )
                    .into_response()
            }
        }
    }
}
