// [apps/ingest-server/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: GALVANIC AUTHENTICATION GUARD (V8.0 - DUAL CITIZENSHIP)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: VALIDACIÓN DE IDENTIDAD E INYECCIÓN EN EL FLUJO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL CITIZENSHIP: Centinelas (X-API-Key + X-Agent-ID contra el
 *    registro aprobado) y Operadores (X-Admin-Token simétrico).
 * 2. EXTENSION INJECTION: Inyecta 'SentinelPrincipal' en el flujo
 *    asíncrono de la petición para consumo en los handlers.
 * 3. STABLE ENVELOPE: Los rechazos viajan como {success:false, error}
 *    sin filtración de detalle interno.
 * =================================================================
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use guardian_domain_models::agent::AgentRecord;
use guardian_domain_models::wire::ErrorEnvelope;
use tracing::{debug, warn};

/// Cabecera de llave API del plano de control.
pub const HEADER_API_KEY: &str = "X-API-Key";
/// Cabecera de identidad del centinela.
pub const HEADER_AGENT_ID: &str = "X-Agent-ID";
/// Cabecera del token de operador para la superficie administrativa.
pub const HEADER_ADMIN_TOKEN: &str = "X-Admin-Token";

/// Identidad del centinela autenticado, inyectada en la petición.
#[derive(Debug, Clone)]
pub struct SentinelPrincipal {
    pub record: AgentRecord,
}

/**
 * Guardia del plano de control: valida el par (agent_id, llave) contra
 * un centinela aprobado y activo del registro.
 */
pub async fn sentinel_guard(
    State(application_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let presented_agent_id = header_value(&request, HEADER_AGENT_ID);
    let presented_api_key = header_value(&request, HEADER_API_KEY);

    let (Some(agent_id), Some(api_key)) = (presented_agent_id, presented_api_key) else {
        return Err(rejection(StatusCode::UNAUTHORIZED, "missing credentials"));
    };

    match application_state.agent_repository.authenticate(&agent_id, &api_key).await {
        Ok(Some(record)) => {
            debug!("🤖 [AUTH]: Sentinel [{}] recognized.", record.agent_id);
            request.extensions_mut().insert(SentinelPrincipal { record });
            Ok(next.run(request).await)
        }
        Ok(None) => {
            warn!("❌ [AUTH_REJECTION]: Unknown, unapproved or inactive sentinel [{}].", agent_id);
            Err(rejection(StatusCode::FORBIDDEN, "sentinel not approved or key invalid"))
        }
        Err(registry_fault) => {
            warn!("💀 [AUTH_FAULT]: Registry unavailable: {}", registry_fault);
            Err(rejection(StatusCode::INTERNAL_SERVER_ERROR, "registry unavailable"))
        }
    }
}

/**
 * Guardia de la superficie administrativa (token simétrico de operador).
 */
pub async fn operator_guard(
    State(application_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let Some(expected_token) = application_state.config.admin_token.as_deref() else {
        warn!("⛔ [ADMIN_LOCKED]: Administrative surface disabled (no token configured).");
        return Err(rejection(StatusCode::FORBIDDEN, "administrative surface disabled"));
    };

    match header_value(&request, HEADER_ADMIN_TOKEN) {
        Some(presented_token) if presented_token == expected_token => Ok(next.run(request).await),
        _ => {
            warn!("❌ [ADMIN_REJECTION]: Invalid operator token.");
            Err(rejection(StatusCode::FORBIDDEN, "invalid operator token"))
        }
    }
}

fn header_value(request: &Request, header_name: &str) -> Option<String> {
    request
        .headers()
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn rejection(status: StatusCode, detail: &str) -> Response {
    (status, Json(ErrorEnvelope::new(detail))).into_response()
}
