// INICIO DEL ARCHIVO [apps/ingest-server/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V10.0 - CONTROL PLANE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE RED DEL PLANO DE CONTROL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. REST Táctico para centinelas (autenticado por llave API).
 * 2. Superficie administrativa mínima (token de operador).
 * 3. El registro es la única ruta del plano sin guardia de llave.
 * =================================================================
 */

use crate::handlers::{FirewallControlHandler, OperatorAdministrationHandler, SentinelControlHandler};
use crate::middleware::{operator_guard, sentinel_guard};
use crate::state::AppState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_control_plane_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS para el Dashboard externo y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO TÁCTICO: Plano de control de centinelas (tras guardia de llave).
    let sentinel_guarded_stratum = Router::new()
        // Latidos de Vida (biometría del hospedaje)
        .route("/heartbeat", post(SentinelControlHandler::handle_heartbeat))
        // Ingesta de lotes de líneas crudas (escudo de replay)
        .route("/logs", post(SentinelControlHandler::handle_log_batch))
        // Sincronía del inventario de cortafuegos (swap atómico)
        .route("/ufw/sync", post(FirewallControlHandler::handle_ufw_sync))
        // Sondeo largo de comandos pendientes
        .route("/ufw/commands", get(FirewallControlHandler::handle_command_poll))
        // Reporte idempotente de resultados de ejecución
        .route("/firewall/command-result", post(FirewallControlHandler::handle_command_result))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), sentinel_guard));

    // ESTRATO DE ADMINISTRACIÓN: Superficie mínima del operador.
    let operator_stratum = Router::new()
        .route("/agents", get(OperatorAdministrationHandler::handle_list_agents))
        .route("/agents/approve", post(OperatorAdministrationHandler::handle_approve_agent))
        .route(
            "/blocks",
            get(OperatorAdministrationHandler::handle_list_blocks)
                .post(OperatorAdministrationHandler::handle_manual_block),
        )
        .route("/blocks/unblock", post(OperatorAdministrationHandler::handle_manual_unblock))
        .route("/reconcile", post(OperatorAdministrationHandler::handle_reconcile))
        .layer(middleware::from_fn_with_state(application_shared_state.clone(), operator_guard));

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest(
            "/api/agents",
            Router::new()
                // Génesis de identidad: única ruta sin guardia de llave.
                .route("/register", post(SentinelControlHandler::handle_register))
                .merge(sentinel_guarded_stratum),
        )
        .nest("/api/admin", operator_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/ingest-server/src/routes.rs]
