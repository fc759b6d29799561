// INICIO DEL ARCHIVO [libs/infra/agent-client/src/errors.rs]
//! =================================================================
//! APARATO: AGENT UPLINK ERRORS (V4.0 - DOCS LEVEL)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE COMUNICACIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UplinkError {
    #[error("NETWORK_UNREACHABLE: Failed to connect to Ingest Center: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("ENVELOPE_CORRUPTION: Failed to decode control plane envelope: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("COMMAND_REJECTION: Server returned status {0}")]
    ServerRejection(String),

    #[error("IDENTITY_REVOKED: API key invalid or sentinel not approved")]
    Unauthorized,

    #[error("BACKPRESSURE: Server deferred the batch; retry on next tick")]
    Deferred,
}
// FIN DEL ARCHIVO [libs/infra/agent-client/src/errors.rs]
