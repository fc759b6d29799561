// [libs/domain/detection/src/errors.rs]
//! =================================================================
//! APARATO: DETECTION ERROR CATALOG (V2.1 - SOBERANO)
//! RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DEL DETECTOR
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    /// El árbol de condiciones de una regla no respeta la gramática.
    #[error("[L2_RULE_FAULT]: CONDITION_TREE_MALFORMED -> {0}")]
    MalformedConditionTree(String),

    /// El artefacto del modelo de anomalías no pudo decodificarse.
    #[error("[L2_MODEL_FAULT]: ENSEMBLE_ARTIFACT_CORRUPTED -> {0}")]
    CorruptedModelArtifact(#[from] serde_json::Error),

    /// El vector de características no coincide con la aridad del modelo.
    #[error("[L2_MODEL_FAULT]: FEATURE_ARITY_MISMATCH (expected {expected}, got {observed})")]
    FeatureArityMismatch { expected: usize, observed: usize },
}
