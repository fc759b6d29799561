// [libs/domain/detection/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DETECTION LIBRARY BARREL (V4.0 - HYBRID CORE)
 * CLASIFICACIÓN: DOMAIN LIB (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN PÚBLICA DEL DETECTOR HÍBRIDO
 *
 * VISION HIPER-HOLÍSTICA:
 * Centraliza las cuatro capas del detector: características, reglas,
 * ensamble de anomalías y puntaje compuesto con bandas de riesgo.
 * =================================================================
 */

pub mod anomaly;
pub mod errors;
pub mod features;
pub mod reputation;
pub mod rules;
pub mod scorer;

pub use anomaly::IsolationEnsemble;
pub use errors::DetectionError;
pub use features::{BehavioralWindow, FeatureExtractor, FeatureVector, UserGeoProfile};
pub use reputation::reputation_layer_score;
pub use rules::{RuleContext, RuleEvaluator, RuleVerdict};
pub use scorer::{CompositeAssessment, CompositeScorer, LayerKind, LayerScores, RiskBand, ScoringWeights};
