// [libs/domain/detection/src/anomaly.rs]
/*!
 * =================================================================
 * APARATO: ISOLATION ENSEMBLE SCORER (V7.2 - INFERENCE ONLY)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: CONSUMO DEL MODELO DE ANOMALÍAS (0.0 - 1.0)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INFERENCE ONLY: El entrenamiento vive fuera del tejido; este
 *    aparato consume artefactos serializados y el ensamble base.
 * 2. BASELINE ENSEMBLE: Árboles deterministas que aíslan firmas de
 *    fuerza bruta, pulverización de usuarios y reputación hostil sin
 *    necesidad de artefacto externo.
 * 3. ARITY GUARD: Un vector con aridad distinta a la del modelo se
 *    rechaza en la frontera, jamás se trunca en silencio.
 *
 * # Mathematical Proof (Normalized Isolation Score):
 * Para una muestra de tamaño n, la longitud media de camino de una
 * búsqueda fallida en BST es c(n) = 2H(n-1) - 2(n-1)/n. El puntaje
 * s = 2^(-E[h(x)]/c(n)) queda acotado en (0,1], donde s -> 1 denota
 * aislamiento temprano (máxima anomalía).
 * =================================================================
 */

use crate::errors::DetectionError;
use crate::features::{
    FEATURE_ARITY, IDX_ATTEMPTS_PER_MINUTE, IDX_CONSECUTIVE_FAILURES, IDX_FAILURES_LAST_10M,
    IDX_IP_REPUTATION, IDX_IS_ANONYMIZED_EXIT, IDX_IS_FIRST_SIGHTING, IDX_IS_HIGH_RISK_COUNTRY,
    IDX_UNIQUE_USERNAMES,
};
use serde::{Deserialize, Serialize};

/// Constante de Euler-Mascheroni para la longitud media de camino.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Tamaño de sub-muestra con el que se calibraron los árboles base.
const BASELINE_SAMPLE_SIZE: usize = 64;

/// Profundidad de la cadena nominal en los árboles firma.
const NOMINAL_CHAIN_DEPTH: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum IsolationNode {
    /// Bifurcación: izquierda si feature < split, derecha en caso contrario.
    Internal { feature: usize, split: f64, left: usize, right: usize },
    /// Hoja con el tamaño de la sub-muestra no aislada.
    Leaf { size: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    /// Arena de nodos; el índice 0 es la raíz.
    pub nodes: Vec<IsolationNode>,
}

impl IsolationTree {
    fn path_length(&self, vector: &[f64]) -> f64 {
        let mut cursor = 0usize;
        let mut depth = 0.0f64;

        loop {
            match &self.nodes[cursor] {
                IsolationNode::Internal { feature, split, left, right } => {
                    depth += 1.0;
                    cursor = if vector[*feature] < *split { *left } else { *right };
                }
                IsolationNode::Leaf { size } => {
                    return depth + average_unsuccessful_path(*size);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationEnsemble {
    pub model_identifier: String,
    pub sample_size: usize,
    pub feature_arity: usize,
    pub trees: Vec<IsolationTree>,
}

impl IsolationEnsemble {
    /// Decodifica un artefacto entrenado fuera del tejido.
    pub fn from_json(artifact: &str) -> Result<Self, DetectionError> {
        Ok(serde_json::from_str(artifact)?)
    }

    /**
     * Puntaje normalizado de anomalía para el vector canónico.
     *
     * # Errors:
     * Rechaza vectores cuya aridad no coincide con la del modelo.
     */
    pub fn score(&self, vector: &[f64]) -> Result<f64, DetectionError> {
        if vector.len() != self.feature_arity {
            return Err(DetectionError::FeatureArityMismatch {
                expected: self.feature_arity,
                observed: vector.len(),
            });
        }

        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(vector))
            .sum::<f64>()
            / self.trees.len() as f64;

        Ok(2f64.powf(-mean_path / average_unsuccessful_path(self.sample_size)))
    }

    /**
     * Ensamble base determinista embarcado con el tejido.
     *
     * Siete árboles firma (una característica, aislamiento a
     * profundidad 1) más un árbol combinado reputación+primer-avistaje
     * (profundidad 2). El tráfico nominal desciende la cadena completa.
     */
    pub fn baseline() -> Self {
        let signature_splits: &[(usize, f64)] = &[
            (IDX_ATTEMPTS_PER_MINUTE, 10.0),
            (IDX_FAILURES_LAST_10M, 5.0),
            (IDX_UNIQUE_USERNAMES, 8.0),
            (IDX_CONSECUTIVE_FAILURES, 4.0),
            (IDX_IP_REPUTATION, 0.75),
            (IDX_IS_ANONYMIZED_EXIT, 0.5),
            (IDX_IS_HIGH_RISK_COUNTRY, 0.5),
        ];

        let mut trees: Vec<IsolationTree> = signature_splits
            .iter()
            .map(|&(feature, split)| Self::signature_tree(feature, split))
            .collect();

        trees.push(Self::reputation_first_sighting_tree());

        Self {
            model_identifier: "baseline-isolation-v1".to_string(),
            sample_size: BASELINE_SAMPLE_SIZE,
            feature_arity: FEATURE_ARITY,
            trees,
        }
    }

    /// Árbol firma: la rama >= split aísla en profundidad 1; la rama
    /// nominal desciende una cadena corta hasta una hoja poblada.
    fn signature_tree(feature: usize, split: f64) -> IsolationTree {
        let mut nodes = vec![IsolationNode::Internal { feature, split, left: 1, right: 2 }];
        nodes.push(IsolationNode::Leaf { size: 8 }); // índice 1: se expande abajo.
        nodes.push(IsolationNode::Leaf { size: 1 }); // índice 2: aislamiento temprano.

        let mut cursor = 1usize;
        for chain_level in 0..NOMINAL_CHAIN_DEPTH {
            let nominal_descent = nodes.len();
            let isolated_band = nodes.len() + 1;
            nodes[cursor] = IsolationNode::Internal {
                feature,
                split: split * (0.9 - chain_level as f64 * 0.1),
                left: nominal_descent,
                right: isolated_band,
            };
            nodes.push(IsolationNode::Leaf { size: 8 });
            nodes.push(IsolationNode::Leaf { size: 2 });
            cursor = nominal_descent;
        }

        IsolationTree { nodes }
    }

    /// Árbol combinado: una IP de reputación hostil vista por primera
    /// vez se aísla en profundidad 2.
    fn reputation_first_sighting_tree() -> IsolationTree {
        IsolationTree {
            nodes: vec![
                IsolationNode::Internal {
                    feature: IDX_IP_REPUTATION,
                    split: 0.6,
                    left: 1,
                    right: 2,
                },
                IsolationNode::Leaf { size: 8 },
                IsolationNode::Internal {
                    feature: IDX_IS_FIRST_SIGHTING,
                    split: 0.5,
                    left: 3,
                    right: 4,
                },
                IsolationNode::Leaf { size: 4 },
                IsolationNode::Leaf { size: 1 },
            ],
        }
    }
}

/// c(n): longitud media de camino de búsqueda fallida en un BST de n nodos.
fn average_unsuccessful_path(sample_size: usize) -> f64 {
    match sample_size {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;

    #[test]
    fn hostile_burst_scores_above_benign_traffic() {
        let ensemble = IsolationEnsemble::baseline();

        let hostile = FeatureVector {
            attempts_per_minute: 40.0,
            failures_last_10m: 12.0,
            consecutive_failures: 12.0,
            ip_reputation_score: 1.0,
            is_first_sighting: 1.0,
            ..FeatureVector::default()
        };

        let benign = FeatureVector {
            lifetime_success_rate: 0.99,
            ..FeatureVector::default()
        };

        let hostile_score = ensemble.score(&hostile.as_vector()).expect("arity parity");
        let benign_score = ensemble.score(&benign.as_vector()).expect("arity parity");

        assert!(hostile_score > 0.7, "hostile burst observed {}", hostile_score);
        assert!(benign_score < 0.6, "benign traffic observed {}", benign_score);
    }

    #[test]
    fn hostile_reputation_signature_scores_high() {
        let ensemble = IsolationEnsemble::baseline();

        let flagged = FeatureVector {
            ip_reputation_score: 1.0,
            is_first_sighting: 1.0,
            is_anonymized_exit: 1.0,
            is_high_risk_country: 1.0,
            ..FeatureVector::default()
        };

        let score = ensemble.score(&flagged.as_vector()).expect("arity parity");
        assert!(score >= 0.65, "observed {}", score);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let ensemble = IsolationEnsemble::baseline();
        let verdict = ensemble.score(&[1.0, 2.0]);
        assert!(matches!(verdict, Err(DetectionError::FeatureArityMismatch { .. })));
    }

    #[test]
    fn artifact_roundtrip_preserves_scoring() {
        let ensemble = IsolationEnsemble::baseline();
        let serialized = serde_json::to_string(&ensemble).expect("artifact encoding");
        let rehydrated = IsolationEnsemble::from_json(&serialized).expect("artifact decoding");

        let vector = FeatureVector::default().as_vector();
        let original = ensemble.score(&vector).expect("score");
        let replayed = rehydrated.score(&vector).expect("score");
        assert!((original - replayed).abs() < 1e-12);
    }

    #[test]
    fn score_is_normalized_to_unit_interval() {
        let ensemble = IsolationEnsemble::baseline();
        let extreme = FeatureVector {
            attempts_per_minute: 1_000.0,
            failures_last_10m: 1_000.0,
            unique_usernames_last_hour: 1_000.0,
            consecutive_failures: 1_000.0,
            ip_reputation_score: 1.0,
            ..FeatureVector::default()
        };

        let score = ensemble.score(&extreme.as_vector()).expect("score");
        assert!((0.0..=1.0).contains(&score));
    }
}
