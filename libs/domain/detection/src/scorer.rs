// [libs/domain/detection/src/scorer.rs]
/*!
 * =================================================================
 * APARATO: COMPOSITE RISK SCORER (V13.0 - WEIGHTED VERDICT)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: FUSIÓN PONDERADA DE LAS CUATRO CAPAS (0-100)
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. RUNTIME WEIGHTS: Los pesos viven en 'system_settings' del Ledger;
 *    este aparato los recibe inyectados, jamás los fija en duro.
 * 2. UPPER BAND WINS: Un puntaje exactamente en la frontera (30, 60,
 *    80) clasifica en la banda superior.
 * 3. DOMINANT TIE-BREAK: A contribución igual, la precedencia es
 *    reputación > regla > anomalía > geografía (gobierna la razón
 *    registrada del bloqueo).
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Pesos de fusión; la suma nominal es 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub rule: f64,
    pub anomaly: f64,
    pub reputation: f64,
    pub geographic: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { rule: 0.25, anomaly: 0.30, reputation: 0.35, geographic: 0.10 }
    }
}

/// Salida cruda de cada capa, ya en escala 0-100.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LayerScores {
    pub rule: f64,
    pub anomaly: f64,
    pub reputation: f64,
    pub geographic: f64,
}

/// Capa dominante del veredicto (ordenada por precedencia de desempate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Reputation,
    Rule,
    Anomaly,
    Geographic,
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Reputation => "reputation",
            LayerKind::Rule => "rule",
            LayerKind::Anomaly => "anomaly",
            LayerKind::Geographic => "geographic",
        }
    }
}

/// Banda de riesgo derivada del puntaje compuesto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    /// Fronteras 30/60/80; la banda superior gana en el empate exacto.
    pub fn classify(composite_score: f64) -> Self {
        if composite_score >= 80.0 {
            RiskBand::Critical
        } else if composite_score >= 60.0 {
            RiskBand::High
        } else if composite_score >= 30.0 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeAssessment {
    /// Suma ponderada recortada a [0, 100].
    pub composite_score: f64,
    pub band: RiskBand,
    pub dominant_layer: LayerKind,
    pub layers: LayerScores,
}

pub struct CompositeScorer;

impl CompositeScorer {
    pub fn score(layers: LayerScores, weights: ScoringWeights) -> CompositeAssessment {
        let composite_score = (layers.rule * weights.rule
            + layers.anomaly * weights.anomaly
            + layers.reputation * weights.reputation
            + layers.geographic * weights.geographic)
            .clamp(0.0, 100.0);

        // Contribuciones ponderadas en orden de precedencia de desempate.
        let weighted_contributions = [
            (LayerKind::Reputation, layers.reputation * weights.reputation),
            (LayerKind::Rule, layers.rule * weights.rule),
            (LayerKind::Anomaly, layers.anomaly * weights.anomaly),
            (LayerKind::Geographic, layers.geographic * weights.geographic),
        ];

        let mut dominant_layer = LayerKind::Reputation;
        let mut dominant_contribution = f64::MIN;
        for (layer, contribution) in weighted_contributions {
            // Estrictamente mayor: el orden del arreglo sella el desempate.
            if contribution > dominant_contribution {
                dominant_layer = layer;
                dominant_contribution = contribution;
            }
        }

        CompositeAssessment {
            composite_score,
            band: RiskBand::classify(composite_score),
            dominant_layer,
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_boundaries_classify_upward() {
        assert_eq!(RiskBand::classify(30.0), RiskBand::Medium);
        assert_eq!(RiskBand::classify(60.0), RiskBand::High);
        assert_eq!(RiskBand::classify(80.0), RiskBand::Critical);
        assert_eq!(RiskBand::classify(29.999), RiskBand::Low);
        assert_eq!(RiskBand::classify(100.0), RiskBand::Critical);
    }

    #[test]
    fn weighted_sum_is_clamped() {
        let saturated = CompositeScorer::score(
            LayerScores { rule: 100.0, anomaly: 100.0, reputation: 100.0, geographic: 100.0 },
            ScoringWeights { rule: 0.5, anomaly: 0.5, reputation: 0.5, geographic: 0.5 },
        );
        assert_eq!(saturated.composite_score, 100.0);
        assert_eq!(saturated.band, RiskBand::Critical);
    }

    #[test]
    fn reputation_wins_exact_contribution_ties() {
        // Capas calibradas para contribuir exactamente lo mismo.
        let assessment = CompositeScorer::score(
            LayerScores { rule: 70.0, anomaly: 70.0, reputation: 70.0, geographic: 70.0 },
            ScoringWeights { rule: 0.25, anomaly: 0.25, reputation: 0.25, geographic: 0.25 },
        );
        assert_eq!(assessment.dominant_layer, LayerKind::Reputation);
    }

    #[test]
    fn rule_beats_anomaly_on_ties() {
        let assessment = CompositeScorer::score(
            LayerScores { rule: 80.0, anomaly: 80.0, reputation: 0.0, geographic: 0.0 },
            ScoringWeights { rule: 0.30, anomaly: 0.30, reputation: 0.35, geographic: 0.05 },
        );
        assert_eq!(assessment.dominant_layer, LayerKind::Rule);
    }

    #[test]
    fn default_weights_sum_to_unity() {
        let weights = ScoringWeights::default();
        let total = weights.rule + weights.anomaly + weights.reputation + weights.geographic;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn reputation_dominant_verdict_records_reputation_reason() {
        let assessment = CompositeScorer::score(
            LayerScores { rule: 95.0, anomaly: 70.0, reputation: 100.0, geographic: 10.0 },
            ScoringWeights::default(),
        );
        assert_eq!(assessment.dominant_layer, LayerKind::Reputation);
        assert!(assessment.composite_score >= 80.0);
        assert_eq!(assessment.band, RiskBand::Critical);
    }
}
