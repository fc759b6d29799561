// [tests/mirror/libs/domain/detection/composite_bands.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE BANDAS COMPUESTAS (V3.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: FUSIÓN DE LAS CUATRO CAPAS CONTRA LAS BANDAS
 *
 * # Mathematical Proof (Layer Fusion):
 * Con los pesos nominales (0.25, 0.30, 0.35, 0.10) el certificador
 * reproduce los veredictos de frontera: tráfico nominal en banda baja,
 * ráfaga de umbral en banda media y reputación saturada en crítica.
 * =================================================================
 */

use guardian_domain_detection::anomaly::IsolationEnsemble;
use guardian_domain_detection::features::FeatureVector;
use guardian_domain_detection::scorer::{
    CompositeScorer, LayerKind, LayerScores, RiskBand, ScoringWeights,
};

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Tráfico nominal permanece en banda baja.
     */
    #[test]
    fn certify_nominal_traffic_stays_low() {
        println!("\n🎚️ [INICIO]: Auditoría de Fusión de Capas V3.0...");

        let ensemble = IsolationEnsemble::baseline();
        let benign_vector = FeatureVector {
            lifetime_success_rate: 0.98,
            ..FeatureVector::default()
        };
        let anomaly = ensemble.score(&benign_vector.as_vector()).expect("score");

        let assessment = CompositeScorer::score(
            LayerScores { rule: 0.0, anomaly: anomaly * 100.0, reputation: 0.0, geographic: 0.0 },
            ScoringWeights::default(),
        );

        assert_eq!(assessment.band, RiskBand::Low, "observed {}", assessment.composite_score);
        println!("   ✅ Nominal: {:.1} (low).", assessment.composite_score);
    }

    /**
     * CERTIFICACIÓN: Reputación saturada + regla coincidente cruza la
     * banda crítica con la reputación como capa dominante.
     */
    #[test]
    fn certify_saturated_reputation_is_critical_and_dominant() {
        let ensemble = IsolationEnsemble::baseline();
        let flagged_vector = FeatureVector {
            ip_reputation_score: 1.0,
            is_first_sighting: 1.0,
            is_anonymized_exit: 1.0,
            is_high_risk_country: 1.0,
            country_risk_score: 0.9,
            ..FeatureVector::default()
        };
        let anomaly = ensemble.score(&flagged_vector.as_vector()).expect("score");

        let assessment = CompositeScorer::score(
            LayerScores {
                rule: 100.0,
                anomaly: anomaly * 100.0,
                reputation: 100.0,
                geographic: flagged_vector.geographic_layer_score(),
            },
            ScoringWeights::default(),
        );

        assert_eq!(assessment.band, RiskBand::Critical, "observed {}", assessment.composite_score);
        assert!(assessment.composite_score >= 81.0, "observed {}", assessment.composite_score);
        assert_eq!(assessment.dominant_layer, LayerKind::Reputation);
    }

    /**
     * CERTIFICACIÓN: La variante de pesos con dominancia de regla
     * (0.35/0.30/0.25/0.10) sigue sumando la unidad y reordena la capa
     * dominante sin redesplegar.
     */
    #[test]
    fn certify_rule_dominant_weight_variant() {
        let rule_dominant = ScoringWeights { rule: 0.35, anomaly: 0.30, reputation: 0.25, geographic: 0.10 };
        let total = rule_dominant.rule + rule_dominant.anomaly + rule_dominant.reputation + rule_dominant.geographic;
        assert!((total - 1.0).abs() < 1e-9);

        let assessment = CompositeScorer::score(
            LayerScores { rule: 90.0, anomaly: 40.0, reputation: 90.0, geographic: 0.0 },
            rule_dominant,
        );
        assert_eq!(assessment.dominant_layer, LayerKind::Rule);
    }

    /**
     * CERTIFICACIÓN: Las fronteras exactas clasifican hacia arriba.
     */
    #[test]
    fn certify_exact_boundaries_promote_upward() {
        for (boundary, expected_band) in [
            (30.0, RiskBand::Medium),
            (60.0, RiskBand::High),
            (80.0, RiskBand::Critical),
        ] {
            assert_eq!(RiskBand::classify(boundary), expected_band, "boundary {}", boundary);
        }
        println!("🏁 [INFORME]: Fusión de Capas certificada GOLD_MASTER.");
    }
}
