// [libs/domain/detection/src/reputation.rs]
/*!
 * =================================================================
 * APARATO: REPUTATION LAYER SCORER (V5.0 - INTEL WEIGHTED)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: PUNTAJE DE LA CAPA DE REPUTACIÓN (0-100)
 *
 * # Logic:
 * 1. IP limpia -> 0.
 * 2. Confianza AbuseIPDB >= 75 o ratio VirusTotal >= 0.1 -> 100.
 * 3. En el rango intermedio, el máximo entre la confianza de abuso,
 *    el ratio VT escalado y los indicadores de anonimización.
 * =================================================================
 */

use guardian_domain_models::enrichment::{IpGeoRecord, ThreatLevel};

/// Umbral de confianza AbuseIPDB que satura la capa.
const ABUSE_SATURATION_CONFIDENCE: u8 = 75;
/// Ratio de positivos VirusTotal que satura la capa.
const VT_SATURATION_RATIO: f64 = 0.1;

pub fn reputation_layer_score(geo_row: &IpGeoRecord) -> f64 {
    if geo_row.threat_level == ThreatLevel::Clean {
        return 0.0;
    }

    let abuse_confidence = geo_row.abuse_confidence_score.unwrap_or(0);

    let vt_ratio = match (geo_row.vt_positives, geo_row.vt_total) {
        (Some(positives), Some(total)) if total > 0 => positives as f64 / total as f64,
        _ => 0.0,
    };

    if abuse_confidence >= ABUSE_SATURATION_CONFIDENCE || vt_ratio >= VT_SATURATION_RATIO {
        return 100.0;
    }

    let mut graded_score = abuse_confidence as f64;
    graded_score = graded_score.max(vt_ratio * 500.0);

    if geo_row.is_tor {
        graded_score = graded_score.max(70.0);
    }
    if geo_row.is_proxy || geo_row.is_vpn {
        graded_score = graded_score.max(55.0);
    }
    if geo_row.is_datacenter {
        graded_score = graded_score.max(35.0);
    }

    graded_score.clamp(0.0, 100.0)
}
