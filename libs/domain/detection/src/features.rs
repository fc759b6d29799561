// [libs/domain/detection/src/features.rs]
/*!
 * =================================================================
 * APARATO: BEHAVIORAL FEATURE EXTRACTOR (V9.0 - FULL SPECTRUM)
 * CLASIFICACIÓN: DOMAIN ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: DERIVACIÓN DE CARACTERÍSTICAS POR EVENTO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FULL SPECTRUM: 27 características en cuatro familias (temporal,
 *    conductual, geográfica, de red) derivadas del Ledger y de la fila
 *    de enriquecimiento.
 * 2. SNAPSHOT PARITY: El vector se cristaliza junto al evento para que
 *    el reentrenamiento reproduzca las entradas bit-perfectas.
 * 3. CANONICAL ORDER: 'as_vector' define el orden canónico consumido
 *    por el ensamble de anomalías; los índices son constantes nominales.
 *
 * # Mathematical Proof (Cyclical Encoding):
 * La hora del día se proyecta sobre el círculo unitario (sin/cos) para
 * que la distancia euclidiana entre las 23h y la 01h sea pequeña, tal
 * como lo es en el tiempo real. Un escalar lineal rompería esa métrica.
 * =================================================================
 */

use chrono::{DateTime, Datelike, Timelike, Utc};
use guardian_domain_models::enrichment::IpGeoRecord;
use guardian_domain_models::event::EventType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f64::consts::PI;

/// Radio medio terrestre en kilómetros (esfera de Haversine).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Estadísticas ventaneadas del Ledger para una IP observada.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehavioralWindow {
    pub attempts_last_minute: u32,
    pub attempts_last_hour: u32,
    pub failures_last_10m: u32,
    pub unique_usernames_last_hour: u32,
    pub unique_targets_last_hour: u32,
    /// Proporción de fallos sobre el total en las últimas 24 horas.
    pub failure_rate_24h: f64,
    pub consecutive_failures: u32,
    pub seconds_since_last_attempt: Option<i64>,
    pub is_first_sighting: bool,
    pub lifetime_success_rate: f64,
}

impl BehavioralWindow {
    /**
     * Incorpora el evento en curso a la ventana derivada del Ledger.
     *
     * La ventana se consulta ANTES de cristalizar el evento para que
     * 'is_first_sighting' refleje el historial previo; este método suma
     * el intento actual a los contadores ventaneados.
     */
    pub fn absorb_current(&mut self, is_failure: bool) {
        self.attempts_last_minute += 1;
        self.attempts_last_hour += 1;
        if is_failure {
            self.failures_last_10m += 1;
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }
}

/// Perfil geográfico histórico del usuario objetivo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGeoProfile {
    pub typical_latitude: Option<f64>,
    pub typical_longitude: Option<f64>,
    pub typical_utc_offset_hours: Option<f64>,
    pub known_country_codes: HashSet<String>,
}

/// Vector de características nominado, una familia por bloque.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    // --- FAMILIA TEMPORAL ---
    pub hour_of_day: f64,
    pub day_of_week: f64,
    pub is_business_hours: f64,
    pub is_weekend: f64,
    pub hour_sin: f64,
    pub hour_cos: f64,

    // --- FAMILIA CONDUCTUAL (VENTANAS SOBRE LA IP) ---
    pub attempts_per_minute: f64,
    pub attempts_last_hour: f64,
    pub failures_last_10m: f64,
    pub unique_usernames_last_hour: f64,
    pub unique_targets_last_hour: f64,
    pub failure_rate_24h: f64,
    pub consecutive_failures: f64,
    pub seconds_since_last_attempt: f64,
    pub is_first_sighting: f64,
    pub lifetime_success_rate: f64,

    // --- FAMILIA GEOGRÁFICA ---
    pub country_risk_score: f64,
    pub is_high_risk_country: f64,
    pub distance_from_typical_km: f64,
    pub is_new_country: f64,
    pub timezone_deviation_hours: f64,

    // --- FAMILIA DE RED ---
    pub is_anonymized_exit: f64,
    pub is_datacenter: f64,
    pub asn_risk_score: f64,
    pub ip_reputation_score: f64,

    // --- FAMILIA DE EVENTO ---
    pub event_is_failure: f64,
    pub targets_standard_ssh_port: f64,
}

// Índices canónicos del vector aplanado (consumidos por el ensamble).
pub const IDX_ATTEMPTS_PER_MINUTE: usize = 6;
pub const IDX_FAILURES_LAST_10M: usize = 8;
pub const IDX_UNIQUE_USERNAMES: usize = 9;
pub const IDX_CONSECUTIVE_FAILURES: usize = 12;
pub const IDX_IS_FIRST_SIGHTING: usize = 14;
pub const IDX_IS_HIGH_RISK_COUNTRY: usize = 17;
pub const IDX_IS_ANONYMIZED_EXIT: usize = 21;
pub const IDX_IP_REPUTATION: usize = 24;
pub const FEATURE_ARITY: usize = 27;

impl FeatureVector {
    /// Proyección al orden canónico consumido por el modelo de anomalías.
    pub fn as_vector(&self) -> Vec<f64> {
        vec![
            self.hour_of_day,
            self.day_of_week,
            self.is_business_hours,
            self.is_weekend,
            self.hour_sin,
            self.hour_cos,
            self.attempts_per_minute,
            self.attempts_last_hour,
            self.failures_last_10m,
            self.unique_usernames_last_hour,
            self.unique_targets_last_hour,
            self.failure_rate_24h,
            self.consecutive_failures,
            self.seconds_since_last_attempt,
            self.is_first_sighting,
            self.lifetime_success_rate,
            self.country_risk_score,
            self.is_high_risk_country,
            self.distance_from_typical_km,
            self.is_new_country,
            self.timezone_deviation_hours,
            self.is_anonymized_exit,
            self.is_datacenter,
            self.asn_risk_score,
            self.ip_reputation_score,
            self.event_is_failure,
            self.targets_standard_ssh_port,
        ]
    }

    /// Instantánea JSON cristalizada junto al evento en el Ledger.
    pub fn to_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Aporte de la capa geográfica al puntaje compuesto (0-100).
    pub fn geographic_layer_score(&self) -> f64 {
        let mut accumulated_score = self.country_risk_score * 40.0;

        if self.is_high_risk_country > 0.5 {
            accumulated_score += 35.0;
        }
        if self.is_new_country > 0.5 {
            accumulated_score += 15.0;
        }
        if self.distance_from_typical_km > 5_000.0 {
            accumulated_score += 10.0;
        }
        if self.timezone_deviation_hours >= 6.0 {
            accumulated_score += 5.0;
        }

        accumulated_score.clamp(0.0, 100.0)
    }
}

pub struct FeatureExtractor {
    /// Códigos ISO-3166 de países considerados de alto riesgo (configurable).
    high_risk_country_codes: HashSet<String>,
}

impl FeatureExtractor {
    pub fn new(high_risk_country_codes: HashSet<String>) -> Self {
        Self { high_risk_country_codes }
    }

    /**
     * Deriva el vector completo para un evento observado.
     *
     * @param event_timestamp Instante del evento (UTC).
     * @param event_type Resultado de la autenticación.
     * @param target_port Puerto objetivo si el parser lo extrajo.
     * @param window Estadísticas ventaneadas del Ledger para la IP.
     * @param enrichment Fila de enriquecimiento si ya existe.
     * @param user_profile Perfil geográfico histórico del usuario objetivo.
     */
    pub fn extract(
        &self,
        event_timestamp: DateTime<Utc>,
        event_type: EventType,
        target_port: Option<u16>,
        window: &BehavioralWindow,
        enrichment: Option<&IpGeoRecord>,
        user_profile: &UserGeoProfile,
    ) -> FeatureVector {
        let hour = event_timestamp.hour() as f64;
        let weekday = event_timestamp.weekday().num_days_from_monday() as f64;
        let hour_angle = 2.0 * PI * hour / 24.0;

        let mut features = FeatureVector {
            hour_of_day: hour,
            day_of_week: weekday,
            is_business_hours: if (9.0..18.0).contains(&hour) && weekday < 5.0 { 1.0 } else { 0.0 },
            is_weekend: if weekday >= 5.0 { 1.0 } else { 0.0 },
            hour_sin: hour_angle.sin(),
            hour_cos: hour_angle.cos(),

            attempts_per_minute: window.attempts_last_minute as f64,
            attempts_last_hour: window.attempts_last_hour as f64,
            failures_last_10m: window.failures_last_10m as f64,
            unique_usernames_last_hour: window.unique_usernames_last_hour as f64,
            unique_targets_last_hour: window.unique_targets_last_hour as f64,
            failure_rate_24h: window.failure_rate_24h,
            consecutive_failures: window.consecutive_failures as f64,
            seconds_since_last_attempt: window
                .seconds_since_last_attempt
                .map(|s| s as f64)
                .unwrap_or(-1.0),
            is_first_sighting: if window.is_first_sighting { 1.0 } else { 0.0 },
            lifetime_success_rate: window.lifetime_success_rate,

            event_is_failure: if event_type == EventType::Failed { 1.0 } else { 0.0 },
            targets_standard_ssh_port: match target_port {
                Some(22) | None => 1.0,
                Some(_) => 0.0,
            },
            ..FeatureVector::default()
        };

        if let Some(geo_row) = enrichment {
            self.fold_geographic_family(&mut features, geo_row, user_profile);
            Self::fold_network_family(&mut features, geo_row);
        }

        features
    }

    fn fold_geographic_family(
        &self,
        features: &mut FeatureVector,
        geo_row: &IpGeoRecord,
        user_profile: &UserGeoProfile,
    ) {
        if let Some(country_code) = geo_row.country_code.as_deref() {
            features.is_high_risk_country =
                if self.high_risk_country_codes.contains(country_code) { 1.0 } else { 0.0 };
            features.country_risk_score = if features.is_high_risk_country > 0.5 { 0.9 } else { 0.2 };
            features.is_new_country = if user_profile.known_country_codes.is_empty()
                || user_profile.known_country_codes.contains(country_code)
            {
                0.0
            } else {
                1.0
            };
        }

        if let (Some(lat), Some(lon), Some(typical_lat), Some(typical_lon)) = (
            geo_row.latitude,
            geo_row.longitude,
            user_profile.typical_latitude,
            user_profile.typical_longitude,
        ) {
            features.distance_from_typical_km =
                haversine_distance_km(lat, lon, typical_lat, typical_lon);
        }

        if let (Some(offset_seconds), Some(typical_offset_hours)) =
            (geo_row.utc_offset_seconds, user_profile.typical_utc_offset_hours)
        {
            let observed_offset_hours = offset_seconds as f64 / 3600.0;
            features.timezone_deviation_hours = (observed_offset_hours - typical_offset_hours).abs();
        }
    }

    fn fold_network_family(features: &mut FeatureVector, geo_row: &IpGeoRecord) {
        features.is_anonymized_exit =
            if geo_row.is_proxy || geo_row.is_vpn || geo_row.is_tor { 1.0 } else { 0.0 };
        features.is_datacenter = if geo_row.is_datacenter { 1.0 } else { 0.0 };

        // Riesgo por ASN: los rangos de hospedaje efímero concentran abuso.
        features.asn_risk_score = if geo_row.is_datacenter || geo_row.is_vpn { 0.7 } else { 0.1 };

        features.ip_reputation_score = crate::reputation::reputation_layer_score(geo_row) / 100.0;
    }
}

/// Distancia sobre la esfera terrestre entre dos coordenadas, en km.
pub fn haversine_distance_km(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let delta_lat = (lat_b - lat_a).to_radians();
    let delta_lon = (lon_b - lon_a).to_radians();

    let half_chord = (delta_lat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * half_chord.sqrt().asin()
}
