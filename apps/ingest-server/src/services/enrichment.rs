// [apps/ingest-server/src/services/enrichment.rs]
/*!
 * =================================================================
 * APARATO: IP ENRICHMENT SERVICE (V14.0 - FINGERPRINT GATE)
 * CLASIFICACIÓN: INGEST SERVICE (ESTRATO L3)
 * RESPONSABILIDAD: GEO + REPUTACIÓN CON GASTO EXTERNO ACOTADO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. FINGERPRINT GATE: A lo sumo UNA consulta externa en vuelo por IP;
 *    los llamantes concurrentes esperan el resultado del ganador
 *    (doble verificación de caché bajo el cerrojo).
 * 2. TTL STRATA: AbuseIPDB 5min, VirusTotal 1h, Geo 24h, negativo 1h.
 * 3. PRIVATE SHORT-CIRCUIT: IPs privadas/loopback jamás se despachan
 *    afuera; reciben la fila sintética 'clean'.
 * 4. BEST EFFORT: Los fallos externos siembran caché negativa y no se
 *    propagan; el pipeline continúa con lo presente.
 * =================================================================
 */

use crate::config::ServerConfig;
use crate::state::KeyedMutexRegistry;
use chrono::{DateTime, Duration, Utc};
use guardian_domain_models::enrichment::IpGeoRecord;
use guardian_infra_db::repositories::GeoRepository;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// TTL de la familia geográfica (esencialmente estática).
const GEO_TTL_HOURS: i64 = 24;
/// TTL de la confianza AbuseIPDB (frescura vs. cuota gratuita diaria).
const ABUSE_TTL_MINUTES: i64 = 5;
/// TTL de VirusTotal (lento de cambiar, API costosa).
const VT_TTL_HOURS: i64 = 1;
/// TTL del resultado negativo (evita re-consultar IPs limpias).
const NEGATIVE_TTL_HOURS: i64 = 1;

pub struct EnrichmentService {
    geo_repository: Arc<GeoRepository>,
    config: Arc<ServerConfig>,
    http_client: Client,
    /// Cerrojo de huella: serializa las consultas externas por IP.
    inflight_gate: KeyedMutexRegistry,
}

impl EnrichmentService {
    pub fn new(geo_repository: Arc<GeoRepository>, config: Arc<ServerConfig>) -> Self {
        Self {
            geo_repository,
            config,
            http_client: Client::builder()
                .user_agent("Guardian-Ingest/0.4")
                .build()
                .unwrap_or_default(),
            inflight_gate: KeyedMutexRegistry::new(),
        }
    }

    /**
     * Enriquece la IP con latencia y gasto externo acotados.
     *
     * Nunca retorna error: el contrato es best-effort y el pipeline
     * procede con los campos presentes (None = sin fila utilizable).
     */
    #[instrument(skip(self), fields(ip = %observed_ip))]
    pub async fn enrich(&self, observed_ip: &str) -> Option<IpGeoRecord> {
        // 1. CORTO-CIRCUITO DE RED PRIVADA
        if is_private_or_loopback(observed_ip) {
            return match self.geo_repository.store_synthetic_clean(observed_ip).await {
                Ok(clean_row) => Some(clean_row),
                Err(storage_fault) => {
                    warn!("⚠️ [ENRICH_BYPASS]: Synthetic clean row failed: {}", storage_fault);
                    None
                }
            };
        }

        let now = Utc::now();

        // 2. LECTURA OPTIMISTA DE CACHÉ (sin cerrojo)
        if let Ok(Some(cached_row)) = self.geo_repository.find(observed_ip).await {
            if !self.any_family_stale(&cached_row, now) {
                return Some(cached_row);
            }
        }

        // 3. PUERTA DE HUELLA: un solo refresco en vuelo por IP
        let _inflight_guard = self.inflight_gate.acquire(observed_ip).await;

        // Doble verificación: el ganador anterior pudo haber refrescado.
        let cached_row = self.geo_repository.find(observed_ip).await.ok().flatten();
        if let Some(ref fresh_row) = cached_row {
            if !self.any_family_stale(fresh_row, now) {
                return cached_row;
            }
        }

        if !self.config.external_lookups_enabled {
            // Sin salida externa: sellar negativo corto y entregar lo presente.
            let _ = self
                .geo_repository
                .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                .await;
            return self.geo_repository.find(observed_ip).await.ok().flatten();
        }

        // 4. REFRESCO POR FAMILIA VENCIDA
        if family_stale(cached_row.as_ref().and_then(|r| r.geo_expires_at), now) {
            self.refresh_geolocation(observed_ip, now).await;
        }
        if family_stale(cached_row.as_ref().and_then(|r| r.abuse_expires_at), now) {
            self.refresh_abuse(observed_ip, now).await;
        }
        if family_stale(cached_row.as_ref().and_then(|r| r.vt_expires_at), now) {
            self.refresh_virustotal(observed_ip, now).await;
        }

        self.geo_repository.find(observed_ip).await.ok().flatten()
    }

    fn any_family_stale(&self, row: &IpGeoRecord, now: DateTime<Utc>) -> bool {
        family_stale(row.geo_expires_at, now)
            || family_stale(row.abuse_expires_at, now)
            || family_stale(row.vt_expires_at, now)
    }

    /// Geolocalización vía ip-api.com (JSON no confiable, validado campo a campo).
    async fn refresh_geolocation(&self, observed_ip: &str, now: DateTime<Utc>) {
        let lookup_url = format!(
            "http://ip-api.com/json/{observed_ip}?fields=status,countryCode,country,city,as,isp,lat,lon,offset,proxy,hosting"
        );

        let lookup_outcome = self
            .http_client
            .get(&lookup_url)
            .timeout(self.config.geolocation_timeout)
            .send()
            .await;

        let payload: Option<Value> = match lookup_outcome {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            Ok(response) => {
                debug!("🌐 [GEO_MISS]: Provider answered HTTP {}", response.status());
                None
            }
            Err(transport_fault) => {
                debug!("🌐 [GEO_MISS]: Transport fault: {}", transport_fault);
                None
            }
        };

        let Some(payload) = payload else {
            let _ = self
                .geo_repository
                .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                .await;
            return;
        };

        if payload.get("status").and_then(Value::as_str) != Some("success") {
            let _ = self
                .geo_repository
                .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                .await;
            return;
        }

        let is_hosting = payload.get("hosting").and_then(Value::as_bool).unwrap_or(false);
        let geo_row = IpGeoRecord {
            country_code: payload.get("countryCode").and_then(Value::as_str).map(String::from),
            country_name: payload.get("country").and_then(Value::as_str).map(String::from),
            city: payload.get("city").and_then(Value::as_str).map(String::from),
            asn: payload
                .get("as")
                .and_then(Value::as_str)
                .and_then(|as_field| as_field.strip_prefix("AS"))
                .and_then(|tail| tail.split_whitespace().next())
                .and_then(|number| number.parse().ok()),
            isp: payload.get("isp").and_then(Value::as_str).map(String::from),
            latitude: payload.get("lat").and_then(Value::as_f64),
            longitude: payload.get("lon").and_then(Value::as_f64),
            utc_offset_seconds: payload.get("offset").and_then(Value::as_i64).map(|o| o as i32),
            is_proxy: payload.get("proxy").and_then(Value::as_bool).unwrap_or(false),
            is_vpn: false,
            is_tor: false,
            is_datacenter: is_hosting,
            ..IpGeoRecord::synthetic_clean(observed_ip, now)
        };

        if let Err(storage_fault) = self
            .geo_repository
            .upsert_geolocation(&geo_row, now + Duration::hours(GEO_TTL_HOURS))
            .await
        {
            warn!("⚠️ [GEO_STORE_FAULT]: {}", storage_fault);
        }
    }

    /// Reputación AbuseIPDB (/api/v2/check, ventana de 90 días).
    async fn refresh_abuse(&self, observed_ip: &str, now: DateTime<Utc>) {
        let Some(api_key) = self.config.abuseipdb_api_key.as_deref() else {
            let _ = self
                .geo_repository
                .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                .await;
            return;
        };

        let lookup_url = format!(
            "https://api.abuseipdb.com/api/v2/check?ipAddress={observed_ip}&maxAgeInDays=90"
        );

        let lookup_outcome = self
            .http_client
            .get(&lookup_url)
            .header("Key", api_key)
            .header("Accept", "application/json")
            .timeout(self.config.reputation_timeout)
            .send()
            .await;

        let payload: Option<Value> = match lookup_outcome {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            _ => None,
        };

        let parsed_report = payload.as_ref().and_then(|body| {
            let data = body.get("data")?;
            Some((
                data.get("abuseConfidenceScore").and_then(Value::as_u64)? as u8,
                data.get("totalReports").and_then(Value::as_u64).unwrap_or(0) as u32,
            ))
        });

        match parsed_report {
            Some((confidence_score, report_count)) => {
                if let Err(storage_fault) = self
                    .geo_repository
                    .upsert_abuse(
                        observed_ip,
                        confidence_score,
                        report_count,
                        now + Duration::minutes(ABUSE_TTL_MINUTES),
                    )
                    .await
                {
                    warn!("⚠️ [ABUSE_STORE_FAULT]: {}", storage_fault);
                }
            }
            None => {
                let _ = self
                    .geo_repository
                    .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                    .await;
            }
        }
    }

    /// Reputación VirusTotal (/api/v3/ip_addresses/{ip}).
    async fn refresh_virustotal(&self, observed_ip: &str, now: DateTime<Utc>) {
        let Some(api_key) = self.config.virustotal_api_key.as_deref() else {
            let _ = self
                .geo_repository
                .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                .await;
            return;
        };

        let lookup_url = format!("https://www.virustotal.com/api/v3/ip_addresses/{observed_ip}");

        let lookup_outcome = self
            .http_client
            .get(&lookup_url)
            .header("x-apikey", api_key)
            .timeout(self.config.reputation_timeout)
            .send()
            .await;

        let payload: Option<Value> = match lookup_outcome {
            Ok(response) if response.status().is_success() => response.json().await.ok(),
            _ => None,
        };

        let parsed_verdict = payload.as_ref().and_then(|body| {
            let stats = body
                .get("data")?
                .get("attributes")?
                .get("last_analysis_stats")?;
            let malicious = stats.get("malicious").and_then(Value::as_u64).unwrap_or(0) as u32;
            let harmless = stats.get("harmless").and_then(Value::as_u64).unwrap_or(0) as u32;
            let suspicious = stats.get("suspicious").and_then(Value::as_u64).unwrap_or(0) as u32;
            let undetected = stats.get("undetected").and_then(Value::as_u64).unwrap_or(0) as u32;
            Some((malicious + suspicious, malicious + harmless + suspicious + undetected))
        });

        match parsed_verdict {
            Some((positives, total)) if total > 0 => {
                if let Err(storage_fault) = self
                    .geo_repository
                    .upsert_virustotal(observed_ip, positives, total, now + Duration::hours(VT_TTL_HOURS))
                    .await
                {
                    warn!("⚠️ [VT_STORE_FAULT]: {}", storage_fault);
                }
            }
            _ => {
                let _ = self
                    .geo_repository
                    .mark_negative(observed_ip, now + Duration::hours(NEGATIVE_TTL_HOURS))
                    .await;
            }
        }
    }
}

fn family_stale(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expiry) => expiry <= now,
        None => true,
    }
}

/// IPs que jamás se despachan a proveedores externos.
pub fn is_private_or_loopback(observed_ip: &str) -> bool {
    match observed_ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        Ok(IpAddr::V6(v6)) => {
            // fc00::/7 (unique local) + loopback + no especificada.
            v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00
        }
        Err(_) => false,
    }
}
