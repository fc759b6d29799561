use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Etiqueta de amenaza derivada del enriquecimiento de reputación.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Unknown,
    Clean,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Unknown => "unknown",
            ThreatLevel::Clean => "clean",
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }
}

/// Fila de enriquecimiento fusionada por IP (geolocalización + reputación).
///
/// Cada familia de datos conserva su propio instante de expiración: la
/// geolocalización es esencialmente estática (24h), AbuseIPDB caduca en
/// minutos y VirusTotal en una hora.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpGeoRecord {
    #[serde(rename = "ip_address")]
    pub ip: String,

    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    #[typeshare(serialized_as = "number")]
    pub asn: Option<u32>,
    pub isp: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Desplazamiento UTC del huso horario de la IP, en segundos.
    #[typeshare(serialized_as = "number")]
    pub utc_offset_seconds: Option<i32>,

    pub is_proxy: bool,
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_datacenter: bool,

    /// Confianza de abuso 0-100 reportada por AbuseIPDB.
    pub abuse_confidence_score: Option<u8>,
    #[typeshare(serialized_as = "number")]
    pub abuse_report_count: Option<u32>,

    #[typeshare(serialized_as = "number")]
    pub vt_positives: Option<u32>,
    #[typeshare(serialized_as = "number")]
    pub vt_total: Option<u32>,

    pub threat_level: ThreatLevel,

    #[typeshare(serialized_as = "String")]
    pub geo_expires_at: Option<DateTime<Utc>>,
    #[typeshare(serialized_as = "String")]
    pub abuse_expires_at: Option<DateTime<Utc>>,
    #[typeshare(serialized_as = "String")]
    pub vt_expires_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl IpGeoRecord {
    /// Fila sintética para IPs privadas/loopback: jamás se consulta afuera.
    pub fn synthetic_clean(ip: &str, now: DateTime<Utc>) -> Self {
        Self {
            ip: ip.to_string(),
            country_code: None,
            country_name: None,
            city: None,
            asn: None,
            isp: None,
            latitude: None,
            longitude: None,
            utc_offset_seconds: None,
            is_proxy: false,
            is_vpn: false,
            is_tor: false,
            is_datacenter: false,
            abuse_confidence_score: Some(0),
            abuse_report_count: Some(0),
            vt_positives: Some(0),
            vt_total: Some(0),
            threat_level: ThreatLevel::Clean,
            geo_expires_at: None,
            abuse_expires_at: None,
            vt_expires_at: None,
            updated_at: now,
        }
    }
}
