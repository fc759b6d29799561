// [apps/ingest-server/src/services/parser.rs]
/*!
 * =================================================================
 * APARATO: AUTH LOG PARSER (V10.0 - FIRST MATCH WINS)
 * CLASIFICACIÓN: INGEST SERVICE (ESTRATO L3)
 * RESPONSABILIDAD: CLASIFICACIÓN DE LÍNEAS CRUDAS EN EVENTOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDERED CLASSIFICATION: Las reglas se aplican en orden y la
 *    primera coincidencia gana; cualquier otra línea se descarta en
 *    silencio (jamás se cristalizan eventos 'invalid').
 * 2. TIMESTAMP FALLBACK: Prefijo syslog (o RFC-3339) cuando existe;
 *    instante de ingesta en su defecto.
 * 3. FAIL2BAN SIDE-CHANNEL: Las líneas Ban/Unban de fail2ban se
 *    desvían al registro propio sin producir eventos de autenticación.
 * =================================================================
 */

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use guardian_domain_models::event::{AuthMethod, EventType};

/// Línea clasificada lista para cristalizar como evento.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAuthLine {
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub auth_method: AuthMethod,
    pub source_ip: String,
    pub target_username: String,
    pub source_port: Option<u16>,
    pub failure_reason: Option<String>,
}

/// Observación Ban/Unban emitida por fail2ban en el borde.
#[derive(Debug, Clone, PartialEq)]
pub struct Fail2banObservation {
    pub jail: String,
    pub ip: String,
    pub is_ban: bool,
}

pub struct AuthLogParser;

impl AuthLogParser {
    /**
     * Clasifica una línea cruda; None significa descarte silencioso.
     *
     * Reglas en orden, primera coincidencia gana:
     * 1. 'Failed password' | 'authentication failure' -> failed/password
     * 2. 'Invalid user' -> failed con failure_reason=invalid_user
     * 3. 'Accepted password' -> successful/password
     * 4. 'Accepted publickey' -> successful/publickey
     */
    pub fn parse_line(raw_line: &str, ingestion_instant: DateTime<Utc>) -> Option<ParsedAuthLine> {
        let timestamp =
            extract_syslog_timestamp(raw_line, ingestion_instant).unwrap_or(ingestion_instant);

        let (event_type, auth_method, failure_reason) =
            if raw_line.contains("Failed password") || raw_line.contains("authentication failure") {
                (EventType::Failed, AuthMethod::Password, None)
            } else if raw_line.contains("Invalid user") {
                (EventType::Failed, AuthMethod::Password, Some("invalid_user".to_string()))
            } else if raw_line.contains("Accepted password") {
                (EventType::Successful, AuthMethod::Password, None)
            } else if raw_line.contains("Accepted publickey") {
                (EventType::Successful, AuthMethod::Publickey, None)
            } else {
                return None;
            };

        let source_ip = extract_token_after(raw_line, " from ")?;
        let source_port = extract_token_after(raw_line, " port ").and_then(|p| p.parse().ok());
        let target_username = extract_username(raw_line).unwrap_or_else(|| "unknown".to_string());

        Some(ParsedAuthLine {
            timestamp,
            event_type,
            auth_method,
            source_ip,
            target_username,
            source_port,
            failure_reason,
        })
    }

    /// Detección del canal lateral fail2ban (Ban/Unban por jaula).
    pub fn parse_fail2ban(raw_line: &str) -> Option<Fail2banObservation> {
        if !raw_line.contains("fail2ban") {
            return None;
        }

        let (is_ban, marker) = if raw_line.contains(" Ban ") {
            (true, " Ban ")
        } else if raw_line.contains(" Unban ") {
            (false, " Unban ")
        } else {
            return None;
        };

        let ip = extract_token_after(raw_line, marker)?;
        let jail = raw_line
            .rfind('[')
            .and_then(|open| raw_line[open + 1..].find(']').map(|close| raw_line[open + 1..open + 1 + close].to_string()))
            .unwrap_or_else(|| "sshd".to_string());

        Some(Fail2banObservation { jail, ip, is_ban })
    }
}

/// Primer token tras el marcador, saneado de puntuación colgante.
fn extract_token_after(raw_line: &str, marker: &str) -> Option<String> {
    let tail_start = raw_line.find(marker)? + marker.len();
    let token = raw_line[tail_start..]
        .split_whitespace()
        .next()?
        .trim_end_matches([':', ',', ';']);
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Usuario objetivo: token tras 'for' (saltando 'invalid user') o tras 'Invalid user'.
fn extract_username(raw_line: &str) -> Option<String> {
    if let Some(tail_start) = raw_line.find("Invalid user ") {
        return raw_line[tail_start + "Invalid user ".len()..]
            .split_whitespace()
            .next()
            .map(|token| token.to_string());
    }

    let tail_start = raw_line.find(" for ")? + " for ".len();
    let mut tokens = raw_line[tail_start..].split_whitespace();
    let first_token = tokens.next()?;

    if first_token == "invalid" {
        // 'Failed password for invalid user root from ...'
        tokens.next(); // 'user'
        return tokens.next().map(|token| token.to_string());
    }
    Some(first_token.to_string())
}

/**
 * Prefijo temporal: RFC-3339 (rsyslog moderno) o syslog clásico
 * 'Mon dd HH:MM:SS' (sin año: se asume el del instante de ingesta).
 */
fn extract_syslog_timestamp(
    raw_line: &str,
    ingestion_instant: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let first_token = raw_line.split_whitespace().next()?;
    if let Ok(instant) = DateTime::parse_from_rfc3339(first_token) {
        return Some(instant.with_timezone(&Utc));
    }

    // Prefijo clásico: tres primeros tokens.
    let mut tokens = raw_line.split_whitespace();
    let month = tokens.next()?;
    let day = tokens.next()?;
    let clock = tokens.next()?;

    let candidate = format!("{} {} {} {}", ingestion_instant.year(), month, day, clock);
    let naive = NaiveDateTime::parse_from_str(&candidate, "%Y %b %d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestion() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn failed_password_classifies_with_extraction() {
        let line = "Jan 10 03:14:07 bastion sshd[991]: Failed password for root from 203.0.113.5 port 51022 ssh2";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");

        assert_eq!(parsed.event_type, EventType::Failed);
        assert_eq!(parsed.auth_method, AuthMethod::Password);
        assert_eq!(parsed.source_ip, "203.0.113.5");
        assert_eq!(parsed.target_username, "root");
        assert_eq!(parsed.source_port, Some(51022));
        assert_eq!(parsed.timestamp.to_rfc3339(), "2026-01-10T03:14:07+00:00");
    }

    #[test]
    fn failed_password_for_invalid_user_wins_first_rule() {
        let line = "Jan 10 03:14:09 bastion sshd[991]: Failed password for invalid user admin from 198.51.100.7 port 40022 ssh2";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");

        // La regla 1 gana por orden; el usuario igual se extrae correctamente.
        assert_eq!(parsed.event_type, EventType::Failed);
        assert_eq!(parsed.failure_reason, None);
        assert_eq!(parsed.target_username, "admin");
    }

    #[test]
    fn invalid_user_line_carries_failure_reason() {
        let line = "Jan 10 03:15:00 bastion sshd[992]: Invalid user oracle from 198.51.100.7 port 40100";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");

        assert_eq!(parsed.event_type, EventType::Failed);
        assert_eq!(parsed.failure_reason.as_deref(), Some("invalid_user"));
        assert_eq!(parsed.target_username, "oracle");
    }

    #[test]
    fn accepted_publickey_classifies_successful() {
        let line = "Jan 10 08:00:01 bastion sshd[1201]: Accepted publickey for deploy from 192.0.2.44 port 58814 ssh2: ED25519 SHA256:abcdef";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");

        assert_eq!(parsed.event_type, EventType::Successful);
        assert_eq!(parsed.auth_method, AuthMethod::Publickey);
        assert_eq!(parsed.target_username, "deploy");
    }

    #[test]
    fn unmatched_lines_are_dropped_silently() {
        let noise = [
            "Jan 10 03:14:10 bastion sshd[991]: Connection closed by 203.0.113.5 port 51022",
            "Jan 10 03:14:11 bastion systemd[1]: Started Session 12 of user root.",
            "Jan 10 03:14:12 bastion sshd[993]: pam_unix(sshd:session): session opened",
        ];
        for line in noise {
            assert!(AuthLogParser::parse_line(line, ingestion()).is_none(), "leaked: {line}");
        }
    }

    #[test]
    fn missing_prefix_falls_back_to_ingestion_instant() {
        let line = "Failed password for root from 203.0.113.5 port 22 ssh2";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");
        assert_eq!(parsed.timestamp, ingestion());
    }

    #[test]
    fn rfc3339_prefix_is_honored() {
        let line = "2026-01-09T22:10:00+00:00 bastion sshd[5]: Accepted password for ops from 192.0.2.1 port 2200 ssh2";
        let parsed = AuthLogParser::parse_line(line, ingestion()).expect("must classify");
        assert_eq!(parsed.timestamp.to_rfc3339(), "2026-01-09T22:10:00+00:00");
    }

    #[test]
    fn fail2ban_ban_and_unban_are_observed() {
        let ban = "2026-01-10 03:14:22,123 fail2ban.actions [123]: NOTICE [sshd] Ban 203.0.113.9";
        let observed = AuthLogParser::parse_fail2ban(ban).expect("ban observed");
        assert!(observed.is_ban);
        assert_eq!(observed.ip, "203.0.113.9");
        assert_eq!(observed.jail, "sshd");

        let unban = "2026-01-10 04:14:22,123 fail2ban.actions [123]: NOTICE [sshd] Unban 203.0.113.9";
        let observed = AuthLogParser::parse_fail2ban(unban).expect("unban observed");
        assert!(!observed.is_ban);
    }

    #[test]
    fn fail2ban_lines_do_not_classify_as_auth_events() {
        let ban = "2026-01-10 03:14:22,123 fail2ban.actions [123]: NOTICE [sshd] Ban 203.0.113.9";
        assert!(AuthLogParser::parse_line(ban, ingestion()).is_none());
    }
}
