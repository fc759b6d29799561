// [apps/sentinel-agent/src/firewall/sockets.rs]
/*!
 * =================================================================
 * APARATO: LISTENING SOCKET ENUMERATOR (V6.0 - SS HARVESTER)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: SOCKETS TCP/UDP EN ESCUCHA CON PID Y PROCESO
 *
 * # Logic:
 * Cosecha vía 'ss -tulnp' (parser puro certificable). Un fallo del
 * subproceso degrada a lista vacía: el inventario jamás colapsa por
 * la enumeración de sockets.
 * =================================================================
 */

use super::protected_service_label;
use guardian_domain_models::firewall::{ListeningPortEntry, Protocol};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Presupuesto del subproceso de enumeración.
const SS_TIMEOUT_SECONDS: u64 = 5;

/// Enumeración de sockets en escucha (degrada a vacío ante fallo).
pub async fn collect_listening_ports() -> Vec<ListeningPortEntry> {
    let spawned = Command::new("ss").args(["-tulnp"]).kill_on_drop(true).output();

    match tokio::time::timeout(Duration::from_secs(SS_TIMEOUT_SECONDS), spawned).await {
        Ok(Ok(output)) if output.status.success() => {
            parse_ss_output(&String::from_utf8_lossy(&output.stdout))
        }
        _ => {
            debug!("🔌 [SOCKETS_IDLE]: Socket harvest unavailable this pass.");
            Vec::new()
        }
    }
}

/**
 * Parser puro de la salida de 'ss -tulnp'.
 *
 * Formato por línea:
 * 'tcp  LISTEN 0 128  0.0.0.0:22  0.0.0.0:*  users:(("sshd",pid=812,fd=3))'
 */
pub fn parse_ss_output(raw_output: &str) -> Vec<ListeningPortEntry> {
    let mut harvest = Vec::new();

    for line in raw_output.lines().skip(1) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 5 {
            continue;
        }

        let protocol = match tokens[0] {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            _ => continue,
        };

        // Solo sockets en escucha (UDP no declara estado LISTEN).
        if protocol == Protocol::Tcp && tokens[1] != "LISTEN" {
            continue;
        }

        let local_address = tokens.iter().find(|token| token.contains(':')).copied();
        let Some(port) = local_address
            .and_then(|address| address.rsplit(':').next())
            .and_then(|tail| tail.parse::<u16>().ok())
        else {
            continue;
        };

        let process_clause = tokens.iter().find(|token| token.starts_with("users:"));
        let process_name = process_clause.and_then(|clause| {
            clause.split('"').nth(1).map(|name| name.to_string())
        });
        let process_id = process_clause.and_then(|clause| {
            clause
                .split("pid=")
                .nth(1)
                .and_then(|tail| tail.split([',', ')']).next())
                .and_then(|digits| digits.parse().ok())
        });

        let service_label = protected_service_label(port);
        harvest.push(ListeningPortEntry {
            port,
            protocol,
            process_id,
            process_name,
            is_protected: service_label.is_some(),
            service_label: service_label.map(|label| label.to_string()),
        });
    }

    harvest
}

#[cfg(test)]
mod tests {
    use super::*;

    const SS_SAMPLE: &str = "Netid State  Recv-Q Send-Q Local Address:Port Peer Address:Port Process\n\
         tcp   LISTEN 0      128          0.0.0.0:22        0.0.0.0:*     users:((\"sshd\",pid=812,fd=3))\n\
         tcp   LISTEN 0      511        127.0.0.1:6379      0.0.0.0:*     users:((\"redis-server\",pid=1044,fd=6))\n\
         tcp   ESTAB  0      0          10.0.0.5:22         10.0.0.9:51022 users:((\"sshd\",pid=2001,fd=4))\n\
         udp   UNCONN 0      0            0.0.0.0:68        0.0.0.0:*     users:((\"dhclient\",pid=514,fd=6))\n";

    #[test]
    fn listening_sockets_are_harvested_with_process_identity() {
        let harvest = parse_ss_output(SS_SAMPLE);

        let ssh_socket = harvest.iter().find(|entry| entry.port == 22).expect("sshd socket");
        assert_eq!(ssh_socket.process_name.as_deref(), Some("sshd"));
        assert_eq!(ssh_socket.process_id, Some(812));
        assert!(ssh_socket.is_protected);
        assert_eq!(ssh_socket.service_label.as_deref(), Some("ssh"));
    }

    #[test]
    fn established_sockets_are_excluded() {
        let harvest = parse_ss_output(SS_SAMPLE);
        // El ESTAB del puerto 22 no duplica la entrada de escucha.
        assert_eq!(harvest.iter().filter(|entry| entry.port == 22).count(), 1);
    }

    #[test]
    fn udp_sockets_are_included_without_listen_state() {
        let harvest = parse_ss_output(SS_SAMPLE);
        let dhcp_socket = harvest.iter().find(|entry| entry.port == 68).expect("dhclient socket");
        assert_eq!(dhcp_socket.protocol, Protocol::Udp);
        assert!(!dhcp_socket.is_protected);
    }

    #[test]
    fn malformed_output_degrades_to_empty() {
        assert!(parse_ss_output("garbage\nwith no sockets\n").is_empty());
    }
}
