//! 4.2.6 egress_guard — endpoint extraction and block/allow-list
//! enforcement for outbound network calls.

use async_trait::async_trait;
use radius_core::{CanonicalEvent, Decision, Module, ModuleError, ModuleMode, Phase, Severity};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;

use crate::common::{parse_mode, str_set};

const DEFAULT_URL_ARG_KEYS: [&str; 7] =
    ["url", "uri", "endpoint", "api_url", "base_url", "webhook_url", "webhook"];
const DEFAULT_HOST_ARG_KEYS: [&str; 4] = ["host", "hostname", "domain", "address"];
const DEFAULT_NETWORK_BINARIES: [&str; 8] =
    ["curl", "wget", "nc", "ncat", "ssh", "scp", "rsync", "ftp", "telnet"];

#[derive(Debug, Clone)]
struct Endpoint {
    host: String,
    ip: Option<String>,
    port: Option<u16>,
}

fn classify_host(host: &str) -> (String, Option<String>) {
    if IpAddr::from_str(host).is_ok() {
        (host.to_string(), Some(host.to_string()))
    } else {
        (host.to_string(), None)
    }
}

fn default_port_for_scheme(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

fn url_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s'"]+"#).unwrap())
}

fn host_port_token_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:[\w.-]+@)?([a-zA-Z0-9][a-zA-Z0-9.-]*)(?::(\d+))?").unwrap())
}

fn extract_from_command(command: &str, network_binaries: &HashSet<String>) -> Vec<Endpoint> {
    let first_word = command.split_whitespace().next().unwrap_or("");
    if !network_binaries.iter().any(|bin| first_word.ends_with(bin.as_str())) {
        return Vec::new();
    }
    let mut endpoints = Vec::new();
    for m in url_regex().find_iter(command) {
        if let Ok(url) = url::Url::parse(m.as_str()) {
            if let Some(host) = url.host_str() {
                let (host, ip) = classify_host(host);
                let port = url.port().or_else(|| default_port_for_scheme(url.scheme()));
                endpoints.push(Endpoint { host, ip, port });
            }
        }
    }
    if endpoints.is_empty() {
        // ssh/scp-style `[user@]host[:port]` token: take the first
        // whitespace-delimited argument that isn't a flag.
        for token in command.split_whitespace().skip(1) {
            if token.starts_with('-') || token.starts_with("http") {
                continue;
            }
            if let Some(caps) = host_port_token_regex().captures(token) {
                let host = caps.get(1).map(|m| m.as_str().to_string());
                let port = caps.get(2).and_then(|m| m.as_str().parse::<u16>().ok());
                if let Some(host) = host {
                    let (host, ip) = classify_host(&host);
                    endpoints.push(Endpoint { host, ip, port });
                    break;
                }
            }
        }
    }
    endpoints
}

fn extract_endpoints(
    tool_name: &str,
    args: &Map<String, Value>,
    url_keys: &HashSet<String>,
    host_keys: &HashSet<String>,
    network_binaries: &HashSet<String>,
) -> Vec<Endpoint> {
    let mut endpoints = Vec::new();
    for key in url_keys {
        if let Some(raw) = args.get(key).and_then(Value::as_str) {
            if let Ok(url) = url::Url::parse(raw) {
                if let Some(host) = url.host_str() {
                    let (host, ip) = classify_host(host);
                    let port = url.port().or_else(|| default_port_for_scheme(url.scheme()));
                    endpoints.push(Endpoint { host, ip, port });
                }
            }
        }
    }
    for key in host_keys {
        if let Some(raw_host) = args.get(key).and_then(Value::as_str) {
            let (host, ip) = classify_host(raw_host);
            let port = args.get("port").and_then(Value::as_u64).and_then(|p| u16::try_from(p).ok());
            endpoints.push(Endpoint { host, ip, port });
        }
    }
    if tool_name == "Bash" {
        if let Some(command) = args.get("command").and_then(Value::as_str) {
            endpoints.extend(extract_from_command(command, network_binaries));
        }
    }
    endpoints
}

fn allowed_entry_matches(allowed: &str, host: &str) -> bool {
    if let Some(base) = allowed.strip_prefix("*.") {
        host != base && host.ends_with(&format!(".{base}"))
    } else {
        host == allowed || host.ends_with(&format!(".{allowed}"))
    }
}

#[derive(Debug, Clone, Default)]
struct BlockLists {
    blocked_ips: HashSet<String>,
    blocked_domains: HashSet<String>,
    blocked_ports: HashSet<u16>,
}

impl BlockLists {
    fn parse(v: &Value) -> Self {
        Self {
            blocked_ips: str_set(v, "blockedIPs"),
            blocked_domains: str_set(v, "blockedDomains"),
            blocked_ports: v
                .get("blockedPorts")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_u64).filter_map(|p| u16::try_from(p).ok()).collect())
                .unwrap_or_default(),
        }
    }

    fn blocks(&self, endpoint: &Endpoint) -> bool {
        if let Some(ip) = &endpoint.ip {
            if self.blocked_ips.contains(ip) {
                return true;
            }
        }
        if self.blocked_domains.iter().any(|d| allowed_entry_matches(d, &endpoint.host) || d == &endpoint.host) {
            return true;
        }
        if let Some(port) = endpoint.port {
            if self.blocked_ports.contains(&port) {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
struct ToolBinding {
    intersect: bool,
    lists: BlockLists,
    allowed_domains: HashSet<String>,
    allowed_ips: HashSet<String>,
    allowed_ports: HashSet<u16>,
}

impl ToolBinding {
    fn parse(v: &Value) -> Self {
        Self {
            intersect: matches!(v.get("mode").and_then(Value::as_str), Some("intersect")),
            lists: BlockLists::parse(v),
            allowed_domains: str_set(v, "allowedDomains"),
            allowed_ips: str_set(v, "allowedIPs"),
            allowed_ports: v
                .get("allowedPorts")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_u64).filter_map(|p| u16::try_from(p).ok()).collect())
                .unwrap_or_default(),
        }
    }
}

pub struct EgressGuard {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    url_keys: HashSet<String>,
    host_keys: HashSet<String>,
    network_binaries: HashSet<String>,
    global_lists: BlockLists,
    allowed_domains: HashSet<String>,
    allowed_ips: HashSet<String>,
    allowed_ports: HashSet<u16>,
    bindings: std::collections::HashMap<String, ToolBinding>,
}

impl EgressGuard {
    pub fn new(cfg: &Value) -> Self {
        let url_keys = {
            let configured = str_set(cfg, "urlArgKeys");
            if configured.is_empty() {
                DEFAULT_URL_ARG_KEYS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        let host_keys = {
            let configured = str_set(cfg, "hostArgKeys");
            if configured.is_empty() {
                DEFAULT_HOST_ARG_KEYS.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        let network_binaries = {
            let configured = str_set(cfg, "networkBinaries");
            if configured.is_empty() {
                DEFAULT_NETWORK_BINARIES.iter().map(|s| s.to_string()).collect()
            } else {
                configured
            }
        };
        let bindings = cfg
            .get("bindings")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), ToolBinding::parse(v))).collect())
            .unwrap_or_default();
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreTool].into_iter().collect(),
            url_keys,
            host_keys,
            network_binaries,
            global_lists: BlockLists::parse(cfg),
            allowed_domains: str_set(cfg, "allowedDomains"),
            allowed_ips: str_set(cfg, "allowedIPs"),
            allowed_ports: cfg
                .get("allowedPorts")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_u64).filter_map(|p| u16::try_from(p).ok()).collect())
                .unwrap_or_default(),
            bindings,
        }
    }
}

#[async_trait]
impl Module for EgressGuard {
    fn name(&self) -> &str {
        "egress_guard"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        let Some(call) = &event.tool_call else {
            return Ok(Decision::allow(self.name(), "no tool call"));
        };
        let endpoints = extract_endpoints(
            &call.name,
            &call.arguments,
            &self.url_keys,
            &self.host_keys,
            &self.network_binaries,
        );
        let binding = self.bindings.get(&call.name);

        if endpoints.is_empty() {
            return if binding.is_some_and(|b| b.intersect) {
                Ok(Decision::deny(
                    self.name(),
                    "endpoint could not be determined",
                    Severity::High,
                ))
            } else {
                Ok(Decision::allow(self.name(), "no outbound endpoint detected"))
            };
        }

        for endpoint in &endpoints {
            if self.global_lists.blocks(endpoint) {
                return Ok(Decision::deny(
                    self.name(),
                    format!("endpoint {} is blocked", endpoint.host),
                    Severity::High,
                ));
            }
            if let Some(b) = binding {
                if b.intersect && b.lists.blocks(endpoint) {
                    return Ok(Decision::deny(
                        self.name(),
                        format!("endpoint {} is blocked by tool binding", endpoint.host),
                        Severity::High,
                    ));
                }
            }
        }

        let has_global_allowlist = !self.allowed_domains.is_empty() || !self.allowed_ips.is_empty();
        if has_global_allowlist {
            for endpoint in &endpoints {
                let domain_ok = self.allowed_domains.iter().any(|d| allowed_entry_matches(d, &endpoint.host));
                let ip_ok = endpoint.ip.as_ref().is_some_and(|ip| self.allowed_ips.contains(ip));
                if !domain_ok && !ip_ok {
                    return Ok(Decision::deny(
                        self.name(),
                        format!("endpoint {} is not in the allowlist", endpoint.host),
                        Severity::High,
                    ));
                }
            }
        }
        if !self.allowed_ports.is_empty() {
            for endpoint in &endpoints {
                match endpoint.port {
                    Some(port) if self.allowed_ports.contains(&port) => {}
                    _ => {
                        return Ok(Decision::deny(
                            self.name(),
                            format!("endpoint {} uses a port outside the allowlist", endpoint.host),
                            Severity::High,
                        ));
                    }
                }
            }
        }

        Ok(Decision::allow(self.name(), "endpoint(s) permitted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_core::{Framework, ToolCall};
    use serde_json::json;

    fn event(tool: &str, args: Value) -> CanonicalEvent {
        let mut e = CanonicalEvent::new(Phase::PreTool, Framework::Generic);
        e.tool_call = Some(ToolCall {
            name: tool.to_string(),
            arguments: args.as_object().cloned().unwrap_or_default(),
            raw: None,
        });
        e
    }

    #[tokio::test]
    async fn blocked_domain_denies() {
        let cfg = json!({"blockedDomains": ["evil.example"]});
        let guard = EgressGuard::new(&cfg);
        let decision = guard
            .evaluate(&event("WebFetch", json!({"url": "https://evil.example/x"})))
            .await
            .unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
    }

    #[tokio::test]
    async fn wildcard_allows_subdomain_not_base() {
        assert!(allowed_entry_matches("*.example.com", "api.example.com"));
        assert!(!allowed_entry_matches("*.example.com", "example.com"));
    }

    #[tokio::test]
    async fn plain_allowlist_entry_matches_subdomains() {
        assert!(allowed_entry_matches("example.com", "api.example.com"));
        assert!(allowed_entry_matches("example.com", "example.com"));
    }

    #[tokio::test]
    async fn undetermined_endpoint_denied_when_bound_intersect() {
        let cfg = json!({"bindings": {"CustomTool": {"mode": "intersect"}}});
        let guard = EgressGuard::new(&cfg);
        let decision = guard.evaluate(&event("CustomTool", json!({}))).await.unwrap();
        assert_eq!(decision.action, radius_core::Action::Deny);
        assert!(decision.reason.contains("could not be determined"));
    }
}
