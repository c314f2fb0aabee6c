//! 4.2.13 skill_scanner — supply-chain provenance checks for artifacts about
//! to load, plus content scanning for prompt-injection and exfiltration
//! shaped text. Provenance policy is grounded in the same digest/signer
//! fail-closed posture used elsewhere for manifest verification.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use radius_core::{
    Artifact, ArtifactKind, CanonicalEvent, ChallengeSpec, Channel, Decision, Module, ModuleError,
    ModuleMode, Phase, Severity,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{field, info_span};

use crate::common::{parse_mode, str_set};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    Deny,
    Challenge,
    Alert,
}

struct Finding {
    code: &'static str,
    severity: Severity,
}

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!--[\s\S]*?-->").unwrap());
static DECODE_EXEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(base64\s+-d|atob\s*\(|b64decode)[^\n]{0,40}(\|\s*sh|\|\s*bash|eval|exec)").unwrap()
});
static RAW_IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,3}(\.\d{1,3}){3}\b").unwrap());
static PUNYCODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)xn--[a-z0-9-]+").unwrap());
static TAKEOVER_PHRASES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ignore (all )?(previous|prior) instructions|disregard (all )?(previous|prior)").unwrap()
});
static ZERO_WIDTH: [char; 4] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];
static EXFIL_MARKERS: [&str; 6] = [".env", ".ssh", ".aws", "api_key", "token", "secret"];
static PASSWORD_MARKER: &str = "password";
static EXFIL_VERBS: [&str; 5] = ["curl", "wget", "fetch", "http", "webhook"];
static SHORTENERS: [&str; 4] = ["bit.ly", "tinyurl.com", "t.co", "goo.gl"];

fn parse_policy(s: Option<&str>) -> FailurePolicy {
    match s {
        Some("challenge") => FailurePolicy::Challenge,
        Some("alert") => FailurePolicy::Alert,
        _ => FailurePolicy::Deny,
    }
}

fn floating_reference(source_uri: &str) -> bool {
    ["latest", "main", "master", "head"]
        .iter()
        .any(|suffix| source_uri.ends_with(suffix))
}

fn provenance_findings(
    artifact: &Artifact,
    require_signature: bool,
    trusted_signers: &HashSet<String>,
    require_sbom: bool,
    require_pinned_source: bool,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    if require_signature && !artifact.signature_verified {
        findings.push(Finding { code: "missing_signature", severity: Severity::Critical });
    }
    if !trusted_signers.is_empty() {
        match &artifact.signer {
            Some(signer) if !trusted_signers.contains(signer) => {
                findings.push(Finding { code: "untrusted_signer", severity: Severity::Critical });
            }
            None => findings.push(Finding { code: "missing_signer_identity", severity: Severity::High }),
            _ => {}
        }
    }
    if require_sbom && artifact.sbom_uri.is_none() {
        findings.push(Finding { code: "missing_sbom", severity: Severity::High });
    }
    if require_pinned_source && !artifact.version_pinned {
        let code = match &artifact.source_uri {
            Some(uri) if floating_reference(uri) => "floating_version_reference",
            _ => "unpinned_source",
        };
        findings.push(Finding { code, severity: Severity::High });
    }
    findings
}

fn content_findings(
    text: &str,
    blocked_domains: &HashSet<String>,
    base64_pattern: &Regex,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    if HTML_COMMENT.is_match(text) {
        findings.push(Finding { code: "html_comment_injection", severity: Severity::High });
    }
    if text.chars().any(|c| ZERO_WIDTH.contains(&c)) {
        findings.push(Finding { code: "zero_width_characters", severity: Severity::High });
    }
    if base64_pattern.is_match(text) {
        findings.push(Finding { code: "base64_blob", severity: Severity::Medium });
    }
    if DECODE_EXEC.is_match(text) {
        findings.push(Finding { code: "decode_exec_pattern", severity: Severity::Critical });
    }
    if exfil_combo(text) {
        findings.push(Finding { code: "exfil_marker_combo", severity: Severity::Critical });
    }
    if RAW_IPV4.is_match(text) || PUNYCODE.is_match(text) || SHORTENERS.iter().any(|s| text.contains(s)) {
        findings.push(Finding { code: "suspicious_url", severity: Severity::High });
    }
    if blocked_domains.iter().any(|d| text.contains(d.as_str())) {
        findings.push(Finding { code: "blocked_domain", severity: Severity::High });
    }
    if TAKEOVER_PHRASES.is_match(text) {
        findings.push(Finding { code: "instruction_takeover", severity: Severity::Critical });
    }
    findings
}

fn exfil_combo(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let mut markers: Vec<&str> = EXFIL_MARKERS.to_vec();
    markers.push(PASSWORD_MARKER);
    for marker in &markers {
        let Some(marker_pos) = lower.find(marker) else {
            continue;
        };
        for verb in EXFIL_VERBS {
            if let Some(verb_pos) = lower.find(verb) {
                let distance = marker_pos.abs_diff(verb_pos);
                if distance <= 100 {
                    return true;
                }
            }
        }
    }
    false
}

pub struct SkillScanner {
    mode: ModuleMode,
    phases: HashSet<Phase>,
    enforce_kinds: HashSet<ArtifactKind>,
    require_signature: bool,
    trusted_signers: HashSet<String>,
    require_sbom: bool,
    require_pinned_source: bool,
    blocked_domains: HashSet<String>,
    base64_pattern: Regex,
    failure_policy: FailurePolicy,
}

impl SkillScanner {
    pub fn new(cfg: &Value) -> Self {
        let enforce_kinds = {
            let configured = str_set(cfg, "enforceKinds");
            if configured.is_empty() {
                [ArtifactKind::Skill].into_iter().collect()
            } else {
                configured
                    .into_iter()
                    .filter_map(|k| match k.as_str() {
                        "skill" => Some(ArtifactKind::Skill),
                        "prompt" => Some(ArtifactKind::Prompt),
                        "tool_metadata" => Some(ArtifactKind::ToolMetadata),
                        "config" => Some(ArtifactKind::Config),
                        _ => None,
                    })
                    .collect()
            }
        };
        Self {
            mode: parse_mode(cfg),
            phases: [Phase::PreLoad, Phase::PreRequest].into_iter().collect(),
            enforce_kinds,
            require_signature: cfg.get("requireSignature").and_then(Value::as_bool).unwrap_or(false),
            trusted_signers: str_set(cfg, "trustedSigners"),
            require_sbom: cfg.get("requireSbom").and_then(Value::as_bool).unwrap_or(false),
            require_pinned_source: cfg.get("requirePinnedSource").and_then(Value::as_bool).unwrap_or(false),
            blocked_domains: str_set(cfg, "blockedDomains"),
            base64_pattern: {
                let min_len = cfg.get("base64MinLength").and_then(Value::as_u64).unwrap_or(80);
                Regex::new(&format!("[A-Za-z0-9+/]{{{min_len},}}={{0,2}}")).expect("valid base64 pattern")
            },
            failure_policy: parse_policy(cfg.get("onFinding").and_then(Value::as_str)),
        }
    }

    fn apply_policy(&self, reason: String, severity: Severity) -> Decision {
        match self.failure_policy {
            FailurePolicy::Deny => Decision::deny(self.name(), reason, severity),
            FailurePolicy::Alert => Decision::alert(self.name(), reason, severity),
            FailurePolicy::Challenge => Decision::challenge(
                self.name(),
                reason,
                ChallengeSpec {
                    channel: Channel::Orchestrator,
                    prompt: "Approve loading of this artifact?".to_string(),
                    timeout_seconds: 120,
                },
            ),
        }
    }
}

#[async_trait]
impl Module for SkillScanner {
    fn name(&self) -> &str {
        "skill_scanner"
    }

    fn phases(&self) -> &HashSet<Phase> {
        &self.phases
    }

    fn mode(&self) -> ModuleMode {
        self.mode
    }

    async fn evaluate(&self, event: &CanonicalEvent) -> Result<Decision, ModuleError> {
        let span = info_span!("radius.skill_scanner.evaluate", result = field::Empty, error_code = field::Empty);
        let _entered = span.enter();

        if event.phase == Phase::PreLoad {
            if let Some(artifact) = &event.artifact {
                if self.enforce_kinds.contains(&artifact.kind) {
                    let findings = provenance_findings(
                        artifact,
                        self.require_signature,
                        &self.trusted_signers,
                        self.require_sbom,
                        self.require_pinned_source,
                    );
                    if let Some(worst) = findings.iter().max_by_key(|f| f.severity) {
                        span.record("result", "finding");
                        span.record("error_code", field::display(worst.code));
                        return Ok(self.apply_policy(format!("provenance check failed: {}", worst.code), worst.severity));
                    }
                }
            }
        }

        let text = match event.phase {
            Phase::PreLoad => event.artifact.as_ref().and_then(|a| a.content.as_deref()),
            Phase::PreRequest => event.request_text.as_deref(),
            _ => None,
        };
        let Some(text) = text else {
            span.record("result", "ok");
            return Ok(Decision::allow(self.name(), "no content to scan"));
        };

        let findings = content_findings(text, &self.blocked_domains, &self.base64_pattern);
        let Some(worst) = findings.iter().max_by_key(|f| f.severity) else {
            span.record("result", "ok");
            return Ok(Decision::allow(self.name(), "no suspicious content found"));
        };
        span.record("result", "finding");
        span.record("error_code", field::display(worst.code));
        if worst.severity == Severity::Critical {
            Ok(self.apply_policy(format!("content scan finding: {}", worst.code), worst.severity))
        } else {
            Ok(Decision::alert(self.name(), format!("content scan finding: {}", worst.code), worst.severity))
        }
    }
}
