//! Configuration resolution (spec §4.4): load YAML, layer built-in defaults
//! under profile defaults under the user document, expand `${VAR}`
//! templates, and normalize adapter keys.

pub mod defaults;
pub mod profile;
pub mod template;

use radius_core::{merge::deep_merge, CoreError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use profile::{DefaultAction, Profile};
pub use template::OnUndefinedTemplateVar;

/// `global.*` settings (spec §3 Configuration).
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub profile: Profile,
    pub default_action: DefaultAction,
    pub workspace: PathBuf,
    pub on_undefined_template_var: OnUndefinedTemplateVar,
}

/// The fully resolved configuration tree. `audit`, `approval`, `adapters`,
/// and `module_config` stay untyped JSON: each owning crate (radius-audit,
/// radius-approval, radius-adapters, radius-modules) interprets its own
/// slice, matching the "untyped configuration mapping" contract of the
/// `Module` trait.
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub store: Value,
    pub audit: Value,
    pub approval: Value,
    pub adapters: Map<String, Value>,
    pub modules: Vec<String>,
    pub module_config: Map<String, Value>,
}

const CANDIDATE_FILENAMES: [&str; 3] = ["radius.yaml", "radius.yml", ".radius.yaml"];

/// Locate the config file: the explicit path if given, else the first of
/// the candidate filenames that exists in the current directory.
fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    CANDIDATE_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn read_user_doc(path: Option<&Path>) -> Result<Value, CoreError> {
    let Some(found) = locate(path) else {
        return Ok(Value::Object(Map::new()));
    };
    let text = std::fs::read_to_string(&found)
        .map_err(|e| CoreError::Invalid(format!("reading {}: {e}", found.display())))?;
    if text.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_yaml::from_str::<Value>(&text)
        .map_err(|e| CoreError::Invalid(format!("parsing {}: {e}", found.display())))
}

fn normalize_adapter_keys(value: &mut Value) {
    if let Some(adapters) = value.get_mut("adapters").and_then(Value::as_object_mut) {
        if let Some(v) = adapters.remove("claudeTelegram") {
            adapters.insert("claude-telegram".to_string(), v);
        }
    }
}

fn template_vars(workspace: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("workspace".to_string(), workspace.display().to_string());
    if let Ok(cwd) = std::env::current_dir() {
        vars.insert("CWD".to_string(), cwd.display().to_string());
    }
    if let Ok(home) = std::env::var("HOME") {
        vars.insert("HOME".to_string(), home);
    }
    for (k, v) in std::env::vars() {
        vars.entry(k).or_insert(v);
    }
    vars
}

/// Load, merge, and expand configuration from `path` (or the default
/// candidate filenames), producing a fully resolved [`Config`].
pub fn load(path: Option<&Path>) -> Result<Config, CoreError> {
    let user_doc = read_user_doc(path)?;

    let profile_name = user_doc
        .get("global")
        .and_then(|g| g.get("profile"))
        .and_then(Value::as_str)
        .unwrap_or("standard");
    let profile = Profile::from_str(profile_name)?;

    let merged = deep_merge(
        &defaults::builtin_defaults(),
        &deep_merge(&defaults::profile_defaults(profile), &user_doc),
    );

    let mut merged = merged;
    normalize_adapter_keys(&mut merged);

    let global_raw = merged.get("global").cloned().unwrap_or(Value::Null);
    let workspace = global_raw
        .get("workspace")
        .and_then(Value::as_str)
        .unwrap_or(".")
        .to_string();
    let workspace = PathBuf::from(workspace);

    let on_undefined_template_var = OnUndefinedTemplateVar::parse(
        global_raw
            .get("onUndefinedTemplateVar")
            .and_then(Value::as_str)
            .unwrap_or("error"),
    )?;

    let vars = template_vars(&workspace);
    let expanded = template::expand_templates(&merged, &vars, on_undefined_template_var)?;

    let global_raw = expanded.get("global").cloned().unwrap_or(Value::Null);
    let profile_name = global_raw
        .get("profile")
        .and_then(Value::as_str)
        .unwrap_or("standard");
    let profile = Profile::from_str(profile_name)?;
    let default_action = DefaultAction::from_str(
        global_raw
            .get("defaultAction")
            .and_then(Value::as_str)
            .unwrap_or_else(|| match profile.default_action() {
                DefaultAction::Deny => "deny",
                DefaultAction::Allow => "allow",
            }),
    )?;
    let workspace = PathBuf::from(
        global_raw
            .get("workspace")
            .and_then(Value::as_str)
            .unwrap_or("."),
    );

    let store = expanded.get("store").cloned().unwrap_or(Value::Null);
    let audit = expanded.get("audit").cloned().unwrap_or(Value::Null);
    let approval = expanded.get("approval").cloned().unwrap_or(Value::Null);
    let adapters = expanded
        .get("adapters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let modules = expanded
        .get("modules")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let module_config = expanded
        .get("moduleConfig")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(Config {
        global: GlobalConfig {
            profile,
            default_action,
            workspace,
            on_undefined_template_var,
        },
        store,
        audit,
        approval,
        adapters,
        modules,
        module_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn absent_file_yields_profile_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let cfg = load(None).unwrap();
        std::env::set_current_dir(prev).unwrap();
        assert_eq!(cfg.global.profile, Profile::Standard);
        assert_eq!(cfg.global.default_action, DefaultAction::Deny);
        assert!(cfg.modules.contains(&"tool_policy".to_string()));
    }

    #[test]
    fn user_doc_overrides_profile_default_action() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radius.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "global:\n  profile: unbounded\n  defaultAction: deny\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.global.profile, Profile::Unbounded);
        assert_eq!(cfg.global.default_action, DefaultAction::Deny);
    }

    #[test]
    fn adapter_key_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radius.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "adapters:\n  claudeTelegram:\n    botToken: xyz\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert!(cfg.adapters.contains_key("claude-telegram"));
        assert!(!cfg.adapters.contains_key("claudeTelegram"));
    }

    #[test]
    fn alias_profile_resolves_to_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radius.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "global:\n  profile: yolo\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.global.profile, Profile::Unbounded);
    }
}
