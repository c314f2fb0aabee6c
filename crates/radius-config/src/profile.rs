//! Canonical profile names and their aliases (spec §3, §4.4).

use radius_core::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A canonical profile name. Configuration may spell these through an
/// alias; downstream code only ever sees these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Local,
    Standard,
    Unbounded,
}

impl Profile {
    /// `global.defaultAction` implied by this profile absent an explicit override.
    pub fn default_action(self) -> DefaultAction {
        match self {
            Profile::Local => DefaultAction::Deny,
            Profile::Standard => DefaultAction::Deny,
            Profile::Unbounded => DefaultAction::Allow,
        }
    }
}

impl FromStr for Profile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" | "strict" | "bunker" => Ok(Profile::Local),
            "standard" | "balanced" | "tactical" => Ok(Profile::Standard),
            "unbounded" | "monitor" | "yolo" | "unleashed" => Ok(Profile::Unbounded),
            other => Err(CoreError::UnknownProfile(other.to_string())),
        }
    }
}

/// Fallback action when no module in the pipeline applies to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultAction {
    Deny,
    Allow,
}

impl FromStr for DefaultAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deny" => Ok(DefaultAction::Deny),
            "allow" => Ok(DefaultAction::Allow),
            other => Err(CoreError::Invalid(format!(
                "defaultAction must be allow or deny, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(Profile::from_str("strict").unwrap(), Profile::Local);
        assert_eq!(Profile::from_str("balanced").unwrap(), Profile::Standard);
        assert_eq!(Profile::from_str("yolo").unwrap(), Profile::Unbounded);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        assert!(Profile::from_str("made-up").is_err());
    }

    #[test]
    fn canonical_default_actions() {
        assert_eq!(Profile::Local.default_action(), DefaultAction::Deny);
        assert_eq!(Profile::Standard.default_action(), DefaultAction::Deny);
        assert_eq!(Profile::Unbounded.default_action(), DefaultAction::Allow);
    }
}
