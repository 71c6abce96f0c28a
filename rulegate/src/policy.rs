//! Declarative policy documents.
//!
//! A policy lists the actions of one resource type with their rule text, so
//! rules can change without recompiling the host. Loading goes through the
//! same validation as programmatic registration.
//!
//! ```json
//! {
//!   "resource": "Team",
//!   "identity": { "subject_claim_type": "sub", "role_claim_type": "role" },
//!   "actions": [
//!     { "name": "Read", "kind": "generic", "rule": "true" },
//!     { "name": "Edit", "kind": "instance", "rule": "HasRole(\"Manager\")" }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use rulegate_identity::IdentityConfig;

use crate::action::ActionKind;
use crate::error::{AuthzError, AuthzResult};

/// One declared action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Action name.
    pub name: String,

    /// Generic or instance.
    pub kind: ActionKind,

    /// Rule text.
    pub rule: String,
}

/// Actions declared for one resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Resource type the policy targets; checked against the authorizer's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Claim mapping override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityConfig>,

    /// Actions in registration order.
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

impl PolicyConfig {
    /// Decode a policy from JSON text.
    pub fn from_json(json: &str) -> AuthzResult<Self> {
        serde_json::from_str(json).map_err(|e| AuthzError::InvalidPolicy(e.to_string()))
    }

    /// Read and decode a policy file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::InvalidPolicy(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Append an action.
    pub fn with_action(
        mut self,
        name: impl Into<String>,
        kind: ActionKind,
        rule: impl Into<String>,
    ) -> Self {
        self.actions.push(ActionConfig {
            name: name.into(),
            kind,
            rule: rule.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEAM_POLICY: &str = r#"{
        "resource": "Team",
        "actions": [
            { "name": "Read", "kind": "generic", "rule": "true" },
            { "name": "Edit", "kind": "instance", "rule": "HasRole(\"Manager\")" }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let policy = PolicyConfig::from_json(TEAM_POLICY).unwrap();
        assert_eq!(policy.resource.as_deref(), Some("Team"));
        assert!(policy.identity.is_none());
        assert_eq!(policy.actions.len(), 2);
        assert_eq!(policy.actions[1].kind, ActionKind::Instance);
        assert_eq!(policy.actions[1].rule, r#"HasRole("Manager")"#);
    }

    #[test]
    fn test_invalid_json() {
        let err = PolicyConfig::from_json(r#"{ "actions": [ { "name": "Read", "kind": "sometimes", "rule": "true" } ] }"#)
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPolicy(_)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("rulegate-policy-{}.json", std::process::id()));
        std::fs::write(&path, TEAM_POLICY).unwrap();
        let policy = PolicyConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(policy.actions[0].name, "Read");

        assert!(matches!(
            PolicyConfig::from_file(&path),
            Err(AuthzError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_builder_roundtrip() {
        let policy = PolicyConfig::default().with_action("Read", ActionKind::Generic, "true");
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(PolicyConfig::from_json(&json).unwrap(), policy);
    }
}
