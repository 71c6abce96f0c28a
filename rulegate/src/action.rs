//! # Actions
//!
//! An action is a named operation on a resource type, carrying the rule text
//! that decides whether an identity may perform it.

use serde::{Deserialize, Serialize};

use rulegate_rules::RuleScope;

/// Whether an action is checked with or without a resource instance.
///
/// - **Generic**: checkable from the identity alone ("can create teams")
/// - **Instance**: needs the concrete resource ("can edit this team")
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Identity only.
    Generic,

    /// Identity and resource instance.
    Instance,
}

impl ActionKind {
    /// Get the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Generic => "generic",
            ActionKind::Instance => "instance",
        }
    }

    /// Parse a kind from its string representation (case-insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use rulegate::ActionKind;
    ///
    /// assert_eq!(ActionKind::parse("Instance"), Some(ActionKind::Instance));
    /// assert_eq!(ActionKind::parse("global"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" => Some(ActionKind::Generic),
            "instance" => Some(ActionKind::Instance),
            _ => None,
        }
    }

    /// Scope the action's rule is compiled for.
    pub fn scope(&self) -> RuleScope {
        match self {
            ActionKind::Generic => RuleScope::Generic,
            ActionKind::Instance => RuleScope::Instance,
        }
    }

    /// Check if a resource instance must be supplied.
    pub fn requires_resource(&self) -> bool {
        matches!(self, ActionKind::Instance)
    }
}

/// A registered action. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    name: String,
    kind: ActionKind,
    rule: String,
}

impl Action {
    pub(crate) fn new(name: String, kind: ActionKind, rule: String) -> Self {
        Self { name, kind, rule }
    }

    /// Action name, unique within one registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generic or instance.
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Rule text as registered.
    pub fn rule(&self) -> &str {
        &self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ActionKind::parse("generic"), Some(ActionKind::Generic));
        assert_eq!(ActionKind::parse("INSTANCE"), Some(ActionKind::Instance));
        assert_eq!(ActionKind::parse(""), None);
        assert_eq!(ActionKind::Instance.as_str(), "instance");
    }

    #[test]
    fn test_kind_scope() {
        assert_eq!(ActionKind::Generic.scope(), RuleScope::Generic);
        assert_eq!(ActionKind::Instance.scope(), RuleScope::Instance);
        assert!(ActionKind::Instance.requires_resource());
        assert!(!ActionKind::Generic.requires_resource());
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&ActionKind::Instance).unwrap();
        assert_eq!(json, "\"instance\"");
        let kind: ActionKind = serde_json::from_str("\"generic\"").unwrap();
        assert_eq!(kind, ActionKind::Generic);
    }
}
