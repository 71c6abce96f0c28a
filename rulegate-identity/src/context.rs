//! Normalized identity snapshot
//!
//! An [`IdentityContext`] is what rules see of the caller: an optional subject
//! identifier, a role set and the full claim multimap. It is built fresh for
//! every evaluation and never cached.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Read-only view of a principal for the duration of one evaluation.
///
/// # Example
///
/// ```
/// use rulegate_identity::IdentityContext;
///
/// let ctx = IdentityContext::new(Some("luigi".into()))
///     .with_role("Coach")
///     .with_claim("TeamCoach", "Team C");
///
/// assert!(ctx.has_role("Coach"));
/// assert!(ctx.has_claim("TeamCoach", "Team C"));
/// assert_eq!(ctx.flattened_claims(), vec!["TeamCoach:Team C".to_string()]);
/// ```
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IdentityContext {
    subject_id: Option<String>,
    roles: BTreeSet<String>,
    claims: BTreeMap<String, Vec<String>>,
}

impl IdentityContext {
    /// Create a context with a subject and no roles or claims.
    pub fn new(subject_id: Option<String>) -> Self {
        Self {
            subject_id,
            roles: BTreeSet::new(),
            claims: BTreeMap::new(),
        }
    }

    /// Add a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Append a claim value, keeping presentation order per type.
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_claim(claim_type.into(), value.into());
        self
    }

    pub(crate) fn push_claim(&mut self, claim_type: String, value: String) {
        self.claims.entry(claim_type).or_default().push(value);
    }

    pub(crate) fn insert_role(&mut self, role: String) {
        self.roles.insert(role);
    }

    /// Stable subject identifier, if the principal has one.
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }

    /// Role set.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Claim multimap (type -> values in presentation order).
    pub fn claims(&self) -> &BTreeMap<String, Vec<String>> {
        &self.claims
    }

    /// Check role membership.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Check whether `value` is among the values asserted for `claim_type`.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .get(claim_type)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Values asserted for a claim type.
    pub fn claim_values(&self, claim_type: &str) -> &[String] {
        self.claims
            .get(claim_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All claims rendered as `type:value` strings.
    pub fn flattened_claims(&self) -> Vec<String> {
        self.claims
            .iter()
            .flat_map(|(claim_type, values)| {
                values.iter().map(move |v| format!("{claim_type}:{v}"))
            })
            .collect()
    }
}
