//! Host principal model
//!
//! This module defines the claims-based principal that host applications hand
//! to an authorizer. A principal is an ordered list of `(type, value)` claims;
//! subject identifiers and roles are ordinary claims with well-known types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IdentityError, IdentityResult};

/// Well-known claim types.
///
/// These follow the short JWT names rather than URI-style claim types.
pub mod claim_types {
    /// Subject (stable user identifier).
    pub const SUBJECT: &str = "sub";
    /// Role membership.
    pub const ROLE: &str = "role";
    /// Display name.
    pub const NAME: &str = "name";
    /// Email address.
    pub const EMAIL: &str = "email";
}

/// A single claim asserted for a principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Claim {
    /// Claim type (e.g. `role`, `sub`, `TeamCoach`).
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Create a new claim.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// Claims-based principal supplied by the host.
///
/// # Example
///
/// ```
/// use rulegate_identity::Principal;
///
/// let user = Principal::new()
///     .with_subject("luigi")
///     .with_role("Manager")
///     .with_claim("TeamCoach", "Team C");
///
/// assert_eq!(user.claims().len(), 3);
/// assert!(user.has_claim("TeamCoach", "Team C"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Claims in presentation order.
    #[serde(default)]
    claims: Vec<Claim>,

    /// How the principal was authenticated, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authentication_type: Option<String>,
}

impl Principal {
    /// Create an anonymous principal with no claims.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a principal from a list of claims.
    pub fn from_claims(claims: impl IntoIterator<Item = Claim>) -> Self {
        Self {
            claims: claims.into_iter().collect(),
            authentication_type: None,
        }
    }

    /// Build a principal from a JWT-style JSON claim object.
    ///
    /// String, number and boolean members become one claim each; array members
    /// become one claim per scalar element. Nested objects and nulls are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidClaims`] if `claims` is not a JSON object.
    pub fn from_json_claims(claims: &Value) -> IdentityResult<Self> {
        let object = claims.as_object().ok_or_else(|| {
            IdentityError::InvalidClaims("claim set must be a JSON object".to_string())
        })?;

        let mut principal = Self::new();
        for (claim_type, value) in object {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_text(item) {
                            principal.claims.push(Claim::new(claim_type.as_str(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_text(other) {
                        principal.claims.push(Claim::new(claim_type.as_str(), text));
                    }
                }
            }
        }
        Ok(principal)
    }

    /// Add a claim.
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push(Claim::new(claim_type, value));
        self
    }

    /// Add a subject claim.
    pub fn with_subject(self, subject: impl Into<String>) -> Self {
        self.with_claim(claim_types::SUBJECT, subject)
    }

    /// Add a role claim.
    pub fn with_role(self, role: impl Into<String>) -> Self {
        self.with_claim(claim_types::ROLE, role)
    }

    /// Add several role claims.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for role in roles {
            self.claims.push(Claim::new(claim_types::ROLE, role));
        }
        self
    }

    /// Set the authentication type.
    pub fn with_authentication_type(mut self, authentication_type: impl Into<String>) -> Self {
        self.authentication_type = Some(authentication_type.into());
        self
    }

    /// All claims in presentation order.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    /// Authentication type, if any.
    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    /// Values of all claims of the given type, in presentation order.
    pub fn find_all<'a, 'b>(
        &'a self,
        claim_type: &'b str,
    ) -> impl Iterator<Item = &'a str> + 'b
    where
        'a: 'b,
    {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// First value of the given claim type.
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.find_all(claim_type).next()
    }

    /// Check whether the exact claim is present.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_builder() {
        let user = Principal::new()
            .with_subject("mario")
            .with_roles(["User", "Manager"])
            .with_authentication_type("TestAuthType");

        assert_eq!(user.find_first(claim_types::SUBJECT), Some("mario"));
        assert_eq!(
            user.find_all(claim_types::ROLE).collect::<Vec<_>>(),
            vec!["User", "Manager"]
        );
        assert_eq!(user.authentication_type(), Some("TestAuthType"));
    }

    #[test]
    fn test_lookup_with_short_lived_claim_type() {
        let user = Principal::new().with_claim("TeamCoach", "Team C");
        let first = {
            let claim_type = String::from("TeamCoach");
            user.find_first(&claim_type)
        };
        assert_eq!(first, Some("Team C"));
        assert_eq!(user.find_first("missing"), None);
    }

    #[test]
    fn test_from_json_claims() {
        let claims = json!({
            "sub": "peach",
            "role": ["Manager", "Admin"],
            "level": 3,
            "profile": { "ignored": true },
            "nickname": null
        });

        let user = Principal::from_json_claims(&claims).unwrap();
        assert_eq!(user.find_first("sub"), Some("peach"));
        assert!(user.has_claim("role", "Admin"));
        assert!(user.has_claim("level", "3"));
        assert_eq!(user.find_first("profile"), None);
        assert_eq!(user.claims().len(), 4);
    }

    #[test]
    fn test_from_json_claims_rejects_non_object() {
        let err = Principal::from_json_claims(&json!(["sub", "peach"])).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidClaims(_)));
    }
}
