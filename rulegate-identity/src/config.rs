//! Identity extraction configuration.
//!
//! Decides which claim types carry the subject identifier and role
//! memberships. Configuration is loaded from environment variables with
//! JWT-style defaults.

use serde::{Deserialize, Serialize};

use crate::claims::claim_types;
use crate::error::{IdentityError, IdentityResult};

/// Claim type mapping used by [`ClaimsAdapter`](crate::ClaimsAdapter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Claim type whose first value is the subject identifier.
    pub subject_claim_type: String,

    /// Claim type whose values are role names.
    pub role_claim_type: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            subject_claim_type: claim_types::SUBJECT.to_string(),
            role_claim_type: claim_types::ROLE.to_string(),
        }
    }
}

impl IdentityConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RULEGATE_SUBJECT_CLAIM`: subject claim type (default: sub)
    /// - `RULEGATE_ROLE_CLAIM`: role claim type (default: role)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            subject_claim_type: std::env::var("RULEGATE_SUBJECT_CLAIM")
                .unwrap_or(default.subject_claim_type),
            role_claim_type: std::env::var("RULEGATE_ROLE_CLAIM")
                .unwrap_or(default.role_claim_type),
        }
    }

    /// Use a different claim type for the subject identifier.
    pub fn with_subject_claim(mut self, claim_type: impl Into<String>) -> Self {
        self.subject_claim_type = claim_type.into();
        self
    }

    /// Use a different claim type for roles.
    pub fn with_role_claim(mut self, claim_type: impl Into<String>) -> Self {
        self.role_claim_type = claim_type.into();
        self
    }

    /// Check that both claim types are non-empty.
    pub fn validate(&self) -> IdentityResult<()> {
        if self.subject_claim_type.trim().is_empty() {
            return Err(IdentityError::InvalidConfig {
                key: "subject_claim_type".to_string(),
                message: "claim type cannot be empty".to_string(),
            });
        }
        if self.role_claim_type.trim().is_empty() {
            return Err(IdentityError::InvalidConfig {
                key: "role_claim_type".to_string(),
                message: "claim type cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}
