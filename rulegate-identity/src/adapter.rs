//! Principal to identity context extraction
//!
//! The [`IdentityAdapter`] trait is the seam where a host decides how its
//! principal maps to subject, roles and claims. [`ClaimsAdapter`] is the
//! default, driven by [`IdentityConfig`].

use std::fmt;

use tracing::trace;

use crate::claims::Principal;
use crate::config::IdentityConfig;
use crate::context::IdentityContext;

/// Extracts an [`IdentityContext`] from a host principal.
///
/// Implementations must be pure: the same principal always yields the same
/// context.
pub trait IdentityAdapter: Send + Sync + fmt::Debug {
    /// Build the context for one evaluation.
    fn context(&self, principal: &Principal) -> IdentityContext;
}

/// Claim-type driven adapter.
///
/// The subject is the first value of the configured subject claim, roles are
/// all values of the configured role claim, and every claim (including those
/// two) lands in the claim multimap.
#[derive(Debug, Clone, Default)]
pub struct ClaimsAdapter {
    config: IdentityConfig,
}

impl ClaimsAdapter {
    /// Create an adapter for the given claim mapping.
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }

    /// The claim mapping in use.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }
}

impl From<IdentityConfig> for ClaimsAdapter {
    fn from(config: IdentityConfig) -> Self {
        Self::new(config)
    }
}

impl IdentityAdapter for ClaimsAdapter {
    fn context(&self, principal: &Principal) -> IdentityContext {
        let subject = principal
            .find_first(&self.config.subject_claim_type)
            .map(str::to_string);

        let mut ctx = IdentityContext::new(subject);
        for claim in principal.claims() {
            if claim.claim_type == self.config.role_claim_type {
                ctx.insert_role(claim.value.clone());
            }
            ctx.push_claim(claim.claim_type.clone(), claim.value.clone());
        }

        trace!(
            subject = ?ctx.subject_id(),
            roles = ctx.roles().len(),
            "Built identity context"
        );
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let user = Principal::new()
            .with_subject("luigi")
            .with_roles(["Coach", "User"])
            .with_claim("TeamCoach", "Team C");

        let ctx = ClaimsAdapter::default().context(&user);
        assert_eq!(ctx.subject_id(), Some("luigi"));
        assert!(ctx.has_role("Coach"));
        assert!(ctx.has_role("User"));
        assert!(ctx.has_claim("TeamCoach", "Team C"));
        assert!(ctx.has_claim("role", "Coach"));
    }

    #[test]
    fn test_overridden_subject_claim() {
        let user = Principal::new()
            .with_subject("ignored")
            .with_claim("email", "peach@castle.example");

        let adapter = ClaimsAdapter::new(IdentityConfig::default().with_subject_claim("email"));
        let ctx = adapter.context(&user);
        assert_eq!(ctx.subject_id(), Some("peach@castle.example"));
    }

    #[test]
    fn test_anonymous_principal() {
        let ctx = ClaimsAdapter::default().context(&Principal::new());
        assert_eq!(ctx.subject_id(), None);
        assert!(ctx.roles().is_empty());
        assert!(ctx.claims().is_empty());
    }
}
