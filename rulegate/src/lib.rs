//! # Rulegate
//!
//! Rule-driven authorization for one resource type at a time.
//!
//! ## Overview
//!
//! An integrator declares named **actions** for a resource type, each with a
//! boolean **rule** over the requesting identity and, for instance actions,
//! the resource. Callers then ask:
//!
//! - **can_generic**: may this identity perform the action at all?
//! - **can_instance**: may it perform the action on this resource?
//! - **expression_for**: which resources may it perform the action on? The
//!   answer is a predicate a query layer can push down instead of loading
//!   and checking every row.
//!
//! ## Architecture
//!
//! ```text
//! AuthorizerBuilder ── register actions / functions / adapter ──> Authorizer
//!
//! Authorizer::can_* ──> ActionRegistry::resolve
//!                   ──> IdentityAdapter::context(principal)
//!                   ──> RuleCache::get_or_compile  (once per action)
//!                   ──> CompiledRule::evaluate_* / resource_expression
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rulegate::{Authorizer, Principal};
//! use serde_json::json;
//!
//! let mut builder = Authorizer::<serde_json::Value>::builder("Team");
//! builder
//!     .register_generic("Insert", r#"HasRole("Manager")"#).unwrap()
//!     .register_instance("StartTraining", "Resource.CoachName == UserId").unwrap();
//! let teams = builder.build();
//!
//! let luigi = Principal::new().with_subject("Luigi");
//! assert!(!teams.can_generic(&luigi, "Insert").unwrap());
//!
//! let all = vec![
//!     json!({ "Name": "Team A", "CoachName": "Luigi" }),
//!     json!({ "Name": "Team B", "CoachName": "Mario" }),
//! ];
//! let coached = teams.filter(&luigi, "StartTraining", &all).unwrap();
//! assert_eq!(coached, vec![&all[0]]);
//! ```
//!
//! ## Rule language
//!
//! See [`rulegate_rules`] for the grammar. Rules compile lazily on first
//! use, so a malformed rule surfaces as [`AuthzError::RuleParse`] from the
//! first check of its action, not from registration.

pub mod action;
pub mod authorizer;
pub mod cache;
pub mod error;
pub mod policy;
pub mod registry;

// Re-export main types for convenience
pub use action::{Action, ActionKind};
pub use authorizer::{Authorizer, AuthorizerBuilder};
pub use cache::RuleCache;
pub use error::{AuthzError, AuthzResult};
pub use policy::{ActionConfig, PolicyConfig};
pub use registry::ActionRegistry;

pub use rulegate_identity::{
    Claim, ClaimsAdapter, IdentityAdapter, IdentityConfig, IdentityContext, Principal,
};
pub use rulegate_rules::{
    FunctionError, QueryTranslator, Resource, ResourceExpression, SqlFilter, SqlTranslator, Value,
};
