//! # Rulegate Identity
//!
//! Host principal model and the identity context that authorization rules
//! are evaluated against.
//!
//! ## Overview
//!
//! - **Principal**: ordered claim list supplied by the host
//! - **IdentityContext**: normalized subject id, role set and claim multimap
//! - **IdentityAdapter**: overridable extraction from principal to context
//! - **IdentityConfig**: which claim types carry subject and roles
//!
//! ## Usage
//!
//! ```rust
//! use rulegate_identity::{ClaimsAdapter, IdentityAdapter, Principal};
//!
//! let user = Principal::new().with_subject("peach").with_role("Manager");
//! let ctx = ClaimsAdapter::default().context(&user);
//!
//! assert_eq!(ctx.subject_id(), Some("peach"));
//! assert!(ctx.has_role("Manager"));
//! ```

pub mod adapter;
pub mod claims;
pub mod config;
pub mod context;
pub mod error;

// Re-export main types for convenience
pub use adapter::{ClaimsAdapter, IdentityAdapter};
pub use claims::{claim_types, Claim, Principal};
pub use config::IdentityConfig;
pub use context::IdentityContext;
pub use error::{IdentityError, IdentityResult};
