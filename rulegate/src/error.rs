//! Error types for authorization operations
//!
//! Registration errors are raised while an authorizer is built; everything
//! else is raised per call. No failure is ever folded into a `false` result.

use rulegate_rules::{EvalError, RuleError, TranslationError};
use thiserror::Error;

/// Authorization error types.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Action name is empty or whitespace
    #[error("Invalid action name: {0:?}")]
    InvalidActionName(String),

    /// Action name registered twice
    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    /// Action name not present in the registry
    #[error("Unknown action `{action}` for resource type {resource_type}")]
    UnknownAction {
        /// Resource type of the authorizer.
        resource_type: String,
        /// Requested action.
        action: String,
    },

    /// Instance action checked without a resource
    #[error("Action `{action}` on {resource_type} requires a resource instance")]
    InstanceActionRequiresResource {
        /// Resource type of the authorizer.
        resource_type: String,
        /// Requested action.
        action: String,
    },

    /// No identity supplied
    #[error("Identity is required")]
    NullIdentity,

    /// No resource supplied to an instance check
    #[error("Resource is required")]
    NullResource,

    /// Rule text empty at registration
    #[error("Rule for action `{0}` is empty")]
    EmptyRule(String),

    /// Extension function name already taken
    #[error("Function already defined: {0}")]
    DuplicateFunction(String),

    /// Extension function name is not a valid identifier
    #[error("Invalid function name: {0:?}")]
    InvalidFunctionName(String),

    /// Rule text failed to compile
    #[error("Rule for action `{action}` failed to compile: {source}")]
    RuleParse {
        /// Action whose rule failed.
        action: String,
        /// Offending rule text.
        rule: String,
        /// Compiler error.
        #[source]
        source: RuleError,
    },

    /// Compiled rule failed while evaluating
    #[error("Rule for action `{action}` failed to evaluate: {source}")]
    RuleEvaluation {
        /// Action whose rule failed.
        action: String,
        /// Evaluation error.
        #[source]
        source: EvalError,
    },

    /// Resource expression cannot be rendered for the caller's target
    #[error("Rule for action `{action}` cannot be translated: {source}")]
    RuleTranslation {
        /// Action whose rule failed.
        action: String,
        /// Translation error.
        #[source]
        source: TranslationError,
    },

    /// Policy document cannot be decoded
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    /// Check if this error is a misconfiguration raised while building an
    /// authorizer rather than a per-call failure.
    ///
    /// `InvalidActionName` counts as one: at lookup time it means the caller
    /// passed a blank name, which is a programming error too.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AuthzError::InvalidActionName(_)
                | AuthzError::DuplicateAction(_)
                | AuthzError::EmptyRule(_)
                | AuthzError::DuplicateFunction(_)
                | AuthzError::InvalidFunctionName(_)
                | AuthzError::InvalidPolicy(_)
        )
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthzError::InvalidActionName(_) => "INVALID_ACTION_NAME",
            AuthzError::DuplicateAction(_) => "DUPLICATE_ACTION",
            AuthzError::UnknownAction { .. } => "UNKNOWN_ACTION",
            AuthzError::InstanceActionRequiresResource { .. } => "INSTANCE_ACTION_REQUIRES_RESOURCE",
            AuthzError::NullIdentity => "NULL_IDENTITY",
            AuthzError::NullResource => "NULL_RESOURCE",
            AuthzError::EmptyRule(_) => "EMPTY_RULE",
            AuthzError::DuplicateFunction(_) => "DUPLICATE_FUNCTION",
            AuthzError::InvalidFunctionName(_) => "INVALID_FUNCTION_NAME",
            AuthzError::RuleParse { .. } => "RULE_PARSE_ERROR",
            AuthzError::RuleEvaluation { .. } => "RULE_EVALUATION_ERROR",
            AuthzError::RuleTranslation { .. } => "RULE_TRANSLATION_ERROR",
            AuthzError::InvalidPolicy(_) => "INVALID_POLICY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthzError::NullIdentity.error_code(), "NULL_IDENTITY");
        let err = AuthzError::UnknownAction {
            resource_type: "Team".into(),
            action: "Fly".into(),
        };
        assert_eq!(err.error_code(), "UNKNOWN_ACTION");
        assert_eq!(err.to_string(), "Unknown action `Fly` for resource type Team");
    }

    #[test]
    fn test_configuration_errors() {
        assert!(AuthzError::DuplicateAction("Read".into()).is_configuration_error());
        assert!(AuthzError::InvalidActionName("  ".into()).is_configuration_error());
        assert!(AuthzError::InvalidFunctionName("1x".into()).is_configuration_error());
        assert!(AuthzError::InvalidPolicy("bad".into()).is_configuration_error());
        assert!(!AuthzError::NullResource.is_configuration_error());
        let parse = AuthzError::RuleParse {
            action: "Edit".into(),
            rule: "HasRole(".into(),
            source: RuleError::Empty,
        };
        assert!(!parse.is_configuration_error());
        assert_eq!(parse.error_code(), "RULE_PARSE_ERROR");
    }
}
