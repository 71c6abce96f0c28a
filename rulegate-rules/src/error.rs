//! Error types for rule compilation, evaluation and translation

use thiserror::Error;

/// Failure to compile rule text.
///
/// Covers both grammar errors and binding errors (unknown variables or
/// functions, arity, obvious type mismatches, scope violations).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    /// Rule text is empty
    #[error("empty rule")]
    Empty,

    /// Lexical or grammar error at a byte offset
    #[error("syntax error at {position}: {message}")]
    Syntax {
        /// Byte offset into the rule text.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// Identifier that is neither a variable nor a function call
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// Call to a function that is not built in or registered
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    /// Method that is not supported on any value
    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    /// Function or method called with the wrong number of arguments
    #[error("`{name}` expects {expected} argument(s), got {found}")]
    Arity {
        /// Function or method name.
        name: String,
        /// Declared argument count.
        expected: usize,
        /// Argument count in the rule text.
        found: usize,
    },

    /// Operand types that can never be valid
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// `Resource` or an instance function used where no resource is bound
    #[error("`{0}` is not available in a generic rule")]
    ResourceUnavailable(String),

    /// Member access on something other than a resource path
    #[error("invalid member access: {0}")]
    InvalidMemberAccess(String),

    /// Function name collides with a built-in or an existing registration
    #[error("function `{0}` is already defined")]
    DuplicateFunction(String),

    /// Function name is not a valid identifier
    #[error("invalid function name `{0}`")]
    InvalidFunctionName(String),
}

/// Failure raised by an extension function.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FunctionError(pub String);

impl FunctionError {
    /// Create a new function error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure while evaluating a compiled rule.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    /// The resource does not expose the requested field
    #[error("resource has no field `{0}`")]
    FieldNotFound(String),

    /// A runtime value had the wrong type for an operator
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A rule that references `Resource` was evaluated without one
    #[error("rule references the resource but none was supplied")]
    ResourceUnbound,

    /// An extension function failed
    #[error("function `{name}` failed: {source}")]
    Function {
        /// Function name.
        name: String,
        /// Underlying failure.
        #[source]
        source: FunctionError,
    },
}

/// Failure to render a resource expression for a query target.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslationError {
    /// The expression calls a function the target cannot express
    #[error("function `{0}` cannot be translated")]
    UnsupportedFunction(String),

    /// The expression uses an operation the target cannot express
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A resource field has no mapping in the target
    #[error("no column mapping for field `{0}`")]
    UnmappedField(String),

    /// The expression holds an identity-only term that failed to evaluate
    #[error("expression contains a failed term: {0}")]
    FailedTerm(#[source] EvalError),
}

/// Result type for rule compilation.
pub type RuleResult<T> = Result<T, RuleError>;

/// Result type for rule evaluation.
pub type EvalResult<T> = Result<T, EvalError>;
