//! Built-in and extension functions.
//!
//! Every rule can call the built-ins [`Builtin::HasRole`] and
//! [`Builtin::HasClaim`]. An authorizer may register extension functions for
//! its own resource type; they take no arguments in rule text and receive the
//! identity context (and, for instance functions, the resource) implicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rulegate_identity::IdentityContext;

use crate::error::{FunctionError, RuleError, RuleResult};

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `HasRole(role)`: role membership
    HasRole,
    /// `HasClaim(type, value)`: claim membership
    HasClaim,
}

impl Builtin {
    /// Resolve a built-in by name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "HasRole" => Some(Builtin::HasRole),
            "HasClaim" => Some(Builtin::HasClaim),
            _ => None,
        }
    }

    /// Name as written in rule text.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::HasRole => "HasRole",
            Builtin::HasClaim => "HasClaim",
        }
    }

    /// Number of arguments.
    pub fn arity(&self) -> usize {
        match self {
            Builtin::HasRole => 1,
            Builtin::HasClaim => 2,
        }
    }
}

/// Extension function over the identity only.
pub type GenericFn = dyn Fn(&IdentityContext) -> Result<bool, FunctionError> + Send + Sync;

/// Extension function over the identity and a resource.
pub type InstanceFn<T> = dyn Fn(&IdentityContext, &T) -> Result<bool, FunctionError> + Send + Sync;

/// A registered extension function.
pub enum Function<T> {
    /// Needs only the identity; usable in generic and instance rules.
    Generic(Box<GenericFn>),
    /// Needs the resource; usable in instance rules only.
    Instance(Box<InstanceFn<T>>),
}

impl<T> Function<T> {
    /// True if the function needs a resource.
    pub fn needs_resource(&self) -> bool {
        matches!(self, Function::Instance(_))
    }
}

/// Extension functions visible to one authorizer's rules.
///
/// # Example
///
/// ```
/// use rulegate_rules::{FunctionTable, FunctionError};
///
/// struct Machine { maintainer: String }
///
/// let mut functions = FunctionTable::<Machine>::new();
/// functions
///     .register_instance("IsMaintainer", |ctx, machine| {
///         Ok(ctx.subject_id() == Some(machine.maintainer.as_str()))
///     })
///     .unwrap();
///
/// assert!(functions.contains("IsMaintainer"));
/// assert!(functions.register_generic("HasRole", |_| Ok(true)).is_err());
/// ```
pub struct FunctionTable<T> {
    functions: BTreeMap<String, Function<T>>,
}

impl<T> Default for FunctionTable<T> {
    fn default() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }
}

impl<T> FunctionTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function over the identity only.
    pub fn register_generic<F>(&mut self, name: impl Into<String>, function: F) -> RuleResult<()>
    where
        F: Fn(&IdentityContext) -> Result<bool, FunctionError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Function::Generic(Box::new(function)))
    }

    /// Register a function over the identity and the resource.
    pub fn register_instance<F>(&mut self, name: impl Into<String>, function: F) -> RuleResult<()>
    where
        F: Fn(&IdentityContext, &T) -> Result<bool, FunctionError> + Send + Sync + 'static,
    {
        self.insert(name.into(), Function::Instance(Box::new(function)))
    }

    fn insert(&mut self, name: String, function: Function<T>) -> RuleResult<()> {
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid || matches!(name.as_str(), "true" | "false" | "null") {
            return Err(RuleError::InvalidFunctionName(name));
        }
        if Builtin::parse(&name).is_some() || self.functions.contains_key(&name) {
            return Err(RuleError::DuplicateFunction(name));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Look up an extension function.
    pub fn get(&self, name: &str) -> Option<&Function<T>> {
        self.functions.get(name)
    }

    /// Check whether an extension function is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Number of registered extension functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if no extension functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Freeze the table for sharing between compiled rules.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl<T> fmt::Debug for FunctionTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.functions.iter().map(|(name, function)| {
                let kind = if function.needs_resource() {
                    "instance"
                } else {
                    "generic"
                };
                (name, kind)
            }))
            .finish()
    }
}
