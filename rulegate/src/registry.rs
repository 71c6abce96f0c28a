//! Action registry.
//!
//! Append-only while an authorizer is being built, read-only afterwards.
//! Actions keep their registration order.

use std::collections::HashMap;

use tracing::debug;

use crate::action::{Action, ActionKind};
use crate::error::{AuthzError, AuthzResult};

/// Actions declared for one resource type.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    resource_type: String,
    actions: Vec<Action>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    /// Create an empty registry for the named resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            actions: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Resource type the actions apply to.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Register an action checked from the identity alone.
    pub fn register_generic(
        &mut self,
        name: impl Into<String>,
        rule: impl Into<String>,
    ) -> AuthzResult<()> {
        self.register(name.into(), ActionKind::Generic, rule.into())
    }

    /// Register an action checked against a resource instance.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        rule: impl Into<String>,
    ) -> AuthzResult<()> {
        self.register(name.into(), ActionKind::Instance, rule.into())
    }

    /// Register an action of the given kind.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidActionName`] if `name` is empty or whitespace
    /// - [`AuthzError::EmptyRule`] if `rule` is empty or whitespace
    /// - [`AuthzError::DuplicateAction`] if `name` is already registered
    pub fn register(&mut self, name: String, kind: ActionKind, rule: String) -> AuthzResult<()> {
        validate_name(&name)?;
        if rule.trim().is_empty() {
            return Err(AuthzError::EmptyRule(name));
        }
        if self.index.contains_key(&name) {
            return Err(AuthzError::DuplicateAction(name));
        }

        debug!(
            resource_type = %self.resource_type,
            action = %name,
            kind = kind.as_str(),
            "Registered action"
        );
        self.index.insert(name.clone(), self.actions.len());
        self.actions.push(Action::new(name, kind, rule));
        Ok(())
    }

    /// Look up an action by name.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidActionName`] if `name` is empty or whitespace
    /// - [`AuthzError::UnknownAction`] if nothing is registered under `name`
    pub fn resolve(&self, name: &str) -> AuthzResult<&Action> {
        validate_name(name)?;
        self.index
            .get(name)
            .map(|&i| &self.actions[i])
            .ok_or_else(|| AuthzError::UnknownAction {
                resource_type: self.resource_type.clone(),
                action: name.to_string(),
            })
    }

    /// All actions in registration order.
    pub fn list_actions(&self) -> &[Action] {
        &self.actions
    }

    /// Check if an action is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if no actions are registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn validate_name(name: &str) -> AuthzResult<()> {
    if name.trim().is_empty() {
        return Err(AuthzError::InvalidActionName(name.to_string()));
    }
    Ok(())
}
