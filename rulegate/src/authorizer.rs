//! Authorizer for one resource type.
//!
//! [`AuthorizerBuilder`] collects actions, extension functions and the
//! identity adapter; [`Authorizer`] is the closed, shareable result. Checks
//! resolve the action, build an identity context from the principal, fetch
//! the compiled rule from the cache and run it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use rulegate_identity::{ClaimsAdapter, IdentityAdapter, IdentityConfig, IdentityContext, Principal};
use rulegate_rules::{
    CompiledRule, FunctionError, FunctionTable, QueryTranslator, Resource, ResourceExpression,
    RuleCompiler, RuleError,
};

use crate::action::{Action, ActionKind};
use crate::cache::RuleCache;
use crate::error::{AuthzError, AuthzResult};
use crate::policy::PolicyConfig;
use crate::registry::ActionRegistry;

/// Collects the configuration of an [`Authorizer`].
///
/// Registration methods chain through `&mut Self` and fail fast on
/// misconfiguration:
///
/// ```rust
/// use rulegate::{Authorizer, AuthzResult};
///
/// fn teams() -> AuthzResult<Authorizer<serde_json::Value>> {
///     let mut builder = Authorizer::builder("Team");
///     builder
///         .register_generic("Read", "true")?
///         .register_instance("Edit", r#"HasRole("Manager") || Resource.Coach == UserId"#)?;
///     Ok(builder.build())
/// }
///
/// assert_eq!(teams().unwrap().list_actions().len(), 2);
/// ```
pub struct AuthorizerBuilder<T> {
    registry: ActionRegistry,
    functions: FunctionTable<T>,
    adapter: Arc<dyn IdentityAdapter>,
}

impl<T> AuthorizerBuilder<T> {
    /// Start an authorizer for the named resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            registry: ActionRegistry::new(resource_type),
            functions: FunctionTable::new(),
            adapter: Arc::new(ClaimsAdapter::default()),
        }
    }

    /// Register an action checked from the identity alone.
    pub fn register_generic(
        &mut self,
        name: impl Into<String>,
        rule: impl Into<String>,
    ) -> AuthzResult<&mut Self> {
        self.registry.register_generic(name, rule)?;
        Ok(self)
    }

    /// Register an action checked against a resource instance.
    pub fn register_instance(
        &mut self,
        name: impl Into<String>,
        rule: impl Into<String>,
    ) -> AuthzResult<&mut Self> {
        self.registry.register_instance(name, rule)?;
        Ok(self)
    }

    /// Register an extension function over the identity, callable from any
    /// rule as `name()`.
    pub fn register_generic_function<F>(
        &mut self,
        name: impl Into<String>,
        function: F,
    ) -> AuthzResult<&mut Self>
    where
        F: Fn(&IdentityContext) -> Result<bool, FunctionError> + Send + Sync + 'static,
    {
        self.functions
            .register_generic(name, function)
            .map_err(function_error)?;
        Ok(self)
    }

    /// Register an extension function over the identity and the resource,
    /// callable from instance rules as `name()`.
    pub fn register_instance_function<F>(
        &mut self,
        name: impl Into<String>,
        function: F,
    ) -> AuthzResult<&mut Self>
    where
        F: Fn(&IdentityContext, &T) -> Result<bool, FunctionError> + Send + Sync + 'static,
    {
        self.functions
            .register_instance(name, function)
            .map_err(function_error)?;
        Ok(self)
    }

    /// Replace the principal to context extraction.
    pub fn with_adapter(&mut self, adapter: impl IdentityAdapter + 'static) -> &mut Self {
        self.adapter = Arc::new(adapter);
        self
    }

    /// Use the claim-driven adapter with a custom claim mapping.
    pub fn with_identity_config(&mut self, config: IdentityConfig) -> &mut Self {
        self.with_adapter(ClaimsAdapter::new(config))
    }

    /// Register every action a policy declares, in order.
    ///
    /// # Errors
    ///
    /// [`AuthzError::InvalidPolicy`] if the policy targets another resource
    /// type or carries an invalid claim mapping, otherwise the same errors as
    /// the `register_*` methods.
    pub fn with_policy(&mut self, policy: &PolicyConfig) -> AuthzResult<&mut Self> {
        if let Some(resource) = &policy.resource {
            if resource != self.registry.resource_type() {
                return Err(AuthzError::InvalidPolicy(format!(
                    "policy targets {resource}, authorizer is for {}",
                    self.registry.resource_type()
                )));
            }
        }
        if let Some(config) = &policy.identity {
            config
                .validate()
                .map_err(|e| AuthzError::InvalidPolicy(e.to_string()))?;
            self.with_identity_config(config.clone());
        }
        for action in &policy.actions {
            self.registry
                .register(action.name.clone(), action.kind, action.rule.clone())?;
        }
        Ok(self)
    }

    /// Close the registry and freeze the function table.
    pub fn build(self) -> Authorizer<T> {
        debug!(
            resource_type = self.registry.resource_type(),
            actions = self.registry.len(),
            functions = ?self.functions.names().collect::<Vec<_>>(),
            "Built authorizer"
        );
        let compiler = RuleCompiler::new(self.functions.into_shared());
        let cache = RuleCache::new(compiler, &self.registry);
        Authorizer {
            registry: self.registry,
            cache,
            adapter: self.adapter,
        }
    }
}

fn function_error(error: RuleError) -> AuthzError {
    match error {
        RuleError::DuplicateFunction(name) => AuthzError::DuplicateFunction(name),
        RuleError::InvalidFunctionName(name) => AuthzError::InvalidFunctionName(name),
        other => AuthzError::InvalidFunctionName(other.to_string()),
    }
}

/// Rule-driven authorizer for resources of type `T`.
///
/// Thread-safe: share it behind an `Arc` and call it from any number of
/// threads. Rules compile on first use and are never recompiled.
pub struct Authorizer<T> {
    registry: ActionRegistry,
    cache: RuleCache<T>,
    adapter: Arc<dyn IdentityAdapter>,
}

impl<T> fmt::Debug for Authorizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("adapter", &self.adapter)
            .finish()
    }
}

impl<T> Authorizer<T> {
    /// Start building an authorizer for the named resource type.
    pub fn builder(resource_type: impl Into<String>) -> AuthorizerBuilder<T> {
        AuthorizerBuilder::new(resource_type)
    }

    /// Resource type this authorizer guards.
    pub fn resource_type(&self) -> &str {
        self.registry.resource_type()
    }

    /// Registered actions in registration order.
    pub fn list_actions(&self) -> &[Action] {
        self.registry.list_actions()
    }

    /// Number of rule compilations performed so far.
    pub fn compilations(&self) -> u64 {
        self.cache.compilations()
    }

    /// Identity context the rules would see for `principal`.
    pub fn identity_context(&self, principal: &Principal) -> IdentityContext {
        self.adapter.context(principal)
    }

    fn prepare<'p>(
        &self,
        identity: Option<&'p Principal>,
        action: &str,
    ) -> AuthzResult<(&Action, IdentityContext)> {
        let principal = identity.ok_or(AuthzError::NullIdentity)?;
        let action = self.registry.resolve(action)?;
        Ok((action, self.identity_context(principal)))
    }

    fn rule(&self, action: &Action) -> AuthzResult<Arc<CompiledRule<T>>> {
        self.cache.get_or_compile(action)
    }
}

impl<T: Resource> Authorizer<T> {
    /// Check an action without a resource instance.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::NullIdentity`] if no identity is given
    /// - [`AuthzError::InvalidActionName`] or [`AuthzError::UnknownAction`]
    /// - [`AuthzError::InstanceActionRequiresResource`] for instance actions
    /// - [`AuthzError::RuleParse`] or [`AuthzError::RuleEvaluation`]
    pub fn can_generic<'p>(
        &self,
        identity: impl Into<Option<&'p Principal>>,
        action: &str,
    ) -> AuthzResult<bool> {
        let (action, ctx) = self.prepare(identity.into(), action)?;
        if action.kind().requires_resource() {
            return Err(AuthzError::InstanceActionRequiresResource {
                resource_type: self.resource_type().to_string(),
                action: action.name().to_string(),
            });
        }

        let allowed = self
            .rule(action)?
            .evaluate_generic(&ctx)
            .map_err(|source| evaluation_error(action, source))?;
        trace!(action = action.name(), allowed, "Evaluated generic check");
        Ok(allowed)
    }

    /// Check an action against a resource instance.
    ///
    /// Generic actions accept the resource and ignore it.
    ///
    /// # Errors
    ///
    /// As [`can_generic`](Self::can_generic), plus [`AuthzError::NullResource`]
    /// if no resource is given.
    pub fn can_instance<'p, 'r>(
        &self,
        identity: impl Into<Option<&'p Principal>>,
        resource: impl Into<Option<&'r T>>,
        action: &str,
    ) -> AuthzResult<bool>
    where
        T: 'r,
    {
        let identity = identity.into().ok_or(AuthzError::NullIdentity)?;
        let resource = resource.into().ok_or(AuthzError::NullResource)?;
        let (action, ctx) = self.prepare(Some(identity), action)?;

        let rule = self.rule(action)?;
        let result = match action.kind() {
            ActionKind::Instance => rule.evaluate_instance(&ctx, resource),
            ActionKind::Generic => rule.evaluate_generic(&ctx),
        };
        let allowed = result.map_err(|source| evaluation_error(action, source))?;
        trace!(action = action.name(), allowed, "Evaluated instance check");
        Ok(allowed)
    }

    /// Bind the identity into the action's rule and return the predicate
    /// over resources, for a query layer to translate or for in-memory use.
    ///
    /// Generic rules yield a predicate that does not depend on the resource.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::NullIdentity`], [`AuthzError::InvalidActionName`] or
    ///   [`AuthzError::UnknownAction`]
    /// - [`AuthzError::RuleParse`] if the rule does not compile
    ///
    /// Failures of identity-only terms are kept in the expression and
    /// surface from [`ResourceExpression::matches`] for the resources whose
    /// evaluation reaches them, exactly as from [`can_instance`](Self::can_instance).
    pub fn expression_for<'p>(
        &self,
        identity: impl Into<Option<&'p Principal>>,
        action: &str,
    ) -> AuthzResult<ResourceExpression<T>> {
        let (action, ctx) = self.prepare(identity.into(), action)?;
        let expression = self.rule(action)?.resource_expression(ctx);
        trace!(action = action.name(), %expression, "Built resource expression");
        Ok(expression)
    }

    /// Build the resource expression and translate it for a query backend.
    ///
    /// # Errors
    ///
    /// As [`expression_for`](Self::expression_for), plus
    /// [`AuthzError::RuleTranslation`] if the translator cannot represent
    /// the predicate.
    pub fn translate_for<'p, Q: QueryTranslator>(
        &self,
        identity: impl Into<Option<&'p Principal>>,
        action: &str,
        translator: &mut Q,
    ) -> AuthzResult<Q::Output> {
        let expression = self.expression_for(identity, action)?;
        expression
            .translate(translator)
            .map_err(|source| AuthzError::RuleTranslation {
                action: action.to_string(),
                source,
            })
    }

    /// Keep the resources the identity may perform `action` on.
    pub fn filter<'p, 'r, I>(
        &self,
        identity: impl Into<Option<&'p Principal>>,
        action: &str,
        resources: I,
    ) -> AuthzResult<Vec<&'r T>>
    where
        I: IntoIterator<Item = &'r T>,
        T: 'r,
    {
        let expression = self.expression_for(identity, action)?;
        expression
            .filter(resources)
            .map_err(|source| AuthzError::RuleEvaluation {
                action: action.to_string(),
                source,
            })
    }
}

fn evaluation_error(action: &Action, source: rulegate_rules::EvalError) -> AuthzError {
    AuthzError::RuleEvaluation {
        action: action.name().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn teams() -> Authorizer<serde_json::Value> {
        let mut builder = Authorizer::builder("Team");
        builder
            .register_generic("Read", "true")
            .unwrap()
            .register_instance("Edit", r#"HasRole("Manager") || Resource.Coach == UserId"#)
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_generic_and_instance_checks() {
        let authz = teams();
        let mario = Principal::new().with_subject("Mario");
        let team = json!({ "Coach": "Mario" });

        assert!(authz.can_generic(&mario, "Read").unwrap());
        assert!(authz.can_instance(&mario, &team, "Read").unwrap());
        assert!(authz.can_instance(&mario, &team, "Edit").unwrap());
        assert!(!authz
            .can_instance(&Principal::new().with_subject("Peach"), &team, "Edit")
            .unwrap());
    }

    #[test]
    fn test_argument_validation_order() {
        let authz = teams();
        let mario = Principal::new().with_subject("Mario");
        let team = json!({});

        assert!(matches!(authz.can_generic(None, "Read"), Err(AuthzError::NullIdentity)));
        assert!(matches!(
            authz.can_instance(&mario, None, "Edit"),
            Err(AuthzError::NullResource)
        ));
        assert!(matches!(
            authz.can_instance(None, None, ""),
            Err(AuthzError::NullIdentity)
        ));
        assert!(matches!(
            authz.can_instance(&mario, &team, " "),
            Err(AuthzError::InvalidActionName(_))
        ));
        assert!(matches!(
            authz.can_generic(&mario, "Edit"),
            Err(AuthzError::InstanceActionRequiresResource { .. })
        ));
    }

    #[test]
    fn test_function_registration_errors() {
        let mut builder = Authorizer::<serde_json::Value>::builder("Team");
        builder.register_generic_function("IsWeekday", |_| Ok(true)).unwrap();
        assert!(matches!(
            builder.register_instance_function("IsWeekday", |_, _| Ok(true)),
            Err(AuthzError::DuplicateFunction(name)) if name == "IsWeekday"
        ));
        assert!(matches!(
            builder.register_generic_function("HasRole", |_| Ok(true)),
            Err(AuthzError::DuplicateFunction(_))
        ));
        assert!(matches!(
            builder.register_generic_function("not valid", |_| Ok(true)),
            Err(AuthzError::InvalidFunctionName(_))
        ));
    }

    #[test]
    fn test_policy_resource_mismatch() {
        let policy = PolicyConfig {
            resource: Some("Machine".into()),
            ..PolicyConfig::default()
        };
        let mut builder = Authorizer::<serde_json::Value>::builder("Team");
        assert!(matches!(
            builder.with_policy(&policy),
            Err(AuthzError::InvalidPolicy(_))
        ));
    }
}
