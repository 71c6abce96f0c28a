//! Compiled-rule cache.
//!
//! One publish-once cell per registered action, created when the authorizer
//! is built. The first caller for an action compiles its rule; concurrent
//! callers block on the cell until the result is published. Failed
//! compilations leave the cell empty so a later call retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use rulegate_rules::{CompiledRule, RuleCompiler};

use crate::action::Action;
use crate::error::{AuthzError, AuthzResult};
use crate::registry::ActionRegistry;

/// Lazily compiled rules keyed by action name.
pub struct RuleCache<T> {
    compiler: RuleCompiler<T>,
    cells: HashMap<String, OnceCell<Arc<CompiledRule<T>>>>,
    compilations: AtomicU64,
}

impl<T> RuleCache<T> {
    /// Create empty cells for every action in `registry`.
    pub fn new(compiler: RuleCompiler<T>, registry: &ActionRegistry) -> Self {
        let cells = registry
            .list_actions()
            .iter()
            .map(|action| (action.name().to_string(), OnceCell::new()))
            .collect();
        Self {
            compiler,
            cells,
            compilations: AtomicU64::new(0),
        }
    }

    /// Return the compiled rule for `action`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// [`AuthzError::RuleParse`] if the rule text does not compile.
    pub fn get_or_compile(&self, action: &Action) -> AuthzResult<Arc<CompiledRule<T>>> {
        match self.cells.get(action.name()) {
            Some(cell) => cell.get_or_try_init(|| self.compile(action)).map(Arc::clone),
            None => {
                warn!(action = action.name(), "Action has no cache entry, compiling uncached");
                self.compile(action)
            }
        }
    }

    /// Check if the rule for `name` has been compiled and published.
    pub fn is_compiled(&self, name: &str) -> bool {
        self.cells.get(name).is_some_and(|cell| cell.get().is_some())
    }

    /// Number of successful compilations so far.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Acquire)
    }

    fn compile(&self, action: &Action) -> AuthzResult<Arc<CompiledRule<T>>> {
        match self.compiler.compile(action.rule(), action.kind().scope()) {
            Ok(rule) => {
                self.compilations.fetch_add(1, Ordering::AcqRel);
                debug!(action = action.name(), kind = action.kind().as_str(), "Cached compiled rule");
                Ok(Arc::new(rule))
            }
            Err(source) => {
                warn!(action = action.name(), rule = action.rule(), error = %source, "Rule failed to compile");
                Err(AuthzError::RuleParse {
                    action: action.name().to_string(),
                    rule: action.rule().to_string(),
                    source,
                })
            }
        }
    }
}

impl<T> fmt::Debug for RuleCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compiled: Vec<_> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(name, _)| name.as_str())
            .collect();
        f.debug_struct("RuleCache")
            .field("actions", &self.cells.len())
            .field("compiled", &compiled)
            .field("compilations", &self.compilations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (RuleCache<serde_json::Value>, ActionRegistry) {
        let mut registry = ActionRegistry::new("Team");
        registry.register_generic("Read", "true").unwrap();
        registry.register_generic("Broken", "HasRole(").unwrap();
        (RuleCache::new(RuleCompiler::default(), &registry), registry)
    }

    #[test]
    fn test_compiles_once() {
        let (cache, registry) = cache();
        let read = registry.resolve("Read").unwrap();
        assert!(!cache.is_compiled("Read"));

        let first = cache.get_or_compile(read).unwrap();
        let second = cache.get_or_compile(read).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_compiled("Read"));
        assert_eq!(cache.compilations(), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (cache, registry) = cache();
        let broken = registry.resolve("Broken").unwrap();
        for _ in 0..2 {
            assert!(matches!(
                cache.get_or_compile(broken),
                Err(AuthzError::RuleParse { ref action, ref rule, .. })
                    if action == "Broken" && rule == "HasRole("
            ));
        }
        assert!(!cache.is_compiled("Broken"));
        assert_eq!(cache.compilations(), 0);
    }
}
