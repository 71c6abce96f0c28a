//! Resource expressions: rules with the identity bound.
//!
//! [`residualize`] evaluates everything in a bound rule that depends only on
//! the identity and keeps the rest as a [`Residual`] tree whose only free
//! variable is the resource. That tree is the pushdown contract: a query
//! layer may translate it (see [`QueryTranslator`]) or evaluate it in memory
//! with [`ResourceExpression::matches`].
//!
//! Short-circuit operators keep their constant left operand when the right
//! operand is resource-dependent, so in-memory evaluation of the residual
//! follows exactly the same steps as direct evaluation of the rule. Failures
//! while folding stay in the tree as [`Residual::Failed`] and only surface
//! for resources whose evaluation reaches them.

use std::fmt;
use std::sync::Arc;

use rulegate_identity::IdentityContext;

use crate::ast::{BinaryOp, Method};
use crate::compiler::Node;
use crate::error::{EvalError, EvalResult, TranslationError};
use crate::eval::{call_builtin, call_extension, identity_value, read_field};
use crate::functions::{Builtin, FunctionTable};
use crate::resource::Resource;
use crate::translate::QueryTranslator;
use crate::value::{apply_binary, apply_method, apply_not, Value};

/// Predicate over the resource, with identity-dependent parts folded away.
///
/// The grammar is fixed: translators only ever see these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Residual {
    /// Folded value
    Constant(Value),
    /// `Resource.a.b`
    Field(Vec<String>),
    /// Logical negation
    Not(Box<Residual>),
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Residual>,
        right: Box<Residual>,
    },
    /// Method call with a resource-dependent operand
    Method {
        method: Method,
        target: Box<Residual>,
        args: Vec<Residual>,
    },
    /// Built-in call with a resource-dependent argument
    Builtin { function: Builtin, args: Vec<Residual> },
    /// Instance extension function
    Extension(String),
    /// Identity-only term that failed to fold; evaluating it raises the error
    Failed(EvalError),
}

impl Residual {
    /// The folded value, if nothing resource-dependent remains.
    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Residual::Constant(value) => Some(value),
            _ => None,
        }
    }

    fn boxed(self) -> Box<Self> {
        Box::new(self)
    }
}

impl fmt::Display for Residual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residual::Constant(Value::Str(s)) => write!(f, "{s:?}"),
            Residual::Constant(value) => write!(f, "{value}"),
            Residual::Field(path) => write!(f, "Resource.{}", path.join(".")),
            Residual::Not(inner) => write!(f, "!{inner}"),
            Residual::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Residual::Method {
                method,
                target,
                args,
            } => {
                write!(f, "{target}.{}(", method.name())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Residual::Builtin { function, args } => {
                write!(f, "{}(", function.name())?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Residual::Extension(name) => write!(f, "{name}()"),
            Residual::Failed(err) => write!(f, "<failed: {err}>"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Residual]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Fold the identity into a bound rule.
///
/// Never fails: a subtree whose folding raises becomes
/// [`Residual::Failed`], which raises again only if evaluation reaches it.
pub(crate) fn residualize<T>(
    node: &Node,
    identity: &IdentityContext,
    functions: &FunctionTable<T>,
) -> Residual {
    fold(node, identity, functions).unwrap_or_else(Residual::Failed)
}

fn fold<T>(node: &Node, identity: &IdentityContext, functions: &FunctionTable<T>) -> EvalResult<Residual> {
    let sub = |n: &Node| residualize(n, identity, functions);

    Ok(match node {
        Node::Literal(value) => Residual::Constant(value.clone()),
        Node::Identity(var) => Residual::Constant(identity_value(*var, identity)?),
        Node::Field(path) => Residual::Field(path.clone()),
        Node::Builtin { function, args } => {
            let args: Vec<_> = args.iter().map(sub).collect();
            match constants(&args) {
                Some(values) => {
                    Residual::Constant(Value::Bool(call_builtin(*function, identity, &values)?))
                }
                None => Residual::Builtin {
                    function: *function,
                    args,
                },
            }
        }
        Node::Extension {
            name,
            needs_resource: true,
        } => Residual::Extension(name.clone()),
        Node::Extension { name, .. } => {
            Residual::Constant(Value::Bool(call_extension(functions, name, identity, None)?))
        }
        Node::Method {
            method,
            target,
            args,
        } => {
            let target = sub(target);
            let args: Vec<_> = args.iter().map(sub).collect();
            match (target.as_constant(), constants(&args)) {
                (Some(value), Some(values)) => {
                    Residual::Constant(apply_method(*method, value, &values)?)
                }
                _ => Residual::Method {
                    method: *method,
                    target: target.boxed(),
                    args,
                },
            }
        }
        Node::Not(inner) => match sub(inner) {
            Residual::Constant(value) => Residual::Constant(apply_not(&value)?),
            other => Residual::Not(other.boxed()),
        },
        Node::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
            left,
            right,
        } => {
            // `&&` stops on false, `||` stops on true
            let stop = *op == BinaryOp::Or;
            let left = sub(left);
            match left.as_constant() {
                Some(value) if value.as_bool()? == stop => Residual::Constant(Value::Bool(stop)),
                Some(_) => match sub(right) {
                    Residual::Constant(value) => Residual::Constant(Value::Bool(value.as_bool()?)),
                    right => Residual::Binary {
                        op: *op,
                        left: left.boxed(),
                        right: right.boxed(),
                    },
                },
                None => Residual::Binary {
                    op: *op,
                    left: left.boxed(),
                    right: sub(right).boxed(),
                },
            }
        }
        Node::Binary { op, left, right } => {
            let left = sub(left);
            let right = sub(right);
            match (left.as_constant(), right.as_constant()) {
                (Some(l), Some(r)) => Residual::Constant(apply_binary(*op, l, r)?),
                _ => Residual::Binary {
                    op: *op,
                    left: left.boxed(),
                    right: right.boxed(),
                },
            }
        }
    })
}

fn constants(items: &[Residual]) -> Option<Vec<Value>> {
    items.iter().map(|r| r.as_constant().cloned()).collect()
}

/// A rule bound to one identity, as a predicate over resources.
///
/// Produced by [`CompiledRule::resource_expression`](crate::CompiledRule::resource_expression).
pub struct ResourceExpression<T> {
    residual: Residual,
    identity: IdentityContext,
    functions: Arc<FunctionTable<T>>,
}

impl<T> Clone for ResourceExpression<T> {
    fn clone(&self) -> Self {
        Self {
            residual: self.residual.clone(),
            identity: self.identity.clone(),
            functions: Arc::clone(&self.functions),
        }
    }
}

impl<T> fmt::Debug for ResourceExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceExpression")
            .field("residual", &self.residual)
            .field("identity", &self.identity)
            .finish()
    }
}

impl<T> fmt::Display for ResourceExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.residual)
    }
}

impl<T> ResourceExpression<T> {
    pub(crate) fn new(
        residual: Residual,
        identity: IdentityContext,
        functions: Arc<FunctionTable<T>>,
    ) -> Self {
        Self {
            residual,
            identity,
            functions,
        }
    }

    /// The predicate tree.
    pub fn residual(&self) -> &Residual {
        &self.residual
    }

    /// The identity the expression was bound to.
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// `Some(result)` if the predicate does not depend on the resource.
    pub fn as_constant(&self) -> Option<bool> {
        match self.residual.as_constant() {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Render the predicate for a query target.
    pub fn translate<Q: QueryTranslator>(
        &self,
        translator: &mut Q,
    ) -> Result<Q::Output, TranslationError> {
        translator.translate(&self.residual, &self.identity)
    }
}

impl<T: Resource> ResourceExpression<T> {
    /// Evaluate the predicate against one resource.
    pub fn matches(&self, resource: &T) -> EvalResult<bool> {
        self.eval(&self.residual, resource)?.as_bool()
    }

    /// Keep the resources the predicate accepts, in input order.
    pub fn filter<'r, I>(&self, resources: I) -> EvalResult<Vec<&'r T>>
    where
        I: IntoIterator<Item = &'r T>,
        T: 'r,
    {
        let mut kept = Vec::new();
        for resource in resources {
            if self.matches(resource)? {
                kept.push(resource);
            }
        }
        Ok(kept)
    }

    fn eval(&self, residual: &Residual, resource: &T) -> EvalResult<Value> {
        match residual {
            Residual::Constant(value) => Ok(value.clone()),
            Residual::Field(path) => read_field(Some(resource), path),
            Residual::Not(inner) => apply_not(&self.eval(inner, resource)?),
            Residual::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let stop = *op == BinaryOp::Or;
                if self.eval(left, resource)?.as_bool()? == stop {
                    return Ok(Value::Bool(stop));
                }
                Ok(Value::Bool(self.eval(right, resource)?.as_bool()?))
            }
            Residual::Binary { op, left, right } => {
                let left = self.eval(left, resource)?;
                let right = self.eval(right, resource)?;
                apply_binary(*op, &left, &right)
            }
            Residual::Method {
                method,
                target,
                args,
            } => {
                let target = self.eval(target, resource)?;
                let args = self.eval_all(args, resource)?;
                apply_method(*method, &target, &args)
            }
            Residual::Builtin { function, args } => {
                let args = self.eval_all(args, resource)?;
                Ok(Value::Bool(call_builtin(*function, &self.identity, &args)?))
            }
            Residual::Extension(name) => Ok(Value::Bool(call_extension(
                &self.functions,
                name,
                &self.identity,
                Some(resource),
            )?)),
            Residual::Failed(err) => Err(err.clone()),
        }
    }

    fn eval_all(&self, items: &[Residual], resource: &T) -> EvalResult<Vec<Value>> {
        items.iter().map(|r| self.eval(r, resource)).collect()
    }
}
