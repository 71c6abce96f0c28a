//! Rule compiler: parses rule text and binds it against the variable and
//! function contract.
//!
//! Binding resolves every name, checks arity, rejects operand types that can
//! never be valid and enforces scope (`Resource` and instance functions are
//! unavailable in generic rules). The result is a [`CompiledRule`] holding the
//! bound [`Node`] tree, which is the single source of truth for both direct
//! evaluation and resource-expression construction.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rulegate_identity::IdentityContext;

use crate::ast::{BinaryOp, Expr, Method, Variable};
use crate::error::{EvalResult, RuleError, RuleResult};
use crate::eval::Evaluator;
use crate::expression::{residualize, ResourceExpression};
use crate::functions::{Builtin, Function, FunctionTable};
use crate::parser::parse_rule;
use crate::resource::Resource;
use crate::value::Value;

/// Whether a rule is evaluated with or without a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Identity only; `Resource` is not bound.
    #[default]
    Generic,
    /// Identity and a resource instance.
    Instance,
}

/// Bound rule tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal value
    Literal(Value),
    /// `UserId`, `UserRoles` or `UserClaims`
    Identity(Variable),
    /// `Resource.a.b`
    Field(Vec<String>),
    /// Built-in function call
    Builtin { function: Builtin, args: Vec<Node> },
    /// Extension function call
    Extension { name: String, needs_resource: bool },
    /// Method call
    Method {
        method: Method,
        target: Box<Node>,
        args: Vec<Node>,
    },
    /// Logical negation
    Not(Box<Node>),
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Static type used while binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ty {
    Bool,
    Number,
    Str,
    List,
    Null,
    /// Resource fields and anything derived from them
    Any,
}

impl Ty {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Ty::Null,
            Value::Bool(_) => Ty::Bool,
            Value::Int(_) | Value::Float(_) => Ty::Number,
            Value::Str(_) => Ty::Str,
            Value::List(_) => Ty::List,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Ty::Bool => "bool",
            Ty::Number => "number",
            Ty::Str => "string",
            Ty::List => "list",
            Ty::Null => "null",
            Ty::Any => "resource value",
        }
    }

    fn is_boolish(&self) -> bool {
        matches!(self, Ty::Bool | Ty::Any)
    }

    fn is_textish(&self) -> bool {
        matches!(self, Ty::Str | Ty::Any | Ty::Null)
    }
}

fn mismatch(message: String) -> RuleError {
    RuleError::TypeMismatch(message)
}

/// Compiles rule text for one resource type.
pub struct RuleCompiler<T> {
    functions: Arc<FunctionTable<T>>,
}

impl<T> Clone for RuleCompiler<T> {
    fn clone(&self) -> Self {
        Self {
            functions: Arc::clone(&self.functions),
        }
    }
}

impl<T> fmt::Debug for RuleCompiler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCompiler")
            .field("functions", &self.functions)
            .finish()
    }
}

impl<T> Default for RuleCompiler<T> {
    fn default() -> Self {
        Self::new(Arc::new(FunctionTable::new()))
    }
}

impl<T> RuleCompiler<T> {
    /// Create a compiler over a frozen function table.
    pub fn new(functions: Arc<FunctionTable<T>>) -> Self {
        Self { functions }
    }

    /// Extension functions visible to this compiler.
    pub fn functions(&self) -> &FunctionTable<T> {
        &self.functions
    }

    /// Compile rule text.
    ///
    /// # Errors
    ///
    /// Any [`RuleError`]: grammar errors, unknown names, arity, impossible
    /// types, or scope violations.
    pub fn compile(&self, source: &str, scope: RuleScope) -> RuleResult<CompiledRule<T>> {
        let expr = parse_rule(source)?;
        let binder = Binder {
            functions: &self.functions,
            scope,
        };
        let (program, ty) = binder.bind(&expr)?;
        if !ty.is_boolish() {
            return Err(mismatch(format!("rule must produce a bool, got {}", ty.name())));
        }

        let mut references_resource = false;
        expr.walk(&mut |node| {
            if matches!(node, Expr::Var(Variable::Resource)) {
                references_resource = true;
            }
        });

        debug!(rule = source, ?scope, "Compiled rule");
        Ok(CompiledRule {
            source: source.to_string(),
            scope,
            program,
            references_resource,
            functions: Arc::clone(&self.functions),
        })
    }
}

struct Binder<'a, T> {
    functions: &'a FunctionTable<T>,
    scope: RuleScope,
}

impl<T> Binder<'_, T> {
    fn bind(&self, expr: &Expr) -> RuleResult<(Node, Ty)> {
        match expr {
            Expr::Literal(value) => Ok((Node::Literal(value.clone()), Ty::of(value))),
            Expr::Var(Variable::Resource) => {
                self.require_instance("Resource")?;
                Err(RuleError::InvalidMemberAccess(
                    "`Resource` must be followed by a field".to_string(),
                ))
            }
            Expr::Var(var @ Variable::UserId) => Ok((Node::Identity(*var), Ty::Str)),
            Expr::Var(var) => Ok((Node::Identity(*var), Ty::List)),
            Expr::Member { .. } => {
                let path = expr
                    .resource_path()
                    .ok_or_else(|| RuleError::InvalidMemberAccess(expr.to_string()))?;
                self.require_instance("Resource")?;
                Ok((Node::Field(path), Ty::Any))
            }
            Expr::Call { function, args } => self.bind_call(function, args),
            Expr::MethodCall {
                target,
                method,
                args,
            } => self.bind_method(target, method, args),
            Expr::Not(inner) => {
                let (node, ty) = self.bind(inner)?;
                if !ty.is_boolish() {
                    return Err(mismatch(format!("`!` requires a bool, got {}", ty.name())));
                }
                Ok((Node::Not(Box::new(node)), Ty::Bool))
            }
            Expr::Binary { op, left, right } => {
                let (left, lt) = self.bind(left)?;
                let (right, rt) = self.bind(right)?;
                let ty = binary_type(*op, lt, rt)?;
                Ok((
                    Node::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                ))
            }
        }
    }

    fn require_instance(&self, what: &str) -> RuleResult<()> {
        match self.scope {
            RuleScope::Instance => Ok(()),
            RuleScope::Generic => Err(RuleError::ResourceUnavailable(what.to_string())),
        }
    }

    fn bind_call(&self, function: &str, args: &[Expr]) -> RuleResult<(Node, Ty)> {
        if let Some(builtin) = Builtin::parse(function) {
            check_arity(function, builtin.arity(), args.len())?;
            let mut bound = Vec::with_capacity(args.len());
            for arg in args {
                let (node, ty) = self.bind(arg)?;
                if !ty.is_textish() {
                    return Err(mismatch(format!(
                        "`{function}` expects string arguments, got {}",
                        ty.name()
                    )));
                }
                bound.push(node);
            }
            return Ok((
                Node::Builtin {
                    function: builtin,
                    args: bound,
                },
                Ty::Bool,
            ));
        }

        let extension = self
            .functions
            .get(function)
            .ok_or_else(|| RuleError::UnknownFunction(function.to_string()))?;
        check_arity(function, 0, args.len())?;
        if let Function::Instance(_) = extension {
            self.require_instance(function)?;
        }
        Ok((
            Node::Extension {
                name: function.to_string(),
                needs_resource: extension.needs_resource(),
            },
            Ty::Bool,
        ))
    }

    fn bind_method(&self, target: &Expr, method: &str, args: &[Expr]) -> RuleResult<(Node, Ty)> {
        let resolved =
            Method::parse(method).ok_or_else(|| RuleError::UnknownMethod(method.to_string()))?;
        check_arity(method, 1, args.len())?;
        let (target, target_ty) = self.bind(target)?;
        let (arg, arg_ty) = self.bind(&args[0])?;

        let target_ok = match resolved {
            Method::Contains => target_ty == Ty::List || target_ty.is_textish(),
            Method::StartsWith | Method::EndsWith => target_ty.is_textish(),
        };
        if !target_ok {
            return Err(mismatch(format!(
                "`{method}` is not supported on {}",
                target_ty.name()
            )));
        }
        if target_ty != Ty::List && target_ty != Ty::Any && !arg_ty.is_textish() {
            return Err(mismatch(format!(
                "`{method}` expects a string argument, got {}",
                arg_ty.name()
            )));
        }

        Ok((
            Node::Method {
                method: resolved,
                target: Box::new(target),
                args: vec![arg],
            },
            Ty::Bool,
        ))
    }
}

fn check_arity(name: &str, expected: usize, found: usize) -> RuleResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(RuleError::Arity {
            name: name.to_string(),
            expected,
            found,
        })
    }
}

fn binary_type(op: BinaryOp, left: Ty, right: Ty) -> RuleResult<Ty> {
    let operator = op.symbol();
    match op {
        BinaryOp::And | BinaryOp::Or => {
            if left.is_boolish() && right.is_boolish() {
                Ok(Ty::Bool)
            } else {
                Err(mismatch(format!(
                    "`{operator}` requires bool operands, got {} and {}",
                    left.name(),
                    right.name()
                )))
            }
        }
        BinaryOp::Eq | BinaryOp::Ne => Ok(Ty::Bool),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let orderable = |ty: Ty| matches!(ty, Ty::Number | Ty::Str | Ty::Any);
            let compatible = left == right || left == Ty::Any || right == Ty::Any;
            if orderable(left) && orderable(right) && compatible {
                Ok(Ty::Bool)
            } else {
                Err(mismatch(format!(
                    "cannot order {} and {}",
                    left.name(),
                    right.name()
                )))
            }
        }
        BinaryOp::Add => match (left, right) {
            (Ty::List | Ty::Bool, _) | (_, Ty::List | Ty::Bool) => Err(mismatch(format!(
                "cannot add {} and {}",
                left.name(),
                right.name()
            ))),
            (Ty::Str, _) | (_, Ty::Str) => Ok(Ty::Str),
            (Ty::Number, Ty::Number) => Ok(Ty::Number),
            (Ty::Any, _) | (_, Ty::Any) => Ok(Ty::Any),
            _ => Err(mismatch(format!(
                "cannot add {} and {}",
                left.name(),
                right.name()
            ))),
        },
    }
}

/// A rule compiled once and shared by every evaluation of its action.
pub struct CompiledRule<T> {
    source: String,
    scope: RuleScope,
    program: Node,
    references_resource: bool,
    functions: Arc<FunctionTable<T>>,
}

impl<T> fmt::Debug for CompiledRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRule")
            .field("source", &self.source)
            .field("scope", &self.scope)
            .field("program", &self.program)
            .finish()
    }
}

impl<T> CompiledRule<T> {
    /// Original rule text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Scope the rule was compiled for.
    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    /// Bound rule tree.
    pub fn program(&self) -> &Node {
        &self.program
    }

    /// True if the rule text mentions `Resource`.
    pub fn references_resource(&self) -> bool {
        self.references_resource
    }
}

impl<T: Resource> CompiledRule<T> {
    /// Evaluate with an optional resource.
    pub fn evaluate(&self, identity: &IdentityContext, resource: Option<&T>) -> EvalResult<bool> {
        Evaluator::new(identity, resource, &self.functions)
            .eval(&self.program)?
            .as_bool()
    }

    /// Evaluate as a generic predicate `(identity) -> bool`.
    pub fn evaluate_generic(&self, identity: &IdentityContext) -> EvalResult<bool> {
        self.evaluate(identity, None)
    }

    /// Evaluate as an instance predicate `(identity, resource) -> bool`.
    pub fn evaluate_instance(&self, identity: &IdentityContext, resource: &T) -> EvalResult<bool> {
        self.evaluate(identity, Some(resource))
    }

    /// Bind the identity and return the predicate over the resource.
    ///
    /// Identity-only subexpressions (including generic extension functions)
    /// are evaluated here; what remains references only `Resource`. A failing
    /// identity-only term is kept and raised by
    /// [`ResourceExpression::matches`] when evaluation reaches it.
    pub fn resource_expression(&self, identity: IdentityContext) -> ResourceExpression<T> {
        let residual = residualize(&self.program, &identity, &self.functions);
        ResourceExpression::new(residual, identity, Arc::clone(&self.functions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FunctionError;
    use serde_json::json;

    fn compiler() -> RuleCompiler<serde_json::Value> {
        let mut functions = FunctionTable::new();
        functions
            .register_instance("IsCaptain", |ctx, team: &serde_json::Value| {
                Ok(team["Captain"].as_str() == ctx.subject_id())
            })
            .unwrap();
        functions
            .register_generic("IsStaff", |ctx| Ok(ctx.has_claim("staff", "yes")))
            .unwrap();
        RuleCompiler::new(Arc::new(functions))
    }

    #[test]
    fn test_compile_and_evaluate_generic() {
        let rule = compiler()
            .compile(r#"HasRole("Manager") || IsStaff()"#, RuleScope::Generic)
            .unwrap();
        assert!(!rule.references_resource());

        let nobody = IdentityContext::new(None);
        let manager = IdentityContext::new(None).with_role("Manager");
        let staff = IdentityContext::new(None).with_claim("staff", "yes");
        assert!(!rule.evaluate_generic(&nobody).unwrap());
        assert!(rule.evaluate_generic(&manager).unwrap());
        assert!(rule.evaluate_generic(&staff).unwrap());
    }

    #[test]
    fn test_compile_and_evaluate_instance() {
        let rule = compiler()
            .compile(
                r#"Resource.Coach.Name == UserId || UserClaims.Contains("TeamCoach:" + Resource.Name)"#,
                RuleScope::Instance,
            )
            .unwrap();
        assert!(rule.references_resource());

        let team = json!({ "Name": "Team C", "Coach": { "Name": "Mario" } });
        let luigi = IdentityContext::new(Some("Luigi".into())).with_claim("TeamCoach", "Team C");
        let mario = IdentityContext::new(Some("Mario".into()));
        let peach = IdentityContext::new(Some("Peach".into()));
        assert!(rule.evaluate_instance(&luigi, &team).unwrap());
        assert!(rule.evaluate_instance(&mario, &team).unwrap());
        assert!(!rule.evaluate_instance(&peach, &team).unwrap());
    }

    #[test]
    fn test_generic_scope_rejects_resource() {
        let c = compiler();
        assert_eq!(
            c.compile("Resource.Name == \"x\"", RuleScope::Generic).unwrap_err(),
            RuleError::ResourceUnavailable("Resource".into())
        );
        assert_eq!(
            c.compile("IsCaptain()", RuleScope::Generic).unwrap_err(),
            RuleError::ResourceUnavailable("IsCaptain".into())
        );
        assert!(c.compile("IsCaptain()", RuleScope::Instance).is_ok());
    }

    #[test]
    fn test_binding_errors() {
        let c = compiler();
        let cases = [
            ("IsAdmin()", RuleError::UnknownFunction("IsAdmin".into())),
            (
                "HasRole()",
                RuleError::Arity {
                    name: "HasRole".into(),
                    expected: 1,
                    found: 0,
                },
            ),
            (
                "IsStaff(1)",
                RuleError::Arity {
                    name: "IsStaff".into(),
                    expected: 0,
                    found: 1,
                },
            ),
            ("UserRoles.Count(1)", RuleError::UnknownMethod("Count".into())),
        ];
        for (source, expected) in cases {
            assert_eq!(c.compile(source, RuleScope::Instance).unwrap_err(), expected, "{source}");
        }

        for source in [
            "UserRoles",
            "1 + 2",
            "UserRoles > 1",
            "!\"text\"",
            "HasRole(1)",
            "true && 3",
            "UserId.StartsWith(2)",
            "UserRoles + \"x\"",
        ] {
            assert!(
                matches!(c.compile(source, RuleScope::Instance), Err(RuleError::TypeMismatch(_))),
                "{source}"
            );
        }

        assert!(matches!(
            c.compile("Resource", RuleScope::Instance),
            Err(RuleError::InvalidMemberAccess(_))
        ));
        assert!(matches!(
            c.compile("UserId.Length == 3", RuleScope::Instance),
            Err(RuleError::InvalidMemberAccess(_))
        ));
    }

    #[test]
    fn test_runtime_failures() {
        let mut functions = FunctionTable::<serde_json::Value>::new();
        functions
            .register_instance("Explodes", |_, _| Err(FunctionError::new("boom")))
            .unwrap();
        let c = RuleCompiler::new(Arc::new(functions));
        let ctx = IdentityContext::new(None);

        let rule = c.compile("Explodes()", RuleScope::Instance).unwrap();
        let err = rule.evaluate_instance(&ctx, &json!({})).unwrap_err();
        assert!(matches!(err, crate::EvalError::Function { ref name, .. } if name == "Explodes"));

        let rule = c.compile("Resource.Missing == 1", RuleScope::Instance).unwrap();
        assert_eq!(
            rule.evaluate_instance(&ctx, &json!({})).unwrap_err(),
            crate::EvalError::FieldNotFound("Missing".into())
        );
        assert_eq!(
            rule.evaluate_generic(&ctx).unwrap_err(),
            crate::EvalError::ResourceUnbound
        );
    }

    #[test]
    fn test_short_circuit_skips_failing_branch() {
        let mut functions = FunctionTable::<serde_json::Value>::new();
        functions
            .register_generic("Explodes", |_| Err(FunctionError::new("boom")))
            .unwrap();
        let c = RuleCompiler::new(Arc::new(functions));
        let ctx = IdentityContext::new(None);

        let rule = c.compile("false && Explodes()", RuleScope::Generic).unwrap();
        assert!(!rule.evaluate_generic(&ctx).unwrap());
        let rule = c.compile("true || Explodes()", RuleScope::Generic).unwrap();
        assert!(rule.evaluate_generic(&ctx).unwrap());
    }
}
