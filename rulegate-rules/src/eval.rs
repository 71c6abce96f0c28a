//! Tree-walking evaluator for bound rules.

use rulegate_identity::IdentityContext;

use crate::ast::{BinaryOp, Variable};
use crate::compiler::Node;
use crate::error::{EvalError, EvalResult};
use crate::functions::{Builtin, Function, FunctionTable};
use crate::resource::Resource;
use crate::value::{apply_binary, apply_method, apply_not, Value};

/// Value of an identity variable.
pub(crate) fn identity_value(var: Variable, identity: &IdentityContext) -> EvalResult<Value> {
    match var {
        Variable::UserId => Ok(identity.subject_id().into()),
        Variable::UserRoles => Ok(Value::List(
            identity.roles().iter().cloned().map(Value::Str).collect(),
        )),
        Variable::UserClaims => Ok(Value::List(
            identity
                .flattened_claims()
                .into_iter()
                .map(Value::Str)
                .collect(),
        )),
        Variable::Resource => Err(EvalError::ResourceUnbound),
    }
}

/// Apply a built-in to evaluated arguments.
pub(crate) fn call_builtin(
    builtin: Builtin,
    identity: &IdentityContext,
    args: &[Value],
) -> EvalResult<bool> {
    let text = |index: usize| text_arg(builtin, args, index);

    match builtin {
        Builtin::HasRole => Ok(text(0)?.is_some_and(|role| identity.has_role(role))),
        Builtin::HasClaim => match (text(0)?, text(1)?) {
            (Some(claim_type), Some(value)) => Ok(identity.has_claim(claim_type, value)),
            _ => Ok(false),
        },
    }
}

fn text_arg(builtin: Builtin, args: &[Value], index: usize) -> EvalResult<Option<&str>> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(Some(s.as_str())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(EvalError::TypeMismatch(format!(
            "`{}` expects string arguments, got {}",
            builtin.name(),
            other.type_name()
        ))),
    }
}

/// Invoke an extension function.
pub(crate) fn call_extension<T>(
    functions: &FunctionTable<T>,
    name: &str,
    identity: &IdentityContext,
    resource: Option<&T>,
) -> EvalResult<bool> {
    let wrap = |source| EvalError::Function {
        name: name.to_string(),
        source,
    };
    match functions.get(name) {
        Some(Function::Generic(f)) => f(identity).map_err(wrap),
        Some(Function::Instance(f)) => {
            let resource = resource.ok_or(EvalError::ResourceUnbound)?;
            f(identity, resource).map_err(wrap)
        }
        None => Err(wrap(crate::FunctionError::new("not registered"))),
    }
}

pub(crate) fn read_field<T: Resource>(resource: Option<&T>, path: &[String]) -> EvalResult<Value> {
    let resource = resource.ok_or(EvalError::ResourceUnbound)?;
    resource
        .field(path)
        .ok_or_else(|| EvalError::FieldNotFound(path.join(".")))
}

/// Evaluates a bound tree against an identity and an optional resource.
pub(crate) struct Evaluator<'a, T> {
    identity: &'a IdentityContext,
    resource: Option<&'a T>,
    functions: &'a FunctionTable<T>,
}

impl<'a, T: Resource> Evaluator<'a, T> {
    pub(crate) fn new(
        identity: &'a IdentityContext,
        resource: Option<&'a T>,
        functions: &'a FunctionTable<T>,
    ) -> Self {
        Self {
            identity,
            resource,
            functions,
        }
    }

    pub(crate) fn eval(&self, node: &Node) -> EvalResult<Value> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Identity(var) => identity_value(*var, self.identity),
            Node::Field(path) => read_field(self.resource, path),
            Node::Builtin { function, args } => {
                let args = self.eval_all(args)?;
                Ok(Value::Bool(call_builtin(*function, self.identity, &args)?))
            }
            Node::Extension { name, .. } => Ok(Value::Bool(call_extension(
                self.functions,
                name,
                self.identity,
                self.resource,
            )?)),
            Node::Method {
                method,
                target,
                args,
            } => {
                let target = self.eval(target)?;
                let args = self.eval_all(args)?;
                apply_method(*method, &target, &args)
            }
            Node::Not(inner) => apply_not(&self.eval(inner)?),
            Node::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                if !self.eval(left)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.as_bool()?))
            }
            Node::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                if self.eval(left)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.as_bool()?))
            }
            Node::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_binary(*op, &left, &right)
            }
        }
    }

    fn eval_all(&self, nodes: &[Node]) -> EvalResult<Vec<Value>> {
        nodes.iter().map(|n| self.eval(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_values() {
        let ctx = IdentityContext::new(None)
            .with_role("B")
            .with_role("A")
            .with_claim("team", "X");

        assert_eq!(identity_value(Variable::UserId, &ctx).unwrap(), Value::Null);
        assert_eq!(
            identity_value(Variable::UserRoles, &ctx).unwrap(),
            Value::from(vec!["A", "B"])
        );
        assert_eq!(
            identity_value(Variable::UserClaims, &ctx).unwrap(),
            Value::from(vec!["team:X"])
        );
    }

    #[test]
    fn test_builtins_with_null_arguments() {
        let ctx = IdentityContext::new(None).with_role("Admin");
        assert!(call_builtin(Builtin::HasRole, &ctx, &["Admin".into()]).unwrap());
        assert!(!call_builtin(Builtin::HasRole, &ctx, &[Value::Null]).unwrap());
        assert!(!call_builtin(Builtin::HasClaim, &ctx, &["team".into(), Value::Null]).unwrap());
        assert!(call_builtin(Builtin::HasRole, &ctx, &[Value::Int(1)]).is_err());
    }
}
