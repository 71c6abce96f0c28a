//! Rule syntax tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

/// Variables bound by the evaluation contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variable {
    /// Subject identifier, string or null
    UserId,
    /// Role names
    UserRoles,
    /// Claims, seen as `type:value` strings
    UserClaims,
    /// The resource instance (instance rules only)
    Resource,
}

impl Variable {
    /// Resolve an identifier.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "UserId" => Some(Variable::UserId),
            "UserRoles" => Some(Variable::UserRoles),
            "UserClaims" => Some(Variable::UserClaims),
            "Resource" => Some(Variable::Resource),
            _ => None,
        }
    }

    /// Identifier as written in rule text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::UserId => "UserId",
            Variable::UserRoles => "UserRoles",
            Variable::UserClaims => "UserClaims",
            Variable::Resource => "Resource",
        }
    }
}

/// Methods callable with `target.Method(args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// List membership or substring test
    Contains,
    /// String prefix test
    StartsWith,
    /// String suffix test
    EndsWith,
}

impl Method {
    /// Resolve a method name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Contains" => Some(Method::Contains),
            "StartsWith" => Some(Method::StartsWith),
            "EndsWith" => Some(Method::EndsWith),
            _ => None,
        }
    }

    /// Method name as written in rule text.
    pub fn name(&self) -> &'static str {
        match self {
            Method::Contains => "Contains",
            Method::StartsWith => "StartsWith",
            Method::EndsWith => "EndsWith",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `||`, short-circuits on true
    Or,
    /// `&&`, short-circuits on false
    And,
    /// `==`, numeric values compare across int and float
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`, numeric addition or string concatenation
    Add,
}

impl BinaryOp {
    /// Operator token.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
        }
    }

    /// True for `==`, `!=` and the relational operators.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),
    /// Contract variable
    Var(Variable),
    /// Field access: `target.name`
    Member { target: Box<Expr>, name: String },
    /// Free function call: `HasRole("Admin")`
    Call { function: String, args: Vec<Expr> },
    /// Method call: `UserRoles.Contains("Admin")`
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// Logical negation
    Not(Box<Expr>),
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Field path if this is `Resource.a.b...`.
    pub fn resource_path(&self) -> Option<Vec<String>> {
        match self {
            Expr::Member { target, name } => {
                let mut path = match target.as_ref() {
                    Expr::Var(Variable::Resource) => Vec::new(),
                    other => other.resource_path()?,
                };
                path.push(name.clone());
                Some(path)
            }
            _ => None,
        }
    }

    /// Visit every node depth-first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Var(_) => {}
            Expr::Member { target, .. } => target.walk(visit),
            Expr::Call { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            Expr::MethodCall { target, args, .. } => {
                target.walk(visit);
                args.iter().for_each(|a| a.walk(visit));
            }
            Expr::Not(inner) => inner.walk(visit),
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write!(f, "{s:?}"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Var(v) => write!(f, "{}", v.as_str()),
            Expr::Member { target, name } => write!(f, "{target}.{name}"),
            Expr::Call { function, args } => {
                write!(f, "{function}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                write!(f, "{target}.{method}(")?;
                write_args(f, args)?;
                write!(f, ")")
            }
            Expr::Not(inner) => write!(f, "!{inner}"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}
