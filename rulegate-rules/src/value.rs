//! Runtime values and the operator semantics shared by every back end.
//!
//! Both the direct evaluator and the resource-expression residualizer apply
//! operators through the functions in this module, so the two cannot
//! disagree on what an operator means.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::ast::{BinaryOp, Method};
use crate::error::{EvalError, EvalResult};

/// A value in the rule language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Str(String),
    /// Ordered collection
    List(Vec<Value>),
}

impl Value {
    /// Convert a JSON value. Objects have no rule-language representation.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        Some(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64()?)
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect::<Option<_>>()?)
            }
            serde_json::Value::Object(_) => return None,
        })
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Interpret the value as a boolean condition.
    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::TypeMismatch(format!(
                "expected bool, got {}",
                other.type_name()
            ))),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with integer/float promotion.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    fn concat_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Apply a non short-circuiting binary operator.
///
/// `&&` and `||` are accepted too, with both operands already evaluated;
/// callers that need short-circuiting handle the left operand first.
pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    Ok(match op {
        BinaryOp::And => Value::Bool(left.as_bool()? && right.as_bool()?),
        BinaryOp::Or => Value::Bool(left.as_bool()? || right.as_bool()?),
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        // Absent values are unordered: every ordering comparison is false
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
            if matches!(left, Value::Null) || matches!(right, Value::Null) =>
        {
            Value::Bool(false)
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right)?;
            Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
        BinaryOp::Add => add(left, right)?,
    })
}

/// Apply `!`.
pub fn apply_not(operand: &Value) -> EvalResult<Value> {
    Ok(Value::Bool(!operand.as_bool()?))
}

/// Apply a method to an evaluated target and arguments.
pub fn apply_method(method: Method, target: &Value, args: &[Value]) -> EvalResult<Value> {
    let arg = args.first().unwrap_or(&Value::Null);
    let result = match (method, target) {
        (_, Value::Null) => false,
        (Method::Contains, Value::List(items)) => items.iter().any(|item| item.loose_eq(arg)),
        (_, Value::Str(text)) => match arg {
            Value::Null => false,
            Value::Str(needle) => match method {
                Method::Contains => text.contains(needle.as_str()),
                Method::StartsWith => text.starts_with(needle.as_str()),
                Method::EndsWith => text.ends_with(needle.as_str()),
            },
            other => {
                return Err(EvalError::TypeMismatch(format!(
                    "`{}` expects a string argument, got {}",
                    method.name(),
                    other.type_name()
                )))
            }
        },
        (_, other) => {
            return Err(EvalError::TypeMismatch(format!(
                "`{}` is not supported on {}",
                method.name(),
                other.type_name()
            )))
        }
    };
    Ok(Value::Bool(result))
}

fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                EvalError::TypeMismatch("cannot order NaN".to_string())
            }),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot order {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn add(left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a
            .checked_add(*b)
            .map(Value::Int)
            .unwrap_or(Value::Float(*a as f64 + *b as f64))),
        (Value::Str(_), _) | (_, Value::Str(_)) => {
            if matches!(left, Value::List(_)) || matches!(right, Value::List(_)) {
                return Err(EvalError::TypeMismatch("cannot concatenate a list".to_string()));
            }
            Ok(Value::Str(left.concat_text() + &right.concat_text()))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot add {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}
