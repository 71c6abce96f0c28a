//! Query translation for resource expressions.
//!
//! A [`QueryTranslator`] turns a [`Residual`] predicate into something a
//! data store can execute. [`SqlTranslator`] renders a parameterized SQL
//! `WHERE` clause; other backends implement the trait themselves.

use std::collections::BTreeMap;

use rulegate_identity::IdentityContext;

use crate::ast::{BinaryOp, Method};
use crate::error::TranslationError;
use crate::expression::Residual;
use crate::functions::Builtin;
use crate::value::Value;

/// Renders resource predicates for a query backend.
///
/// Implementations must preserve the in-memory semantics of the residual or
/// refuse with a [`TranslationError`]; a partial translation is never valid.
pub trait QueryTranslator {
    /// Translated predicate.
    type Output;

    /// Translate `expr`, which was bound to `identity`.
    fn translate(
        &mut self,
        expr: &Residual,
        identity: &IdentityContext,
    ) -> Result<Self::Output, TranslationError>;
}

/// Bind parameter syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` (SQLite, MySQL)
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

/// A parameterized SQL predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    /// Boolean SQL expression for a `WHERE` clause.
    pub clause: String,
    /// Bind parameters in placeholder order.
    pub params: Vec<Value>,
}

/// Translates resource expressions to SQL.
///
/// Resource paths map to columns through [`with_column`](Self::with_column);
/// unmapped paths use the dotted path verbatim unless the translator is
/// [`strict`](Self::strict).
///
/// Every clause is TRUE exactly for the rows the in-memory evaluation
/// accepts; a NULL result only ever stands for "rejected". Negation wraps its
/// operand in `COALESCE(.., FALSE)` and column-to-column equality treats two
/// NULLs as equal, so SQL's three-valued logic never admits an extra row.
///
/// `Contains`, `StartsWith` and `EndsWith` become `LIKE`, which is
/// case-sensitive on PostgreSQL but not under the default collations of
/// SQLite and MySQL. Use a binary collation (or
/// `PRAGMA case_sensitive_like = ON`) there to keep the rule's
/// case-sensitive matching.
///
/// # Example
///
/// ```
/// use rulegate_identity::IdentityContext;
/// use rulegate_rules::{BinaryOp, QueryTranslator, Residual, SqlTranslator, Value};
///
/// let residual = Residual::Binary {
///     op: BinaryOp::Eq,
///     left: Box::new(Residual::Field(vec!["Coach".into(), "Name".into()])),
///     right: Box::new(Residual::Constant(Value::from("Luigi"))),
/// };
/// let mut sql = SqlTranslator::new().with_column("Coach.Name", "coach_name");
/// let filter = sql.translate(&residual, &IdentityContext::new(None)).unwrap();
/// assert_eq!(filter.clause, "coach_name = ?");
/// assert_eq!(filter.params, vec![Value::from("Luigi")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SqlTranslator {
    columns: BTreeMap<String, String>,
    placeholder: Placeholder,
    strict: bool,
    params: Vec<Value>,
}

const ALWAYS: &str = "1 = 1";
const NEVER: &str = "1 = 0";

impl SqlTranslator {
    /// Create a translator with no column mappings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the dotted resource path to a column.
    pub fn with_column(mut self, path: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(path.into(), column.into());
        self
    }

    /// Set the bind parameter syntax.
    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Reject resource paths without a column mapping.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn column(&self, path: &[String]) -> Result<String, TranslationError> {
        let dotted = path.join(".");
        match self.columns.get(&dotted) {
            Some(column) => Ok(column.clone()),
            None if self.strict => Err(TranslationError::UnmappedField(dotted)),
            None => Ok(dotted),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        match self.placeholder {
            Placeholder::Question => "?".to_string(),
            Placeholder::Numbered => format!("${}", self.params.len()),
        }
    }

    /// `operand IN (values)`; the operand is rendered only for a non-empty
    /// list so no parameters leak into an always-false clause.
    fn membership(&mut self, operand: &Residual, values: Vec<Value>) -> Result<String, TranslationError> {
        if values.is_empty() {
            return Ok(NEVER.to_string());
        }
        let operand = self.operand(operand)?;
        let placeholders: Vec<_> = values.into_iter().map(|v| self.bind(v)).collect();
        Ok(format!("{operand} IN ({})", placeholders.join(", ")))
    }

    fn predicate(
        &mut self,
        expr: &Residual,
        identity: &IdentityContext,
    ) -> Result<String, TranslationError> {
        match expr {
            Residual::Constant(Value::Bool(true)) => Ok(ALWAYS.to_string()),
            Residual::Constant(Value::Bool(false)) => Ok(NEVER.to_string()),
            Residual::Constant(other) => Err(unsupported(format!(
                "{} used as a condition",
                other.type_name()
            ))),
            Residual::Field(path) => {
                let column = self.column(path)?;
                let value = self.bind(Value::Bool(true));
                Ok(format!("{column} = {value}"))
            }
            Residual::Not(inner) => Ok(format!(
                "NOT COALESCE({}, FALSE)",
                self.predicate(inner, identity)?
            )),
            Residual::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => self.logical(*op, left, right, identity),
                op if op.is_comparison() => self.comparison(*op, left, right),
                _ => Err(unsupported(format!("`{}` used as a condition", op.symbol()))),
            },
            Residual::Method {
                method,
                target,
                args,
            } => self.method(*method, target, args),
            Residual::Builtin { function, args } => self.builtin(*function, args, identity),
            Residual::Extension(name) => Err(TranslationError::UnsupportedFunction(name.clone())),
            Residual::Failed(err) => Err(TranslationError::FailedTerm(err.clone())),
        }
    }

    fn logical(
        &mut self,
        op: BinaryOp,
        left: &Residual,
        right: &Residual,
        identity: &IdentityContext,
    ) -> Result<String, TranslationError> {
        let stop = op == BinaryOp::Or;
        if let Some(Value::Bool(b)) = left.as_constant() {
            return if *b == stop {
                Ok((if stop { ALWAYS } else { NEVER }).to_string())
            } else {
                self.predicate(right, identity)
            };
        }
        let keyword = if stop { "OR" } else { "AND" };
        let left = self.predicate(left, identity)?;
        let right = self.predicate(right, identity)?;
        Ok(format!("({left} {keyword} {right})"))
    }

    fn comparison(
        &mut self,
        op: BinaryOp,
        left: &Residual,
        right: &Residual,
    ) -> Result<String, TranslationError> {
        let null_side = match (left.as_constant(), right.as_constant()) {
            (_, Some(Value::Null)) => Some(left),
            (Some(Value::Null), _) => Some(right),
            _ => None,
        };
        if let Some(other) = null_side {
            return match op {
                BinaryOp::Eq => Ok(format!("{} IS NULL", self.operand(other)?)),
                BinaryOp::Ne => Ok(format!("{} IS NOT NULL", self.operand(other)?)),
                // Absent values are unordered
                _ => Ok(NEVER.to_string()),
            };
        }

        let both_dynamic = left.as_constant().is_none() && right.as_constant().is_none();
        if both_dynamic && matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let equal = self.null_safe_eq(left, right)?;
            return Ok(match op {
                BinaryOp::Eq => equal,
                _ => format!("NOT COALESCE({equal}, FALSE)"),
            });
        }

        let l = self.operand(left)?;
        let r = self.operand(right)?;
        let symbol = match op {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            _ => return Err(unsupported(format!("`{}` as a comparison", op.symbol()))),
        };
        if op != BinaryOp::Ne {
            return Ok(format!("{l} {symbol} {r}"));
        }

        // A null column is unequal to every non-null value
        let mut clause = format!("{l} <> {r}");
        for (residual, sql) in [(left, &l), (right, &r)] {
            if matches!(residual, Residual::Field(_)) {
                clause.push_str(&format!(" OR {sql} IS NULL"));
            }
        }
        Ok(format!("({clause})"))
    }

    /// `left = right`, with two NULLs equal.
    fn null_safe_eq(&mut self, left: &Residual, right: &Residual) -> Result<String, TranslationError> {
        // Operands are rendered twice so placeholders stay in textual order
        let l = self.operand(left)?;
        let r = self.operand(right)?;
        let l_null = self.operand(left)?;
        let r_null = self.operand(right)?;
        Ok(format!(
            "({l} = {r} OR ({l_null} IS NULL AND {r_null} IS NULL))"
        ))
    }

    fn method(
        &mut self,
        method: Method,
        target: &Residual,
        args: &[Residual],
    ) -> Result<String, TranslationError> {
        let arg = args
            .first()
            .ok_or_else(|| unsupported(format!("`{}` without an argument", method.name())))?;

        match (method, target.as_constant(), arg.as_constant()) {
            (_, Some(Value::Null), _) | (_, _, Some(Value::Null)) => Ok(NEVER.to_string()),
            (Method::Contains, Some(Value::List(items)), None) => {
                let items = items.iter().filter(|v| **v != Value::Null).cloned().collect();
                self.membership(arg, items)
            }
            (_, None, Some(Value::Str(text))) => {
                let operand = self.operand(target)?;
                let escaped = escape_like(text);
                let pattern = match method {
                    Method::Contains => format!("%{escaped}%"),
                    Method::StartsWith => format!("{escaped}%"),
                    Method::EndsWith => format!("%{escaped}"),
                };
                let value = self.bind(Value::Str(pattern));
                Ok(format!("{operand} LIKE {value} ESCAPE '\\'"))
            }
            _ => Err(unsupported(format!(
                "`{}` with a resource-dependent {}",
                method.name(),
                if target.as_constant().is_some() {
                    "argument"
                } else {
                    "pattern"
                }
            ))),
        }
    }

    fn builtin(
        &mut self,
        function: Builtin,
        args: &[Residual],
        identity: &IdentityContext,
    ) -> Result<String, TranslationError> {
        match (function, args) {
            (Builtin::HasRole, [role]) => {
                let roles = identity.roles().iter().cloned().map(Value::Str).collect();
                self.membership(role, roles)
            }
            (Builtin::HasClaim, [claim_type, value]) => match claim_type.as_constant() {
                Some(Value::Str(claim_type)) => {
                    let values = identity
                        .claim_values(claim_type)
                        .iter()
                        .cloned()
                        .map(Value::Str)
                        .collect();
                    self.membership(value, values)
                }
                Some(_) => Ok(NEVER.to_string()),
                None => Err(TranslationError::UnsupportedFunction(format!(
                    "{} with a resource-dependent claim type",
                    function.name()
                ))),
            },
            _ => Err(TranslationError::UnsupportedFunction(function.name().to_string())),
        }
    }

    fn operand(&mut self, expr: &Residual) -> Result<String, TranslationError> {
        match expr {
            Residual::Field(path) => self.column(path),
            Residual::Constant(Value::List(_)) => {
                Err(unsupported("list used as a scalar".to_string()))
            }
            Residual::Constant(value) => Ok(self.bind(value.clone())),
            Residual::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } => self.addition(left, right),
            Residual::Failed(err) => Err(TranslationError::FailedTerm(err.clone())),
            other => Err(unsupported(format!("`{other}` used as a value"))),
        }
    }

    fn addition(&mut self, left: &Residual, right: &Residual) -> Result<String, TranslationError> {
        let is = |r: &Residual, f: fn(&Value) -> bool| r.as_constant().is_some_and(f);
        let text = |v: &Value| matches!(v, Value::Str(_));
        let number = |v: &Value| matches!(v, Value::Int(_) | Value::Float(_));

        if is(left, text) || is(right, text) {
            // Null concatenates as the empty string
            let l = self.text_operand(left)?;
            let r = self.text_operand(right)?;
            Ok(format!("({l} || {r})"))
        } else if is(left, number) || is(right, number) {
            let l = self.operand(left)?;
            let r = self.operand(right)?;
            Ok(format!("({l} + {r})"))
        } else {
            Err(unsupported(
                "`+` needs a constant operand to pick string or numeric addition".to_string(),
            ))
        }
    }

    fn text_operand(&mut self, expr: &Residual) -> Result<String, TranslationError> {
        match expr {
            Residual::Constant(Value::Null) => Ok(self.bind(Value::from(""))),
            Residual::Constant(value) => Ok(self.bind(Value::Str(value.to_string()))),
            Residual::Field(_) => Ok(format!("COALESCE({}, '')", self.operand(expr)?)),
            other => self.operand(other),
        }
    }
}

impl QueryTranslator for SqlTranslator {
    type Output = SqlFilter;

    fn translate(
        &mut self,
        expr: &Residual,
        identity: &IdentityContext,
    ) -> Result<SqlFilter, TranslationError> {
        self.params.clear();
        let clause = self.predicate(expr, identity)?;
        Ok(SqlFilter {
            clause,
            params: std::mem::take(&mut self.params),
        })
    }
}

fn unsupported(message: String) -> TranslationError {
    TranslationError::UnsupportedOperation(message)
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
