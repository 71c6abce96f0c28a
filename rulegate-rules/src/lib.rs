//! # Rulegate Rules
//!
//! The authorization rule language: lexer, parser, binder, evaluator and
//! resource-expression pushdown.
//!
//! ## Overview
//!
//! - **Rule text**: boolean expressions over `UserId`, `UserRoles`,
//!   `UserClaims` and `Resource.<path>`
//! - **RuleCompiler**: parses and binds rule text against the built-ins and a
//!   [`FunctionTable`] of extension functions
//! - **CompiledRule**: evaluates directly, or binds an identity and yields a
//!   [`ResourceExpression`]
//! - **QueryTranslator**: renders resource expressions for a data store
//!   ([`SqlTranslator`] ships here)
//!
//! ## Grammar
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := comparison ( "&&" comparison )*
//! comparison := additive ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) additive )?
//! additive   := unary ( "+" unary )*
//! unary      := "!" unary | "-" number | postfix
//! postfix    := primary ( "." ident ( "(" args ")" )? )*
//! primary    := literal | ident | ident "(" args ")" | "(" or ")"
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use rulegate_identity::IdentityContext;
//! use rulegate_rules::{FunctionTable, RuleCompiler, RuleScope};
//! use serde_json::json;
//!
//! let compiler = RuleCompiler::<serde_json::Value>::new(Arc::new(FunctionTable::new()));
//! let rule = compiler
//!     .compile(r#"HasRole("Admin") || Resource.Owner == UserId"#, RuleScope::Instance)
//!     .unwrap();
//!
//! let mario = IdentityContext::new(Some("Mario".into()));
//! assert!(rule.evaluate_instance(&mario, &json!({ "Owner": "Mario" })).unwrap());
//!
//! let expression = rule.resource_expression(mario);
//! assert_eq!(expression.to_string(), r#"(false || (Resource.Owner == "Mario"))"#);
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
mod eval;
pub mod expression;
pub mod functions;
mod lexer;
pub mod parser;
pub mod resource;
pub mod translate;
pub mod value;

// Re-export main types for convenience
pub use ast::{BinaryOp, Expr, Method, Variable};
pub use compiler::{CompiledRule, Node, RuleCompiler, RuleScope};
pub use error::{EvalError, EvalResult, FunctionError, RuleError, RuleResult, TranslationError};
pub use expression::{ResourceExpression, Residual};
pub use functions::{Builtin, Function, FunctionTable, GenericFn, InstanceFn};
pub use parser::parse_rule;
pub use resource::{json_field, serialized_field, Resource};
pub use translate::{Placeholder, QueryTranslator, SqlFilter, SqlTranslator};
pub use value::Value;
