//! Recursive-descent parser for rule text.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or         = and ("||" and)*
//! and        = comparison ("&&" comparison)*
//! comparison = additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive   = unary ("+" unary)*
//! unary      = "!" unary | "-" number | postfix
//! postfix    = primary ("." ident ("(" args ")")?)*
//! primary    = literal | ident "(" args ")" | ident | "(" or ")"
//! ```

use crate::ast::{BinaryOp, Expr, Variable};
use crate::error::{RuleError, RuleResult};
use crate::lexer::{tokenize, Spanned, Token};
use crate::value::Value;

/// Deepest syntax tree a rule may produce.
///
/// Counts nested `!`, parentheses and call arguments along with the length
/// of operator and member chains, so later tree walks stay well inside the
/// stack.
pub const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> RuleResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("rule nests deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> RuleResult<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn parse_or(&mut self) -> RuleResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            self.descend()?;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_and(&mut self) -> RuleResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            self.descend()?;
            let right = self.parse_comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_comparison(&mut self) -> RuleResult<Expr> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(binary(op, left, right))
    }

    fn parse_additive(&mut self) -> RuleResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::Plus) {
            self.advance();
            self.descend()?;
            let right = self.parse_unary()?;
            left = binary(BinaryOp::Add, left, right);
        }
        self.depth = depth;
        Ok(left)
    }

    fn parse_unary(&mut self) -> RuleResult<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                self.descend()?;
                let operand = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Not(Box::new(operand)))
            }
            Some(Token::Minus) => {
                self.advance();
                match self.advance() {
                    Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(-n))),
                    Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(-x))),
                    _ => {
                        self.pos -= 1;
                        Err(self.error("`-` must be followed by a number"))
                    }
                }
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> RuleResult<Expr> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            self.descend()?;
            let name = match self.advance() {
                Some(Token::Ident(name)) => name,
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected identifier after `.`"));
                }
            };
            expr = if self.peek() == Some(&Token::LParen) {
                let args = self.parse_args()?;
                Expr::MethodCall {
                    target: Box::new(expr),
                    method: name,
                    args,
                }
            } else {
                Expr::Member {
                    target: Box::new(expr),
                    name,
                }
            };
        }
        self.depth = depth;
        Ok(expr)
    }

    /// args = "(" (or ("," or)*)? ")"
    fn parse_args(&mut self) -> RuleResult<Vec<Expr>> {
        self.expect(Token::LParen, "`(`")?;
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        self.descend()?;
        loop {
            args.push(self.parse_or()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RParen) => {
                    self.advance();
                    self.depth -= 1;
                    return Ok(args);
                }
                _ => return Err(self.error("expected `,` or `)`")),
            }
        }
    }

    fn parse_primary(&mut self) -> RuleResult<Expr> {
        let literal = match self.peek() {
            Some(Token::Int(n)) => Some(Value::Int(*n)),
            Some(Token::Float(x)) => Some(Value::Float(*x)),
            Some(Token::Str(s)) => Some(Value::Str(s.clone())),
            Some(Token::True) => Some(Value::Bool(true)),
            Some(Token::False) => Some(Value::Bool(false)),
            Some(Token::Null) => Some(Value::Null),
            _ => None,
        };
        if let Some(value) = literal {
            self.advance();
            return Ok(Expr::Literal(value));
        }

        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                if self.peek() == Some(&Token::LParen) {
                    let args = self.parse_args()?;
                    return Ok(Expr::Call {
                        function: name,
                        args,
                    });
                }
                Variable::parse(&name)
                    .map(Expr::Var)
                    .ok_or(RuleError::UnknownVariable(name))
            }
            Some(Token::LParen) => {
                self.advance();
                self.descend()?;
                let expr = self.parse_or()?;
                self.expect(Token::RParen, "closing parenthesis `)`")?;
                self.depth -= 1;
                Ok(expr)
            }
            Some(other) => Err(self.error(format!("unexpected token {other:?}"))),
            None => Err(self.error("unexpected end of rule")),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parse rule text into a syntax tree.
///
/// Only grammar and variable names are checked here; functions, methods and
/// types are bound by the compiler.
pub fn parse_rule(input: &str) -> RuleResult<Expr> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(RuleError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error(format!(
            "unexpected trailing token {:?}",
            parser.tokens[parser.pos].token
        )));
    }
    Ok(expr)
}
