//! Rule text tokenizer.

use crate::error::{RuleError, RuleResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,
    Dot,
    Comma,
    LParen,
    RParen,
    Eq,  // ==
    Ne,  // !=
    Gt,  // >
    Lt,  // <
    Ge,  // >=
    Le,  // <=
    And, // &&
    Or,  // ||
    Not, // !
    Plus,
    Minus,
}

/// Token plus its byte offset in the rule text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

fn syntax(position: usize, message: impl Into<String>) -> RuleError {
    RuleError::Syntax {
        position,
        message: message.into(),
    }
}

pub(crate) fn tokenize(input: &str) -> RuleResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let at = |i: usize| chars.get(i).map(|(_, c)| *c);
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = at(i + 1);
        let (token, width) = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '.' => (Token::Dot, 1),
            ',' => (Token::Comma, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '=' if next == Some('=') => (Token::Eq, 2),
            '!' if next == Some('=') => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '&' if next == Some('&') => (Token::And, 2),
            '|' if next == Some('|') => (Token::Or, 2),
            '"' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    match at(j) {
                        None => return Err(syntax(position, "unterminated string literal")),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = match at(j + 1) {
                                Some('"') => '"',
                                Some('\\') => '\\',
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some(other) => {
                                    return Err(syntax(
                                        chars[j].0,
                                        format!("unknown escape `\\{other}`"),
                                    ))
                                }
                                None => {
                                    return Err(syntax(position, "unterminated string literal"))
                                }
                            };
                            text.push(escaped);
                            j += 2;
                        }
                        Some(other) => {
                            text.push(other);
                            j += 1;
                        }
                    }
                }
                (Token::Str(text), j + 1 - i)
            }
            c if c.is_ascii_digit() => {
                let mut j = i;
                let mut seen_dot = false;
                while let Some(d) = at(j) {
                    if d.is_ascii_digit() {
                        j += 1;
                    } else if d == '.' && !seen_dot && at(j + 1).is_some_and(|n| n.is_ascii_digit()) {
                        seen_dot = true;
                        j += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[i..j].iter().map(|(_, c)| *c).collect();
                let token = if seen_dot {
                    Token::Float(
                        text.parse()
                            .map_err(|_| syntax(position, format!("invalid number `{text}`")))?,
                    )
                } else {
                    Token::Int(
                        text.parse()
                            .map_err(|_| syntax(position, format!("invalid integer `{text}`")))?,
                    )
                };
                (token, j - i)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = i;
                while at(j).is_some_and(|d| d.is_ascii_alphanumeric() || d == '_') {
                    j += 1;
                }
                let word: String = chars[i..j].iter().map(|(_, c)| *c).collect();
                let token = match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word),
                };
                (token, j - i)
            }
            other => return Err(syntax(position, format!("unexpected character `{other}`"))),
        };
        tokens.push(Spanned { token, position });
        i += width;
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("a >= 1 && !b || c != 2.5"),
            vec![
                Token::Ident("a".into()),
                Token::Ge,
                Token::Int(1),
                Token::And,
                Token::Not,
                Token::Ident("b".into()),
                Token::Or,
                Token::Ident("c".into()),
                Token::Ne,
                Token::Float(2.5),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""say \"hi\"""#), vec![Token::Str("say \"hi\"".into())]);
    }

    #[test]
    fn test_member_after_number_is_not_float() {
        assert_eq!(
            kinds("1.x"),
            vec![Token::Int(1), Token::Dot, Token::Ident("x".into())]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("  HasRole(\"x\")").unwrap();
        assert_eq!(tokens[0].position, 2);
        assert_eq!(tokens[1].position, 9);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            tokenize("\"open"),
            Err(RuleError::Syntax { position: 0, .. })
        ));
        assert!(matches!(
            tokenize("a & b"),
            Err(RuleError::Syntax { position: 2, .. })
        ));
        assert!(tokenize("a = b").is_err());
    }
}
