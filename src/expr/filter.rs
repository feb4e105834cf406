//! SCIM Filter Scanner and Compiler
//!
//! Compiles filter expressions per RFC 7644 Section 3.4.2 into the unified
//! [`Expression`] tree. The scanner is a byte-level state machine emitting
//! token boundaries; the compiler is a shunting-yard pass with operator
//! priorities `not` > `and` > `or` (relational operators bind tightest and
//! consume a path operand on the left and a literal on the right).
//!
//! ## Examples
//!
//! ```text
//! userName eq "john"
//! active eq true and emails pr
//! a eq 1 or b eq 2 and c eq 3        ->  or(eq(a,1), and(eq(b,2), eq(c,3)))
//! not(active eq false)               ->  same as: not (active eq false)
//! ```
//!
//! Parentheses override priority and are tracked with a depth counter;
//! mismatched parentheses are an error. `(` and `)` terminate the token
//! before them, so `not(` and `pr)` parse identically to the spaced forms.

use crate::error::{Result, ScimError};

use super::{
    Expression, ExprKind, MAX_EXPRESSION_LENGTH, MAX_FILTER_DEPTH, Operator, compile_step_chain,
};

/// Compile a filter expression.
///
/// # Errors
///
/// Returns `invalidFilter` if the input exceeds [`MAX_EXPRESSION_LENGTH`]
/// bytes or [`MAX_FILTER_DEPTH`] nesting levels, or has invalid syntax.
///
/// # Examples
///
/// ```
/// use scim_engine::expr::compile_filter;
///
/// let filter = compile_filter("userName eq \"john\"").unwrap();
/// let filter = compile_filter("active eq true and emails pr").unwrap();
/// ```
pub fn compile_filter(input: &str) -> Result<Expression> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScimError::invalid_filter("empty filter"));
    }
    if input.len() > MAX_EXPRESSION_LENGTH {
        return Err(ScimError::invalid_filter(format!(
            "filter exceeds maximum length ({} bytes, max {})",
            input.len(),
            MAX_EXPRESSION_LENGTH
        )));
    }
    let tokens = scan(input)?;
    shunt(tokens)
}

/// Compile the span captured between `[` and `]` by the path scanner.
pub(crate) fn compile_filter_span(span: &str) -> Result<Expression> {
    compile_filter(span)
}

// =============================================================================
// Scanner
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Between tokens
    Idle,
    /// Inside a bare word (path, operator, boolean)
    Word,
    /// Inside an unquoted number
    Number,
    /// Inside a quoted string; `esc` set right after a backslash,
    /// `unicode` counts pending hex digits of a `\uXXXX` escape
    Str { esc: bool, unicode: u8 },
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    /// Bare word: a path, an operator, `true`/`false`/`null`
    Word(&'a str),
    /// Quoted string literal, quotes included
    Str(&'a str),
    /// Unquoted number literal
    Number(&'a str),
    LParen,
    RParen,
}

fn is_word_byte(b: u8) -> bool {
    // Path tokens may carry dots, URN colons, and '$' (e.g. "$ref").
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':' | b'$')
}

fn scan(input: &str) -> Result<Vec<Token<'_>>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Idle;
    let mut start = 0usize;

    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        state = match state {
            State::Idle => match b {
                b' ' | b'\t' | b'\r' | b'\n' => State::Idle,
                b'(' => {
                    tokens.push(Token::LParen);
                    State::Idle
                }
                b')' => {
                    tokens.push(Token::RParen);
                    State::Idle
                }
                b'"' => {
                    start = i;
                    State::Str {
                        esc: false,
                        unicode: 0,
                    }
                }
                b'-' | b'+' => {
                    start = i;
                    State::Number
                }
                _ if b.is_ascii_digit() => {
                    start = i;
                    State::Number
                }
                _ if b.is_ascii_alphabetic() || b == b'$' => {
                    start = i;
                    State::Word
                }
                _ => {
                    return Err(ScimError::invalid_filter(format!(
                        "unexpected character '{}' at position {}",
                        b as char, i
                    )));
                }
            },
            State::Word => match b {
                _ if is_word_byte(b) => State::Word,
                b' ' | b'\t' | b'\r' | b'\n' => {
                    tokens.push(Token::Word(&input[start..i]));
                    State::Idle
                }
                // Parens end the word as if a space were inserted.
                b'(' => {
                    tokens.push(Token::Word(&input[start..i]));
                    tokens.push(Token::LParen);
                    State::Idle
                }
                b')' => {
                    tokens.push(Token::Word(&input[start..i]));
                    tokens.push(Token::RParen);
                    State::Idle
                }
                _ => {
                    return Err(ScimError::invalid_filter(format!(
                        "unexpected character '{}' at position {}",
                        b as char, i
                    )));
                }
            },
            State::Number => match b {
                _ if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+') => {
                    State::Number
                }
                b' ' | b'\t' | b'\r' | b'\n' => {
                    tokens.push(Token::Number(&input[start..i]));
                    State::Idle
                }
                b')' => {
                    tokens.push(Token::Number(&input[start..i]));
                    tokens.push(Token::RParen);
                    State::Idle
                }
                _ => {
                    return Err(ScimError::invalid_filter(format!(
                        "invalid number at position {}",
                        i
                    )));
                }
            },
            State::Str { esc, unicode } => {
                if unicode > 0 {
                    if !b.is_ascii_hexdigit() {
                        return Err(ScimError::invalid_filter(format!(
                            "invalid \\u escape at position {}",
                            i
                        )));
                    }
                    State::Str {
                        esc: false,
                        unicode: unicode - 1,
                    }
                } else if esc {
                    match b {
                        b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => State::Str {
                            esc: false,
                            unicode: 0,
                        },
                        b'u' => State::Str {
                            esc: false,
                            unicode: 4,
                        },
                        _ => {
                            return Err(ScimError::invalid_filter(format!(
                                "invalid escape sequence at position {}",
                                i
                            )));
                        }
                    }
                } else {
                    match b {
                        b'\\' => State::Str {
                            esc: true,
                            unicode: 0,
                        },
                        b'"' => {
                            tokens.push(Token::Str(&input[start..=i]));
                            State::Idle
                        }
                        _ => State::Str {
                            esc: false,
                            unicode: 0,
                        },
                    }
                }
            }
        };
        i += 1;
    }

    match state {
        State::Idle => Ok(tokens),
        State::Word => {
            tokens.push(Token::Word(&input[start..]));
            Ok(tokens)
        }
        State::Number => {
            tokens.push(Token::Number(&input[start..]));
            Ok(tokens)
        }
        State::Str { .. } => Err(ScimError::invalid_filter("unterminated string")),
    }
}

// =============================================================================
// Compiler (shunting-yard)
// =============================================================================

enum StackOp {
    Op(Operator),
    LParen,
}

struct Shunter {
    operands: Vec<Expression>,
    ops: Vec<StackOp>,
}

impl Shunter {
    fn new() -> Self {
        Self {
            operands: Vec::new(),
            ops: Vec::new(),
        }
    }

    fn push_operator(&mut self, op: Operator) -> Result<()> {
        while let Some(StackOp::Op(top)) = self.ops.last() {
            // Left-associative: pop equal priority too. `not` is prefix and
            // groups rightward, so strictly-greater only.
            let pop = if op == Operator::Not {
                top.priority() > op.priority()
            } else {
                top.priority() >= op.priority()
            };
            if !pop {
                break;
            }
            let Some(StackOp::Op(top)) = self.ops.pop() else {
                unreachable!()
            };
            self.apply(top)?;
        }
        self.ops.push(StackOp::Op(op));
        Ok(())
    }

    fn close_paren(&mut self) -> Result<()> {
        loop {
            match self.ops.pop() {
                Some(StackOp::Op(op)) => self.apply(op)?,
                Some(StackOp::LParen) => return Ok(()),
                None => {
                    return Err(ScimError::invalid_filter("unbalanced ')'"));
                }
            }
        }
    }

    fn apply(&mut self, op: Operator) -> Result<()> {
        let mut pop = |expect: &str, want_path: bool, want_literal: bool| -> Result<Expression> {
            let e = self
                .operands
                .pop()
                .ok_or_else(|| ScimError::invalid_filter(format!("'{}' missing {}", op, expect)))?;
            let ok = match e.kind() {
                ExprKind::Path => want_path,
                ExprKind::Literal => want_literal,
                _ => !want_path && !want_literal,
            };
            if !ok {
                return Err(ScimError::invalid_filter(format!(
                    "'{}' cannot take '{}' as {}",
                    op,
                    e.token(),
                    expect
                )));
            }
            Ok(e)
        };

        let node = match op {
            Operator::Pr => {
                let path = pop("operand", true, false)?;
                Expression::new_operator(op, Some(path), None)
            }
            Operator::Not => {
                let sub = pop("operand", false, false)?;
                Expression::new_operator(op, Some(sub), None)
            }
            Operator::And | Operator::Or => {
                let right = pop("right operand", false, false)?;
                let left = pop("left operand", false, false)?;
                Expression::new_operator(op, Some(left), Some(right))
            }
            _ => {
                let literal = pop("comparison value", false, true)?;
                let path = pop("attribute path", true, false)?;
                Expression::new_operator(op, Some(path), Some(literal))
            }
        };
        self.operands.push(node);
        Ok(())
    }

    fn finish(mut self) -> Result<Expression> {
        while let Some(top) = self.ops.pop() {
            match top {
                StackOp::Op(op) => self.apply(op)?,
                StackOp::LParen => {
                    return Err(ScimError::invalid_filter("unbalanced '('"));
                }
            }
        }
        let root = self
            .operands
            .pop()
            .ok_or_else(|| ScimError::invalid_filter("empty filter"))?;
        if !self.operands.is_empty() {
            return Err(ScimError::invalid_filter(format!(
                "dangling operand '{}'",
                self.operands[0].token()
            )));
        }
        if !root.is_operator() {
            return Err(ScimError::invalid_filter(format!(
                "'{}' is not a filter",
                root.token()
            )));
        }
        Ok(root)
    }
}

fn shunt(tokens: Vec<Token<'_>>) -> Result<Expression> {
    let mut shunter = Shunter::new();
    let mut depth = 0usize;

    for token in tokens {
        match token {
            Token::LParen => {
                depth += 1;
                if depth > MAX_FILTER_DEPTH {
                    return Err(ScimError::invalid_filter(format!(
                        "filter exceeds maximum nesting depth ({})",
                        MAX_FILTER_DEPTH
                    )));
                }
                shunter.ops.push(StackOp::LParen);
            }
            Token::RParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ScimError::invalid_filter("unbalanced ')'"))?;
                shunter.close_paren()?;
            }
            Token::Str(raw) => {
                // Validate the escape content now so evaluation cannot fail.
                unquote(raw)?;
                shunter.operands.push(Expression::new_literal(raw));
            }
            Token::Number(raw) => {
                raw.parse::<f64>().map_err(|_| {
                    ScimError::invalid_filter(format!("invalid number '{}'", raw))
                })?;
                shunter.operands.push(Expression::new_literal(raw));
            }
            Token::Word(word) => {
                if let Some(op) = Operator::from_token(word) {
                    shunter.push_operator(op)?;
                } else if word.eq_ignore_ascii_case("true")
                    || word.eq_ignore_ascii_case("false")
                    || word.eq_ignore_ascii_case("null")
                {
                    shunter
                        .operands
                        .push(Expression::new_literal(word.to_ascii_lowercase()));
                } else {
                    let path = compile_step_chain(word)
                        .map_err(|e| ScimError::invalid_filter(e.detail().to_string()))?;
                    shunter.operands.push(path);
                }
            }
        }
    }

    shunter.finish()
}

// =============================================================================
// Literal unquoting
// =============================================================================

/// Decode a quoted string literal with JSON escape rules, including
/// `\uXXXX` and surrogate pairs.
pub(crate) fn unquote(raw: &str) -> Result<String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| ScimError::invalid_filter(format!("'{}' is not a string literal", raw)))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let unit = hex4(&mut chars)?;
                if (0xD800..0xDC00).contains(&unit) {
                    // High surrogate: a low surrogate escape must follow.
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(ScimError::invalid_filter("unpaired surrogate"));
                    }
                    let low = hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(ScimError::invalid_filter("unpaired surrogate"));
                    }
                    let c = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                    out.push(
                        char::from_u32(c)
                            .ok_or_else(|| ScimError::invalid_filter("invalid \\u escape"))?,
                    );
                } else if (0xDC00..0xE000).contains(&unit) {
                    return Err(ScimError::invalid_filter("unpaired surrogate"));
                } else {
                    out.push(
                        char::from_u32(unit)
                            .ok_or_else(|| ScimError::invalid_filter("invalid \\u escape"))?,
                    );
                }
            }
            _ => {
                return Err(ScimError::invalid_filter("invalid escape sequence"));
            }
        }
    }
    Ok(out)
}

fn hex4(chars: &mut std::str::Chars<'_>) -> Result<u32> {
    let mut v = 0u32;
    for _ in 0..4 {
        let c = chars
            .next()
            .ok_or_else(|| ScimError::invalid_filter("truncated \\u escape"))?;
        v = v * 16
            + c.to_digit(16)
                .ok_or_else(|| ScimError::invalid_filter("invalid \\u escape"))?;
    }
    Ok(v)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_equality() {
        let f = compile_filter("userName eq \"john\"").unwrap();
        assert!(f.is_relational_operator());
        assert_eq!(f.token(), "eq");
        assert_eq!(f.left().unwrap().token(), "userName");
        assert_eq!(f.right().unwrap().token(), "\"john\"");
    }

    #[test]
    fn test_boolean_and_null_literals() {
        let f = compile_filter("active eq true").unwrap();
        assert_eq!(f.right().unwrap().token(), "true");

        let f = compile_filter("active eq FALSE").unwrap();
        assert_eq!(f.right().unwrap().token(), "false");

        let f = compile_filter("manager eq null").unwrap();
        assert_eq!(f.right().unwrap().token(), "null");
    }

    #[test]
    fn test_number_literals() {
        let f = compile_filter("age gt 21").unwrap();
        assert_eq!(f.right().unwrap().token(), "21");

        let f = compile_filter("score le -5.5").unwrap();
        assert_eq!(f.right().unwrap().token(), "-5.5");

        assert!(compile_filter("age gt 1.2.3").is_err());
    }

    #[test]
    fn test_presence() {
        let f = compile_filter("name pr").unwrap();
        assert!(f.is_relational_operator());
        assert_eq!(f.token(), "pr");
        assert_eq!(f.left().unwrap().token(), "name");
        assert!(f.right().is_none());
    }

    #[test]
    fn test_dotted_path_operand() {
        let f = compile_filter("name.familyName co \"doe\"").unwrap();
        let path = f.left().unwrap();
        assert_eq!(path.token(), "name");
        assert_eq!(path.next().unwrap().token(), "familyName");
    }

    #[test]
    fn test_priority_or_and() {
        // S4: and binds tighter than or.
        let f = compile_filter("a eq 1 or b eq 2 and c eq 3").unwrap();
        assert_eq!(f.token(), "or");
        let left = f.left().unwrap();
        assert_eq!(left.token(), "eq");
        assert_eq!(left.left().unwrap().token(), "a");
        let right = f.right().unwrap();
        assert_eq!(right.token(), "and");
        assert_eq!(right.left().unwrap().left().unwrap().token(), "b");
        assert_eq!(right.right().unwrap().left().unwrap().token(), "c");
    }

    #[test]
    fn test_not_binds_tighter_than_and() {
        let f = compile_filter("not (a pr) and b pr").unwrap();
        assert_eq!(f.token(), "and");
        assert_eq!(f.left().unwrap().token(), "not");
    }

    #[test]
    fn test_parentheses_override() {
        let f = compile_filter("(a eq \"1\" or b eq \"2\") and c eq \"3\"").unwrap();
        assert_eq!(f.token(), "and");
        assert_eq!(f.left().unwrap().token(), "or");
        assert_eq!(f.right().unwrap().left().unwrap().token(), "c");
    }

    #[test]
    fn test_synthetic_spaces_around_parens() {
        let spaced = compile_filter("not ( active eq false )").unwrap();
        let tight = compile_filter("not(active eq false)").unwrap();
        assert_eq!(spaced, tight);

        let spaced = compile_filter("( a pr ) or ( b pr )").unwrap();
        let tight = compile_filter("(a pr)or(b pr)").unwrap();
        assert_eq!(spaced, tight);
    }

    #[test]
    fn test_case_insensitive_operators() {
        let f = compile_filter("userName EQ \"john\" AND active EQ TRUE").unwrap();
        assert_eq!(f.token(), "and");
    }

    #[test]
    fn test_escaped_string() {
        let f = compile_filter(r#"name eq "John \"Doe\"""#).unwrap();
        let raw = f.right().unwrap().token();
        assert_eq!(unquote(raw).unwrap(), "John \"Doe\"");
    }

    #[test]
    fn test_unquote_unicode_escapes() {
        assert_eq!(unquote(r#""é""#).unwrap(), "é");
        assert_eq!(unquote(r#""😀""#).unwrap(), "😀");
        assert!(unquote(r#""\ud83d""#).is_err());
        assert!(unquote(r#""\uzzzz""#).is_err());
    }

    #[test]
    fn test_error_unknown_operator() {
        let err = compile_filter("userName xx \"john\"").unwrap_err();
        assert!(err.detail().contains("xx"));
    }

    #[test]
    fn test_error_missing_value() {
        assert!(compile_filter("userName eq").is_err());
    }

    #[test]
    fn test_error_literal_on_left() {
        assert!(compile_filter("\"john\" eq userName").is_err());
    }

    #[test]
    fn test_error_unbalanced_parens() {
        assert!(compile_filter("(a pr").is_err());
        assert!(compile_filter("a pr)").is_err());
    }

    #[test]
    fn test_error_dangling_operand() {
        assert!(compile_filter("a pr b").is_err());
        assert!(compile_filter("userName eq \"john\" extra").is_err());
    }

    #[test]
    fn test_error_empty_and_whitespace() {
        assert!(compile_filter("").is_err());
        assert!(compile_filter("   ").is_err());
    }

    #[test]
    fn test_error_nested_filter_in_path_operand() {
        assert!(compile_filter("emails[type pr] pr").is_err());
    }

    #[test]
    fn test_max_depth() {
        let mut ok = "a pr".to_string();
        for _ in 0..MAX_FILTER_DEPTH {
            ok = format!("({})", ok);
        }
        assert!(compile_filter(&ok).is_ok());

        let over = format!("({})", ok);
        let err = compile_filter(&over).unwrap_err();
        assert!(err.detail().contains("nesting depth"));
    }

    #[test]
    fn test_max_length() {
        let padding = "x".repeat(MAX_EXPRESSION_LENGTH);
        let filter = format!("a eq \"{}\"", padding);
        let err = compile_filter(&filter).unwrap_err();
        assert!(err.detail().contains("maximum length"));
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "userName eq \"john\"",
            "a eq 1 or b eq 2 and c eq 3",
            "not (active eq false)",
            "emails pr and not (name.familyName sw \"M\")",
        ] {
            let f = compile_filter(input).unwrap();
            let printed = f.to_string();
            let recompiled = compile_filter(&printed).unwrap();
            assert_eq!(f, recompiled, "round trip failed for '{}'", input);
        }
    }
}
