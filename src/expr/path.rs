//! SCIM Path Scanner and Compiler
//!
//! Compiles path strings (`name.familyName`,
//! `emails[type eq "work"].value`,
//! `urn:ietf:params:scim:schemas:core:2.0:User:emails.primary`) into the
//! unified [`Expression`] chain.
//!
//! The scanner is a byte-level state machine: one state transition per
//! input byte, no per-byte allocation. Token text is sliced out of the
//! input at boundaries. A `[` switches the scanner into filter-span
//! tracking (quoted strings with JSON escape rules, bracket depth); the
//! captured span is handed to the filter compiler.
//!
//! A URN namespace prefix is recognized first, by longest case-insensitive
//! match against the registered namespaces
//! (see [`register_urn`](crate::registry::register_urn)); the registered
//! casing is preserved in the emitted step.

use crate::error::{Result, ScimError};
use crate::registry;

use super::{Expression, MAX_EXPRESSION_LENGTH, filter};

/// Compile a path string, allowing one embedded `[filter]`.
///
/// # Examples
///
/// ```
/// use scim_engine::expr::compile_path;
///
/// let path = compile_path("name.familyName").unwrap();
/// let path = compile_path("emails[type eq \"work\"].value").unwrap();
/// ```
pub fn compile_path(input: &str) -> Result<Expression> {
    compile(input, true)
}

/// Compile a dotted step chain with filters disabled; used for the path
/// operands inside filters (nested filters are not a thing).
pub(crate) fn compile_step_chain(input: &str) -> Result<Expression> {
    compile(input, false)
}

// One parsed segment of a path, before chain linking.
enum Segment {
    Step(String),
    Filter(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Expecting the first byte of a step
    StepStart,
    /// Inside a step token
    InStep,
    /// Inside a `[filter]` span
    InFilter,
    /// Just consumed the closing `]`
    PostFilter,
}

// What the scanner observed at a byte.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    /// Consume the byte, no token boundary
    Advance,
    /// Byte starts a step token
    BeginStep,
    /// Byte is a `.`; the current step ended before it
    EndStep,
    /// Byte is a `[`; the current step ended before it
    EndStepOpenFilter,
    /// Byte is the matching `]`; the filter span ended before it
    CloseFilter,
    /// Byte is the `.` following a `]`
    DotAfterFilter,
}

/// Byte-level path scanner. `step` consumes one byte and reports the
/// token boundary it produced, if any.
struct Scanner {
    state: State,
    // Filter-span tracking: bracket depth and string/escape state, so a
    // `]` inside a quoted literal does not close the filter.
    depth: u32,
    in_str: bool,
    esc: bool,
}

impl Scanner {
    fn new() -> Self {
        Self {
            state: State::StepStart,
            depth: 0,
            in_str: false,
            esc: false,
        }
    }

    fn step(&mut self, b: u8, pos: usize, allow_filter: bool) -> Result<Event> {
        let unexpected = |b: u8, pos: usize| {
            Err(ScimError::invalid_path(format!(
                "unexpected character '{}' at position {}",
                b as char, pos
            )))
        };
        match self.state {
            State::StepStart => {
                if b.is_ascii_alphabetic() || b == b'$' {
                    self.state = State::InStep;
                    Ok(Event::BeginStep)
                } else {
                    unexpected(b, pos)
                }
            }
            State::InStep => match b {
                b'.' => {
                    self.state = State::StepStart;
                    Ok(Event::EndStep)
                }
                b'[' if allow_filter => {
                    self.state = State::InFilter;
                    Ok(Event::EndStepOpenFilter)
                }
                _ if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' => Ok(Event::Advance),
                _ => unexpected(b, pos),
            },
            State::InFilter => {
                if self.in_str {
                    match b {
                        _ if self.esc => self.esc = false,
                        b'\\' => self.esc = true,
                        b'"' => self.in_str = false,
                        _ => {}
                    }
                    return Ok(Event::Advance);
                }
                match b {
                    b'"' => {
                        self.in_str = true;
                        Ok(Event::Advance)
                    }
                    b'[' => {
                        self.depth += 1;
                        Ok(Event::Advance)
                    }
                    b']' if self.depth == 0 => {
                        self.state = State::PostFilter;
                        Ok(Event::CloseFilter)
                    }
                    b']' => {
                        self.depth -= 1;
                        Ok(Event::Advance)
                    }
                    _ => Ok(Event::Advance),
                }
            }
            State::PostFilter => match b {
                b'.' => {
                    self.state = State::StepStart;
                    Ok(Event::DotAfterFilter)
                }
                _ => unexpected(b, pos),
            },
        }
    }
}

fn compile(input: &str, allow_filter: bool) -> Result<Expression> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScimError::invalid_path("empty path"));
    }
    if input.len() > MAX_EXPRESSION_LENGTH {
        return Err(ScimError::invalid_path(format!(
            "path exceeds maximum length ({} bytes, max {})",
            input.len(),
            MAX_EXPRESSION_LENGTH
        )));
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut rest = input;

    // Namespace head: longest registered URN followed by ':'.
    if let Some((original, len)) = registry::match_urn(input) {
        segments.push(Segment::Step(original));
        rest = &input[len + 1..];
        if rest.is_empty() {
            return Err(ScimError::invalid_path(format!(
                "path '{}' has no attribute after the namespace",
                input
            )));
        }
    }

    let bytes = rest.as_bytes();
    let mut scanner = Scanner::new();
    let mut token_start = 0usize;
    let mut filter_seen = false;

    let mut i = 0usize;
    while i < bytes.len() {
        match scanner.step(bytes[i], i, allow_filter && !filter_seen)? {
            Event::Advance => {}
            Event::BeginStep => token_start = i,
            Event::EndStep => {
                segments.push(Segment::Step(rest[token_start..i].to_string()));
            }
            Event::EndStepOpenFilter => {
                segments.push(Segment::Step(rest[token_start..i].to_string()));
                filter_seen = true;
                token_start = i + 1;
            }
            Event::CloseFilter => {
                let span = &rest[token_start..i];
                segments.push(Segment::Filter(filter::compile_filter_span(span)?));
            }
            Event::DotAfterFilter => {}
        }
        i += 1;
    }

    // End-of-input is only valid inside a step or right after a ']'.
    match scanner.state {
        State::InStep => {
            segments.push(Segment::Step(rest[token_start..].to_string()));
        }
        State::PostFilter => {}
        State::StepStart => {
            return Err(ScimError::invalid_path(format!(
                "path '{}' ends with a separator",
                input
            )));
        }
        State::InFilter => {
            return Err(ScimError::invalid_path(format!(
                "unterminated filter in path '{}'",
                input
            )));
        }
    }

    // Link the chain back to front.
    let mut head: Option<Expression> = None;
    for segment in segments.into_iter().rev() {
        let mut e = match segment {
            Segment::Step(s) => Expression::new_path(s),
            Segment::Filter(f) => f,
        };
        e.set_next(head.take());
        head = Some(e);
    }
    head.ok_or_else(|| ScimError::invalid_path("empty path"))
}

// =============================================================================
// Tests
// =============================================================================
