//! SCIM Path and Filter Expressions
//!
//! This module implements the SCIM path/filter mini-language per RFC 7644
//! Sections 3.4.2 and 3.5.2. Two byte-level state-machine scanners feed two
//! compilers ([`compile_path`], [`compile_filter`]) which both produce the
//! unified [`Expression`] node: a hybrid of a linked list (path steps chain
//! through `next`) and a binary tree (operators hold `left`/`right`).
//!
//! ## Grammar (simplified)
//!
//! ```text
//! path     = [URN ":"] step *( "." step ) [ "[" filter "]" [ "." step ] ]
//! step     = ALPHA *( ALPHA / DIGIT / "_" / "-" )
//! filter   = orExpr
//! orExpr   = andExpr *( "or" andExpr )
//! andExpr  = notExpr *( "and" notExpr )
//! notExpr  = [ "not" ] ( "(" filter ")" / compare )
//! compare  = path SP compareOp SP literal / path SP "pr"
//! literal  = string / number / "true" / "false"
//! ```
//!
//! ## Shape examples
//!
//! `emails[type eq "work"].value` compiles to the chain
//! `emails -> eq -> value` where the `eq` node is a relational operator
//! carrying `type` on its left and `"work"` on its right.
//!
//! `a eq 1 or b eq 2 and c eq 3` compiles to
//! `or(eq(a, 1), and(eq(b, 2), eq(c, 3)))`: `not` binds tighter than
//! `and`, which binds tighter than `or`.

mod filter;
mod path;

pub use filter::compile_filter;
pub use path::compile_path;

pub(crate) use filter::unquote;
pub(crate) use path::compile_step_chain;

use std::fmt;

use crate::error::Result;

/// Maximum allowed length of a path or filter expression (bytes).
///
/// Keeps maliciously crafted expressions from consuming unbounded memory
/// and CPU during scanning. 4KB is generous for any real-world filter.
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// Maximum allowed nesting depth of a filter expression.
///
/// Bounds stack usage on inputs like `not (not (not (...)))`.
pub const MAX_FILTER_DEPTH: usize = 32;

/// Filter and path operators per RFC 7644.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    Eq,
    Ne,
    Sw,
    Ew,
    Co,
    Gt,
    Ge,
    Lt,
    Le,
    Pr,
}

impl Operator {
    /// Case-insensitive parse of an operator word.
    pub fn from_token(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Some(Operator::And),
            "or" => Some(Operator::Or),
            "not" => Some(Operator::Not),
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "sw" => Some(Operator::Sw),
            "ew" => Some(Operator::Ew),
            "co" => Some(Operator::Co),
            "gt" => Some(Operator::Gt),
            "ge" => Some(Operator::Ge),
            "lt" => Some(Operator::Lt),
            "le" => Some(Operator::Le),
            "pr" => Some(Operator::Pr),
            _ => None,
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not)
    }

    pub fn is_relational(&self) -> bool {
        !self.is_logical()
    }

    /// Binding priority: relational > `not` > `and` > `or`.
    pub(crate) fn priority(&self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Not => 3,
            _ => 4,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Sw => "sw",
            Operator::Ew => "ew",
            Operator::Co => "co",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Pr => "pr",
        };
        write!(f, "{}", s)
    }
}

/// Role of an [`Expression`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// A path step (attribute name or URN namespace)
    Path,
    /// A comparison literal (quoted string, number, boolean)
    Literal,
    /// A relational operator (`eq`, `pr`, ...); operands in `left`/`right`
    RelationalOp,
    /// A logical operator (`and`, `or`, `not`); operands in `left`/`right`
    LogicalOp,
    /// A parenthesis; only seen by the compiler, never in compiled output
    Parenthesis,
}

/// A node of the compiled path/filter representation.
///
/// Path steps form a linked list through `next`; operator nodes form a
/// binary tree through `left`/`right`. A filter embedded in a path appears
/// as an operator node linked into the step chain: the step before it
/// chains to the operator root, whose `next` continues with the remaining
/// steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    token: String,
    kind: ExprKind,
    next: Option<Box<Expression>>,
    left: Option<Box<Expression>>,
    right: Option<Box<Expression>>,
}

impl Expression {
    pub(crate) fn new_path(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: ExprKind::Path,
            next: None,
            left: None,
            right: None,
        }
    }

    pub(crate) fn new_literal(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: ExprKind::Literal,
            next: None,
            left: None,
            right: None,
        }
    }

    pub(crate) fn new_operator(
        op: Operator,
        left: Option<Expression>,
        right: Option<Expression>,
    ) -> Self {
        Self {
            token: op.to_string(),
            kind: if op.is_logical() {
                ExprKind::LogicalOp
            } else {
                ExprKind::RelationalOp
            },
            next: None,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }

    pub(crate) fn set_next(&mut self, next: Option<Expression>) {
        self.next = next.map(Box::new);
    }

    /// Literal text of this node.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> ExprKind {
        self.kind
    }

    pub fn next(&self) -> Option<&Expression> {
        self.next.as_deref()
    }

    pub fn left(&self) -> Option<&Expression> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Expression> {
        self.right.as_deref()
    }

    pub fn is_path(&self) -> bool {
        self.kind == ExprKind::Path
    }

    pub fn is_literal(&self) -> bool {
        self.kind == ExprKind::Literal
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind, ExprKind::RelationalOp | ExprKind::LogicalOp)
    }

    pub fn is_logical_operator(&self) -> bool {
        self.kind == ExprKind::LogicalOp
    }

    pub fn is_relational_operator(&self) -> bool {
        self.kind == ExprKind::RelationalOp
    }

    /// The operator this node stands for, if it is an operator node.
    pub fn operator(&self) -> Option<Operator> {
        if self.is_operator() {
            Operator::from_token(&self.token)
        } else {
            None
        }
    }

    /// Whether this path step names a URN namespace.
    ///
    /// Plain step tokens cannot contain `:`, so the presence of a colon
    /// identifies the namespace step.
    pub fn is_urn(&self) -> bool {
        self.kind == ExprKind::Path && self.token.contains(':')
    }

    /// Whether any node in this chain (following `next`) is an operator,
    /// i.e. the path contains an embedded filter.
    pub fn contains_filter(&self) -> bool {
        let mut cur = Some(self);
        while let Some(e) = cur {
            if e.is_operator() {
                return true;
            }
            cur = e.next();
        }
        false
    }

    /// Pre-order traversal over `left`, `right`, then `next`.
    ///
    /// `done` is invoked exactly once, when traversal of the subtree rooted
    /// at `marker` (its node plus `left`/`right` descendants) completes;
    /// the `next` continuation of `marker` is visited afterwards.
    pub fn walk<F, D>(&self, cb: &mut F, marker: &Expression, done: &mut D) -> Result<()>
    where
        F: FnMut(&Expression) -> Result<()>,
        D: FnMut() -> Result<()>,
    {
        cb(self)?;
        if let Some(l) = self.left() {
            l.walk(cb, marker, done)?;
        }
        if let Some(r) = self.right() {
            r.walk(cb, marker, done)?;
        }
        if std::ptr::eq(self, marker) {
            done()?;
        }
        if let Some(n) = self.next() {
            n.walk(cb, marker, done)?;
        }
        Ok(())
    }

    fn fmt_filter(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExprKind::LogicalOp => match self.operator() {
                Some(Operator::Not) => {
                    write!(f, "not (")?;
                    if let Some(l) = self.left() {
                        l.fmt_filter(f)?;
                    }
                    write!(f, ")")
                }
                _ => {
                    write!(f, "(")?;
                    if let Some(l) = self.left() {
                        l.fmt_filter(f)?;
                    }
                    write!(f, " {} ", self.token)?;
                    if let Some(r) = self.right() {
                        r.fmt_filter(f)?;
                    }
                    write!(f, ")")
                }
            },
            ExprKind::RelationalOp => {
                if let Some(l) = self.left() {
                    l.fmt_path(f)?;
                }
                write!(f, " {}", self.token)?;
                if let Some(r) = self.right() {
                    write!(f, " {}", r.token)?;
                }
                Ok(())
            }
            _ => write!(f, "{}", self.token),
        }
    }

    fn fmt_path(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)?;
        let mut prev_urn = self.is_urn();
        let mut cur = self.next();
        while let Some(e) = cur {
            if e.is_operator() {
                write!(f, "[")?;
                e.fmt_filter(f)?;
                write!(f, "]")?;
                if let Some(n) = e.next() {
                    write!(f, ".")?;
                    return n.fmt_path(f);
                }
                return Ok(());
            }
            write!(f, "{}{}", if prev_urn { ':' } else { '.' }, e.token)?;
            prev_urn = false;
            cur = e.next();
        }
        Ok(())
    }
}

/// Prints a form that recompiles to the same expression: paths as dotted
/// steps with `[...]` filters, operators with explicit grouping.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExprKind::Path => self.fmt_path(f),
            _ => self.fmt_filter(f),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
