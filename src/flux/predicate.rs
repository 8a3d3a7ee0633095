//! Row references and predicate expressions
//!
//! A [`Predicate`] is pure syntax: it is never evaluated locally, only rendered
//! into the body of a `filter(fn: (r) => ...)` call and evaluated by the engine.
//!
//! ```rust
//! use fluxkit::flux::row;
//!
//! # fn main() -> fluxkit::FluxResult<()> {
//! let pred = row("_measurement").eq("cpu")?
//!     & (row("host").eq("a")? | row("host").eq("b")?);
//!
//! assert_eq!(
//!     pred.to_string(),
//!     r#"r._measurement == "cpu" and (r.host == "a" or r.host == "b")"#
//! );
//! # Ok(())
//! # }
//! ```

use super::literal::{escape_string, Literal, ToLiteral};
use crate::error::FluxResult;
use std::fmt;

/// Comparison operators usable in a predicate leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "==" | "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connectives joining two predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

/// A reference to a named column of the row being filtered
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    column: String,
}

/// Shorthand for [`Row::new`]
pub fn row(column: impl Into<String>) -> Row {
    Row::new(column)
}

#[allow(clippy::should_implement_trait)]
impl Row {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Compare this column against a literal
    pub fn compare(&self, op: CompareOp, value: impl ToLiteral) -> FluxResult<Predicate> {
        Ok(Predicate::Compare {
            column: self.column.clone(),
            op,
            value: value.to_literal()?,
        })
    }

    pub fn eq(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Lt, value)
    }

    pub fn gt(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Gt, value)
    }

    pub fn le(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Le, value)
    }

    pub fn ge(&self, value: impl ToLiteral) -> FluxResult<Predicate> {
        self.compare(CompareOp::Ge, value)
    }
}

/// A boolean condition over the columns of a row
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `r.<column> <op> <value>`
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    /// `<left> and|or <right>`
    Logical {
        op: LogicalOp,
        left: Box<Predicate>,
        right: Box<Predicate>,
    },
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Self::logical(LogicalOp::And, self, other)
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Self::logical(LogicalOp::Or, self, other)
    }

    fn logical(op: LogicalOp, left: Predicate, right: Predicate) -> Predicate {
        Predicate::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// AND together every predicate, `None` when the iterator is empty
    pub fn all(preds: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        preds.into_iter().reduce(Predicate::and)
    }

    /// OR together every predicate, `None` when the iterator is empty
    pub fn any(preds: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        preds.into_iter().reduce(Predicate::or)
    }

    /// Number of comparison leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Compare { .. } => 1,
            Self::Logical { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    fn write_child(&self, parent: LogicalOp, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logical { op, .. } if *op != parent => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { column, op, value } => {
                write_column_ref(column, f)?;
                write!(f, " {} {}", op, value)
            }
            Self::Logical { op, left, right } => {
                left.write_child(*op, f)?;
                write!(f, " {} ", op)?;
                right.write_child(*op, f)
            }
        }
    }
}

impl std::ops::BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

/// `r.name` for plain identifiers, `r["name"]` for anything else
fn write_column_ref(column: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if is_identifier(column) {
        write!(f, "r.{}", column)
    } else {
        write!(f, "r[\"{}\"]", escape_string(column))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(s)
}

fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "and" | "or" | "not" | "empty" | "in" | "import" | "package" | "return" | "option"
            | "builtin" | "testcase" | "if" | "then" | "else" | "exists"
    )
}
