//! Expressions and lazy plan operations.
//!
//! Expressions are built on the control side and shipped to the worker as
//! plain data. The worker translates them into whatever its engine speaks.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Literals
// ─────────────────────────────────────────────────────────────────────────────

/// Scalar literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(v as i64)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Literal::String(v)
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(v: Option<T>) -> Self {
        v.map_or(Literal::Null, Into::into)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expressions
// ─────────────────────────────────────────────────────────────────────────────

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

/// Column expression
///
/// Built with [`col`], [`all`] and [`lit`] and combined with the methods
/// below. The tree is inert on the control side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "expr", rename_all = "snake_case")]
pub enum Expr {
    /// Reference to a column by name
    Column { name: String },
    /// Every column of the input
    Wildcard,
    /// Scalar literal
    Literal { value: Literal },
    /// `left <op> right`
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Boolean negation
    Not { input: Box<Expr> },
    /// True where the input is null
    IsNull { input: Box<Expr> },
    /// True where the input is not null
    IsNotNull { input: Box<Expr> },
    /// Rename the output of the input expression
    Alias { input: Box<Expr>, name: String },
}

/// Reference a column by name.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column { name: name.into() }
}

/// Reference every column.
pub fn all() -> Expr {
    Expr::Wildcard
}

/// A literal value.
pub fn lit(value: impl Into<Literal>) -> Expr {
    Expr::Literal {
        value: value.into(),
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Expr {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn neq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::NotEq, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn gt_eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::GtEq, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn lt_eq(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::LtEq, other)
    }

    pub fn and(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Or, other)
    }

    pub fn plus(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Plus, other)
    }

    pub fn minus(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Minus, other)
    }

    pub fn multiply(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Multiply, other)
    }

    pub fn divide(self, other: impl Into<Expr>) -> Expr {
        self.binary(BinaryOp::Divide, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not {
            input: Box::new(self),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            input: Box::new(self),
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull {
            input: Box::new(self),
        }
    }

    pub fn alias(self, name: impl Into<String>) -> Expr {
        Expr::Alias {
            input: Box::new(self),
            name: name.into(),
        }
    }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self {
        Expr::Literal { value }
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        lit(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        lit(v)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        lit(v)
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        lit(v)
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        lit(v)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column { name } => write!(f, "col({name:?})"),
            Expr::Wildcard => write!(f, "*"),
            Expr::Literal { value } => match value {
                Literal::Null => write!(f, "null"),
                Literal::Bool(b) => write!(f, "{b}"),
                Literal::Int(i) => write!(f, "{i}"),
                Literal::Float(x) => write!(f, "{x}"),
                Literal::String(s) => write!(f, "{s:?}"),
            },
            Expr::Binary { left, op, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Not { input } => write!(f, "!{input}"),
            Expr::IsNull { input } => write!(f, "{input}.is_null()"),
            Expr::IsNotNull { input } => write!(f, "{input}.is_not_null()"),
            Expr::Alias { input, name } => write!(f, "{input}.alias({name:?})"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan Operations
// ─────────────────────────────────────────────────────────────────────────────

/// One step of a lazy plan, applied in order on top of a source frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PlanOp {
    Select { exprs: Vec<Expr> },
    Filter { predicate: Expr },
    /// Drop rows containing a null; `None` checks every column.
    DropNulls { subset: Option<Vec<String>> },
}

impl PlanOp {
    pub fn name(&self) -> &'static str {
        match self {
            PlanOp::Select { .. } => "select",
            PlanOp::Filter { .. } => "filter",
            PlanOp::DropNulls { .. } => "drop_nulls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_nest_left_to_right() {
        let e = col("a").gt(5).and(col("b").is_not_null());
        match &e {
            Expr::Binary { op, left, right } => {
                assert_eq!(*op, BinaryOp::And);
                assert!(matches!(**left, Expr::Binary { op: BinaryOp::Gt, .. }));
                assert!(matches!(**right, Expr::IsNotNull { .. }));
            }
            other => panic!("unexpected expression: {other:?}"),
        }
        assert_eq!(e.to_string(), r#"((col("a") > 5) & col("b").is_not_null())"#);
    }

    #[test]
    fn test_optional_literal() {
        assert_eq!(Literal::from(None::<i64>), Literal::Null);
        assert_eq!(Literal::from(Some(3)), Literal::Int(3));
    }

    #[test]
    fn test_plan_op_serialize() {
        let op = PlanOp::Filter {
            predicate: col("n").lt_eq(lit(2.5)),
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"op\":\"filter\""));
        assert!(json.contains("\"expr\":\"binary\""));
        let back: PlanOp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
