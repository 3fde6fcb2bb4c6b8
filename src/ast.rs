//! Lowered representation of a parsed definition.
//!
//! The parser turns the concrete pest tree into one [`Line`] per physical
//! source line. Type references and expressions are kept unevaluated here;
//! the builder interprets them against the evaluation environment, because
//! resolution may require recursively reading other definitions.

use num_rational::BigRational;

/// One physical source line.
#[derive(Debug, Clone)]
pub struct Line {
    /// 1-based line number.
    pub number: usize,
    pub content: Content,
}

#[derive(Debug, Clone)]
pub enum Content {
    Empty,
    Attribute(AttributeExpr),
    Directive {
        name: String,
        value: Option<Expr>,
    },
    ServiceResponseMarker,
}

/// An attribute statement before evaluation.
#[derive(Debug, Clone)]
pub enum AttributeExpr {
    Constant {
        ty: TypeExpr,
        name: String,
        value: Expr,
    },
    Field {
        ty: TypeExpr,
        name: String,
    },
    /// A bare `void<N>` statement.
    Padding { bits: u64 },
}

/// A type reference before resolution.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Scalar(ScalarTypeExpr),
    Array {
        element: ScalarTypeExpr,
        /// Constant expression yielding the declared capacity.
        capacity: Box<Expr>,
        kind: ArrayKindExpr,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKindExpr {
    Fixed,
    VariableInclusive,
    VariableExclusive,
}

#[derive(Debug, Clone)]
pub enum ScalarTypeExpr {
    Primitive(PrimitiveTypeExpr),
    Void { bits: u64 },
    Versioned {
        name_components: Vec<String>,
        /// Absent in field position means "newest available version".
        version: Option<(u64, u64)>,
    },
}

#[derive(Debug, Clone)]
pub struct PrimitiveTypeExpr {
    pub name: PrimitiveNameExpr,
    /// `Some` when the cast mode keyword was spelled out in the source.
    pub explicit_cast: Option<CastModeExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastModeExpr {
    Saturated,
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveNameExpr {
    Boolean,
    Byte,
    Utf8,
    UnsignedInteger(u64),
    SignedInteger(u64),
    FloatingPoint(u64),
}

/// A constant expression before evaluation.
#[derive(Debug, Clone)]
pub enum Expr {
    Rational(BigRational),
    Boolean(bool),
    String(String),
    Set(Vec<Expr>),
    Identifier(String),
    Type(TypeExpr),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Attribute access, e.g. `ns.T.1.0.CONSTANT` or `{1, 2}.max`.
    Attribute(Box<Expr>, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Positive,
    Negative,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LogicalOr,
    LogicalAnd,
    Equal,
    NotEqual,
    LessOrEqual,
    GreaterOrEqual,
    Less,
    Greater,
    BitOr,
    BitXor,
    BitAnd,
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
}

impl BinaryOp {
    /// Symbol as written in the source, used in diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::LogicalOr => "||",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::FloorDivide => "//",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
        }
    }
}
