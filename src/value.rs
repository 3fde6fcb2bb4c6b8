//! Constant expression values and their operator algebra.
//!
//! A [`Value`] is the result of evaluating a constant expression: an exact
//! rational, a boolean, a string, a homogeneous set, or a serializable type
//! (types are first-class values in the expression language). The operator
//! functions implement the full algebra: exact fraction arithmetic,
//! integer-only operators, string concatenation and ordering, set algebra
//! with elementwise broadcasting, and attribute access.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_integer::{Integer, Roots};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{Error, ErrorKind, Result};
use crate::types::SerializableType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Rational(BigRational),
    Boolean(bool),
    String(String),
    Set(SetValue),
    Type(SerializableType),
}

impl Value {
    pub fn rational_from_integer(value: impl Into<BigInt>) -> Value {
        Value::Rational(BigRational::from_integer(value.into()))
    }

    /// The DSDL-facing name of the value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Rational(_) => "rational",
            Value::Boolean(_) => "bool",
            Value::String(_) => "string",
            Value::Set(_) => "set",
            Value::Type(_) => "metaserializable",
        }
    }

    fn kind_tag(&self) -> u8 {
        match self {
            Value::Rational(_) => 0,
            Value::Boolean(_) => 1,
            Value::String(_) => 2,
            Value::Set(_) => 3,
            Value::Type(_) => 4,
        }
    }

    /// The contained rational if it is an exact integer.
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Value::Rational(r) if r.is_integer() => Some(r.numer()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Rational(r) => write!(f, "{}", r),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::String(s) => {
                write!(f, "'")?;
                for c in s.chars() {
                    match c {
                        '\'' => write!(f, "\\'")?,
                        '\\' => write!(f, "\\\\")?,
                        '\r' => write!(f, "\\r")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "'")
            }
            Value::Set(s) => s.fmt(f),
            Value::Type(t) => t.fmt(f),
        }
    }
}

// ==================== Sets ====================

/// A non-empty, homogeneous, deduplicated set of values.
#[derive(Debug, Clone)]
pub struct SetValue {
    items: Vec<Value>,
}

impl SetValue {
    pub fn new(items: Vec<Value>) -> Result<Self> {
        if items.is_empty() {
            return Err(ErrorKind::InvalidOperand(
                "Zero-length sets are not permitted because their element type cannot be deduced"
                    .into(),
            )
            .into());
        }
        let tag = items[0].kind_tag();
        if items.iter().any(|v| v.kind_tag() != tag) {
            return Err(ErrorKind::InvalidOperand("Heterogeneous sets are not permitted".into()).into());
        }
        let mut deduplicated: Vec<Value> = Vec::with_capacity(items.len());
        for v in items {
            if !deduplicated.contains(&v) {
                deduplicated.push(v);
            }
        }
        Ok(SetValue {
            items: deduplicated,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        false // Construction rejects empty sets.
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    fn element_kind(&self) -> u8 {
        self.items[0].kind_tag()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    fn is_subset_of(&self, other: &SetValue) -> bool {
        self.items.iter().all(|v| other.contains(v))
    }
}

impl PartialEq for SetValue {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len() && self.is_subset_of(other)
    }
}

impl fmt::Display for SetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, v) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "}}")
    }
}

// ==================== Operator application ====================

fn undefined_operator(op: &str, left: &Value, right: &Value) -> Error {
    ErrorKind::InvalidOperand(format!(
        "The operator {} is not defined for {} and {}",
        op,
        left.kind_name(),
        right.kind_name()
    ))
    .into()
}

pub fn apply_unary(op: UnaryOp, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Positive, Value::Rational(r)) => Ok(Value::Rational(r.clone())),
        (UnaryOp::Negative, Value::Rational(r)) => Ok(Value::Rational(-r.clone())),
        (UnaryOp::LogicalNot, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        _ => Err(ErrorKind::InvalidOperand(format!(
            "The requested unary operator is not defined for {}",
            operand.kind_name()
        ))
        .into()),
    }
}

pub fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::LogicalOr | BinaryOp::LogicalAnd => match (left, right) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(match op {
                BinaryOp::LogicalOr => *a || *b,
                _ => *a && *b,
            })),
            _ => Err(undefined_operator(op.symbol(), left, right)),
        },
        BinaryOp::Equal
        | BinaryOp::NotEqual
        | BinaryOp::Less
        | BinaryOp::LessOrEqual
        | BinaryOp::Greater
        | BinaryOp::GreaterOrEqual => compare(op, left, right),
        BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd => match (left, right) {
            (Value::Rational(a), Value::Rational(b)) => {
                let (x, y) = both_integers(a, b)?;
                let out = match op {
                    BinaryOp::BitOr => x | y,
                    BinaryOp::BitXor => x ^ y,
                    _ => x & y,
                };
                Ok(Value::rational_from_integer(out))
            }
            (Value::Set(a), Value::Set(b)) => set_algebra(op, a, b),
            _ => Err(undefined_operator(op.symbol(), left, right)),
        },
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::FloorDivide
        | BinaryOp::Modulo
        | BinaryOp::Power => arithmetic(op, left, right),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let result = match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => ordering_outcome(op, a.cmp(b)),
        (Value::String(a), Value::String(b)) => ordering_outcome(op, a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => match op {
            BinaryOp::Equal => a == b,
            BinaryOp::NotEqual => a != b,
            _ => return Err(undefined_operator(op.symbol(), left, right)),
        },
        (Value::Set(a), Value::Set(b)) => {
            if a.element_kind() != b.element_kind() {
                return Err(ErrorKind::InvalidOperand(
                    "The requested binary operator is defined only for sets \
                     that share the same element type"
                        .into(),
                )
                .into());
            }
            match op {
                BinaryOp::Equal => a == b,
                BinaryOp::NotEqual => a != b,
                BinaryOp::LessOrEqual => a.is_subset_of(b),
                BinaryOp::GreaterOrEqual => b.is_subset_of(a),
                BinaryOp::Less => a.is_subset_of(b) && a != b,
                BinaryOp::Greater => b.is_subset_of(a) && a != b,
                _ => unreachable!(),
            }
        }
        _ => return Err(undefined_operator(op.symbol(), left, right)),
    };
    Ok(Value::Boolean(result))
}

fn ordering_outcome(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Equal => ord == Ordering::Equal,
        BinaryOp::NotEqual => ord != Ordering::Equal,
        BinaryOp::Less => ord == Ordering::Less,
        BinaryOp::LessOrEqual => ord != Ordering::Greater,
        BinaryOp::Greater => ord == Ordering::Greater,
        BinaryOp::GreaterOrEqual => ord != Ordering::Less,
        _ => unreachable!(),
    }
}

fn set_algebra(op: BinaryOp, a: &SetValue, b: &SetValue) -> Result<Value> {
    if a.element_kind() != b.element_kind() {
        return Err(ErrorKind::InvalidOperand(
            "The requested binary operator is defined only for sets \
             that share the same element type"
                .into(),
        )
        .into());
    }
    let items: Vec<Value> = match op {
        BinaryOp::BitOr => a.iter().chain(b.iter()).cloned().collect(),
        BinaryOp::BitAnd => a.iter().filter(|v| b.contains(v)).cloned().collect(),
        BinaryOp::BitXor => a
            .iter()
            .filter(|v| !b.contains(v))
            .chain(b.iter().filter(|v| !a.contains(v)))
            .cloned()
            .collect(),
        _ => unreachable!(),
    };
    Ok(Value::Set(SetValue::new(items)?))
}

/// Arithmetic operators, with elementwise broadcasting over sets: a set on
/// either side maps the operator over its elements; sets on both sides take
/// the Cartesian product. Results are deduplicated by set construction.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Set(a), Value::Set(b)) => {
            let mut items = Vec::with_capacity(a.len() * b.len());
            for x in a.iter() {
                for y in b.iter() {
                    items.push(arithmetic(op, x, y)?);
                }
            }
            Ok(Value::Set(SetValue::new(items)?))
        }
        (Value::Set(a), _) => {
            let items = a
                .iter()
                .map(|x| arithmetic(op, x, right))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Set(SetValue::new(items)?))
        }
        (_, Value::Set(b)) => {
            let items = b
                .iter()
                .map(|y| arithmetic(op, left, y))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Set(SetValue::new(items)?))
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::Rational(a), Value::Rational(b)) => rational_arithmetic(op, a, b),
        _ => Err(undefined_operator(op.symbol(), left, right)),
    }
}

fn rational_arithmetic(op: BinaryOp, a: &BigRational, b: &BigRational) -> Result<Value> {
    let out = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => {
            if b.is_zero() {
                return Err(division_by_zero(a));
            }
            a / b
        }
        BinaryOp::FloorDivide => {
            let (x, y) = both_integers(a, b)?;
            if y.is_zero() {
                return Err(division_by_zero(a));
            }
            BigRational::from_integer(x.div_floor(&y))
        }
        BinaryOp::Modulo => {
            let (x, y) = both_integers(a, b)?;
            if y.is_zero() {
                return Err(division_by_zero(a));
            }
            // Floored modulo: the result takes the sign of the divisor.
            BigRational::from_integer(x.mod_floor(&y))
        }
        BinaryOp::Power => return rational_power(a, b),
        _ => unreachable!(),
    };
    Ok(Value::Rational(out))
}

fn division_by_zero(a: &BigRational) -> Error {
    ErrorKind::InvalidOperand(format!("Cannot divide {} by zero", a)).into()
}

fn both_integers(a: &BigRational, b: &BigRational) -> Result<(BigInt, BigInt)> {
    if !a.is_integer() || !b.is_integer() {
        return Err(ErrorKind::InvalidOperand(format!(
            "The requested operator requires integer operands; got {} and {}",
            a, b
        ))
        .into());
    }
    Ok((a.numer().clone(), b.numer().clone()))
}

/// Exact exponentiation. Integer exponents always succeed (except zero to a
/// negative power); a fractional exponent p/q succeeds only when the base is
/// an exact q-th power.
fn rational_power(base: &BigRational, exponent: &BigRational) -> Result<Value> {
    let p = exponent.numer();
    let q = exponent.denom(); // Always positive after normalization.
    let root = if q.is_one() {
        base.clone()
    } else {
        let q: u32 = q.to_u32().ok_or_else(|| {
            Error::from(ErrorKind::InvalidOperand(format!(
                "Exponent denominator {} is too large",
                q
            )))
        })?;
        if base.is_negative() && q % 2 == 0 {
            return Err(ErrorKind::InvalidOperand(format!(
                "The result of {} ** {} is not a rational number",
                base, exponent
            ))
            .into());
        }
        let nr = base.numer().nth_root(q);
        let dr = base.denom().nth_root(q);
        let exact = num_traits::pow(nr.clone(), q as usize) == *base.numer()
            && num_traits::pow(dr.clone(), q as usize) == *base.denom();
        if !exact {
            return Err(ErrorKind::InvalidOperand(format!(
                "The result of {} ** {} is not a rational number",
                base, exponent
            ))
            .into());
        }
        BigRational::new(nr, dr)
    };
    let magnitude = p.magnitude().to_usize().ok_or_else(|| {
        Error::from(ErrorKind::InvalidOperand(format!(
            "Exponent {} is too large",
            p
        )))
    })?;
    let mut out = num_traits::pow(root, magnitude);
    if p.is_negative() {
        if out.is_zero() {
            return Err(division_by_zero(base));
        }
        out = out.recip();
    }
    Ok(Value::Rational(out))
}

// ==================== Attribute access ====================

/// Implements the `.` operator: constant lookup on composite types and the
/// `min`/`max`/`count` attributes of sets.
pub fn attribute(value: &Value, name: &str) -> Result<Value> {
    match value {
        Value::Set(s) => match name {
            "min" | "max" => {
                let op = if name == "min" {
                    BinaryOp::Less
                } else {
                    BinaryOp::Greater
                };
                let mut best = s.iter().next().cloned().ok_or_else(|| {
                    Error::from(ErrorKind::Internal("Empty set value".into()))
                })?;
                for v in s.iter().skip(1) {
                    if let Value::Boolean(true) = compare(op, v, &best)? {
                        best = v.clone();
                    }
                }
                Ok(best)
            }
            "count" => Ok(Value::rational_from_integer(s.len() as i64)),
            _ => Err(invalid_attribute(name)),
        },
        Value::Type(SerializableType::Composite(c)) => c
            .constant_value(name)
            .cloned()
            .ok_or_else(|| invalid_attribute(name)),
        _ => Err(invalid_attribute(name)),
    }
}

fn invalid_attribute(name: &str) -> Error {
    ErrorKind::UndefinedAttribute(format!("Invalid attribute name: {:?}", name)).into()
}
