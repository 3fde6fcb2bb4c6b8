//! Parse DSDL definition text using the pest grammar and lower the concrete
//! tree into [`Line`] records.
//!
//! Expressions and type references come out unevaluated; the builder
//! interprets them because resolution may require reading other definitions.
//! Parse failures report the 1-based line number with a column-free message.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::pow;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

use crate::ast::{
    ArrayKindExpr, AttributeExpr, BinaryOp, CastModeExpr, Content, Expr, Line, PrimitiveNameExpr,
    PrimitiveTypeExpr, ScalarTypeExpr, TypeExpr, UnaryOp,
};
use crate::error::{Error, ErrorKind, Result};

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DsdlParser;

/// Parses one definition into per-line records.
pub fn parse(text: &str) -> Result<Vec<Line>> {
    let mut pairs =
        DsdlParser::parse(Rule::definition, text).map_err(|e| syntax_error_from_pest(&e))?;
    let definition = pairs
        .next()
        .ok_or_else(|| Error::from(ErrorKind::Internal("Empty parse result".into())))?;

    let mut lines = Vec::new();
    for line_pair in definition.into_inner() {
        if line_pair.as_rule() != Rule::line {
            continue; // EOI
        }
        let number = line_pair.as_span().start_pos().line_col().0;
        let mut content = Content::Empty;
        for inner in line_pair.into_inner() {
            if inner.as_rule() == Rule::statement {
                content = lower_statement(inner).map_err(|e| e.with_location(None, Some(number)))?;
            }
        }
        lines.push(Line { number, content });
    }
    Ok(lines)
}

fn syntax_error_from_pest(e: &pest::error::Error<Rule>) -> Error {
    let line = match e.line_col {
        pest::error::LineColLocation::Pos((l, _)) => l,
        pest::error::LineColLocation::Span((l, _), _) => l,
    };
    Error::new(ErrorKind::Syntax("Syntax error".into())).with_location(None, Some(line))
}

fn internal(what: &str) -> Error {
    ErrorKind::Internal(format!("Malformed parse tree: {}", what)).into()
}

fn sole_child(pair: Pair<'_, Rule>) -> Result<Pair<'_, Rule>> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| internal(&format!("{:?} has no children", rule)))
}

// ==================== Statements ====================

fn lower_statement(pair: Pair<'_, Rule>) -> Result<Content> {
    let inner = sole_child(pair)?;
    match inner.as_rule() {
        Rule::statement_directive => lower_directive(inner),
        Rule::statement_service_response_marker => Ok(Content::ServiceResponseMarker),
        Rule::statement_attribute => lower_attribute(inner),
        r => Err(internal(&format!("unexpected statement {:?}", r))),
    }
}

fn lower_directive(pair: Pair<'_, Rule>) -> Result<Content> {
    let inner = sole_child(pair)?;
    let with_expression = inner.as_rule() == Rule::statement_directive_with_expression;
    let mut children = inner.into_inner();
    let name = children
        .next()
        .ok_or_else(|| internal("directive name"))?
        .as_str()
        .to_string();
    let value = if with_expression {
        let expr = children.next().ok_or_else(|| internal("directive value"))?;
        Some(lower_expression(expr)?)
    } else {
        None
    };
    Ok(Content::Directive { name, value })
}

fn lower_attribute(pair: Pair<'_, Rule>) -> Result<Content> {
    let inner = sole_child(pair)?;
    let attribute = match inner.as_rule() {
        Rule::statement_constant => {
            let mut children = inner.into_inner();
            let ty = lower_dtype(children.next().ok_or_else(|| internal("constant type"))?)?;
            let name = children
                .next()
                .ok_or_else(|| internal("constant name"))?
                .as_str()
                .to_string();
            let value =
                lower_expression(children.next().ok_or_else(|| internal("constant value"))?)?;
            AttributeExpr::Constant { ty, name, value }
        }
        Rule::statement_field => {
            let mut children = inner.into_inner();
            let ty = lower_dtype(children.next().ok_or_else(|| internal("field type"))?)?;
            let name = children
                .next()
                .ok_or_else(|| internal("field name"))?
                .as_str()
                .to_string();
            AttributeExpr::Field { ty, name }
        }
        Rule::statement_padding_field => {
            let void = sole_child(inner)?;
            AttributeExpr::Padding {
                bits: parse_bit_suffix(void.as_str(), "void")?,
            }
        }
        r => return Err(internal(&format!("unexpected attribute {:?}", r))),
    };
    Ok(Content::Attribute(attribute))
}

// ==================== Data types ====================

fn lower_dtype(pair: Pair<'_, Rule>) -> Result<TypeExpr> {
    let inner = sole_child(pair)?;
    match inner.as_rule() {
        Rule::type_array | Rule::expr_type_array => {
            let mut children = inner.into_inner();
            let element = lower_scalar(children.next().ok_or_else(|| internal("array element"))?)?;
            let capacity = children.next().ok_or_else(|| internal("array capacity"))?;
            let (kind, capacity) = lower_array_capacity(capacity)?;
            Ok(TypeExpr::Array {
                element,
                capacity: Box::new(capacity),
                kind,
            })
        }
        Rule::type_scalar | Rule::expr_type_scalar => Ok(TypeExpr::Scalar(lower_scalar(inner)?)),
        r => Err(internal(&format!("unexpected type {:?}", r))),
    }
}

fn lower_array_capacity(pair: Pair<'_, Rule>) -> Result<(ArrayKindExpr, Expr)> {
    let inner = sole_child(pair)?;
    let kind = match inner.as_rule() {
        Rule::array_capacity_variable_inclusive => ArrayKindExpr::VariableInclusive,
        Rule::array_capacity_variable_exclusive => ArrayKindExpr::VariableExclusive,
        Rule::array_capacity_fixed => ArrayKindExpr::Fixed,
        r => return Err(internal(&format!("unexpected capacity {:?}", r))),
    };
    let expr = lower_expression(sole_child(inner)?)?;
    Ok((kind, expr))
}

/// Accepts `type_scalar` or `expr_type_scalar`.
fn lower_scalar(pair: Pair<'_, Rule>) -> Result<ScalarTypeExpr> {
    let inner = sole_child(pair)?;
    match inner.as_rule() {
        Rule::type_primitive => Ok(ScalarTypeExpr::Primitive(lower_primitive(inner)?)),
        Rule::type_void => Ok(ScalarTypeExpr::Void {
            bits: parse_bit_suffix(inner.as_str(), "void")?,
        }),
        Rule::type_versioned | Rule::type_versioned_exact => lower_versioned(inner),
        r => Err(internal(&format!("unexpected scalar {:?}", r))),
    }
}

fn lower_versioned(pair: Pair<'_, Rule>) -> Result<ScalarTypeExpr> {
    let mut name_components = Vec::new();
    let mut version = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::identifier => name_components.push(child.as_str().to_string()),
            Rule::type_version_specifier => {
                let mut numbers = child.into_inner();
                let major = parse_version_number(numbers.next().ok_or_else(|| internal("major"))?)?;
                let minor = parse_version_number(numbers.next().ok_or_else(|| internal("minor"))?)?;
                version = Some((major, minor));
            }
            r => return Err(internal(&format!("unexpected version component {:?}", r))),
        }
    }
    Ok(ScalarTypeExpr::Versioned {
        name_components,
        version,
    })
}

fn parse_version_number(pair: Pair<'_, Rule>) -> Result<u64> {
    pair.as_str()
        .parse()
        .map_err(|_| ErrorKind::Version("Could not parse the version numbers".into()).into())
}

fn lower_primitive(pair: Pair<'_, Rule>) -> Result<PrimitiveTypeExpr> {
    let inner = sole_child(pair)?;
    let mut explicit_cast = None;
    let mut name_pair = None;
    let truncated = inner.as_rule() == Rule::type_primitive_truncated;
    for child in inner.into_inner() {
        match child.as_rule() {
            Rule::kw_truncated => explicit_cast = Some(CastModeExpr::Truncated),
            Rule::kw_saturated => explicit_cast = Some(CastModeExpr::Saturated),
            Rule::type_primitive_name => name_pair = Some(child),
            r => return Err(internal(&format!("unexpected primitive component {:?}", r))),
        }
    }
    if truncated && explicit_cast.is_none() {
        return Err(internal("missing truncated keyword"));
    }
    let name_pair = name_pair.ok_or_else(|| internal("primitive name"))?;
    let name = sole_child(name_pair)?;
    let name = match name.as_rule() {
        Rule::type_primitive_name_boolean => PrimitiveNameExpr::Boolean,
        Rule::type_primitive_name_byte => PrimitiveNameExpr::Byte,
        Rule::type_primitive_name_utf8 => PrimitiveNameExpr::Utf8,
        Rule::type_primitive_name_unsigned_integer => {
            PrimitiveNameExpr::UnsignedInteger(parse_bit_suffix(name.as_str(), "uint")?)
        }
        Rule::type_primitive_name_signed_integer => {
            PrimitiveNameExpr::SignedInteger(parse_bit_suffix(name.as_str(), "int")?)
        }
        Rule::type_primitive_name_floating_point => {
            PrimitiveNameExpr::FloatingPoint(parse_bit_suffix(name.as_str(), "float")?)
        }
        r => return Err(internal(&format!("unexpected primitive name {:?}", r))),
    };
    Ok(PrimitiveTypeExpr {
        name,
        explicit_cast,
    })
}

fn parse_bit_suffix(text: &str, keyword: &str) -> Result<u64> {
    text[keyword.len()..]
        .parse()
        .map_err(|_| ErrorKind::Semantic(format!("Invalid bit length in {:?}", text)).into())
}

// ==================== Expressions ====================

fn lower_expression(pair: Pair<'_, Rule>) -> Result<Expr> {
    match pair.as_rule() {
        Rule::expression
        | Rule::ex_logical_not
        | Rule::ex_inversion
        | Rule::expression_parenthesized => lower_expression(sole_child(pair)?),
        Rule::ex_logical | Rule::ex_comparison | Rule::ex_bitwise | Rule::ex_additive
        | Rule::ex_multiplicative => lower_binary_chain(pair),
        Rule::op1_form_log_not => Ok(Expr::Unary(
            UnaryOp::LogicalNot,
            Box::new(lower_expression(sole_child(pair)?)?),
        )),
        Rule::op1_form_inv_pos => Ok(Expr::Unary(
            UnaryOp::Positive,
            Box::new(lower_expression(sole_child(pair)?)?),
        )),
        Rule::op1_form_inv_neg => Ok(Expr::Unary(
            UnaryOp::Negative,
            Box::new(lower_expression(sole_child(pair)?)?),
        )),
        Rule::ex_exponential => {
            let mut children = pair.into_inner();
            let left = lower_expression(children.next().ok_or_else(|| internal("base"))?)?;
            match children.next() {
                None => Ok(left),
                Some(_op) => {
                    let right =
                        lower_expression(children.next().ok_or_else(|| internal("exponent"))?)?;
                    Ok(Expr::Binary(BinaryOp::Power, Box::new(left), Box::new(right)))
                }
            }
        }
        Rule::ex_attribute => {
            let mut children = pair.into_inner();
            let mut out = lower_expression(children.next().ok_or_else(|| internal("atom"))?)?;
            for name in children {
                out = Expr::Attribute(Box::new(out), name.as_str().to_string());
            }
            Ok(out)
        }
        Rule::expression_atom => {
            let inner = sole_child(pair)?;
            match inner.as_rule() {
                Rule::expression_parenthesized => lower_expression(sole_child(inner)?),
                Rule::literal => lower_literal(inner),
                Rule::expr_type => Ok(Expr::Type(lower_dtype(inner)?)),
                Rule::identifier => Ok(Expr::Identifier(inner.as_str().to_string())),
                r => Err(internal(&format!("unexpected atom {:?}", r))),
            }
        }
        r => Err(internal(&format!("unexpected expression {:?}", r))),
    }
}

fn lower_binary_chain(pair: Pair<'_, Rule>) -> Result<Expr> {
    let mut children = pair.into_inner();
    let mut left = lower_expression(children.next().ok_or_else(|| internal("operand"))?)?;
    while let Some(op_pair) = children.next() {
        let op = binary_op_from_symbol(op_pair.as_str())?;
        let right = lower_expression(children.next().ok_or_else(|| internal("operand"))?)?;
        left = Expr::Binary(op, Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn binary_op_from_symbol(symbol: &str) -> Result<BinaryOp> {
    Ok(match symbol {
        "||" => BinaryOp::LogicalOr,
        "&&" => BinaryOp::LogicalAnd,
        "==" => BinaryOp::Equal,
        "!=" => BinaryOp::NotEqual,
        "<=" => BinaryOp::LessOrEqual,
        ">=" => BinaryOp::GreaterOrEqual,
        "<" => BinaryOp::Less,
        ">" => BinaryOp::Greater,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "&" => BinaryOp::BitAnd,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Subtract,
        "*" => BinaryOp::Multiply,
        "/" => BinaryOp::Divide,
        "//" => BinaryOp::FloorDivide,
        "%" => BinaryOp::Modulo,
        "**" => BinaryOp::Power,
        s => return Err(internal(&format!("unknown operator {:?}", s))),
    })
}

// ==================== Literals ====================

fn lower_literal(pair: Pair<'_, Rule>) -> Result<Expr> {
    let inner = sole_child(pair)?;
    match inner.as_rule() {
        Rule::literal_set => {
            let list = sole_child(inner)?;
            let mut items = Vec::new();
            for expr in list.into_inner() {
                items.push(lower_expression(expr)?);
            }
            Ok(Expr::Set(items))
        }
        Rule::literal_real => Ok(Expr::Rational(parse_real_literal(inner.as_str())?)),
        Rule::literal_integer => Ok(Expr::Rational(BigRational::from_integer(
            parse_integer_literal(inner.as_str())?,
        ))),
        Rule::literal_string => Ok(Expr::String(parse_string_literal(inner.as_str())?)),
        Rule::literal_boolean => {
            let which = sole_child(inner)?;
            Ok(Expr::Boolean(
                which.as_rule() == Rule::literal_boolean_true,
            ))
        }
        r => Err(internal(&format!("unexpected literal {:?}", r))),
    }
}

pub(crate) fn parse_integer_literal(text: &str) -> Result<BigInt> {
    let text: String = text.chars().filter(|c| *c != '_').collect();
    let (digits, radix) = match text.get(..2) {
        Some("0b") | Some("0B") => (&text[2..], 2),
        Some("0o") | Some("0O") => (&text[2..], 8),
        Some("0x") | Some("0X") => (&text[2..], 16),
        _ => (&text[..], 10),
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| ErrorKind::Syntax(format!("Invalid integer literal {:?}", text)).into())
}

pub(crate) fn parse_real_literal(text: &str) -> Result<BigRational> {
    let text: String = text.chars().filter(|c| *c != '_').collect();
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(i) => {
            let exp: i32 = text[i + 1..]
                .parse()
                .map_err(|_| Error::from(ErrorKind::Syntax("Exponent is too large".into())))?;
            (&text[..i], exp)
        }
        None => (&text[..], 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, ""),
    };
    let digits: String = format!("{}{}", int_part, frac_part);
    let digits = if digits.is_empty() { "0".into() } else { digits };
    let mantissa = BigInt::parse_bytes(digits.as_bytes(), 10)
        .ok_or_else(|| Error::from(ErrorKind::Syntax(format!("Invalid real literal {:?}", text))))?;
    let scale = exponent as i64 - frac_part.len() as i64;
    let ten = BigInt::from(10);
    if scale >= 0 {
        Ok(BigRational::from_integer(mantissa * pow(ten, scale as usize)))
    } else {
        Ok(BigRational::new(mantissa, pow(ten, (-scale) as usize)))
    }
}

pub(crate) fn parse_string_literal(literal: &str) -> Result<String> {
    let malformed = || Error::from(ErrorKind::Syntax("Malformed string literal".into()));
    if literal.len() < 2 {
        return Err(malformed());
    }
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escape = chars.next().ok_or_else(|| {
            Error::from(ErrorKind::Syntax("Unexpected end of string literal".into()))
        })?;
        match escape {
            'u' | 'U' => {
                let width = if escape == 'u' { 4 } else { 8 };
                let mut hex = String::with_capacity(width);
                for _ in 0..width {
                    let digit = chars.next().ok_or_else(|| {
                        Error::from(ErrorKind::Syntax("Unexpected end of string literal".into()))
                    })?;
                    if !digit.is_ascii_hexdigit() {
                        return Err(ErrorKind::Syntax(format!(
                            "Invalid hex character: {:?}",
                            digit
                        ))
                        .into());
                    }
                    hex.push(digit);
                }
                let code_point = u32::from_str_radix(&hex, 16).map_err(|_| malformed())?;
                let c = char::from_u32(code_point).ok_or_else(|| {
                    Error::from(ErrorKind::Syntax(format!(
                        "Invalid code point U+{:04X}",
                        code_point
                    )))
                })?;
                out.push(c);
            }
            other => {
                let c = match other.to_ascii_lowercase() {
                    'r' => '\r',
                    'n' => '\n',
                    't' => '\t',
                    '\'' => '\'',
                    '"' => '"',
                    '\\' => '\\',
                    _ => {
                        return Err(ErrorKind::Syntax("Invalid escape sequence".into()).into());
                    }
                };
                out.push(c);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Vec<Line> {
        parse(text).expect("parse")
    }

    fn single_statement(text: &str) -> Content {
        let lines = parse_ok(text);
        lines
            .into_iter()
            .map(|l| l.content)
            .find(|c| !matches!(c, Content::Empty))
            .expect("statement")
    }

    #[test]
    fn empty_and_comment_lines() {
        let lines = parse_ok("# header comment\n\n");
        assert!(lines.iter().all(|l| matches!(l.content, Content::Empty)));
        assert!(parse_ok("").iter().all(|l| matches!(l.content, Content::Empty)));
    }

    #[test]
    fn field_statement() {
        match single_statement("saturated uint8 value\n") {
            Content::Attribute(AttributeExpr::Field { ty, name }) => {
                assert_eq!(name, "value");
                match ty {
                    TypeExpr::Scalar(ScalarTypeExpr::Primitive(p)) => {
                        assert_eq!(p.name, PrimitiveNameExpr::UnsignedInteger(8));
                        assert_eq!(p.explicit_cast, Some(CastModeExpr::Saturated));
                    }
                    t => panic!("unexpected type {:?}", t),
                }
            }
            c => panic!("unexpected content {:?}", c),
        }
    }

    #[test]
    fn implicit_cast_mode_is_unspecified() {
        match single_statement("uint8 x\n") {
            Content::Attribute(AttributeExpr::Field { ty, .. }) => match ty {
                TypeExpr::Scalar(ScalarTypeExpr::Primitive(p)) => {
                    assert_eq!(p.explicit_cast, None);
                }
                t => panic!("unexpected type {:?}", t),
            },
            c => panic!("unexpected content {:?}", c),
        }
    }

    #[test]
    fn padding_and_named_void() {
        assert!(matches!(
            single_statement("void3\n"),
            Content::Attribute(AttributeExpr::Padding { bits: 3 })
        ));
        // A named void field parses as a field; the builder rejects it.
        assert!(matches!(
            single_statement("void3 oops\n"),
            Content::Attribute(AttributeExpr::Field { .. })
        ));
    }

    #[test]
    fn versioned_references() {
        match single_statement("ns.sub.Type.1.2 field\n") {
            Content::Attribute(AttributeExpr::Field { ty, .. }) => match ty {
                TypeExpr::Scalar(ScalarTypeExpr::Versioned {
                    name_components,
                    version,
                }) => {
                    assert_eq!(name_components, vec!["ns", "sub", "Type"]);
                    assert_eq!(version, Some((1, 2)));
                }
                t => panic!("unexpected type {:?}", t),
            },
            c => panic!("unexpected content {:?}", c),
        }
        // The version may be omitted in field position.
        match single_statement("Type field\n") {
            Content::Attribute(AttributeExpr::Field { ty, .. }) => match ty {
                TypeExpr::Scalar(ScalarTypeExpr::Versioned {
                    name_components,
                    version,
                }) => {
                    assert_eq!(name_components, vec!["Type"]);
                    assert_eq!(version, None);
                }
                t => panic!("unexpected type {:?}", t),
            },
            c => panic!("unexpected content {:?}", c),
        }
    }

    #[test]
    fn directives() {
        assert!(matches!(
            single_statement("@sealed\n"),
            Content::Directive { ref name, value: None } if name == "sealed"
        ));
        assert!(matches!(
            single_statement("@extent 64\n"),
            Content::Directive { ref name, value: Some(_) } if name == "extent"
        ));
    }

    #[test]
    fn service_marker() {
        assert!(matches!(
            single_statement("---\n"),
            Content::ServiceResponseMarker
        ));
        assert!(matches!(
            single_statement("-------\n"),
            Content::ServiceResponseMarker
        ));
    }

    #[test]
    fn comparison_does_not_chain() {
        assert!(parse("@assert 1 < 2\n").is_ok());
        assert!(parse("@assert 1 < 2 < 3\n").is_err());
    }

    #[test]
    fn line_numbers_are_one_based() {
        let lines = parse_ok("\n\nuint8 x\n");
        let line = lines
            .iter()
            .find(|l| !matches!(l.content, Content::Empty))
            .expect("statement");
        assert_eq!(line.number, 3);
    }

    #[test]
    fn integer_literals() {
        assert_eq!(parse_integer_literal("123").expect("dec"), BigInt::from(123));
        assert_eq!(parse_integer_literal("1_000").expect("dec"), BigInt::from(1000));
        assert_eq!(parse_integer_literal("0xFF").expect("hex"), BigInt::from(255));
        assert_eq!(parse_integer_literal("0b1010").expect("bin"), BigInt::from(10));
        assert_eq!(parse_integer_literal("0o777").expect("oct"), BigInt::from(511));
    }

    #[test]
    fn real_literals() {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert_eq!(parse_real_literal("0.5").expect("real"), half);
        assert_eq!(parse_real_literal(".5").expect("real"), half);
        assert_eq!(
            parse_real_literal("5e-1").expect("real"),
            half
        );
        assert_eq!(
            parse_real_literal("12.5e-3").expect("real"),
            BigRational::new(BigInt::from(1), BigInt::from(80))
        );
        assert_eq!(
            parse_real_literal("1e3").expect("real"),
            BigRational::from_integer(BigInt::from(1000))
        );
    }

    #[test]
    fn string_literals() {
        assert_eq!(parse_string_literal("'evening'").expect("ok"), "evening");
        assert_eq!(parse_string_literal("\"вечер\"").expect("ok"), "вечер");
        assert_eq!(parse_string_literal("'a\\tb'").expect("ok"), "a\tb");
        assert_eq!(parse_string_literal("'\\N'").expect("ok"), "\n");
        assert_eq!(parse_string_literal("'\\u0041'").expect("ok"), "A");
        assert_eq!(parse_string_literal("'\\U0001F600'").expect("ok"), "\u{1F600}");
        assert_eq!(parse_string_literal("'\\\\'").expect("ok"), "\\");
        assert_eq!(parse_string_literal("'\\''").expect("ok"), "'");
        assert!(parse_string_literal("'\\z'").is_err());
        assert!(parse_string_literal("'\\u00ZZ'").is_err());
        assert!(parse_string_literal("'\\uD800'").is_err()); // Surrogate
        assert!(parse_string_literal("'\\u'").is_err());
    }

    #[test]
    fn expression_shapes() {
        // Precedence: 1 + 2 * 3 parses as 1 + (2 * 3).
        match single_statement("@assert 1 + 2 * 3 == 7\n") {
            Content::Directive { value: Some(expr), .. } => {
                assert!(matches!(expr, Expr::Binary(BinaryOp::Equal, _, _)));
            }
            c => panic!("unexpected content {:?}", c),
        }
        // Attribute access chains left.
        match single_statement("@print ns.T.1.0.FOO\n") {
            Content::Directive { value: Some(expr), .. } => match expr {
                Expr::Attribute(base, name) => {
                    assert_eq!(name, "FOO");
                    assert!(matches!(*base, Expr::Type(_)));
                }
                e => panic!("unexpected expr {:?}", e),
            },
            c => panic!("unexpected content {:?}", c),
        }
        // A bare identifier followed by an attribute stays an identifier.
        match single_statement("@print X.min\n") {
            Content::Directive { value: Some(expr), .. } => match expr {
                Expr::Attribute(base, name) => {
                    assert_eq!(name, "min");
                    assert!(matches!(*base, Expr::Identifier(_)));
                }
                e => panic!("unexpected expr {:?}", e),
            },
            c => panic!("unexpected content {:?}", c),
        }
    }
}
