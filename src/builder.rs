//! Interprets lowered definition lines into built data types.
//!
//! The [`BuildContext`] is shared across one `read_namespace` call: it holds
//! the lookup definitions, the cache of already built types, the cycle
//! guard, and the print handler. A [`DataTypeBuilder`] processes the lines
//! of a single definition: it maintains per-section state, dispatches
//! directives, and evaluates constant expressions in the attribute-scoped
//! environment.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::ast::{
    AttributeExpr, CastModeExpr, Content, Expr, Line, PrimitiveNameExpr, PrimitiveTypeExpr,
    ScalarTypeExpr, TypeExpr,
};
use crate::bitset::BitLengthSet;
use crate::definition::Definition;
use crate::error::{Error, ErrorKind, Result};
use crate::parser;
use crate::types::{
    bit_width, is_valid_regulated_service_id, is_valid_regulated_subject_id, ArrayKind, ArrayType,
    Attribute, CastMode, CompositeParams, CompositeType, DataType, PrimitiveType, Sealing,
    SerializableType, ServiceType, StructureKind, Version, VoidType, NAME_COMPONENT_SEPARATOR,
};
use crate::value::{self, SetValue, Value};
use crate::PrintHandler;

type TypeKey = (String, u8, u8);

pub(crate) struct BuildContext<'a, 'b> {
    lookup_definitions: &'a [Definition],
    print_handler: Option<&'a mut PrintHandler<'b>>,
    allow_unregulated_fixed_port_id: bool,
    cache: HashMap<TypeKey, DataType>,
    in_progress: HashSet<TypeKey>,
}

impl<'a, 'b> BuildContext<'a, 'b> {
    pub fn new(
        lookup_definitions: &'a [Definition],
        print_handler: Option<&'a mut PrintHandler<'b>>,
        allow_unregulated_fixed_port_id: bool,
    ) -> Self {
        BuildContext {
            lookup_definitions,
            print_handler,
            allow_unregulated_fixed_port_id,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    fn emit(&mut self, path: &Path, line: usize, text: &str) {
        if let Some(handler) = self.print_handler.as_mut() {
            handler(path, line, text);
        }
    }

    /// Builds one definition, reusing the cache and guarding against
    /// reference cycles through the build stack.
    pub fn build(&mut self, definition: &Definition) -> Result<DataType> {
        let version = definition.version();
        let key: TypeKey = (
            definition.full_name().to_string(),
            version.major,
            version.minor,
        );
        if let Some(built) = self.cache.get(&key) {
            return Ok(built.clone());
        }
        if self.in_progress.contains(&key) {
            return Err(Error::new(ErrorKind::CyclicDependency(format!(
                "Cyclic dependency through {}.{}",
                definition.full_name(),
                version
            )))
            .with_location(Some(definition.file_path()), None));
        }
        self.in_progress.insert(key.clone());
        let outcome = self.build_uncached(definition);
        self.in_progress.remove(&key);
        let built = outcome.map_err(|mut e| {
            e.set_location_if_unknown(Some(definition.file_path()), None);
            e
        })?;
        self.cache.insert(key, built.clone());
        Ok(built)
    }

    fn build_uncached(&mut self, definition: &Definition) -> Result<DataType> {
        log::debug!(
            "Processing {}.{} from {}",
            definition.full_name(),
            definition.version(),
            definition.file_path().display()
        );
        let text = definition.read_text()?;
        let lines = parser::parse(&text)?;
        let mut builder = DataTypeBuilder::new(definition);
        for line in &lines {
            builder
                .process_line(self, line)
                .map_err(|e| e.with_location(None, Some(line.number)))?;
        }
        builder.finalize(self)
    }
}

struct SectionBuilder {
    attributes: Vec<Attribute>,
    is_union: bool,
    sealing: Option<Sealing>,
    /// Set once `_offset_` has been observed in a union section; adding a
    /// field afterwards would invalidate the analysis.
    offset_observed_in_union: bool,
}

impl SectionBuilder {
    fn new() -> Self {
        SectionBuilder {
            attributes: Vec::new(),
            is_union: false,
            sealing: None,
            offset_observed_in_union: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Bit lengths of the section as laid out so far.
    fn bit_length_set(&self) -> Result<BitLengthSet> {
        let field_sets: Vec<BitLengthSet> = self
            .attributes
            .iter()
            .filter_map(|a| a.bit_length_set())
            .collect();
        if self.is_union {
            if field_sets.is_empty() {
                return Err(ErrorKind::Semantic(
                    "Bit length analysis is not defined for an empty union".into(),
                )
                .into());
            }
            let tag = BitLengthSet::singleton(bit_width(field_sets.len() as u64 - 1));
            let united = field_sets
                .iter()
                .skip(1)
                .fold(field_sets[0].clone(), |acc, s| acc.unite(s));
            Ok(tag.concatenate(&united))
        } else {
            Ok(field_sets
                .iter()
                .fold(BitLengthSet::singleton(0), |acc, s| acc.concatenate(s)))
        }
    }

    fn add_field_like(&mut self, attribute: Attribute) -> Result<()> {
        if self.is_union && self.offset_observed_in_union {
            return Err(ErrorKind::Semantic(
                "Inter-field offset is not defined for unions; \
                 the previously performed bit length analysis is invalid"
                    .into(),
            )
            .into());
        }
        self.attributes.push(attribute);
        Ok(())
    }
}

pub(crate) struct DataTypeBuilder<'d> {
    definition: &'d Definition,
    sections: Vec<SectionBuilder>,
    deprecated: bool,
    current_line: usize,
}

impl<'d> DataTypeBuilder<'d> {
    fn new(definition: &'d Definition) -> Self {
        DataTypeBuilder {
            definition,
            sections: vec![SectionBuilder::new()],
            deprecated: false,
            current_line: 1,
        }
    }

    fn section(&self) -> &SectionBuilder {
        self.sections.last().unwrap_or_else(|| unreachable!())
    }

    fn section_mut(&mut self) -> &mut SectionBuilder {
        self.sections.last_mut().unwrap_or_else(|| unreachable!())
    }

    fn process_line(&mut self, ctx: &mut BuildContext<'_, '_>, line: &Line) -> Result<()> {
        self.current_line = line.number;
        match &line.content {
            Content::Empty => Ok(()),
            Content::ServiceResponseMarker => {
                if self.sections.len() > 1 {
                    return Err(
                        ErrorKind::Semantic("Duplicated service response marker".into()).into(),
                    );
                }
                self.sections.push(SectionBuilder::new());
                Ok(())
            }
            Content::Attribute(attribute) => self.on_attribute(ctx, attribute),
            Content::Directive { name, value } => self.on_directive(ctx, name, value.as_ref()),
        }
    }

    // ==================== Attributes ====================

    fn on_attribute(&mut self, ctx: &mut BuildContext<'_, '_>, attribute: &AttributeExpr) -> Result<()> {
        match attribute {
            AttributeExpr::Constant { ty, name, value } => {
                let resolved = self.resolve_type_expr(ctx, ty)?;
                let primitive = match resolved {
                    SerializableType::Primitive(p) => p,
                    other => {
                        return Err(ErrorKind::Semantic(format!(
                            "Invalid constant type: {}",
                            other
                        ))
                        .into());
                    }
                };
                let value = self.evaluate(ctx, value)?;
                let constant = Attribute::constant(primitive, name.clone(), value)?;
                self.section_mut().attributes.push(constant);
                Ok(())
            }
            AttributeExpr::Field { ty, name } => {
                let resolved = self.resolve_type_expr(ctx, ty)?;
                match &resolved {
                    SerializableType::Void(_) => {
                        return Err(ErrorKind::Naming(
                            "Void-typed fields can be used only for padding and cannot be named"
                                .into(),
                        )
                        .into());
                    }
                    SerializableType::Primitive(PrimitiveType::Byte) => {
                        return Err(ErrorKind::Semantic(
                            "The byte type can only be used as an array element type".into(),
                        )
                        .into());
                    }
                    SerializableType::Primitive(PrimitiveType::Utf8) => {
                        return Err(ErrorKind::Semantic(
                            "The utf8 type can only be used as a variable-length array \
                             element type"
                                .into(),
                        )
                        .into());
                    }
                    _ => {}
                }
                let field = Attribute::field(resolved, name.clone())?;
                self.section_mut().add_field_like(field)
            }
            AttributeExpr::Padding { bits } => {
                let void = VoidType::new(*bits)?;
                self.section_mut().add_field_like(Attribute::padding(void))
            }
        }
    }

    // ==================== Directives ====================

    fn on_directive(
        &mut self,
        ctx: &mut BuildContext<'_, '_>,
        name: &str,
        value: Option<&Expr>,
    ) -> Result<()> {
        let value = match value {
            Some(expr) => Some(self.evaluate(ctx, expr)?),
            None => None,
        };
        match name {
            "print" => {
                let text = value.map(|v| v.to_string()).unwrap_or_default();
                log::info!(
                    "Print directive at {}:{}: {}",
                    self.definition.file_path().display(),
                    self.current_line,
                    text
                );
                ctx.emit(self.definition.file_path(), self.current_line, &text);
                Ok(())
            }
            "assert" => match value {
                Some(Value::Boolean(true)) => Ok(()),
                Some(Value::Boolean(false)) => {
                    Err(ErrorKind::Semantic("Assertion check has failed".into()).into())
                }
                Some(other) => Err(ErrorKind::Semantic(format!(
                    "The assertion check expression must yield a boolean, not {}",
                    other.kind_name()
                ))
                .into()),
                None => {
                    Err(ErrorKind::Semantic("Assert directive requires an expression".into())
                        .into())
                }
            },
            "union" => {
                if value.is_some() {
                    return Err(ErrorKind::Semantic(
                        "The union directive does not expect an expression".into(),
                    )
                    .into());
                }
                let section = self.section_mut();
                if section.is_union {
                    return Err(ErrorKind::Semantic("Duplicated union directive".into()).into());
                }
                if !section.is_empty() {
                    return Err(ErrorKind::Semantic(
                        "The union directive must be placed before the first \
                         attribute definition"
                            .into(),
                    )
                    .into());
                }
                section.is_union = true;
                Ok(())
            }
            "deprecated" => {
                if value.is_some() {
                    return Err(ErrorKind::Semantic(
                        "The deprecated directive does not expect an expression".into(),
                    )
                    .into());
                }
                if self.deprecated {
                    return Err(
                        ErrorKind::Semantic("Duplicated deprecated directive".into()).into()
                    );
                }
                if self.sections.len() > 1 {
                    return Err(ErrorKind::Semantic(
                        "The deprecated directive cannot be placed in the response section".into(),
                    )
                    .into());
                }
                if !self.section().is_empty() {
                    return Err(ErrorKind::Semantic(
                        "The deprecated directive must be placed before the first \
                         attribute definition"
                            .into(),
                    )
                    .into());
                }
                self.deprecated = true;
                Ok(())
            }
            "sealed" => {
                if value.is_some() {
                    return Err(ErrorKind::Semantic(
                        "The sealed directive does not expect an expression".into(),
                    )
                    .into());
                }
                let section = self.section_mut();
                if section.sealing.is_some() {
                    return Err(ErrorKind::Semantic(
                        "The sealing of this section is already specified".into(),
                    )
                    .into());
                }
                section.sealing = Some(Sealing::Sealed);
                Ok(())
            }
            "extent" => {
                let extent = match &value {
                    None => {
                        return Err(ErrorKind::Semantic(
                            "The extent directive requires an expression".into(),
                        )
                        .into());
                    }
                    Some(v) => v.as_integer().and_then(BigInt::to_u64).ok_or_else(|| {
                        Error::from(ErrorKind::InvalidOperand(format!(
                            "The extent must be a non-negative integer, not {}",
                            v
                        )))
                    })?,
                };
                let section = self.section_mut();
                if section.sealing.is_some() {
                    return Err(ErrorKind::Semantic(
                        "The sealing of this section is already specified".into(),
                    )
                    .into());
                }
                section.sealing = Some(Sealing::Extent(extent));
                Ok(())
            }
            other => Err(ErrorKind::Semantic(format!("Unknown directive {:?}", other)).into()),
        }
    }

    // ==================== Expression evaluation ====================

    fn evaluate(&mut self, ctx: &mut BuildContext<'_, '_>, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Rational(r) => Ok(Value::Rational(r.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Set(items) => {
                let values = items
                    .iter()
                    .map(|e| self.evaluate(ctx, e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Set(SetValue::new(values)?))
            }
            Expr::Identifier(name) => self.resolve_identifier(name),
            Expr::Type(ty) => Ok(Value::Type(self.resolve_type_expr(ctx, ty)?)),
            Expr::Unary(op, operand) => {
                let operand = self.evaluate(ctx, operand)?;
                value::apply_unary(*op, &operand)
            }
            Expr::Binary(op, left, right) => {
                let left = self.evaluate(ctx, left)?;
                let right = self.evaluate(ctx, right)?;
                value::apply_binary(*op, &left, &right)
            }
            Expr::Attribute(base, name) => {
                let base = self.evaluate(ctx, base)?;
                value::attribute(&base, name)
            }
        }
    }

    /// Identifiers resolve to constants declared above in the current
    /// section, or to the special `_offset_` value.
    fn resolve_identifier(&mut self, name: &str) -> Result<Value> {
        for attribute in &self.section().attributes {
            if let Attribute::Constant {
                name: n, value, ..
            } = attribute
            {
                if n == name {
                    return Ok(value.clone());
                }
            }
        }
        if name == "_offset_" {
            let bls = self.section().bit_length_set()?;
            let section = self.section_mut();
            if section.is_union {
                section.offset_observed_in_union = true;
            }
            let items = bls
                .elements()
                .map(|v| Value::rational_from_integer(BigInt::from(v)))
                .collect();
            return Ok(Value::Set(SetValue::new(items)?));
        }
        Err(ErrorKind::UndefinedIdentifier(format!("Undefined identifier: {:?}", name)).into())
    }

    // ==================== Type resolution ====================

    fn resolve_type_expr(
        &mut self,
        ctx: &mut BuildContext<'_, '_>,
        ty: &TypeExpr,
    ) -> Result<SerializableType> {
        match ty {
            TypeExpr::Scalar(scalar) => self.resolve_scalar(ctx, scalar),
            TypeExpr::Array {
                element,
                capacity,
                kind,
            } => {
                let element = self.resolve_scalar(ctx, element)?;
                let capacity_value = self.evaluate(ctx, capacity)?;
                let capacity = match &capacity_value {
                    Value::Rational(r) if r.is_integer() => r.numer().to_u64(),
                    Value::Rational(_) => None,
                    other => {
                        return Err(ErrorKind::InvalidOperand(format!(
                            "Array capacity expression must yield a rational, not {}",
                            other.kind_name()
                        ))
                        .into());
                    }
                };
                let capacity = capacity.ok_or_else(|| {
                    Error::from(ErrorKind::InvalidOperand(format!(
                        "Invalid array capacity: {}",
                        capacity_value
                    )))
                })?;
                let kind = match kind {
                    crate::ast::ArrayKindExpr::Fixed => ArrayKind::Fixed,
                    crate::ast::ArrayKindExpr::VariableInclusive => ArrayKind::VariableInclusive,
                    crate::ast::ArrayKindExpr::VariableExclusive => ArrayKind::VariableExclusive,
                };
                Ok(SerializableType::Array(Box::new(ArrayType::new(
                    element, capacity, kind,
                )?)))
            }
        }
    }

    fn resolve_scalar(
        &mut self,
        ctx: &mut BuildContext<'_, '_>,
        scalar: &ScalarTypeExpr,
    ) -> Result<SerializableType> {
        match scalar {
            ScalarTypeExpr::Primitive(p) => {
                Ok(SerializableType::Primitive(make_primitive(p)?))
            }
            ScalarTypeExpr::Void { bits } => Ok(SerializableType::Void(VoidType::new(*bits)?)),
            ScalarTypeExpr::Versioned {
                name_components,
                version,
            } => self.resolve_versioned(ctx, name_components, *version),
        }
    }

    fn resolve_versioned(
        &mut self,
        ctx: &mut BuildContext<'_, '_>,
        name_components: &[String],
        version: Option<(u64, u64)>,
    ) -> Result<SerializableType> {
        // A single-component reference is relative to the namespace of the
        // referencing definition.
        let full_name = if name_components.len() == 1 {
            format!(
                "{}{}{}",
                self.definition.full_namespace(),
                NAME_COMPONENT_SEPARATOR,
                name_components[0]
            )
        } else {
            name_components.join(".")
        };

        let candidates: Vec<&Definition> = ctx
            .lookup_definitions
            .iter()
            .filter(|d| d.full_name() == full_name)
            .collect();

        let target: &Definition = match version {
            Some((major, minor)) => {
                let version = Version::new(major, minor)?;
                let matching: Vec<&&Definition> = candidates
                    .iter()
                    .filter(|d| d.version() == version)
                    .collect();
                match matching.as_slice() {
                    [] => {
                        return Err(ErrorKind::UndefinedType(format!(
                            "Data type {} version {} could not be found",
                            full_name, version
                        ))
                        .into());
                    }
                    [single] => **single,
                    [first, second, ..] => {
                        return Err(ErrorKind::Semantic(format!(
                            "Conflicting definitions of {}.{}: {} and {}",
                            full_name,
                            version,
                            first.file_path().display(),
                            second.file_path().display()
                        ))
                        .into());
                    }
                }
            }
            None => {
                // The newest available version wins when none is spelled out.
                candidates
                    .iter()
                    .max_by_key(|d| d.version())
                    .copied()
                    .ok_or_else(|| {
                        Error::from(ErrorKind::UndefinedType(format!(
                            "Data type {} could not be found",
                            full_name
                        )))
                    })?
            }
        };

        match ctx.build(target)? {
            DataType::Message(composite) => {
                if composite.deprecated() && !self.deprecated {
                    ctx.emit(
                        self.definition.file_path(),
                        self.current_line,
                        &format!(
                            "The deprecated type {} is referenced from a type that is \
                             not deprecated",
                            composite
                        ),
                    );
                }
                Ok(SerializableType::Composite(composite))
            }
            DataType::Service(_) => Err(ErrorKind::Semantic(format!(
                "Service type {} is not serializable and cannot be referenced here",
                full_name
            ))
            .into()),
        }
    }

    // ==================== Finalization ====================

    fn finalize(mut self, ctx: &mut BuildContext<'_, '_>) -> Result<DataType> {
        let definition = self.definition;
        let root_namespace = definition.root_namespace().to_string();
        let make_composite = |section: SectionBuilder,
                              full_name: String,
                              fixed_port_id: Option<u32>,
                              source_file_path: PathBuf,
                              deprecated: bool|
         -> Result<CompositeType> {
            CompositeType::new(CompositeParams {
                full_name,
                version: definition.version(),
                attributes: section.attributes,
                kind: if section.is_union {
                    StructureKind::Union
                } else {
                    StructureKind::Structure
                },
                deprecated,
                fixed_port_id,
                source_file_path,
                sealing: section.sealing.unwrap_or(Sealing::Sealed),
            })
        };

        if self.sections.len() == 1 {
            let section = self.sections.pop().unwrap_or_else(|| unreachable!());
            let composite = Rc::new(make_composite(
                section,
                definition.full_name().to_string(),
                definition.fixed_port_id(),
                definition.file_path().to_path_buf(),
                self.deprecated,
            )?);
            if !ctx.allow_unregulated_fixed_port_id {
                if let Some(id) = composite.fixed_port_id() {
                    if !is_valid_regulated_subject_id(id, &root_namespace) {
                        return Err(ErrorKind::PortId(format!(
                            "Regulated port ID {} for message type {} is not valid. \
                             Consider using allow_unregulated_fixed_port_id.",
                            id,
                            composite.full_name()
                        ))
                        .into());
                    }
                }
            }
            Ok(DataType::Message(composite))
        } else {
            let response = self.sections.pop().unwrap_or_else(|| unreachable!());
            let request = self.sections.pop().unwrap_or_else(|| unreachable!());
            let request = Rc::new(make_composite(
                request,
                format!("{}.Request", definition.full_name()),
                None,
                PathBuf::new(),
                self.deprecated,
            )?);
            let response = Rc::new(make_composite(
                response,
                format!("{}.Response", definition.full_name()),
                None,
                PathBuf::new(),
                self.deprecated,
            )?);
            let service = ServiceType::new(
                definition.full_name().to_string(),
                definition.version(),
                request,
                response,
                self.deprecated,
                definition.fixed_port_id(),
                definition.file_path().to_path_buf(),
            )?;
            if !ctx.allow_unregulated_fixed_port_id {
                if let Some(id) = service.fixed_port_id() {
                    if !is_valid_regulated_service_id(id, &root_namespace) {
                        return Err(ErrorKind::PortId(format!(
                            "Regulated port ID {} for service type {} is not valid. \
                             Consider using allow_unregulated_fixed_port_id.",
                            id,
                            service.full_name()
                        ))
                        .into());
                    }
                }
            }
            Ok(DataType::Service(Rc::new(service)))
        }
    }
}

fn make_primitive(p: &PrimitiveTypeExpr) -> Result<PrimitiveType> {
    let cast_mode = match p.explicit_cast {
        Some(CastModeExpr::Truncated) => CastMode::Truncated,
        _ => CastMode::Saturated,
    };
    match p.name {
        PrimitiveNameExpr::Boolean => PrimitiveType::boolean(cast_mode),
        PrimitiveNameExpr::Byte | PrimitiveNameExpr::Utf8 => {
            if p.explicit_cast.is_some() {
                return Err(ErrorKind::Semantic(
                    "The byte and utf8 types do not accept a cast mode".into(),
                )
                .into());
            }
            Ok(if p.name == PrimitiveNameExpr::Byte {
                PrimitiveType::Byte
            } else {
                PrimitiveType::Utf8
            })
        }
        PrimitiveNameExpr::UnsignedInteger(bits) => PrimitiveType::unsigned(bits, cast_mode),
        PrimitiveNameExpr::SignedInteger(bits) => PrimitiveType::signed(bits, cast_mode),
        PrimitiveNameExpr::FloatingPoint(bits) => PrimitiveType::float(bits, cast_mode),
    }
}
