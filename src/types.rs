//! The serializable type model.
//!
//! Everything a definition can declare lives here: primitive, void, array,
//! composite, and service types, together with the invariants enforced when
//! a composite is sealed (naming, versioning, union malformedness, port-ID
//! caps, extent rules). Type objects are immutable once constructed;
//! composites are shared by reference counting.

use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;

use crate::bitset::BitLengthSet;
use crate::error::{ErrorKind, Result};
use crate::value::Value;

pub use crate::bitset::BITS_PER_BYTE;

pub const NAME_COMPONENT_SEPARATOR: char = '.';
pub const MAX_NAME_COMPONENT_LENGTH: usize = 50;
pub const MAX_FULL_NAME_LENGTH: usize = 255;
pub const MAX_VERSION_NUMBER: u64 = 255;
pub const MAX_BIT_LENGTH: u64 = 64;

// ==================== Port identifier regulation ====================

pub const MAX_SUBJECT_ID: u32 = 32767;
pub const MAX_SERVICE_ID: u32 = 511;

const STANDARD_ROOT_NAMESPACE: &str = "uavcan";

const STANDARD_MESSAGES: (u32, u32) = (31744, 32767);
const VENDOR_MESSAGES: (u32, u32) = (28672, 29695);

const STANDARD_SERVICES: (u32, u32) = (384, 511);
const VENDOR_SERVICES: (u32, u32) = (256, 319);

pub fn is_valid_regulated_subject_id(id: u32, root_namespace: &str) -> bool {
    let range = if root_namespace == STANDARD_ROOT_NAMESPACE {
        STANDARD_MESSAGES
    } else {
        VENDOR_MESSAGES
    };
    (range.0..=range.1).contains(&id)
}

pub fn is_valid_regulated_service_id(id: u32, root_namespace: &str) -> bool {
    let range = if root_namespace == STANDARD_ROOT_NAMESPACE {
        STANDARD_SERVICES
    } else {
        VENDOR_SERVICES
    };
    (range.0..=range.1).contains(&id)
}

// ==================== Names ====================

/// Validates one name component: an attribute name, a namespace component,
/// or a type short name.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ErrorKind::Naming("Name or namespace component cannot be empty".into()).into());
    }
    if name.len() > MAX_NAME_COMPONENT_LENGTH {
        return Err(ErrorKind::Naming(format!(
            "Name component {:?} is longer than {} characters",
            name, MAX_NAME_COMPONENT_LENGTH
        ))
        .into());
    }
    let first = name.chars().next().unwrap_or_default();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(ErrorKind::Naming(format!(
            "Name or namespace component cannot start with {:?}",
            first
        ))
        .into());
    }
    for c in name.chars() {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return Err(ErrorKind::Naming(format!(
                "Name or namespace component cannot contain {:?}",
                c
            ))
            .into());
        }
    }
    if is_disallowed_name(name) {
        return Err(ErrorKind::Naming(format!("Disallowed name: {:?}", name)).into());
    }
    Ok(())
}

/// Case-insensitive match against the reserved word list. The patterns apply
/// to any declared name: attributes, namespace components, short names.
fn is_disallowed_name(name: &str) -> bool {
    let n = name.to_ascii_lowercase();
    const EXACT: &[&str] = &[
        "truncated", "saturated", "true", "false", "bool", "byte", "utf8", "optional", "aligned",
        "const", "struct", "super", "template", "enum", "self", "and", "or", "not", "auto",
        "type", "con", "prn", "aux", "nul",
    ];
    if EXACT.contains(&n.as_str()) {
        return true;
    }
    // void\d*, u?int\d*, float\d*
    for prefix in ["void", "uint", "int", "float"] {
        if let Some(rest) = n.strip_prefix(prefix) {
            if rest.chars().all(|c| c.is_ascii_digit()) {
                return true;
            }
        }
    }
    // com\d, lpt\d
    for prefix in ["com", "lpt"] {
        if let Some(rest) = n.strip_prefix(prefix) {
            if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()) {
                return true;
            }
        }
    }
    // u?q\d+_\d+
    let q = n.strip_prefix('u').unwrap_or(&n);
    if let Some(rest) = q.strip_prefix('q') {
        if let Some((a, b)) = rest.split_once('_') {
            if !a.is_empty()
                && !b.is_empty()
                && a.chars().all(|c| c.is_ascii_digit())
                && b.chars().all(|c| c.is_ascii_digit())
            {
                return true;
            }
        }
    }
    // _.*_
    n.len() >= 2 && n.starts_with('_') && n.ends_with('_')
}

// ==================== Version ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn new(major: u64, minor: u64) -> Result<Self> {
        if major > MAX_VERSION_NUMBER || minor > MAX_VERSION_NUMBER || (major + minor) == 0 {
            return Err(
                ErrorKind::Version(format!("Invalid version numbers: {}.{}", major, minor)).into(),
            );
        }
        Ok(Version {
            major: major as u8,
            minor: minor as u8,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ==================== Primitive types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastMode {
    Saturated,
    Truncated,
}

impl fmt::Display for CastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CastMode::Saturated => write!(f, "saturated"),
            CastMode::Truncated => write!(f, "truncated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Boolean,
    UnsignedInteger { bits: u8, cast_mode: CastMode },
    SignedInteger { bits: u8 },
    Float { bits: u8, cast_mode: CastMode },
    /// Unsigned 8-bit truncated integer usable only as an array element.
    Byte,
    /// Unsigned 8-bit truncated integer usable only as a variable-length
    /// array element.
    Utf8,
}

impl PrimitiveType {
    pub fn boolean(cast_mode: CastMode) -> Result<Self> {
        if cast_mode != CastMode::Saturated {
            return Err(ErrorKind::Semantic(format!(
                "Invalid cast mode for bool: {}",
                cast_mode
            ))
            .into());
        }
        Ok(PrimitiveType::Boolean)
    }

    pub fn unsigned(bits: u64, cast_mode: CastMode) -> Result<Self> {
        check_bit_length(bits, 1, "uint")?;
        Ok(PrimitiveType::UnsignedInteger {
            bits: bits as u8,
            cast_mode,
        })
    }

    pub fn signed(bits: u64, cast_mode: CastMode) -> Result<Self> {
        check_bit_length(bits, 2, "int")?;
        if cast_mode != CastMode::Saturated {
            return Err(ErrorKind::Semantic(format!(
                "Invalid cast mode for signed integer: {}",
                cast_mode
            ))
            .into());
        }
        Ok(PrimitiveType::SignedInteger { bits: bits as u8 })
    }

    pub fn float(bits: u64, cast_mode: CastMode) -> Result<Self> {
        if !matches!(bits, 16 | 32 | 64) {
            return Err(
                ErrorKind::Semantic(format!("Invalid bit length for float type: {}", bits)).into(),
            );
        }
        Ok(PrimitiveType::Float {
            bits: bits as u8,
            cast_mode,
        })
    }

    pub fn bit_length(&self) -> u64 {
        match self {
            PrimitiveType::Boolean => 1,
            PrimitiveType::UnsignedInteger { bits, .. }
            | PrimitiveType::SignedInteger { bits }
            | PrimitiveType::Float { bits, .. } => u64::from(*bits),
            PrimitiveType::Byte | PrimitiveType::Utf8 => 8,
        }
    }

    pub fn cast_mode(&self) -> CastMode {
        match self {
            PrimitiveType::Boolean | PrimitiveType::SignedInteger { .. } => CastMode::Saturated,
            PrimitiveType::UnsignedInteger { cast_mode, .. }
            | PrimitiveType::Float { cast_mode, .. } => *cast_mode,
            PrimitiveType::Byte | PrimitiveType::Utf8 => CastMode::Truncated,
        }
    }

    pub fn bit_length_set(&self) -> BitLengthSet {
        BitLengthSet::singleton(self.bit_length())
    }

    /// The exact range of representable values; `None` for `bool`.
    pub fn inclusive_value_range(&self) -> Option<(BigRational, BigRational)> {
        let int = |v: BigInt| BigRational::from_integer(v);
        match self {
            PrimitiveType::Boolean => None,
            PrimitiveType::UnsignedInteger { bits, .. } => {
                let max = (BigInt::one() << u64::from(*bits)) - 1;
                Some((int(BigInt::from(0)), int(max)))
            }
            PrimitiveType::Byte | PrimitiveType::Utf8 => {
                Some((int(BigInt::from(0)), int(BigInt::from(255))))
            }
            PrimitiveType::SignedInteger { bits } => {
                let half = BigInt::one() << u64::from(*bits - 1);
                Some((int(-half.clone()), int(half - 1)))
            }
            PrimitiveType::Float { bits, .. } => {
                // IEEE 754 binary16/32/64 magnitudes, exactly.
                let (a, b) = match bits {
                    16 => (16u64, 5u64),
                    32 => (128, 104),
                    _ => (1024, 971),
                };
                let mag = (BigInt::one() << a) - (BigInt::one() << b);
                Some((int(-mag.clone()), int(mag)))
            }
        }
    }
}

fn check_bit_length(bits: u64, min: u64, what: &str) -> Result<()> {
    if bits < min {
        return Err(ErrorKind::Semantic(format!(
            "Bit length of {} types cannot be less than {}",
            what, min
        ))
        .into());
    }
    if bits > MAX_BIT_LENGTH {
        return Err(ErrorKind::Semantic(format!(
            "Bit length cannot exceed {}",
            MAX_BIT_LENGTH
        ))
        .into());
    }
    Ok(())
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => write!(f, "bool"),
            PrimitiveType::Byte => write!(f, "byte"),
            PrimitiveType::Utf8 => write!(f, "utf8"),
            PrimitiveType::UnsignedInteger { bits, cast_mode } => {
                write!(f, "{} uint{}", cast_mode, bits)
            }
            PrimitiveType::SignedInteger { bits } => write!(f, "saturated int{}", bits),
            PrimitiveType::Float { bits, cast_mode } => write!(f, "{} float{}", cast_mode, bits),
        }
    }
}

// ==================== Void ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoidType {
    bits: u8,
}

impl VoidType {
    pub fn new(bits: u64) -> Result<Self> {
        check_bit_length(bits, 1, "void")?;
        Ok(VoidType { bits: bits as u8 })
    }

    pub fn bit_length(&self) -> u64 {
        u64::from(self.bits)
    }

    pub fn bit_length_set(&self) -> BitLengthSet {
        BitLengthSet::singleton(self.bit_length())
    }
}

impl fmt::Display for VoidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "void{}", self.bits)
    }
}

// ==================== Arrays ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Fixed,
    VariableInclusive,
    VariableExclusive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    element: SerializableType,
    /// Capacity as declared in the source; for the exclusive form the
    /// effective capacity is one less.
    capacity: u64,
    kind: ArrayKind,
    bit_length_set: BitLengthSet,
}

impl ArrayType {
    pub fn new(element: SerializableType, capacity: u64, kind: ArrayKind) -> Result<Self> {
        match &element {
            SerializableType::Void(_) => {
                return Err(
                    ErrorKind::Semantic("Void types cannot be array elements".into()).into(),
                );
            }
            SerializableType::Primitive(PrimitiveType::Utf8) if kind == ArrayKind::Fixed => {
                return Err(ErrorKind::Semantic(
                    "The utf8 type can only be used as a variable-length array element type"
                        .into(),
                )
                .into());
            }
            _ => {}
        }
        let effective = match kind {
            ArrayKind::Fixed | ArrayKind::VariableInclusive => capacity,
            ArrayKind::VariableExclusive => capacity.saturating_sub(1),
        };
        if effective < 1 {
            return Err(ErrorKind::Semantic("Array capacity cannot be less than 1".into()).into());
        }
        let element_set = element.bit_length_set();
        let bit_length_set = match kind {
            ArrayKind::Fixed => element_set.repeat(effective),
            ArrayKind::VariableInclusive | ArrayKind::VariableExclusive => {
                let tag = BitLengthSet::singleton(bit_width(effective));
                tag.concatenate(&element_set.repeat_range(effective))
            }
        };
        Ok(ArrayType {
            element,
            capacity,
            kind,
            bit_length_set,
        })
    }

    pub fn element_type(&self) -> &SerializableType {
        &self.element
    }

    /// Capacity as written in the source.
    pub fn declared_capacity(&self) -> u64 {
        self.capacity
    }

    /// Largest number of elements the array can actually hold.
    pub fn effective_capacity(&self) -> u64 {
        match self.kind {
            ArrayKind::Fixed | ArrayKind::VariableInclusive => self.capacity,
            ArrayKind::VariableExclusive => self.capacity - 1,
        }
    }

    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    /// Width of the implicit length tag; `None` for fixed-length arrays.
    pub fn length_tag_bits(&self) -> Option<u64> {
        match self.kind {
            ArrayKind::Fixed => None,
            _ => Some(bit_width(self.effective_capacity())),
        }
    }

    /// A variable-length array of 8-bit unsigned elements may carry text.
    pub fn is_string_like(&self) -> bool {
        if self.kind == ArrayKind::Fixed {
            return false;
        }
        matches!(
            self.element,
            SerializableType::Primitive(PrimitiveType::UnsignedInteger { bits: 8, .. })
                | SerializableType::Primitive(PrimitiveType::Byte)
                | SerializableType::Primitive(PrimitiveType::Utf8)
        )
    }

    pub fn bit_length_set(&self) -> &BitLengthSet {
        &self.bit_length_set
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ArrayKind::Fixed => write!(f, "{}[{}]", self.element, self.capacity),
            ArrayKind::VariableInclusive => write!(f, "{}[<={}]", self.element, self.capacity),
            ArrayKind::VariableExclusive => write!(f, "{}[<{}]", self.element, self.capacity),
        }
    }
}

/// Number of bits needed to represent `value`; at least 1.
pub(crate) fn bit_width(value: u64) -> u64 {
    (64 - value.leading_zeros()).max(1).into()
}

// ==================== Attributes ====================

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Field {
        ty: SerializableType,
        name: String,
    },
    /// An unnamed void field contributing only padding bits.
    Padding { ty: VoidType },
    Constant {
        ty: PrimitiveType,
        name: String,
        value: Value,
    },
}

impl Attribute {
    pub fn field(ty: SerializableType, name: String) -> Result<Self> {
        check_name(&name)?;
        Ok(Attribute::Field { ty, name })
    }

    pub fn padding(ty: VoidType) -> Self {
        Attribute::Padding { ty }
    }

    /// Validates the constant value against the declared type and coerces it
    /// where the language requires (single-character strings become the code
    /// point for `uint8` constants).
    pub fn constant(ty: PrimitiveType, name: String, value: Value) -> Result<Self> {
        check_name(&name)?;
        let value = match (&ty, value) {
            (PrimitiveType::Boolean, v @ Value::Boolean(_)) => v,
            (PrimitiveType::Boolean, v) => {
                return Err(ErrorKind::Semantic(format!(
                    "Invalid value for boolean constant: {}",
                    v
                ))
                .into());
            }
            (PrimitiveType::Byte | PrimitiveType::Utf8, _) => {
                return Err(ErrorKind::Semantic(format!(
                    "Invalid constant type: {}",
                    ty
                ))
                .into());
            }
            (PrimitiveType::UnsignedInteger { .. } | PrimitiveType::SignedInteger { .. }, v) => {
                match v {
                    Value::Rational(r) => {
                        if !r.is_integer() {
                            return Err(ErrorKind::InvalidOperand(format!(
                                "The value of an integer constant must be an integer; got {}",
                                r
                            ))
                            .into());
                        }
                        Value::Rational(r)
                    }
                    Value::String(s) => {
                        // Single-character constants are permitted for uint8.
                        let bytes = s.as_bytes();
                        if bytes.len() != 1 {
                            return Err(ErrorKind::Semantic(
                                "A constant string must be exactly one ASCII character long"
                                    .into(),
                            )
                            .into());
                        }
                        if !matches!(ty, PrimitiveType::UnsignedInteger { bits: 8, .. }) {
                            return Err(ErrorKind::Semantic(
                                "Constant strings can be used only with uint8".into(),
                            )
                            .into());
                        }
                        Value::Rational(BigRational::from_integer(BigInt::from(bytes[0])))
                    }
                    v => {
                        return Err(ErrorKind::Semantic(format!(
                            "Invalid value type for integer constant: {}",
                            v
                        ))
                        .into());
                    }
                }
            }
            (PrimitiveType::Float { .. }, v @ Value::Rational(_)) => v,
            (PrimitiveType::Float { .. }, v) => {
                return Err(ErrorKind::Semantic(format!(
                    "Invalid value type for float constant: {}",
                    v
                ))
                .into());
            }
        };
        // Range check for the arithmetic types.
        if let Value::Rational(r) = &value {
            if let Some((min, max)) = ty.inclusive_value_range() {
                if *r < min || *r > max {
                    return Err(ErrorKind::InvalidOperand(format!(
                        "Constant value {} exceeds the range of its data type {}",
                        r, ty
                    ))
                    .into());
                }
            }
        }
        Ok(Attribute::Constant { ty, name, value })
    }

    /// Empty for padding fields.
    pub fn name(&self) -> &str {
        match self {
            Attribute::Field { name, .. } | Attribute::Constant { name, .. } => name,
            Attribute::Padding { .. } => "",
        }
    }

    /// Bit length contribution; constants contribute nothing.
    pub fn bit_length_set(&self) -> Option<BitLengthSet> {
        match self {
            Attribute::Field { ty, .. } => Some(ty.bit_length_set()),
            Attribute::Padding { ty } => Some(ty.bit_length_set()),
            Attribute::Constant { .. } => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Field { ty, name } => write!(f, "{} {}", ty, name),
            Attribute::Padding { ty } => write!(f, "{}", ty),
            Attribute::Constant { ty, name, value } => write!(f, "{} {} = {}", ty, name, value),
        }
    }
}

// ==================== Composite types ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureKind {
    Structure,
    Union,
}

/// Sealing policy of a composite, per section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sealing {
    Sealed,
    /// Extensible with the given bit envelope.
    Extent(u64),
}

pub(crate) struct CompositeParams {
    pub full_name: String,
    pub version: Version,
    pub attributes: Vec<Attribute>,
    pub kind: StructureKind,
    pub deprecated: bool,
    pub fixed_port_id: Option<u32>,
    pub source_file_path: PathBuf,
    pub sealing: Sealing,
}

#[derive(Debug, PartialEq)]
pub struct CompositeType {
    full_name: String,
    version: Version,
    attributes: Vec<Attribute>,
    kind: StructureKind,
    deprecated: bool,
    fixed_port_id: Option<u32>,
    source_file_path: PathBuf,
    sealing: Sealing,
    extent: u64,
    bit_length_set: BitLengthSet,
}

impl CompositeType {
    pub(crate) fn new(params: CompositeParams) -> Result<Self> {
        let CompositeParams {
            full_name,
            version,
            attributes,
            kind,
            deprecated,
            fixed_port_id,
            source_file_path,
            sealing,
        } = params;

        if full_name.is_empty() {
            return Err(ErrorKind::Naming("Composite type name cannot be empty".into()).into());
        }
        if !full_name.contains(NAME_COMPONENT_SEPARATOR) {
            return Err(ErrorKind::Naming("Root namespace is not specified".into()).into());
        }
        if full_name.len() > MAX_FULL_NAME_LENGTH {
            return Err(ErrorKind::Naming(format!(
                "Name is too long: {:?} is longer than {} characters",
                full_name, MAX_FULL_NAME_LENGTH
            ))
            .into());
        }
        for component in full_name.split(NAME_COMPONENT_SEPARATOR) {
            check_name(component)?;
        }
        let short_name = full_name
            .rsplit(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string();

        // Attribute name uniqueness; padding fields are nameless and exempt.
        let mut used_names: Vec<&str> = Vec::new();
        for a in &attributes {
            let name = a.name();
            if name.is_empty() {
                continue;
            }
            if used_names.contains(&name) {
                return Err(ErrorKind::Naming(format!(
                    "Multiple attributes under the same name: {:?}",
                    name
                ))
                .into());
            }
            if name == short_name {
                return Err(ErrorKind::Naming(format!(
                    "Attribute {:?} shadows the short name of its type",
                    name
                ))
                .into());
            }
            used_names.push(name);
        }

        if kind == StructureKind::Union {
            let variants = attributes
                .iter()
                .filter(|a| matches!(a, Attribute::Field { .. }))
                .count();
            if variants < 2 {
                return Err(ErrorKind::Semantic(
                    "A tagged union cannot contain fewer than 2 variants".into(),
                )
                .into());
            }
            if attributes
                .iter()
                .any(|a| matches!(a, Attribute::Padding { .. }))
            {
                return Err(
                    ErrorKind::Semantic("Padding fields are not allowed in unions".into()).into(),
                );
            }
        }

        if let Some(id) = fixed_port_id {
            if id > MAX_SUBJECT_ID {
                return Err(
                    ErrorKind::PortId(format!("Fixed subject ID {} is not valid", id)).into(),
                );
            }
        }

        let field_sets: Vec<BitLengthSet> =
            attributes.iter().filter_map(|a| a.bit_length_set()).collect();
        let bit_length_set = match kind {
            StructureKind::Structure => field_sets
                .iter()
                .fold(BitLengthSet::singleton(0), |acc, s| acc.concatenate(s)),
            StructureKind::Union => {
                let tag = BitLengthSet::singleton(bit_width(field_sets.len() as u64 - 1));
                let united = field_sets
                    .iter()
                    .skip(1)
                    .fold(field_sets[0].clone(), |acc, s| acc.unite(s));
                tag.concatenate(&united)
            }
        };

        let extent = match sealing {
            Sealing::Sealed => bit_length_set.max(),
            Sealing::Extent(e) => {
                if e % BITS_PER_BYTE != 0 {
                    return Err(ErrorKind::Semantic(format!(
                        "The extent {} is not a multiple of {}",
                        e, BITS_PER_BYTE
                    ))
                    .into());
                }
                if e < bit_length_set.max() {
                    return Err(ErrorKind::Semantic(format!(
                        "The extent {} is too small; the maximum serialized length is {} bits",
                        e,
                        bit_length_set.max()
                    ))
                    .into());
                }
                e
            }
        };

        Ok(CompositeType {
            full_name,
            version,
            attributes,
            kind,
            deprecated,
            fixed_port_id,
            source_file_path,
            sealing,
            extent,
            bit_length_set,
        })
    }

    /// The full name, e.g. `uavcan.node.Heartbeat`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name_components(&self) -> Vec<&str> {
        self.full_name.split(NAME_COMPONENT_SEPARATOR).collect()
    }

    /// The last name component.
    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    /// The full name without the short name.
    pub fn full_namespace(&self) -> &str {
        self.full_name
            .rsplit_once(NAME_COMPONENT_SEPARATOR)
            .map(|(ns, _)| ns)
            .unwrap_or_default()
    }

    /// The first name component.
    pub fn root_namespace(&self) -> &str {
        self.full_name
            .split(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    pub fn deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn fixed_port_id(&self) -> Option<u32> {
        self.fixed_port_id
    }

    /// Empty for synthesized service sections.
    pub fn source_file_path(&self) -> &Path {
        &self.source_file_path
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn fields(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| matches!(a, Attribute::Field { .. } | Attribute::Padding { .. }))
    }

    pub fn constants(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| matches!(a, Attribute::Constant { .. }))
    }

    /// Looks up the value of a constant by name.
    pub fn constant_value(&self, name: &str) -> Option<&Value> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Constant {
                name: n, value, ..
            } if n == name => Some(value),
            _ => None,
        })
    }

    pub fn bit_length_set(&self) -> &BitLengthSet {
        &self.bit_length_set
    }

    pub fn sealing(&self) -> Sealing {
        self.sealing
    }

    pub fn is_sealed(&self) -> bool {
        self.sealing == Sealing::Sealed
    }

    /// The maximum serialized bit length this type is committed to.
    pub fn extent(&self) -> u64 {
        self.extent
    }

    /// Width of the implicit union tag; `None` for structures.
    pub fn tag_bits(&self) -> Option<u64> {
        match self.kind {
            StructureKind::Structure => None,
            StructureKind::Union => {
                let n = self.fields().count() as u64;
                Some(bit_width(n - 1))
            }
        }
    }

    /// Relaxed bit compatibility: equal bit length sets and equal extents.
    pub fn is_bit_compatible_with(&self, other: &CompositeType) -> bool {
        self.bit_length_set == other.bit_length_set && self.extent == other.extent
    }
}

impl fmt::Display for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.full_name, self.version)
    }
}

// ==================== Service types ====================

#[derive(Debug, PartialEq)]
pub struct ServiceType {
    full_name: String,
    version: Version,
    request: Rc<CompositeType>,
    response: Rc<CompositeType>,
    deprecated: bool,
    fixed_port_id: Option<u32>,
    source_file_path: PathBuf,
}

impl ServiceType {
    pub(crate) fn new(
        full_name: String,
        version: Version,
        request: Rc<CompositeType>,
        response: Rc<CompositeType>,
        deprecated: bool,
        fixed_port_id: Option<u32>,
        source_file_path: PathBuf,
    ) -> Result<Self> {
        if let Some(id) = fixed_port_id {
            if id > MAX_SERVICE_ID {
                return Err(
                    ErrorKind::PortId(format!("Fixed service ID {} is not valid", id)).into(),
                );
            }
        }
        Ok(ServiceType {
            full_name,
            version,
            request,
            response,
            deprecated,
            fixed_port_id,
            source_file_path,
        })
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn root_namespace(&self) -> &str {
        self.full_name
            .split(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn request_type(&self) -> &Rc<CompositeType> {
        &self.request
    }

    pub fn response_type(&self) -> &Rc<CompositeType> {
        &self.response
    }

    pub fn deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn fixed_port_id(&self) -> Option<u32> {
        self.fixed_port_id
    }

    pub fn source_file_path(&self) -> &Path {
        &self.source_file_path
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.full_name, self.version)
    }
}

// ==================== The serializable type sum ====================

#[derive(Debug, Clone, PartialEq)]
pub enum SerializableType {
    Void(VoidType),
    Primitive(PrimitiveType),
    Array(Box<ArrayType>),
    Composite(Rc<CompositeType>),
}

impl SerializableType {
    pub fn bit_length_set(&self) -> BitLengthSet {
        match self {
            SerializableType::Void(t) => t.bit_length_set(),
            SerializableType::Primitive(t) => t.bit_length_set(),
            SerializableType::Array(t) => t.bit_length_set().clone(),
            SerializableType::Composite(t) => t.bit_length_set().clone(),
        }
    }
}

impl fmt::Display for SerializableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializableType::Void(t) => write!(f, "{}", t),
            SerializableType::Primitive(t) => write!(f, "{}", t),
            SerializableType::Array(t) => write!(f, "{}", t),
            SerializableType::Composite(t) => write!(f, "{}", t),
        }
    }
}

/// A fully built top-level definition.
#[derive(Debug, Clone)]
pub enum DataType {
    Message(Rc<CompositeType>),
    Service(Rc<ServiceType>),
}

impl DataType {
    pub fn full_name(&self) -> &str {
        match self {
            DataType::Message(t) => t.full_name(),
            DataType::Service(t) => t.full_name(),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            DataType::Message(t) => t.version(),
            DataType::Service(t) => t.version(),
        }
    }

    pub fn deprecated(&self) -> bool {
        match self {
            DataType::Message(t) => t.deprecated(),
            DataType::Service(t) => t.deprecated(),
        }
    }

    pub fn fixed_port_id(&self) -> Option<u32> {
        match self {
            DataType::Message(t) => t.fixed_port_id(),
            DataType::Service(t) => t.fixed_port_id(),
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, DataType::Service(_))
    }

    pub fn source_file_path(&self) -> &Path {
        match self {
            DataType::Message(t) => t.source_file_path(),
            DataType::Service(t) => t.source_file_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u8t() -> SerializableType {
        SerializableType::Primitive(
            PrimitiveType::unsigned(8, CastMode::Truncated).expect("uint8"),
        )
    }

    #[test]
    fn primitive_display() {
        assert_eq!(PrimitiveType::Boolean.to_string(), "bool");
        assert_eq!(PrimitiveType::Byte.to_string(), "byte");
        assert_eq!(PrimitiveType::Utf8.to_string(), "utf8");
        assert_eq!(
            PrimitiveType::unsigned(15, CastMode::Truncated)
                .expect("ok")
                .to_string(),
            "truncated uint15"
        );
        assert_eq!(
            PrimitiveType::signed(15, CastMode::Saturated)
                .expect("ok")
                .to_string(),
            "saturated int15"
        );
        assert_eq!(
            PrimitiveType::float(64, CastMode::Saturated)
                .expect("ok")
                .to_string(),
            "saturated float64"
        );
    }

    #[test]
    fn primitive_ranges() {
        let (min, max) = PrimitiveType::signed(8, CastMode::Saturated)
            .expect("ok")
            .inclusive_value_range()
            .expect("range");
        assert_eq!(min, BigRational::from_integer(BigInt::from(-128)));
        assert_eq!(max, BigRational::from_integer(BigInt::from(127)));

        let (_, max) = PrimitiveType::float(16, CastMode::Saturated)
            .expect("ok")
            .inclusive_value_range()
            .expect("range");
        assert_eq!(max, BigRational::from_integer(BigInt::from(65504)));
    }

    #[test]
    fn primitive_validation() {
        assert!(PrimitiveType::unsigned(0, CastMode::Saturated).is_err());
        assert!(PrimitiveType::unsigned(65, CastMode::Truncated).is_err());
        assert!(PrimitiveType::signed(1, CastMode::Saturated).is_err());
        assert!(PrimitiveType::signed(8, CastMode::Truncated).is_err());
        assert!(PrimitiveType::float(8, CastMode::Truncated).is_err());
        assert!(PrimitiveType::boolean(CastMode::Truncated).is_err());
        assert!(VoidType::new(0).is_err());
        assert!(VoidType::new(65).is_err());
        assert_eq!(VoidType::new(13).expect("ok").to_string(), "void13");
    }

    #[test]
    fn name_checks() {
        assert!(check_name("abc").is_ok());
        assert!(check_name("_abc").is_ok());
        assert!(check_name("abc0").is_ok());
        assert!(check_name("0abc").is_err());
        assert!(check_name("_abc_").is_err());
        assert!(check_name("a-bc").is_err());
        assert!(check_name("").is_err());
        assert!(check_name("truncated").is_err());
        assert!(check_name("COM1").is_err());
        assert!(check_name("Aux").is_err());
        assert!(check_name("float128").is_err());
        assert!(check_name("q16_8").is_err());
        assert!(check_name("uq1_32").is_err());
    }

    #[test]
    fn version_checks() {
        assert!(Version::new(0, 0).is_err());
        assert!(Version::new(256, 0).is_err());
        assert!(Version::new(1, 0).is_ok());
        assert!(Version::new(0, 1).is_ok());
        assert!(Version::new(1, 0).expect("ok") < Version::new(1, 1).expect("ok"));
        assert!(Version::new(1, 9).expect("ok") < Version::new(2, 0).expect("ok"));
    }

    #[test]
    fn array_semantics() {
        let fixed = ArrayType::new(u8t(), 4, ArrayKind::Fixed).expect("ok");
        assert_eq!(fixed.to_string(), "truncated uint8[4]");
        assert_eq!(fixed.bit_length_set(), &BitLengthSet::singleton(32));
        assert_eq!(fixed.length_tag_bits(), None);

        let var = ArrayType::new(u8t(), 3, ArrayKind::VariableInclusive).expect("ok");
        assert_eq!(var.to_string(), "truncated uint8[<=3]");
        assert_eq!(var.length_tag_bits(), Some(2));
        assert_eq!(
            var.bit_length_set(),
            &BitLengthSet::from_values([2, 10, 18, 26])
        );

        let excl = ArrayType::new(u8t(), 4, ArrayKind::VariableExclusive).expect("ok");
        assert_eq!(excl.to_string(), "truncated uint8[<4]");
        assert_eq!(excl.effective_capacity(), 3);
        assert_eq!(
            excl.bit_length_set(),
            &BitLengthSet::from_values([2, 10, 18, 26])
        );

        assert!(ArrayType::new(u8t(), 0, ArrayKind::Fixed).is_err());
        assert!(ArrayType::new(u8t(), 1, ArrayKind::VariableExclusive).is_err());
        assert!(ArrayType::new(
            SerializableType::Void(VoidType::new(8).expect("ok")),
            4,
            ArrayKind::Fixed
        )
        .is_err());
        assert!(ArrayType::new(
            SerializableType::Primitive(PrimitiveType::Utf8),
            4,
            ArrayKind::Fixed
        )
        .is_err());
        assert!(
            ArrayType::new(SerializableType::Primitive(PrimitiveType::Byte), 4, ArrayKind::Fixed)
                .is_ok()
        );
    }

    #[test]
    fn composite_invariants() {
        let make = |name: &str, attributes: Vec<Attribute>, kind: StructureKind| {
            CompositeType::new(CompositeParams {
                full_name: name.to_string(),
                version: Version::new(1, 0).expect("ok"),
                attributes,
                kind,
                deprecated: false,
                fixed_port_id: None,
                source_file_path: PathBuf::new(),
                sealing: Sealing::Sealed,
            })
        };

        assert!(make("T", vec![], StructureKind::Structure).is_err()); // No root namespace
        assert!(make("ns..T", vec![], StructureKind::Structure).is_err());
        assert!(make("ns.0T", vec![], StructureKind::Structure).is_err());

        let empty = make("ns.T", vec![], StructureKind::Structure).expect("ok");
        assert_eq!(empty.bit_length_set(), &BitLengthSet::singleton(0));
        assert_eq!(empty.extent(), 0);
        assert_eq!(empty.short_name(), "T");
        assert_eq!(empty.full_namespace(), "ns");
        assert_eq!(empty.root_namespace(), "ns");

        let a = Attribute::field(u8t(), "a".into()).expect("ok");
        let b = Attribute::field(
            SerializableType::Primitive(
                PrimitiveType::unsigned(16, CastMode::Saturated).expect("ok"),
            ),
            "b".into(),
        )
        .expect("ok");

        let s = make("ns.T", vec![a.clone(), b.clone()], StructureKind::Structure).expect("ok");
        assert_eq!(s.bit_length_set(), &BitLengthSet::singleton(24));
        assert_eq!(s.extent(), 24);
        assert_eq!(s.to_string(), "ns.T.1.0");

        let u = make("ns.U", vec![a.clone(), b.clone()], StructureKind::Union).expect("ok");
        assert_eq!(u.tag_bits(), Some(1));
        assert_eq!(u.bit_length_set(), &BitLengthSet::from_values([9, 17]));

        // Unions need at least two variants and refuse padding.
        assert!(make("ns.U", vec![a.clone()], StructureKind::Union).is_err());
        let pad = Attribute::padding(VoidType::new(3).expect("ok"));
        assert!(make("ns.U", vec![a.clone(), b.clone(), pad], StructureKind::Union).is_err());

        // Name collisions and short-name shadowing.
        assert!(make("ns.T", vec![a.clone(), a.clone()], StructureKind::Structure).is_err());
        let shadow = Attribute::field(u8t(), "T".into());
        // "T" passes check_name but must be rejected at composite level.
        let shadow = shadow.expect("ok");
        assert!(make("ns.T", vec![shadow], StructureKind::Structure).is_err());
    }

    #[test]
    fn extent_rules() {
        let field = Attribute::field(
            SerializableType::Primitive(
                PrimitiveType::unsigned(64, CastMode::Saturated).expect("ok"),
            ),
            "x".into(),
        )
        .expect("ok");
        let make = |sealing: Sealing| {
            CompositeType::new(CompositeParams {
                full_name: "ns.T".into(),
                version: Version::new(1, 0).expect("ok"),
                attributes: vec![field.clone()],
                kind: StructureKind::Structure,
                deprecated: false,
                fixed_port_id: None,
                source_file_path: PathBuf::new(),
                sealing,
            })
        };
        assert_eq!(make(Sealing::Sealed).expect("ok").extent(), 64);
        assert_eq!(make(Sealing::Extent(128)).expect("ok").extent(), 128);
        assert!(make(Sealing::Extent(48)).is_err()); // Below the maximum length
        assert!(make(Sealing::Extent(65)).is_err()); // Not a multiple of 8
    }

    #[test]
    fn port_id_regulation() {
        assert!(is_valid_regulated_subject_id(29000, "sirius_cybernetics"));
        assert!(!is_valid_regulated_subject_id(29000, "uavcan"));
        assert!(is_valid_regulated_subject_id(32000, "uavcan"));
        assert!(!is_valid_regulated_subject_id(125, "vendor"));
        assert!(is_valid_regulated_service_id(260, "sirius_cybernetics"));
        assert!(!is_valid_regulated_service_id(260, "uavcan"));
        assert!(is_valid_regulated_service_id(400, "uavcan"));
        assert!(!is_valid_regulated_service_id(600, "vendor"));
    }
}
