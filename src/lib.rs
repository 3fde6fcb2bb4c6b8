//! # dsdl-frontend: a DSDL language front-end
//!
//! A front-end for the DSDL data type definition language used to describe
//! serialized message and service schemas. Given a root namespace directory
//! (and optional lookup namespaces for cross-references), it produces fully
//! annotated type objects or a precise `path:line:` diagnostic.
//!
//! ## Pipeline
//!
//! - **Parsing**: a PEST grammar parses each definition file; the concrete
//!   tree is lowered into one record per source line.
//! - **Evaluation**: constant expressions are evaluated exactly over
//!   rationals, booleans, strings, and sets; types are first-class values.
//! - **Type building**: statements become fields, padding, constants, and
//!   directives; cross-references are resolved recursively with cycle
//!   detection; composites are validated and sealed.
//! - **Bit length analysis**: every composite carries the exact set of its
//!   possible serialized bit lengths.
//! - **Namespace post-pass**: fixed port-ID uniqueness and bit
//!   compatibility across minor versions.
//!
//! ## Usage
//!
//! ```no_run
//! use dsdl_frontend::read_namespace;
//!
//! # fn main() -> Result<(), dsdl_frontend::Error> {
//! let types = read_namespace(
//!     std::path::Path::new("dsdl/uavcan"),
//!     &[],
//!     None,
//!     false,
//! )?;
//! for t in &types {
//!     println!("{} v{}", t.full_name(), t.version());
//! }
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod bitset;
mod builder;
pub mod definition;
pub mod error;
pub mod namespace;
pub mod parser;
pub mod types;
pub mod value;

pub use bitset::{BitLengthSet, BITS_PER_BYTE};
pub use definition::{Definition, DSDL_FILE_EXTENSIONS};
pub use error::{Error, ErrorKind, Result};
pub use namespace::{read_namespace, PrintHandler};
pub use types::{
    ArrayKind, ArrayType, Attribute, CastMode, CompositeType, DataType, PrimitiveType, Sealing,
    SerializableType, ServiceType, StructureKind, Version, VoidType, MAX_SERVICE_ID,
    MAX_SUBJECT_ID,
};
pub use value::{SetValue, Value};
