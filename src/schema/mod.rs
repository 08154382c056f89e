//! Contains routines for parsing and validating an Avro schema.
//! Schemas in avro are written as JSON and can be provided as .avsc files.
//! A parsed [`Schema`] serves two roles here: as the writer schema it
//! describes the exact physical byte layout, and as the reader schema it
//! describes the logical structure the application expects.

pub mod common;
use crate::error::AvroplanErr;
pub use common::Order;
mod canonical;
pub mod parser;
pub(crate) use parser::Registry;

use crate::error::AvroplanResult;
pub use canonical::CanonicalSchema;
use canonical::normalize_schema;
use common::{Field, Name};
use indexmap::IndexMap;
use serde_json::{self, Value as JsonValue};
use std::fmt::Debug;
use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Variant {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    Str,
    Record {
        name: Name,
        aliases: Option<Vec<String>>,
        fields: IndexMap<String, Field>,
    },
    Fixed {
        name: Name,
        aliases: Option<Vec<String>>,
        size: usize,
    },
    Enum {
        name: Name,
        aliases: Option<Vec<String>>,
        symbols: Vec<String>,
        default: Option<String>,
    },
    Map {
        values: Box<Variant>,
    },
    Array {
        items: Box<Variant>,
    },
    Union {
        variants: Vec<Variant>,
        // pre-located null branch, see parser::locate_null_branch
        null_index: Option<usize>,
    },
    Named(String),
}

impl Variant {
    fn get_named_mut(&mut self) -> Option<&mut Name> {
        match self {
            Variant::Record { name, .. }
            | Variant::Fixed { name, .. }
            | Variant::Enum { name, .. } => Some(name),
            _ => None,
        }
    }

    // The fullname for named types, the kind keyword otherwise. Used for
    // union branch matching and error messages.
    pub(crate) fn type_name(&self) -> String {
        match self {
            Variant::Null => "null".to_string(),
            Variant::Boolean => "boolean".to_string(),
            Variant::Int => "int".to_string(),
            Variant::Long => "long".to_string(),
            Variant::Float => "float".to_string(),
            Variant::Double => "double".to_string(),
            Variant::Bytes => "bytes".to_string(),
            Variant::Str => "string".to_string(),
            Variant::Record { name, .. }
            | Variant::Fixed { name, .. }
            | Variant::Enum { name, .. } => name.fullname(),
            Variant::Map { .. } => "map".to_string(),
            Variant::Array { .. } => "array".to_string(),
            Variant::Union { .. } => "union".to_string(),
            Variant::Named(name) => name.clone(),
        }
    }
}

/// Represents a parsed avro schema.
#[derive(Debug)]
pub struct Schema {
    // Schema context that has a lookup table to resolve named schema references
    pub(crate) cxt: Registry,
    // typed and stripped version of schema used internally.
    pub(crate) variant: Variant,
    // canonical form of schema. This is used for equality.
    pub(crate) canonical: CanonicalSchema,
    // Rabin fingerprint of the canonical form, the schema's identity for
    // plan caching.
    fingerprint: i64,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl std::str::FromStr for Schema {
    type Err = AvroplanErr;
    /// Parse an avro schema from a JSON string.
    /// One can use Rust's raw string syntax (r##""##) to pass schema.
    fn from_str(schema: &str) -> Result<Self, Self::Err> {
        let schema_json =
            serde_json::from_str(schema).map_err(|e| AvroplanErr::SchemaParseErr(e.into()))?;
        Schema::parse_imp(schema_json)
    }
}

impl Schema {
    /// Parses an avro schema from a JSON schema in a file.
    /// Alternatively, one can use the [`FromStr`](https://doc.rust-lang.org/std/str/trait.FromStr.html)
    /// impl to create the Schema from a JSON string:
    /// ```
    /// use std::str::FromStr;
    /// use avroplan::Schema;
    ///
    /// let schema = Schema::from_str(r##""null""##).unwrap();
    /// ```
    pub fn from_path<P: AsRef<Path> + Debug>(path: P) -> AvroplanResult<Self> {
        let schema_file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(AvroplanErr::SchemaParseErr)?;
        let value = serde_json::from_reader(schema_file)
            .map_err(|e| AvroplanErr::SchemaParseErr(e.into()))?;
        Schema::parse_imp(value)
    }

    fn parse_imp(schema_json: JsonValue) -> AvroplanResult<Self> {
        let mut parser = Registry::new();
        let pcf = CanonicalSchema(normalize_schema(&schema_json)?);
        let variant = parser.parse_schema(&schema_json, None)?;
        let fingerprint = pcf.rabin64();
        Ok(Schema {
            cxt: parser,
            variant,
            canonical: pcf,
            fingerprint,
        })
    }

    pub(crate) fn variant(&self) -> &Variant {
        &self.variant
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.cxt
    }

    /// Returns the canonical form of this schema.
    /// Example:
    /// ```rust
    /// use avroplan::Schema;
    /// use std::str::FromStr;
    ///
    /// let schema = Schema::from_str(r##"
    ///     {
    ///         "type": "record",
    ///         "name": "LongList",
    ///         "aliases": ["LinkedLongs"],
    ///         "fields" : [
    ///             {"name": "value", "type": "long"},
    ///             {"name": "next", "type": ["null", "LongList"]
    ///         }]
    ///     }
    /// "##).unwrap();
    ///
    /// let canonical = schema.canonical_form();
    /// ```
    pub fn canonical_form(&self) -> &CanonicalSchema {
        &self.canonical
    }

    /// 64-bit Rabin fingerprint of the canonical form, computed once at parse
    /// time. Two schemas with the same fingerprint resolve identically.
    pub fn fingerprint(&self) -> i64 {
        self.fingerprint
    }
}
