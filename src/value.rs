//! The runtime value model. A [`Value`] is what the decoding engine hands to
//! the caller (shaped by the reader schema) and what the encoding engine
//! consumes (placed into writer schema order by the resolution plan).

use crate::defaults::materialize;
use crate::error::AvroplanErr;
use crate::schema::common::validate_name;
use crate::Schema;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// Convenient type alias for map initialzation.
pub type Map = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
/// The [Record](https://avro.apache.org/docs/current/spec.html#schema_record) avro type.
/// Fields keep their insertion order; the encoding engine looks them up by
/// reader name, so the caller may insert them in any order.
pub struct Record {
    /// Full name of the record as per its schema.
    pub name: String,
    /// Field values keyed by reader field name.
    pub fields: IndexMap<String, Value>,
}

impl Record {
    /// Creates a new avro record value with the given name.
    pub fn new(name: &str) -> Self {
        Record {
            fields: IndexMap::new(),
            name: name.to_string(),
        }
    }

    /// Adds a field to the record.
    pub fn insert<T: Into<Value>>(&mut self, field_name: &str, ty: T) -> Result<(), AvroplanErr> {
        validate_name(0, field_name)?;
        self.fields.insert(field_name.to_string(), ty.into());
        Ok(())
    }

    /// Creates a record from a [BTreeMap](https://doc.rust-lang.org/std/collections/struct.BTreeMap.html) by consuming it.
    /// The values in `BTreeMap` must implement `Into<Value>`. The `name` provided must match with the name in the record
    /// schema the value will be encoded with.
    pub fn from_btree<K: Into<String> + Ord + Display, V: Into<Value>>(
        name: &str,
        btree: BTreeMap<K, V>,
    ) -> Result<Self, AvroplanErr> {
        let mut record = Record::new(name);
        for (k, v) in btree {
            record.fields.insert(k.to_string(), v.into());
        }

        Ok(record)
    }

    /// Creates a record value from a JSON object. A conforming record schema
    /// must be provided; absent keys fall back to the schema's field defaults.
    pub fn from_json(
        json: serde_json::Map<String, serde_json::Value>,
        schema: &Schema,
    ) -> Result<Value, AvroplanErr> {
        materialize(
            schema.variant(),
            &serde_json::Value::Object(json),
            schema.registry(),
        )
    }
}

/// Represents an Avro value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A null value.
    Null,
    /// An i32 integer value.
    Int(i32),
    /// An i64 long value.
    Long(i64),
    /// A boolean value.
    Boolean(bool),
    /// A f32 float value.
    Float(f32),
    /// A f64 float value.
    Double(f64),
    /// A Record value.
    Record(Record),
    /// A Fixed value.
    Fixed(Vec<u8>),
    /// A Map value.
    Map(Map),
    /// A sequence of u8 bytes.
    Bytes(Vec<u8>),
    /// Rust strings map directly to avro strings.
    Str(String),
    /// An enumeration symbol. Unlike Rust enums, enums in avro don't carry data.
    Enum(String),
    /// An array of `Value`s.
    Array(Vec<Value>),
}

macro_rules! value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(impl From<$from> for Value {
            fn from(v: $from) -> Value {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Boolean,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => Str,
    Vec<u8> => Bytes,
    Record => Record,
}

impl From<()> for Value {
    fn from(_v: ()) -> Value {
        Value::Null
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Value {
        Value::Str(v.to_string())
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(v: &'a [u8]) -> Value {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Value {
        Value::Array(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(entries: HashMap<String, T>) -> Value {
        Value::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

macro_rules! value_as {
    ($($(#[$meta:meta])* $accessor:ident($variant:ident) -> $ret:ty;)*) => {
        impl Value {
            $($(#[$meta])*
            pub fn $accessor(&self) -> Result<$ret, AvroplanErr> {
                match self {
                    Value::$variant(v) => Ok(v),
                    _ => Err(AvroplanErr::ExpectedVariantNotFound),
                }
            })*
        }
    };
}

value_as! {
    /// Try to retrieve an avro boolean
    as_boolean(Boolean) -> &bool;
    /// Try to retrieve an avro int
    as_int(Int) -> &i32;
    /// Try to retrieve an avro long
    as_long(Long) -> &i64;
    /// Try to retrieve an avro float
    as_float(Float) -> &f32;
    /// Try to retrieve an avro double
    as_double(Double) -> &f64;
    /// Try to retrieve an avro bytes
    as_bytes(Bytes) -> &[u8];
    /// Try to retrieve an avro string
    as_string(Str) -> &str;
    /// Try to retrieve an avro record
    as_record(Record) -> &Record;
    /// Try to retrieve the symbol of the enum as a string
    as_enum(Enum) -> &str;
    /// Try to retrieve an avro array
    as_array(Array) -> &[Value];
    /// Try to retrieve an avro map
    as_map(Map) -> &Map;
    /// Try to retrieve an avro fixed
    as_fixed(Fixed) -> &[u8];
}

impl Value {
    /// Try to retrieve an avro null
    pub fn as_null(&self) -> Result<(), AvroplanErr> {
        match self {
            Value::Null => Ok(()),
            _ => Err(AvroplanErr::ExpectedVariantNotFound),
        }
    }
}
