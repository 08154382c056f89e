#![allow(missing_docs)]

use std::io::{Error, ErrorKind};

#[inline(always)]
pub(crate) fn io_err(msg: &str) -> Error {
    Error::new(ErrorKind::Other, msg)
}

pub type AvroplanResult<T> = Result<T, AvroplanErr>;

/// Errors returned from avroplan.
///
/// Resolution errors (`SchemaMismatch`, `MissingField`, `InvalidDefault`) are
/// raised while building a plan, before any bytes are touched. The remaining
/// variants are data dependent and can surface on every encode or decode pass.
/// All of them are terminal for the current session.
#[derive(thiserror::Error, Debug)]
pub enum AvroplanErr {
    // Plan build errors
    #[error("no resolution exists between writer schema `{writer}` and reader schema `{reader}`")]
    SchemaMismatch { writer: String, reader: String },
    #[error("reader field `{0}` is absent from the writer schema and carries no default")]
    MissingField(String),
    #[error("invalid default value: {0}")]
    InvalidDefault(String),

    // Decode errors
    #[error("Read failed")]
    DecodeFailed(#[source] std::io::Error),
    #[error("writer union branch {index} does not resolve against the reader schema")]
    UnionBranch { index: usize },
    #[error("union branch index {idx} out of range, the union has {len} branches")]
    UnionBranchOutOfRange { idx: i64, len: usize },
    #[error("index read for enum is out of range as per schema. got: {idx} symbols: {symbols}")]
    InvalidEnumSymbolIdx { idx: usize, symbols: String },
    #[error("writer symbol `{0}` is unknown to the reader enum, which declares no default symbol")]
    EnumSymbolNotFound(String),

    // Encode errors
    #[error("Write failed")]
    EncodeFailed(#[source] std::io::Error),
    #[error("value `{value}` does not fit the writer's `{target}` type")]
    PromotionRange { value: String, target: String },
    #[error("Encoding failed. Value does not match schema")]
    SchemaDataMismatch,
    #[error("field `{0}` not found in record value")]
    FieldNotFound(String),
    #[error("value schema not found in union")]
    NotFoundInUnion,
    #[error("enum value symbol not present in enum schema `symbols` field")]
    EnumSymbolNotPresent,
    #[error("mismatch in fixed bytes length: {found}, {expected}")]
    FixedValueLenMismatch { found: usize, expected: usize },

    // Traversal protocol misuse by the caller
    #[error("traversal out of step with the resolution plan: {0}")]
    ProtocolMisuse(String),

    // Schema parse errors
    #[error("Failed to parse avro schema")]
    SchemaParseErr(#[source] std::io::Error),
    #[error("Unknown schema, expecting a required `type` field in schema")]
    SchemaParseFailed,
    #[error("Record schema does not a have a required field named `name`")]
    RecordNameNotFound,
    #[error("Record schema does not a have a required field named `type`")]
    RecordTypeNotFound,
    #[error("Expected record field to be a json array")]
    ExpectedFieldsJsonArray,
    #[error("Record's field json schema must be an object")]
    InvalidRecordFieldType,
    #[error("Could not parse name from json value")]
    NameParseFailed,
    #[error("Parsing canonical form failed")]
    ParsingCanonicalForm,
    #[error("Duplicate definition of named schema")]
    DuplicateSchema,
    #[error("Unknown field ordering value.")]
    UnknownFieldOrdering,
    #[error("Field ordering value must be a string")]
    InvalidFieldOrdering,
    #[error("Failed to parse symbol from enum's symbols field")]
    EnumSymbolParseErr,
    #[error("Enum schema must contain required `symbols` field")]
    EnumSymbolsMissing,
    #[error("Enum schema parsing failed, found: {0}")]
    EnumParseErr(String),
    #[error("Fixed schema `size` field must be a number")]
    FixedSizeNotNumber,
    #[error("Fixed schema `size` field missing")]
    FixedSizeNotFound,
    #[error("Unions cannot have multiple schemas of same type or immediate unions")]
    DuplicateSchemaInUnion,
    #[error("Expected the avro schema to be as one of json string, object or an array")]
    UnknownSchema,
    #[error("Primitve schema must be a string")]
    InvalidPrimitiveSchema,
    #[error("Named schema was not found in schema registry")]
    NamedSchemaNotFound,

    // Name validation errors
    #[error("namespaces must either be empty or follow the grammer <name>[(<dot><name>)*")]
    InvalidNamespace,
    #[error("Field name must be [A-Za-z_] and subsequently contain only [A-Za-z0-9_]")]
    InvalidName,

    // Value errors
    #[error("Expected value not found in variant instance")]
    ExpectedVariantNotFound,
    #[error("Json must be an object for record")]
    ExpectedJsonObject,
}
