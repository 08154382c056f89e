//! The default value materializer. Converts a schema-embedded default (a raw
//! JSON literal) into a typed [`Value`] matching a target schema node. Only
//! invoked while a resolution plan is being built, never on the codec hot
//! path, so its cost is amortized across every pass that reuses the plan.

use crate::error::AvroplanErr;
use crate::schema::Registry;
use crate::schema::Variant;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::convert::TryFrom;

pub(crate) fn materialize(
    schema: &Variant,
    literal: &JsonValue,
    cxt: &Registry,
) -> Result<Value, AvroplanErr> {
    match (literal, schema) {
        // A union's default always corresponds to its first branch.
        (d, Variant::Union { variants, .. }) => {
            let first_variant = variants.first().ok_or_else(|| {
                AvroplanErr::InvalidDefault("union schema has no branches".to_string())
            })?;
            materialize(first_variant, d, cxt)
        }
        (d, Variant::Named(name)) => {
            let resolved = cxt.get(name).ok_or(AvroplanErr::NamedSchemaNotFound)?;
            materialize(resolved, d, cxt)
        }
        (JsonValue::Null, Variant::Null) => Ok(Value::Null),
        (JsonValue::Bool(v), Variant::Boolean) => Ok(Value::Boolean(*v)),
        (JsonValue::Number(n), Variant::Int) => {
            let n = n
                .as_i64()
                .ok_or_else(|| invalid(literal, "an int literal"))?;
            let n = i32::try_from(n)
                .map_err(|_| AvroplanErr::InvalidDefault(format!("{} overflows an int", n)))?;
            Ok(Value::Int(n))
        }
        (JsonValue::Number(n), Variant::Long) => n
            .as_i64()
            .map(Value::Long)
            .ok_or_else(|| invalid(literal, "a long literal")),
        (JsonValue::Number(n), Variant::Float) => n
            .as_f64()
            .map(|f| Value::Float(f as f32))
            .ok_or_else(|| invalid(literal, "a float literal")),
        (JsonValue::Number(n), Variant::Double) => n
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| invalid(literal, "a double literal")),
        (JsonValue::String(n), Variant::Str) => Ok(Value::Str(n.clone())),
        // Bytes and fixed defaults use Avro's escaped-string convention where
        // each UTF-16 code unit of the literal is one byte of the value.
        (JsonValue::String(n), Variant::Bytes) => Ok(Value::Bytes(unescape_bytes(n)?)),
        (JsonValue::String(n), Variant::Fixed { size, .. }) => {
            let bytes = unescape_bytes(n)?;
            if bytes.len() != *size {
                return Err(AvroplanErr::InvalidDefault(format!(
                    "fixed default has {} bytes, schema requires {}",
                    bytes.len(),
                    size
                )));
            }
            Ok(Value::Fixed(bytes))
        }
        (JsonValue::String(n), Variant::Enum { symbols, .. }) => {
            if symbols.contains(n) {
                Ok(Value::Enum(n.clone()))
            } else {
                Err(AvroplanErr::InvalidDefault(format!(
                    "`{}` is not a declared enum symbol",
                    n
                )))
            }
        }
        (JsonValue::Object(v), Variant::Record { name, fields, .. }) => {
            // Fields absent from the literal fall back to their own default,
            // recursively. A field with neither is an invalid default.
            let mut values = IndexMap::with_capacity(fields.len());
            for (fname, field) in fields {
                let value = match v.get(fname).or_else(|| field.default.as_ref()) {
                    Some(literal) => materialize(&field.ty, literal, cxt)?,
                    None => {
                        return Err(AvroplanErr::InvalidDefault(format!(
                            "record default is missing non-defaulted field `{}`",
                            fname
                        )))
                    }
                };
                values.insert(fname.to_string(), value);
            }

            Ok(Value::Record(crate::value::Record {
                fields: values,
                name: name.fullname(),
            }))
        }
        (JsonValue::Array(arr), Variant::Array { items }) => {
            let mut default_arr_items: Vec<Value> = Vec::with_capacity(arr.len());
            for v in arr {
                default_arr_items.push(materialize(items, v, cxt)?);
            }

            Ok(Value::Array(default_arr_items))
        }
        (
            JsonValue::Object(map),
            Variant::Map {
                values: values_schema,
            },
        ) => {
            let mut values = HashMap::with_capacity(map.len());
            for (k, v) in map {
                values.insert(k.to_string(), materialize(values_schema, v, cxt)?);
            }

            Ok(Value::Map(values))
        }
        (d, s) => Err(invalid(d, &s.type_name())),
    }
}

fn invalid(literal: &JsonValue, expected: &str) -> AvroplanErr {
    AvroplanErr::InvalidDefault(format!("`{}` cannot be coerced to {}", literal, expected))
}

// One code unit per byte, including values above 127 which appear as
// `\u00XX` escapes in the schema JSON.
fn unescape_bytes(s: &str) -> Result<Vec<u8>, AvroplanErr> {
    let mut bytes = Vec::with_capacity(s.len());
    for c in s.chars() {
        let unit = c as u32;
        if unit > 0xFF {
            return Err(AvroplanErr::InvalidDefault(format!(
                "code point U+{:04X} in a bytes default is out of the one-byte range",
                unit
            )));
        }
        bytes.push(unit as u8);
    }
    Ok(bytes)
}
