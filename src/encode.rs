//! The plan-driven encoder. Takes reader-shaped [`Value`]s and lays their
//! bytes out in writer schema order: fields are looked up by reader name and
//! written into their writer wire slot, promoted primitives are narrowed back
//! to the writer's physical kind with a range check, and writer-only fields
//! are filled from the writer schema's own defaults.

use crate::error::{io_err, AvroplanErr, AvroplanResult};
use crate::resolve::{Action, NodeId, Promotion, RecordStep, ResolutionPlan, Scalar};
use crate::schema::Registry;
use crate::schema::Variant;
use crate::util::{
    encode_double, encode_float, encode_int, encode_len_prefixed, encode_long, encode_raw_bytes,
};
use crate::value::Value;
use std::convert::TryFrom;
use std::io::Write;

/// A push-based encode session. Stateless apart from the plan, so one
/// encoder can emit any number of values.
pub struct Encoder<'p> {
    plan: &'p ResolutionPlan,
}

impl<'p> Encoder<'p> {
    /// Creates an encoder over a resolution plan.
    pub fn new(plan: &'p ResolutionPlan) -> Self {
        Encoder { plan }
    }

    /// Encodes one value into `out` in writer schema order.
    pub fn encode<W: Write>(&self, value: &Value, out: &mut W) -> AvroplanResult<()> {
        self.encode_node(self.plan.root(), value, out)
    }

    fn encode_node<W: Write>(
        &self,
        id: NodeId,
        value: &Value,
        out: &mut W,
    ) -> AvroplanResult<()> {
        match self.plan.action(id) {
            Action::Copy(scalar) => encode_scalar(*scalar, value, out),
            Action::Promote(promotion) => encode_promoted(*promotion, value, out),
            Action::Fixed { size } => match value {
                Value::Fixed(buf) | Value::Bytes(buf) => {
                    if buf.len() != *size {
                        return Err(AvroplanErr::FixedValueLenMismatch {
                            found: buf.len(),
                            expected: *size,
                        });
                    }
                    encode_raw_bytes(buf, out)
                }
                _ => Err(AvroplanErr::SchemaDataMismatch),
            },
            Action::Enum { symbols, .. } => match value {
                Value::Enum(symbol) | Value::Str(symbol) => {
                    let idx = symbols
                        .iter()
                        .position(|s| s == symbol)
                        .ok_or_else(|| AvroplanErr::EnumSymbolNotFound(symbol.clone()))?;
                    encode_int(idx as i32, out)
                }
                _ => Err(AvroplanErr::SchemaDataMismatch),
            },
            Action::Record {
                steps,
                reader_fields,
                reader_order,
                ..
            } => {
                let rec = match value {
                    Value::Record(rec) => rec,
                    _ => return Err(AvroplanErr::SchemaDataMismatch),
                };
                let mut order = reader_order.iter();
                for step in steps {
                    match step {
                        RecordStep::Read { action } => {
                            let reader_pos =
                                *order.next().ok_or(AvroplanErr::SchemaDataMismatch)?;
                            let field_name = &reader_fields[reader_pos];
                            let field_value = rec
                                .fields
                                .get(field_name)
                                .ok_or_else(|| AvroplanErr::FieldNotFound(field_name.clone()))?;
                            self.encode_node(*action, field_value, out)?;
                        }
                        RecordStep::Skip {
                            name,
                            schema,
                            default,
                        } => {
                            // a writer-only slot can only be filled from the
                            // writer field's own default
                            let default = default
                                .as_ref()
                                .ok_or_else(|| AvroplanErr::MissingField(name.clone()))?;
                            encode_with_schema(default, schema, self.plan.writer_registry(), out)?;
                        }
                    }
                }
                Ok(())
            }
            Action::Array { items } => match value {
                Value::Array(elements) => {
                    if !elements.is_empty() {
                        encode_long(elements.len() as i64, out)?;
                        for element in elements {
                            self.encode_node(*items, element, out)?;
                        }
                    }
                    encode_long(0, out)
                }
                _ => Err(AvroplanErr::SchemaDataMismatch),
            },
            Action::Map { values } => match value {
                Value::Map(entries) => {
                    if !entries.is_empty() {
                        encode_long(entries.len() as i64, out)?;
                        for (key, entry) in entries {
                            encode_len_prefixed(key.as_bytes(), out)?;
                            self.encode_node(*values, entry, out)?;
                        }
                    }
                    encode_long(0, out)
                }
                _ => Err(AvroplanErr::SchemaDataMismatch),
            },
            Action::ReaderUnion { inner, .. } => self.encode_node(*inner, value, out),
            Action::WriterUnion {
                branches,
                null_index,
            } => {
                // null short-circuits to the pre-located null branch
                if let Value::Null = value {
                    if let Some(idx) = null_index {
                        encode_long(*idx as i64, out)?;
                        return Ok(());
                    }
                }
                // exact kind match beats a branch reachable only by promotion
                for promoted in &[false, true] {
                    for (idx, branch) in branches.iter().enumerate() {
                        if self.accepts(*branch, value, *promoted) {
                            encode_long(idx as i64, out)?;
                            return self.encode_node(*branch, value, out);
                        }
                    }
                }
                Err(AvroplanErr::NotFoundInUnion)
            }
            Action::Fail { .. } => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    // Whether the value could encode through this branch's action. Checks the
    // reader-facing side since values arrive reader-shaped.
    fn accepts(&self, id: NodeId, value: &Value, promoted: bool) -> bool {
        match self.plan.action(id) {
            Action::Copy(scalar) => matches!(
                (scalar, value),
                (Scalar::Null, Value::Null)
                    | (Scalar::Boolean, Value::Boolean(_))
                    | (Scalar::Int, Value::Int(_))
                    | (Scalar::Long, Value::Long(_))
                    | (Scalar::Float, Value::Float(_))
                    | (Scalar::Double, Value::Double(_))
                    | (Scalar::Bytes, Value::Bytes(_))
                    | (Scalar::Str, Value::Str(_))
            ),
            Action::Promote(promotion) => {
                promoted
                    && matches!(
                        (promotion, value),
                        (Promotion::IntToLong, Value::Long(_))
                            | (Promotion::IntToFloat, Value::Float(_))
                            | (Promotion::IntToDouble, Value::Double(_))
                            | (Promotion::LongToFloat, Value::Float(_))
                            | (Promotion::LongToDouble, Value::Double(_))
                            | (Promotion::FloatToDouble, Value::Double(_))
                            | (Promotion::StrToBytes, Value::Bytes(_))
                            | (Promotion::BytesToStr, Value::Str(_))
                    )
            }
            Action::Fixed { size } => match value {
                Value::Fixed(buf) => buf.len() == *size,
                _ => false,
            },
            Action::Enum { symbols, .. } => match value {
                Value::Enum(symbol) => symbols.iter().any(|s| s == symbol),
                _ => false,
            },
            Action::Record { name, .. } => match value {
                Value::Record(rec) => record_names_match(name, &rec.name),
                _ => false,
            },
            Action::Array { .. } => matches!(value, Value::Array(_)),
            Action::Map { .. } => matches!(value, Value::Map(_)),
            Action::ReaderUnion { inner, .. } => self.accepts(*inner, value, promoted),
            Action::WriterUnion { .. } | Action::Fail { .. } => false,
        }
    }
}

// Union branch selection compares by full name, tolerating an unqualified
// value name against a namespaced plan name.
fn record_names_match(plan_name: &str, value_name: &str) -> bool {
    if plan_name == value_name {
        return true;
    }
    match plan_name.rsplit('.').next() {
        Some(tail) => tail == value_name,
        None => false,
    }
}

fn encode_scalar<W: Write>(scalar: Scalar, value: &Value, out: &mut W) -> AvroplanResult<()> {
    match (scalar, value) {
        (Scalar::Null, Value::Null) => Ok(()),
        (Scalar::Boolean, Value::Boolean(b)) => {
            encode_raw_bytes(&[u8::from(*b)], out)
        }
        (Scalar::Int, Value::Int(v)) => encode_int(*v, out),
        (Scalar::Long, Value::Long(v)) => encode_long(*v, out),
        // writer and reader agree on the wide type, narrower values widen
        (Scalar::Long, Value::Int(v)) => encode_long(i64::from(*v), out),
        (Scalar::Float, Value::Float(v)) => encode_float(*v, out),
        (Scalar::Float, Value::Int(v)) => encode_float(*v as f32, out),
        (Scalar::Double, Value::Double(v)) => encode_double(*v, out),
        (Scalar::Double, Value::Float(v)) => encode_double(f64::from(*v), out),
        (Scalar::Double, Value::Int(v)) => encode_double(f64::from(*v), out),
        (Scalar::Double, Value::Long(v)) => encode_double(*v as f64, out),
        (Scalar::Bytes, Value::Bytes(b)) => encode_len_prefixed(b, out),
        (Scalar::Bytes, Value::Str(s)) => encode_len_prefixed(s.as_bytes(), out),
        (Scalar::Str, Value::Str(s)) => encode_len_prefixed(s.as_bytes(), out),
        _ => Err(AvroplanErr::SchemaDataMismatch),
    }
}

// The reverse of a decode-side promotion: the value carries the reader's wide
// type and must narrow back into the writer's physical kind without loss.
fn encode_promoted<W: Write>(
    promotion: Promotion,
    value: &Value,
    out: &mut W,
) -> AvroplanResult<()> {
    match (promotion, value) {
        (Promotion::IntToLong, Value::Long(v)) => {
            let narrowed = i32::try_from(*v).map_err(|_| AvroplanErr::PromotionRange {
                value: v.to_string(),
                target: "int".to_string(),
            })?;
            encode_int(narrowed, out)
        }
        (Promotion::IntToLong, Value::Int(v)) => encode_int(*v, out),
        (Promotion::IntToFloat, Value::Float(v)) => {
            encode_int(narrow_to_i32(f64::from(*v))?, out)
        }
        (Promotion::IntToFloat, Value::Int(v)) => encode_int(*v, out),
        (Promotion::IntToDouble, Value::Double(v)) => encode_int(narrow_to_i32(*v)?, out),
        (Promotion::IntToDouble, Value::Int(v)) => encode_int(*v, out),
        (Promotion::LongToFloat, Value::Float(v)) => {
            encode_long(narrow_to_i64(f64::from(*v))?, out)
        }
        (Promotion::LongToFloat, Value::Long(v)) => encode_long(*v, out),
        (Promotion::LongToDouble, Value::Double(v)) => encode_long(narrow_to_i64(*v)?, out),
        (Promotion::LongToDouble, Value::Long(v)) => encode_long(*v, out),
        (Promotion::LongToFloat, Value::Int(v)) | (Promotion::LongToDouble, Value::Int(v)) => {
            encode_long(i64::from(*v), out)
        }
        (Promotion::FloatToDouble, Value::Double(v)) => {
            let narrowed = *v as f32;
            if v.is_finite() && narrowed.is_infinite() {
                return Err(AvroplanErr::PromotionRange {
                    value: v.to_string(),
                    target: "float".to_string(),
                });
            }
            encode_float(narrowed, out)
        }
        (Promotion::FloatToDouble, Value::Float(v)) => encode_float(*v, out),
        (Promotion::StrToBytes, Value::Bytes(b)) => {
            std::str::from_utf8(b).map_err(|_| {
                AvroplanErr::EncodeFailed(io_err("bytes for a string writer are not utf-8"))
            })?;
            encode_len_prefixed(b, out)
        }
        (Promotion::StrToBytes, Value::Str(s)) => encode_len_prefixed(s.as_bytes(), out),
        (Promotion::BytesToStr, Value::Str(s)) => encode_len_prefixed(s.as_bytes(), out),
        (Promotion::BytesToStr, Value::Bytes(b)) => encode_len_prefixed(b, out),
        _ => Err(AvroplanErr::SchemaDataMismatch),
    }
}

fn narrow_to_i32(v: f64) -> AvroplanResult<i32> {
    if v.fract() != 0.0 || v < f64::from(i32::min_value()) || v > f64::from(i32::max_value()) {
        return Err(AvroplanErr::PromotionRange {
            value: v.to_string(),
            target: "int".to_string(),
        });
    }
    Ok(v as i32)
}

fn narrow_to_i64(v: f64) -> AvroplanResult<i64> {
    if v.fract() != 0.0 || v < i64::min_value() as f64 || v > i64::max_value() as f64 {
        return Err(AvroplanErr::PromotionRange {
            value: v.to_string(),
            target: "long".to_string(),
        });
    }
    Ok(v as i64)
}

// Writes a value straight against a writer schema, bypassing any resolution.
// Used for writer-only record slots whose value is a materialized default, so
// value and schema line up exactly.
pub(crate) fn encode_with_schema<W: Write>(
    value: &Value,
    schema: &Variant,
    cxt: &Registry,
    out: &mut W,
) -> AvroplanResult<()> {
    match (schema, value) {
        (Variant::Null, Value::Null) => Ok(()),
        (Variant::Boolean, Value::Boolean(b)) => encode_raw_bytes(&[u8::from(*b)], out),
        (Variant::Int, Value::Int(v)) => encode_int(*v, out),
        (Variant::Long, Value::Long(v)) => encode_long(*v, out),
        (Variant::Long, Value::Int(v)) => encode_long(i64::from(*v), out),
        (Variant::Float, Value::Float(v)) => encode_float(*v, out),
        (Variant::Double, Value::Double(v)) => encode_double(*v, out),
        (Variant::Bytes, Value::Bytes(b)) => encode_len_prefixed(b, out),
        (Variant::Str, Value::Str(s)) => encode_len_prefixed(s.as_bytes(), out),
        (Variant::Fixed { size, .. }, Value::Fixed(buf)) => {
            if buf.len() != *size {
                return Err(AvroplanErr::FixedValueLenMismatch {
                    found: buf.len(),
                    expected: *size,
                });
            }
            encode_raw_bytes(buf, out)
        }
        (Variant::Enum { symbols, .. }, Value::Enum(symbol)) => {
            let idx = symbols
                .iter()
                .position(|s| s == symbol)
                .ok_or_else(|| AvroplanErr::EnumSymbolNotFound(symbol.clone()))?;
            encode_int(idx as i32, out)
        }
        (Variant::Record { fields, .. }, Value::Record(rec)) => {
            for (field_name, field) in fields {
                let field_value = rec
                    .fields
                    .get(field_name)
                    .ok_or_else(|| AvroplanErr::FieldNotFound(field_name.clone()))?;
                encode_with_schema(field_value, &field.ty, cxt, out)?;
            }
            Ok(())
        }
        (Variant::Array { items }, Value::Array(elements)) => {
            if !elements.is_empty() {
                encode_long(elements.len() as i64, out)?;
                for element in elements {
                    encode_with_schema(element, items, cxt, out)?;
                }
            }
            encode_long(0, out)
        }
        (Variant::Map { values }, Value::Map(entries)) => {
            if !entries.is_empty() {
                encode_long(entries.len() as i64, out)?;
                for (key, entry) in entries {
                    encode_len_prefixed(key.as_bytes(), out)?;
                    encode_with_schema(entry, values, cxt, out)?;
                }
            }
            encode_long(0, out)
        }
        (Variant::Union { variants, .. }, _) => {
            for (idx, branch) in variants.iter().enumerate() {
                if variant_accepts(branch, value, cxt) {
                    encode_long(idx as i64, out)?;
                    return encode_with_schema(value, branch, cxt, out);
                }
            }
            Err(AvroplanErr::NotFoundInUnion)
        }
        (Variant::Named(name), _) => {
            let target = cxt.get(name).ok_or(AvroplanErr::NamedSchemaNotFound)?;
            encode_with_schema(value, target, cxt, out)
        }
        _ => Err(AvroplanErr::SchemaDataMismatch),
    }
}

fn variant_accepts(schema: &Variant, value: &Value, cxt: &Registry) -> bool {
    match (schema, value) {
        (Variant::Null, Value::Null)
        | (Variant::Boolean, Value::Boolean(_))
        | (Variant::Int, Value::Int(_))
        | (Variant::Long, Value::Long(_))
        | (Variant::Float, Value::Float(_))
        | (Variant::Double, Value::Double(_))
        | (Variant::Bytes, Value::Bytes(_))
        | (Variant::Str, Value::Str(_))
        | (Variant::Record { .. }, Value::Record(_))
        | (Variant::Enum { .. }, Value::Enum(_))
        | (Variant::Array { .. }, Value::Array(_))
        | (Variant::Map { .. }, Value::Map(_)) => true,
        (Variant::Fixed { size, .. }, Value::Fixed(buf)) => buf.len() == *size,
        (Variant::Named(name), _) => match cxt.get(name) {
            Some(target) => variant_accepts(target, value, cxt),
            None => false,
        },
        _ => false,
    }
}
