//! The plan-driven decoder. A [`ResolvingReader`] walks a byte stream in
//! writer schema order while exposing fields, elements and branches in reader
//! order, consulting a [`ResolutionPlan`] node at every step. Extra writer
//! data is skipped structurally, promoted primitives are converted as they
//! are read, and defaulted reader fields are surfaced without touching the
//! stream at all.

use crate::error::{io_err, AvroplanErr, AvroplanResult};
use crate::resolve::{Action, NodeId, Promotion, RecordStep, ResolutionPlan, Scalar};
use crate::schema::Registry;
use crate::schema::Variant;
use crate::util::{
    decode_boolean, decode_bytes, decode_double, decode_float, decode_int, decode_long,
    decode_string, skip_raw_bytes,
};
use crate::value::{Record, Value};
use indexmap::IndexMap;
use std::convert::TryFrom;
use std::io::Read;

// What the next typed read operates on. `Default` values never touch the
// stream.
enum Slot<'p> {
    Action(NodeId),
    Default(&'p Value),
    Done,
}

enum Frame<'p> {
    Record {
        steps: &'p [RecordStep],
        // reader positions for Read steps, then for the defaults tail
        order: &'p [usize],
        defaults: &'p [(usize, Value)],
        step_idx: usize,
        order_idx: usize,
        default_idx: usize,
    },
    Array {
        items: NodeId,
        // elements left in the current wire block
        remaining: u64,
    },
    Map {
        values: NodeId,
        remaining: u64,
    },
    // Counterparts that iterate a pre-materialized default instead of bytes.
    DefaultRecord {
        values: Vec<&'p Value>,
        idx: usize,
    },
    DefaultArray {
        items: &'p [Value],
        idx: usize,
    },
    DefaultMap {
        entries: Vec<(&'p str, &'p Value)>,
        idx: usize,
    },
}

/// A single pull-based decode session over one byte stream.
///
/// The reader is a stack machine driven by the caller in reader-shape order:
/// `begin_record`/`next_field` for records, `begin_array`/`array_next` for
/// arrays, `begin_map`/`map_next` for maps, `read_union_branch` for unions,
/// and the typed `read_*` calls for leaves. [`read_value`] drives the whole
/// protocol itself and hands back an owned [`Value`].
///
/// [`read_value`]: ResolvingReader::read_value
pub struct ResolvingReader<'p, R> {
    plan: &'p ResolutionPlan,
    source: R,
    stack: Vec<Frame<'p>>,
    current: Slot<'p>,
}

impl<'p, R: Read> ResolvingReader<'p, R> {
    /// Starts a decode session for one value at the start of `source`.
    pub fn new(plan: &'p ResolutionPlan, source: R) -> Self {
        ResolvingReader {
            plan,
            source,
            stack: vec![],
            current: Slot::Action(plan.root()),
        }
    }

    /// Rearms the reader for the next value on the same stream.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.current = Slot::Action(self.plan.root());
    }

    fn take(&mut self) -> AvroplanResult<Slot<'p>> {
        match std::mem::replace(&mut self.current, Slot::Done) {
            Slot::Done => Err(AvroplanErr::ProtocolMisuse(
                "no value is pending at this position".to_string(),
            )),
            slot => Ok(slot),
        }
    }

    fn misuse(&self, wanted: &str, action: &Action) -> AvroplanErr {
        AvroplanErr::ProtocolMisuse(format!("a {} was requested against {:?}", wanted, action))
    }

    /// Decodes the pending value in full, driving the traversal protocol
    /// internally.
    pub fn read_value(&mut self) -> AvroplanResult<Value> {
        match self.take()? {
            Slot::Default(value) => Ok(value.clone()),
            Slot::Action(id) => self.read_action(id),
            Slot::Done => Err(AvroplanErr::ProtocolMisuse(
                "no value is pending at this position".to_string(),
            )),
        }
    }

    fn read_action(&mut self, id: NodeId) -> AvroplanResult<Value> {
        let plan = self.plan;
        match plan.action(id) {
            Action::Copy(Scalar::Null) => Ok(Value::Null),
            Action::Copy(Scalar::Boolean) => Ok(Value::Boolean(decode_boolean(&mut self.source)?)),
            Action::Copy(Scalar::Int) => Ok(Value::Int(decode_int(&mut self.source)?)),
            Action::Copy(Scalar::Long) => Ok(Value::Long(decode_long(&mut self.source)?)),
            Action::Copy(Scalar::Float) => Ok(Value::Float(decode_float(&mut self.source)?)),
            Action::Copy(Scalar::Double) => Ok(Value::Double(decode_double(&mut self.source)?)),
            Action::Copy(Scalar::Bytes) => Ok(Value::Bytes(decode_bytes(&mut self.source)?)),
            Action::Copy(Scalar::Str) => Ok(Value::Str(decode_string(&mut self.source)?)),
            Action::Promote(promotion) => self.read_promoted(*promotion),
            Action::Fixed { size } => {
                let mut buf = vec![0u8; *size];
                self.source
                    .read_exact(&mut buf)
                    .map_err(AvroplanErr::DecodeFailed)?;
                Ok(Value::Fixed(buf))
            }
            Action::Enum { symbols, resolved } => {
                let symbol = read_enum_symbol(&mut self.source, symbols, resolved)?;
                Ok(Value::Enum(symbol))
            }
            Action::Record {
                name,
                steps,
                reader_fields,
                reader_order,
                defaults,
            } => {
                let mut slots: Vec<Option<Value>> = Vec::new();
                slots.resize_with(reader_fields.len(), || None);
                let mut order = reader_order.iter();
                for step in steps {
                    match step {
                        RecordStep::Read { action } => {
                            let reader_pos =
                                *order.next().ok_or(AvroplanErr::SchemaDataMismatch)?;
                            slots[reader_pos] = Some(self.read_action(*action)?);
                        }
                        RecordStep::Skip { schema, .. } => {
                            skip_value(schema, plan.writer_registry(), &mut self.source)?;
                        }
                    }
                }
                for (reader_pos, value) in defaults {
                    slots[*reader_pos] = Some(value.clone());
                }
                let mut fields = IndexMap::with_capacity(reader_fields.len());
                for (field_name, slot) in reader_fields.iter().zip(slots) {
                    // every reader position is matched or defaulted by construction
                    let value = slot.ok_or(AvroplanErr::SchemaDataMismatch)?;
                    fields.insert(field_name.clone(), value);
                }
                Ok(Value::Record(Record {
                    name: name.clone(),
                    fields,
                }))
            }
            Action::Array { items } => {
                let mut out = vec![];
                loop {
                    let count = read_block_count(&mut self.source)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        out.push(self.read_action(*items)?);
                    }
                }
                Ok(Value::Array(out))
            }
            Action::Map { values } => {
                let mut out = std::collections::HashMap::new();
                loop {
                    let count = read_block_count(&mut self.source)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        let key = decode_string(&mut self.source)?;
                        out.insert(key, self.read_action(*values)?);
                    }
                }
                Ok(Value::Map(out))
            }
            Action::ReaderUnion { inner, .. } => self.read_action(*inner),
            Action::WriterUnion { branches, .. } => {
                let branch = self.read_wire_branch(branches)?;
                self.read_action(branch)
            }
            Action::Fail { .. } => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    fn read_promoted(&mut self, promotion: Promotion) -> AvroplanResult<Value> {
        Ok(match promotion {
            Promotion::IntToLong => Value::Long(i64::from(decode_int(&mut self.source)?)),
            Promotion::IntToFloat => Value::Float(decode_int(&mut self.source)? as f32),
            Promotion::IntToDouble => Value::Double(f64::from(decode_int(&mut self.source)?)),
            Promotion::LongToFloat => Value::Float(decode_long(&mut self.source)? as f32),
            Promotion::LongToDouble => Value::Double(decode_long(&mut self.source)? as f64),
            Promotion::FloatToDouble => Value::Double(f64::from(decode_float(&mut self.source)?)),
            Promotion::StrToBytes => Value::Bytes(decode_bytes(&mut self.source)?),
            Promotion::BytesToStr => {
                let buf = decode_bytes(&mut self.source)?;
                let s = String::from_utf8(buf).map_err(|_| {
                    AvroplanErr::DecodeFailed(io_err("bytes promoted to string are not utf-8"))
                })?;
                Value::Str(s)
            }
        })
    }

    // Reads the on-wire branch index of a writer union and returns the
    // pre-resolved action behind it.
    fn read_wire_branch(&mut self, branches: &[NodeId]) -> AvroplanResult<NodeId> {
        let idx = decode_long(&mut self.source)?;
        let branch = usize::try_from(idx)
            .ok()
            .filter(|i| *i < branches.len())
            .ok_or(AvroplanErr::UnionBranchOutOfRange {
                idx,
                len: branches.len(),
            })?;
        if let Action::Fail { .. } = self.plan.action(branches[branch]) {
            return Err(AvroplanErr::UnionBranch { index: branch });
        }
        Ok(branches[branch])
    }

    /// Begins a record. `next_field` then yields reader field positions until
    /// the record is exhausted.
    pub fn begin_record(&mut self) -> AvroplanResult<()> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Record {
                    steps,
                    reader_order,
                    defaults,
                    ..
                } => {
                    self.stack.push(Frame::Record {
                        steps,
                        order: reader_order,
                        defaults,
                        step_idx: 0,
                        order_idx: 0,
                        default_idx: 0,
                    });
                    Ok(())
                }
                other => Err(self.misuse("record", other)),
            },
            Slot::Default(Value::Record(rec)) => {
                self.stack.push(Frame::DefaultRecord {
                    values: rec.fields.values().collect(),
                    idx: 0,
                });
                Ok(())
            }
            _ => Err(AvroplanErr::ProtocolMisuse(
                "a record was requested against a non-record default".to_string(),
            )),
        }
    }

    /// Advances to the next reader-visible field of the innermost record,
    /// performing any pending skips, and returns its reader position.
    /// Defaulted reader fields are surfaced after all writer fields; `None`
    /// closes the record.
    pub fn next_field(&mut self) -> AvroplanResult<Option<usize>> {
        loop {
            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => {
                    return Err(AvroplanErr::ProtocolMisuse(
                        "next_field called outside a record".to_string(),
                    ))
                }
            };
            match frame {
                Frame::Record {
                    steps,
                    order,
                    defaults,
                    step_idx,
                    order_idx,
                    default_idx,
                } => {
                    if *step_idx < steps.len() {
                        let step = &steps[*step_idx];
                        *step_idx += 1;
                        match step {
                            RecordStep::Read { action } => {
                                let reader_pos = order[*order_idx];
                                *order_idx += 1;
                                self.current = Slot::Action(*action);
                                return Ok(Some(reader_pos));
                            }
                            RecordStep::Skip { schema, .. } => {
                                skip_value(schema, self.plan.writer_registry(), &mut self.source)?;
                                continue;
                            }
                        }
                    }
                    if *default_idx < defaults.len() {
                        let (reader_pos, value) = &defaults[*default_idx];
                        *default_idx += 1;
                        self.current = Slot::Default(value);
                        return Ok(Some(*reader_pos));
                    }
                }
                Frame::DefaultRecord { values, idx } => {
                    if *idx < values.len() {
                        let reader_pos = *idx;
                        self.current = Slot::Default(values[reader_pos]);
                        *idx += 1;
                        return Ok(Some(reader_pos));
                    }
                }
                _ => {
                    return Err(AvroplanErr::ProtocolMisuse(
                        "next_field called inside a container".to_string(),
                    ))
                }
            }
            self.stack.pop();
            self.current = Slot::Done;
            return Ok(None);
        }
    }

    /// Begins an array. `array_next` then arms one element at a time.
    pub fn begin_array(&mut self) -> AvroplanResult<()> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Array { items } => {
                    let remaining = read_block_count(&mut self.source)?;
                    self.stack.push(Frame::Array {
                        items: *items,
                        remaining,
                    });
                    Ok(())
                }
                other => Err(self.misuse("array", other)),
            },
            Slot::Default(Value::Array(items)) => {
                self.stack.push(Frame::DefaultArray { items, idx: 0 });
                Ok(())
            }
            _ => Err(AvroplanErr::ProtocolMisuse(
                "an array was requested against a non-array default".to_string(),
            )),
        }
    }

    /// Arms the next array element for reading. `false` closes the array.
    pub fn array_next(&mut self) -> AvroplanResult<bool> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => {
                return Err(AvroplanErr::ProtocolMisuse(
                    "array_next called outside an array".to_string(),
                ))
            }
        };
        match frame {
            Frame::Array { items, remaining } => {
                if *remaining == 0 {
                    let next_block = read_block_count(&mut self.source)?;
                    if next_block == 0 {
                        self.stack.pop();
                        self.current = Slot::Done;
                        return Ok(false);
                    }
                    *remaining = next_block;
                }
                *remaining -= 1;
                self.current = Slot::Action(*items);
                Ok(true)
            }
            Frame::DefaultArray { items, idx } => {
                if *idx < items.len() {
                    self.current = Slot::Default(&items[*idx]);
                    *idx += 1;
                    Ok(true)
                } else {
                    self.stack.pop();
                    self.current = Slot::Done;
                    Ok(false)
                }
            }
            _ => Err(AvroplanErr::ProtocolMisuse(
                "array_next called outside an array".to_string(),
            )),
        }
    }

    /// Begins a map. `map_next` then yields one key at a time.
    pub fn begin_map(&mut self) -> AvroplanResult<()> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Map { values } => {
                    let remaining = read_block_count(&mut self.source)?;
                    self.stack.push(Frame::Map {
                        values: *values,
                        remaining,
                    });
                    Ok(())
                }
                other => Err(self.misuse("map", other)),
            },
            Slot::Default(Value::Map(entries)) => {
                self.stack.push(Frame::DefaultMap {
                    entries: entries
                        .iter()
                        .map(|(k, v)| (k.as_str(), v))
                        .collect(),
                    idx: 0,
                });
                Ok(())
            }
            _ => Err(AvroplanErr::ProtocolMisuse(
                "a map was requested against a non-map default".to_string(),
            )),
        }
    }

    /// Reads the next map key and arms its value. `None` closes the map.
    pub fn map_next(&mut self) -> AvroplanResult<Option<String>> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => {
                return Err(AvroplanErr::ProtocolMisuse(
                    "map_next called outside a map".to_string(),
                ))
            }
        };
        match frame {
            Frame::Map { values, remaining } => {
                if *remaining == 0 {
                    let next_block = read_block_count(&mut self.source)?;
                    if next_block == 0 {
                        self.stack.pop();
                        self.current = Slot::Done;
                        return Ok(None);
                    }
                    *remaining = next_block;
                }
                *remaining -= 1;
                let values = *values;
                let key = decode_string(&mut self.source)?;
                self.current = Slot::Action(values);
                Ok(Some(key))
            }
            Frame::DefaultMap { entries, idx } => {
                if *idx < entries.len() {
                    let (key, value) = entries[*idx];
                    *idx += 1;
                    self.current = Slot::Default(value);
                    Ok(Some(key.to_string()))
                } else {
                    self.stack.pop();
                    self.current = Slot::Done;
                    Ok(None)
                }
            }
            _ => Err(AvroplanErr::ProtocolMisuse(
                "map_next called outside a map".to_string(),
            )),
        }
    }

    /// Resolves the pending union and returns the reader branch its value
    /// belongs to, leaving the branch's value armed for reading. Writer
    /// unions read the on-wire branch index here; reader unions synthesize
    /// their fixed branch without touching the stream. Returns 0 when the
    /// reader side is not a union.
    pub fn read_union_branch(&mut self) -> AvroplanResult<usize> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::WriterUnion { branches, .. } => {
                    let chosen = self.read_wire_branch(branches)?;
                    match plan.action(chosen) {
                        Action::ReaderUnion { branch, inner } => {
                            self.current = Slot::Action(*inner);
                            Ok(*branch)
                        }
                        _ => {
                            self.current = Slot::Action(chosen);
                            Ok(0)
                        }
                    }
                }
                Action::ReaderUnion { branch, inner } => {
                    self.current = Slot::Action(*inner);
                    Ok(*branch)
                }
                other => Err(self.misuse("union", other)),
            },
            Slot::Default(value) => {
                // union defaults always belong to the first reader branch
                self.current = Slot::Default(value);
                Ok(0)
            }
            Slot::Done => Err(AvroplanErr::ProtocolMisuse(
                "no value is pending at this position".to_string(),
            )),
        }
    }

    /// Reads a null leaf.
    pub fn read_null(&mut self) -> AvroplanResult<()> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Null) => Ok(()),
                other => Err(self.misuse("null", other)),
            },
            Slot::Default(Value::Null) => Ok(()),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a boolean leaf.
    pub fn read_boolean(&mut self) -> AvroplanResult<bool> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Boolean) => decode_boolean(&mut self.source),
                other => Err(self.misuse("boolean", other)),
            },
            Slot::Default(Value::Boolean(b)) => Ok(*b),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads an int leaf. Ints never promote downward, so the action must be
    /// a plain copy.
    pub fn read_int(&mut self) -> AvroplanResult<i32> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Int) => decode_int(&mut self.source),
                other => Err(self.misuse("int", other)),
            },
            Slot::Default(Value::Int(v)) => Ok(*v),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a long leaf, promoting a written int when the plan says so.
    pub fn read_long(&mut self) -> AvroplanResult<i64> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Long) => decode_long(&mut self.source),
                Action::Promote(Promotion::IntToLong) => {
                    Ok(i64::from(decode_int(&mut self.source)?))
                }
                other => Err(self.misuse("long", other)),
            },
            Slot::Default(Value::Long(v)) => Ok(*v),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a float leaf, promoting a written int or long when the plan
    /// says so.
    pub fn read_float(&mut self) -> AvroplanResult<f32> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Float) => decode_float(&mut self.source),
                Action::Promote(Promotion::IntToFloat) => {
                    Ok(decode_int(&mut self.source)? as f32)
                }
                Action::Promote(Promotion::LongToFloat) => {
                    Ok(decode_long(&mut self.source)? as f32)
                }
                other => Err(self.misuse("float", other)),
            },
            Slot::Default(Value::Float(v)) => Ok(*v),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a double leaf, promoting any written numeric when the plan says
    /// so.
    pub fn read_double(&mut self) -> AvroplanResult<f64> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Double) => decode_double(&mut self.source),
                Action::Promote(Promotion::IntToDouble) => {
                    Ok(f64::from(decode_int(&mut self.source)?))
                }
                Action::Promote(Promotion::LongToDouble) => {
                    Ok(decode_long(&mut self.source)? as f64)
                }
                Action::Promote(Promotion::FloatToDouble) => {
                    Ok(f64::from(decode_float(&mut self.source)?))
                }
                other => Err(self.misuse("double", other)),
            },
            Slot::Default(Value::Double(v)) => Ok(*v),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a string leaf, converting written bytes when the plan says so.
    pub fn read_string(&mut self) -> AvroplanResult<String> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Str) => decode_string(&mut self.source),
                Action::Promote(Promotion::BytesToStr) => {
                    let buf = decode_bytes(&mut self.source)?;
                    String::from_utf8(buf).map_err(|_| {
                        AvroplanErr::DecodeFailed(io_err("bytes promoted to string are not utf-8"))
                    })
                }
                other => Err(self.misuse("string", other)),
            },
            Slot::Default(Value::Str(s)) => Ok(s.clone()),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a bytes leaf, converting a written string when the plan says
    /// so (they share the same framing).
    pub fn read_bytes(&mut self) -> AvroplanResult<Vec<u8>> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Copy(Scalar::Bytes) | Action::Promote(Promotion::StrToBytes) => {
                    decode_bytes(&mut self.source)
                }
                other => Err(self.misuse("bytes", other)),
            },
            Slot::Default(Value::Bytes(b)) => Ok(b.clone()),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads a fixed leaf of the resolved size.
    pub fn read_fixed(&mut self) -> AvroplanResult<Vec<u8>> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Fixed { size } => {
                    let mut buf = vec![0u8; *size];
                    self.source
                        .read_exact(&mut buf)
                        .map_err(AvroplanErr::DecodeFailed)?;
                    Ok(buf)
                }
                other => Err(self.misuse("fixed", other)),
            },
            Slot::Default(Value::Fixed(b)) => Ok(b.clone()),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }

    /// Reads an enum leaf, returning the reader-side symbol for the written
    /// index.
    pub fn read_enum(&mut self) -> AvroplanResult<String> {
        let plan = self.plan;
        match self.take()? {
            Slot::Action(id) => match plan.action(id) {
                Action::Enum { symbols, resolved } => {
                    read_enum_symbol(&mut self.source, symbols, resolved)
                }
                other => Err(self.misuse("enum", other)),
            },
            Slot::Default(Value::Enum(s)) => Ok(s.clone()),
            _ => Err(AvroplanErr::SchemaDataMismatch),
        }
    }
}

fn read_enum_symbol<R: Read>(
    source: &mut R,
    symbols: &[String],
    resolved: &[Option<String>],
) -> AvroplanResult<String> {
    let wire_idx = decode_int(source)?;
    let idx = usize::try_from(wire_idx)
        .ok()
        .filter(|i| *i < resolved.len())
        .ok_or_else(|| AvroplanErr::InvalidEnumSymbolIdx {
            idx: wire_idx.max(0) as usize,
            symbols: format!("{:?}", symbols),
        })?;
    match &resolved[idx] {
        Some(symbol) => Ok(symbol.clone()),
        None => Err(AvroplanErr::EnumSymbolNotFound(symbols[idx].clone())),
    }
}

// A block count on the wire. Negative counts carry the block's byte size in a
// trailing long, which materializing decoders read and discard.
fn read_block_count<R: Read>(source: &mut R) -> AvroplanResult<u64> {
    let count = decode_long(source)?;
    if count < 0 {
        decode_long(source)?;
        Ok(count.unsigned_abs())
    } else {
        Ok(count as u64)
    }
}

/// Consumes exactly the bytes one value of `schema` occupies, without
/// materializing it. Kept in strict lockstep with the primitive codec's
/// framing; any drift here desynchronizes the whole remaining stream.
pub(crate) fn skip_value<R: Read>(
    schema: &Variant,
    cxt: &Registry,
    source: &mut R,
) -> AvroplanResult<()> {
    match schema {
        Variant::Null => Ok(()),
        Variant::Boolean => skip_raw_bytes(source, 1),
        Variant::Int => decode_int(source).map(|_| ()),
        Variant::Long => decode_long(source).map(|_| ()),
        Variant::Float => skip_raw_bytes(source, 4),
        Variant::Double => skip_raw_bytes(source, 8),
        Variant::Bytes | Variant::Str => {
            let len = decode_long(source)?;
            if len < 0 {
                return Err(AvroplanErr::DecodeFailed(io_err(
                    "negative length prefix while skipping",
                )));
            }
            skip_raw_bytes(source, len as u64)
        }
        Variant::Fixed { size, .. } => skip_raw_bytes(source, *size as u64),
        Variant::Enum { .. } => decode_int(source).map(|_| ()),
        Variant::Record { fields, .. } => {
            for (_, field) in fields {
                skip_value(&field.ty, cxt, source)?;
            }
            Ok(())
        }
        Variant::Array { items } => skip_blocks(source, |source| skip_value(items, cxt, source)),
        Variant::Map { values } => skip_blocks(source, |source| {
            let key_len = decode_long(source)?;
            if key_len < 0 {
                return Err(AvroplanErr::DecodeFailed(io_err(
                    "negative length prefix while skipping",
                )));
            }
            skip_raw_bytes(source, key_len as u64)?;
            skip_value(values, cxt, source)
        }),
        Variant::Union { variants, .. } => {
            let idx = decode_long(source)?;
            let branch = usize::try_from(idx)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or(AvroplanErr::UnionBranchOutOfRange {
                    idx,
                    len: variants.len(),
                })?;
            skip_value(branch, cxt, source)
        }
        Variant::Named(name) => {
            let target = cxt.get(name).ok_or(AvroplanErr::NamedSchemaNotFound)?;
            skip_value(target, cxt, source)
        }
    }
}

// Walks the array/map block protocol. Negative counts announce the block's
// byte size, which lets the whole block be skipped without touching elements.
fn skip_blocks<R, F>(source: &mut R, mut skip_one: F) -> AvroplanResult<()>
where
    R: Read,
    F: FnMut(&mut R) -> AvroplanResult<()>,
{
    loop {
        let count = decode_long(source)?;
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            let byte_size = decode_long(source)?;
            if byte_size < 0 {
                return Err(AvroplanErr::DecodeFailed(io_err(
                    "negative block size while skipping",
                )));
            }
            skip_raw_bytes(source, byte_size as u64)?;
            continue;
        }
        for _ in 0..count {
            skip_one(source)?;
        }
    }
}
