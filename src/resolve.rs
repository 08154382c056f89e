//! The schema resolver. Computes, once per (writer, reader) schema pair, a
//! [`ResolutionPlan`]: an action for every position of the writer's byte
//! layout telling a single-pass decoder what to do with it (copy, promote,
//! skip, substitute a default) and a single-pass encoder how to place logical
//! values into writer order.
//!
//! Plans are stored as an index-based arena of [`Action`] nodes rather than
//! an owned recursive tree, so recursive and self-referential schemas
//! terminate and share one node per (writer type, reader type) pair.

use crate::decode::ResolvingReader;
use crate::defaults::materialize;
use crate::encode::Encoder;
use crate::error::{AvroplanErr, AvroplanResult};
use crate::schema::common::{Field, Name};
use crate::schema::parser::locate_null_branch;
use crate::schema::Registry;
use crate::schema::Schema;
use crate::schema::Variant;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

pub(crate) type NodeId = usize;

// Physical layout kinds a `Copy` action can read or write directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Scalar {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    Str,
}

// The promotable writer/reader kind pairs. The name reads writer-to-reader:
// decode widens in that direction, encode narrows back with a range check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Promotion {
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToFloat,
    LongToDouble,
    FloatToDouble,
    StrToBytes,
    BytesToStr,
}

// One entry per writer record field, in writer declaration order. Read steps
// do not carry their reader position; `reader_order` on the record action is
// the authority for where each decoded value lands.
#[derive(Debug)]
pub(crate) enum RecordStep {
    // Writer field with a reader counterpart.
    Read { action: NodeId },
    // Writer field with no reader counterpart. The decoder consumes its bytes
    // structurally; the encoder fills the slot from the writer's own field
    // default, when it has one.
    Skip {
        name: String,
        schema: Variant,
        default: Option<Value>,
    },
}

#[derive(Debug)]
pub(crate) enum Action {
    Copy(Scalar),
    Promote(Promotion),
    Fixed {
        size: usize,
    },
    Enum {
        // writer symbols, for encoding
        symbols: Vec<String>,
        // per writer index: the reader symbol to surface, already fallen back
        // to the reader's default symbol. None errors when met on the wire.
        resolved: Vec<Option<String>>,
    },
    Record {
        name: String,
        steps: Vec<RecordStep>,
        // reader field names in reader declaration order
        reader_fields: Vec<String>,
        // reader positions in the order their values become available during
        // the writer-ordered decode walk; defaulted fields trail.
        reader_order: Vec<usize>,
        // reader-only fields and their materialized defaults
        defaults: Vec<(usize, Value)>,
    },
    Array {
        items: NodeId,
    },
    Map {
        values: NodeId,
    },
    // Writer is a plain type, reader expects a union: the single matching
    // branch is fixed at resolution time, no bytes carry a branch index.
    ReaderUnion {
        branch: usize,
        inner: NodeId,
    },
    // Writer is a union: the branch is only known at decode time from the
    // on-wire index, so every branch carries its own pre-resolved action.
    WriterUnion {
        branches: Vec<NodeId>,
        null_index: Option<usize>,
    },
    // A writer union branch with no reader interpretation. Raised as
    // `UnionBranch` exactly when that branch is encountered on the wire.
    Fail {
        writer: String,
        reader: String,
    },
}

/// The precomputed mapping between a writer schema and a reader schema.
///
/// A plan is pure data: it holds no stream state, so one plan can be shared
/// read-only across any number of concurrently running encode and decode
/// sessions. Build it once per schema pair (or let a [`PlanCache`] do that)
/// and reuse it.
#[derive(Debug)]
pub struct ResolutionPlan {
    nodes: Vec<Action>,
    root: NodeId,
    // writer-side named schemas, needed for structural skips
    writer_cxt: Registry,
}

impl ResolutionPlan {
    /// Resolves `reader` against `writer`, failing with
    /// [`AvroplanErr::SchemaMismatch`] (or `MissingField`/`InvalidDefault`)
    /// when no compatible interpretation exists. No bytes are touched here.
    pub fn resolve(writer: &Schema, reader: &Schema) -> AvroplanResult<Self> {
        let mut builder = PlanBuilder {
            nodes: vec![],
            memo: HashMap::new(),
            failed: HashSet::new(),
            w_cxt: writer.registry(),
            r_cxt: reader.registry(),
        };
        let root = builder.resolve(writer.variant(), reader.variant())?;
        Ok(ResolutionPlan {
            nodes: builder.nodes,
            root,
            writer_cxt: writer.registry().clone(),
        })
    }

    /// Decodes one value from `source`, driving the byte stream in writer
    /// order and producing the value shaped by the reader schema.
    pub fn decode<R: Read>(&self, source: &mut R) -> AvroplanResult<Value> {
        ResolvingReader::new(self, source).read_value()
    }

    /// Encodes one reader-shaped value into `out` in writer schema order.
    pub fn encode<W: Write>(&self, value: &Value, out: &mut W) -> AvroplanResult<()> {
        Encoder::new(self).encode(value, out)
    }

    pub(crate) fn action(&self, id: NodeId) -> &Action {
        &self.nodes[id]
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn writer_registry(&self) -> &Registry {
        &self.writer_cxt
    }
}

struct PlanBuilder<'a> {
    nodes: Vec<Action>,
    // (writer fullname, reader fullname) -> plan node, consulted before
    // recursing so cyclic schemas terminate and share one node.
    memo: HashMap<(String, String), NodeId>,
    // named pairs that already failed; resolution is pure, so they stay failed
    failed: HashSet<(String, String)>,
    w_cxt: &'a Registry,
    r_cxt: &'a Registry,
}

impl<'a> PlanBuilder<'a> {
    fn push(&mut self, action: Action) -> NodeId {
        self.nodes.push(action);
        self.nodes.len() - 1
    }

    fn resolve(&mut self, writer: &Variant, reader: &Variant) -> AvroplanResult<NodeId> {
        let writer = self.deref_named(writer, self.w_cxt)?;
        let reader = self.deref_named(reader, self.r_cxt)?;

        let memo_key = named_pair(writer, reader);
        if let Some(key) = &memo_key {
            if self.failed.contains(key) {
                return Err(mismatch(writer, reader));
            }
            if let Some(id) = self.memo.get(key) {
                return Ok(*id);
            }
        }

        // Reserve the node up front so self-references resolve to it.
        let slot = memo_key.as_ref().map(|key| {
            let id = self.push(Action::Fail {
                writer: writer.type_name(),
                reader: reader.type_name(),
            });
            self.memo.insert(key.clone(), id);
            id
        });

        match self.resolve_inner(writer, reader) {
            Ok(action) => Ok(match slot {
                Some(id) => {
                    self.nodes[id] = action;
                    id
                }
                None => self.push(action),
            }),
            Err(e) => {
                if let Some(key) = memo_key {
                    self.failed.insert(key);
                }
                Err(e)
            }
        }
    }

    fn resolve_inner(&mut self, writer: &Variant, reader: &Variant) -> AvroplanResult<Action> {
        if let Some(scalar) = scalar_copy(writer, reader) {
            return Ok(Action::Copy(scalar));
        }
        if let Some(promotion) = promotion_for(writer, reader) {
            return Ok(Action::Promote(promotion));
        }

        match (writer, reader) {
            (Variant::Union { variants, .. }, _) => self.resolve_writer_union(variants, reader),
            (_, Variant::Union { variants, .. }) => self.resolve_reader_union(writer, variants),
            (
                Variant::Record {
                    name: w_name,
                    fields: w_fields,
                    ..
                },
                Variant::Record {
                    name: r_name,
                    aliases: r_aliases,
                    fields: r_fields,
                },
            ) => {
                if !names_match(w_name, r_name, r_aliases) {
                    return Err(mismatch(writer, reader));
                }
                self.resolve_record(w_fields, r_name, r_fields)
            }
            (
                Variant::Enum {
                    name: w_name,
                    symbols: w_symbols,
                    ..
                },
                Variant::Enum {
                    name: r_name,
                    aliases: r_aliases,
                    symbols: r_symbols,
                    default: r_default,
                },
            ) => {
                if !names_match(w_name, r_name, r_aliases) {
                    return Err(mismatch(writer, reader));
                }
                // Unknown writer symbols fall back to the reader's declared
                // default symbol; with no default they fail at decode time.
                let resolved = w_symbols
                    .iter()
                    .map(|s| {
                        if r_symbols.contains(s) {
                            Some(s.clone())
                        } else {
                            r_default.clone()
                        }
                    })
                    .collect();
                Ok(Action::Enum {
                    symbols: w_symbols.clone(),
                    resolved,
                })
            }
            (
                Variant::Fixed {
                    name: w_name,
                    size: w_size,
                    ..
                },
                Variant::Fixed {
                    name: r_name,
                    aliases: r_aliases,
                    size: r_size,
                },
            ) => {
                // sizes must match exactly, fixed has no promotions
                if !names_match(w_name, r_name, r_aliases) || w_size != r_size {
                    return Err(mismatch(writer, reader));
                }
                Ok(Action::Fixed { size: *w_size })
            }
            (Variant::Array { items: w_items }, Variant::Array { items: r_items }) => {
                let items = self.resolve(w_items, r_items)?;
                Ok(Action::Array { items })
            }
            (Variant::Map { values: w_values }, Variant::Map { values: r_values }) => {
                let values = self.resolve(w_values, r_values)?;
                Ok(Action::Map { values })
            }
            _ => Err(mismatch(writer, reader)),
        }
    }

    fn resolve_record(
        &mut self,
        w_fields: &IndexMap<String, Field>,
        r_name: &Name,
        r_fields: &IndexMap<String, Field>,
    ) -> AvroplanResult<Action> {
        let mut steps = Vec::with_capacity(w_fields.len());
        let mut reader_order = Vec::new();
        let mut matched = vec![false; r_fields.len()];

        for (_, w_field) in w_fields {
            match match_reader_field(r_fields, w_field) {
                Some((reader_pos, r_field)) => {
                    matched[reader_pos] = true;
                    reader_order.push(reader_pos);
                    let action = self.resolve(&w_field.ty, &r_field.ty)?;
                    steps.push(RecordStep::Read { action });
                }
                None => {
                    // Materialized now so the encode direction can fill the
                    // writer-only slot without touching JSON per record.
                    let default = match &w_field.default {
                        Some(literal) => Some(materialize(&w_field.ty, literal, self.w_cxt)?),
                        None => None,
                    };
                    steps.push(RecordStep::Skip {
                        name: w_field.name.clone(),
                        schema: w_field.ty.clone(),
                        default,
                    });
                }
            }
        }

        // Reader fields the writer never wrote must carry their own default.
        let mut defaults = Vec::new();
        for (reader_pos, (field_name, r_field)) in r_fields.iter().enumerate() {
            if matched[reader_pos] {
                continue;
            }
            let literal = r_field
                .default
                .as_ref()
                .ok_or_else(|| AvroplanErr::MissingField(field_name.clone()))?;
            defaults.push((reader_pos, materialize(&r_field.ty, literal, self.r_cxt)?));
        }

        reader_order.extend(defaults.iter().map(|(pos, _)| *pos));

        Ok(Action::Record {
            name: r_name.fullname(),
            steps,
            reader_fields: r_fields.keys().cloned().collect(),
            reader_order,
            defaults,
        })
    }

    fn resolve_writer_union(
        &mut self,
        w_variants: &[Variant],
        reader: &Variant,
    ) -> AvroplanResult<Action> {
        // Every writer branch needs an entry since the physical branch index
        // is only known at decode time. Branches with no reader
        // interpretation become always-failing sentinels so a clear error is
        // raised exactly when such a branch is actually on the wire.
        let mut branches = Vec::with_capacity(w_variants.len());
        let mut any_resolved = false;
        for branch in w_variants {
            match self.resolve(branch, reader) {
                Ok(id) => {
                    any_resolved = true;
                    branches.push(id);
                }
                Err(_) => {
                    let id = self.push(Action::Fail {
                        writer: branch.type_name(),
                        reader: reader.type_name(),
                    });
                    branches.push(id);
                }
            }
        }

        if !any_resolved {
            return Err(AvroplanErr::SchemaMismatch {
                writer: "union".to_string(),
                reader: reader.type_name(),
            });
        }

        Ok(Action::WriterUnion {
            branches,
            null_index: locate_null_branch(w_variants),
        })
    }

    fn resolve_reader_union(
        &mut self,
        writer: &Variant,
        r_variants: &[Variant],
    ) -> AvroplanResult<Action> {
        // First declared reader branch that resolves wins.
        for (branch, candidate) in r_variants.iter().enumerate() {
            if let Ok(inner) = self.resolve(writer, candidate) {
                return Ok(Action::ReaderUnion { branch, inner });
            }
        }

        Err(AvroplanErr::SchemaMismatch {
            writer: writer.type_name(),
            reader: "union".to_string(),
        })
    }

    fn deref_named<'v>(
        &self,
        variant: &'v Variant,
        cxt: &'v Registry,
    ) -> AvroplanResult<&'v Variant> {
        let mut current = variant;
        while let Variant::Named(name) = current {
            current = cxt.get(name).ok_or(AvroplanErr::NamedSchemaNotFound)?;
        }
        Ok(current)
    }
}

fn mismatch(writer: &Variant, reader: &Variant) -> AvroplanErr {
    AvroplanErr::SchemaMismatch {
        writer: writer.type_name(),
        reader: reader.type_name(),
    }
}

fn named_pair(writer: &Variant, reader: &Variant) -> Option<(String, String)> {
    let named = |v: &Variant| match v {
        Variant::Record { name, .. } | Variant::Enum { name, .. } | Variant::Fixed { name, .. } => {
            Some(name.fullname())
        }
        _ => None,
    };
    Some((named(writer)?, named(reader)?))
}

fn names_match(writer: &Name, reader: &Name, reader_aliases: &Option<Vec<String>>) -> bool {
    let writer_fullname = writer.fullname();
    if writer_fullname == reader.fullname() {
        return true;
    }
    match reader_aliases {
        Some(aliases) => aliases
            .iter()
            .any(|a| *a == writer_fullname || *a == writer.name),
        None => false,
    }
}

// Full-name match over all reader fields first, then an alias pass; writer
// declaration order breaks ties at the call site.
fn match_reader_field<'a>(
    r_fields: &'a IndexMap<String, Field>,
    w_field: &Field,
) -> Option<(usize, &'a Field)> {
    let mut candidates: Vec<&str> = vec![w_field.name.as_str()];
    if let Some(aliases) = &w_field.aliases {
        candidates.extend(aliases.iter().map(|s| s.as_str()));
    }

    for candidate in &candidates {
        if let Some((idx, _, field)) = r_fields.get_full(*candidate) {
            return Some((idx, field));
        }
    }

    r_fields
        .iter()
        .enumerate()
        .find(|(_, (_, field))| field.answers_to(&candidates))
        .map(|(idx, (_, field))| (idx, field))
}

fn scalar_copy(writer: &Variant, reader: &Variant) -> Option<Scalar> {
    match (writer, reader) {
        (Variant::Null, Variant::Null) => Some(Scalar::Null),
        (Variant::Boolean, Variant::Boolean) => Some(Scalar::Boolean),
        (Variant::Int, Variant::Int) => Some(Scalar::Int),
        (Variant::Long, Variant::Long) => Some(Scalar::Long),
        (Variant::Float, Variant::Float) => Some(Scalar::Float),
        (Variant::Double, Variant::Double) => Some(Scalar::Double),
        (Variant::Bytes, Variant::Bytes) => Some(Scalar::Bytes),
        (Variant::Str, Variant::Str) => Some(Scalar::Str),
        _ => None,
    }
}

fn promotion_for(writer: &Variant, reader: &Variant) -> Option<Promotion> {
    match (writer, reader) {
        (Variant::Int, Variant::Long) => Some(Promotion::IntToLong),
        (Variant::Int, Variant::Float) => Some(Promotion::IntToFloat),
        (Variant::Int, Variant::Double) => Some(Promotion::IntToDouble),
        (Variant::Long, Variant::Float) => Some(Promotion::LongToFloat),
        (Variant::Long, Variant::Double) => Some(Promotion::LongToDouble),
        (Variant::Float, Variant::Double) => Some(Promotion::FloatToDouble),
        (Variant::Str, Variant::Bytes) => Some(Promotion::StrToBytes),
        (Variant::Bytes, Variant::Str) => Some(Promotion::BytesToStr),
        _ => None,
    }
}

/// A shareable store of resolution plans keyed by the identity of the
/// (writer, reader) schema pair.
///
/// Because `SchemaMismatch`, `MissingField` and `InvalidDefault` surface
/// while a plan is built, every error this cache can produce is effectively a
/// configuration-time error, detectable before any data flows. Pass the cache
/// explicitly to whatever owns the codec sessions; it is not a global.
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: Mutex<HashMap<(i64, i64), Arc<ResolutionPlan>>>,
}

impl PlanCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the plan for the schema pair, computing and storing it on the
    /// first request.
    pub fn plan(&self, writer: &Schema, reader: &Schema) -> AvroplanResult<Arc<ResolutionPlan>> {
        let key = (writer.fingerprint(), reader.fingerprint());
        let mut plans = match self.plans.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(plan) = plans.get(&key) {
            return Ok(Arc::clone(plan));
        }
        let plan = Arc::new(ResolutionPlan::resolve(writer, reader)?);
        plans.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    /// Number of distinct schema pairs resolved so far.
    pub fn len(&self) -> usize {
        match self.plans.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// True when no plan has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, PlanCache, RecordStep, ResolutionPlan};
    use crate::AvroplanErr;
    use crate::Schema;
    use std::str::FromStr;
    use std::sync::Arc;

    fn schema(s: &str) -> Schema {
        Schema::from_str(s).unwrap()
    }

    #[test]
    fn identity_primitive_is_a_copy() {
        let s = schema(r##""int""##);
        let plan = ResolutionPlan::resolve(&s, &s).unwrap();
        assert!(matches!(plan.action(plan.root()), Action::Copy(_)));
    }

    #[test]
    fn promotion_matrix() {
        for reader in &["long", "float", "double"] {
            let w = schema(r##""int""##);
            let r = schema(&format!("\"{}\"", reader));
            let plan = ResolutionPlan::resolve(&w, &r).unwrap();
            assert!(matches!(plan.action(plan.root()), Action::Promote(_)));
        }

        // the reverse direction is a resolution error
        let w = schema(r##""long""##);
        let r = schema(r##""int""##);
        assert!(matches!(
            ResolutionPlan::resolve(&w, &r),
            Err(AvroplanErr::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn extra_writer_field_becomes_a_skip_step() {
        let w = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": "string"}
            ]}"##,
        );
        let r = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "int"}
            ]}"##,
        );
        let plan = ResolutionPlan::resolve(&w, &r).unwrap();
        if let Action::Record {
            steps, reader_order, ..
        } = plan.action(plan.root())
        {
            assert!(matches!(steps[0], RecordStep::Read { .. }));
            assert!(matches!(steps[1], RecordStep::Skip { .. }));
            assert_eq!(reader_order, &[0]);
        } else {
            panic!("expected a record action");
        }
    }

    #[test]
    fn missing_reader_field_without_default_fails() {
        let w = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "int"}
            ]}"##,
        );
        let r = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": "string"}
            ]}"##,
        );
        assert!(matches!(
            ResolutionPlan::resolve(&w, &r),
            Err(AvroplanErr::MissingField(f)) if f == "b"
        ));
    }

    #[test]
    fn defaulted_reader_field_trails_reader_order() {
        let w = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "b", "type": "string"},
                {"name": "a", "type": "int"}
            ]}"##,
        );
        let r = schema(
            r##"{"type": "record", "name": "R", "fields": [
                {"name": "a", "type": "int"},
                {"name": "b", "type": "string"},
                {"name": "c", "type": "long", "default": 9}
            ]}"##,
        );
        let plan = ResolutionPlan::resolve(&w, &r).unwrap();
        if let Action::Record {
            reader_order,
            defaults,
            ..
        } = plan.action(plan.root())
        {
            // b and a in writer order, then the defaulted c
            assert_eq!(reader_order, &[1, 0, 2]);
            assert_eq!(defaults.len(), 1);
        } else {
            panic!("expected a record action");
        }
    }

    #[test]
    fn failing_writer_union_branch_is_a_sentinel() {
        let w = schema(r##"["string", "int"]"##);
        let r = schema(r##""int""##);
        let plan = ResolutionPlan::resolve(&w, &r).unwrap();
        if let Action::WriterUnion { branches, .. } = plan.action(plan.root()) {
            assert!(matches!(plan.action(branches[0]), Action::Fail { .. }));
            assert!(matches!(plan.action(branches[1]), Action::Copy(_)));
        } else {
            panic!("expected a writer union action");
        }
    }

    #[test]
    fn no_writer_union_branch_resolves() {
        let w = schema(r##"["string", "int"]"##);
        let r = schema(r##""boolean""##);
        assert!(ResolutionPlan::resolve(&w, &r).is_err());
    }

    #[test]
    fn reader_union_picks_first_resolving_branch() {
        let w = schema(r##""int""##);
        let r = schema(r##"["null", "string", "int"]"##);
        let plan = ResolutionPlan::resolve(&w, &r).unwrap();
        if let Action::ReaderUnion { branch, .. } = plan.action(plan.root()) {
            assert_eq!(*branch, 2);
        } else {
            panic!("expected a reader union action");
        }
    }

    #[test]
    fn recursive_schema_resolution_terminates() {
        let s = schema(
            r##"{
                "type": "record",
                "name": "LongList",
                "fields" : [
                    {"name": "value", "type": "long"},
                    {"name": "next", "type": ["null", "LongList"]}
                ]
            }"##,
        );
        let plan = ResolutionPlan::resolve(&s, &s).unwrap();
        assert!(matches!(plan.action(plan.root()), Action::Record { .. }));
    }

    #[test]
    fn plan_cache_reuses_plans() {
        let w = schema(r##""int""##);
        let r = schema(r##""long""##);
        let cache = PlanCache::new();
        assert!(cache.is_empty());
        let first = cache.plan(&w, &r).unwrap();
        let second = cache.plan(&w, &r).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
