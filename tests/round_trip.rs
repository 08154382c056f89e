/// Encode/decode round trips through resolution plans.
mod common;

use avroplan::{Record, ResolutionPlan, ResolvingReader, Schema, Value};
use std::collections::HashMap;
use std::str::FromStr;

use common::{decode_as, encode_with, MockSchema};

#[test]
fn primitives_round_trip_under_identity_resolution() {
    let cases: Vec<(&str, Value)> = vec![
        ("null", Value::Null),
        ("boolean", Value::Boolean(true)),
        ("int", Value::Int(-34)),
        ("long", Value::Long(3_000_000_000)),
        ("float", Value::Float(4.5)),
        ("double", Value::Double(-0.25)),
        ("bytes", Value::Bytes(vec![0xde, 0xad])),
        ("string", Value::Str("hello".to_string())),
    ];
    for (ty, value) in cases {
        let schema = MockSchema.prim(ty);
        let buf = encode_with(&schema, &value);
        assert_eq!(decode_as(&schema, &schema, &buf), value, "{}", ty);
    }
}

fn linked_longs(values: &[i64]) -> Value {
    let mut next = Value::Null;
    for v in values.iter().rev() {
        let mut rec = Record::new("LongList");
        rec.insert("value", *v).unwrap();
        rec.fields.insert("next".to_string(), next);
        next = Value::Record(rec);
    }
    next
}

#[test]
fn recursive_record_round_trips() {
    let schema = MockSchema.record();
    let list = linked_longs(&[1, 2, 3]);
    let buf = encode_with(&schema, &list);
    assert_eq!(decode_as(&schema, &schema, &buf), list);
}

#[test]
fn complex_record_round_trips() {
    let schema = Schema::from_str(
        r##"
    {
        "type": "record",
        "name": "Sensor",
        "namespace": "telemetry",
        "fields": [
            {"name": "id", "type": {"type": "fixed", "name": "Id", "size": 4}},
            {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["TEMP", "HUMIDITY"]}},
            {"name": "samples", "type": {"type": "array", "items": "double"}},
            {"name": "tags", "type": {"type": "map", "values": "string"}},
            {"name": "note", "type": ["null", "string"]}
        ]
    }
    "##,
    )
    .unwrap();

    let mut tags = HashMap::new();
    tags.insert("site".to_string(), Value::Str("roof".to_string()));
    let mut rec = Record::new("telemetry.Sensor");
    rec.insert("id", Value::Fixed(vec![1, 2, 3, 4])).unwrap();
    rec.insert("kind", Value::Enum("TEMP".to_string())).unwrap();
    rec.insert("samples", vec![1.5f64, -2.5]).unwrap();
    rec.insert("tags", Value::Map(tags)).unwrap();
    rec.insert("note", "calibrated").unwrap();
    let value = Value::Record(rec);

    let buf = encode_with(&schema, &value);
    assert_eq!(decode_as(&schema, &schema, &buf), value);
}

#[test]
fn extra_writer_field_is_invisible_to_the_reader() {
    // the dropped field is an array of records, the worst case for skipping
    let fat = Schema::from_str(
        r##"
    {
        "type": "record",
        "name": "Reading",
        "fields": [
            {"name": "history", "type": {"type": "array", "items": {
                "type": "record", "name": "Entry", "fields": [
                    {"name": "at", "type": "long"},
                    {"name": "what", "type": "string"}
                ]
            }}},
            {"name": "current", "type": "long"}
        ]
    }
    "##,
    )
    .unwrap();
    let slim = Schema::from_str(
        r##"{"type": "record", "name": "Reading", "fields": [
            {"name": "current", "type": "long"}
        ]}"##,
    )
    .unwrap();

    let mut entry = Record::new("Entry");
    entry.insert("at", 99i64).unwrap();
    entry.insert("what", "spike").unwrap();
    let mut rec = Record::new("Reading");
    rec.insert("history", vec![Value::Record(entry)]).unwrap();
    rec.insert("current", 41i64).unwrap();
    let buf = encode_with(&fat, &Value::Record(rec));

    let mut slim_rec = Record::new("Reading");
    slim_rec.insert("current", 41i64).unwrap();
    let direct = encode_with(&slim, &Value::Record(slim_rec.clone()));

    assert_eq!(decode_as(&fat, &slim, &buf), Value::Record(slim_rec));
    assert_eq!(decode_as(&slim, &slim, &direct), decode_as(&fat, &slim, &buf));
}

#[test]
fn union_values_round_trip() {
    let schema = Schema::from_str(r##"["null", "string", "int"]"##).unwrap();

    for value in &[
        Value::Null,
        Value::Str("x".to_string()),
        Value::Int(3),
    ] {
        let buf = encode_with(&schema, value);
        assert_eq!(&decode_as(&schema, &schema, &buf), value);
    }
}

#[test]
fn reordered_enum_symbols_resolve_by_name() {
    let writer = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS", "CLUBS"]}"##,
    )
    .unwrap();
    let reader = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["CLUBS", "HEARTS", "SPADES"]}"##,
    )
    .unwrap();
    let buf = encode_with(&writer, &Value::Enum("CLUBS".to_string()));
    assert_eq!(
        decode_as(&writer, &reader, &buf),
        Value::Enum("CLUBS".to_string())
    );
}

#[test]
fn traversal_protocol_walks_containers() {
    let writer = Schema::from_str(
        r##"{"type": "record", "name": "Bag", "fields": [
            {"name": "nums", "type": {"type": "array", "items": "int"}},
            {"name": "labels", "type": {"type": "map", "values": "string"}}
        ]}"##,
    )
    .unwrap();

    let mut labels = HashMap::new();
    labels.insert("a".to_string(), Value::Str("one".to_string()));
    let mut rec = Record::new("Bag");
    rec.insert("nums", vec![10i32, 20]).unwrap();
    rec.insert("labels", Value::Map(labels)).unwrap();
    let buf = encode_with(&writer, &Value::Record(rec));

    let plan = ResolutionPlan::resolve(&writer, &writer).unwrap();
    let mut source = buf.as_slice();
    let mut reader = ResolvingReader::new(&plan, &mut source);

    reader.begin_record().unwrap();
    assert_eq!(reader.next_field().unwrap(), Some(0));
    reader.begin_array().unwrap();
    let mut nums = vec![];
    while reader.array_next().unwrap() {
        nums.push(reader.read_int().unwrap());
    }
    assert_eq!(nums, vec![10, 20]);

    assert_eq!(reader.next_field().unwrap(), Some(1));
    reader.begin_map().unwrap();
    while let Some(key) = reader.map_next().unwrap() {
        assert_eq!(key, "a");
        assert_eq!(reader.read_string().unwrap(), "one");
    }
    assert_eq!(reader.next_field().unwrap(), None);
}

#[test]
fn traversal_protocol_resolves_unions() {
    let writer = Schema::from_str(r##"["null", "long"]"##).unwrap();
    let plan = ResolutionPlan::resolve(&writer, &writer).unwrap();
    let buf = encode_with(&writer, &Value::Long(11));

    let mut source = buf.as_slice();
    let mut reader = ResolvingReader::new(&plan, &mut source);
    assert_eq!(reader.read_union_branch().unwrap(), 1);
    assert_eq!(reader.read_long().unwrap(), 11);
}

#[test]
fn promoted_round_trip_preserves_the_value() {
    // encode through the resolved plan itself: the long narrows back to the
    // writer's int on the way out and widens again on the way in
    let writer = MockSchema.prim("int");
    let reader = MockSchema.prim("long");
    let plan = ResolutionPlan::resolve(&writer, &reader).unwrap();

    let mut buf = vec![];
    plan.encode(&Value::Long(77), &mut buf).unwrap();
    assert_eq!(plan.decode(&mut buf.as_slice()).unwrap(), Value::Long(77));
}
