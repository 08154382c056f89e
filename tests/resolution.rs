/// Tests for schema resolution between independently evolved schemas.
mod common;

use avroplan::{AvroplanErr, PlanCache, Record, ResolutionPlan, Schema, Value};
use std::str::FromStr;
use std::sync::Arc;

use common::{decode_as, encode_with, plan_for, MockSchema};

#[test]
fn null_fails_with_other_primitive_schema() {
    let writer = MockSchema.prim("null");
    let reader = MockSchema.prim("boolean");
    assert!(matches!(
        ResolutionPlan::resolve(&writer, &reader),
        Err(AvroplanErr::SchemaMismatch { .. })
    ));
}

#[test]
fn writer_to_reader_promotion_primitives() {
    // int -> long, float, double
    let writer = MockSchema.prim("int");
    let buf = encode_with(&writer, &Value::Int(42));
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("long"), &buf),
        Value::Long(42)
    );
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("float"), &buf),
        Value::Float(42.0)
    );
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("double"), &buf),
        Value::Double(42.0)
    );

    // long -> float, double
    let writer = MockSchema.prim("long");
    let buf = encode_with(&writer, &Value::Long(1024));
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("float"), &buf),
        Value::Float(1024.0)
    );
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("double"), &buf),
        Value::Double(1024.0)
    );

    // float -> double
    let writer = MockSchema.prim("float");
    let buf = encode_with(&writer, &Value::Float(1026.5));
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("double"), &buf),
        Value::Double(1026.5)
    );
}

#[test]
fn narrowing_resolution_fails() {
    for (writer, reader) in &[
        ("long", "int"),
        ("double", "float"),
        ("double", "long"),
        ("float", "int"),
    ] {
        let writer = MockSchema.prim(writer);
        let reader = MockSchema.prim(reader);
        assert!(
            ResolutionPlan::resolve(&writer, &reader).is_err(),
            "{:?} must not resolve",
            (writer, reader)
        );
    }
}

#[test]
fn string_and_bytes_promote_both_ways() {
    let writer = MockSchema.prim("string");
    let buf = encode_with(&writer, &Value::Str("avro".to_string()));
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("bytes"), &buf),
        Value::Bytes(b"avro".to_vec())
    );

    let writer = MockSchema.prim("bytes");
    let buf = encode_with(&writer, &Value::Bytes(b"avro".to_vec()));
    assert_eq!(
        decode_as(&writer, &MockSchema.prim("string"), &buf),
        Value::Str("avro".to_string())
    );
}

#[test]
fn field_alias_matches_renamed_writer_field() {
    let writer = Schema::from_str(
        r##"{"type": "record", "name": "Person", "fields": [
            {"name": "old_name", "type": "string"}
        ]}"##,
    )
    .unwrap();
    let reader = Schema::from_str(
        r##"{"type": "record", "name": "Person", "fields": [
            {"name": "new_name", "type": "string", "aliases": ["old_name"]}
        ]}"##,
    )
    .unwrap();

    let mut rec = Record::new("Person");
    rec.insert("old_name", "jane").unwrap();
    let buf = encode_with(&writer, &Value::Record(rec));

    if let Value::Record(rec) = decode_as(&writer, &reader, &buf) {
        assert_eq!(rec.fields["new_name"], Value::Str("jane".to_string()));
    } else {
        panic!("expected a record");
    }
}

#[test]
fn record_alias_matches_renamed_writer_record() {
    let writer = Schema::from_str(
        r##"{"type": "record", "name": "LinkedLongs", "fields": [
            {"name": "value", "type": "long"}
        ]}"##,
    )
    .unwrap();
    // reader renamed the record but carries the old name as an alias
    let reader = Schema::from_str(
        r##"{"type": "record", "name": "LongList", "aliases": ["LinkedLongs"], "fields": [
            {"name": "value", "type": "long"}
        ]}"##,
    )
    .unwrap();
    assert!(ResolutionPlan::resolve(&writer, &reader).is_ok());

    // without the alias the names do not line up
    let stranger = Schema::from_str(
        r##"{"type": "record", "name": "Unrelated", "fields": [
            {"name": "value", "type": "long"}
        ]}"##,
    )
    .unwrap();
    assert!(ResolutionPlan::resolve(&writer, &stranger).is_err());
}

#[test]
fn dropped_writer_field_comes_back_as_schema_default() {
    let writer = MockSchema.record();
    let reader = MockSchema.record_default();

    let mut rec = Record::new("LongList");
    rec.insert("value", 5i64).unwrap();
    rec.insert("next", ()).unwrap();
    let buf = encode_with(&writer, &Value::Record(rec));

    if let Value::Record(rec) = decode_as(&writer, &reader, &buf) {
        assert_eq!(rec.fields["value"], Value::Long(5));
        assert_eq!(rec.fields["other"], Value::Long(1));
    } else {
        panic!("expected a record");
    }
}

#[test]
fn missing_reader_field_without_default_fails_at_plan_time() {
    let writer = MockSchema.record();
    let reader = Schema::from_str(
        r#"
    {
        "type": "record",
        "name": "LongList",
        "fields" : [
          {"name": "value", "type": "long"},
          {"name": "next", "type": ["null", "LongList"]},
          {"name": "other", "type": "long"}
        ]
    }
    "#,
    )
    .unwrap();
    assert!(matches!(
        ResolutionPlan::resolve(&writer, &reader),
        Err(AvroplanErr::MissingField(f)) if f == "other"
    ));
}

#[test]
fn bad_default_literal_fails_at_plan_time() {
    let writer = Schema::from_str(
        r##"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"}
        ]}"##,
    )
    .unwrap();
    let reader = Schema::from_str(
        r##"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"},
            {"name": "b", "type": "int", "default": "not a number"}
        ]}"##,
    )
    .unwrap();
    assert!(matches!(
        ResolutionPlan::resolve(&writer, &reader),
        Err(AvroplanErr::InvalidDefault(_))
    ));
}

#[test]
fn unknown_writer_enum_symbol_uses_reader_default() {
    let writer = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "JOKER"]}"##,
    )
    .unwrap();
    let reader = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"], "default": "HEARTS"}"##,
    )
    .unwrap();

    let buf = encode_with(&writer, &Value::Enum("JOKER".to_string()));
    assert_eq!(
        decode_as(&writer, &reader, &buf),
        Value::Enum("HEARTS".to_string())
    );

    // known symbols pass through untouched
    let buf = encode_with(&writer, &Value::Enum("SPADES".to_string()));
    assert_eq!(
        decode_as(&writer, &reader, &buf),
        Value::Enum("SPADES".to_string())
    );
}

#[test]
fn unknown_writer_enum_symbol_without_default_fails_at_decode() {
    let writer = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "JOKER"]}"##,
    )
    .unwrap();
    let reader = Schema::from_str(
        r##"{"type": "enum", "name": "Suit", "symbols": ["SPADES", "HEARTS"]}"##,
    )
    .unwrap();

    // the plan builds, only the JOKER symbol is poisoned
    let plan = plan_for(&writer, &reader);
    let buf = encode_with(&writer, &Value::Enum("JOKER".to_string()));
    assert!(matches!(
        plan.decode(&mut buf.as_slice()),
        Err(AvroplanErr::EnumSymbolNotFound(s)) if s == "JOKER"
    ));
}

#[test]
fn fixed_sizes_must_agree() {
    let writer =
        Schema::from_str(r##"{"type": "fixed", "name": "MD5", "size": 16}"##).unwrap();
    let reader =
        Schema::from_str(r##"{"type": "fixed", "name": "MD5", "size": 8}"##).unwrap();
    assert!(ResolutionPlan::resolve(&writer, &reader).is_err());
}

#[test]
fn writer_union_against_plain_reader() {
    let writer = Schema::from_str(r##"["null", "string"]"##).unwrap();
    let reader = MockSchema.prim("string");

    let buf = encode_with(&writer, &Value::Str("x".to_string()));
    assert_eq!(
        decode_as(&writer, &reader, &buf),
        Value::Str("x".to_string())
    );

    // the null branch has no reader interpretation and fails on the wire
    let plan = plan_for(&writer, &reader);
    let buf = encode_with(&writer, &Value::Null);
    assert!(matches!(
        plan.decode(&mut buf.as_slice()),
        Err(AvroplanErr::UnionBranch { index: 0 })
    ));
}

#[test]
fn plain_writer_against_reader_union() {
    let writer = MockSchema.prim("int");
    let reader = Schema::from_str(r##"["null", "string", "int"]"##).unwrap();
    let buf = encode_with(&writer, &Value::Int(7));
    assert_eq!(decode_as(&writer, &reader, &buf), Value::Int(7));
}

#[test]
fn recursive_schemas_resolve_against_each_other() {
    let writer = MockSchema.record();
    let reader = MockSchema.record_default();
    assert!(ResolutionPlan::resolve(&writer, &reader).is_ok());
    assert!(ResolutionPlan::resolve(&reader, &writer).is_ok());
}

#[test]
fn plan_cache_is_shared_across_threads() {
    let cache = Arc::new(PlanCache::new());
    let writer = Arc::new(MockSchema.record());
    let reader = Arc::new(MockSchema.record_default());

    let mut handles = vec![];
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let writer = Arc::clone(&writer);
        let reader = Arc::clone(&reader);
        handles.push(std::thread::spawn(move || {
            let plan = cache.plan(&writer, &reader).unwrap();
            let mut rec = Record::new("LongList");
            rec.insert("value", 3i64).unwrap();
            rec.insert("next", ()).unwrap();
            let buf = encode_with(&writer, &Value::Record(rec));
            plan.decode(&mut buf.as_slice()).unwrap()
        }));
    }
    for handle in handles {
        let value = handle.join().unwrap();
        if let Value::Record(rec) = value {
            assert_eq!(rec.fields["other"], Value::Long(1));
        } else {
            panic!("expected a record");
        }
    }
    assert_eq!(cache.len(), 1);
}
