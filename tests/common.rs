#![allow(dead_code)]

use avroplan::{ResolutionPlan, Schema, Value};
use std::str::FromStr;

pub(crate) struct MockSchema;
impl MockSchema {
    // creates a primitive schema
    pub fn prim(self, ty: &str) -> Schema {
        let schema_str = format!("{{\"type\": \"{}\"}}", ty);
        Schema::from_str(&schema_str).unwrap()
    }

    pub fn record(self) -> Schema {
        Schema::from_str(
            r#"
        {
            "type": "record",
            "name": "LongList",
            "aliases": ["LinkedLongs"],
            "fields" : [
              {"name": "value", "type": "long"},
              {"name": "next", "type": ["null", "LongList"]}
            ]
        }
        "#,
        )
        .unwrap()
    }

    pub fn record_default(self) -> Schema {
        Schema::from_str(
            r#"
        {
            "type": "record",
            "name": "LongList",
            "aliases": ["LinkedLongs"],
            "fields" : [
              {"name": "value", "type": "long"},
              {"name": "next", "type": ["null", "LongList"]},
              {"name": "other", "type":"long", "default": 1}
            ]
        }
        "#,
        )
        .unwrap()
    }
}

pub(crate) fn plan_for(writer: &Schema, reader: &Schema) -> ResolutionPlan {
    ResolutionPlan::resolve(writer, reader).unwrap()
}

// encodes one value under the schema itself (identity resolution)
pub(crate) fn encode_with(schema: &Schema, value: &Value) -> Vec<u8> {
    let plan = ResolutionPlan::resolve(schema, schema).unwrap();
    let mut buf = vec![];
    plan.encode(value, &mut buf).unwrap();
    buf
}

pub(crate) fn decode_as(writer: &Schema, reader: &Schema, bytes: &[u8]) -> Value {
    let plan = ResolutionPlan::resolve(writer, reader).unwrap();
    plan.decode(&mut &bytes[..]).unwrap()
}
