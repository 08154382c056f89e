use crate::error::AvroplanErr;
use crate::schema::Name;
use once_cell::sync::Lazy;
use serde_json::json;
use serde_json::Value as JsonValue;

type JsonMap = serde_json::map::Map<String, JsonValue>;

// fingerprint of the empty input, 0xc15d213aa4d7a795 as i64
const EMPTY: i64 = -4513414715797952619;

static FP_TABLE: Lazy<[i64; 256]> = Lazy::new(|| {
    let mut table = [0i64; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let mut fp = i as i64;
        for _ in 0..8 {
            fp = ((fp as u64) >> 1) as i64 ^ (EMPTY & -(fp & 1));
        }
        *slot = fp;
    }
    table
});

// attributes that survive canonicalization, in their canonical order
const RELEVANT_FIELDS: [&str; 7] = [
    "name", "type", "fields", "symbols", "items", "values", "size",
];

/// The parsing canonical form of an avro schema. Docs, aliases and defaults
/// are stripped, names are fully qualified and attributes appear in a fixed
/// order. The Rabin fingerprint of this form is the identity used to key the
/// plan cache.
#[derive(Debug, PartialEq)]
pub struct CanonicalSchema(pub(crate) JsonValue);

impl std::fmt::Display for CanonicalSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pretty = serde_json::to_string_pretty(&self.0).map_err(|_| std::fmt::Error)?;
        f.write_str(&pretty)
    }
}

impl CanonicalSchema {
    /// 64-bit Rabin fingerprint of the canonical form.
    pub fn rabin64(&self) -> i64 {
        let text = self.0.to_string();
        text.bytes().fold(EMPTY, |fp, b| {
            let idx = ((fp ^ i64::from(b)) & 0xff) as usize;
            ((fp as u64) >> 8) as i64 ^ FP_TABLE[idx]
        })
    }
}

// [FULLNAMES] - replace the name attribute with the fullname, folding any
// namespace attribute into it, and recurse into named field types.
fn qualify_names(
    json_map: &mut JsonMap,
    enclosing_namespace: Option<&str>,
) -> Result<(), AvroplanErr> {
    let name = Name::from_json_mut(json_map, enclosing_namespace)?;
    json_map["name"] = json!(name.fullname());

    if let Some(JsonValue::Array(fields)) = json_map.get_mut("fields") {
        for field in fields.iter_mut() {
            let ty = field.as_object_mut().and_then(|o| o.get_mut("type"));
            if let Some(JsonValue::Object(ty)) = ty {
                if ty.contains_key("name") {
                    qualify_names(ty, name.namespace())?;
                }
            }
        }
    }
    Ok(())
}

// [ORDER] and [STRIP] in one pass: keep only the relevant attributes, in
// their canonical order, recursing into nested schema objects.
fn keep_relevant(json: &JsonMap) -> JsonMap {
    let mut ordered = JsonMap::new();
    for key in RELEVANT_FIELDS.iter() {
        let value = match json.get(*key) {
            Some(v) => v,
            None => continue,
        };
        let kept = match value {
            JsonValue::Object(m) => json!(keep_relevant(m)),
            JsonValue::Array(items) => {
                let items: Vec<JsonValue> = items
                    .iter()
                    .map(|item| match item {
                        JsonValue::Object(m) => json!(keep_relevant(m)),
                        other => other.clone(),
                    })
                    .collect();
                json!(items)
            }
            other => other.clone(),
        };
        ordered.insert(key.to_string(), kept);
    }
    ordered
}

// [INTEGERS] and [WHITESPACE] fall out of the serde_json round trip; the
// remaining canonicalization steps are applied here.
pub(crate) fn normalize_schema(json_schema: &JsonValue) -> Result<JsonValue, AvroplanErr> {
    match json_schema {
        JsonValue::Object(scm) => {
            // [PRIMITIVES] - a primitive in object form collapses to its name
            if let Some(JsonValue::String(s)) = scm.get("type") {
                match s.as_ref() {
                    "record" | "enum" | "array" | "map" | "union" | "fixed" => {}
                    _ => return Ok(json!(s)),
                }
            }
            let mut schema = scm.clone();
            if schema.contains_key("name") {
                qualify_names(&mut schema, None)?;
            }
            Ok(json!(keep_relevant(&schema)))
        }
        primitive @ JsonValue::String(_) => Ok(primitive.clone()),
        JsonValue::Array(branches) => {
            let branches: Result<Vec<JsonValue>, AvroplanErr> =
                branches.iter().map(normalize_schema).collect();
            Ok(json!(branches?))
        }
        _ => Err(AvroplanErr::UnknownSchema),
    }
}
