use super::common::{Field, Name, Order};
use super::Variant;
use crate::error::io_err;
use crate::error::AvroplanErr;
use crate::error::AvroplanResult;
use crate::schema::common::validate_name;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;

// A { fullname -> schema } lookup table for named references in complex
// schemas. Entries may be revisited during parsing as the parser discovers
// more of the schema.
#[derive(Debug, Clone)]
pub(crate) struct Registry {
    cxt: HashMap<String, Variant>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            cxt: HashMap::new(),
        }
    }

    pub(crate) fn get<'a>(&'a self, name: &str) -> Option<&'a Variant> {
        self.cxt.get(name)
    }

    pub(crate) fn parse_schema(
        &mut self,
        value: &JsonValue,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        match value {
            JsonValue::Object(schema) => self.parse_object(schema, enclosing_namespace),
            // a bare string is a primitive or a named schema reference
            JsonValue::String(schema) => self.parse_primitive(schema, enclosing_namespace),
            JsonValue::Array(branches) => self.parse_union(branches, enclosing_namespace),
            _ => Err(AvroplanErr::UnknownSchema),
        }
    }

    fn parse_object(
        &mut self,
        value: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        let ty = match value.get("type") {
            Some(JsonValue::String(s)) => s,
            _ => return Err(AvroplanErr::SchemaParseFailed),
        };
        match ty.as_str() {
            "record" => self.parse_record(value, enclosing_namespace),
            "enum" => self.parse_enum(value, enclosing_namespace),
            "fixed" => self.parse_fixed(value, enclosing_namespace),
            "array" => {
                let items = value.get("items").ok_or_else(|| {
                    AvroplanErr::SchemaParseErr(io_err("Array schema must have `items` defined"))
                })?;
                Ok(Variant::Array {
                    items: Box::new(self.parse_schema(items, enclosing_namespace)?),
                })
            }
            "map" => {
                let values = value.get("values").ok_or_else(|| {
                    AvroplanErr::SchemaParseErr(io_err("Map schema must have `values` defined"))
                })?;
                Ok(Variant::Map {
                    values: Box::new(self.parse_schema(values, enclosing_namespace)?),
                })
            }
            // a primitive in object form, or a named reference
            other => self.parse_primitive(other, enclosing_namespace),
        }
    }

    fn parse_union(
        &mut self,
        branches: &[JsonValue],
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        let mut variants = Vec::with_capacity(branches.len());
        for branch in branches {
            let parsed = self.parse_schema(branch, enclosing_namespace)?;
            // immediate nesting and duplicate branches are both illegal
            if matches!(parsed, Variant::Union { .. }) || variants.contains(&parsed) {
                return Err(AvroplanErr::DuplicateSchemaInUnion);
            }
            variants.push(parsed);
        }
        let null_index = locate_null_branch(&variants);
        Ok(Variant::Union {
            variants,
            null_index,
        })
    }

    fn parse_primitive(
        &mut self,
        schema: &str,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        match schema {
            "null" => Ok(Variant::Null),
            "boolean" => Ok(Variant::Boolean),
            "int" => Ok(Variant::Int),
            "long" => Ok(Variant::Long),
            "double" => Ok(Variant::Double),
            "float" => Ok(Variant::Float),
            "bytes" => Ok(Variant::Bytes),
            "string" => Ok(Variant::Str),
            reference if !reference.is_empty() => {
                // probe the namespace-qualified name first, then the bare one
                let qualified = match enclosing_namespace {
                    Some(ns) => format!("{}.{}", ns, reference),
                    None => reference.to_string(),
                };
                if self.cxt.contains_key(&qualified) {
                    Ok(Variant::Named(qualified))
                } else if self.cxt.contains_key(reference) {
                    Ok(Variant::Named(reference.to_string()))
                } else {
                    Err(AvroplanErr::SchemaParseErr(io_err(&format!(
                        "named schema `{}` must be defined before use",
                        reference
                    ))))
                }
            }
            _ => Err(AvroplanErr::InvalidPrimitiveSchema),
        }
    }

    fn parse_record(
        &mut self,
        value: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        let rec_name = Name::from_json(value, enclosing_namespace)?;
        let fullname = rec_name.fullname();

        // a placeholder reference lets fields refer back to this record
        self.cxt
            .insert(fullname.clone(), Variant::Named(fullname.clone()));

        let field_objs = match value.get("fields") {
            Some(JsonValue::Array(fields)) => fields,
            _ => return Err(AvroplanErr::ExpectedFieldsJsonArray),
        };
        // fields see the record's own namespace as the most tightly enclosing
        let field_namespace = rec_name.namespace().or(enclosing_namespace);
        let fields = self.parse_record_fields(field_objs, field_namespace)?;

        let rec = Variant::Record {
            name: rec_name,
            aliases: parse_aliases(value.get("aliases")),
            fields,
        };

        // anything but our own placeholder under this name is a redefinition
        match self.cxt.get(&fullname) {
            Some(Variant::Named(_)) => {
                self.cxt.insert(fullname, rec.clone());
                Ok(rec)
            }
            _ => Err(AvroplanErr::DuplicateSchema),
        }
    }

    fn parse_record_fields(
        &mut self,
        fields: &[JsonValue],
        enclosing_namespace: Option<&str>,
    ) -> Result<IndexMap<String, Field>, AvroplanErr> {
        let mut parsed = IndexMap::with_capacity(fields.len());
        for field_obj in fields {
            let obj = match field_obj {
                JsonValue::Object(o) => o,
                _ => return Err(AvroplanErr::InvalidRecordFieldType),
            };
            let name = obj
                .get("name")
                .and_then(|a| a.as_str())
                .ok_or(AvroplanErr::RecordNameNotFound)?;
            let ty = obj.get("type").ok_or(AvroplanErr::RecordTypeNotFound)?;
            let mut ty = self.parse_schema(ty, enclosing_namespace)?;

            // a named field type without its own namespace inherits ours
            if let Some(ty_name) = ty.get_named_mut() {
                if ty_name.namespace().is_none() {
                    if let Some(namespace) = enclosing_namespace {
                        ty_name.set_namespace(namespace)?;
                    }
                }
            }

            // Default literals stay as raw JSON here; they are coerced by the
            // materializer only when a resolution plan needs them.
            let default = obj.get("default").cloned();
            let order = match obj.get("order") {
                Some(order) => parse_field_order(order)?,
                None => Order::Ascending,
            };
            let aliases = parse_aliases(obj.get("aliases"));

            parsed.insert(
                name.to_string(),
                Field::new(name, ty, default, order, aliases)?,
            );
        }
        Ok(parsed)
    }

    fn parse_enum(
        &mut self,
        value: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        let name = Name::from_json(value, enclosing_namespace)?;

        let mut symbols = vec![];
        match value.get("symbols") {
            Some(JsonValue::Array(declared)) => {
                for symbol in declared {
                    let symbol = symbol.as_str().ok_or(AvroplanErr::EnumSymbolParseErr)?;
                    validate_name(0, symbol)?;
                    symbols.push(symbol.to_string());
                }
            }
            Some(other) => return Err(AvroplanErr::EnumParseErr(format!("{:?}", other))),
            None => return Err(AvroplanErr::EnumSymbolsMissing),
        }

        // The optional default symbol is what unknown writer symbols fall
        // back to during resolution.
        let default = match value.get("default") {
            Some(JsonValue::String(s)) => {
                if !symbols.contains(s) {
                    return Err(AvroplanErr::EnumSymbolNotPresent);
                }
                Some(s.clone())
            }
            Some(other) => return Err(AvroplanErr::EnumParseErr(format!("{:?}", other))),
            None => None,
        };

        let fullname = name.fullname();
        let enum_schema = Variant::Enum {
            name,
            aliases: parse_aliases(value.get("aliases")),
            symbols,
            default,
        };
        self.cxt.insert(fullname, enum_schema.clone());
        Ok(enum_schema)
    }

    fn parse_fixed(
        &mut self,
        value: &Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Variant, AvroplanErr> {
        let name = Name::from_json(value, enclosing_namespace)?;
        let size = value
            .get("size")
            .ok_or(AvroplanErr::FixedSizeNotFound)?
            .as_u64()
            .ok_or(AvroplanErr::FixedSizeNotNumber)? as usize;

        let fullname = name.fullname();
        let fixed_schema = Variant::Fixed {
            name,
            aliases: parse_aliases(value.get("aliases")),
            size,
        };
        self.cxt.insert(fullname, fixed_schema.clone());
        Ok(fixed_schema)
    }
}

// Locates the null branch of a union. Idiomatic schemas put null first or
// last, so those slots are probed before a full scan, but nothing is assumed.
pub(crate) fn locate_null_branch(variants: &[Variant]) -> Option<usize> {
    if let Some(Variant::Null) = variants.first() {
        return Some(0);
    }
    if let Some(Variant::Null) = variants.last() {
        return Some(variants.len() - 1);
    }
    variants.iter().position(|v| matches!(v, Variant::Null))
}

fn parse_field_order(order: &JsonValue) -> AvroplanResult<Order> {
    match order {
        JsonValue::String(s) => Order::from_str(s),
        _ => Err(AvroplanErr::InvalidFieldOrdering),
    }
}

fn parse_aliases(aliases: Option<&JsonValue>) -> Option<Vec<String>> {
    match aliases? {
        JsonValue::Array(items) => items
            .iter()
            .map(|a| a.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}
