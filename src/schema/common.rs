// Shared pieces of the schema model: names and namespaces for the named types
// (record, enum, fixed) and the record field definition.

use crate::error::AvroplanErr;
use crate::schema::Variant;
use serde_json::Value as JsonValue;
use std::fmt::{self, Display};
use std::str::FromStr;

// A single name segment. Leading digits are allowed only past the first
// segment of a namespace.
pub(crate) fn validate_name(idx: usize, name: &str) -> Result<(), AvroplanErr> {
    let mut chars = name.chars();
    let head = chars.next().ok_or(AvroplanErr::InvalidName)?;
    let head_ok = head == '_' || head.is_ascii_alphabetic() || (idx > 0 && head.is_ascii_digit());
    if head_ok && chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(AvroplanErr::InvalidName)
    }
}

// <name>(<dot><name>)*
pub(crate) fn validate_namespace(s: &str) -> Result<(), AvroplanErr> {
    s.split('.')
        .enumerate()
        .try_for_each(|(i, part)| validate_name(i, part))
        .map_err(|_| AvroplanErr::InvalidNamespace)
}

/// The `fullname` of a named avro type: record, enum or fixed.
#[derive(Debug, Clone, Eq, PartialOrd, Ord)]
pub struct Name {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
}

impl Name {
    // A dot inside `name` splits it into namespace and simple name; later
    // `set_namespace` calls then become noops.
    pub(crate) fn new(name: &str) -> Result<Self, AvroplanErr> {
        match name.rfind('.') {
            Some(split) => {
                validate_namespace(name)?;
                let simple = &name[split + 1..];
                validate_name(0, simple)?;
                Ok(Self {
                    name: simple.to_string(),
                    namespace: Some(name[..split].to_string()),
                })
            }
            None => {
                validate_name(0, name)?;
                Ok(Self {
                    name: name.to_string(),
                    namespace: None,
                })
            }
        }
    }

    // Reads `name` and `namespace` attributes off a schema object. A dotted
    // name field is already a fullname; any namespace attribute is then
    // ignored. Otherwise the namespace attribute wins over the enclosing one.
    pub(crate) fn from_json(
        json: &serde_json::map::Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Self, AvroplanErr> {
        let mut name = match json.get("name") {
            Some(JsonValue::String(s)) => Name::new(s)?,
            _ => return Err(AvroplanErr::NameParseFailed),
        };
        if name.namespace.is_none() {
            match json.get("namespace") {
                Some(JsonValue::String(s)) => name.set_namespace(s)?,
                _ => {
                    if let Some(ns) = enclosing_namespace {
                        name.set_namespace(ns)?;
                    }
                }
            }
        }
        Ok(name)
    }

    // `from_json` that also strips the consumed namespace attribute off the
    // json. The canonicalizer folds it into the name field instead.
    pub(crate) fn from_json_mut(
        json: &mut serde_json::map::Map<String, JsonValue>,
        enclosing_namespace: Option<&str>,
    ) -> Result<Self, AvroplanErr> {
        let name = Self::from_json(json, enclosing_namespace)?;
        json.remove("namespace");
        Ok(name)
    }

    pub(crate) fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub(crate) fn set_namespace(&mut self, namespace: &str) -> Result<(), AvroplanErr> {
        // "" is the null namespace
        if namespace.is_empty() {
            return Ok(());
        }
        validate_namespace(namespace)?;
        // a namespace embedded in a dotted name wins
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        Ok(())
    }

    pub(crate) fn fullname(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, self.name),
            _ => self.name.clone(),
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}

impl FromStr for Name {
    type Err = AvroplanErr;

    fn from_str(s: &str) -> Result<Self, AvroplanErr> {
        Name::new(s)
    }
}

// Two names are the same named type when their fullnames agree.
impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.fullname() == other.fullname()
    }
}

/// Sort order of a record field.
#[derive(Debug, PartialEq, Clone)]
pub enum Order {
    Ascending,
    Descending,
    Ignore,
}

impl FromStr for Order {
    type Err = AvroplanErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Order::Ascending),
            "descending" => Ok(Order::Descending),
            "ignore" => Ok(Order::Ignore),
            _ => Err(AvroplanErr::UnknownFieldOrdering),
        }
    }
}

// The default literal stays raw JSON; the resolver materializes it through the
// default value materializer only while building a plan.
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) ty: Variant,
    pub(crate) default: Option<JsonValue>,
    pub(crate) order: Order,
    pub(crate) aliases: Option<Vec<String>>,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty
    }
}

impl Field {
    pub(crate) fn new(
        name: &str,
        ty: Variant,
        default: Option<JsonValue>,
        order: Order,
        aliases: Option<Vec<String>>,
    ) -> Result<Self, AvroplanErr> {
        // field names follow the same rules as simple schema names
        validate_name(0, name)?;
        Ok(Field {
            name: name.to_string(),
            ty,
            default,
            order,
            aliases,
        })
    }

    // True when one of `candidates` (a writer field name or its aliases) maps
    // onto this reader field through the reader's aliases.
    pub(crate) fn answers_to(&self, candidates: &[&str]) -> bool {
        match &self.aliases {
            Some(aliases) => candidates
                .iter()
                .any(|c| aliases.iter().any(|a| a == c)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_namespace, Name};

    #[test]
    fn leading_digit_is_rejected() {
        assert!(Name::new("2fast").is_err());
        assert!(Name::new("2org.apache.avro").is_err());
    }

    #[test]
    fn bad_namespace_is_rejected() {
        let mut name = Name::new("avro").unwrap();
        assert!(name.set_namespace("org..apache").is_err());
        assert!(validate_namespace("some.namespace..foo").is_err());
    }

    #[test]
    fn namespace_set_after_the_fact() {
        let mut name = Name::new("hello").unwrap();
        name.set_namespace("org.foo").unwrap();
        assert_eq!("org.foo.hello", name.fullname());
    }

    #[test]
    fn dotted_name_splits_into_namespace() {
        let name = Name::new("org.apache.avro").unwrap();
        assert_eq!("avro", name.name);
        assert_eq!("org.apache.avro", name.fullname());
    }

    #[test]
    fn embedded_namespace_wins() {
        let mut name = Name::new("org.apache.avro").unwrap();
        name.set_namespace("somewhere.else").unwrap();
        assert_eq!("org.apache.avro", name.fullname());
    }

    #[test]
    fn empty_namespace_is_null() {
        let mut name = Name::new("avro").unwrap();
        name.set_namespace("").unwrap();
        assert_eq!("avro", name.fullname());
    }

    #[test]
    fn dotted_name_shadows_namespace_attribute() {
        let json: serde_json::Value = serde_json::from_str(
            r##"{"name": "my.longlist", "namespace": "com.some", "type": "record"}"##,
        )
        .unwrap();
        let name = Name::from_json(json.as_object().unwrap(), None).unwrap();
        assert_eq!(name.name, "longlist");
        assert_eq!(name.namespace, Some("my".to_string()));
        assert_eq!(name.fullname(), "my.longlist");
    }

    #[test]
    fn namespace_attribute_applies_to_plain_names() {
        let json: serde_json::Value = serde_json::from_str(
            r##"{"name": "longlist", "namespace": "com.some", "type": "record"}"##,
        )
        .unwrap();
        let name = Name::from_json(json.as_object().unwrap(), None).unwrap();
        assert_eq!(name.fullname(), "com.some.longlist");
    }
}
