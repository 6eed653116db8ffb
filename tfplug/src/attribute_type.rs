//! Host type system
//!
//! Types travel on the wire as JSON type constraints: primitive types are
//! strings (`"string"`), collection types are two element arrays
//! (`["list","number"]`) and objects carry their attribute types
//! (`["object",{"name":"string"}]`).

use serde_json::{json, Value as Json};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(BTreeMap<String, AttributeType>),
    /// Any type, decided by the value
    Dynamic,
}

impl AttributeType {
    pub fn list(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn map(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }

    pub fn object<I, K>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        AttributeType::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn to_json(&self) -> Json {
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::Dynamic => json!("dynamic"),
            AttributeType::List(elem) => json!(["list", elem.to_json()]),
            AttributeType::Set(elem) => json!(["set", elem.to_json()]),
            AttributeType::Map(elem) => json!(["map", elem.to_json()]),
            AttributeType::Object(attrs) => {
                let attrs: serde_json::Map<String, Json> = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                json!(["object", attrs])
            }
        }
    }

    /// Encoded type constraint as sent in schemas and function signatures.
    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => f.write_str("string"),
            AttributeType::Number => f.write_str("number"),
            AttributeType::Bool => f.write_str("bool"),
            AttributeType::Dynamic => f.write_str("dynamic"),
            AttributeType::List(elem) => write!(f, "list of {}", elem),
            AttributeType::Set(elem) => write!(f, "set of {}", elem),
            AttributeType::Map(elem) => write!(f, "map of {}", elem),
            AttributeType::Object(_) => f.write_str("object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_types_encode_as_strings() {
        assert_eq!(AttributeType::String.encode(), b"\"string\"");
        assert_eq!(AttributeType::Number.encode(), b"\"number\"");
        assert_eq!(AttributeType::Bool.encode(), b"\"bool\"");
        assert_eq!(AttributeType::Dynamic.encode(), b"\"dynamic\"");
    }

    #[test]
    fn collection_types_encode_as_arrays() {
        let ty = AttributeType::list(AttributeType::map(AttributeType::Number));
        assert_eq!(
            String::from_utf8(ty.encode()).unwrap(),
            r#"["list",["map","number"]]"#
        );
    }

    #[test]
    fn object_type_encodes_attributes() {
        let ty = AttributeType::object([
            ("name", AttributeType::String),
            ("port", AttributeType::Number),
        ]);
        assert_eq!(
            String::from_utf8(ty.encode()).unwrap(),
            r#"["object",{"name":"string","port":"number"}]"#
        );
    }

    #[test]
    fn display_reads_naturally() {
        let ty = AttributeType::list(AttributeType::String);
        assert_eq!(ty.to_string(), "list of string");
        assert_eq!(AttributeType::map(ty).to_string(), "map of list of string");
    }
}
