//! Core type system for tfplug
//!
//! [`Dynamic`] is a decoded host value, [`DynamicValue`] the raw wire
//! payload it travels in. Decoding always happens against an
//! [`AttributeType`] so that numbers encoded as strings and similar wire
//! shortcuts are resolved before a provider sees the value.

use crate::attribute_type::AttributeType;
use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Host number. Integral values keep full 64 bit precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Integer value, truncating any fractional part.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Number::Int(i) => i,
            Number::Float(f) => f.trunc() as i64,
        }
    }

    /// Parse the string form used for numbers that fit neither an i64
    /// nor an f64 exactly. Falls back to the nearest f64.
    pub fn parse(s: &str) -> Option<Number> {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Some(Number::Int(i));
        }
        s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Number::Float)
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number::Int(i)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Dynamic represents Terraform values that can be of any type
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Value not yet known (during planning)
    Unknown,
    Bool(bool),
    Number(Number),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Dynamic>),
    /// Maps and objects. The type says which.
    Map(BTreeMap<String, Dynamic>),
}

impl Dynamic {
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Dynamic]> {
        match self {
            Dynamic::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Dynamic>> {
        match self {
            Dynamic::Map(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Unknown => "unknown",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
        }
    }

    /// Coerce a freshly decoded value into the shape `ty` describes.
    pub fn conform(self, ty: &AttributeType) -> Result<Dynamic> {
        let mismatch = |value: &Dynamic| TfplugError::TypeMismatch {
            expected: ty.to_string(),
            actual: value.type_name().to_string(),
        };
        match (self, ty) {
            (value @ (Dynamic::Null | Dynamic::Unknown), _) => Ok(value),
            (value, AttributeType::Dynamic) => Ok(value),
            (value @ Dynamic::String(_), AttributeType::String)
            | (value @ Dynamic::Bool(_), AttributeType::Bool)
            | (value @ Dynamic::Number(_), AttributeType::Number) => Ok(value),
            (Dynamic::String(s), AttributeType::Number) => Number::parse(&s)
                .map(Dynamic::Number)
                .ok_or_else(|| TfplugError::DecodingError(format!("invalid number {:?}", s))),
            (Dynamic::List(items), AttributeType::List(elem) | AttributeType::Set(elem)) => items
                .into_iter()
                .map(|item| item.conform(elem))
                .collect::<Result<Vec<_>>>()
                .map(Dynamic::List),
            (Dynamic::Map(items), AttributeType::Map(elem)) => items
                .into_iter()
                .map(|(k, v)| Ok((k, v.conform(elem)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Dynamic::Map),
            (Dynamic::Map(items), AttributeType::Object(attrs)) => items
                .into_iter()
                .map(|(k, v)| match attrs.get(&k) {
                    Some(attr) => Ok((k, v.conform(attr)?)),
                    None => Ok((k, v)),
                })
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Dynamic::Map),
            (value, _) => Err(mismatch(&value)),
        }
    }

    /// Check that this value is a valid instance of `ty`.
    pub fn check(&self, ty: &AttributeType) -> Result<()> {
        let mismatch = || TfplugError::TypeMismatch {
            expected: ty.to_string(),
            actual: self.type_name().to_string(),
        };
        match (self, ty) {
            (Dynamic::Null | Dynamic::Unknown, _) | (_, AttributeType::Dynamic) => Ok(()),
            (Dynamic::String(_), AttributeType::String)
            | (Dynamic::Bool(_), AttributeType::Bool)
            | (Dynamic::Number(_), AttributeType::Number) => Ok(()),
            (Dynamic::List(items), AttributeType::List(elem) | AttributeType::Set(elem)) => {
                items.iter().try_for_each(|item| item.check(elem))
            }
            (Dynamic::Map(items), AttributeType::Map(elem)) => {
                items.values().try_for_each(|item| item.check(elem))
            }
            (Dynamic::Map(items), AttributeType::Object(attrs)) => {
                for (name, attr) in attrs {
                    match items.get(name) {
                        Some(value) => value.check(attr)?,
                        None => {
                            return Err(TfplugError::EncodingError(format!(
                                "missing attribute {:?}",
                                name
                            )))
                        }
                    }
                }
                if let Some(extra) = items.keys().find(|k| !attrs.contains_key(*k)) {
                    return Err(TfplugError::EncodingError(format!(
                        "unexpected attribute {:?}",
                        extra
                    )));
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Unknown => Err(serde::ser::Error::custom(
                "unknown values cannot be encoded",
            )),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Dynamic::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid Dynamic value")
            }

            fn visit_unit<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_none<E>(self) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Null)
            }

            fn visit_some<D>(self, deserializer: D) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Dynamic::deserialize(deserializer)
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Bool(value))
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(Number::Int(value)))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(match i64::try_from(value) {
                    Ok(i) => Number::Int(i),
                    Err(_) => Number::Float(value as f64),
                }))
            }

            fn visit_f64<E>(self, value: f64) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::Number(Number::Float(value)))
            }

            fn visit_str<E>(self, value: &str) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::String(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::String(value))
            }

            fn visit_bytes<E>(self, value: &[u8]) -> std::result::Result<Dynamic, E>
            where
                E: de::Error,
            {
                Ok(Dynamic::String(String::from_utf8_lossy(value).into_owned()))
            }

            // msgpack extension values carry unknowns
            fn visit_newtype_struct<D>(
                self,
                deserializer: D,
            ) -> std::result::Result<Dynamic, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                de::IgnoredAny::deserialize(deserializer)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_seq<V>(self, mut seq: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::SeqAccess<'de>,
            {
                let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(elem) = seq.next_element()? {
                    vec.push(elem);
                }
                Ok(Dynamic::List(vec))
            }

            fn visit_map<V>(self, mut map: V) -> std::result::Result<Dynamic, V::Error>
            where
                V: de::MapAccess<'de>,
            {
                let mut out = BTreeMap::new();
                while let Some((key, value)) = map.next_entry::<String, Dynamic>()? {
                    out.insert(key, value);
                }
                Ok(Dynamic::Map(out))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// Raw wire payload as carried by the protocol. Terraform sends msgpack;
/// JSON is accepted on input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicValue {
    pub msgpack: Vec<u8>,
    pub json: Vec<u8>,
}

impl DynamicValue {
    /// Encode `value` as an instance of `ty`.
    pub fn new(ty: &AttributeType, value: &Dynamic) -> Result<Self> {
        value.check(ty)?;
        let msgpack = rmp_serde::encode::to_vec(value)
            .map_err(|e| TfplugError::EncodingError(format!("msgpack encoding failed: {}", e)))?;
        Ok(Self {
            msgpack,
            json: Vec::new(),
        })
    }

    pub fn from_msgpack(msgpack: Vec<u8>) -> Self {
        Self {
            msgpack,
            json: Vec::new(),
        }
    }

    pub fn from_json(json: Vec<u8>) -> Self {
        Self {
            msgpack: Vec::new(),
            json,
        }
    }

    /// An explicit msgpack null.
    pub fn null() -> Self {
        Self::from_msgpack(vec![0xc0])
    }

    /// No payload at all. Distinct from an encoded null.
    pub fn is_empty(&self) -> bool {
        self.msgpack.is_empty() && self.json.is_empty()
    }

    /// Decode the payload as an instance of `ty`. An empty payload is null.
    pub fn unmarshal(&self, ty: &AttributeType) -> Result<Dynamic> {
        let value = if !self.msgpack.is_empty() {
            rmp_serde::decode::from_slice::<Dynamic>(&self.msgpack).map_err(|e| {
                TfplugError::DecodingError(format!("msgpack decoding failed: {}", e))
            })?
        } else if !self.json.is_empty() {
            serde_json::from_slice::<Dynamic>(&self.json)
                .map_err(|e| TfplugError::DecodingError(format!("json decoding failed: {}", e)))?
        } else {
            return Ok(Dynamic::Null);
        };
        value.conform(ty)
    }
}

/// AttributePath represents a path to an attribute within a value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyString(String),
    ElementKeyInt(i64),
}

/// Diagnostic represents a warning or error from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Diagnostics collected while serving one request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        let detail = detail.map(Into::into).unwrap_or_default();
        self.errors.push(Diagnostic::error(summary, detail));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: Option<impl Into<String>>) {
        let detail = detail.map(Into::into).unwrap_or_default();
        self.warnings.push(Diagnostic::warning(summary, detail));
    }

    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity {
            DiagnosticSeverity::Warning => self.warnings.push(diag),
            _ => self.errors.push(diag),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Errors first, then warnings.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        let mut diags = Diagnostics::new();
        diags.push(diag);
        diags
    }
}

/// ServerCapabilities indicates provider capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServerCapabilities {
    pub plan_destroy: bool,
    pub get_provider_schema_optional: bool,
    pub move_resource_state: bool,
}

/// Error from a function call, surfaced by Terraform against the call site
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionError {
    pub text: String,
    /// Index of the argument that caused the error
    pub function_argument: Option<i64>,
}

impl FunctionError {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_argument: None,
        }
    }

    pub fn argument(index: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_argument: Some(index as i64),
        }
    }
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function_argument {
            Some(i) => write!(f, "argument {}: {}", i, self.text),
            None => f.write_str(&self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn msgpack_object_decodes_against_type() {
        let ty = AttributeType::object([
            ("name", AttributeType::String),
            ("size", AttributeType::Number),
        ]);
        let value = obj(&[
            ("name", Dynamic::String("disk".to_string())),
            ("size", Dynamic::Number(Number::Int(20))),
        ]);
        let dv = DynamicValue::new(&ty, &value).unwrap();
        assert_eq!(dv.unmarshal(&ty).unwrap(), value);
    }

    #[test]
    fn big_numbers_encoded_as_strings_are_parsed() {
        let raw = rmp_serde::to_vec("12345678901234567890123").unwrap();
        let value = DynamicValue::from_msgpack(raw)
            .unmarshal(&AttributeType::Number)
            .unwrap();
        let Dynamic::Number(Number::Float(f)) = value else {
            panic!("expected float, got {:?}", value);
        };
        assert!((f - 1.2345678901234568e22).abs() < 1e7);
    }

    #[test]
    fn large_unsigned_integers_fall_back_to_float() {
        let raw = rmp_serde::to_vec(&u64::MAX).unwrap();
        let value = DynamicValue::from_msgpack(raw)
            .unmarshal(&AttributeType::Number)
            .unwrap();
        assert!(matches!(value, Dynamic::Number(Number::Float(_))));
    }

    #[test]
    fn msgpack_extension_decodes_as_unknown() {
        // fixext1, type 0, one data byte
        let raw = vec![0xd4, 0x00, 0x00];
        let value = DynamicValue::from_msgpack(raw)
            .unmarshal(&AttributeType::String)
            .unwrap();
        assert!(value.is_unknown());

        let list = vec![0x92, 0xa1, b'a', 0xd4, 0x00, 0x00];
        let value = DynamicValue::from_msgpack(list)
            .unmarshal(&AttributeType::list(AttributeType::String))
            .unwrap();
        assert_eq!(
            value.as_list().map(|items| items[1].is_unknown()),
            Some(true)
        );
    }

    #[test]
    fn json_payload_is_accepted() {
        let dv = DynamicValue::from_json(br#"{"go":"package lib"}"#.to_vec());
        let value = dv.unmarshal(&AttributeType::map(AttributeType::String)).unwrap();
        assert_eq!(
            value.as_map().and_then(|m| m.get("go")).and_then(Dynamic::as_str),
            Some("package lib")
        );
    }

    #[test]
    fn empty_payload_is_null_and_null_is_not_empty() {
        let empty = DynamicValue::default();
        assert!(empty.is_empty());
        assert!(empty.unmarshal(&AttributeType::String).unwrap().is_null());

        let null = DynamicValue::null();
        assert!(!null.is_empty());
        assert!(null.unmarshal(&AttributeType::Number).unwrap().is_null());
    }

    #[test]
    fn type_mismatch_is_reported() {
        let dv = DynamicValue::from_msgpack(rmp_serde::to_vec(&true).unwrap());
        let err = dv.unmarshal(&AttributeType::String).unwrap_err();
        assert_eq!(err.to_string(), "Type mismatch: expected string, got bool");
    }

    #[test]
    fn encoding_checks_object_attributes() {
        let ty = AttributeType::object([("a", AttributeType::Bool)]);
        assert!(DynamicValue::new(&ty, &obj(&[])).is_err());
        assert!(DynamicValue::new(
            &ty,
            &obj(&[("a", Dynamic::Bool(true)), ("b", Dynamic::Null)])
        )
        .is_err());
        assert!(DynamicValue::new(&ty, &obj(&[("a", Dynamic::Null)])).is_ok());
    }

    #[test]
    fn unknown_values_cannot_be_encoded() {
        assert!(DynamicValue::new(&AttributeType::String, &Dynamic::Unknown).is_err());
    }

    #[test]
    fn diagnostics_split_by_severity() {
        let mut diags = Diagnostics::new();
        diags.add_error("bad", Some("very bad"));
        diags.add_warning("meh", None::<String>);
        diags.push(Diagnostic::error("worse", ""));
        assert!(diags.has_errors());
        assert_eq!(diags.errors.len(), 2);
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["bad", "worse", "meh"]);
    }

    #[test]
    fn function_error_display_names_the_argument() {
        assert_eq!(FunctionError::argument(1, "bad").to_string(), "argument 1: bad");
        assert_eq!(FunctionError::new("bad").to_string(), "bad");
    }
}
