//! Conversion between Terraform values and Go values
//!
//! Decoding is driven by the Go parameter type, encoding by the Terraform
//! return type. Both sides were produced by [`crate::mapper`], so the shapes
//! line up; every mismatch that can still happen at runtime is reported as a
//! [`CodecError`] rather than a panic.

use crate::mapper::field_name;
use golite::{MapKey, Type, Value};
use std::collections::BTreeMap;
use tfplug::{AttributeType, Dynamic, DynamicValue, Number};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    fn mismatch(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        Self(format!("expected {}, got {}", expected, actual))
    }
}

impl From<tfplug::TfplugError> for CodecError {
    fn from(err: tfplug::TfplugError) -> Self {
        Self(err.to_string())
    }
}

impl From<golite::GoError> for CodecError {
    fn from(err: golite::GoError) -> Self {
        Self(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Decode a call argument into a value of the Go type `ty`.
///
/// An absent payload is how Terraform passes `null` to some parameters; it
/// decodes to the zero value of `ty`, a nil pointer for pointer parameters.
pub fn decode(ty: &Type, attr: &AttributeType, raw: &DynamicValue) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::zero(ty));
    }
    let value = raw.unmarshal(attr)?;
    from_dynamic(ty, &value)
}

/// Encode a Go result as an instance of `attr`.
pub fn encode(attr: &AttributeType, value: &Value) -> Result<DynamicValue> {
    let dynamic = to_dynamic(attr, value)?;
    Ok(DynamicValue::new(attr, &dynamic)?)
}

pub fn from_dynamic(ty: &Type, value: &Dynamic) -> Result<Value> {
    match value {
        Dynamic::Unknown => return Err(CodecError("unknown values are not supported".into())),
        Dynamic::Null => return Ok(Value::zero(ty)),
        _ => {}
    }

    match ty {
        Type::String => value
            .as_str()
            .map(|s| Value::Str(s.to_string()))
            .ok_or_else(|| CodecError::mismatch("string", value.type_name())),
        Type::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| CodecError::mismatch("bool", value.type_name())),
        Type::Int => value
            .as_number()
            .map(|n| Value::Int(n.as_i64()))
            .ok_or_else(|| CodecError::mismatch("number", value.type_name())),
        Type::Float64 => value
            .as_number()
            .map(|n| Value::Float(n.as_f64()))
            .ok_or_else(|| CodecError::mismatch("number", value.type_name())),
        Type::Pointer(elem) => {
            let inner = from_dynamic(elem, value)?;
            Ok(Value::pointer_to((**elem).clone(), inner))
        }
        Type::Slice(elem) => {
            let items = value
                .as_list()
                .ok_or_else(|| CodecError::mismatch("list", value.type_name()))?;
            let items = items
                .iter()
                .map(|item| from_dynamic(elem, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::slice_of((**elem).clone(), items))
        }
        Type::Map(key, elem) => {
            if **key != Type::String {
                return Err(CodecError(format!("unsupported map key type {}", key)));
            }
            let entries = value
                .as_map()
                .ok_or_else(|| CodecError::mismatch("map", value.type_name()))?;
            let entries = entries
                .iter()
                .map(|(k, v)| Ok((MapKey::Str(k.clone()), from_dynamic(elem, v)?)))
                .collect::<Result<BTreeMap<_, _>>>()?;
            Ok(Value::map_of((**key).clone(), (**elem).clone(), entries))
        }
        Type::Struct(st) => {
            let attrs = value
                .as_map()
                .ok_or_else(|| CodecError::mismatch("object", value.type_name()))?;
            let fields = st
                .fields
                .iter()
                .map(|field| {
                    let name = field_name(field);
                    let attr = attrs
                        .get(&name)
                        .ok_or_else(|| CodecError(format!("missing object field {}", name)))?;
                    from_dynamic(&field.ty, attr)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::struct_of(st.clone(), fields))
        }
        Type::Interface(_) => Err(CodecError("dynamic values are not supported".into())),
        Type::Func(_) => Err(CodecError(format!("unsupported type {}", ty))),
    }
}

pub fn to_dynamic(attr: &AttributeType, value: &Value) -> Result<Dynamic> {
    let value = match value {
        Value::Nil => return Ok(Dynamic::Null),
        Value::Pointer(p) => match p.load()? {
            Some(inner) => return to_dynamic(attr, &inner),
            None => return Ok(Dynamic::Null),
        },
        other => other,
    };

    match attr {
        AttributeType::String => value
            .as_str()
            .map(|s| Dynamic::String(s.to_string()))
            .ok_or_else(|| CodecError::mismatch("string", value.type_name())),
        AttributeType::Bool => value
            .as_bool()
            .map(Dynamic::Bool)
            .ok_or_else(|| CodecError::mismatch("bool", value.type_name())),
        AttributeType::Number => match value {
            Value::Int(i) => Ok(Dynamic::Number(Number::Int(*i))),
            Value::Float(f) if f.is_finite() => Ok(Dynamic::Number(Number::Float(*f))),
            Value::Float(f) => Err(CodecError(format!("cannot represent {} as a number", f))),
            other => Err(CodecError::mismatch("number", other.type_name())),
        },
        AttributeType::List(elem) => match value {
            Value::Slice(s) => s
                .items()?
                .iter()
                .map(|item| to_dynamic(elem, item))
                .collect::<Result<Vec<_>>>()
                .map(Dynamic::List),
            other => Err(CodecError::mismatch("slice", other.type_name())),
        },
        AttributeType::Map(elem) => match value {
            Value::Map(m) => m
                .entries()
                .iter()
                .map(|(k, v)| Ok((k.to_string(), to_dynamic(elem, v)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Dynamic::Map),
            other => Err(CodecError::mismatch("map", other.type_name())),
        },
        AttributeType::Object(attrs) => match value {
            Value::Struct(s) => {
                let mut out = BTreeMap::new();
                for (name, attr) in attrs {
                    let index = s
                        .ty
                        .fields
                        .iter()
                        .position(|f| field_name(f) == *name)
                        .ok_or_else(|| {
                            CodecError(format!("missing struct field for attribute {}", name))
                        })?;
                    out.insert(name.clone(), to_dynamic(attr, &s.fields[index])?);
                }
                Ok(Dynamic::Map(out))
            }
            other => Err(CodecError::mismatch("struct", other.type_name())),
        },
        AttributeType::Dynamic => Err(CodecError("dynamic values are not supported".into())),
        AttributeType::Set(_) => Err(CodecError(format!("unsupported type {}", attr))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::to_attribute_type;
    use golite::{StructField, StructTag, StructType};
    use std::sync::Arc;

    fn server_type() -> Arc<StructType> {
        Arc::new(StructType {
            name: Some("Server".to_string()),
            fields: vec![
                StructField {
                    name: "Name".to_string(),
                    ty: Type::String,
                    tag: StructTag::default(),
                },
                StructField {
                    name: "Port".to_string(),
                    ty: Type::Int,
                    tag: StructTag::new(r#"tf:"listen_port""#),
                },
            ],
        })
    }

    fn roundtrip(ty: &Type, value: &Dynamic) -> Dynamic {
        let attr = to_attribute_type(ty).unwrap();
        let raw = DynamicValue::new(&attr, value).unwrap();
        let decoded = decode(ty, &attr, &raw).unwrap();
        encode(&attr, &decoded).unwrap().unmarshal(&attr).unwrap()
    }

    #[test]
    fn empty_payload_decodes_to_zero_value() {
        let raw = DynamicValue::default();
        let s = decode(&Type::String, &AttributeType::String, &raw).unwrap();
        assert_eq!(s.as_str(), Some(""));
        let n = decode(&Type::Int, &AttributeType::Number, &raw).unwrap();
        assert_eq!(n.as_int(), Some(0));
        let p = decode(&Type::pointer(Type::String), &AttributeType::String, &raw).unwrap();
        assert!(p.is_nil());
    }

    #[test]
    fn explicit_null_decodes_to_zero_value() {
        let raw = DynamicValue::null();
        let b = decode(&Type::Bool, &AttributeType::Bool, &raw).unwrap();
        assert_eq!(b.as_bool(), Some(false));
        let p = decode(&Type::pointer(Type::Int), &AttributeType::Number, &raw).unwrap();
        assert!(p.is_nil());
    }

    #[test]
    fn nil_pointer_encodes_as_null() {
        let nil = Value::zero(&Type::pointer(Type::String));
        let raw = encode(&AttributeType::String, &nil).unwrap();
        assert_eq!(raw.unmarshal(&AttributeType::String).unwrap(), Dynamic::Null);
        assert_eq!(to_dynamic(&AttributeType::Number, &Value::Nil).unwrap(), Dynamic::Null);
    }

    #[test]
    fn pointers_dereference_on_encode() {
        let ptr = Value::pointer_to(Type::String, Value::Str("hi".to_string()));
        assert_eq!(
            to_dynamic(&AttributeType::String, &ptr).unwrap(),
            Dynamic::String("hi".to_string())
        );
    }

    #[test]
    fn int_truncates_and_float_is_exact() {
        let raw = DynamicValue::new(&AttributeType::Number, &Dynamic::Number(Number::Float(3.75)))
            .unwrap();
        let i = decode(&Type::Int, &AttributeType::Number, &raw).unwrap();
        assert_eq!(i.as_int(), Some(3));
        let f = decode(&Type::Float64, &AttributeType::Number, &raw).unwrap();
        assert_eq!(f.as_f64(), Some(3.75));

        let value = Dynamic::Number(Number::Float(-0.125));
        assert_eq!(roundtrip(&Type::Float64, &value), value);
    }

    #[test]
    fn containers_roundtrip() {
        let list = Dynamic::List(vec![
            Dynamic::String("a".to_string()),
            Dynamic::String("b".to_string()),
        ]);
        assert_eq!(roundtrip(&Type::slice(Type::String), &list), list);

        let map = Dynamic::Map(BTreeMap::from([
            ("x".to_string(), Dynamic::Number(Number::Int(1))),
            ("y".to_string(), Dynamic::Number(Number::Int(2))),
        ]));
        assert_eq!(roundtrip(&Type::map(Type::String, Type::Int), &map), map);
    }

    #[test]
    fn struct_fields_use_resolved_names() {
        let ty = Type::Struct(server_type());
        let value = Dynamic::Map(BTreeMap::from([
            ("name".to_string(), Dynamic::String("web".to_string())),
            ("listen_port".to_string(), Dynamic::Number(Number::Int(8080))),
        ]));
        let attr = to_attribute_type(&ty).unwrap();
        let decoded = from_dynamic(&ty, &value).unwrap();
        match &decoded {
            Value::Struct(s) => {
                assert_eq!(s.field("Name").and_then(Value::as_str), Some("web"));
                assert_eq!(s.field("Port").and_then(Value::as_int), Some(8080));
            }
            other => panic!("expected struct, got {:?}", other),
        }
        assert_eq!(to_dynamic(&attr, &decoded).unwrap(), value);
    }

    #[test]
    fn missing_object_field_is_an_error() {
        let ty = Type::Struct(server_type());
        let value = Dynamic::Map(BTreeMap::from([(
            "name".to_string(),
            Dynamic::String("web".to_string()),
        )]));
        assert_eq!(
            from_dynamic(&ty, &value).unwrap_err().to_string(),
            "missing object field listen_port"
        );
    }

    #[test]
    fn attribute_without_struct_field_is_an_error() {
        let attr = AttributeType::object([
            ("name", AttributeType::String),
            ("region", AttributeType::String),
        ]);
        let value = Value::zero(&Type::Struct(server_type()));
        assert_eq!(
            to_dynamic(&attr, &value).unwrap_err().to_string(),
            "missing struct field for attribute region"
        );
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = from_dynamic(&Type::String, &Dynamic::Unknown).unwrap_err();
        assert_eq!(err.to_string(), "unknown values are not supported");
        let nested = Dynamic::List(vec![Dynamic::Unknown]);
        assert!(from_dynamic(&Type::slice(Type::Int), &nested).is_err());
    }

    #[test]
    fn dynamic_types_are_rejected_cleanly() {
        let err = to_dynamic(&AttributeType::Dynamic, &Value::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "dynamic values are not supported");
        let err = from_dynamic(&Type::any(), &Dynamic::Bool(true)).unwrap_err();
        assert_eq!(err.to_string(), "dynamic values are not supported");
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let err = to_dynamic(&AttributeType::Number, &Value::Str("x".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "expected number, got string");
        let err = to_dynamic(&AttributeType::Number, &Value::Float(f64::NAN)).unwrap_err();
        assert!(err.to_string().starts_with("cannot represent"));
    }

    #[test]
    fn nil_slice_encodes_as_empty_list() {
        let nil = Value::zero(&Type::slice(Type::Int));
        assert_eq!(
            to_dynamic(&AttributeType::list(AttributeType::Number), &nil).unwrap(),
            Dynamic::List(vec![])
        );
    }
}
