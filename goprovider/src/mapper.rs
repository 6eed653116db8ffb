//! Go type to Terraform type mapping
//!
//! The mapping is total over the types a published function may use:
//! scalars, pointers, slices, string-keyed maps and structs built from them.
//! Everything else is rejected when the function is adapted, so a call can
//! never meet a type the codec does not understand.

use golite::{Kind, StructField, Type};
use std::collections::BTreeMap;
use tfplug::{AttributeType, Parameter};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    #[error("unsupported type {0}")]
    UnsupportedType(String),

    #[error("unsupported map key type {0}, only string keys are supported")]
    UnsupportedMapKey(String),

    #[error("unsupported interface type {0}: dynamic values are not supported")]
    DynamicType(String),

    #[error("struct {ty} maps two fields to attribute {name:?}")]
    DuplicateAttribute { ty: String, name: String },
}

pub type Result<T> = std::result::Result<T, MapperError>;

pub fn to_attribute_type(ty: &Type) -> Result<AttributeType> {
    match ty {
        Type::String => Ok(AttributeType::String),
        Type::Bool => Ok(AttributeType::Bool),
        Type::Int | Type::Float64 => Ok(AttributeType::Number),
        Type::Pointer(elem) => to_attribute_type(elem),
        Type::Slice(elem) => Ok(AttributeType::list(to_attribute_type(elem)?)),
        Type::Map(key, elem) => {
            if key.kind() != Kind::String {
                return Err(MapperError::UnsupportedMapKey(key.to_string()));
            }
            Ok(AttributeType::map(to_attribute_type(elem)?))
        }
        Type::Struct(st) => {
            let mut attributes = BTreeMap::new();
            for field in &st.fields {
                let name = field_name(field);
                let attr = to_attribute_type(&field.ty)?;
                if attributes.insert(name.clone(), attr).is_some() {
                    return Err(MapperError::DuplicateAttribute {
                        ty: ty.to_string(),
                        name,
                    });
                }
            }
            Ok(AttributeType::Object(attributes))
        }
        Type::Interface(_) => Err(MapperError::DynamicType(ty.to_string())),
        Type::Func(_) => Err(MapperError::UnsupportedType(ty.to_string())),
    }
}

/// Parameter for a function input. Only pointer inputs accept null.
pub fn to_parameter(ty: &Type) -> Result<Parameter> {
    let mut parameter = Parameter::new(String::new(), to_attribute_type(ty)?);
    parameter.allow_null_value = ty.kind() == Kind::Pointer;
    parameter.allow_unknown_values = false;
    Ok(parameter)
}

/// Object attribute name of a struct field: the `tf` tag when present,
/// otherwise the field name with its first letter lowercased.
pub fn field_name(field: &StructField) -> String {
    let tag = field.tag.get("tf");
    if !tag.is_empty() {
        return tag;
    }
    uncapitalize(&field.name)
}

fn uncapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golite::{StructTag, StructType};
    use std::sync::Arc;

    fn field(name: &str, ty: Type, tag: &str) -> StructField {
        StructField {
            name: name.to_string(),
            ty,
            tag: StructTag::new(tag),
        }
    }

    fn record(fields: Vec<StructField>) -> Type {
        Type::Struct(Arc::new(StructType {
            name: Some("Record".to_string()),
            fields,
        }))
    }

    #[test]
    fn scalars_map_to_primitives() {
        assert_eq!(to_attribute_type(&Type::String).unwrap(), AttributeType::String);
        assert_eq!(to_attribute_type(&Type::Bool).unwrap(), AttributeType::Bool);
        assert_eq!(to_attribute_type(&Type::Int).unwrap(), AttributeType::Number);
        assert_eq!(to_attribute_type(&Type::Float64).unwrap(), AttributeType::Number);
    }

    #[test]
    fn pointers_are_transparent() {
        let ty = Type::pointer(Type::slice(Type::pointer(Type::Int)));
        assert_eq!(
            to_attribute_type(&ty).unwrap(),
            AttributeType::list(AttributeType::Number)
        );
    }

    #[test]
    fn containers_map_element_types() {
        let ty = Type::map(Type::String, Type::slice(Type::Bool));
        assert_eq!(
            to_attribute_type(&ty).unwrap(),
            AttributeType::map(AttributeType::list(AttributeType::Bool))
        );
    }

    #[test]
    fn struct_fields_resolve_names() {
        let ty = record(vec![
            field("Name", Type::String, ""),
            field("Port", Type::Int, r#"tf:"listen_port""#),
            field("X", Type::Bool, r#"json:"x_json""#),
            field("labels", Type::map(Type::String, Type::String), ""),
        ]);
        assert_eq!(
            to_attribute_type(&ty).unwrap(),
            AttributeType::object([
                ("name", AttributeType::String),
                ("listen_port", AttributeType::Number),
                ("x", AttributeType::Bool),
                ("labels", AttributeType::map(AttributeType::String)),
            ])
        );
    }

    #[test]
    fn uncapitalize_only_touches_first_letter() {
        assert_eq!(uncapitalize("HTTPPort"), "hTTPPort");
        assert_eq!(uncapitalize("A"), "a");
        assert_eq!(uncapitalize(""), "");
    }

    #[test]
    fn duplicate_attribute_names_are_rejected() {
        let ty = record(vec![
            field("Name", Type::String, ""),
            field("Other", Type::String, r#"tf:"name""#),
        ]);
        assert_eq!(
            to_attribute_type(&ty).unwrap_err(),
            MapperError::DuplicateAttribute {
                ty: "Record".to_string(),
                name: "name".to_string(),
            }
        );
    }

    #[test]
    fn unsupported_types_are_rejected() {
        assert!(matches!(
            to_attribute_type(&Type::map(Type::Int, Type::String)),
            Err(MapperError::UnsupportedMapKey(_))
        ));
        assert!(matches!(
            to_attribute_type(&Type::any()),
            Err(MapperError::DynamicType(_))
        ));
        assert!(matches!(
            to_attribute_type(&Type::error()),
            Err(MapperError::DynamicType(_))
        ));
        let nested = record(vec![field("Err", Type::error(), "")]);
        assert!(to_attribute_type(&nested).is_err());
        let func = Type::Func(Arc::new(golite::FuncType {
            params: vec![],
            results: vec![],
        }));
        assert!(matches!(
            to_attribute_type(&func),
            Err(MapperError::UnsupportedType(_))
        ));
    }

    #[test]
    fn only_pointer_parameters_accept_null() {
        let plain = to_parameter(&Type::String).unwrap();
        assert!(!plain.allow_null_value);
        assert!(!plain.allow_unknown_values);

        let pointer = to_parameter(&Type::pointer(Type::String)).unwrap();
        assert!(pointer.allow_null_value);
        assert_eq!(pointer.type_, AttributeType::String);
    }
}
