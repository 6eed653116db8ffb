//! Embedded type system and reflection data

use std::fmt;
use std::sync::Arc;

/// Coarse classification of a [`Type`], mirroring `reflect.Kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Float64,
    String,
    Pointer,
    Slice,
    Map,
    Struct,
    Interface,
    Func,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float64 => "float64",
            Kind::String => "string",
            Kind::Pointer => "ptr",
            Kind::Slice => "slice",
            Kind::Map => "map",
            Kind::Struct => "struct",
            Kind::Interface => "interface",
            Kind::Func => "func",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bool,
    Int,
    Float64,
    String,
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(Arc<StructType>),
    Interface(Arc<InterfaceType>),
    Func(Arc<FuncType>),
}

impl Type {
    pub fn kind(&self) -> Kind {
        match self {
            Type::Bool => Kind::Bool,
            Type::Int => Kind::Int,
            Type::Float64 => Kind::Float64,
            Type::String => Kind::String,
            Type::Pointer(_) => Kind::Pointer,
            Type::Slice(_) => Kind::Slice,
            Type::Map(..) => Kind::Map,
            Type::Struct(_) => Kind::Struct,
            Type::Interface(_) => Kind::Interface,
            Type::Func(_) => Kind::Func,
        }
    }

    /// The predeclared `error` interface.
    pub fn error() -> Type {
        Type::Interface(Arc::new(InterfaceType {
            name: Some("error".to_string()),
            methods: vec!["Error".to_string()],
        }))
    }

    /// The empty interface (`any`, `interface{}`).
    pub fn any() -> Type {
        Type::Interface(Arc::new(InterfaceType {
            name: None,
            methods: Vec::new(),
        }))
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    pub fn map(key: Type, elem: Type) -> Type {
        Type::Map(Box::new(key), Box::new(elem))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Interface(i) if i.is_error())
    }

    /// Element type of a pointer, slice or map.
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) | Type::Slice(elem) | Type::Map(_, elem) => Some(elem),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Type> {
        match self {
            Type::Map(key, _) => Some(key),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Arc<StructType>> {
        match self {
            Type::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&Arc<FuncType>> {
        match self {
            Type::Func(ft) => Some(ft),
            _ => None,
        }
    }

    /// Types usable as map keys.
    pub fn is_key_type(&self) -> bool {
        matches!(self, Type::Bool | Type::Int | Type::String)
    }

    /// Types whose zero value is `nil`.
    pub fn is_nilable(&self) -> bool {
        matches!(
            self,
            Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Interface(_) | Type::Func(_)
        )
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::Float64 => f.write_str("float64"),
            Type::String => f.write_str("string"),
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Map(key, elem) => write!(f, "map[{}]{}", key, elem),
            Type::Struct(st) => st.fmt(f),
            Type::Interface(it) => it.fmt(f),
            Type::Func(ft) => ft.fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    /// Declared name; `None` for struct literals types.
    pub name: Option<String>,
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        if self.fields.is_empty() {
            return f.write_str("struct {}");
        }
        f.write_str("struct { ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", field.name, field.ty)?;
            if !field.tag.is_empty() {
                write!(f, " {:?}", field.tag.as_str())?;
            }
        }
        f.write_str(" }")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub tag: StructTag,
}

impl StructField {
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Raw struct tag with `reflect.StructTag` lookup semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructTag(String);

impl StructTag {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value associated with `key` in the conventional
    /// `key:"value" other:"value"` format, empty when absent.
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        let mut tag = self.0.as_bytes();
        while !tag.is_empty() {
            let mut i = 0;
            while i < tag.len() && tag[i] == b' ' {
                i += 1;
            }
            tag = &tag[i..];
            if tag.is_empty() {
                break;
            }

            i = 0;
            while i < tag.len()
                && tag[i] > b' '
                && tag[i] != b':'
                && tag[i] != b'"'
                && tag[i] != 0x7f
            {
                i += 1;
            }
            if i == 0 || i + 1 >= tag.len() || tag[i] != b':' || tag[i + 1] != b'"' {
                break;
            }
            let name = &tag[..i];
            tag = &tag[i + 1..];

            i = 1;
            while i < tag.len() && tag[i] != b'"' {
                if tag[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= tag.len() {
                break;
            }
            let quoted = &tag[..=i];
            tag = &tag[i + 1..];

            if name == key.as_bytes() {
                return unquote(quoted);
            }
        }
        None
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn unquote(quoted: &[u8]) -> Option<String> {
    let inner = std::str::from_utf8(quoted.get(1..quoted.len() - 1)?).ok()?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            _ => return None,
        }
    }
    Some(out)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceType {
    pub name: Option<String>,
    pub methods: Vec<String>,
}

impl InterfaceType {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Satisfied by error values: the method set is exactly `Error`.
    pub fn is_error(&self) -> bool {
        self.methods.len() == 1 && self.methods[0] == "Error"
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None if self.methods.is_empty() => f.write_str("interface {}"),
            None => write!(f, "interface {{ {} }}", self.methods.join("; ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

impl FuncType {
    pub fn num_in(&self) -> usize {
        self.params.len()
    }

    pub fn num_out(&self) -> usize {
        self.results.len()
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("func(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " {}", single),
            many => {
                f.write_str(" (")?;
                for (i, result) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", result)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Whether a Go identifier is exported (starts with an upper-case letter).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_tag_lookup_follows_reflect_rules() {
        let tag = StructTag::new(r#"json:"first_name,omitempty" tf:"first""#);
        assert_eq!(tag.get("tf"), "first");
        assert_eq!(tag.get("json"), "first_name,omitempty");
        assert_eq!(tag.get("yaml"), "");
        assert_eq!(tag.lookup("yaml"), None);
    }

    #[test]
    fn malformed_tag_yields_nothing() {
        assert_eq!(StructTag::new("tf:first").get("tf"), "");
        assert_eq!(StructTag::new(r#"tf:"unterminated"#).get("tf"), "");
    }

    #[test]
    fn escaped_quotes_in_tag_value() {
        let tag = StructTag::new(r#"tf:"a\"b""#);
        assert_eq!(tag.get("tf"), "a\"b");
    }

    #[test]
    fn func_type_display_matches_go() {
        let ft = FuncType {
            params: vec![Type::String, Type::slice(Type::Int)],
            results: vec![Type::Int, Type::error()],
        };
        assert_eq!(ft.to_string(), "func(string, []int) (int, error)");

        let ft = FuncType {
            params: vec![],
            results: vec![Type::map(Type::String, Type::pointer(Type::Float64))],
        };
        assert_eq!(ft.to_string(), "func() map[string]*float64");
    }

    #[test]
    fn error_type_is_recognised() {
        assert!(Type::error().is_error());
        assert!(!Type::any().is_error());
        assert_eq!(Type::any().to_string(), "interface {}");
        assert_eq!(Type::error().kind(), Kind::Interface);
    }

    #[test]
    fn exported_names() {
        assert!(is_exported("Echo"));
        assert!(!is_exported("echo"));
        assert!(!is_exported("_Echo"));
    }
}
