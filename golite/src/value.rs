//! Runtime values
//!
//! Values follow Go's copy semantics: scalars and structs are copied on
//! assignment, while pointers, slices and maps share their backing storage.
//! Storage is single-threaded (`Rc<RefCell<_>>`); a value never outlives the
//! call that created it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{GoError, Pos, Result};
use crate::stdlib::NativeFn;
use crate::types::{StructType, Type};

pub type Cell = Rc<RefCell<Value>>;
pub type Backing = Rc<RefCell<Vec<Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    /// Untyped nil, or a nil interface.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Pointer(PointerValue),
    Slice(SliceValue),
    Map(MapValue),
    Struct(StructValue),
    Func(FuncValue),
    Error(ErrorValue),
}

/// Storage a pointer refers to.
#[derive(Debug, Clone)]
pub enum Root {
    Cell(Cell),
    Elem(Backing, usize),
}

/// An addressable location: a root plus a path of struct field indices.
#[derive(Debug, Clone)]
pub struct Target {
    pub root: Root,
    pub path: Vec<usize>,
}

fn borrow_error() -> GoError {
    GoError::runtime(Pos::default(), "concurrent access to a value")
}

impl Target {
    pub fn cell(cell: Cell) -> Self {
        Self {
            root: Root::Cell(cell),
            path: Vec::new(),
        }
    }

    pub fn field(&self, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push(index);
        Self {
            root: self.root.clone(),
            path,
        }
    }

    pub fn load(&self) -> Result<Value> {
        self.with(|v| v.clone())
    }

    pub fn store(&self, value: Value) -> Result<()> {
        self.with_mut(|slot| *slot = value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> Result<R> {
        match &self.root {
            Root::Cell(cell) => {
                let guard = cell.try_borrow().map_err(|_| borrow_error())?;
                Ok(f(walk(&guard, &self.path)?))
            }
            Root::Elem(backing, index) => {
                let guard = backing.try_borrow().map_err(|_| borrow_error())?;
                let slot = guard.get(*index).ok_or_else(borrow_error)?;
                Ok(f(walk(slot, &self.path)?))
            }
        }
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R> {
        match &self.root {
            Root::Cell(cell) => {
                let mut guard = cell.try_borrow_mut().map_err(|_| borrow_error())?;
                Ok(f(walk_mut(&mut guard, &self.path)?))
            }
            Root::Elem(backing, index) => {
                let mut guard = backing.try_borrow_mut().map_err(|_| borrow_error())?;
                let slot = guard.get_mut(*index).ok_or_else(borrow_error)?;
                Ok(f(walk_mut(slot, &self.path)?))
            }
        }
    }

    fn same(&self, other: &Target) -> bool {
        let root = match (&self.root, &other.root) {
            (Root::Cell(a), Root::Cell(b)) => Rc::ptr_eq(a, b),
            (Root::Elem(a, i), Root::Elem(b, j)) => Rc::ptr_eq(a, b) && i == j,
            _ => false,
        };
        root && self.path == other.path
    }

    fn addr(&self) -> usize {
        let base = match &self.root {
            Root::Cell(cell) => Rc::as_ptr(cell) as usize,
            Root::Elem(backing, index) => Rc::as_ptr(backing) as usize + index * 16,
        };
        base + self.path.iter().sum::<usize>() * 8
    }
}

fn walk<'a>(mut value: &'a Value, path: &[usize]) -> Result<&'a Value> {
    for &index in path {
        value = match value {
            Value::Struct(s) => s.fields.get(index).ok_or_else(borrow_error)?,
            _ => return Err(borrow_error()),
        };
    }
    Ok(value)
}

fn walk_mut<'a>(mut value: &'a mut Value, path: &[usize]) -> Result<&'a mut Value> {
    for &index in path {
        value = match value {
            Value::Struct(s) => s.fields.get_mut(index).ok_or_else(borrow_error)?,
            _ => return Err(borrow_error()),
        };
    }
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct PointerValue {
    pub elem: Type,
    pub target: Option<Target>,
}

impl PointerValue {
    pub fn is_nil(&self) -> bool {
        self.target.is_none()
    }

    /// Dereference; `None` for a nil pointer.
    pub fn load(&self) -> Result<Option<Value>> {
        self.target.as_ref().map(Target::load).transpose()
    }
}

#[derive(Debug, Clone)]
pub struct SliceValue {
    pub elem: Type,
    pub backing: Option<Backing>,
    pub offset: usize,
    pub len: usize,
}

impl SliceValue {
    pub fn nil(elem: Type) -> Self {
        Self {
            elem,
            backing: None,
            offset: 0,
            len: 0,
        }
    }

    pub fn from_vec(elem: Type, items: Vec<Value>) -> Self {
        let len = items.len();
        Self {
            elem,
            backing: Some(Rc::new(RefCell::new(items))),
            offset: 0,
            len,
        }
    }

    pub fn is_nil(&self) -> bool {
        self.backing.is_none()
    }

    /// Copy of the visible elements.
    pub fn items(&self) -> Result<Vec<Value>> {
        match &self.backing {
            None => Ok(Vec::new()),
            Some(backing) => {
                let guard = backing.try_borrow().map_err(|_| borrow_error())?;
                Ok(guard[self.offset..self.offset + self.len].to_vec())
            }
        }
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        self.check_index(index)?;
        let backing = self.backing.as_ref().ok_or_else(borrow_error)?;
        let guard = backing.try_borrow().map_err(|_| borrow_error())?;
        Ok(guard[self.offset + index].clone())
    }

    /// Addressable element slot.
    pub fn target(&self, index: usize) -> Result<Target> {
        self.check_index(index)?;
        let backing = self.backing.as_ref().ok_or_else(borrow_error)?;
        Ok(Target {
            root: Root::Elem(backing.clone(), self.offset + index),
            path: Vec::new(),
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(GoError::panic(format!(
                "runtime error: index out of range [{}] with length {}",
                index, self.len
            )));
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.backing
            .as_ref()
            .map(|b| b.borrow().len() - self.offset)
            .unwrap_or(0)
    }

    /// `s[lo:hi]`, sharing storage.
    pub fn reslice(&self, lo: usize, hi: Option<usize>) -> Result<SliceValue> {
        let cap = self.capacity();
        let hi = hi.unwrap_or(self.len);
        if hi > cap {
            return Err(GoError::panic(format!(
                "runtime error: slice bounds out of range [:{}] with capacity {}",
                hi, cap
            )));
        }
        if lo > hi {
            return Err(GoError::panic(format!(
                "runtime error: slice bounds out of range [{}:{}]",
                lo, hi
            )));
        }
        Ok(SliceValue {
            elem: self.elem.clone(),
            backing: self.backing.clone(),
            offset: self.offset + lo,
            len: hi - lo,
        })
    }

    /// `append(s, items...)`. Writes in place while the backing store has
    /// room past the slice end, otherwise grows it.
    pub fn append(&self, items: Vec<Value>) -> Result<SliceValue> {
        if items.is_empty() {
            return Ok(self.clone());
        }
        let backing = match &self.backing {
            Some(backing) => backing.clone(),
            None => return Ok(SliceValue::from_vec(self.elem.clone(), items)),
        };
        let added = items.len();
        {
            let mut guard = backing.try_borrow_mut().map_err(|_| borrow_error())?;
            let mut at = self.offset + self.len;
            for item in items {
                if at < guard.len() {
                    guard[at] = item;
                } else {
                    guard.push(item);
                }
                at += 1;
            }
        }
        Ok(SliceValue {
            elem: self.elem.clone(),
            backing: Some(backing),
            offset: self.offset,
            len: self.len + added,
        })
    }
}

/// Map key; only comparable basic kinds are supported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(MapKey::Bool(*b)),
            Value::Int(i) => Ok(MapKey::Int(*i)),
            Value::Str(s) => Ok(MapKey::Str(s.clone())),
            other => Err(GoError::runtime(
                Pos::default(),
                format!("invalid map key of type {}", other.type_name()),
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapValue {
    pub key: Type,
    pub elem: Type,
    pub entries: Option<Rc<RefCell<BTreeMap<MapKey, Value>>>>,
}

impl MapValue {
    pub fn nil(key: Type, elem: Type) -> Self {
        Self {
            key,
            elem,
            entries: None,
        }
    }

    pub fn new(key: Type, elem: Type, entries: BTreeMap<MapKey, Value>) -> Self {
        Self {
            key,
            elem,
            entries: Some(Rc::new(RefCell::new(entries))),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.entries.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map(|e| e.borrow().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.entries
            .as_ref()
            .and_then(|e| e.borrow().get(key).cloned())
    }

    pub fn insert(&self, key: MapKey, value: Value) -> Result<()> {
        let entries = self
            .entries
            .as_ref()
            .ok_or_else(|| GoError::panic("assignment to entry in nil map"))?;
        entries
            .try_borrow_mut()
            .map_err(|_| borrow_error())?
            .insert(key, value);
        Ok(())
    }

    pub fn remove(&self, key: &MapKey) -> Result<()> {
        if let Some(entries) = &self.entries {
            entries
                .try_borrow_mut()
                .map_err(|_| borrow_error())?
                .remove(key);
        }
        Ok(())
    }

    /// Snapshot of the entries in key order.
    pub fn entries(&self) -> Vec<(MapKey, Value)> {
        self.entries
            .as_ref()
            .map(|e| {
                e.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct StructValue {
    pub ty: Arc<StructType>,
    pub fields: Vec<Value>,
}

impl StructValue {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.ty.field_index(name).and_then(|i| self.fields.get(i))
    }
}

#[derive(Debug, Clone)]
pub enum FuncValue {
    /// Index into the program's function table.
    User(usize),
    Native(NativeFn),
}

#[derive(Debug, Clone)]
pub struct ErrorValue(Rc<str>);

impl ErrorValue {
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl Value {
    pub fn zero(ty: &Type) -> Value {
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Float64 => Value::Float(0.0),
            Type::String => Value::Str(String::new()),
            Type::Pointer(elem) => Value::Pointer(PointerValue {
                elem: (**elem).clone(),
                target: None,
            }),
            Type::Slice(elem) => Value::Slice(SliceValue::nil((**elem).clone())),
            Type::Map(key, elem) => Value::Map(MapValue::nil((**key).clone(), (**elem).clone())),
            Type::Struct(st) => Value::Struct(StructValue {
                ty: st.clone(),
                fields: st.fields.iter().map(|f| Value::zero(&f.ty)).collect(),
            }),
            Type::Interface(_) | Type::Func(_) => Value::Nil,
        }
    }

    pub fn error(message: impl AsRef<str>) -> Value {
        Value::Error(ErrorValue(Rc::from(message.as_ref())))
    }

    /// Pointer to a fresh variable holding `value`.
    pub fn pointer_to(elem: Type, value: Value) -> Value {
        Value::Pointer(PointerValue {
            elem,
            target: Some(Target::cell(Rc::new(RefCell::new(value)))),
        })
    }

    pub fn slice_of(elem: Type, items: Vec<Value>) -> Value {
        Value::Slice(SliceValue::from_vec(elem, items))
    }

    pub fn map_of(key: Type, elem: Type, entries: BTreeMap<MapKey, Value>) -> Value {
        Value::Map(MapValue::new(key, elem, entries))
    }

    pub fn struct_of(ty: Arc<StructType>, fields: Vec<Value>) -> Value {
        Value::Struct(StructValue { ty, fields })
    }

    pub fn is_nil(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Pointer(p) => p.is_nil(),
            Value::Slice(s) => s.is_nil(),
            Value::Map(m) => m.is_nil(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Message of an error value.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Value::Error(e) => Some(e.message()),
            _ => None,
        }
    }

    /// Static type of a value, as inferred by `:=`.
    pub fn static_type(&self) -> Option<Type> {
        match self {
            Value::Nil | Value::Func(_) => None,
            Value::Bool(_) => Some(Type::Bool),
            Value::Int(_) => Some(Type::Int),
            Value::Float(_) => Some(Type::Float64),
            Value::Str(_) => Some(Type::String),
            Value::Pointer(p) => Some(Type::pointer(p.elem.clone())),
            Value::Slice(s) => Some(Type::slice(s.elem.clone())),
            Value::Map(m) => Some(Type::map(m.key.clone(), m.elem.clone())),
            Value::Struct(s) => Some(Type::Struct(s.ty.clone())),
            Value::Error(_) => Some(Type::error()),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Func(_) => "func".to_string(),
            other => other
                .static_type()
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }
    }

    /// Convert for assignment to a slot of type `ty`.
    pub fn assign_to(self, ty: &Type) -> Result<Value> {
        let mismatch = |v: &Value| {
            GoError::runtime(
                Pos::default(),
                format!("cannot use {} value as {} value", v.type_name(), ty),
            )
        };
        match (ty, self) {
            (ty, Value::Nil) if ty.is_nilable() => Ok(Value::zero(ty)),
            (_, Value::Nil) => Err(GoError::runtime(
                Pos::default(),
                format!("cannot use nil as {} value", ty),
            )),
            (Type::Bool, v @ Value::Bool(_))
            | (Type::Int, v @ Value::Int(_))
            | (Type::Float64, v @ Value::Float(_))
            | (Type::String, v @ Value::Str(_)) => Ok(v),
            (Type::Float64, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Type::Int, Value::Float(f)) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            (Type::Int, Value::Float(f)) => Err(GoError::runtime(
                Pos::default(),
                format!("cannot use {} (untyped float constant) as int value (truncated)", format_float(f)),
            )),
            (Type::Interface(it), v) => {
                if it.is_empty() || (it.is_error() && matches!(v, Value::Error(_))) {
                    Ok(v)
                } else {
                    Err(GoError::runtime(
                        Pos::default(),
                        format!("{} does not implement {}", v.type_name(), ty),
                    ))
                }
            }
            (Type::Pointer(elem), Value::Pointer(p)) if **elem == p.elem => Ok(Value::Pointer(p)),
            (Type::Slice(elem), Value::Slice(s)) if **elem == s.elem => Ok(Value::Slice(s)),
            (Type::Map(key, elem), Value::Map(m)) if **key == m.key && **elem == m.elem => {
                Ok(Value::Map(m))
            }
            (Type::Struct(st), Value::Struct(s)) if *st == s.ty => Ok(Value::Struct(s)),
            (Type::Func(_), v @ Value::Func(_)) => Ok(v),
            (_, v) => Err(mismatch(&v)),
        }
    }

    /// Go `==`.
    pub fn equals(&self, other: &Value) -> Result<bool> {
        let eq = match (self, other) {
            (Value::Nil, v) | (v, Value::Nil) => match v {
                Value::Nil => true,
                Value::Pointer(_) | Value::Slice(_) | Value::Map(_) => v.is_nil(),
                _ => false,
            },
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Pointer(a), Value::Pointer(b)) => match (&a.target, &b.target) {
                (None, None) => true,
                (Some(x), Some(y)) => x.same(y),
                _ => false,
            },
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Value::Struct(a), Value::Struct(b)) => {
                if a.ty != b.ty {
                    return Err(mismatched(self, other));
                }
                for (x, y) in a.fields.iter().zip(&b.fields) {
                    if !x.equals(y)? {
                        return Ok(false);
                    }
                }
                true
            }
            (Value::Slice(_), Value::Slice(_)) => {
                return Err(GoError::runtime(
                    Pos::default(),
                    "invalid operation: slice can only be compared to nil",
                ))
            }
            (Value::Map(_), Value::Map(_)) => {
                return Err(GoError::runtime(
                    Pos::default(),
                    "invalid operation: map can only be compared to nil",
                ))
            }
            (Value::Error(_), _) | (_, Value::Error(_)) => false,
            _ => return Err(mismatched(self, other)),
        };
        Ok(eq)
    }
}

fn mismatched(a: &Value, b: &Value) -> GoError {
    GoError::runtime(
        Pos::default(),
        format!(
            "invalid operation: mismatched types {} and {}",
            a.type_name(),
            b.type_name()
        ),
    )
}

/// Float formatting of Go's `%v`: shortest representation, exponent form
/// when the decimal exponent is below -4 or at least 6.
pub fn format_float(f: f64) -> String {
    format_float_with(f, 6)
}

/// Shortest `%g`-style formatting with a configurable exponent threshold.
pub fn format_float_with(f: f64, exp_threshold: i32) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if exp < -4 || exp >= exp_threshold {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        format!("{}", f)
    }
}

impl fmt::Display for Value {
    /// Go's `%v` formatting.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Error(e) => f.write_str(e.message()),
            Value::Pointer(p) => match &p.target {
                None => f.write_str("<nil>"),
                Some(target) => match target.load() {
                    Ok(inner @ Value::Struct(_)) => write!(f, "&{}", inner),
                    _ => write!(f, "0x{:x}", target.addr()),
                },
            },
            Value::Slice(s) => {
                f.write_str("[")?;
                let items = s.items().unwrap_or_default();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Struct(s) => {
                f.write_str("{")?;
                for (i, field) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", field)?;
                }
                f.write_str("}")
            }
            Value::Func(FuncValue::Native(nf)) => write!(f, "{}", nf.name),
            Value::Func(FuncValue::User(index)) => write!(f, "func#{}", index),
        }
    }
}

/// Constant value. Unlike [`Value`] it is `Send + Sync` and can live in a
/// loaded program.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Const {
    pub fn to_value(&self) -> Value {
        match self {
            Const::Bool(b) => Value::Bool(*b),
            Const::Int(i) => Value::Int(*i),
            Const::Float(f) => Value::Float(*f),
            Const::Str(s) => Value::Str(s.clone()),
        }
    }

    pub fn from_value(value: &Value) -> Option<Const> {
        match value {
            Value::Bool(b) => Some(Const::Bool(*b)),
            Value::Int(i) => Some(Const::Int(*i)),
            Value::Float(f) => Some(Const::Float(*f)),
            Value::Str(s) => Some(Const::Str(s.clone())),
            _ => None,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Const::Bool(_) => Type::Bool,
            Const::Int(_) => Type::Int,
            Const::Float(_) => Type::Float64,
            Const::Str(_) => Type::String,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values() {
        assert!(matches!(Value::zero(&Type::Int), Value::Int(0)));
        assert!(Value::zero(&Type::pointer(Type::Int)).is_nil());
        assert!(Value::zero(&Type::slice(Type::String)).is_nil());
        assert!(matches!(Value::zero(&Type::error()), Value::Nil));
    }

    #[test]
    fn untyped_int_widens_to_float() {
        let v = Value::Int(3).assign_to(&Type::Float64).unwrap();
        assert!(matches!(v, Value::Float(f) if f == 3.0));
        assert!(Value::Str("x".into()).assign_to(&Type::Int).is_err());
    }

    #[test]
    fn slices_share_storage_when_appending_in_place() {
        let base = SliceValue::from_vec(Type::Int, vec![Value::Int(1), Value::Int(2)]);
        let head = base.reslice(0, Some(1)).unwrap();
        let grown = head.append(vec![Value::Int(9)]).unwrap();
        assert_eq!(grown.len, 2);
        assert!(matches!(base.get(1).unwrap(), Value::Int(9)));
        assert!(Rc::ptr_eq(
            grown.backing.as_ref().unwrap(),
            base.backing.as_ref().unwrap()
        ));
    }

    #[test]
    fn index_out_of_range_panics() {
        let s = SliceValue::from_vec(Type::Int, vec![Value::Int(1)]);
        let err = s.get(3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "panic: runtime error: index out of range [3] with length 1"
        );
    }

    #[test]
    fn nil_map_write_panics() {
        let m = MapValue::nil(Type::String, Type::Int);
        assert!(m.insert(MapKey::Str("a".into()), Value::Int(1)).is_err());
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn float_formatting_matches_go() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(100000.0), "100000");
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(1e6), "1e+06");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(1234567.0), "1.234567e+06");
        assert_eq!(format_float_with(1234567.0, 21), "1234567");
    }

    #[test]
    fn display_containers() {
        let mut entries = BTreeMap::new();
        entries.insert(MapKey::Str("b".into()), Value::Int(2));
        entries.insert(MapKey::Str("a".into()), Value::Int(1));
        let m = Value::map_of(Type::String, Type::Int, entries);
        assert_eq!(m.to_string(), "map[a:1 b:2]");

        let s = Value::slice_of(Type::String, vec![Value::Str("x".into()), Value::Str("y".into())]);
        assert_eq!(s.to_string(), "[x y]");
    }

    #[test]
    fn error_values_compare_by_identity() {
        let a = Value::error("boom");
        let b = Value::error("boom");
        assert!(a.equals(&a.clone()).unwrap());
        assert!(!a.equals(&b).unwrap());
        assert!(!a.equals(&Value::Nil).unwrap());
    }
}
