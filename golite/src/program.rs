//! Loading: turns a parsed file into an immutable, shareable program

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::ast::{Block, Decl, Expr, File, TypeExpr};
use crate::error::{GoError, Pos, Result};
use crate::ops;
use crate::stdlib::{Member, Package};
use crate::types::{FuncType, InterfaceType, StructField, StructTag, StructType, Type};
use crate::value::{Const, Value};

/// A function declaration with resolved signature.
#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    pub ty: Arc<FuncType>,
    pub params: Vec<Option<String>>,
    /// Names of named results; all `None` otherwise.
    pub results: Vec<Option<String>>,
    pub body: Block,
    pub pos: Pos,
}

/// Loaded package. Immutable once built, so it is shared across threads
/// and calls.
#[derive(Debug)]
pub struct Program {
    pub package: String,
    pub(crate) imports: HashMap<String, Arc<Package>>,
    pub(crate) types: HashMap<String, Type>,
    pub(crate) consts: HashMap<String, Const>,
    pub(crate) funcs: Vec<FuncDef>,
    pub(crate) func_index: HashMap<String, usize>,
}

const UNSUPPORTED_NUMERIC: &[&str] = &[
    "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
    "float32", "complex64", "complex128", "byte", "rune",
];

fn builtin_type(name: &str) -> Option<Type> {
    match name {
        "bool" => Some(Type::Bool),
        "int" => Some(Type::Int),
        "float64" => Some(Type::Float64),
        "string" => Some(Type::String),
        "error" => Some(Type::error()),
        "any" => Some(Type::any()),
        _ => None,
    }
}

fn unknown_type(name: &str, pos: Pos) -> GoError {
    if UNSUPPORTED_NUMERIC.contains(&name) {
        GoError::resolve(
            pos,
            format!(
                "unsupported type {} (only int and float64 numeric types are available)",
                name
            ),
        )
    } else {
        GoError::resolve(pos, format!("undefined: {}", name))
    }
}

/// Name resolution used while building types.
trait TypeNames {
    fn lookup(&mut self, name: &str, pos: Pos) -> Result<Type>;
}

fn build_type(expr: &TypeExpr, named: Option<&str>, names: &mut impl TypeNames) -> Result<Type> {
    match expr {
        TypeExpr::Name(name, pos) => names.lookup(name, *pos),
        TypeExpr::Pointer(elem) => Ok(Type::pointer(build_type(elem, None, names)?)),
        TypeExpr::Slice(elem) => Ok(Type::slice(build_type(elem, None, names)?)),
        TypeExpr::Map(key, elem) => {
            let key_ty = build_type(key, None, names)?;
            if !key_ty.is_key_type() {
                return Err(GoError::resolve(
                    type_pos(key),
                    format!("unsupported map key type {}", key_ty),
                ));
            }
            Ok(Type::map(key_ty, build_type(elem, None, names)?))
        }
        TypeExpr::Struct(decls) => {
            let mut seen = HashSet::new();
            let mut fields = Vec::with_capacity(decls.len());
            for decl in decls {
                if !seen.insert(decl.name.as_str()) {
                    return Err(GoError::resolve(
                        decl.pos,
                        format!("{} redeclared", decl.name),
                    ));
                }
                fields.push(StructField {
                    name: decl.name.clone(),
                    ty: build_type(&decl.ty, None, names)?,
                    tag: StructTag::new(decl.tag.clone().unwrap_or_default()),
                });
            }
            Ok(Type::Struct(Arc::new(StructType {
                name: named.map(str::to_string),
                fields,
            })))
        }
        TypeExpr::Interface(methods) => Ok(Type::Interface(Arc::new(InterfaceType {
            name: named.map(str::to_string),
            methods: methods.clone(),
        }))),
        TypeExpr::Func(params, results) => {
            let params = params
                .iter()
                .map(|p| build_type(p, None, names))
                .collect::<Result<Vec<_>>>()?;
            let results = results
                .iter()
                .map(|r| build_type(r, None, names))
                .collect::<Result<Vec<_>>>()?;
            Ok(Type::Func(Arc::new(FuncType { params, results })))
        }
    }
}

fn type_pos(expr: &TypeExpr) -> Pos {
    match expr {
        TypeExpr::Name(_, pos) => *pos,
        TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) | TypeExpr::Map(inner, _) => {
            type_pos(inner)
        }
        TypeExpr::Struct(fields) => fields.first().map(|f| f.pos).unwrap_or_default(),
        _ => Pos::default(),
    }
}

/// Package-level type declarations, resolved on demand.
struct DeclaredTypes<'a> {
    decls: HashMap<&'a str, &'a TypeExpr>,
    done: HashMap<String, Type>,
    visiting: Vec<String>,
}

impl TypeNames for DeclaredTypes<'_> {
    fn lookup(&mut self, name: &str, pos: Pos) -> Result<Type> {
        if let Some(ty) = self.done.get(name) {
            return Ok(ty.clone());
        }
        let Some(&decl) = self.decls.get(name) else {
            return builtin_type(name).ok_or_else(|| unknown_type(name, pos));
        };
        if self.visiting.iter().any(|v| v == name) {
            return Err(GoError::resolve(
                pos,
                format!("invalid recursive type {}", name),
            ));
        }
        self.visiting.push(name.to_string());
        let ty = build_type(decl, Some(name), self)?;
        self.visiting.pop();
        self.done.insert(name.to_string(), ty.clone());
        Ok(ty)
    }
}

struct LoadedTypes<'a>(&'a Program);

impl TypeNames for LoadedTypes<'_> {
    fn lookup(&mut self, name: &str, pos: Pos) -> Result<Type> {
        self.0.named_type(name).ok_or_else(|| unknown_type(name, pos))
    }
}

impl Program {
    /// Build a program from a parsed file. `packages` are the importable
    /// standard library packages, keyed by import path.
    pub fn load(file: File, packages: &HashMap<String, Arc<Package>>) -> Result<Program> {
        let mut imports = HashMap::new();
        for import in &file.imports {
            let package = packages.get(&import.path).ok_or_else(|| {
                GoError::resolve(
                    import.pos,
                    format!("could not import {} (package not found)", import.path),
                )
            })?;
            let local = import.local_name().to_string();
            if imports.insert(local.clone(), package.clone()).is_some() {
                return Err(GoError::resolve(
                    import.pos,
                    format!("{} redeclared in this block", local),
                ));
            }
        }

        let mut seen: HashMap<&str, Pos> = HashMap::new();
        for decl in &file.decls {
            let (name, pos) = match decl {
                Decl::Type(t) => (t.name.as_str(), t.pos),
                Decl::Const(c) => (c.name.as_str(), c.pos),
                Decl::Func(f) => (f.name.as_str(), f.pos),
            };
            if name == "_" {
                continue;
            }
            if let Some(prev) = seen.insert(name, pos) {
                return Err(GoError::resolve(
                    pos,
                    format!("{} redeclared in this block (previous declaration at {})", name, prev),
                ));
            }
            if imports.contains_key(name) {
                return Err(GoError::resolve(
                    pos,
                    format!("{} already declared through import of package", name),
                ));
            }
        }

        let mut declared = DeclaredTypes {
            decls: file
                .decls
                .iter()
                .filter_map(|d| match d {
                    Decl::Type(t) => Some((t.name.as_str(), &t.ty)),
                    _ => None,
                })
                .collect(),
            done: HashMap::new(),
            visiting: Vec::new(),
        };
        for decl in &file.decls {
            if let Decl::Type(t) = decl {
                declared.lookup(&t.name, t.pos)?;
            }
        }
        let types = declared.done;

        let mut program = Program {
            package: file.package.clone(),
            imports,
            types,
            consts: HashMap::new(),
            funcs: Vec::new(),
            func_index: HashMap::new(),
        };

        let func_names: HashSet<&str> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Func(f) => Some(f.name.as_str()),
                _ => None,
            })
            .collect();
        let mut consts = ConstEval {
            program: &program,
            decls: file
                .decls
                .iter()
                .filter_map(|d| match d {
                    Decl::Const(c) => Some((c.name.as_str(), c)),
                    _ => None,
                })
                .collect(),
            funcs: &func_names,
            done: HashMap::new(),
            visiting: Vec::new(),
        };
        for decl in &file.decls {
            if let Decl::Const(c) = decl {
                consts.value_of(&c.name, c.pos)?;
            }
        }
        let consts = consts.done;
        program.consts = consts;

        for decl in file.decls {
            let Decl::Func(f) = decl else { continue };
            let params = f
                .params
                .iter()
                .map(|p| program.resolve_type(&p.ty))
                .collect::<Result<Vec<_>>>()?;
            let results = f
                .results
                .iter()
                .map(|r| program.resolve_type(&r.ty))
                .collect::<Result<Vec<_>>>()?;
            let def = FuncDef {
                name: f.name.clone(),
                ty: Arc::new(FuncType { params, results }),
                params: f.params.iter().map(|p| p.name.clone()).collect(),
                results: f.results.iter().map(|r| r.name.clone()).collect(),
                body: f.body,
                pos: f.pos,
            };
            if def.name != "_" {
                program.func_index.insert(def.name.clone(), program.funcs.len());
            }
            program.funcs.push(def);
        }

        tracing::debug!(
            package = %program.package,
            types = program.types.len(),
            consts = program.consts.len(),
            funcs = program.funcs.len(),
            "Loaded program"
        );
        Ok(program)
    }

    /// Type named `name` in this package or the universe scope.
    pub(crate) fn named_type(&self, name: &str) -> Option<Type> {
        self.types
            .get(name)
            .cloned()
            .or_else(|| builtin_type(name))
    }

    /// Resolve a type expression appearing in a function body.
    pub(crate) fn resolve_type(&self, expr: &TypeExpr) -> Result<Type> {
        build_type(expr, None, &mut LoadedTypes(self))
    }

    pub fn func(&self, index: usize) -> Option<&FuncDef> {
        self.funcs.get(index)
    }
}

/// Package-level constant evaluation, in dependency order.
struct ConstEval<'a> {
    program: &'a Program,
    decls: HashMap<&'a str, &'a crate::ast::ConstDecl>,
    funcs: &'a HashSet<&'a str>,
    done: HashMap<String, Const>,
    visiting: Vec<String>,
}

impl ConstEval<'_> {
    fn value_of(&mut self, name: &str, pos: Pos) -> Result<Const> {
        if let Some(c) = self.done.get(name) {
            return Ok(c.clone());
        }
        let Some(&decl) = self.decls.get(name) else {
            return Err(GoError::resolve(pos, format!("undefined: {}", name)));
        };
        if self.visiting.iter().any(|v| v == name) {
            return Err(GoError::resolve(
                decl.pos,
                format!("initialization cycle: {} refers to itself", name),
            ));
        }
        self.visiting.push(name.to_string());
        let mut value = self.eval(&decl.value)?;
        if let Some(ty_expr) = &decl.ty {
            let ty = self.program.resolve_type(ty_expr)?;
            if !matches!(ty, Type::Bool | Type::Int | Type::Float64 | Type::String) {
                return Err(GoError::resolve(
                    decl.pos,
                    format!("invalid constant type {}", ty),
                ));
            }
            value = value
                .assign_to(&ty)
                .map_err(|e| GoError::resolve(decl.pos, e.to_string()))?;
        }
        self.visiting.pop();
        let c = Const::from_value(&value).ok_or_else(|| {
            GoError::resolve(decl.pos, format!("{} is not constant", name))
        })?;
        self.done.insert(name.to_string(), c.clone());
        Ok(c)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        let at = |pos: Pos| move |e: GoError| GoError::resolve(pos, e.to_string());
        match expr {
            Expr::Int(v, _) => Ok(Value::Int(*v)),
            Expr::Float(v, _) => Ok(Value::Float(*v)),
            Expr::Str(s, _) => Ok(Value::Str(s.clone())),
            Expr::Ident(name, pos) => {
                if self.decls.contains_key(name.as_str()) {
                    return Ok(self.value_of(name, *pos)?.to_value());
                }
                match name.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "iota" => Err(GoError::resolve(*pos, "iota is not supported")),
                    _ if self.funcs.contains(name.as_str())
                        || self.program.named_type(name).is_some() =>
                    {
                        Err(GoError::resolve(*pos, format!("{} is not constant", name)))
                    }
                    _ => Err(GoError::resolve(*pos, format!("undefined: {}", name))),
                }
            }
            Expr::Selector { expr, name, pos } => {
                let Expr::Ident(pkg, _) = &**expr else {
                    return Err(GoError::resolve(*pos, "invalid constant expression"));
                };
                let package = self.program.imports.get(pkg).ok_or_else(|| {
                    GoError::resolve(*pos, format!("undefined: {}", pkg))
                })?;
                match package.member(name) {
                    Some(Member::Const(c)) => Ok(c.to_value()),
                    Some(Member::Func(_)) => Err(GoError::resolve(
                        *pos,
                        format!("{}.{} is not constant", pkg, name),
                    )),
                    None => Err(GoError::resolve(*pos, format!("undefined: {}.{}", pkg, name))),
                }
            }
            Expr::Unary { op, expr, pos } => {
                let v = self.eval(expr)?;
                ops::unary(*op, v).map_err(at(*pos))
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                ops::binary(*op, l, r).map_err(at(*pos))
            }
            Expr::Call {
                func, args, pos, ..
            } => {
                let Expr::Ident(name, _) = &**func else {
                    return Err(GoError::resolve(*pos, "invalid constant expression"));
                };
                let ty = match self.program.named_type(name) {
                    Some(ty @ (Type::Bool | Type::Int | Type::Float64 | Type::String)) => ty,
                    _ => return Err(GoError::resolve(*pos, format!("{}(...) is not constant", name))),
                };
                if args.len() != 1 {
                    return Err(GoError::resolve(
                        *pos,
                        format!("wrong argument count in conversion to {}", ty),
                    ));
                }
                let v = self.eval(&args[0])?;
                ops::convert(&ty, v).map_err(at(*pos))
            }
            other => Err(GoError::resolve(other.pos(), "invalid constant expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use crate::stdlib;

    fn load(src: &str) -> Result<Program> {
        let packages: HashMap<String, Arc<Package>> = stdlib::packages()
            .into_iter()
            .map(|p| (p.path.to_string(), Arc::new(p)))
            .collect();
        Program::load(parse_file(src)?, &packages)
    }

    #[test]
    fn resolves_named_struct_types_in_any_order() {
        let program = load(
            "package lib\ntype A struct { B B }\ntype B struct { N int `tf:\"n\"` }\n",
        )
        .unwrap();
        let a = program.types["A"].as_struct().unwrap().clone();
        assert_eq!(a.name.as_deref(), Some("A"));
        let b = a.fields[0].ty.as_struct().unwrap();
        assert_eq!(b.fields[0].tag.get("tf"), "n");
    }

    #[test]
    fn rejects_recursive_types() {
        let err = load("package lib\ntype Node struct { Next *Node }\n").unwrap_err();
        assert!(err.to_string().contains("invalid recursive type Node"));
    }

    #[test]
    fn evaluates_constants_in_dependency_order() {
        let program = load(
            "package lib\nimport \"math\"\nconst B = A * 2\nconst A = 21\nconst Tau = 2 * math.Pi\nconst F float64 = 1\n",
        )
        .unwrap();
        assert_eq!(program.consts["B"], Const::Int(42));
        assert!(matches!(program.consts["Tau"], Const::Float(f) if (f - std::f64::consts::TAU).abs() < 1e-12));
        assert_eq!(program.consts["F"], Const::Float(1.0));
    }

    #[test]
    fn unknown_import_and_redeclaration_fail() {
        let err = load("package lib\nimport \"os\"\n").unwrap_err();
        assert!(err.to_string().contains("could not import os"));

        let err = load("package lib\nfunc F() {}\nfunc F() {}\n").unwrap_err();
        assert!(err.to_string().contains("F redeclared in this block"));
    }

    #[test]
    fn unsupported_numeric_types_are_reported() {
        let err = load("package lib\nfunc F(x int32) int { return 0 }\n").unwrap_err();
        assert!(err.to_string().contains("unsupported type int32"));
    }

    #[test]
    fn builds_function_signatures() {
        let program = load(
            "package lib\nfunc Div(a, b int) (int, error) { return a / b, nil }\n",
        )
        .unwrap();
        let f = program.func(program.func_index["Div"]).unwrap();
        assert_eq!(f.ty.to_string(), "func(int, int) (int, error)");
        assert_eq!(f.params, vec![Some("a".to_string()), Some("b".to_string())]);
    }
}
