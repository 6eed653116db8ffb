//! Interpreter entry points and reflected symbols

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{GoError, Result};
use crate::eval::Machine;
use crate::parser::parse_file;
use crate::program::Program;
use crate::resolve;
use crate::stdlib::{self, Package};
use crate::types::{is_exported, FuncType, Kind, Type};
use crate::value::{Const, Value};

/// Execution limits applied to every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Statements, loop iterations and calls a single call may execute.
    pub max_steps: u64,
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            max_call_depth: 512,
        }
    }
}

/// Holds one loaded package.
pub struct Interpreter {
    options: Options,
    packages: HashMap<String, Arc<Package>>,
    program: Option<Arc<Program>>,
}

impl Interpreter {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            packages: HashMap::new(),
            program: None,
        }
    }

    /// Make the standard library packages importable.
    pub fn use_stdlib(&mut self) -> Result<()> {
        if !self.packages.is_empty() {
            return Err(GoError::Stdlib(
                "standard library is already installed".to_string(),
            ));
        }
        self.packages = stdlib::packages()
            .into_iter()
            .map(|p| (p.path.to_string(), Arc::new(p)))
            .collect();
        tracing::debug!(packages = self.packages.len(), "Installed standard library");
        Ok(())
    }

    /// Parse, load and check a complete source file.
    pub fn eval(&mut self, src: &str) -> Result<()> {
        if let Some(program) = &self.program {
            return Err(GoError::Load(format!(
                "package {} is already loaded",
                program.package
            )));
        }
        let file = parse_file(src)?;
        let program = Program::load(file, &self.packages)?;
        resolve::check(&program)?;
        tracing::info!(package = %program.package, "Evaluated source");
        self.program = Some(Arc::new(program));
        Ok(())
    }

    /// Exported symbols of `package`, by name. Empty when no such package
    /// is loaded.
    pub fn symbols(&self, package: &str) -> BTreeMap<String, Symbol> {
        let mut symbols = BTreeMap::new();
        let Some(program) = self.program.as_ref().filter(|p| p.package == package) else {
            return symbols;
        };
        for (name, &index) in &program.func_index {
            let Some(def) = program.func(index).filter(|_| is_exported(name)) else {
                continue;
            };
            symbols.insert(
                name.clone(),
                Symbol::Func(Function {
                    program: program.clone(),
                    index,
                    name: def.name.clone(),
                    ty: def.ty.clone(),
                    options: self.options,
                }),
            );
        }
        for (name, ty) in program.types.iter().filter(|(n, _)| is_exported(n)) {
            symbols.insert(name.clone(), Symbol::Type(ty.clone()));
        }
        for (name, value) in program.consts.iter().filter(|(n, _)| is_exported(n)) {
            symbols.insert(name.clone(), Symbol::Const(value.clone()));
        }
        symbols
    }
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Func(Function),
    Type(Type),
    Const(Const),
}

impl Symbol {
    pub fn kind(&self) -> Kind {
        match self {
            Symbol::Func(_) => Kind::Func,
            Symbol::Type(ty) => ty.kind(),
            Symbol::Const(c) => c.ty().kind(),
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Symbol::Func(f) => Some(f),
            _ => None,
        }
    }
}

/// Handle on a loaded function. Cheap to clone and safe to call from
/// several threads at once.
#[derive(Clone)]
pub struct Function {
    program: Arc<Program>,
    index: usize,
    name: String,
    ty: Arc<FuncType>,
    options: Options,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Arc<FuncType> {
        &self.ty
    }

    /// Call with one value per parameter. Returns all results, or the
    /// panic or runtime error that ended the call.
    pub fn call(&self, args: Vec<Value>) -> Result<Vec<Value>> {
        tracing::trace!(function = %self.name, args = args.len(), "Calling function");
        Machine::new(&self.program, self.options).call(self.index, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({} {})", self.name, self.ty)
    }
}
