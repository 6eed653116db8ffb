//! Native standard library packages
//!
//! Each package is a flat table of native functions and constants. Native
//! functions receive already-evaluated arguments and return all results;
//! Go errors are returned as values, Go panics as [`GoError::Panic`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{GoError, Pos, Result};
use crate::value::{Const, Value};

mod errors;
pub(crate) mod format;
mod math;
mod sort;
mod strconv;
mod strings;

type NativeImpl = fn(&[Value]) -> Result<Vec<Value>>;

/// Native function callable from evaluated code.
#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    func: NativeImpl,
}

impl NativeFn {
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>> {
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Member {
    Func(NativeFn),
    Const(Const),
}

#[derive(Debug)]
pub struct Package {
    pub path: &'static str,
    members: HashMap<&'static str, Member>,
}

impl Package {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            members: HashMap::new(),
        }
    }

    fn func(mut self, name: &'static str, full_name: &'static str, func: NativeImpl) -> Self {
        self.members.insert(
            name,
            Member::Func(NativeFn {
                name: full_name,
                func,
            }),
        );
        self
    }

    fn constant(mut self, name: &'static str, value: Const) -> Self {
        self.members.insert(name, Member::Const(value));
        self
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }
}

/// All packages installed by `Interpreter::use_stdlib`.
pub fn packages() -> Vec<Package> {
    vec![
        errors::package(),
        format::package(),
        math::package(),
        sort::package(),
        strconv::package(),
        strings::package(),
    ]
}

fn arg_error(func: &str, message: impl fmt::Display) -> GoError {
    GoError::runtime(Pos::default(), format!("{}: {}", func, message))
}

pub(crate) fn expect_args(func: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        let which = if args.len() < n { "not enough" } else { "too many" };
        return Err(arg_error(
            func,
            format!("{} arguments (expected {}, got {})", which, n, args.len()),
        ));
    }
    Ok(())
}

pub(crate) fn str_arg<'a>(func: &str, args: &'a [Value], i: usize) -> Result<&'a str> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(arg_error(
            func,
            format!("cannot use {} value as string argument", other.type_name()),
        )),
        None => Err(arg_error(func, "missing argument")),
    }
}

pub(crate) fn int_arg(func: &str, args: &[Value], i: usize) -> Result<i64> {
    match args.get(i) {
        Some(Value::Int(v)) => Ok(*v),
        Some(Value::Float(f)) if f.fract() == 0.0 => Ok(*f as i64),
        Some(other) => Err(arg_error(
            func,
            format!("cannot use {} value as int argument", other.type_name()),
        )),
        None => Err(arg_error(func, "missing argument")),
    }
}

pub(crate) fn float_arg(func: &str, args: &[Value], i: usize) -> Result<f64> {
    match args.get(i) {
        Some(v) => v.as_f64().ok_or_else(|| {
            arg_error(
                func,
                format!("cannot use {} value as float64 argument", v.type_name()),
            )
        }),
        None => Err(arg_error(func, "missing argument")),
    }
}

pub(crate) fn bool_arg(func: &str, args: &[Value], i: usize) -> Result<bool> {
    match args.get(i) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(arg_error(
            func,
            format!("cannot use {} value as bool argument", other.type_name()),
        )),
        None => Err(arg_error(func, "missing argument")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_package_has_a_distinct_path() {
        let pkgs = packages();
        let mut paths: Vec<_> = pkgs.iter().map(|p| p.path).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), pkgs.len());
    }

    #[test]
    fn members_are_looked_up_by_name() {
        let pkgs = packages();
        let strings = pkgs.iter().find(|p| p.path == "strings").unwrap();
        assert!(matches!(strings.member("ToUpper"), Some(Member::Func(_))));
        assert!(strings.member("Nope").is_none());

        let math = pkgs.iter().find(|p| p.path == "math").unwrap();
        assert!(matches!(math.member("Pi"), Some(Member::Const(Const::Float(_)))));
    }

    #[test]
    fn argument_helpers_report_mismatches() {
        let args = [Value::Int(1)];
        let err = str_arg("strings.ToUpper", &args, 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "strings.ToUpper: cannot use int value as string argument"
        );
        assert_eq!(float_arg("math.Sqrt", &args, 0).unwrap(), 1.0);
        assert!(expect_args("math.Sqrt", &args, 2).is_err());
    }
}
