//! golite - an embedded interpreter for a subset of Go
//!
//! A source file is parsed, loaded into an immutable [`Program`](program::Program)
//! and statically checked by [`Interpreter::eval`]. Exported functions are
//! then reflected through [`Interpreter::symbols`] and called with
//! [`Value`]s. Each call runs on its own evaluator, bounded by [`Options`].
//!
//! ```text
//! let mut interp = Interpreter::new(Options::default());
//! interp.use_stdlib()?;
//! interp.eval(r#"package lib
//!     func Add(a, b int) int { return a + b }"#)?;
//! let add = interp.symbols("lib")["Add"].as_function().cloned();
//! ```

pub mod ast;
pub mod error;
mod eval;
pub mod interp;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod program;
mod resolve;
mod stack;
pub mod stdlib;
pub mod types;
pub mod value;

pub use error::{GoError, Pos, Result};
pub use interp::{Function, Interpreter, Options, Symbol};
pub use types::{FuncType, InterfaceType, Kind, StructField, StructTag, StructType, Type};
pub use value::{Const, MapKey, Value};
