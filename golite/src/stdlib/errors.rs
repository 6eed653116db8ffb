use super::{expect_args, str_arg, Package};
use crate::error::Result;
use crate::value::Value;

pub(super) fn package() -> Package {
    Package::new("errors")
        .func("New", "errors.New", new)
        .func("Is", "errors.Is", is)
}

fn new(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("errors.New", args, 1)?;
    Ok(vec![Value::error(str_arg("errors.New", args, 0)?)])
}

fn is(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("errors.Is", args, 2)?;
    Ok(vec![Value::Bool(args[0].equals(&args[1])?)])
}
