use std::cmp::Ordering;

use super::{expect_args, Package};
use crate::error::{GoError, Pos, Result};
use crate::value::Value;

pub(super) fn package() -> Package {
    Package::new("sort")
        .func("Strings", "sort.Strings", strings)
        .func("Ints", "sort.Ints", ints)
        .func("Float64s", "sort.Float64s", float64s)
}

/// Sorts the slice argument in place.
fn sort_in_place(
    name: &str,
    args: &[Value],
    cmp: fn(&Value, &Value) -> Option<Ordering>,
) -> Result<Vec<Value>> {
    expect_args(name, args, 1)?;
    let slice = match &args[0] {
        Value::Slice(s) => s,
        other => {
            return Err(GoError::runtime(
                Pos::default(),
                format!("{}: cannot use {} value as slice argument", name, other.type_name()),
            ))
        }
    };
    let mut items = slice.items()?;
    let mut failed = false;
    items.sort_by(|a, b| {
        cmp(a, b).unwrap_or_else(|| {
            failed = true;
            Ordering::Equal
        })
    });
    if failed {
        return Err(GoError::runtime(
            Pos::default(),
            format!("{}: slice has elements of the wrong type", name),
        ));
    }
    for (i, item) in items.into_iter().enumerate() {
        slice.target(i)?.store(item)?;
    }
    Ok(Vec::new())
}

fn strings(args: &[Value]) -> Result<Vec<Value>> {
    sort_in_place("sort.Strings", args, |a, b| Some(a.as_str()?.cmp(b.as_str()?)))
}

fn ints(args: &[Value]) -> Result<Vec<Value>> {
    sort_in_place("sort.Ints", args, |a, b| Some(a.as_int()?.cmp(&b.as_int()?)))
}

/// NaNs sort first, as in Go.
fn float64s(args: &[Value]) -> Result<Vec<Value>> {
    sort_in_place("sort.Float64s", args, |a, b| {
        let (x, y) = (a.as_f64()?, b.as_f64()?);
        Some(match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn sorts_shared_storage() {
        let slice = Value::slice_of(
            Type::Int,
            vec![Value::Int(3), Value::Int(1), Value::Int(2)],
        );
        ints(&[slice.clone()]).unwrap();
        assert_eq!(slice.to_string(), "[1 2 3]");
    }

    #[test]
    fn strings_sort_lexically() {
        let slice = Value::slice_of(
            Type::String,
            vec![Value::Str("b".into()), Value::Str("a".into())],
        );
        strings(&[slice.clone()]).unwrap();
        assert_eq!(slice.to_string(), "[a b]");
    }

    #[test]
    fn non_slice_argument_is_an_error() {
        assert!(ints(&[Value::Int(1)]).is_err());
    }
}
