use super::{expect_args, int_arg, str_arg, Package};
use crate::error::{GoError, Pos, Result};
use crate::types::Type;
use crate::value::{SliceValue, Value};

pub(super) fn package() -> Package {
    Package::new("strings")
        .func("Contains", "strings.Contains", contains)
        .func("Count", "strings.Count", count)
        .func("HasPrefix", "strings.HasPrefix", has_prefix)
        .func("HasSuffix", "strings.HasSuffix", has_suffix)
        .func("Index", "strings.Index", index)
        .func("LastIndex", "strings.LastIndex", last_index)
        .func("Join", "strings.Join", join)
        .func("Split", "strings.Split", split)
        .func("Fields", "strings.Fields", fields)
        .func("Repeat", "strings.Repeat", repeat)
        .func("Replace", "strings.Replace", replace)
        .func("ReplaceAll", "strings.ReplaceAll", replace_all)
        .func("ToLower", "strings.ToLower", to_lower)
        .func("ToUpper", "strings.ToUpper", to_upper)
        .func("TrimSpace", "strings.TrimSpace", trim_space)
        .func("Trim", "strings.Trim", trim)
        .func("TrimPrefix", "strings.TrimPrefix", trim_prefix)
        .func("TrimSuffix", "strings.TrimSuffix", trim_suffix)
}

fn two<'a>(func: &str, args: &'a [Value]) -> Result<(&'a str, &'a str)> {
    expect_args(func, args, 2)?;
    Ok((str_arg(func, args, 0)?, str_arg(func, args, 1)?))
}

fn one_str(func: &str, args: &[Value], f: impl FnOnce(&str) -> String) -> Result<Vec<Value>> {
    expect_args(func, args, 1)?;
    Ok(vec![Value::Str(f(str_arg(func, args, 0)?))])
}

fn string_slice(items: Vec<String>) -> Value {
    Value::Slice(SliceValue::from_vec(
        Type::String,
        items.into_iter().map(Value::Str).collect(),
    ))
}

fn contains(args: &[Value]) -> Result<Vec<Value>> {
    let (s, sub) = two("strings.Contains", args)?;
    Ok(vec![Value::Bool(s.contains(sub))])
}

fn count(args: &[Value]) -> Result<Vec<Value>> {
    let (s, sub) = two("strings.Count", args)?;
    let n = if sub.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(sub).count()
    };
    Ok(vec![Value::Int(n as i64)])
}

fn has_prefix(args: &[Value]) -> Result<Vec<Value>> {
    let (s, prefix) = two("strings.HasPrefix", args)?;
    Ok(vec![Value::Bool(s.starts_with(prefix))])
}

fn has_suffix(args: &[Value]) -> Result<Vec<Value>> {
    let (s, suffix) = two("strings.HasSuffix", args)?;
    Ok(vec![Value::Bool(s.ends_with(suffix))])
}

fn index(args: &[Value]) -> Result<Vec<Value>> {
    let (s, sub) = two("strings.Index", args)?;
    Ok(vec![Value::Int(s.find(sub).map(|i| i as i64).unwrap_or(-1))])
}

fn last_index(args: &[Value]) -> Result<Vec<Value>> {
    let (s, sub) = two("strings.LastIndex", args)?;
    Ok(vec![Value::Int(s.rfind(sub).map(|i| i as i64).unwrap_or(-1))])
}

fn join(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strings.Join", args, 2)?;
    let sep = str_arg("strings.Join", args, 1)?;
    let items = match &args[0] {
        Value::Slice(s) => s.items()?,
        Value::Nil => Vec::new(),
        other => {
            return Err(GoError::runtime(
                Pos::default(),
                format!(
                    "strings.Join: cannot use {} value as []string argument",
                    other.type_name()
                ),
            ))
        }
    };
    let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    Ok(vec![Value::Str(parts.join(sep))])
}

fn split(args: &[Value]) -> Result<Vec<Value>> {
    let (s, sep) = two("strings.Split", args)?;
    let parts: Vec<String> = if sep.is_empty() {
        s.chars().map(String::from).collect()
    } else {
        s.split(sep).map(str::to_string).collect()
    };
    Ok(vec![string_slice(parts)])
}

fn fields(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strings.Fields", args, 1)?;
    let s = str_arg("strings.Fields", args, 0)?;
    Ok(vec![string_slice(
        s.split_whitespace().map(str::to_string).collect(),
    )])
}

fn repeat(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strings.Repeat", args, 2)?;
    let s = str_arg("strings.Repeat", args, 0)?;
    let n = int_arg("strings.Repeat", args, 1)?;
    if n < 0 {
        return Err(GoError::panic("strings: negative Repeat count"));
    }
    Ok(vec![Value::Str(s.repeat(n as usize))])
}

fn replace(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strings.Replace", args, 4)?;
    let s = str_arg("strings.Replace", args, 0)?;
    let old = str_arg("strings.Replace", args, 1)?;
    let new = str_arg("strings.Replace", args, 2)?;
    let n = int_arg("strings.Replace", args, 3)?;
    let out = if n < 0 {
        s.replace(old, new)
    } else {
        s.replacen(old, new, n as usize)
    };
    Ok(vec![Value::Str(out)])
}

fn replace_all(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strings.ReplaceAll", args, 3)?;
    let s = str_arg("strings.ReplaceAll", args, 0)?;
    let old = str_arg("strings.ReplaceAll", args, 1)?;
    let new = str_arg("strings.ReplaceAll", args, 2)?;
    Ok(vec![Value::Str(s.replace(old, new))])
}

fn to_lower(args: &[Value]) -> Result<Vec<Value>> {
    one_str("strings.ToLower", args, str::to_lowercase)
}

fn to_upper(args: &[Value]) -> Result<Vec<Value>> {
    one_str("strings.ToUpper", args, str::to_uppercase)
}

fn trim_space(args: &[Value]) -> Result<Vec<Value>> {
    one_str("strings.TrimSpace", args, |s| s.trim().to_string())
}

fn trim(args: &[Value]) -> Result<Vec<Value>> {
    let (s, cutset) = two("strings.Trim", args)?;
    Ok(vec![Value::Str(
        s.trim_matches(|c| cutset.contains(c)).to_string(),
    )])
}

fn trim_prefix(args: &[Value]) -> Result<Vec<Value>> {
    let (s, prefix) = two("strings.TrimPrefix", args)?;
    Ok(vec![Value::Str(
        s.strip_prefix(prefix).unwrap_or(s).to_string(),
    )])
}

fn trim_suffix(args: &[Value]) -> Result<Vec<Value>> {
    let (s, suffix) = two("strings.TrimSuffix", args)?;
    Ok(vec![Value::Str(
        s.strip_suffix(suffix).unwrap_or(s).to_string(),
    )])
}
