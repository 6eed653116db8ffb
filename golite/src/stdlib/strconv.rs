use std::num::IntErrorKind;

use super::{bool_arg, expect_args, float_arg, int_arg, str_arg, Package};
use crate::error::{GoError, Pos, Result};
use crate::value::{format_float_with, Value};

pub(super) fn package() -> Package {
    Package::new("strconv")
        .func("Itoa", "strconv.Itoa", itoa)
        .func("Atoi", "strconv.Atoi", atoi)
        .func("ParseInt", "strconv.ParseInt", parse_int)
        .func("ParseFloat", "strconv.ParseFloat", parse_float)
        .func("ParseBool", "strconv.ParseBool", parse_bool)
        .func("FormatInt", "strconv.FormatInt", format_int)
        .func("FormatFloat", "strconv.FormatFloat", format_float)
        .func("FormatBool", "strconv.FormatBool", format_bool)
        .func("Quote", "strconv.Quote", quote_native)
}

/// Go's `strconv.Quote`.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{7}' => out.push_str("\\a"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn num_error(func: &str, input: &str, reason: &str) -> Value {
    Value::error(format!("strconv.{}: parsing {}: {}", func, quote(input), reason))
}

fn itoa(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.Itoa", args, 1)?;
    Ok(vec![Value::Str(int_arg("strconv.Itoa", args, 0)?.to_string())])
}

fn parse_i64(func: &str, s: &str, base: u32) -> std::result::Result<i64, Value> {
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(num_error(func, s, "invalid syntax"));
    }
    let signed = if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    };
    i64::from_str_radix(&signed, base).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            num_error(func, s, "value out of range")
        }
        _ => num_error(func, s, "invalid syntax"),
    })
}

fn atoi(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.Atoi", args, 1)?;
    let s = str_arg("strconv.Atoi", args, 0)?;
    Ok(match parse_i64("Atoi", s, 10) {
        Ok(n) => vec![Value::Int(n), Value::Nil],
        Err(err) => vec![Value::Int(0), err],
    })
}

fn parse_int(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.ParseInt", args, 3)?;
    let s = str_arg("strconv.ParseInt", args, 0)?;
    let base = int_arg("strconv.ParseInt", args, 1)?;
    let base = if base == 0 { 10 } else { base };
    if !(2..=36).contains(&base) {
        return Ok(vec![Value::Int(0), num_error("ParseInt", s, "invalid base")]);
    }
    Ok(match parse_i64("ParseInt", s, base as u32) {
        Ok(n) => vec![Value::Int(n), Value::Nil],
        Err(err) => vec![Value::Int(0), err],
    })
}

fn parse_float(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.ParseFloat", args, 2)?;
    let s = str_arg("strconv.ParseFloat", args, 0)?;
    let parsed = match s {
        "Inf" | "+Inf" | "inf" | "+inf" => Ok(f64::INFINITY),
        "-Inf" | "-inf" => Ok(f64::NEG_INFINITY),
        "NaN" | "nan" => Ok(f64::NAN),
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => Err(()),
        _ => s.parse::<f64>().map_err(|_| ()),
    };
    Ok(match parsed {
        Ok(f) if f.is_infinite() && !s.to_ascii_lowercase().contains("inf") => {
            vec![Value::Float(f), num_error("ParseFloat", s, "value out of range")]
        }
        Ok(f) => vec![Value::Float(f), Value::Nil],
        Err(()) => vec![Value::Float(0.0), num_error("ParseFloat", s, "invalid syntax")],
    })
}

fn parse_bool(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.ParseBool", args, 1)?;
    let s = str_arg("strconv.ParseBool", args, 0)?;
    Ok(match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => vec![Value::Bool(true), Value::Nil],
        "0" | "f" | "F" | "FALSE" | "false" | "False" => vec![Value::Bool(false), Value::Nil],
        _ => vec![Value::Bool(false), num_error("ParseBool", s, "invalid syntax")],
    })
}

fn format_int(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.FormatInt", args, 2)?;
    let n = int_arg("strconv.FormatInt", args, 0)?;
    let base = int_arg("strconv.FormatInt", args, 1)?;
    if !(2..=36).contains(&base) {
        return Err(GoError::panic("strconv: illegal AppendInt/FormatInt base"));
    }
    let base = base as u64;
    let mut v = n.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let d = (v % base) as u32;
        digits.push(std::char::from_digit(d, base as u32).unwrap_or('?'));
        v /= base;
        if v == 0 {
            break;
        }
    }
    if n < 0 {
        digits.push('-');
    }
    Ok(vec![Value::Str(digits.iter().rev().collect())])
}

fn format_float(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.FormatFloat", args, 4)?;
    let f = float_arg("strconv.FormatFloat", args, 0)?;
    let verb = int_arg("strconv.FormatFloat", args, 1)?;
    let prec = int_arg("strconv.FormatFloat", args, 2)?;
    let out = match (char::from_u32(verb as u32), prec) {
        (Some('f'), p) if p < 0 => format!("{}", f),
        (Some('f'), p) => format!("{:.*}", p as usize, f),
        (Some('g'), p) if p < 0 => format_float_with(f, 6),
        (Some('e'), p) if p < 0 => format_float_with(f, i32::MIN),
        (Some('e'), p) if p >= 0 => {
            super::format::sprintf(&format!("%.{}e", p), &[Value::Float(f)])
        }
        (Some('g'), p) => super::format::sprintf(&format!("%.{}g", p), &[Value::Float(f)]),
        (Some(c), _) => {
            return Err(GoError::runtime(
                Pos::default(),
                format!("strconv.FormatFloat: unsupported format {:?}", c),
            ))
        }
        (None, _) => {
            return Err(GoError::runtime(
                Pos::default(),
                "strconv.FormatFloat: invalid format",
            ))
        }
    };
    Ok(vec![Value::Str(out)])
}

fn format_bool(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.FormatBool", args, 1)?;
    Ok(vec![Value::Str(bool_arg("strconv.FormatBool", args, 0)?.to_string())])
}

fn quote_native(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("strconv.Quote", args, 1)?;
    Ok(vec![Value::Str(quote(str_arg("strconv.Quote", args, 0)?))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&[Value]) -> Result<Vec<Value>>, args: &[Value]) -> Vec<Value> {
        f(args).unwrap()
    }

    #[test]
    fn atoi_success_and_failure() {
        let out = call(atoi, &[Value::Str("-42".into())]);
        assert!(matches!(out[0], Value::Int(-42)));
        assert!(out[1].is_nil());

        let out = call(atoi, &[Value::Str("4x".into())]);
        assert_eq!(
            out[1].as_error(),
            Some("strconv.Atoi: parsing \"4x\": invalid syntax")
        );

        let out = call(atoi, &[Value::Str("99999999999999999999".into())]);
        assert_eq!(
            out[1].as_error(),
            Some("strconv.Atoi: parsing \"99999999999999999999\": value out of range")
        );
    }

    #[test]
    fn parse_float_and_bool() {
        let out = call(parse_float, &[Value::Str("2.5".into()), Value::Int(64)]);
        assert!(matches!(out[0], Value::Float(f) if f == 2.5));
        let out = call(parse_float, &[Value::Str("abc".into()), Value::Int(64)]);
        assert!(out[1].as_error().is_some());

        let out = call(parse_bool, &[Value::Str("T".into())]);
        assert!(matches!(out[0], Value::Bool(true)));
    }

    #[test]
    fn format_int_bases() {
        let out = call(format_int, &[Value::Int(255), Value::Int(16)]);
        assert_eq!(out[0].as_str(), Some("ff"));
        let out = call(format_int, &[Value::Int(-5), Value::Int(2)]);
        assert_eq!(out[0].as_str(), Some("-101"));
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\x01\"");
    }
}
