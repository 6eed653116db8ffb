//! `fmt` package

use super::{str_arg, Package};
use crate::error::{GoError, Pos, Result};
use crate::stdlib::strconv::quote;
use crate::value::{format_float, format_float_with, Value};

pub(super) fn package() -> Package {
    Package::new("fmt")
        .func("Sprintf", "fmt.Sprintf", sprintf_native)
        .func("Sprint", "fmt.Sprint", sprint_native)
        .func("Sprintln", "fmt.Sprintln", sprintln_native)
        .func("Errorf", "fmt.Errorf", errorf)
}

fn format_args<'a>(func: &str, args: &'a [Value]) -> Result<(&'a str, &'a [Value])> {
    if args.is_empty() {
        return Err(GoError::runtime(
            Pos::default(),
            format!("{}: not enough arguments", func),
        ));
    }
    Ok((str_arg(func, args, 0)?, &args[1..]))
}

fn sprintf_native(args: &[Value]) -> Result<Vec<Value>> {
    let (format, rest) = format_args("fmt.Sprintf", args)?;
    Ok(vec![Value::Str(sprintf(format, rest))])
}

fn errorf(args: &[Value]) -> Result<Vec<Value>> {
    let (format, rest) = format_args("fmt.Errorf", args)?;
    Ok(vec![Value::error(sprintf(format, rest))])
}

fn sprint_native(args: &[Value]) -> Result<Vec<Value>> {
    Ok(vec![Value::Str(sprint(args))])
}

fn sprintln_native(args: &[Value]) -> Result<Vec<Value>> {
    Ok(vec![Value::Str(sprintln(args))])
}

/// `fmt.Sprint`: a space between operands when neither side is a string.
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_str = matches!(arg, Value::Str(_));
        if i > 0 && !is_str && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

pub fn sprintln(args: &[Value]) -> String {
    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let mut out = parts.join(" ");
    out.push('\n');
    out
}

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    sharp: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// `fmt.Sprintf`.
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let chars: Vec<char> = format.chars().collect();
    let mut next_arg = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '%' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        let mut spec = Spec::default();
        while i < chars.len() {
            match chars[i] {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                '#' => spec.sharp = true,
                ' ' => spec.space = true,
                _ => break,
            }
            i += 1;
        }
        spec.width = parse_count(&chars, &mut i, args, &mut next_arg);
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            spec.precision = Some(parse_count(&chars, &mut i, args, &mut next_arg).unwrap_or(0));
        }
        let Some(&verb) = chars.get(i) else {
            out.push_str("%!(NOVERB)");
            break;
        };
        i += 1;

        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{}(MISSING)", verb));
            continue;
        };
        next_arg += 1;

        let body = format_verb(verb, &spec, arg);
        out.push_str(&pad(&body, &spec, verb, arg));
    }

    if next_arg < args.len() {
        out.push_str("%!(EXTRA ");
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|a| format!("{}={}", a.type_name(), a))
            .collect();
        out.push_str(&extra.join(", "));
        out.push(')');
    }
    out
}

fn parse_count(chars: &[char], i: &mut usize, args: &[Value], next_arg: &mut usize) -> Option<usize> {
    if *i < chars.len() && chars[*i] == '*' {
        *i += 1;
        let n = args.get(*next_arg).and_then(Value::as_int);
        *next_arg += 1;
        return n.map(|n| n.max(0) as usize);
    }
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        return None;
    }
    chars[start..*i].iter().collect::<String>().parse().ok()
}

fn bad_verb(verb: char, arg: &Value) -> String {
    match arg {
        Value::Nil => format!("%!{}(<nil>)", verb),
        other => format!("%!{}({}={})", verb, other.type_name(), other),
    }
}

fn format_verb(verb: char, spec: &Spec, arg: &Value) -> String {
    match verb {
        'v' => {
            if spec.plus {
                plus_v(arg)
            } else if let Value::Float(f) = arg {
                float_g(*f, spec)
            } else {
                arg.to_string()
            }
        }
        'T' => arg.type_name(),
        's' => match arg {
            Value::Str(s) => truncate(s, spec.precision),
            Value::Error(e) => truncate(e.message(), spec.precision),
            Value::Slice(_) | Value::Map(_) | Value::Struct(_) | Value::Pointer(_) => arg.to_string(),
            other => bad_verb(verb, other),
        },
        'q' => match arg {
            Value::Str(s) => quote(s),
            Value::Error(e) => quote(e.message()),
            Value::Int(i) => char::from_u32(*i as u32)
                .map(|c| format!("{:?}", c))
                .unwrap_or_else(|| bad_verb(verb, arg)),
            other => bad_verb(verb, other),
        },
        'd' => match arg {
            Value::Int(i) => signed(i.to_string(), *i >= 0, spec),
            Value::Slice(_) => arg.to_string(),
            other => bad_verb(verb, other),
        },
        'b' => match arg {
            Value::Int(i) => signed(radix(*i, 2, false), *i >= 0, spec),
            other => bad_verb(verb, other),
        },
        'o' => match arg {
            Value::Int(i) => signed(radix(*i, 8, false), *i >= 0, spec),
            other => bad_verb(verb, other),
        },
        'x' | 'X' => {
            let upper = verb == 'X';
            match arg {
                Value::Int(i) => {
                    let digits = radix(*i, 16, upper);
                    let digits = if spec.sharp {
                        let (sign, rest) = match digits.strip_prefix('-') {
                            Some(rest) => ("-", rest),
                            None => ("", digits.as_str()),
                        };
                        format!("{}{}{}", sign, if upper { "0X" } else { "0x" }, rest)
                    } else {
                        digits
                    };
                    signed(digits, *i >= 0, spec)
                }
                Value::Str(s) => s
                    .bytes()
                    .map(|b| if upper { format!("{:02X}", b) } else { format!("{:02x}", b) })
                    .collect(),
                other => bad_verb(verb, other),
            }
        }
        'c' => match arg {
            Value::Int(i) => char::from_u32(*i as u32)
                .map(String::from)
                .unwrap_or_else(|| "\u{fffd}".to_string()),
            other => bad_verb(verb, other),
        },
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            other => bad_verb(verb, other),
        },
        'f' | 'F' => match arg {
            Value::Float(f) => float_f(*f, spec),
            other => bad_verb(verb, other),
        },
        'e' | 'E' => match arg {
            Value::Float(f) => {
                let s = float_e(*f, spec.precision.unwrap_or(6));
                let s = if verb == 'E' { s.to_uppercase() } else { s };
                signed(s, *f >= 0.0, spec)
            }
            other => bad_verb(verb, other),
        },
        'g' | 'G' => match arg {
            Value::Float(f) => {
                let s = float_g(*f, spec);
                if verb == 'G' {
                    s.to_uppercase()
                } else {
                    s
                }
            }
            other => bad_verb(verb, other),
        },
        'w' => arg.to_string(),
        _ => bad_verb(verb, arg),
    }
}

/// `%+v`: struct fields are printed with their names.
fn plus_v(arg: &Value) -> String {
    match arg {
        Value::Struct(s) => {
            let fields: Vec<String> = s
                .ty
                .fields
                .iter()
                .zip(&s.fields)
                .map(|(f, v)| format!("{}:{}", f.name, plus_v(v)))
                .collect();
            format!("{{{}}}", fields.join(" "))
        }
        Value::Pointer(p) => match p.load() {
            Ok(Some(inner @ Value::Struct(_))) => format!("&{}", plus_v(&inner)),
            _ => arg.to_string(),
        },
        Value::Slice(s) => {
            let items: Vec<String> = s.items().unwrap_or_default().iter().map(plus_v).collect();
            format!("[{}]", items.join(" "))
        }
        other => other.to_string(),
    }
}

fn truncate(s: &str, precision: Option<usize>) -> String {
    match precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    }
}

fn signed(digits: String, non_negative: bool, spec: &Spec) -> String {
    if non_negative && spec.plus {
        format!("+{}", digits)
    } else if non_negative && spec.space {
        format!(" {}", digits)
    } else {
        digits
    }
}

fn radix(value: i64, base: u32, upper: bool) -> String {
    let negative = value < 0;
    let mut n = value.unsigned_abs();
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % base as u64) as u32;
        let c = std::char::from_digit(d, base).unwrap_or('?');
        digits.push(if upper { c.to_ascii_uppercase() } else { c });
        n /= base as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn float_f(f: f64, spec: &Spec) -> String {
    if !f.is_finite() {
        return signed(format_float_with(f, 21), true, spec);
    }
    let s = format!("{:.*}", spec.precision.unwrap_or(6), f);
    signed(s, f >= 0.0, spec)
}

/// Go-style exponent: at least two digits with an explicit sign.
fn float_e(f: f64, precision: usize) -> String {
    if !f.is_finite() {
        return format_float_with(f, 21);
    }
    let s = format!("{:.*e}", precision, f);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

fn float_g(f: f64, spec: &Spec) -> String {
    let body = match spec.precision {
        None => format_float(f),
        Some(p) => {
            let p = p.max(1);
            if !f.is_finite() || f == 0.0 {
                format_float_with(f, 21)
            } else {
                let sci = format!("{:.*e}", p - 1, f);
                let exp: i32 = sci
                    .split_once('e')
                    .and_then(|(_, e)| e.parse().ok())
                    .unwrap_or(0);
                if exp < -4 || exp >= p as i32 {
                    let e = float_e(f, p - 1);
                    match e.split_once('e') {
                        Some((m, rest)) => format!("{}e{}", trim_zeros(m), rest),
                        None => e,
                    }
                } else {
                    let decimals = (p as i32 - 1 - exp).max(0) as usize;
                    trim_zeros(&format!("{:.*}", decimals, f)).to_string()
                }
            }
        }
    };
    signed(body, f >= 0.0 || f.is_nan(), spec)
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn pad(body: &str, spec: &Spec, verb: char, arg: &Value) -> String {
    let Some(width) = spec.width else {
        return body.to_string();
    };
    let len = body.chars().count();
    if len >= width {
        return body.to_string();
    }
    let fill = width - len;
    if spec.minus {
        return format!("{}{}", body, " ".repeat(fill));
    }
    let numeric = matches!(arg, Value::Int(_) | Value::Float(_))
        && matches!(verb, 'd' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'v' | 'x' | 'X' | 'b' | 'o');
    if spec.zero && numeric {
        let (sign, digits) = match body.chars().next() {
            Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &body[1..]),
            _ => (String::new(), body),
        };
        return format!("{}{}{}", sign, "0".repeat(fill), digits);
    }
    format!("{}{}", " ".repeat(fill), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StructField, StructTag, StructType, Type};
    use std::sync::Arc;

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn basic_verbs() {
        assert_eq!(
            sprintf("%s is %d years", &[s("Alice"), Value::Int(30)]),
            "Alice is 30 years"
        );
        assert_eq!(sprintf("%v|%t|%q", &[Value::Int(1), Value::Bool(true), s("a\"b")]), "1|true|\"a\\\"b\"");
        assert_eq!(sprintf("100%%", &[]), "100%");
        assert_eq!(sprintf("%x %X %#x", &[Value::Int(255), Value::Int(255), Value::Int(255)]), "ff FF 0xff");
    }

    #[test]
    fn float_verbs() {
        assert_eq!(sprintf("%f", &[Value::Float(1.5)]), "1.500000");
        assert_eq!(sprintf("%.2f", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(sprintf("%e", &[Value::Float(1234.5678)]), "1.234568e+03");
        assert_eq!(sprintf("%g", &[Value::Float(0.5)]), "0.5");
        assert_eq!(sprintf("%.3g", &[Value::Float(3.14159)]), "3.14");
        assert_eq!(sprintf("%v", &[Value::Float(2.0)]), "2");
        assert_eq!(sprintf("%v", &[Value::Float(1e6)]), "1e+06");
    }

    #[test]
    fn width_and_flags() {
        assert_eq!(sprintf("[%5d]", &[Value::Int(42)]), "[   42]");
        assert_eq!(sprintf("[%-5d]", &[Value::Int(42)]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[Value::Int(-42)]), "[-0042]");
        assert_eq!(sprintf("[%+d]", &[Value::Int(7)]), "[+7]");
        assert_eq!(sprintf("[%6.2f]", &[Value::Float(3.14159)]), "[  3.14]");
        assert_eq!(sprintf("[%*d]", &[Value::Int(4), Value::Int(1)]), "[   1]");
    }

    #[test]
    fn wrong_verb_missing_and_extra_arguments() {
        assert_eq!(sprintf("%d", &[s("x")]), "%!d(string=x)");
        assert_eq!(sprintf("%d %d", &[Value::Int(1)]), "1 %!d(MISSING)");
        assert_eq!(sprintf("%d", &[Value::Int(1), Value::Int(2)]), "1%!(EXTRA int=2)");
    }

    #[test]
    fn plus_v_prints_field_names() {
        let ty = Arc::new(StructType {
            name: Some("Person".into()),
            fields: vec![
                StructField {
                    name: "Name".into(),
                    ty: Type::String,
                    tag: StructTag::default(),
                },
                StructField {
                    name: "Age".into(),
                    ty: Type::Int,
                    tag: StructTag::default(),
                },
            ],
        });
        let p = Value::struct_of(ty, vec![s("Bob"), Value::Int(4)]);
        assert_eq!(sprintf("%v", &[p.clone()]), "{Bob 4}");
        assert_eq!(sprintf("%+v", &[p]), "{Name:Bob Age:4}");
    }

    #[test]
    fn sprint_spacing() {
        assert_eq!(sprint(&[s("a"), Value::Int(1), Value::Int(2), s("b")]), "a1 2b");
        assert_eq!(sprintln(&[s("a"), Value::Int(1)]), "a 1\n");
    }
}
