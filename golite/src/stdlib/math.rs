use super::{expect_args, float_arg, Package};
use crate::error::Result;
use crate::value::{Const, Value};

pub(super) fn package() -> Package {
    Package::new("math")
        .func("Abs", "math.Abs", abs)
        .func("Ceil", "math.Ceil", ceil)
        .func("Floor", "math.Floor", floor)
        .func("Max", "math.Max", max)
        .func("Min", "math.Min", min)
        .func("Mod", "math.Mod", modulo)
        .func("Pow", "math.Pow", pow)
        .func("Round", "math.Round", round)
        .func("Sqrt", "math.Sqrt", sqrt)
        .func("Trunc", "math.Trunc", trunc)
        .func("Inf", "math.Inf", inf)
        .func("IsNaN", "math.IsNaN", is_nan)
        .constant("MaxInt", Const::Int(i64::MAX))
        .constant("MinInt", Const::Int(i64::MIN))
        .constant("MaxInt64", Const::Int(i64::MAX))
        .constant("MinInt64", Const::Int(i64::MIN))
        .constant("Pi", Const::Float(std::f64::consts::PI))
        .constant("E", Const::Float(std::f64::consts::E))
}

fn unary(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Vec<Value>> {
    expect_args(name, args, 1)?;
    Ok(vec![Value::Float(f(float_arg(name, args, 0)?))])
}

fn binary(name: &str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Vec<Value>> {
    expect_args(name, args, 2)?;
    let x = float_arg(name, args, 0)?;
    let y = float_arg(name, args, 1)?;
    Ok(vec![Value::Float(f(x, y))])
}

fn abs(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Abs", args, f64::abs)
}

fn ceil(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Ceil", args, f64::ceil)
}

fn floor(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Floor", args, f64::floor)
}

fn round(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Round", args, f64::round)
}

fn sqrt(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Sqrt", args, f64::sqrt)
}

fn trunc(args: &[Value]) -> Result<Vec<Value>> {
    unary("math.Trunc", args, f64::trunc)
}

/// NaN-propagating, unlike `f64::max`.
fn max(args: &[Value]) -> Result<Vec<Value>> {
    binary("math.Max", args, |x, y| {
        if x.is_nan() || y.is_nan() {
            f64::NAN
        } else {
            x.max(y)
        }
    })
}

fn min(args: &[Value]) -> Result<Vec<Value>> {
    binary("math.Min", args, |x, y| {
        if x.is_nan() || y.is_nan() {
            f64::NAN
        } else {
            x.min(y)
        }
    })
}

fn modulo(args: &[Value]) -> Result<Vec<Value>> {
    binary("math.Mod", args, |x, y| x % y)
}

fn pow(args: &[Value]) -> Result<Vec<Value>> {
    binary("math.Pow", args, f64::powf)
}

fn inf(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("math.Inf", args, 1)?;
    let sign = super::int_arg("math.Inf", args, 0)?;
    let v = if sign >= 0 {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    };
    Ok(vec![Value::Float(v)])
}

fn is_nan(args: &[Value]) -> Result<Vec<Value>> {
    expect_args("math.IsNaN", args, 1)?;
    Ok(vec![Value::Bool(float_arg("math.IsNaN", args, 0)?.is_nan())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(out: Vec<Value>) -> f64 {
        out[0].as_f64().unwrap()
    }

    #[test]
    fn accepts_int_arguments() {
        assert_eq!(f(sqrt(&[Value::Int(16)]).unwrap()), 4.0);
        assert_eq!(f(pow(&[Value::Int(2), Value::Int(10)]).unwrap()), 1024.0);
    }

    #[test]
    fn round_half_away_from_zero() {
        assert_eq!(f(round(&[Value::Float(2.5)]).unwrap()), 3.0);
        assert_eq!(f(round(&[Value::Float(-2.5)]).unwrap()), -3.0);
    }

    #[test]
    fn max_propagates_nan() {
        assert!(f(max(&[Value::Float(f64::NAN), Value::Float(1.0)]).unwrap()).is_nan());
        assert_eq!(f(min(&[Value::Float(3.0), Value::Int(1)]).unwrap()), 1.0);
    }
}
