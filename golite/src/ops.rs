//! Operators and conversions on runtime values
//!
//! Errors carry no position; callers attach one with [`GoError::with_pos`].

use std::cmp::Ordering;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{GoError, Pos, Result};
use crate::types::Type;
use crate::value::Value;

fn invalid(message: String) -> GoError {
    GoError::runtime(Pos::default(), format!("invalid operation: {}", message))
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Plus => "+",
        UnaryOp::Not => "!",
        UnaryOp::Addr => "&",
        UnaryOp::Deref => "*",
        UnaryOp::BitNot => "^",
    }
}

pub fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
        (op, v) => Err(invalid(format!(
            "operator {} not defined on {}",
            unary_symbol(op),
            v.type_name()
        ))),
    }
}

pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs)?)),
        BinaryOp::Ne => Ok(Value::Bool(!lhs.equals(&rhs)?)),
        BinaryOp::And | BinaryOp::Or => match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(not_defined(op, &lhs, &rhs)),
        },
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(op, &lhs, &rhs)?;
            let result = match (op, ord) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        _ => arith(op, lhs, rhs),
    }
}

fn not_defined(op: BinaryOp, lhs: &Value, rhs: &Value) -> GoError {
    if std::mem::discriminant(lhs) != std::mem::discriminant(rhs) {
        invalid(format!(
            "mismatched types {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))
    } else {
        invalid(format!(
            "operator {} not defined on {}",
            op.symbol(),
            lhs.type_name()
        ))
    }
}

/// `None` for unordered floats (NaN).
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Option<Ordering>> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            let a = lhs.as_f64().unwrap_or(f64::NAN);
            let b = rhs.as_f64().unwrap_or(f64::NAN);
            Ok(a.partial_cmp(&b))
        }
        _ => Err(not_defined(op, lhs, rhs)),
    }
}

fn divide_by_zero() -> GoError {
    GoError::panic("runtime error: integer divide by zero")
}

fn arith(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
            let a = lhs.as_f64().unwrap_or(f64::NAN);
            let b = rhs.as_f64().unwrap_or(f64::NAN);
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => {
                    return Err(invalid(format!(
                        "operator {} not defined on float64",
                        op.symbol()
                    )))
                }
            };
            Ok(Value::Float(v))
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Ok(Value::Str(s))
        }
        _ => Err(not_defined(op, &lhs, &rhs)),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    let v = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(divide_by_zero());
            }
            a.wrapping_div(b)
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(divide_by_zero());
            }
            a.wrapping_rem(b)
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl | BinaryOp::Shr => {
            if b < 0 {
                return Err(GoError::panic("runtime error: negative shift amount"));
            }
            match (op, b >= 64) {
                (BinaryOp::Shl, true) => 0,
                (BinaryOp::Shl, false) => a << b,
                (_, true) => {
                    if a < 0 {
                        -1
                    } else {
                        0
                    }
                }
                (_, false) => a >> b,
            }
        }
        _ => {
            return Err(invalid(format!(
                "operator {} not defined on int",
                op.symbol()
            )))
        }
    };
    Ok(Value::Int(v))
}

/// Explicit conversion `T(x)`.
pub fn convert(ty: &Type, value: Value) -> Result<Value> {
    match (ty, value) {
        (Type::Int, Value::Int(i)) => Ok(Value::Int(i)),
        (Type::Int, Value::Float(f)) => Ok(Value::Int(if f.is_nan() { i64::MIN } else { f as i64 })),
        (Type::Float64, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Type::Float64, Value::Float(f)) => Ok(Value::Float(f)),
        (Type::String, Value::Str(s)) => Ok(Value::Str(s)),
        (Type::String, Value::Int(i)) => {
            let c = u32::try_from(i)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or('\u{fffd}');
            Ok(Value::Str(c.to_string()))
        }
        (Type::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
        (ty, value) => {
            let from = value.type_name();
            value.assign_to(ty).map_err(|_| {
                GoError::runtime(
                    Pos::default(),
                    format!("cannot convert {} value to type {}", from, ty),
                )
            })
        }
    }
}
