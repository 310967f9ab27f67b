//! Binary operators, comparisons and membership over [`Value`]s.
//!
//! Arithmetic is carried out in `f64`. The result is turned back into an
//! integer when both operands were integers, the operator is not `/`, and
//! the result is integral and in range.

use std::cmp::Ordering;

use jtl_templates::ast::BinaryOp;

use crate::error::RenderError;
use crate::value::Value;

/// Evaluate `left op right` on two evaluated operands.
///
/// The renderer short-circuits `and`/`or` itself and only reaches this for
/// the other operators.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RenderError> {
    match op {
        BinaryOp::Or => Ok(if left.is_truthy() { left } else { right }.clone()),
        BinaryOp::And => Ok(if left.is_truthy() { right } else { left }.clone()),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(|| invalid(op, left, right))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Concat => Ok(Value::String(format!("{left}{right}"))),
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Seq(a), Value::Seq(b)) => Ok(Value::Seq(a.iter().chain(b).cloned().collect())),
            _ => arithmetic(op, left, right),
        },
        BinaryOp::Mul => match (left, right) {
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                repeated_len(s.len(), *n).ok_or_else(|| invalid(op, left, right))?;
                Ok(Value::String(s.repeat(repeat_count(*n))))
            }
            (Value::Seq(items), Value::Int(n)) | (Value::Int(n), Value::Seq(items)) => {
                let total = repeated_len(items.len(), *n).ok_or_else(|| invalid(op, left, right))?;
                Ok(Value::Seq(items.iter().cycle().take(total).cloned().collect()))
            }
            _ => arithmetic(op, left, right),
        },
        BinaryOp::Sub | BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, left, right)
        }
    }
}

/// Upper bound on the length of a repeated string or sequence.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

fn repeat_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

/// Length of `len` items repeated `n` times, or `None` past [`MAX_REPEAT_LEN`].
fn repeated_len(len: usize, n: i64) -> Option<usize> {
    len.checked_mul(repeat_count(n))
        .filter(|&total| total <= MAX_REPEAT_LEN)
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RenderError> {
    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(invalid(op, left, right));
    };
    if b == 0.0 && matches!(op, BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod) {
        return Err(RenderError::DivisionByZero {
            op: op.symbol().to_string(),
        });
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => a - b * (a / b).floor(),
        BinaryOp::Pow => a.powf(b),
        _ => return Err(invalid(op, left, right)),
    };
    let integral_operands = is_integral(left) && is_integral(right);
    Ok(if integral_operands && op != BinaryOp::Div {
        to_int(result).map_or(Value::Float(result), Value::Int)
    } else {
        Value::Float(result)
    })
}

fn is_integral(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Bool(_))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_int(result: f64) -> Option<i64> {
    (result.is_finite() && result.fract() == 0.0 && result.abs() < i64::MAX as f64)
        .then_some(result as i64)
}

fn invalid(op: BinaryOp, left: &Value, right: &Value) -> RenderError {
    RenderError::InvalidOperand {
        op: op.symbol().to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

/// Order two values: numbers with numbers, strings with strings, and
/// sequences element by element. Anything else is unordered.
#[must_use]
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Seq(a), Value::Seq(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => {}
                    unequal => return Some(unequal),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

/// `element in container`.
///
/// Sequences compare items by equality, maps check keys by the element's
/// string form, and strings check for a substring.
pub fn contains(element: &Value, container: &Value) -> Result<bool, RenderError> {
    match container {
        Value::Seq(items) => Ok(items.contains(element)),
        Value::Map(map) => Ok(map.contains_key(&element.to_string())),
        Value::String(haystack) => Ok(haystack.contains(&element.to_string())),
        Value::Object(object) => object
            .iter()
            .map(|items| items.contains(element))
            .ok_or_else(|| invalid_membership(element, container)),
        _ => Err(invalid_membership(element, container)),
    }
}

fn invalid_membership(element: &Value, container: &Value) -> RenderError {
    RenderError::InvalidOperand {
        op: "in".to_string(),
        left: element.type_name().to_string(),
        right: container.type_name().to_string(),
    }
}
