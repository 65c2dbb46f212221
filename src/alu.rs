//! Operator semantics. Every function is pure and returns a
//! [`RuntimeErrorKind`] that the calling node positions.

use std::cmp::Ordering;

use crate::{
    ast::{BinaryOp, UnaryOp},
    error::RuntimeErrorKind,
    value::Value,
};

type AluResult = Result<Value, RuntimeErrorKind>;

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> AluResult {
    match op {
        BinaryOp::Plus => plus(left, right),
        BinaryOp::Minus => minus(left, right),
        BinaryOp::Mult => mult(left, right),
        BinaryOp::Div => div(left, right),
        BinaryOp::Mod => modulo(left, right),
        BinaryOp::BitAnd => bit_and(left, right),
        BinaryOp::BitOr => bit_or(left, right),
        BinaryOp::BitXor => bit_xor(left, right),
        BinaryOp::Lshift => lshift(left, right),
        BinaryOp::Rshift => rshift(left, right),
        BinaryOp::Urshift => urshift(left, right),
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        BinaryOp::Less => compare(op, left, right).map(|o| Value::Bool(o == Ordering::Less)),
        BinaryOp::LessEqual => {
            compare(op, left, right).map(|o| Value::Bool(o != Ordering::Greater))
        }
        BinaryOp::Greater => {
            compare(op, left, right).map(|o| Value::Bool(o == Ordering::Greater))
        }
        BinaryOp::GreaterEqual => {
            compare(op, left, right).map(|o| Value::Bool(o != Ordering::Less))
        }
        BinaryOp::Range => range(left, right),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> AluResult {
    match (op, operand) {
        (UnaryOp::Negative, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::IntegerOverflow { op: op.symbol() }),
        (UnaryOp::Negative, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
        (UnaryOp::Negative | UnaryOp::BitNot, other) => Err(RuntimeErrorKind::UnsupportedOperand {
            op: op.symbol(),
            operand: other.type_name(),
        }),
    }
}

fn unsupported(op: BinaryOp, left: &Value, right: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::UnsupportedOperands {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

enum Numbers {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn numbers(left: &Value, right: &Value) -> Option<Numbers> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(Numbers::Ints(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Some(Numbers::Floats(*a as f64, *b)),
        (Value::Float(a), Value::Int(b)) => Some(Numbers::Floats(*a, *b as f64)),
        (Value::Float(a), Value::Float(b)) => Some(Numbers::Floats(*a, *b)),
        _ => None,
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    ints: fn(i64, i64) -> Option<i64>,
    floats: fn(f64, f64) -> f64,
) -> AluResult {
    match numbers(left, right) {
        Some(Numbers::Ints(a, b)) => ints(a, b)
            .map(Value::Int)
            .ok_or(RuntimeErrorKind::IntegerOverflow { op: op.symbol() }),
        Some(Numbers::Floats(a, b)) => Ok(Value::Float(floats(a, b))),
        None => Err(unsupported(op, left, right)),
    }
}

/// Numeric addition, or string concatenation when either side is a string.
pub fn plus(left: &Value, right: &Value) -> AluResult {
    match (left, right) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::from(format!("{left}{right}"))),
        _ => arithmetic(BinaryOp::Plus, left, right, i64::checked_add, |a, b| a + b),
    }
}

pub fn minus(left: &Value, right: &Value) -> AluResult {
    arithmetic(BinaryOp::Minus, left, right, i64::checked_sub, |a, b| a - b)
}

pub fn mult(left: &Value, right: &Value) -> AluResult {
    arithmetic(BinaryOp::Mult, left, right, i64::checked_mul, |a, b| a * b)
}

pub fn div(left: &Value, right: &Value) -> AluResult {
    if matches!(right, Value::Int(0)) && matches!(left, Value::Int(_)) {
        return Err(RuntimeErrorKind::DivideByZero);
    }
    arithmetic(BinaryOp::Div, left, right, i64::checked_div, |a, b| a / b)
}

pub fn modulo(left: &Value, right: &Value) -> AluResult {
    if matches!(right, Value::Int(0)) && matches!(left, Value::Int(_)) {
        return Err(RuntimeErrorKind::DivideByZero);
    }
    arithmetic(BinaryOp::Mod, left, right, i64::checked_rem, |a, b| a % b)
}

fn bitwise(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    ints: fn(i64, i64) -> i64,
    bools: fn(bool, bool) -> bool,
) -> AluResult {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(ints(*a, *b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(bools(*a, *b))),
        _ => Err(unsupported(op, left, right)),
    }
}

pub fn bit_and(left: &Value, right: &Value) -> AluResult {
    bitwise(BinaryOp::BitAnd, left, right, |a, b| a & b, |a, b| a & b)
}

pub fn bit_or(left: &Value, right: &Value) -> AluResult {
    bitwise(BinaryOp::BitOr, left, right, |a, b| a | b, |a, b| a | b)
}

pub fn bit_xor(left: &Value, right: &Value) -> AluResult {
    bitwise(BinaryOp::BitXor, left, right, |a, b| a ^ b, |a, b| a ^ b)
}

fn shift(op: BinaryOp, left: &Value, right: &Value, f: fn(i64, u32) -> i64) -> AluResult {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(f(*a, (*b & 0x3f) as u32))),
        _ => Err(unsupported(op, left, right)),
    }
}

pub fn lshift(left: &Value, right: &Value) -> AluResult {
    shift(BinaryOp::Lshift, left, right, i64::wrapping_shl)
}

pub fn rshift(left: &Value, right: &Value) -> AluResult {
    shift(BinaryOp::Rshift, left, right, i64::wrapping_shr)
}

/// Unsigned (zero-filling) right shift.
pub fn urshift(left: &Value, right: &Value) -> AluResult {
    shift(BinaryOp::Urshift, left, right, |a, n| ((a as u64) >> n) as i64)
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, RuntimeErrorKind> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match numbers(left, right) {
            Some(Numbers::Ints(a, b)) => Some(a.cmp(&b)),
            Some(Numbers::Floats(a, b)) => a.partial_cmp(&b),
            None => None,
        },
    };
    ordering.ok_or_else(|| unsupported(op, left, right))
}

pub fn range(left: &Value, right: &Value) -> AluResult {
    match (left, right) {
        (Value::Int(from), Value::Int(to)) => Ok(Value::Range {
            from: *from,
            to: *to,
        }),
        _ => Err(unsupported(BinaryOp::Range, left, right)),
    }
}
