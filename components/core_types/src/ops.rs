//! Primitive operators
//!
//! These cover the built-in types only. The VM tries them first and falls
//! back to instance metamethods when they report a type error.

use std::cmp::Ordering;

use bytecode_system::{BitwiseOp, Opcode};
use memory_manager::Heap;
use num_traits::{checked_pow, Zero};

use crate::complex::Complex;
use crate::error::{VmError, VmResult};
use crate::object::{Array, MetaMethod};
use crate::value::Value;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Exp,
}

impl ArithOp {
    /// Operator for an arithmetic opcode
    pub fn from_opcode(op: Opcode) -> Option<Self> {
        match op {
            Opcode::Add => Some(ArithOp::Add),
            Opcode::Sub => Some(ArithOp::Sub),
            Opcode::Mul => Some(ArithOp::Mul),
            Opcode::Div => Some(ArithOp::Div),
            Opcode::Mod => Some(ArithOp::Mod),
            Opcode::Exp => Some(ArithOp::Exp),
            _ => None,
        }
    }

    /// Metamethod that overloads the operator
    pub fn meta(self) -> MetaMethod {
        match self {
            ArithOp::Add => MetaMethod::Add,
            ArithOp::Sub => MetaMethod::Sub,
            ArithOp::Mul => MetaMethod::Mul,
            ArithOp::Div => MetaMethod::Div,
            ArithOp::Mod => MetaMethod::Mod,
            ArithOp::Exp => MetaMethod::Exp,
        }
    }

    /// Source-level symbol
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::Exp => "**",
        }
    }
}

fn type_mismatch(op: &str, lhs: &Value, rhs: &Value) -> VmError {
    VmError::type_error(format!(
        "cannot apply '{}' to '{}' and '{}'",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> VmResult<Value> {
    let v = match op {
        ArithOp::Add => Value::Integer(a.wrapping_add(b)),
        ArithOp::Sub => Value::Integer(a.wrapping_sub(b)),
        ArithOp::Mul => Value::Integer(a.wrapping_mul(b)),
        ArithOp::Div | ArithOp::Mod if b == 0 => {
            return Err(VmError::arithmetic("integer division by zero"))
        }
        ArithOp::Div => Value::Integer(a.wrapping_div(b)),
        ArithOp::Mod => Value::Integer(a.wrapping_rem(b)),
        ArithOp::Exp => match usize::try_from(b).ok().and_then(|e| checked_pow(a, e)) {
            Some(r) => Value::Integer(r),
            None => Value::Float((a as f64).powf(b as f64)),
        },
    };
    Ok(v)
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Value {
    Value::Float(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
        ArithOp::Exp => a.powf(b),
    })
}

fn complex_arith(op: ArithOp, a: Complex, b: Complex) -> VmResult<Value> {
    let v = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div if b.is_zero() => return Err(VmError::arithmetic("complex division by zero")),
        ArithOp::Div => a / b,
        ArithOp::Mod => {
            return Err(VmError::type_error("cannot apply '%' to complex numbers"))
        }
        ArithOp::Exp => a.powc(b),
    };
    Ok(Value::Complex(v))
}

/// Apply a binary arithmetic operator to built-in types
///
/// Numbers are promoted integer → float → complex. `+` concatenates when
/// either side is a string and joins two arrays into a new one registered
/// in `heap`.
///
/// # Examples
///
/// ```
/// use core_types::{arith, ArithOp, Value};
/// use memory_manager::Heap;
///
/// let heap = Heap::new();
/// let r = arith(ArithOp::Add, &Value::Integer(5), &Value::Float(1.0), &heap).unwrap();
/// assert!(matches!(r, Value::Float(f) if f == 6.0));
/// ```
pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value, heap: &Heap) -> VmResult<Value> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => int_arith(op, *a, *b),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => Ok(float_arith(op, a, b)),
                _ => Err(type_mismatch(op.symbol(), lhs, rhs)),
            }
        }
        (Value::String(_), _) | (_, Value::String(_)) if op == ArithOp::Add => {
            Ok(Value::string(&format!("{lhs}{rhs}")))
        }
        (Value::Array(a), Value::Array(b)) if op == ArithOp::Add => {
            let mut items = a.to_vec();
            items.extend(b.to_vec());
            Ok(Value::Array(Array::new(heap, items)))
        }
        _ => match (lhs.as_complex(), rhs.as_complex()) {
            (Some(a), Some(b)) => complex_arith(op, a, b),
            _ => Err(type_mismatch(op.symbol(), lhs, rhs)),
        },
    }
}

/// Apply a bitwise operator; integers only
pub fn bitwise(op: BitwiseOp, lhs: &Value, rhs: &Value) -> VmResult<Value> {
    let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) else {
        return Err(type_mismatch("bitwise", lhs, rhs));
    };
    let shift = (*b & 63) as u32;
    let v = match op {
        BitwiseOp::And => a & b,
        BitwiseOp::Or => a | b,
        BitwiseOp::Xor => a ^ b,
        BitwiseOp::Shl => a.wrapping_shl(shift),
        BitwiseOp::Shr => a.wrapping_shr(shift),
    };
    Ok(Value::Integer(v))
}

/// Unary numeric negation
pub fn negate(value: &Value) -> VmResult<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Complex(c) => Ok(Value::Complex(-*c)),
        other => Err(VmError::type_error(format!(
            "cannot negate '{}'",
            other.type_name()
        ))),
    }
}

/// Bitwise not; integers only
pub fn bit_not(value: &Value) -> VmResult<Value> {
    match value {
        Value::Integer(i) => Ok(Value::Integer(!i)),
        other => Err(VmError::type_error(format!(
            "cannot apply '~' to '{}'",
            other.type_name()
        ))),
    }
}

/// Order two built-in values
///
/// Integers and floats compare after promotion, strings lexicographically.
/// Anything else, complex numbers included, is a type error.
pub fn compare(lhs: &Value, rhs: &Value) -> VmResult<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| VmError::arithmetic("comparison with NaN")),
            _ => Err(type_mismatch("comparison", lhs, rhs)),
        },
    }
}
