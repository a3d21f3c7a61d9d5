#![forbid(unsafe_code)]

//! Scalar operator semantics shared by constant folding and evaluation.
//!
//! Integer arithmetic stays integral: `/` truncates toward zero, `%` is
//! floored (sign follows the divisor) and a negative integer exponent yields a
//! float. Mixed integer/float operands promote to float.

use std::cmp::Ordering;

use crate::{BinOp, CmpOp, Literal, UnaryOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FoldError {
    DivisionByZero,
    Overflow,
    Unsupported,
}

impl FoldError {
    pub fn describe(self) -> &'static str {
        match self {
            FoldError::DivisionByZero => "division by zero",
            FoldError::Overflow => "integer overflow",
            FoldError::Unsupported => "unsupported operand types",
        }
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn num(lit: &Literal) -> Option<Num> {
    match lit {
        Literal::Int(n) => Some(Num::Int(*n)),
        Literal::Float(x) => Some(Num::Float(*x)),
        _ => None,
    }
}

fn as_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Float(x) => *x,
    }
}

pub fn binary(op: BinOp, l: &Literal, r: &Literal) -> Result<Literal, FoldError> {
    if op.is_logical() {
        let out = match op {
            BinOp::And => l.truthy() && r.truthy(),
            _ => l.truthy() || r.truthy(),
        };
        return Ok(Literal::Bool(out));
    }

    if let (BinOp::Add, Literal::Str(a), Literal::Str(b)) = (op, l, r) {
        return Ok(Literal::Str(format!("{a}{b}")));
    }

    let (Some(a), Some(b)) = (num(l), num(r)) else {
        return Err(FoldError::Unsupported);
    };

    match (a, b) {
        (Num::Int(a), Num::Int(b)) => int_binary(op, a, b),
        (a, b) => float_binary(op, as_f64(&a), as_f64(&b)),
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<Literal, FoldError> {
    let out = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            a.checked_div(b)
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(FoldError::DivisionByZero);
            }
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        BinOp::Pow => {
            if b < 0 {
                return Ok(Literal::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| FoldError::Overflow)?;
            a.checked_pow(exp)
        }
        BinOp::MatMul | BinOp::And | BinOp::Or => return Err(FoldError::Unsupported),
    };
    out.map(Literal::Int).ok_or(FoldError::Overflow)
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Result<Literal, FoldError> {
    let out = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(FoldError::DivisionByZero);
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(FoldError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
        }
        BinOp::Pow => a.powf(b),
        BinOp::MatMul | BinOp::And | BinOp::Or => return Err(FoldError::Unsupported),
    };
    Ok(Literal::Float(out))
}

pub fn compare(op: CmpOp, l: &Literal, r: &Literal) -> Result<Literal, FoldError> {
    let ord = match (l, r) {
        (Literal::Int(a), Literal::Int(b)) => Some(a.cmp(b)),
        (Literal::Str(a), Literal::Str(b)) => Some(a.cmp(b)),
        (Literal::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        _ => match (num(l), num(r)) {
            (Some(a), Some(b)) => as_f64(&a).partial_cmp(&as_f64(&b)),
            _ => None,
        },
    };

    let Some(ord) = ord else {
        // Values of unrelated kinds are simply unequal.
        return match op {
            CmpOp::Eq => Ok(Literal::Bool(false)),
            CmpOp::Ne => Ok(Literal::Bool(true)),
            _ => Err(FoldError::Unsupported),
        };
    };

    let out = match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    };
    Ok(Literal::Bool(out))
}

pub fn unary(op: UnaryOp, v: &Literal) -> Result<Literal, FoldError> {
    match (op, v) {
        (UnaryOp::Neg, Literal::Int(n)) => n.checked_neg().map(Literal::Int).ok_or(FoldError::Overflow),
        (UnaryOp::Neg, Literal::Float(x)) => Ok(Literal::Float(-x)),
        (UnaryOp::Not, lit) => Ok(Literal::Bool(!lit.truthy())),
        _ => Err(FoldError::Unsupported),
    }
}
