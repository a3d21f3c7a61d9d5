#![forbid(unsafe_code)]

//! Operator semantics over runtime values. Scalars go through
//! `quantel_ast::fold` so evaluation and constant folding agree; arrays apply
//! the same rules per element.

use ndarray::{ArrayD, Ix1, Ix2, IxDyn};
use quantel_ast::fold::{self, FoldError};
use quantel_ast::{BinOp, CmpOp, Literal, UnaryOp};

use crate::value::{ElemKind, Value};

fn fold_message(err: FoldError, op: &str, l: &Value, r: &Value) -> String {
    match err {
        FoldError::Unsupported => format!(
            "unsupported operand types for '{op}': {} and {}",
            l.type_name(),
            r.type_name()
        ),
        other => other.describe().to_string(),
    }
}

pub fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, String> {
    if op.is_logical() {
        let (a, b) = (l.truthy()?, r.truthy()?);
        let out = match op {
            BinOp::And => a && b,
            _ => a || b,
        };
        return Ok(Value::Bool(out));
    }
    if op == BinOp::MatMul {
        return matmul(l, r);
    }

    match (l, r) {
        (Value::Array { .. }, _) | (_, Value::Array { .. }) => {
            elementwise(op.symbol(), l, r, |a, b| fold::binary(op, a, b))
        }
        _ => {
            let (Some(a), Some(b)) = (l.as_literal(), r.as_literal()) else {
                return Err(fold_message(FoldError::Unsupported, op.symbol(), l, r));
            };
            fold::binary(op, &a, &b)
                .map(|lit| Value::from_literal(&lit))
                .map_err(|e| fold_message(e, op.symbol(), l, r))
        }
    }
}

pub fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<Value, String> {
    match (l, r) {
        (Value::Array { .. }, _) | (_, Value::Array { .. }) => {
            elementwise(op.symbol(), l, r, |a, b| fold::compare(op, a, b))
        }
        _ => match (l.as_literal(), r.as_literal()) {
            (Some(a), Some(b)) => fold::compare(op, &a, &b)
                .map(|lit| Value::from_literal(&lit))
                .map_err(|e| fold_message(e, op.symbol(), l, r)),
            // Records, pointers and null only support equality.
            _ => match op {
                CmpOp::Eq => Ok(Value::Bool(l == r)),
                CmpOp::Ne => Ok(Value::Bool(l != r)),
                _ => Err(fold_message(FoldError::Unsupported, op.symbol(), l, r)),
            },
        },
    }
}

pub fn unary(op: UnaryOp, v: &Value) -> Result<Value, String> {
    match v {
        Value::Array { data, kind } => {
            let mut out = Vec::with_capacity(data.len());
            let mut result_kind = None;
            for x in data.iter() {
                let lit = fold::unary(op, &kind.literal(*x)).map_err(|e| e.describe().to_string())?;
                let (y, k) = element_of(&lit)?;
                result_kind = Some(result_kind.map_or(k, |acc: ElemKind| acc.join(k)));
                out.push(y);
            }
            let data = ArrayD::from_shape_vec(data.raw_dim(), out).map_err(|e| e.to_string())?;
            Ok(Value::Array {
                data,
                kind: result_kind.unwrap_or(*kind),
            })
        }
        _ => {
            let Some(lit) = v.as_literal() else {
                return Err(format!(
                    "unsupported operand type for '{}': {}",
                    op.symbol(),
                    v.type_name()
                ));
            };
            fold::unary(op, &lit)
                .map(|out| Value::from_literal(&out))
                .map_err(|e| match e {
                    FoldError::Unsupported => format!(
                        "unsupported operand type for '{}': {}",
                        op.symbol(),
                        v.type_name()
                    ),
                    other => other.describe().to_string(),
                })
        }
    }
}

fn element_of(lit: &Literal) -> Result<(f64, ElemKind), String> {
    Value::from_literal(lit)
        .as_element()
        .ok_or_else(|| "array elements must be numeric or boolean".to_string())
}

/// Apply `f` per element. Shapes must match unless one side is a scalar.
fn elementwise(
    sym: &str,
    l: &Value,
    r: &Value,
    f: impl Fn(&Literal, &Literal) -> Result<Literal, FoldError>,
) -> Result<Value, String> {
    let (shape, pairs): (IxDyn, Vec<(Literal, Literal)>) = match (l, r) {
        (Value::Array { data: a, kind: ka }, Value::Array { data: b, kind: kb }) => {
            if a.shape() != b.shape() {
                return Err(format!(
                    "shape mismatch for '{sym}': {:?} vs {:?}",
                    a.shape(),
                    b.shape()
                ));
            }
            let pairs = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (ka.literal(*x), kb.literal(*y)))
                .collect();
            (a.raw_dim(), pairs)
        }
        (Value::Array { data, kind }, scalar) => {
            let Some(s) = scalar.as_element().map(|(x, k)| k.literal(x)) else {
                return Err(fold_message(FoldError::Unsupported, sym, l, r));
            };
            let pairs = data.iter().map(|x| (kind.literal(*x), s.clone())).collect();
            (data.raw_dim(), pairs)
        }
        (scalar, Value::Array { data, kind }) => {
            let Some(s) = scalar.as_element().map(|(x, k)| k.literal(x)) else {
                return Err(fold_message(FoldError::Unsupported, sym, l, r));
            };
            let pairs = data.iter().map(|x| (s.clone(), kind.literal(*x))).collect();
            (data.raw_dim(), pairs)
        }
        _ => return Err(fold_message(FoldError::Unsupported, sym, l, r)),
    };

    let mut out = Vec::with_capacity(pairs.len());
    let mut kind: Option<ElemKind> = None;
    for (a, b) in &pairs {
        let lit = f(a, b).map_err(|e| fold_message(e, sym, l, r))?;
        let (x, k) = element_of(&lit)?;
        kind = Some(kind.map_or(k, |acc| acc.join(k)));
        out.push(x);
    }
    let kind = kind.unwrap_or(match l {
        Value::Array { kind, .. } => *kind,
        _ => ElemKind::Float,
    });
    let data = ArrayD::from_shape_vec(shape, out).map_err(|e| e.to_string())?;
    Ok(Value::Array { data, kind })
}

/// `@` for vectors and matrices.
pub fn matmul(l: &Value, r: &Value) -> Result<Value, String> {
    let (Value::Array { data: a, kind: ka }, Value::Array { data: b, kind: kb }) = (l, r) else {
        return Err(format!(
            "matrix multiplication requires vector or matrix operands, found {} and {}",
            l.type_name(),
            r.type_name()
        ));
    };
    let kind = match ka.join(*kb) {
        ElemKind::Float => ElemKind::Float,
        _ => ElemKind::Int,
    };
    let inner = |x: usize, y: usize| {
        format!("matrix multiplication: inner dimension mismatch ({x} vs {y})")
    };
    let dim_err = |e: ndarray::ShapeError| e.to_string();

    match (a.ndim(), b.ndim()) {
        (1, 1) => {
            let (a, b) = (
                a.view().into_dimensionality::<Ix1>().map_err(dim_err)?,
                b.view().into_dimensionality::<Ix1>().map_err(dim_err)?,
            );
            if a.len() != b.len() {
                return Err(inner(a.len(), b.len()));
            }
            Ok(Value::from_element(a.dot(&b), kind))
        }
        (2, 1) => {
            let (a, b) = (
                a.view().into_dimensionality::<Ix2>().map_err(dim_err)?,
                b.view().into_dimensionality::<Ix1>().map_err(dim_err)?,
            );
            if a.ncols() != b.len() {
                return Err(inner(a.ncols(), b.len()));
            }
            Ok(Value::Array {
                data: a.dot(&b).into_dyn(),
                kind,
            })
        }
        (1, 2) => {
            let (a, b) = (
                a.view().into_dimensionality::<Ix1>().map_err(dim_err)?,
                b.view().into_dimensionality::<Ix2>().map_err(dim_err)?,
            );
            if a.len() != b.nrows() {
                return Err(inner(a.len(), b.nrows()));
            }
            Ok(Value::Array {
                data: a.dot(&b).into_dyn(),
                kind,
            })
        }
        (2, 2) => {
            let (a, b) = (
                a.view().into_dimensionality::<Ix2>().map_err(dim_err)?,
                b.view().into_dimensionality::<Ix2>().map_err(dim_err)?,
            );
            if a.ncols() != b.nrows() {
                return Err(inner(a.ncols(), b.nrows()));
            }
            Ok(Value::Array {
                data: a.dot(&b).into_dyn(),
                kind,
            })
        }
        (x, y) => Err(format!(
            "matrix multiplication supports only vectors and matrices, found rank {x} and rank {y}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(shape: &[usize], data: Vec<f64>, kind: ElemKind) -> Value {
        Value::Array {
            data: ArrayD::from_shape_vec(IxDyn(shape), data).expect("shape"),
            kind,
        }
    }

    #[test]
    fn integer_division_truncates_and_zero_faults() {
        assert_eq!(binary(BinOp::Div, &Value::Int(7), &Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(
            binary(BinOp::Mod, &Value::Int(1), &Value::Int(0)),
            Err("division by zero".to_string())
        );
    }

    #[test]
    fn strings_concatenate_but_do_not_mix_with_numbers() {
        let s = Value::Str("ab".into());
        assert_eq!(binary(BinOp::Add, &s, &Value::Str("c".into())), Ok(Value::Str("abc".into())));
        let err = binary(BinOp::Add, &s, &Value::Int(1)).expect_err("mixed add");
        assert!(err.contains("string and int32"), "unexpected message: {err}");
    }

    #[test]
    fn arrays_broadcast_scalars_and_check_shapes() {
        let v = array(&[3], vec![1.0, 2.0, 3.0], ElemKind::Int);
        let doubled = binary(BinOp::Mul, &v, &Value::Int(2)).expect("scale");
        assert_eq!(doubled, array(&[3], vec![2.0, 4.0, 6.0], ElemKind::Int));

        let halves = binary(BinOp::Div, &v, &Value::Float(2.0)).expect("divide");
        assert_eq!(halves, array(&[3], vec![0.5, 1.0, 1.5], ElemKind::Float));

        let w = array(&[2], vec![1.0, 1.0], ElemKind::Int);
        assert!(binary(BinOp::Add, &v, &w).is_err());
    }

    #[test]
    fn comparisons_are_elementwise_on_arrays() {
        let v = array(&[3], vec![1.0, 5.0, 3.0], ElemKind::Int);
        let mask = compare(CmpOp::Gt, &v, &Value::Int(2)).expect("compare");
        assert_eq!(mask, array(&[3], vec![0.0, 1.0, 1.0], ElemKind::Bool));
    }

    #[test]
    fn matmul_composes_vectors_and_matrices() {
        let m = array(&[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], ElemKind::Int);
        let v = array(&[3], vec![1.0, 0.0, 1.0], ElemKind::Int);
        assert_eq!(matmul(&m, &v), Ok(array(&[2], vec![4.0, 10.0], ElemKind::Int)));
        assert_eq!(matmul(&v, &v), Ok(Value::Int(2)));

        let err = matmul(&m, &m).expect_err("inner mismatch");
        assert!(err.contains("3 vs 2"), "unexpected message: {err}");
        assert!(matmul(&Value::Int(1), &m).is_err());
    }
}
