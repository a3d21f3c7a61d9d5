#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, Axis};
use quantel_ast::Literal;

/// Element kind of an array; the storage itself is always `f64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemKind {
    Int,
    Float,
    Bool,
}

impl ElemKind {
    pub fn name(self) -> &'static str {
        match self {
            ElemKind::Int => "int32",
            ElemKind::Float => "float32",
            ElemKind::Bool => "bool",
        }
    }

    /// Kind able to hold elements of both `self` and `other`.
    pub fn join(self, other: ElemKind) -> ElemKind {
        match (self, other) {
            (ElemKind::Float, _) | (_, ElemKind::Float) => ElemKind::Float,
            (ElemKind::Bool, ElemKind::Bool) => ElemKind::Bool,
            _ => ElemKind::Int,
        }
    }

    pub(crate) fn literal(self, x: f64) -> Literal {
        match self {
            ElemKind::Int => Literal::Int(x as i64),
            ElemKind::Float => Literal::Float(x),
            ElemKind::Bool => Literal::Bool(x != 0.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array { data: ArrayD<f64>, kind: ElemKind },
    Record {
        type_name: String,
        fields: BTreeMap<String, Value>,
    },
    /// Simulated address token, e.g. `0x1000`.
    Pointer(String),
    /// Declared but never assigned.
    Null,
}

impl Value {
    pub fn from_literal(lit: &Literal) -> Value {
        match lit {
            Literal::Int(n) => Value::Int(*n),
            Literal::Float(x) => Value::Float(*x),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::Int(n) => Some(Literal::Int(*n)),
            Value::Float(x) => Some(Literal::Float(*x)),
            Value::Str(s) => Some(Literal::Str(s.clone())),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            _ => None,
        }
    }

    /// Numeric scalar as an array element.
    pub(crate) fn as_element(&self) -> Option<(f64, ElemKind)> {
        match self {
            Value::Int(n) => Some((*n as f64, ElemKind::Int)),
            Value::Float(x) => Some((*x, ElemKind::Float)),
            Value::Bool(b) => Some((if *b { 1.0 } else { 0.0 }, ElemKind::Bool)),
            _ => None,
        }
    }

    pub(crate) fn from_element(x: f64, kind: ElemKind) -> Value {
        Value::from_literal(&kind.literal(x))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Int(_) => "int32".into(),
            Value::Float(_) => "float32".into(),
            Value::Bool(_) => "bool".into(),
            Value::Str(_) => "string".into(),
            Value::Array { kind, .. } => kind.name().into(),
            Value::Record { type_name, .. } => type_name.clone(),
            Value::Pointer(_) => "pointer".into(),
            Value::Null => "null".into(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Array { data, .. } => data.shape().to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn truthy(&self) -> Result<bool, String> {
        match self {
            Value::Int(n) => Ok(*n != 0),
            Value::Float(x) => Ok(*x != 0.0),
            Value::Bool(b) => Ok(*b),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::Array { data, .. } => match data.len() {
                1 => Ok(data.iter().any(|x| *x != 0.0)),
                n => Err(format!(
                    "the truth value of an array with {n} elements is ambiguous"
                )),
            },
            Value::Record { .. } => Ok(true),
            Value::Pointer(addr) => Ok(addr != "0x0"),
            Value::Null => Ok(false),
        }
    }
}

/// `scalar`, `vector<3>`, `matrix<2,3>`, `tensor<2,2,2>`.
pub fn shape_text(shape: &[usize]) -> String {
    let kind = match shape.len() {
        0 => return "scalar".to_string(),
        1 => "vector",
        2 => "matrix",
        _ => "tensor",
    };
    let dims = shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{kind}<{dims}>")
}

fn write_element(f: &mut fmt::Formatter<'_>, x: f64, kind: ElemKind) -> fmt::Result {
    match kind {
        ElemKind::Int => write!(f, "{}", x as i64),
        ElemKind::Float => write!(f, "{x:?}"),
        ElemKind::Bool => write!(f, "{}", x != 0.0),
    }
}

fn write_array(f: &mut fmt::Formatter<'_>, data: ndarray::ArrayViewD<'_, f64>, kind: ElemKind) -> fmt::Result {
    if data.ndim() == 0 {
        return match data.iter().next() {
            Some(x) => write_element(f, *x, kind),
            None => Ok(()),
        };
    }
    f.write_str("[")?;
    for (i, sub) in data.axis_iter(Axis(0)).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_array(f, sub, kind)?;
    }
    f.write_str("]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Array { data, kind } => write_array(f, data.view(), *kind),
            Value::Record { type_name, fields } => {
                write!(f, "{type_name} {{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{name}: {v}")?;
                }
                if !fields.is_empty() {
                    f.write_str(" ")?;
                }
                f.write_str("}")
            }
            Value::Pointer(addr) => f.write_str(addr),
            Value::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn arrays_render_nested_by_kind() {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).expect("shape");
        let ints = Value::Array {
            data: data.clone(),
            kind: ElemKind::Int,
        };
        assert_eq!(ints.to_string(), "[[1, 2], [3, 4]]");
        let floats = Value::Array {
            data,
            kind: ElemKind::Float,
        };
        assert_eq!(floats.to_string(), "[[1.0, 2.0], [3.0, 4.0]]");
        assert_eq!(floats.type_name(), "float32");
    }

    #[test]
    fn records_and_scalars_render() {
        let mut fields = BTreeMap::new();
        fields.insert("x".to_string(), Value::Float(1.5));
        fields.insert("y".to_string(), Value::Null);
        let p = Value::Record {
            type_name: "Point".into(),
            fields,
        };
        assert_eq!(p.to_string(), "Point { x: 1.5, y: null }");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
    }

    #[test]
    fn shape_text_names_rank() {
        assert_eq!(shape_text(&[]), "scalar");
        assert_eq!(shape_text(&[3]), "vector<3>");
        assert_eq!(shape_text(&[2, 3]), "matrix<2,3>");
        assert_eq!(shape_text(&[2, 2, 2]), "tensor<2,2,2>");
    }

    #[test]
    fn only_single_element_arrays_have_a_truth_value() {
        let one = Value::Array {
            data: ArrayD::from_elem(IxDyn(&[1]), 2.0),
            kind: ElemKind::Int,
        };
        assert_eq!(one.truthy(), Ok(true));
        let many = Value::Array {
            data: ArrayD::zeros(IxDyn(&[3])),
            kind: ElemKind::Float,
        };
        assert!(many.truthy().is_err());
    }
}
