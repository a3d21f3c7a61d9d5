#![forbid(unsafe_code)]

use quantel_ast::DType;

/// Static element type of a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Unknown,
    Void,
    Bool,
    Int32,
    Int64,
    Float16,
    Float32,
    Float64,
    String,
    Record(String),
    Pointer(Box<Type>),
}

/// Coarse grouping used for compatibility checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Integer,
    Float,
    Bool,
    String,
    Record,
    Pointer,
    Void,
}

impl Family {
    pub fn is_numeric(self) -> bool {
        matches!(self, Family::Integer | Family::Float)
    }
}

impl Type {
    pub fn from_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float16 => Type::Float16,
            DType::Float32 => Type::Float32,
            DType::Float64 => Type::Float64,
            DType::Int32 => Type::Int32,
            DType::Int64 => Type::Int64,
            DType::Bool => Type::Bool,
        }
    }

    /// `None` for `Unknown`, which is compatible with everything.
    pub fn family(&self) -> Option<Family> {
        Some(match self {
            Type::Unknown => return None,
            Type::Void => Family::Void,
            Type::Bool => Family::Bool,
            Type::Int32 | Type::Int64 => Family::Integer,
            Type::Float16 | Type::Float32 | Type::Float64 => Family::Float,
            Type::String => Family::String,
            Type::Record(_) => Family::Record,
            Type::Pointer(_) => Family::Pointer,
        })
    }

    /// Whether a value of type `value` may be stored in a slot of type `self`.
    pub fn accepts(&self, value: &Type) -> bool {
        match (self, value) {
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            (Type::Record(a), Type::Record(b)) => a == b,
            (Type::Pointer(a), Type::Pointer(b)) => a.accepts(b),
            _ => match (self.family(), value.family()) {
                (Some(Family::Void), _) | (_, Some(Family::Void)) => false,
                (Some(Family::Float), Some(Family::Integer)) => true,
                (Some(a), Some(b)) => a == b,
                _ => true,
            },
        }
    }

    /// Result type of mixing two numeric types: floats win, then width.
    pub fn widen(&self, other: &Type) -> Type {
        fn rank(t: &Type) -> u8 {
            match t {
                Type::Int32 => 1,
                Type::Int64 => 2,
                Type::Float16 => 3,
                Type::Float32 => 4,
                Type::Float64 => 5,
                _ => 0,
            }
        }
        if rank(other) > rank(self) {
            other.clone()
        } else {
            self.clone()
        }
    }

    pub fn display(&self) -> String {
        match self {
            Type::Unknown => "unknown".to_string(),
            Type::Void => "void".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int32 => "int32".to_string(),
            Type::Int64 => "int64".to_string(),
            Type::Float16 => "float16".to_string(),
            Type::Float32 => "float32".to_string(),
            Type::Float64 => "float64".to_string(),
            Type::String => "string".to_string(),
            Type::Record(name) => name.clone(),
            Type::Pointer(inner) => format!("{}*", inner.display()),
        }
    }
}

/// Extents of a value; empty for scalars.
pub type Shape = Vec<usize>;

/// Source-like rendering of a shape, e.g. `matrix<2,3>`.
pub fn shape_display(shape: &[usize]) -> String {
    let dims = shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");
    match shape.len() {
        0 => "scalar".to_string(),
        1 => format!("vector<{dims}>"),
        2 => format!("matrix<{dims}>"),
        _ => format!("tensor<{dims}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_widen_into_floats_but_not_back() {
        assert!(Type::Float32.accepts(&Type::Int32));
        assert!(!Type::Int32.accepts(&Type::Float64));
        assert!(Type::Int32.accepts(&Type::Int64));
        assert!(!Type::String.accepts(&Type::Bool));
        assert!(Type::Bool.accepts(&Type::Unknown));
        assert!(!Type::Int32.accepts(&Type::Void));
    }

    #[test]
    fn records_and_pointers_compare_structurally() {
        let p = Type::Record("Point".into());
        assert!(p.accepts(&Type::Record("Point".into())));
        assert!(!p.accepts(&Type::Record("Line".into())));
        let fp = Type::Pointer(Box::new(Type::Float32));
        assert!(fp.accepts(&Type::Pointer(Box::new(Type::Int32))));
        assert_eq!(fp.display(), "float32*");
    }

    #[test]
    fn widening_prefers_floats() {
        assert_eq!(Type::Int64.widen(&Type::Float16), Type::Float16);
        assert_eq!(Type::Int32.widen(&Type::Int64), Type::Int64);
        assert_eq!(Type::Float64.widen(&Type::Int32), Type::Float64);
    }

    #[test]
    fn shapes_render_by_rank() {
        assert_eq!(shape_display(&[]), "scalar");
        assert_eq!(shape_display(&[3]), "vector<3>");
        assert_eq!(shape_display(&[2, 3]), "matrix<2,3>");
        assert_eq!(shape_display(&[2, 3, 4]), "tensor<2,3,4>");
    }
}
