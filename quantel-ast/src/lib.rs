#![forbid(unsafe_code)]

use std::fmt;

use miette::SourceSpan;

mod diagnostic;
pub mod fold;

pub use diagnostic::{Diagnostic, Phase};

pub type Span = SourceSpan;

pub fn span(start: usize, len: usize) -> Span {
    SourceSpan::new(start.into(), len)
}

pub fn span_between(start: usize, end: usize) -> Span {
    debug_assert!(end >= start);
    span(start, end - start)
}

/// Byte span plus the 1-based line the node starts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Loc {
    pub span: Span,
    pub line: usize,
}

impl Loc {
    pub fn new(span: Span, line: usize) -> Self {
        Self { span, line }
    }

    /// Covers `self` through `end`, keeping the starting line.
    pub fn to(self, end: Loc) -> Loc {
        let a0: usize = self.span.offset();
        let b0: usize = end.span.offset();
        let a1 = a0 + self.span.len();
        let b1 = b0 + end.span.len();
        let start = a0.min(b0);
        let stop = a1.max(b1);
        Loc {
            span: span_between(start, stop),
            line: self.line.min(end.line),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub loc: Loc,
    pub node: T,
}

impl<T> Spanned<T> {
    pub fn new(loc: Loc, node: T) -> Self {
        Self { loc, node }
    }
}

pub type Ident = Spanned<String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub imports: Vec<Import>,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub loc: Loc,
    pub name: Ident,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Block(Block),
    VarDecl(VarDecl),
    PointerDecl(PointerDecl),
    RecordDecl(RecordDecl),
    FuncDecl(FuncDecl),
    Assign(Assign),
    If(IfStmt),
    While(WhileStmt),
    RepeatUntil(RepeatUntilStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Break(Loc),
    Continue(Loc),
    Probe(ProbeStmt),
    Expr(Expr),
}

impl Stmt {
    pub fn loc(&self) -> Loc {
        match self {
            Stmt::Block(b) => b.loc,
            Stmt::VarDecl(d) => d.loc,
            Stmt::PointerDecl(d) => d.loc,
            Stmt::RecordDecl(d) => d.loc,
            Stmt::FuncDecl(f) => f.loc,
            Stmt::Assign(a) => a.loc,
            Stmt::If(i) => i.loc,
            Stmt::While(w) => w.loc,
            Stmt::RepeatUntil(r) => r.loc,
            Stmt::For(f) => f.loc,
            Stmt::Return(r) => r.loc,
            Stmt::Break(loc) | Stmt::Continue(loc) => *loc,
            Stmt::Probe(p) => p.loc,
            Stmt::Expr(e) => e.loc,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub loc: Loc,
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Float16,
    Float32,
    Float64,
    Int32,
    Int64,
    Bool,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Bool => "bool",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::Float16 | DType::Float32 | DType::Float64)
    }

    pub fn is_int(self) -> bool {
        matches!(self, DType::Int32 | DType::Int64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Scalar,
    Vector,
    Matrix,
    Tensor,
}

impl ShapeKind {
    /// Rank required by the kind; `None` for tensors (any rank >= 1).
    pub fn rank(self) -> Option<usize> {
        match self {
            ShapeKind::Scalar => Some(0),
            ShapeKind::Vector => Some(1),
            ShapeKind::Matrix => Some(2),
            ShapeKind::Tensor => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ShapeKind::Scalar => "scalar",
            ShapeKind::Vector => "vector",
            ShapeKind::Matrix => "matrix",
            ShapeKind::Tensor => "tensor",
        }
    }
}

/// Declared shape, e.g. `matrix<2,3>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeType {
    pub loc: Loc,
    pub kind: ShapeKind,
    pub dims: Vec<usize>,
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.keyword())?;
        if self.kind != ShapeKind::Scalar {
            let dims = self
                .dims
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "<{dims}>")?;
        }
        Ok(())
    }
}

/// A concrete element type plus shape, or a record name.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeSpec {
    Builtin { dtype: DType, shape: ShapeType },
    Record(Ident),
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Builtin { dtype, shape } => write!(f, "{dtype} {shape}"),
            TypeSpec::Record(name) => f.write_str(&name.node),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeclType {
    Spec(TypeSpec),
    /// `auto x = ...;`
    Auto,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub loc: Loc,
    pub ty: DeclType,
    pub name: Ident,
    pub init: Option<Expr>,
}

/// `float32 scalar *p = &x;`
#[derive(Clone, Debug, PartialEq)]
pub struct PointerDecl {
    pub loc: Loc,
    pub dtype: DType,
    pub shape: ShapeType,
    pub name: Ident,
    pub target: Ident,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordDecl {
    pub loc: Loc,
    pub name: Ident,
    pub fields: Vec<VarDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncParam {
    pub loc: Loc,
    pub ty: TypeSpec,
    pub name: Ident,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub loc: Loc,
    pub name: Ident,
    pub params: Vec<FuncParam>,
    pub ret: TypeSpec,
    pub body: Block,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    MatMul,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::MatMul => "@=",
        }
    }

    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
            AssignOp::MatMul => Some(BinOp::MatMul),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assign {
    pub loc: Loc,
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub loc: Loc,
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WhileStmt {
    pub loc: Loc,
    pub cond: Expr,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RepeatUntilStmt {
    pub loc: Loc,
    pub body: Block,
    pub cond: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    pub loc: Loc,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForStmt {
    pub loc: Loc,
    pub var: Ident,
    pub range: Range,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub loc: Loc,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProbeStmt {
    pub loc: Loc,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub loc: Loc,
    pub kind: ExprKind,
}

impl Expr {
    pub fn literal(loc: Loc, lit: Literal) -> Self {
        Self {
            loc,
            kind: ExprKind::Literal(lit),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.kind {
            ExprKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Name of the variable an assignment target writes through, if any.
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(id) => Some(&id.node),
            ExprKind::Index { base, .. } | ExprKind::Member { base, .. } => base.root_name(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Ident),
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        op: CmpOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
    /// `x[i]`, `x[i, j]`, `x[a..b]`
    Index {
        base: Box<Expr>,
        index: Index,
    },
    /// `r.field`
    Member {
        base: Box<Expr>,
        field: Ident,
    },
    Array(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Index {
    Elements(Vec<Expr>),
    Slice(Slice),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Slice {
    pub loc: Loc,
    pub start: Box<Expr>,
    pub end: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Literal {
    pub fn truthy(&self) -> bool {
        match self {
            Literal::Int(n) => *n != 0,
            Literal::Float(x) => *x != 0.0,
            Literal::Str(s) => !s.is_empty(),
            Literal::Bool(b) => *b,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// Source-like rendering; strings are quoted.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write!(f, "\"{s}\""),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `&x`
    AddrOf,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::AddrOf => "&",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    MatMul,

    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::MatMul => "@",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(start: usize, len: usize, line: usize) -> Loc {
        Loc::new(span(start, len), line)
    }

    #[test]
    fn loc_join_covers_both_ends() {
        let joined = loc(4, 2, 2).to(loc(10, 3, 3));
        assert_eq!(joined.span.offset(), 4);
        assert_eq!(joined.span.len(), 9);
        assert_eq!(joined.line, 2);
    }

    #[test]
    fn shape_type_renders_like_source() {
        let m = ShapeType {
            loc: loc(0, 0, 1),
            kind: ShapeKind::Matrix,
            dims: vec![2, 3],
        };
        assert_eq!(m.to_string(), "matrix<2,3>");
        let s = ShapeType {
            loc: loc(0, 0, 1),
            kind: ShapeKind::Scalar,
            dims: vec![],
        };
        assert_eq!(s.to_string(), "scalar");
    }

    #[test]
    fn literal_display_quotes_strings_and_keeps_float_point() {
        assert_eq!(Literal::Str("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Literal::Float(3.0).to_string(), "3.0");
        assert_eq!(Literal::Int(-4).to_string(), "-4");
    }

    #[test]
    fn root_name_walks_through_index_and_member() {
        let base = Expr {
            loc: loc(0, 1, 1),
            kind: ExprKind::Ident(Ident::new(loc(0, 1, 1), "m".into())),
        };
        let idx = Expr {
            loc: loc(0, 4, 1),
            kind: ExprKind::Index {
                base: Box::new(base),
                index: Index::Elements(vec![Expr::literal(loc(2, 1, 1), Literal::Int(0))]),
            },
        };
        assert_eq!(idx.root_name(), Some("m"));
    }
}
