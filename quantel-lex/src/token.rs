#![forbid(unsafe_code)]

use std::fmt;

use quantel_ast::{DType, ShapeKind, Span};

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwImport,
    KwFunc,
    KwReturn,
    KwIf,
    KwElse,
    KwFor,
    KwIn,
    KwStep,
    KwWhile,
    KwRepeat,
    KwUntil,
    KwBreak,
    KwContinue,
    KwProbe,
    KwRecord,
    KwAuto,

    // Type keywords
    DType(DType),
    Shape(ShapeKind),

    // Operators / punctuation
    Arrow,
    DotDot,
    Dot,
    EqEq,
    Neq,
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    AtEq,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    At,

    AndAnd,
    OrOr,
    Bang,
    Amp,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,

    Eof,

    // Literals / identifiers
    Ident(String),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

/// Statement-leading keywords, used for typo suggestions.
pub const KEYWORDS: &[&str] = &[
    "import", "func", "return", "if", "else", "for", "in", "step", "while", "repeat", "until",
    "break", "continue", "probe", "record", "auto", "scalar", "vector", "matrix", "tensor",
    "float16", "float32", "float64", "int32", "int64", "bool",
];

impl TokenKind {
    /// Token name as it is listed in a token dump.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::KwImport => "IMPORT",
            TokenKind::KwFunc => "FUNC",
            TokenKind::KwReturn => "RETURN",
            TokenKind::KwIf => "IF",
            TokenKind::KwElse => "ELSE",
            TokenKind::KwFor => "FOR",
            TokenKind::KwIn => "IN",
            TokenKind::KwStep => "STEP",
            TokenKind::KwWhile => "WHILE",
            TokenKind::KwRepeat => "REPEAT",
            TokenKind::KwUntil => "UNTIL",
            TokenKind::KwBreak => "BREAK",
            TokenKind::KwContinue => "CONTINUE",
            TokenKind::KwProbe => "PROBE",
            TokenKind::KwRecord => "RECORD",
            TokenKind::KwAuto => "AUTO",
            TokenKind::DType(_) => "DTYPE",
            TokenKind::Shape(ShapeKind::Scalar) => "SCALAR",
            TokenKind::Shape(ShapeKind::Vector) => "VECTOR",
            TokenKind::Shape(ShapeKind::Matrix) => "MATRIX",
            TokenKind::Shape(ShapeKind::Tensor) => "TENSOR",
            TokenKind::Arrow => "ARROW",
            TokenKind::DotDot => "RANGE",
            TokenKind::Dot => "DOT",
            TokenKind::EqEq => "EQ",
            TokenKind::Neq => "NE",
            TokenKind::Le => "LE",
            TokenKind::Ge => "GE",
            TokenKind::Lt => "LT",
            TokenKind::Gt => "GT",
            TokenKind::Eq => "ASSIGN",
            TokenKind::PlusEq => "PLUS_ASSIGN",
            TokenKind::MinusEq => "MINUS_ASSIGN",
            TokenKind::StarEq => "TIMES_ASSIGN",
            TokenKind::SlashEq => "DIVIDE_ASSIGN",
            TokenKind::AtEq => "MATMUL_ASSIGN",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "TIMES",
            TokenKind::Slash => "DIVIDE",
            TokenKind::Percent => "MOD",
            TokenKind::Caret => "POWER",
            TokenKind::At => "MATMUL",
            TokenKind::AndAnd => "AND",
            TokenKind::OrOr => "OR",
            TokenKind::Bang => "NOT",
            TokenKind::Amp => "AMPERSAND",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Semi => "SEMI",
            TokenKind::Eof => "EOF",
            TokenKind::Ident(_) => "ID",
            TokenKind::Int(_) => "INT",
            TokenKind::Float(_) => "FLOAT",
            TokenKind::String(_) => "STRING",
            TokenKind::Bool(_) => "BOOL",
        }
    }

    pub fn is_binary_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Caret
                | TokenKind::At
                | TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::EqEq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Le
                | TokenKind::Ge
        )
    }
}

/// Source form of the token, for diagnostics.
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::KwImport => "import",
            TokenKind::KwFunc => "func",
            TokenKind::KwReturn => "return",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwFor => "for",
            TokenKind::KwIn => "in",
            TokenKind::KwStep => "step",
            TokenKind::KwWhile => "while",
            TokenKind::KwRepeat => "repeat",
            TokenKind::KwUntil => "until",
            TokenKind::KwBreak => "break",
            TokenKind::KwContinue => "continue",
            TokenKind::KwProbe => "probe",
            TokenKind::KwRecord => "record",
            TokenKind::KwAuto => "auto",
            TokenKind::DType(d) => d.name(),
            TokenKind::Shape(s) => s.keyword(),
            TokenKind::Arrow => "->",
            TokenKind::DotDot => "..",
            TokenKind::Dot => ".",
            TokenKind::EqEq => "==",
            TokenKind::Neq => "!=",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::AtEq => "@=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::At => "@",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Eof => "end of input",
            TokenKind::Ident(name) => return write!(f, "{name}"),
            TokenKind::Int(n) => return write!(f, "{n}"),
            TokenKind::Float(x) => return write!(f, "{x:?}"),
            TokenKind::String(s) => return write!(f, "\"{s}\""),
            TokenKind::Bool(b) => return write!(f, "{b}"),
        };
        f.write_str(s)
    }
}
