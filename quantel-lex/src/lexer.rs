#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use logos::Logos;
use miette::Diagnostic;
use quantel_ast::{span_between, DType, Phase, ShapeKind, Span};
use thiserror::Error;

use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(quantel::lex))]
#[allow(unused_assignments)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    #[label]
    pub span: Span,
}

impl LexError {
    /// Byte offset of the offending text.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }

    pub fn diagnostic(&self) -> quantel_ast::Diagnostic {
        quantel_ast::Diagnostic {
            phase: Phase::Lex,
            message: self.message.clone(),
            hint: None,
            line: self.line,
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("\n")]
    Newline,
    #[token("/*", block_comment)]
    BlockComment(CommentEnd),

    #[token("import")]
    KwImport,
    #[token("func")]
    KwFunc,
    #[token("return")]
    KwReturn,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("in")]
    KwIn,
    #[token("step")]
    KwStep,
    #[token("while")]
    KwWhile,
    #[token("repeat")]
    KwRepeat,
    #[token("until")]
    KwUntil,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("probe")]
    KwProbe,
    #[token("record")]
    KwRecord,
    #[token("auto")]
    KwAuto,

    #[token("float16")]
    Float16,
    #[token("float32")]
    Float32,
    #[token("float64")]
    Float64,
    #[token("int32")]
    Int32,
    #[token("int64")]
    Int64,
    #[token("bool")]
    BoolType,

    #[token("scalar")]
    Scalar,
    #[token("vector")]
    Vector,
    #[token("matrix")]
    Matrix,
    #[token("tensor")]
    Tensor,

    #[token("true")]
    True,
    #[token("false")]
    False,

    #[token("->")]
    Arrow,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("@=")]
    AtEq,
    #[token("=")]
    Eq,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("@")]
    At,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,

    #[regex(r"[0-9]+", number)]
    Number(NumberKind),

    // Only `\"` is an escape; any other backslash pair is kept verbatim.
    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    String,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NumberKind {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CommentEnd {
    Closed,
    Unterminated,
}

/// Consume everything up to and including the next `*/`, or the rest of the
/// input when there is none.
fn block_comment(lex: &mut logos::Lexer<RawToken>) -> CommentEnd {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(at) => {
            lex.bump(at + 2);
            CommentEnd::Closed
        }
        None => {
            lex.bump(rest.len());
            CommentEnd::Unterminated
        }
    }
}

/// `\d+` optionally extended by `.\d+`; a dot not followed by a digit is left
/// for the range operator (`0..5`).
fn number(lex: &mut logos::Lexer<RawToken>) -> NumberKind {
    let rest = lex.remainder();
    if let Some(frac) = rest.strip_prefix('.') {
        let digits = frac.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            lex.bump(1 + digits);
            return NumberKind::Float;
        }
    }
    NumberKind::Int
}

/// Tokens plus every illegal character that was skipped.
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    /// Scan the whole source. Never fails: an unrecognized character is
    /// recorded, skipped, and scanning resumes right after it.
    pub fn lex(&self) -> LexOutput {
        let mut out = LexOutput::default();
        let mut line = 1usize;
        let mut base = 0usize;

        'scan: loop {
            let mut lex = RawToken::lexer(&self.src[base..]);
            while let Some(raw) = lex.next() {
                let range = lex.span();
                let start = base + range.start;
                let end = base + range.end;
                let slice = lex.slice();

                let raw = match raw {
                    Ok(raw) => raw,
                    Err(()) => {
                        // Restart one character later so a failed partial
                        // match never swallows more than the bad character.
                        let Some(ch) = self.src[start..].chars().next() else {
                            break 'scan;
                        };
                        out.errors.push(LexError {
                            message: format!("Illegal character '{ch}'"),
                            line,
                            span: span_between(start, start + ch.len_utf8()),
                        });
                        base = start + ch.len_utf8();
                        continue 'scan;
                    }
                };

                let kind = match raw {
                    RawToken::Newline => {
                        line += 1;
                        continue;
                    }
                    RawToken::BlockComment(end) => {
                        if end == CommentEnd::Unterminated {
                            out.errors.push(LexError {
                                message: "unterminated block comment".to_string(),
                                line,
                                span: span_between(start, start + 2),
                            });
                        }
                        line += slice.matches('\n').count();
                        continue;
                    }
                    RawToken::Number(NumberKind::Int) => match slice.parse::<i64>() {
                        Ok(n) => TokenKind::Int(n),
                        Err(_) => {
                            out.errors.push(LexError {
                                message: format!("integer literal '{slice}' is out of range"),
                                line,
                                span: span_between(start, end),
                            });
                            continue;
                        }
                    },
                    RawToken::Number(NumberKind::Float) => match slice.parse::<f64>() {
                        Ok(x) => TokenKind::Float(x),
                        Err(_) => {
                            out.errors.push(LexError {
                                message: format!("invalid float literal '{slice}'"),
                                line,
                                span: span_between(start, end),
                            });
                            continue;
                        }
                    },
                    RawToken::String => TokenKind::String(unescape(slice)),
                    RawToken::Ident => TokenKind::Ident(slice.to_string()),
                    other => keyword_or_punct(other),
                };

                out.tokens.push(Token {
                    kind,
                    span: span_between(start, end),
                    line,
                });
            }
            break;
        }

        out.tokens.push(Token {
            kind: TokenKind::Eof,
            span: span_between(self.src.len(), self.src.len()),
            line,
        });

        out
    }
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len().saturating_sub(1)];
    inner.replace("\\\"", "\"")
}

fn keyword_or_punct(raw: RawToken) -> TokenKind {
    match raw {
        RawToken::KwImport => TokenKind::KwImport,
        RawToken::KwFunc => TokenKind::KwFunc,
        RawToken::KwReturn => TokenKind::KwReturn,
        RawToken::KwIf => TokenKind::KwIf,
        RawToken::KwElse => TokenKind::KwElse,
        RawToken::KwFor => TokenKind::KwFor,
        RawToken::KwIn => TokenKind::KwIn,
        RawToken::KwStep => TokenKind::KwStep,
        RawToken::KwWhile => TokenKind::KwWhile,
        RawToken::KwRepeat => TokenKind::KwRepeat,
        RawToken::KwUntil => TokenKind::KwUntil,
        RawToken::KwBreak => TokenKind::KwBreak,
        RawToken::KwContinue => TokenKind::KwContinue,
        RawToken::KwProbe => TokenKind::KwProbe,
        RawToken::KwRecord => TokenKind::KwRecord,
        RawToken::KwAuto => TokenKind::KwAuto,

        RawToken::Float16 => TokenKind::DType(DType::Float16),
        RawToken::Float32 => TokenKind::DType(DType::Float32),
        RawToken::Float64 => TokenKind::DType(DType::Float64),
        RawToken::Int32 => TokenKind::DType(DType::Int32),
        RawToken::Int64 => TokenKind::DType(DType::Int64),
        RawToken::BoolType => TokenKind::DType(DType::Bool),

        RawToken::Scalar => TokenKind::Shape(ShapeKind::Scalar),
        RawToken::Vector => TokenKind::Shape(ShapeKind::Vector),
        RawToken::Matrix => TokenKind::Shape(ShapeKind::Matrix),
        RawToken::Tensor => TokenKind::Shape(ShapeKind::Tensor),

        RawToken::True => TokenKind::Bool(true),
        RawToken::False => TokenKind::Bool(false),

        RawToken::Arrow => TokenKind::Arrow,
        RawToken::DotDot => TokenKind::DotDot,
        RawToken::Dot => TokenKind::Dot,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::Neq => TokenKind::Neq,
        RawToken::Le => TokenKind::Le,
        RawToken::Ge => TokenKind::Ge,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gt => TokenKind::Gt,
        RawToken::PlusEq => TokenKind::PlusEq,
        RawToken::MinusEq => TokenKind::MinusEq,
        RawToken::StarEq => TokenKind::StarEq,
        RawToken::SlashEq => TokenKind::SlashEq,
        RawToken::AtEq => TokenKind::AtEq,
        RawToken::Eq => TokenKind::Eq,
        RawToken::AndAnd => TokenKind::AndAnd,
        RawToken::OrOr => TokenKind::OrOr,
        RawToken::Bang => TokenKind::Bang,
        RawToken::Amp => TokenKind::Amp,
        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,
        RawToken::Caret => TokenKind::Caret,
        RawToken::At => TokenKind::At,
        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Semi => TokenKind::Semi,

        // Handled by the scan loop before dispatch.
        RawToken::Newline
        | RawToken::BlockComment(_)
        | RawToken::Number(_)
        | RawToken::String
        | RawToken::Ident => TokenKind::Eof,
    }
}
