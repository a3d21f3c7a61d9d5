#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use quantel_ast::{Phase, Span};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("parse error: {message}")]
#[diagnostic(code(quantel::parse))]
#[allow(unused_assignments)]
pub struct ParseError {
    pub message: String,
    #[help]
    pub hint: Option<String>,
    pub line: usize,
    #[label]
    pub span: Span,
}

impl ParseError {
    pub fn diagnostic(&self) -> quantel_ast::Diagnostic {
        quantel_ast::Diagnostic {
            phase: Phase::Syntax,
            message: self.message.clone(),
            hint: self.hint.clone(),
            line: self.line,
        }
    }
}
