#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use quantel_ast::{Phase, Span};
use thiserror::Error;

#[derive(Clone, Debug, Error, Diagnostic)]
#[error("runtime error: {message}")]
#[diagnostic(code(quantel::runtime))]
#[allow(unused_assignments)]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
    /// Operator being evaluated when the error was raised, if any.
    pub op: Option<String>,
    #[label]
    pub span: Span,
}

impl RuntimeError {
    pub fn diagnostic(&self) -> quantel_ast::Diagnostic {
        quantel_ast::Diagnostic {
            phase: Phase::Runtime,
            message: self.message.clone(),
            hint: self.op.as_ref().map(|op| format!("while evaluating '{op}'")),
            line: self.line,
        }
    }
}
