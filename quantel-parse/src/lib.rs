#![forbid(unsafe_code)]

mod error;
mod parser;

use miette::IntoDiagnostic;
use quantel_ast::Program;
use quantel_lex::{LexError, Lexer};

pub use error::ParseError;
pub use parser::Parser;

/// Result of a best-effort parse: the recovered AST plus every lexer and
/// parser error encountered along the way.
#[derive(Debug)]
pub struct Parsed {
    pub program: Program,
    pub lex_errors: Vec<LexError>,
    pub parse_errors: Vec<ParseError>,
}

impl Parsed {
    pub fn is_clean(&self) -> bool {
        self.lex_errors.is_empty() && self.parse_errors.is_empty()
    }

    /// Lexer diagnostics first, then parser diagnostics, each in source order.
    pub fn diagnostics(&self) -> Vec<quantel_ast::Diagnostic> {
        self.lex_errors
            .iter()
            .map(LexError::diagnostic)
            .chain(self.parse_errors.iter().map(ParseError::diagnostic))
            .collect()
    }
}

/// Parse `src`, failing on the first lexer or parser error.
pub fn parse_source(src: &str) -> miette::Result<Program> {
    let mut lexed = Lexer::new(src).lex();
    if !lexed.errors.is_empty() {
        return Err(lexed.errors.remove(0)).into_diagnostic();
    }
    let mut parser = Parser::new(&lexed.tokens);
    parser.parse_program().into_diagnostic()
}

/// Parse a source file while attempting to recover from errors.
///
/// Illegal characters are skipped by the lexer, malformed statements by the
/// parser; the returned AST contains everything that parsed.
pub fn parse_source_with_recovery(src: &str) -> Parsed {
    let lexed = Lexer::new(src).lex();
    let mut parser = Parser::new(&lexed.tokens);
    let (program, parse_errors) = parser.parse_program_with_recovery();
    Parsed {
        program,
        lex_errors: lexed.errors,
        parse_errors,
    }
}

pub fn parse_expr(src: &str) -> miette::Result<quantel_ast::Expr> {
    let lexed = Lexer::new(src).lex();
    if let Some(err) = lexed.errors.into_iter().next() {
        return Err(err).into_diagnostic();
    }
    let mut parser = Parser::new(&lexed.tokens);
    parser.parse_expr_eof().into_diagnostic()
}
