#![forbid(unsafe_code)]

mod error;
mod sema;
mod types;

pub use error::SemanticError;
pub use sema::{AnalysisReport, Analyzer, Category, Field, Symbol};
pub use types::{shape_display, Family, Shape, Type};

/// Run one analysis pass over `program`.
pub fn analyze(program: &quantel_ast::Program) -> AnalysisReport {
    Analyzer::new().analyze_program(program)
}
