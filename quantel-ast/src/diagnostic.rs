#![forbid(unsafe_code)]

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lex,
    Syntax,
    Semantic,
    Runtime,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Lex => "Lexer Error",
            Phase::Syntax => "Syntax Error",
            Phase::Semantic => "Semantic Error",
            Phase::Runtime => "Runtime Error",
        }
    }
}

/// Phase-neutral error record handed to whatever renders diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub phase: Phase,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub line: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] line {}: {}", self.phase.label(), self.line, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}
