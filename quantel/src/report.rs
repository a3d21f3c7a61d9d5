#![forbid(unsafe_code)]

//! JSON-serializable views of pipeline results.

use quantel_ast::Diagnostic;
use quantel_core::Symbol;
use quantel_interpret::{MemoryEntry, ProbeReport};
use quantel_lex::{LexOutput, Token};
use serde::Serialize;

use crate::{Compilation, Execution, OptimizerSummary};

pub const TOKENS_SCHEMA: &str = "quantel.tokens.v1";
pub const PIPELINE_SCHEMA: &str = "quantel.pipeline.v1";

#[derive(Debug, Clone, Serialize)]
pub struct TokenRow {
    pub kind: &'static str,
    pub value: String,
    pub line: usize,
}

impl TokenRow {
    /// `Type: ID | Value: x`
    pub fn render(&self) -> String {
        format!("Type: {} | Value: {}", self.kind, self.value)
    }
}

impl From<&Token> for TokenRow {
    fn from(t: &Token) -> Self {
        Self {
            kind: t.kind.name(),
            value: t.kind.to_string(),
            line: t.line,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokensReport {
    pub schema: &'static str,
    pub input: String,
    pub ok: bool,
    pub tokens: Vec<TokenRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TokensReport {
    pub fn new(input: impl Into<String>, lexed: &LexOutput) -> Self {
        Self {
            schema: TOKENS_SCHEMA,
            input: input.into(),
            ok: lexed.errors.is_empty(),
            tokens: lexed.tokens.iter().map(TokenRow::from).collect(),
            diagnostics: lexed.errors.iter().map(|e| e.diagnostic()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolRow {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub shape: String,
    pub category: &'static str,
    pub initialized: bool,
    pub line: usize,
}

impl From<&Symbol> for SymbolRow {
    fn from(s: &Symbol) -> Self {
        Self {
            name: s.name.clone(),
            ty: s.ty.display(),
            shape: s.shape_text(),
            category: s.category.name(),
            initialized: s.initialized,
            line: s.line,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub stdout: String,
    pub probes: Vec<ProbeReport>,
    pub memory: Vec<MemoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub schema: &'static str,
    pub input: String,
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub symbols: Vec<SymbolRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimizerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tac: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionReport>,
}

impl PipelineReport {
    pub fn from_compilation(input: impl Into<String>, compiled: &Compilation) -> Self {
        Self {
            schema: PIPELINE_SCHEMA,
            input: input.into(),
            ok: compiled.is_ok(),
            diagnostics: compiled.diagnostics(),
            symbols: compiled.symbols.iter().map(SymbolRow::from).collect(),
            optimizer: compiled.optimizer,
            tac: compiled.tac.as_ref().map(|t| t.lines()),
            execution: None,
        }
    }

    pub fn from_execution(input: impl Into<String>, run: &Execution) -> Self {
        let mut report = Self::from_compilation(input, &run.compilation);
        report.ok = run.is_ok();
        report.diagnostics = run.diagnostics();
        report.execution = run.outcome.as_ref().map(|o| ExecutionReport {
            stdout: o.stdout.clone(),
            probes: o.probes.clone(),
            memory: o.memory.clone(),
        });
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Options, compile, run};

    #[test]
    fn token_rows_render_kind_and_value() {
        let lexed = quantel_lex::lex("auto x = 2.5;");
        let report = TokensReport::new("inline", &lexed);
        let rendered: Vec<String> = report.tokens.iter().map(TokenRow::render).collect();
        assert_eq!(
            rendered,
            vec![
                "Type: AUTO | Value: auto",
                "Type: ID | Value: x",
                "Type: ASSIGN | Value: =",
                "Type: FLOAT | Value: 2.5",
                "Type: SEMI | Value: ;",
                "Type: EOF | Value: end of input",
            ]
        );
        assert!(report.ok);
    }

    #[test]
    fn failed_compile_has_no_execution_section() {
        let run = run("auto a = b;\n", &Options::default());
        let report = PipelineReport::from_execution("inline", &run);
        assert!(!report.ok);
        assert!(report.execution.is_none());
        let json = report.to_json().expect("json");
        assert!(json.contains("\"phase\": \"semantic\""), "{json}");
        assert!(!json.contains("\"execution\""));
    }

    #[test]
    fn json_report_carries_every_artifact() {
        let run = run("auto x = 2;\nprint(x);\nprobe(x);\n", &Options::default());
        let report = PipelineReport::from_execution("inline", &run);
        assert!(report.ok);
        let json: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse back");
        assert_eq!(json["schema"], PIPELINE_SCHEMA);
        assert_eq!(json["execution"]["stdout"].as_str().map(|s| s.starts_with("2\n")), Some(true));
        assert_eq!(json["execution"]["probes"][0]["dtype"], "int32");
        assert_eq!(json["execution"]["memory"][0]["name"], "x");
        assert_eq!(json["execution"]["memory"][0]["type"], "int32");
        assert_eq!(json["symbols"][0]["category"], "variable");
        assert!(json["tac"].is_array());
        assert!(json["optimizer"]["passes"].as_u64().is_some());

        let compiled = compile("auto x = 2;\n", &Options::default());
        let report = PipelineReport::from_compilation("inline", &compiled);
        assert!(report.execution.is_none());
    }
}
