#![forbid(unsafe_code)]

//! Quantel pipeline driver.
//!
//! Runs lexer, parser, analyzer, optimizer, TAC generator and interpreter in
//! order. Lexer and parser errors are collected together because the parser
//! works on the recovered token stream; any of them, or any semantic error,
//! stops the pipeline before the next phase.

pub mod config;
pub mod report;

use miette::Diagnostic;
use quantel_ast::Program;
use quantel_core::{SemanticError, Symbol};
use quantel_interpret::{ExecOutcome, RuntimeError, VmConfig};
use quantel_ir::{OptConfig, TacProgram};
use quantel_lex::LexError;
use quantel_parse::{ParseError, Parser};
use thiserror::Error;
use tracing::{debug, info_span};

pub use config::{Config, ConfigError, ResolvedConfig};

/// Any error a pipeline phase can report.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Semantic(#[from] SemanticError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] RuntimeError),
}

impl PipelineError {
    pub fn diagnostic(&self) -> quantel_ast::Diagnostic {
        match self {
            PipelineError::Lex(e) => e.diagnostic(),
            PipelineError::Parse(e) => e.diagnostic(),
            PipelineError::Semantic(e) => e.diagnostic(),
            PipelineError::Runtime(e) => e.diagnostic(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    pub optimize: bool,
    pub emit_tac: bool,
    pub optimizer: OptConfig,
    pub vm: VmConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        Self {
            optimize: config.pipeline.optimize,
            emit_tac: config.pipeline.emit_tac,
            optimizer: config.opt_config(),
            vm: config.vm_config(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct OptimizerSummary {
    pub passes: usize,
    pub changed: bool,
}

/// Everything produced before execution.
#[derive(Debug)]
pub struct Compilation {
    /// The last AST produced: optimized when the optimizer ran.
    pub program: Program,
    pub errors: Vec<PipelineError>,
    /// Symbol history of the analysis run; empty if analysis never ran.
    pub symbols: Vec<Symbol>,
    pub optimizer: Option<OptimizerSummary>,
    pub tac: Option<TacProgram>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn diagnostics(&self) -> Vec<quantel_ast::Diagnostic> {
        self.errors.iter().map(PipelineError::diagnostic).collect()
    }
}

#[derive(Debug)]
pub struct Execution {
    pub compilation: Compilation,
    /// `None` when compilation failed and nothing ran.
    pub outcome: Option<ExecOutcome>,
}

impl Execution {
    pub fn is_ok(&self) -> bool {
        self.compilation.is_ok() && self.outcome.as_ref().is_some_and(|o| o.error.is_none())
    }

    /// Compile-time diagnostics followed by the runtime error, if any.
    pub fn diagnostics(&self) -> Vec<quantel_ast::Diagnostic> {
        let mut out = self.compilation.diagnostics();
        if let Some(err) = self.outcome.as_ref().and_then(|o| o.error.as_ref()) {
            out.push(err.diagnostic());
        }
        out
    }
}

/// Front end and middle end: everything up to (not including) execution.
pub fn compile(src: &str, opts: &Options) -> Compilation {
    let lexed = {
        let _span = info_span!("pipeline.lex").entered();
        let out = quantel_lex::lex(src);
        debug!(tokens = out.tokens.len(), errors = out.errors.len(), "lexed source");
        out
    };

    let (program, parse_errors) = {
        let _span = info_span!("pipeline.parse").entered();
        Parser::new(&lexed.tokens).parse_program_with_recovery()
    };

    let mut errors: Vec<PipelineError> = lexed
        .errors
        .into_iter()
        .map(PipelineError::from)
        .chain(parse_errors.into_iter().map(PipelineError::from))
        .collect();
    if !errors.is_empty() {
        debug!(errors = errors.len(), "stopping after parse");
        return Compilation {
            program,
            errors,
            symbols: Vec::new(),
            optimizer: None,
            tac: None,
        };
    }

    let analysis = {
        let _span = info_span!("pipeline.analyze").entered();
        quantel_core::analyze(&program)
    };
    let symbols = analysis.symbols;
    if !analysis.errors.is_empty() {
        errors.extend(analysis.errors.into_iter().map(PipelineError::from));
        debug!(errors = errors.len(), "stopping after analysis");
        return Compilation {
            program,
            errors,
            symbols,
            optimizer: None,
            tac: None,
        };
    }

    let (program, optimizer) = if opts.optimize {
        let _span = info_span!("pipeline.optimize").entered();
        let outcome = quantel_ir::optimize(&program, &opts.optimizer);
        let summary = OptimizerSummary {
            passes: outcome.passes,
            changed: outcome.changed,
        };
        (outcome.program, Some(summary))
    } else {
        (program, None)
    };

    let tac = opts.emit_tac.then(|| {
        let _span = info_span!("pipeline.tac").entered();
        quantel_ir::generate(&program)
    });

    Compilation {
        program,
        errors,
        symbols,
        optimizer,
        tac,
    }
}

/// Compile and, when compilation is clean, execute.
pub fn run(src: &str, opts: &Options) -> Execution {
    let compilation = compile(src, opts);
    if !compilation.is_ok() {
        return Execution {
            compilation,
            outcome: None,
        };
    }
    let outcome = {
        let _span = info_span!("pipeline.interpret").entered();
        quantel_interpret::execute_with(&compilation.program, opts.vm.clone())
    };
    Execution {
        compilation,
        outcome: Some(outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_program_reaches_every_phase() {
        let compiled = compile("auto x = 1 + 2;\nprobe(x);\n", &Options::default());
        assert!(compiled.is_ok());
        assert!(compiled.optimizer.is_some());
        assert!(compiled.tac.is_some());
        assert!(compiled.symbols.iter().any(|s| s.name == "x"));
    }

    #[test]
    fn options_switch_phases_off() {
        let opts = Options {
            optimize: false,
            emit_tac: false,
            ..Options::default()
        };
        let compiled = compile("auto x = 1;\n", &opts);
        assert!(compiled.is_ok());
        assert_eq!(compiled.optimizer, None);
        assert!(compiled.tac.is_none());
    }

    #[test]
    fn lexer_errors_stop_before_analysis() {
        let compiled = compile("auto x = 1 $ 2;\nauto y = z;\n", &Options::default());
        assert!(!compiled.is_ok());
        assert!(compiled.symbols.is_empty());
        assert!(matches!(compiled.errors[0], PipelineError::Lex(_)));
        assert!(
            compiled
                .errors
                .iter()
                .all(|e| !matches!(e, PipelineError::Semantic(_)))
        );
    }
}
