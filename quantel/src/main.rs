#![forbid(unsafe_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, NamedSource};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use quantel::config::{self, ResolvedConfig};
use quantel::report::{PipelineReport, SymbolRow, TokenRow, TokensReport};
use quantel::{Options, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "quantel", version, about = "Quantel shape-checked tensor language toolchain")]
struct Cli {
    /// Print a JSON report on stdout instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    /// Skip the optimizer. Overrides `quantel.toml`.
    #[arg(long, global = true)]
    no_opt: bool,

    /// Use this config file instead of searching for `quantel.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dump the token stream
    Tokens {
        /// Input .qtl file
        path: PathBuf,
    },
    /// Lex, parse and analyze; report diagnostics only
    Check {
        /// Input .qtl file
        path: PathBuf,
    },
    /// Print the three-address code listing
    Tac {
        /// Input .qtl file
        path: PathBuf,
    },
    /// Compile and execute
    Run {
        /// Input .qtl file
        path: PathBuf,

        /// Also print the final global environment
        #[arg(long)]
        memory: bool,
    },
    /// Print every symbol the analyzer defined
    Symbols {
        /// Input .qtl file
        path: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match &cli.cmd {
        Cmd::Tokens { path } => tokens(&cli, path),
        Cmd::Check { path } => check(&cli, path),
        Cmd::Tac { path } => tac(&cli, path),
        Cmd::Run { path, memory } => run(&cli, path, *memory),
        Cmd::Symbols { path } => symbols(&cli, path),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("QUANTEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_options(cli: &Cli, path: &Path) -> miette::Result<Options> {
    let resolved: ResolvedConfig = match &cli.config {
        Some(explicit) => config::load_config_file(explicit)?,
        None => config::load_config(path)?,
    };
    if let Some(p) = &resolved.path {
        tracing::debug!(config = %display_path(p), "loaded config");
    }
    let mut opts = Options::from(&resolved.config);
    if cli.no_opt {
        opts.optimize = false;
    }
    Ok(opts)
}

fn read_source(path: &Path) -> miette::Result<String> {
    fs::read_to_string(path)
        .map_err(|e| miette::miette!("failed to read {}: {e}", display_path(path)))
}

fn print_json<T: Serialize>(report: &T) -> miette::Result<()> {
    let text = serde_json::to_string_pretty(report).into_diagnostic()?;
    println!("{text}");
    Ok(())
}

/// Render every error against the source, then fail with a count.
fn report_errors(path: &Path, src: &str, errors: Vec<PipelineError>, json: bool) -> miette::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let count = errors.len();
    if !json {
        let source = NamedSource::new(display_path(path), src.to_string());
        for err in errors {
            let report = miette::Report::new(err).with_source_code(source.clone());
            eprintln!("{report:?}");
        }
    }
    Err(miette::miette!(
        "{} failed with {count} error(s)",
        display_path(path)
    ))
}

fn tokens(cli: &Cli, path: &Path) -> miette::Result<()> {
    let src = read_source(path)?;
    let lexed = quantel_lex::lex(&src);
    if cli.json {
        print_json(&TokensReport::new(display_path(path), &lexed))?;
    } else {
        for row in lexed.tokens.iter().map(TokenRow::from) {
            println!("{}", row.render());
        }
    }
    let errors = lexed.errors.into_iter().map(PipelineError::from).collect();
    report_errors(path, &src, errors, cli.json)
}

fn check(cli: &Cli, path: &Path) -> miette::Result<()> {
    let src = read_source(path)?;
    let opts = Options {
        optimize: false,
        emit_tac: false,
        ..resolve_options(cli, path)?
    };
    let compiled = quantel::compile(&src, &opts);
    if cli.json {
        print_json(&PipelineReport::from_compilation(display_path(path), &compiled))?;
    } else if compiled.is_ok() {
        println!("{}: no diagnostics", display_path(path));
    }
    report_errors(path, &src, compiled.errors, cli.json)
}

fn tac(cli: &Cli, path: &Path) -> miette::Result<()> {
    let src = read_source(path)?;
    let opts = Options {
        emit_tac: true,
        ..resolve_options(cli, path)?
    };
    let compiled = quantel::compile(&src, &opts);
    if cli.json {
        print_json(&PipelineReport::from_compilation(display_path(path), &compiled))?;
    } else if let Some(tac) = &compiled.tac {
        print!("{tac}");
    }
    report_errors(path, &src, compiled.errors, cli.json)
}

fn run(cli: &Cli, path: &Path, memory: bool) -> miette::Result<()> {
    let src = read_source(path)?;
    let opts = resolve_options(cli, path)?;
    let execution = quantel::run(&src, &opts);
    if cli.json {
        print_json(&PipelineReport::from_execution(display_path(path), &execution))?;
    }

    let mut errors = execution.compilation.errors;
    if let Some(outcome) = execution.outcome {
        if !cli.json {
            print!("{}", outcome.stdout);
            if memory {
                for entry in &outcome.memory {
                    println!(
                        "{} {} {} {} = {}",
                        entry.address, entry.name, entry.ty, entry.shape, entry.value
                    );
                }
            }
        }
        if let Some(err) = outcome.error {
            errors.push(PipelineError::from(err));
        }
    }
    report_errors(path, &src, errors, cli.json)
}

fn symbols(cli: &Cli, path: &Path) -> miette::Result<()> {
    let src = read_source(path)?;
    let opts = Options {
        optimize: false,
        emit_tac: false,
        ..resolve_options(cli, path)?
    };
    let compiled = quantel::compile(&src, &opts);
    if cli.json {
        print_json(&PipelineReport::from_compilation(display_path(path), &compiled))?;
    } else {
        for row in compiled.symbols.iter().map(SymbolRow::from) {
            println!("{} | {} | {} | {}", row.name, row.ty, row.shape, row.category);
        }
    }
    report_errors(path, &src, compiled.errors, cli.json)
}

fn display_path(p: &Path) -> String {
    p.to_string_lossy().to_string()
}
