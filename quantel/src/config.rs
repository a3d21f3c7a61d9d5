#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use quantel_interpret::VmConfig;
use quantel_ir::OptConfig;
use thiserror::Error;

pub const CONFIG_FILE: &str = "quantel.toml";

#[derive(Debug, Error, Diagnostic)]
#[error("config error: {message}")]
#[diagnostic(code(quantel::config))]
pub struct ConfigError {
    pub message: String,
}

/// Contents of `quantel.toml`. Every section and key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub optimizer: OptimizerSection,
    pub interpreter: InterpreterSection,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub optimize: bool,
    pub emit_tac: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            optimize: true,
            emit_tac: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct OptimizerSection {
    pub max_passes: usize,
    pub unroll_limit: i64,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        let opt = OptConfig::default();
        Self {
            max_passes: opt.max_passes,
            unroll_limit: opt.unroll_limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct InterpreterSection {
    pub max_call_depth: usize,
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            max_call_depth: VmConfig::default().max_call_depth,
        }
    }
}

/// A config plus the file it came from, if any.
#[derive(Clone, Debug, Default)]
pub struct ResolvedConfig {
    pub path: Option<PathBuf>,
    pub config: Config,
}

impl Config {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw).map_err(|e| ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.optimizer.max_passes == 0 {
            return Err(ConfigError {
                message: "optimizer.max_passes must be at least 1".to_string(),
            });
        }
        if self.optimizer.unroll_limit < 0 {
            return Err(ConfigError {
                message: "optimizer.unroll_limit must not be negative".to_string(),
            });
        }
        if self.interpreter.max_call_depth == 0 {
            return Err(ConfigError {
                message: "interpreter.max_call_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn opt_config(&self) -> OptConfig {
        OptConfig {
            max_passes: self.optimizer.max_passes,
            unroll_limit: self.optimizer.unroll_limit,
        }
    }

    pub fn vm_config(&self) -> VmConfig {
        VmConfig {
            max_call_depth: self.interpreter.max_call_depth,
        }
    }
}

/// Walk up from `start` (a file or a directory) looking for `quantel.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        let candidate = cur.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        match cur.parent() {
            Some(p) => cur = p.to_path_buf(),
            None => return None,
        }
    }
}

pub fn load_config_file(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| ConfigError {
        message: format!("failed to read {}: {e}", path.display()),
    })?;
    let config = Config::parse(&raw).map_err(|e| ConfigError {
        message: format!("failed to parse {}: {}", path.display(), e.message),
    })?;
    Ok(ResolvedConfig {
        path: Some(path.to_path_buf()),
        config,
    })
}

/// Discover the config for an input file. No file found means defaults.
pub fn load_config(start: &Path) -> Result<ResolvedConfig, ConfigError> {
    match find_config(start) {
        Some(path) => load_config_file(&path),
        None => Ok(ResolvedConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").expect("parse");
        assert_eq!(config, Config::default());
        assert!(config.pipeline.optimize);
        assert_eq!(config.optimizer.max_passes, 10);
        assert_eq!(config.optimizer.unroll_limit, 10);
        assert_eq!(config.interpreter.max_call_depth, 200);
    }

    #[test]
    fn sections_override_individual_keys() {
        let config = Config::parse(
            "[pipeline]\noptimize = false\n\n[optimizer]\nunroll_limit = 4\n",
        )
        .expect("parse");
        assert!(!config.pipeline.optimize);
        assert!(config.pipeline.emit_tac);
        assert_eq!(config.opt_config().unroll_limit, 4);
        assert_eq!(config.opt_config().max_passes, 10);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::parse("[optimizer]\nmax_passes = 0\n").is_err());
        assert!(Config::parse("[optimizer]\nunroll_limit = -1\n").is_err());
        assert!(Config::parse("[pipeline]\noptimize = \"yes\"\n").is_err());
    }
}
