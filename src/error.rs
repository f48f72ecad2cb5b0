use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LtsweepError {
    #[error("Config error: {0}")]
    Config(String),

    /// The output destination cannot be written. Fatal for the whole run.
    #[error(
        "cannot write output '{path}': {reason}. Check that the `output_dir` setting points to an existing directory"
    )]
    OutputPath { path: PathBuf, reason: String },

    #[error("Raw file error: {0}")]
    RawFile(String),

    #[error("Script error: line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("Simulator timed out after {0} seconds")]
    Timeout(u64),

    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LtsweepError>;
