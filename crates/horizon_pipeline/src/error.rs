use crate::types::Direction;
use thiserror::Error;

/// Errors surfaced by pipeline operations.
///
/// Lost CAS races are retried internally and never show up here; the only
/// runtime failure a caller sees is a missing anchor or target.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No element named '{name}' at occurrence {occurrence} ({direction})")]
    NotFound {
        name: String,
        occurrence: usize,
        direction: Direction,
    },
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("Configuration I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl PipelineError {
    pub(crate) fn not_found(name: &str, occurrence: usize, direction: Direction) -> Self {
        PipelineError::NotFound {
            name: name.to_string(),
            occurrence,
            direction,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
