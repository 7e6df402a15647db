use config::lsh_params::ConfigError;
use quantization::error::QuantizationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Quantization(#[from] QuantizationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
