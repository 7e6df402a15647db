use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codes are packed into a `u32`.
pub const MAX_NUM_BITS: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameters: {0}")]
    Invalid(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parameter set of an ITQ-LSH index. Immutable once training starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LshParams {
    /// Hash table domain size. Bounds the legacy per-table random index array.
    /// Default: 521
    pub table_size: usize,

    /// Number of independently trained tables.
    /// Default: 1
    pub num_tables: usize,

    /// Dimension of the indexed vectors.
    pub dimension: usize,

    /// Code length in bits. Must not exceed `dimension` nor 32.
    /// Default: 16
    pub num_bits: usize,

    /// Number of distinct vectors sampled to train each table.
    /// Default: 100000
    pub num_training_samples: usize,

    /// Number of alternating rotation refinement iterations.
    /// Default: 50
    pub num_iterations: usize,
}

impl LshParams {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn with_num_tables(mut self, num_tables: usize) -> Self {
        self.num_tables = num_tables;
        self
    }

    pub fn with_num_bits(mut self, num_bits: usize) -> Self {
        self.num_bits = num_bits;
        self
    }

    pub fn with_num_training_samples(mut self, num_training_samples: usize) -> Self {
        self.num_training_samples = num_training_samples;
        self
    }

    pub fn with_num_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }

    pub fn with_table_size(mut self, table_size: usize) -> Self {
        self.table_size = table_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_tables == 0 {
            return Err(ConfigError::Invalid("num_tables must be at least 1".into()));
        }
        if self.table_size == 0 {
            return Err(ConfigError::Invalid("table_size must be at least 1".into()));
        }
        if self.num_bits == 0 || self.num_bits > MAX_NUM_BITS {
            return Err(ConfigError::Invalid(format!(
                "num_bits must be in [1, {}], got {}",
                MAX_NUM_BITS, self.num_bits
            )));
        }
        if self.num_bits > self.dimension {
            return Err(ConfigError::Invalid(format!(
                "num_bits {} exceeds dimension {}",
                self.num_bits, self.dimension
            )));
        }
        // Covariance is normalized by S - 1.
        if self.num_training_samples < 2 {
            return Err(ConfigError::Invalid(
                "num_training_samples must be at least 2".into(),
            ));
        }
        Ok(())
    }

    /// Checks the parameters against the dataset they are about to be trained on.
    pub fn validate_for_dataset(
        &self,
        num_vectors: usize,
        dimension: usize,
    ) -> Result<(), ConfigError> {
        self.validate()?;
        if dimension != self.dimension {
            return Err(ConfigError::Invalid(format!(
                "dataset dimension {} does not match configured dimension {}",
                dimension, self.dimension
            )));
        }
        if self.num_training_samples > num_vectors {
            return Err(ConfigError::Invalid(format!(
                "cannot draw {} distinct training samples from {} vectors",
                self.num_training_samples, num_vectors
            )));
        }
        Ok(())
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let buffer = std::fs::read(path)?;
        let params: LshParams = serde_yaml::from_slice(&buffer)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            table_size: 521,
            num_tables: 1,
            dimension: 128,
            num_bits: 16,
            num_training_samples: 100000,
            num_iterations: 50,
        }
    }
}
