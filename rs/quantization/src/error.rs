use ndarray_linalg::error::LinalgError;
use thiserror::Error;

use crate::statistics::Side;

#[derive(Debug, Error)]
pub enum QuantizationError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("cannot draw {requested} distinct training samples from {available} vectors")]
    InsufficientSamples { requested: usize, available: usize },

    #[error("vector has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("linear algebra failure: {0}")]
    Linalg(#[from] LinalgError),

    #[error("degenerate distribution: {side} projections of bit {bit} have no spread")]
    DegenerateDistribution { bit: usize, side: Side },

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, QuantizationError>;
