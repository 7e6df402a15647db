pub mod error;
pub mod itq;
pub mod quantization;
pub mod statistics;
