pub mod itq;
pub mod itq_builder;

pub use itq::Itq;
pub use itq_builder::{ItqBuilder, ItqBuilderConfig};
