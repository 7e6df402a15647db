pub mod index;
pub mod query;
pub mod reader;
pub mod writer;

pub use index::{IndexStats, ItqLsh};
