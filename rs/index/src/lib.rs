pub mod bucket;
pub mod error;
pub mod lsh;
pub mod probing;
pub mod scanner;

pub use lsh::ItqLsh;
