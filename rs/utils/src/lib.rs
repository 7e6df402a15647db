pub mod dataset;
pub mod distance;
pub mod io;
pub mod test_utils;

pub trait DistanceCalculator {
    /// Distance between two vectors of the same dimension.
    fn calculate(a: &[f32], b: &[f32]) -> f32;
}
