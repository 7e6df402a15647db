use crate::DistanceCalculator;

const LANES: usize = 8;

pub struct L2DistanceCalculator {}

impl L2DistanceCalculator {
    pub fn calculate_scalar(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Accumulates in `LANES` independent partial sums so the compiler can vectorize the loop.
    pub fn calculate_unrolled_squared(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut acc = [0.0f32; LANES];
        let a_chunks = a.chunks_exact(LANES);
        let b_chunks = b.chunks_exact(LANES);
        let a_rem = a_chunks.remainder();
        let b_rem = b_chunks.remainder();
        for (x, y) in a_chunks.zip(b_chunks) {
            for lane in 0..LANES {
                let diff = x[lane] - y[lane];
                acc[lane] += diff * diff;
            }
        }
        let mut sum: f32 = acc.iter().sum();
        for (x, y) in a_rem.iter().zip(b_rem.iter()) {
            sum += (x - y).powi(2);
        }
        sum
    }
}

impl DistanceCalculator for L2DistanceCalculator {
    /// Compute L2 distance between two vectors
    fn calculate(a: &[f32], b: &[f32]) -> f32 {
        Self::calculate_unrolled_squared(a, b).sqrt()
    }
}
