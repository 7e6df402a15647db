use log::debug;
use rayon::prelude::*;
use strum::Display;
use utils::dataset::VectorSource;

use crate::error::{QuantizationError, Result};
use crate::quantization::BinaryQuantizer;

/// Which sign class of a bit's hash floats a statistic describes. Zero counts as positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Positive,
    Negative,
}

impl Side {
    pub fn of(value: f32) -> Self {
        if value >= 0.0 {
            Side::Positive
        } else {
            Side::Negative
        }
    }
}

/// Per-bit mean and population standard deviation of the positive and negative hash floats
/// over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct HashStatistics {
    pub positive_mean: Vec<f32>,
    pub negative_mean: Vec<f32>,
    pub positive_std: Vec<f32>,
    pub negative_std: Vec<f32>,
}

impl HashStatistics {
    /// Fails with `DegenerateDistribution` when a sign class of some bit is empty or has zero
    /// spread, since normalizing by its deviation would be undefined.
    pub fn compute<Q, S>(quantizer: &Q, source: &S) -> Result<Self>
    where
        Q: BinaryQuantizer + Sync + ?Sized,
        S: VectorSource + Sync + ?Sized,
    {
        let num_bits = quantizer.num_bits();
        let hash_floats = (0..source.num_vectors())
            .into_par_iter()
            .map(|i| quantizer.project(source.get(i)))
            .collect::<Result<Vec<Vec<f32>>>>()?;

        let mut sum = [vec![0.0f64; num_bits], vec![0.0f64; num_bits]];
        let mut count = [vec![0usize; num_bits], vec![0usize; num_bits]];
        for floats in &hash_floats {
            for (bit, value) in floats.iter().enumerate() {
                let side = Self::side_index(*value);
                sum[side][bit] += *value as f64;
                count[side][bit] += 1;
            }
        }
        let mean: Vec<Vec<f64>> = (0..2)
            .map(|side| {
                (0..num_bits)
                    .map(|bit| {
                        if count[side][bit] == 0 {
                            0.0
                        } else {
                            sum[side][bit] / count[side][bit] as f64
                        }
                    })
                    .collect()
            })
            .collect();

        let mut squared = [vec![0.0f64; num_bits], vec![0.0f64; num_bits]];
        for floats in &hash_floats {
            for (bit, value) in floats.iter().enumerate() {
                let side = Self::side_index(*value);
                let diff = *value as f64 - mean[side][bit];
                squared[side][bit] += diff * diff;
            }
        }

        let mut deviations = [vec![0.0f32; num_bits], vec![0.0f32; num_bits]];
        for side in 0..2 {
            for bit in 0..num_bits {
                let deviation = if count[side][bit] == 0 {
                    0.0
                } else {
                    (squared[side][bit] / count[side][bit] as f64).sqrt()
                };
                if deviation <= 0.0 {
                    return Err(QuantizationError::DegenerateDistribution {
                        bit,
                        side: if side == 0 {
                            Side::Positive
                        } else {
                            Side::Negative
                        },
                    });
                }
                deviations[side][bit] = deviation as f32;
            }
        }

        let [positive_mean, negative_mean] =
            [0, 1].map(|side| mean[side].iter().map(|m| *m as f32).collect::<Vec<f32>>());
        let [positive_std, negative_std] = deviations;
        debug!("Positive mean: {:?}", positive_mean);
        debug!("Negative mean: {:?}", negative_mean);
        debug!("Positive std: {:?}", positive_std);
        debug!("Negative std: {:?}", negative_std);

        Ok(Self {
            positive_mean,
            negative_mean,
            positive_std,
            negative_std,
        })
    }

    pub fn num_bits(&self) -> usize {
        self.positive_mean.len()
    }

    pub fn std(&self, bit: usize, side: Side) -> f32 {
        match side {
            Side::Positive => self.positive_std[bit],
            Side::Negative => self.negative_std[bit],
        }
    }

    /// Margin of `value` to the quantization boundary, in units of the standard deviation of
    /// its sign class.
    pub fn normalized_margin(&self, bit: usize, value: f32) -> f32 {
        value.abs() / self.std(bit, Side::of(value))
    }

    fn side_index(value: f32) -> usize {
        match Side::of(value) {
            Side::Positive => 0,
            Side::Negative => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use utils::dataset::InMemoryDataset;

    use super::*;
    use crate::itq::Itq;

    fn identity_itq() -> Itq {
        Itq::new(array![[1.0, 0.0], [0.0, 1.0]], array![[1.0, 0.0], [0.0, 1.0]]).unwrap()
    }

    #[test]
    fn test_compute_statistics() {
        let dataset = InMemoryDataset::from_rows(
            2,
            &[
                vec![1.0, -1.0],
                vec![3.0, -3.0],
                vec![-2.0, 2.0],
                vec![-4.0, 6.0],
            ],
        )
        .unwrap();
        let statistics = HashStatistics::compute(&identity_itq(), &dataset).unwrap();

        assert_eq!(statistics.num_bits(), 2);
        assert_abs_diff_eq!(statistics.positive_mean[0], 2.0);
        assert_abs_diff_eq!(statistics.negative_mean[0], -3.0);
        assert_abs_diff_eq!(statistics.positive_std[0], 1.0);
        assert_abs_diff_eq!(statistics.negative_std[0], 1.0);
        assert_abs_diff_eq!(statistics.positive_mean[1], 4.0);
        assert_abs_diff_eq!(statistics.negative_mean[1], -2.0);
        assert_abs_diff_eq!(statistics.positive_std[1], 2.0);
        assert_abs_diff_eq!(statistics.negative_std[1], 1.0);

        assert_abs_diff_eq!(statistics.normalized_margin(1, 3.0), 1.5);
        assert_abs_diff_eq!(statistics.normalized_margin(1, -3.0), 3.0);
    }

    #[test]
    fn test_degenerate_distribution() {
        // Bit 1 never goes negative.
        let dataset =
            InMemoryDataset::from_rows(2, &[vec![1.0, 1.0], vec![-1.0, 2.0], vec![2.0, 3.0]])
                .unwrap();
        match HashStatistics::compute(&identity_itq(), &dataset) {
            Err(QuantizationError::DegenerateDistribution { bit, side }) => {
                assert_eq!(bit, 0);
                assert_eq!(side, Side::Negative);
            }
            other => panic!("Expected degenerate distribution, got {:?}", other),
        }
    }
}
