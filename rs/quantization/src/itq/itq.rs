use ndarray::{Array2, ArrayView1};

use crate::error::{QuantizationError, Result};
use crate::quantization::BinaryQuantizer;

/// Learned transform of one hash table.
#[derive(Debug, Clone, PartialEq)]
pub struct Itq {
    // Top principal directions of the training sample, one row per bit.
    // Dimension: $N \times D$
    pub projection: Array2<f32>,

    // Orthogonal refinement applied after the projection, one row per output bit.
    // This is the transpose of the rotation $R$ learned by ITQ, so that
    // hash floats are `rotation · projection · x`.
    // Dimension: $N \times N$
    pub rotation: Array2<f32>,
}

impl Itq {
    pub fn new(projection: Array2<f32>, rotation: Array2<f32>) -> Result<Self> {
        let num_bits = projection.nrows();
        if rotation.dim() != (num_bits, num_bits) {
            return Err(QuantizationError::InvalidParameters(format!(
                "rotation must be {}x{}, got {:?}",
                num_bits,
                num_bits,
                rotation.dim()
            )));
        }
        if num_bits == 0 || num_bits > 32 {
            return Err(QuantizationError::InvalidParameters(format!(
                "number of bits must be in [1, 32], got {}",
                num_bits
            )));
        }
        Ok(Self {
            projection,
            rotation,
        })
    }
}

impl BinaryQuantizer for Itq {
    fn num_bits(&self) -> usize {
        self.projection.nrows()
    }

    fn dimension(&self) -> usize {
        self.projection.ncols()
    }

    fn project(&self, vector: &[f32]) -> Result<Vec<f32>> {
        if vector.len() != self.dimension() {
            return Err(QuantizationError::DimensionMismatch {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        let principal = self.projection.dot(&ArrayView1::from(vector));
        Ok(self.rotation.dot(&principal).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    fn swap_rotation_itq() -> Itq {
        // Bit 0 reads dimension 0, bit 1 reads dimension 1, bit 2 reads dimension 3.
        let projection = array![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        // Swaps the first two bits.
        let rotation = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        Itq::new(projection, rotation).unwrap()
    }

    #[test]
    fn test_project() {
        let itq = swap_rotation_itq();
        let floats = itq.project(&[0.5, -2.0, 9.0, 0.0]).unwrap();
        assert_eq!(floats.len(), 3);
        assert_abs_diff_eq!(floats[0], -2.0);
        assert_abs_diff_eq!(floats[1], 0.5);
        assert_abs_diff_eq!(floats[2], 0.0);
    }

    #[test]
    fn test_bits_and_code() {
        let itq = swap_rotation_itq();
        let vector = [0.5, -2.0, 9.0, 0.0];
        // Zero projection on the last bit maps to 1.
        assert_eq!(itq.bits(&vector).unwrap(), vec![false, true, true]);
        assert_eq!(itq.code(&vector).unwrap(), 0b011);
    }

    #[test]
    fn test_code_is_deterministic() {
        let itq = swap_rotation_itq();
        let vector = [0.1, 0.2, -0.3, -0.4];
        let first = itq.code(&vector).unwrap();
        for _ in 0..10 {
            assert_eq!(itq.code(&vector).unwrap(), first);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let itq = swap_rotation_itq();
        assert!(matches!(
            itq.project(&[1.0, 2.0]),
            Err(QuantizationError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_invalid_shapes() {
        let projection = Array2::<f32>::zeros((3, 4));
        let rotation = Array2::<f32>::zeros((2, 2));
        assert!(Itq::new(projection, rotation).is_err());
    }
}
