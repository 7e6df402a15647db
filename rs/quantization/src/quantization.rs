use crate::error::Result;

/// Maps a vector to a binary code through a learned linear transform.
pub trait BinaryQuantizer {
    /// Code length in bits.
    fn num_bits(&self) -> usize;

    /// Dimension of the input vectors.
    fn dimension(&self) -> usize;

    /// Signed per-bit projection values ("hash floats").
    fn project(&self, vector: &[f32]) -> Result<Vec<f32>>;

    /// Sign-quantized projection. Zero maps to `true`.
    fn bits(&self, vector: &[f32]) -> Result<Vec<bool>> {
        Ok(quantize(&self.project(vector)?))
    }

    /// Bits packed most-significant first.
    fn code(&self, vector: &[f32]) -> Result<u32> {
        Ok(bools_to_code(&self.bits(vector)?))
    }
}

pub fn quantize(hash_floats: &[f32]) -> Vec<bool> {
    hash_floats.iter().map(|x| *x >= 0.0).collect()
}

/// The first bit becomes the highest-order bit of the code.
pub fn bools_to_code(bits: &[bool]) -> u32 {
    debug_assert!(bits.len() <= 32);
    bits.iter().fold(0u32, |code, bit| (code << 1) | (*bit as u32))
}

/// Inverse of `bools_to_code` for a code of `num_bits` bits.
pub fn code_to_bools(code: u32, num_bits: usize) -> Vec<bool> {
    (0..num_bits)
        .map(|i| (code >> (num_bits - 1 - i)) & 1 == 1)
        .collect()
}

/// Mask flipping bit `index` of a `num_bits` code, counted most-significant first.
pub fn bit_mask(index: usize, num_bits: usize) -> u32 {
    1u32 << (num_bits - 1 - index)
}
