use log::debug;
use ndarray::{s, Array2, Axis};
use ndarray_linalg::{Eigh, SVD, UPLO};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::seq::index;
use rand::Rng;
use utils::dataset::VectorSource;

use crate::error::{QuantizationError, Result};
use crate::itq::itq::Itq;

#[derive(Debug, Clone)]
pub struct ItqBuilderConfig {
    pub num_bits: usize,
    pub num_training_samples: usize,
    pub num_iterations: usize,
}

/// Trains the projection and rotation of one table with Iterative Quantization
/// (Gong & Lazebnik, "Iterative Quantization: A Procrustean Approach to Learning
/// Binary Codes").
pub struct ItqBuilder {
    config: ItqBuilderConfig,
}

impl ItqBuilder {
    pub fn new(config: ItqBuilderConfig) -> Self {
        Self { config }
    }

    pub fn build<S, R>(&self, source: &S, rng: &mut R) -> Result<Itq>
    where
        S: VectorSource + ?Sized,
        R: Rng + ?Sized,
    {
        let dimension = source.dimension();
        if self.config.num_bits == 0 || self.config.num_bits > dimension {
            return Err(QuantizationError::InvalidParameters(format!(
                "number of bits {} must be in [1, {}]",
                self.config.num_bits, dimension
            )));
        }
        if self.config.num_training_samples < 2 {
            return Err(QuantizationError::InvalidParameters(
                "need at least 2 training samples".to_string(),
            ));
        }

        // 1. Sample distinct training rows
        let sample_indices =
            Self::sample_indices(source.num_vectors(), self.config.num_training_samples, rng)?;
        let samples = Self::get_samples(source, &sample_indices)?;

        // 2. Center the samples and take the top principal directions
        let centered = Self::center(&samples);
        let principal_components = self.principal_components(&centered)?;
        let pca_data = centered.dot(&principal_components);

        // 3. Start from a random orthogonal rotation and refine it
        let initial_rotation = Self::generate_orthogonal_matrix(self.config.num_bits, rng)?;
        let rotation =
            Self::refine_rotation(&pca_data, initial_rotation, self.config.num_iterations)?;

        Itq::new(
            principal_components.t().to_owned(),
            rotation.t().to_owned(),
        )
    }

    /// Distinct row indices drawn uniformly without replacement, sorted ascending.
    pub fn sample_indices<R: Rng + ?Sized>(
        num_vectors: usize,
        num_samples: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if num_samples > num_vectors {
            return Err(QuantizationError::InsufficientSamples {
                requested: num_samples,
                available: num_vectors,
            });
        }
        let mut indices = index::sample(rng, num_vectors, num_samples).into_vec();
        indices.sort_unstable();
        Ok(indices)
    }

    fn get_samples<S: VectorSource + ?Sized>(source: &S, indices: &[usize]) -> Result<Array2<f32>> {
        let dimension = source.dimension();
        let mut flattened = Vec::with_capacity(indices.len() * dimension);
        for i in indices {
            flattened.extend_from_slice(source.get(*i));
        }
        Ok(Array2::from_shape_vec((indices.len(), dimension), flattened)?)
    }

    fn center(samples: &Array2<f32>) -> Array2<f32> {
        match samples.mean_axis(Axis(0)) {
            Some(mean) => samples - &mean,
            None => samples.clone(),
        }
    }

    /// Eigenvectors of the sample covariance for the `num_bits` largest eigenvalues, as
    /// columns. Dimension: $D \times N$
    fn principal_components(&self, centered: &Array2<f32>) -> Result<Array2<f32>> {
        let num_samples = centered.nrows() as f32;
        let covariance = centered.t().dot(centered) / (num_samples - 1.0);
        // Eigenvalues come back in ascending order.
        let (eigenvalues, eigenvectors) = covariance.eigh(UPLO::Lower)?;
        let dimension = eigenvectors.ncols();
        debug!(
            "Top eigenvalues: {:?}",
            eigenvalues.slice(s![dimension - self.config.num_bits..])
        );
        Ok(eigenvectors
            .slice(s![.., dimension - self.config.num_bits..])
            .to_owned())
    }

    /// Orthogonal factor of a standard-normal random matrix.
    pub fn generate_orthogonal_matrix<R: Rng + ?Sized>(
        dimension: usize,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let matrix: Array2<f32> = Array2::random_using((dimension, dimension), StandardNormal, rng);
        let (u, _, _) = matrix.svd(true, false)?;
        u.ok_or_else(|| QuantizationError::InvalidParameters("SVD returned no U".to_string()))
    }

    /// Alternates between fixing the binary codes $B = sign(VR)$ and solving the orthogonal
    /// Procrustes problem $\min_R ||B - VR||_F$.
    pub fn refine_rotation(
        pca_data: &Array2<f32>,
        initial_rotation: Array2<f32>,
        num_iterations: usize,
    ) -> Result<Array2<f32>> {
        let mut rotation = initial_rotation;
        for iteration in 0..num_iterations {
            let rotated = pca_data.dot(&rotation);
            let codes = rotated.mapv(|x| if x >= 0.0 { 1.0f32 } else { -1.0f32 });
            debug!(
                "Iteration {} - Quantization loss: {:.4}",
                iteration,
                (&codes - &rotated).mapv(|x| x * x).sum()
            );

            let (u, _, vt) = codes.t().dot(pca_data).svd(true, true)?;
            let (u, vt) = match (u, vt) {
                (Some(u), Some(vt)) => (u, vt),
                _ => {
                    return Err(QuantizationError::InvalidParameters(
                        "SVD returned no singular vectors".to_string(),
                    ))
                }
            };
            rotation = vt.t().dot(&u.t());
        }
        Ok(rotation)
    }

    /// $||sign(VR) - VR||_F^2$
    pub fn quantization_loss(pca_data: &Array2<f32>, rotation: &Array2<f32>) -> f32 {
        let rotated = pca_data.dot(rotation);
        rotated
            .iter()
            .map(|x| {
                let code = if *x >= 0.0 { 1.0 } else { -1.0 };
                (code - x) * (code - x)
            })
            .sum()
    }
}
