use ndarray_rand::rand_distr::{Distribution, Normal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::InMemoryDataset;

// Generate a random vector with a given dimension
pub fn generate_random_vector(dimension: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    let mut vector = vec![];
    for _ in 0..dimension {
        vector.push(rng.gen::<f32>());
    }
    vector
}

/// Uniform [0, 1) vectors from a fixed seed.
pub fn generate_seeded_dataset(num_vectors: usize, dimension: usize, seed: u64) -> InMemoryDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..num_vectors * dimension)
        .map(|_| rng.gen::<f32>())
        .collect::<Vec<f32>>();
    InMemoryDataset::from_flat(dimension, data).expect("buffer length is a multiple of dimension")
}

/// Isotropic gaussian blobs around `centers`. Returns the dataset and the cluster label of each
/// row. Rows are laid out cluster by cluster.
pub fn generate_gaussian_clusters(
    centers: &[Vec<f32>],
    points_per_cluster: usize,
    std_dev: f32,
    seed: u64,
) -> (InMemoryDataset, Vec<usize>) {
    let dimension = centers.first().map(|c| c.len()).unwrap_or(0);
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0f32, std_dev).expect("standard deviation must be finite");

    let mut data = Vec::with_capacity(centers.len() * points_per_cluster * dimension);
    let mut labels = Vec::with_capacity(centers.len() * points_per_cluster);
    for (label, center) in centers.iter().enumerate() {
        assert_eq!(center.len(), dimension, "All centers must share a dimension");
        for _ in 0..points_per_cluster {
            data.extend(center.iter().map(|c| c + noise.sample(&mut rng)));
            labels.push(label);
        }
    }
    let dataset = InMemoryDataset::from_flat(dimension.max(1), data)
        .expect("buffer length is a multiple of dimension");
    (dataset, labels)
}
