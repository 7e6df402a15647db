use byteorder::{LittleEndian, WriteBytesExt};
use config::enums::QueryStrategy;
use config::lsh_params::LshParams;
use config::search_params::SearchParams;
use index::error::IndexError;
use index::lsh::query::rank_buckets_by_hamming;
use index::lsh::reader::ItqLshReader;
use index::lsh::writer::ItqLshWriter;
use index::scanner::{IdWithScore, Scanner, TopKScanner};
use index::ItqLsh;
use quantization::error::QuantizationError;
use tempdir::TempDir;
use utils::dataset::{InMemoryDataset, VectorSource};
use utils::distance::l2::L2DistanceCalculator;
use utils::test_utils::generate_gaussian_clusters;

#[derive(Default)]
struct RecordingScanner {
    scanned: Vec<u32>,
}

impl Scanner for RecordingScanner {
    fn reset(&mut self, _query: &[f32]) {
        self.scanned.clear();
    }

    fn scan(&mut self, id: u32) {
        self.scanned.push(id);
    }

    fn finalize(&mut self) {}

    fn top_k(&self) -> &[IdWithScore] {
        &[]
    }
}

fn two_clusters() -> (InMemoryDataset, Vec<usize>) {
    let centers = vec![vec![5.0f32; 8], vec![-5.0f32; 8]];
    generate_gaussian_clusters(&centers, 250, 1.0, 42)
}

fn small_params() -> LshParams {
    LshParams::new(8)
        .with_num_bits(4)
        .with_num_training_samples(50)
        .with_num_iterations(10)
}

fn trained_index(dataset: &InMemoryDataset) -> ItqLsh {
    let mut index = ItqLsh::new(small_params(), 7).unwrap();
    index.train(dataset, 11).unwrap();
    index.hash(dataset).unwrap();
    index
}

/// Single-table index over 2-d vectors whose hash floats are the vectors themselves.
fn identity_index_bytes(buckets: &[(u32, &[u32])]) -> Vec<u8> {
    let mut bytes = b"ITQL".to_vec();
    // version, M, L, D, N, S, I, T
    for value in [1u32, 7, 1, 2, 2, 2, 1, 1] {
        bytes.write_u32::<LittleEndian>(value).unwrap();
    }
    for value in [0u32, 0] {
        bytes.write_u32::<LittleEndian>(value).unwrap();
    }
    bytes
        .write_u32::<LittleEndian>(buckets.len() as u32)
        .unwrap();
    for (code, ids) in buckets {
        bytes.write_u32::<LittleEndian>(*code).unwrap();
        bytes.write_u32::<LittleEndian>(ids.len() as u32).unwrap();
        for id in *ids {
            bytes.write_u32::<LittleEndian>(*id).unwrap();
        }
    }
    // Identity projection followed by identity rotation.
    for _ in 0..2 {
        for value in [1.0f32, 0.0, 0.0, 1.0] {
            bytes.write_f32::<LittleEndian>(value).unwrap();
        }
    }
    bytes
}

#[test]
fn test_clusters_collide() {
    let (dataset, labels) = two_clusters();
    let index = trained_index(&dataset);

    let codes: Vec<u32> = (0..dataset.num_vectors())
        .map(|i| index.compute_code(0, dataset.get(i)).unwrap())
        .collect();
    assert!(codes.iter().all(|code| *code < 1 << 4));

    let (mut intra, mut intra_pairs) = (0u64, 0u64);
    let (mut inter, mut inter_pairs) = (0u64, 0u64);
    for i in 0..codes.len() {
        for j in i + 1..codes.len() {
            let distance = (codes[i] ^ codes[j]).count_ones() as u64;
            if labels[i] == labels[j] {
                intra += distance;
                intra_pairs += 1;
            } else {
                inter += distance;
                inter_pairs += 1;
            }
        }
    }
    let intra_avg = intra as f64 / intra_pairs as f64;
    let inter_avg = inter as f64 / inter_pairs as f64;
    assert!(
        intra_avg < inter_avg,
        "intra-cluster {} vs inter-cluster {}",
        intra_avg,
        inter_avg
    );
}

#[test]
fn test_code_is_deterministic() {
    let (dataset, _) = two_clusters();
    let index = trained_index(&dataset);
    for i in (0..dataset.num_vectors()).step_by(37) {
        let code = index.compute_code(0, dataset.get(i)).unwrap();
        assert_eq!(index.compute_code(0, dataset.get(i)).unwrap(), code);
    }
}

#[test]
fn test_hamming_search_finds_cluster_neighbours() {
    let (dataset, labels) = two_clusters();
    let index = trained_index(&dataset);
    let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 10);
    let params = SearchParams::new(10, QueryStrategy::HammingRanking).with_max_buckets(4);

    for query_id in [0usize, 120, 260, 499] {
        let results = index
            .search(dataset.get(query_id), &mut scanner, &params)
            .unwrap();
        assert_eq!(results[0].id as usize, query_id);
        assert!(results
            .iter()
            .all(|r| labels[r.id as usize] == labels[query_id]));
    }
}

#[test]
fn test_hamming_ranking_is_monotonic() {
    let (dataset, _) = two_clusters();
    let index = trained_index(&dataset);
    let mut scanner = RecordingScanner::default();

    for query_id in [3usize, 300] {
        let query = dataset.get(query_id);
        let query_code = index.compute_code(0, query).unwrap();
        index.query_ranking(query, 16, &mut scanner).unwrap();
        assert_eq!(scanner.scanned.len(), dataset.num_vectors());

        let distances: Vec<u32> = scanner
            .scanned
            .iter()
            .map(|id| {
                let code = index.compute_code(0, dataset.get(*id as usize)).unwrap();
                (code ^ query_code).count_ones()
            })
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let ranked = rank_buckets_by_hamming(index.buckets().unwrap(), query_code, 4).unwrap();
        assert!(ranked
            .windows(2)
            .all(|w| (w[0] ^ query_code).count_ones() <= (w[1] ^ query_code).count_ones()));
    }
}

#[test]
fn test_loss_ranking_prefers_smaller_margin() {
    // Query code 0b11. Bucket 0b01 flips bit 0, bucket 0b10 flips bit 1.
    let bytes = identity_index_bytes(&[(0b01, &[1]), (0b10, &[2])]);
    let index = ItqLshReader::read_from_bytes(&bytes, None).unwrap();
    let mut scanner = RecordingScanner::default();

    index
        .query_ranking_by_loss(&[0.3, 0.8], 1, &mut scanner)
        .unwrap();
    assert_eq!(scanner.scanned, vec![1]);

    index
        .query_ranking_by_loss(&[0.9, 0.2], 1, &mut scanner)
        .unwrap();
    assert_eq!(scanner.scanned, vec![2]);

    index
        .query_ranking_by_loss(&[0.9, 0.2], 2, &mut scanner)
        .unwrap();
    assert_eq!(scanner.scanned, vec![2, 1]);
}

#[test]
fn test_generated_probing_follows_margins() {
    let bytes = identity_index_bytes(&[(0b00, &[0]), (0b01, &[1]), (0b10, &[2]), (0b11, &[3])]);
    let index = ItqLshReader::read_from_bytes(&bytes, None).unwrap();
    let mut scanner = RecordingScanner::default();

    index
        .query_by_loss(&[0.3, -0.8], 4, false, &mut scanner)
        .unwrap();
    // Own bucket 0b10, then flip bit 0 (0.3), flip bit 1 (0.8), flip both.
    assert_eq!(scanner.scanned, vec![2, 0, 3, 1]);

    index
        .query_by_loss(&[0.3, -0.8], 2, false, &mut scanner)
        .unwrap();
    assert_eq!(scanner.scanned, vec![2, 0]);
}

#[test]
fn test_degenerate_statistics() {
    let bytes = identity_index_bytes(&[]);
    let index = ItqLshReader::read_from_bytes(&bytes, None).unwrap();
    // Bit 0 is never negative.
    let dataset =
        InMemoryDataset::from_rows(2, &[vec![1.0, 1.0], vec![2.0, -1.0], vec![3.0, 2.0]]).unwrap();
    assert!(matches!(
        index.compute_statistics(&dataset),
        Err(IndexError::Quantization(
            QuantizationError::DegenerateDistribution { bit: 0, .. }
        ))
    ));
}

#[test]
fn test_rehash_round_trip() {
    let (dataset, _) = two_clusters();
    let mut index = trained_index(&dataset);
    index.rehash(&dataset, 3).unwrap();
    assert_eq!(index.num_tables(), 3);

    let temp_dir = TempDir::new("itq_lsh_test").unwrap();
    let first = temp_dir.path().join("first.itql");
    let second = temp_dir.path().join("second.itql");
    ItqLshWriter::new(&first).write(&index).unwrap();

    let loaded = ItqLshReader::new(&first)
        .with_expected_params(small_params())
        .read()
        .unwrap();
    assert_eq!(loaded.stats(), index.stats());
    for k in 0..3 {
        assert_eq!(loaded.table(k), index.table(k));
    }
    assert_eq!(loaded.quantizer(0).unwrap(), index.quantizer(0).unwrap());

    ItqLshWriter::new(&second).write(&loaded).unwrap();
    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );

    let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 5);
    let params = SearchParams::new(5, QueryStrategy::Rehashed).with_num_virtual_tables(3);
    assert_eq!(
        loaded.search(dataset.get(9), &mut scanner, &params).unwrap(),
        index.search(dataset.get(9), &mut scanner, &params).unwrap()
    );
}

#[test]
fn test_rehash_identity() {
    let (dataset, _) = two_clusters();
    let mut index = trained_index(&dataset);
    let before = index.buckets().unwrap().clone();
    index.rehash(&dataset, 1).unwrap();
    assert_eq!(index.num_tables(), 1);
    assert_eq!(index.buckets().unwrap(), &before);
}

#[test]
fn test_training_needs_enough_samples() {
    let (dataset, _) = two_clusters();
    let mut index = ItqLsh::new(small_params().with_num_training_samples(501), 7).unwrap();
    assert!(index.train(&dataset, 11).is_err());
    assert!(!index.is_trained());
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new("itq_lsh_test").unwrap();
    assert!(matches!(
        ItqLshReader::new(temp_dir.path().join("absent.itql")).read(),
        Err(IndexError::Io(_))
    ));
}
