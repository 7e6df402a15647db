use config::enums::QueryStrategy;
use config::lsh_params::LshParams;
use config::search_params::SearchParams;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use index::scanner::TopKScanner;
use index::ItqLsh;
use strum::IntoEnumIterator;
use utils::dataset::VectorSource;
use utils::distance::l2::L2DistanceCalculator;
use utils::test_utils::generate_seeded_dataset;

fn bench_query_strategies(c: &mut Criterion) {
    env_logger::init();
    let dataset = generate_seeded_dataset(20000, 64, 5);
    let params = LshParams::new(64)
        .with_num_bits(12)
        .with_num_training_samples(5000)
        .with_num_iterations(20);

    let mut index = ItqLsh::new(params.clone(), 1).expect("Failed to create index");
    index.train(&dataset, 2).expect("Failed to train index");
    index.hash(&dataset).expect("Failed to hash dataset");
    let mut rehashed = ItqLsh::new(params, 1).expect("Failed to create index");
    rehashed.train(&dataset, 2).expect("Failed to train index");
    rehashed.hash(&dataset).expect("Failed to hash dataset");
    rehashed.rehash(&dataset, 8).expect("Failed to rehash dataset");

    let query = dataset.get(0).to_vec();
    let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 10);
    let mut group = c.benchmark_group("Query strategies");
    for strategy in QueryStrategy::iter() {
        let search_params = SearchParams::new(10, strategy)
            .with_max_buckets(16)
            .with_num_virtual_tables(8);
        let target = if strategy == QueryStrategy::Rehashed {
            &rehashed
        } else {
            &index
        };
        group.bench_with_input(
            BenchmarkId::new("strategy", strategy),
            &search_params,
            |bencher, search_params| {
                bencher.iter(|| {
                    target
                        .search(black_box(&query), &mut scanner, search_params)
                        .expect("Search failed")
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_query_strategies);
criterion_main!(benches);
