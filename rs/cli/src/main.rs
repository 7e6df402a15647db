mod evaluation;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::enums::QueryStrategy;
use config::lsh_params::LshParams;
use config::search_params::SearchParams;
use index::lsh::reader::ItqLshReader;
use index::lsh::writer::ItqLshWriter;
use index::scanner::TopKScanner;
use index::ItqLsh;
use log::info;
use utils::dataset::{read_fvecs, read_ivecs, VectorSource};
use utils::distance::l2::L2DistanceCalculator;

use crate::evaluation::{recall_at_k, SearchSummary};

#[derive(Parser, Debug)]
struct TrainArgs {
    /// Base vectors (.fvecs)
    #[arg(long)]
    base_path: PathBuf,

    #[arg(long)]
    output_path: PathBuf,

    /// YAML parameter file. Overrides the individual parameter flags.
    #[arg(long)]
    config_path: Option<PathBuf>,

    #[arg(long, default_value_t = 521)]
    table_size: usize,

    #[arg(long, default_value_t = 1)]
    num_tables: usize,

    #[arg(long, default_value_t = 16)]
    num_bits: usize,

    #[arg(long, default_value_t = 100000)]
    num_training_samples: usize,

    #[arg(long, default_value_t = 50)]
    num_iterations: usize,

    /// Expand the single learned table into this many virtual tables.
    #[arg(long)]
    rehash: Option<usize>,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Parser, Debug)]
struct SearchArgs {
    #[arg(long)]
    index_path: PathBuf,

    /// Base vectors the index was built from (.fvecs)
    #[arg(long)]
    base_path: PathBuf,

    /// Query vectors (.fvecs)
    #[arg(long)]
    query_path: PathBuf,

    /// Exact neighbours of each query (.ivecs)
    #[arg(long)]
    ground_truth_path: Option<PathBuf>,

    #[arg(long, default_value_t = QueryStrategy::Direct)]
    strategy: QueryStrategy,

    #[arg(long, default_value_t = 10)]
    top_k: usize,

    #[arg(long, default_value_t = 1)]
    max_buckets: usize,

    #[arg(long, default_value_t = false)]
    normalize: bool,

    #[arg(long, default_value_t = 1)]
    num_virtual_tables: usize,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[arg(long)]
    index_path: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train an index over a base set and persist it
    Train(TrainArgs),

    /// Run queries against a persisted index
    Search(SearchArgs),

    /// Print parameters and bucket counts of a persisted index
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn train(args: TrainArgs) -> Result<()> {
    let dataset = read_fvecs(&args.base_path)
        .with_context(|| format!("Failed to read {}", args.base_path.display()))?;
    let params = match &args.config_path {
        Some(path) => LshParams::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => LshParams::new(dataset.dimension())
            .with_table_size(args.table_size)
            .with_num_tables(args.num_tables)
            .with_num_bits(args.num_bits)
            .with_num_training_samples(args.num_training_samples)
            .with_num_iterations(args.num_iterations),
    };
    info!("Parameters: {:?}", params);

    let start = Instant::now();
    let mut index = ItqLsh::new(params, args.seed)?;
    index.train(&dataset, args.seed)?;
    info!("Trained in {:?}", start.elapsed());

    let start = Instant::now();
    index.hash(&dataset)?;
    if let Some(num_tables) = args.rehash {
        index.rehash(&dataset, num_tables)?;
    }
    info!("Indexed in {:?}", start.elapsed());

    let written = ItqLshWriter::new(&args.output_path).write(&index)?;
    println!(
        "Wrote {} bytes with {} tables to {}",
        written,
        index.num_tables(),
        args.output_path.display()
    );
    Ok(())
}

fn search(args: SearchArgs) -> Result<()> {
    let mut index = ItqLshReader::new(&args.index_path)
        .read()
        .with_context(|| format!("Failed to load {}", args.index_path.display()))?;
    let base = read_fvecs(&args.base_path)
        .with_context(|| format!("Failed to read {}", args.base_path.display()))?;
    let queries = read_fvecs(&args.query_path)
        .with_context(|| format!("Failed to read {}", args.query_path.display()))?;
    let ground_truth = match &args.ground_truth_path {
        Some(path) => Some(
            read_ivecs(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    if let Some(ground_truth) = &ground_truth {
        if ground_truth.len() < queries.num_vectors() {
            return Err(anyhow!(
                "ground truth has {} rows for {} queries",
                ground_truth.len(),
                queries.num_vectors()
            ));
        }
    }
    if args.normalize {
        index.set_statistics(&base)?;
    }

    let params = SearchParams::new(args.top_k, args.strategy)
        .with_max_buckets(args.max_buckets)
        .with_normalize(args.normalize)
        .with_num_virtual_tables(args.num_virtual_tables);
    let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&base, params.top_k);
    let mut summary = SearchSummary::default();
    for i in 0..queries.num_vectors() {
        let start = Instant::now();
        let results = index.search(queries.get(i), &mut scanner, &params)?;
        let micros = start.elapsed().as_micros();
        let recall = ground_truth
            .as_ref()
            .map(|truth| recall_at_k(&results, &truth[i], params.top_k));
        summary.record(recall, micros, results.len());
    }

    println!("Strategy: {}", args.strategy);
    println!("Queries: {}", summary.num_queries);
    println!(
        "Average results per query: {:.2}",
        summary.total_results as f64 / summary.num_queries.max(1) as f64
    );
    println!("Average query time: {:.1} us", summary.average_micros());
    if ground_truth.is_some() {
        println!("Recall@{}: {:.4}", params.top_k, summary.average_recall());
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let index = ItqLshReader::new(&args.index_path)
        .read()
        .with_context(|| format!("Failed to load {}", args.index_path.display()))?;
    println!("Parameters: {:?}", index.params());
    let stats = index.stats();
    println!("Tables: {}", stats.num_tables);
    for (k, (buckets, postings)) in stats
        .buckets_per_table
        .iter()
        .zip(stats.postings_per_table.iter())
        .enumerate()
    {
        println!("Table {}: {} buckets, {} postings", k, buckets, postings);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let arg = Args::parse();
    match arg.command {
        Command::Train(args) => train(args),
        Command::Search(args) => search(args),
        Command::Inspect(args) => inspect(args),
    }
}
