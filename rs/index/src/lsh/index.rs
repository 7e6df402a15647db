use config::lsh_params::LshParams;
use log::{debug, info};
use quantization::itq::{Itq, ItqBuilder, ItqBuilderConfig};
use quantization::quantization::{bools_to_code, code_to_bools, quantize, BinaryQuantizer};
use quantization::statistics::HashStatistics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use utils::dataset::VectorSource;

use crate::bucket::BucketTable;
use crate::error::{IndexError, Result};
use crate::probing::ProbeSequence;
use crate::scanner::Scanner;

const PROGRESS_INTERVAL: usize = 100_000;

/// Bucket counts of a live index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub num_tables: usize,
    pub buckets_per_table: Vec<usize>,
    pub postings_per_table: Vec<usize>,
}

/// Locality-sensitive hash index over ITQ binary codes.
///
/// Holds `num_tables` learned transforms and one bucket table per learned transform, or, after
/// `rehash`, a single learned transform fanned out into several virtual bucket tables.
pub struct ItqLsh {
    params: LshParams,
    quantizers: Vec<Option<Itq>>,
    // Legacy per-table random indices in [0, table_size). Not used for hashing, kept so the
    // persisted format stays stable.
    random_indices: Vec<Vec<u32>>,
    tables: Vec<BucketTable>,
    statistics: Option<HashStatistics>,
}

impl ItqLsh {
    pub fn new(params: LshParams, seed: u64) -> Result<Self> {
        params.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let random_indices = (0..params.num_tables)
            .map(|_| {
                (0..params.num_bits)
                    .map(|_| rng.gen_range(0..params.table_size) as u32)
                    .collect()
            })
            .collect();
        Ok(Self {
            quantizers: vec![None; params.num_tables],
            random_indices,
            tables: vec![BucketTable::new(); params.num_tables],
            statistics: None,
            params,
        })
    }

    /// Re-initialize with a new parameter set, discarding all learned state.
    pub fn reset(&mut self, params: LshParams, seed: u64) -> Result<()> {
        *self = Self::new(params, seed)?;
        Ok(())
    }

    pub(crate) fn from_parts(
        params: LshParams,
        quantizers: Vec<Itq>,
        random_indices: Vec<Vec<u32>>,
        tables: Vec<BucketTable>,
    ) -> Self {
        Self {
            params,
            quantizers: quantizers.into_iter().map(Some).collect(),
            random_indices,
            tables,
            statistics: None,
        }
    }

    pub fn params(&self) -> &LshParams {
        &self.params
    }

    /// Number of live bucket tables, virtual tables included.
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, k: usize) -> Option<&BucketTable> {
        self.tables.get(k)
    }

    pub fn random_indices(&self) -> &[Vec<u32>] {
        &self.random_indices
    }

    pub fn is_trained(&self) -> bool {
        self.quantizers.iter().all(|q| q.is_some())
    }

    pub fn quantizer(&self, k: usize) -> Result<&Itq> {
        match self.quantizers.get(k) {
            Some(Some(quantizer)) => Ok(quantizer),
            Some(None) => Err(IndexError::Precondition(format!(
                "table {} has not been trained",
                k
            ))),
            None => Err(IndexError::Precondition(format!(
                "table {} does not exist, index has {} learned tables",
                k,
                self.quantizers.len()
            ))),
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_tables: self.tables.len(),
            buckets_per_table: self.tables.iter().map(|t| t.num_buckets()).collect(),
            postings_per_table: self.tables.iter().map(|t| t.num_postings()).collect(),
        }
    }

    /// Learn the projection and rotation of every table. Table `k` draws its randomness from
    /// `seed + k`, so tables train independently and in parallel. Buckets hashed under earlier
    /// transforms are dropped, virtual tables included.
    pub fn train<S>(&mut self, source: &S, seed: u64) -> Result<()>
    where
        S: VectorSource + Sync + ?Sized,
    {
        self.params
            .validate_for_dataset(source.num_vectors(), source.dimension())?;
        info!(
            "Start training {} tables ({} bits, {} samples, {} iterations)",
            self.params.num_tables,
            self.params.num_bits,
            self.params.num_training_samples,
            self.params.num_iterations
        );

        let builder = ItqBuilder::new(ItqBuilderConfig {
            num_bits: self.params.num_bits,
            num_training_samples: self.params.num_training_samples,
            num_iterations: self.params.num_iterations,
        });
        let quantizers = (0..self.params.num_tables)
            .into_par_iter()
            .map(|k| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(k as u64));
                let quantizer = builder.build(source, &mut rng);
                debug!("Finished training table {}", k);
                quantizer
            })
            .collect::<std::result::Result<Vec<Itq>, _>>()?;

        self.quantizers = quantizers.into_iter().map(Some).collect();
        self.tables = vec![BucketTable::new(); self.params.num_tables];
        self.statistics = None;
        info!("Finish training");
        Ok(())
    }

    pub fn compute_projection(&self, k: usize, vector: &[f32]) -> Result<Vec<f32>> {
        Ok(self.quantizer(k)?.project(vector)?)
    }

    pub fn compute_bits(&self, k: usize, vector: &[f32]) -> Result<Vec<bool>> {
        Ok(self.quantizer(k)?.bits(vector)?)
    }

    pub fn compute_code(&self, k: usize, vector: &[f32]) -> Result<u32> {
        Ok(self.quantizer(k)?.code(vector)?)
    }

    pub fn quantize(&self, hash_floats: &[f32]) -> Vec<bool> {
        quantize(hash_floats)
    }

    /// Unpack a code into `num_bits` bits, most significant first.
    pub fn unsigned_to_bools(&self, code: u32) -> Vec<bool> {
        code_to_bools(code, self.params.num_bits)
    }

    /// Insert every vector of `source` with identifiers `0..n`.
    pub fn hash<S>(&mut self, source: &S) -> Result<()>
    where
        S: VectorSource + Sync + ?Sized,
    {
        let num_vectors = source.num_vectors();
        Self::check_id_range(num_vectors)?;
        info!("Start hashing {} vectors", num_vectors);

        let assignments = (0..num_vectors)
            .into_par_iter()
            .map(|i| self.table_codes(source.get(i)))
            .collect::<Result<Vec<Vec<u32>>>>()?;

        for (i, codes) in assignments.into_iter().enumerate() {
            self.insert_codes(i as u32, &codes);
            if (i + 1) % PROGRESS_INTERVAL == 0 {
                debug!("Hashed {}/{} vectors", i + 1, num_vectors);
            }
        }
        info!("Finish hashing");
        Ok(())
    }

    /// Append `id` to the bucket of `vector` in every table.
    pub fn insert(&mut self, id: u32, vector: &[f32]) -> Result<()> {
        let codes = self.table_codes(vector)?;
        self.insert_codes(id, &codes);
        Ok(())
    }

    /// Rebuild the index as `num_tables` tables derived from table 0's transform. Table 0 holds
    /// each item's own code; table `t` holds the `t`-th code of the item's own probe sequence.
    /// `num_tables == 1` leaves the index untouched.
    pub fn rehash<S>(&mut self, source: &S, num_tables: usize) -> Result<()>
    where
        S: VectorSource + Sync + ?Sized,
    {
        if num_tables == 0 {
            return Err(IndexError::Precondition(
                "cannot rehash into zero tables".to_string(),
            ));
        }
        if num_tables == 1 {
            return Ok(());
        }
        if self.params.num_tables != 1 {
            return Err(IndexError::Precondition(format!(
                "rehash expands a single learned table, index has {}",
                self.params.num_tables
            )));
        }
        self.quantizer(0)?;
        let num_vectors = source.num_vectors();
        Self::check_id_range(num_vectors)?;
        info!("Start rehashing {} vectors into {} tables", num_vectors, num_tables);

        let assignments = (0..num_vectors)
            .into_par_iter()
            .map(|i| self.virtual_codes(source.get(i), num_tables))
            .collect::<Result<Vec<Vec<u32>>>>()?;

        let mut tables = vec![BucketTable::new(); num_tables];
        for (i, codes) in assignments.into_iter().enumerate() {
            for (table, code) in tables.iter_mut().zip(codes) {
                table.insert(code, i as u32);
            }
        }
        self.tables = tables;
        info!("Finish rehashing");
        Ok(())
    }

    /// Feed every identifier stored under `code` in table `k` to the scanner.
    pub fn probe<SC: Scanner + ?Sized>(&self, k: usize, code: u32, scanner: &mut SC) -> Result<()> {
        let table = self.tables.get(k).ok_or_else(|| {
            IndexError::Precondition(format!(
                "table {} does not exist, index has {} tables",
                k,
                self.tables.len()
            ))
        })?;
        if let Some(ids) = table.get(code) {
            for id in ids {
                scanner.scan(*id);
            }
        }
        Ok(())
    }

    /// The only bucket table of a non-rehashed single-table index.
    pub fn buckets(&self) -> Result<&BucketTable> {
        self.check_single_table()?;
        Ok(&self.tables[0])
    }

    /// Mean and standard deviation of table 0's positive and negative hash floats over `source`.
    pub fn compute_statistics<S>(&self, source: &S) -> Result<HashStatistics>
    where
        S: VectorSource + Sync + ?Sized,
    {
        Ok(HashStatistics::compute(self.quantizer(0)?, source)?)
    }

    pub fn set_statistics<S>(&mut self, source: &S) -> Result<()>
    where
        S: VectorSource + Sync + ?Sized,
    {
        self.statistics = Some(self.compute_statistics(source)?);
        Ok(())
    }

    pub fn statistics(&self) -> Option<&HashStatistics> {
        self.statistics.as_ref()
    }

    pub(crate) fn check_single_table(&self) -> Result<()> {
        if self.params.num_tables != 1 || self.tables.len() != 1 {
            return Err(IndexError::Precondition(format!(
                "strategy needs exactly one table, index has {} learned and {} live tables",
                self.params.num_tables,
                self.tables.len()
            )));
        }
        Ok(())
    }

    /// One code per live table: the learned codes, or the virtual codes of a rehashed index.
    fn table_codes(&self, vector: &[f32]) -> Result<Vec<u32>> {
        if self.tables.len() > self.params.num_tables {
            return self.virtual_codes(vector, self.tables.len());
        }
        (0..self.params.num_tables)
            .map(|k| self.compute_code(k, vector))
            .collect()
    }

    /// Own code followed by up to `num_tables - 1` probe-sequence codes.
    fn virtual_codes(&self, vector: &[f32], num_tables: usize) -> Result<Vec<u32>> {
        let hash_floats = self.compute_projection(0, vector)?;
        let bits = quantize(&hash_floats);
        let mut codes = Vec::with_capacity(num_tables);
        codes.push(bools_to_code(&bits));
        codes.extend(ProbeSequence::new(&bits, &hash_floats, None)?.take(num_tables - 1));
        Ok(codes)
    }

    fn insert_codes(&mut self, id: u32, codes: &[u32]) {
        for (table, code) in self.tables.iter_mut().zip(codes) {
            table.insert(*code, id);
        }
    }

    fn check_id_range(num_vectors: usize) -> Result<()> {
        if num_vectors > u32::MAX as usize {
            return Err(IndexError::Precondition(format!(
                "{} vectors exceed the u32 identifier space",
                num_vectors
            )));
        }
        Ok(())
    }
}
