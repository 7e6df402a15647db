use config::enums::QueryStrategy;
use config::search_params::SearchParams;
use quantization::quantization::{bools_to_code, quantize};

use crate::bucket::BucketTable;
use crate::error::{IndexError, Result};
use crate::lsh::index::ItqLsh;
use crate::probing::ProbeSequence;
use crate::scanner::{IdWithScore, Scanner};

/// Codes of every populated bucket in `table`, ordered by Hamming distance to `code`. Codes at
/// the same distance keep ascending key order.
pub fn rank_buckets_by_hamming(table: &BucketTable, code: u32, num_bits: usize) -> Result<Vec<u32>> {
    let mut classes: Vec<Vec<u32>> = vec![Vec::new(); num_bits + 1];
    for key in table.codes() {
        let distance = (key ^ code).count_ones() as usize;
        let class = classes.get_mut(distance).ok_or_else(|| {
            IndexError::Precondition(format!(
                "Hamming distance {} between {:#x} and {:#x} exceeds {} bits",
                distance, key, code, num_bits
            ))
        })?;
        class.push(key);
    }
    Ok(classes.into_iter().flatten().collect())
}

/// Codes of every populated bucket in `table`, ordered by the summed `|f_i|` over the bits that
/// differ from the query's. Ties keep ascending key order.
pub fn rank_buckets_by_loss(table: &BucketTable, bits: &[bool], hash_floats: &[f32]) -> Vec<u32> {
    let code = bools_to_code(bits);
    let num_bits = bits.len();
    let mut ranked: Vec<(f32, u32)> = table
        .codes()
        .map(|key| {
            let diff = key ^ code;
            let loss = hash_floats
                .iter()
                .enumerate()
                .filter(|(bit, _)| (diff >> (num_bits - 1 - bit)) & 1 == 1)
                .map(|(_, value)| value.abs())
                .sum::<f32>();
            (loss, key)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.into_iter().map(|(_, key)| key).collect()
}

impl ItqLsh {
    /// Probe the bucket of the query's own code.
    pub fn query<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        scanner: &mut SC,
    ) -> Result<Vec<IdWithScore>> {
        self.check_single_table()?;
        scanner.reset(query);
        let code = self.compute_code(0, query)?;
        self.probe(0, code, scanner)?;
        Ok(Self::finish(scanner))
    }

    /// Probe up to `max_buckets` populated buckets in ascending Hamming distance.
    pub fn query_ranking<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        max_buckets: usize,
        scanner: &mut SC,
    ) -> Result<Vec<IdWithScore>> {
        self.check_single_table()?;
        scanner.reset(query);
        let code = self.compute_code(0, query)?;
        let ranked = rank_buckets_by_hamming(self.buckets()?, code, self.params().num_bits)?;
        for key in ranked.into_iter().take(max_buckets) {
            self.probe(0, key, scanner)?;
        }
        Ok(Self::finish(scanner))
    }

    /// Probe up to `max_buckets` populated buckets in ascending quantization loss.
    pub fn query_ranking_by_loss<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        max_buckets: usize,
        scanner: &mut SC,
    ) -> Result<Vec<IdWithScore>> {
        self.check_single_table()?;
        scanner.reset(query);
        let hash_floats = self.compute_projection(0, query)?;
        let bits = quantize(&hash_floats);
        let ranked = rank_buckets_by_loss(self.buckets()?, &bits, &hash_floats);
        for key in ranked.into_iter().take(max_buckets) {
            self.probe(0, key, scanner)?;
        }
        Ok(Self::finish(scanner))
    }

    /// Probe the query's own bucket, then generated neighbouring codes, `max_buckets` in total.
    /// Codes without a bucket still count against the budget. With `normalize`, flip costs are
    /// scaled by the statistics installed with `set_statistics`.
    pub fn query_by_loss<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        max_buckets: usize,
        normalize: bool,
        scanner: &mut SC,
    ) -> Result<Vec<IdWithScore>> {
        self.check_single_table()?;
        let statistics = if normalize {
            Some(self.statistics().ok_or_else(|| {
                IndexError::Precondition(
                    "normalized probing needs hash statistics, call set_statistics first"
                        .to_string(),
                )
            })?)
        } else {
            None
        };

        scanner.reset(query);
        if max_buckets > 0 {
            let hash_floats = self.compute_projection(0, query)?;
            let bits = quantize(&hash_floats);
            self.probe(0, bools_to_code(&bits), scanner)?;
            let sequence = ProbeSequence::new(&bits, &hash_floats, statistics)?;
            for code in sequence.take(max_buckets - 1) {
                self.probe(0, code, scanner)?;
            }
        }
        Ok(Self::finish(scanner))
    }

    /// Probe the query's table-0 code in every table of a rehashed index.
    pub fn query_rehash<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        scanner: &mut SC,
    ) -> Result<Vec<IdWithScore>> {
        if self.params().num_tables != 1 {
            return Err(IndexError::Precondition(format!(
                "rehashed queries need one learned table, index has {}",
                self.params().num_tables
            )));
        }
        scanner.reset(query);
        let code = self.compute_code(0, query)?;
        for k in 0..self.num_tables() {
            self.probe(k, code, scanner)?;
        }
        Ok(Self::finish(scanner))
    }

    /// Dispatch to the strategy named in `params`. At most `params.top_k` results are returned.
    pub fn search<SC: Scanner + ?Sized>(
        &self,
        query: &[f32],
        scanner: &mut SC,
        params: &SearchParams,
    ) -> Result<Vec<IdWithScore>> {
        if params.strategy.requires_single_table() {
            self.check_single_table()?;
        } else if self.num_tables() != params.num_virtual_tables {
            return Err(IndexError::Precondition(format!(
                "index has {} tables but {} virtual tables were requested",
                self.num_tables(),
                params.num_virtual_tables
            )));
        }

        let mut results = match params.strategy {
            QueryStrategy::Direct => self.query(query, scanner)?,
            QueryStrategy::HammingRanking => {
                self.query_ranking(query, params.max_buckets, scanner)?
            }
            QueryStrategy::LossRanking => {
                self.query_ranking_by_loss(query, params.max_buckets, scanner)?
            }
            QueryStrategy::GeneratedProbing => {
                self.query_by_loss(query, params.max_buckets, params.normalize, scanner)?
            }
            QueryStrategy::Rehashed => self.query_rehash(query, scanner)?,
        };
        results.truncate(params.top_k);
        Ok(results)
    }

    fn finish<SC: Scanner + ?Sized>(scanner: &mut SC) -> Vec<IdWithScore> {
        scanner.finalize();
        scanner.top_k().to_vec()
    }
}
