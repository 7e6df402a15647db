use std::collections::HashSet;

use index::scanner::IdWithScore;

/// Fraction of the first `k` ground-truth neighbours present in `results`.
pub fn recall_at_k(results: &[IdWithScore], ground_truth: &[u32], k: usize) -> f64 {
    let expected: HashSet<u32> = ground_truth.iter().take(k).copied().collect();
    if expected.is_empty() {
        return 0.0;
    }
    let found = results
        .iter()
        .take(k)
        .filter(|r| expected.contains(&r.id))
        .count();
    found as f64 / expected.len() as f64
}

#[derive(Debug, Default)]
pub struct SearchSummary {
    pub num_queries: usize,
    pub total_recall: f64,
    pub total_micros: u128,
    pub total_results: usize,
}

impl SearchSummary {
    pub fn record(&mut self, recall: Option<f64>, micros: u128, num_results: usize) {
        self.num_queries += 1;
        self.total_recall += recall.unwrap_or(0.0);
        self.total_micros += micros;
        self.total_results += num_results;
    }

    pub fn average_recall(&self) -> f64 {
        if self.num_queries == 0 {
            return 0.0;
        }
        self.total_recall / self.num_queries as f64
    }

    pub fn average_micros(&self) -> f64 {
        if self.num_queries == 0 {
            return 0.0;
        }
        self.total_micros as f64 / self.num_queries as f64
    }
}
