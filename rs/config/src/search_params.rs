use crate::enums::QueryStrategy;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    pub strategy: QueryStrategy,
    /// Upper bound on buckets probed by the multi-probe strategies.
    pub max_buckets: usize,
    /// Normalize projections with the dataset hash statistics before ranking bit flips.
    pub normalize: bool,
    /// Virtual tables built at index time for the rehashed strategy.
    pub num_virtual_tables: usize,
}

impl SearchParams {
    pub fn new(top_k: usize, strategy: QueryStrategy) -> Self {
        Self {
            top_k,
            strategy,
            max_buckets: 1,
            normalize: false,
            num_virtual_tables: 1,
        }
    }

    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = max_buckets;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_num_virtual_tables(mut self, num_virtual_tables: usize) -> Self {
        self.num_virtual_tables = num_virtual_tables;
        self
    }
}
