use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How the query engine selects buckets to probe.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum QueryStrategy {
    /// Only the bucket matching the query code.
    #[default]
    Direct,
    /// Populated buckets ordered by Hamming distance to the query code.
    HammingRanking,
    /// Populated buckets ordered by the query's quantization loss.
    LossRanking,
    /// Own bucket first, then codes pulled from the multi-probe sequence.
    GeneratedProbing,
    /// One code probed across every virtual table of a rehashed index.
    Rehashed,
}

impl QueryStrategy {
    /// Whether the strategy needs the index to hold exactly one bucket table.
    pub fn requires_single_table(&self) -> bool {
        !matches!(self, QueryStrategy::Rehashed)
    }
}
