use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::NotNan;
use quantization::quantization::{bit_mask, bools_to_code};
use quantization::statistics::HashStatistics;

use crate::error::{IndexError, Result};

/// A set of bit flips, as ascending positions into the cost-sorted bit order.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug)]
struct PerturbationSet {
    cost: NotNan<f32>,
    positions: Vec<usize>,
}

/// Yields the codes neighbouring a query code in ascending flip cost, where flipping a bit
/// costs the magnitude of its projection (optionally normalized by the hash statistics).
///
/// Uses the shift/expand construction of multi-probe LSH (Lv et al., 2007): every non-empty
/// set of flips is generated exactly once, so no code repeats and the original code is never
/// returned.
pub struct ProbeSequence {
    code: u32,
    num_bits: usize,
    // Bit indices sorted by ascending flip cost.
    order: Vec<usize>,
    sorted_costs: Vec<NotNan<f32>>,
    heap: BinaryHeap<Reverse<PerturbationSet>>,
}

impl ProbeSequence {
    pub fn new(
        bits: &[bool],
        hash_floats: &[f32],
        statistics: Option<&HashStatistics>,
    ) -> Result<Self> {
        if bits.len() != hash_floats.len() {
            return Err(IndexError::Precondition(format!(
                "got {} bits but {} hash floats",
                bits.len(),
                hash_floats.len()
            )));
        }
        let num_bits = bits.len();
        if num_bits > 32 {
            return Err(IndexError::Precondition(format!(
                "codes have at most 32 bits, got {}",
                num_bits
            )));
        }
        if let Some(statistics) = statistics {
            if statistics.num_bits() != num_bits {
                return Err(IndexError::Precondition(format!(
                    "hash statistics cover {} bits, code has {}",
                    statistics.num_bits(),
                    num_bits
                )));
            }
        }

        let costs = hash_floats
            .iter()
            .enumerate()
            .map(|(bit, value)| {
                let cost = match statistics {
                    Some(statistics) => statistics.normalized_margin(bit, *value),
                    None => value.abs(),
                };
                NotNan::new(cost).map_err(|_| {
                    IndexError::Precondition(format!("flip cost of bit {} is NaN", bit))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..num_bits).collect();
        order.sort_by_key(|bit| costs[*bit]);
        let sorted_costs: Vec<NotNan<f32>> = order.iter().map(|bit| costs[*bit]).collect();

        let mut heap = BinaryHeap::new();
        if num_bits > 0 {
            heap.push(Reverse(PerturbationSet {
                cost: sorted_costs[0],
                positions: vec![0],
            }));
        }

        Ok(Self {
            code: bools_to_code(bits),
            num_bits,
            order,
            sorted_costs,
            heap,
        })
    }

    /// The next cheapest neighbouring code, or `None` once all `2^N - 1` have been returned.
    pub fn pop(&mut self) -> Option<u32> {
        let Reverse(set) = self.heap.pop()?;
        let last = *set.positions.last()?;

        if last + 1 < self.num_bits {
            let mut shifted = set.positions.clone();
            if let Some(tail) = shifted.last_mut() {
                *tail = last + 1;
            }
            let shifted_cost = self.cost_of(&shifted);
            self.heap.push(Reverse(PerturbationSet {
                cost: shifted_cost,
                positions: shifted,
            }));

            let mut expanded = set.positions.clone();
            expanded.push(last + 1);
            let expanded_cost = self.cost_of(&expanded);
            self.heap.push(Reverse(PerturbationSet {
                cost: expanded_cost,
                positions: expanded,
            }));
        }

        Some(
            set.positions
                .iter()
                .fold(self.code, |code, position| {
                    code ^ bit_mask(self.order[*position], self.num_bits)
                }),
        )
    }

    fn cost_of(&self, positions: &[usize]) -> NotNan<f32> {
        positions
            .iter()
            .map(|position| self.sorted_costs[*position])
            .sum()
    }
}

impl Iterator for ProbeSequence {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.pop()
    }
}
