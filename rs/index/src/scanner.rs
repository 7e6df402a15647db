use std::collections::BinaryHeap;
use std::marker::PhantomData;

use bit_vec::BitVec;
use log::warn;
use ordered_float::NotNan;
use utils::dataset::VectorSource;
use utils::DistanceCalculator;

/// A ranked result: distance to the query and the item identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdWithScore {
    pub score: f32,
    pub id: u32,
}

/// Receives candidate identifiers from the query engine and ranks them.
pub trait Scanner {
    /// Begin a new query, discarding any previous working set.
    fn reset(&mut self, query: &[f32]);

    /// Offer one candidate identifier.
    fn scan(&mut self, id: u32);

    /// Materialize the ranked result of the current query.
    fn finalize(&mut self);

    /// Ranked result produced by the last `finalize`.
    fn top_k(&self) -> &[IdWithScore];
}

#[derive(PartialEq, Eq, Ord, PartialOrd, Clone, Debug)]
struct PointAndDistance {
    distance: NotNan<f32>,
    point_id: u32,
}

/// Keeps the `k` candidates closest to the query, ascending by distance. Each identifier is
/// evaluated at most once per query.
pub struct TopKScanner<'a, S: VectorSource + ?Sized, D: DistanceCalculator> {
    source: &'a S,
    k: usize,
    query: Vec<f32>,
    visited: BitVec,
    // Max heap, so the furthest kept candidate is evicted first.
    working_list: BinaryHeap<PointAndDistance>,
    results: Vec<IdWithScore>,
    num_scanned: usize,

    _marker: PhantomData<D>,
}

impl<'a, S: VectorSource + ?Sized, D: DistanceCalculator> TopKScanner<'a, S, D> {
    pub fn new(source: &'a S, k: usize) -> Self {
        Self {
            source,
            k,
            query: Vec::new(),
            visited: BitVec::from_elem(source.num_vectors(), false),
            working_list: BinaryHeap::with_capacity(k + 1),
            results: Vec::new(),
            num_scanned: 0,
            _marker: PhantomData,
        }
    }

    /// Distinct candidates evaluated since the last reset.
    pub fn num_scanned(&self) -> usize {
        self.num_scanned
    }
}

impl<S: VectorSource + ?Sized, D: DistanceCalculator> Scanner for TopKScanner<'_, S, D> {
    fn reset(&mut self, query: &[f32]) {
        self.query = query.to_vec();
        self.visited.clear();
        self.working_list.clear();
        self.results.clear();
        self.num_scanned = 0;
    }

    fn scan(&mut self, id: u32) {
        let idx = id as usize;
        match self.visited.get(idx) {
            None => {
                warn!("Candidate {} is outside the dataset, skipping", id);
                return;
            }
            Some(true) => return,
            Some(false) => self.visited.set(idx, true),
        }
        self.num_scanned += 1;

        let distance = match NotNan::new(D::calculate(&self.query, self.source.get(idx))) {
            Ok(distance) => distance,
            Err(_) => return,
        };
        self.working_list.push(PointAndDistance {
            distance,
            point_id: id,
        });
        if self.working_list.len() > self.k {
            self.working_list.pop();
        }
    }

    fn finalize(&mut self) {
        self.results = std::mem::take(&mut self.working_list)
            .into_sorted_vec()
            .into_iter()
            .map(|p| IdWithScore {
                score: *p.distance,
                id: p.point_id,
            })
            .collect();
    }

    fn top_k(&self) -> &[IdWithScore] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use utils::dataset::InMemoryDataset;
    use utils::distance::l2::L2DistanceCalculator;

    use super::*;

    fn line_dataset() -> InMemoryDataset {
        InMemoryDataset::from_flat(1, (0..10).map(|x| x as f32).collect()).unwrap()
    }

    #[test]
    fn test_top_k_ascending() {
        let dataset = line_dataset();
        let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 3);
        scanner.reset(&[4.2]);
        for id in [9, 0, 4, 5, 3, 7] {
            scanner.scan(id);
        }
        scanner.finalize();

        let ids: Vec<u32> = scanner.top_k().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5, 3]);
        assert!(scanner.top_k().windows(2).all(|w| w[0].score <= w[1].score));
        assert_eq!(scanner.num_scanned(), 6);
    }

    #[test]
    fn test_duplicates_and_out_of_range_are_ignored() {
        let dataset = line_dataset();
        let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 5);
        scanner.reset(&[0.0]);
        for id in [1, 1, 2, 1, 42] {
            scanner.scan(id);
        }
        scanner.finalize();
        assert_eq!(scanner.top_k().len(), 2);
        assert_eq!(scanner.num_scanned(), 2);
    }

    #[test]
    fn test_reset_clears_previous_query() {
        let dataset = line_dataset();
        let mut scanner = TopKScanner::<_, L2DistanceCalculator>::new(&dataset, 2);
        scanner.reset(&[0.0]);
        scanner.scan(0);
        scanner.finalize();
        assert_eq!(scanner.top_k()[0].id, 0);

        scanner.reset(&[9.0]);
        scanner.scan(0);
        scanner.scan(9);
        scanner.finalize();
        assert_eq!(scanner.top_k()[0].id, 9);
        assert_eq!(scanner.top_k()[0].score, 0.0);
        assert_eq!(scanner.num_scanned(), 2);
    }
}
