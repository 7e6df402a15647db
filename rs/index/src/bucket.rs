use std::collections::BTreeMap;

/// Posting lists of one hash table, keyed by code. Iteration is in ascending code order, which
/// is also the persisted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketTable {
    buckets: BTreeMap<u32, Vec<u32>>,
}

impl BucketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` to the posting list of `code`. Duplicates are kept.
    pub fn insert(&mut self, code: u32, id: u32) {
        self.buckets.entry(code).or_default().push(id);
    }

    /// Install a whole posting list. Returns false if the code was already present.
    pub fn insert_posting_list(&mut self, code: u32, ids: Vec<u32>) -> bool {
        if self.buckets.contains_key(&code) {
            return false;
        }
        self.buckets.insert(code, ids);
        true
    }

    pub fn get(&self, code: u32) -> Option<&[u32]> {
        self.buckets.get(&code).map(|ids| ids.as_slice())
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_postings(&self) -> usize {
        self.buckets.values().map(|ids| ids.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u32])> + '_ {
        self.buckets
            .iter()
            .map(|(code, ids)| (*code, ids.as_slice()))
    }
}
