use bson::{Bson, Document as BsonDocument};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::collection::RecordId;
use crate::query::eval::get_path;
use crate::query::planner::{IndexBounds, IndexDirection, IndexSpec, KeyBound};
use crate::value::compare;

/// Index key ordered by the value model's total order.
#[derive(Debug, Clone)]
pub struct IndexKey(pub Bson);

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

#[derive(Debug, Default)]
pub struct IndexStats {
    pub keys: usize,
    pub entries: usize,
    /// Bumped by `scan`, which only holds a shared borrow.
    pub scans: AtomicU64,
}

/// Ordered single-field index. Array values contribute one key per distinct
/// element (multikey); missing fields and empty arrays are indexed under null.
#[derive(Debug)]
pub struct BTreeIndex {
    pub spec: IndexSpec,
    pub map: BTreeMap<IndexKey, BTreeSet<RecordId>>,
    pub stats: IndexStats,
}

impl BTreeIndex {
    #[must_use]
    pub fn new(field: String, direction: IndexDirection) -> Self {
        Self {
            spec: IndexSpec::new(field, direction),
            map: BTreeMap::new(),
            stats: IndexStats::default(),
        }
    }

    fn keys_for(&self, doc: &BsonDocument) -> Vec<IndexKey> {
        match get_path(doc, &self.spec.field) {
            None => vec![IndexKey(Bson::Null)],
            Some(Bson::Array(items)) if items.is_empty() => vec![IndexKey(Bson::Null)],
            Some(Bson::Array(items)) => {
                let set: BTreeSet<IndexKey> = items.iter().cloned().map(IndexKey).collect();
                set.into_iter().collect()
            }
            Some(v) => vec![IndexKey(v.clone())],
        }
    }

    pub fn insert(&mut self, doc: &BsonDocument, id: RecordId) {
        let keys = self.keys_for(doc);
        if keys.len() > 1 {
            self.spec.multikey = true;
        }
        for k in keys {
            if self.map.entry(k).or_default().insert(id) {
                self.stats.entries += 1;
            }
        }
        self.stats.keys = self.map.len();
    }

    pub fn remove(&mut self, doc: &BsonDocument, id: RecordId) {
        for k in self.keys_for(doc) {
            if let Some(set) = self.map.get_mut(&k) {
                if set.remove(&id) {
                    self.stats.entries = self.stats.entries.saturating_sub(1);
                }
                if set.is_empty() {
                    self.map.remove(&k);
                }
            }
        }
        self.stats.keys = self.map.len();
    }

    /// Record ids whose keys fall within `bounds`, in index order and without
    /// duplicates. Empty or inverted bounds yield nothing.
    pub fn scan(&self, bounds: &IndexBounds) -> Vec<RecordId> {
        self.stats.scans.fetch_add(1, AtomicOrdering::Relaxed);
        if bounds.is_empty() {
            return Vec::new();
        }
        let to_bound = |b: &Option<KeyBound>| match b {
            None => Bound::Unbounded,
            Some(k) if k.inclusive => Bound::Included(IndexKey(k.value.clone())),
            Some(k) => Bound::Excluded(IndexKey(k.value.clone())),
        };
        let range = (to_bound(&bounds.lower), to_bound(&bounds.upper));
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        let mut push = |ids: &BTreeSet<RecordId>| {
            for id in ids {
                if seen.insert(*id) {
                    out.push(*id);
                }
            }
        };
        match self.spec.direction {
            IndexDirection::Asc => self.map.range(range).for_each(|(_, ids)| push(ids)),
            IndexDirection::Desc => self.map.range(range).rev().for_each(|(_, ids)| push(ids)),
        }
        out
    }
}
