use bson::Document as BsonDocument;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::QueryConfig;
use crate::errors::DbError;
use crate::index::BTreeIndex;
use crate::logger::METRICS_TARGET;
use crate::query::planner::{AccessPath, Explain, IndexDirection, QueryPlan, plan};
use crate::query::{CompiledQuery, Cursor, FindOptions, matches, parse_query_json};

/// Identifier assigned to each inserted document, increasing in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored document. Records are shared by `Arc` so cursors can keep them alive
/// independently of the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub data: BsonDocument,
}

/// In-memory collection with optional single-field indexes.
pub struct Collection {
    name: String,
    config: QueryConfig,
    next_id: AtomicU64,
    records: RwLock<BTreeMap<RecordId, Arc<Record>>>,
    indexes: RwLock<Vec<BTreeIndex>>,
}

impl Collection {
    #[must_use]
    pub fn new(name: impl Into<String>, config: QueryConfig) -> Self {
        Self {
            name: name.into(),
            config,
            next_id: AtomicU64::new(0),
            records: RwLock::new(BTreeMap::new()),
            indexes: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn insert(&self, data: BsonDocument) -> RecordId {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut records = self.records.write();
        for idx in self.indexes.write().iter_mut() {
            idx.insert(&data, id);
        }
        records.insert(id, Arc::new(Record { id, data }));
        id
    }

    /// Remove a record. Cursors that already hold it keep their snapshot.
    pub fn remove(&self, id: RecordId) -> Option<BsonDocument> {
        let mut records = self.records.write();
        let rec = records.remove(&id)?;
        for idx in self.indexes.write().iter_mut() {
            idx.remove(&rec.data, id);
        }
        Some(rec.data.clone())
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Arc<Record>> {
        self.records.read().get(&id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Build an index over `field`. Returns false if one already exists.
    pub fn create_index(&self, field: &str, direction: IndexDirection) -> bool {
        let records = self.records.read();
        let mut indexes = self.indexes.write();
        if indexes.iter().any(|i| i.spec.field == field) {
            return false;
        }
        let start = Instant::now();
        let mut idx = BTreeIndex::new(field.to_string(), direction);
        for (id, rec) in records.iter() {
            idx.insert(&rec.data, *id);
        }
        log::info!(
            "index built: collection={}, index={}, keys={}, ms={}",
            self.name,
            idx.spec.name(),
            idx.stats.keys,
            start.elapsed().as_millis()
        );
        indexes.push(idx);
        true
    }

    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().iter().map(|i| i.spec.name()).collect()
    }

    /// Choose the single plan for `query`: the first index (in creation order)
    /// that yields a bounded scan, otherwise a full scan.
    #[must_use]
    pub fn plan_query(&self, query: &CompiledQuery) -> Option<QueryPlan> {
        self.indexes.read().iter().map(|idx| plan(query, &idx.spec)).find(|p| p.access.is_bounded())
    }

    #[must_use]
    pub fn explain(&self, query: &CompiledQuery) -> Explain {
        self.plan_query(query).map_or_else(Explain::full_scan, |p| Explain::from_plan(&p))
    }

    /// Plan and scan under the same guards, so a concurrent insert cannot flip an
    /// index to multikey between choosing bounds and reading them.
    fn candidates(&self, query: &CompiledQuery) -> (Vec<Arc<Record>>, bool) {
        let records = self.records.read();
        let indexes = self.indexes.read();
        let bounded = indexes.iter().find_map(|idx| match plan(query, &idx.spec).access {
            AccessPath::BoundedScan(bounds) => Some((idx, bounds)),
            AccessPath::FullScan => None,
        });
        match bounded {
            Some((idx, bounds)) => (
                idx.scan(&bounds).into_iter().filter_map(|id| records.get(&id).cloned()).collect(),
                true,
            ),
            None => (records.values().cloned().collect(), false),
        }
    }

    #[must_use]
    pub fn find(&self, query: &CompiledQuery, opts: &FindOptions) -> Cursor {
        let start = Instant::now();
        let (candidates, used_index) = self.candidates(query);
        let scanned = candidates.len();
        let limit = opts.limit.unwrap_or(usize::MAX);
        let hits: Vec<Arc<Record>> =
            candidates.into_iter().filter(|r| matches(&r.data, query)).take(limit).collect();
        crate::dev6!(
            "{{\"bench\":\"query\",\"op\":\"find\",\"collection\":\"{}\",\"duration_ms\":{},\"used_index\":{},\"scanned\":{},\"result_count\":{}}}",
            self.name,
            start.elapsed().as_millis(),
            used_index,
            scanned,
            hits.len()
        );
        log::debug!(
            target: METRICS_TARGET,
            "find collection={} used_index={} scanned={} returned={}",
            self.name,
            used_index,
            scanned,
            hits.len()
        );
        let batch = opts.batch_size.unwrap_or(self.config.default_batch_size);
        Cursor::new(hits, batch)
    }

    #[must_use]
    pub fn find_one(&self, query: &CompiledQuery) -> Option<Arc<Record>> {
        self.find(query, &FindOptions { limit: Some(1), batch_size: Some(1) }).next()
    }

    #[must_use]
    pub fn count(&self, query: &CompiledQuery) -> usize {
        let start = Instant::now();
        let (candidates, used_index) = self.candidates(query);
        let n = candidates.iter().filter(|r| matches(&r.data, query)).count();
        crate::dev6!(
            "{{\"bench\":\"query\",\"op\":\"count\",\"collection\":\"{}\",\"duration_ms\":{},\"used_index\":{},\"result_count\":{}}}",
            self.name,
            start.elapsed().as_millis(),
            used_index,
            n
        );
        log::debug!(target: METRICS_TARGET, "count collection={} used_index={} returned={n}", self.name, used_index);
        n
    }

    /// # Errors
    /// Returns an error if the JSON is malformed or the query does not compile.
    pub fn find_json(&self, json: &str, opts: &FindOptions) -> Result<Cursor, DbError> {
        let q = parse_query_json(json, &self.config)?;
        Ok(self.find(&q, opts))
    }

    /// # Errors
    /// Returns an error if the JSON is malformed or the query does not compile.
    pub fn count_json(&self, json: &str) -> Result<usize, DbError> {
        let q = parse_query_json(json, &self.config)?;
        Ok(self.count(&q))
    }
}
