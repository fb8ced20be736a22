use std::collections::VecDeque;
use std::sync::Arc;

use crate::collection::Record;

/// A forward-only cursor over an established result set.
///
/// The cursor owns `Arc` snapshots of every matched record, so removing or
/// relocating records in the collection afterwards never changes what it yields.
/// Results are handed out in batches, like a server-side cursor would.
#[derive(Clone, Debug)]
pub struct Cursor {
    batch: VecDeque<Arc<Record>>,
    pending: VecDeque<Arc<Record>>,
    batch_size: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(records: Vec<Arc<Record>>, batch_size: usize) -> Self {
        let mut cursor = Self {
            batch: VecDeque::new(),
            pending: records.into(),
            batch_size: batch_size.max(1),
        };
        cursor.refill();
        cursor
    }

    fn refill(&mut self) {
        let n = self.batch_size.min(self.pending.len());
        self.batch.extend(self.pending.drain(..n));
    }

    /// Documents remaining in the current batch.
    #[must_use]
    pub fn objs_left_in_batch(&self) -> usize {
        self.batch.len()
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.batch.is_empty() || !self.pending.is_empty()
    }

    pub fn advance(&mut self) -> Option<Arc<Record>> {
        if self.batch.is_empty() {
            self.refill();
        }
        self.batch.pop_front()
    }

    /// Exhaust the cursor and return how many documents it yielded.
    #[must_use]
    pub fn itcount(self) -> usize {
        self.count()
    }

    #[must_use]
    pub fn to_vec(self) -> Vec<Arc<Record>> {
        self.collect()
    }
}

impl Iterator for Cursor {
    type Item = Arc<Record>;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
