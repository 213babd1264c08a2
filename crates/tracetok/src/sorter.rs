use std::sync::Mutex;

use crate::fuchsia::FuchsiaRecord;

/// A tokenized record waiting to be ordered by timestamp.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TracePayload {
    Fuchsia(FuchsiaRecord),
}

/// Consumer of timestamped records.
///
/// Records are pushed in stream order; implementations are responsible for
/// putting them into timestamp order.
pub trait Sorter: Send + Sync {
    fn push(&self, ts: i64, payload: TracePayload);
}

#[derive(Debug, Clone)]
pub struct SortedRecord {
    pub ts: i64,
    pub payload: TracePayload,
}

/// Buffers every pushed record until [`TraceSorter::extract_sorted`] is called.
#[derive(Debug, Default)]
pub struct TraceSorter {
    queue: Mutex<Vec<SortedRecord>>,
}

impl TraceSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes every buffered record, ordered by timestamp. Records with equal
    /// timestamps keep the order in which they were pushed.
    pub fn extract_sorted(&self) -> Vec<SortedRecord> {
        let mut records = match self.queue.lock() {
            Ok(mut q) => std::mem::take(&mut *q),
            Err(_) => return Vec::new(),
        };
        records.sort_by_key(|r| r.ts);
        records
    }
}

impl Sorter for TraceSorter {
    fn push(&self, ts: i64, payload: TracePayload) {
        if let Ok(mut q) = self.queue.lock() {
            q.push(SortedRecord { ts, payload });
        }
    }
}
