use crate::persistence::RecordSink;
use crate::{FullTrackRecord, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// The shared, append-only collection of fetched track records.
///
/// Appends take one short-lived lock. [`flush`](Self::flush) copies the
/// records under that lock and writes outside it, so slow I/O never stalls the
/// detail workers. Flushes are serialized by a second lock; a flush that starts
/// later always writes a snapshot at least as new as the one before it.
#[derive(Debug, Default)]
pub struct ResultSet {
    records: Mutex<Vec<FullTrackRecord>>,
    flush_lock: Mutex<()>,
    flushes: AtomicU64,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: FullTrackRecord) {
        self.records().push(record);
    }

    /// Copy of everything appended so far, in append order.
    pub fn snapshot(&self) -> Vec<FullTrackRecord> {
        self.records().clone()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand the current snapshot to `sink`. Returns the number of records written.
    pub fn flush(&self, sink: &dyn RecordSink) -> Result<usize> {
        let _serialized = self
            .flush_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot = self.snapshot();
        sink.write_records(&snapshot)?;

        let flushes = self.flushes.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("Flush #{flushes} wrote {} records", snapshot.len());
        Ok(snapshot.len())
    }

    /// Number of successful flushes.
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    fn records(&self) -> MutexGuard<'_, Vec<FullTrackRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
