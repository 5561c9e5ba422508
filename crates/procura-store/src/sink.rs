//! Idempotent sink: buffers prepared records and flushes them in batches.

use indexmap::IndexMap;
use procura_core::LinkedRelease;
use tracing::{info, warn};

use crate::duck::TenderStore;
use crate::row::StoredTender;
use crate::StoreError;

#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Records per atomic upsert batch.
    pub batch_size: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Rows committed and rows lost by one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub stored: u64,
    pub failed: u64,
}

/// Batched writer over a [`TenderStore`].
///
/// Rows are keyed by external id while buffered, so a batch never upserts the
/// same id twice; the last record for an id wins.
pub struct TenderSink<'a> {
    store: &'a mut TenderStore,
    config: SinkConfig,
    pending: IndexMap<String, StoredTender>,
}

impl<'a> TenderSink<'a> {
    pub fn new(store: &'a mut TenderStore, config: SinkConfig) -> Self {
        Self {
            store,
            config,
            pending: IndexMap::new(),
        }
    }

    /// Buffer one record; flushes when the batch is full.
    ///
    /// An error here means the record could not be serialised; nothing was
    /// buffered.
    pub fn push(&mut self, linked: &LinkedRelease) -> Result<FlushOutcome, StoreError> {
        let row = StoredTender::from_linked(linked)?;
        self.pending.insert(row.external_id.clone(), row);
        if self.pending.len() >= self.config.batch_size.max(1) {
            return Ok(self.flush());
        }
        Ok(FlushOutcome::default())
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Commit everything buffered.
    ///
    /// The batch is tried as one transaction first. If that fails the rows
    /// are retried one by one, so a single bad row costs only itself.
    pub fn flush(&mut self) -> FlushOutcome {
        if self.pending.is_empty() {
            return FlushOutcome::default();
        }
        let rows: Vec<StoredTender> = self.pending.drain(..).map(|(_, r)| r).collect();

        match self.store.upsert_batch(&rows) {
            Ok(n) => {
                info!(rows = n, "flushed batch");
                FlushOutcome {
                    stored: n as u64,
                    failed: 0,
                }
            }
            Err(e) => {
                warn!(rows = rows.len(), error = %e, "batch upsert failed, retrying per record");
                let mut outcome = FlushOutcome::default();
                for row in &rows {
                    match self.store.upsert(row) {
                        Ok(()) => outcome.stored += 1,
                        Err(e) => {
                            warn!(external_id = %row.external_id, error = %e, "upsert failed");
                            outcome.failed += 1;
                        }
                    }
                }
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use procura_core::raw::RawRelease;
    use procura_core::{map_release, resolve, MapOptions};

    fn linked(ocid: &str, title: &str) -> LinkedRelease {
        let raw: RawRelease =
            serde_json::from_value(serde_json::json!({"ocid": ocid, "tender": {"title": title}}))
                .unwrap();
        resolve(&map_release(&raw, &MapOptions::new(Utc::now())).unwrap())
    }

    #[test]
    fn flushes_when_batch_is_full() {
        let mut store = TenderStore::open().unwrap();
        let mut sink = TenderSink::new(&mut store, SinkConfig { batch_size: 2 });
        assert_eq!(sink.push(&linked("a", "A")).unwrap(), FlushOutcome::default());
        let out = sink.push(&linked("b", "B")).unwrap();
        assert_eq!(out.stored, 2);
        assert_eq!(sink.pending(), 0);
        sink.push(&linked("c", "C")).unwrap();
        assert_eq!(sink.flush().stored, 1);
        drop(sink);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn duplicate_ids_in_one_batch_collapse_to_last() {
        let mut store = TenderStore::open().unwrap();
        let mut sink = TenderSink::new(&mut store, SinkConfig::default());
        sink.push(&linked("a", "Old")).unwrap();
        sink.push(&linked("a", "New")).unwrap();
        assert_eq!(sink.pending(), 1);
        assert_eq!(sink.flush().stored, 1);
        drop(sink);
        assert_eq!(store.get_tender("a").unwrap()["tender"]["title"], "New");
    }

    #[test]
    fn flushing_nothing_is_a_no_op() {
        let mut store = TenderStore::open().unwrap();
        let mut sink = TenderSink::new(&mut store, SinkConfig::default());
        assert_eq!(sink.flush(), FlushOutcome::default());
    }
}
