//! Record loops: decode → prepare → terminal stage, one record at a time.
//!
//! Both loops check the cancellation token before each record, so a signal
//! never interrupts a record part-way.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use procura_core::{decode_records, prepare, DecoderConfig, MapOptions, RecordStream, RunSummary};
use procura_store::{FlushOutcome, SinkConfig, TenderSink, TenderStore};
use procura_sync::{WorkflowApi, WorkflowDriver};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const PROGRESS_EVERY: u64 = 100;

/// What every run needs regardless of its terminal stage.
pub struct RunOptions {
    pub decoder: DecoderConfig,
    pub map: MapOptions,
    /// Maximum records to read; 0 reads everything.
    pub limit: u64,
}

impl RunOptions {
    fn limit_reached(&self, summary: &RunSummary) -> bool {
        self.limit > 0 && summary.records_seen >= self.limit
    }
}

/// Open the input as a record stream. `-` reads stdin.
pub fn open_input(path: &Path, decoder: &DecoderConfig) -> anyhow::Result<RecordStream> {
    let reader: Box<dyn Read + Send> = if path.as_os_str() == "-" {
        Box::new(std::io::stdin())
    } else {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Box::new(BufReader::new(file))
    };
    Ok(decode_records(reader, decoder))
}

fn progress(summary: &RunSummary, start: Instant) {
    if summary.records_seen % PROGRESS_EVERY == 0 {
        info!(
            records = summary.records_seen,
            skipped = summary.records_skipped(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "progress"
        );
    }
}

fn apply_flush(summary: &mut RunSummary, outcome: FlushOutcome) {
    summary.record_stored(outcome.stored);
    summary.record_store_failed(outcome.failed);
}

// ── Idempotent sink ──

/// Upsert every prepared record into `store`.
///
/// A malformed document stops the run; whatever was buffered before the
/// failure is still flushed.
pub fn import(
    records: RecordStream,
    opts: &RunOptions,
    store: &mut TenderStore,
    sink_config: SinkConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::default();
    let mut sink = TenderSink::new(store, sink_config);
    let payload_key = opts.decoder.payload_key.as_deref();

    for record in records {
        if cancel.is_cancelled() {
            warn!(records = summary.records_seen, "cancelled, stopping before next record");
            summary.mark_cancelled();
            break;
        }
        if opts.limit_reached(&summary) {
            break;
        }
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                apply_flush(&mut summary, sink.flush());
                error!(records = summary.records_seen, error = %e, "input stream failed");
                return Err(e).context(format!("decoding after {} records", summary.records_seen));
            }
        };
        summary.record_seen();

        match prepare(record, payload_key, &opts.map) {
            Ok(linked) => {
                summary.record_resolution(&linked);
                match sink.push(&linked) {
                    Ok(outcome) => apply_flush(&mut summary, outcome),
                    Err(e) => {
                        warn!(ocid = %linked.tender.external_id, error = %e, "could not serialise record");
                        summary.record_store_failed(1);
                    }
                }
            }
            Err(e) => {
                warn!(record = summary.records_seen, error = %e, "skipping record");
                summary.record_skipped(&e);
            }
        }
        progress(&summary, start);
    }

    apply_flush(&mut summary, sink.flush());
    info!(
        records = summary.records_seen,
        stored = summary.stored,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "import finished"
    );
    Ok(summary)
}

// ── Workflow replay ──

/// Replay every prepared record through the workflow stages, strictly one
/// record after another.
pub async fn replay<A: WorkflowApi>(
    mut records: RecordStream,
    opts: &RunOptions,
    driver: &WorkflowDriver<A>,
    cancel: &CancellationToken,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let mut summary = RunSummary::default();
    let payload_key = opts.decoder.payload_key.as_deref();

    loop {
        if cancel.is_cancelled() {
            warn!(records = summary.records_seen, "cancelled, stopping before next record");
            summary.mark_cancelled();
            break;
        }
        if opts.limit_reached(&summary) {
            break;
        }
        // The decoder thread feeds a blocking channel.
        let Some(record) = tokio::task::block_in_place(|| records.next()) else {
            break;
        };
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                error!(records = summary.records_seen, error = %e, "input stream failed");
                return Err(e).context(format!("decoding after {} records", summary.records_seen));
            }
        };
        summary.record_seen();

        match prepare(record, payload_key, &opts.map) {
            Ok(linked) => {
                summary.record_resolution(&linked);
                driver.drive(&linked, &mut summary).await;
            }
            Err(e) => {
                warn!(record = summary.records_seen, error = %e, "skipping record");
                summary.record_skipped(&e);
            }
        }
        progress(&summary, start);
    }

    info!(
        records = summary.records_seen,
        completed = summary.records_completed,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "replay finished"
    );
    Ok(summary)
}
