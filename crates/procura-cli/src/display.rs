//! Terminal rendering for stored tenders, store aggregates, and run summaries.

use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use procura_core::RunSummary;
use procura_store::StoreStats;

// ── Query results ──

/// Print one page of query results as a table, followed by the match count.
pub fn print_tenders(batches: &[RecordBatch], total: usize, offset: usize) -> anyhow::Result<()> {
    let shown: usize = batches.iter().map(|b| b.num_rows()).sum();
    if shown == 0 {
        println!("No tenders match ({total} total).");
        return Ok(());
    }
    println!("{}", pretty_format_batches(batches)?);
    println!("Showing {}-{} of {total}", offset + 1, offset + shown);
    Ok(())
}

/// Print a stored document as indented JSON.
pub fn print_document(doc: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(doc)?);
    Ok(())
}

// ── Aggregates ──

pub fn print_stats(stats: &StoreStats) {
    println!("Store");
    println!("  {:<26} {}", "tenders", stats.tenders);
    println!("  {:<26} {}", "contracts", stats.contracts);
    println!("  {:<26} {}", "items", stats.items);
    println!("  {:<26} {}", "milestones", stats.milestones);
    println!("  {:<26} {}", "transactions", stats.transactions);
    println!("  {:<26} {}", "purchase orders", stats.purchase_orders);
    println!("  {:<26} {:.2}", "total award value", stats.total_award_value);
    println!();
    if stats.min_date.is_some() || stats.max_date.is_some() {
        println!("Dates");
        println!("  {:<26} {}", "earliest", stats.min_date.as_deref().unwrap_or("-"));
        println!("  {:<26} {}", "latest", stats.max_date.as_deref().unwrap_or("-"));
        println!();
    }
}

pub fn print_status_counts(counts: &[(String, u64)]) {
    if counts.is_empty() {
        println!("Store is empty.");
        return;
    }
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    for (status, n) in counts {
        println!("  {status:<26} {n:>8}");
    }
    println!("  {:<26} {total:>8}", "total");
}

// ── Runs ──

/// Run summaries go to stderr; stdout may be carrying dry-run payloads.
pub fn print_summary(summary: &RunSummary) {
    eprintln!();
    eprint!("{summary}");
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
