//! `procura`: reconcile OCDS record packages into a workflow API or a local store.

mod config;
mod display;
mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use procura_store::{StoreError, TenderQuery, TenderStore};
use procura_sync::{DryRunApi, HttpWorkflowClient, WorkflowDriver};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{ApiArgs, InputArgs, Periods, QueryArgs, SinkArgs};
use pipeline::RunOptions;

#[derive(Parser)]
#[command(name = "procura", version, about = "OCDS procurement reconciliation pipeline")]
struct Cli {
    /// DuckDB database file.
    #[arg(long, global = true, env = "PROCURA_DB", default_value = "procura.duckdb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upsert every record of a package into the local store.
    Import {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        sink: SinkArgs,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Replay every record of a package through the remote tender workflow.
    Replay {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        api: ApiArgs,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List stored tenders.
    Query {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print one stored tender document.
    Show {
        /// External id (ocid) of the tender.
        id: String,
    },
    /// Aggregate counts, award value, and date range over the store.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Tender count per status.
    Statuses,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Import { input, sink, json } => {
            let cancel = cancel_on_ctrl_c();
            let opts = run_options(&input, Periods::Source);
            let records = pipeline::open_input(&input.input, &opts.decoder)?;
            let mut store = open_store(&cli.db)?;
            let summary = pipeline::import(records, &opts, &mut store, (&sink).into(), &cancel)?;
            finish(&summary, json)?;
        }
        Command::Replay { input, api, json } => {
            let cancel = cancel_on_ctrl_c();
            let opts = run_options(&input, Periods::Synthesize);
            let records = pipeline::open_input(&input.input, &opts.decoder)?;
            let workflow = api.workflow();
            let summary = if api.dry_run {
                let driver = WorkflowDriver::new(DryRunApi::new(std::io::stdout()), &workflow);
                pipeline::replay(records, &opts, &driver, &cancel).await?
            } else {
                info!(api = %workflow.base_url, "replaying against remote API");
                let client = HttpWorkflowClient::new(&workflow).context("building API client")?;
                let driver = WorkflowDriver::new(client, &workflow);
                pipeline::replay(records, &opts, &driver, &cancel).await?
            };
            finish(&summary, json)?;
        }
        Command::Query { query } => {
            let store = open_store(&cli.db)?;
            let query = TenderQuery::from(&query);
            let total = store.count_matching(&query)?;
            let batches = store.query(&query)?;
            display::print_tenders(&batches, total, query.offset)?;
        }
        Command::Show { id } => {
            let store = open_store(&cli.db)?;
            match store.get_tender(&id) {
                Ok(doc) => display::print_document(&doc)?,
                Err(StoreError::NoResults) => anyhow::bail!("no tender with id {id:?}"),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Stats { json } => {
            let stats = open_store(&cli.db)?.stats()?;
            if json {
                display::print_json(&stats)?;
            } else {
                display::print_stats(&stats);
            }
        }
        Command::Statuses => {
            let counts = open_store(&cli.db)?.status_counts()?;
            display::print_status_counts(&counts);
        }
    }
    Ok(())
}

fn run_options(input: &InputArgs, periods: Periods) -> RunOptions {
    RunOptions {
        decoder: input.decoder(),
        map: input.map_options(Utc::now(), periods),
        limit: input.limit,
    }
}

fn open_store(path: &Path) -> anyhow::Result<TenderStore> {
    TenderStore::open_persistent(path).with_context(|| format!("opening store {}", path.display()))
}

/// Cancel the run on the first Ctrl-C; the record in flight finishes first.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current record");
            child.cancel();
        }
    });
    token
}

fn finish(summary: &procura_core::RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::to_string(summary)?;
        eprintln!("{line}");
    } else {
        display::print_summary(summary);
    }
    Ok(())
}
