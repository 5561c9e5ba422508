//! Argument groups and their translation into component configuration.
//!
//! `PROCURA_*` environment variables are read here, by clap, and nowhere else.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use procura_core::{DecoderConfig, MapOptions, PeriodPolicy, TenderStatus};
use procura_store::{HasDate, SinkConfig, SortKey, TenderQuery};
use procura_sync::{RetryPolicy, WorkflowConfig};

// ── Input ──

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Record package to read (`-` for stdin).
    pub input: PathBuf,

    /// Input is a release package: items of `releases` are releases.
    #[arg(long)]
    pub releases: bool,

    /// Top-level array to stream (default `records`, or `releases` with --releases).
    #[arg(long, env = "PROCURA_ARRAY_KEY")]
    pub array_key: Option<String>,

    /// Stop after this many records (0 = all).
    #[arg(long, default_value_t = 0, env = "PROCURA_LIMIT")]
    pub limit: u64,

    /// Tender periods: keep the source's, or synthesize a currently open window.
    #[arg(long, value_enum)]
    pub periods: Option<Periods>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periods {
    Source,
    Synthesize,
}

impl InputArgs {
    pub fn decoder(&self) -> DecoderConfig {
        let mut config = if self.releases {
            DecoderConfig::release_package()
        } else {
            DecoderConfig::default()
        };
        if let Some(key) = &self.array_key {
            config.array_key = key.clone();
        }
        config
    }

    /// Mapping options with the clock fixed at `now` for the whole run.
    pub fn map_options(&self, now: DateTime<Utc>, default: Periods) -> MapOptions {
        let policy = match self.periods.unwrap_or(default) {
            Periods::Source => PeriodPolicy::Source,
            Periods::Synthesize => PeriodPolicy::SynthesizeActive,
        };
        MapOptions::new(now).with_period_policy(policy)
    }
}

// ── Store ──

#[derive(Args, Debug, Clone)]
pub struct SinkArgs {
    /// Records per atomic upsert batch.
    #[arg(long, default_value_t = 1000, env = "PROCURA_BATCH_SIZE")]
    pub batch_size: usize,
}

impl From<&SinkArgs> for SinkConfig {
    fn from(args: &SinkArgs) -> Self {
        SinkConfig {
            batch_size: args.batch_size.max(1),
        }
    }
}

// ── Remote API ──

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    None,
    Fixed,
    Exponential,
}

#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Tender collection URL of the remote API.
    #[arg(long, env = "PROCURA_API_URL", default_value = procura_sync::driver::DEFAULT_BASE_URL)]
    pub api_url: String,

    #[arg(long, env = "PROCURA_BROKER_TOKEN", default_value = "broker")]
    pub broker_token: String,

    #[arg(long, env = "PROCURA_BIDDER_TOKEN", default_value = "bidder")]
    pub bidder_token: String,

    /// Pause after every remote call, in milliseconds.
    #[arg(long, env = "PROCURA_CALL_DELAY_MS", default_value_t = 500)]
    pub call_delay_ms: u64,

    /// Give up on one remote request after this many seconds.
    #[arg(long, env = "PROCURA_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, value_enum, env = "PROCURA_RETRY", default_value_t = Retry::None)]
    pub retry: Retry,

    /// Attempts per call when retrying, first attempt included.
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub retry_delay_ms: u64,

    /// Upper bound on exponential backoff, in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub retry_max_delay_ms: u64,

    /// Print wire payloads as JSON lines instead of calling the API.
    #[arg(long)]
    pub dry_run: bool,
}

impl ApiArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);
        match self.retry {
            Retry::None => RetryPolicy::None,
            Retry::Fixed => RetryPolicy::Fixed {
                max_attempts: self.retry_attempts,
                delay,
            },
            Retry::Exponential => RetryPolicy::Exponential {
                max_attempts: self.retry_attempts,
                initial: delay,
                max: Duration::from_millis(self.retry_max_delay_ms),
                multiplier: 2.0,
            },
        }
    }

    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            base_url: self.api_url.clone(),
            broker_token: self.broker_token.clone(),
            bidder_token: self.bidder_token.clone(),
            call_delay: if self.dry_run {
                Duration::ZERO
            } else {
                Duration::from_millis(self.call_delay_ms)
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: self.retry_policy(),
        }
    }
}

// ── Query ──

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Case-insensitive substring of title or id.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<TenderStatus>,

    /// Tender value strictly greater than this.
    #[arg(long)]
    pub min_value: Option<f64>,

    /// Tender period contains this RFC 3339 instant.
    #[arg(long)]
    pub active_at: Option<DateTime<Utc>>,

    /// `yes` or `no`: tender period start present.
    #[arg(long)]
    pub has_date: Option<HasDate>,

    /// value, dateModified, title, startDate, endDate or complexity.
    #[arg(long, default_value_t = SortKey::DateModified)]
    pub sort: SortKey,

    /// Sort ascending instead of descending.
    #[arg(long)]
    pub asc: bool,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

impl From<&QueryArgs> for TenderQuery {
    fn from(args: &QueryArgs) -> Self {
        TenderQuery {
            search: args.search.clone(),
            status: args.status,
            min_value: args.min_value,
            active_at: args.active_at,
            has_date: args.has_date,
            sort: args.sort,
            descending: !args.asc,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

fn parse_status(s: &str) -> Result<TenderStatus, String> {
    TenderStatus::parse(s).ok_or_else(|| {
        format!("unknown status {s:?}, expected one of: draft, active, complete, cancelled, unsuccessful, terminated, unknown")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Replay {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        api: ApiArgs,
    }

    #[derive(Parser)]
    struct Query {
        #[command(flatten)]
        query: QueryArgs,
    }

    fn parse(args: &[&str]) -> Replay {
        Replay::try_parse_from(std::iter::once("procura").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_the_local_sandbox() {
        let h = parse(&["data.json"]);
        let wf = h.api.workflow();
        assert_eq!(wf.base_url, "http://localhost:6543/api/2.4/tenders");
        assert_eq!(wf.broker_token, "broker");
        assert_eq!(wf.bidder_token, "bidder");
        assert_eq!(wf.call_delay, Duration::from_millis(500));
        assert_eq!(wf.request_timeout, Duration::from_secs(30));
        assert_eq!(wf.retry, RetryPolicy::None);

        let decoder = h.input.decoder();
        assert_eq!(decoder.array_key, "records");
        assert_eq!(decoder.payload_key.as_deref(), Some("compiledRelease"));
    }

    #[test]
    fn release_packages_have_no_payload_key() {
        let h = parse(&["data.json", "--releases"]);
        let decoder = h.input.decoder();
        assert_eq!(decoder.array_key, "releases");
        assert!(decoder.payload_key.is_none());
    }

    #[test]
    fn dry_run_drops_pacing() {
        let h = parse(&["data.json", "--dry-run", "--retry", "fixed", "--retry-attempts", "4"]);
        let wf = h.api.workflow();
        assert!(wf.call_delay.is_zero());
        assert_eq!(wf.retry.max_attempts(), 4);
    }

    #[test]
    fn query_flags_become_a_query() {
        let h = Query::try_parse_from([
            "procura",
            "--status",
            "active",
            "--sort",
            "value",
            "--asc",
            "--has-date",
            "no",
        ])
        .unwrap();
        let q = TenderQuery::from(&h.query);
        assert_eq!(q.status, Some(TenderStatus::Active));
        assert_eq!(q.sort, SortKey::Value);
        assert!(!q.descending);
        assert_eq!(q.has_date, Some(HasDate::No));
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        let res = Query::try_parse_from(["procura", "--sort", "amount"]);
        assert!(res.is_err());
    }
}
