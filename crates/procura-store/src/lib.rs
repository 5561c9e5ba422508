//! Storage layer: idempotent upsert of canonical tenders into DuckDB, plus a
//! closed-enum query layer over the stored documents.

mod error;
pub use error::StoreError;

pub mod query;
pub mod row;
pub use query::{HasDate, SortKey, TenderQuery};
pub use row::StoredTender;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{StoreStats, TenderStore};

#[cfg(feature = "duckdb")]
pub mod sink;
#[cfg(feature = "duckdb")]
pub use sink::{FlushOutcome, SinkConfig, TenderSink};
