pub mod canonical;
mod de;
pub mod decode;
pub mod document;
pub mod error;
pub mod mapper;
pub mod raw;
pub mod record;
pub mod resolve;
pub mod summary;

pub use canonical::{CanonicalTender, MappedRelease, TenderStatus};
pub use decode::{decode_records, extract_release, DecodeError, DecoderConfig, RecordStream};
pub use document::{DocumentStats, TenderDocument};
pub use error::RecordError;
pub use mapper::{map_release, MapOptions, PeriodPolicy};
pub use record::prepare;
pub use resolve::{resolve, BidderKey, Link, LinkedRelease, UnresolvedReason};
pub use summary::{RunSummary, Stage, StageTally};
