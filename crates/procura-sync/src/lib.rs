//! Workflow layer: replays linked releases against a remote procurement API
//! through a fixed sequence of stages.

pub mod api;
pub mod driver;
pub mod dry_run;
pub mod retry;
pub mod wire;

pub use api::{ApiError, RemoteTender, WorkflowApi};
pub use driver::{RecordOutcome, WorkflowConfig, WorkflowDriver, WorkflowLedger};
pub use dry_run::DryRunApi;
pub use retry::RetryPolicy;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpWorkflowClient;
