//! One record through decode → map → resolve.

use serde_json::Value;

use crate::decode::extract_release;
use crate::error::RecordError;
use crate::mapper::{map_release, MapOptions};
use crate::resolve::{resolve, LinkedRelease};

/// Turn one decoded record into a linked entity set ready for a sink.
///
/// Any error skips this record only.
pub fn prepare(
    record: Value,
    payload_key: Option<&str>,
    opts: &MapOptions,
) -> Result<LinkedRelease, RecordError> {
    let raw = extract_release(record, payload_key)?;
    let mapped = map_release(&raw, opts)?;
    Ok(resolve(&mapped))
}
