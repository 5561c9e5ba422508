use thiserror::Error;

/// Why a single record was skipped. Never fatal to the stream.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record has no `{0}` payload")]
    MissingPayload(String),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("release carries neither ocid nor id")]
    MissingIdentifier,

    #[error("malformed field `{field}`: {reason}")]
    MalformedField { field: String, reason: String },
}

impl RecordError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Records without the payload key are expected in mixed packages and
    /// are counted separately from malformed ones.
    pub fn is_missing_payload(&self) -> bool {
        matches!(self, Self::MissingPayload(_))
    }
}
