use thiserror::Error;

/// Rejections raised while validating an ingestion payload.
///
/// Every variant surfaces to the instrument as a client error; none of them
/// is retried.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("empty batch")]
    EmptyBatch,

    #[error("batch too large: {len} items (max {max})")]
    BatchTooLarge { len: usize, max: usize },
}

impl PayloadError {
    /// Wire field name the error refers to, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            PayloadError::MissingField(field) | PayloadError::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}
