use thiserror::Error;

/// Errors from the local persistence layer.
///
/// Storage failures are fatal for the operation that hit them; callers
/// surface a digest notice to the UI instead of retrying automatically.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid queue payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}
