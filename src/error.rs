use thiserror::Error;

/// Per-unit failure taxonomy. Ambiguous encodings and destination collisions
/// are deliberately absent: both are resolved by policy and only logged.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("no candidate encoding could decode {source_id}: {detail}")]
    DecodeFailure { source_id: String, detail: String },
    #[error("failed to persist {path}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("another migration run holds the lock at {0}")]
    RunLocked(String),
}
