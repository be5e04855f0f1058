/// Top-level error wrapping each component's own `thiserror` enum. Library
/// crates return their concern-specific error type; this only exists at the
/// seams where the orchestrator has to treat failures from different
/// components uniformly (e.g. to decide retry vs. drop).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("github api: {0}")]
    GitHub(#[from] GitHubError),

    #[error("persistence: {0}")]
    Persist(#[from] PersistError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Failures from talking to the GitHub REST API.
#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("resource not found")]
    NotFound,

    #[error("rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("transient request failure: {0}")]
    Transient(String),

    #[error("permanent failure ({status}): {body}")]
    Permanent { status: u16, body: String },

    #[error("cancelled")]
    Cancelled,
}

/// Failures from the storage layer. The orchestrator retries `Retriable`
/// failures (connection dropped, serialization conflict) up to 3 times with
/// backoff; `Fatal` failures (constraint violation, type mismatch) mark the
/// candidate Failed immediately.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("retriable: {0}")]
    Retriable(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl PersistError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, PersistError::Retriable(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PersistError::Fatal(_))
    }
}

/// Failures loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("could not read config: {0}")]
    Io(String),
}
