use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `versecraft`.
///
/// Each subsystem defines its own error enum. Library callers can match on
/// these to decide how to render a failure; binary-side glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum VerseError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("prompt: {0}")]
    Prompt(#[from] PromptError),

    #[error("invocation: {0}")]
    Invocation(#[from] InvocationError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    // Generic fallthrough (wraps anyhow for interop)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Prompt / Template errors ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PromptError {
    /// A required template block is absent or empty. Raised at store load
    /// time, never per call.
    #[error("missing or empty template: {0}")]
    MissingTemplate(String),

    #[error("template render failed: {0}")]
    Render(String),
}

// ─── Model invocation errors ─────────────────────────────────────────────────

/// Everything that can go wrong talking to the text-generation provider.
///
/// The pipeline never sees a raw transport fault; every failure mode is
/// mapped to one of these cause tags at the provider boundary.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("provider {provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("provider {provider} timed out")]
    Timeout { provider: String },

    #[error("provider {provider} authentication failed")]
    Auth { provider: String },

    #[error("provider {provider} returned an empty response")]
    Empty { provider: String },

    /// The critic stage must return JSON matching the critique schema.
    #[error("malformed stage output: {0}")]
    Malformed(String),
}

// ─── Storage errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    /// Rejected write: out-of-range score, orphaned rating, blank person
    /// name, and similar. Nothing is persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Backend unreachable. Fatal to the current operation, not retried.
    #[error("backend connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::CannotOpen =>
            {
                Self::Connection(msg.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            sqlx::Error::PoolTimedOut => Self::Connection("pool timed out".into()),
            other => Self::Query(other.to_string()),
        }
    }
}

// ─── Convenience re-exports ──────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, VerseError>;
