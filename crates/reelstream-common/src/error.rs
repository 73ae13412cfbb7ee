//! Error taxonomy shared by the gateway, the catalog store, and the upstream
//! chunk sources.
//!
//! Every failure that can reach the HTTP boundary is one of these kinds.
//! The `Display` output is meant for logs; clients only ever see
//! [`Error::public_message`].

/// Common error type for reelstream.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing, malformed, expired, or mismatched stream token.
    #[error("Authorization rejected: {0}")]
    AuthRejected(String),

    /// The content reference, bundle, or upstream file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested byte range cannot be served for a file of `total_size`.
    #[error("Range not satisfiable for {total_size} bytes")]
    RangeNotSatisfiable { total_size: u64 },

    /// The upstream file's identity does not match the stored reference hash.
    #[error("Content identity mismatch: expected {expected}, got {actual}")]
    IntegrityViolation { expected: String, actual: String },

    /// No upstream connection is registered.
    #[error("No upstream capacity")]
    NoCapacity,

    /// An upstream call exceeded its deadline.
    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// The connection registry or configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The upstream chunk source failed.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A catalog store operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new AuthRejected error.
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::AuthRejected(msg.into())
    }

    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new UpstreamTimeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamTimeout(msg.into())
    }

    /// Create a new Configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new Upstream error.
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code for this error kind.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::AuthRejected(_) => 401,
            Error::NotFound(_) => 404,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::InvalidInput(_) => 400,
            Error::NoCapacity | Error::UpstreamTimeout(_) => 503,
            Error::IntegrityViolation { .. }
            | Error::Configuration(_)
            | Error::Upstream(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Internal(_) => 500,
        }
    }

    /// Whether a client may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NoCapacity | Error::UpstreamTimeout(_))
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::AuthRejected(_) => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Error::InvalidInput(_) => "invalid_input",
            Error::NoCapacity | Error::UpstreamTimeout(_) => "service_unavailable",
            _ => "internal_error",
        }
    }

    /// Client-facing message. Never carries auth or integrity detail.
    pub fn public_message(&self) -> String {
        match self {
            Error::AuthRejected(_) => "Unauthorized".to_string(),
            Error::NotFound(_) => "Not found".to_string(),
            Error::RangeNotSatisfiable { .. } => "Range not satisfiable".to_string(),
            Error::InvalidInput(msg) => format!("Invalid input: {msg}"),
            Error::NoCapacity | Error::UpstreamTimeout(_) => {
                "Streaming service temporarily unavailable. Please try again.".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
