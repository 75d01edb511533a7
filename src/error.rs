use thiserror::Error;

/// I/O errors that can occur when fetching source images from storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Error reading from the local filesystem
    #[error("Local storage error: {0}")]
    Local(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// A failure inside the image backend.
///
/// Carries the operation that failed and, while building a pyramid, the
/// level it was working on, so operators can tell a broken native level from
/// a failed synthesis or encode.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed{}: {message}", .level.map(|l| format!(" at level {l}")).unwrap_or_default())]
pub struct BackendError {
    /// Backend operation name (e.g. "open_level", "shrink_by_two")
    pub operation: &'static str,

    /// Level the operation was acting on, if known
    pub level: Option<usize>,

    /// Human-readable cause
    pub message: String,

    /// The source itself could not be found in storage
    pub source_missing: bool,
}

impl BackendError {
    /// Create a backend error for an operation.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            level: None,
            message: message.into(),
            source_missing: false,
        }
    }

    /// Create an error reporting that the source does not exist.
    pub fn source_missing(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            source_missing: true,
            ..Self::new(operation, message)
        }
    }

    /// Attach the level this failure happened at.
    pub fn at_level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }
}

/// Errors surfaced by the pyramid cache and tile service.
///
/// Every variant is recovered at the transport boundary. None of them is
/// fatal to the process and a failure for one source never touches cache
/// state for another.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Tile path failed the `level/x_y.ext` pattern or a coordinate range check
    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    /// Requested level does not exist in the pyramid
    #[error("Level {level} not found (pyramid has levels 0-{max_level})")]
    NotFound { level: usize, max_level: usize },

    /// Tile lies entirely outside its level
    #[error("Tile ({x}, {y}) is outside level {level} ({width}x{height})")]
    TileOutOfRange {
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// The source image does not exist in storage
    #[error("Source not found: {source_key}")]
    SourceNotFound { source_key: String },

    /// The source is structurally unusable (bad level count, stray downsample)
    #[error("Invalid source {source_key}: {reason}")]
    SourceInvalid { source_key: String, reason: String },

    /// Decode, resize, extract, or encode failed
    #[error("Backend failure: {0}")]
    Backend(#[from] BackendError),
}

impl TileError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TileError::MalformedRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn source_invalid(source_key: &str, reason: impl Into<String>) -> Self {
        TileError::SourceInvalid {
            source_key: source_key.to_string(),
            reason: reason.into(),
        }
    }
}
