//! Error types for cursor decoding and scheme parsing.

use std::path::PathBuf;

/// Errors raised while decoding a single `.cur`/`.ani` file.
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    /// The cursor file does not exist.
    #[error("cursor file not found: {0}")]
    FileNotFound(PathBuf),

    /// Malformed structural fields, truncated buffers or bad signatures.
    #[error("invalid cursor format: {0}")]
    InvalidFormat(String),

    /// A recognized container holding a variant we do not handle.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Pixel reconstruction or PNG encoding failed.
    #[error("failed to decode cursor: {0}")]
    DecodingFailed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CursorError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFormat(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, CursorError>;

/// Failures of `install.inf` parsing.
///
/// These are returned as values so the caller can fall back to the filename
/// role table instead of aborting a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InfError {
    #[error("INF file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("INF file is not valid text")]
    EncodingError,

    #[error("INF file has no [Scheme.Reg] section")]
    NoSchemeRegSection,

    #[error("INF [Scheme.Reg] section lists no cursor paths")]
    NoCursorPaths,

    #[error("INF cursor paths did not resolve to any file name")]
    NoValidCursors,
}
