//! Error types for cog-tiler services.

use thiserror::Error;

/// Result type alias using TilerError.
pub type TilerResult<T> = Result<T, TilerError>;

/// Primary error type for tile operations.
#[derive(Debug, Error)]
pub enum TilerError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unknown tile matrix set: {0}")]
    UnknownTileMatrixSet(String),

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Tile {z}/{x}/{y} is outside the tile matrix")]
    TileOutOfRange { z: u32, x: u32, y: u32 },

    // === Source Errors ===
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Failed to decode source raster: {0}")]
    SourceDecodeError(String),

    #[error("Failed to read source: {0}")]
    SourceReadError(String),

    // === Encoding Errors ===
    #[error("Failed to encode tile: {0}")]
    EncodeError(String),

    // === Storage Errors ===
    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Request timeout")]
    Timeout,
}

impl TilerError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            TilerError::MissingParameter(_)
            | TilerError::InvalidParameter { .. }
            | TilerError::UnknownTileMatrixSet(_)
            | TilerError::UnsupportedFormat(_)
            | TilerError::TileOutOfRange { .. }
            | TilerError::SourceUnreachable(_)
            | TilerError::SourceDecodeError(_) => 400,

            TilerError::Timeout => 504,

            TilerError::SourceReadError(_)
            | TilerError::EncodeError(_)
            | TilerError::CacheError(_)
            | TilerError::InternalError(_) => 500,
        }
    }

    /// Shorthand for a 400 identifying the offending query parameter.
    pub fn invalid_param(param: &str, message: impl Into<String>) -> Self {
        TilerError::InvalidParameter {
            param: param.to_string(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TilerError {
    fn from(err: std::io::Error) -> Self {
        TilerError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for TilerError {
    fn from(err: serde_json::Error) -> Self {
        TilerError::InternalError(format!("JSON error: {}", err))
    }
}
