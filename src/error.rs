//! Error types for g2p-rs.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Candle tensor/model error.
    #[error("candle: {0}")]
    Candle(#[from] candle_core::Error),

    /// Shape or contract violation (mismatched dims, batch != 1, bad slot index).
    #[error("shape: {0}")]
    Shape(String),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// Symbol table error (size mismatch, malformed file).
    #[error("vocab: {0}")]
    Vocab(String),

    /// Model weight loading error.
    #[error("weight loading: {0}")]
    WeightLoad(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
