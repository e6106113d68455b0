use thiserror::Error;

/// Errors that can occur while building a heatmap
#[derive(Debug, Error)]
pub enum HeatmapError {
    /// CSV input could not be opened or read
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Map image could not be loaded, or the figure could not be saved
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Sidecar or directory I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run summary serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Incompatible option combination
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for Results using HeatmapError
pub type Result<T> = std::result::Result<T, HeatmapError>;
