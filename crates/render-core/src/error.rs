//! Error types for the render pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the upstream rasterizer that produces the encoded page stream
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("Document not found: {0}")]
    DocumentNotFound(PathBuf),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Rasterization failed: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unexpected error surfaced by a strategy.
///
/// The coordinator treats this exactly like a strategy returning `None`.
/// Panics are caught by the coordinator and never surface as this type.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Strategy execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Failures constructing a display image on the host
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Invalid bitmap dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read image file: {0}")]
    Decode(String),
}

/// Terminal outcome of a coordinator call that produced no image
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Upstream render failed: {0}")]
    Upstream(#[from] RasterError),

    #[error("No rendering strategies registered")]
    NoStrategies,

    #[error("All {} strategies failed: {}", .attempted.len(), .attempted.join(" -> "))]
    Exhausted { attempted: Vec<String> },
}
