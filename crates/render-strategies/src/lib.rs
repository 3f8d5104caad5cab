//! Page Render Strategies - the built-in fallback chain
//!
//! Two strategies ship with the renderer:
//! - [`InMemoryStrategy`] (priority 0) decodes and copies pixels into a bitmap
//! - [`FileRoundtripStrategy`] (priority 10) loads the page from a temp file

pub mod file_roundtrip;
pub mod image_io;
pub mod in_memory;
pub mod temp_files;

pub use file_roundtrip::{FileRoundtripStrategy, FILE_ROUNDTRIP_PRIORITY, FILE_ROUNDTRIP_STRATEGY};
pub use image_io::{decode_rgba, DecodedPage, ImageIoError};
pub use in_memory::{InMemoryStrategy, IN_MEMORY_PRIORITY, IN_MEMORY_STRATEGY};
pub use temp_files::{OwnerId, TempFileTracker};

use page_render_core::{DisplayHost, StrategyRegistry};
use std::sync::Arc;

/// Registry holding the default chain: in-memory first, file-roundtrip second
pub fn default_registry(host: Arc<dyn DisplayHost>, tracker: Arc<TempFileTracker>) -> StrategyRegistry {
    StrategyRegistry::new()
        .with(Arc::new(InMemoryStrategy::new(host.clone())))
        .with(Arc::new(FileRoundtripStrategy::new(host, tracker)))
}
