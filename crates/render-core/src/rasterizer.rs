//! Upstream rasterizer seam
//!
//! The document engine that turns a page into encoded pixels lives outside
//! this workspace. It is consumed through [`PageRasterizer`].

use crate::error::RasterError;
use crate::stream::EncodedStream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Handle to an opened document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub path: PathBuf,
    pub page_count: u32,
}

impl DocumentHandle {
    pub fn new(path: impl Into<PathBuf>, page_count: u32) -> Self {
        Self {
            path: path.into(),
            page_count,
        }
    }

    /// Whether `page_number` (1-based) exists in this document
    pub fn contains_page(&self, page_number: u32) -> bool {
        page_number >= 1 && page_number <= self.page_count
    }
}

/// Produces an encoded image stream for a document page
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn render_page(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
    ) -> Result<EncodedStream, RasterError>;
}

/// Rasterizer serving pre-encoded page images from memory.
///
/// Used by headless hosts that receive already-rendered pages and by tests.
#[derive(Debug, Default)]
pub struct InMemoryRasterizer {
    pages: RwLock<HashMap<(PathBuf, u32), Vec<u8>>>,
}

impl InMemoryRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the encoded bytes for one page
    pub fn insert_page(&self, document: &Path, page_number: u32, encoded: Vec<u8>) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((document.to_path_buf(), page_number), encoded);
    }
}

#[async_trait]
impl PageRasterizer for InMemoryRasterizer {
    async fn render_page(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        _zoom: f32,
        _dpi: u32,
    ) -> Result<EncodedStream, RasterError> {
        if !document.contains_page(page_number) {
            return Err(RasterError::PageOutOfRange {
                page: page_number,
                page_count: document.page_count,
            });
        }
        let pages = self.pages.read().unwrap_or_else(PoisonError::into_inner);
        let bytes = pages
            .get(&(document.path.clone(), page_number))
            .ok_or_else(|| RasterError::DocumentNotFound(document.path.clone()))?;
        Ok(EncodedStream::from_bytes(bytes.clone()))
    }
}
