//! Correlation record for a single render request

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a render request originated (viewer navigation, thumbnail strip, ...)
pub const DEFAULT_REQUEST_SOURCE: &str = "viewer";

/// Immutable context created once per render call.
///
/// Every telemetry event emitted while serving the request carries the fields
/// of this record so that log lines can be correlated by `operation_id`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext {
    document_path: PathBuf,
    page_number: u32,
    total_pages: u32,
    dpi: u32,
    request_source: String,
    requested_at: DateTime<Utc>,
    operation_id: Uuid,
}

impl RenderContext {
    /// Create a context for rendering `page_number` (1-based) of a document.
    ///
    /// A fresh operation id is generated for every call.
    pub fn new(
        document_path: impl Into<PathBuf>,
        page_number: u32,
        total_pages: u32,
        dpi: u32,
        request_source: impl Into<String>,
    ) -> Self {
        Self {
            document_path: document_path.into(),
            page_number,
            total_pages,
            dpi,
            request_source: request_source.into(),
            requested_at: Utc::now(),
            operation_id: Uuid::new_v4(),
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// 1-based page number
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn request_source(&self) -> &str {
        &self.request_source
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Unique id of this render call
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Stem used for artifacts derived from this request (temp file names)
    pub fn artifact_stem(&self) -> String {
        let stem = self
            .document_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let sanitized: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(32)
            .collect();
        format!("{}_p{}", sanitized, self.page_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_ids_are_unique() {
        let a = RenderContext::new("/docs/a.pdf", 1, 3, 96, "viewer");
        let b = RenderContext::new("/docs/a.pdf", 1, 3, 96, "viewer");
        assert_ne!(a.operation_id(), b.operation_id());
    }

    #[test]
    fn test_accessors() {
        let ctx = RenderContext::new("/docs/report.pdf", 2, 5, 150, "thumbnail");
        assert_eq!(ctx.document_path(), Path::new("/docs/report.pdf"));
        assert_eq!(ctx.page_number(), 2);
        assert_eq!(ctx.total_pages(), 5);
        assert_eq!(ctx.dpi(), 150);
        assert_eq!(ctx.request_source(), "thumbnail");
    }

    #[test]
    fn test_artifact_stem_is_filesystem_safe() {
        let ctx = RenderContext::new("/docs/annual report (v2).pdf", 7, 9, 96, "viewer");
        assert_eq!(ctx.artifact_stem(), "annual_report__v2__p7");
    }
}
