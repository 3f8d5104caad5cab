//! Page Render - reliable page-to-image rendering
//!
//! Turns an encoded page image into something a UI can display through an
//! ordered chain of strategies, instruments every render with timing and
//! memory deltas, and verifies that the result reached the view.
//!
//! ```no_run
//! use page_render::{HeadlessHost, InMemoryRasterizer, PageRenderer, RenderConfig};
//! use std::sync::Arc;
//!
//! page_render::telemetry::init_tracing("info");
//! let renderer = PageRenderer::new(
//!     &RenderConfig::default(),
//!     Arc::new(InMemoryRasterizer::new()),
//!     Arc::new(HeadlessHost),
//! );
//! # let _ = renderer;
//! ```

pub mod renderer;
pub mod telemetry;

pub use page_render_core::*;
pub use renderer::PageRenderer;

pub mod strategies {
    pub use page_render_strategies::*;
}

pub mod binding {
    pub use page_render_binding::*;
}
