//! Wiring of the default rendering stack from configuration

use page_render_core::{
    DisplayHost, DisplayImage, DocumentHandle, EventSink, MemoryMonitor, ObservabilityService,
    PageRasterizer, RenderConfig, RenderContext, RenderError, RenderSuccess, RenderingCoordinator,
    TracingSink,
};
use page_render_strategies::{default_registry, TempFileTracker};
use std::sync::Arc;
use tracing::info;

/// Coordinator over the default chain plus the temp-file tracker it shares
pub struct PageRenderer {
    coordinator: RenderingCoordinator,
    tracker: Arc<TempFileTracker>,
}

impl PageRenderer {
    /// Default stack with events rendered through `tracing`
    pub fn new(
        config: &RenderConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        host: Arc<dyn DisplayHost>,
    ) -> Self {
        Self::with_sink(config, rasterizer, host, Arc::new(TracingSink))
    }

    pub fn with_sink(
        config: &RenderConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        host: Arc<dyn DisplayHost>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let tracker = Arc::new(TempFileTracker::from_config(config));
        let registry = default_registry(host, tracker.clone());
        info!(
            "Render chain: {:?}, temp dir {}",
            registry.describe(),
            tracker.directory().display()
        );

        let monitor = Arc::new(MemoryMonitor::with_thresholds(config.memory_thresholds()));
        let observability = ObservabilityService::new(monitor, sink);

        Self {
            coordinator: RenderingCoordinator::new(rasterizer, Arc::new(registry), observability),
            tracker,
        }
    }

    pub fn coordinator(&self) -> &RenderingCoordinator {
        &self.coordinator
    }

    pub fn tracker(&self) -> &Arc<TempFileTracker> {
        &self.tracker
    }

    pub async fn render(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
        ctx: &RenderContext,
    ) -> Option<DisplayImage> {
        self.coordinator
            .render(document, page_number, zoom, dpi, ctx)
            .await
    }

    pub async fn render_detailed(
        &self,
        document: &DocumentHandle,
        page_number: u32,
        zoom: f32,
        dpi: u32,
        ctx: &RenderContext,
    ) -> Result<RenderSuccess, RenderError> {
        self.coordinator
            .render_detailed(document, page_number, zoom, dpi, ctx)
            .await
    }

    /// Delete every temp file written so far, for use at shutdown
    pub fn shutdown(&self) -> usize {
        self.tracker.cleanup_all()
    }
}
