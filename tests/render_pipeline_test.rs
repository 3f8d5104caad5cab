//! End-to-end rendering through the default chain

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use page_render::config::TempFileConfig;
use page_render::strategies::{FileRoundtripStrategy, TempFileTracker, FILE_ROUNDTRIP_STRATEGY};
use page_render::{
    DisplayImage, DocumentHandle, EncodedStream, EventKind, HeadlessHost, InMemoryRasterizer,
    MemoryMonitor, ObservabilityService, PageRenderer, RecordingSink, RenderConfig, RenderContext,
    RenderError, RenderStrategy, RenderingCoordinator, StrategyError, StrategyRegistry,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

const DOC: &str = "/library/handbook.pdf";

fn encoded_page(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgba([32u8, 64, 128, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn rasterizer_with(page: Vec<u8>) -> (Arc<InMemoryRasterizer>, DocumentHandle) {
    let document = DocumentHandle::new(DOC, 2);
    let rasterizer = InMemoryRasterizer::new();
    rasterizer.insert_page(&document.path, 1, page);
    (Arc::new(rasterizer), document)
}

fn config_in(dir: &Path) -> RenderConfig {
    RenderConfig {
        temp_files: Some(TempFileConfig {
            directory: Some(dir.to_path_buf()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn ctx() -> RenderContext {
    RenderContext::new(DOC, 1, 2, 96, "viewer")
}

/// Primary strategy that always blows up
struct ThrowingStrategy;

#[async_trait]
impl RenderStrategy for ThrowingStrategy {
    fn name(&self) -> &str {
        "throwing"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn try_render(
        &self,
        _stream: &mut EncodedStream,
        _ctx: &RenderContext,
    ) -> Result<Option<DisplayImage>, StrategyError> {
        Err(StrategyError::ExecutionFailed("native loader crashed".to_string()))
    }
}

#[tokio::test]
async fn test_throwing_primary_falls_back_to_file_roundtrip() {
    page_render::telemetry::init_tracing("debug");
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, document) = rasterizer_with(encoded_page(6, 4));
    let tracker = Arc::new(TempFileTracker::new(dir.path()));
    let registry = StrategyRegistry::new()
        .with(Arc::new(FileRoundtripStrategy::new(
            Arc::new(HeadlessHost),
            tracker.clone(),
        )))
        .with(Arc::new(ThrowingStrategy));
    let sink = Arc::new(RecordingSink::new());
    let coordinator = RenderingCoordinator::new(
        rasterizer,
        Arc::new(registry),
        ObservabilityService::new(Arc::new(MemoryMonitor::new()), sink.clone()),
    );

    let image = coordinator
        .render(&document, 1, 1.0, 96, &ctx())
        .await
        .expect("fallback image");
    assert!(image.backing_file().unwrap().exists());

    let fallbacks: Vec<(String, String)> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::FallbackUsed {
                failed_strategy,
                succeeded_strategy,
                ..
            } => Some((failed_strategy, succeeded_strategy)),
            _ => None,
        })
        .collect();
    assert_eq!(
        fallbacks,
        vec![("throwing".to_string(), FILE_ROUNDTRIP_STRATEGY.to_string())]
    );
}

#[tokio::test]
async fn test_default_chain_renders_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, document) = rasterizer_with(encoded_page(6, 4));
    let sink = Arc::new(RecordingSink::new());
    let renderer = PageRenderer::with_sink(
        &config_in(dir.path()),
        rasterizer,
        Arc::new(HeadlessHost),
        sink.clone(),
    );

    let success = renderer
        .render_detailed(&document, 1, 1.0, 96, &ctx())
        .await
        .unwrap();
    assert_eq!(success.strategy, "in-memory");
    assert!(!success.used_fallback());
    assert!(matches!(success.image, DisplayImage::Bitmap(_)));
    assert!(renderer.tracker().is_empty());

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0].kind, EventKind::Started));
    match &events[1].kind {
        EventKind::Succeeded { output_bytes, .. } => assert_eq!(*output_bytes, 6 * 4 * 4),
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(events[0].operation_id, events[1].operation_id);
}

#[tokio::test]
async fn test_undecodable_page_exhausts_chain() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, document) = rasterizer_with(b"corrupted page bytes".to_vec());
    let sink = Arc::new(RecordingSink::new());
    let renderer = PageRenderer::with_sink(
        &config_in(dir.path()),
        rasterizer,
        Arc::new(HeadlessHost),
        sink.clone(),
    );

    let err = renderer
        .render_detailed(&document, 1, 1.0, 96, &ctx())
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Exhausted { .. }));

    let failures: Vec<Vec<String>> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::Failed { attempted, .. } => Some(attempted),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![vec!["in-memory".to_string(), "file-roundtrip".to_string()]]
    );
    assert!(renderer.tracker().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_page_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, document) = rasterizer_with(encoded_page(2, 2));
    let renderer = PageRenderer::new(&config_in(dir.path()), rasterizer, Arc::new(HeadlessHost));

    assert!(renderer.render(&document, 2, 1.0, 96, &ctx()).await.is_none());
    assert!(renderer.render(&document, 3, 1.0, 96, &ctx()).await.is_none());
}

#[tokio::test]
async fn test_shutdown_removes_roundtrip_files() {
    let dir = tempfile::tempdir().unwrap();
    let (rasterizer, _document) = rasterizer_with(encoded_page(3, 3));
    let renderer = PageRenderer::new(&config_in(dir.path()), rasterizer, Arc::new(HeadlessHost));

    // Drive the fallback strategy directly to leave a tracked file behind
    let strategy = renderer
        .coordinator()
        .registry()
        .get(FILE_ROUNDTRIP_STRATEGY)
        .unwrap();
    let mut stream = EncodedStream::from_bytes(encoded_page(3, 3));
    let image = strategy.try_render(&mut stream, &ctx()).await.unwrap().unwrap();
    let path = image.backing_file().unwrap().to_path_buf();
    assert!(path.exists());

    assert_eq!(renderer.shutdown(), 1);
    assert!(!path.exists());
}
