//! In-memory rendering strategy
//!
//! Decodes the encoded page with the portable decoder and copies the pixels
//! straight into a toolkit bitmap, bypassing the toolkit's own stream-based
//! image loader.

use crate::image_io::decode_rgba_blocking;
use async_trait::async_trait;
use page_render_core::{
    DisplayHost, DisplayImage, EncodedStream, RenderContext, RenderStrategy, StrategyError,
};
use std::sync::Arc;
use tracing::debug;

pub const IN_MEMORY_STRATEGY: &str = "in-memory";
pub const IN_MEMORY_PRIORITY: i32 = 0;

pub struct InMemoryStrategy {
    host: Arc<dyn DisplayHost>,
}

impl InMemoryStrategy {
    pub fn new(host: Arc<dyn DisplayHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl RenderStrategy for InMemoryStrategy {
    fn name(&self) -> &str {
        IN_MEMORY_STRATEGY
    }

    fn priority(&self) -> i32 {
        IN_MEMORY_PRIORITY
    }

    async fn try_render(
        &self,
        stream: &mut EncodedStream,
        ctx: &RenderContext,
    ) -> Result<Option<DisplayImage>, StrategyError> {
        let bytes = match stream.read_all() {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!("Page {}: encoded stream is empty", ctx.page_number());
                return Ok(None);
            }
            Err(e) => {
                debug!("Page {}: failed to read encoded stream: {}", ctx.page_number(), e);
                return Ok(None);
            }
        };

        let decoded = match decode_rgba_blocking(bytes).await {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Page {}: {}", ctx.page_number(), e);
                return Ok(None);
            }
        };

        let bitmap = match self.host.allocate_bitmap(decoded.width, decoded.height) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                debug!("Page {}: bitmap allocation failed: {}", ctx.page_number(), e);
                return Ok(None);
            }
        };

        if let Err(e) = bitmap.write_pixels(&decoded.rgba) {
            debug!("Page {}: pixel copy failed: {}", ctx.page_number(), e);
            return Ok(None);
        }
        bitmap.invalidate();

        debug!(
            "Page {}: decoded {}x{} into bitmap",
            ctx.page_number(),
            decoded.width,
            decoded.height
        );
        Ok(Some(DisplayImage::Bitmap(bitmap)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgba};
    use page_render_core::HeadlessHost;
    use std::io::Cursor;

    fn png_stream(width: u32, height: u32) -> EncodedStream {
        let img = ImageBuffer::from_pixel(width, height, Rgba([200u8, 100, 50, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        EncodedStream::from_bytes(buf)
    }

    fn ctx() -> RenderContext {
        RenderContext::new("/docs/report.pdf", 2, 5, 144, "viewer")
    }

    #[tokio::test]
    async fn test_renders_bitmap_with_page_pixels() {
        let strategy = InMemoryStrategy::new(Arc::new(HeadlessHost));
        let image = strategy
            .try_render(&mut png_stream(4, 3), &ctx())
            .await
            .unwrap()
            .expect("bitmap");

        match image {
            DisplayImage::Bitmap(bitmap) => {
                assert_eq!((bitmap.width(), bitmap.height()), (4, 3));
                assert_eq!(&bitmap.pixels()[..4], &[200, 100, 50, 255]);
                assert_eq!(bitmap.generation(), 1);
            }
            other => panic!("expected bitmap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_stream_yields_none() {
        let strategy = InMemoryStrategy::new(Arc::new(HeadlessHost));
        let mut stream = EncodedStream::from_bytes(b"definitely not a png".to_vec());
        assert!(strategy.try_render(&mut stream, &ctx()).await.unwrap().is_none());

        let mut empty = EncodedStream::from_bytes(Vec::new());
        assert!(strategy.try_render(&mut empty, &ctx()).await.unwrap().is_none());
    }
}
