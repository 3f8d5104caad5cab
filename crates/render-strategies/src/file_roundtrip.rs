//! File-roundtrip rendering strategy
//!
//! Writes the encoded page to a uniquely named temp file and asks the host
//! for an image that references the file, which loads reliably where the
//! toolkit's buffer and stream loaders do not.

use crate::image_io::file_extension;
use crate::temp_files::{remove_quietly, OwnerId, TempFileTracker};
use async_trait::async_trait;
use page_render_core::{
    DisplayHost, DisplayImage, EncodedStream, RenderContext, RenderStrategy, StrategyError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

pub const FILE_ROUNDTRIP_STRATEGY: &str = "file-roundtrip";
pub const FILE_ROUNDTRIP_PRIORITY: i32 = 10;

pub struct FileRoundtripStrategy {
    host: Arc<dyn DisplayHost>,
    tracker: Arc<TempFileTracker>,
    owner: OwnerId,
}

impl FileRoundtripStrategy {
    pub fn new(host: Arc<dyn DisplayHost>, tracker: Arc<TempFileTracker>) -> Self {
        let owner = tracker.register_owner();
        Self {
            host,
            tracker,
            owner,
        }
    }

    pub fn tracker(&self) -> &Arc<TempFileTracker> {
        &self.tracker
    }

    /// Delete every file this instance created
    pub fn cleanup(&self) -> usize {
        self.tracker.cleanup_owner(self.owner)
    }

    fn unique_path(&self, ctx: &RenderContext, extension: &str) -> PathBuf {
        self.tracker.directory().join(format!(
            "{}_{}.{}",
            ctx.artifact_stem(),
            Uuid::new_v4().simple(),
            extension
        ))
    }
}

#[async_trait]
impl RenderStrategy for FileRoundtripStrategy {
    fn name(&self) -> &str {
        FILE_ROUNDTRIP_STRATEGY
    }

    fn priority(&self) -> i32 {
        FILE_ROUNDTRIP_PRIORITY
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

        if let Err(e) = tokio::fs::create_dir_all(self.tracker.directory()).await {
            debug!(
                "Cannot create temp directory {}: {}",
                self.tracker.directory().display(),
                e
            );
            return Ok(None);
        }

        let pending = PendingFile::new(self.unique_path(ctx, file_extension(&bytes)));
        if let Err(e) = write_new_file(pending.path(), &bytes).await {
            debug!(
                "Page {}: writing {} failed: {}",
                ctx.page_number(),
                pending.path().display(),
                e
            );
            return Ok(None);
        }

        match self.host.image_from_file(pending.path()) {
            Ok(image) => {
                self.tracker.track(pending.commit(), self.owner);
                Ok(Some(image))
            }
            Err(e) => {
                debug!(
                    "Page {}: host rejected {}: {}",
                    ctx.page_number(),
                    pending.path().display(),
                    e
                );
                Ok(None)
            }
        }
    }
}

/// Newly written file, deleted on drop unless committed.
///
/// Covers early returns, host errors and unwinding out of the host call.
struct PendingFile {
    path: PathBuf,
    committed: bool,
}

impl PendingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand its path over
    fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed {
            remove_quietly(&self.path);
        }
    }
}

impl Drop for FileRoundtripStrategy {
    fn drop(&mut self) {
        self.cleanup();
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}
