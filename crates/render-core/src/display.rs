//! Display image model and the host toolkit seam
//!
//! The host UI toolkit offers two ways to build something it can show:
//! from an in-memory pixel buffer, or from a file reference. [`DisplayHost`]
//! abstracts both so strategies never talk to a concrete toolkit.

use crate::error::DisplayError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Bytes per pixel of a [`WritableBitmap`] (RGBA8)
pub const BYTES_PER_PIXEL: usize = 4;

/// Mutable, pixel-buffer-backed bitmap.
///
/// Writers copy pixels in and then call [`WritableBitmap::invalidate`];
/// observers watch [`WritableBitmap::generation`] to learn that new content
/// is available.
#[derive(Debug)]
pub struct WritableBitmap {
    width: u32,
    height: u32,
    pixels: RwLock<Vec<u8>>,
    generation: AtomicU64,
}

impl WritableBitmap {
    /// Allocate a zeroed RGBA8 bitmap
    pub fn new(width: u32, height: u32) -> Result<Self, DisplayError> {
        if width == 0 || height == 0 {
            return Err(DisplayError::InvalidDimensions { width, height });
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(DisplayError::InvalidDimensions { width, height })?;
        Ok(Self {
            width,
            height,
            pixels: RwLock::new(vec![0; len]),
            generation: AtomicU64::new(0),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Size of the backing buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Copy RGBA8 pixel data into the backing buffer.
    ///
    /// The source must match the bitmap size exactly.
    pub fn write_pixels(&self, src: &[u8]) -> Result<(), DisplayError> {
        let expected = self.byte_len();
        if src.len() != expected {
            return Err(DisplayError::BufferSizeMismatch {
                expected,
                actual: src.len(),
            });
        }
        let mut pixels = self.pixels.write().unwrap_or_else(PoisonError::into_inner);
        pixels.copy_from_slice(src);
        Ok(())
    }

    /// Mark the content as changed so observers redraw
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of committed content updates
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Read access to the raw RGBA8 buffer
    pub fn pixels(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.pixels.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An image the host UI can display
#[derive(Debug, Clone)]
pub enum DisplayImage {
    /// Backed by an in-memory pixel buffer
    Bitmap(Arc<WritableBitmap>),

    /// Backed by a file the toolkit loads by reference
    FileBacked {
        path: PathBuf,
        uri: String,
        width: u32,
        height: u32,
        file_size: u64,
    },
}

impl DisplayImage {
    pub fn width(&self) -> u32 {
        match self {
            DisplayImage::Bitmap(bitmap) => bitmap.width(),
            DisplayImage::FileBacked { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            DisplayImage::Bitmap(bitmap) => bitmap.height(),
            DisplayImage::FileBacked { height, .. } => *height,
        }
    }

    /// Output size reported in success telemetry
    pub fn byte_size(&self) -> u64 {
        match self {
            DisplayImage::Bitmap(bitmap) => bitmap.byte_len() as u64,
            DisplayImage::FileBacked { file_size, .. } => *file_size,
        }
    }

    /// Backing file, if this image is file-backed
    pub fn backing_file(&self) -> Option<&Path> {
        match self {
            DisplayImage::Bitmap(_) => None,
            DisplayImage::FileBacked { path, .. } => Some(path),
        }
    }
}

/// Host UI toolkit capabilities used by rendering strategies
pub trait DisplayHost: Send + Sync {
    /// Allocate a writable bitmap the toolkit can display
    fn allocate_bitmap(&self, width: u32, height: u32) -> Result<Arc<WritableBitmap>, DisplayError>;

    /// Build an image that references `path` instead of holding pixels
    fn image_from_file(&self, path: &Path) -> Result<DisplayImage, DisplayError>;
}

/// Toolkit-free host used by services, tests and headless tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessHost;

impl DisplayHost for HeadlessHost {
    fn allocate_bitmap(&self, width: u32, height: u32) -> Result<Arc<WritableBitmap>, DisplayError> {
        Ok(Arc::new(WritableBitmap::new(width, height)?))
    }

    fn image_from_file(&self, path: &Path) -> Result<DisplayImage, DisplayError> {
        let metadata =
            std::fs::metadata(path).map_err(|_| DisplayError::FileNotFound(path.to_path_buf()))?;
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| DisplayError::Decode(format!("{}: {e}", path.display())))?;
        Ok(DisplayImage::FileBacked {
            path: path.to_path_buf(),
            uri: file_uri(path),
            width,
            height,
            file_size: metadata.len(),
        })
    }
}

/// `file://` URI for an absolute or relative path
pub fn file_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let text = absolute.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_rejects_zero_dimensions() {
        assert!(matches!(
            WritableBitmap::new(0, 10),
            Err(DisplayError::InvalidDimensions { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_write_pixels_and_invalidate() {
        let bitmap = WritableBitmap::new(2, 2).unwrap();
        let src: Vec<u8> = (0..16).collect();
        bitmap.write_pixels(&src).unwrap();
        assert_eq!(bitmap.generation(), 0);
        bitmap.invalidate();
        assert_eq!(bitmap.generation(), 1);
        assert_eq!(bitmap.pixels().as_slice(), src.as_slice());
    }

    #[test]
    fn test_write_pixels_size_mismatch() {
        let bitmap = WritableBitmap::new(2, 2).unwrap();
        let err = bitmap.write_pixels(&[0; 3]).unwrap_err();
        assert!(matches!(
            err,
            DisplayError::BufferSizeMismatch {
                expected: 16,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_headless_host_missing_file() {
        let err = HeadlessHost
            .image_from_file(Path::new("/definitely/not/here.png"))
            .unwrap_err();
        assert!(matches!(err, DisplayError::FileNotFound(_)));
    }

    #[test]
    fn test_file_uri_absolute() {
        assert_eq!(file_uri(Path::new("/tmp/page.png")), "file:///tmp/page.png");
    }
}
