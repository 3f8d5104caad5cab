//! Portable decoding of encoded page images
//!
//! Decoding goes through the `image` crate rather than any platform loader,
//! producing a tightly packed RGBA8 buffer ready to be copied into a
//! display bitmap.

use image::ImageFormat;
use thiserror::Error;

/// Errors that can occur while decoding an encoded page
#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("Empty image buffer")]
    Empty,

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Decode task failed: {0}")]
    TaskFailed(String),
}

/// Decoded page pixels, RGBA8, rows packed without padding
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decode an encoded image (format detected from content) to RGBA8
pub fn decode_rgba(bytes: &[u8]) -> Result<DecodedPage, ImageIoError> {
    if bytes.is_empty() {
        return Err(ImageIoError::Empty);
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| ImageIoError::DecodeError(e.to_string()))?;
    let rgba = img.into_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(DecodedPage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

/// Decode on the blocking pool so large pages don't stall the runtime
pub async fn decode_rgba_blocking(bytes: Vec<u8>) -> Result<DecodedPage, ImageIoError> {
    tokio::task::spawn_blocking(move || decode_rgba(&bytes))
        .await
        .map_err(|e| ImageIoError::TaskFailed(e.to_string()))?
}

/// File extension matching the encoded content, `bin` when unrecognized
pub fn file_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(format) => format.extensions_str().first().copied().unwrap_or("bin"),
        Err(_) => "bin",
    }
}
