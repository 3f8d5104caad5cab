//! Encoded page stream shared across strategy attempts

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Readable, seekable byte source
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Encoded image bytes (PNG) produced by the rasterizer for one page.
///
/// The coordinator owns the stream for the whole fallback chain and lends it
/// to one strategy at a time via `&mut`, rewinding it before every attempt.
/// Dropping the stream releases the underlying source.
pub struct EncodedStream {
    inner: Box<dyn ReadSeek>,
    len: u64,
}

impl EncodedStream {
    /// Wrap an arbitrary seekable source, measuring its length
    pub fn new<R: ReadSeek + 'static>(mut source: R) -> io::Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Box::new(source),
            len,
        })
    }

    /// Wrap an in-memory buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self {
            inner: Box::new(Cursor::new(bytes)),
            len,
        }
    }

    /// Total encoded length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move the cursor back to the first byte
    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    /// Current cursor position
    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Read from the current position to the end
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.inner.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl Read for EncodedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for EncodedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl fmt::Debug for EncodedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedStream")
            .field("len", &self.len)
            .finish()
    }
}
