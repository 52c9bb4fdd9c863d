//! Byte source/sink capability traits for data-phase streaming.
//!
//! Large transfers are pumped through these two small interfaces so the
//! session never buffers a whole object in memory. A source may advertise its
//! total size up front; a sink is told the total when the data phase begins.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Producer side of a data phase (uploads, SendObject).
#[async_trait]
pub trait ByteSource: Send {
    /// Fill `buf`, returning the number of bytes produced; 0 means end.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Total size if known; used for the container length field.
    fn total_hint(&self) -> Option<u64>;
}

/// Consumer side of a data phase (downloads, GetObject).
#[async_trait]
pub trait ByteSink: Send {
    /// Accept the next chunk of payload bytes.
    async fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Called once when the advertised data-phase size is known.
    fn set_total(&mut self, _total: u64) {}
}

/// In-memory source over a byte vector.
pub struct VecSource {
    data: Vec<u8>,
    pos: usize,
}

impl VecSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

#[async_trait]
impl ByteSource for VecSource {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = (self.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn total_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// In-memory sink collecting into a byte vector.
#[derive(Default)]
pub struct VecSink {
    data: Vec<u8>,
    total: Option<u64>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}

#[async_trait]
impl ByteSink for VecSink {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn set_total(&mut self, total: u64) {
        self.total = Some(total);
        self.data.reserve(total as usize);
    }
}

/// File-backed source for uploads.
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self { file, size })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf).await?)
    }

    fn total_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}

/// File-backed sink for downloads.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { file: File::create(path).await? })
    }

    pub async fn flush(mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).await?;
        Ok(())
    }
}
