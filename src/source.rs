//! Local content abstraction for transfers.
//!
//! Adapters never read whole files through a single buffer; they go through
//! [`FileSource`], which exposes the size, a byte-range reader and a
//! streaming content digest. In-memory byte slices implement it for tests
//! and small payloads, [`LocalFile`] backs it with the filesystem.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::Oid;

const HASH_CHUNK: usize = 64 * 1024;

/// Content to be transferred to or from LFS storage.
pub trait FileSource {
    /// Total content size in bytes.
    fn size(&self) -> u64;

    /// Read the byte range `[start, end)`; `None` reads to the end.
    ///
    /// Ranges are clamped to the available content.
    fn read_range(&self, start: u64, end: Option<u64>) -> io::Result<Vec<u8>>;

    /// MIME type of the content, when known.
    fn content_type(&self) -> Option<&str> {
        None
    }

    /// Compute the SHA-256 content digest, streaming in chunks.
    ///
    /// `progress` is invoked with whole percentages as hashing advances.
    fn digest(&self, mut progress: Option<&mut dyn FnMut(u8)>) -> io::Result<Oid> {
        let total = self.size();
        let mut hasher = Sha256::new();
        let mut offset = 0u64;
        let mut last_percent = 0u8;

        while offset < total {
            let end = (offset + HASH_CHUNK as u64).min(total);
            let chunk = self.read_range(offset, Some(end))?;
            if chunk.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "content ended before its declared size",
                ));
            }
            hasher.update(&chunk);
            offset += chunk.len() as u64;

            if let Some(callback) = progress.as_deref_mut() {
                let percent = (offset * 100 / total) as u8;
                if percent != last_percent {
                    last_percent = percent;
                    callback(percent);
                }
            }
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(Oid::from_bytes(bytes))
    }
}

impl FileSource for [u8] {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_range(&self, start: u64, end: Option<u64>) -> io::Result<Vec<u8>> {
        let len = self.len() as u64;
        let start = start.min(len) as usize;
        let end = end.unwrap_or(len).min(len) as usize;
        Ok(self[start..end.max(start)].to_vec())
    }
}

/// A file on disk, hashed and read in ranges without loading it whole.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    size: u64,
    content_type: Option<String>,
}

impl LocalFile {
    /// Open a file and record its current size.
    ///
    /// The size is captured once; the file must not change between open and
    /// transfer, or the negotiated descriptors will no longer match.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let size = std::fs::metadata(&path)?.len();
        Ok(LocalFile {
            path,
            size,
            content_type: None,
        })
    }

    /// Set the MIME type reported for uploads.
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileSource for LocalFile {
    fn size(&self) -> u64 {
        self.size
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn read_range(&self, start: u64, end: Option<u64>) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;

        let mut buffer = Vec::new();
        match end {
            Some(end) => {
                file.take(end.saturating_sub(start)).read_to_end(&mut buffer)?;
            }
            None => {
                file.read_to_end(&mut buffer)?;
            }
        }
        Ok(buffer)
    }

    // Single sequential pass instead of the range-read default, so hashing a
    // large file opens it once.
    fn digest(&self, mut progress: Option<&mut dyn FnMut(u8)>) -> io::Result<Oid> {
        let mut file = File::open(&self.path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; HASH_CHUNK];
        let mut hashed = 0u64;
        let mut last_percent = 0u8;

        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            hashed += n as u64;

            if let (Some(callback), true) = (progress.as_deref_mut(), self.size > 0) {
                let percent = (hashed.min(self.size) * 100 / self.size) as u8;
                if percent != last_percent {
                    last_percent = percent;
                    callback(percent);
                }
            }
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(Oid::from_bytes(bytes))
    }
}
