//! Backing sources for trace bytes.
//!
//! The indexer consumes a source once, forward-only; the range loader slices
//! arbitrary byte ranges afterwards. Both go through [`TraceSource`] so the
//! replay session works identically over files and in-memory traces.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Random-access byte source for a trace log.
pub trait TraceSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the bytes `[start, end)`, clamped to the source length.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>>;

    /// A fresh forward-only reader over the whole source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened.
    fn reader(&self) -> io::Result<Box<dyn BufRead + Send>>;
}

/// A trace log on disk.
///
/// Holds only the path and the length captured at open time; every read opens
/// its own handle, so concurrent range loads share no state.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    /// Open a trace file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)?.len();
        Ok(Self { path, len })
    }

    /// The backing path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TraceSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let start = start.min(self.len);
        let end = end.min(self.len);
        if start >= end {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buffer = Vec::with_capacity((end - start) as usize);
        file.take(end - start).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn reader(&self) -> io::Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

/// An in-memory trace, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    /// Wrap trace bytes.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl TraceSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let start = (start.min(self.len())) as usize;
        let end = (end.min(self.len())) as usize;
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(self.data[start..end].to_vec())
    }

    fn reader(&self) -> io::Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}
