//! Re-readable whole-file counter source.

use std::io;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// A counter source file that is re-read in full on every sampling cycle.
///
/// The initial read happens at open time so the caller can derive the
/// source's shape (row and column counts) before any thread starts; an
/// unreadable source at startup is a fatal fault.
pub struct StatSource<F: FileSystem> {
    fs: F,
    path: PathBuf,
    contents: String,
}

impl<F: FileSystem> StatSource<F> {
    /// Opens the source and performs the initial full read.
    pub fn open(fs: F, path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let contents = fs.read_to_string(&path)?;
        Ok(Self { fs, path, contents })
    }

    /// Re-reads the whole file, replacing the buffered contents. Returns
    /// the number of bytes read.
    pub fn refresh(&mut self) -> io::Result<usize> {
        self.contents = self.fs.read_to_string(&self.path)?;
        Ok(self.contents.len())
    }

    /// The most recently read contents.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
