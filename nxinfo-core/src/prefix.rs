//! Leading-byte reader used for format sniffing.

use crate::error::Result;
use crate::format::{classify, FormatKind};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Number of leading bytes kept for sniffing.
pub const PREFIX_LEN: usize = 16384;

/// The first [`PREFIX_LEN`] bytes of a file.
///
/// The file is memory-mapped only long enough to copy the prefix; the
/// mapping and the descriptor are released before `read` returns.
#[derive(Debug, Clone)]
pub struct FilePrefix {
    bytes: Vec<u8>,
    path: PathBuf,
}

impl FilePrefix {
    /// Reads the leading bytes of a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len();

        let bytes = if len == 0 {
            Vec::new()
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file)? };
            let end = mmap.len().min(PREFIX_LEN);
            mmap[..end].to_vec()
        };

        Ok(Self {
            bytes,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the prefix as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Classifies the prefix.
    #[must_use]
    pub fn format(&self) -> FormatKind {
        classify(&self.bytes)
    }
}
