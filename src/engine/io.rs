// src/engine/io.rs
//
// I/O: where encoded image bytes come from, and atomic writes of encoded output.

use crate::error::{ImagoidError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Image source - in-memory data, a memory-mapped file, or a file path read lazily
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory encoded image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped { path: PathBuf, map: Arc<Mmap> },
    /// File path for lazy loading (nothing is read until the pixels are needed)
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(data.into()))
    }

    /// Map `path` into memory now. Empty files cannot be mapped and are rejected.
    pub fn map_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let map = map_path(path)?;
        Ok(Source::Mapped {
            path: path.to_path_buf(),
            map: Arc::new(map),
        })
    }

    /// Path of the backing file, if any
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Source::Path(p) | Source::Mapped { path: p, .. } => Some(p),
            Source::Memory(_) => None,
        }
    }

    /// Bytes already in memory. `None` for lazy path sources.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Mapped { map, .. } => Some(map.as_ref()),
            Source::Path(_) => None,
        }
    }

    /// Run `f` over the source bytes. Path sources are memory-mapped for the
    /// duration of the call.
    pub fn with_bytes<T>(&self, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        match self {
            Source::Memory(data) => f(data),
            Source::Mapped { map, .. } => f(map),
            Source::Path(path) => {
                let map = map_path(path)?;
                debug!(path = %path.display(), bytes = map.len(), "mapped source file");
                f(&map)
            }
        }
    }

    /// Byte length of the encoded data (stats the file for path sources)
    pub fn len(&self) -> Result<u64> {
        match self {
            Source::Memory(data) => Ok(data.len() as u64),
            Source::Mapped { map, .. } => Ok(map.len() as u64),
            Source::Path(path) => std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| read_error(path, e)),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn map_path(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| read_error(path, e))?
        .len();
    if len == 0 {
        return Err(ImagoidError::decode_failed(format!(
            "'{}' is empty",
            path.display()
        )));
    }
    // Safety: the file is assumed not to be modified externally while mapped.
    unsafe { Mmap::map(&file) }.map_err(|e| ImagoidError::mmap_failed(lossy(path), e))
}

fn read_error(path: &Path, e: std::io::Error) -> ImagoidError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ImagoidError::file_not_found(lossy(path))
    } else {
        ImagoidError::file_read_failed(lossy(path), e)
    }
}

pub(crate) fn lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Write `data` to `path` atomically: a temp file in the same directory is
/// written, synced, then renamed over the target.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let write_err = |e: std::io::Error| ImagoidError::file_write_failed(lossy(path), e);

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

/// Copy an encoded file verbatim (same format, no re-encode).
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    let data = std::fs::read(from).map_err(|e| read_error(from, e))?;
    write_atomic(to, &data)
}
