// src/engine/io.rs
//
// I/O operations: Source enum, memory-mapped file reads and atomic writes.

use crate::error::HandleError;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::common::EngineResult;

/// Bytes of an image before decode - either owned or memory-mapped
#[derive(Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Vec<u8>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Mmap),
}

impl Source {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Memory(data) => data.as_slice(),
            Source::Mapped(mmap) => mmap.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map a whole file into memory.
///
/// Missing paths fail with `FileNotFound`; empty files come back as an empty
/// in-memory source since a zero-length mapping is not portable.
pub fn read_file(path: &Path) -> EngineResult<Source> {
    let display = path.display().to_string();

    // Validate that the file exists (fast check, no read)
    if !path.exists() {
        return Err(HandleError::file_not_found(display));
    }

    let file = File::open(path).map_err(|e| HandleError::file_read_failed(display.clone(), e))?;
    let len = file
        .metadata()
        .map_err(|e| HandleError::file_read_failed(display.clone(), e))?
        .len();
    if len == 0 {
        return Ok(Source::Memory(Vec::new()));
    }

    // Safety: We assume the file won't be modified externally during processing.
    // The mapping only lives for the duration of one decode.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| HandleError::file_read_failed(display.clone(), e))?;
    debug!(path = %path.display(), len, "mapped source file");
    Ok(Source::Mapped(mmap))
}

/// Write `data` atomically: temp file in the target directory, fsync, then
/// rename over `path`.
///
/// Returns `WriteFailed` when the persisted file does not hold exactly
/// `data.len()` bytes.
pub fn write_atomic(path: &Path, data: &[u8]) -> EngineResult<()> {
    let display = path.display().to_string();

    // Create temp file in the same directory as the target file
    // This ensures rename() works (cross-filesystem rename can fail)
    let output_dir: PathBuf = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut temp_file = NamedTempFile::new_in(&output_dir)
        .map_err(|e| HandleError::file_write_failed(output_dir.display().to_string(), e))?;

    let temp_display = temp_file.path().display().to_string();
    temp_file
        .write_all(data)
        .map_err(|e| HandleError::file_write_failed(temp_display.clone(), e))?;

    // Ensure data is flushed to disk
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| HandleError::file_write_failed(temp_display, e))?;

    // Atomic rename: tempfile handles cleanup automatically if this fails
    temp_file
        .persist(path)
        .map_err(|e| HandleError::file_write_failed(display.clone(), e.error))?;

    let written = std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| HandleError::file_write_failed(display.clone(), e))?;
    if written != data.len() as u64 {
        return Err(HandleError::write_failed(display));
    }
    Ok(())
}
