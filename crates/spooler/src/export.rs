use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::provider::ArtifactIo;

/// Errors raised while handing the rendered artifact to an export target.
/// 將繪製結果匯出至目標時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no export target was requested for this session")]
    NotRequested,
    #[error("failed to copy print job data: {0}")]
    Io(#[from] io::Error),
}

/// Rendered artifact stored on disk by the provider.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    path: PathBuf,
}

impl FileArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtifactIo for FileArtifact {
    fn byte_len(&self) -> io::Result<u64> {
        fs::metadata(&self.path).map(|metadata| metadata.len())
    }

    fn export_to(&self, target: &mut dyn Write, buffer_size: usize) -> io::Result<u64> {
        let source = File::open(&self.path)?;
        let mut reader = BufReader::with_capacity(buffer_size.max(1), source);
        let copied = io::copy(&mut reader, target)?;
        target.flush()?;
        Ok(copied)
    }
}
