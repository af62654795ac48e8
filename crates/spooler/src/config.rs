use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::controller::NegotiationOptions;

const MIN_EXPORT_BUFFER: usize = 512;
const MAX_EXPORT_BUFFER: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read spooler config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse spooler config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize spooler config {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write spooler config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Settings that shape how a print session negotiates and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolerConfig {
    #[serde(default = "default_true")]
    pub preview_single_page: bool,
    #[serde(default = "default_export_buffer_size")]
    pub export_buffer_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_export_buffer_size() -> usize {
    8192
}

impl Default for SpoolerConfig {
    fn default() -> Self {
        Self {
            preview_single_page: true,
            export_buffer_size: default_export_buffer_size(),
        }
    }
}

impl SpoolerConfig {
    /// Loads the config at `path`, falling back to defaults when it is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: SpoolerConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.sanitize();
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn sanitize(&mut self) {
        self.export_buffer_size = self
            .export_buffer_size
            .clamp(MIN_EXPORT_BUFFER, MAX_EXPORT_BUFFER);
    }

    pub fn negotiation_options(&self) -> NegotiationOptions {
        NegotiationOptions {
            preview_single_page: self.preview_single_page,
        }
    }
}
