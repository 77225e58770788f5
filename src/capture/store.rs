//! Capture files - one hex payload per line

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("capture file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture file {0} holds no payloads")]
    Empty(PathBuf),
}

/// Directory of `.cap` capture files
#[derive(Debug, Clone)]
pub struct CaptureStore {
    dir: PathBuf,
}

impl CaptureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `payload` to `<dir>/<name>.cap`, replacing characters that
    /// would escape the directory
    pub fn save(&self, name: &str, payload: &str) -> Result<PathBuf, StoreError> {
        let name: String = name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            return self.save_timestamped(payload);
        }
        let path = self.dir.join(format!("{}.cap", name));

        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, format!("{}\n", payload)).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Saved capture as {}", path.display());
        Ok(path)
    }

    /// Write `payload` under a name derived from the local time
    pub fn save_timestamped(&self, payload: &str) -> Result<PathBuf, StoreError> {
        let name = chrono::Local::now().format("%b%d_%H%M%S_payload").to_string();
        self.save(&name, payload)
    }

    /// Read every non-empty line of a capture file
    pub fn load(path: &Path) -> Result<Vec<String>, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let payloads: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if payloads.is_empty() {
            return Err(StoreError::Empty(path.to_path_buf()));
        }
        Ok(payloads)
    }
}
