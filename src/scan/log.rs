//! Append-only scan log
//!
//! One block per hit:
//!
//! ```text
//! A signal was found on :<frequency>
//! <hex payload>
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::capture::Capture;

/// Scan log owned by a single scan session
pub struct ScanLog {
    path: PathBuf,
    file: File,
}

impl ScanLog {
    /// Create a new log in `dir`, named after the local time
    pub fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name = chrono::Local::now().format("scan_%Y%m%d_%H%M%S.log").to_string();
        Self::open(&dir.join(name))
    }

    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Logging scan hits to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, capture: &Capture) -> io::Result<()> {
        write!(
            self.file,
            "A signal was found on :{}\n{}\n",
            capture.frequency(),
            capture.payload()
        )?;
        self.file.flush()
    }
}
