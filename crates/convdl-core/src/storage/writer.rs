//! Temp-file writer with atomic finalize.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writer for a `.part` file next to the final path. Dropping it without
/// `finalize` removes the temp file, so a failed write leaves no debris and
/// never touches the final path.
pub(crate) struct TempFileWriter {
    file: Option<File>,
    temp_path: PathBuf,
}

impl TempFileWriter {
    /// Create (truncating) the temp file.
    pub(crate) fn create(temp_path: &Path) -> io::Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp_path)?;
        Ok(Self {
            file: Some(file),
            temp_path: temp_path.to_path_buf(),
        })
    }

    pub(crate) fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.write_all(data),
            None => Err(io::Error::new(io::ErrorKind::Other, "temp file already closed")),
        }
    }

    /// Sync file data to disk. Call before `finalize` for durability.
    pub(crate) fn sync(&self) -> io::Result<()> {
        match self.file.as_ref() {
            Some(f) => f.sync_all(),
            None => Ok(()),
        }
    }

    /// Rename the temp file over `final_path`, replacing any previous file there.
    pub(crate) fn finalize(mut self, final_path: &Path) -> io::Result<()> {
        drop(self.file.take());
        std::fs::rename(&self.temp_path, final_path)?;
        self.temp_path = PathBuf::new();
        Ok(())
    }
}

impl Drop for TempFileWriter {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.temp_path.as_os_str().is_empty() {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.temp_path.display(), "could not remove temp file: {}", e);
                }
            }
        }
    }
}
