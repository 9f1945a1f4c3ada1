//! Artifact persistence.
//!
//! One file per format at `<artifact_dir>/downloaded-file.<ext>`. The path
//! depends on the format alone, so each new artifact overwrites the previous
//! one of the same format: no versioning, no history. Writes go through a
//! `.part` file and an atomic rename, so a failed write leaves the previous
//! artifact intact.

mod writer;

use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::job::{JobId, MediaFormat};

use self::writer::TempFileWriter;

/// Base name of every artifact.
pub const ARTIFACT_STEM: &str = "downloaded-file";

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.mp3` → `a.mp3.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// A persisted job result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub job: JobId,
    pub path: PathBuf,
    pub format: MediaFormat,
    pub byte_size: u64,
}

/// Writes payloads to their canonical per-format path.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path for `format`.
    pub fn canonical_path(&self, format: MediaFormat) -> PathBuf {
        self.root
            .join(format!("{}.{}", ARTIFACT_STEM, format.extension()))
    }

    /// Persist `payload` as the artifact for `format`. Blocking; call from
    /// `spawn_blocking` when used from async code.
    pub fn persist(
        &self,
        job: JobId,
        payload: &[u8],
        format: MediaFormat,
    ) -> Result<Artifact, PersistenceError> {
        let final_path = self.canonical_path(format);
        std::fs::create_dir_all(&self.root)
            .map_err(|e| PersistenceError::from_io(&self.root, &e))?;

        let tp = temp_path(&final_path);
        let mut w = TempFileWriter::create(&tp).map_err(|e| PersistenceError::from_io(&tp, &e))?;
        w.write_all(payload)
            .map_err(|e| PersistenceError::from_io(&tp, &e))?;
        w.sync().map_err(|e| PersistenceError::from_io(&tp, &e))?;
        w.finalize(&final_path)
            .map_err(|e| PersistenceError::from_io(&final_path, &e))?;

        tracing::debug!(%job, path = %final_path.display(), bytes = payload.len(), "artifact written");
        Ok(Artifact {
            job,
            path: final_path,
            format,
            byte_size: payload.len() as u64,
        })
    }
}
