use std::path::{Path, PathBuf};

use crate::error::LocateError;

/// Model description files after resolution against the data directories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelFiles {
    pub topology: PathBuf,
    pub weights: Option<PathBuf>,
}

impl ModelFiles {
    pub fn locate(
        topology: &Path,
        weights: Option<&Path>,
        data_dirs: &[PathBuf],
    ) -> Result<Self, LocateError> {
        Ok(Self {
            topology: locate_file(topology, data_dirs)?,
            weights: weights.map(|w| locate_file(w, data_dirs)).transpose()?,
        })
    }
}

/// Finds `file` in the first data directory that contains it. Absolute paths
/// and paths that exist relative to the working directory are accepted as-is
/// once the directories are exhausted.
pub fn locate_file(file: &Path, data_dirs: &[PathBuf]) -> Result<PathBuf, LocateError> {
    if !file.is_absolute() {
        for dir in data_dirs {
            let candidate = dir.join(file);
            if candidate.is_file() {
                tracing::debug!(file = %candidate.display(), "located model file");
                return Ok(candidate);
            }
        }
    }

    if file.is_file() {
        return Ok(file.to_path_buf());
    }

    Err(LocateError {
        file: file.to_path_buf(),
        searched: data_dirs.to_vec(),
    })
}
