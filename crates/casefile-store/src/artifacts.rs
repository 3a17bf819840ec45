//! Per-document analysis artifacts, one JSON file per document key.
//!
//! An artifact that exists is authoritative: the scheduler loads it instead
//! of re-analyzing, so a crash between the write and the job completion
//! never pays twice.

use std::path::{Path, PathBuf};

use casefile_core::{AnalysisResult, Error, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Directory of `<documentKey>.json` files.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a document key. Characters outside
    /// `[A-Za-z0-9._-]` are replaced with `_`; when that changes the key, a
    /// short hash of the raw key is appended so distinct keys never share a
    /// file.
    pub fn path_for(&self, document_key: &str) -> PathBuf {
        let safe: String = document_key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = safe.trim_start_matches('.');
        let name = if !safe.is_empty() && safe == document_key {
            safe.to_string()
        } else {
            let digest = Sha256::digest(document_key.as_bytes());
            format!("{}-{}", safe, hex::encode(&digest[..8]))
        };
        self.dir.join(format!("{}.json", name))
    }

    pub fn exists(&self, document_key: &str) -> bool {
        self.path_for(document_key).is_file()
    }

    /// Load the artifact for `document_key`. An artifact recorded for a
    /// different key is an error.
    pub fn load(&self, document_key: &str) -> Result<Option<AnalysisResult>> {
        let path = self.path_for(document_key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let result: AnalysisResult = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Storage(format!("Corrupt artifact {}: {}", path.display(), e))
        })?;
        if let Some(stored) = result.document_key.as_deref() {
            if stored != document_key {
                return Err(Error::Storage(format!(
                    "Artifact {} belongs to {:?}, not {:?}",
                    path.display(),
                    stored,
                    document_key
                )));
            }
        }
        Ok(Some(result))
    }

    /// Write atomically: temp file in the same directory, then rename. The
    /// document key is recorded inside the artifact.
    pub fn save(&self, document_key: &str, result: &AnalysisResult) -> Result<PathBuf> {
        let path = self.path_for(document_key);
        let tmp = path.with_extension("json.tmp");
        let mut result = result.clone();
        result.document_key = Some(document_key.to_string());
        let json = serde_json::to_vec_pretty(&result)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }
}
