//! Load already-extracted `.txt` files as pending documents.

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use casefile_core::{Error, Result};
use casefile_store::{DocumentStore, NewDocument};

#[derive(Debug, Default)]
pub struct ImportReport {
    pub scanned: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub errors: Vec<String>,
}

/// Import every `.txt` file under `dir`. Each document is keyed by its path
/// under `dir` without the extension (`emails/EFTA00001`) and tagged with
/// `data_set` or, when absent, the name of the directory holding the file.
pub fn import_dir<S: DocumentStore + ?Sized>(
    store: &S,
    dir: &Path,
    data_set: Option<&str>,
) -> Result<ImportReport> {
    let mut files = Vec::new();
    collect_text_files(dir, &mut files)?;
    files.sort();
    info!("Importing {} text files from {}", files.len(), dir.display());

    let mut report = ImportReport::default();
    for path in files {
        report.scanned += 1;
        match import_file(store, dir, &path, data_set) {
            Ok(Some(id)) => {
                debug!("Imported {} as document {}", path.display(), id);
                report.imported += 1;
            }
            Ok(None) => report.empty += 1,
            Err(e) if e.is_conflict() => {
                debug!("Duplicate content, skipping: {}", path.display());
                report.duplicates += 1;
            }
            Err(e) => {
                warn!("Failed to import {}: {}", path.display(), e);
                report.errors.push(format!("{}: {}", path.display(), e));
            }
        }
    }
    Ok(report)
}

fn import_file<S: DocumentStore + ?Sized>(
    store: &S,
    root: &Path,
    path: &Path,
    data_set: Option<&str>,
) -> Result<Option<i64>> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let document_key = document_key(root, path)?;
    let data_set_id = data_set.map(String::from).or_else(|| {
        path.parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(String::from)
    });

    let doc = NewDocument {
        document_key,
        data_set_id,
        content_hash: Some(content_hash(&text)),
        extracted_text: Some(text),
    };
    store.add_document(&doc).map(Some)
}

fn document_key(root: &Path, path: &Path) -> Result<String> {
    let unusable = || Error::Internal(format!("unusable file name: {}", path.display()));
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    let parts = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_str().ok_or_else(unusable)),
            _ => None,
        })
        .collect::<Result<Vec<_>>>()?;
    if parts.is_empty() {
        return Err(unusable());
    }
    Ok(parts.join("/"))
}

fn collect_text_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_text_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use casefile_store::MemoryStore;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_import_uses_parent_dir_as_data_set() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("emails/EFTA0001.txt"), "From: JE\nTo: GM\nSee you Friday.");
        write(&dir.path().join("flight-logs/log-1994.txt"), "N908JE departed PBI.");
        write(&dir.path().join("flight-logs/notes.md"), "not imported");

        let store = MemoryStore::new();
        let report = import_dir(&store, dir.path(), None).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.imported, 2);

        let pending = store.pending_documents(None).unwrap();
        let email = pending.iter().find(|d| d.document_key == "emails/EFTA0001").unwrap();
        assert_eq!(email.data_set_id.as_deref(), Some("emails"));
        assert!(email.has_text);
        let log = pending
            .iter()
            .find(|d| d.document_key == "flight-logs/log-1994")
            .unwrap();
        assert_eq!(log.data_set_id.as_deref(), Some("flight-logs"));
    }

    #[test]
    fn test_duplicate_content_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("a.txt"), "same text");
        write(&dir.path().join("b.txt"), "same text");
        write(&dir.path().join("blank.txt"), "  \n");

        let store = MemoryStore::new();
        let report = import_dir(&store, dir.path(), Some("depositions")).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.empty, 1);
        assert!(report.errors.is_empty());

        let again = import_dir(&store, dir.path(), Some("depositions")).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.duplicates, 2);

        let pending = store.pending_documents(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].data_set_id.as_deref(), Some("depositions"));
    }

    #[test]
    fn test_same_file_name_in_two_folders() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("emails/page-001.txt"), "From: GM\nTo: JE\nFlights confirmed.");
        write(&dir.path().join("depositions/page-001.txt"), "Q. Did you travel to New Mexico?\nA. Yes.");

        let store = MemoryStore::new();
        let report = import_dir(&store, dir.path(), None).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.duplicates, 0);
        assert!(report.errors.is_empty());

        let mut keys: Vec<String> = store
            .pending_documents(None)
            .unwrap()
            .into_iter()
            .map(|d| d.document_key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["depositions/page-001", "emails/page-001"]);
    }

    #[test]
    fn test_taken_key_is_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("emails/page-001.txt"), "original text");

        let store = MemoryStore::new();
        import_dir(&store, dir.path(), None).unwrap();
        write(&dir.path().join("emails/page-001.txt"), "edited text");
        let report = import_dir(&store, dir.path(), None).unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("emails/page-001"));
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash("abc");
        assert_eq!(hash.len(), 64);
        assert!(hash.starts_with("ba7816bf"));
    }
}
