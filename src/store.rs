//! Enrolled codebook storage.
//!
//! The core treats the store as an external collaborator: a codebook is
//! written once at enrollment and only read afterwards. The filesystem
//! implementation keeps one CBOR file per speaker under a single directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{info, warn};
use thiserror::Error;

use crate::vq::{Codebook, CodebookError, ModelLoad, ModelSave};

/// File extension for stored codebooks.
const CODEBOOK_EXT: &str = "cb";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("codebook '{identity}': {source}")]
    Codebook {
        identity: String,
        source: CodebookError,
    },
    #[error("no codebook enrolled for '{0}'")]
    NotFound(String),
    #[error("invalid speaker identity '{0}'")]
    BadIdentity(String),
}

/// Read/write access to enrolled speaker models.
pub trait CodebookStore {
    /// Persist `codebook` for `identity`, replacing any previous enrollment.
    fn insert(&self, identity: &str, codebook: &Codebook) -> Result<(), StoreError>;

    /// Load the codebook for a single speaker.
    fn load(&self, identity: &str) -> Result<Codebook, StoreError>;

    /// Load every readable codebook, keyed by identity in name order.
    ///
    /// Unreadable records are skipped with a warning so one corrupt
    /// enrollment cannot block every other speaker.
    fn load_all(&self) -> Result<IndexMap<String, Codebook>, StoreError>;
}

/// One `<identity>.cb` CBOR file per speaker under `root`.
pub struct FsCodebookStore {
    root: PathBuf,
}

impl FsCodebookStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, identity: &str) -> Result<PathBuf, StoreError> {
        // identities become file names, so path separators are off the table
        if identity.is_empty()
            || identity.contains(['/', '\\'])
            || identity == "."
            || identity == ".."
        {
            return Err(StoreError::BadIdentity(identity.to_owned()));
        }
        Ok(self.root.join(format!("{identity}.{CODEBOOK_EXT}")))
    }
}

impl CodebookStore for FsCodebookStore {
    fn insert(&self, identity: &str, codebook: &Codebook) -> Result<(), StoreError> {
        let path = self.record_path(identity)?;
        codebook
            .save_to_file(&path)
            .map_err(|source| StoreError::Codebook {
                identity: identity.to_owned(),
                source,
            })?;
        info!("enrolled '{identity}' ({} centroids) at {}", codebook.len(), path.display());
        Ok(())
    }

    fn load(&self, identity: &str) -> Result<Codebook, StoreError> {
        let path = self.record_path(identity)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(identity.to_owned()));
        }
        read_codebook(&path).map_err(|source| StoreError::Codebook {
            identity: identity.to_owned(),
            source,
        })
    }

    fn load_all(&self) -> Result<IndexMap<String, Codebook>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CODEBOOK_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push((stem.to_owned(), path));
            }
        }
        names.sort();

        let mut codebooks = IndexMap::with_capacity(names.len());
        for (identity, path) in names {
            match read_codebook(&path) {
                Ok(cb) => {
                    codebooks.insert(identity, cb);
                }
                Err(e) => {
                    warn!("skipping unreadable codebook {}: {e}", path.display());
                }
            }
        }
        Ok(codebooks)
    }
}

fn read_codebook(path: &Path) -> Result<Codebook, CodebookError> {
    let cb = Codebook::load_from_file(path)?;
    cb.ensure_supported()?;
    Ok(cb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codebook(x: f64) -> Codebook {
        Codebook::new(vec![vec![x, x + 1.0]])
    }

    #[test]
    fn insert_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        let cb = codebook(3.5);
        store.insert("alice", &cb).unwrap();
        assert_eq!(store.load("alice").unwrap(), cb);
    }

    #[test]
    fn missing_speaker_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("nobody"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn reenrollment_replaces_the_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        store.insert("alice", &codebook(1.0)).unwrap();
        store.insert("alice", &codebook(2.0)).unwrap();
        assert_eq!(store.load("alice").unwrap(), codebook(2.0));
    }

    #[test]
    fn load_all_is_name_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        store.insert("carol", &codebook(3.0)).unwrap();
        store.insert("alice", &codebook(1.0)).unwrap();
        store.insert("bob", &codebook(2.0)).unwrap();

        let all = store.load_all().unwrap();
        let names: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }

    #[test]
    fn corrupt_record_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        store.insert("alice", &codebook(1.0)).unwrap();
        fs::write(dir.path().join("mallory.cb"), b"not cbor at all").unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("alice"));
    }

    #[test]
    fn path_traversal_identities_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCodebookStore::open(dir.path()).unwrap();
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.insert(bad, &codebook(0.0)),
                Err(StoreError::BadIdentity(_))
            ));
        }
    }
}
