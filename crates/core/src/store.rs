//! File-backed document store.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   patients/
//!     <s1>/<s2>/<id>.json
//!   invoices/
//!     ...
//!   _sequences/
//!     patients.mrNumber.json
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the id.
//!
//! Each write lands in a temporary file which is then renamed over the
//! target, so a concurrent reader sees either the old or the new document.
//! Writers that read-modify-write (generic create/update/delete and the
//! lifecycle hooks they run) hold [`DocumentStore::write_guard`]. Sequence
//! numbers have their own lock so hooks can draw them while the write guard
//! is held.

use crate::constants::{DOCUMENT_EXTENSION, SEQUENCES_DIR_NAME};
use crate::document::Document;
use crate::{ClinicError, ClinicResult};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    sequence_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequenceState {
    last: u64,
}

impl DocumentStore {
    /// Opens the store, creating the root directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::StorageDirCreation` if the root cannot be created.
    pub fn open(root: &Path) -> ClinicResult<Self> {
        fs::create_dir_all(root).map_err(ClinicError::StorageDirCreation)?;
        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
            sequence_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_dir(&self, collection: &str) -> PathBuf {
        self.root.join(collection)
    }

    fn document_path(&self, collection: &str, id: &DocumentId) -> PathBuf {
        id.sharded_file(&self.collection_dir(collection), DOCUMENT_EXTENSION)
    }

    /// Serialises writers for the duration of the returned guard.
    pub fn write_guard(&self) -> ClinicResult<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| ClinicError::LockPoisoned)
    }

    /// Reads a document as raw JSON, `None` if it does not exist.
    pub fn load_value(&self, collection: &str, id: &DocumentId) -> ClinicResult<Option<Value>> {
        let path = self.document_path(collection, id);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(ClinicError::Deserialization),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClinicError::FileRead(e)),
        }
    }

    /// Reads a typed document, `None` if it does not exist.
    pub fn find<T: Document>(&self, id: &DocumentId) -> ClinicResult<Option<T>> {
        match self.load_value(T::COLLECTION, id)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(ClinicError::Deserialization),
            None => Ok(None),
        }
    }

    /// Reads a typed document.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` if the document does not exist.
    pub fn load<T: Document>(&self, id: &DocumentId) -> ClinicResult<T> {
        self.find(id)?.ok_or_else(|| ClinicError::NotFound {
            label: T::LABEL,
            id: id.to_string(),
        })
    }

    pub fn exists<T: Document>(&self, id: &DocumentId) -> bool {
        self.document_path(T::COLLECTION, id).is_file()
    }

    /// Writes a document, replacing any previous version.
    pub fn save<T: Document>(&self, doc: &T) -> ClinicResult<()> {
        let path = self.document_path(T::COLLECTION, doc.id());
        let json = serde_json::to_string_pretty(doc).map_err(ClinicError::Serialization)?;
        write_atomically(&path, json.as_bytes())
    }

    /// Deletes a document.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::NotFound` if there was nothing to delete.
    pub fn remove<T: Document>(&self, id: &DocumentId) -> ClinicResult<()> {
        let path = self.document_path(T::COLLECTION, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ClinicError::NotFound {
                label: T::LABEL,
                id: id.to_string(),
            }),
            Err(e) => Err(ClinicError::FileRemove(e)),
        }
    }

    /// Reads every document of a collection.
    ///
    /// Files that cannot be read or parsed are logged and skipped so one bad
    /// document never hides the rest of a list screen.
    pub fn all<T: Document>(&self) -> Vec<T> {
        self.all_values(T::COLLECTION)
            .into_iter()
            .filter_map(|(path, value)| match serde_json::from_value::<T>(value) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!("failed to parse {}: {} - {}", T::LABEL, path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Reads every document of a collection as raw JSON with its path.
    fn all_values(&self, collection: &str) -> Vec<(PathBuf, Value)> {
        let mut documents = Vec::new();

        let s1_iter = match fs::read_dir(self.collection_dir(collection)) {
            Ok(it) => it,
            Err(_) => return documents,
        };
        for s1 in s1_iter.flatten() {
            let s1_path = s1.path();
            if !s1_path.is_dir() {
                continue;
            }

            let s2_iter = match fs::read_dir(&s1_path) {
                Ok(it) => it,
                Err(_) => continue,
            };

            for s2 in s2_iter.flatten() {
                let s2_path = s2.path();
                if !s2_path.is_dir() {
                    continue;
                }

                let doc_iter = match fs::read_dir(&s2_path) {
                    Ok(it) => it,
                    Err(_) => continue,
                };

                for doc in doc_iter.flatten() {
                    let doc_path = doc.path();
                    let is_document = doc_path.is_file()
                        && doc_path.extension().and_then(|e| e.to_str())
                            == Some(DOCUMENT_EXTENSION);
                    if !is_document {
                        continue;
                    }

                    match fs::read_to_string(&doc_path) {
                        Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                            Ok(value) => documents.push((doc_path, value)),
                            Err(e) => {
                                tracing::warn!(
                                    "failed to parse document: {} - {}",
                                    doc_path.display(),
                                    e
                                );
                            }
                        },
                        Err(e) => {
                            tracing::warn!("failed to read document: {} - {}", doc_path.display(), e);
                        }
                    }
                }
            }
        }

        documents
    }

    /// Returns the next value of a named, monotonically increasing sequence.
    ///
    /// The first value handed out is 1.
    pub fn next_sequence(&self, name: &str) -> ClinicResult<u64> {
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return Err(ClinicError::InvalidInput(format!(
                "invalid sequence name: {}",
                name
            )));
        }

        let _guard = self.sequence_lock.lock().map_err(|_| ClinicError::LockPoisoned)?;

        let path = self
            .root
            .join(SEQUENCES_DIR_NAME)
            .join(format!("{}.{}", name, DOCUMENT_EXTENSION));

        let mut state = match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str::<SequenceState>(&contents).map_err(ClinicError::Deserialization)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => SequenceState::default(),
            Err(e) => return Err(ClinicError::FileRead(e)),
        };

        state.last += 1;
        let json = serde_json::to_string(&state).map_err(ClinicError::Serialization)?;
        write_atomically(&path, json.as_bytes())?;

        Ok(state.last)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> ClinicResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ClinicError::StorageDirCreation)?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).map_err(ClinicError::FileWrite)?;
    fs::rename(&tmp_path, path).map_err(ClinicError::FileWrite)
}
