//! Content-addressed upload store.
//!
//! # Content Addressing
//!
//! Files are stored using their SHA-256 hash as the file stem. This provides:
//!
//! - **Deduplication**: the same photo uploaded twice is stored once
//! - **Integrity**: content can be verified against its name
//! - **Immutability**: a stored path never changes meaning
//!
//! The file extension is taken from the detected media type when `infer`
//! recognises the bytes, otherwise from a sanitised version of the uploaded
//! filename, so the static file server can pick a sensible `Content-Type`.

use crate::{FilesError, HASH_FOLDER_NAME, PUBLIC_PREFIX};
use chrono::{DateTime, Utc};
use clinic_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_EXTENSION_LEN: usize = 8;

/// Hex-encoded SHA-256 digest (64 lowercase hex characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Validates a hex digest.
    pub fn parse(input: &str) -> Result<Self, FilesError> {
        let ok = input.len() == 64
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if ok {
            Ok(Self(input.to_string()))
        } else {
            Err(FilesError::InvalidHash(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Sha256Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Sha256Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Sha256Hash::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Metadata for a stored upload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Hexadecimal SHA-256 digest of the file content
    pub hash: Sha256Hash,

    /// Path relative to the upload root, using `/` separators
    pub relative_path: NonEmptyText,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type, best-effort
    pub media_type: Option<NonEmptyText>,

    /// Filename as sent by the client
    pub original_filename: NonEmptyText,

    /// When this upload request stored (or re-found) the file
    pub stored_at: DateTime<Utc>,
}

/// Upload store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root_directory: PathBuf,
}

impl UploadStore {
    /// Opens (creating if needed) the upload root.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the path exists but is not
    /// a directory or cannot be created/canonicalised.
    pub fn open(root_directory: &Path) -> Result<Self, FilesError> {
        if root_directory.exists() && !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        fs::create_dir_all(root_directory).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    /// Returns the canonical upload root.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Stores `bytes` and returns their metadata.
    ///
    /// If identical content already exists the existing file is reused.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::EmptyUpload` for zero-length content, or
    /// `FilesError::Io` if the shard directory or file cannot be written.
    pub fn store(&self, bytes: &[u8], original_filename: &str) -> Result<FileMetadata, FilesError> {
        if bytes.is_empty() {
            return Err(FilesError::EmptyUpload);
        }

        let hash_array: [u8; 32] = Sha256::digest(bytes).into();
        let hash = Sha256Hash::from_bytes(&hash_array);

        let detected = infer::get(bytes);
        let extension = detected
            .map(|kind| kind.extension().to_string())
            .or_else(|| extension_from_filename(original_filename));

        let relative_path = compute_relative_path(hash.as_str(), extension.as_deref());
        let storage_path = self.root_directory.join(&relative_path);

        if storage_path.exists() {
            tracing::debug!("upload already stored: {}", relative_path);
        } else {
            if let Some(parent) = storage_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create storage directory {}: {}",
                            parent.display(),
                            e
                        ),
                    ))
                })?;
            }

            let tmp_path = storage_path.with_extension("partial");
            fs::write(&tmp_path, bytes)
                .and_then(|_| fs::rename(&tmp_path, &storage_path))
                .map_err(|e| {
                    FilesError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to write file to {}: {}", storage_path.display(), e),
                    ))
                })?;
        }

        let original_filename = NonEmptyText::new(
            Path::new(original_filename)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload"),
        )
        .or_else(|_| NonEmptyText::new("upload"))
        .map_err(|e| FilesError::InvalidPath(e.to_string()))?;

        let media_type = detected.and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(FileMetadata {
            hash,
            relative_path: NonEmptyText::new(&relative_path)
                .map_err(|e| FilesError::InvalidPath(e.to_string()))?,
            size_bytes: bytes.len() as u64,
            media_type,
            original_filename,
            stored_at: Utc::now(),
        })
    }

    /// Public URL path of a stored file, e.g. `/Images/sha256/ab/cd/abcd….png`.
    pub fn public_path(metadata: &FileMetadata) -> String {
        format!("{}/{}", PUBLIC_PREFIX, metadata.relative_path)
    }
}

/// `sha256/<h[0..2]>/<h[2..4]>/<hash>[.ext]`
fn compute_relative_path(hash_hex: &str, extension: Option<&str>) -> String {
    let stem = format!(
        "{}/{}/{}/{}",
        HASH_FOLDER_NAME,
        &hash_hex[0..2],
        &hash_hex[2..4],
        hash_hex
    );
    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

fn extension_from_filename(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    let ok = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    ok.then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn open_store(temp: &TempDir) -> UploadStore {
        UploadStore::open(&temp.path().join("uploads")).expect("open should succeed")
    }

    #[test]
    fn test_open_creates_root() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        assert!(store.root_directory().is_dir());
    }

    #[test]
    fn test_open_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("file.txt");
        fs::write(&root, "not a directory").unwrap();

        let result = UploadStore::open(&root);
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_store_text_file() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let metadata = store.store(b"Hello, World!", "notes.txt").unwrap();

        assert_eq!(metadata.size_bytes, 13);
        assert_eq!(metadata.original_filename.as_str(), "notes.txt");
        assert_eq!(metadata.hash.as_str().len(), 64);
        assert!(metadata.relative_path.as_str().ends_with(".txt"));
        let stored = fs::read(store.root_directory().join(metadata.relative_path.as_str())).unwrap();
        assert_eq!(stored, b"Hello, World!");
    }

    #[test]
    fn test_store_detects_png() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let metadata = store.store(&PNG_HEADER, "photo").unwrap();

        assert_eq!(
            metadata.media_type.as_ref().map(|t| t.as_str()),
            Some("image/png")
        );
        assert!(metadata.relative_path.as_str().ends_with(".png"));
        assert!(UploadStore::public_path(&metadata).starts_with("/Images/sha256/"));
    }

    #[test]
    fn test_store_deduplicates_identical_content() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let first = store.store(b"same bytes", "a.txt").unwrap();
        let second = store.store(b"same bytes", "b.txt").unwrap();

        assert_eq!(first.relative_path, second.relative_path);
        assert_eq!(second.original_filename.as_str(), "b.txt");
    }

    #[test]
    fn test_store_rejects_empty_upload() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        assert!(matches!(store.store(b"", "x.txt"), Err(FilesError::EmptyUpload)));
    }

    #[test]
    fn test_store_strips_client_directories_from_filename() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let metadata = store.store(b"scan", "../../etc/discharge.pdf").unwrap();
        assert_eq!(metadata.original_filename.as_str(), "discharge.pdf");
    }

    #[test]
    fn test_relative_path_sharding() {
        let hash = "abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        assert_eq!(
            compute_relative_path(hash, Some("jpg")),
            format!("sha256/ab/cd/{}.jpg", hash)
        );
        assert_eq!(compute_relative_path(hash, None), format!("sha256/ab/cd/{}", hash));
    }

    #[test]
    fn test_extension_from_filename_is_sanitised() {
        assert_eq!(extension_from_filename("scan.PDF"), Some("pdf".into()));
        assert_eq!(extension_from_filename("weird.p d f"), None);
        assert_eq!(extension_from_filename("noext"), None);
    }

    #[test]
    fn test_sha256_hash_parse() {
        assert!(Sha256Hash::parse("abc").is_err());
        assert!(Sha256Hash::parse(&"a".repeat(64)).is_ok());
    }
}
