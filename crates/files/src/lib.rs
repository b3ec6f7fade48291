//! Clinic File Storage
//!
//! Uploaded binaries (patient photos, staff photos, scanned discharge papers)
//! are kept apart from the JSON documents that reference them.
//!
//! ## Design Principles
//!
//! - Documents hold a public path to the file, never the bytes
//! - Files are content-addressed by SHA-256 and immutable once written
//! - Uploading identical bytes twice yields the same stored file
//! - Every stored file is reachable below the public `/Images` prefix
//!
//! ## Storage Layout
//!
//! ```text
//! <upload_root>/
//! └── sha256/
//!     └── ab/
//!         └── cd/
//!             └── abcd3f9e….png
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use clinic_files::UploadStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UploadStore::open(Path::new("clinic_data/uploads"))?;
//! let meta = store.store(b"\x89PNG\r\n\x1a\n", "photo.png")?;
//! println!("{}", UploadStore::public_path(&meta));
//! # Ok(())
//! # }
//! ```

mod constants;
mod files;

pub use constants::{HASH_FOLDER_NAME, PUBLIC_PREFIX};
pub use files::{FileMetadata, Sha256Hash, UploadStore};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory could not be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Stored path or filename could not be recorded in the metadata
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Upload had no content
    #[error("Uploaded file is empty")]
    EmptyUpload,

    /// Hash string was not 64 lowercase hex characters
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
