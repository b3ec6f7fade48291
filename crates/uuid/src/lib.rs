//! Document identifiers and sharded-path utilities.
//!
//! Every clinic document (patient, invoice, bed, sale, ...) is identified by a
//! *canonical* UUID: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - A wrapper type ([`DocumentId`]) that *guarantees* the canonical format once
//!   constructed.
//! - Shared sharding logic to derive where a document lives on disk.
//!
//! ## Sharded layout
//! For a canonical id `u`, a document file lives at:
//! `collection_dir/<u[0..2]>/<u[2..4]>/<u>.json`
//!
//! Example:
//! `clinic_data/patients/55/0e/550e8400e29b41d4a716446655440000.json`
//!
//! This keeps any single directory small even with hundreds of thousands of
//! patients or pharmacy sales.

mod service;

pub use service::{DocumentId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
