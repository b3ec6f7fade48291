//! # Clinic Core
//!
//! Core business logic for the clinic management backend.
//!
//! This crate contains the data operations and storage:
//! - A sharded JSON document store with atomic writes and named sequences
//! - Generic list/get/create/update/delete over every resource
//! - The resource models and the cross-document rules they carry
//!   (bed occupancy, pharmacy stock, numbering, cash reconciliation)
//! - Read-only reports for the dashboard and summary routes
//!
//! **No API concerns**: HTTP servers, authentication and request parsing
//! belong in `api-rest` or `api-shared`.

pub mod collection;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod models;
pub mod query;
pub mod reports;
pub mod store;

pub use collection::Collection;
pub use config::CoreConfig;
pub use document::{Document, DocumentMeta, Reference};
pub use error::{ClinicError, ClinicResult};
pub use query::{ListQuery, Page};
pub use store::DocumentStore;
