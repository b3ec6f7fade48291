//! # API Shared
//!
//! Shared utilities and definitions for the clinic APIs.
//!
//! Contains:
//! - Shared services like `HealthService`
//! - Authentication utilities
//! - Response envelopes common to every route
//!
//! Used by `api-rest` and by the process entry point.

pub mod auth;
pub mod health;
pub mod responses;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use health::{HealthRes, HealthService};
pub use responses::{DeletedRes, MessageRes};
