//! Resource models.
//!
//! Each submodule groups the documents of one area of the clinic. Every type
//! here implements [`crate::Document`] and is served by the generic CRUD
//! routes; the few cross-document rules (bed occupancy, pharmacy stock,
//! numbering) live in their lifecycle hooks.

pub mod billing;
pub mod closing;
pub mod dates;
pub mod indoor;
pub mod opd;
pub mod patients;
pub mod pharmacy;
pub mod staff;

use crate::document::Document;
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use clinic_types::Money;
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PaymentMethod {
    Cash,
    Card,
    #[serde(rename = "Bank Transfer", alias = "BankTransfer")]
    BankTransfer,
    Insurance,
    Other,
}

impl PaymentMethod {
    /// Cash drawer movements are cash payments or ones with no method recorded.
    pub fn is_cash(method: Option<PaymentMethod>) -> bool {
        matches!(method, None | Some(PaymentMethod::Cash))
    }
}

/// Fails with `InvalidInput` unless the referenced document exists.
pub(crate) fn require<T: Document>(store: &DocumentStore, id: &DocumentId) -> ClinicResult<()> {
    if store.exists::<T>(id) {
        Ok(())
    } else {
        Err(ClinicError::InvalidInput(format!(
            "referenced {} does not exist: {}",
            T::LABEL.to_lowercase(),
            id
        )))
    }
}

/// Like [`require`] but returns the loaded document.
pub(crate) fn require_load<T: Document>(store: &DocumentStore, id: &DocumentId) -> ClinicResult<T> {
    store.find::<T>(id)?.ok_or_else(|| {
        ClinicError::InvalidInput(format!(
            "referenced {} does not exist: {}",
            T::LABEL.to_lowercase(),
            id
        ))
    })
}

pub(crate) fn ensure_non_negative(field: &str, amount: Money) -> ClinicResult<()> {
    if amount.is_negative() {
        return Err(ClinicError::InvalidInput(format!("{} cannot be negative", field)));
    }
    Ok(())
}

pub(crate) fn ensure_positive_quantity(field: &str, quantity: u32) -> ClinicResult<()> {
    if quantity == 0 {
        return Err(ClinicError::InvalidInput(format!("{} must be at least 1", field)));
    }
    Ok(())
}

/// Formats a sequence number with a prefix, e.g. `INV-000042`.
pub(crate) fn numbered(prefix: &str, width: usize, n: u64) -> String {
    format!("{}-{:0width$}", prefix, n, width = width)
}

pub(crate) fn default_quantity() -> u32 {
    1
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::store::DocumentStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub fn test_store() -> (TempDir, Arc<DocumentStore>) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            DocumentStore::open(temp_dir.path()).expect("DocumentStore::open should succeed"),
        );
        (temp_dir, store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_pads() {
        assert_eq!(numbered("INV", 6, 42), "INV-000042");
        assert_eq!(numbered("PO", 5, 1234567), "PO-1234567");
    }

    #[test]
    fn test_payment_method_cash_rule() {
        assert!(PaymentMethod::is_cash(None));
        assert!(PaymentMethod::is_cash(Some(PaymentMethod::Cash)));
        assert!(!PaymentMethod::is_cash(Some(PaymentMethod::Card)));
    }

    #[test]
    fn test_payment_method_accepts_both_spellings() {
        let a: PaymentMethod = serde_json::from_str("\"Bank Transfer\"").unwrap();
        let b: PaymentMethod = serde_json::from_str("\"BankTransfer\"").unwrap();
        assert_eq!(a, b);
    }
}
