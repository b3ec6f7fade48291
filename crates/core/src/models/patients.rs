//! Patient registration.
//!
//! A patient is identified across every module by its MR# (medical record
//! number). The number is allocated from a store sequence when the
//! registration form leaves it blank, and must be unique when supplied.

use crate::document::{document_meta, Document, DocumentMeta};
use crate::models::dates;
use crate::models::Gender;
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const MR_SEQUENCE: &str = "patients.mrNumber";
const MR_PREFIX: &str = "MR";
const MAX_AGE_YEARS: u32 = 150;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Medical record number, e.g. `MR-000123`.
    #[serde(default)]
    pub mr_number: String,
    pub name: NonEmptyText,
    pub guardian_name: Option<String>,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    /// National identity card number.
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub blood_group: Option<String>,
    pub referred_by: Option<String>,
    /// Public path of the uploaded photo.
    pub image: Option<String>,
}

impl Patient {
    fn ensure_unique_mr_number(&self, store: &DocumentStore) -> ClinicResult<()> {
        let taken = store.all::<Patient>().into_iter().any(|other| {
            other.meta.id != self.meta.id && other.mr_number.eq_ignore_ascii_case(&self.mr_number)
        });
        if taken {
            return Err(ClinicError::Conflict(format!(
                "MR number {} is already assigned",
                self.mr_number
            )));
        }
        Ok(())
    }
}

impl Document for Patient {
    const COLLECTION: &'static str = "patients";
    const LABEL: &'static str = "Patient";
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "mrNumber", "phone", "nationalId", "guardianName"];
    const ATTACHMENT_FIELD: Option<&'static str> = Some("image");

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.age.is_some_and(|age| age > MAX_AGE_YEARS) {
            return Err(ClinicError::InvalidInput(format!(
                "age cannot exceed {}",
                MAX_AGE_YEARS
            )));
        }
        if let Some(phone) = &self.phone {
            let ok = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
            if !ok {
                return Err(ClinicError::InvalidInput(
                    "phone may only contain digits, spaces and + - ( )".into(),
                ));
            }
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        self.mr_number = self.mr_number.trim().to_string();
        if self.mr_number.is_empty() {
            let n = store.next_sequence(MR_SEQUENCE)?;
            self.mr_number = super::numbered(MR_PREFIX, 6, n);
            tracing::info!("assigned MR number {}", self.mr_number);
        }
        self.ensure_unique_mr_number(store)
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        self.mr_number = self.mr_number.trim().to_string();
        if self.mr_number.is_empty() {
            self.mr_number = previous.mr_number.clone();
        }
        if self.mr_number != previous.mr_number {
            self.ensure_unique_mr_number(store)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::models::test_support::test_store;
    use serde_json::json;

    #[test]
    fn test_create_assigns_sequential_mr_numbers() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);

        let first = patients.create(json!({"name": "Ayesha Khan"})).unwrap();
        let second = patients.create(json!({"name": "Bilal Ahmed", "mrNumber": ""})).unwrap();

        assert_eq!(first.mr_number, "MR-000001");
        assert_eq!(second.mr_number, "MR-000002");
    }

    #[test]
    fn test_create_rejects_duplicate_mr_number() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);

        patients
            .create(json!({"name": "Ayesha Khan", "mrNumber": "MR-777"}))
            .unwrap();
        let err = patients
            .create(json!({"name": "Other Person", "mrNumber": "mr-777"}))
            .unwrap_err();

        assert!(matches!(err, ClinicError::Conflict(_)));
    }

    #[test]
    fn test_update_keeps_mr_number_when_blank() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);

        let created = patients.create(json!({"name": "Sana Malik"})).unwrap();
        let updated = patients
            .update(
                &created.meta.id.to_string(),
                json!({"mrNumber": "", "phone": "+92 300 1234567"}),
            )
            .unwrap();

        assert_eq!(updated.mr_number, created.mr_number);
        assert_eq!(updated.phone.as_deref(), Some("+92 300 1234567"));
    }

    #[test]
    fn test_validate_rejects_bad_phone_and_age() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);

        assert!(patients
            .create(json!({"name": "A", "phone": "call me"}))
            .is_err());
        assert!(patients.create(json!({"name": "B", "age": 200})).is_err());
    }

    #[test]
    fn test_date_of_birth_accepts_timestamp() {
        let (_tmp, store) = test_store();
        let patients = Collection::<Patient>::new(&store);

        let created = patients
            .create(json!({"name": "Hamza", "dateOfBirth": "1990-01-15T00:00:00.000Z", "gender": "Male"}))
            .unwrap();
        assert_eq!(
            created.date_of_birth,
            NaiveDate::from_ymd_opt(1990, 1, 15)
        );
    }
}
