//! Out-patient department: appointments, queue tokens, procedures and
//! certificates.

use crate::document::{document_meta, Document, DocumentMeta, Reference};
use crate::models::patients::Patient;
use crate::models::staff::{Department, Employee};
use crate::models::{dates, ensure_non_negative, require, require_load};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    CheckedIn,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub patient: DocumentId,
    /// An employee with `isDoctor` set.
    pub doctor: DocumentId,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub department: Option<DocumentId>,
    #[serde(deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub time: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    #[serde(default)]
    pub fee: Money,
    pub notes: Option<String>,
}

impl Document for Appointment {
    const COLLECTION: &'static str = "appointments";
    const LABEL: &'static str = "Appointment";
    const SEARCH_FIELDS: &'static [&'static str] = &["reason", "notes", "status"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("doctor", "employees"),
        Reference::new("department", "departments"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("fee", self.fee)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Patient>(store, &self.patient)?;
        let doctor = require_doctor(store, &self.doctor)?;
        if let Some(dept) = &self.department {
            require::<Department>(store, dept)?;
        }
        if self.fee == Money::ZERO {
            self.fee = doctor.consultation_fee;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if self.patient != previous.patient {
            require::<Patient>(store, &self.patient)?;
        }
        if self.doctor != previous.doctor {
            require_doctor(store, &self.doctor)?;
        }
        Ok(())
    }
}

fn require_doctor(store: &DocumentStore, id: &DocumentId) -> ClinicResult<Employee> {
    let employee = require_load::<Employee>(store, id)?;
    if !employee.is_doctor {
        return Err(ClinicError::InvalidInput(format!(
            "{} is not a doctor",
            employee.name
        )));
    }
    Ok(employee)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TokenStatus {
    #[default]
    Waiting,
    Called,
    Done,
    Cancelled,
}

/// A numbered place in a doctor's queue for one day.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub patient: DocumentId,
    pub doctor: DocumentId,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    /// Assigned on create; numbering restarts per doctor per day.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub status: TokenStatus,
    #[serde(default)]
    pub fee: Money,
}

impl Document for Token {
    const COLLECTION: &'static str = "tokens";
    const LABEL: &'static str = "Token";
    const SEARCH_FIELDS: &'static [&'static str] = &["status"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("doctor", "employees"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("fee", self.fee)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Patient>(store, &self.patient)?;
        let doctor = require_doctor(store, &self.doctor)?;

        let last = store
            .all::<Token>()
            .into_iter()
            .filter(|t| t.doctor == self.doctor && t.date == self.date)
            .map(|t| t.number)
            .max()
            .unwrap_or(0);
        self.number = last + 1;

        if self.fee == Money::ZERO {
            self.fee = doctor.consultation_fee;
        }
        tracing::info!("issued token {} for {} on {}", self.number, doctor.name, self.date);
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.doctor != previous.doctor || self.date != previous.date {
            return Err(ClinicError::InvalidInput(
                "a token cannot move to another doctor or day".into(),
            ));
        }
        self.number = previous.number;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub department: Option<DocumentId>,
    #[serde(default)]
    pub charges: Money,
    pub description: Option<String>,
}

impl Document for Procedure {
    const COLLECTION: &'static str = "procedures";
    const LABEL: &'static str = "Procedure";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const REFERENCES: &'static [Reference] = &[Reference::new("department", "departments")];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("charges", self.charges)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CertificateType {
    Medical,
    Fitness,
    Birth,
    Death,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub patient: DocumentId,
    pub certificate_type: CertificateType,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub issued_by: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub issue_date: NaiveDate,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub valid_until: Option<NaiveDate>,
    pub details: Option<String>,
}

impl Document for Certificate {
    const COLLECTION: &'static str = "certificates";
    const LABEL: &'static str = "Certificate";
    const SEARCH_FIELDS: &'static [&'static str] = &["certificateType", "details"];
    const DATE_FIELD: &'static str = "issueDate";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("issuedBy", "employees"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.valid_until.is_some_and(|until| until < self.issue_date) {
            return Err(ClinicError::InvalidInput(
                "validUntil cannot be before issueDate".into(),
            ));
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Patient>(store, &self.patient)?;
        if let Some(issuer) = &self.issued_by {
            require::<Employee>(store, issuer)?;
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

    fn seed(store: &DocumentStore) -> (Patient, Employee) {
        let patient = Collection::<Patient>::new(store)
            .create(json!({"name": "Ayesha Khan"}))
            .unwrap();
        let doctor = Collection::<Employee>::new(store)
            .create(json!({"name": "Dr. Imran", "isDoctor": true, "consultationFee": 800}))
            .unwrap();
        (patient, doctor)
    }

    #[test]
    fn test_appointment_defaults_fee_from_doctor() {
        let (_tmp, store) = test_store();
        let (patient, doctor) = seed(&store);

        let appt = Collection::<Appointment>::new(&store)
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "doctor": doctor.meta.id.to_string(),
                "date": "2024-06-01"
            }))
            .unwrap();

        assert_eq!(appt.fee, Money::from_minor(80_000));
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_appointment_requires_a_doctor() {
        let (_tmp, store) = test_store();
        let (patient, _) = seed(&store);
        let clerk = Collection::<Employee>::new(&store)
            .create(json!({"name": "Clerk"}))
            .unwrap();

        let err = Collection::<Appointment>::new(&store)
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "doctor": clerk.meta.id.to_string(),
                "date": "2024-06-01"
            }))
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_token_numbers_restart_per_doctor_and_day() {
        let (_tmp, store) = test_store();
        let (patient, doctor) = seed(&store);
        let other = Collection::<Employee>::new(&store)
            .create(json!({"name": "Dr. Sara", "isDoctor": true}))
            .unwrap();
        let tokens = Collection::<Token>::new(&store);

        let issue = |doctor: &Employee, date: &str| {
            tokens
                .create(json!({
                    "patient": patient.meta.id.to_string(),
                    "doctor": doctor.meta.id.to_string(),
                    "date": date
                }))
                .unwrap()
                .number
        };

        assert_eq!(issue(&doctor, "2024-06-01"), 1);
        assert_eq!(issue(&doctor, "2024-06-01"), 2);
        assert_eq!(issue(&other, "2024-06-01"), 1);
        assert_eq!(issue(&doctor, "2024-06-02"), 1);
    }

    #[test]
    fn test_token_number_survives_update() {
        let (_tmp, store) = test_store();
        let (patient, doctor) = seed(&store);
        let tokens = Collection::<Token>::new(&store);

        let token = tokens
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "doctor": doctor.meta.id.to_string()
            }))
            .unwrap();
        let updated = tokens
            .update(&token.meta.id.to_string(), json!({"number": 99, "status": "Called"}))
            .unwrap();

        assert_eq!(updated.number, token.number);
        assert_eq!(updated.status, TokenStatus::Called);
    }

    #[test]
    fn test_certificate_validity_must_follow_issue() {
        let (_tmp, store) = test_store();
        let (patient, _) = seed(&store);

        let err = Collection::<Certificate>::new(&store)
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "certificateType": "Fitness",
                "issueDate": "2024-06-10",
                "validUntil": "2024-06-01"
            }))
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[test]
    fn test_procedure_rejects_negative_charges() {
        let (_tmp, store) = test_store();
        let err = Collection::<Procedure>::new(&store)
            .create(json!({"name": "Dressing", "charges": -5}))
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }
}
