//! Indoor (in-patient) care: wards, rooms, beds, admissions and discharges.
//!
//! A bed is occupied by at most one admission at a time. Admitting a patient
//! occupies the bed, and discharging or deleting the admission frees it. The
//! bed side of that relationship is only ever written through
//! [`occupy_bed`] and [`release_bed`], which run inside the store write
//! guard held by the generic collection operations.

use crate::document::{document_meta, Document, DocumentMeta, Reference};
use crate::models::patients::Patient;
use crate::models::staff::{Department, Employee};
use crate::models::{dates, ensure_non_negative, require, require_load};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::{NaiveDate, Utc};
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ward {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    /// General, private, ICU and so on.
    pub ward_type: Option<String>,
    #[serde(default)]
    pub charges_per_day: Money,
    pub description: Option<String>,
}

impl Document for Ward {
    const COLLECTION: &'static str = "wards";
    const LABEL: &'static str = "Ward";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "wardType"];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("chargesPerDay", self.charges_per_day)
    }

    fn before_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        let in_use = store.all::<Room>().iter().any(|r| r.ward == self.meta.id)
            || store.all::<Bed>().iter().any(|b| b.ward.as_ref() == Some(&self.meta.id));
        if in_use {
            return Err(ClinicError::Conflict(format!(
                "ward {} still has rooms or beds",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub ward: DocumentId,
    pub room_type: Option<String>,
    #[serde(default)]
    pub charges: Money,
}

impl Document for Room {
    const COLLECTION: &'static str = "rooms";
    const LABEL: &'static str = "Room";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "roomType"];
    const REFERENCES: &'static [Reference] = &[Reference::new("ward", "wards")];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("charges", self.charges)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Ward>(store, &self.ward)
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if self.ward != previous.ward {
            require::<Ward>(store, &self.ward)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BedStatus {
    #[default]
    Available,
    Occupied,
    Maintenance,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Bed label, e.g. `B-12`.
    pub number: NonEmptyText,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub ward: Option<DocumentId>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub room: Option<DocumentId>,
    #[serde(default)]
    pub status: BedStatus,
    /// The admission currently occupying the bed.
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub admission: Option<DocumentId>,
    #[serde(default)]
    pub charges_per_day: Money,
}

impl Document for Bed {
    const COLLECTION: &'static str = "beds";
    const LABEL: &'static str = "Bed";
    const SEARCH_FIELDS: &'static [&'static str] = &["number", "status"];
    const REFERENCES: &'static [Reference] = &[
        Reference::new("ward", "wards"),
        Reference::new("room", "rooms"),
        Reference::new("admission", "admissions"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("chargesPerDay", self.charges_per_day)?;
        if (self.status == BedStatus::Occupied) != self.admission.is_some() {
            return Err(ClinicError::InvalidInput(
                "a bed is occupied exactly when it holds an admission".into(),
            ));
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        if self.admission.is_some() {
            return Err(ClinicError::InvalidInput(
                "beds are occupied by creating an admission".into(),
            ));
        }
        if let Some(ward) = &self.ward {
            require::<Ward>(store, ward)?;
        }
        if let Some(room) = &self.room {
            require::<Room>(store, room)?;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.admission != previous.admission || self.status != previous.status {
            if previous.status == BedStatus::Occupied {
                return Err(ClinicError::Conflict(format!(
                    "bed {} is occupied; discharge the patient first",
                    previous.number
                )));
            }
            if self.admission.is_some() {
                return Err(ClinicError::InvalidInput(
                    "beds are occupied by creating an admission".into(),
                ));
            }
        }
        Ok(())
    }

    fn before_delete(&self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.status == BedStatus::Occupied {
            return Err(ClinicError::Conflict(format!(
                "bed {} is occupied",
                self.number
            )));
        }
        Ok(())
    }
}

/// Marks `bed_id` as occupied by `admission_id`.
///
/// # Errors
///
/// Returns `ClinicError::Conflict` if the bed is not available.
pub(crate) fn occupy_bed(
    store: &DocumentStore,
    bed_id: &DocumentId,
    admission_id: &DocumentId,
) -> ClinicResult<Bed> {
    let mut bed = require_load::<Bed>(store, bed_id)?;
    if bed.admission.as_ref() == Some(admission_id) {
        return Ok(bed);
    }
    if bed.status != BedStatus::Available {
        return Err(ClinicError::Conflict(format!(
            "bed {} is {:?}",
            bed.number, bed.status
        )));
    }
    bed.status = BedStatus::Occupied;
    bed.admission = Some(admission_id.clone());
    bed.meta.updated_at = Utc::now();
    store.save(&bed)?;
    tracing::info!("bed {} occupied by admission {}", bed.number, admission_id);
    Ok(bed)
}

/// Frees `bed_id` if `admission_id` is the one holding it.
pub(crate) fn release_bed(
    store: &DocumentStore,
    bed_id: &DocumentId,
    admission_id: &DocumentId,
) -> ClinicResult<()> {
    let Some(mut bed) = store.find::<Bed>(bed_id)? else {
        tracing::warn!("admission {} refers to missing bed {}", admission_id, bed_id);
        return Ok(());
    };
    if bed.admission.as_ref() != Some(admission_id) {
        return Ok(());
    }
    bed.status = BedStatus::Available;
    bed.admission = None;
    bed.meta.updated_at = Utc::now();
    store.save(&bed)?;
    tracing::info!("bed {} released by admission {}", bed.number, admission_id);
    Ok(())
}

fn bed_is_free_for(store: &DocumentStore, bed_id: &DocumentId, admission_id: &DocumentId) -> ClinicResult<()> {
    let bed = require_load::<Bed>(store, bed_id)?;
    let free = bed.status == BedStatus::Available || bed.admission.as_ref() == Some(admission_id);
    if !free {
        return Err(ClinicError::Conflict(format!(
            "bed {} is {:?}",
            bed.number, bed.status
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AdmissionStatus {
    #[default]
    Admitted,
    Discharged,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub patient: DocumentId,
    pub bed: DocumentId,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub doctor: Option<DocumentId>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub department: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub admission_date: NaiveDate,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub status: AdmissionStatus,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub discharge_date: Option<NaiveDate>,
    /// Advance payment taken at admission.
    #[serde(default)]
    pub advance: Money,
    pub notes: Option<String>,
}

impl Document for Admission {
    const COLLECTION: &'static str = "admissions";
    const LABEL: &'static str = "Admission";
    const SEARCH_FIELDS: &'static [&'static str] = &["diagnosis", "notes", "status"];
    const DATE_FIELD: &'static str = "admissionDate";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("bed", "beds"),
        Reference::new("doctor", "employees"),
        Reference::new("department", "departments"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("advance", self.advance)?;
        if self.discharge_date.is_some_and(|d| d < self.admission_date) {
            return Err(ClinicError::InvalidInput(
                "dischargeDate cannot be before admissionDate".into(),
            ));
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Patient>(store, &self.patient)?;
        if let Some(doctor) = &self.doctor {
            require::<Employee>(store, doctor)?;
        }
        if let Some(dept) = &self.department {
            require::<Department>(store, dept)?;
        }
        self.status = AdmissionStatus::Admitted;
        self.discharge_date = None;
        bed_is_free_for(store, &self.bed, &self.meta.id)
    }

    fn after_create(&self, store: &DocumentStore) -> ClinicResult<()> {
        occupy_bed(store, &self.bed, &self.meta.id).map(|_| ())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if self.patient != previous.patient {
            return Err(ClinicError::InvalidInput(
                "an admission cannot move to another patient".into(),
            ));
        }
        match (previous.status, self.status) {
            (AdmissionStatus::Discharged, AdmissionStatus::Admitted) => {
                return Err(ClinicError::Conflict(
                    "admission is discharged; delete the discharge to reopen it".into(),
                ));
            }
            (AdmissionStatus::Discharged, AdmissionStatus::Discharged) => {
                if self.bed != previous.bed {
                    return Err(ClinicError::InvalidInput(
                        "a discharged admission cannot change bed".into(),
                    ));
                }
            }
            (AdmissionStatus::Admitted, AdmissionStatus::Discharged) => {
                if self.bed != previous.bed {
                    return Err(ClinicError::InvalidInput(
                        "cannot change bed while discharging".into(),
                    ));
                }
                self.discharge_date.get_or_insert_with(dates::today);
            }
            (AdmissionStatus::Admitted, AdmissionStatus::Admitted) => {
                self.discharge_date = None;
                if self.bed != previous.bed {
                    bed_is_free_for(store, &self.bed, &self.meta.id)?;
                }
            }
        }
        Ok(())
    }

    fn after_update(&self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if previous.status != AdmissionStatus::Admitted {
            return Ok(());
        }
        match self.status {
            AdmissionStatus::Discharged => release_bed(store, &previous.bed, &self.meta.id),
            AdmissionStatus::Admitted if self.bed != previous.bed => {
                release_bed(store, &previous.bed, &self.meta.id)?;
                occupy_bed(store, &self.bed, &self.meta.id).map(|_| ())
            }
            AdmissionStatus::Admitted => Ok(()),
        }
    }

    fn after_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        if self.status == AdmissionStatus::Admitted {
            release_bed(store, &self.bed, &self.meta.id)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum DischargeType {
    Recovered,
    Referred,
    /// Left against medical advice.
    #[serde(rename = "LAMA")]
    Lama,
    Expired,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Discharge {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub admission: DocumentId,
    /// Copied from the admission.
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub patient: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub discharge_date: NaiveDate,
    pub discharge_type: Option<DischargeType>,
    pub summary: Option<String>,
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub follow_up_date: Option<NaiveDate>,
    /// Public paths of uploaded discharge papers.
    #[serde(default)]
    pub documents: Vec<String>,
}

impl Document for Discharge {
    const COLLECTION: &'static str = "discharges";
    const LABEL: &'static str = "Discharge";
    const SEARCH_FIELDS: &'static [&'static str] = &["summary", "dischargeType"];
    const DATE_FIELD: &'static str = "dischargeDate";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("admission", "admissions"),
        Reference::new("patient", "patients"),
    ];
    const ATTACHMENT_FIELD: Option<&'static str> = Some("documents");

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.follow_up_date.is_some_and(|d| d < self.discharge_date) {
            return Err(ClinicError::InvalidInput(
                "followUpDate cannot be before dischargeDate".into(),
            ));
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        let admission = require_load::<Admission>(store, &self.admission)?;
        if admission.status == AdmissionStatus::Discharged {
            return Err(ClinicError::Conflict(format!(
                "admission {} is already discharged",
                admission.meta.id
            )));
        }
        if self.discharge_date < admission.admission_date {
            return Err(ClinicError::InvalidInput(
                "dischargeDate cannot be before admissionDate".into(),
            ));
        }
        self.patient = Some(admission.patient);
        Ok(())
    }

    fn after_create(&self, store: &DocumentStore) -> ClinicResult<()> {
        let mut admission = store.load::<Admission>(&self.admission)?;
        admission.status = AdmissionStatus::Discharged;
        admission.discharge_date = Some(self.discharge_date);
        admission.meta.updated_at = Utc::now();
        store.save(&admission)?;
        release_bed(store, &admission.bed, &admission.meta.id)
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.admission != previous.admission {
            return Err(ClinicError::InvalidInput(
                "a discharge cannot move to another admission".into(),
            ));
        }
        self.patient = previous.patient.clone();
        Ok(())
    }

    fn after_update(&self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if self.discharge_date == previous.discharge_date {
            return Ok(());
        }
        if let Some(mut admission) = store.find::<Admission>(&self.admission)? {
            admission.discharge_date = Some(self.discharge_date);
            admission.meta.updated_at = Utc::now();
            store.save(&admission)?;
        }
        Ok(())
    }

    fn before_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(admission) = store.find::<Admission>(&self.admission)? {
            if admission.status == AdmissionStatus::Discharged {
                bed_is_free_for(store, &admission.bed, &admission.meta.id)?;
            }
        }
        Ok(())
    }

    /// Deleting a discharge readmits the patient to the same bed.
    fn after_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        let Some(mut admission) = store.find::<Admission>(&self.admission)? else {
            return Ok(());
        };
        if admission.status != AdmissionStatus::Discharged {
            return Ok(());
        }
        admission.status = AdmissionStatus::Admitted;
        admission.discharge_date = None;
        admission.meta.updated_at = Utc::now();
        store.save(&admission)?;
        occupy_bed(store, &admission.bed, &admission.meta.id).map(|_| ())
    }
}
