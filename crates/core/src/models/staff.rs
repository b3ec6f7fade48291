//! Departments, employees and their schedules.

use crate::document::{document_meta, Document, DocumentMeta, Reference};
use crate::models::{dates, default_true, ensure_non_negative, require};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub description: Option<String>,
    /// Name of the head of department.
    pub head: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Document for Department {
    const COLLECTION: &'static str = "departments";
    const LABEL: &'static str = "Department";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "head"];

    document_meta!();

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        ensure_unique_department_name(self, store)
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if !self.name.as_str().eq_ignore_ascii_case(previous.name.as_str()) {
            ensure_unique_department_name(self, store)?;
        }
        Ok(())
    }
}

fn ensure_unique_department_name(dept: &Department, store: &DocumentStore) -> ClinicResult<()> {
    let taken = store.all::<Department>().into_iter().any(|other| {
        other.meta.id != dept.meta.id
            && other.name.as_str().eq_ignore_ascii_case(dept.name.as_str())
    });
    if taken {
        return Err(ClinicError::Conflict(format!(
            "department {} already exists",
            dept.name
        )));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub designation: Option<String>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub department: Option<DocumentId>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub is_doctor: bool,
    pub specialization: Option<String>,
    /// Default OPD fee when this employee is a doctor.
    #[serde(default)]
    pub consultation_fee: Money,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub joining_date: Option<NaiveDate>,
    #[serde(default)]
    pub salary: Money,
    #[serde(default)]
    pub status: EmployeeStatus,
    pub image: Option<String>,
}

impl Document for Employee {
    const COLLECTION: &'static str = "employees";
    const LABEL: &'static str = "Employee";
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "designation", "phone", "email", "specialization"];
    const REFERENCES: &'static [Reference] = &[Reference::new("department", "departments")];
    const ATTACHMENT_FIELD: Option<&'static str> = Some("image");

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("consultationFee", self.consultation_fee)?;
        ensure_non_negative("salary", self.salary)?;
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(ClinicError::InvalidInput(format!("invalid email: {}", email)));
            }
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(dept) = &self.department {
            require::<Department>(store, dept)?;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        match &self.department {
            Some(dept) if previous.department.as_ref() != Some(dept) => {
                require::<Department>(store, dept)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LeaveType {
    Casual,
    Sick,
    Annual,
    Unpaid,
    Other,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LeaveStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub employee: DocumentId,
    pub leave_type: LeaveType,
    #[serde(deserialize_with = "dates::date")]
    pub from: NaiveDate,
    #[serde(deserialize_with = "dates::date")]
    pub to: NaiveDate,
    pub reason: Option<String>,
    #[serde(default)]
    pub status: LeaveStatus,
}

impl Leave {
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

impl Document for Leave {
    const COLLECTION: &'static str = "leaves";
    const LABEL: &'static str = "Leave";
    const SEARCH_FIELDS: &'static [&'static str] = &["reason", "leaveType", "status"];
    const DATE_FIELD: &'static str = "from";
    const REFERENCES: &'static [Reference] = &[Reference::new("employee", "employees")];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.to < self.from {
            return Err(ClinicError::InvalidInput("leave cannot end before it starts".into()));
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Employee>(store, &self.employee)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Shift {
    Morning,
    Evening,
    Night,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DutyRoster {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub employee: DocumentId,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub department: Option<DocumentId>,
    #[serde(deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub shift: Shift,
    /// `HH:MM`, free-form.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub notes: Option<String>,
}

impl Document for DutyRoster {
    const COLLECTION: &'static str = "dutyrosters";
    const LABEL: &'static str = "Duty roster";
    const SEARCH_FIELDS: &'static [&'static str] = &["shift", "notes"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("employee", "employees"),
        Reference::new("department", "departments"),
    ];

    document_meta!();

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<Employee>(store, &self.employee)?;
        if let Some(dept) = &self.department {
            require::<Department>(store, dept)?;
        }
        let clash = store.all::<DutyRoster>().into_iter().any(|other| {
            other.employee == self.employee && other.date == self.date && other.shift == self.shift
        });
        if clash {
            return Err(ClinicError::Conflict(format!(
                "employee already rostered for the {:?} shift on {}",
                self.shift, self.date
            )));
        }
        Ok(())
    }
}
