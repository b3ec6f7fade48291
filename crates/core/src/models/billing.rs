//! Invoices and expenses.

use crate::document::{document_meta, Document, DocumentMeta, Reference};
use crate::models::indoor::Admission;
use crate::models::opd::Procedure;
use crate::models::patients::Patient;
use crate::models::{
    dates, default_quantity, ensure_non_negative, ensure_positive_quantity, numbered, require,
    require_load, PaymentMethod,
};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const INVOICE_SEQUENCE: &str = "invoices.number";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn for_amounts(total: Money, paid: Money) -> Self {
        if paid >= total {
            PaymentStatus::Paid
        } else if paid > Money::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    /// Defaults to the procedure name.
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub procedure: Option<DocumentId>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Defaults to the procedure's charges.
    #[serde(default)]
    pub unit_price: Money,
    /// `quantity * unitPrice`, computed.
    #[serde(default)]
    pub amount: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Assigned on create, e.g. `INV-000042`.
    #[serde(default)]
    pub number: String,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub patient: Option<DocumentId>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub admission: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub lines: Vec<InvoiceLine>,
    #[serde(default)]
    pub subtotal: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub total: Money,
    #[serde(default)]
    pub paid: Money,
    #[serde(default)]
    pub balance: Money,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl Invoice {
    /// Derives line amounts, totals, balance and payment status.
    ///
    /// Overpayment is accepted; the balance floors at zero.
    pub fn recalculate(&mut self) -> ClinicResult<()> {
        for line in self.lines.iter_mut() {
            line.amount = line.unit_price.times(line.quantity)?;
        }
        self.subtotal = Money::try_sum(self.lines.iter().map(|l| l.amount))?;

        let gross = self.subtotal.checked_add(self.tax)?;
        if self.discount > gross {
            return Err(ClinicError::InvalidInput(format!(
                "discount {} exceeds invoice amount {}",
                self.discount, gross
            )));
        }
        self.total = gross.checked_sub(self.discount)?;
        self.balance = self.total.saturating_sub_floor(self.paid);
        self.payment_status = PaymentStatus::for_amounts(self.total, self.paid);
        Ok(())
    }

    /// Fills line descriptions and prices from the procedure catalogue.
    fn price_lines(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        for line in self.lines.iter_mut() {
            let Some(procedure_id) = &line.procedure else {
                if line.description.trim().is_empty() {
                    return Err(ClinicError::InvalidInput(
                        "invoice line needs a description or a procedure".into(),
                    ));
                }
                continue;
            };
            let procedure = require_load::<Procedure>(store, procedure_id)?;
            if line.description.trim().is_empty() {
                line.description = procedure.name.into_inner();
            }
            if line.unit_price == Money::ZERO {
                line.unit_price = procedure.charges;
            }
        }
        Ok(())
    }
}

impl Document for Invoice {
    const COLLECTION: &'static str = "invoices";
    const LABEL: &'static str = "Invoice";
    const SEARCH_FIELDS: &'static [&'static str] = &["number", "notes", "paymentStatus"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("admission", "admissions"),
        Reference::new("lines.procedure", "procedures"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.lines.is_empty() {
            return Err(ClinicError::InvalidInput(
                "invoice needs at least one line".into(),
            ));
        }
        for line in &self.lines {
            ensure_positive_quantity("quantity", line.quantity)?;
            ensure_non_negative("unitPrice", line.unit_price)?;
        }
        ensure_non_negative("discount", self.discount)?;
        ensure_non_negative("tax", self.tax)?;
        ensure_non_negative("paid", self.paid)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(patient) = &self.patient {
            require::<Patient>(store, patient)?;
        }
        if let Some(admission) = &self.admission {
            require::<Admission>(store, admission)?;
        }
        self.price_lines(store)?;
        self.recalculate()?;

        let n = store.next_sequence(INVOICE_SEQUENCE)?;
        self.number = numbered("INV", 6, n);
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        self.number = previous.number.clone();
        if self.patient != previous.patient {
            if let Some(patient) = &self.patient {
                require::<Patient>(store, patient)?;
            }
        }
        self.price_lines(store)?;
        self.recalculate()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Free-form category, e.g. utilities or salaries.
    pub category: NonEmptyText,
    pub description: Option<String>,
    pub amount: Money,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub paid_to: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

impl Document for Expense {
    const COLLECTION: &'static str = "expenses";
    const LABEL: &'static str = "Expense";
    const SEARCH_FIELDS: &'static [&'static str] = &["category", "description", "paidTo"];
    const DATE_FIELD: &'static str = "date";

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("amount", self.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::models::staff::Department;
    use crate::models::test_support::test_store;
    use serde_json::json;

    #[test]
    fn test_invoice_totals_and_number() {
        let (_tmp, store) = test_store();
        let invoices = Collection::<Invoice>::new(&store);

        let invoice = invoices
            .create(json!({
                "lines": [
                    {"description": "Consultation", "unitPrice": 1000},
                    {"description": "Dressing", "quantity": 2, "unitPrice": "250.50"}
                ],
                "discount": 100,
                "tax": 50,
                "paid": 500
            }))
            .unwrap();

        assert_eq!(invoice.number, "INV-000001");
        assert_eq!(invoice.lines[1].amount, Money::from_minor(50_100));
        assert_eq!(invoice.subtotal, Money::from_minor(150_100));
        assert_eq!(invoice.total, Money::from_minor(145_100));
        assert_eq!(invoice.balance, Money::from_minor(95_100));
        assert_eq!(invoice.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_oversized_amounts_are_rejected_and_store_stays_writable() {
        let (_tmp, store) = test_store();
        let invoices = Collection::<Invoice>::new(&store);

        let err = invoices
            .create(json!({
                "lines": [{"description": "Surgery", "unitPrice": 5e16}],
                "tax": 5e16
            }))
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));

        let err = invoices
            .create(json!({
                "lines": [{"description": "Surgery", "quantity": 2, "unitPrice": 9e12}]
            }))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Money(_)));
        assert!(err.is_client_error());

        let dept = Collection::<Department>::new(&store)
            .create(json!({"name": "Surgery"}))
            .unwrap();
        assert_eq!(dept.name.as_str(), "Surgery");
        assert!(invoices
            .create(json!({"lines": [{"description": "Consultation", "unitPrice": 1000}]}))
            .is_ok());
    }

    #[test]
    fn test_overpayment_clamps_balance() {
        let (_tmp, store) = test_store();
        let invoice = Collection::<Invoice>::new(&store)
            .create(json!({
                "lines": [{"description": "X-ray", "unitPrice": 700}],
                "paid": 1000
            }))
            .unwrap();

        assert_eq!(invoice.balance, Money::ZERO);
        assert_eq!(invoice.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_lines_priced_from_procedure() {
        let (_tmp, store) = test_store();
        let procedure = Collection::<Procedure>::new(&store)
            .create(json!({"name": "ECG", "charges": 1200}))
            .unwrap();

        let invoice = Collection::<Invoice>::new(&store)
            .create(json!({"lines": [{"procedure": procedure.meta.id.to_string()}]}))
            .unwrap();

        assert_eq!(invoice.lines[0].description, "ECG");
        assert_eq!(invoice.total, Money::from_minor(120_000));
        assert_eq!(invoice.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_update_recalculates_and_keeps_number() {
        let (_tmp, store) = test_store();
        let invoices = Collection::<Invoice>::new(&store);
        let invoice = invoices
            .create(json!({"lines": [{"description": "Room", "unitPrice": 3000}]}))
            .unwrap();

        let updated = invoices
            .update(
                &invoice.meta.id.to_string(),
                json!({"paid": 3000, "number": "INV-999999", "total": 1}),
            )
            .unwrap();

        assert_eq!(updated.number, invoice.number);
        assert_eq!(updated.total, Money::from_minor(300_000));
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_invoice_rejects_empty_and_bad_lines() {
        let (_tmp, store) = test_store();
        let invoices = Collection::<Invoice>::new(&store);

        assert!(invoices.create(json!({"lines": []})).is_err());
        assert!(invoices
            .create(json!({"lines": [{"description": "A", "quantity": 0, "unitPrice": 5}]}))
            .is_err());
        assert!(invoices
            .create(json!({"lines": [{"description": "A", "unitPrice": 5}], "discount": 10}))
            .is_err());
    }

    #[test]
    fn test_zero_total_is_paid() {
        assert_eq!(
            PaymentStatus::for_amounts(Money::ZERO, Money::ZERO),
            PaymentStatus::Paid
        );
    }
}
