//! End-of-day cash reconciliation for the pharmacy till.

use crate::document::{document_meta, Document, DocumentMeta};
use crate::models::billing::Expense;
use crate::models::pharmacy::PharmSale;
use crate::models::{dates, ensure_non_negative, PaymentMethod};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::Money;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Cash expected in the drawer for one day.
///
/// Only cash movements count: sales and expenses paid by card, bank transfer
/// or insurance never pass through the drawer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub date: NaiveDate,
    pub opening_cash: Money,
    pub sales_count: usize,
    /// Sale totals, net of discounts.
    pub sales_total: Money,
    pub expense_count: usize,
    pub expenses_total: Money,
    /// `openingCash + salesTotal - expensesTotal`.
    pub expected_cash: Money,
    pub counted_cash: Money,
    /// `countedCash - expectedCash`; negative when the drawer is short.
    pub difference: Money,
}

pub fn reconcile(
    store: &DocumentStore,
    date: NaiveDate,
    opening_cash: Money,
    counted_cash: Money,
) -> ClinicResult<Reconciliation> {
    let sales: Vec<PharmSale> = store
        .all::<PharmSale>()
        .into_iter()
        .filter(|s| s.date == date && PaymentMethod::is_cash(s.payment_method))
        .collect();
    let expenses: Vec<Expense> = store
        .all::<Expense>()
        .into_iter()
        .filter(|e| e.date == date && PaymentMethod::is_cash(e.payment_method))
        .collect();

    let sales_total = Money::try_sum(sales.iter().map(|s| s.total))?;
    let expenses_total = Money::try_sum(expenses.iter().map(|e| e.amount))?;
    let expected_cash = opening_cash
        .checked_add(sales_total)?
        .checked_sub(expenses_total)?;

    Ok(Reconciliation {
        date,
        opening_cash,
        sales_count: sales.len(),
        sales_total,
        expense_count: expenses.len(),
        expenses_total,
        expected_cash,
        counted_cash,
        difference: counted_cash.checked_sub(expected_cash)?,
    })
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreClosing {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub opening_cash: Money,
    #[serde(default)]
    pub counted_cash: Money,
    #[serde(default)]
    pub sales_count: usize,
    #[serde(default)]
    pub sales_total: Money,
    #[serde(default)]
    pub expense_count: usize,
    #[serde(default)]
    pub expenses_total: Money,
    #[serde(default)]
    pub expected_cash: Money,
    #[serde(default)]
    pub difference: Money,
    pub closed_by: Option<String>,
    pub notes: Option<String>,
}

impl StoreClosing {
    fn apply(&mut self, r: Reconciliation) {
        self.sales_count = r.sales_count;
        self.sales_total = r.sales_total;
        self.expense_count = r.expense_count;
        self.expenses_total = r.expenses_total;
        self.expected_cash = r.expected_cash;
        self.difference = r.difference;
    }

    fn ensure_one_per_day(&self, store: &DocumentStore) -> ClinicResult<()> {
        let taken = store
            .all::<StoreClosing>()
            .into_iter()
            .any(|c| c.date == self.date && c.meta.id != self.meta.id);
        if taken {
            return Err(ClinicError::Conflict(format!(
                "store already closed for {}",
                self.date
            )));
        }
        Ok(())
    }
}

impl Document for StoreClosing {
    const COLLECTION: &'static str = "storeclosings";
    const LABEL: &'static str = "Store closing";
    const SEARCH_FIELDS: &'static [&'static str] = &["closedBy", "notes"];
    const DATE_FIELD: &'static str = "date";

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("openingCash", self.opening_cash)?;
        ensure_non_negative("countedCash", self.counted_cash)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        self.ensure_one_per_day(store)?;
        let r = reconcile(store, self.date, self.opening_cash, self.counted_cash)?;
        tracing::info!(
            "store closing for {}: expected {}, counted {}, difference {}",
            r.date,
            r.expected_cash,
            r.counted_cash,
            r.difference
        );
        self.apply(r);
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if self.date != previous.date {
            self.ensure_one_per_day(store)?;
        }
        let r = reconcile(store, self.date, self.opening_cash, self.counted_cash)?;
        self.apply(r);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::models::pharmacy::PharmItem;
    use crate::models::test_support::test_store;
    use serde_json::json;

    fn seed_day(store: &DocumentStore) {
        let item = Collection::<PharmItem>::new(store)
            .create(json!({"name": "Panadol", "salePrice": 100, "stockQuantity": 50}))
            .unwrap();
        let sales = Collection::<PharmSale>::new(store);
        sales
            .create(json!({
                "date": "2024-07-01",
                "items": [{"item": item.meta.id.to_string(), "quantity": 3}],
                "discount": 20
            }))
            .unwrap();
        sales
            .create(json!({
                "date": "2024-07-01",
                "paymentMethod": "Card",
                "items": [{"item": item.meta.id.to_string(), "quantity": 1}]
            }))
            .unwrap();
        sales
            .create(json!({
                "date": "2024-07-02",
                "items": [{"item": item.meta.id.to_string(), "quantity": 1}]
            }))
            .unwrap();

        let expenses = Collection::<Expense>::new(store);
        expenses
            .create(json!({"category": "Tea", "amount": 50, "date": "2024-07-01", "paymentMethod": "Cash"}))
            .unwrap();
        expenses
            .create(json!({"category": "Rent", "amount": 9000, "date": "2024-07-01", "paymentMethod": "Bank Transfer"}))
            .unwrap();
    }

    #[test]
    fn test_reconcile_counts_cash_only() {
        let (_tmp, store) = test_store();
        seed_day(&store);

        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let r = reconcile(&store, day, Money::from_minor(100_000), Money::from_minor(120_000)).unwrap();

        assert_eq!(r.sales_count, 1);
        assert_eq!(r.sales_total, Money::from_minor(28_000));
        assert_eq!(r.expenses_total, Money::from_minor(5_000));
        assert_eq!(r.expected_cash, Money::from_minor(123_000));
        assert_eq!(r.difference, Money::from_minor(-3_000));
    }

    #[test]
    fn test_closing_computes_figures_and_is_unique_per_day() {
        let (_tmp, store) = test_store();
        seed_day(&store);
        let closings = Collection::<StoreClosing>::new(&store);

        let closing = closings
            .create(json!({
                "date": "2024-07-01",
                "openingCash": 1000,
                "countedCash": 1230,
                "expectedCash": 1
            }))
            .unwrap();
        assert_eq!(closing.expected_cash, Money::from_minor(123_000));
        assert_eq!(closing.difference, Money::ZERO);

        let err = closings
            .create(json!({"date": "2024-07-01", "openingCash": 0}))
            .unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));
    }
}
