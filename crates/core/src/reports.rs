//! Read-only aggregates behind the dashboard and summary routes.
//!
//! Every function takes the reference date explicitly instead of reading
//! the clock, so callers decide what "today" means.

use crate::models::billing::{Expense, Invoice, PaymentStatus};
use crate::models::dates::parse_date_prefix;
use crate::models::indoor::{Admission, AdmissionStatus, Bed, BedStatus};
use crate::models::opd::{Appointment, Token};
use crate::models::patients::Patient;
use crate::models::pharmacy::{MissedSale, PharmItem, PharmSale, StockEntry};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::{Days, Local, NaiveDate};
use clinic_types::Money;
use clinic_uuid::DocumentId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use utoipa::ToSchema;

/// Inclusive date bounds from `from`/`to` query parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn from_params(params: &HashMap<String, String>) -> ClinicResult<Self> {
        let parse = |key: &str| -> ClinicResult<Option<NaiveDate>> {
            match params.get(key).map(|v| v.trim()) {
                None | Some("") => Ok(None),
                Some(v) => parse_date_prefix(v).map(Some).ok_or_else(|| {
                    ClinicError::InvalidInput(format!("{} must be a YYYY-MM-DD date", key))
                }),
            }
        };
        let range = Self {
            from: parse("from")?,
            to: parse("to")?,
        };
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if to < from {
                return Err(ClinicError::InvalidInput("to must not be before from".into()));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: usize,
    pub patients_today: usize,
    pub appointments_today: usize,
    pub tokens_today: usize,
    pub admitted_patients: usize,
    pub available_beds: usize,
    /// Amount paid on invoices dated today.
    pub collections_today: Money,
    pub pharmacy_sales_today: Money,
    pub low_stock_items: usize,
}

pub fn dashboard(store: &DocumentStore, today: NaiveDate) -> DashboardStats {
    let patients = store.all::<Patient>();
    let patients_today = patients
        .iter()
        .filter(|p| p.meta.created_at.with_timezone(&Local).date_naive() == today)
        .count();

    DashboardStats {
        total_patients: patients.len(),
        patients_today,
        appointments_today: store
            .all::<Appointment>()
            .iter()
            .filter(|a| a.date == today)
            .count(),
        tokens_today: store.all::<Token>().iter().filter(|t| t.date == today).count(),
        admitted_patients: store
            .all::<Admission>()
            .iter()
            .filter(|a| a.status == AdmissionStatus::Admitted)
            .count(),
        available_beds: available_beds(store).len(),
        collections_today: store
            .all::<Invoice>()
            .iter()
            .filter(|i| i.date == today)
            .fold(Money::ZERO, |acc, i| acc.saturating_add(i.paid)),
        pharmacy_sales_today: store
            .all::<PharmSale>()
            .iter()
            .filter(|s| s.date == today)
            .fold(Money::ZERO, |acc, s| acc.saturating_add(s.total)),
        low_stock_items: low_stock(store).len(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub unpaid: usize,
    pub partial: usize,
    pub paid: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub count: usize,
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    /// Sum of invoice totals after discount and tax.
    pub gross_total: Money,
    pub paid: Money,
    pub outstanding: Money,
    pub by_status: StatusCounts,
}

pub fn invoice_summary(store: &DocumentStore, range: DateRange) -> InvoiceSummary {
    let mut summary = InvoiceSummary::default();
    for invoice in store.all::<Invoice>().iter().filter(|i| range.contains(i.date)) {
        summary.count += 1;
        summary.subtotal = summary.subtotal.saturating_add(invoice.subtotal);
        summary.discount = summary.discount.saturating_add(invoice.discount);
        summary.tax = summary.tax.saturating_add(invoice.tax);
        summary.gross_total = summary.gross_total.saturating_add(invoice.total);
        summary.paid = summary.paid.saturating_add(invoice.paid);
        summary.outstanding = summary.outstanding.saturating_add(invoice.balance);
        match invoice.payment_status {
            PaymentStatus::Unpaid => summary.by_status.unpaid += 1,
            PaymentStatus::Partial => summary.by_status.partial += 1,
            PaymentStatus::Paid => summary.by_status.paid += 1,
        }
    }
    summary
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub count: usize,
    pub total: Money,
    /// Largest category first.
    pub by_category: Vec<CategoryTotal>,
}

pub fn expense_summary(store: &DocumentStore, range: DateRange) -> ExpenseSummary {
    let mut per_category: BTreeMap<String, CategoryTotal> = BTreeMap::new();
    let mut summary = ExpenseSummary::default();

    for expense in store.all::<Expense>().into_iter().filter(|e| range.contains(e.date)) {
        summary.count += 1;
        summary.total = summary.total.saturating_add(expense.amount);

        let category = expense.category.into_inner();
        let entry = per_category
            .entry(category.to_lowercase())
            .or_insert_with(|| CategoryTotal {
                category,
                count: 0,
                total: Money::ZERO,
            });
        entry.count += 1;
        entry.total = entry.total.saturating_add(expense.amount);
    }

    let mut by_category: Vec<CategoryTotal> = per_category.into_values().collect();
    by_category.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    summary.by_category = by_category;
    summary
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopItem {
    pub item: DocumentId,
    pub name: String,
    pub units: u32,
    pub amount: Money,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub sale_count: usize,
    pub gross: Money,
    pub discount: Money,
    pub net: Money,
    pub units_sold: u32,
    /// Best sellers by units, at most `limit` entries.
    pub top_items: Vec<TopItem>,
    pub missed_count: usize,
    pub missed_units: u32,
}

pub fn sales_summary(store: &DocumentStore, range: DateRange, limit: usize) -> SalesSummary {
    let mut summary = SalesSummary::default();
    let mut per_item: HashMap<DocumentId, TopItem> = HashMap::new();

    for sale in store.all::<PharmSale>().iter().filter(|s| range.contains(s.date)) {
        summary.sale_count += 1;
        summary.gross = summary.gross.saturating_add(sale.subtotal);
        summary.discount = summary.discount.saturating_add(sale.discount);
        summary.net = summary.net.saturating_add(sale.total);
        summary.units_sold = summary.units_sold.saturating_add(sale.units_sold());

        for line in sale.items.iter().filter(|l| l.sold_quantity > 0) {
            let entry = per_item.entry(line.item.clone()).or_insert_with(|| TopItem {
                item: line.item.clone(),
                name: line.name.clone(),
                units: 0,
                amount: Money::ZERO,
            });
            entry.units = entry.units.saturating_add(line.sold_quantity);
            entry.amount = entry.amount.saturating_add(line.amount);
        }
    }

    let mut top: Vec<TopItem> = per_item.into_values().collect();
    top.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.name.cmp(&b.name)));
    top.truncate(limit);
    summary.top_items = top;

    for missed in store.all::<MissedSale>().iter().filter(|m| range.contains(m.date)) {
        summary.missed_count += 1;
        summary.missed_units = summary.missed_units.saturating_add(missed.quantity);
    }
    summary
}

/// Items at or below their reorder level, emptiest first.
pub fn low_stock(store: &DocumentStore) -> Vec<PharmItem> {
    let mut items: Vec<PharmItem> = store
        .all::<PharmItem>()
        .into_iter()
        .filter(PharmItem::is_low_stock)
        .collect();
    items.sort_by(|a, b| {
        a.stock_quantity
            .cmp(&b.stock_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    items
}

/// Stock batches whose expiry falls within `days` of `today`, including
/// batches that have already expired. Soonest first.
pub fn expiring_stock(store: &DocumentStore, today: NaiveDate, days: u32) -> Vec<StockEntry> {
    let horizon = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);
    let mut entries: Vec<StockEntry> = store
        .all::<StockEntry>()
        .into_iter()
        .filter(|e| e.expiry_date.is_some_and(|d| d <= horizon))
        .collect();
    entries.sort_by_key(|e| e.expiry_date);
    entries
}

pub fn available_beds(store: &DocumentStore) -> Vec<Bed> {
    let mut beds: Vec<Bed> = store
        .all::<Bed>()
        .into_iter()
        .filter(|b| b.status == BedStatus::Available)
        .collect();
    beds.sort_by(|a, b| a.number.cmp(&b.number));
    beds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::models::test_support::test_store;
    use serde_json::json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn range(from: u32, to: u32) -> DateRange {
        DateRange {
            from: Some(day(from)),
            to: Some(day(to)),
        }
    }

    #[test]
    fn test_date_range_from_params() {
        let mut params = HashMap::new();
        params.insert("from".to_string(), "2024-08-01".to_string());
        params.insert("to".to_string(), "".to_string());
        let r = DateRange::from_params(&params).unwrap();
        assert_eq!(r.from, Some(day(1)));
        assert!(r.to.is_none());
        assert!(r.contains(day(30)));
        assert!(!r.contains(NaiveDate::from_ymd_opt(2024, 7, 31).unwrap()));

        params.insert("to".to_string(), "2024-07-01".to_string());
        assert!(DateRange::from_params(&params).is_err());
    }

    #[test]
    fn test_invoice_summary() {
        let (_tmp, store) = test_store();
        let invoices = Collection::<Invoice>::new(&store);
        for (date, price, paid) in [("2024-08-01", 1000, 0), ("2024-08-02", 500, 200), ("2024-08-03", 300, 300), ("2024-09-01", 999, 0)] {
            invoices
                .create(json!({
                    "date": date,
                    "lines": [{"description": "Visit", "unitPrice": price}],
                    "paid": paid
                }))
                .unwrap();
        }

        let s = invoice_summary(&store, range(1, 31));
        assert_eq!(s.count, 3);
        assert_eq!(s.gross_total, Money::from_minor(180_000));
        assert_eq!(s.paid, Money::from_minor(50_000));
        assert_eq!(s.outstanding, Money::from_minor(130_000));
        assert_eq!(s.by_status, StatusCounts { unpaid: 1, partial: 1, paid: 1 });
    }

    #[test]
    fn test_expense_summary_groups_categories() {
        let (_tmp, store) = test_store();
        let expenses = Collection::<Expense>::new(&store);
        for (category, amount) in [("Utilities", 300), ("utilities", 200), ("Tea", 50)] {
            expenses
                .create(json!({"category": category, "amount": amount, "date": "2024-08-05"}))
                .unwrap();
        }

        let s = expense_summary(&store, DateRange::default());
        assert_eq!(s.count, 3);
        assert_eq!(s.total, Money::from_minor(55_000));
        assert_eq!(s.by_category.len(), 2);
        assert_eq!(s.by_category[0].count, 2);
        assert_eq!(s.by_category[0].total, Money::from_minor(50_000));
    }

    #[test]
    fn test_sales_summary_and_stock_reports() {
        let (_tmp, store) = test_store();
        let items = Collection::<PharmItem>::new(&store);
        let panadol = items
            .create(json!({"name": "Panadol", "salePrice": 10, "stockQuantity": 20, "reorderLevel": 5}))
            .unwrap();
        let brufen = items
            .create(json!({"name": "Brufen", "salePrice": 20, "stockQuantity": 2, "reorderLevel": 5}))
            .unwrap();

        let sales = Collection::<PharmSale>::new(&store);
        sales
            .create(json!({
                "date": "2024-08-10",
                "items": [
                    {"item": panadol.meta.id.to_string(), "quantity": 6},
                    {"item": brufen.meta.id.to_string(), "quantity": 4}
                ],
                "discount": 5
            }))
            .unwrap();

        let s = sales_summary(&store, range(10, 10), 5);
        assert_eq!(s.sale_count, 1);
        assert_eq!(s.gross, Money::from_minor(10_000));
        assert_eq!(s.net, Money::from_minor(9_500));
        assert_eq!(s.units_sold, 8);
        assert_eq!(s.top_items[0].name, "Panadol");
        assert_eq!(s.missed_count, 1);
        assert_eq!(s.missed_units, 2);

        let low: Vec<String> = low_stock(&store).iter().map(|i| i.name.to_string()).collect();
        assert_eq!(low, vec!["Brufen".to_string()]);
    }

    #[test]
    fn test_expiring_stock_includes_expired() {
        let (_tmp, store) = test_store();
        let item = Collection::<PharmItem>::new(&store)
            .create(json!({"name": "Syrup"}))
            .unwrap();
        let entries = Collection::<StockEntry>::new(&store);
        for expiry in ["2024-07-01", "2024-08-20", "2024-12-31", ""] {
            entries
                .create(json!({"item": item.meta.id.to_string(), "quantity": 1, "expiryDate": expiry}))
                .unwrap();
        }

        let expiring = expiring_stock(&store, day(1), 30);
        let dates: Vec<Option<NaiveDate>> = expiring.iter().map(|e| e.expiry_date).collect();
        assert_eq!(
            dates,
            vec![NaiveDate::from_ymd_opt(2024, 7, 1), Some(day(20))]
        );
    }

    #[test]
    fn test_dashboard_counts() {
        let (_tmp, store) = test_store();
        let today = day(15);
        let patient = Collection::<Patient>::new(&store)
            .create(json!({"name": "Ayesha"}))
            .unwrap();
        let beds = Collection::<Bed>::new(&store);
        let bed = beds.create(json!({"number": "B-1"})).unwrap();
        beds.create(json!({"number": "B-2"})).unwrap();
        Collection::<Admission>::new(&store)
            .create(json!({
                "patient": patient.meta.id.to_string(),
                "bed": bed.meta.id.to_string(),
                "admissionDate": "2024-08-14"
            }))
            .unwrap();
        Collection::<Invoice>::new(&store)
            .create(json!({
                "date": "2024-08-15",
                "lines": [{"description": "Visit", "unitPrice": 400}],
                "paid": 400
            }))
            .unwrap();

        let stats = dashboard(&store, today);
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.admitted_patients, 1);
        assert_eq!(stats.available_beds, 1);
        assert_eq!(stats.collections_today, Money::from_minor(40_000));
        assert_eq!(stats.appointments_today, 0);
    }
}
