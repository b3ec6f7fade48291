//! Pharmacy inventory and point of sale.
//!
//! `PharmItem::stock_quantity` is the single running stock figure. It moves
//! when stock entries are received or removed, when a sale is made or
//! deleted, and when a purchase order is received. All of those run inside
//! the store write guard, through [`adjust_stock`].

use crate::document::{document_meta, Document, DocumentMeta, Reference};
use crate::models::patients::Patient;
use crate::models::{
    dates, ensure_non_negative, ensure_positive_quantity, numbered, require, require_load,
    PaymentMethod,
};
use crate::store::DocumentStore;
use crate::{ClinicError, ClinicResult};
use chrono::{NaiveDate, Utc};
use clinic_types::{Money, NonEmptyText};
use clinic_uuid::DocumentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

const RECEIPT_SEQUENCE: &str = "pharmsales.receiptNumber";
const PURCHASE_ORDER_SEQUENCE: &str = "purchaseorders.number";

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmCategory {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub description: Option<String>,
}

impl Document for PharmCategory {
    const COLLECTION: &'static str = "pharmcategories";
    const LABEL: &'static str = "Pharmacy category";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];

    document_meta!();
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmSupplier {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl Document for PharmSupplier {
    const COLLECTION: &'static str = "pharmsuppliers";
    const LABEL: &'static str = "Supplier";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "contactPerson", "phone"];

    document_meta!();
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmItem {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: NonEmptyText,
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub category: Option<DocumentId>,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub supplier: Option<DocumentId>,
    /// Dispensing unit, e.g. tablet or bottle.
    pub unit: Option<String>,
    pub barcode: Option<String>,
    #[serde(default)]
    pub purchase_price: Money,
    #[serde(default)]
    pub sale_price: Money,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub reorder_level: u32,
}

impl PharmItem {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }
}

impl Document for PharmItem {
    const COLLECTION: &'static str = "pharmitems";
    const LABEL: &'static str = "Pharmacy item";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "genericName", "barcode"];
    const REFERENCES: &'static [Reference] = &[
        Reference::new("category", "pharmcategories"),
        Reference::new("supplier", "pharmsuppliers"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_non_negative("purchasePrice", self.purchase_price)?;
        ensure_non_negative("salePrice", self.sale_price)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(category) = &self.category {
            require::<PharmCategory>(store, category)?;
        }
        if let Some(supplier) = &self.supplier {
            require::<PharmSupplier>(store, supplier)?;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.stock_quantity != previous.stock_quantity {
            tracing::info!(
                "manual stock adjustment for {}: {} -> {}",
                self.name,
                previous.stock_quantity,
                self.stock_quantity
            );
        }
        Ok(())
    }
}

/// Moves an item's stock by `delta`, flooring at zero.
pub(crate) fn adjust_stock(
    store: &DocumentStore,
    item_id: &DocumentId,
    delta: i64,
) -> ClinicResult<PharmItem> {
    let mut item = require_load::<PharmItem>(store, item_id)?;
    let next = (i64::from(item.stock_quantity) + delta).clamp(0, i64::from(u32::MAX));
    if i64::from(item.stock_quantity) + delta < 0 {
        tracing::warn!(
            "stock for {} would go negative ({} {:+}); clamped to 0",
            item.name,
            item.stock_quantity,
            delta
        );
    }
    item.stock_quantity = next as u32;
    item.meta.updated_at = Utc::now();
    store.save(&item)?;
    Ok(item)
}

/// A batch of stock received into the pharmacy.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub item: DocumentId,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub supplier: Option<DocumentId>,
    pub batch_number: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub purchase_price: Money,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub received_date: NaiveDate,
    pub notes: Option<String>,
}

impl Document for StockEntry {
    const COLLECTION: &'static str = "pharmstock";
    const LABEL: &'static str = "Stock entry";
    const SEARCH_FIELDS: &'static [&'static str] = &["batchNumber", "notes"];
    const DATE_FIELD: &'static str = "receivedDate";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("item", "pharmitems"),
        Reference::new("supplier", "pharmsuppliers"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_positive_quantity("quantity", self.quantity)?;
        ensure_non_negative("purchasePrice", self.purchase_price)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        require::<PharmItem>(store, &self.item)?;
        if let Some(supplier) = &self.supplier {
            require::<PharmSupplier>(store, supplier)?;
        }
        Ok(())
    }

    fn after_create(&self, store: &DocumentStore) -> ClinicResult<()> {
        adjust_stock(store, &self.item, i64::from(self.quantity)).map(|_| ())
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.item != previous.item {
            return Err(ClinicError::InvalidInput(
                "a stock entry cannot move to another item".into(),
            ));
        }
        Ok(())
    }

    fn after_update(&self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        let delta = i64::from(self.quantity) - i64::from(previous.quantity);
        if delta != 0 {
            adjust_stock(store, &self.item, delta)?;
        }
        Ok(())
    }

    fn after_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        match adjust_stock(store, &self.item, -i64::from(self.quantity)) {
            Err(ClinicError::InvalidInput(_)) => Ok(()),
            other => other.map(|_| ()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub item: DocumentId,
    /// Item name at the time of sale.
    #[serde(default)]
    pub name: String,
    /// Quantity asked for.
    pub quantity: u32,
    /// Quantity actually dispensed; the rest is recorded as a missed sale.
    #[serde(default)]
    pub sold_quantity: u32,
    #[serde(default)]
    pub unit_price: Money,
    #[serde(default)]
    pub amount: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmSale {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Assigned on create, e.g. `RCP-000042`.
    #[serde(default)]
    pub receipt_number: String,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub patient: Option<DocumentId>,
    pub customer_name: Option<String>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub items: Vec<SaleLine>,
    #[serde(default)]
    pub subtotal: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub total: Money,
    /// Cash handed over by the customer.
    #[serde(default)]
    pub paid: Money,
    #[serde(default)]
    pub change: Money,
    pub payment_method: Option<PaymentMethod>,
}

impl PharmSale {
    pub fn units_sold(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.sold_quantity))
    }

    fn recalculate(&mut self) -> ClinicResult<()> {
        for line in self.items.iter_mut() {
            line.amount = line.unit_price.times(line.sold_quantity)?;
        }
        self.subtotal = Money::try_sum(self.items.iter().map(|l| l.amount))?;
        if self.discount > self.subtotal {
            return Err(ClinicError::InvalidInput(format!(
                "discount {} exceeds sale amount {}",
                self.discount, self.subtotal
            )));
        }
        self.total = self.subtotal.checked_sub(self.discount)?;
        self.change = self.paid.saturating_sub_floor(self.total);
        Ok(())
    }

    /// Prices each line and decides how much of it stock can cover.
    fn fill_from_stock(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        let mut remaining: HashMap<DocumentId, u32> = HashMap::new();
        for line in self.items.iter_mut() {
            let item = require_load::<PharmItem>(store, &line.item)?;
            let available = remaining
                .entry(line.item.clone())
                .or_insert(item.stock_quantity);

            line.sold_quantity = line.quantity.min(*available);
            *available -= line.sold_quantity;
            if line.name.trim().is_empty() {
                line.name = item.name.to_string();
            }
            if line.unit_price == Money::ZERO {
                line.unit_price = item.sale_price;
            }
        }
        Ok(())
    }

    fn missed_sales(&self) -> Vec<MissedSale> {
        self.items
            .iter()
            .filter(|l| l.sold_quantity < l.quantity)
            .map(|l| MissedSale {
                meta: DocumentMeta::new(),
                item: l.item.clone(),
                item_name: l.name.clone(),
                requested_quantity: l.quantity,
                quantity: l.quantity - l.sold_quantity,
                sale: Some(self.meta.id.clone()),
                date: self.date,
                notes: None,
            })
            .collect()
    }
}

impl Document for PharmSale {
    const COLLECTION: &'static str = "pharmsales";
    const LABEL: &'static str = "Sale";
    const SEARCH_FIELDS: &'static [&'static str] = &["receiptNumber", "customerName"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("patient", "patients"),
        Reference::new("items.item", "pharmitems"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.items.is_empty() {
            return Err(ClinicError::InvalidInput("sale needs at least one item".into()));
        }
        for line in &self.items {
            ensure_positive_quantity("quantity", line.quantity)?;
            ensure_non_negative("unitPrice", line.unit_price)?;
        }
        ensure_non_negative("discount", self.discount)?;
        ensure_non_negative("paid", self.paid)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(patient) = &self.patient {
            require::<Patient>(store, patient)?;
        }
        self.fill_from_stock(store)?;
        self.recalculate()?;

        let n = store.next_sequence(RECEIPT_SEQUENCE)?;
        self.receipt_number = numbered("RCP", 6, n);
        Ok(())
    }

    fn after_create(&self, store: &DocumentStore) -> ClinicResult<()> {
        for line in self.items.iter().filter(|l| l.sold_quantity > 0) {
            adjust_stock(store, &line.item, -i64::from(line.sold_quantity))?;
        }
        for missed in self.missed_sales() {
            tracing::info!(
                "missed sale on {}: {} short of {}",
                self.receipt_number,
                missed.quantity,
                missed.item_name
            );
            store.save(&missed)?;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, _store: &DocumentStore) -> ClinicResult<()> {
        let same_lines = self.items.len() == previous.items.len()
            && self
                .items
                .iter()
                .zip(&previous.items)
                .all(|(a, b)| a.item == b.item && a.quantity == b.quantity);
        if !same_lines {
            return Err(ClinicError::InvalidInput(
                "sale lines cannot be edited; delete the sale and ring it up again".into(),
            ));
        }
        self.items = previous.items.clone();
        self.receipt_number = previous.receipt_number.clone();
        self.recalculate()
    }

    fn after_delete(&self, store: &DocumentStore) -> ClinicResult<()> {
        for line in self.items.iter().filter(|l| l.sold_quantity > 0) {
            if store.exists::<PharmItem>(&line.item) {
                adjust_stock(store, &line.item, i64::from(line.sold_quantity))?;
            }
        }
        let linked = store
            .all::<MissedSale>()
            .into_iter()
            .filter(|m| m.sale.as_ref() == Some(&self.meta.id));
        for missed in linked {
            store.remove::<MissedSale>(&missed.meta.id)?;
        }
        Ok(())
    }
}

/// Demand the pharmacy could not serve from stock.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MissedSale {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub item: DocumentId,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub requested_quantity: u32,
    /// Units that could not be dispensed.
    pub quantity: u32,
    /// The sale that ran short, if recorded at the till.
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub sale: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub date: NaiveDate,
    pub notes: Option<String>,
}

impl Document for MissedSale {
    const COLLECTION: &'static str = "missedsales";
    const LABEL: &'static str = "Missed sale";
    const SEARCH_FIELDS: &'static [&'static str] = &["itemName", "notes"];
    const DATE_FIELD: &'static str = "date";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("item", "pharmitems"),
        Reference::new("sale", "pharmsales"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        ensure_positive_quantity("quantity", self.quantity)
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        let item = require_load::<PharmItem>(store, &self.item)?;
        if self.item_name.trim().is_empty() {
            self.item_name = item.name.into_inner();
        }
        self.requested_quantity = self.requested_quantity.max(self.quantity);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PurchaseOrderStatus {
    #[default]
    Pending,
    Ordered,
    Received,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLine {
    pub item: DocumentId,
    pub quantity: u32,
    #[serde(default)]
    pub unit_cost: Money,
    #[serde(default)]
    pub amount: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    /// Assigned on create, e.g. `PO-00042`.
    #[serde(default)]
    pub number: String,
    #[serde(default, deserialize_with = "dates::opt_id")]
    pub supplier: Option<DocumentId>,
    #[serde(default = "dates::today", deserialize_with = "dates::date")]
    pub order_date: NaiveDate,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub expected_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "dates::opt_date")]
    pub received_date: Option<NaiveDate>,
    pub items: Vec<PurchaseLine>,
    #[serde(default)]
    pub total: Money,
    #[serde(default)]
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
}

impl PurchaseOrder {
    fn recalculate(&mut self) -> ClinicResult<()> {
        for line in self.items.iter_mut() {
            line.amount = line.unit_cost.times(line.quantity)?;
        }
        self.total = Money::try_sum(self.items.iter().map(|l| l.amount))?;
        Ok(())
    }

    fn receive(&self, store: &DocumentStore) -> ClinicResult<()> {
        for line in &self.items {
            adjust_stock(store, &line.item, i64::from(line.quantity))?;
        }
        tracing::info!("purchase order {} received into stock", self.number);
        Ok(())
    }

    fn check_references(&self, store: &DocumentStore) -> ClinicResult<()> {
        if let Some(supplier) = &self.supplier {
            require::<PharmSupplier>(store, supplier)?;
        }
        for line in &self.items {
            require::<PharmItem>(store, &line.item)?;
        }
        Ok(())
    }
}

impl Document for PurchaseOrder {
    const COLLECTION: &'static str = "purchaseorders";
    const LABEL: &'static str = "Purchase order";
    const SEARCH_FIELDS: &'static [&'static str] = &["number", "notes", "status"];
    const DATE_FIELD: &'static str = "orderDate";
    const REFERENCES: &'static [Reference] = &[
        Reference::new("supplier", "pharmsuppliers"),
        Reference::new("items.item", "pharmitems"),
    ];

    document_meta!();

    fn validate(&self) -> ClinicResult<()> {
        if self.items.is_empty() {
            return Err(ClinicError::InvalidInput(
                "purchase order needs at least one item".into(),
            ));
        }
        for line in &self.items {
            ensure_positive_quantity("quantity", line.quantity)?;
            ensure_non_negative("unitCost", line.unit_cost)?;
        }
        Ok(())
    }

    fn before_create(&mut self, store: &DocumentStore) -> ClinicResult<()> {
        self.check_references(store)?;
        self.recalculate()?;
        if self.status == PurchaseOrderStatus::Received {
            self.received_date.get_or_insert_with(dates::today);
        }
        let n = store.next_sequence(PURCHASE_ORDER_SEQUENCE)?;
        self.number = numbered("PO", 5, n);
        Ok(())
    }

    fn after_create(&self, store: &DocumentStore) -> ClinicResult<()> {
        if self.status == PurchaseOrderStatus::Received {
            self.receive(store)?;
        }
        Ok(())
    }

    fn before_update(&mut self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        self.number = previous.number.clone();
        if previous.status == PurchaseOrderStatus::Received {
            let unchanged = self.status == PurchaseOrderStatus::Received
                && self.items.len() == previous.items.len()
                && self
                    .items
                    .iter()
                    .zip(&previous.items)
                    .all(|(a, b)| a.item == b.item && a.quantity == b.quantity);
            if !unchanged {
                return Err(ClinicError::Conflict(format!(
                    "purchase order {} has been received and its items are in stock",
                    previous.number
                )));
            }
        }
        self.check_references(store)?;
        self.recalculate()?;
        if self.status == PurchaseOrderStatus::Received {
            self.received_date.get_or_insert_with(dates::today);
        }
        Ok(())
    }

    fn after_update(&self, previous: &Self, store: &DocumentStore) -> ClinicResult<()> {
        if previous.status != PurchaseOrderStatus::Received
            && self.status == PurchaseOrderStatus::Received
        {
            self.receive(store)?;
        }
        Ok(())
    }

    fn before_delete(&self, _store: &DocumentStore) -> ClinicResult<()> {
        if self.status == PurchaseOrderStatus::Received {
            return Err(ClinicError::Conflict(format!(
                "purchase order {} has been received and cannot be deleted",
                self.number
            )));
        }
        Ok(())
    }
}
