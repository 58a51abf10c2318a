//! Store Records
//!
//! Plain order data as it crosses the store boundary, and the row layouts of the order file
//! and the two snapshot files.

use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    orders::{
        ItemEntry, OrderId,
        status::OrderStatus,
        timestamps::{format_date, format_date_time, format_time, parse_date_and_time, parse_date_time},
    },
    pricing::{Amount, format_amount, parse_amount},
    store::StoreError,
};

/// Header of the canonical order file.
pub const ORDER_HEADERS: [&str; 10] = [
    "OrderId",
    "CustomerEmail",
    "RestaurantId",
    "DeliveryDate",
    "DeliveryTime",
    "DeliveryAddress",
    "CreatedDateTime",
    "TotalAmount",
    "Status",
    "Items",
];

/// Header of the restaurant queue snapshot.
pub const QUEUE_HEADERS: [&str; 6] = [
    "RestaurantId",
    "OrderId",
    "CustomerEmail",
    "DeliveryDateTime",
    "TotalAmount",
    "Status",
];

/// Header of the refund ledger snapshot.
pub const LEDGER_HEADERS: [&str; 6] = [
    "OrderId",
    "CustomerEmail",
    "RestaurantId",
    "DeliveryDateTime",
    "TotalAmount",
    "Status",
];

/// An order as stored in the canonical order file.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    /// Order identifier
    pub id: OrderId,

    /// Email of the ordering customer
    pub customer_email: String,

    /// Restaurant identifier
    pub restaurant_id: String,

    /// Delivery date and time
    pub delivery_at: DateTime,

    /// Delivery address
    pub delivery_address: String,

    /// Creation date and time
    pub created_at: DateTime,

    /// Total charged
    pub total: Amount,

    /// Lifecycle state
    pub status: OrderStatus,

    /// Item lines
    pub items: Vec<ItemEntry>,
}

/// The columns shared by both snapshot files.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// Order identifier
    pub id: OrderId,

    /// Email of the ordering customer
    pub customer_email: String,

    /// Restaurant identifier
    pub restaurant_id: String,

    /// Delivery date and time
    pub delivery_at: DateTime,

    /// Total charged
    pub total: Amount,

    /// Lifecycle state
    pub status: OrderStatus,
}

impl From<&OrderRecord> for OrderSummary {
    fn from(record: &OrderRecord) -> Self {
        Self {
            id: record.id,
            customer_email: record.customer_email.clone(),
            restaurant_id: record.restaurant_id.clone(),
            delivery_at: record.delivery_at,
            total: record.total,
            status: record.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OrderRow {
    order_id: String,
    customer_email: String,
    restaurant_id: String,
    delivery_date: String,
    delivery_time: String,
    delivery_address: String,
    created_date_time: String,
    total_amount: String,
    status: String,
    items: String,
}

impl From<&OrderRecord> for OrderRow {
    fn from(record: &OrderRecord) -> Self {
        Self {
            order_id: record.id.to_string(),
            customer_email: record.customer_email.clone(),
            restaurant_id: record.restaurant_id.clone(),
            delivery_date: format_date(record.delivery_at),
            delivery_time: format_time(record.delivery_at),
            delivery_address: record.delivery_address.clone(),
            created_date_time: format_date_time(record.created_at),
            total_amount: format_amount(&record.total),
            status: record.status.to_string(),
            items: encode_items(&record.items),
        }
    }
}

impl OrderRow {
    /// Convert a row read from `line` of the order file into a record.
    pub(crate) fn into_record(self, line: u64) -> Result<OrderRecord, StoreError> {
        let invalid = |reason: String| StoreError::InvalidRecord { line, reason };

        let id = self
            .order_id
            .parse::<OrderId>()
            .map_err(|err| invalid(format!("order id {:?}: {err}", self.order_id)))?;

        let delivery_at = parse_date_and_time(&self.delivery_date, &self.delivery_time)
            .map_err(|err| invalid(err.to_string()))?;

        let created_at = parse_date_time(&self.created_date_time).map_err(|err| invalid(err.to_string()))?;

        let total = parse_amount(&self.total_amount).map_err(|err| invalid(err.to_string()))?;

        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|err| invalid(err.to_string()))?;

        Ok(OrderRecord {
            id,
            customer_email: self.customer_email,
            restaurant_id: self.restaurant_id,
            delivery_at,
            delivery_address: self.delivery_address,
            created_at,
            total,
            status,
            items: decode_items(id, &self.items),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct QueueRow {
    restaurant_id: String,
    order_id: u32,
    customer_email: String,
    delivery_date_time: String,
    total_amount: String,
    status: &'static str,
}

impl From<&OrderSummary> for QueueRow {
    fn from(summary: &OrderSummary) -> Self {
        Self {
            restaurant_id: summary.restaurant_id.clone(),
            order_id: summary.id.get(),
            customer_email: summary.customer_email.clone(),
            delivery_date_time: format_date_time(summary.delivery_at),
            total_amount: format_amount(&summary.total),
            status: summary.status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LedgerRow {
    order_id: u32,
    customer_email: String,
    restaurant_id: String,
    delivery_date_time: String,
    total_amount: String,
    status: &'static str,
}

impl From<&OrderSummary> for LedgerRow {
    fn from(summary: &OrderSummary) -> Self {
        Self {
            order_id: summary.id.get(),
            customer_email: summary.customer_email.clone(),
            restaurant_id: summary.restaurant_id.clone(),
            delivery_date_time: format_date_time(summary.delivery_at),
            total_amount: format_amount(&summary.total),
            status: summary.status.as_str(),
        }
    }
}

/// Join item lines as `Name,Qty|Name,Qty`.
pub fn encode_items(items: &[ItemEntry]) -> String {
    items
        .iter()
        .map(|item| format!("{},{}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join("|")
}

/// Split `Name,Qty|Name,Qty` into item lines.
///
/// Each pair is split on its last comma, so item names may contain commas. Malformed pairs
/// and zero quantities are skipped.
pub fn decode_items(order: OrderId, cell: &str) -> Vec<ItemEntry> {
    cell.split('|')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let entry = pair.rsplit_once(',').and_then(|(name, quantity)| {
                let quantity = quantity.trim().parse::<u32>().ok().filter(|quantity| *quantity > 0)?;

                Some(ItemEntry {
                    name: name.trim().to_string(),
                    quantity,
                })
            });

            if entry.is_none() {
                warn!(%order, pair, "skipping malformed item");
            }

            entry
        })
        .collect()
}
