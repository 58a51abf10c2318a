//! Courier prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    bulk::BulkReport,
    catalog::{
        Catalog, Customer, CustomerKey, FoodItem, FoodItemKey, Menu, Restaurant, RestaurantKey, SpecialOffer,
        loader::{CatalogError, CatalogLoader},
    },
    config::{Config, ConfigError},
    ledger::RefundLedger,
    orders::{
        AppliedOffer, ItemEntry, Order, OrderId, OrderKey, OrderLine, PaymentMethod, ValidationError,
        status::{Action, GuardViolation, OrderStatus, Transition},
    },
    pricing::{Amount, PricingError, amount, compute_total, format_amount, parse_amount},
    queue::RestaurantQueue,
    report::{FinancialReport, ReportError, RestaurantTotals},
    session::{OrderChanges, OrderDraft, OrderError, Processed, Quote, Session, Settings},
    store::{
        CsvStore, MemoryStore, Store, StoreError,
        records::{OrderRecord, OrderSummary},
    },
};
