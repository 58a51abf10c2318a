//! Courier
//!
//! Courier is an order lifecycle and refund ledger engine for multi-restaurant food delivery:
//! pricing with special offers, per-restaurant order queues, a refund ledger, bulk expiry of
//! same-day orders and financial reporting, all backed by flat delimited files.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod ledger;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod queue;
pub mod report;
pub mod session;
pub mod store;
