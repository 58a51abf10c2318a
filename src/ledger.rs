//! Refund Ledger

use rustc_hash::FxHashSet;

use crate::orders::OrderKey;

/// Process-wide stack of orders that were rejected or cancelled.
///
/// Entries are never popped; the ledger is read latest-first for reporting and snapshots.
#[derive(Debug, Default, Clone)]
pub struct RefundLedger {
    entries: Vec<OrderKey>,
    recorded: FxHashSet<OrderKey>,
}

impl RefundLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an order, returning `false` if it is already on the ledger.
    pub fn push(&mut self, order: OrderKey) -> bool {
        if !self.recorded.insert(order) {
            return false;
        }

        self.entries.push(order);

        true
    }

    /// Whether the order is on the ledger.
    pub fn contains(&self, order: OrderKey) -> bool {
        self.recorded.contains(&order)
    }

    /// Entries from the most recently pushed to the oldest.
    pub fn latest_first(&self) -> impl Iterator<Item = OrderKey> + '_ {
        self.entries.iter().rev().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
