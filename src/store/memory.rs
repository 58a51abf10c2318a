//! In-memory Store

use crate::store::{
    Store, StoreError,
    records::{OrderRecord, OrderSummary},
};

/// Keeps the order list and snapshots in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    orders: Vec<OrderRecord>,
    queue: Vec<OrderSummary>,
    ledger: Vec<OrderSummary>,
    saves: usize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `orders`.
    pub fn with_orders(orders: Vec<OrderRecord>) -> Self {
        Self {
            orders,
            ..Self::default()
        }
    }

    /// The last saved order list.
    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    /// The last saved queue snapshot.
    pub fn queue_snapshot(&self) -> &[OrderSummary] {
        &self.queue
    }

    /// The last saved ledger snapshot.
    pub fn ledger_snapshot(&self) -> &[OrderSummary] {
        &self.ledger
    }

    /// How many times the order list has been saved.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Store for MemoryStore {
    fn load_orders(&self) -> Result<Vec<OrderRecord>, StoreError> {
        Ok(self.orders.clone())
    }

    fn save_orders(&mut self, orders: &[OrderRecord]) -> Result<(), StoreError> {
        let mut orders = orders.to_vec();

        orders.sort_by_key(|order| order.id);

        self.orders = orders;
        self.saves += 1;

        Ok(())
    }

    fn save_queue_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError> {
        self.queue = entries.to_vec();

        Ok(())
    }

    fn save_ledger_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError> {
        self.ledger = entries.to_vec();

        Ok(())
    }
}
