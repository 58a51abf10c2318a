//! Restaurant Queue
//!
//! Active orders of one restaurant in arrival order.

use std::collections::VecDeque;

use crate::orders::OrderKey;

/// What a queue scan does with the order it just visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The order is still active and goes back to the tail.
    Requeue,

    /// The order reached a terminal state and leaves the queue.
    Drop,
}

/// FIFO of a restaurant's active (pending or preparing) orders.
#[derive(Debug, Default, Clone)]
pub struct RestaurantQueue {
    orders: VecDeque<OrderKey>,
}

impl RestaurantQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an order at the tail, unless it is already queued.
    pub fn enqueue(&mut self, order: OrderKey) -> bool {
        if self.contains(order) {
            return false;
        }

        self.orders.push_back(order);

        true
    }

    /// Up to `n` orders from the front, without removing them.
    pub fn front_window(&self, n: usize) -> impl Iterator<Item = OrderKey> + '_ {
        self.orders.iter().copied().take(n)
    }

    /// Remove an order wherever it sits, returning whether it was queued.
    pub fn remove(&mut self, order: OrderKey) -> bool {
        let Some(position) = self.orders.iter().position(|queued| *queued == order) else {
            return false;
        };

        self.orders.remove(position).is_some()
    }

    /// Visit every order queued when the scan starts, exactly once.
    ///
    /// Each order is taken from the front and handed to `visit`; orders it keeps go back to the
    /// tail. Only the length at entry is visited, so requeued orders are not seen twice.
    pub fn scan(&mut self, mut visit: impl FnMut(OrderKey) -> ScanOutcome) {
        let len = self.orders.len();

        for _ in 0..len {
            let Some(order) = self.orders.pop_front() else {
                break;
            };

            if visit(order) == ScanOutcome::Requeue {
                self.orders.push_back(order);
            }
        }
    }

    /// Whether the order is queued.
    pub fn contains(&self, order: OrderKey) -> bool {
        self.orders.contains(&order)
    }

    /// Iterate over queued orders from front to back.
    pub fn iter(&self) -> impl Iterator<Item = OrderKey> + '_ {
        self.orders.iter().copied()
    }

    /// Number of queued orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
