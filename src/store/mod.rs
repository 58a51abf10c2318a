//! Store
//!
//! Persistence of the canonical order list and the two snapshot views.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
    orders::OrderId,
    store::records::{OrderRecord, OrderSummary},
};

pub mod files;
pub mod memory;
pub mod records;

pub use files::CsvStore;
pub use memory::MemoryStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read
        path: PathBuf,

        /// Underlying reader error
        source: csv::Error,
    },

    /// A file could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        /// File being written
        path: PathBuf,

        /// Underlying writer error
        source: csv::Error,
    },

    /// Flushing a file failed
    #[error("failed to write {path}: {source}")]
    Io {
        /// File being written
        path: PathBuf,

        /// Underlying IO error
        source: io::Error,
    },

    /// An order row holds a value that cannot be parsed
    #[error("invalid order on line {line}: {reason}")]
    InvalidRecord {
        /// Line number in the file, counting the header as line 1
        line: u64,

        /// What was wrong with it
        reason: String,
    },

    /// Two stored orders share an id
    #[error("order {0} is stored more than once")]
    DuplicateOrder(OrderId),
}

/// Order persistence operations.
#[cfg_attr(test, mockall::automock)]
pub trait Store {
    /// Load every stored order, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order list exists but cannot be read or parsed.
    fn load_orders(&self) -> Result<Vec<OrderRecord>, StoreError>;

    /// Replace the stored order list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be written.
    fn save_orders(&mut self, orders: &[OrderRecord]) -> Result<(), StoreError>;

    /// Replace the restaurant queue snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_queue_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError>;

    /// Replace the refund ledger snapshot, latest entry first.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_ledger_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError>;
}
