//! CSV Store
//!
//! Every save rewrites its file in full, header first.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::Config,
    store::{
        Store, StoreError,
        records::{
            LEDGER_HEADERS, LedgerRow, ORDER_HEADERS, OrderRecord, OrderRow, OrderSummary, QUEUE_HEADERS,
            QueueRow,
        },
    },
};

/// Stores orders in comma-delimited files.
#[derive(Debug, Clone)]
pub struct CsvStore {
    orders: PathBuf,
    queue: PathBuf,
    stack: PathBuf,
}

impl CsvStore {
    /// Create a store writing to the given files.
    pub fn new(orders: impl Into<PathBuf>, queue: impl Into<PathBuf>, stack: impl Into<PathBuf>) -> Self {
        Self {
            orders: orders.into(),
            queue: queue.into(),
            stack: stack.into(),
        }
    }

    /// Create a store using the files named in the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.orders_path(), config.queue_path(), config.stack_path())
    }

    /// Path of the canonical order list.
    pub fn orders_path(&self) -> &Path {
        &self.orders
    }
}

impl Store for CsvStore {
    fn load_orders(&self) -> Result<Vec<OrderRecord>, StoreError> {
        let path = &self.orders;

        if !path.exists() {
            info!(path = %path.display(), "no order list yet, starting empty");
            return Ok(Vec::new());
        }

        let read_error = |source| StoreError::Read {
            path: path.clone(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(read_error)?;

        let mut orders = Vec::new();
        let mut record = StringRecord::new();

        while reader.read_record(&mut record).map_err(read_error)? {
            if record.iter().all(str::is_empty) {
                continue;
            }

            let line = record.position().map_or(0, csv::Position::line);
            let row: OrderRow = record.deserialize(None).map_err(read_error)?;

            orders.push(row.into_record(line)?);
        }

        debug!(path = %path.display(), orders = orders.len(), "loaded order list");

        Ok(orders)
    }

    fn save_orders(&mut self, orders: &[OrderRecord]) -> Result<(), StoreError> {
        let mut sorted: Vec<&OrderRecord> = orders.iter().collect();

        sorted.sort_by_key(|order| order.id);

        write_rows(&self.orders, &ORDER_HEADERS, sorted.into_iter().map(OrderRow::from))
    }

    fn save_queue_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError> {
        write_rows(&self.queue, &QUEUE_HEADERS, entries.iter().map(QueueRow::from))
    }

    fn save_ledger_snapshot(&mut self, entries: &[OrderSummary]) -> Result<(), StoreError> {
        write_rows(&self.stack, &LEDGER_HEADERS, entries.iter().map(LedgerRow::from))
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<(), StoreError> {
    let write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .from_path(path)
        .map_err(write_error)?;

    writer.write_record(headers).map_err(write_error)?;

    let mut count = 0_usize;

    for row in rows {
        writer.serialize(row).map_err(write_error)?;
        count += 1;
    }

    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), rows = count, "wrote file");

    Ok(())
}
