//! Financial Report

use std::io;

use rustc_hash::FxHashMap;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::{
    catalog::identity,
    orders::status::OrderStatus,
    pricing::{Amount, amount, format_amount},
    session::Session,
    store::Store,
};

/// Errors that can occur while building or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Money arithmetic failed
    #[error(transparent)]
    Money(#[from] rusty_money::MoneyError),

    /// Writing the report failed
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
}

/// Delivered and refunded totals of one restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct RestaurantTotals {
    /// Restaurant identifier
    pub restaurant_id: String,

    /// Restaurant name, or the id when the restaurant is not in the catalog
    pub name: String,

    /// Number of delivered orders
    pub delivered_count: usize,

    /// Sum of delivered order totals less the delivery fee
    pub delivered_less_fee: Amount,

    /// Number of rejected and cancelled orders
    pub refund_count: usize,

    /// Sum of rejected and cancelled order totals
    pub refunds: Amount,
}

impl RestaurantTotals {
    fn new(restaurant_id: &str, name: &str) -> Self {
        Self {
            restaurant_id: restaurant_id.to_string(),
            name: name.to_string(),
            delivered_count: 0,
            delivered_less_fee: amount(0),
            refund_count: 0,
            refunds: amount(0),
        }
    }
}

/// Per-restaurant and system-wide takings.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialReport {
    /// One entry per restaurant, in catalog order
    pub restaurants: Vec<RestaurantTotals>,

    /// Sum of delivered-less-fee over all restaurants
    pub delivered_less_fee: Amount,

    /// Sum of refunds over all restaurants
    pub refunds: Amount,

    /// Delivered orders across the system
    pub delivered_count: usize,

    /// Platform earnings, one delivery fee per delivered order
    pub earnings: Amount,
}

impl FinancialReport {
    /// Write the report as a table followed by the system totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        let mut builder = Builder::default();

        builder.push_record(["Restaurant", "Delivered", "Delivered less fee", "Refunded", "Refunds"]);

        for totals in &self.restaurants {
            builder.push_record([
                format!("{} ({})", totals.name, totals.restaurant_id),
                totals.delivered_count.to_string(),
                format_amount(&totals.delivered_less_fee),
                totals.refund_count.to_string(),
                format_amount(&totals.refunds),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Columns::new(1..5), Alignment::right());

        writeln!(out, "{table}")?;
        writeln!(out, "Total delivered less fee: {}", format_amount(&self.delivered_less_fee))?;
        writeln!(out, "Total refunds: {}", format_amount(&self.refunds))?;
        writeln!(
            out,
            "System earnings: {} ({} delivered orders)",
            format_amount(&self.earnings),
            self.delivered_count
        )?;

        Ok(())
    }
}

impl<S: Store> Session<S> {
    /// Aggregate delivered and refunded totals per restaurant and for the whole system.
    ///
    /// Orders of restaurants missing from the catalog get their own entries after the catalog's.
    ///
    /// # Errors
    ///
    /// Returns an error if the money arithmetic fails.
    pub fn financial_report(&self) -> Result<FinancialReport, ReportError> {
        let fee = self.settings.delivery_fee;

        let mut restaurants: Vec<RestaurantTotals> = self
            .catalog
            .restaurants()
            .map(|(_, restaurant)| RestaurantTotals::new(&restaurant.id, &restaurant.name))
            .collect();

        let mut index: FxHashMap<String, usize> = restaurants
            .iter()
            .enumerate()
            .map(|(position, totals)| (identity(&totals.restaurant_id), position))
            .collect();

        for order in self.orders() {
            let lookup = identity(order.restaurant_id());

            let position = match index.get(&lookup) {
                Some(position) => *position,
                None => {
                    restaurants.push(RestaurantTotals::new(order.restaurant_id(), order.restaurant_id()));
                    index.insert(lookup, restaurants.len() - 1);
                    restaurants.len() - 1
                }
            };

            let Some(totals) = restaurants.get_mut(position) else {
                continue;
            };

            match order.status() {
                OrderStatus::Delivered => {
                    totals.delivered_count += 1;
                    totals.delivered_less_fee = totals.delivered_less_fee.add(order.total().sub(fee)?)?;
                }
                status if status.is_refunded() => {
                    totals.refund_count += 1;
                    totals.refunds = totals.refunds.add(order.total())?;
                }
                _ => {}
            }
        }

        let mut delivered_less_fee = amount(0);
        let mut refunds = amount(0);
        let mut delivered_count = 0_usize;

        for totals in &restaurants {
            delivered_less_fee = delivered_less_fee.add(totals.delivered_less_fee)?;
            refunds = refunds.add(totals.refunds)?;
            delivered_count += totals.delivered_count;
        }

        let earnings = amount(
            fee.to_minor_units()
                .saturating_mul(i64::try_from(delivered_count).unwrap_or(i64::MAX)),
        );

        Ok(FinancialReport {
            restaurants,
            delivered_less_fee,
            refunds,
            delivered_count,
            earnings,
        })
    }
}
