//! Orders

use std::{fmt, num::ParseIntError, str::FromStr};

use jiff::civil::DateTime;
use rust_decimal::Decimal;
use slotmap::new_key_type;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::FoodItemKey,
    orders::status::{Action, GuardViolation, OrderStatus, Transition, transition},
    pricing::{Amount, PricingError, compute_total, discount_rate},
};

pub mod status;
pub mod timestamps;

new_key_type! {
    /// Order Key, the slot of an order in the session's order arena
    pub struct OrderKey;
}

/// Order identifier, assigned in ascending order starting at [`OrderId::FIRST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(u32);

impl OrderId {
    /// Identifier given to the first order of an empty order list.
    pub const FIRST: OrderId = OrderId(1001);

    /// Wrap a raw identifier.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw identifier.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The identifier after this one, or `None` at `u32::MAX`.
    pub fn next(self) -> Option<OrderId> {
        self.0.checked_add(1).map(OrderId)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(OrderId)
    }
}

/// Input that failed validation before reaching any order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was blank.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// A quantity of zero was requested.
    #[error("quantity for {0} must be greater than zero")]
    NonPositiveQuantity(String),

    /// The order has no item lines.
    #[error("an order needs at least one item")]
    NoItems,

    /// Expected `dd/mm/yyyy hh:mm`.
    #[error("invalid date/time {0:?}, expected dd/mm/yyyy hh:mm")]
    InvalidDateTime(String),

    /// Expected `hh:mm`.
    #[error("invalid time {0:?}, expected hh:mm")]
    InvalidTime(String),

    /// Expected `CC`, `PP` or `CD`.
    #[error("unknown payment method {0:?}, expected CC, PP or CD")]
    UnknownPaymentMethod(String),
}

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    /// Credit card
    CreditCard,

    /// `PayPal`
    PayPal,

    /// Cash on delivery
    CashOnDelivery,
}

impl PaymentMethod {
    /// Two-letter code.
    pub const fn code(self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CC",
            PaymentMethod::PayPal => "PP",
            PaymentMethod::CashOnDelivery => "CD",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CC" => Ok(PaymentMethod::CreditCard),
            "PP" => Ok(PaymentMethod::PayPal),
            "CD" => Ok(PaymentMethod::CashOnDelivery),
            _ => Err(ValidationError::UnknownPaymentMethod(s.to_string())),
        }
    }
}

/// The special offer an order was placed with.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOffer {
    /// Offer code
    pub code: String,

    /// Discount in percentage points
    pub discount: Decimal,
}

/// A food item and how many of it were ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLine {
    item: FoodItemKey,
    unit_price: Amount,
    quantity: u32,
}

impl OrderLine {
    /// Create a line for `quantity` units of `item` at `unit_price`.
    pub fn new(item: FoodItemKey, unit_price: Amount, quantity: u32) -> Self {
        Self {
            item,
            unit_price,
            quantity,
        }
    }

    /// The ordered food item.
    pub fn item(&self) -> FoodItemKey {
        self.item
    }

    /// Price of one unit.
    pub fn unit_price(&self) -> &Amount {
        &self.unit_price
    }

    /// Units ordered.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// An item requested or stored by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    /// Food item name
    pub name: String,

    /// Units ordered
    pub quantity: u32,
}

impl ItemEntry {
    /// Create an entry for `quantity` units of `name`.
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// Item lines of an order.
pub type OrderLines = SmallVec<[OrderLine; 4]>;

/// Add `line` to `lines`, summing the quantity into an existing line for the same item.
pub fn merge_line(lines: &mut OrderLines, line: OrderLine) {
    match lines.iter_mut().find(|existing| existing.item == line.item) {
        Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
        None => lines.push(line),
    }
}

/// A delivery order.
#[derive(Debug, Clone)]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) customer_email: String,
    pub(crate) restaurant_id: String,
    pub(crate) delivery_at: DateTime,
    pub(crate) delivery_address: String,
    pub(crate) created_at: DateTime,
    pub(crate) status: OrderStatus,
    pub(crate) lines: OrderLines,
    pub(crate) special_request: Option<String>,
    pub(crate) offer: Option<AppliedOffer>,
    pub(crate) payment: Option<PaymentMethod>,
    pub(crate) total: Amount,
}

impl Order {
    /// Order identifier
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Email of the ordering customer
    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    /// Identifier of the restaurant preparing the order
    pub fn restaurant_id(&self) -> &str {
        &self.restaurant_id
    }

    /// When the order should arrive
    pub fn delivery_at(&self) -> DateTime {
        self.delivery_at
    }

    /// Where the order should arrive
    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    /// When the order was placed
    pub fn created_at(&self) -> DateTime {
        self.created_at
    }

    /// Current lifecycle state
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Item lines, in the order they were first added
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Optional note for the restaurant
    pub fn special_request(&self) -> Option<&str> {
        self.special_request.as_deref()
    }

    /// Offer the order was placed with
    pub fn offer(&self) -> Option<&AppliedOffer> {
        self.offer.as_ref()
    }

    /// Payment method recorded at checkout
    pub fn payment(&self) -> Option<PaymentMethod> {
        self.payment
    }

    /// Total charged, including the delivery fee
    pub fn total(&self) -> Amount {
        self.total
    }

    /// Apply a lifecycle action, leaving the order untouched when the guard fails.
    ///
    /// # Errors
    ///
    /// Returns a [`GuardViolation`] if the order is not in the state `action` requires.
    pub fn apply(&mut self, action: Action) -> Result<Transition, GuardViolation> {
        let transition = transition(self.status, action)?;

        self.status = transition.to;

        Ok(transition)
    }

    /// Total the order would cost with `lines` and its current offer.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the total cannot be computed.
    pub fn price_lines(&self, lines: &[OrderLine], delivery_fee: Amount) -> Result<Amount, PricingError> {
        let rate = self
            .offer
            .as_ref()
            .map(|offer| discount_rate(offer.discount))
            .transpose()?;

        compute_total(lines, rate, delivery_fee)
    }

    /// Replace the item lines and recompute the total.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if the total cannot be computed; the order is unchanged.
    pub fn replace_lines(&mut self, lines: OrderLines, delivery_fee: Amount) -> Result<Amount, PricingError> {
        let total = self.price_lines(&lines, delivery_fee)?;

        self.lines = lines;
        self.total = total;

        Ok(total)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.id,
            self.customer_email,
            self.restaurant_id,
            timestamps::format_date_time(self.delivery_at),
            self.total,
            self.status
        )
    }
}
