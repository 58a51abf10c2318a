//! Session
//!
//! A session owns the catalog, every order, the restaurant queues, the refund ledger and the
//! store. Orders live in one arena; queues and the ledger refer to them by key, so a status
//! change is seen through every path.

use jiff::{
    SignedDuration,
    civil::{DateTime, Time},
};
use rustc_hash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    catalog::{Catalog, CustomerKey, Restaurant, RestaurantKey, identity},
    config::{Config, ConfigError},
    ledger::RefundLedger,
    orders::{
        AppliedOffer, ItemEntry, Order, OrderId, OrderKey, OrderLine, OrderLines, PaymentMethod, ValidationError,
        merge_line,
        status::{Action, GuardViolation, OrderStatus, Transition},
        timestamps::to_minute,
    },
    pricing::{Amount, PricingError, amount},
    queue::RestaurantQueue,
    store::{
        Store, StoreError,
        records::{OrderRecord, OrderSummary},
    },
};

/// Errors raised by order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No restaurant with this id
    #[error("restaurant not found: {0}")]
    RestaurantNotFound(String),

    /// No customer with this email
    #[error("customer not found: {0}")]
    CustomerNotFound(String),

    /// No order with this id
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The restaurant's menu has no item with this name
    #[error("{restaurant} has no food item named {item:?}")]
    FoodItemNotFound {
        /// Restaurant id
        restaurant: String,

        /// Requested item name
        item: String,
    },

    /// The order exists but was placed by someone else
    #[error("order {order} does not belong to {customer}")]
    NotOwner {
        /// Order id
        order: OrderId,

        /// Customer asking
        customer: String,
    },

    /// Only pending orders can be modified
    #[error("order {order} is {status}, only pending orders can be modified")]
    NotPending {
        /// Order id
        order: OrderId,

        /// Current state
        status: OrderStatus,
    },

    /// The action is reserved for the customer or the bulk pass
    #[error("{0} is not a staff action")]
    NotStaffAction(Action),

    /// Every order id has been used
    #[error("no order ids left")]
    IdsExhausted,

    /// Illegal lifecycle transition
    #[error(transparent)]
    Guard(#[from] GuardViolation),

    /// Invalid input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Total could not be computed
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// The change was applied in memory but could not be saved
    #[error("change applied but not saved: {0}")]
    Persistence(#[from] StoreError),
}

impl OrderError {
    /// Whether the error is an unknown restaurant, customer, order or food item.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            OrderError::RestaurantNotFound(_)
                | OrderError::CustomerNotFound(_)
                | OrderError::OrderNotFound(_)
                | OrderError::FoodItemNotFound { .. }
                | OrderError::NotOwner { .. }
        )
    }

    /// Whether the error left all state untouched.
    pub fn is_non_mutating(&self) -> bool {
        !matches!(self, OrderError::Persistence(_))
    }
}

/// Values shared by every order of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Flat fee added to every order total
    pub delivery_fee: Amount,

    /// Pending orders due sooner than this are expired by a bulk pass
    pub expiry_cutoff: SignedDuration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delivery_fee: amount(500),
            expiry_cutoff: SignedDuration::from_mins(60),
        }
    }
}

impl Settings {
    /// Read the settings from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured delivery fee is invalid.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            delivery_fee: config.delivery_fee()?,
            expiry_cutoff: config.expiry_cutoff(),
        })
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    /// Ordering customer's email
    pub customer_email: String,

    /// Restaurant id
    pub restaurant_id: String,

    /// When the order should arrive
    pub delivery_at: DateTime,

    /// Where the order should arrive
    pub delivery_address: String,

    /// Requested items by name; repeated names are merged
    pub items: Vec<ItemEntry>,

    /// Optional note for the restaurant
    pub special_request: Option<String>,

    /// Optional offer code; unknown codes give no discount
    pub offer_code: Option<String>,

    /// Optional payment method
    pub payment: Option<PaymentMethod>,
}

/// Old and new total of an item change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    /// Total before the change
    pub previous: Amount,

    /// Total after the change
    pub updated: Amount,
}

impl Quote {
    /// Whether the change costs more than the current total.
    pub fn is_increase(&self) -> bool {
        self.updated.to_minor_units() > self.previous.to_minor_units()
    }

    /// What the customer still owes, zero when the total did not go up.
    ///
    /// # Errors
    ///
    /// Returns an error if the amounts cannot be subtracted.
    pub fn difference(&self) -> Result<Amount, PricingError> {
        if !self.is_increase() {
            return Ok(amount(0));
        }

        Ok(self.updated.sub(self.previous)?)
    }
}

/// Changes to a pending order, applied together or not at all.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    /// Replacement item list
    pub items: Option<Vec<ItemEntry>>,

    /// New delivery address
    pub address: Option<String>,

    /// New delivery time on the same day
    pub delivery_time: Option<Time>,
}

/// Result of applying an action to one order of a restaurant's front window.
#[derive(Debug)]
pub struct Processed {
    /// Order the action was applied to
    pub order: OrderId,

    /// The transition, or why it was refused
    pub outcome: Result<Transition, OrderError>,
}

/// Order lifecycle session.
#[derive(Debug)]
pub struct Session<S> {
    pub(crate) catalog: Catalog,
    pub(crate) settings: Settings,
    pub(crate) store: S,
    pub(crate) orders: SlotMap<OrderKey, Order>,
    pub(crate) order_ids: FxHashMap<OrderId, OrderKey>,
    pub(crate) queues: SecondaryMap<RestaurantKey, RestaurantQueue>,
    pub(crate) ledger: RefundLedger,
    pub(crate) by_customer: SecondaryMap<CustomerKey, SmallVec<[OrderKey; 4]>>,
}

impl<S: Store> Session<S> {
    /// Load the stored orders and replay them into the queues and the ledger.
    ///
    /// Active orders are queued at their restaurant and refunded orders pushed onto the ledger,
    /// both in id order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if the order list cannot be loaded or holds the
    /// same id twice.
    #[instrument(skip_all)]
    pub fn open(catalog: Catalog, settings: Settings, store: S) -> Result<Self, OrderError> {
        let mut records = store.load_orders()?;

        records.sort_by_key(|record| record.id);

        let mut session = Self {
            catalog,
            settings,
            store,
            orders: SlotMap::with_key(),
            order_ids: FxHashMap::default(),
            queues: SecondaryMap::new(),
            ledger: RefundLedger::new(),
            by_customer: SecondaryMap::new(),
        };

        for record in records {
            session.replay(record)?;
        }

        info!(
            orders = session.orders.len(),
            queued = session.queued_total(),
            refunds = session.ledger.len(),
            "opened session"
        );

        Ok(session)
    }

    fn replay(&mut self, record: OrderRecord) -> Result<(), StoreError> {
        if self.order_ids.contains_key(&record.id) {
            return Err(StoreError::DuplicateOrder(record.id));
        }

        let restaurant = self.catalog.restaurant_key(&record.restaurant_id);
        let mut lines = OrderLines::new();

        if let Some(menu) = restaurant.and_then(|key| self.catalog.restaurant(key)).map(|r| &r.menu) {
            for entry in &record.items {
                let found = menu
                    .find(&entry.name)
                    .and_then(|key| self.catalog.food_item(key).map(|item| (key, item.price)));

                let Some((item, price)) = found else {
                    warn!(order = %record.id, item = %entry.name, "skipping unknown food item");
                    continue;
                };

                merge_line(&mut lines, OrderLine::new(item, price, entry.quantity));
            }
        }

        let order = Order {
            id: record.id,
            customer_email: record.customer_email,
            restaurant_id: record.restaurant_id,
            delivery_at: record.delivery_at,
            delivery_address: record.delivery_address,
            created_at: record.created_at,
            status: record.status,
            lines,
            special_request: None,
            offer: None,
            payment: None,
            total: record.total,
        };

        let status = order.status;
        let id = order.id;
        let key = self.insert(order);

        match restaurant {
            Some(restaurant) if !status.is_terminal() => self.enqueue(restaurant, key),
            None if !status.is_terminal() => {
                warn!(order = %id, "active order has an unknown restaurant, not queued");
            }
            _ => {}
        }

        if status.is_refunded() {
            self.ledger.push(key);
        }

        Ok(())
    }

    fn insert(&mut self, order: Order) -> OrderKey {
        let id = order.id;
        let customer = self.catalog.customer_key(&order.customer_email);
        let key = self.orders.insert(order);

        self.order_ids.insert(id, key);

        if let Some(customer) = customer {
            match self.by_customer.get_mut(customer) {
                Some(orders) => orders.push(key),
                None => {
                    self.by_customer.insert(customer, SmallVec::from_elem(key, 1));
                }
            }
        }

        key
    }

    fn enqueue(&mut self, restaurant: RestaurantKey, key: OrderKey) {
        match self.queues.get_mut(restaurant) {
            Some(queue) => {
                queue.enqueue(key);
            }
            None => {
                let mut queue = RestaurantQueue::new();
                queue.enqueue(key);
                self.queues.insert(restaurant, queue);
            }
        }
    }

    /// Identifier the next created order will get.
    pub fn next_id(&self) -> Option<OrderId> {
        match self.order_ids.keys().max() {
            Some(max) => max.next(),
            None => Some(OrderId::FIRST),
        }
    }

    /// Place a new order, queue it at its restaurant and save the order list.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank address, no items or a zero quantity, and a
    /// lookup failure for an unknown customer, restaurant or food item. Nothing is changed in
    /// those cases. [`OrderError::Persistence`] means the order was created but not saved.
    #[instrument(skip(self, draft), fields(customer = %draft.customer_email, restaurant = %draft.restaurant_id))]
    pub fn create_order(&mut self, draft: OrderDraft, created_at: DateTime) -> Result<OrderId, OrderError> {
        let address = draft.delivery_address.trim();

        if address.is_empty() {
            return Err(ValidationError::EmptyField("delivery address").into());
        }

        let customer = self
            .catalog
            .customer_key(&draft.customer_email)
            .and_then(|key| self.catalog.customer(key))
            .ok_or_else(|| OrderError::CustomerNotFound(draft.customer_email.clone()))?;

        let (restaurant_key, restaurant) = self
            .catalog
            .restaurant_key(&draft.restaurant_id)
            .and_then(|key| Some((key, self.catalog.restaurant(key)?)))
            .ok_or_else(|| OrderError::RestaurantNotFound(draft.restaurant_id.clone()))?;

        let lines = resolve_lines(&self.catalog, restaurant, &draft.items)?;

        let offer = match draft.offer_code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => match restaurant.offer(code) {
                Some(offer) => Some(AppliedOffer {
                    code: offer.code.clone(),
                    discount: offer.discount,
                }),
                None => {
                    warn!(offer = code, restaurant = %restaurant.id, "unknown offer code, no discount applied");
                    None
                }
            },
            None => None,
        };

        let id = self.next_id().ok_or(OrderError::IdsExhausted)?;

        let mut order = Order {
            id,
            customer_email: customer.email.clone(),
            restaurant_id: restaurant.id.clone(),
            delivery_at: to_minute(draft.delivery_at),
            delivery_address: address.to_string(),
            created_at: to_minute(created_at),
            status: OrderStatus::Pending,
            lines: OrderLines::new(),
            special_request: draft
                .special_request
                .map(|request| request.trim().to_string())
                .filter(|request| !request.is_empty()),
            offer,
            payment: draft.payment,
            total: amount(0),
        };

        let total = order.replace_lines(lines, self.settings.delivery_fee)?;

        let key = self.insert(order);
        self.enqueue(restaurant_key, key);

        info!(order = %id, total = %total, "created order");

        self.persist()?;

        Ok(id)
    }

    /// Apply a staff action (confirm, reject or deliver) to one order and save the order list.
    ///
    /// Cancelling goes through [`Session::cancel`] and the bulk actions through
    /// [`Session::bulk_process`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotStaffAction`], [`OrderError::OrderNotFound`] or a
    /// [`GuardViolation`], leaving the order unchanged, or [`OrderError::Persistence`] if the
    /// change could not be saved.
    #[instrument(skip(self))]
    pub fn apply(&mut self, id: OrderId, action: Action) -> Result<Transition, OrderError> {
        if !action.is_staff() {
            return Err(OrderError::NotStaffAction(action));
        }

        self.commit(id, action)
    }

    fn commit(&mut self, id: OrderId, action: Action) -> Result<Transition, OrderError> {
        let transition = self.transition(id, action)?;

        self.persist()?;

        Ok(transition)
    }

    /// Apply an action to up to `n` orders at the front of a restaurant's queue.
    ///
    /// Each order succeeds or fails on its own; the order list is saved once afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotStaffAction`] for a customer or bulk action,
    /// [`OrderError::RestaurantNotFound`] for an unknown restaurant, or
    /// [`OrderError::Persistence`] if the changes could not be saved.
    #[instrument(skip(self))]
    pub fn process_front(&mut self, restaurant_id: &str, action: Action, n: usize) -> Result<Vec<Processed>, OrderError> {
        if !action.is_staff() {
            return Err(OrderError::NotStaffAction(action));
        }

        let ids: Vec<OrderId> = self
            .front_window(restaurant_id, n)?
            .into_iter()
            .map(Order::id)
            .collect();

        let processed: Vec<Processed> = ids
            .into_iter()
            .map(|order| Processed {
                order,
                outcome: self.transition(order, action),
            })
            .collect();

        if processed.iter().any(|p| p.outcome.is_ok()) {
            self.persist()?;
        }

        Ok(processed)
    }

    /// Cancel a customer's pending order.
    ///
    /// # Errors
    ///
    /// Returns a lookup failure if the order is unknown or not the customer's, a
    /// [`GuardViolation`] if it is not pending, or [`OrderError::Persistence`].
    #[instrument(skip(self))]
    pub fn cancel(&mut self, customer_email: &str, id: OrderId) -> Result<Transition, OrderError> {
        self.owned_order(customer_email, id)?;

        self.commit(id, Action::Cancel)
    }

    fn transition(&mut self, id: OrderId, action: Action) -> Result<Transition, OrderError> {
        let key = *self.order_ids.get(&id).ok_or(OrderError::OrderNotFound(id))?;
        let order = self.orders.get_mut(key).ok_or(OrderError::OrderNotFound(id))?;

        let transition = order.apply(action).inspect_err(|err| {
            debug!(order = %id, error = %err, "transition refused");
        })?;

        if transition.leaves_queue()
            && let Some(queue) = self
                .catalog
                .restaurant_key(&order.restaurant_id)
                .and_then(|restaurant| self.queues.get_mut(restaurant))
        {
            queue.remove(key);
        }

        if transition.enters_ledger() {
            self.ledger.push(key);
        }

        info!(order = %id, from = %transition.from, to = %transition.to, "order transitioned");

        Ok(transition)
    }

    fn owned_order(&self, customer_email: &str, id: OrderId) -> Result<OrderKey, OrderError> {
        if self.catalog.customer_key(customer_email).is_none() {
            return Err(OrderError::CustomerNotFound(customer_email.to_string()));
        }

        let key = *self.order_ids.get(&id).ok_or(OrderError::OrderNotFound(id))?;
        let order = self.orders.get(key).ok_or(OrderError::OrderNotFound(id))?;

        if identity(&order.customer_email) != identity(customer_email) {
            return Err(OrderError::NotOwner {
                order: id,
                customer: customer_email.to_string(),
            });
        }

        Ok(key)
    }

    fn restaurant_of(&self, order: &Order) -> Result<&Restaurant, OrderError> {
        self.catalog
            .restaurant_key(&order.restaurant_id)
            .and_then(|key| self.catalog.restaurant(key))
            .ok_or_else(|| OrderError::RestaurantNotFound(order.restaurant_id.clone()))
    }

    fn pending_order(&self, customer_email: &str, id: OrderId) -> Result<OrderKey, OrderError> {
        let key = self.owned_order(customer_email, id)?;
        let status = self.orders.get(key).map_or(OrderStatus::Pending, Order::status);

        if status != OrderStatus::Pending {
            return Err(OrderError::NotPending { order: id, status });
        }

        Ok(key)
    }

    /// Price a new item list for a customer's pending order without changing it.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Session::modify_items`], never mutating anything.
    pub fn quote_items(&self, customer_email: &str, id: OrderId, items: &[ItemEntry]) -> Result<Quote, OrderError> {
        let key = self.pending_order(customer_email, id)?;
        let order = self.orders.get(key).ok_or(OrderError::OrderNotFound(id))?;

        let restaurant = self.restaurant_of(order)?;
        let lines = resolve_lines(&self.catalog, restaurant, items)?;
        let updated = order.price_lines(&lines, self.settings.delivery_fee)?;

        Ok(Quote {
            previous: order.total,
            updated,
        })
    }

    /// Replace the items of a customer's pending order, repricing it with its existing offer.
    ///
    /// # Errors
    ///
    /// Returns a lookup failure, validation error or [`OrderError::NotPending`] with nothing
    /// changed, or [`OrderError::Persistence`] if the change could not be saved.
    #[instrument(skip(self, items))]
    pub fn modify_items(&mut self, customer_email: &str, id: OrderId, items: &[ItemEntry]) -> Result<Quote, OrderError> {
        let key = self.pending_order(customer_email, id)?;

        let order = self.orders.get(key).ok_or(OrderError::OrderNotFound(id))?;
        let lines = resolve_lines(&self.catalog, self.restaurant_of(order)?, items)?;
        let fee = self.settings.delivery_fee;
        let order = self.orders.get_mut(key).ok_or(OrderError::OrderNotFound(id))?;

        let previous = order.total;
        let updated = order.replace_lines(lines, fee)?;

        info!(order = %id, previous = %previous, updated = %updated, "modified items");

        self.persist()?;

        Ok(Quote { previous, updated })
    }

    /// Change the delivery address of a customer's pending order.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank address, a lookup failure or
    /// [`OrderError::NotPending`], or [`OrderError::Persistence`].
    #[instrument(skip(self))]
    pub fn modify_address(&mut self, customer_email: &str, id: OrderId, address: &str) -> Result<(), OrderError> {
        let changes = OrderChanges {
            address: Some(address.to_string()),
            ..OrderChanges::default()
        };

        self.modify_order(customer_email, id, changes).map(|_| ())
    }

    /// Change the delivery time of a customer's pending order, keeping its date.
    ///
    /// # Errors
    ///
    /// Returns a lookup failure or [`OrderError::NotPending`], or [`OrderError::Persistence`].
    #[instrument(skip(self))]
    pub fn modify_delivery_time(&mut self, customer_email: &str, id: OrderId, time: Time) -> Result<DateTime, OrderError> {
        let changes = OrderChanges {
            delivery_time: Some(time),
            ..OrderChanges::default()
        };

        self.modify_order(customer_email, id, changes)?;

        self.order(id).map(Order::delivery_at).ok_or(OrderError::OrderNotFound(id))
    }

    /// Apply several changes to a customer's pending order with a single save.
    ///
    /// Every change is validated before any is applied. Returns the price change when the
    /// items were replaced.
    ///
    /// # Errors
    ///
    /// Returns a validation error, a lookup failure or [`OrderError::NotPending`] with nothing
    /// changed, or [`OrderError::Persistence`] if the changes could not be saved.
    #[instrument(skip(self, changes))]
    pub fn modify_order(
        &mut self,
        customer_email: &str,
        id: OrderId,
        changes: OrderChanges,
    ) -> Result<Option<Quote>, OrderError> {
        let address = match changes.address.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::EmptyField("delivery address").into()),
            address => address.map(str::to_string),
        };

        let key = self.pending_order(customer_email, id)?;
        let order = self.orders.get(key).ok_or(OrderError::OrderNotFound(id))?;

        let lines = match changes.items.as_deref() {
            Some(items) => {
                let lines = resolve_lines(&self.catalog, self.restaurant_of(order)?, items)?;
                order.price_lines(&lines, self.settings.delivery_fee)?;
                Some(lines)
            }
            None => None,
        };

        let fee = self.settings.delivery_fee;
        let order = self.orders.get_mut(key).ok_or(OrderError::OrderNotFound(id))?;

        let quote = match lines {
            Some(lines) => {
                let previous = order.total;
                let updated = order.replace_lines(lines, fee)?;

                Some(Quote { previous, updated })
            }
            None => None,
        };

        if let Some(address) = address {
            order.delivery_address = address;
        }

        if let Some(time) = changes.delivery_time {
            order.delivery_at = to_minute(order.delivery_at.date().to_datetime(time));
        }

        info!(order = %id, "modified order");

        self.persist()?;

        Ok(quote)
    }

    /// The catalog the session was opened with.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Session settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up an order by id.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.order_ids.get(&id).and_then(|key| self.orders.get(*key))
    }

    /// Every order, sorted by id.
    pub fn orders(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.values().collect();

        orders.sort_by_key(|order| order.id);

        orders
    }

    /// A restaurant's whole queue, front first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::RestaurantNotFound`] for an unknown restaurant.
    pub fn queued_orders(&self, restaurant_id: &str) -> Result<Vec<&Order>, OrderError> {
        self.front_window(restaurant_id, usize::MAX)
    }

    /// Up to `n` orders at the front of a restaurant's queue.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::RestaurantNotFound`] for an unknown restaurant.
    pub fn front_window(&self, restaurant_id: &str, n: usize) -> Result<Vec<&Order>, OrderError> {
        let restaurant = self
            .catalog
            .restaurant_key(restaurant_id)
            .ok_or_else(|| OrderError::RestaurantNotFound(restaurant_id.to_string()))?;

        Ok(self
            .queues
            .get(restaurant)
            .map(|queue| queue.front_window(n).filter_map(|key| self.orders.get(key)).collect())
            .unwrap_or_default())
    }

    /// Number of orders across every restaurant queue.
    pub fn queued_total(&self) -> usize {
        self.queues.values().map(RestaurantQueue::len).sum()
    }

    /// A customer's orders, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::CustomerNotFound`] for an unknown customer.
    pub fn orders_for_customer(&self, customer_email: &str) -> Result<Vec<&Order>, OrderError> {
        let customer = self
            .catalog
            .customer_key(customer_email)
            .ok_or_else(|| OrderError::CustomerNotFound(customer_email.to_string()))?;

        Ok(self
            .by_customer
            .get(customer)
            .map(|keys| keys.iter().filter_map(|key| self.orders.get(*key)).collect())
            .unwrap_or_default())
    }

    /// Refund ledger entries, latest first.
    pub fn refunds(&self) -> Vec<&Order> {
        self.ledger
            .latest_first()
            .filter_map(|key| self.orders.get(key))
            .collect()
    }

    fn record(&self, order: &Order) -> OrderRecord {
        OrderRecord {
            id: order.id,
            customer_email: order.customer_email.clone(),
            restaurant_id: order.restaurant_id.clone(),
            delivery_at: order.delivery_at,
            delivery_address: order.delivery_address.clone(),
            created_at: order.created_at,
            total: order.total,
            status: order.status,
            items: order
                .lines
                .iter()
                .filter_map(|line| {
                    let item = self.catalog.food_item(line.item())?;

                    Some(ItemEntry::new(item.name.clone(), line.quantity()))
                })
                .collect(),
        }
    }

    /// Rewrite the stored order list from the arena.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot write the list.
    pub(crate) fn persist(&mut self) -> Result<(), StoreError> {
        let records: Vec<OrderRecord> = self.orders().into_iter().map(|order| self.record(order)).collect();

        self.store.save_orders(&records)
    }

    /// Save the order list and both snapshots, handing back the store.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Persistence`] if any file cannot be written.
    #[instrument(skip_all)]
    pub fn close(mut self) -> Result<S, OrderError> {
        self.persist()?;

        let summary = |key: OrderKey| self.orders.get(key).map(|order| OrderSummary::from(&self.record(order)));

        let queue: Vec<OrderSummary> = self
            .catalog
            .restaurants()
            .filter_map(|(restaurant, _)| self.queues.get(restaurant))
            .flat_map(RestaurantQueue::iter)
            .filter_map(summary)
            .collect();

        let ledger: Vec<OrderSummary> = self.ledger.latest_first().filter_map(summary).collect();

        self.store.save_queue_snapshot(&queue)?;
        self.store.save_ledger_snapshot(&ledger)?;

        info!(queued = queue.len(), refunds = ledger.len(), "closed session");

        Ok(self.store)
    }
}

fn resolve_lines(catalog: &Catalog, restaurant: &Restaurant, items: &[ItemEntry]) -> Result<OrderLines, OrderError> {
    if items.is_empty() {
        return Err(ValidationError::NoItems.into());
    }

    let mut lines = OrderLines::new();

    for entry in items {
        if entry.quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity(entry.name.clone()).into());
        }

        let not_found = || OrderError::FoodItemNotFound {
            restaurant: restaurant.id.clone(),
            item: entry.name.clone(),
        };

        let key = restaurant.menu.find(&entry.name).ok_or_else(not_found)?;
        let item = catalog.food_item(key).ok_or_else(not_found)?;

        merge_line(&mut lines, OrderLine::new(key, item.price, entry.quantity));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::{io, path::PathBuf};

    use jiff::civil::date;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        catalog::SpecialOffer,
        store::{MemoryStore, MockStore},
    };

    use super::*;

    fn catalog() -> TestResult<Catalog> {
        let mut catalog = Catalog::new();

        let barn = catalog
            .add_restaurant("R001", "Burger Barn", "hello@barn.test")
            .ok_or("R001")?;
        let noodles = catalog
            .add_restaurant("R002", "Noodle House", "hi@noodles.test")
            .ok_or("R002")?;

        catalog.add_food_item(barn, "Cheeseburger", "Double cheese", amount(400));
        catalog.add_food_item(barn, "Fries", "Salted", amount(300));
        catalog.add_food_item(noodles, "Ramen", "Tonkotsu", amount(950));

        catalog.add_offer(
            barn,
            SpecialOffer {
                code: "SAVE10".to_string(),
                description: "10% off".to_string(),
                discount: Decimal::TEN,
            },
        );

        catalog.add_customer("Amy", "amy@example.com");
        catalog.add_customer("Ben", "ben@example.com");

        Ok(catalog)
    }

    fn session() -> TestResult<Session<MemoryStore>> {
        Ok(Session::open(catalog()?, Settings::default(), MemoryStore::new())?)
    }

    fn now() -> DateTime {
        date(2026, 3, 1).at(12, 0, 0, 0)
    }

    fn draft(offer: Option<&str>) -> OrderDraft {
        OrderDraft {
            customer_email: "Amy@Example.com".to_string(),
            restaurant_id: "r001".to_string(),
            delivery_at: date(2026, 3, 1).at(19, 30, 0, 0),
            delivery_address: " 1 High Street ".to_string(),
            items: vec![
                ItemEntry::new("Cheeseburger", 1),
                ItemEntry::new("fries", 1),
                ItemEntry::new("cheeseburger", 1),
            ],
            special_request: Some("  ".to_string()),
            offer_code: offer.map(str::to_string),
            payment: Some(PaymentMethod::CreditCard),
        }
    }

    #[test]
    fn first_order_gets_1001_and_the_full_price() -> TestResult {
        let mut session = session()?;

        let id = session.create_order(draft(None), now())?;
        let order = session.order(id).ok_or("order")?;

        assert_eq!(id, OrderId::FIRST);
        assert_eq!(order.total(), amount(1600));
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.delivery_address(), "1 High Street");
        assert_eq!(order.customer_email(), "amy@example.com");
        assert_eq!(order.special_request(), None);
        assert_eq!(session.queued_orders("R001")?.len(), 1);
        assert_eq!(session.store().save_count(), 1);

        assert_eq!(session.create_order(draft(None), now())?, OrderId::new(1002));

        Ok(())
    }

    #[test]
    fn offer_discounts_items_but_not_the_fee() -> TestResult {
        let mut session = session()?;

        let discounted = session.create_order(draft(Some("save10")), now())?;
        let unknown = session.create_order(draft(Some("NOPE")), now())?;

        assert_eq!(session.order(discounted).map(Order::total), Some(amount(1490)));
        assert_eq!(session.order(unknown).map(Order::total), Some(amount(1600)));
        assert!(session.order(unknown).and_then(Order::offer).is_none());

        Ok(())
    }

    #[test]
    fn invalid_drafts_change_nothing() -> TestResult {
        let mut session = session()?;

        let mut blank = draft(None);
        blank.delivery_address = "   ".to_string();

        let mut zero = draft(None);
        zero.items = vec![ItemEntry::new("Fries", 0)];

        let mut empty = draft(None);
        empty.items.clear();

        let mut stranger = draft(None);
        stranger.customer_email = "zed@example.com".to_string();

        let mut elsewhere = draft(None);
        elsewhere.restaurant_id = "R999".to_string();

        let mut off_menu = draft(None);
        off_menu.items = vec![ItemEntry::new("Ramen", 1)];

        assert!(matches!(
            session.create_order(blank, now()),
            Err(OrderError::Validation(ValidationError::EmptyField(_)))
        ));
        assert!(matches!(
            session.create_order(zero, now()),
            Err(OrderError::Validation(ValidationError::NonPositiveQuantity(_)))
        ));
        assert!(matches!(
            session.create_order(empty, now()),
            Err(OrderError::Validation(ValidationError::NoItems))
        ));

        for draft in [stranger, elsewhere, off_menu] {
            let err = session.create_order(draft, now()).err().ok_or("expected an error")?;

            assert!(err.is_lookup_failure(), "{err} should be a lookup failure");
        }

        assert!(session.orders().is_empty());
        assert_eq!(session.queued_total(), 0);
        assert_eq!(session.store().save_count(), 0);

        Ok(())
    }

    #[test]
    fn reject_moves_the_order_from_queue_to_ledger() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        let transition = session.apply(id, Action::Reject)?;

        assert_eq!(transition.to, OrderStatus::Rejected);
        assert!(session.queued_orders("R001")?.is_empty());
        assert_eq!(session.refunds().into_iter().map(Order::id).collect::<Vec<_>>(), vec![id]);

        assert!(matches!(session.apply(id, Action::Reject), Err(OrderError::Guard(_))));
        assert_eq!(session.refunds().len(), 1);

        Ok(())
    }

    #[test]
    fn confirm_twice_is_a_guard_violation() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        session.apply(id, Action::Confirm)?;

        let err = session.apply(id, Action::Confirm).err().ok_or("expected an error")?;

        assert!(matches!(err, OrderError::Guard(GuardViolation { status: OrderStatus::Preparing, .. })));
        assert_eq!(session.order(id).map(Order::status), Some(OrderStatus::Preparing));
        assert_eq!(session.queued_orders("R001")?.len(), 1);

        session.apply(id, Action::Deliver)?;

        assert!(session.queued_orders("R001")?.is_empty());
        assert!(session.refunds().is_empty());

        Ok(())
    }

    #[test]
    fn process_front_reports_each_order() -> TestResult {
        let mut session = session()?;

        let first = session.create_order(draft(None), now())?;
        let second = session.create_order(draft(None), now())?;
        let third = session.create_order(draft(None), now())?;

        session.apply(first, Action::Confirm)?;

        let processed = session.process_front("R001", Action::Confirm, 2)?;
        let outcomes: Vec<_> = processed.iter().map(|p| (p.order, p.outcome.is_ok())).collect();

        assert_eq!(outcomes, vec![(first, false), (second, true)]);
        assert_eq!(session.order(third).map(Order::status), Some(OrderStatus::Pending));

        let delivered = session.process_front("R001", Action::Deliver, 3)?;

        assert_eq!(delivered.iter().filter(|p| p.outcome.is_ok()).count(), 2);
        assert_eq!(
            session.queued_orders("R001")?.into_iter().map(Order::id).collect::<Vec<_>>(),
            vec![third]
        );

        assert!(matches!(
            session.process_front("R404", Action::Confirm, 1),
            Err(OrderError::RestaurantNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn customer_and_bulk_actions_are_not_staff_actions() -> TestResult {
        let mut session = session()?;

        let mut next_week = draft(None);
        next_week.delivery_at = date(2026, 3, 8).at(19, 30, 0, 0);

        let id = session.create_order(next_week, now())?;

        for action in [Action::BulkExpire, Action::BulkRetain, Action::Cancel] {
            assert!(
                matches!(session.apply(id, action), Err(OrderError::NotStaffAction(refused)) if refused == action),
                "{action} should be refused"
            );
            assert!(
                matches!(
                    session.process_front("R001", action, 1),
                    Err(OrderError::NotStaffAction(_))
                ),
                "{action} should be refused at the front"
            );
        }

        assert_eq!(session.order(id).map(Order::status), Some(OrderStatus::Pending));
        assert_eq!(session.queued_orders("R001")?.len(), 1);
        assert!(session.refunds().is_empty());
        assert_eq!(session.store().save_count(), 1);

        Ok(())
    }

    #[test]
    fn only_the_owner_can_cancel() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        assert!(matches!(
            session.cancel("ben@example.com", id),
            Err(OrderError::NotOwner { .. })
        ));
        assert!(matches!(
            session.cancel("amy@example.com", OrderId::new(4242)),
            Err(OrderError::OrderNotFound(_))
        ));

        session.cancel("AMY@example.com", id)?;

        assert_eq!(session.order(id).map(Order::status), Some(OrderStatus::Cancelled));
        assert_eq!(session.refunds().len(), 1);
        assert_eq!(session.queued_total(), 0);

        Ok(())
    }

    #[test]
    fn modifying_items_keeps_the_offer_and_requires_pending() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(Some("SAVE10")), now())?;

        let items = [ItemEntry::new("Cheeseburger", 3)];
        let quote = session.quote_items("amy@example.com", id, &items)?;

        assert_eq!(quote.previous, amount(1490));
        assert_eq!(quote.updated, amount(1580));
        assert!(quote.is_increase());
        assert_eq!(quote.difference()?, amount(90));
        assert_eq!(session.order(id).map(Order::total), Some(amount(1490)));

        session.modify_items("amy@example.com", id, &items)?;

        assert_eq!(session.order(id).map(Order::total), Some(amount(1580)));

        session.apply(id, Action::Confirm)?;

        assert!(matches!(
            session.modify_items("amy@example.com", id, &items),
            Err(OrderError::NotPending {
                status: OrderStatus::Preparing,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn delivery_changes_keep_the_date() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        let moved = session.modify_delivery_time("amy@example.com", id, Time::constant(21, 15, 0, 0))?;

        assert_eq!(moved, date(2026, 3, 1).at(21, 15, 0, 0));

        session.modify_address("amy@example.com", id, "2 Low Road")?;

        assert_eq!(session.order(id).map(Order::delivery_address), Some("2 Low Road"));
        assert!(matches!(
            session.modify_address("amy@example.com", id, ""),
            Err(OrderError::Validation(_))
        ));

        Ok(())
    }

    #[test]
    fn combined_changes_apply_together_or_not_at_all() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        let blank_address = OrderChanges {
            items: Some(vec![ItemEntry::new("Cheeseburger", 3)]),
            address: Some("   ".to_string()),
            delivery_time: Some(Time::constant(21, 0, 0, 0)),
        };

        assert!(matches!(
            session.modify_order("amy@example.com", id, blank_address),
            Err(OrderError::Validation(ValidationError::EmptyField(_)))
        ));

        let off_menu = OrderChanges {
            items: Some(vec![ItemEntry::new("Ramen", 1)]),
            address: Some("2 Low Road".to_string()),
            ..OrderChanges::default()
        };

        assert!(matches!(
            session.modify_order("amy@example.com", id, off_menu),
            Err(OrderError::FoodItemNotFound { .. })
        ));

        let order = session.order(id).ok_or("order")?;

        assert_eq!(order.total(), amount(1600));
        assert_eq!(order.delivery_address(), "1 High Street");
        assert_eq!(order.delivery_at(), date(2026, 3, 1).at(19, 30, 0, 0));
        assert_eq!(session.store().save_count(), 1);

        let changes = OrderChanges {
            items: Some(vec![ItemEntry::new("Fries", 2)]),
            address: Some(" 2 Low Road ".to_string()),
            delivery_time: Some(Time::constant(21, 0, 0, 0)),
        };

        let quote = session.modify_order("amy@example.com", id, changes)?.ok_or("quote")?;
        let order = session.order(id).ok_or("order")?;

        assert_eq!(quote.previous, amount(1600));
        assert_eq!(quote.updated, amount(1100));
        assert_eq!(order.delivery_address(), "2 Low Road");
        assert_eq!(order.delivery_at(), date(2026, 3, 1).at(21, 0, 0, 0));
        assert_eq!(session.store().save_count(), 2);

        Ok(())
    }

    #[test]
    fn reopening_replays_queues_and_ledger() -> TestResult {
        let mut session = session()?;

        let pending = session.create_order(draft(None), now())?;
        let rejected = session.create_order(draft(None), now())?;
        let delivered = session.create_order(draft(None), now())?;

        session.apply(rejected, Action::Reject)?;
        session.apply(delivered, Action::Confirm)?;
        session.apply(delivered, Action::Deliver)?;

        let store = session.close()?;

        assert_eq!(store.queue_snapshot().len(), 1);
        assert_eq!(store.ledger_snapshot().len(), 1);

        let reopened = Session::open(catalog()?, Settings::default(), store)?;

        assert_eq!(
            reopened.queued_orders("R001")?.into_iter().map(Order::id).collect::<Vec<_>>(),
            vec![pending]
        );
        assert_eq!(reopened.refunds().into_iter().map(Order::id).collect::<Vec<_>>(), vec![rejected]);
        assert_eq!(reopened.order(delivered).map(Order::total), Some(amount(1600)));
        assert_eq!(reopened.order(pending).map(|o| o.lines().len()), Some(2));
        assert_eq!(reopened.next_id(), Some(OrderId::new(1004)));
        assert_eq!(reopened.orders_for_customer("amy@example.com")?.len(), 3);

        Ok(())
    }

    #[test]
    fn duplicate_stored_ids_fail_to_open() -> TestResult {
        let mut session = session()?;
        let id = session.create_order(draft(None), now())?;

        let mut records = session.close()?.orders().to_vec();
        let copy = records.first().cloned().ok_or("record")?;
        records.push(copy);

        let err = Session::open(catalog()?, Settings::default(), MemoryStore::with_orders(records))
            .err()
            .ok_or("expected an error")?;

        assert!(matches!(err, OrderError::Persistence(StoreError::DuplicateOrder(dup)) if dup == id));

        Ok(())
    }

    #[test]
    fn failed_save_keeps_the_change_in_memory() -> TestResult {
        let mut store = MockStore::new();

        store.expect_load_orders().returning(|| Ok(Vec::new()));
        store.expect_save_orders().returning(|_| {
            Err(StoreError::Io {
                path: PathBuf::from("orders.csv"),
                source: io::Error::other("disk full"),
            })
        });

        let mut session = Session::open(catalog()?, Settings::default(), store)?;

        let err = session.create_order(draft(None), now()).err().ok_or("expected an error")?;

        assert!(matches!(err, OrderError::Persistence(_)));
        assert!(!err.is_non_mutating());
        assert!(session.order(OrderId::FIRST).is_some());
        assert_eq!(session.queued_total(), 1);

        Ok(())
    }
}
