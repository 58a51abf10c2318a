//! Catalog
//!
//! Read-only restaurant, menu, offer and customer records. Records live in slot maps and are
//! looked up through case-insensitive identity indexes.

use std::fmt;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::pricing::Amount;

pub mod loader;

new_key_type! {
    /// Restaurant Key
    pub struct RestaurantKey;

    /// Food Item Key
    pub struct FoodItemKey;

    /// Customer Key
    pub struct CustomerKey;
}

/// Normalise an identity (restaurant id, email, item name, offer code) for lookups.
pub(crate) fn identity(value: &str) -> String {
    value.trim().to_lowercase()
}

/// A dish on a restaurant's menu.
#[derive(Debug, Clone)]
pub struct FoodItem {
    /// Item name, unique per restaurant ignoring case
    pub name: String,

    /// Item description
    pub description: String,

    /// Unit price
    pub price: Amount,

    /// Restaurant that serves the item
    pub restaurant: RestaurantKey,
}

impl fmt::Display for FoodItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.name, self.description, self.price)
    }
}

/// A discount code offered by a restaurant.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialOffer {
    /// Offer code, unique per restaurant ignoring case
    pub code: String,

    /// Offer description
    pub description: String,

    /// Discount in percentage points, between 0 and 100
    pub discount: Decimal,
}

/// The effective menu of a restaurant, aggregating every item loaded for it.
#[derive(Debug, Default, Clone)]
pub struct Menu {
    items: Vec<FoodItemKey>,
    by_name: FxHashMap<String, FoodItemKey>,
}

impl Menu {
    /// Add an item, returning `false` if an item with the same name is already listed.
    pub fn add(&mut self, name: &str, key: FoodItemKey) -> bool {
        let name = identity(name);

        if self.by_name.contains_key(&name) {
            return false;
        }

        self.by_name.insert(name, key);
        self.items.push(key);

        true
    }

    /// Find an item by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<FoodItemKey> {
        self.by_name.get(&identity(name)).copied()
    }

    /// Items in the order they were loaded.
    pub fn items(&self) -> &[FoodItemKey] {
        &self.items
    }

    /// Number of items on the menu.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the menu has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A restaurant taking orders.
#[derive(Debug, Clone)]
pub struct Restaurant {
    /// Restaurant identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Contact email
    pub email: String,

    /// Effective menu
    pub menu: Menu,

    /// Special offers
    pub offers: Vec<SpecialOffer>,
}

impl Restaurant {
    /// Find an offer by code, ignoring case.
    pub fn offer(&self, code: &str) -> Option<&SpecialOffer> {
        let code = identity(code);

        self.offers.iter().find(|offer| identity(&offer.code) == code)
    }
}

impl fmt::Display for Restaurant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A customer placing orders.
#[derive(Debug, Clone)]
pub struct Customer {
    /// Customer name
    pub name: String,

    /// Email, the customer's identity
    pub email: String,
}

/// Loaded catalog.
#[derive(Debug, Default)]
pub struct Catalog {
    restaurants: SlotMap<RestaurantKey, Restaurant>,
    food_items: SlotMap<FoodItemKey, FoodItem>,
    customers: SlotMap<CustomerKey, Customer>,

    restaurant_keys: FxHashMap<String, RestaurantKey>,
    customer_keys: FxHashMap<String, CustomerKey>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a restaurant, or `None` if the id is already taken.
    pub fn add_restaurant(&mut self, id: &str, name: &str, email: &str) -> Option<RestaurantKey> {
        let lookup = identity(id);

        if self.restaurant_keys.contains_key(&lookup) {
            return None;
        }

        let key = self.restaurants.insert(Restaurant {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            menu: Menu::default(),
            offers: Vec::new(),
        });

        self.restaurant_keys.insert(lookup, key);

        Some(key)
    }

    /// Add an item to a restaurant's menu, or `None` if the restaurant is unknown or already
    /// lists an item with that name.
    pub fn add_food_item(
        &mut self,
        restaurant: RestaurantKey,
        name: &str,
        description: &str,
        price: Amount,
    ) -> Option<FoodItemKey> {
        let menu = &self.restaurants.get(restaurant)?.menu;

        if menu.find(name).is_some() {
            return None;
        }

        let key = self.food_items.insert(FoodItem {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            price,
            restaurant,
        });

        self.restaurants.get_mut(restaurant)?.menu.add(name, key);

        Some(key)
    }

    /// Add an offer to a restaurant, returning `false` if the code is taken or the restaurant
    /// is unknown.
    pub fn add_offer(&mut self, restaurant: RestaurantKey, offer: SpecialOffer) -> bool {
        let Some(restaurant) = self.restaurants.get_mut(restaurant) else {
            return false;
        };

        if restaurant.offer(&offer.code).is_some() {
            return false;
        }

        restaurant.offers.push(offer);

        true
    }

    /// Add a customer, or `None` if the email is already registered.
    pub fn add_customer(&mut self, name: &str, email: &str) -> Option<CustomerKey> {
        let lookup = identity(email);

        if self.customer_keys.contains_key(&lookup) {
            return None;
        }

        let key = self.customers.insert(Customer {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        });

        self.customer_keys.insert(lookup, key);

        Some(key)
    }

    /// Find a restaurant key by id, ignoring case.
    pub fn restaurant_key(&self, id: &str) -> Option<RestaurantKey> {
        self.restaurant_keys.get(&identity(id)).copied()
    }

    /// Get a restaurant by key.
    pub fn restaurant(&self, key: RestaurantKey) -> Option<&Restaurant> {
        self.restaurants.get(key)
    }

    /// Iterate over restaurants in load order.
    pub fn restaurants(&self) -> impl Iterator<Item = (RestaurantKey, &Restaurant)> {
        self.restaurants.iter()
    }

    /// Get a food item by key.
    pub fn food_item(&self, key: FoodItemKey) -> Option<&FoodItem> {
        self.food_items.get(key)
    }

    /// Total number of food items across all menus.
    pub fn food_item_count(&self) -> usize {
        self.food_items.len()
    }

    /// Find a customer key by email, ignoring case.
    pub fn customer_key(&self, email: &str) -> Option<CustomerKey> {
        self.customer_keys.get(&identity(email)).copied()
    }

    /// Get a customer by key.
    pub fn customer(&self, key: CustomerKey) -> Option<&Customer> {
        self.customers.get(key)
    }

    /// Number of registered customers.
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }
}
