//! Catalog Loader
//!
//! Reads the comma-delimited catalog files. Every file starts with a header row which is
//! skipped; columns are matched by position.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    catalog::{Catalog, SpecialOffer},
    config::Config,
    pricing::{PricingError, discount_rate, parse_amount},
};

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file could not be opened or a row could not be read
    #[error("failed to read {path}: {source}")]
    Csv {
        /// File being read
        path: PathBuf,

        /// Underlying reader error
        source: csv::Error,
    },

    /// Invalid price on a food item row
    #[error("invalid price for {item}: {source}")]
    InvalidPrice {
        /// Item name
        item: String,

        /// Underlying parse error
        source: PricingError,
    },

    /// Invalid discount on a special offer row
    #[error("invalid discount for offer {code}: {reason}")]
    InvalidDiscount {
        /// Offer code
        code: String,

        /// What was wrong with it
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
struct RestaurantRow {
    id: String,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct FoodItemRow {
    restaurant_id: String,
    name: String,
    description: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct OfferRow {
    code: String,
    description: String,
    discount: Option<String>,
    restaurant_id: String,
}

#[derive(Debug, Deserialize)]
struct CustomerRow {
    name: String,
    email: String,
}

/// Builds a [`Catalog`] from delimited files.
#[derive(Debug, Default)]
pub struct CatalogLoader {
    catalog: Catalog,
}

impl CatalogLoader {
    /// Create a loader with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every catalog file named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be read or holds an invalid price or discount.
    pub fn from_config(config: &Config) -> Result<Catalog, CatalogError> {
        let mut loader = Self::new();

        loader
            .load_restaurants(&config.restaurants_path())?
            .load_food_items(&config.food_items_path())?
            .load_offers(&config.offers_path())?
            .load_customers(&config.customers_path())?;

        let catalog = loader.finish();

        info!(
            restaurants = catalog.restaurants().count(),
            food_items = catalog.food_item_count(),
            customers = catalog.customer_count(),
            "loaded catalog"
        );

        Ok(catalog)
    }

    /// Load restaurants (`id, name, email`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load_restaurants(&mut self, path: &Path) -> Result<&mut Self, CatalogError> {
        for row in read_rows::<RestaurantRow>(path)? {
            if self.catalog.add_restaurant(&row.id, &row.name, &row.email).is_none() {
                warn!(restaurant = %row.id, "skipping duplicate restaurant");
            }
        }

        Ok(self)
    }

    /// Load food items (`restaurant id, name, description, price`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a price is invalid.
    pub fn load_food_items(&mut self, path: &Path) -> Result<&mut Self, CatalogError> {
        for row in read_rows::<FoodItemRow>(path)? {
            let price = parse_amount(&row.price).map_err(|source| CatalogError::InvalidPrice {
                item: row.name.clone(),
                source,
            })?;

            if price.to_minor_units() < 0 {
                return Err(CatalogError::InvalidPrice {
                    item: row.name,
                    source: PricingError::InvalidAmount(row.price),
                });
            }

            let Some(restaurant) = self.catalog.restaurant_key(&row.restaurant_id) else {
                warn!(restaurant = %row.restaurant_id, item = %row.name, "skipping item for unknown restaurant");
                continue;
            };

            if self
                .catalog
                .add_food_item(restaurant, &row.name, &row.description, price)
                .is_none()
            {
                warn!(restaurant = %row.restaurant_id, item = %row.name, "skipping duplicate item");
            }
        }

        Ok(self)
    }

    /// Load special offers (`code, description, discount percent, restaurant id`).
    ///
    /// An empty discount column is a 0% offer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a discount is outside 0-100.
    pub fn load_offers(&mut self, path: &Path) -> Result<&mut Self, CatalogError> {
        for row in read_rows::<OfferRow>(path)? {
            let discount = parse_discount(&row.code, row.discount.as_deref())?;

            let Some(restaurant) = self.catalog.restaurant_key(&row.restaurant_id) else {
                warn!(restaurant = %row.restaurant_id, offer = %row.code, "skipping offer for unknown restaurant");
                continue;
            };

            let offer = SpecialOffer {
                code: row.code.clone(),
                description: row.description,
                discount,
            };

            if !self.catalog.add_offer(restaurant, offer) {
                warn!(restaurant = %row.restaurant_id, offer = %row.code, "skipping duplicate offer");
            }
        }

        Ok(self)
    }

    /// Load customers (`name, email`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load_customers(&mut self, path: &Path) -> Result<&mut Self, CatalogError> {
        for row in read_rows::<CustomerRow>(path)? {
            if self.catalog.add_customer(&row.name, &row.email).is_none() {
                warn!(email = %row.email, "skipping duplicate customer");
            }
        }

        Ok(self)
    }

    /// Hand over the loaded catalog.
    pub fn finish(self) -> Catalog {
        self.catalog
    }
}

fn parse_discount(code: &str, value: Option<&str>) -> Result<Decimal, CatalogError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Decimal::ZERO);
    };

    let points = value
        .trim_end_matches('%')
        .parse::<Decimal>()
        .map_err(|err| CatalogError::InvalidDiscount {
            code: code.to_string(),
            reason: err.to_string(),
        })?;

    discount_rate(points).map_err(|err| CatalogError::InvalidDiscount {
        code: code.to_string(),
        reason: err.to_string(),
    })?;

    Ok(points)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CatalogError> {
    let csv_error = |source| CatalogError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut rows = Vec::new();
    let mut record = StringRecord::new();

    while reader.read_record(&mut record).map_err(csv_error)? {
        if record.iter().all(str::is_empty) {
            continue;
        }

        rows.push(record.deserialize(None).map_err(csv_error)?);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use testresult::TestResult;

    use crate::pricing::amount;

    use super::*;

    fn write(dir: &TempDir, name: &str, contents: &str) -> TestResult<PathBuf> {
        let path = dir.path().join(name);

        fs::write(&path, contents)?;

        Ok(path)
    }

    #[test]
    fn loads_the_fixture_catalog() -> TestResult {
        let catalog = CatalogLoader::from_config(&Config::with_data_dir("fixtures"))?;

        let key = catalog.restaurant_key("r001").ok_or("R001")?;
        let restaurant = catalog.restaurant(key).ok_or("R001")?;

        assert_eq!(restaurant.name, "Burger Barn");
        assert_eq!(restaurant.menu.len(), 3);
        assert!(restaurant.offer("save10").is_some());
        assert!(catalog.customer_key("AMY@EXAMPLE.COM").is_some());

        Ok(())
    }

    #[test]
    fn items_for_unknown_restaurants_and_duplicates_are_skipped() -> TestResult {
        let dir = TempDir::new()?;

        let restaurants = write(&dir, "restaurants.csv", "RestaurantId,Name,Email\nR1,One,one@test\n")?;
        let items = write(
            &dir,
            "fooditems.csv",
            "RestaurantId,ItemName,ItemDesc,ItemPrice\nR1,Soup,Hot,4.50\nR9,Ghost,Gone,1.00\nr1,SOUP,Again,5.00\n",
        )?;

        let mut loader = CatalogLoader::new();
        loader.load_restaurants(&restaurants)?.load_food_items(&items)?;
        let catalog = loader.finish();

        let key = catalog.restaurant_key("R1").ok_or("R1")?;
        let menu = &catalog.restaurant(key).ok_or("R1")?.menu;

        assert_eq!(menu.len(), 1);

        let soup = menu.find("soup").and_then(|key| catalog.food_item(key)).ok_or("soup")?;

        assert_eq!(soup.price, amount(450));
        assert_eq!(catalog.food_item_count(), 1);

        Ok(())
    }

    #[test]
    fn invalid_price_is_an_error() -> TestResult {
        let dir = TempDir::new()?;

        let restaurants = write(&dir, "restaurants.csv", "RestaurantId,Name,Email\nR1,One,one@test\n")?;
        let items = write(&dir, "fooditems.csv", "RestaurantId,ItemName,ItemDesc,ItemPrice\nR1,Soup,Hot,cheap\n")?;

        let mut loader = CatalogLoader::new();
        loader.load_restaurants(&restaurants)?;

        assert!(matches!(
            loader.load_food_items(&items),
            Err(CatalogError::InvalidPrice { item, .. }) if item == "Soup"
        ));

        Ok(())
    }

    #[test]
    fn empty_discount_is_zero_and_out_of_range_is_an_error() -> TestResult {
        assert_eq!(parse_discount("FREE", Some(""))?, Decimal::ZERO);
        assert_eq!(parse_discount("FREE", None)?, Decimal::ZERO);
        assert_eq!(parse_discount("PCT", Some("15%"))?, Decimal::from(15));

        assert!(matches!(
            parse_discount("HUGE", Some("150")),
            Err(CatalogError::InvalidDiscount { code, .. }) if code == "HUGE"
        ));

        Ok(())
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let mut loader = CatalogLoader::new();
        let result = loader.load_customers(Path::new("does/not/exist.csv"));

        assert!(matches!(result, Err(CatalogError::Csv { path, .. }) if path.ends_with("exist.csv")));
    }
}
