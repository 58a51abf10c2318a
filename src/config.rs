//! Configuration
//!
//! Settings are read from an optional YAML file. Every field has a default, so an empty file
//! (or no file at all) yields a working configuration rooted at the current directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::SignedDuration;
use serde::Deserialize;
use thiserror::Error;

use crate::pricing::{Amount, PricingError, parse_amount};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,

        /// Underlying IO error
        source: std::io::Error,
    },

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Delivery fee is not a non-negative amount
    #[error("Invalid delivery fee {value:?}: {source}")]
    InvalidDeliveryFee {
        /// Configured value
        value: String,

        /// Underlying parse error
        source: PricingError,
    },

    /// Expiry cutoff is negative
    #[error("Expiry cutoff must not be negative, got {0} minutes")]
    NegativeCutoff(i64),
}

/// Names of the files inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileNames {
    /// Canonical order list
    pub orders: String,

    /// Restaurant queue snapshot
    pub queue: String,

    /// Refund ledger snapshot
    pub stack: String,

    /// Restaurants
    pub restaurants: String,

    /// Food items
    pub food_items: String,

    /// Special offers
    pub offers: String,

    /// Customers
    pub customers: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            orders: "orders.csv".to_string(),
            queue: "queue.csv".to_string(),
            stack: "stack.csv".to_string(),
            restaurants: "restaurants.csv".to_string(),
            food_items: "fooditems.csv".to_string(),
            offers: "specialoffers.csv".to_string(),
            customers: "customers.csv".to_string(),
        }
    }
}

/// Courier configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the catalog and order files
    pub data_dir: PathBuf,

    /// File names inside `data_dir`
    pub files: FileNames,

    /// Flat fee added to every order, e.g. `"5.00"`
    pub delivery_fee: String,

    /// Pending orders due sooner than this are expired by a bulk pass
    pub expiry_cutoff_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            files: FileNames::default(),
            delivery_fee: "5.00".to_string(),
            expiry_cutoff_minutes: 60,
        }
    }
}

impl Config {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load a configuration file, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or holds an invalid
    /// delivery fee or cutoff.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;

                Self::from_yaml(&contents)?
            }
            None => Self::default(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or names an unknown field.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_norway::from_str(yaml)?)
    }

    /// Check the values that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery fee or cutoff is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.delivery_fee()?;

        if self.expiry_cutoff_minutes < 0 {
            return Err(ConfigError::NegativeCutoff(self.expiry_cutoff_minutes));
        }

        Ok(())
    }

    /// The delivery fee as an amount.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDeliveryFee`] if the fee does not parse or is negative.
    pub fn delivery_fee(&self) -> Result<Amount, ConfigError> {
        let invalid = |source| ConfigError::InvalidDeliveryFee {
            value: self.delivery_fee.clone(),
            source,
        };

        let fee = parse_amount(&self.delivery_fee).map_err(invalid)?;

        if fee.to_minor_units() < 0 {
            return Err(invalid(PricingError::InvalidAmount(self.delivery_fee.clone())));
        }

        Ok(fee)
    }

    /// How close to delivery a pending order may get before a bulk pass expires it.
    pub fn expiry_cutoff(&self) -> SignedDuration {
        SignedDuration::from_mins(self.expiry_cutoff_minutes.max(0))
    }

    /// Canonical order list.
    pub fn orders_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.orders)
    }

    /// Restaurant queue snapshot.
    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.queue)
    }

    /// Refund ledger snapshot.
    pub fn stack_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.stack)
    }

    /// Restaurant list.
    pub fn restaurants_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.restaurants)
    }

    /// Food item list.
    pub fn food_items_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.food_items)
    }

    /// Special offer list.
    pub fn offers_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.offers)
    }

    /// Customer list.
    pub fn customers_path(&self) -> PathBuf {
        self.data_dir.join(&self.files.customers)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::pricing::amount;

    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() -> TestResult {
        let config = Config::from_yaml("")?;

        assert_eq!(config, Config::default());
        assert_eq!(config.delivery_fee()?, amount(500));
        assert_eq!(config.expiry_cutoff(), SignedDuration::from_mins(60));
        assert_eq!(config.orders_path(), Path::new("./orders.csv"));

        Ok(())
    }

    #[test]
    fn partial_yaml_overrides_only_given_fields() -> TestResult {
        let yaml = r"
data_dir: /var/lib/courier
delivery_fee: '3.50'
files:
  orders: history.csv
";

        let config = Config::from_yaml(yaml)?;

        assert_eq!(config.delivery_fee()?, amount(350));
        assert_eq!(config.expiry_cutoff_minutes, 60);
        assert_eq!(config.orders_path(), Path::new("/var/lib/courier/history.csv"));
        assert_eq!(config.customers_path(), Path::new("/var/lib/courier/customers.csv"));

        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_yaml("delivery_fees: '1.00'"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn invalid_fee_and_cutoff_fail_validation() {
        let mut config = Config {
            delivery_fee: "-1.00".to_string(),
            ..Config::default()
        };

        assert!(matches!(config.validate(), Err(ConfigError::InvalidDeliveryFee { .. })));

        config.delivery_fee = "5.00".to_string();
        config.expiry_cutoff_minutes = -5;

        assert!(matches!(config.validate(), Err(ConfigError::NegativeCutoff(-5))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            Config::load(Some(Path::new("no/such/courier.yaml"))),
            Err(ConfigError::Io { .. })
        ));
    }
}
