use std::env;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::money::DEFAULT_MINOR_UNIT_DECIMALS;
use crate::validation::DEFAULT_BALANCE_TOLERANCE_MINOR;

/// Bookkeeping configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub currency: String,
    pub minor_unit_decimals: u32,
    pub balance_tolerance_minor: i64,
    pub log_filter: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got: {value}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: "SEK".to_string(),
            minor_unit_decimals: DEFAULT_MINOR_UNIT_DECIMALS,
            balance_tolerance_minor: DEFAULT_BALANCE_TOLERANCE_MINOR,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let currency = env::var("BOOKKEEPING_CURRENCY").unwrap_or_else(|_| "SEK".to_string());
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::InvalidValue {
                name: "BOOKKEEPING_CURRENCY",
                expected: "a 3-letter uppercase ISO 4217 code",
                value: currency,
            });
        }

        let decimals_raw = env::var("BOOKKEEPING_MINOR_UNIT_DECIMALS")
            .unwrap_or_else(|_| DEFAULT_MINOR_UNIT_DECIMALS.to_string());
        let minor_unit_decimals: u32 = decimals_raw
            .parse()
            .ok()
            .filter(|d| *d <= 8)
            .ok_or(ConfigError::InvalidValue {
                name: "BOOKKEEPING_MINOR_UNIT_DECIMALS",
                expected: "an integer between 0 and 8",
                value: decimals_raw.clone(),
            })?;

        let tolerance_raw = env::var("BOOKKEEPING_BALANCE_TOLERANCE_MINOR")
            .unwrap_or_else(|_| DEFAULT_BALANCE_TOLERANCE_MINOR.to_string());
        let balance_tolerance_minor: i64 = tolerance_raw
            .parse()
            .ok()
            .filter(|t| *t >= 1)
            .ok_or(ConfigError::InvalidValue {
                name: "BOOKKEEPING_BALANCE_TOLERANCE_MINOR",
                expected: "a positive integer",
                value: tolerance_raw.clone(),
            })?;

        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Config {
            currency,
            minor_unit_decimals,
            balance_tolerance_minor,
            log_filter,
        })
    }
}

/// Install the global tracing subscriber using the configured filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        env::remove_var("BOOKKEEPING_CURRENCY");
        env::remove_var("BOOKKEEPING_MINOR_UNIT_DECIMALS");
        env::remove_var("BOOKKEEPING_BALANCE_TOLERANCE_MINOR");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.currency, "SEK");
        assert_eq!(config.minor_unit_decimals, 2);
        assert_eq!(config.balance_tolerance_minor, 1);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        env::set_var("BOOKKEEPING_CURRENCY", "JPY");
        env::set_var("BOOKKEEPING_MINOR_UNIT_DECIMALS", "0");
        let config = Config::from_env().unwrap();
        assert_eq!(config.currency, "JPY");
        assert_eq!(config.minor_unit_decimals, 0);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_currency() {
        clear_env();
        env::set_var("BOOKKEEPING_CURRENCY", "sek");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("BOOKKEEPING_CURRENCY"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_tolerance() {
        clear_env();
        env::set_var("BOOKKEEPING_BALANCE_TOLERANCE_MINOR", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue {
                name: "BOOKKEEPING_BALANCE_TOLERANCE_MINOR",
                ..
            })
        ));
        clear_env();
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = Config {
            log_filter: "not a [valid filter".to_string(),
            ..Config::default()
        };
        init_tracing(&config);
        init_tracing(&Config::default());
        tracing::info!("tracing initialized twice");
    }
}
