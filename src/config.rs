//! Service configuration read from the environment (and `.env` via dotenvy).

use std::str::FromStr;
use thiserror::Error;

use crate::domain::services::{DeliveryPricing, OfferStrategy};
use crate::domain::value_objects::DiscountPercent;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub strategy: OfferStrategy,
    pub delivery: DeliveryPricing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            database_max_connections: 10,
            nats_url: None,
            strategy: OfferStrategy::default(),
            delivery: DeliveryPricing::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let strategy = OfferStrategy {
            eagerness: unit_interval("NEGOTIATION_EAGERNESS", parse(&lookup, "NEGOTIATION_EAGERNESS", defaults.strategy.eagerness)?)?,
            flexibility: unit_interval("NEGOTIATION_FLEXIBILITY", parse(&lookup, "NEGOTIATION_FLEXIBILITY", defaults.strategy.flexibility)?)?,
            accept_threshold: unit_interval(
                "NEGOTIATION_ACCEPT_THRESHOLD",
                parse(&lookup, "NEGOTIATION_ACCEPT_THRESHOLD", defaults.strategy.accept_threshold)?,
            )?,
            max_rounds: parse(&lookup, "NEGOTIATION_MAX_ROUNDS", defaults.strategy.max_rounds)?,
            convergence_gap: defaults.strategy.convergence_gap,
        };
        if strategy.max_rounds == 0 {
            return Err(ConfigError::Invalid { key: "NEGOTIATION_MAX_ROUNDS", value: "0".into() });
        }

        let floor_fee: f64 = parse(&lookup, "DELIVERY_FLOOR_FEE", defaults.delivery.floor_fee)?;
        if !floor_fee.is_finite() || floor_fee < 0.0 {
            return Err(ConfigError::Invalid { key: "DELIVERY_FLOOR_FEE", value: floor_fee.to_string() });
        }
        let max_discount: f64 =
            parse(&lookup, "DELIVERY_MAX_DISCOUNT_PERCENT", defaults.delivery.max_discount.percent())?;
        let max_discount = DiscountPercent::new(max_discount).map_err(|_| ConfigError::Invalid {
            key: "DELIVERY_MAX_DISCOUNT_PERCENT",
            value: max_discount.to_string(),
        })?;

        Ok(Self {
            port: parse(&lookup, "PORT", defaults.port)?,
            database_url: lookup("DATABASE_URL"),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            nats_url: lookup("NATS_URL"),
            strategy,
            delivery: DeliveryPricing { floor_fee, max_discount },
        })
    }
}

fn parse<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

fn unit_interval(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid { key, value: value.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8083);
        assert!(c.database_url.is_none());
        assert_eq!(c.strategy, OfferStrategy::default());
        assert_eq!(c.delivery, DeliveryPricing::default());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/market"),
            ("NEGOTIATION_EAGERNESS", "0.5"),
            ("NEGOTIATION_MAX_ROUNDS", "3"),
            ("DELIVERY_MAX_DISCOUNT_PERCENT", "10"),
            ("NATS_URL", " "),
        ])
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/market"));
        assert_eq!(c.strategy.eagerness, 0.5);
        assert_eq!(c.strategy.max_rounds, 3);
        assert_eq!(c.delivery.max_discount.percent(), 10.0);
        assert!(c.nats_url.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("NEGOTIATION_FLEXIBILITY", "1.5")]).is_err());
        assert!(config(&[("NEGOTIATION_MAX_ROUNDS", "0")]).is_err());
        assert!(config(&[("DELIVERY_MAX_DISCOUNT_PERCENT", "120")]).is_err());
        assert!(config(&[("DELIVERY_FLOOR_FEE", "-2")]).is_err());
    }
}
