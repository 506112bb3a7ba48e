//! Value Objects for negotiation and delivery pricing

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("price must be a finite positive number, got {0}")]
    InvalidPrice(f64),
    #[error("discount percent must be between 0 and 100, got {0}")]
    InvalidDiscount(f64),
    #[error("latitude {0} out of range")]
    InvalidLatitude(f64),
    #[error("longitude {0} out of range")]
    InvalidLongitude(f64),
}

/// A strictly positive, finite monetary amount.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValueError::InvalidPrice(value));
        }
        Ok(Self(value))
    }
    pub fn value(&self) -> f64 { self.0 }
}

impl TryFrom<f64> for Price {
    type Error = ValueError;
    fn try_from(value: f64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Price> for f64 {
    fn from(price: Price) -> Self { price.0 }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Maximum discount a seller grants, as a percentage of list price.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DiscountPercent(f64);

impl DiscountPercent {
    pub const DEFAULT: DiscountPercent = DiscountPercent(20.0);

    pub fn new(value: f64) -> Result<Self, ValueError> {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValueError::InvalidDiscount(value));
        }
        Ok(Self(value))
    }
    pub fn percent(&self) -> f64 { self.0 }
    pub fn fraction(&self) -> f64 { self.0 / 100.0 }
}

impl Default for DiscountPercent { fn default() -> Self { Self::DEFAULT } }

impl TryFrom<f64> for DiscountPercent {
    type Error = ValueError;
    fn try_from(value: f64) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<DiscountPercent> for f64 {
    fn from(d: DiscountPercent) -> Self { d.0 }
}

/// WGS84 coordinate in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValueError> {
        if !(-90.0..=90.0).contains(&lat) { return Err(ValueError::InvalidLatitude(lat)); }
        if !(-180.0..=180.0).contains(&lng) { return Err(ValueError::InvalidLongitude(lng)); }
        Ok(Self { lat, lng })
    }
    pub fn lat(&self) -> f64 { self.lat }
    pub fn lng(&self) -> f64 { self.lng }
}
