//! Order Aggregate
//!
//! Only the delivery side of an order lives here: where it ships from and to,
//! and the fee agreed for the trip.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::services::delivery::{DeliveryPricing, DeliveryQuote};
use crate::domain::value_objects::{GeoPoint, Price};
use crate::{MarketError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) customer_id: Uuid,
    pub(crate) shop_location: GeoPoint,
    pub(crate) delivery_location: GeoPoint,
    pub(crate) subtotal: f64,
    pub(crate) delivery_fee: Option<f64>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Order {
    pub fn create(customer_id: Uuid, shop_location: GeoPoint, delivery_location: GeoPoint, subtotal: f64) -> Result<Self> {
        if !subtotal.is_finite() || subtotal < 0.0 {
            return Err(MarketError::InvalidArgument(format!("invalid subtotal {subtotal}")));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), customer_id, shop_location, delivery_location, subtotal,
            delivery_fee: None, created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn shop_location(&self) -> GeoPoint { self.shop_location }
    pub fn delivery_location(&self) -> GeoPoint { self.delivery_location }
    pub fn subtotal(&self) -> f64 { self.subtotal }
    pub fn delivery_fee(&self) -> Option<f64> { self.delivery_fee }
    pub fn total(&self) -> f64 { self.subtotal + self.delivery_fee.unwrap_or(0.0) }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn quote_delivery(&self, pricing: DeliveryPricing) -> DeliveryQuote {
        DeliveryQuote::between(self.shop_location, self.delivery_location, pricing)
    }

    pub fn ensure_owned_by(&self, customer_id: Uuid) -> Result<()> {
        if self.customer_id != customer_id { return Err(MarketError::AccessDenied); }
        Ok(())
    }

    pub fn set_delivery_fee(&mut self, fee: f64) -> Result<()> {
        self.delivery_fee = Some(Price::new(fee)?.value());
        self.updated_at = Utc::now();
        Ok(())
    }
}
