//! Delivery fee pricing

use serde::{Deserialize, Serialize};

use crate::domain::services::offer_evaluator::{Negotiable, PriceBounds};
use crate::domain::value_objects::{DiscountPercent, GeoPoint};
use crate::Result;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const MINIMUM_FEE: f64 = 5.00;
pub const DISPATCH_FEE: f64 = 3.00;
pub const PER_KM_FEE: f64 = 0.75;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let (lat1, lat2) = (from.lat().to_radians(), to.lat().to_radians());
    let dlat = lat2 - lat1;
    let dlng = (to.lng() - from.lng()).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn base_fee(distance_km: f64) -> f64 {
    MINIMUM_FEE.max(DISPATCH_FEE + distance_km * PER_KM_FEE)
}

/// How far delivery fees may be negotiated down.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPricing {
    pub floor_fee: f64,
    pub max_discount: DiscountPercent,
}

impl Default for DeliveryPricing {
    fn default() -> Self {
        Self {
            floor_fee: DISPATCH_FEE,
            max_discount: DiscountPercent::new(30.0).unwrap_or_default(),
        }
    }
}

/// Delivery fee for one shop-to-customer trip.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub distance_km: f64,
    pub base_fee: f64,
    #[serde(skip)]
    pricing: DeliveryPricing,
}

impl DeliveryQuote {
    pub fn between(shop: GeoPoint, drop_off: GeoPoint, pricing: DeliveryPricing) -> Self {
        let distance_km = haversine_km(shop, drop_off);
        Self { distance_km, base_fee: base_fee(distance_km), pricing }
    }
}

impl Negotiable for DeliveryQuote {
    fn price_bounds(&self) -> Result<PriceBounds> {
        PriceBounds::new(self.base_fee, Some(self.pricing.floor_fee), self.pricing.max_discount)
    }
}
