//! Product Aggregate

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::services::offer_evaluator::{Negotiable, PriceBounds};
use crate::domain::value_objects::{DiscountPercent, Price};
use crate::{MarketError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Product {
    pub(crate) id: Uuid,
    pub(crate) shop_id: Uuid,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) price: Price,
    pub(crate) min_price: Option<f64>,
    pub(crate) max_discount: DiscountPercent,
    pub(crate) allow_further_rounds: bool,
    pub(crate) stock: u32,
    pub(crate) created_at: DateTime<Utc>,
}

impl Product {
    pub fn create(shop_id: Uuid, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: Uuid::now_v7(), shop_id, name: name.into(), description: None,
            price, min_price: None, max_discount: DiscountPercent::default(),
            allow_further_rounds: false, stock: 0, created_at: Utc::now(),
        }
    }

    /// Opens the product to haggling down to `min_price`, capped at `max_discount`.
    pub fn with_negotiation(mut self, min_price: f64, max_discount: DiscountPercent) -> Result<Self> {
        if !min_price.is_finite() || min_price < 0.0 {
            return Err(MarketError::InvalidArgument(format!("invalid minimum price {min_price}")));
        }
        self.min_price = Some(min_price);
        self.max_discount = max_discount;
        Ok(self)
    }

    pub fn with_further_rounds(mut self, allow: bool) -> Self { self.allow_further_rounds = allow; self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = Some(description.into()); self }
    pub fn with_stock(mut self, stock: u32) -> Self { self.stock = stock; self }

    pub fn id(&self) -> Uuid { self.id }
    pub fn shop_id(&self) -> Uuid { self.shop_id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn price(&self) -> Price { self.price }
    pub fn min_price(&self) -> Option<f64> { self.min_price }
    pub fn max_discount(&self) -> DiscountPercent { self.max_discount }
    pub fn allows_further_rounds(&self) -> bool { self.allow_further_rounds }
    pub fn stock(&self) -> u32 { self.stock }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn is_negotiable(&self) -> bool {
        matches!(self.min_price, Some(min) if min < self.price.value())
    }

    pub fn update_stock(&mut self, delta: i64) -> Result<()> {
        let next = i64::from(self.stock) + delta;
        if next < 0 {
            return Err(MarketError::InvalidOperation("Insufficient stock".into()));
        }
        self.stock = u32::try_from(next)
            .map_err(|_| MarketError::InvalidArgument(format!("stock {next} out of range")))?;
        Ok(())
    }
}

impl Negotiable for Product {
    fn price_bounds(&self) -> Result<PriceBounds> {
        if !self.is_negotiable() {
            return Err(MarketError::InvalidOperation(
                "This product does not support price negotiation".into(),
            ));
        }
        PriceBounds::new(self.price.value(), self.min_price, self.max_discount)
    }
}
