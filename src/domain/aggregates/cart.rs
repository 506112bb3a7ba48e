//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cart {
    customer_id: Uuid,
    items: Vec<CartItem>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: f64,
    pub negotiated_price: Option<f64>,
}

impl CartItem {
    pub fn effective_price(&self) -> f64 { self.negotiated_price.unwrap_or(self.unit_price) }
    pub fn line_total(&self) -> f64 { self.effective_price() * f64::from(self.quantity) }
}

impl Cart {
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self { customer_id, items: vec![], updated_at: Utc::now() }
    }

    pub(crate) fn restore(customer_id: Uuid, items: Vec<CartItem>) -> Self {
        Self { customer_id, items, updated_at: Utc::now() }
    }

    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn items(&self) -> &[CartItem] { &self.items }

    pub fn subtotal(&self) -> f64 { self.items.iter().map(CartItem::line_total).sum() }

    /// Puts a product in the cart at a negotiated price; an existing line keeps
    /// its quantity and takes the new price.
    pub fn add_negotiated(&mut self, product_id: Uuid, unit_price: f64, negotiated_price: f64) -> &CartItem {
        let index = match self.items.iter().position(|i| i.product_id == product_id) {
            Some(index) => {
                self.items[index].negotiated_price = Some(negotiated_price);
                index
            }
            None => {
                self.items.push(CartItem { product_id, quantity: 1, unit_price, negotiated_price: Some(negotiated_price) });
                self.items.len() - 1
            }
        };
        self.touch();
        &self.items[index]
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
