use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{newly_accepted, MarketStore, OfferFn, Settlement};
use crate::domain::aggregates::{Cart, Negotiation, Order, Product, Subject};
use crate::{MarketError, Result};

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    carts: HashMap<Uuid, Cart>,
    negotiations: HashMap<Uuid, Negotiation>,
}

impl Tables {
    fn settle(&mut self, negotiation: &Negotiation) -> Result<()> {
        match Settlement::for_negotiation(negotiation) {
            Some(Settlement::CartLine { customer_id, product_id, negotiated_price }) => {
                let product = self.products.get_mut(&product_id).ok_or(MarketError::ProductNotFound)?;
                let cart = self.carts.entry(customer_id).or_insert_with(|| Cart::for_customer(customer_id));
                if !cart.items().iter().any(|i| i.product_id == product_id) {
                    product.update_stock(-1)?;
                }
                cart.add_negotiated(product_id, product.price().value(), negotiated_price);
            }
            Some(Settlement::DeliveryFee { order_id, fee }) => {
                self.orders
                    .get_mut(&order_id)
                    .ok_or(MarketError::OrderNotFound)?
                    .set_delivery_fee(fee)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Stores a copy without pending events; the caller keeps the events.
    fn put_negotiation(&mut self, negotiation: &Negotiation) {
        let mut stored = negotiation.clone();
        stored.events.clear();
        self.negotiations.insert(stored.id, stored);
    }
}

/// In-process store. One lock guards all tables, which serializes every
/// offer and acceptance.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn save_product(&self, product: &Product) -> Result<()> {
        self.tables.lock().await.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        self.tables.lock().await.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn cart(&self, customer_id: Uuid) -> Result<Cart> {
        let tables = self.tables.lock().await;
        Ok(tables.carts.get(&customer_id).cloned().unwrap_or_else(|| Cart::for_customer(customer_id)))
    }

    async fn negotiation(&self, id: Uuid) -> Result<Option<Negotiation>> {
        Ok(self.tables.lock().await.negotiations.get(&id).cloned())
    }

    async fn record_offer(&self, subject: Subject, customer_id: Uuid, apply: OfferFn) -> Result<Negotiation> {
        let mut tables = self.tables.lock().await;
        let active = tables
            .negotiations
            .values()
            .filter(|n| n.subject() == subject && n.customer_id() == customer_id && n.status().is_active())
            .max_by_key(|n| n.created_at())
            .cloned();
        let before = active.as_ref().map(|n| n.status());

        let negotiation = apply(active)?;
        if newly_accepted(before, &negotiation) {
            tables.settle(&negotiation)?;
        }
        tables.put_negotiation(&negotiation);
        Ok(negotiation)
    }

    async fn accept_counter(&self, negotiation_id: Uuid, customer_id: Uuid) -> Result<Negotiation> {
        let mut tables = self.tables.lock().await;
        let mut negotiation = tables
            .negotiations
            .get(&negotiation_id)
            .cloned()
            .ok_or(MarketError::NegotiationNotFound)?;

        negotiation.accept_counter(customer_id)?;
        tables.settle(&negotiation)?;
        tables.put_negotiation(&negotiation);
        Ok(negotiation)
    }
}
