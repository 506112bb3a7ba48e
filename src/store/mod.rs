//! Persistence for products, orders, carts and negotiation records.
//!
//! Offers against the same (subject, customer) pair must not interleave: every
//! implementation runs the read-evaluate-write of [`MarketStore::record_offer`]
//! under an exclusive lock for that pair.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Negotiation, NegotiationStatus, Order, Product, Subject};
use crate::Result;

/// Turns the customer's active negotiation (if any) into its next state.
pub type OfferFn = Box<dyn FnOnce(Option<Negotiation>) -> Result<Negotiation> + Send>;

#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn save_product(&self, product: &Product) -> Result<()>;
    async fn product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn save_order(&self, order: &Order) -> Result<()>;
    async fn order(&self, id: Uuid) -> Result<Option<Order>>;

    async fn cart(&self, customer_id: Uuid) -> Result<Cart>;

    async fn negotiation(&self, id: Uuid) -> Result<Option<Negotiation>>;

    /// Applies `apply` to the customer's active negotiation on `subject` and
    /// persists the result. A record that ends up accepted is settled in the
    /// same unit of work.
    async fn record_offer(&self, subject: Subject, customer_id: Uuid, apply: OfferFn) -> Result<Negotiation>;

    /// Customer accepts the last counter-offer; settles it atomically.
    async fn accept_counter(&self, negotiation_id: Uuid, customer_id: Uuid) -> Result<Negotiation>;
}

/// What an accepted negotiation changes outside its own record.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Settlement {
    /// Put the product in the customer's cart at the agreed price.
    CartLine { customer_id: Uuid, product_id: Uuid, negotiated_price: f64 },
    /// Fix the order's delivery fee.
    DeliveryFee { order_id: Uuid, fee: f64 },
}

impl Settlement {
    pub(crate) fn for_negotiation(negotiation: &Negotiation) -> Option<Self> {
        if negotiation.status() != NegotiationStatus::Accepted {
            return None;
        }
        let price = negotiation.final_price()?;
        Some(match negotiation.subject() {
            Subject::Product(product_id) => Settlement::CartLine {
                customer_id: negotiation.customer_id(),
                product_id,
                negotiated_price: price,
            },
            Subject::Delivery(order_id) => Settlement::DeliveryFee { order_id, fee: price },
        })
    }
}

/// Whether a record went from open to accepted during this unit of work.
pub(crate) fn newly_accepted(before: Option<NegotiationStatus>, after: &Negotiation) -> bool {
    after.status() == NegotiationStatus::Accepted && before.map_or(true, |s| s.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::offer_evaluator::{Decision, Evaluation};

    #[test]
    fn test_settlement_follows_subject() {
        let customer = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let mut n = Negotiation::open(Subject::Delivery(order_id), customer, 8.0, 7.5);
        assert!(Settlement::for_negotiation(&n).is_none());

        n.apply(7.5, &Evaluation {
            decision: Decision::Accept,
            counter_price: None,
            final_price: Some(7.5),
            message: String::new(),
            continue_negotiation: false,
        });
        assert!(newly_accepted(Some(NegotiationStatus::Pending), &n));
        assert!(!newly_accepted(Some(NegotiationStatus::Accepted), &n));
        assert_eq!(Settlement::for_negotiation(&n), Some(Settlement::DeliveryFee { order_id, fee: 7.5 }));
    }
}
