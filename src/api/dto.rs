//! Request and response bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Negotiation, Order, Product};
use crate::domain::services::SessionState;
use crate::domain::value_objects::GeoPoint;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub shop_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.01))]
    pub price: f64,
    #[validate(range(min = 0.0))]
    pub min_price: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_discount_percentage: Option<f64>,
    #[serde(default)]
    pub allow_further_rounds: bool,
    pub stock: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    #[validate(range(min = -90.0, max = 90.0))]
    pub shop_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub shop_lng: f64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub delivery_lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub delivery_lng: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub subtotal: f64,
}

/// Offer amounts are checked by the evaluator so its message reaches the client.
#[derive(Debug, Deserialize)]
pub struct PriceOfferRequest {
    pub customer_id: Uuid,
    pub offered_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryOfferRequest {
    pub customer_id: Uuid,
    pub offered_fee: f64,
}

#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    pub customer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub list_price: f64,
    pub min_price: Option<f64>,
    pub max_discount_percentage: Option<f64>,
    pub offered_price: f64,
    #[serde(flatten)]
    pub session: SessionState,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: u32,
    pub is_negotiable: bool,
    pub min_price: Option<f64>,
    pub max_discount: Option<f64>,
    pub allow_further_rounds: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        let negotiable = p.is_negotiable();
        Self {
            id: p.id(),
            shop_id: p.shop_id(),
            name: p.name().to_string(),
            description: p.description().map(str::to_string),
            price: p.price().value(),
            stock: p.stock(),
            is_negotiable: negotiable,
            min_price: p.min_price().filter(|_| negotiable),
            max_discount: negotiable.then(|| p.max_discount().percent()),
            allow_further_rounds: p.allows_further_rounds(),
            created_at: p.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub shop_location: GeoPoint,
    pub delivery_location: GeoPoint,
    pub subtotal: f64,
    pub delivery_fee: Option<f64>,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id(),
            customer_id: o.customer_id(),
            shop_location: o.shop_location(),
            delivery_location: o.delivery_location(),
            subtotal: o.subtotal(),
            delivery_fee: o.delivery_fee(),
            total: o.total(),
            created_at: o.created_at(),
        }
    }
}

pub fn price_offer_body(n: &Negotiation) -> Value {
    json!({
        "status": "success",
        "decision": n.last_decision().map(|d| d.as_str()),
        "message": n.last_message(),
        "counter_price": n.counter_price(),
        "final_price": n.final_price(),
        "continue_negotiation": n.continue_negotiation(),
        "negotiation": {
            "id": n.id(),
            "product_id": n.subject().id(),
            "status": n.status().as_str(),
            "initial_price": n.initial_price(),
            "offered_price": n.offered_price(),
            "counter_price": n.counter_price(),
            "final_price": n.final_price(),
            "rounds": n.rounds(),
        }
    })
}

pub fn delivery_offer_body(n: &Negotiation) -> Value {
    json!({
        "status": "success",
        "decision": n.last_decision().map(|d| d.as_str()),
        "message": n.last_message(),
        "counter_fee": n.counter_price(),
        "final_fee": n.final_price(),
        "continue_negotiation": n.continue_negotiation(),
        "negotiation": {
            "id": n.id(),
            "order_id": n.subject().id(),
            "status": n.status().as_str(),
            "initial_fee": n.initial_price(),
            "offered_fee": n.offered_price(),
            "counter_fee": n.counter_price(),
            "final_fee": n.final_price(),
            "rounds": n.rounds(),
        }
    })
}
