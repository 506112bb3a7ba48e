//! HTTP surface: routes, request/response bodies and error mapping.

pub mod dto;
mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::domain::services::{DeliveryPricing, OfferEvaluator, OfferStrategy};
use crate::events::EventPublisher;
use crate::store::MarketStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub evaluator: OfferEvaluator,
    pub delivery: DeliveryPricing,
    pub events: EventPublisher,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketStore>, strategy: OfferStrategy, delivery: DeliveryPricing, events: EventPublisher) -> Self {
        Self { store, evaluator: OfferEvaluator::new(strategy), delivery, events }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/products", post(handlers::create_product))
        .route("/api/v1/products/:id", get(handlers::get_product))
        .route("/api/v1/products/:id/negotiate", post(handlers::negotiate_price))
        .route("/api/v1/negotiations/evaluate", post(handlers::evaluate_offer))
        .route("/api/v1/negotiations/:id", get(handlers::get_negotiation))
        .route("/api/v1/negotiations/:id/accept", post(handlers::accept_negotiation))
        .route("/api/v1/orders", post(handlers::create_order))
        .route("/api/v1/orders/:id", get(handlers::get_order))
        .route("/api/v1/orders/:id/delivery-quote", get(handlers::delivery_quote))
        .route("/api/v1/orders/:id/delivery/negotiate", post(handlers::negotiate_delivery_fee))
        .route("/api/v1/carts/:customer_id", get(handlers::get_cart))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
