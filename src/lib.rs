//! Bargain Market
//!
//! Multi-vendor marketplace backend with customer-driven price negotiation.
//!
//! ## Features
//! - Offer evaluation (accept / reject / counter) for negotiable products
//! - Delivery-fee negotiation priced from shop-to-customer distance
//! - Negotiation records with per-customer serialization of offers
//! - Carts that carry negotiated prices
//! - Negotiation events published to NATS

pub mod api;
pub mod config;
pub mod domain;
pub mod events;
pub mod store;

use thiserror::Error;

pub use domain::services::offer_evaluator::{
    Decision, Evaluation, Negotiable, OfferEvaluator, OfferStrategy, PriceBounds, SessionState,
};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("{0}")]
    InvalidOperation(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Negotiation not found")]
    NegotiationNotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl From<domain::value_objects::ValueError> for MarketError {
    fn from(err: domain::value_objects::ValueError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
