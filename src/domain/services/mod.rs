//! Domain services
pub mod delivery;
pub mod offer_evaluator;

pub use delivery::{DeliveryPricing, DeliveryQuote};
pub use offer_evaluator::{Decision, Evaluation, Negotiable, OfferEvaluator, OfferStrategy, PriceBounds, SessionState};
