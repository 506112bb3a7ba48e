//! Aggregates module
pub mod cart;
pub mod negotiation;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem};
pub use negotiation::{Negotiation, NegotiationStatus, Subject};
pub use order::Order;
pub use product::Product;
