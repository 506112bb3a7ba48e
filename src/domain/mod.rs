//! Marketplace domain: aggregates, value objects, events and pricing services
pub mod aggregates;
pub mod events;
pub mod services;
pub mod value_objects;
