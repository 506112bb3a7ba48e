//! Domain events
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::negotiation::Subject;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainEvent {
    Negotiation(NegotiationEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NegotiationEvent {
    Opened { negotiation_id: Uuid, subject: Subject, customer_id: Uuid, initial_price: f64 },
    Countered { negotiation_id: Uuid, offered_price: f64, counter_price: f64, rounds: u32 },
    Accepted { negotiation_id: Uuid, subject: Subject, final_price: f64 },
    Rejected { negotiation_id: Uuid, offered_price: f64 },
}

impl DomainEvent {
    /// Messaging subject suffix, e.g. `negotiation.accepted`.
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::Negotiation(e) => match e {
                NegotiationEvent::Opened { .. } => "negotiation.opened",
                NegotiationEvent::Countered { .. } => "negotiation.countered",
                NegotiationEvent::Accepted { .. } => "negotiation.accepted",
                NegotiationEvent::Rejected { .. } => "negotiation.rejected",
            },
        }
    }
}
