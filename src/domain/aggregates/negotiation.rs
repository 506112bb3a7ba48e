//! Negotiation Aggregate
//!
//! The persisted record of one customer haggling over one subject. Each offer
//! is evaluated against the record's own history, so the evaluator never has
//! to own session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, NegotiationEvent};
use crate::domain::services::offer_evaluator::{Decision, Evaluation, Negotiable, OfferEvaluator, SessionState};
use crate::{MarketError, Result};

/// What is being negotiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    Product(Uuid),
    /// Delivery fee of an order.
    Delivery(Uuid),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self { Self::Product(_) => "product", Self::Delivery(_) => "delivery" }
    }
    pub fn id(&self) -> Uuid {
        match self { Self::Product(id) | Self::Delivery(id) => *id }
    }
    pub fn from_parts(kind: &str, id: Uuid) -> Result<Self> {
        match kind {
            "product" => Ok(Self::Product(id)),
            "delivery" => Ok(Self::Delivery(id)),
            other => Err(MarketError::InvalidArgument(format!("unknown negotiation subject {other}"))),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}:{}", self.kind(), self.id()) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    #[default]
    Pending,
    CounterOffer,
    Accepted,
    Rejected,
}

impl NegotiationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CounterOffer => "counter_offer",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
    pub fn is_active(&self) -> bool { matches!(self, Self::Pending | Self::CounterOffer) }
}

impl FromStr for NegotiationStatus {
    type Err = MarketError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "counter_offer" => Ok(Self::CounterOffer),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(MarketError::InvalidArgument(format!("unknown negotiation status {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Negotiation {
    pub(crate) id: Uuid,
    pub(crate) subject: Subject,
    pub(crate) customer_id: Uuid,
    pub(crate) status: NegotiationStatus,
    pub(crate) initial_price: f64,
    pub(crate) offered_price: f64,
    pub(crate) counter_price: Option<f64>,
    pub(crate) final_price: Option<f64>,
    pub(crate) rounds: u32,
    pub(crate) last_decision: Option<Decision>,
    pub(crate) last_message: Option<String>,
    pub(crate) continue_negotiation: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) events: Vec<DomainEvent>,
}

impl Negotiation {
    pub fn open(subject: Subject, customer_id: Uuid, initial_price: f64, offered_price: f64) -> Self {
        let now = Utc::now();
        let mut negotiation = Self {
            id: Uuid::now_v7(), subject, customer_id, status: NegotiationStatus::Pending,
            initial_price, offered_price, counter_price: None, final_price: None, rounds: 0,
            last_decision: None, last_message: None, continue_negotiation: true,
            created_at: now, updated_at: now, events: vec![],
        };
        negotiation.raise_event(NegotiationEvent::Opened {
            negotiation_id: negotiation.id, subject, customer_id, initial_price,
        });
        negotiation
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn subject(&self) -> Subject { self.subject }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn status(&self) -> NegotiationStatus { self.status }
    pub fn initial_price(&self) -> f64 { self.initial_price }
    pub fn offered_price(&self) -> f64 { self.offered_price }
    pub fn counter_price(&self) -> Option<f64> { self.counter_price }
    pub fn final_price(&self) -> Option<f64> { self.final_price }
    pub fn rounds(&self) -> u32 { self.rounds }
    pub fn last_decision(&self) -> Option<Decision> { self.last_decision }
    pub fn last_message(&self) -> Option<&str> { self.last_message.as_deref() }
    pub fn continue_negotiation(&self) -> bool { self.continue_negotiation }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Session inputs for evaluating the next offer.
    pub fn session(&self) -> SessionState {
        SessionState {
            rounds_so_far: self.rounds,
            last_offered_price: (self.rounds > 0).then_some(self.offered_price),
            last_counter_price: self.counter_price,
        }
    }

    pub fn ensure_accepts_offers(&self, allow_further_rounds: bool) -> Result<()> {
        if !self.status.is_active() {
            return Err(MarketError::InvalidOperation("This negotiation is no longer active".into()));
        }
        if self.status == NegotiationStatus::CounterOffer {
            if !allow_further_rounds {
                return Err(MarketError::InvalidOperation(
                    "Further negotiation is not allowed for this product".into(),
                ));
            }
            if !self.continue_negotiation {
                return Err(MarketError::InvalidOperation(
                    "Negotiation has ended; accept the last counter-offer or pay the regular price".into(),
                ));
            }
        }
        Ok(())
    }

    /// Evaluates `offered` against this record's history and applies the outcome.
    pub fn evaluate_offer<N: Negotiable + ?Sized>(
        &mut self,
        terms: &N,
        evaluator: &OfferEvaluator,
        offered: f64,
    ) -> Result<Evaluation> {
        let evaluation = evaluator.evaluate(terms, offered, &self.session())?;
        self.apply(offered, &evaluation);
        Ok(evaluation)
    }

    pub fn apply(&mut self, offered: f64, evaluation: &Evaluation) {
        self.offered_price = offered;
        self.rounds += 1;
        self.last_decision = Some(evaluation.decision);
        self.last_message = Some(evaluation.message.clone());
        self.continue_negotiation = evaluation.continue_negotiation;

        match evaluation.decision {
            Decision::Accept => {
                let final_price = evaluation.final_price.unwrap_or(offered);
                self.status = NegotiationStatus::Accepted;
                self.final_price = Some(final_price);
                self.raise_event(NegotiationEvent::Accepted {
                    negotiation_id: self.id, subject: self.subject, final_price,
                });
            }
            Decision::Reject => {
                self.status = NegotiationStatus::Rejected;
                self.raise_event(NegotiationEvent::Rejected { negotiation_id: self.id, offered_price: offered });
            }
            Decision::Counter => {
                self.status = NegotiationStatus::CounterOffer;
                self.counter_price = evaluation.counter_price;
                if let Some(counter_price) = evaluation.counter_price {
                    self.raise_event(NegotiationEvent::Countered {
                        negotiation_id: self.id, offered_price: offered, counter_price, rounds: self.rounds,
                    });
                }
            }
        }
        self.touch();
    }

    /// Customer takes the last counter-offer.
    pub fn accept_counter(&mut self, customer_id: Uuid) -> Result<f64> {
        if self.customer_id != customer_id {
            return Err(MarketError::AccessDenied);
        }
        if !self.status.is_active() {
            return Err(MarketError::InvalidOperation("This negotiation is no longer active".into()));
        }
        let price = self
            .counter_price
            .ok_or_else(|| MarketError::InvalidOperation("No counter offer available".into()))?;
        self.status = NegotiationStatus::Accepted;
        self.final_price = Some(price);
        self.continue_negotiation = false;
        self.raise_event(NegotiationEvent::Accepted { negotiation_id: self.id, subject: self.subject, final_price: price });
        self.touch();
        Ok(price)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: NegotiationEvent) { self.events.push(DomainEvent::Negotiation(e)); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
