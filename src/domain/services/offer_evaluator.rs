//! Offer evaluation for negotiable prices.
//!
//! The evaluator is a pure function of the price bounds, the offered price and
//! the session inputs the caller re-supplies on every call. Persisting rounds
//! and status is the caller's job (see [`crate::domain::aggregates::Negotiation`]).

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DiscountPercent, Price};
use crate::{MarketError, Result};

const COUNTER_TEMPLATES: [&str; 4] = [
    "How about {price}? That's a {discount}% discount.",
    "I can offer it for {price}. That's {discount}% off, quite a good deal!",
    "Let's meet in the middle at {price}? That's still {discount}% below the regular price.",
    "I can go down to {price} ({discount}% off). What do you think?",
];

const FULL_PRICE_MESSAGE: &str =
    "Please use the regular price if you're willing to pay full price.";
const DEAL_MESSAGE: &str = "Great! We have a deal!";

/// Anything that can be haggled over: a product price, a delivery fee.
pub trait Negotiable {
    /// Fails with [`MarketError::InvalidOperation`] when negotiation is not offered.
    fn price_bounds(&self) -> Result<PriceBounds>;
}

/// List price, floor and discount cap of a negotiable amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    list_price: f64,
    min_price: f64,
    max_discount: DiscountPercent,
}

impl PriceBounds {
    pub fn new(list_price: f64, min_price: Option<f64>, max_discount: DiscountPercent) -> Result<Self> {
        let list_price = Price::new(list_price)?.value();
        let min_price = min_price.ok_or_else(|| {
            MarketError::InvalidOperation("This item is not available for negotiation".into())
        })?;
        if !min_price.is_finite() || min_price < 0.0 {
            return Err(MarketError::InvalidArgument(format!(
                "minimum price must be a finite non-negative number, got {min_price}"
            )));
        }
        if min_price >= list_price {
            return Err(MarketError::InvalidOperation(
                "This item is not available for negotiation".into(),
            ));
        }
        Ok(Self { list_price, min_price, max_discount })
    }

    pub fn list_price(&self) -> f64 { self.list_price }
    pub fn min_price(&self) -> f64 { self.min_price }
    pub fn max_discount(&self) -> DiscountPercent { self.max_discount }

    /// Discount of `price` relative to list, as a fraction.
    pub fn discount_of(&self, price: f64) -> f64 {
        (self.list_price - price) / self.list_price
    }

    pub fn exceeds_max_discount(&self, price: f64) -> bool {
        self.discount_of(price) > self.max_discount.fraction()
    }

    /// Lowest counter the seller would still honour.
    pub fn counter_floor(&self) -> f64 {
        self.min_price
            .max(self.list_price * (1.0 - self.max_discount.fraction()))
    }
}

impl Negotiable for PriceBounds {
    fn price_bounds(&self) -> Result<PriceBounds> { Ok(*self) }
}

/// Negotiation state re-supplied by the caller on every evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Offers evaluated before the current one.
    #[serde(default)]
    pub rounds_so_far: u32,
    #[serde(default)]
    pub last_offered_price: Option<f64>,
    #[serde(default)]
    pub last_counter_price: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
    Counter,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Counter => "counter",
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = MarketError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            "counter" => Ok(Self::Counter),
            other => Err(MarketError::InvalidArgument(format!("unknown decision {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub counter_price: Option<f64>,
    pub final_price: Option<f64>,
    pub message: String,
    /// Whether the seller side is willing to take another offer after this one.
    pub continue_negotiation: bool,
}

impl Evaluation {
    fn reject(message: impl Into<String>) -> Self {
        Self {
            decision: Decision::Reject,
            counter_price: None,
            final_price: None,
            message: message.into(),
            continue_negotiation: false,
        }
    }
}

/// Tuning knobs of the seller-side negotiator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferStrategy {
    /// How eager the seller is to close (0-1).
    pub eagerness: f64,
    /// Share of the remaining gap to list price a counter recovers (0-1).
    pub flexibility: f64,
    /// Acceptance score above which an offer is taken.
    pub accept_threshold: f64,
    /// Rounds after which the round factor saturates and negotiation stops.
    pub max_rounds: u32,
    /// Counter/offer gap under which prices count as converged.
    pub convergence_gap: f64,
}

impl Default for OfferStrategy {
    fn default() -> Self {
        Self {
            eagerness: 0.7,
            flexibility: 0.6,
            accept_threshold: 0.8,
            max_rounds: 5,
            convergence_gap: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OfferEvaluator {
    strategy: OfferStrategy,
}

impl OfferEvaluator {
    pub fn new(strategy: OfferStrategy) -> Self { Self { strategy } }

    pub fn strategy(&self) -> &OfferStrategy { &self.strategy }

    /// Decide whether to accept, reject or counter `offered_price`.
    pub fn evaluate<N: Negotiable + ?Sized>(
        &self,
        subject: &N,
        offered_price: f64,
        session: &SessionState,
    ) -> Result<Evaluation> {
        let bounds = subject.price_bounds()?;
        if !offered_price.is_finite() || offered_price <= 0.0 {
            return Err(MarketError::InvalidArgument(format!(
                "offered price must be a finite positive number, got {offered_price}"
            )));
        }

        let evaluation = self.decide(&bounds, offered_price, session);
        tracing::debug!(
            offered_price,
            rounds_so_far = session.rounds_so_far,
            decision = evaluation.decision.as_str(),
            counter_price = ?evaluation.counter_price,
            "offer evaluated"
        );
        Ok(evaluation)
    }

    fn decide(&self, bounds: &PriceBounds, offered: f64, session: &SessionState) -> Evaluation {
        if offered >= bounds.list_price() {
            return Evaluation::reject(FULL_PRICE_MESSAGE);
        }
        if offered < bounds.min_price() {
            return Evaluation::reject(format!(
                "I'm sorry, but {:.2} is too low. The minimum price is {:.2}",
                offered,
                bounds.min_price()
            ));
        }
        if bounds.exceeds_max_discount(offered) {
            return Evaluation::reject(format!(
                "That's too low. The maximum discount we can offer is {:.0}%",
                bounds.max_discount().percent()
            ));
        }

        if self.acceptance_score(bounds, offered, session.rounds_so_far) > self.strategy.accept_threshold {
            return Evaluation {
                decision: Decision::Accept,
                counter_price: None,
                final_price: Some(offered),
                message: DEAL_MESSAGE.to_string(),
                continue_negotiation: false,
            };
        }

        let counter = self.counter_offer(bounds, offered, session);
        let after = SessionState {
            rounds_so_far: session.rounds_so_far.saturating_add(1),
            last_offered_price: Some(offered),
            last_counter_price: Some(counter),
        };
        Evaluation {
            decision: Decision::Counter,
            counter_price: Some(counter),
            final_price: None,
            message: counter_message(bounds, counter, session.rounds_so_far),
            continue_negotiation: self.should_continue(bounds, &after),
        }
    }

    /// Average of round, price and eagerness factors, each in [0, 1].
    pub fn acceptance_score(&self, bounds: &PriceBounds, offered: f64, rounds_so_far: u32) -> f64 {
        let horizon = self.strategy.max_rounds.max(1) as f64;
        let round_factor = (rounds_so_far as f64 / horizon).min(1.0);
        let span = bounds.list_price() - bounds.min_price();
        let price_factor = ((offered - bounds.min_price()) / span).clamp(0.0, 1.0);
        (round_factor + price_factor + self.strategy.eagerness) / 3.0
    }

    /// Counter-offer for `offered`, always within the seller's bounds.
    pub fn counter_offer(&self, bounds: &PriceBounds, offered: f64, session: &SessionState) -> f64 {
        let list = bounds.list_price();
        let meet_halfway = offered + (list - offered) * self.strategy.flexibility;

        let target = if session.rounds_so_far == 0 && session.last_offered_price.is_none() {
            let opening = list * (1.0 - bounds.max_discount().fraction() * (1.0 - self.strategy.eagerness));
            // never open below what the customer already offered
            if opening > offered { opening } else { meet_halfway }
        } else {
            meet_halfway
        };

        target.clamp(bounds.counter_floor(), list)
    }

    /// Continuation policy: false once rounds are exhausted, prices have
    /// converged, or the latest offer is beyond the discount cap.
    pub fn should_continue(&self, bounds: &PriceBounds, session: &SessionState) -> bool {
        if session.rounds_so_far >= self.strategy.max_rounds {
            return false;
        }
        if let (Some(offer), Some(counter)) = (session.last_offered_price, session.last_counter_price) {
            if (counter - offer).abs() < self.strategy.convergence_gap {
                return false;
            }
        }
        if let Some(offer) = session.last_offered_price {
            if bounds.exceeds_max_discount(offer) {
                return false;
            }
        }
        true
    }
}

fn counter_message(bounds: &PriceBounds, counter: f64, rounds_so_far: u32) -> String {
    let template = COUNTER_TEMPLATES[rounds_so_far as usize % COUNTER_TEMPLATES.len()];
    let discount = bounds.discount_of(counter) * 100.0;
    template
        .replace("{price}", &format!("{counter:.2}"))
        .replace("{discount}", &format!("{discount:.1}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(list: f64, min: f64, max_discount: f64) -> PriceBounds {
        PriceBounds::new(list, Some(min), DiscountPercent::new(max_discount).unwrap()).unwrap()
    }

    fn round(rounds_so_far: u32) -> SessionState {
        SessionState { rounds_so_far, ..Default::default() }
    }

    #[test]
    fn test_full_price_offer_is_rejected() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 20.0);
        for offer in [100.0, 100.01, 250.0] {
            let out = ev.evaluate(&b, offer, &round(0)).unwrap();
            assert_eq!(out.decision, Decision::Reject);
            assert!(out.message.contains("regular price"));
            assert!(out.counter_price.is_none());
        }
    }

    #[test]
    fn test_below_minimum_is_rejected() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 50.0);
        let out = ev.evaluate(&b, 69.99, &round(3)).unwrap();
        assert_eq!(out.decision, Decision::Reject);
        assert!(out.message.contains("minimum price is 70.00"));
    }

    #[test]
    fn test_exceeding_max_discount_is_rejected() {
        let ev = OfferEvaluator::default();
        let out = ev.evaluate(&bounds(100.0, 70.0, 20.0), 75.0, &round(0)).unwrap();
        assert_eq!(out.decision, Decision::Reject);
        assert!(out.message.contains("maximum discount we can offer is 20%"));
    }

    #[test]
    fn test_late_round_counter_meets_halfway() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 35.0);
        assert!((ev.acceptance_score(&b, 85.0, 4) - 2.0 / 3.0).abs() < 1e-9);

        let out = ev.evaluate(&b, 85.0, &round(4)).unwrap();
        assert_eq!(out.decision, Decision::Counter);
        assert!((out.counter_price.unwrap() - 94.0).abs() < 1e-9);
        assert!(out.message.starts_with("How about 94.00"));
        assert!(!out.continue_negotiation);
    }

    #[test]
    fn test_opening_counter_uses_anchor() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 20.0);
        let out = ev.evaluate(&b, 85.0, &SessionState::default()).unwrap();
        assert_eq!(out.decision, Decision::Counter);
        // 100 * (1 - 0.2 * 0.3)
        assert!((out.counter_price.unwrap() - 94.0).abs() < 1e-9);
        assert_eq!(out.message, "How about 94.00? That's a 6.0% discount.");
        assert!(out.continue_negotiation);
    }

    #[test]
    fn test_opening_counter_never_undercuts_offer() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 20.0);
        let out = ev.evaluate(&b, 97.0, &SessionState::default()).unwrap();
        assert_eq!(out.decision, Decision::Counter);
        assert!(out.counter_price.unwrap() > 97.0);
    }

    #[test]
    fn test_accepts_when_score_is_high() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 30.0);
        let out = ev.evaluate(&b, 95.0, &round(5)).unwrap();
        assert_eq!(out.decision, Decision::Accept);
        assert_eq!(out.final_price, Some(95.0));
        assert!(!out.continue_negotiation);
    }

    #[test]
    fn test_counter_stays_within_bounds() {
        let ev = OfferEvaluator::default();
        let b = bounds(250.0, 180.0, 40.0);
        for rounds in 0..8 {
            for step in 0..70 {
                let offer = 180.0 + step as f64;
                let session = SessionState {
                    rounds_so_far: rounds,
                    last_offered_price: (rounds > 0).then_some(offer - 5.0),
                    last_counter_price: None,
                };
                let out = ev.evaluate(&b, offer, &session).unwrap();
                if let Some(counter) = out.counter_price {
                    assert!(counter >= b.min_price() && counter <= b.list_price(), "{counter}");
                }
            }
        }
    }

    #[test]
    fn test_score_is_monotonic_in_offer() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 60.0, 40.0);
        for rounds in 0..6 {
            let mut previous = f64::MIN;
            for step in 0..40 {
                let score = ev.acceptance_score(&b, 60.0 + step as f64, rounds);
                assert!(score >= previous);
                previous = score;
            }
        }
    }

    #[test]
    fn test_no_continuation_after_round_five() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 50.0, 50.0);
        let out = ev.evaluate(&b, 60.0, &round(5)).unwrap();
        assert_eq!(out.decision, Decision::Counter);
        assert!(!out.continue_negotiation);
    }

    #[test]
    fn test_continuation_policy() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 20.0);
        let converged = SessionState {
            rounds_so_far: 2,
            last_offered_price: Some(92.0),
            last_counter_price: Some(92.5),
        };
        assert!(!ev.should_continue(&b, &converged));

        let too_deep = SessionState { last_offered_price: Some(75.0), last_counter_price: Some(90.0), ..round(1) };
        assert!(!ev.should_continue(&b, &too_deep));

        let open = SessionState { last_offered_price: Some(85.0), last_counter_price: Some(94.0), ..round(1) };
        assert!(ev.should_continue(&b, &open));
    }

    #[test]
    fn test_messages_cycle_through_templates() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 50.0, 50.0);
        let first = ev.evaluate(&b, 60.0, &round(1)).unwrap().message;
        let fifth = ev.evaluate(&b, 60.0, &round(5)).unwrap().message;
        assert!(first.starts_with("I can offer it for 84.00"));
        assert_eq!(first, fifth);
    }

    #[test]
    fn test_invalid_offers() {
        let ev = OfferEvaluator::default();
        let b = bounds(100.0, 70.0, 20.0);
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(ev.evaluate(&b, bad, &round(0)), Err(MarketError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_bounds_require_negotiable_item() {
        let d = DiscountPercent::default();
        assert!(matches!(PriceBounds::new(100.0, None, d), Err(MarketError::InvalidOperation(_))));
        assert!(matches!(PriceBounds::new(100.0, Some(100.0), d), Err(MarketError::InvalidOperation(_))));
        assert!(matches!(PriceBounds::new(-1.0, Some(1.0), d), Err(MarketError::InvalidArgument(_))));
    }
}
