//! Negotiation stage: bracket convergence between a budget and an asking rate.
//!
//! Deterministic and free of side effects. The requester opens at the top of
//! the budget; each round both sides move toward the midpoint, the requester by
//! `offer_bias` of the distance and the counterparty by `ask_concession`. The
//! parties settle once the gap relative to the current ask is within
//! `gap_tolerance`.

use crate::domain::models::{Budget, NegotiationOutcome, NegotiationParams};

/// Run bracket convergence for `budget` against `ask`.
pub fn negotiate(budget: Budget, ask: f64, params: &NegotiationParams) -> NegotiationOutcome {
    if ask <= budget.max {
        return NegotiationOutcome {
            agreed: true,
            rate: Some(ask),
            rounds: 0,
            final_offer: ask,
            final_ask: ask,
        };
    }

    let mut offer = budget.max;
    let mut current_ask = ask;
    let mut round = 0;

    while relative_gap(offer, current_ask) > params.gap_tolerance && round < params.max_rounds {
        let midpoint = (offer + current_ask) / 2.0;
        offer += params.offer_bias * (midpoint - offer);
        current_ask -= params.ask_concession * (current_ask - midpoint);
        round += 1;
    }

    if relative_gap(offer, current_ask) <= params.gap_tolerance {
        NegotiationOutcome {
            agreed: true,
            rate: Some((offer + current_ask) / 2.0),
            rounds: round,
            final_offer: offer,
            final_ask: current_ask,
        }
    } else {
        NegotiationOutcome {
            agreed: false,
            rate: None,
            rounds: params.max_rounds,
            final_offer: offer,
            final_ask: current_ask,
        }
    }
}

fn relative_gap(offer: f64, ask: f64) -> f64 {
    (offer - ask).abs() / ask
}
