use serde::{Deserialize, Serialize};

/// Tunables for bracket convergence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegotiationParams {
    /// Round limit `R`.
    pub max_rounds: u32,
    /// Relative gap (gap / current ask) at or below which the parties settle.
    pub gap_tolerance: f64,
    /// Fraction of the distance to the midpoint the requester moves per round.
    pub offer_bias: f64,
    /// Fraction of the distance to the midpoint the counterparty concedes per round.
    pub ask_concession: f64,
}

impl Default for NegotiationParams {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            gap_tolerance: 0.15,
            offer_bias: 0.7,
            ask_concession: 0.3,
        }
    }
}

/// Result of a negotiation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    pub agreed: bool,
    /// Agreed rate; `None` when the run did not converge.
    pub rate: Option<f64>,
    pub rounds: u32,
    /// Final requester offer.
    pub final_offer: f64,
    /// Final counterparty ask.
    pub final_ask: f64,
}
