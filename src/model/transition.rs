//! Transition (directed edge) between clusters of adjacent levels.

use serde::{Deserialize, Serialize};

use super::GlobalId;

/// A probabilistic transition from a cluster to one of its children.
///
/// Structurally valid transitions always move one level toward the terminal
/// tier: `level(source) == level(target) + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub source: GlobalId,
    pub target: GlobalId,
    /// Transition probability in `[0, 1]`.
    pub weight: f64,
    /// Optional confidence interval `[lo, hi]` around `weight`.
    pub ci: Option<[f64; 2]>,
    /// Explicit traversal cost. When absent, derived as `-ln(weight)`.
    pub cost: Option<f64>,
}

impl Transition {
    pub fn new(source: GlobalId, target: GlobalId, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
            ci: None,
            cost: None,
        }
    }

    pub fn with_ci(mut self, lo: f64, hi: f64) -> Self {
        self.ci = Some([lo, hi]);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// `ln(weight)`, or `-∞` for a zero-weight transition.
    ///
    /// Zero-weight transitions are effectively absent from probability
    /// analytics but are kept in the record set for display.
    pub fn log_weight(&self) -> f64 {
        if self.weight > 0.0 {
            self.weight.ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    /// Cost used for most-probable-path search. An explicit `cost` field
    /// wins; otherwise `-ln(weight)`, with `+∞` for zero weight.
    pub fn traversal_cost(&self) -> f64 {
        match self.cost {
            Some(c) => c,
            None if self.weight > 0.0 => -self.weight.ln(),
            None => f64::INFINITY,
        }
    }
}
