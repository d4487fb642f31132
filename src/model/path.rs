//! Most-probable-path query result.

use serde::{Deserialize, Serialize};

use super::GlobalId;

/// A maximum-probability route through the hierarchy, source first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPath {
    /// Visited node ids, starting at the query source and ending at the
    /// query target. Always non-empty.
    pub nodes: Vec<GlobalId>,
    /// Sum of edge costs (`-ln(weight)`) along the path.
    pub total_cost: f64,
    /// `exp(-total_cost)`, the product of edge weights along the path.
    pub total_probability: f64,
}

impl TransitionPath {
    /// Number of hops (edges), one less than the node count.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> GlobalId {
        *self.nodes.first().expect("path always has at least one node")
    }

    pub fn end(&self) -> GlobalId {
        *self.nodes.last().expect("path always has at least one node")
    }
}
