//! Climate-state cluster node.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Flat 1-based identifier, unique across the entire hierarchy.
///
/// Ids are contiguous and ordered ascending first by level, then by local
/// index within the level. The mapping to `(level, local_index)` is owned by
/// [`crate::index::HierarchyIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

impl std::fmt::Display for GlobalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cluster of climate states at one tier of the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: GlobalId,
    /// Hierarchy tier; 0 = observed/terminal classes.
    pub level: u32,
    /// 1-based position within the level.
    pub local_index: u32,
    /// Expected value of the cluster's climate variable.
    pub ev: f64,
    /// Mixture weights over the three terminal regimes. Components sum to 1.
    pub lambda: Option<[f64; 3]>,
    /// Observation dates assigned to this cluster.
    pub dates: Vec<NaiveDate>,
}

impl ClusterNode {
    pub fn new(id: GlobalId, level: u32, local_index: u32, ev: f64) -> Self {
        Self {
            id,
            level,
            local_index,
            ev,
            lambda: None,
            dates: Vec::new(),
        }
    }

    pub fn with_lambda(mut self, lambda: [f64; 3]) -> Self {
        self.lambda = Some(lambda);
        self
    }

    pub fn with_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.dates = dates.into_iter().collect();
        self
    }

    /// True when this node sits in the terminal (observed) tier.
    pub fn is_terminal(&self) -> bool {
        self.level == 0
    }
}
