//! Dataset ingest — the validation boundary between upstream JSON and the
//! strict model types.
//!
//! Upstream records are duck-typed JSON produced by the data pipeline.
//! Everything is checked here, once, so the rest of the crate can trust its
//! inputs:
//!
//! - a node's `(level, local_idx)` must agree with its global `id` under the
//!   capacity table — disagreement is a hard error;
//! - `lambda`, when present, must have three components summing to 1 within
//!   tolerance;
//! - `weight` must lie in `[0, 1]`;
//! - dates must parse as ISO `YYYY-MM-DD`.
//!
//! Findings that are tolerable per the display contract (a confidence
//! interval not covering its weight, counts disagreeing with the capacity
//! table) are logged as warnings and do not fail the load.

use std::io::Read;

use serde::Deserialize;
use tracing::warn;

use crate::analytics::TransitionGraph;
use crate::index::HierarchyIndex;
use crate::model::{ClusterNode, GlobalId, Transition};
use crate::{Error, Result};

/// Tolerance for the λ simplex constraint.
const LAMBDA_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Raw upstream shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawDataset {
    capacities: Vec<u32>,
    nodes: Vec<RawNode>,
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: u32,
    level: u32,
    local_idx: u32,
    ev: f64,
    #[serde(default)]
    lambda: Option<Vec<f64>>,
    #[serde(default)]
    dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    source: u32,
    target: u32,
    weight: f64,
    #[serde(default)]
    ci: Option<[f64; 2]>,
    #[serde(default)]
    cost: Option<f64>,
}

// ============================================================================
// Validated dataset
// ============================================================================

/// A fully validated dataset, ready to build a [`TransitionGraph`].
#[derive(Debug, Clone)]
pub struct Dataset {
    pub index: HierarchyIndex,
    pub nodes: Vec<ClusterNode>,
    pub transitions: Vec<Transition>,
}

impl Dataset {
    /// Parse and validate a dataset from its JSON wire form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDataset = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Parse and validate a dataset from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let raw: RawDataset = serde_json::from_reader(reader)?;
        Self::from_raw(raw)
    }

    /// Assemble a dataset from already-parsed collections, applying the same
    /// validation as the JSON path.
    pub fn new(
        index: HierarchyIndex,
        nodes: Vec<ClusterNode>,
        transitions: Vec<Transition>,
    ) -> Result<Self> {
        for node in &nodes {
            validate_node(&index, node)?;
        }
        for t in &transitions {
            validate_transition(t)?;
        }
        audit_counts(&index, nodes.len());
        Ok(Self {
            index,
            nodes,
            transitions,
        })
    }

    /// Consume the dataset and build the analytics model.
    pub fn into_graph(self) -> TransitionGraph {
        TransitionGraph::build(self.index, self.nodes, self.transitions)
    }

    fn from_raw(raw: RawDataset) -> Result<Self> {
        let index = HierarchyIndex::from_capacities(raw.capacities)?;

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for r in raw.nodes {
            nodes.push(convert_node(&index, r)?);
        }

        let mut transitions = Vec::with_capacity(raw.links.len());
        for r in raw.links {
            transitions.push(convert_link(r)?);
        }

        audit_counts(&index, nodes.len());
        Ok(Self {
            index,
            nodes,
            transitions,
        })
    }
}

// ============================================================================
// Record validation
// ============================================================================

fn convert_node(index: &HierarchyIndex, raw: RawNode) -> Result<ClusterNode> {
    let id = GlobalId(raw.id);
    let lambda = match raw.lambda {
        None => None,
        Some(values) => {
            let arr: [f64; 3] = values.as_slice().try_into().map_err(|_| {
                Error::MalformedNode(format!(
                    "node {}: lambda has {} components, expected 3",
                    raw.id,
                    values.len()
                ))
            })?;
            Some(arr)
        }
    };

    let mut dates = Vec::with_capacity(raw.dates.len());
    for s in &raw.dates {
        let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            Error::MalformedNode(format!("node {}: bad date {s:?}: {e}", raw.id))
        })?;
        dates.push(date);
    }

    let mut node = ClusterNode::new(id, raw.level, raw.local_idx, raw.ev).with_dates(dates);
    if let Some(arr) = lambda {
        node = node.with_lambda(arr);
    }
    validate_node(index, &node)?;
    Ok(node)
}

fn validate_node(index: &HierarchyIndex, node: &ClusterNode) -> Result<()> {
    if !index.validate_global(node.id, node.level, node.local_index) {
        return Err(Error::MalformedNode(format!(
            "id {} does not match (level {}, local {}) under the capacity table",
            node.id, node.level, node.local_index
        )));
    }
    if let Some(lambda) = node.lambda {
        let sum: f64 = lambda.iter().sum();
        if (sum - 1.0).abs() > LAMBDA_SUM_TOLERANCE {
            return Err(Error::MalformedNode(format!(
                "node {}: lambda components sum to {sum}, expected 1",
                node.id
            )));
        }
    }
    Ok(())
}

fn convert_link(raw: RawLink) -> Result<Transition> {
    let mut t = Transition::new(GlobalId(raw.source), GlobalId(raw.target), raw.weight);
    if let Some([lo, hi]) = raw.ci {
        t = t.with_ci(lo, hi);
    }
    if let Some(cost) = raw.cost {
        t = t.with_cost(cost);
    }
    validate_transition(&t)?;
    Ok(t)
}

fn validate_transition(t: &Transition) -> Result<()> {
    if !(0.0..=1.0).contains(&t.weight) {
        return Err(Error::MalformedTransition(format!(
            "{}→{}: weight {} outside [0, 1]",
            t.source, t.target, t.weight
        )));
    }
    if let Some([lo, hi]) = t.ci {
        if !(lo <= t.weight && t.weight <= hi) {
            warn!(
                source = t.source.0,
                target = t.target.0,
                lo,
                hi,
                weight = t.weight,
                "confidence interval does not cover the weight"
            );
        }
    }
    Ok(())
}

fn audit_counts(index: &HierarchyIndex, node_count: usize) {
    let expected = index.total_nodes() as usize;
    if node_count != expected {
        warn!(
            nodes = node_count,
            expected,
            "dataset node count disagrees with capacity table"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "capacities": [2, 1],
        "nodes": [
            {"id": 1, "level": 0, "local_idx": 1, "ev": 0.25,
             "lambda": [0.5, 0.3, 0.2], "dates": ["2019-06-01"]},
            {"id": 2, "level": 0, "local_idx": 2, "ev": 0.75},
            {"id": 3, "level": 1, "local_idx": 1, "ev": 0.5}
        ],
        "links": [
            {"source": 3, "target": 1, "weight": 0.6, "ci": [0.5, 0.7]},
            {"source": 3, "target": 2, "weight": 0.4}
        ]
    }"#;

    #[test]
    fn test_parse_valid_dataset() {
        let ds = Dataset::from_json_str(GOOD).unwrap();
        assert_eq!(ds.nodes.len(), 3);
        assert_eq!(ds.transitions.len(), 2);
        assert_eq!(ds.nodes[0].lambda, Some([0.5, 0.3, 0.2]));
        assert_eq!(ds.nodes[0].dates.len(), 1);
        assert_eq!(ds.index.total_nodes(), 3);

        let graph = ds.into_graph();
        let p = graph.probability(GlobalId(3), GlobalId(1)).unwrap();
        assert!((p - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_mismatched_triple_rejected() {
        let json = r#"{
            "capacities": [2, 1],
            "nodes": [{"id": 2, "level": 0, "local_idx": 1, "ev": 0.0}],
            "links": []
        }"#;
        let err = Dataset::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::MalformedNode(_)), "got {err:?}");
    }

    #[test]
    fn test_lambda_off_simplex_rejected() {
        let json = r#"{
            "capacities": [1],
            "nodes": [{"id": 1, "level": 0, "local_idx": 1, "ev": 0.0,
                       "lambda": [0.5, 0.3, 0.3]}],
            "links": []
        }"#;
        assert!(Dataset::from_json_str(json).is_err());
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let json = r#"{
            "capacities": [1, 1],
            "nodes": [
                {"id": 1, "level": 0, "local_idx": 1, "ev": 0.0},
                {"id": 2, "level": 1, "local_idx": 1, "ev": 0.0}
            ],
            "links": [{"source": 2, "target": 1, "weight": 1.5}]
        }"#;
        let err = Dataset::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::MalformedTransition(_)), "got {err:?}");
    }

    #[test]
    fn test_bad_date_rejected() {
        let json = r#"{
            "capacities": [1],
            "nodes": [{"id": 1, "level": 0, "local_idx": 1, "ev": 0.0,
                       "dates": ["June 1st"]}],
            "links": []
        }"#;
        assert!(Dataset::from_json_str(json).is_err());
    }

    #[test]
    fn test_garbage_json_surfaces_serde_error() {
        let err = Dataset::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
