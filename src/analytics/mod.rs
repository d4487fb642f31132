//! Transition graph analytics engine.
//!
//! Builds an adjacency/topology model from validated node and transition
//! records and answers two interactive queries over the hierarchy DAG:
//!
//! - [`TransitionGraph::probability`] — cumulative transition probability,
//!   summing *all* directed paths between two nodes. Computed in the log
//!   domain: probabilities compound multiplicatively over up to ~24 levels
//!   and would underflow to zero in linear space.
//! - [`TransitionGraph::most_probable_path`] — maximum-probability route,
//!   recast as a shortest-path problem over `-ln(weight)` edge costs.
//!
//! Both queries run a single relaxation pass over a precomputed topological
//! order; on a DAG one pass is sufficient and optimal, so there is no
//! repeated relaxation as in general Bellman–Ford.
//!
//! Failure semantics: queries never panic and never return `Err`. Ids
//! outside the addressable range yield `None` (query misuse), unreachable
//! targets yield a zero probability / `None` path, and a cyclic input is
//! reported once as a warning at build time while the engine proceeds with
//! the partial order it could establish.

use std::collections::VecDeque;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::index::HierarchyIndex;
use crate::model::{ClusterNode, GlobalId, Transition, TransitionPath};

/// Adjacency entry: precomputed log-weight and traversal cost per edge.
#[derive(Debug, Clone, Copy)]
struct OutEdge {
    target: GlobalId,
    log_weight: f64,
    cost: f64,
}

/// Immutable analytics model over one dataset.
///
/// Rebuilt in full whenever a new dataset loads; never mutated in place.
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    index: HierarchyIndex,
    /// Outgoing edges, dense-indexed by global id (slot 0 unused).
    adjacency: Vec<SmallVec<[OutEdge; 4]>>,
    /// `(source, target)` → position in `transitions`.
    edge_lookup: HashMap<(GlobalId, GlobalId), usize>,
    transitions: Vec<Transition>,
    nodes: Vec<ClusterNode>,
    node_lookup: HashMap<GlobalId, usize>,
    topo_order: Vec<GlobalId>,
    partial_order: bool,
}

impl TransitionGraph {
    // ========================================================================
    // Build phase
    // ========================================================================

    /// Build the adjacency model and topological order.
    ///
    /// Consistency findings (counts disagreeing with the capacity table,
    /// edges violating the level-decrement invariant, endpoints outside the
    /// addressable range) are logged and tolerated: the visualization must
    /// still render. Only range-violating edges are dropped, since nothing
    /// downstream could address them.
    pub fn build(
        index: HierarchyIndex,
        nodes: Vec<ClusterNode>,
        transitions: Vec<Transition>,
    ) -> Self {
        let total = index.total_nodes() as usize;

        let mut node_lookup = HashMap::with_capacity(nodes.len());
        for (pos, node) in nodes.iter().enumerate() {
            if node_lookup.insert(node.id, pos).is_some() {
                warn!(id = node.id.0, "duplicate node id; later record wins");
            }
        }
        if nodes.len() != total {
            warn!(
                nodes = nodes.len(),
                expected = total,
                "node count disagrees with capacity table"
            );
        }

        let mut kept: Vec<Transition> = Vec::with_capacity(transitions.len());
        let mut adjacency: Vec<SmallVec<[OutEdge; 4]>> = vec![SmallVec::new(); total + 1];
        let mut edge_lookup = HashMap::with_capacity(transitions.len());

        for t in transitions {
            if !index.contains(t.source) || !index.contains(t.target) {
                warn!(
                    source = t.source.0,
                    target = t.target.0,
                    "transition endpoint outside the addressable range; dropped"
                );
                continue;
            }
            // Transitions must step exactly one level toward the terminal
            // tier. A violation is tolerated but flagged.
            if let (Ok((src_level, _)), Ok((dst_level, _))) = (
                index.level_and_local(t.source),
                index.level_and_local(t.target),
            ) && src_level != dst_level + 1
            {
                warn!(
                    source = t.source.0,
                    target = t.target.0,
                    src_level,
                    dst_level,
                    "transition does not decrement level by one"
                );
            }

            adjacency[t.source.0 as usize].push(OutEdge {
                target: t.target,
                log_weight: t.log_weight(),
                cost: t.traversal_cost(),
            });
            edge_lookup.insert((t.source, t.target), kept.len());
            kept.push(t);
        }

        let (topo_order, partial_order) = topological_order(&adjacency, total);
        debug!(
            nodes = nodes.len(),
            transitions = kept.len(),
            ordered = topo_order.len(),
            "transition graph built"
        );

        Self {
            index,
            adjacency,
            edge_lookup,
            transitions: kept,
            nodes,
            node_lookup,
            topo_order,
            partial_order,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Cumulative probability of reaching `target` from `source`, summed
    /// over all directed paths.
    ///
    /// Returns `None` when either id lies outside the addressable range
    /// (query misuse, not a structural failure), `Some(0.0)` when the target
    /// is unreachable, and `Some(1.0)` for `probability(x, x)`: the empty
    /// path is assigned probability 1.
    pub fn probability(&self, source: GlobalId, target: GlobalId) -> Option<f64> {
        if !self.index.contains(source) || !self.index.contains(target) {
            return None;
        }
        if source == target {
            return Some(1.0);
        }

        let mut logp = vec![f64::NEG_INFINITY; self.adjacency.len()];
        logp[source.0 as usize] = 0.0;

        for &u in &self.topo_order {
            let lu = logp[u.0 as usize];
            if lu == f64::NEG_INFINITY {
                continue;
            }
            for edge in &self.adjacency[u.0 as usize] {
                let slot = &mut logp[edge.target.0 as usize];
                *slot = logsumexp(*slot, lu + edge.log_weight);
            }
        }

        let lt = logp[target.0 as usize];
        Some(if lt.is_finite() { lt.exp() } else { 0.0 })
    }

    /// Maximum-probability route from `source` to `target`.
    ///
    /// Single relaxation pass over the topological order with predecessor
    /// pointers. Returns `None` for out-of-range ids, an unreachable target,
    /// or a predecessor walk that fails to terminate at the source.
    pub fn most_probable_path(
        &self,
        source: GlobalId,
        target: GlobalId,
    ) -> Option<TransitionPath> {
        if !self.index.contains(source) || !self.index.contains(target) {
            return None;
        }

        let n = self.adjacency.len();
        let mut dist = vec![f64::INFINITY; n];
        let mut pred: Vec<Option<GlobalId>> = vec![None; n];
        dist[source.0 as usize] = 0.0;

        for &u in &self.topo_order {
            let du = dist[u.0 as usize];
            if !du.is_finite() {
                continue;
            }
            for edge in &self.adjacency[u.0 as usize] {
                if !edge.cost.is_finite() {
                    continue;
                }
                let t = edge.target.0 as usize;
                if du + edge.cost < dist[t] {
                    dist[t] = du + edge.cost;
                    pred[t] = Some(u);
                }
            }
        }

        let total_cost = dist[target.0 as usize];
        if !total_cost.is_finite() {
            return None;
        }

        // Walk predecessors back to the source. A walk that does not reach
        // the source within n hops indicates a corrupted chain; give up
        // rather than report a bogus path.
        let mut nodes = vec![target];
        let mut cursor = target;
        while cursor != source {
            cursor = pred[cursor.0 as usize]?;
            nodes.push(cursor);
            if nodes.len() > n {
                return None;
            }
        }
        nodes.reverse();

        Some(TransitionPath {
            nodes,
            total_cost,
            total_probability: (-total_cost).exp(),
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn index(&self) -> &HierarchyIndex {
        &self.index
    }

    pub fn node(&self, id: GlobalId) -> Option<&ClusterNode> {
        self.node_lookup.get(&id).map(|&pos| &self.nodes[pos])
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// The transition record between two resolved endpoints, if any.
    pub fn transition_between(&self, source: GlobalId, target: GlobalId) -> Option<&Transition> {
        self.edge_lookup
            .get(&(source, target))
            .map(|&pos| &self.transitions[pos])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// The established topological order, source-most levels first.
    pub fn topo_order(&self) -> &[GlobalId] {
        &self.topo_order
    }

    /// True when the input contained a cycle and the order is incomplete.
    /// Queries against nodes outside the order degrade silently.
    pub fn is_partial_order(&self) -> bool {
        self.partial_order
    }
}

// ============================================================================
// Internals
// ============================================================================

/// Kahn's algorithm over the dense id range `[1, total]`.
///
/// Ids absent from the node list participate with in-degree 0, which keeps
/// the order well-defined when the dataset undershoots the capacity table.
fn topological_order(
    adjacency: &[SmallVec<[OutEdge; 4]>],
    total: usize,
) -> (Vec<GlobalId>, bool) {
    let mut in_degree = vec![0u32; total + 1];
    for edges in adjacency {
        for edge in edges {
            in_degree[edge.target.0 as usize] += 1;
        }
    }

    let mut queue: VecDeque<GlobalId> = (1..=total as u32)
        .filter(|&id| in_degree[id as usize] == 0)
        .map(GlobalId)
        .collect();

    let mut order = Vec::with_capacity(total);
    while let Some(u) = queue.pop_front() {
        order.push(u);
        for edge in &adjacency[u.0 as usize] {
            let d = &mut in_degree[edge.target.0 as usize];
            *d -= 1;
            if *d == 0 {
                queue.push_back(edge.target);
            }
        }
    }

    let partial = order.len() < total;
    if partial {
        warn!(
            ordered = order.len(),
            nodes = total,
            "transition graph is not acyclic; proceeding with partial topological order"
        );
    }
    (order, partial)
}

/// `ln(exp(a) + exp(b))`, stable for operands far below zero.
/// `-∞` is the identity on either side.
fn logsumexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Capacities [3, 2, 1]: level 0 = {1,2,3}, level 1 = {4,5}, level 2 = {6}.
    fn two_tier_graph() -> TransitionGraph {
        let index = HierarchyIndex::from_capacities(vec![3, 2, 1]).unwrap();
        let nodes = vec![
            ClusterNode::new(GlobalId(1), 0, 1, 0.1),
            ClusterNode::new(GlobalId(2), 0, 2, 0.2),
            ClusterNode::new(GlobalId(3), 0, 3, 0.3),
            ClusterNode::new(GlobalId(4), 1, 1, 0.4),
            ClusterNode::new(GlobalId(5), 1, 2, 0.5),
            ClusterNode::new(GlobalId(6), 2, 1, 0.6),
        ];
        let transitions = vec![
            Transition::new(GlobalId(6), GlobalId(4), 0.6),
            Transition::new(GlobalId(6), GlobalId(5), 0.4),
            Transition::new(GlobalId(4), GlobalId(1), 0.7),
            Transition::new(GlobalId(4), GlobalId(2), 0.3),
            Transition::new(GlobalId(5), GlobalId(2), 0.5),
            Transition::new(GlobalId(5), GlobalId(3), 0.5),
        ];
        TransitionGraph::build(index, nodes, transitions)
    }

    #[test]
    fn test_cumulative_probability_sums_all_paths() {
        let graph = two_tier_graph();
        // 6→4→2 (0.6·0.3) + 6→5→2 (0.4·0.5)
        let p = graph.probability(GlobalId(6), GlobalId(2)).unwrap();
        assert!((p - 0.38).abs() < 1e-9, "got {p}");
    }

    #[test]
    fn test_single_hop_probability_equals_weight() {
        let graph = two_tier_graph();
        for (src, dst, w) in [(6, 4, 0.6), (6, 5, 0.4), (4, 1, 0.7), (5, 3, 0.5)] {
            let p = graph.probability(GlobalId(src), GlobalId(dst)).unwrap();
            assert!((p - w).abs() < 1e-12, "{src}→{dst}: got {p}, want {w}");
        }
    }

    #[test]
    fn test_self_probability_is_one() {
        let graph = two_tier_graph();
        assert_eq!(graph.probability(GlobalId(4), GlobalId(4)), Some(1.0));
    }

    #[test]
    fn test_unreachable_probability_is_zero() {
        let graph = two_tier_graph();
        // Transitions only descend levels; 1 can never reach 6.
        assert_eq!(graph.probability(GlobalId(1), GlobalId(6)), Some(0.0));
    }

    #[test]
    fn test_out_of_range_ids_yield_none() {
        let graph = two_tier_graph();
        assert_eq!(graph.probability(GlobalId(0), GlobalId(2)), None);
        assert_eq!(graph.probability(GlobalId(6), GlobalId(7)), None);
        assert!(graph.most_probable_path(GlobalId(7), GlobalId(1)).is_none());
    }

    #[test]
    fn test_most_probable_path() {
        let graph = two_tier_graph();
        let path = graph.most_probable_path(GlobalId(6), GlobalId(1)).unwrap();
        assert_eq!(path.nodes, vec![GlobalId(6), GlobalId(4), GlobalId(1)]);
        assert!((path.total_probability - 0.42).abs() < 1e-9);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_most_probable_path_unreachable() {
        let graph = two_tier_graph();
        assert!(graph.most_probable_path(GlobalId(1), GlobalId(6)).is_none());
    }

    #[test]
    fn test_explicit_cost_overrides_weight() {
        let index = HierarchyIndex::from_capacities(vec![2, 1]).unwrap();
        let nodes = vec![
            ClusterNode::new(GlobalId(1), 0, 1, 0.0),
            ClusterNode::new(GlobalId(2), 0, 2, 0.0),
            ClusterNode::new(GlobalId(3), 1, 1, 0.0),
        ];
        // Weight alone would prefer 3→1, but the explicit cost inverts it.
        let transitions = vec![
            Transition::new(GlobalId(3), GlobalId(1), 0.9).with_cost(5.0),
            Transition::new(GlobalId(3), GlobalId(2), 0.1).with_cost(0.5),
        ];
        let graph = TransitionGraph::build(index, nodes, transitions);
        let path = graph.most_probable_path(GlobalId(3), GlobalId(2)).unwrap();
        assert_eq!(path.nodes, vec![GlobalId(3), GlobalId(2)]);
        assert!((path.total_cost - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weight_edge_never_traversed() {
        let index = HierarchyIndex::from_capacities(vec![1, 1]).unwrap();
        let nodes = vec![
            ClusterNode::new(GlobalId(1), 0, 1, 0.0),
            ClusterNode::new(GlobalId(2), 1, 1, 0.0),
        ];
        let transitions = vec![Transition::new(GlobalId(2), GlobalId(1), 0.0)];
        let graph = TransitionGraph::build(index, nodes, transitions);
        assert_eq!(graph.probability(GlobalId(2), GlobalId(1)), Some(0.0));
        assert!(graph.most_probable_path(GlobalId(2), GlobalId(1)).is_none());
        // The record itself survives for display.
        assert!(graph.transition_between(GlobalId(2), GlobalId(1)).is_some());
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let graph = two_tier_graph();
        let pos: Vec<usize> = (0..=6)
            .map(|id| {
                graph
                    .topo_order()
                    .iter()
                    .position(|g| g.0 == id)
                    .unwrap_or(usize::MAX)
            })
            .collect();
        for t in graph.transitions() {
            assert!(
                pos[t.source.0 as usize] < pos[t.target.0 as usize],
                "edge {}→{} out of order",
                t.source,
                t.target
            );
        }
        assert!(!graph.is_partial_order());
    }

    #[test]
    fn test_cyclic_input_degrades_to_partial_order() {
        let index = HierarchyIndex::from_capacities(vec![1, 1]).unwrap();
        let nodes = vec![
            ClusterNode::new(GlobalId(1), 0, 1, 0.0),
            ClusterNode::new(GlobalId(2), 1, 1, 0.0),
        ];
        // 2→1 and 1→2 form a cycle; the build must survive it.
        let transitions = vec![
            Transition::new(GlobalId(2), GlobalId(1), 0.5),
            Transition::new(GlobalId(1), GlobalId(2), 0.5),
        ];
        let graph = TransitionGraph::build(index, nodes, transitions);
        assert!(graph.is_partial_order());
        assert!(graph.topo_order().is_empty());
        // Queries still answer, degraded but without panicking.
        assert_eq!(graph.probability(GlobalId(2), GlobalId(1)), Some(0.0));
    }

    #[test]
    fn test_logsumexp_identities() {
        assert_eq!(logsumexp(f64::NEG_INFINITY, -1.5), -1.5);
        assert_eq!(logsumexp(-1.5, f64::NEG_INFINITY), -1.5);
        let sum = logsumexp((0.3f64).ln(), (0.2f64).ln());
        assert!((sum.exp() - 0.5).abs() < 1e-12);
        // Operands deep below zero must not underflow.
        let deep = logsumexp(-700.0, -700.0);
        assert!((deep - (-700.0 + std::f64::consts::LN_2)).abs() < 1e-9);
    }

    #[test]
    fn test_range_dropped_transition() {
        let index = HierarchyIndex::from_capacities(vec![1, 1]).unwrap();
        let nodes = vec![
            ClusterNode::new(GlobalId(1), 0, 1, 0.0),
            ClusterNode::new(GlobalId(2), 1, 1, 0.0),
        ];
        let transitions = vec![
            Transition::new(GlobalId(2), GlobalId(1), 1.0),
            Transition::new(GlobalId(2), GlobalId(9), 1.0),
        ];
        let graph = TransitionGraph::build(index, nodes, transitions);
        assert_eq!(graph.transition_count(), 1);
        assert!(graph.transition_between(GlobalId(2), GlobalId(9)).is_none());
    }
}
