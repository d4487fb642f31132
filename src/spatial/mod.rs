//! Spatial binding engine — correlates rendered shapes with graph entities.
//!
//! The rendered vector image carries no identifiers, so the correspondence
//! between its shapes and the node/transition records is established purely
//! by shape and position:
//!
//! - node glyphs bind by scan order (see the ordering contract below) and
//!   contribute their bounding-box centroid as the node position;
//! - edge segments bind each endpoint to the nearest node position within a
//!   distance threshold, then must pass the hierarchy consistency check and
//!   correlate with an actual transition record;
//! - arrowheads are cosmetic and greedily claim the nearest unclaimed edge
//!   endpoint, each arrow consumable at most once.
//!
//! # Ordering contract
//!
//! Node shapes are assumed to appear in the image's scan order in exactly
//! ascending order of global id. This is an external protocol between the
//! data producer and the renderer, not a choice made here; violating it
//! silently misassigns every node, so the assumption is enforced as far as
//! it can be (count mismatches are logged) and is independently testable via
//! [`SpatialBinder::node_positions`].
//!
//! Every failure in this module is tolerated and logged: an unbindable shape
//! is simply excluded from the map, and the visualization renders with
//! partial interactivity.

pub mod geometry;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::TransitionGraph;
use crate::model::GlobalId;

pub use geometry::{path_coordinates, BoundingBox, Point};

// ============================================================================
// Shapes
// ============================================================================

/// A parsed geometric path element: a bag of image-space coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    points: Vec<Point>,
}

impl ShapeElement {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Parse a raw SVG path-data string.
    pub fn from_path_data(d: &str) -> Self {
        Self {
            points: path_coordinates(d),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Bounding-box centroid, robust regardless of the curve and arc
    /// commands used to draw the glyph.
    pub fn centroid(&self) -> Option<Point> {
        BoundingBox::of(&self.points).map(|bb| bb.centroid())
    }

    /// Interpret the shape as a two-point segment.
    pub fn segment(&self) -> Option<(Point, Point)> {
        match (self.points.first(), self.points.last()) {
            (Some(&start), Some(&end)) if self.points.len() >= 2 => Some((start, end)),
            _ => None,
        }
    }
}

/// Reference to a shape by kind and position in its input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeRef {
    Node(usize),
    Edge(usize),
    Arrow(usize),
}

/// The graph entity a shape resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundEntity {
    Node(GlobalId),
    Transition { source: GlobalId, target: GlobalId },
}

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the binding pass.
#[derive(Debug, Clone)]
pub struct BindingConfig {
    /// Maximum distance, in image units, between an edge endpoint (or an
    /// arrowhead) and the node position (or endpoint) it binds to.
    pub bind_radius: f64,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self { bind_radius: 30.0 }
    }
}

// ============================================================================
// Binding map
// ============================================================================

/// The bidirectional shape ⇄ entity correspondence for one rendered image.
///
/// Purely derived data: rebuilt in full whenever a new image or dataset
/// loads, never partially mutated.
#[derive(Debug, Clone, Default)]
pub struct BindingMap {
    by_shape: HashMap<ShapeRef, BoundEntity>,
    node_to_shape: HashMap<GlobalId, usize>,
    transition_to_shape: HashMap<(GlobalId, GlobalId), usize>,
    /// Arrow shape index → the edge shape index it decorates.
    arrow_to_edge: HashMap<usize, usize>,
}

impl BindingMap {
    /// Entity a shape resolved to, if it bound at all.
    pub fn entity_for(&self, shape: ShapeRef) -> Option<BoundEntity> {
        self.by_shape.get(&shape).copied()
    }

    /// Node-shape index for a node id (highlighting direction).
    pub fn shape_for_node(&self, id: GlobalId) -> Option<usize> {
        self.node_to_shape.get(&id).copied()
    }

    /// Edge-shape index for a resolved transition.
    pub fn shape_for_transition(&self, source: GlobalId, target: GlobalId) -> Option<usize> {
        self.transition_to_shape.get(&(source, target)).copied()
    }

    /// The edge shape an arrowhead decorates.
    pub fn edge_for_arrow(&self, arrow: usize) -> Option<usize> {
        self.arrow_to_edge.get(&arrow).copied()
    }

    pub fn bound_nodes(&self) -> usize {
        self.node_to_shape.len()
    }

    pub fn bound_edges(&self) -> usize {
        self.transition_to_shape.len()
    }

    pub fn bound_arrows(&self) -> usize {
        self.arrow_to_edge.len()
    }
}

// ============================================================================
// Binder
// ============================================================================

/// One-shot binding pass over the shape lists of a rendered image.
pub struct SpatialBinder<'g> {
    graph: &'g TransitionGraph,
    config: BindingConfig,
}

impl<'g> SpatialBinder<'g> {
    pub fn new(graph: &'g TransitionGraph) -> Self {
        Self {
            graph,
            config: BindingConfig::default(),
        }
    }

    pub fn with_config(graph: &'g TransitionGraph, config: BindingConfig) -> Self {
        Self { graph, config }
    }

    /// Assign node positions by scan order (see the module-level ordering
    /// contract): the i-th node shape is the node with global id `i + 1`.
    ///
    /// Degenerate shapes keep their slot in the ordering but contribute no
    /// position. Shapes beyond the hierarchy's node count are ignored.
    pub fn node_positions(&self, node_shapes: &[ShapeElement]) -> Vec<(GlobalId, Point)> {
        let total = self.graph.index().total_nodes() as usize;
        if node_shapes.len() != total {
            warn!(
                shapes = node_shapes.len(),
                nodes = total,
                "node shape count disagrees with hierarchy; scan-order binding may misassign"
            );
        }

        let mut positions = Vec::with_capacity(node_shapes.len().min(total));
        for (i, shape) in node_shapes.iter().take(total).enumerate() {
            let id = GlobalId(i as u32 + 1);
            match shape.centroid() {
                Some(p) => positions.push((id, p)),
                None => warn!(id = id.0, "node shape has no coordinates; skipped"),
            }
        }
        positions
    }

    /// Run the full binding pass.
    pub fn bind(
        &self,
        node_shapes: &[ShapeElement],
        edge_shapes: &[ShapeElement],
        arrow_shapes: &[ShapeElement],
    ) -> BindingMap {
        let mut map = BindingMap::default();

        // --- Nodes: scan order ⇒ ascending global id -----------------------
        let positions = self.node_positions(node_shapes);
        for &(id, _) in &positions {
            let shape_idx = id.0 as usize - 1;
            map.by_shape.insert(ShapeRef::Node(shape_idx), BoundEntity::Node(id));
            map.node_to_shape.insert(id, shape_idx);
        }

        // --- Edges: nearest-neighbor endpoints + consistency ---------------
        // Bound endpoints double as arrowhead anchor candidates below.
        let mut endpoints: Vec<(usize, Point)> = Vec::new();

        for (i, shape) in edge_shapes.iter().enumerate() {
            let Some((start, end)) = shape.segment() else {
                warn!(edge = i, "edge shape is not a segment; skipped");
                continue;
            };
            let Some(source) = self.nearest_node(&positions, start) else {
                warn!(edge = i, "no node within bind radius of segment start; skipped");
                continue;
            };
            let Some(target) = self.nearest_node(&positions, end) else {
                warn!(edge = i, "no node within bind radius of segment end; skipped");
                continue;
            };

            // A resolved pair whose levels do not differ by exactly one is a
            // spatial mis-binding (too-generous threshold), not data.
            let src_level = self.graph.index().level_and_local(source).map(|(l, _)| l);
            let dst_level = self.graph.index().level_and_local(target).map(|(l, _)| l);
            match (src_level, dst_level) {
                (Ok(s), Ok(t)) if s == t + 1 => {}
                _ => {
                    warn!(
                        edge = i,
                        source = source.0,
                        target = target.0,
                        "resolved edge fails hierarchy consistency; discarded"
                    );
                    continue;
                }
            }

            if self.graph.transition_between(source, target).is_none() {
                warn!(
                    edge = i,
                    source = source.0,
                    target = target.0,
                    "no transition record for resolved edge; skipped"
                );
                continue;
            }

            map.by_shape
                .insert(ShapeRef::Edge(i), BoundEntity::Transition { source, target });
            map.transition_to_shape.insert((source, target), i);
            endpoints.push((i, start));
            endpoints.push((i, end));
        }

        // --- Arrowheads: greedy nearest unclaimed endpoint -----------------
        let mut claimed = vec![false; endpoints.len()];
        for (i, arrow) in arrow_shapes.iter().enumerate() {
            let Some(tip) = arrow.centroid() else { continue };
            let mut best: Option<(usize, f64)> = None;
            for (slot, &(_, p)) in endpoints.iter().enumerate() {
                if claimed[slot] {
                    continue;
                }
                let dist = tip.distance_to(p);
                if dist <= self.config.bind_radius
                    && best.is_none_or(|(_, d)| dist < d)
                {
                    best = Some((slot, dist));
                }
            }
            match best {
                Some((slot, _)) => {
                    claimed[slot] = true;
                    let edge_idx = endpoints[slot].0;
                    map.arrow_to_edge.insert(i, edge_idx);
                    if let Some(entity) = map.entity_for(ShapeRef::Edge(edge_idx)) {
                        map.by_shape.insert(ShapeRef::Arrow(i), entity);
                    }
                }
                None => {
                    warn!(arrow = i, "no unclaimed edge endpoint within bind radius");
                }
            }
        }

        debug!(
            nodes = map.bound_nodes(),
            edges = map.bound_edges(),
            arrows = map.bound_arrows(),
            "binding pass complete"
        );
        map
    }

    /// Nearest node position within the bind radius, by Euclidean distance.
    /// This is the endpoint-resolution step of the binding pass, exposed so
    /// the matching behavior is testable in isolation.
    pub fn nearest_node(&self, positions: &[(GlobalId, Point)], p: Point) -> Option<GlobalId> {
        let mut best: Option<(GlobalId, f64)> = None;
        for &(id, pos) in positions {
            let dist = p.distance_to(pos);
            if dist <= self.config.bind_radius && best.is_none_or(|(_, d)| dist < d) {
                best = Some((id, dist));
            }
        }
        best.map(|(id, _)| id)
    }
}

// ============================================================================
// Tests
// ============================================================================
