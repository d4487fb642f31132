//! # stratus-rs — Hierarchical Climate-State Transition Graph Engine
//!
//! The analytics and spatial-binding core behind a climate-state cluster
//! visualization: a multi-level DAG of cluster nodes, rendered externally as
//! a vector image, queried interactively for transition probabilities and
//! most-probable paths.
//!
//! ## Design Principles
//!
//! 1. **Capacity table is the source of truth**: global ids and
//!    `(level, local_index)` pairs are two views of one address space
//! 2. **Clean DTOs**: `ClusterNode`, `Transition`, `TransitionPath` cross
//!    all boundaries, validated once at ingest
//! 3. **Queries degrade, builds reject**: malformed input fails the load;
//!    an unanswerable query returns a sentinel, never an error
//! 4. **No hidden caches**: all derived state lives in a rebuildable
//!    snapshot owned by the [`Atlas`] handle, guarded by a generation id
//!
//! ## Quick Start
//!
//! ```rust
//! use stratus_rs::{Atlas, ClusterNode, GlobalId, HierarchyIndex, Transition, TransitionGraph};
//!
//! # fn example() -> stratus_rs::Result<()> {
//! // Capacities [3, 2, 1]: level 0 = {1,2,3}, level 1 = {4,5}, level 2 = {6}.
//! let index = HierarchyIndex::from_capacities(vec![3, 2, 1])?;
//! let nodes: Vec<ClusterNode> = (0..3)
//!     .map(|i| ClusterNode::new(GlobalId(i + 1), 0, i + 1, 0.0))
//!     .chain((0..2).map(|i| ClusterNode::new(GlobalId(i + 4), 1, i + 1, 0.0)))
//!     .chain(std::iter::once(ClusterNode::new(GlobalId(6), 2, 1, 0.0)))
//!     .collect();
//! let transitions = vec![
//!     Transition::new(GlobalId(6), GlobalId(4), 0.6),
//!     Transition::new(GlobalId(6), GlobalId(5), 0.4),
//!     Transition::new(GlobalId(4), GlobalId(2), 0.3),
//!     Transition::new(GlobalId(5), GlobalId(2), 0.5),
//! ];
//!
//! let atlas = Atlas::new();
//! let ticket = atlas.begin_load();
//! atlas.install_graph(ticket, TransitionGraph::build(index, nodes, transitions));
//!
//! // 0.6·0.3 + 0.4·0.5
//! let p = atlas.probability(GlobalId(6), GlobalId(2)).unwrap();
//! assert!((p - 0.38).abs() < 1e-9);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod analytics;
pub mod dataset;
pub mod index;
pub mod model;
pub mod spatial;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{ClusterNode, GlobalId, Transition, TransitionPath};

// ============================================================================
// Re-exports: Engines
// ============================================================================

pub use analytics::TransitionGraph;
pub use dataset::Dataset;
pub use index::HierarchyIndex;
pub use spatial::{
    BindingConfig, BindingMap, BoundEntity, Point, ShapeElement, ShapeRef, SpatialBinder,
};

// ============================================================================
// Top-level Atlas handle
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

/// The primary entry point. An `Atlas` owns the current dataset snapshot
/// (analytics model plus optional binding map) and replaces it wholesale on
/// every load.
///
/// There is no incremental update path. A load begins with
/// [`Atlas::begin_load`], which supersedes every earlier ticket; a build
/// installed with a superseded ticket is dropped, so a late-arriving result
/// from an abandoned fetch can never overwrite a newer dataset.
pub struct Atlas {
    inner: Arc<AtlasInner>,
}

struct AtlasInner {
    generation: AtomicU64,
    current: RwLock<Option<Snapshot>>,
}

struct Snapshot {
    generation: u64,
    graph: Arc<TransitionGraph>,
    bindings: Option<Arc<BindingMap>>,
}

/// Handle for one load attempt, issued by [`Atlas::begin_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl Atlas {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtlasInner {
                generation: AtomicU64::new(0),
                current: RwLock::new(None),
            }),
        }
    }

    /// Start a load. Supersedes all previously issued tickets.
    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Install a freshly built analytics model, discarding the previous
    /// snapshot entirely, bindings included; they belong to the old image.
    ///
    /// Returns `false` and installs nothing when the ticket has been
    /// superseded by a later [`Atlas::begin_load`].
    pub fn install_graph(&self, ticket: LoadTicket, graph: TransitionGraph) -> bool {
        let mut current = self.inner.current.write();
        if ticket.0 != self.inner.generation.load(Ordering::SeqCst) {
            debug!(ticket = ticket.0, "stale graph build dropped");
            return false;
        }
        *current = Some(Snapshot {
            generation: ticket.0,
            graph: Arc::new(graph),
            bindings: None,
        });
        true
    }

    /// Attach a binding map to the snapshot installed under the same ticket.
    /// Replaces any previous bindings in full.
    pub fn install_bindings(&self, ticket: LoadTicket, bindings: BindingMap) -> bool {
        let mut current = self.inner.current.write();
        match current.as_mut() {
            Some(snapshot)
                if snapshot.generation == ticket.0
                    && ticket.0 == self.inner.generation.load(Ordering::SeqCst) =>
            {
                snapshot.bindings = Some(Arc::new(bindings));
                true
            }
            _ => {
                debug!(ticket = ticket.0, "stale binding map dropped");
                false
            }
        }
    }

    /// Drop the current snapshot and supersede outstanding tickets.
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *self.inner.current.write() = None;
    }

    // ========================================================================
    // Snapshot access
    // ========================================================================

    pub fn graph(&self) -> Option<Arc<TransitionGraph>> {
        self.inner.current.read().as_ref().map(|s| s.graph.clone())
    }

    pub fn bindings(&self) -> Option<Arc<BindingMap>> {
        self.inner.current.read().as_ref().and_then(|s| s.bindings.clone())
    }

    /// Generation id of the installed snapshot, if any.
    pub fn generation(&self) -> Option<u64> {
        self.inner.current.read().as_ref().map(|s| s.generation)
    }

    /// Counts for display layers; `None` while no dataset is loaded.
    pub fn stats(&self) -> Option<AtlasStats> {
        let current = self.inner.current.read();
        let snapshot = current.as_ref()?;
        Some(AtlasStats {
            generation: snapshot.generation,
            nodes: snapshot.graph.node_count(),
            transitions: snapshot.graph.transition_count(),
            partial_order: snapshot.graph.is_partial_order(),
            bound_nodes: snapshot.bindings.as_ref().map_or(0, |b| b.bound_nodes()),
            bound_edges: snapshot.bindings.as_ref().map_or(0, |b| b.bound_edges()),
            bound_arrows: snapshot.bindings.as_ref().map_or(0, |b| b.bound_arrows()),
        })
    }

    // ========================================================================
    // Query passthrough
    // ========================================================================

    /// [`TransitionGraph::probability`] against the current snapshot;
    /// `None` while no dataset is loaded.
    pub fn probability(&self, source: GlobalId, target: GlobalId) -> Option<f64> {
        self.graph()?.probability(source, target)
    }

    /// [`TransitionGraph::most_probable_path`] against the current snapshot.
    pub fn most_probable_path(
        &self,
        source: GlobalId,
        target: GlobalId,
    ) -> Option<TransitionPath> {
        self.graph()?.most_probable_path(source, target)
    }
}

impl Default for Atlas {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot counts exposed to display layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasStats {
    pub generation: u64,
    pub nodes: usize,
    pub transitions: usize,
    pub partial_order: bool,
    pub bound_nodes: usize,
    pub bound_edges: usize,
    pub bound_arrows: usize,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("level {level} out of range: hierarchy has {levels} levels")]
    LevelOutOfRange { level: u32, levels: u32 },

    #[error("local index {local} out of range [1, {capacity}] at level {level}")]
    LocalIndexOutOfRange { level: u32, local: u32, capacity: u32 },

    #[error("global id {id} out of range [1, {total}]")]
    GlobalIdOutOfRange { id: u32, total: u32 },

    #[error("capacity table is empty")]
    EmptyCapacityTable,

    #[error("malformed node record: {0}")]
    MalformedNode(String),

    #[error("malformed transition record: {0}")]
    MalformedTransition(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
