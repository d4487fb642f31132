//! # Transition Graph Model
//!
//! Clean DTOs for the climate-state cluster hierarchy. These types cross
//! every boundary: ingest ↔ analytics ↔ spatial binding ↔ user.
//!
//! Design rule: this module is pure data — no I/O, no caches, no state.
//! Records are validated at the ingest boundary and immutable afterwards.

pub mod node;
pub mod path;
pub mod transition;

pub use node::{ClusterNode, GlobalId};
pub use path::TransitionPath;
pub use transition::Transition;
