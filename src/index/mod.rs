//! Hierarchical index — bijection between flat global ids and
//! `(level, local_index)` pairs.
//!
//! The global id space is 1-based and contiguous, ordered ascending first by
//! level and then by local index within the level. All conversions are driven
//! by an ordered capacity table `capacity[0..max_level]`, where
//! `capacity[0]` counts the terminal/observed classes.
//!
//! Out-of-range inputs are programming or data errors and return
//! [`Error`](crate::Error) variants; use [`HierarchyIndex::validate_global`]
//! for the non-throwing audit of externally supplied triples.

pub mod media;

use serde::{Deserialize, Serialize};

use crate::model::GlobalId;
use crate::{Error, Result};

/// Capacity-table-driven id translator.
///
/// Construction precomputes the per-level offsets, so every conversion is a
/// table lookup plus an addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyIndex {
    capacities: Vec<u32>,
    /// `offsets[l]` = number of nodes on all levels below `l`.
    offsets: Vec<u32>,
    total: u32,
}

impl HierarchyIndex {
    /// Build an index from per-level node counts, index 0 = terminal classes.
    pub fn from_capacities(capacities: Vec<u32>) -> Result<Self> {
        if capacities.is_empty() {
            return Err(Error::EmptyCapacityTable);
        }
        let mut offsets = Vec::with_capacity(capacities.len());
        let mut running = 0u32;
        for &cap in &capacities {
            offsets.push(running);
            running += cap;
        }
        Ok(Self {
            capacities,
            offsets,
            total: running,
        })
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    /// `(level, local_index)` → global id: `offset(level) + local_index`.
    pub fn global_from_level(&self, level: u32, local_index: u32) -> Result<GlobalId> {
        let capacity = self.capacity(level)?;
        if local_index < 1 || local_index > capacity {
            return Err(Error::LocalIndexOutOfRange {
                level,
                local: local_index,
                capacity,
            });
        }
        Ok(GlobalId(self.offsets[level as usize] + local_index))
    }

    /// Global id → `(level, local_index)`. Inverse of [`Self::global_from_level`].
    pub fn level_and_local(&self, id: GlobalId) -> Result<(u32, u32)> {
        if id.0 < 1 || id.0 > self.total {
            return Err(Error::GlobalIdOutOfRange {
                id: id.0,
                total: self.total,
            });
        }
        // Levels are few (tens at most): a linear scan over the offset table
        // beats a binary search on real inputs.
        let mut level = self.capacities.len() - 1;
        while self.offsets[level] >= id.0 {
            level -= 1;
        }
        Ok((level as u32, id.0 - self.offsets[level]))
    }

    /// Non-throwing consistency audit of an externally supplied triple.
    pub fn validate_global(&self, id: GlobalId, level: u32, local_index: u32) -> bool {
        match self.global_from_level(level, local_index) {
            Ok(expected) => expected == id,
            Err(_) => false,
        }
    }

    // ========================================================================
    // Capacity accessors
    // ========================================================================

    /// Number of hierarchy levels.
    pub fn num_levels(&self) -> u32 {
        self.capacities.len() as u32
    }

    /// Node count at `level`.
    pub fn num_nodes_at_level(&self, level: u32) -> Result<u32> {
        self.capacity(level)
    }

    /// All global ids at `level`, ascending.
    pub fn global_ids_for_level(&self, level: u32) -> Result<Vec<GlobalId>> {
        let capacity = self.capacity(level)?;
        let offset = self.offsets[level as usize];
        Ok((1..=capacity).map(|local| GlobalId(offset + local)).collect())
    }

    /// Total node count across all levels.
    pub fn total_nodes(&self) -> u32 {
        self.total
    }

    /// True when `id` falls inside the addressable range `[1, total]`.
    pub fn contains(&self, id: GlobalId) -> bool {
        id.0 >= 1 && id.0 <= self.total
    }

    fn capacity(&self, level: u32) -> Result<u32> {
        self.capacities
            .get(level as usize)
            .copied()
            .ok_or(Error::LevelOutOfRange {
                level,
                levels: self.num_levels(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index() -> HierarchyIndex {
        HierarchyIndex::from_capacities(vec![3, 2, 1]).unwrap()
    }

    #[test]
    fn test_global_from_level() {
        let idx = index();
        assert_eq!(idx.global_from_level(0, 1).unwrap(), GlobalId(1));
        assert_eq!(idx.global_from_level(0, 3).unwrap(), GlobalId(3));
        assert_eq!(idx.global_from_level(1, 1).unwrap(), GlobalId(4));
        assert_eq!(idx.global_from_level(1, 2).unwrap(), GlobalId(5));
        assert_eq!(idx.global_from_level(2, 1).unwrap(), GlobalId(6));
    }

    #[test]
    fn test_level_and_local_inverse() {
        let idx = index();
        for level in 0..idx.num_levels() {
            for local in 1..=idx.num_nodes_at_level(level).unwrap() {
                let id = idx.global_from_level(level, local).unwrap();
                assert_eq!(idx.level_and_local(id).unwrap(), (level, local));
            }
        }
    }

    #[test]
    fn test_out_of_range_errors() {
        let idx = index();
        assert!(idx.global_from_level(3, 1).is_err());
        assert!(idx.global_from_level(0, 0).is_err());
        assert!(idx.global_from_level(0, 4).is_err());
        assert!(idx.level_and_local(GlobalId(0)).is_err());
        assert!(idx.level_and_local(GlobalId(7)).is_err());
    }

    #[test]
    fn test_validate_global() {
        let idx = index();
        assert!(idx.validate_global(GlobalId(4), 1, 1));
        assert!(!idx.validate_global(GlobalId(4), 0, 1));
        assert!(!idx.validate_global(GlobalId(99), 5, 1));
    }

    #[test]
    fn test_level_accessors() {
        let idx = index();
        assert_eq!(idx.total_nodes(), 6);
        assert_eq!(
            idx.global_ids_for_level(1).unwrap(),
            vec![GlobalId(4), GlobalId(5)]
        );
        assert!(idx.global_ids_for_level(3).is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(HierarchyIndex::from_capacities(vec![]).is_err());
    }

    #[test]
    fn test_zero_capacity_level() {
        // A level with zero clusters is legal; it simply owns no ids.
        let idx = HierarchyIndex::from_capacities(vec![2, 0, 1]).unwrap();
        assert_eq!(idx.global_from_level(2, 1).unwrap(), GlobalId(3));
        assert!(idx.global_from_level(1, 1).is_err());
        assert_eq!(idx.level_and_local(GlobalId(3)).unwrap(), (2, 1));
    }
}
