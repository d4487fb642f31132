//! Media asset naming helpers.
//!
//! Pure derived mappings from node coordinates to the asset files the
//! display layer plays or shows. Exposed here so collaborators never
//! re-derive level/local coordinates themselves.

use crate::model::GlobalId;
use crate::Result;

use super::HierarchyIndex;

/// Filename of the animation rendered for a cluster above the terminal tier.
pub fn cluster_video_filename(level: u32, local_index: u32) -> String {
    format!("videos/level{level}_cluster{local_index}.mp4")
}

/// Terminal classes have no animation; a static placeholder stands in.
pub fn class_placeholder_filename(local_index: u32) -> String {
    format!("placeholders/class{local_index}.png")
}

/// Resolve the display asset for a node by global id: placeholder image for
/// terminal classes, cluster video otherwise.
pub fn media_asset(index: &HierarchyIndex, id: GlobalId) -> Result<String> {
    let (level, local) = index.level_and_local(id)?;
    Ok(if level == 0 {
        class_placeholder_filename(local)
    } else {
        cluster_video_filename(level, local)
    })
}
