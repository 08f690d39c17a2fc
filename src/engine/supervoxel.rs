//! Supervoxel output summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::VoxelPoint;

/// One extracted supervoxel: its aggregate centroid and the centroids of
/// its member voxels, in the order the growth engine acquired them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Supervoxel {
    /// Mean of the member voxel centroids.
    pub centroid: VoxelPoint,
    /// Member voxel centroids in acquisition order.
    pub voxels: Vec<VoxelPoint>,
}

impl Supervoxel {
    /// Number of member voxels.
    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    /// Whether the supervoxel holds no voxels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }
}

/// Extraction result: label to supervoxel, sorted by label.
pub type SupervoxelMap = BTreeMap<u32, Supervoxel>;

/// One centroid point (position, normal, curvature) per supervoxel, in
/// label order.
pub fn supervoxel_normal_cloud(supervoxels: &SupervoxelMap) -> Vec<VoxelPoint> {
    supervoxels.values().map(|sv| sv.centroid).collect()
}
