//! Orchestration layer: growth helpers, the clustering engine and its
//! output structures.

mod adjacency;
mod clustering;
mod helper;
mod supervoxel;

pub use adjacency::{AdjacencyEdge, AdjacencyGraph, LabelAdjacency};
pub use clustering::{SupervoxelClustering, SupervoxelConfig};
pub use supervoxel::{supervoxel_normal_cloud, Supervoxel, SupervoxelMap};
