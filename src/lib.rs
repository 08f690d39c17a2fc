//! SamuhaSegment - Supervoxel clustering for 3D point clouds
//!
//! Partitions an unordered point cloud carrying position, colour and
//! (optionally) normal attributes into compact, locally coherent
//! clusters called supervoxels. The cloud is quantised into a uniform
//! voxel grid; clusters then grow outward from seed voxels under a
//! combined spatial/colour/normal distance, competing for voxels over
//! the grid's adjacency links.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │       (helpers, clustering API, adjacency)          │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌──────────────────────────────┬──────────────────────┐
//! │            grid/             │       seeding/       │  ← Algorithms
//! │  (voxelisation, adjacency,   │   (seed placement,   │
//! │    normal estimation)        │    shift, pruning)   │
//! └──────────────────────────────┴──────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                 (types, math)                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Pipeline
//!
//! 1. Voxelise the input cloud at the voxel resolution, optionally
//!    through the single-camera `(x/z, y/z, ln z)` transform
//! 2. Link each occupied voxel to its occupied 26-neighbourhood
//! 3. Estimate per-voxel normals and curvature from the 2-ring
//! 4. Place seeds on a coarser grid, shift them onto flat terrain,
//!    prune crowded ones
//! 5. Grow one cluster per seed: rounds of strict-improvement stealing
//!    over the adjacency links, re-centroiding after every round
//! 6. Assemble supervoxels, label clouds and cluster adjacency
//!
//! An optional refinement pass re-estimates normals within each grown
//! cluster, restarts every cluster from its centroid-nearest voxel and
//! grows again.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depend on core)
// ============================================================================
pub mod grid;
pub mod seeding;

// ============================================================================
// Layer 3: Engine (depends on core, grid, seeding)
// ============================================================================
pub mod engine;

pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::types::{
    ColoredPoint, LabeledPoint, Point3D, PointCloud, Rgb, VoxelCoord, VoxelPoint,
};

// Grid
pub use grid::VoxelGrid;

// Engine
pub use engine::{
    supervoxel_normal_cloud, AdjacencyEdge, AdjacencyGraph, LabelAdjacency, Supervoxel,
    SupervoxelClustering, SupervoxelConfig, SupervoxelMap,
};

// Errors
pub use error::{Result, SupervoxelError};
