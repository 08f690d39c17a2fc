//! Error types for supervoxel segmentation.

use thiserror::Error;

/// Errors reported by the segmentation engine.
///
/// Only precondition violations surface as errors; out-of-order API use
/// (extracting without an input cloud, refining before extracting) is
/// logged as a warning and yields an empty result instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupervoxelError {
    #[error("voxel resolution must be positive, got {0}")]
    InvalidVoxelResolution(f32),

    #[error("seed resolution ({seed}) must exceed voxel resolution ({voxel})")]
    InvalidSeedResolution { voxel: f32, seed: f32 },

    #[error("point {index} has depth z={z} but the single-camera transform requires z >= 0")]
    NegativeDepth { index: usize, z: f32 },
}

pub type Result<T> = std::result::Result<T, SupervoxelError>;
