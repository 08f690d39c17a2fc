//! Per-voxel leaf record: point accumulation, centroid, adjacency, ownership.

use crate::core::types::{Point3D, Rgb, VoxelCoord, VoxelPoint};

/// The record for one occupied voxel.
///
/// Neighbour and owner references are arena indices: neighbours index the
/// grid's leaf arena, the owner indexes the helper arena. `distance` is
/// finite exactly when `owner` is set.
#[derive(Debug, Clone)]
pub struct Leaf {
    /// Integer cell coordinate this leaf occupies.
    pub coord: VoxelCoord,

    /// Aggregated voxel state, valid after [`Leaf::finalize`].
    pub centroid: VoxelPoint,

    /// Arena indices of the up-to-26 adjacent occupied voxels.
    pub neighbors: Vec<u32>,

    /// Helper slot currently owning this voxel, if any.
    pub owner: Option<u32>,

    /// Best weighted distance to the owning helper's centroid.
    pub distance: f32,

    position_sum: Point3D,
    rgb_sum: [f32; 3],
    normal_sum: Point3D,
    num_normals: u32,
    num_points: u32,
}

impl Leaf {
    /// Create an empty leaf for the given cell.
    pub fn new(coord: VoxelCoord) -> Self {
        Self {
            coord,
            centroid: VoxelPoint::default(),
            neighbors: Vec::new(),
            owner: None,
            distance: f32::INFINITY,
            position_sum: Point3D::ZERO,
            rgb_sum: [0.0; 3],
            normal_sum: Point3D::ZERO,
            num_normals: 0,
            num_points: 0,
        }
    }

    /// Accumulate one input point into this voxel.
    pub fn add_point(&mut self, position: Point3D, color: Option<Rgb>, normal: Option<Point3D>) {
        self.position_sum = self.position_sum + position;
        if let Some(c) = color {
            self.rgb_sum[0] += c.r as f32;
            self.rgb_sum[1] += c.g as f32;
            self.rgb_sum[2] += c.b as f32;
        }
        if let Some(n) = normal {
            self.normal_sum = self.normal_sum + n;
            self.num_normals += 1;
        }
        self.num_points += 1;
    }

    /// Finalise the centroid as the running mean of the accumulated points.
    ///
    /// Averaged normals are renormalised; when no input normals were seen
    /// the normal stays zero for the estimation pass to fill in.
    pub fn finalize(&mut self) {
        if self.num_points == 0 {
            return;
        }
        let inv = 1.0 / self.num_points as f32;
        self.centroid.position = self.position_sum * inv;
        self.centroid.rgb = [
            self.rgb_sum[0] * inv,
            self.rgb_sum[1] * inv,
            self.rgb_sum[2] * inv,
        ];
        if self.num_normals > 0 {
            self.centroid.normal = self.normal_sum.normalize();
        }
    }

    /// Number of input points accumulated into this voxel.
    #[inline]
    pub fn num_points(&self) -> u32 {
        self.num_points
    }
}
