//! Voxelising adjacency grid.
//!
//! Quantises an input cloud into a sparse uniform grid, accumulates a
//! centroid per occupied voxel, and links each leaf to its occupied
//! 26-neighbourhood. Leaves live in an arena; neighbour and owner
//! references are plain indices, so the cyclic adjacency structure
//! carries no ownership.
//!
//! An optional single-camera transform maps each point to
//! `(x/z, y/z, ln z)` before quantisation so that voxel density stays
//! roughly constant with distance from a single viewpoint. The transform
//! affects key computation only; accumulated centroids stay in world
//! space.

mod leaf;
pub mod normals;

pub use leaf::Leaf;

use std::collections::HashMap;

use crate::core::types::{Point3D, PointCloud, VoxelCoord, VoxelPoint};
use crate::error::{Result, SupervoxelError};

/// Sparse voxel grid with per-leaf adjacency.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    resolution: f32,
    use_single_camera_transform: bool,
    /// Leaf arena in first-touch order. Arena position doubles as the
    /// dense centroid index.
    leaves: Vec<Leaf>,
    /// Cell coordinate to arena index.
    index: HashMap<VoxelCoord, u32>,
}

impl VoxelGrid {
    /// Voxelise a cloud and link the leaf adjacency.
    ///
    /// Non-finite points are skipped. When `use_input_normals` is set and
    /// the cloud carries a normal channel, per-point normals are averaged
    /// into the leaves; otherwise leaf normals stay zero for a later
    /// estimation pass.
    ///
    /// With the single-camera transform enabled, a point with negative
    /// depth is a precondition violation.
    pub fn build(
        cloud: &PointCloud,
        resolution: f32,
        use_single_camera_transform: bool,
        use_input_normals: bool,
    ) -> Result<Self> {
        let mut grid = Self {
            resolution,
            use_single_camera_transform,
            leaves: Vec::new(),
            index: HashMap::new(),
        };

        for (i, &position) in cloud.positions.iter().enumerate() {
            if !position.is_finite() {
                continue;
            }
            if use_single_camera_transform && position.z < 0.0 {
                return Err(SupervoxelError::NegativeDepth {
                    index: i,
                    z: position.z,
                });
            }
            let coord = match grid.voxel_coord(position) {
                Some(coord) => coord,
                None => continue,
            };

            let leaf_idx = match grid.index.get(&coord) {
                Some(&idx) => idx,
                None => {
                    let idx = grid.leaves.len() as u32;
                    grid.leaves.push(Leaf::new(coord));
                    grid.index.insert(coord, idx);
                    idx
                }
            };

            let normal = if use_input_normals {
                cloud.normal_at(i)
            } else {
                None
            };
            grid.leaves[leaf_idx as usize].add_point(position, cloud.color_at(i), normal);
        }

        for leaf in &mut grid.leaves {
            leaf.finalize();
        }
        grid.link_neighbors();

        Ok(grid)
    }

    /// Cell coordinate for a point, applying the camera transform when
    /// enabled. None if the (transformed) coordinates are not finite.
    fn voxel_coord(&self, p: Point3D) -> Option<VoxelCoord> {
        let q = if self.use_single_camera_transform {
            Point3D::new(p.x / p.z, p.y / p.z, p.z.ln())
        } else {
            p
        };
        if !q.is_finite() {
            return None;
        }
        Some(VoxelCoord::from_point(q, self.resolution))
    }

    /// Arena index of the leaf containing a point, if any.
    pub fn leaf_index_at(&self, p: Point3D) -> Option<u32> {
        if !p.is_finite() {
            return None;
        }
        if self.use_single_camera_transform && p.z < 0.0 {
            return None;
        }
        let coord = self.voxel_coord(p)?;
        self.index.get(&coord).copied()
    }

    /// Populate every leaf's neighbour list with the occupied cells whose
    /// coordinates differ by at most one in each axis.
    ///
    /// Adjacency is symmetric by construction: both endpoints find each
    /// other through the same membership test.
    fn link_neighbors(&mut self) {
        for i in 0..self.leaves.len() {
            let coord = self.leaves[i].coord;
            let mut neighbors = Vec::new();
            for neighbor_coord in coord.neighbors_26() {
                if let Some(&j) = self.index.get(&neighbor_coord) {
                    neighbors.push(j);
                }
            }
            self.leaves[i].neighbors = neighbors;
        }
    }

    /// Number of occupied voxels.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the grid holds no voxels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Voxel resolution in meters.
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Borrow a leaf by arena index.
    #[inline]
    pub fn leaf(&self, index: u32) -> &Leaf {
        &self.leaves[index as usize]
    }

    /// Mutably borrow a leaf by arena index.
    #[inline]
    pub fn leaf_mut(&mut self, index: u32) -> &mut Leaf {
        &mut self.leaves[index as usize]
    }

    /// All leaves in arena order.
    #[inline]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Materialise the dense centroid cloud, indexed by arena position.
    pub fn centroid_cloud(&self) -> Vec<VoxelPoint> {
        self.leaves.iter().map(|leaf| leaf.centroid).collect()
    }
}
