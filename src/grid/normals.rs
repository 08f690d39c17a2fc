//! Normal and curvature estimation over the voxel grid.
//!
//! Each voxel's normal is fitted to the centroids of its 2-ring
//! neighbourhood (the leaf, its neighbours, and their neighbours).
//! Plane fitting uses only positions, so every leaf sees the same
//! snapshot of the centroid cloud regardless of update order.

use crate::core::math::{fit_plane, flip_normal_towards_viewpoint};
use crate::core::types::Point3D;
use crate::grid::VoxelGrid;

/// The 2-ring of a voxel at full occupancy: 1 + 26 + 26*2 on average;
/// matches the reservation the fit index buffer starts from.
const TYPICAL_RING_SIZE: usize = 81;

/// Estimate a normal and curvature for every leaf in the grid.
///
/// Gathered 2-ring indices may repeat where neighbourhoods overlap; the
/// repeats weight the fit toward the local core, and the contributor
/// count used for the minimum-sample check includes them. Leaves whose
/// fit fails (too few contributors, degenerate covariance) keep a zero
/// normal and zero curvature. Normals are oriented toward the origin.
pub fn estimate_normals(grid: &mut VoxelGrid) {
    let snapshot = grid.centroid_cloud();
    let mut indices: Vec<u32> = Vec::with_capacity(TYPICAL_RING_SIZE);

    for i in 0..grid.len() as u32 {
        indices.clear();
        gather_two_ring(grid, i, &mut indices);

        let (normal, curvature) = match fit_plane(&snapshot, &indices) {
            Some(fit) => {
                let position = snapshot[i as usize].position;
                let oriented = flip_normal_towards_viewpoint(fit.normal, position, Point3D::ZERO);
                (oriented, fit.curvature)
            }
            None => (Point3D::ZERO, 0.0),
        };

        let centroid = &mut grid.leaf_mut(i).centroid;
        centroid.normal = normal;
        centroid.curvature = curvature;
    }
}

/// Re-estimate normals for owned leaves using only same-owner voxels in
/// the 2-ring.
///
/// Leaves whose owner-filtered ring has fewer than the minimum sample
/// count, or whose fit degenerates, keep their current normal unchanged.
pub fn refine_cluster_normals(grid: &mut VoxelGrid) {
    let snapshot = grid.centroid_cloud();
    let mut indices: Vec<u32> = Vec::with_capacity(TYPICAL_RING_SIZE);

    for i in 0..grid.len() as u32 {
        let owner = match grid.leaf(i).owner {
            Some(owner) => owner,
            None => continue,
        };

        indices.clear();
        indices.push(i);
        for k in 0..grid.leaf(i).neighbors.len() {
            let n = grid.leaf(i).neighbors[k];
            if grid.leaf(n).owner != Some(owner) {
                continue;
            }
            indices.push(n);
            for m in 0..grid.leaf(n).neighbors.len() {
                let nn = grid.leaf(n).neighbors[m];
                if grid.leaf(nn).owner == Some(owner) {
                    indices.push(nn);
                }
            }
        }

        if let Some(fit) = fit_plane(&snapshot, &indices) {
            let position = snapshot[i as usize].position;
            let centroid = &mut grid.leaf_mut(i).centroid;
            centroid.normal = flip_normal_towards_viewpoint(fit.normal, position, Point3D::ZERO);
            centroid.curvature = fit.curvature;
        }
    }
}

/// Collect the leaf, its neighbours, and their neighbours, duplicates
/// included.
fn gather_two_ring(grid: &VoxelGrid, leaf: u32, indices: &mut Vec<u32>) {
    indices.push(leaf);
    for &n in &grid.leaf(leaf).neighbors {
        indices.push(n);
        for &nn in &grid.leaf(n).neighbors {
            indices.push(nn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Point3D, PointCloud};
    use approx::assert_relative_eq;

    /// A dense planar patch at z = 0.5, in front of the origin sensor.
    fn plane_grid(extent: i32, resolution: f32) -> VoxelGrid {
        let mut cloud = PointCloud::new();
        for ix in -extent..=extent {
            for iy in -extent..=extent {
                cloud.push(Point3D::new(
                    ix as f32 * resolution,
                    iy as f32 * resolution,
                    0.5,
                ));
            }
        }
        VoxelGrid::build(&cloud, resolution, false, false).unwrap()
    }

    #[test]
    fn test_plane_normals_point_at_sensor() {
        let mut grid = plane_grid(4, 0.01);
        estimate_normals(&mut grid);

        // Interior voxels see a full flat ring: normal along -z (toward
        // the origin), zero curvature.
        let center = grid.leaf_index_at(Point3D::new(0.0, 0.0, 0.5)).unwrap();
        let centroid = grid.leaf(center).centroid;
        assert_relative_eq!(centroid.normal.z, -1.0, epsilon = 1e-4);
        assert_relative_eq!(centroid.curvature, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_isolated_voxel_gets_zero_normal() {
        let mut cloud = PointCloud::new();
        cloud.push(Point3D::new(0.0, 0.0, 0.5));
        let mut grid = VoxelGrid::build(&cloud, 0.01, false, false).unwrap();
        estimate_normals(&mut grid);

        assert_eq!(grid.leaf(0).centroid.normal, Point3D::ZERO);
        assert_eq!(grid.leaf(0).centroid.curvature, 0.0);
    }

    #[test]
    fn test_refine_skips_thin_clusters() {
        let mut grid = plane_grid(2, 0.01);
        estimate_normals(&mut grid);

        // Give a single voxel a fake owner; its owner-filtered ring is
        // just itself, so refinement must leave its normal alone.
        let i = grid.leaf_index_at(Point3D::new(0.0, 0.0, 0.5)).unwrap();
        grid.leaf_mut(i).owner = Some(0);
        grid.leaf_mut(i).distance = 0.0;
        let before = grid.leaf(i).centroid.normal;

        refine_cluster_normals(&mut grid);
        assert_eq!(grid.leaf(i).centroid.normal, before);
    }

    #[test]
    fn test_refine_uses_only_same_owner_ring() {
        let mut grid = plane_grid(4, 0.01);
        estimate_normals(&mut grid);

        // Claim the whole patch for owner 0
        for i in 0..grid.len() as u32 {
            grid.leaf_mut(i).owner = Some(0);
            grid.leaf_mut(i).distance = 0.0;
        }
        refine_cluster_normals(&mut grid);

        let center = grid.leaf_index_at(Point3D::new(0.0, 0.0, 0.5)).unwrap();
        assert_relative_eq!(grid.leaf(center).centroid.normal.z, -1.0, epsilon = 1e-4);
    }
}
