//! Seed selection for supervoxel growth.
//!
//! Seeds are distributed by overlaying a coarser grid (the seed
//! resolution) on the voxel centroids, snapping each occupied coarse
//! cell's centre to the nearest voxel, shifting each seed onto locally
//! flat terrain, and optionally pruning seeds that crowd each other.

use std::collections::HashSet;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

use crate::core::types::{VoxelCoord, VoxelPoint};
use crate::grid::VoxelGrid;

/// Select seed voxels for cluster growth.
///
/// `centroids` is the dense centroid cloud of `grid` (same indexing).
/// Returns arena indices of the chosen seed voxels in a stable order:
/// coarse cells are visited in first-touch order over the centroid
/// cloud, and pruning preserves the relative order of survivors.
pub fn select_seeds(
    grid: &VoxelGrid,
    centroids: &[VoxelPoint],
    seed_resolution: f32,
    prune_close_seeds: bool,
) -> Vec<u32> {
    if centroids.is_empty() {
        return Vec::new();
    }

    // Occupied coarse cells, in first-touch order so the result does not
    // depend on hash iteration order.
    let mut seen: HashSet<VoxelCoord> = HashSet::new();
    let mut coarse_cells: Vec<VoxelCoord> = Vec::new();
    for c in centroids {
        let cell = VoxelCoord::from_point(c.position, seed_resolution);
        if seen.insert(cell) {
            coarse_cells.push(cell);
        }
    }

    let mut tree: KdTree<f32, u64, 3, 4096, u32> = KdTree::new();
    for (i, c) in centroids.iter().enumerate() {
        tree.add(&[c.position.x, c.position.y, c.position.z], i as u64);
    }

    // Snap each coarse cell centre to its nearest voxel centroid.
    let mut seeds: Vec<u32> = Vec::with_capacity(coarse_cells.len());
    for cell in &coarse_cells {
        let center = [
            (cell.x as f32 + 0.5) * seed_resolution,
            (cell.y as f32 + 0.5) * seed_resolution,
            (cell.z as f32 + 0.5) * seed_resolution,
        ];
        let nearest = tree.nearest_one::<SquaredEuclidean>(&center);
        seeds.push(nearest.item as u32);
    }

    // Shift each seed toward locally minimal curvature. The iteration
    // count bounds the total shift to roughly one seed cell.
    let shift_iterations = (seed_resolution / grid.resolution()) as u32;
    for seed in &mut seeds {
        for _ in 0..shift_iterations {
            *seed = min_curvature_neighbor(grid, centroids, *seed);
        }
    }

    if !prune_close_seeds {
        return seeds;
    }
    prune_seeds(centroids, seeds, seed_resolution / 2.0)
}

/// The voxel with minimum curvature among a leaf and its neighbours.
/// Ties keep the earlier candidate (the leaf itself, then neighbours in
/// link order).
fn min_curvature_neighbor(grid: &VoxelGrid, centroids: &[VoxelPoint], index: u32) -> u32 {
    let mut min_index = index;
    let mut min_curvature = centroids[index as usize].curvature;
    for &n in &grid.leaf(index).neighbors {
        let curvature = centroids[n as usize].curvature;
        if curvature < min_curvature {
            min_curvature = curvature;
            min_index = n;
        }
    }
    min_index
}

/// Remove seeds that lie within `radius` of other seeds.
///
/// Every seed counts the seeds inside its radius (itself included) as
/// `num_active`. The seed with the largest count is removed and the
/// counts of seeds that saw it are decremented, repeating until every
/// survivor sees only itself. Ties pick the earliest seed, so the
/// outcome is deterministic for a fixed seed order.
fn prune_seeds(centroids: &[VoxelPoint], seeds: Vec<u32>, radius: f32) -> Vec<u32> {
    let n = seeds.len();
    if n <= 1 {
        return seeds;
    }

    let mut tree: KdTree<f32, u64, 3, 4096, u32> = KdTree::new();
    for (i, &v) in seeds.iter().enumerate() {
        let p = centroids[v as usize].position;
        tree.add(&[p.x, p.y, p.z], i as u64);
    }

    let radius_sq = radius * radius;
    let mut neighbor_lists: Vec<Vec<u32>> = Vec::with_capacity(n);
    let mut num_active: Vec<i32> = Vec::with_capacity(n);
    for &v in &seeds {
        let p = centroids[v as usize].position;
        let mut in_radius: Vec<u32> = tree
            .within_unsorted::<SquaredEuclidean>(&[p.x, p.y, p.z], radius_sq)
            .iter()
            .map(|hit| hit.item as u32)
            .collect();
        in_radius.sort_unstable();
        num_active.push(in_radius.len() as i32);
        neighbor_lists.push(in_radius);
    }

    let mut removed = vec![false; n];
    loop {
        let mut busiest: Option<usize> = None;
        for i in 0..n {
            if removed[i] {
                continue;
            }
            // Strict > keeps the earliest seed on equal counts
            if busiest.map_or(true, |b| num_active[i] > num_active[b]) {
                busiest = Some(i);
            }
        }
        let candidate = match busiest {
            Some(i) if num_active[i] > 1 => i,
            _ => break,
        };

        removed[candidate] = true;
        for j in 0..n {
            if removed[j] {
                continue;
            }
            if neighbor_lists[j].binary_search(&(candidate as u32)).is_ok() {
                num_active[j] -= 1;
            }
        }
    }

    seeds
        .into_iter()
        .enumerate()
        .filter(|&(i, _)| !removed[i])
        .map(|(_, v)| v)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Point3D, PointCloud};
    use crate::grid::normals::estimate_normals;
    use std::collections::HashSet;

    fn build_grid(points: &[(f32, f32, f32)], resolution: f32) -> VoxelGrid {
        let mut cloud = PointCloud::new();
        for &(x, y, z) in points {
            cloud.push(Point3D::new(x, y, z));
        }
        VoxelGrid::build(&cloud, resolution, false, false).unwrap()
    }

    #[test]
    fn test_single_voxel_single_seed() {
        let grid = build_grid(&[(0.0, 0.0, 0.0)], 0.01);
        let centroids = grid.centroid_cloud();
        let seeds = select_seeds(&grid, &centroids, 0.08, true);
        assert_eq!(seeds, vec![0]);
    }

    #[test]
    fn test_empty_grid_no_seeds() {
        let grid = build_grid(&[], 0.01);
        let centroids = grid.centroid_cloud();
        assert!(select_seeds(&grid, &centroids, 0.08, true).is_empty());
    }

    #[test]
    fn test_separated_clusters_get_own_seeds() {
        let grid = build_grid(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0)], 0.01);
        let centroids = grid.centroid_cloud();
        let seeds = select_seeds(&grid, &centroids, 0.08, true);

        assert_eq!(seeds.len(), 2);
        assert!(seeds.contains(&0));
        assert!(seeds.contains(&1));
    }

    #[test]
    fn test_min_curvature_shift() {
        // Three voxels in a row; the middle one starts as the seed but
        // its right neighbour is flatter.
        let grid = build_grid(
            &[(0.005, 0.005, 0.005), (0.015, 0.005, 0.005), (0.025, 0.005, 0.005)],
            0.01,
        );
        let mut centroids = grid.centroid_cloud();
        centroids[0].curvature = 0.5;
        centroids[1].curvature = 0.3;
        centroids[2].curvature = 0.1;

        assert_eq!(min_curvature_neighbor(&grid, &centroids, 1), 2);
        // Ties keep the earlier candidate
        centroids[2].curvature = 0.3;
        assert_eq!(min_curvature_neighbor(&grid, &centroids, 1), 1);
    }

    #[test]
    fn test_close_seeds_are_pruned() {
        // Two voxels in different coarse cells but within half a seed
        // resolution of each other.
        let grid = build_grid(&[(0.049, 0.0, 0.0), (0.051, 0.0, 0.0)], 0.001);
        let centroids = grid.centroid_cloud();

        let pruned = select_seeds(&grid, &centroids, 0.05, true);
        assert_eq!(pruned.len(), 1);

        let unpruned = select_seeds(&grid, &centroids, 0.05, false);
        assert_eq!(unpruned.len(), 2);
    }

    #[test]
    fn test_prune_keeps_far_seeds() {
        let grid = build_grid(&[(0.0, 0.0, 0.0), (0.3, 0.0, 0.0), (0.6, 0.0, 0.0)], 0.01);
        let centroids = grid.centroid_cloud();
        let seeds = select_seeds(&grid, &centroids, 0.08, true);
        assert_eq!(seeds.len(), 3);
    }

    #[test]
    fn test_seed_order_is_stable() {
        let grid = build_grid(
            &[(0.0, 0.0, 0.0), (0.3, 0.0, 0.0), (0.6, 0.0, 0.0), (0.9, 0.0, 0.0)],
            0.01,
        );
        let centroids = grid.centroid_cloud();
        let a = select_seeds(&grid, &centroids, 0.08, true);
        let b = select_seeds(&grid, &centroids, 0.08, true);
        assert_eq!(a, b);
        // First-touch order over the centroid cloud
        assert_eq!(a, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_plane_seed_coverage() {
        // A 0.4m plane at r=0.01, R=0.1 should get on the order of
        // (0.4/0.1)^2 = 16 seeds, some pruned near coarse-cell borders.
        let mut points = Vec::new();
        for ix in 0..40 {
            for iy in 0..40 {
                points.push((ix as f32 * 0.01, iy as f32 * 0.01, 0.5));
            }
        }
        let mut grid = build_grid(&points, 0.01);
        estimate_normals(&mut grid);
        let centroids = grid.centroid_cloud();

        let seeds = select_seeds(&grid, &centroids, 0.1, true);
        assert!(
            seeds.len() >= 9 && seeds.len() <= 25,
            "expected roughly 16 seeds, got {}",
            seeds.len()
        );
        // No duplicates among survivors
        let unique: HashSet<u32> = seeds.iter().copied().collect();
        assert_eq!(unique.len(), seeds.len());
    }
}
