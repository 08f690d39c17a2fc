//! Growth helpers: the engine's working representation of supervoxels.
//!
//! Helpers live in an arena with stable slots; labels are slot+1, so
//! label order equals iteration order. Deleting a helper tombstones its
//! slot instead of shifting. A leaf's `owner` field is the weak back
//! reference into this arena; all owner mutation goes through
//! [`HelperSet`] so leaves and helpers never disagree.
//!
//! A helper's owned list may briefly contain indices of leaves another
//! helper has since taken; such stale entries are skipped on read and
//! dropped at the end-of-round compaction. This keeps the steal
//! operation O(1) while preserving insertion-order traversal.

use std::collections::{BTreeSet, HashSet};

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

use crate::core::types::{Point3D, VoxelPoint};
use crate::grid::VoxelGrid;

/// Weighted feature distance between two voxel centroids.
///
/// The normal term ignores sign, the colour term is normalised by the
/// 8-bit range, and the spatial term by the seed resolution, so each
/// term lands roughly in [0, 1] before weighting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DistanceMetric {
    pub color_weight: f32,
    pub spatial_weight: f32,
    pub normal_weight: f32,
    pub seed_resolution: f32,
}

impl DistanceMetric {
    pub fn voxel_distance(&self, a: &VoxelPoint, b: &VoxelPoint) -> f32 {
        let spatial = a.position.distance(&b.position) / self.seed_resolution;
        let dr = a.rgb[0] - b.rgb[0];
        let dg = a.rgb[1] - b.rgb[1];
        let db = a.rgb[2] - b.rgb[2];
        let color = (dr * dr + dg * dg + db * db).sqrt() / 255.0;
        let normal = 1.0 - a.normal.dot(&b.normal).abs();
        self.normal_weight * normal + self.color_weight * color + self.spatial_weight * spatial
    }
}

/// Incremental mean over voxel centroids.
///
/// Positions, colours and curvature use a running mean; normals are
/// summed and renormalised at the end so opposing signs cannot inflate
/// the magnitude.
#[derive(Debug, Clone, Copy, Default)]
struct CentroidAccumulator {
    position: Point3D,
    rgb: [f32; 3],
    normal_sum: Point3D,
    curvature: f32,
    count: u32,
}

impl CentroidAccumulator {
    fn add(&mut self, v: &VoxelPoint) {
        self.count += 1;
        let k = 1.0 / self.count as f32;
        self.position = self.position + (v.position - self.position) * k;
        for c in 0..3 {
            self.rgb[c] += (v.rgb[c] - self.rgb[c]) * k;
        }
        self.curvature += (v.curvature - self.curvature) * k;
        self.normal_sum = self.normal_sum + v.normal;
    }

    fn finish(&self) -> VoxelPoint {
        VoxelPoint {
            position: self.position,
            rgb: self.rgb,
            normal: self.normal_sum.normalize(),
            curvature: self.curvature,
        }
    }
}

/// One growing supervoxel.
#[derive(Debug, Clone)]
pub(crate) struct SupervoxelHelper {
    label: u32,
    /// Owned leaf indices in insertion order. May hold stale entries
    /// between expansion and compaction.
    leaves: Vec<u32>,
    centroid: VoxelPoint,
    retired: bool,
}

impl SupervoxelHelper {
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    #[inline]
    pub fn centroid(&self) -> VoxelPoint {
        self.centroid
    }

    /// Owned leaves in insertion order. Only valid between rounds, after
    /// compaction has dropped stale entries.
    #[inline]
    pub fn leaves(&self) -> &[u32] {
        &self.leaves
    }
}

/// Arena of growth helpers plus the owner-mutation operations.
#[derive(Debug, Clone, Default)]
pub(crate) struct HelperSet {
    helpers: Vec<SupervoxelHelper>,
}

impl HelperSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one helper per seed, labelled 1..=N in seed order. Each
    /// seed leaf is claimed at distance zero.
    pub fn from_seeds(seeds: &[u32], grid: &mut VoxelGrid) -> Self {
        let mut set = Self {
            helpers: Vec::with_capacity(seeds.len()),
        };
        for (slot, &leaf_idx) in seeds.iter().enumerate() {
            set.helpers.push(SupervoxelHelper {
                label: slot as u32 + 1,
                leaves: Vec::new(),
                centroid: grid.leaf(leaf_idx).centroid,
                retired: false,
            });
            set.assign_leaf(slot as u32, leaf_idx, 0.0, grid);
        }
        set
    }

    /// Point a leaf at a helper and record it in the helper's owned list.
    ///
    /// Any previous owner keeps a stale entry that its next compaction
    /// drops.
    pub fn assign_leaf(&mut self, slot: u32, leaf_idx: u32, distance: f32, grid: &mut VoxelGrid) {
        let leaf = grid.leaf_mut(leaf_idx);
        leaf.owner = Some(slot);
        leaf.distance = distance;
        self.helpers[slot as usize].leaves.push(leaf_idx);
    }

    /// Release every owned leaf back to the unowned state.
    pub fn clear_all_leaves(&mut self, grid: &mut VoxelGrid) {
        for helper in self.helpers.iter_mut().filter(|h| !h.retired) {
            for &leaf_idx in &helper.leaves {
                let leaf = grid.leaf_mut(leaf_idx);
                leaf.owner = None;
                leaf.distance = f32::INFINITY;
            }
            helper.leaves.clear();
        }
    }

    /// One expansion round: every active helper, in label order, visits
    /// the neighbours of its leaves and takes those it beats on the
    /// weighted distance. Strict less-than, so the incumbent keeps ties.
    ///
    /// Newly taken leaves are staged and joined to the helper after its
    /// own traversal, never mid-iteration.
    pub fn expand_round(&mut self, grid: &mut VoxelGrid, metric: &DistanceMetric) {
        for slot in 0..self.helpers.len() {
            if self.helpers[slot].retired {
                continue;
            }
            let slot_u = slot as u32;
            let owned = std::mem::take(&mut self.helpers[slot].leaves);
            let mut staged: Vec<u32> = Vec::new();

            for &leaf_idx in &owned {
                if grid.leaf(leaf_idx).owner != Some(slot_u) {
                    continue; // stale: taken by another helper
                }
                for k in 0..grid.leaf(leaf_idx).neighbors.len() {
                    let n_idx = grid.leaf(leaf_idx).neighbors[k];
                    let neighbor = grid.leaf(n_idx);
                    if neighbor.owner == Some(slot_u) {
                        continue;
                    }
                    let dist = metric.voxel_distance(&self.helpers[slot].centroid, &neighbor.centroid);
                    if dist < neighbor.distance {
                        let leaf = grid.leaf_mut(n_idx);
                        leaf.owner = Some(slot_u);
                        leaf.distance = dist;
                        staged.push(n_idx);
                    }
                }
            }

            let helper = &mut self.helpers[slot];
            helper.leaves = owned;
            helper.leaves.extend(staged);
        }
    }

    /// Close out a round: drop stale entries, retire emptied helpers,
    /// recompute surviving centroids.
    pub fn finish_round(&mut self, grid: &VoxelGrid) {
        for slot in 0..self.helpers.len() {
            if self.helpers[slot].retired {
                continue;
            }
            let slot_u = slot as u32;
            let helper = &mut self.helpers[slot];

            // A leaf can leave and be re-taken within one round, leaving
            // two live entries for the same index; keep the first.
            let mut seen: HashSet<u32> = HashSet::with_capacity(helper.leaves.len());
            helper
                .leaves
                .retain(|&l| grid.leaf(l).owner == Some(slot_u) && seen.insert(l));

            if helper.leaves.is_empty() {
                helper.retired = true;
                continue;
            }

            let mut acc = CentroidAccumulator::default();
            for &l in &helper.leaves {
                acc.add(&grid.leaf(l).centroid);
            }
            helper.centroid = acc.finish();
        }
    }

    /// Restart every surviving helper from the single voxel nearest its
    /// centroid, keeping the centroid itself.
    pub fn reseed(&mut self, grid: &mut VoxelGrid, centroids: &[VoxelPoint]) {
        self.clear_all_leaves(grid);

        let mut tree: KdTree<f32, u64, 3, 4096, u32> = KdTree::new();
        for (i, c) in centroids.iter().enumerate() {
            tree.add(&[c.position.x, c.position.y, c.position.z], i as u64);
        }

        for slot in 0..self.helpers.len() {
            if self.helpers[slot].retired {
                continue;
            }
            let p = self.helpers[slot].centroid.position;
            let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
            // Two helpers can land on the same voxel; the later one takes
            // it and the earlier one retires at the next compaction.
            self.assign_leaf(slot as u32, nearest.item as u32, 0.0, grid);
        }
    }

    /// Active (non-retired) helpers in label order.
    pub fn active(&self) -> impl Iterator<Item = &SupervoxelHelper> {
        self.helpers.iter().filter(|h| !h.retired)
    }

    /// Number of active helpers.
    pub fn num_active(&self) -> usize {
        self.active().count()
    }

    /// Label of the helper in a given slot.
    #[inline]
    pub fn label_of(&self, slot: u32) -> u32 {
        self.helpers[slot as usize].label
    }

    /// Highest label among active helpers, 0 when there are none.
    pub fn max_label(&self) -> u32 {
        self.active().map(|h| h.label).max().unwrap_or(0)
    }

    /// Centroid of the active helper with the given label.
    pub fn centroid_of_label(&self, label: u32) -> Option<VoxelPoint> {
        if label == 0 {
            return None;
        }
        let helper = self.helpers.get(label as usize - 1)?;
        if helper.retired {
            return None;
        }
        Some(helper.centroid)
    }

    /// Labels of the clusters owning any neighbour of the helper's
    /// leaves, excluding the helper itself and unowned neighbours.
    pub fn neighbor_labels(&self, slot: u32, grid: &VoxelGrid) -> BTreeSet<u32> {
        let mut labels = BTreeSet::new();
        for &leaf_idx in &self.helpers[slot as usize].leaves {
            for &n_idx in &grid.leaf(leaf_idx).neighbors {
                if let Some(owner) = grid.leaf(n_idx).owner {
                    if owner != slot {
                        labels.insert(self.label_of(owner));
                    }
                }
            }
        }
        labels
    }

    /// Slots of active helpers, for callers that need both slot and data.
    pub fn active_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.helpers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.retired)
            .map(|(slot, _)| slot as u32)
    }
}
