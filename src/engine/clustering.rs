//! The supervoxel clustering engine.
//!
//! Pipeline: voxelise the input cloud, estimate per-voxel normals, place
//! seeds, grow one helper per seed under the weighted feature distance,
//! then assemble the labelled outputs. A separate refinement entry point
//! re-estimates normals inside each grown cluster, restarts every helper
//! from its centroid-nearest voxel and grows again.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::types::{ColoredPoint, LabeledPoint, Point3D, PointCloud, Rgb, VoxelPoint};
use crate::engine::adjacency::{AdjacencyEdge, AdjacencyGraph, LabelAdjacency};
use crate::engine::helper::{DistanceMetric, HelperSet};
use crate::engine::supervoxel::{Supervoxel, SupervoxelMap};
use crate::error::{Result, SupervoxelError};
use crate::grid::normals::{estimate_normals, refine_cluster_normals};
use crate::grid::VoxelGrid;
use crate::seeding::select_seeds;

/// Expansion depth factor: growth runs for ⌊1.8 R/r⌋ rounds, enough for
/// a frontier to cross a seed cell with margin.
const EXPANSION_DEPTH_FACTOR: f32 = 1.8;

/// Fixed seed for the label display palette, so coloured output is
/// reproducible run to run.
const PALETTE_SEED: u64 = 0x5eed_c010;

/// Parameters of the clustering engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupervoxelConfig {
    /// Voxel edge length in meters. Must be positive.
    pub voxel_resolution: f32,

    /// Approximate target supervoxel size in meters. Must exceed the
    /// voxel resolution; also normalises the spatial distance term.
    pub seed_resolution: f32,

    /// Reproject points to (x/z, y/z, ln z) before quantisation so voxel
    /// density stays roughly constant with depth from a single
    /// viewpoint. Requires non-negative depths.
    pub use_single_camera_transform: bool,

    /// Drop seeds that fall within half a seed resolution of another
    /// seed.
    pub prune_close_seeds: bool,

    /// Weight of the colour distance term.
    pub color_importance: f32,

    /// Weight of the spatial distance term.
    pub spatial_importance: f32,

    /// Weight of the normal angle term.
    pub normal_importance: f32,

    /// Estimate normals internally even when the input cloud carries a
    /// normal channel.
    pub ignore_input_normals: bool,
}

impl Default for SupervoxelConfig {
    fn default() -> Self {
        Self {
            voxel_resolution: 0.008,
            seed_resolution: 0.08,
            use_single_camera_transform: true,
            prune_close_seeds: true,
            color_importance: 0.1,
            spatial_importance: 0.4,
            normal_importance: 1.0,
            ignore_input_normals: false,
        }
    }
}

/// Supervoxel clustering engine.
///
/// ```
/// use samuha_segment::{PointCloud, Point3D, SupervoxelClustering, SupervoxelConfig};
///
/// let mut cloud = PointCloud::new();
/// cloud.push(Point3D::new(0.0, 0.0, 0.0));
///
/// let mut engine = SupervoxelClustering::new(SupervoxelConfig {
///     voxel_resolution: 0.01,
///     seed_resolution: 0.08,
///     use_single_camera_transform: false,
///     ..SupervoxelConfig::default()
/// });
/// engine.set_input_cloud(cloud);
/// let supervoxels = engine.extract().unwrap();
/// assert_eq!(supervoxels.len(), 1);
/// ```
#[derive(Debug)]
pub struct SupervoxelClustering {
    config: SupervoxelConfig,
    input: Option<PointCloud>,
    grid: Option<VoxelGrid>,
    voxel_centroids: Vec<VoxelPoint>,
    helpers: HelperSet,
    label_colors: Vec<Rgb>,
    extracted: bool,
}

impl SupervoxelClustering {
    /// Create an engine with the given parameters.
    pub fn new(config: SupervoxelConfig) -> Self {
        Self {
            config,
            input: None,
            grid: None,
            voxel_centroids: Vec::new(),
            helpers: HelperSet::new(),
            label_colors: Vec::new(),
            extracted: false,
        }
    }

    /// Current parameters.
    pub fn config(&self) -> &SupervoxelConfig {
        &self.config
    }

    /// Voxel resolution in meters.
    pub fn voxel_resolution(&self) -> f32 {
        self.config.voxel_resolution
    }

    /// Seed resolution in meters.
    pub fn seed_resolution(&self) -> f32 {
        self.config.seed_resolution
    }

    /// Set the weight of the colour distance term.
    pub fn set_color_importance(&mut self, weight: f32) {
        self.config.color_importance = weight;
    }

    /// Set the weight of the spatial distance term.
    pub fn set_spatial_importance(&mut self, weight: f32) {
        self.config.spatial_importance = weight;
    }

    /// Set the weight of the normal angle term.
    pub fn set_normal_importance(&mut self, weight: f32) {
        self.config.normal_importance = weight;
    }

    /// Force internal normal estimation even for normal-bearing input.
    pub fn set_ignore_input_normals(&mut self, ignore: bool) {
        self.config.ignore_input_normals = ignore;
    }

    /// Set the cloud to segment. Empty and internally inconsistent
    /// clouds are rejected with a warning and leave the engine without
    /// input. Any previous extraction state is dropped.
    pub fn set_input_cloud(&mut self, cloud: PointCloud) {
        self.grid = None;
        self.voxel_centroids.clear();
        self.helpers = HelperSet::new();
        self.extracted = false;

        if cloud.is_empty() {
            log::warn!("empty cloud set as input, doing nothing");
            self.input = None;
            return;
        }
        if let Err(reason) = cloud.validate() {
            log::warn!("rejecting input cloud: {}", reason);
            self.input = None;
            return;
        }
        self.input = Some(cloud);
    }

    /// Segment the input cloud into supervoxels.
    ///
    /// Returns the label-to-supervoxel map. Calling without an input
    /// cloud yields an empty map; invalid resolutions or a negative
    /// depth under the single-camera transform are hard errors.
    pub fn extract(&mut self) -> Result<SupervoxelMap> {
        self.validate_parameters()?;
        let config = self.config;
        let cloud = match &self.input {
            Some(cloud) => cloud,
            None => {
                log::warn!("extract called without an input cloud, returning empty result");
                return Ok(SupervoxelMap::new());
            }
        };

        let t_start = Instant::now();
        let use_input_normals = cloud.has_normals() && !config.ignore_input_normals;
        let mut grid = VoxelGrid::build(
            cloud,
            config.voxel_resolution,
            config.use_single_camera_transform,
            use_input_normals,
        )?;
        if !use_input_normals {
            estimate_normals(&mut grid);
        }
        let voxel_centroids = grid.centroid_cloud();
        let t_prep = Instant::now();

        let seeds = select_seeds(
            &grid,
            &voxel_centroids,
            config.seed_resolution,
            config.prune_close_seeds,
        );
        let mut helpers = HelperSet::from_seeds(&seeds, &mut grid);
        let t_seeds = Instant::now();

        let metric = self.metric();
        for _ in 0..self.expansion_rounds() {
            helpers.expand_round(&mut grid, &metric);
            helpers.finish_round(&grid);
        }
        let t_expand = Instant::now();

        log::debug!(
            "extract: {} voxels, {} seeds, {} supervoxels (prep {:.1} ms, seeding {:.1} ms, growth {:.1} ms)",
            grid.len(),
            seeds.len(),
            helpers.num_active(),
            (t_prep - t_start).as_secs_f32() * 1e3,
            (t_seeds - t_prep).as_secs_f32() * 1e3,
            (t_expand - t_seeds).as_secs_f32() * 1e3,
        );

        self.grid = Some(grid);
        self.voxel_centroids = voxel_centroids;
        self.helpers = helpers;
        self.extracted = true;
        self.label_colors = label_palette(self.helpers.max_label());

        Ok(self.make_supervoxels())
    }

    /// Iteratively refine an existing extraction.
    ///
    /// Each iteration re-estimates per-voxel normals within each
    /// cluster, restarts every cluster from the voxel nearest its
    /// centroid, and re-runs the growth loop. Requires a prior
    /// successful [`extract`](Self::extract); called earlier it warns
    /// and returns an empty map. The label count never grows.
    pub fn refine_supervoxels(&mut self, num_iterations: u32) -> Result<SupervoxelMap> {
        if !self.extracted {
            log::warn!("refine_supervoxels called before extract, returning empty result");
            return Ok(SupervoxelMap::new());
        }
        let rounds = self.expansion_rounds();
        let metric = self.metric();

        let grid = match self.grid.as_mut() {
            Some(grid) => grid,
            None => return Ok(SupervoxelMap::new()),
        };

        for _ in 0..num_iterations {
            refine_cluster_normals(grid);
            self.voxel_centroids = grid.centroid_cloud();
            self.helpers.reseed(grid, &self.voxel_centroids);
            for _ in 0..rounds {
                self.helpers.expand_round(grid, &metric);
                self.helpers.finish_round(grid);
            }
        }

        Ok(self.make_supervoxels())
    }

    /// The dense voxel centroid cloud of the last extraction, indexed by
    /// voxel arena order.
    pub fn voxel_centroid_cloud(&self) -> &[VoxelPoint] {
        &self.voxel_centroids
    }

    /// Label every input point by its owning supervoxel.
    ///
    /// Non-finite points and points whose voxel no cluster reached get
    /// label 0.
    pub fn labeled_cloud(&self) -> Vec<LabeledPoint> {
        let (input, grid) = match (&self.input, &self.grid) {
            (Some(input), Some(grid)) => (input, grid),
            _ => return Vec::new(),
        };
        input
            .positions
            .iter()
            .map(|&position| LabeledPoint {
                position,
                label: self.label_at(grid, position),
            })
            .collect()
    }

    /// One labelled point per owned voxel, clusters in label order,
    /// voxels in acquisition order.
    pub fn labeled_voxel_cloud(&self) -> Vec<LabeledPoint> {
        let grid = match &self.grid {
            Some(grid) => grid,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        for helper in self.helpers.active() {
            for &leaf_idx in helper.leaves() {
                out.push(LabeledPoint {
                    position: grid.leaf(leaf_idx).centroid.position,
                    label: helper.label(),
                });
            }
        }
        out
    }

    /// Every input point painted with its label's display colour.
    /// Unlabelled points come out black.
    pub fn colored_cloud(&self) -> Vec<ColoredPoint> {
        let (input, grid) = match (&self.input, &self.grid) {
            (Some(input), Some(grid)) => (input, grid),
            _ => return Vec::new(),
        };
        input
            .positions
            .iter()
            .map(|&position| ColoredPoint {
                position,
                color: self.label_color(self.label_at(grid, position)),
            })
            .collect()
    }

    /// One coloured point per owned voxel, painted by label.
    pub fn colored_voxel_cloud(&self) -> Vec<ColoredPoint> {
        self.labeled_voxel_cloud()
            .into_iter()
            .map(|p| ColoredPoint {
                position: p.position,
                color: self.label_color(p.label),
            })
            .collect()
    }

    /// Adjacency multimap over labels. Each undirected adjacency
    /// appears under both endpoints.
    pub fn supervoxel_adjacency(&self) -> LabelAdjacency {
        let grid = match &self.grid {
            Some(grid) => grid,
            None => return LabelAdjacency::new(),
        };
        let mut adjacency = LabelAdjacency::new();
        for slot in self.helpers.active_slots() {
            let labels = self.helpers.neighbor_labels(slot, grid);
            if !labels.is_empty() {
                adjacency.insert(self.helpers.label_of(slot), labels);
            }
        }
        adjacency
    }

    /// Undirected adjacency graph with centroid-distance edge weights.
    pub fn supervoxel_adjacency_graph(&self) -> AdjacencyGraph {
        let adjacency = self.supervoxel_adjacency();
        let metric = self.metric();

        let nodes: Vec<u32> = self.helpers.active().map(|h| h.label()).collect();
        let mut edges = Vec::new();
        for (&a, neighbors) in &adjacency {
            for &b in neighbors {
                if b <= a {
                    continue;
                }
                let (Some(ca), Some(cb)) = (
                    self.helpers.centroid_of_label(a),
                    self.helpers.centroid_of_label(b),
                ) else {
                    continue;
                };
                edges.push(AdjacencyEdge {
                    labels: (a, b),
                    weight: metric.voxel_distance(&ca, &cb),
                });
            }
        }
        AdjacencyGraph::new(nodes, edges)
    }

    /// Highest label in use; 0 when nothing has been extracted.
    pub fn max_label(&self) -> u32 {
        self.helpers.max_label()
    }

    fn validate_parameters(&self) -> Result<()> {
        let r = self.config.voxel_resolution;
        let s = self.config.seed_resolution;
        if !(r > 0.0) {
            return Err(SupervoxelError::InvalidVoxelResolution(r));
        }
        if !(s > r) {
            return Err(SupervoxelError::InvalidSeedResolution { voxel: r, seed: s });
        }
        Ok(())
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric {
            color_weight: self.config.color_importance,
            spatial_weight: self.config.spatial_importance,
            normal_weight: self.config.normal_importance,
            seed_resolution: self.config.seed_resolution,
        }
    }

    fn expansion_rounds(&self) -> u32 {
        (EXPANSION_DEPTH_FACTOR * self.config.seed_resolution / self.config.voxel_resolution) as u32
    }

    fn label_at(&self, grid: &VoxelGrid, position: Point3D) -> u32 {
        grid.leaf_index_at(position)
            .and_then(|leaf_idx| grid.leaf(leaf_idx).owner)
            .map(|slot| self.helpers.label_of(slot))
            .unwrap_or(0)
    }

    fn label_color(&self, label: u32) -> Rgb {
        self.label_colors
            .get(label as usize)
            .copied()
            .unwrap_or(Rgb::BLACK)
    }

    fn make_supervoxels(&self) -> SupervoxelMap {
        let mut map = SupervoxelMap::new();
        let grid = match &self.grid {
            Some(grid) => grid,
            None => return map,
        };
        for helper in self.helpers.active() {
            let voxels = helper
                .leaves()
                .iter()
                .map(|&leaf_idx| grid.leaf(leaf_idx).centroid)
                .collect();
            map.insert(
                helper.label(),
                Supervoxel {
                    centroid: helper.centroid(),
                    voxels,
                },
            );
        }
        map
    }
}

/// Display colours for labels 0..=max_label. Label 0 is black; the rest
/// come from a fixed-seed generator so runs are repeatable.
fn label_palette(max_label: u32) -> Vec<Rgb> {
    let mut rng = StdRng::seed_from_u64(PALETTE_SEED);
    let mut colors = Vec::with_capacity(max_label as usize + 1);
    colors.push(Rgb::BLACK);
    for _ in 0..max_label {
        colors.push(Rgb::new(rng.gen(), rng.gen(), rng.gen()));
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point3D;

    fn flat_patch_cloud() -> PointCloud {
        let mut cloud = PointCloud::new();
        for ix in 0..20 {
            for iy in 0..20 {
                cloud.push(Point3D::new(ix as f32 * 0.01, iy as f32 * 0.01, 0.5));
            }
        }
        cloud
    }

    fn test_config() -> SupervoxelConfig {
        SupervoxelConfig {
            voxel_resolution: 0.01,
            seed_resolution: 0.08,
            use_single_camera_transform: false,
            ..SupervoxelConfig::default()
        }
    }

    #[test]
    fn test_extract_without_input_is_empty() {
        let mut engine = SupervoxelClustering::new(test_config());
        let map = engine.extract().unwrap();
        assert!(map.is_empty());
        assert!(engine.labeled_cloud().is_empty());
        assert_eq!(engine.max_label(), 0);
    }

    #[test]
    fn test_invalid_resolutions_are_hard_errors() {
        let mut engine = SupervoxelClustering::new(SupervoxelConfig {
            voxel_resolution: 0.0,
            ..test_config()
        });
        assert!(matches!(
            engine.extract(),
            Err(SupervoxelError::InvalidVoxelResolution(_))
        ));

        let mut engine = SupervoxelClustering::new(SupervoxelConfig {
            voxel_resolution: 0.1,
            seed_resolution: 0.05,
            ..test_config()
        });
        assert!(matches!(
            engine.extract(),
            Err(SupervoxelError::InvalidSeedResolution { .. })
        ));
    }

    #[test]
    fn test_single_point_single_supervoxel() {
        let mut cloud = PointCloud::new();
        cloud.push(Point3D::new(0.0, 0.0, 0.0));

        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_input_cloud(cloud);
        let map = engine.extract().unwrap();

        assert_eq!(map.len(), 1);
        let (label, supervoxel) = map.iter().next().unwrap();
        assert_eq!(*label, 1);
        assert_eq!(supervoxel.len(), 1);
        assert!(engine.supervoxel_adjacency().is_empty());
        assert_eq!(engine.max_label(), 1);
    }

    #[test]
    fn test_extract_covers_connected_patch() {
        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_input_cloud(flat_patch_cloud());
        let map = engine.extract().unwrap();

        assert!(!map.is_empty());
        let total: usize = map.values().map(|sv| sv.len()).sum();
        assert_eq!(total, 400, "every voxel of the patch is owned");
    }

    #[test]
    fn test_labels_are_dense_from_one() {
        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_input_cloud(flat_patch_cloud());
        let map = engine.extract().unwrap();

        for &label in map.keys() {
            assert!(label >= 1);
            assert!(label <= engine.max_label());
        }
    }

    #[test]
    fn test_refine_before_extract_is_empty() {
        let mut engine = SupervoxelClustering::new(test_config());
        let map = engine.refine_supervoxels(2).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_refine_never_grows_label_count() {
        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_input_cloud(flat_patch_cloud());
        let before = engine.extract().unwrap().len();
        let after = engine.refine_supervoxels(3).unwrap().len();
        assert!(after <= before);
    }

    #[test]
    fn test_negative_depth_under_transform_errors() {
        let mut cloud = PointCloud::new();
        cloud.push(Point3D::new(0.0, 0.0, 1.0));
        cloud.push(Point3D::new(0.1, 0.0, -0.1));

        let mut engine = SupervoxelClustering::new(SupervoxelConfig {
            use_single_camera_transform: true,
            ..test_config()
        });
        engine.set_input_cloud(cloud);
        assert!(matches!(
            engine.extract(),
            Err(SupervoxelError::NegativeDepth { index: 1, .. })
        ));
    }

    #[test]
    fn test_setters_update_config() {
        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_color_importance(1.0);
        engine.set_spatial_importance(0.2);
        engine.set_normal_importance(0.0);
        engine.set_ignore_input_normals(true);

        assert_eq!(engine.config().color_importance, 1.0);
        assert_eq!(engine.config().spatial_importance, 0.2);
        assert_eq!(engine.config().normal_importance, 0.0);
        assert!(engine.config().ignore_input_normals);
    }

    #[test]
    fn test_palette_is_deterministic_and_black_at_zero() {
        let a = label_palette(16);
        let b = label_palette(16);
        assert_eq!(a, b);
        assert_eq!(a[0], Rgb::BLACK);
        assert_eq!(a.len(), 17);
    }

    #[test]
    fn test_labeled_cloud_matches_input_length() {
        let mut cloud = flat_patch_cloud();
        cloud.push(Point3D::new(f32::NAN, 0.0, 0.0));

        let mut engine = SupervoxelClustering::new(test_config());
        engine.set_input_cloud(cloud);
        engine.extract().unwrap();

        let labeled = engine.labeled_cloud();
        assert_eq!(labeled.len(), 401);
        assert_eq!(labeled.last().unwrap().label, 0, "non-finite point unlabelled");
        assert!(labeled[..400].iter().all(|p| p.label > 0));
    }
}
