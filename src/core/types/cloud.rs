//! Point cloud containers and aggregated voxel points.

use serde::{Deserialize, Serialize};

use super::point::{Point3D, Rgb};

/// An unordered 3D point cloud with optional colour and normal channels.
///
/// Positions are mandatory; the colour and normal channels, when present,
/// must have the same length as `positions`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointCloud {
    /// Point positions in meters.
    pub positions: Vec<Point3D>,
    /// Optional per-point RGB colours (same length as positions).
    pub colors: Option<Vec<Rgb>>,
    /// Optional per-point surface normals (same length as positions).
    pub normals: Option<Vec<Point3D>>,
}

impl PointCloud {
    /// Create an empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            colors: None,
            normals: None,
        }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Add a point without colour or normal.
    ///
    /// If colour/normal channels already exist, they are padded so the
    /// channels stay aligned with the positions.
    pub fn push(&mut self, position: Point3D) {
        self.positions.push(position);
        if let Some(colors) = &mut self.colors {
            colors.push(Rgb::BLACK);
        }
        if let Some(normals) = &mut self.normals {
            normals.push(Point3D::ZERO);
        }
    }

    /// Add a point with a colour.
    ///
    /// The first coloured push initialises the colour channel with black
    /// for all previously added points.
    pub fn push_colored(&mut self, position: Point3D, color: Rgb) {
        let prior = self.positions.len();
        self.positions.push(position);
        match &mut self.colors {
            Some(colors) => colors.push(color),
            None => {
                let mut colors = vec![Rgb::BLACK; prior];
                colors.push(color);
                self.colors = Some(colors);
            }
        }
        if let Some(normals) = &mut self.normals {
            normals.push(Point3D::ZERO);
        }
    }

    /// Add a point with a colour and a normal.
    pub fn push_full(&mut self, position: Point3D, color: Rgb, normal: Point3D) {
        let prior = self.positions.len();
        self.push_colored(position, color);
        match &mut self.normals {
            Some(normals) => normals.push(normal),
            None => {
                let mut normals = vec![Point3D::ZERO; prior];
                normals.push(normal);
                self.normals = Some(normals);
            }
        }
    }

    /// Colour of the point at `index`, if the cloud carries colours.
    #[inline]
    pub fn color_at(&self, index: usize) -> Option<Rgb> {
        self.colors.as_ref().and_then(|c| c.get(index).copied())
    }

    /// Normal of the point at `index`, if the cloud carries normals.
    #[inline]
    pub fn normal_at(&self, index: usize) -> Option<Point3D> {
        self.normals.as_ref().and_then(|n| n.get(index).copied())
    }

    /// Whether the cloud carries a normal channel.
    #[inline]
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Validate internal consistency of the channels.
    ///
    /// Returns Ok(()) if valid, or a message describing the inconsistency.
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err("colors and positions length mismatch");
            }
        }
        if let Some(normals) = &self.normals {
            if normals.len() != self.positions.len() {
                return Err("normals and positions length mismatch");
            }
        }
        Ok(())
    }
}

/// The aggregated state of one occupied voxel.
///
/// Position and colour are running means of the member points; the normal
/// and curvature come either from averaged input normals or from the
/// neighbourhood plane fit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoxelPoint {
    /// Mean position of the member points in meters.
    pub position: Point3D,
    /// Mean colour of the member points, kept in float RGB (0-255 range).
    pub rgb: [f32; 3],
    /// Unit surface normal (zero when unknown or degenerate).
    pub normal: Point3D,
    /// Surface curvature: smallest eigenvalue over eigenvalue sum.
    pub curvature: f32,
}

/// A point carrying a cluster label. Label 0 means unlabelled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub position: Point3D,
    pub label: u32,
}

/// A point carrying a display colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredPoint {
    pub position: Point3D,
    pub color: Rgb,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cloud() {
        let cloud = PointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
        assert!(cloud.validate().is_ok());
    }

    #[test]
    fn test_push_pads_channels() {
        let mut cloud = PointCloud::new();
        cloud.push(Point3D::new(1.0, 0.0, 0.0));
        cloud.push_colored(Point3D::new(2.0, 0.0, 0.0), Rgb::new(10, 20, 30));
        cloud.push(Point3D::new(3.0, 0.0, 0.0));

        assert_eq!(cloud.len(), 3);
        assert!(cloud.validate().is_ok());
        assert_eq!(cloud.color_at(0), Some(Rgb::BLACK));
        assert_eq!(cloud.color_at(1), Some(Rgb::new(10, 20, 30)));
        assert_eq!(cloud.color_at(2), Some(Rgb::BLACK));
    }

    #[test]
    fn test_push_full_backfills_normals() {
        let mut cloud = PointCloud::new();
        cloud.push(Point3D::new(1.0, 0.0, 0.0));
        cloud.push_full(
            Point3D::new(2.0, 0.0, 0.0),
            Rgb::new(1, 2, 3),
            Point3D::new(0.0, 0.0, 1.0),
        );

        assert!(cloud.has_normals());
        assert!(cloud.validate().is_ok());
        assert_eq!(cloud.normal_at(0), Some(Point3D::ZERO));
        assert_eq!(cloud.normal_at(1), Some(Point3D::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_validate_detects_mismatch() {
        let cloud = PointCloud {
            positions: vec![Point3D::ZERO; 3],
            colors: Some(vec![Rgb::BLACK; 2]),
            normals: None,
        };
        assert!(cloud.validate().is_err());
    }
}
