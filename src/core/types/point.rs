//! Point, voxel coordinate and colour types.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A 3D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Z coordinate in meters (depth for single-camera clouds)
    pub z: f32,
}

impl Point3D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero point (origin).
    pub const ZERO: Point3D = Point3D {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Squared distance to another point (avoids sqrt).
    #[inline]
    pub fn distance_squared(&self, other: &Point3D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point3D) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Length (magnitude) of this point as a vector from the origin.
    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Dot product with another point (as vectors).
    #[inline]
    pub fn dot(&self, other: &Point3D) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Normalize to unit length. Zero-length vectors are returned unchanged.
    #[inline]
    pub fn normalize(&self) -> Point3D {
        let len = self.length();
        if len > 0.0 {
            Point3D::new(self.x / len, self.y / len, self.z / len)
        } else {
            *self
        }
    }

    /// Check that all components are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Point3D {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Point3D::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Point3D {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Point3D::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Point3D {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Point3D::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// Voxel coordinates (integer cell indices into the uniform grid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoxelCoord {
    /// X cell index
    pub x: i32,
    /// Y cell index
    pub y: i32,
    /// Z cell index
    pub z: i32,
}

impl VoxelCoord {
    /// Create a new voxel coordinate.
    #[inline]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Quantise a world point at the given resolution.
    #[inline]
    pub fn from_point(p: Point3D, resolution: f32) -> Self {
        Self::new(
            (p.x / resolution).floor() as i32,
            (p.y / resolution).floor() as i32,
            (p.z / resolution).floor() as i32,
        )
    }

    /// Iterate the 26 face/edge/corner neighbours of this cell.
    #[inline]
    pub fn neighbors_26(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        Some(VoxelCoord::new(self.x + dx, self.y + dy, self.z + dz))
                    }
                })
            })
        })
    }
}

/// An 8-bit RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a new colour.
    #[inline]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black (also used for unlabelled points in coloured output).
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(2.0, 3.0, 6.0);
        assert_relative_eq!(a.distance(&b), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn test_point_normalize() {
        let p = Point3D::new(0.0, 3.0, 4.0).normalize();
        assert_relative_eq!(p.length(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.6, epsilon = 1e-6);

        let zero = Point3D::ZERO.normalize();
        assert_eq!(zero, Point3D::ZERO);
    }

    #[test]
    fn test_point_finite() {
        assert!(Point3D::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Point3D::new(f32::NAN, 0.0, 0.0).is_finite());
        assert!(!Point3D::new(0.0, f32::INFINITY, 0.0).is_finite());
    }

    #[test]
    fn test_voxel_coord_quantisation() {
        let c = VoxelCoord::from_point(Point3D::new(0.05, -0.01, 0.0), 0.01);
        assert_eq!(c, VoxelCoord::new(5, -1, 0));
    }

    #[test]
    fn test_voxel_coord_neighbors() {
        let c = VoxelCoord::new(0, 0, 0);
        let neighbors: Vec<_> = c.neighbors_26().collect();
        assert_eq!(neighbors.len(), 26);
        assert!(!neighbors.contains(&c));
        assert!(neighbors.contains(&VoxelCoord::new(1, 1, 1)));
        assert!(neighbors.contains(&VoxelCoord::new(-1, 0, 0)));
    }
}
