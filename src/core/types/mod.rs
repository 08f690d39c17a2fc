//! Core data types shared by all layers.

mod cloud;
mod point;

pub use cloud::{ColoredPoint, LabeledPoint, PointCloud, VoxelPoint};
pub use point::{Point3D, Rgb, VoxelCoord};
