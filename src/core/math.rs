//! Geometric primitives: plane fitting and normal orientation.

use nalgebra::{Matrix3, SymmetricEigen};

use crate::core::types::{Point3D, VoxelPoint};

/// Minimum number of contributing samples for a plane fit.
pub const MIN_PLANE_FIT_SAMPLES: usize = 4;

/// Relative eigenvalue spread below which a fit counts as degenerate.
const DEGENERATE_SPREAD: f32 = 1e-6;

/// Result of a least-squares plane fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFit {
    /// Unit normal of the fitted plane.
    pub normal: Point3D,
    /// Smallest eigenvalue over eigenvalue sum. 0 = perfectly planar.
    pub curvature: f32,
}

/// Fit a plane through the indexed centroids by principal component analysis.
///
/// The normal is the eigenvector of the smallest covariance eigenvalue.
/// Indices may repeat; repeated samples weight the fit accordingly.
///
/// Returns None if fewer than [`MIN_PLANE_FIT_SAMPLES`] indices are given,
/// or if the fit is degenerate (vanishing or isotropic covariance).
pub fn fit_plane(cloud: &[VoxelPoint], indices: &[u32]) -> Option<PlaneFit> {
    if indices.len() < MIN_PLANE_FIT_SAMPLES {
        return None;
    }

    let n = indices.len() as f32;

    // Compute centroid of the samples
    let mut mean = Point3D::ZERO;
    for &i in indices {
        mean = mean + cloud[i as usize].position;
    }
    let mean = mean * (1.0 / n);

    // Accumulate the upper triangle of the 3x3 covariance
    let mut sxx = 0.0f32;
    let mut sxy = 0.0f32;
    let mut sxz = 0.0f32;
    let mut syy = 0.0f32;
    let mut syz = 0.0f32;
    let mut szz = 0.0f32;
    for &i in indices {
        let d = cloud[i as usize].position - mean;
        sxx += d.x * d.x;
        sxy += d.x * d.y;
        sxz += d.x * d.z;
        syy += d.y * d.y;
        syz += d.y * d.z;
        szz += d.z * d.z;
    }

    let covariance = Matrix3::new(sxx, sxy, sxz, sxy, syy, syz, sxz, syz, szz);
    let eigen = SymmetricEigen::new(covariance);

    // nalgebra returns eigenvalues unsorted; locate smallest and largest
    let mut min_idx = 0;
    let mut max_idx = 0;
    for k in 1..3 {
        if eigen.eigenvalues[k] < eigen.eigenvalues[min_idx] {
            min_idx = k;
        }
        if eigen.eigenvalues[k] > eigen.eigenvalues[max_idx] {
            max_idx = k;
        }
    }
    let lambda_min = eigen.eigenvalues[min_idx].max(0.0);
    let lambda_max = eigen.eigenvalues[max_idx].max(0.0);
    let lambda_sum: f32 = (0..3).map(|k| eigen.eigenvalues[k].max(0.0)).sum();

    // Vanishing covariance (all samples coincide) or isotropic spread
    // (no preferred plane) cannot orient a normal.
    if lambda_sum <= f32::EPSILON || lambda_max - lambda_min <= lambda_max * DEGENERATE_SPREAD {
        return None;
    }

    let column = eigen.eigenvectors.column(min_idx);
    let normal = Point3D::new(column[0], column[1], column[2]).normalize();

    Some(PlaneFit {
        normal,
        curvature: lambda_min / lambda_sum,
    })
}

/// Orient a normal so it points from `position` toward `viewpoint`.
///
/// Zero normals are returned unchanged.
#[inline]
pub fn flip_normal_towards_viewpoint(
    normal: Point3D,
    position: Point3D,
    viewpoint: Point3D,
) -> Point3D {
    let to_viewpoint = viewpoint - position;
    if normal.dot(&to_viewpoint) < 0.0 {
        normal * -1.0
    } else {
        normal
    }
}
