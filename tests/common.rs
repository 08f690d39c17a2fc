//! Shared synthetic cloud fixtures for the integration tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use samuha_segment::{Point3D, PointCloud, Rgb};

/// Uniformly sample `n` points inside a ball.
pub fn ball_cloud(center: Point3D, radius: f32, n: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cloud = PointCloud::with_capacity(n);
    while cloud.len() < n {
        let x = rng.gen_range(-1.0f32..1.0);
        let y = rng.gen_range(-1.0f32..1.0);
        let z = rng.gen_range(-1.0f32..1.0);
        if x * x + y * y + z * z > 1.0 {
            continue;
        }
        cloud.push(Point3D::new(
            center.x + x * radius,
            center.y + y * radius,
            center.z + z * radius,
        ));
    }
    cloud
}

/// A z-constant plane sampled on an exact `nx` by `ny` lattice of pitch
/// `step`, one point per voxel at that resolution.
pub fn plane_cloud(nx: usize, ny: usize, step: f32, z: f32) -> PointCloud {
    let mut cloud = PointCloud::with_capacity(nx * ny);
    for ix in 0..nx {
        for iy in 0..ny {
            cloud.push(Point3D::new(ix as f32 * step, iy as f32 * step, z));
        }
    }
    cloud
}

/// Like [`plane_cloud`], but coloured `left` where x < split and
/// `right` elsewhere.
pub fn split_plane_cloud(
    nx: usize,
    ny: usize,
    step: f32,
    z: f32,
    split: f32,
    left: Rgb,
    right: Rgb,
) -> PointCloud {
    let mut cloud = PointCloud::with_capacity(nx * ny);
    for ix in 0..nx {
        for iy in 0..ny {
            let x = ix as f32 * step;
            let color = if x < split { left } else { right };
            cloud.push_colored(Point3D::new(x, iy as f32 * step, z), color);
        }
    }
    cloud
}
