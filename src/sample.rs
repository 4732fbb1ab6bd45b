use cgmath::prelude::*;
use cgmath::{Matrix3, Vector3};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::consts;
use crate::float::*;

/// Source of uniform samples in [0, 1).
///
/// Ordinary integrators draw from a seeded rng while the Metropolis sampler
/// replays a mutated primary sample vector through the same interface.
pub trait SampleStream {
    fn next_1d(&mut self) -> Float;

    fn next_2d(&mut self) -> (Float, Float) {
        (self.next_1d(), self.next_1d())
    }
}

/// Independent uniform samples from a seeded rng
pub struct RandomStream {
    rng: SmallRng,
}

impl RandomStream {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl SampleStream for RandomStream {
    fn next_1d(&mut self) -> Float {
        self.rng.gen()
    }
}

/// Compute an orthonormal coordinate frame where n defines the z-axis
pub fn local_to_world(n: Vector3<Float>) -> Matrix3<Float> {
    let nx = if n.x.abs() > n.y.abs() {
        Vector3::new(n.z, 0.0, -n.x).normalize()
    } else {
        Vector3::new(0.0, -n.z, n.y).normalize()
    };
    let ny = n.cross(nx).normalize();
    Matrix3::from_cols(nx, ny, n)
}

/// Cosine sample the hemisphere around n
pub fn cosine_sample_hemisphere(n: Vector3<Float>, u: (Float, Float)) -> Vector3<Float> {
    let phi = 2.0 * consts::PI * u.0;
    let r = u.1.sqrt();
    let x = r * phi.cos();
    let y = r * phi.sin();
    let z = (1.0 - r.powi(2)).sqrt();
    local_to_world(n) * Vector3::new(x, y, z)
}

pub fn cosine_hemisphere_pdf(cos_t: Float) -> Float {
    cos_t.abs() / consts::PI
}

pub fn uniform_sample_sphere(u: (Float, Float)) -> Vector3<Float> {
    let phi = 2.0 * consts::PI * u.0;
    let z = 1.0 - 2.0 * u.1;
    let r = (1.0 - z.powi(2)).max(0.0).sqrt();
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn uniform_sphere_pdf() -> Float {
    1.0 / (4.0 * consts::PI)
}

/// Convert a solid angle pdf at the sampling vertex to an area pdf
/// at the vertex the direction points to
pub fn to_area_pdf(pdf_dir: Float, dist2: Float, cos_there: Float) -> Float {
    pdf_dir * cos_there.abs() / dist2.max(consts::PDF_EPSILON)
}

/// Low discrepancy 2d samples over the unit square
pub fn plane_hammersley(n: usize) -> Vec<(Float, Float)> {
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        // Van der Corput radical inverse in base 2
        let mut u = 0.0;
        let mut p = 0.5;
        let mut k = i;
        while k > 0 {
            if k & 1 == 1 {
                u += p;
            }
            p *= 0.5;
            k >>= 1;
        }
        let v = (i.to_float() + 0.5) / n.to_float();
        samples.push((u, v));
    }
    samples
}
