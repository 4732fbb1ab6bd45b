use cgmath::prelude::*;
use cgmath::Vector3;

use crate::color::Color;
use crate::consts;
use crate::float::*;
use crate::sample::{self, SampleStream};

pub const MAT_FLAG_HAS_BTDF: u32 = 1;
pub const MAT_FLAG_DELTA: u32 = 2;
pub const MAT_FLAG_EMISSIVE: u32 = 4;

/// Directions and frame for one scattering evaluation.
/// `l` points towards the light side, `v` towards the viewer side.
#[derive(Clone, Copy, Debug)]
pub struct ShadeContext {
    pub l: Vector3<Float>,
    pub v: Vector3<Float>,
    pub n: Vector3<Float>,
    pub flat_n: Vector3<Float>,
}

/// Result of evaluating a material for a fixed pair of directions
#[derive(Clone, Copy, Debug)]
pub struct BxdfEval {
    pub brdf: Color,
    pub btdf: Color,
    /// Solid angle pdf of sampling `l` given `v`
    pub pdf_fwd: Float,
    /// Solid angle pdf of sampling `v` given `l`
    pub pdf_rev: Float,
}

impl BxdfEval {
    fn zero() -> Self {
        Self {
            brdf: Color::black(),
            btdf: Color::black(),
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
        }
    }
}

/// Result of sampling an outgoing direction
#[derive(Clone, Copy, Debug)]
pub struct MaterialSample {
    pub dir: Vector3<Float>,
    /// Scattering value along the sampled direction, cosine not included
    pub color: Color,
    /// Solid angle pdf of the sampled direction; one for delta lobes
    pub pdf: Float,
    pub specular: bool,
    pub transmitted: bool,
}

#[derive(Clone, Debug)]
enum Surface {
    Diffuse { albedo: Color },
    Mirror { tint: Color },
    Glass { tint: Color, eta: Float },
    None,
}

#[derive(Clone, Debug)]
pub struct Material {
    surface: Surface,
    emission: Color,
}

impl Material {
    pub fn diffuse(albedo: Color) -> Self {
        Self {
            surface: Surface::Diffuse { albedo },
            emission: Color::black(),
        }
    }

    pub fn mirror(tint: Color) -> Self {
        Self {
            surface: Surface::Mirror { tint },
            emission: Color::black(),
        }
    }

    pub fn glass(tint: Color, eta: Float) -> Self {
        Self {
            surface: Surface::Glass { tint, eta },
            emission: Color::black(),
        }
    }

    pub fn emissive(radiance: Color) -> Self {
        Self {
            surface: Surface::None,
            emission: radiance,
        }
    }

    pub fn emission(&self) -> Color {
        self.emission
    }

    pub fn is_emissive(&self) -> bool {
        !self.emission.is_black()
    }

    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        match self.surface {
            Surface::Mirror { .. } => flags |= MAT_FLAG_DELTA,
            Surface::Glass { .. } => flags |= MAT_FLAG_DELTA | MAT_FLAG_HAS_BTDF,
            _ => (),
        }
        if self.is_emissive() {
            flags |= MAT_FLAG_EMISSIVE;
        }
        flags
    }

    pub fn is_delta(&self) -> bool {
        self.flags() & MAT_FLAG_DELTA != 0
    }

    pub fn has_btdf(&self) -> bool {
        self.flags() & MAT_FLAG_HAS_BTDF != 0
    }

    /// Evaluate the material for the direction pair in `sc`.
    /// Delta lobes evaluate to zero with zero pdfs.
    /// The adjoint flag selects importance transport for light tracing.
    pub fn eval(&self, sc: &ShadeContext, _adjoint: bool) -> BxdfEval {
        match &self.surface {
            Surface::Diffuse { albedo } => {
                let cos_l = sc.n.dot(sc.l);
                let cos_v = sc.n.dot(sc.v);
                if cos_l * cos_v <= 0.0 {
                    return BxdfEval::zero();
                }
                BxdfEval {
                    brdf: *albedo / consts::PI,
                    btdf: Color::black(),
                    pdf_fwd: sample::cosine_hemisphere_pdf(cos_l),
                    pdf_rev: sample::cosine_hemisphere_pdf(cos_v),
                }
            }
            _ => BxdfEval::zero(),
        }
    }

    /// Sample an outgoing direction for a path arriving from `v`.
    /// Returns None when the surface does not scatter.
    pub fn sample(
        &self,
        sc: &ShadeContext,
        stream: &mut dyn SampleStream,
        adjoint: bool,
    ) -> Option<MaterialSample> {
        match &self.surface {
            Surface::Diffuse { albedo } => {
                let side = sc.n.dot(sc.v).signum();
                let dir = sample::cosine_sample_hemisphere(side * sc.n, stream.next_2d());
                let pdf = sample::cosine_hemisphere_pdf(sc.n.dot(dir));
                if pdf < consts::PDF_EPSILON {
                    return None;
                }
                Some(MaterialSample {
                    dir,
                    color: *albedo / consts::PI,
                    pdf,
                    specular: false,
                    transmitted: false,
                })
            }
            Surface::Mirror { tint } => {
                let cos_v = sc.n.dot(sc.v);
                if cos_v.abs() < consts::PDF_EPSILON {
                    return None;
                }
                let dir = 2.0 * cos_v * sc.n - sc.v;
                Some(MaterialSample {
                    dir,
                    color: *tint / sc.n.dot(dir).abs().max(consts::PDF_EPSILON),
                    pdf: 1.0,
                    specular: true,
                    transmitted: false,
                })
            }
            Surface::Glass { tint, eta } => {
                Self::sample_glass(*tint, *eta, sc, stream, adjoint)
            }
            Surface::None => None,
        }
    }

    fn sample_glass(
        tint: Color,
        eta: Float,
        sc: &ShadeContext,
        stream: &mut dyn SampleStream,
        adjoint: bool,
    ) -> Option<MaterialSample> {
        let cos_v = sc.n.dot(sc.v);
        if cos_v.abs() < consts::PDF_EPSILON {
            return None;
        }
        // Relative index of refraction for the crossing direction
        let eta_rel = if cos_v > 0.0 { 1.0 / eta } else { eta };
        let cos_i = cos_v.abs();
        let sin2_t = eta_rel.powi(2) * (1.0 - cos_i.powi(2));

        let fresnel = if sin2_t >= 1.0 {
            // Total internal reflection
            1.0
        } else {
            // Schlick approximation
            let f0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
            f0 + (1.0 - f0) * (1.0 - cos_i).powi(5)
        };

        if stream.next_1d() < fresnel {
            let dir = 2.0 * cos_v * sc.n - sc.v;
            Some(MaterialSample {
                dir,
                color: fresnel * tint / sc.n.dot(dir).abs().max(consts::PDF_EPSILON),
                pdf: fresnel,
                specular: true,
                transmitted: false,
            })
        } else {
            let n = if cos_v > 0.0 { sc.n } else { -sc.n };
            let cos_t = (1.0 - sin2_t).sqrt();
            let dir = (-sc.v * eta_rel + n * (eta_rel * cos_i - cos_t)).normalize();
            // Radiance transport compresses the solid angle by eta^2
            let scale = if adjoint { 1.0 } else { eta_rel.powi(2) };
            let ft = (1.0 - fresnel) * scale;
            Some(MaterialSample {
                dir,
                color: ft * tint / sc.n.dot(dir).abs().max(consts::PDF_EPSILON),
                pdf: 1.0 - fresnel,
                specular: true,
                transmitted: true,
            })
        }
    }
}
