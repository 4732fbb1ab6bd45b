use cgmath::prelude::*;
use cgmath::{Point3, Vector3};

use crate::color::Color;
use crate::consts;
use crate::float::*;
use crate::sample::{self, SampleStream};
use crate::scene::Primitive;

/// Radius of the virtual sphere that stands in for the sky
/// when a light sub-path needs a starting position
pub const SKY_RADIUS: Float = 100.0;

/// A point on a light sampled towards a receiver
#[derive(Clone, Copy, Debug)]
pub struct ShadowSample {
    pub pos: Point3<Float>,
    /// Radiance towards the receiver
    pub color: Color,
    /// Solid angle pdf at the receiver
    pub pdf: Float,
    pub cos_at_light: Float,
}

/// Forward pdfs of emitting towards a direction
#[derive(Clone, Copy, Debug)]
pub struct LightPdfFwd {
    pub pdf_a: Float,
    pub pdf_w: Float,
}

pub enum LightSource {
    Area {
        prim: Primitive,
        radiance: Color,
        inst_id: i32,
    },
    Sky {
        radiance: Color,
    },
}

impl LightSource {
    pub fn area(prim: Primitive, radiance: Color, inst_id: i32) -> Self {
        LightSource::Area {
            prim,
            radiance,
            inst_id,
        }
    }

    pub fn sky(radiance: Color) -> Self {
        LightSource::Sky { radiance }
    }

    pub fn is_sky(&self) -> bool {
        matches!(self, LightSource::Sky { .. })
    }

    pub fn instance_id(&self) -> Option<i32> {
        match self {
            LightSource::Area { inst_id, .. } => Some(*inst_id),
            LightSource::Sky { .. } => None,
        }
    }

    pub fn power(&self) -> Color {
        match self {
            LightSource::Area { prim, radiance, .. } => consts::PI * *radiance * prim.area(),
            LightSource::Sky { radiance } => {
                consts::PI * *radiance * 4.0 * consts::PI * SKY_RADIUS.powi(2)
            }
        }
    }

    /// Radiance leaving the light along dir
    pub fn le(&self, normal: Vector3<Float>, dir: Vector3<Float>) -> Color {
        match self {
            LightSource::Area { radiance, .. } => {
                if normal.dot(dir) > 0.0 {
                    *radiance
                } else {
                    Color::black()
                }
            }
            LightSource::Sky { radiance } => *radiance,
        }
    }

    /// Sample a position on the light.
    /// Returns the position, the emitting normal and the area pdf.
    pub fn sample_pos(
        &self,
        stream: &mut dyn SampleStream,
    ) -> (Point3<Float>, Vector3<Float>, Float) {
        match self {
            LightSource::Area { prim, .. } => match prim {
                Primitive::Rect {
                    center,
                    edge_u,
                    edge_v,
                } => {
                    let (u, v) = stream.next_2d();
                    let pos = *center + (2.0 * u - 1.0) * *edge_u + (2.0 * v - 1.0) * *edge_v;
                    let normal = edge_u.cross(*edge_v).normalize();
                    (pos, normal, 1.0 / prim.area())
                }
                Primitive::Sphere { center, radius } => {
                    let dir = sample::uniform_sample_sphere(stream.next_2d());
                    (*center + *radius * dir, dir, 1.0 / prim.area())
                }
            },
            LightSource::Sky { .. } => {
                let dir = sample::uniform_sample_sphere(stream.next_2d());
                let pos = Point3::origin() + SKY_RADIUS * dir;
                let area = 4.0 * consts::PI * SKY_RADIUS.powi(2);
                (pos, -dir, 1.0 / area)
            }
        }
    }

    /// Sample an emission direction from a position with the given normal.
    /// Emission is cosine distributed.
    pub fn sample_dir(
        &self,
        normal: Vector3<Float>,
        stream: &mut dyn SampleStream,
    ) -> (Vector3<Float>, Float) {
        let dir = sample::cosine_sample_hemisphere(normal, stream.next_2d());
        (dir, sample::cosine_hemisphere_pdf(normal.dot(dir)))
    }

    /// Sample a point on the light towards a receiving position
    pub fn sample_toward(
        &self,
        recv: Point3<Float>,
        stream: &mut dyn SampleStream,
    ) -> Option<ShadowSample> {
        match self {
            LightSource::Area { radiance, .. } => {
                let (pos, normal, pdf_a) = self.sample_pos(stream);
                let to_recv = recv - pos;
                let dist2 = to_recv.magnitude2();
                let cos_at_light = normal.dot(to_recv.normalize());
                if cos_at_light <= consts::PDF_EPSILON {
                    return None;
                }
                Some(ShadowSample {
                    pos,
                    color: *radiance,
                    pdf: pdf_a * dist2 / cos_at_light,
                    cos_at_light,
                })
            }
            LightSource::Sky { radiance } => {
                let dir = sample::uniform_sample_sphere(stream.next_2d());
                Some(ShadowSample {
                    pos: recv + SKY_RADIUS * dir,
                    color: *radiance,
                    pdf: sample::uniform_sphere_pdf(),
                    cos_at_light: 1.0,
                })
            }
        }
    }

    /// Solid angle pdf of `sample_toward` picking the direction to a point
    /// at `dist` with the light surface cosine `cos_at_light`
    pub fn pdf_li(&self, dist: Float, cos_at_light: Float) -> Float {
        match self {
            LightSource::Area { prim, .. } => {
                if cos_at_light <= consts::PDF_EPSILON {
                    0.0
                } else {
                    dist.powi(2) / (cos_at_light * prim.area())
                }
            }
            LightSource::Sky { .. } => sample::uniform_sphere_pdf(),
        }
    }

    /// Forward pdfs of emitting along dir from the light
    pub fn pdf_fwd(&self, cos_at_light: Float) -> LightPdfFwd {
        match self {
            LightSource::Area { prim, .. } => LightPdfFwd {
                pdf_a: 1.0 / prim.area(),
                pdf_w: sample::cosine_hemisphere_pdf(cos_at_light),
            },
            LightSource::Sky { .. } => LightPdfFwd {
                pdf_a: 1.0 / (4.0 * consts::PI * SKY_RADIUS.powi(2)),
                pdf_w: sample::cosine_hemisphere_pdf(cos_at_light),
            },
        }
    }
}
