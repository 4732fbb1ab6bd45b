//! Path vertex data model shared by all integrators

use cgmath::prelude::*;
use cgmath::{Point2, Point3, Vector3};

use crate::color::Color;
use crate::float::*;
use crate::scene::SurfaceHit;

mod connect;
mod mis;

pub use self::connect::{connect_endpoints, connect_eye, connect_shadow, EyeConnection};
pub use self::mis::mis_weight;

/// Longest path any integrator will build
pub const MAX_DEPTH: usize = 16;

pub const FLAG_VALID: u32 = 1;
pub const FLAG_WAS_SPEC: u32 = 2;
pub const FLAG_HIT_FROM_INSIDE: u32 = 4;

/// A scattering event on a path.
///
/// The tangent frame is derived from the shading normal on demand so the
/// packed form carries only the two stored normals.
#[derive(Clone, Copy, Debug)]
pub struct PathVertex {
    pub pos: Point3<Float>,
    pub normal: Vector3<Float>,
    pub flat_normal: Vector3<Float>,
    pub tex_coord: Point2<Float>,
    pub mat_id: i32,
    /// Direction of the ray that generated this vertex
    pub ray_dir: Vector3<Float>,
    /// Throughput accumulated up to this vertex
    pub acc_color: Color,
    /// Geometry term between this vertex and the previous one
    pub last_g_term: Float,
    pub valid: bool,
    /// The whole sub-path up to here was specular bounces.
    /// Used to suppress direct light double counting.
    pub was_spec_only: bool,
    pub hit_from_inside: bool,
}

impl PathVertex {
    pub fn invalid() -> Self {
        Self {
            pos: Point3::origin(),
            normal: Vector3::unit_z(),
            flat_normal: Vector3::unit_z(),
            tex_coord: Point2::new(0.0, 0.0),
            mat_id: -1,
            ray_dir: Vector3::unit_z(),
            acc_color: Color::white(),
            last_g_term: 1.0,
            valid: false,
            was_spec_only: false,
            hit_from_inside: false,
        }
    }

    pub fn from_hit(
        hit: &SurfaceHit,
        ray_dir: Vector3<Float>,
        acc_color: Color,
        last_g_term: Float,
        was_spec_only: bool,
    ) -> Self {
        Self {
            pos: hit.pos,
            normal: hit.normal,
            flat_normal: hit.flat_normal,
            tex_coord: hit.tex_coord,
            mat_id: hit.mat_id,
            ray_dir,
            acc_color,
            last_g_term,
            valid: true,
            was_spec_only,
            hit_from_inside: hit.hit_from_inside,
        }
    }

    fn flag_bits(&self) -> u32 {
        let mut bits = 0;
        if self.valid {
            bits |= FLAG_VALID;
        }
        if self.was_spec_only {
            bits |= FLAG_WAS_SPEC;
        }
        if self.hit_from_inside {
            bits |= FLAG_HIT_FROM_INSIDE;
        }
        bits
    }

    /// Pack into the five float4 records of the vertex buffer wire format
    pub fn pack(&self) -> [[f32; 4]; 5] {
        [
            [
                self.pos.x as f32,
                self.pos.y as f32,
                self.pos.z as f32,
                self.tex_coord.x as f32,
            ],
            [
                self.normal.x as f32,
                self.normal.y as f32,
                self.normal.z as f32,
                self.tex_coord.y as f32,
            ],
            [
                self.flat_normal.x as f32,
                self.flat_normal.y as f32,
                self.flat_normal.z as f32,
                f32::from_bits(self.mat_id as u32),
            ],
            [
                self.ray_dir.x as f32,
                self.ray_dir.y as f32,
                self.ray_dir.z as f32,
                self.last_g_term as f32,
            ],
            [
                self.acc_color.r() as f32,
                self.acc_color.g() as f32,
                self.acc_color.b() as f32,
                f32::from_bits(self.flag_bits()),
            ],
        ]
    }

    pub fn unpack(records: &[[f32; 4]; 5]) -> Self {
        let [r0, r1, r2, r3, r4] = records;
        let flags = r4[3].to_bits();
        Self {
            pos: Point3::new(r0[0].to_float(), r0[1].to_float(), r0[2].to_float()),
            normal: Vector3::new(r1[0].to_float(), r1[1].to_float(), r1[2].to_float()),
            flat_normal: Vector3::new(r2[0].to_float(), r2[1].to_float(), r2[2].to_float()),
            tex_coord: Point2::new(r0[3].to_float(), r1[3].to_float()),
            mat_id: r2[3].to_bits() as i32,
            ray_dir: Vector3::new(r3[0].to_float(), r3[1].to_float(), r3[2].to_float()),
            acc_color: Color::new(r4[0].to_float(), r4[1].to_float(), r4[2].to_float()),
            last_g_term: r3[3].to_float(),
            valid: flags & FLAG_VALID != 0,
            was_spec_only: flags & FLAG_WAS_SPEC != 0,
            hit_from_inside: flags & FLAG_HIT_FROM_INSIDE != 0,
        }
    }
}

/// Pair of area measure pdfs at a path vertex.
///
/// A negative value is a sentinel: the underlying solid angle pdf was zero
/// (delta distribution) and the magnitude carries the geometry term to
/// substitute when forming the balance heuristic. Consumers must check the
/// sign before using a value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PdfVertex {
    pub pdf_fwd: Float,
    pub pdf_rev: Float,
}

impl PdfVertex {
    pub fn new(pdf_fwd: Float, pdf_rev: Float) -> Self {
        Self { pdf_fwd, pdf_rev }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Per-ray state flags packed the way the in-flight sample buffers store them
#[derive(Clone, Copy, Debug, Default)]
pub struct RayFlags(u32);

impl RayFlags {
    const BOUNCE_MASK: u32 = 0xff;
    const DIFF_SHIFT: u32 = 8;
    const ALIVE_BIT: u32 = 1 << 16;
    const SPEC_PREV_BIT: u32 = 1 << 17;

    pub fn new() -> Self {
        RayFlags(Self::ALIVE_BIT)
    }

    pub fn bounce(&self) -> usize {
        (self.0 & Self::BOUNCE_MASK) as usize
    }

    pub fn diff_bounces(&self) -> usize {
        ((self.0 >> Self::DIFF_SHIFT) & Self::BOUNCE_MASK) as usize
    }

    pub fn alive(&self) -> bool {
        self.0 & Self::ALIVE_BIT != 0
    }

    pub fn spec_prev(&self) -> bool {
        self.0 & Self::SPEC_PREV_BIT != 0
    }

    pub fn next_bounce(&mut self, specular: bool) {
        let bounce = (self.bounce() + 1).min(Self::BOUNCE_MASK as usize) as u32;
        let diff = if specular {
            self.diff_bounces()
        } else {
            (self.diff_bounces() + 1).min(Self::BOUNCE_MASK as usize)
        } as u32;
        self.0 = (self.0 & !(Self::BOUNCE_MASK | (Self::BOUNCE_MASK << Self::DIFF_SHIFT)))
            | bounce
            | (diff << Self::DIFF_SHIFT);
        if specular {
            self.0 |= Self::SPEC_PREV_BIT;
        } else {
            self.0 &= !Self::SPEC_PREV_BIT;
        }
    }

    pub fn kill(&mut self) {
        self.0 &= !Self::ALIVE_BIT;
    }
}

/// Packed path vertex storage with the device buffer layout:
/// record planes of `stride` float4 slots, five planes per bounce.
pub struct VertexCache {
    records: Vec<[f32; 4]>,
    stride: usize,
    depth: usize,
}

impl VertexCache {
    pub fn new(thread_count: usize, max_depth: usize) -> Self {
        Self {
            records: vec![[0.0; 4]; thread_count * max_depth * 5],
            stride: thread_count,
            depth: max_depth,
        }
    }

    fn base(&self, bounce: usize) -> usize {
        assert!(bounce < self.depth);
        bounce * 5 * self.stride
    }

    pub fn store(&mut self, thread: usize, bounce: usize, vertex: &PathVertex) {
        let packed = vertex.pack();
        let base = self.base(bounce);
        for (r, record) in packed.iter().enumerate() {
            self.records[base + r * self.stride + thread] = *record;
        }
    }

    pub fn load(&self, thread: usize, bounce: usize) -> PathVertex {
        let base = self.base(bounce);
        let mut packed = [[0.0f32; 4]; 5];
        for (r, record) in packed.iter_mut().enumerate() {
            *record = self.records[base + r * self.stride + thread];
        }
        PathVertex::unpack(&packed)
    }
}
