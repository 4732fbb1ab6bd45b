use std::sync::atomic::{AtomicUsize, Ordering};

use cgmath::prelude::*;
use cgmath::{Point2, Point3, Rad, Vector3};

use crate::camera::Camera;
use crate::color::Color;
use crate::config::ConfigError;
use crate::consts;
use crate::float::*;
use crate::light::LightSource;
use crate::material::Material;

static RAY_COUNT: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug)]
pub struct Ray {
    pub orig: Point3<Float>,
    pub dir: Vector3<Float>,
    pub length: Float,
}

impl Ray {
    fn new(orig: Point3<Float>, dir: Vector3<Float>, length: Float) -> Ray {
        Ray { orig, dir, length }
    }

    /// Infinite ray with a given direction and origin
    pub fn from_dir(mut orig: Point3<Float>, dir: Vector3<Float>) -> Ray {
        orig += consts::EPSILON * dir;
        Ray::new(orig, dir, consts::INFINITY)
    }

    /// Infinite ray from origin towards another point
    pub fn from_point(orig: Point3<Float>, to: Point3<Float>) -> Ray {
        let dir = (to - orig).normalize();
        Ray::from_dir(orig, dir)
    }

    /// Shadow ray between two points
    pub fn shadow(mut orig: Point3<Float>, to: Point3<Float>) -> Ray {
        let dp = to - orig;
        let length = dp.magnitude() - 2.0 * consts::EPSILON;
        let dir = dp.normalize();
        orig += consts::EPSILON * dir;
        Ray::new(orig, dir, length)
    }

    pub fn reset_count() {
        RAY_COUNT.store(0, Ordering::Relaxed);
    }

    pub fn count() -> usize {
        RAY_COUNT.load(Ordering::Relaxed)
    }
}

/// Minimal record of a ray hit
#[derive(Clone, Copy, Debug)]
pub struct LiteHit {
    pub t: Float,
    pub prim_i: usize,
    pub obj_id: i32,
    pub inst_id: i32,
}

/// Full surface attributes evaluated at a hit point
#[derive(Clone, Copy, Debug)]
pub struct SurfaceHit {
    pub pos: Point3<Float>,
    /// Shading normal, flipped towards the incoming ray
    pub normal: Vector3<Float>,
    /// Geometric normal of the surface
    pub flat_normal: Vector3<Float>,
    pub tex_coord: Point2<Float>,
    pub mat_id: i32,
    /// Hit the surface from the back side
    pub hit_from_inside: bool,
}

#[derive(Clone, Debug)]
pub enum Primitive {
    Sphere {
        center: Point3<Float>,
        radius: Float,
    },
    /// Parallelogram defined by a center and two half-edge vectors
    Rect {
        center: Point3<Float>,
        edge_u: Vector3<Float>,
        edge_v: Vector3<Float>,
    },
}

impl Primitive {
    fn intersect(&self, ray: &Ray) -> Option<Float> {
        match self {
            Primitive::Sphere { center, radius } => {
                let oc = ray.orig - *center;
                let b = oc.dot(ray.dir);
                let c = oc.magnitude2() - radius.powi(2);
                let disc = b.powi(2) - c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt_disc = disc.sqrt();
                let t = if -b - sqrt_disc > consts::EPSILON {
                    -b - sqrt_disc
                } else {
                    -b + sqrt_disc
                };
                if t > consts::EPSILON && t < ray.length {
                    Some(t)
                } else {
                    None
                }
            }
            Primitive::Rect {
                center,
                edge_u,
                edge_v,
            } => {
                let normal = edge_u.cross(*edge_v).normalize();
                let denom = normal.dot(ray.dir);
                if denom.abs() < consts::PDF_EPSILON {
                    return None;
                }
                let t = normal.dot(*center - ray.orig) / denom;
                if t <= consts::EPSILON || t >= ray.length {
                    return None;
                }
                let local = ray.orig + t * ray.dir - *center;
                let u = local.dot(*edge_u) / edge_u.magnitude2();
                let v = local.dot(*edge_v) / edge_v.magnitude2();
                if u.abs() <= 1.0 && v.abs() <= 1.0 {
                    Some(t)
                } else {
                    None
                }
            }
        }
    }

    pub fn normal_at(&self, pos: Point3<Float>) -> Vector3<Float> {
        match self {
            Primitive::Sphere { center, .. } => (pos - *center).normalize(),
            Primitive::Rect { edge_u, edge_v, .. } => edge_u.cross(*edge_v).normalize(),
        }
    }

    fn tex_coord_at(&self, pos: Point3<Float>) -> Point2<Float> {
        match self {
            Primitive::Sphere { center, .. } => {
                let d = (pos - *center).normalize();
                let u = 0.5 + d.z.atan2(d.x) / (2.0 * consts::PI);
                let v = 0.5 - d.y.asin() / consts::PI;
                Point2::new(u, v)
            }
            Primitive::Rect {
                center,
                edge_u,
                edge_v,
            } => {
                let local = pos - *center;
                let u = local.dot(*edge_u) / edge_u.magnitude2();
                let v = local.dot(*edge_v) / edge_v.magnitude2();
                Point2::new(0.5 * (u + 1.0), 0.5 * (v + 1.0))
            }
        }
    }

    pub fn area(&self) -> Float {
        match self {
            Primitive::Sphere { radius, .. } => 4.0 * consts::PI * radius.powi(2),
            Primitive::Rect { edge_u, edge_v, .. } => 4.0 * edge_u.cross(*edge_v).magnitude(),
        }
    }
}

/// A primitive placed in the scene with its shading and identification ids
#[derive(Clone, Debug)]
pub struct Instance {
    pub prim: Primitive,
    pub mat_id: i32,
    pub obj_id: i32,
    pub inst_id: i32,
}

/// Homogeneous fog. Transmittance decays exponentially with distance,
/// channels matching the fog color decay slower.
#[derive(Clone, Copy, Debug)]
pub struct Fog {
    pub color: Color,
    pub density: Float,
}

impl Fog {
    pub fn transmittance(&self, dist: Float) -> Color {
        if !dist.is_finite() {
            return Color::white();
        }
        let sigma = |c: Float| (-self.density * dist * (1.0 - c)).exp();
        Color::new(
            sigma(self.color.r()),
            sigma(self.color.g()),
            sigma(self.color.b()),
        )
    }
}

/// Immutable scene bundle for one render.
/// Materials and lights live in flat arenas addressed by integer ids.
pub struct Scene {
    pub instances: Vec<Instance>,
    pub materials: Vec<Material>,
    pub lights: Vec<LightSource>,
    pub fog: Option<Fog>,
}

impl Scene {
    pub fn new(
        instances: Vec<Instance>,
        materials: Vec<Material>,
        lights: Vec<LightSource>,
    ) -> Self {
        Self {
            instances,
            materials,
            lights,
            fog: None,
        }
    }

    /// Find the closest hit along the ray
    pub fn ray_trace(&self, ray: &Ray) -> Option<LiteHit> {
        RAY_COUNT.fetch_add(1, Ordering::Relaxed);
        let mut closest: Option<LiteHit> = None;
        for (i, inst) in self.instances.iter().enumerate() {
            if let Some(t) = inst.prim.intersect(ray) {
                if closest.as_ref().map_or(true, |hit| t < hit.t) {
                    closest = Some(LiteHit {
                        t,
                        prim_i: i,
                        obj_id: inst.obj_id,
                        inst_id: inst.inst_id,
                    });
                }
            }
        }
        closest
    }

    /// True if anything blocks the ray before its end
    pub fn intersect_shadow(&self, ray: &Ray) -> bool {
        RAY_COUNT.fetch_add(1, Ordering::Relaxed);
        self.instances.iter().any(|inst| inst.prim.intersect(ray).is_some())
    }

    /// Evaluate the full surface attributes for a hit
    pub fn surface_eval(&self, ray: &Ray, hit: &LiteHit) -> SurfaceHit {
        let inst = &self.instances[hit.prim_i];
        let pos = ray.orig + hit.t * ray.dir;
        let flat_normal = inst.prim.normal_at(pos);
        let hit_from_inside = flat_normal.dot(ray.dir) > 0.0;
        let normal = if hit_from_inside {
            -flat_normal
        } else {
            flat_normal
        };
        SurfaceHit {
            pos,
            normal,
            flat_normal,
            tex_coord: inst.prim.tex_coord_at(pos),
            mat_id: inst.mat_id,
            hit_from_inside,
        }
    }

    pub fn material(&self, mat_id: i32) -> &Material {
        &self.materials[mat_id as usize]
    }

    /// Uniformly pick a light. Returns the light index and the pick probability.
    pub fn sample_light(&self, u: Float) -> Option<(usize, Float)> {
        if self.lights.is_empty() {
            return None;
        }
        let n = self.lights.len();
        let i = ((u * n.to_float()) as usize).min(n - 1);
        Some((i, 1.0 / n.to_float()))
    }

    pub fn light_pick_prob(&self) -> Float {
        1.0 / self.lights.len().to_float()
    }

    /// Map an emissive instance back to its light table entry
    pub fn light_of_instance(&self, inst_id: i32) -> Option<usize> {
        self.lights
            .iter()
            .position(|l| l.instance_id() == Some(inst_id))
    }

    /// The sky light of the scene if there is one
    pub fn sky(&self) -> Option<&LightSource> {
        self.lights.iter().find(|l| l.is_sky())
    }

    pub fn sky_index(&self) -> Option<usize> {
        self.lights.iter().position(|l| l.is_sky())
    }

    pub fn transmittance(&self, dist: Float) -> Color {
        match &self.fog {
            Some(fog) => fog.transmittance(dist),
            None => Color::white(),
        }
    }
}

/// Default camera pose for a built-in scene state
pub fn camera_for_state(name: &str, width: u32, height: u32) -> Result<Camera, ConfigError> {
    let up = Vector3::unit_y();
    match name {
        "empty_env" => Ok(Camera::look_at(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            up,
            Rad(consts::PI / 2.0),
            width,
            height,
        )),
        "furnace" => Ok(Camera::look_at(
            Point3::new(0.0, 0.0, 4.0),
            Point3::new(0.0, 0.0, 0.0),
            up,
            Rad(consts::PI / 3.0),
            width,
            height,
        )),
        "test_42" => Ok(Camera::look_at(
            Point3::new(0.0, 0.0, 3.2),
            Point3::new(0.0, 0.0, 0.0),
            up,
            Rad(consts::PI / 4.0),
            width,
            height,
        )),
        "sphere_plane" => Ok(Camera::look_at(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, -1.0),
            up,
            Rad(consts::PI / 3.0),
            width,
            height,
        )),
        _ => Err(ConfigError::UnknownState(name.to_string())),
    }
}

/// Look up a built-in scene state by name.
/// Scene libraries on disk are the asset pipeline's concern; the renderer
/// ships the states its cross-validation scenes need.
pub fn from_state(name: &str) -> Result<Scene, ConfigError> {
    match name {
        "empty_env" => Ok(empty_env()),
        "furnace" => Ok(furnace()),
        "test_42" => Ok(test_42()),
        "sphere_plane" => Ok(sphere_plane()),
        _ => Err(ConfigError::UnknownState(name.to_string())),
    }
}

/// Nothing but a unit white environment
pub fn empty_env() -> Scene {
    Scene::new(
        Vec::new(),
        Vec::new(),
        vec![LightSource::sky(Color::white())],
    )
}

/// Albedo one sphere inside a unit environment
pub fn furnace() -> Scene {
    let materials = vec![Material::diffuse(Color::white())];
    let instances = vec![Instance {
        prim: Primitive::Sphere {
            center: Point3::new(0.0, 0.0, 0.0),
            radius: 1.0,
        },
        mat_id: 0,
        obj_id: 0,
        inst_id: 0,
    }];
    Scene::new(
        instances,
        materials,
        vec![LightSource::sky(Color::white())],
    )
}

/// Cornell box with a sphere, modeled after the classic teapot test state
pub fn test_42() -> Scene {
    let white = Material::diffuse(Color::new(0.73, 0.73, 0.73));
    let red = Material::diffuse(Color::new(0.65, 0.05, 0.05));
    let green = Material::diffuse(Color::new(0.12, 0.45, 0.15));
    let emitter = Material::emissive(Color::white() * 12.0);
    let materials = vec![white, red, green, emitter];

    let x = Vector3::unit_x();
    let y = Vector3::unit_y();
    let z = Vector3::unit_z();
    let mut instances = vec![
        // floor
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(0.0, -1.0, 0.0),
                edge_u: x,
                edge_v: -z,
            },
            mat_id: 0,
            obj_id: 0,
            inst_id: 0,
        },
        // ceiling
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(0.0, 1.0, 0.0),
                edge_u: x,
                edge_v: z,
            },
            mat_id: 0,
            obj_id: 1,
            inst_id: 1,
        },
        // back wall
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(0.0, 0.0, -1.0),
                edge_u: x,
                edge_v: y,
            },
            mat_id: 0,
            obj_id: 2,
            inst_id: 2,
        },
        // left wall
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(-1.0, 0.0, 0.0),
                edge_u: z,
                edge_v: y,
            },
            mat_id: 1,
            obj_id: 3,
            inst_id: 3,
        },
        // right wall
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(1.0, 0.0, 0.0),
                edge_u: -z,
                edge_v: y,
            },
            mat_id: 2,
            obj_id: 4,
            inst_id: 4,
        },
        // the teapot stand-in
        Instance {
            prim: Primitive::Sphere {
                center: Point3::new(0.3, -0.65, -0.2),
                radius: 0.35,
            },
            mat_id: 0,
            obj_id: 5,
            inst_id: 5,
        },
    ];
    let light_prim = Primitive::Rect {
        center: Point3::new(0.0, 0.995, 0.0),
        edge_u: 0.25 * x,
        edge_v: 0.25 * z,
    };
    instances.push(Instance {
        prim: light_prim.clone(),
        mat_id: 3,
        obj_id: 6,
        inst_id: 6,
    });
    let lights = vec![LightSource::area(light_prim, Color::white() * 12.0, 6)];
    Scene::new(instances, materials, lights)
}

/// Sphere in front of a large plane for silhouette coverage tests
pub fn sphere_plane() -> Scene {
    let materials = vec![
        Material::diffuse(Color::new(0.8, 0.8, 0.8)),
        Material::diffuse(Color::new(0.2, 0.4, 0.8)),
    ];
    let instances = vec![
        Instance {
            prim: Primitive::Rect {
                center: Point3::new(0.0, 0.0, -4.0),
                edge_u: 10.0 * Vector3::unit_x(),
                edge_v: 10.0 * Vector3::unit_y(),
            },
            mat_id: 0,
            obj_id: 0,
            inst_id: 0,
        },
        Instance {
            prim: Primitive::Sphere {
                center: Point3::new(0.0, 0.0, -2.0),
                radius: 0.5,
            },
            mat_id: 1,
            obj_id: 1,
            inst_id: 1,
        },
    ];
    Scene::new(
        instances,
        materials,
        vec![LightSource::sky(Color::white())],
    )
}
