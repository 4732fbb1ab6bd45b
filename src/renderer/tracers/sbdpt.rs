//! Stochastic connection bidirectional path tracing.
//!
//! Every sample draws one total depth and one split and evaluates the single
//! corresponding connection strategy, weighted against all strategies of the
//! same depth through the shared pdf array.

use cgmath::prelude::*;
use cgmath::Point3;

use crate::camera::Camera;
use crate::color::Color;
use crate::config::RenderConfig;
use crate::consts;
use crate::float::*;
use crate::material::ShadeContext;
use crate::path::{
    connect_endpoints, connect_eye, connect_shadow, mis_weight, PathVertex, PdfVertex,
    VertexCache, MAX_DEPTH,
};
use crate::sample::SampleStream;
use crate::scene::{Ray, Scene};

/// Contribution of one bidirectional sample
#[derive(Clone, Debug)]
pub struct SbdptSample {
    /// Contribution credited to the pixel the sample started from
    pub at_pixel: Color,
    /// Light tracing contribution landing on an arbitrary pixel
    pub splat: Option<(u32, u32, Color)>,
}

impl SbdptSample {
    fn zero() -> Self {
        Self {
            at_pixel: Color::black(),
            splat: None,
        }
    }

    pub fn luma(&self) -> Float {
        self.at_pixel.luma() + self.splat.map_or(0.0, |(_, _, c)| c.luma())
    }
}

/// State carried between bounces of a sub-path trace
struct BounceState {
    prev_pos: Point3<Float>,
    prev_cos: Float,
    /// Solid angle pdf of the previous direction sample; None for delta
    prev_pdf: Option<Float>,
}

fn g_between(prev: &BounceState, pos: Point3<Float>, cos_here: Float) -> Float {
    let dist2 = (pos - prev.prev_pos).magnitude2();
    prev.prev_cos * cos_here / dist2.max(consts::PDF_EPSILON)
}

/// Area pdf of the new vertex as generated by the previous bounce,
/// sentinel-encoded for delta samples
fn gen_pdf(prev: &BounceState, g: Float) -> Float {
    match prev.prev_pdf {
        Some(pdf_w) => (pdf_w / prev.prev_cos.max(consts::PDF_EPSILON)) * g,
        None => -g,
    }
}

/// Reverse scatter pdf converted to the area measure of the vertex
/// behind the scattering one
fn reverse_pdf(pdf_w: Float, cos_in: Float, last_g: Float, specular: bool) -> Float {
    if specular || pdf_w == 0.0 {
        -last_g
    } else {
        (pdf_w / cos_in.max(consts::PDF_EPSILON)) * last_g
    }
}

/// Outcome of a camera sub-path trace
struct CameraSubPath {
    /// Vertex at the split index, ready for a connection
    end: PathVertex,
    /// Emitter radiance times throughput when the trace ran down to the light
    emitter_hit: Color,
}

/// Trace the camera side of the path down to the split vertex.
///
/// Vertices take pdf array indices d-1, d-2, .. while the camera endpoint
/// bookkeeping value lands at index d. With `to_emitter` the trace runs all
/// the way to index 0 which must be an emitting surface.
#[allow(clippy::too_many_arguments)]
fn trace_camera_sub_path(
    x: u32,
    y: u32,
    d: usize,
    split: usize,
    scene: &Scene,
    camera: &Camera,
    sub_path_count: Float,
    stream: &mut dyn SampleStream,
    pdfs: &mut [PdfVertex],
) -> Option<CameraSubPath> {
    let to_emitter = split == 0;
    let hits_needed = d - split;
    let mut ray = camera.pixel_ray(x, y, stream.next_2d());
    let mut beta = Color::white();
    let mut spec_only = true;
    let mut state = BounceState {
        prev_pos: camera.pos,
        prev_cos: 1.0,
        prev_pdf: None,
    };

    for i in 0..hits_needed {
        let idx = d - 1 - i;
        let hit = match scene.ray_trace(&ray) {
            Some(hit) => hit,
            None => {
                // Only the final vertex may resolve to the sky
                if to_emitter && i == hits_needed - 1 {
                    return sky_end(scene, d, &ray, beta, &state, pdfs);
                }
                return None;
            }
        };
        let surf = scene.surface_eval(&ray, &hit);
        beta *= scene.transmittance(hit.t);
        let cos_here = surf.normal.dot(-ray.dir).abs();
        let last_g = if i == 0 {
            1.0
        } else {
            g_between(&state, surf.pos, cos_here)
        };
        let material = scene.material(surf.mat_id);

        if i == 0 {
            let cf = camera.image_to_surface_factor(surf.pos, surf.normal);
            pdfs[d] = PdfVertex::new(1.0, cf.factor / sub_path_count);
        } else {
            pdfs[idx + 1].pdf_rev = gen_pdf(&state, last_g);
        }

        if i == hits_needed - 1 {
            let vertex = PathVertex::from_hit(&surf, ray.dir, beta, last_g, spec_only);
            if !to_emitter {
                return Some(CameraSubPath {
                    end: vertex,
                    emitter_hit: Color::black(),
                });
            }
            // The path closes on a light surface
            if !material.is_emissive() || surf.hit_from_inside {
                return None;
            }
            let light_i = scene.light_of_instance(hit.inst_id)?;
            let light = &scene.lights[light_i];
            let cos_at_light = cos_here;
            let l_pdf = light.pdf_fwd(cos_at_light);
            // Depth one paths have no eye connection counterpart, so the
            // light endpoint must not weigh against one
            if d >= 2 {
                pdfs[0] = PdfVertex::new(l_pdf.pdf_a * scene.light_pick_prob(), 1.0);
                pdfs[1].pdf_fwd =
                    (l_pdf.pdf_w / cos_at_light.max(consts::PDF_EPSILON)) * last_g;
            }
            return Some(CameraSubPath {
                end: vertex,
                emitter_hit: beta * material.emission(),
            });
        }

        // Bounce towards the light side
        let sc = ShadeContext {
            l: -ray.dir,
            v: -ray.dir,
            n: surf.normal,
            flat_n: surf.flat_normal,
        };
        let sample = material.sample(&sc, stream, false)?;
        // Scatter density of the vertex behind this one, seen from the light
        if idx + 1 <= d - 1 {
            let rev_w = if sample.specular {
                0.0
            } else {
                let eval = material.eval(
                    &ShadeContext {
                        l: sample.dir,
                        v: -ray.dir,
                        n: surf.normal,
                        flat_n: surf.flat_normal,
                    },
                    false,
                );
                eval.pdf_rev
            };
            pdfs[idx + 1].pdf_fwd = reverse_pdf(rev_w, cos_here, last_g, sample.specular);
        }
        beta *= sample.color * surf.normal.dot(sample.dir).abs() / sample.pdf;
        spec_only = spec_only && sample.specular;
        state = BounceState {
            prev_pos: surf.pos,
            prev_cos: surf.normal.dot(sample.dir).abs(),
            prev_pdf: if sample.specular {
                None
            } else {
                Some(sample.pdf)
            },
        };
        ray = Ray::from_dir(surf.pos, sample.dir);
    }
    None
}

/// Close a camera sub-path on the sky
fn sky_end(
    scene: &Scene,
    d: usize,
    ray: &Ray,
    beta: Color,
    state: &BounceState,
    pdfs: &mut [PdfVertex],
) -> Option<CameraSubPath> {
    let sky_i = scene.sky_index()?;
    let sky = &scene.lights[sky_i];
    let l_pdf = sky.pdf_fwd(1.0);
    // Virtual vertex on the sky sphere behind the escape direction
    let g = state.prev_cos / crate::light::SKY_RADIUS.powi(2);
    if d >= 2 {
        pdfs[0] = PdfVertex::new(l_pdf.pdf_a * scene.light_pick_prob(), 1.0);
        pdfs[1].pdf_fwd = l_pdf.pdf_w * g;
        pdfs[1].pdf_rev = gen_pdf(state, g);
    } else {
        // Direct sky view: the camera endpoint entry has no surface to
        // evaluate, the single strategy takes the full weight
        pdfs[d] = PdfVertex::new(1.0, 1.0);
    }
    let mut vertex = PathVertex::invalid();
    vertex.pos = ray.orig + crate::light::SKY_RADIUS * ray.dir;
    vertex.ray_dir = ray.dir;
    vertex.acc_color = beta;
    Some(CameraSubPath {
        end: vertex,
        emitter_hit: beta * sky.le(ray.dir, ray.dir),
    })
}

/// Outcome of a light sub-path trace
struct LightSubPath {
    end: PathVertex,
}

/// Trace the light side of the path up to the split vertex.
/// Vertices take pdf array indices 0, 1, .. split-1.
fn trace_light_sub_path(
    split: usize,
    scene: &Scene,
    stream: &mut dyn SampleStream,
    pdfs: &mut [PdfVertex],
) -> Option<LightSubPath> {
    let (light_i, pick_prob) = scene.sample_light(stream.next_1d())?;
    let light = &scene.lights[light_i];
    let (pos, normal, pdf_a) = light.sample_pos(stream);
    let (dir, pdf_w) = light.sample_dir(normal, stream);
    if pdf_a < consts::PDF_EPSILON || pdf_w < consts::PDF_EPSILON {
        return None;
    }
    pdfs[0] = PdfVertex::new(pick_prob * pdf_a, 1.0);
    let le = light.le(normal, dir);
    let mut beta = le * normal.dot(dir).abs() / (pick_prob * pdf_a * pdf_w);
    let mut ray = Ray::from_dir(pos, dir);
    let mut spec_only = false;
    let mut state = BounceState {
        prev_pos: pos,
        prev_cos: normal.dot(dir).abs(),
        prev_pdf: Some(pdf_w),
    };

    for idx in 1..split {
        let hit = scene.ray_trace(&ray)?;
        let surf = scene.surface_eval(&ray, &hit);
        beta *= scene.transmittance(hit.t);
        let cos_here = surf.normal.dot(-ray.dir).abs();
        let last_g = g_between(&state, surf.pos, cos_here);
        pdfs[idx].pdf_fwd = gen_pdf(&state, last_g);

        let vertex = PathVertex::from_hit(&surf, ray.dir, beta, last_g, spec_only);
        if idx == split - 1 {
            return Some(LightSubPath { end: vertex });
        }

        let material = scene.material(surf.mat_id);
        let sc = ShadeContext {
            l: -ray.dir,
            v: -ray.dir,
            n: surf.normal,
            flat_n: surf.flat_normal,
        };
        let sample = material.sample(&sc, stream, true)?;
        let rev_w = if sample.specular {
            0.0
        } else {
            let eval = material.eval(
                &ShadeContext {
                    l: sample.dir,
                    v: -ray.dir,
                    n: surf.normal,
                    flat_n: surf.flat_normal,
                },
                true,
            );
            eval.pdf_rev
        };
        pdfs[idx].pdf_rev = reverse_pdf(rev_w, cos_here, last_g, sample.specular);

        beta *= sample.color * surf.normal.dot(sample.dir).abs() / sample.pdf;
        spec_only = spec_only && sample.specular;
        state = BounceState {
            prev_pos: surf.pos,
            prev_cos: surf.normal.dot(sample.dir).abs(),
            prev_pdf: if sample.specular {
                None
            } else {
                Some(sample.pdf)
            },
        };
        ray = Ray::from_dir(surf.pos, sample.dir);
    }
    None
}

/// Evaluate one stochastic bidirectional sample for the pixel.
///
/// The total depth and the split are drawn once; the contribution is scaled
/// by the inverse of their pick probabilities and weighted by the balance
/// heuristic over all splits of the same depth.
pub fn sample_sbdpt(
    x: u32,
    y: u32,
    scene: &Scene,
    camera: &Camera,
    config: &RenderConfig,
    sub_path_count: Float,
    stream: &mut dyn SampleStream,
    mut cache: Option<(&mut VertexCache, usize)>,
) -> SbdptSample {
    if scene.lights.is_empty() {
        return SbdptSample::zero();
    }
    let max_depth = config.max_depth.min(MAX_DEPTH - 1);
    let d = 1 + (stream.next_1d() * max_depth.to_float()) as usize;
    let d = d.min(max_depth);
    let s = (stream.next_1d() * (d + 1).to_float()) as usize;
    let s = s.min(d);
    let scale = max_depth.to_float() * (d + 1).to_float();

    let mut pdfs = [PdfVertex::zero(); MAX_DEPTH + 2];
    pdfs[0].pdf_rev = 1.0;

    if s == d {
        // Pure light tracing strategy: connect the last light vertex to the eye
        if d < 2 {
            // A light vertex straight into the camera carries no surface;
            // strategy (s, t) = (0, 2) samples these paths instead
            return SbdptSample::zero();
        }
        let lp = match trace_light_sub_path(d, scene, stream, &mut pdfs) {
            Some(lp) => lp,
            None => return SbdptSample::zero(),
        };
        let shadow_ray = Ray::shadow(lp.end.pos, camera.pos);
        let shadow_hit = scene.ray_trace(&shadow_ray);
        let conn = connect_eye(
            &lp.end,
            d - 1,
            sub_path_count,
            shadow_hit.as_ref(),
            scene,
            camera,
            &mut pdfs,
        );
        if conn.x < 0 || conn.y < 0 {
            return SbdptSample::zero();
        }
        let weight = mis_weight(&pdfs[..=d], s);
        if weight <= 0.0 {
            return SbdptSample::zero();
        }
        return SbdptSample {
            at_pixel: Color::black(),
            splat: Some((conn.x as u32, conn.y as u32, scale * weight * conn.color)),
        };
    }

    let cp = match trace_camera_sub_path(
        x,
        y,
        d,
        s,
        scene,
        camera,
        sub_path_count,
        stream,
        &mut pdfs,
    ) {
        Some(cp) => cp,
        None => return SbdptSample::zero(),
    };
    // Persist the split vertex for the chain based integrators
    if let Some((cache, thread)) = cache.as_mut() {
        cache.store(*thread, d - s - 1, &cp.end);
    }

    let color = if s == 0 {
        // The camera path closed on the light by itself
        cp.emitter_hit
    } else if s == 1 {
        // Explicit light sample connection
        let (light_i, pick_prob) = match scene.sample_light(stream.next_1d()) {
            Some(res) => res,
            None => return SbdptSample::zero(),
        };
        let light = &scene.lights[light_i];
        let sam = match light.sample_toward(cp.end.pos, stream) {
            Some(sam) => sam,
            None => return SbdptSample::zero(),
        };
        let mut shadow_ray = Ray::shadow(cp.end.pos, sam.pos);
        shadow_ray.orig += consts::EPSILON
            * cp.end.flat_normal
            * cp.end.flat_normal.dot(shadow_ray.dir).signum();
        if scene.intersect_shadow(&shadow_ray) {
            return SbdptSample::zero();
        }
        let conn = connect_shadow(&cp.end, d - 1, light, &sam, pick_prob, scene, &mut pdfs);
        cp.end.acc_color * conn
    } else {
        // Join the two sub-paths
        let lp = match trace_light_sub_path(s, scene, stream, &mut pdfs) {
            Some(lp) => lp,
            None => return SbdptSample::zero(),
        };
        let shadow_ray = Ray::shadow(lp.end.pos, cp.end.pos);
        if scene.intersect_shadow(&shadow_ray) {
            return SbdptSample::zero();
        }
        let conn = connect_endpoints(&lp.end, &cp.end, s, d, scene, &mut pdfs);
        lp.end.acc_color * cp.end.acc_color * conn
    };

    if color.is_black() {
        return SbdptSample::zero();
    }
    let weight = mis_weight(&pdfs[..=d], s);
    if weight <= 0.0 {
        return SbdptSample::zero();
    }
    SbdptSample {
        at_pixel: scale * weight * color,
        splat: None,
    }
}
