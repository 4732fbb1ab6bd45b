use cgmath::prelude::*;

use super::balance_heuristic;
use crate::color::Color;
use crate::config::RenderConfig;
use crate::consts;
use crate::float::*;
use crate::material::ShadeContext;
use crate::path::RayFlags;
use crate::sample::SampleStream;
use crate::scene::{Ray, Scene};

/// True when the path may no longer contribute through a light hit.
/// Caustic paths reach the light through a specular chain after at least
/// one diffuse bounce; with caustics disabled they are suppressed.
fn caustic_suppressed(flags: &RayFlags, config: &RenderConfig) -> bool {
    !config.caustics && flags.spec_prev() && flags.diff_bounces() > 0
}

/// Estimate radiance arriving along a camera ray with unidirectional
/// path tracing. Next event estimation at every diffuse vertex combined
/// with bsdf sampling through the balance heuristic.
pub fn path_trace(
    mut ray: Ray,
    scene: &Scene,
    config: &RenderConfig,
    stream: &mut dyn SampleStream,
) -> Color {
    let mut c = Color::black();
    let mut beta = Color::white();
    let mut flags = RayFlags::new();
    // Solid angle pdf of the previous bsdf sample; None after a delta bounce
    let mut prev_pdf: Option<Float> = None;

    while flags.alive() {
        let hit = match scene.ray_trace(&ray) {
            Some(hit) => hit,
            None => {
                // Environment contribution
                if let Some(sky_i) = scene.sky_index() {
                    if !caustic_suppressed(&flags, config) {
                        let sky = &scene.lights[sky_i];
                        let le = sky.le(ray.dir, ray.dir);
                        let weight = match prev_pdf {
                            Some(pdf) => {
                                let light_pdf =
                                    scene.light_pick_prob() * sky.pdf_li(1.0, 1.0);
                                balance_heuristic(pdf, light_pdf)
                            }
                            None => 1.0,
                        };
                        c += beta * le * weight;
                    }
                }
                break;
            }
        };
        let surf = scene.surface_eval(&ray, &hit);
        beta *= scene.transmittance(hit.t);
        let material = scene.material(surf.mat_id);

        // Emitter hit
        if material.is_emissive() && !surf.hit_from_inside && !caustic_suppressed(&flags, config)
        {
            let le = material.emission();
            let weight = match (prev_pdf, scene.light_of_instance(hit.inst_id)) {
                (Some(pdf), Some(light_i)) => {
                    let light = &scene.lights[light_i];
                    let cos_at_light = surf.normal.dot(-ray.dir).abs();
                    let light_pdf =
                        scene.light_pick_prob() * light.pdf_li(hit.t, cos_at_light);
                    balance_heuristic(pdf, light_pdf)
                }
                _ => 1.0,
            };
            c += beta * le * weight;
        }

        // Next event estimation, while the light segment still fits the
        // total depth budget
        if !material.is_delta() && flags.bounce() + 2 <= config.max_depth {
            if let Some((light_i, pick_prob)) = scene.sample_light(stream.next_1d()) {
                let light = &scene.lights[light_i];
                if let Some(sam) = light.sample_toward(surf.pos, stream) {
                    let mut shadow_ray = Ray::shadow(surf.pos, sam.pos);
                    shadow_ray.orig += consts::EPSILON * surf.flat_normal
                        * surf.flat_normal.dot(shadow_ray.dir).signum();
                    let sc = ShadeContext {
                        l: shadow_ray.dir,
                        v: -ray.dir,
                        n: surf.normal,
                        flat_n: surf.flat_normal,
                    };
                    let eval = material.eval(&sc, false);
                    let bsdf = eval.brdf + eval.btdf;
                    if !bsdf.is_black() && !scene.intersect_shadow(&shadow_ray) {
                        let light_pdf = pick_prob * sam.pdf;
                        let weight = balance_heuristic(light_pdf, eval.pdf_fwd);
                        let cos_t = surf.normal.dot(shadow_ray.dir).abs();
                        c += beta * sam.color * bsdf * cos_t * weight / light_pdf;
                    }
                }
            }
        }

        // Continue the path while another segment fits the depth budget.
        // A surface vertex at bounce b is path vertex b + 1.
        let mut pdf = 1.0;
        let terminate = if flags.bounce() + 2 > config.max_depth {
            true
        } else if flags.bounce() < config.pre_rr_depth {
            false
        } else if let Some(prob) = config.russian_roulette {
            let prob = prob.min(beta.luma().min(0.95).max(0.05));
            pdf *= prob;
            stream.next_1d() > prob
        } else {
            false
        };
        if terminate {
            break;
        }
        let sc = ShadeContext {
            l: -ray.dir, // unused by sampling
            v: -ray.dir,
            n: surf.normal,
            flat_n: surf.flat_normal,
        };
        match material.sample(&sc, stream, false) {
            Some(sample) => {
                pdf *= sample.pdf;
                beta *= sample.color * surf.normal.dot(sample.dir).abs() / pdf;
                ray = Ray::from_dir(surf.pos, sample.dir);
                prev_pdf = if sample.specular {
                    None
                } else {
                    Some(sample.pdf)
                };
                flags.next_bounce(sample.specular);
            }
            None => break,
        }
        if beta.is_black() {
            break;
        }
    }
    c
}
