use cgmath::prelude::*;

use crate::camera::Camera;
use crate::color::Color;
use crate::config::RenderConfig;
use crate::consts;
use crate::float::*;
use crate::material::ShadeContext;
use crate::path::{connect_eye, PathVertex, PdfVertex, RayFlags, MAX_DEPTH};
use crate::sample::SampleStream;
use crate::scene::{Ray, Scene};

/// Trace one light sub-path and splat its eye connections.
///
/// `sub_path_count` is the number of light sub-paths in the whole pass;
/// every connection is normalized against it inside the eye kernel.
pub fn light_trace(
    scene: &Scene,
    camera: &Camera,
    config: &RenderConfig,
    sub_path_count: Float,
    stream: &mut dyn SampleStream,
    splats: &mut Vec<(u32, u32, Color)>,
) {
    let (light_i, pick_prob) = match scene.sample_light(stream.next_1d()) {
        Some(res) => res,
        None => return,
    };
    let light = &scene.lights[light_i];

    let (pos, normal, pdf_a) = light.sample_pos(stream);
    let (dir, pdf_w) = light.sample_dir(normal, stream);
    if pdf_a < consts::PDF_EPSILON || pdf_w < consts::PDF_EPSILON {
        return;
    }
    let le = light.le(normal, dir);
    let mut beta = le * normal.dot(dir).abs() / (pick_prob * pdf_a * pdf_w);
    let mut ray = Ray::from_dir(pos, dir);

    let mut flags = RayFlags::new();
    let mut prev_pos = pos;
    let mut prev_cos = normal.dot(dir).abs();
    let mut pdfs = [PdfVertex::zero(); MAX_DEPTH + 2];

    while flags.alive() && flags.bounce() < config.max_depth {
        let hit = match scene.ray_trace(&ray) {
            Some(hit) => hit,
            None => break,
        };
        let surf = scene.surface_eval(&ray, &hit);
        beta *= scene.transmittance(hit.t);

        let dist2 = (surf.pos - prev_pos).magnitude2();
        let cos_here = surf.normal.dot(-ray.dir).abs();
        let last_g = prev_cos * cos_here / dist2.max(consts::PDF_EPSILON);

        let vertex = PathVertex::from_hit(&surf, ray.dir, beta, last_g, false);
        let material = scene.material(surf.mat_id);

        // Connect to the eye through a surface-to-camera shadow ray
        if !material.is_delta() {
            let shadow_ray = Ray::shadow(surf.pos, camera.pos);
            let shadow_hit = scene.ray_trace(&shadow_ray);
            let conn = connect_eye(
                &vertex,
                flags.bounce() + 1,
                sub_path_count,
                shadow_hit.as_ref(),
                scene,
                camera,
                &mut pdfs,
            );
            if conn.x >= 0 && conn.y >= 0 {
                splats.push((conn.x as u32, conn.y as u32, conn.color));
            }
        }

        // Continue with the adjoint bsdf
        let mut pdf = 1.0;
        if flags.bounce() >= config.pre_rr_depth {
            if let Some(prob) = config.russian_roulette {
                pdf *= prob;
                if stream.next_1d() > prob {
                    break;
                }
            }
        }
        let sc = ShadeContext {
            l: -ray.dir,
            v: -ray.dir,
            n: surf.normal,
            flat_n: surf.flat_normal,
        };
        match material.sample(&sc, stream, true) {
            Some(sample) => {
                pdf *= sample.pdf;
                beta *= sample.color * surf.normal.dot(sample.dir).abs() / pdf;
                prev_pos = surf.pos;
                prev_cos = surf.normal.dot(sample.dir).abs();
                ray = Ray::from_dir(surf.pos, sample.dir);
                flags.next_bounce(sample.specular);
            }
            None => break,
        }
        if beta.is_black() {
            break;
        }
    }
}
