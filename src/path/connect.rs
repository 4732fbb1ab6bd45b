//! Connection kernels for the bidirectional integrators.
//!
//! None of these trace visibility; the caller resolves the shadow ray and
//! either passes the hit in or discards the returned throughput.

use cgmath::prelude::*;

use super::{PathVertex, PdfVertex};
use crate::camera::Camera;
use crate::color::Color;
use crate::consts;
use crate::float::*;
use crate::light::{LightSource, ShadowSample};
use crate::material::ShadeContext;
use crate::scene::{LiteHit, Scene};

/// Result of connecting a light vertex to the eye
#[derive(Clone, Copy, Debug)]
pub struct EyeConnection {
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl EyeConnection {
    fn none() -> Self {
        Self {
            x: -1,
            y: -1,
            color: Color::black(),
        }
    }
}

/// Connect a light path vertex to the eye.
///
/// `lt_depth` is the number of light side vertices before the connection and
/// `sub_path_count` the total number of light sub-paths in the pass. The
/// shadow hit comes from the caller's surface-to-eye ray; a hit closer than
/// the camera blocks the connection.
pub fn connect_eye(
    lv: &PathVertex,
    lt_depth: usize,
    sub_path_count: Float,
    shadow_hit: Option<&LiteHit>,
    scene: &Scene,
    camera: &Camera,
    pdfs: &mut [PdfVertex],
) -> EyeConnection {
    let cf = camera.image_to_surface_factor(lv.pos, lv.normal);
    let blocked = shadow_hit.map_or(false, |hit| hit.t <= cf.z_depth);
    if cf.factor <= 0.0 || blocked {
        return EyeConnection::none();
    }
    let surface_to_image = 1.0 / cf.factor;

    let material = scene.material(lv.mat_id);
    let sc = ShadeContext {
        l: cf.cam_dir,
        v: -lv.ray_dir,
        n: lv.normal,
        flat_n: lv.flat_normal,
    };
    let eval = material.eval(&sc, true);
    let color_connect = eval.brdf + eval.btdf;
    let pdf_rev_w = eval.pdf_rev;

    // The reverse pdf towards the previous light vertex is not known yet;
    // reconstruct it from the connection evaluation.
    let cos_curr = lv.ray_dir.dot(lv.normal).abs();
    let pdf_rev_wp = pdf_rev_w / cos_curr.max(consts::PDF_EPSILON);
    let camera_pdf_a = cf.factor / sub_path_count;

    pdfs[lt_depth].pdf_rev = if pdf_rev_w == 0.0 {
        -lv.last_g_term
    } else {
        pdf_rev_wp * lv.last_g_term
    };
    pdfs[lt_depth + 1] = PdfVertex::new(1.0, camera_pdf_a);

    // Divide by the surface-to-image factor so the contribution is measured
    // w.r.t. image plane area, and by the number of light sub-paths which is
    // the sample count of this technique.
    let sample_color = lv.acc_color * color_connect / (sub_path_count * surface_to_image);

    let energy = sample_color.r().powi(2) + sample_color.g().powi(2) + sample_color.b().powi(2);
    if energy < consts::ENERGY_FLOOR {
        return EyeConnection::none();
    }

    let screen = camera.world_to_screen(lv.pos);
    EyeConnection {
        x: (screen.x + 0.5) as i32,
        y: (screen.y + 0.5) as i32,
        color: sample_color,
    }
}

/// Connect a camera path vertex to a sampled point on a light.
///
/// `cam_depth` is the camera trace depth t. Returns the unshadowed
/// connection throughput.
pub fn connect_shadow(
    cv: &PathVertex,
    cam_depth: usize,
    light: &LightSource,
    sam: &ShadowSample,
    light_pick_prob: Float,
    scene: &Scene,
    pdfs: &mut [PdfVertex],
) -> Color {
    let shadow_dir = (sam.pos - cv.pos).normalize();

    let material = scene.material(cv.mat_id);
    let sc = ShadeContext {
        l: shadow_dir,
        v: -cv.ray_dir,
        n: cv.normal,
        flat_n: cv.flat_normal,
    };
    let eval = material.eval(&sc, false);
    let pdf_fwd_at1_w = eval.pdf_rev;

    let cos_out1 = shadow_dir.dot(cv.normal).max(consts::PDF_EPSILON);
    let cos_out2 = (-shadow_dir.dot(cv.normal)).max(consts::PDF_EPSILON);
    let inverse_cos = material.has_btdf() && shadow_dir.dot(cv.normal) < -0.01;
    let cos_out = if inverse_cos { cos_out2 } else { cos_out1 };
    let cos_at_light = sam.cos_at_light.max(consts::PDF_EPSILON);
    let cos_prev = (-cv.ray_dir.dot(cv.normal)).max(consts::PDF_EPSILON);

    let brdf_val = eval.brdf * cos_out1 + eval.btdf * cos_out2;
    let pdf_rev_wp = eval.pdf_fwd / cos_out.max(consts::PDF_EPSILON);

    let shadow_dist = (cv.pos - sam.pos).magnitude();
    let g_term = cos_out * cos_at_light / shadow_dist.powi(2).max(consts::PDF_EPSILON);

    let l_pdf = light.pdf_fwd(cos_at_light);

    pdfs[0] = PdfVertex::new(l_pdf.pdf_a * light_pick_prob, 1.0);
    pdfs[1].pdf_fwd = (l_pdf.pdf_w / cos_at_light) * g_term;
    pdfs[1].pdf_rev = if eval.pdf_fwd == 0.0 {
        -g_term
    } else {
        pdf_rev_wp * g_term
    };
    if cam_depth > 1 {
        pdfs[2].pdf_fwd = if pdf_fwd_at1_w == 0.0 {
            -cv.last_g_term
        } else {
            (pdf_fwd_at1_w / cos_prev) * cv.last_g_term
        };
    }

    let explicit_pdf = sam.pdf.max(consts::PDF_EPSILON);
    (1.0 / light_pick_prob) * sam.color * brdf_val / explicit_pdf
}

/// Connect the end points of the light and camera sub-paths at split `s`
/// of a path with total depth `depth`.
pub fn connect_endpoints(
    lv: &PathVertex,
    cv: &PathVertex,
    s: usize,
    depth: usize,
    scene: &Scene,
    pdfs: &mut [PdfVertex],
) -> Color {
    if !lv.valid || !cv.valid {
        return Color::black();
    }

    let diff = cv.pos - lv.pos;
    let dist2 = diff.magnitude2().max(consts::PDF_EPSILON);
    let dist = dist2.sqrt();
    let l_to_c = diff / dist;

    let light_mat = scene.material(lv.mat_id);
    let l_eval = light_mat.eval(
        &ShadeContext {
            l: l_to_c,
            v: -lv.ray_dir,
            n: lv.normal,
            flat_n: lv.flat_normal,
        },
        true,
    );
    let light_brdf = l_eval.brdf + l_eval.btdf;
    let sign_l = if light_mat.has_btdf() && l_to_c.dot(lv.normal) < -0.01 {
        -1.0
    } else {
        1.0
    };

    let cam_mat = scene.material(cv.mat_id);
    let c_eval = cam_mat.eval(
        &ShadeContext {
            l: -l_to_c,
            v: -cv.ray_dir,
            n: cv.normal,
            flat_n: cv.flat_normal,
        },
        false,
    );
    let cam_brdf = c_eval.brdf + c_eval.btdf;
    // The camera side evaluates with swapped roles, so its forward pdf is
    // the reverse pdf of the joint path and vice versa.
    let cam_pdf_rev_w = c_eval.pdf_fwd;
    let cam_pdf_fwd_w = c_eval.pdf_rev;
    let sign_c = if cam_mat.has_btdf() && (-l_to_c).dot(cv.normal) < -0.01 {
        -1.0
    } else {
        1.0
    };

    let cos_at_light = sign_l * lv.normal.dot(l_to_c);
    let cos_at_camera = -sign_c * cv.normal.dot(l_to_c);
    let cos_at_light_prev = -lv.normal.dot(lv.ray_dir);
    let cos_at_camera_prev = -cv.normal.dot(cv.ray_dir);

    let g_term = cos_at_light * cos_at_camera / dist2;
    // Connection through the surface back side is disallowed without a btdf
    if g_term < 0.0 {
        return Color::black();
    }

    let light_pdf_fwd_wp = l_eval.pdf_fwd / cos_at_light.max(consts::PDF_EPSILON);
    let camera_pdf_rev_wp = cam_pdf_rev_w / cos_at_camera.max(consts::PDF_EPSILON);

    pdfs[s].pdf_fwd = if light_pdf_fwd_wp == 0.0 {
        -g_term
    } else {
        light_pdf_fwd_wp * g_term
    };
    pdfs[s].pdf_rev = if camera_pdf_rev_wp == 0.0 {
        -g_term
    } else {
        camera_pdf_rev_wp * g_term
    };

    pdfs[s - 1].pdf_rev = if l_eval.pdf_rev == 0.0 {
        -lv.last_g_term
    } else {
        lv.last_g_term * (l_eval.pdf_rev / cos_at_light_prev.max(consts::PDF_EPSILON))
    };

    if depth > 3 {
        pdfs[s + 1].pdf_fwd = if cam_pdf_fwd_w == 0.0 {
            -cv.last_g_term
        } else {
            cv.last_g_term * (cam_pdf_fwd_w / cos_at_camera_prev.max(consts::PDF_EPSILON))
        };
    }

    let fwd_unevaluatable = light_pdf_fwd_wp < consts::PDF_EPSILON
        || (depth > 3 && cam_pdf_fwd_w < consts::PDF_EPSILON);
    let rev_unevaluatable =
        camera_pdf_rev_wp < consts::PDF_EPSILON || l_eval.pdf_rev < consts::PDF_EPSILON;
    if fwd_unevaluatable && rev_unevaluatable {
        return Color::black();
    }

    light_brdf * cam_brdf * g_term
}
