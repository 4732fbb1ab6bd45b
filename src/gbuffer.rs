//! Multi-sample anti-aliased first-hit estimator.
//!
//! Every pixel casts a set of jittered primary rays and keeps the sample
//! most similar to all others, with the size of its cluster as coverage.

use std::path::Path;

use cgmath::prelude::*;
use cgmath::{Point2, Vector3};

use log::warn;

use crate::camera::Camera;
use crate::color::Color;
use crate::float::*;
use crate::renderer::RenderError;
use crate::sample::plane_hammersley;
use crate::scene::Scene;

pub const GBUFFER_SAMPLES: usize = 16;

const BACKGROUND_DEPTH: Float = 1e6;
/// Normal difference above which two samples never count as similar
const MAX_NORMAL_DIFF: Float = 0.1;

#[derive(Clone, Copy, Debug)]
pub struct GBufferData1 {
    /// Surface color; the last component is transparency
    pub rgba: [Float; 4],
    pub norm: Vector3<Float>,
    pub depth: Float,
    pub mat_id: i32,
    pub coverage: Float,
}

#[derive(Clone, Copy, Debug)]
pub struct GBufferData2 {
    pub tex_coord: Point2<Float>,
    pub obj_id: i32,
    pub inst_id: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct GBufferPixel {
    pub data1: GBufferData1,
    pub data2: GBufferData2,
}

impl GBufferPixel {
    fn background() -> Self {
        GBufferPixel {
            data1: GBufferData1 {
                rgba: [0.0, 0.0, 0.0, 1.0],
                norm: Vector3::zero(),
                depth: BACKGROUND_DEPTH,
                mat_id: -1,
                coverage: 0.0,
            },
            data2: GBufferData2 {
                tex_coord: Point2::new(0.0, 0.0),
                obj_id: -1,
                inst_id: -1,
            },
        }
    }
}

/// World space footprint of one pixel at the given distance
fn projected_pixel_size(dist: Float, fov: Float, w: Float, h: Float) -> Float {
    if dist > 0.0 {
        2.0 * ((fov / w) * dist).max((fov / h) * dist)
    } else {
        1000.0
    }
}

/// Similarity of two surfaces from their normals and depths, in [0, 1]
pub fn surface_similarity(
    n1: Vector3<Float>,
    d1: Float,
    n2: Vector3<Float>,
    d2: Float,
    max_depth_diff: Float,
) -> Float {
    let dist = (n1 - n2).magnitude();
    if dist >= MAX_NORMAL_DIFF {
        return 0.0;
    }
    if (d1 - d2).abs() >= max_depth_diff {
        return 0.0;
    }
    let normal_similar = (1.0 - dist / MAX_NORMAL_DIFF).sqrt();
    let depth_similar = (1.0 - (d1 - d2).abs() / max_depth_diff).sqrt();
    normal_similar * depth_similar
}

/// Combined surface, object, material and alpha difference of two samples
pub fn gbuff_diff(s1: &GBufferPixel, s2: &GBufferPixel, fov: Float, w: Float, h: Float) -> Float {
    let pp_size = projected_pixel_size(s1.data1.depth, fov, w, h);
    let surface_similar = surface_similarity(
        s1.data1.norm,
        s1.data1.depth,
        s2.data1.norm,
        s2.data1.depth,
        pp_size,
    );
    let surface_diff = 1.0 - surface_similar;
    let obj_diff = if s1.data2.inst_id == s2.data2.inst_id && s1.data2.obj_id == s2.data2.obj_id
    {
        0.0
    } else {
        1.0
    };
    let mat_diff = if s1.data1.mat_id == s2.data1.mat_id {
        0.0
    } else {
        1.0
    };
    let alpha_diff = (s1.data1.rgba[3] - s2.data1.rgba[3]).abs();

    surface_diff + obj_diff + mat_diff + alpha_diff
}

/// First hit record for one primary ray
pub fn gbuffer_sample(scene: &Scene, camera: &Camera, x: u32, y: u32, jitter: (Float, Float)) -> GBufferPixel {
    let mut result = GBufferPixel::background();
    let ray = camera.pixel_ray(x, y, jitter);
    if let Some(hit) = scene.ray_trace(&ray) {
        let surf = scene.surface_eval(&ray, &hit);
        let material = scene.material(surf.mat_id);
        let color = eval_diffuse_color(material);
        result.data1.depth = hit.t;
        result.data1.norm = surf.normal;
        result.data1.rgba = [color.r(), color.g(), color.b(), 0.0];
        result.data1.mat_id = surf.mat_id;
        result.data1.coverage = 1.0;
        result.data2.tex_coord = surf.tex_coord;
        result.data2.obj_id = hit.obj_id;
        result.data2.inst_id = hit.inst_id;
    }
    result
}

fn eval_diffuse_color(material: &crate::material::Material) -> Color {
    if material.is_emissive() {
        material.emission()
    } else {
        // Flat evaluation, the preview color does not need directions
        let sc = crate::material::ShadeContext {
            l: Vector3::unit_z(),
            v: Vector3::unit_z(),
            n: Vector3::unit_z(),
            flat_n: Vector3::unit_z(),
        };
        material.eval(&sc, false).brdf * crate::consts::PI
    }
}

/// Estimate the G-buffer pixel at (x, y): cast the jittered sample set,
/// compute pairwise differences and keep the medoid with its coverage.
pub fn gbuffer_eval(x: u32, y: u32, scene: &Scene, camera: &Camera) -> GBufferPixel {
    let fov = camera.fov().0;
    let w = camera.width.to_float();
    let h = camera.height.to_float();

    let qmc = plane_hammersley(GBUFFER_SAMPLES);
    let mut samples = [GBufferPixel::background(); GBUFFER_SAMPLES];
    for (i, jitter) in qmc.iter().enumerate() {
        samples[i] = gbuffer_sample(scene, camera, x, y, *jitter);
    }

    let mut min_diff = crate::consts::MAX;
    let mut min_diff_id = 0;
    for i in 0..GBUFFER_SAMPLES {
        let mut diff = 0.0;
        let mut coverage = 0.0;
        for j in 0..GBUFFER_SAMPLES {
            let this_diff = gbuff_diff(&samples[i], &samples[j], fov, w, h);
            diff += this_diff;
            if this_diff < 1.0 {
                coverage += 1.0;
            }
        }
        coverage *= 1.0 / GBUFFER_SAMPLES.to_float();
        samples[i].data1.coverage = coverage;

        if diff < min_diff {
            min_diff = diff;
            min_diff_id = i;
        }
    }
    samples[min_diff_id]
}

/// Evaluate the G-buffer for the whole image with worker threads over rows
pub fn calc_gbuffer(scene: &Scene, camera: &Camera, max_threads: usize) -> Vec<GBufferPixel> {
    let width = camera.width as usize;
    let height = camera.height as usize;
    let mut gbuffer = vec![GBufferPixel::background(); width * height];
    let rows_per_chunk = (height + max_threads - 1) / max_threads.max(1);

    std::thread::scope(|scope| {
        for (chunk_i, chunk) in gbuffer.chunks_mut(rows_per_chunk * width).enumerate() {
            scope.spawn(move || {
                let y0 = chunk_i * rows_per_chunk;
                for (i, pixel) in chunk.iter_mut().enumerate() {
                    let x = (i % width) as u32;
                    let y = (y0 + i / width) as u32;
                    *pixel = gbuffer_eval(x, y, scene, camera);
                }
            });
        }
    });
    gbuffer
}

const COLOR_TABLE: [u32; 16] = [
    0x0010_1010, 0x0000_F000, 0x0000_00F0, 0x00F0_0000, 0x00F0_F010, 0x0010_F0F0, 0x00F0_10F0,
    0x0070_30C0, 0x00A0_A0A0, 0x0090_2000, 0x0000_5020, 0x00B0_4010, 0x0060_0030, 0x0000_8010,
    0x0020_5000, 0x0000_4040,
];

fn id_color(id: i32) -> [u8; 3] {
    let v = COLOR_TABLE[(id.max(0) as usize) % 16];
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

fn gray(v: Float) -> [u8; 3] {
    let b = (v.max(0.0).min(1.0) * 255.0) as u8;
    [b, b, b]
}

fn save_layer<F>(
    gbuffer: &[GBufferPixel],
    width: u32,
    height: u32,
    path: &Path,
    pixel_fn: F,
) -> Result<(), RenderError>
where
    F: Fn(&GBufferPixel) -> [u8; 3],
{
    let mut data = Vec::with_capacity((3 * width * height) as usize);
    for y in (0..height).rev() {
        for x in 0..width {
            let px = &gbuffer[(y * width + x) as usize];
            data.extend_from_slice(&pixel_fn(px));
        }
    }
    let image = image::RgbImage::from_raw(width, height, data)
        .expect("G-buffer dimensions do not match the pixel data");
    image.save(path)?;
    Ok(())
}

/// Dump every G-buffer layer as a numbered png into the folder
pub fn save_debug_layers(
    gbuffer: &[GBufferPixel],
    width: u32,
    height: u32,
    folder: &Path,
) -> Result<(), RenderError> {
    std::fs::create_dir_all(folder)?;

    // Depth normalized over the finite range
    let mut min_depth = crate::consts::MAX;
    let mut max_depth: crate::float::Float = 0.0;
    for px in gbuffer {
        let depth = px.data1.depth;
        if depth > 0.0 && depth < BACKGROUND_DEPTH {
            min_depth = min_depth.min(depth);
            max_depth = max_depth.max(depth);
        }
    }
    if max_depth <= 1e-20 {
        warn!("gbuffer depth layer is empty");
        min_depth = 0.0;
        max_depth = 1.0;
    }
    save_layer(gbuffer, width, height, &folder.join("01_depth.png"), |px| {
        let depth = px.data1.depth;
        if depth > 0.0 && depth < BACKGROUND_DEPTH {
            gray(((depth - min_depth) / max_depth).max(0.0))
        } else {
            gray(0.0)
        }
    })?;
    save_layer(gbuffer, width, height, &folder.join("02_normals.png"), |px| {
        let n = px.data1.norm;
        [
            (n.x.abs() * 255.0) as u8,
            (n.y.abs() * 255.0) as u8,
            (n.z.abs() * 255.0) as u8,
        ]
    })?;
    save_layer(gbuffer, width, height, &folder.join("03_texcolor.png"), |px| {
        [
            (px.data1.rgba[0].max(0.0).min(1.0) * 255.0) as u8,
            (px.data1.rgba[1].max(0.0).min(1.0) * 255.0) as u8,
            (px.data1.rgba[2].max(0.0).min(1.0) * 255.0) as u8,
        ]
    })?;
    save_layer(gbuffer, width, height, &folder.join("04_texcoord.png"), |px| {
        [
            (px.data2.tex_coord.x.max(0.0).min(1.0) * 255.0) as u8,
            (px.data2.tex_coord.y.max(0.0).min(1.0) * 255.0) as u8,
            0,
        ]
    })?;
    save_layer(gbuffer, width, height, &folder.join("05_coverage.png"), |px| {
        gray(px.data1.coverage)
    })?;
    save_layer(gbuffer, width, height, &folder.join("06_objid.png"), |px| {
        id_color(px.data2.obj_id)
    })?;
    save_layer(gbuffer, width, height, &folder.join("07_instid.png"), |px| {
        id_color(px.data2.inst_id)
    })?;
    save_layer(gbuffer, width, height, &folder.join("08_matid.png"), |px| {
        id_color(px.data1.mat_id)
    })?;
    save_layer(gbuffer, width, height, &folder.join("09_alpha.png"), |px| {
        gray(px.data1.rgba[3])
    })?;
    Ok(())
}
