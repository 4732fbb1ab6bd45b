use approx::assert_relative_eq;
use cgmath::{Point2, Vector3};

use lumen::color::Color;
use lumen::denoise::{extract_noise, spread_noise, spread_noise2};
use lumen::gbuffer::{GBufferData1, GBufferData2, GBufferPixel};
use lumen::Float;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 16;
const FOV: Float = std::f64::consts::FRAC_PI_2 as Float;

fn solid_pixel(norm: Vector3<Float>, obj_id: i32) -> GBufferPixel {
    GBufferPixel {
        data1: GBufferData1 {
            rgba: [0.5, 0.5, 0.5, 0.0],
            norm,
            depth: 2.0,
            mat_id: obj_id,
            coverage: 1.0,
        },
        data2: GBufferData2 {
            tex_coord: Point2::new(0.0, 0.0),
            obj_id,
            inst_id: obj_id,
        },
    }
}

fn uniform_gbuffer() -> Vec<GBufferPixel> {
    vec![solid_pixel(Vector3::new(0.0, 0.0, 1.0), 0); (WIDTH * HEIGHT) as usize]
}

/// Left half one object, right half another with a perpendicular normal
fn split_gbuffer() -> Vec<GBufferPixel> {
    let mut gbuffer = Vec::with_capacity((WIDTH * HEIGHT) as usize);
    for _y in 0..HEIGHT {
        for x in 0..WIDTH {
            if x < WIDTH / 2 {
                gbuffer.push(solid_pixel(Vector3::new(0.0, 0.0, 1.0), 0));
            } else {
                gbuffer.push(solid_pixel(Vector3::new(1.0, 0.0, 0.0), 1));
            }
        }
    }
    gbuffer
}

#[test]
fn spread_scales_linearly_with_input() {
    let gbuffer = uniform_gbuffer();
    let mut base: Vec<Float> = (0..WIDTH * HEIGHT)
        .map(|i| 0.1 + 0.8 * ((i * 37) % 11) as Float / 11.0)
        .collect();
    let mut scaled: Vec<Float> = base.iter().map(|v| 3.0 * v).collect();

    spread_noise(&gbuffer, &mut base, WIDTH, HEIGHT, FOV);
    spread_noise(&gbuffer, &mut scaled, WIDTH, HEIGHT, FOV);

    for (b, s) in base.iter().zip(&scaled) {
        assert_relative_eq!(3.0 * b, *s, max_relative = 1e-9);
    }
}

#[test]
fn spread_preserves_constant_field() {
    let gbuffer = uniform_gbuffer();
    let mut noise = vec![0.75; (WIDTH * HEIGHT) as usize];
    spread_noise(&gbuffer, &mut noise, WIDTH, HEIGHT, FOV);
    for v in &noise {
        assert_relative_eq!(*v, 0.75, max_relative = 1e-6);
    }
}

#[test]
fn spread_preserves_edges() {
    let gbuffer = split_gbuffer();
    let mut noise: Vec<Float> = (0..HEIGHT)
        .flat_map(|_| (0..WIDTH).map(|x| if x < WIDTH / 2 { 1.0 } else { 0.0 }))
        .collect();
    spread_noise(&gbuffer, &mut noise, WIDTH, HEIGHT, FOV);

    let mid = WIDTH / 2;
    let y = HEIGHT / 2;
    let left = noise[(y * WIDTH + mid - 1) as usize];
    let right = noise[(y * WIDTH + mid) as usize];
    assert!((left - 1.0).abs() <= 0.1, "left of the edge drifted: {}", left);
    assert!(right.abs() <= 0.1, "right of the edge drifted: {}", right);
}

#[test]
fn extract_flags_outlier_pixels() {
    let mut data = vec![Color::new(0.5, 0.5, 0.5); (WIDTH * HEIGHT) as usize];
    let hot = (HEIGHT / 2 * WIDTH + WIDTH / 2) as usize;
    data[hot] = Color::new(8.0, 8.0, 8.0);
    let noise = extract_noise(&data, WIDTH, HEIGHT, 1.0);

    let max = noise.iter().cloned().fold(0.0 as Float, Float::max);
    assert!(noise[hot] >= max - 1e-9, "outlier is not the noisiest pixel");
    // A flat region has no error at all
    assert_eq!(noise[0], 0.0);
}

#[test]
fn object_aggregation_paints_whole_objects() {
    let gbuffer = split_gbuffer();
    // Only part of the left object is noisy
    let mut noise: Vec<Float> = vec![0.0; (WIDTH * HEIGHT) as usize];
    for y in 0..HEIGHT / 2 {
        for x in 0..WIDTH / 2 {
            noise[(y * WIDTH + x) as usize] = 0.8;
        }
    }
    spread_noise2(&gbuffer, &mut noise);

    // Every pixel of the left object carries the same hint level
    let first = noise[0];
    assert!(first > 0.0);
    for y in 0..HEIGHT {
        for x in 0..WIDTH / 2 {
            assert_relative_eq!(noise[(y * WIDTH + x) as usize], first, max_relative = 1e-9);
        }
    }
    // The clean right object is clamped to the floor hint
    let right = noise[(WIDTH - 1) as usize];
    assert_relative_eq!(right, 0.1, max_relative = 1e-9);
}

#[test]
fn transparent_pixels_get_no_hint() {
    let mut gbuffer = uniform_gbuffer();
    let i = 5;
    gbuffer[i].data1.rgba[3] = 1.0;
    let mut noise = vec![0.5; (WIDTH * HEIGHT) as usize];
    spread_noise2(&gbuffer, &mut noise);
    assert_eq!(noise[i], 0.0);
}
