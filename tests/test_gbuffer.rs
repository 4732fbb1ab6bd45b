use approx::assert_relative_eq;
use cgmath::prelude::*;
use cgmath::Vector3;

use lumen::gbuffer::{
    calc_gbuffer, gbuff_diff, gbuffer_eval, gbuffer_sample, surface_similarity, GBUFFER_SAMPLES,
};
use lumen::sample::plane_hammersley;
use lumen::scene;
use lumen::Float;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

#[test]
fn similarity_is_symmetric() {
    let n1 = Vector3::new(0.0, 0.0, 1.0);
    let n2 = Vector3::new(0.05, 0.0, 1.0).normalize();
    let sim_ab = surface_similarity(n1, 2.0, n2, 2.01, 0.1);
    let sim_ba = surface_similarity(n2, 2.01, n1, 2.0, 0.1);
    assert_relative_eq!(sim_ab, sim_ba, max_relative = 1e-12);
}

#[test]
fn similarity_of_identical_surfaces_is_one() {
    let n = Vector3::new(0.0, 1.0, 0.0);
    assert_relative_eq!(surface_similarity(n, 3.0, n, 3.0, 0.5), 1.0, max_relative = 1e-12);
}

#[test]
fn similarity_zero_beyond_thresholds() {
    let n1 = Vector3::new(0.0, 0.0, 1.0);
    let n2 = Vector3::new(1.0, 0.0, 0.0);
    assert_eq!(surface_similarity(n1, 2.0, n2, 2.0, 0.5), 0.0);
    assert_eq!(surface_similarity(n1, 2.0, n1, 9.0, 0.5), 0.0);
}

#[test]
fn diff_of_sample_with_itself_is_zero() {
    let scene = scene::from_state("sphere_plane").unwrap();
    let camera = scene::camera_for_state("sphere_plane", WIDTH, HEIGHT).unwrap();
    let px = gbuffer_sample(&scene, &camera, WIDTH / 2, HEIGHT / 2, (0.5, 0.5));
    assert_eq!(gbuff_diff(&px, &px, camera.fov().0, WIDTH as Float, HEIGHT as Float), 0.0);
}

#[test]
fn coverage_within_bounds() {
    let scene = scene::from_state("sphere_plane").unwrap();
    let camera = scene::camera_for_state("sphere_plane", WIDTH, HEIGHT).unwrap();
    for x in 0..WIDTH {
        let px = gbuffer_eval(x, HEIGHT / 2, &scene, &camera);
        let coverage = px.data1.coverage;
        assert!(coverage >= 1.0 / GBUFFER_SAMPLES as Float - 1e-9);
        assert!(coverage <= 1.0 + 1e-9);
    }
}

#[test]
fn sphere_interior_full_coverage_silhouette_partial() {
    let scene = scene::from_state("sphere_plane").unwrap();
    let camera = scene::camera_for_state("sphere_plane", WIDTH, HEIGHT).unwrap();

    // The sphere fills the view center
    let center = gbuffer_eval(WIDTH / 2, HEIGHT / 2, &scene, &camera);
    assert_relative_eq!(center.data1.coverage, 1.0, max_relative = 1e-9);
    assert_eq!(center.data1.mat_id, 1);

    // Far from the sphere only the plane is visible
    let outside = gbuffer_eval(2, HEIGHT / 2, &scene, &camera);
    assert_relative_eq!(outside.data1.coverage, 1.0, max_relative = 1e-9);
    assert_eq!(outside.data1.mat_id, 0);

    // Somewhere on the scan line the silhouette mixes both surfaces
    let mut found_partial = false;
    for x in 0..WIDTH {
        let px = gbuffer_eval(x, HEIGHT / 2, &scene, &camera);
        if px.data1.coverage < 1.0 - 1e-9 {
            found_partial = true;
        }
    }
    assert!(found_partial, "no silhouette pixel with partial coverage");
}

#[test]
fn medoid_matches_majority_material() {
    let scene = scene::from_state("sphere_plane").unwrap();
    let camera = scene::camera_for_state("sphere_plane", WIDTH, HEIGHT).unwrap();
    let qmc = plane_hammersley(GBUFFER_SAMPLES);

    for x in 0..WIDTH {
        let medoid = gbuffer_eval(x, HEIGHT / 2, &scene, &camera);
        let mut sphere_hits = 0;
        let mut plane_hits = 0;
        for jitter in &qmc {
            let sample = gbuffer_sample(&scene, &camera, x, HEIGHT / 2, *jitter);
            match sample.data1.mat_id {
                1 => sphere_hits += 1,
                0 => plane_hits += 1,
                _ => (),
            }
        }
        // A near tie leaves the medoid choice ambiguous
        if (sphere_hits as i32 - plane_hits as i32).abs() <= 3 {
            continue;
        }
        let majority = if sphere_hits > plane_hits { 1 } else { 0 };
        assert_eq!(
            medoid.data1.mat_id, majority,
            "medoid disagrees with majority at x = {}",
            x
        );
    }
}

#[test]
fn full_gbuffer_matches_per_pixel_eval() {
    let scene = scene::from_state("sphere_plane").unwrap();
    let camera = scene::camera_for_state("sphere_plane", 16, 16).unwrap();
    let gbuffer = calc_gbuffer(&scene, &camera, 4);
    assert_eq!(gbuffer.len(), 256);
    let single = gbuffer_eval(8, 8, &scene, &camera);
    let from_batch = &gbuffer[8 * 16 + 8];
    assert_eq!(single.data1.mat_id, from_batch.data1.mat_id);
    assert_relative_eq!(
        single.data1.depth,
        from_batch.data1.depth,
        max_relative = 1e-9
    );
}
