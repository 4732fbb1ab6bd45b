use approx::assert_relative_eq;
use cgmath::prelude::*;
use cgmath::{Point2, Point3, Rad, Vector3};

use lumen::camera::Camera;
use lumen::color::Color;
use lumen::consts;
use lumen::light::LightSource;
use lumen::material::Material;
use lumen::path::{connect_endpoints, connect_eye, PathVertex, PdfVertex};
use lumen::scene::Scene;
use lumen::Float;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn test_camera() -> Camera {
    Camera::look_at(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, -1.0),
        Vector3::unit_y(),
        Rad(consts::PI / 3.0),
        WIDTH,
        HEIGHT,
    )
}

#[test]
fn pixel_ray_screen_round_trip() {
    let camera = test_camera();
    for &(x, y) in &[(0u32, 0u32), (12, 399), (320, 240), (639, 479), (77, 3)] {
        let ray = camera.pixel_ray(x, y, (0.5, 0.5));
        let point = ray.orig + 3.0 * ray.dir;
        let screen = camera.world_to_screen(point);
        assert_relative_eq!(screen.x, x as Float, epsilon = 0.51);
        assert_relative_eq!(screen.y, y as Float, epsilon = 0.51);
    }
}

#[test]
fn screen_projection_clamps_to_bounds() {
    let camera = test_camera();
    // A point far off axis still maps into the image rectangle
    let screen = camera.world_to_screen(Point3::new(100.0, 100.0, -1.0));
    assert!(screen.x >= 0.0 && screen.x <= (WIDTH - 1) as Float);
    assert!(screen.y >= 0.0 && screen.y <= (HEIGHT - 1) as Float);
}

#[test]
fn factor_zero_outside_frustum() {
    let camera = test_camera();
    // Behind the camera
    let cf = camera.image_to_surface_factor(Point3::new(0.0, 0.0, 5.0), Vector3::unit_z());
    assert_eq!(cf.factor, 0.0);
    assert_relative_eq!(cf.z_depth, 5.0, max_relative = 1e-9);
}

#[test]
fn factor_positive_on_axis() {
    let camera = test_camera();
    let cf = camera.image_to_surface_factor(Point3::new(0.0, 0.0, -2.0), Vector3::unit_z());
    assert!(cf.factor > 0.0);
    assert_relative_eq!(cf.z_depth, 2.0, max_relative = 1e-9);
    assert_relative_eq!(cf.cam_dir.dot(Vector3::unit_z()), 1.0, max_relative = 1e-9);
}

#[test]
fn factor_falls_off_with_distance() {
    let camera = test_camera();
    let near = camera.image_to_surface_factor(Point3::new(0.0, 0.0, -1.0), Vector3::unit_z());
    let far = camera.image_to_surface_factor(Point3::new(0.0, 0.0, -4.0), Vector3::unit_z());
    // Surface density falls with the squared distance
    assert_relative_eq!(near.factor / far.factor, 16.0, max_relative = 1e-6);
}

#[test]
fn connect_eye_projects_to_center_pixel() {
    let camera = test_camera();
    let scene = Scene::new(
        Vec::new(),
        vec![Material::diffuse(Color::white())],
        vec![LightSource::sky(Color::white())],
    );
    let vertex = PathVertex {
        pos: Point3::new(0.0, 0.0, -2.0),
        normal: Vector3::unit_z(),
        flat_normal: Vector3::unit_z(),
        tex_coord: Point2::new(0.0, 0.0),
        mat_id: 0,
        ray_dir: Vector3::new(0.6, 0.0, -0.8),
        acc_color: Color::white(),
        last_g_term: 1.0,
        valid: true,
        was_spec_only: false,
        hit_from_inside: false,
    };
    let mut pdfs = [PdfVertex::zero(); 4];
    let conn = connect_eye(&vertex, 1, 1.0, None, &scene, &camera, &mut pdfs);
    assert!(!conn.color.is_black());
    assert_eq!(conn.x, (WIDTH / 2) as i32);
    assert_eq!(conn.y, (HEIGHT / 2) as i32);
    // The camera endpoint entry is written behind the connection
    assert_eq!(pdfs[2].pdf_fwd, 1.0);
    assert!(pdfs[2].pdf_rev > 0.0);
}

#[test]
fn connect_eye_blocked_by_shadow_hit() {
    let camera = test_camera();
    let scene = Scene::new(
        Vec::new(),
        vec![Material::diffuse(Color::white())],
        vec![LightSource::sky(Color::white())],
    );
    let vertex = PathVertex {
        pos: Point3::new(0.0, 0.0, -2.0),
        normal: Vector3::unit_z(),
        flat_normal: Vector3::unit_z(),
        tex_coord: Point2::new(0.0, 0.0),
        mat_id: 0,
        ray_dir: Vector3::new(0.6, 0.0, -0.8),
        acc_color: Color::white(),
        last_g_term: 1.0,
        valid: true,
        was_spec_only: false,
        hit_from_inside: false,
    };
    let blocker = lumen::scene::LiteHit {
        t: 1.0,
        prim_i: 0,
        obj_id: 0,
        inst_id: 0,
    };
    let mut pdfs = [PdfVertex::zero(); 4];
    let conn = connect_eye(&vertex, 1, 1.0, Some(&blocker), &scene, &camera, &mut pdfs);
    assert_eq!(conn.x, -1);
    assert_eq!(conn.y, -1);
    assert!(conn.color.is_black());
}

#[test]
fn endpoint_connection_through_delta_lobe_is_zero() {
    // A mirror cannot be evaluated for a fixed direction pair, so the
    // connection has zero pdfs on the light side and must return black
    let scene = Scene::new(
        Vec::new(),
        vec![
            Material::mirror(Color::white()),
            Material::diffuse(Color::white()),
        ],
        vec![LightSource::sky(Color::white())],
    );
    let lv = PathVertex {
        pos: Point3::new(0.0, 0.0, -3.0),
        normal: Vector3::unit_z(),
        flat_normal: Vector3::unit_z(),
        tex_coord: Point2::new(0.0, 0.0),
        mat_id: 0,
        ray_dir: Vector3::new(0.6, 0.0, -0.8),
        acc_color: Color::white(),
        last_g_term: 1.0,
        valid: true,
        was_spec_only: false,
        hit_from_inside: false,
    };
    let cv = PathVertex {
        pos: Point3::new(0.0, 1.0, -2.0),
        normal: -Vector3::unit_y(),
        flat_normal: -Vector3::unit_y(),
        tex_coord: Point2::new(0.0, 0.0),
        mat_id: 1,
        ray_dir: Vector3::new(0.0, 0.6, -0.8),
        acc_color: Color::white(),
        last_g_term: 1.0,
        valid: true,
        was_spec_only: false,
        hit_from_inside: false,
    };
    let mut pdfs = [PdfVertex::zero(); 6];
    let color = connect_endpoints(&lv, &cv, 2, 3, &scene, &mut pdfs);
    assert!(color.is_black());
    // The delta side leaves sentinels, never plain zeros
    assert!(pdfs[2].pdf_fwd < 0.0);
}

#[test]
fn endpoint_connection_between_invalid_vertices_is_zero() {
    let scene = Scene::new(
        Vec::new(),
        vec![Material::diffuse(Color::white())],
        vec![LightSource::sky(Color::white())],
    );
    let lv = PathVertex::invalid();
    let cv = PathVertex::invalid();
    let mut pdfs = [PdfVertex::zero(); 6];
    let color = connect_endpoints(&lv, &cv, 2, 3, &scene, &mut pdfs);
    assert!(color.is_black());
}
