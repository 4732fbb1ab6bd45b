use cgmath::{Point2, Point3, Vector3};
use pretty_assertions::assert_eq;

use lumen::color::Color;
use lumen::path::{PathVertex, VertexCache, FLAG_HIT_FROM_INSIDE, FLAG_VALID, FLAG_WAS_SPEC};

fn sample_vertex() -> PathVertex {
    PathVertex {
        pos: Point3::new(1.5, -2.25, 0.125),
        normal: Vector3::new(0.0, 1.0, 0.0),
        flat_normal: Vector3::new(0.0, 0.0, 1.0),
        tex_coord: Point2::new(0.25, 0.75),
        mat_id: 42,
        ray_dir: Vector3::new(0.0, -1.0, 0.0),
        acc_color: Color::new(0.5, 1.0, 2.0),
        last_g_term: 0.0625,
        valid: true,
        was_spec_only: false,
        hit_from_inside: true,
    }
}

#[test]
fn pack_uses_five_records() {
    let records = sample_vertex().pack();
    assert_eq!(records.len(), 5);
}

#[test]
fn pack_unpack_round_trip() {
    let vertex = sample_vertex();
    let restored = PathVertex::unpack(&vertex.pack());

    // All chosen values are exactly representable in f32
    assert_eq!(restored.pos, vertex.pos);
    assert_eq!(restored.normal, vertex.normal);
    assert_eq!(restored.flat_normal, vertex.flat_normal);
    assert_eq!(restored.tex_coord, vertex.tex_coord);
    assert_eq!(restored.mat_id, vertex.mat_id);
    assert_eq!(restored.ray_dir, vertex.ray_dir);
    assert_eq!(restored.acc_color, vertex.acc_color);
    assert_eq!(restored.last_g_term, vertex.last_g_term);
    assert_eq!(restored.valid, vertex.valid);
    assert_eq!(restored.was_spec_only, vertex.was_spec_only);
    assert_eq!(restored.hit_from_inside, vertex.hit_from_inside);
}

#[test]
fn flag_bits_layout() {
    let mut vertex = sample_vertex();
    vertex.valid = true;
    vertex.was_spec_only = true;
    vertex.hit_from_inside = false;
    let records = vertex.pack();
    let bits = records[4][3].to_bits();
    assert_eq!(bits, FLAG_VALID | FLAG_WAS_SPEC);

    vertex.hit_from_inside = true;
    let bits = vertex.pack()[4][3].to_bits();
    assert_eq!(bits, FLAG_VALID | FLAG_WAS_SPEC | FLAG_HIT_FROM_INSIDE);
}

#[test]
fn record_layout_matches_wire_format() {
    let vertex = sample_vertex();
    let [r0, r1, r2, r3, r4] = vertex.pack();
    // Three geometric records
    assert_eq!(r0[..3], [1.5, -2.25, 0.125]);
    assert_eq!(r0[3], 0.25);
    assert_eq!(r1[..3], [0.0, 1.0, 0.0]);
    assert_eq!(r1[3], 0.75);
    assert_eq!(r2[..3], [0.0, 0.0, 1.0]);
    assert_eq!(r2[3].to_bits() as i32, 42);
    // Ray direction and geometry term
    assert_eq!(r3, [0.0, -1.0, 0.0, 0.0625]);
    // Throughput and flags
    assert_eq!(r4[..3], [0.5, 1.0, 2.0]);
    assert_eq!(r4[3].to_bits(), FLAG_VALID | FLAG_HIT_FROM_INSIDE);
}

#[test]
fn invalid_vertex_stays_invalid() {
    let vertex = PathVertex::invalid();
    let restored = PathVertex::unpack(&vertex.pack());
    assert!(!restored.valid);
}

#[test]
fn vertex_cache_round_trip() {
    let mut cache = VertexCache::new(4, 6);
    let mut a = sample_vertex();
    a.mat_id = 1;
    let mut b = sample_vertex();
    b.mat_id = 2;

    cache.store(0, 0, &a);
    cache.store(3, 5, &b);

    assert_eq!(cache.load(0, 0).mat_id, 1);
    assert_eq!(cache.load(3, 5).mat_id, 2);
    // Untouched slots hold invalid vertices
    assert!(!cache.load(1, 0).valid);
}
