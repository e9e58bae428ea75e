// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slotmap::SecondaryMap;

use crate::mesh::halfedge::validation::{self, ConsistencyError};
use crate::mesh::halfedge::{edit_ops, primitives, spatial_index, triangulate};
use crate::pipeline::*;
use crate::prelude::*;

/* ========== */
/*  Fixtures  */
/* ========== */

fn quad() -> HalfEdgeMesh {
    primitives::Quad::build(Vec3::ZERO, Vec3::Y, Vec3::X, Vec2::ONE)
}

fn cube() -> HalfEdgeMesh {
    primitives::Box::build(Vec3::ZERO, Vec3::ONE)
}

/// Two triangles sharing the diagonal of a unit square.
fn two_triangles() -> HalfEdgeMesh {
    HalfEdgeMesh::build_from_polygons(
        &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        &[[0u32, 1, 2], [0, 2, 3]],
    )
    .unwrap()
}

/// A flat 2x2 grid of unit quads on the XZ plane (9 vertices, 4 faces).
fn grid_2x2() -> HalfEdgeMesh {
    let mut points = Vec::new();
    for z in 0..3 {
        for x in 0..3 {
            points.push(Vec3::new(x as f32, 0.0, z as f32));
        }
    }
    let idx = |x: u32, z: u32| z * 3 + x;
    let mut polygons = Vec::new();
    for z in 0..2 {
        for x in 0..2 {
            polygons.push(vec![
                idx(x, z),
                idx(x + 1, z),
                idx(x + 1, z + 1),
                idx(x, z + 1),
            ]);
        }
    }
    HalfEdgeMesh::build_from_polygons(&points, &polygons).unwrap()
}

/// An L-shaped hexagon (a 2x2 square with the far 1x1 corner cut away),
/// concave at (1, 0, 1). Total area 3.
fn l_shape_points() -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 0.0),
        Vec3::new(2.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 2.0),
        Vec3::new(0.0, 0.0, 2.0),
    ]
}

fn assert_valid(mesh: &HalfEdgeMesh) {
    if let Err(err) = validation::validate(&mesh.read_connectivity()) {
        panic!("Mesh should be consistent, found: {err}");
    }
}

fn vertex_at(mesh: &HalfEdgeMesh, pos: Vec3) -> VertexId {
    let conn = mesh.read_connectivity();
    let positions = mesh.read_positions();
    let found = conn
        .iter_vertices()
        .map(|(v, _)| v)
        .find(|&v| positions[v].distance(pos) < 1e-5)
        .expect("No vertex at the given position");
    found
}

fn face_area(conn: &MeshConnectivity, positions: &Positions, face: FaceId) -> f32 {
    let verts = conn.face_vertices(face);
    let mut area = Vec3::ZERO;
    for (a, b) in verts.iter_cpy().circular_tuple_windows() {
        area += positions[a].cross(positions[b]);
    }
    area.length() * 0.5
}

fn total_area(mesh: &HalfEdgeMesh) -> f32 {
    let conn = mesh.read_connectivity();
    let positions = mesh.read_positions();
    conn.iter_faces()
        .map(|(f, _)| face_area(&conn, &positions, f))
        .sum()
}

fn counts(mesh: &HalfEdgeMesh) -> (usize, usize, usize) {
    let conn = mesh.read_connectivity();
    (conn.num_vertices(), conn.num_halfedges(), conn.num_faces())
}

/* ==================== */
/*  Element store       */
/* ==================== */

#[test]
fn build_quad_counts() {
    let mesh = quad();
    // 4 face halfedges plus 4 boundary caps.
    assert_eq!(counts(&mesh), (4, 8, 1));
    assert_valid(&mesh);
}

#[test]
fn build_cube_counts_and_euler() {
    let mesh = cube();
    let (v, h, f) = counts(&mesh);
    assert_eq!((v, h, f), (8, 24, 6));
    // Closed manifold: V - E + F = 2.
    assert_eq!(v as i32 - (h as i32 / 2) + f as i32, 2);
    assert_valid(&mesh);
}

#[test]
fn pairing_is_an_involution() {
    let mesh = cube();
    let conn = mesh.read_connectivity();
    for (h, _) in conn.iter_halfedges() {
        assert_eq!(conn.at_halfedge(h).pair().pair().end(), h);
    }
}

#[test]
fn build_rejects_non_manifold_input() {
    // Two polygons traverse the oriented edge 0 -> 1.
    let result = HalfEdgeMesh::build_from_polygons(
        &[
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
        ],
        &[[0u32, 1, 2], [0, 1, 3]],
    );
    assert!(result.is_err());
}

#[test]
fn deep_copy_shares_nothing() {
    let mesh = cube();
    let copy = mesh.clone();
    // Mutating the copy's positions must not show through the original.
    let v = copy.read_connectivity().iter_vertices().next().unwrap().0;
    copy.write_positions()[v] = Vec3::splat(100.0);
    assert_eq!(counts(&mesh), counts(&copy));
    assert!(mesh.read_positions()[v].distance(Vec3::splat(100.0)) > 1.0);
}

#[test]
fn merge_from_splices_content() {
    let mut mesh = quad();
    let other = primitives::Quad::build(Vec3::new(5.0, 0.0, 0.0), Vec3::Y, Vec3::X, Vec2::ONE);
    mesh.merge_from(&other);
    assert_eq!(counts(&mesh), (8, 16, 2));
    assert_valid(&mesh);
    // Positions came along with the merged elements.
    vertex_at(&mesh, Vec3::new(5.5, 0.0, 0.5));
}

#[test]
fn bounding_box_of_offset_cube() {
    let mesh = primitives::Box::build(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0));
    let (center, size) = mesh.bounding_box();
    assert!(center.distance(Vec3::new(1.0, 2.0, 3.0)) < 1e-5);
    assert!(size.distance(Vec3::splat(2.0)) < 1e-5);
}

/* ==================== */
/*  Channels            */
/* ==================== */

#[test]
fn channel_duplicate_name_fails() {
    let mut mesh = quad();
    mesh.channels
        .create_channel::<FaceId, f32>("material")
        .unwrap();
    assert!(mesh
        .channels
        .create_channel::<FaceId, f32>("material")
        .is_err());
    // The same name under a different key type is a different channel.
    mesh.channels
        .create_channel::<VertexId, f32>("material")
        .unwrap();
}

#[test]
fn channel_reads_default_for_unset_keys() {
    let mut mesh = quad();
    let id = mesh.channels.ensure_channel::<FaceId, f32>("material");
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    assert_eq!(mesh.channels.read_channel(id).unwrap()[face], 0.0);
}

/* ==================== */
/*  Euler operators     */
/* ==================== */

#[test]
fn delete_face_leaves_boundary_loop() {
    let mut mesh = cube();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    edit_ops::delete_face(&mut mesh, face).unwrap();
    // Halfedges and pairing untouched, one face gone.
    assert_eq!(counts(&mesh), (8, 24, 5));
    assert_valid(&mesh);

    let conn = mesh.read_connectivity();
    let boundary = conn
        .iter_halfedges()
        .filter(|(h, _)| conn.at_halfedge(*h).is_boundary().unwrap())
        .count();
    assert_eq!(boundary, 4);
}

#[test]
fn delete_face_stale_id_fails() {
    let mut mesh = cube();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    edit_ops::delete_face(&mut mesh, face).unwrap();
    let before = counts(&mesh);
    assert!(edit_ops::delete_face(&mut mesh, face).is_err());
    assert_eq!(counts(&mesh), before);
}

#[test]
fn cut_face_disconnects_region() {
    let mut mesh = cube();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    edit_ops::cut_face(&mut mesh, face).unwrap();
    // The face and its four halfedges are gone; the rim stays unpaired until
    // capped.
    assert_eq!(counts(&mesh), (8, 20, 5));
    assert_valid(&mesh);

    let mut conn = mesh.write_connectivity();
    let unpaired = conn
        .iter_halfedges()
        .filter(|(h, _)| conn.at_halfedge(*h).pair().is_err())
        .count();
    assert_eq!(unpaired, 4);

    // Capping restores full pairing.
    conn.cap_boundaries();
    drop(conn);
    assert_eq!(counts(&mesh), (8, 24, 5));
    assert_valid(&mesh);
}

#[test]
fn delete_edge_merges_triangles_into_quad() {
    let mut mesh = two_triangles();
    let v0 = vertex_at(&mesh, Vec3::ZERO);
    let v2 = vertex_at(&mesh, Vec3::new(1.0, 1.0, 0.0));

    let shared = {
        let conn = mesh.read_connectivity();
        conn.at_vertex(v0).halfedge_to(v2).try_end().unwrap()
    };
    let merged = edit_ops::delete_edge(&mut mesh, shared).unwrap();
    let merged = merged.expect("Both sides had a face, so a merge must happen");

    assert_eq!(counts(&mesh), (4, 8, 1));
    assert_valid(&mesh);

    // The quad keeps both shared vertices: its vertex set is the union of the
    // two triangles' vertex sets.
    let conn = mesh.read_connectivity();
    let verts = conn.face_vertices(merged);
    assert_eq!(verts.len(), 4);
    assert!(verts.contains(&v0) && verts.contains(&v2));
}

#[test]
fn delete_edge_inherits_pair_side_properties() {
    let mut mesh = two_triangles();
    let v0 = vertex_at(&mesh, Vec3::ZERO);
    let v1 = vertex_at(&mesh, Vec3::new(1.0, 0.0, 0.0));
    let v2 = vertex_at(&mesh, Vec3::new(1.0, 1.0, 0.0));

    // Tag the triangle containing v1. The halfedge v0 -> v2 lies on the other
    // triangle, so the tagged one is on the pair side.
    let tagged = {
        let conn = mesh.read_connectivity();
        conn.at_vertex(v1).adjacent_faces().unwrap()[0]
    };
    edit_ops::set_face_tag(&mut mesh, &[tagged], "material", 3.0).unwrap();

    let shared = {
        let conn = mesh.read_connectivity();
        conn.at_vertex(v0).halfedge_to(v2).try_end().unwrap()
    };
    let merged = edit_ops::delete_edge(&mut mesh, shared).unwrap().unwrap();

    let material = mesh
        .channels
        .read_channel_by_name::<FaceId, f32>("material")
        .unwrap();
    assert_eq!(material[merged], 3.0);
}

#[test]
fn delete_edge_on_boundary_dissolves_face() {
    let mut mesh = quad();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    let h = {
        let conn = mesh.read_connectivity();
        conn.at_face(face).halfedge().try_end().unwrap()
    };
    let merged = edit_ops::delete_edge(&mut mesh, h).unwrap();
    assert!(merged.is_none());

    // The face dissolved into the boundary; what remains is a face-less ring.
    let (v, h, f) = counts(&mesh);
    assert_eq!((v, h, f), (4, 6, 0));
    assert_valid(&mesh);
}

#[test]
fn delete_edge_stale_id_fails() {
    let mut mesh = two_triangles();
    let v0 = vertex_at(&mesh, Vec3::ZERO);
    let v2 = vertex_at(&mesh, Vec3::new(1.0, 1.0, 0.0));
    let shared = {
        let conn = mesh.read_connectivity();
        conn.at_vertex(v0).halfedge_to(v2).try_end().unwrap()
    };
    edit_ops::delete_edge(&mut mesh, shared).unwrap();
    let before = counts(&mesh);
    assert!(edit_ops::delete_edge(&mut mesh, shared).is_err());
    assert_eq!(counts(&mesh), before);
}

#[test]
fn delete_faces_sweeps_and_recaps() {
    let mut mesh = cube();
    let faces: Vec<FaceId> = mesh
        .read_connectivity()
        .iter_faces()
        .map(|(f, _)| f)
        .take(2)
        .collect();
    edit_ops::delete_faces(&mut mesh, &faces).unwrap();
    let conn = mesh.read_connectivity();
    assert_eq!(conn.num_faces(), 4);
    // All 8 cube corners still touch a surviving face.
    assert_eq!(conn.num_vertices(), 8);
    drop(conn);
    assert_valid(&mesh);
}

#[test]
fn divide_edge_inserts_midpoint() {
    let mesh = quad();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    let h = {
        let conn = mesh.read_connectivity();
        conn.at_face(face).halfedge().try_end().unwrap()
    };
    let (a, b) = {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();
        let (src, dst) = conn.at_halfedge(h).src_dst_pair().unwrap();
        (positions[src], positions[dst])
    };
    let mid = {
        let mut conn = mesh.write_connectivity();
        let mut positions = mesh.write_positions();
        edit_ops::divide_edge(&mut conn, &mut positions, h, 0.5).unwrap()
    };
    assert_eq!(counts(&mesh), (5, 10, 1));
    assert_eq!(
        mesh.read_connectivity().face_vertices(face).len(),
        5,
        "The face loop now passes through the new vertex"
    );
    assert_valid(&mesh);
    assert!(mesh.read_positions()[mid].distance(a.lerp(b, 0.5)) < 1e-5);
}

#[test]
fn collapse_edge_merges_vertices() {
    let mut mesh = cube();
    let h = mesh
        .read_connectivity()
        .iter_halfedges()
        .next()
        .unwrap()
        .0;
    let kept = edit_ops::collapse_edge(&mut mesh, h).unwrap();
    let (v, h_count, f) = counts(&mesh);
    assert_eq!((v, h_count, f), (7, 22, 6));
    assert!(mesh.read_connectivity().vertex_exists(kept));
    assert_valid(&mesh);
}

#[test]
fn split_face_shares_properties() {
    let mut mesh = quad();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    edit_ops::set_face_tag(&mut mesh, &[face], "material", 7.0).unwrap();

    let verts = mesh.read_connectivity().face_vertices(face);
    let h = edit_ops::split_face(&mut mesh, verts[0], verts[2]).unwrap();
    let new_face = {
        let conn = mesh.read_connectivity();
        conn.at_halfedge(h).pair().face().try_end().unwrap()
    };
    let material = mesh
        .channels
        .read_channel_by_name::<FaceId, f32>("material")
        .unwrap();
    assert_eq!(material[new_face], 7.0);
}

/* ==================== */
/*  Coplanar fusion     */
/* ==================== */

#[test]
fn fuse_grid_to_single_face() {
    let mut mesh = grid_2x2();
    assert_eq!(counts(&mesh).2, 4);
    let area_before = total_area(&mesh);

    edit_ops::fuse_coplanar_faces(&mut mesh, 0.0).unwrap();
    let (v, h, f) = counts(&mesh);
    assert_eq!(f, 1);
    // The center vertex had no surviving halfedge and was swept.
    assert_eq!(v, 8);
    // 8 outer edges, each a face halfedge plus a boundary cap.
    assert_eq!(h, 16);
    assert!((total_area(&mesh) - area_before).abs() < 1e-4);
    assert_valid(&mesh);

    // Fixed point: a second run cannot reduce the face count further.
    edit_ops::fuse_coplanar_faces(&mut mesh, 0.0).unwrap();
    assert_eq!(counts(&mesh).2, 1);
}

#[test]
fn fuse_single_face_region_is_identity() {
    let mut mesh = cube();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    let before = counts(&mesh);
    // No cube face is coplanar with a neighbor.
    let fused = edit_ops::fuse_coplanar_face(&mut mesh, face, 0.0).unwrap();
    assert_eq!(fused, face);
    assert_eq!(counts(&mesh), before);
}

#[test]
fn fuse_keeps_seed_face_properties() {
    let mut mesh = grid_2x2();
    let faces: Vec<FaceId> = mesh
        .read_connectivity()
        .iter_faces()
        .map(|(f, _)| f)
        .collect();
    edit_ops::set_face_tag(&mut mesh, &faces[..1], "material", 2.0).unwrap();
    let fused = edit_ops::fuse_coplanar_face(&mut mesh, faces[0], 0.0).unwrap();
    let material = mesh
        .channels
        .read_channel_by_name::<FaceId, f32>("material")
        .unwrap();
    assert_eq!(material[fused], 2.0);
}

#[test]
fn fuse_respects_angle_tolerance() {
    // Two quads meeting at a slight crease along the Z axis.
    let crease = 0.2f32;
    let mut mesh = HalfEdgeMesh::build_from_polygons(
        &[
            Vec3::new(-1.0, crease, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, crease, 1.0),
            Vec3::new(1.0, crease, 0.0),
            Vec3::new(1.0, crease, 1.0),
        ],
        &[[0u32, 1, 2, 3], [1, 4, 5, 2]],
    )
    .unwrap();

    // Not coplanar: a zero tolerance must not fuse them.
    edit_ops::fuse_coplanar_faces(&mut mesh, 0.0).unwrap();
    assert_eq!(counts(&mesh).2, 2);

    // A generous tolerance does.
    edit_ops::fuse_coplanar_faces(&mut mesh, 0.5).unwrap();
    assert_eq!(counts(&mesh).2, 1);
    assert_valid(&mesh);
}

/* ==================== */
/*  Triangulation       */
/* ==================== */

#[test]
fn triangulate_square_face() {
    let mut mesh = quad();
    let area_before = total_area(&mesh);
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;

    let triangles = triangulate::triangulate_face(&mut mesh, face).unwrap();
    assert_eq!(triangles.len(), 2);

    // 2 triangles, 5 halfedge pairs: the 4 original boundary edges plus the
    // new diagonal.
    let (v, h, f) = counts(&mesh);
    assert_eq!((v, h, f), (4, 10, 2));
    assert_valid(&mesh);

    let conn = mesh.read_connectivity();
    for f in triangles.iter_cpy() {
        assert_eq!(conn.face_vertices(f).len(), 3);
    }
    drop(conn);
    assert!((total_area(&mesh) - area_before).abs() < 1e-5);
}

#[test]
fn triangulate_ngon_yields_n_minus_two() {
    let mut mesh = primitives::Circle::build(Vec3::ZERO, 1.0, 8);
    let area_before = total_area(&mesh);
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    let triangles = triangulate::triangulate_face(&mut mesh, face).unwrap();
    assert_eq!(triangles.len(), 6);
    assert!((total_area(&mesh) - area_before).abs() < 1e-4);
    assert_valid(&mesh);
}

#[test]
fn triangulate_concave_face() {
    let mut mesh = primitives::Polygon::new(l_shape_points()).build().unwrap();
    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();
        assert!(!triangulate::face_is_convex(&conn, &positions, face).unwrap());
    }

    let triangles = triangulate::triangulate_concave_faces(&mut mesh).unwrap();
    assert_eq!(triangles.len(), 4);
    assert!((total_area(&mesh) - 3.0).abs() < 1e-4);
    assert_valid(&mesh);

    // Every triangle covers actual polygon area (no sliver outside the L).
    let conn = mesh.read_connectivity();
    let positions = mesh.read_positions();
    for f in triangles.iter_cpy() {
        assert!(face_area(&conn, &positions, f) > 0.2);
    }
}

#[test]
fn triangulate_concave_skips_convex_faces() {
    let mut mesh = quad();
    let triangles = triangulate::triangulate_concave_faces(&mut mesh).unwrap();
    assert!(triangles.is_empty());
    assert_eq!(counts(&mesh).2, 1);
}

#[test]
fn triangulate_face_star_around_vertex() {
    let mut mesh = cube();
    let v = mesh.read_connectivity().iter_vertices().next().unwrap().0;
    let triangles = triangulate::triangulate_face_star(&mut mesh, v).unwrap();
    // Three quads around a cube corner, two triangles each.
    assert_eq!(triangles.len(), 6);
    assert_eq!(counts(&mesh).2, 9);
    assert_valid(&mesh);
}

#[test]
fn triangulate_then_fuse_restores_cube() {
    let mut mesh = cube();
    triangulate::triangulate(&mut mesh).unwrap();
    let (v, h, f) = counts(&mesh);
    assert_eq!((v, h, f), (8, 36, 12));
    assert_eq!(v as i32 - (h as i32 / 2) + f as i32, 2);
    assert_valid(&mesh);

    // The two triangles on each cube face are coplanar; fusing them restores
    // the six quads.
    edit_ops::fuse_coplanar_faces(&mut mesh, 0.0).unwrap();
    let (v, h, f) = counts(&mesh);
    assert_eq!((v, h, f), (8, 24, 6));
    assert_eq!(v as i32 - (h as i32 / 2) + f as i32, 2);
    assert_valid(&mesh);
}

/* ==================== */
/*  Validation          */
/* ==================== */

#[test]
fn validate_flags_malformed_halfedge() {
    let mesh = quad();
    assert_valid(&mesh);
    {
        let mut conn = mesh.write_connectivity();
        conn.alloc_halfedge(HalfEdge::default());
    }
    assert!(matches!(
        validation::validate(&mesh.read_connectivity()),
        Err(ConsistencyError::MissingNext(_))
    ));
}

#[test]
fn validate_flags_orphan_vertex() {
    let mesh = quad();
    {
        let mut conn = mesh.write_connectivity();
        let mut positions = mesh.write_positions();
        conn.alloc_vertex(&mut positions, Vec3::ZERO, None);
    }
    assert!(matches!(
        validation::validate(&mesh.read_connectivity()),
        Err(ConsistencyError::InvalidVertexHalfEdge(_))
    ));
}

/* ==================== */
/*  Normals & transform */
/* ==================== */

#[test]
fn flat_normals_of_cube() {
    let mut mesh = cube();
    edit_ops::set_flat_normals(&mut mesh).unwrap();
    let normals = mesh.read_face_normals().unwrap();
    let conn = mesh.read_connectivity();
    let mut sum = Vec3::ZERO;
    for (f, _) in conn.iter_faces() {
        assert!((normals[f].length() - 1.0).abs() < 1e-5);
        sum += normals[f];
    }
    // Opposite cube faces cancel out.
    assert!(sum.length() < 1e-4);
}

#[test]
fn smooth_normals_of_cube() {
    let mut mesh = cube();
    edit_ops::set_smooth_normals(&mut mesh).unwrap();
    let normals = mesh.read_vertex_normals().unwrap();
    let conn = mesh.read_connectivity();
    for (v, _) in conn.iter_vertices() {
        assert!((normals[v].length() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn transform_translates_positions() {
    let mut mesh = cube();
    edit_ops::transform(&mut mesh, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, Vec3::ONE).unwrap();
    let (center, _) = mesh.bounding_box();
    assert!(center.distance(Vec3::new(10.0, 0.0, 0.0)) < 1e-5);
}

/* ==================== */
/*  Spatial index       */
/* ==================== */

#[test]
fn nearest_vertex_queries() {
    let mesh = cube();
    let tree = spatial_index::vertex_tree(&mesh);

    let corner = Vec3::splat(0.5);
    let (pos, key) = spatial_index::nearest(&tree, Vec3::splat(0.4)).unwrap();
    assert!(pos.distance(corner) < 1e-5);
    assert_eq!(key, vertex_at(&mesh, corner));

    let neighbors = spatial_index::k_nearest(&tree, corner, 4);
    assert_eq!(neighbors.len(), 4);
    // Ordered closest first: the corner itself, then its three edge
    // neighbors at distance 1.
    assert!(neighbors[0].0.distance(corner) < 1e-5);
    for (pos, _) in &neighbors[1..] {
        assert!((pos.distance(corner) - 1.0).abs() < 1e-5);
    }
}

#[test]
fn nearest_face_center_query() {
    let mesh = grid_2x2();
    let tree = spatial_index::face_center_tree(&mesh);
    let (center, _f) = spatial_index::nearest(&tree, Vec3::new(0.4, 0.0, 0.6)).unwrap();
    assert!(center.distance(Vec3::new(0.5, 0.0, 0.5)) < 1e-5);
}

/* ==================== */
/*  Generators          */
/* ==================== */

#[test]
fn polygon_generator_flat() {
    let mesh = primitives::Polygon::new(l_shape_points()).build().unwrap();
    assert_eq!(counts(&mesh), (6, 12, 1));
    assert_valid(&mesh);
}

#[test]
fn polygon_generator_prism() {
    let square = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(0.0, 0.0, 1.0),
    ];
    let mesh = primitives::Polygon::with_thickness(square, 1.0).build().unwrap();
    // A prism over a square is a cube.
    assert_eq!(counts(&mesh), (8, 24, 6));
    assert_valid(&mesh);
}

#[test]
fn polygon_generator_rejects_degenerate_input() {
    assert!(primitives::Polygon::new(vec![Vec3::ZERO, Vec3::X]).build().is_err());
}

/* ==================== */
/*  Pipeline            */
/* ==================== */

#[derive(Clone)]
struct Translate(Vec3);
impl MeshModifier for Translate {
    fn apply_self(&self, mut mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        edit_ops::transform(&mut mesh, self.0, Vec3::ZERO, Vec3::ONE)?;
        Ok(mesh)
    }
}

#[derive(Clone)]
struct Scale(Vec3);
impl MeshModifier for Scale {
    fn apply_self(&self, mut mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        edit_ops::transform(&mut mesh, Vec3::ZERO, Vec3::ZERO, self.0)?;
        Ok(mesh)
    }
}

#[derive(Clone)]
struct AlwaysFails;
impl MeshModifier for AlwaysFails {
    fn apply_self(&self, _mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        bail!("This modifier never succeeds")
    }
}

#[derive(Clone)]
struct PanicsHard;
impl MeshModifier for PanicsHard {
    fn apply_self(&self, _mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        panic!("Simulates the execution substrate killing the task")
    }
}

/// Splits every face into a fan of triangles around its vertex average. A
/// face with n vertices becomes n triangles, which makes face counts easy to
/// predict across repeated applications.
#[derive(Clone)]
struct FanSubdividor;
impl MeshSubdividor for FanSubdividor {
    fn apply_self(&self, mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();

        let mut points = Vec::new();
        let mut index_of = SecondaryMap::<VertexId, u32>::new();
        for (v, _) in conn.iter_vertices() {
            index_of.insert(v, points.len() as u32);
            points.push(positions[v]);
        }

        let mut polygons = Vec::new();
        for (f, _) in conn.iter_faces() {
            let center_index = points.len() as u32;
            points.push(conn.face_vertex_average(&positions, f));
            for (a, b) in conn.face_vertices(f).iter_cpy().circular_tuple_windows() {
                polygons.push(vec![index_of[a], index_of[b], center_index]);
            }
        }

        HalfEdgeMesh::build_from_polygons(&points, &polygons)
    }
}

/// Simplifies by fusing coplanar faces.
#[derive(Clone)]
struct CoplanarSimplifier;
impl MeshSimplifier for CoplanarSimplifier {
    fn apply_self(&self, mut mesh: HalfEdgeMesh) -> Result<HalfEdgeMesh> {
        edit_ops::fuse_coplanar_faces(&mut mesh, 0.0)?;
        Ok(mesh)
    }
}

fn drain(pipeline: &mut MeshPipeline) {
    for _ in 0..10_000 {
        pipeline.update();
        if pipeline.is_finished() {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("Pipeline did not drain in time");
}

#[test]
fn pipeline_create_task() {
    let mut pipeline = MeshPipeline::new(HalfEdgeMesh::new());
    pipeline.queue_create(Box::new(primitives::Polygon::new(l_shape_points())));
    assert!(!pipeline.is_finished());
    drain(&mut pipeline);
    assert_eq!(counts(pipeline.mesh()), (6, 12, 1));
    assert_valid(pipeline.mesh());
}

#[test]
fn pipeline_failing_task_is_a_noop() {
    let mut pipeline = MeshPipeline::new(cube());
    let before = counts(pipeline.mesh());
    pipeline.queue_modify(Box::new(AlwaysFails));
    // The task after the failing one still runs.
    pipeline.queue_modify(Box::new(Translate(Vec3::X)));
    drain(&mut pipeline);

    assert_eq!(counts(pipeline.mesh()), before);
    let (center, _) = pipeline.mesh().bounding_box();
    assert!(center.distance(Vec3::X) < 1e-5);
}

#[test]
fn pipeline_cancelled_task_keeps_mesh() {
    let mut pipeline = MeshPipeline::new(cube());
    let before = counts(pipeline.mesh());
    pipeline.queue_modify(Box::new(PanicsHard));
    drain(&mut pipeline);
    assert!(pipeline.is_finished());
    assert_eq!(counts(pipeline.mesh()), before);

    // The pipeline recovers: a fresh worker runs the next task.
    pipeline.queue_modify(Box::new(Translate(Vec3::X)));
    drain(&mut pipeline);
    let (center, _) = pipeline.mesh().bounding_box();
    assert!(center.distance(Vec3::X) < 1e-5);
}

#[test]
fn pipeline_repeated_subdivision_matches_sync() {
    // Queued path: three subdivision tasks, drained through updates.
    let mut queued = MeshPipeline::new(quad());
    queued.queue_subdivide_rep(&FanSubdividor, 3);
    drain(&mut queued);

    // Sync path: the pipeline is idle, so subdivide_rep applies immediately.
    let mut sync = MeshPipeline::new(quad());
    sync.subdivide_rep(&FanSubdividor, 3).unwrap();

    // A quad fans into 4 triangles, then 12, then 36.
    assert_eq!(counts(queued.mesh()).2, 36);
    assert_eq!(counts(queued.mesh()), counts(sync.mesh()));
    assert_valid(queued.mesh());
}

#[test]
fn pipeline_runs_tasks_in_fifo_order() {
    let mut pipeline = MeshPipeline::new(cube());
    pipeline.queue_modify(Box::new(Translate(Vec3::ONE)));
    pipeline.queue_modify(Box::new(Scale(Vec3::splat(2.0))));
    drain(&mut pipeline);

    // (p + 1) * 2 centers the cube at (2, 2, 2). The reverse order would
    // land at (1, 1, 1).
    let (center, _) = pipeline.mesh().bounding_box();
    assert!(center.distance(Vec3::splat(2.0)) < 1e-4);
}

#[test]
fn pipeline_sync_calls_enqueue_while_busy() {
    let mut pipeline = MeshPipeline::new(quad());
    pipeline.queue_subdivide(Box::new(FanSubdividor));
    // Not idle: this modify must queue up behind the subdivision.
    pipeline.modify(&Translate(Vec3::X)).unwrap();
    assert!(!pipeline.is_finished());
    drain(&mut pipeline);

    assert_eq!(counts(pipeline.mesh()).2, 4);
    let (center, _) = pipeline.mesh().bounding_box();
    assert!(center.distance(Vec3::X) < 1e-4);
}

#[test]
fn pipeline_simplify_task() {
    let mut pipeline = MeshPipeline::new(grid_2x2());
    pipeline.queue_simplify(Box::new(CoplanarSimplifier));
    drain(&mut pipeline);
    assert_eq!(counts(pipeline.mesh()).2, 1);
    assert_valid(pipeline.mesh());
}

#[test]
fn pipeline_worker_restarts_after_drain() {
    let mut pipeline = MeshPipeline::new(quad());
    pipeline.queue_subdivide(Box::new(FanSubdividor));
    drain(&mut pipeline);
    // An extra tick on the drained queue shuts the worker down.
    pipeline.update();
    assert!(pipeline.is_finished());

    pipeline.queue_subdivide(Box::new(FanSubdividor));
    drain(&mut pipeline);
    assert_eq!(counts(pipeline.mesh()).2, 12);
}

#[test]
fn pipeline_update_on_idle_is_inert() {
    let mut pipeline = MeshPipeline::new(quad());
    let before = counts(pipeline.mesh());
    for _ in 0..3 {
        pipeline.update();
    }
    assert!(pipeline.is_finished());
    assert_eq!(counts(pipeline.mesh()), before);
}

/* ==================== */
/*  Operator sequences  */
/* ==================== */

#[test]
fn operator_sequences_keep_invariants() {
    let mut mesh = cube();
    triangulate::triangulate(&mut mesh).unwrap();
    assert_valid(&mesh);

    let face = mesh.read_connectivity().iter_faces().next().unwrap().0;
    edit_ops::delete_face(&mut mesh, face).unwrap();
    assert_valid(&mesh);

    edit_ops::cleanup(&mut mesh);
    assert_valid(&mesh);

    edit_ops::fuse_coplanar_faces(&mut mesh, 0.0).unwrap();
    assert_valid(&mesh);
}
