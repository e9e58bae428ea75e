// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::bail;
use float_ord::FloatOrd;

use crate::prelude::*;

use super::edit_ops;

/// Corner turns smaller than this count as degenerate and are never picked as
/// ears.
const EAR_EPSILON: f32 = 1e-8;

/// Returns true when every corner of the face turns in the direction of the
/// face normal. Faces with fewer than four vertices are always convex.
pub fn face_is_convex(
    conn: &MeshConnectivity,
    positions: &Positions,
    face: FaceId,
) -> Result<bool> {
    let verts = conn.at_face(face).vertices()?;
    if verts.len() <= 3 {
        return Ok(true);
    }
    let normal = match conn.face_normal(positions, face) {
        Some(n) => n,
        None => return Ok(true),
    };
    let n = verts.len();
    for i in 0..n {
        let prev = positions[verts[(i + n - 1) % n]];
        let cur = positions[verts[i]];
        let next = positions[verts[(i + 1) % n]];
        if (cur - prev).cross(next - cur).dot(normal) < -EAR_EPSILON {
            return Ok(false);
        }
    }
    Ok(true)
}

fn point_in_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3, normal: Vec3) -> bool {
    let edge_sign = |u: Vec3, v: Vec3| (v - u).cross(p - u).dot(normal);
    edge_sign(a, b) >= -EAR_EPSILON
        && edge_sign(b, c) >= -EAR_EPSILON
        && edge_sign(c, a) >= -EAR_EPSILON
}

/// Finds the ring index whose corner can be clipped into a triangle: the
/// corner turns with the face normal and contains no other ring vertex. Among
/// the candidates, the widest corner wins. On convex rings every corner
/// qualifies, which makes this a fan decomposition.
fn find_ear(ring: &[VertexId], positions: &Positions, normal: Vec3) -> Result<usize> {
    let n = ring.len();
    let pos = |i: usize| positions[ring[i]];
    let corner_turn = |i: usize| {
        let prev = pos((i + n - 1) % n);
        let cur = pos(i);
        let next = pos((i + 1) % n);
        (cur - prev).cross(next - cur).dot(normal)
    };
    let blocked = |i: usize| {
        let a = pos((i + n - 1) % n);
        let b = pos(i);
        let c = pos((i + 1) % n);
        (0..n).any(|j| {
            j != i
                && j != (i + n - 1) % n
                && j != (i + 1) % n
                && point_in_triangle(pos(j), a, b, c, normal)
        })
    };

    if let Some(i) = (0..n)
        .filter(|&i| corner_turn(i) > EAR_EPSILON && !blocked(i))
        .max_by_key(|&i| FloatOrd(corner_turn(i)))
    {
        return Ok(i);
    }
    // Every ear is blocked. This only happens on self-touching polygons;
    // clipping the widest convex corner still terminates.
    if let Some(i) = (0..n)
        .filter(|&i| corner_turn(i) > EAR_EPSILON)
        .max_by_key(|&i| FloatOrd(corner_turn(i)))
    {
        return Ok(i);
    }
    bail!("Could not find an ear to clip. Is the face degenerate?")
}

/// Decomposes `face` into triangles that cover the same area and share the
/// outer loop. Returns the resulting triangle faces; an n-gon yields exactly
/// n - 2 of them. Every new face inherits the original face's properties.
pub fn triangulate_face(mesh: &mut HalfEdgeMesh, face: FaceId) -> Result<SVec<FaceId>> {
    let (mut ring, normal) = {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();
        let verts = conn.at_face(face).vertices()?;
        if verts.len() < 3 {
            bail!("Cannot triangulate face {face:?} with fewer than 3 vertices")
        }
        let normal = conn.face_normal(&positions, face).unwrap_or(Vec3::Y);
        (verts.into_iter().collect::<Vec<_>>(), normal)
    };

    let mut triangles = SVec::new();
    while ring.len() > 3 {
        let ear = {
            let positions = mesh.read_positions();
            find_ear(&ring, &positions, normal)?
        };
        let prev = ring[(ear + ring.len() - 1) % ring.len()];
        let next = ring[(ear + 1) % ring.len()];
        // The new edge cuts the ear's triangle off; the input face id stays
        // on the shrinking remainder.
        let h = edit_ops::split_face(mesh, prev, next)?;
        let tri = mesh
            .read_connectivity()
            .at_halfedge(h)
            .pair()
            .face()
            .try_end()?;
        triangles.push(tri);
        ring.remove(ear);
    }
    triangles.push(face);
    Ok(triangles)
}

/// Triangulates every face of the mesh. Returns the triangle faces.
#[profiling::function]
pub fn triangulate(mesh: &mut HalfEdgeMesh) -> Result<Vec<FaceId>> {
    let faces: Vec<FaceId> = mesh
        .read_connectivity()
        .iter_faces()
        .map(|(f, _)| f)
        .collect();
    let mut triangles = Vec::new();
    for f in faces {
        triangles.extend(triangulate_face(mesh, f)?);
    }
    Ok(triangles)
}

/// Triangulates only the concave faces of the mesh. Returns the triangle
/// faces created (concave faces cannot be rendered or processed by many
/// algorithms that assume convexity).
#[profiling::function]
pub fn triangulate_concave_faces(mesh: &mut HalfEdgeMesh) -> Result<Vec<FaceId>> {
    let concave: Vec<FaceId> = {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();
        conn.iter_faces()
            .map(|(f, _)| f)
            .filter(|&f| !face_is_convex(&conn, &positions, f).unwrap_or(true))
            .collect()
    };
    let mut triangles = Vec::new();
    for f in concave {
        triangles.extend(triangulate_face(mesh, f)?);
    }
    Ok(triangles)
}

/// Triangulates the fan of faces around vertex `v`. Returns the triangle
/// faces.
pub fn triangulate_face_star(mesh: &mut HalfEdgeMesh, v: VertexId) -> Result<Vec<FaceId>> {
    let star: Vec<FaceId> = {
        let conn = mesh.read_connectivity();
        conn.at_vertex(v).adjacent_faces()?.into_iter().collect()
    };
    let mut triangles = Vec::new();
    for f in star {
        triangles.extend(triangulate_face(mesh, f)?);
    }
    Ok(triangles)
}
