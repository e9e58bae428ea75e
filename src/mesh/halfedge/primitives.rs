// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::f32::consts::PI;

use super::*;

/// A planar polygon, optionally extruded into a prism along its normal.
/// This is the reference implementation of the [`crate::pipeline::MeshGenerator`]
/// contract: a configured value that produces a full mesh on demand.
#[derive(Clone, Debug)]
pub struct Polygon {
    pub points: Vec<Vec3>,
    pub thickness: f32,
}

impl Polygon {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self {
            points,
            thickness: 0.0,
        }
    }

    pub fn with_thickness(points: Vec<Vec3>, thickness: f32) -> Self {
        Self { points, thickness }
    }

    pub fn build(&self) -> Result<HalfEdgeMesh> {
        let n = self.points.len();
        if n < 3 {
            bail!("A polygon needs at least three points")
        }

        if self.thickness == 0.0 {
            let polygon = (0..n as u32).collect_vec();
            return HalfEdgeMesh::build_from_polygons(&self.points, &[polygon]);
        }

        // The vector area of the closed polygon gives the extrusion
        // direction. It is translation invariant, so no centering is needed.
        let mut area = Vec3::ZERO;
        for (a, b) in self.points.iter_cpy().circular_tuple_windows() {
            area += a.cross(b);
        }
        if area.length_squared() == 0.0 {
            bail!("Cannot extrude a polygon with zero area")
        }
        let offset = area.normalize() * self.thickness;

        let vertices = self
            .points
            .iter_cpy()
            .chain(self.points.iter_cpy().map(|p| p + offset))
            .collect_vec();

        let mut polygons = Vec::with_capacity(n + 2);
        // Bottom cap, wound against the extrusion direction.
        polygons.push((0..n as u32).rev().collect_vec());
        // Top cap.
        polygons.push((n as u32..2 * n as u32).collect_vec());
        // Walls.
        for i in 0..n as u32 {
            let j = (i + 1) % n as u32;
            polygons.push(vec![i, j, n as u32 + j, n as u32 + i]);
        }

        HalfEdgeMesh::build_from_polygons(&vertices, &polygons)
    }
}

impl crate::pipeline::MeshGenerator for Polygon {
    fn produce(&self) -> Result<HalfEdgeMesh> {
        self.build()
    }
}

pub struct Box;

impl Box {
    pub fn build(center: Vec3, size: Vec3) -> HalfEdgeMesh {
        let h = size * 0.5;

        let corners = [
            center + Vec3::new(-h.x, -h.y, -h.z),
            center + Vec3::new(h.x, -h.y, -h.z),
            center + Vec3::new(h.x, -h.y, h.z),
            center + Vec3::new(-h.x, -h.y, h.z),
            center + Vec3::new(-h.x, h.y, -h.z),
            center + Vec3::new(-h.x, h.y, h.z),
            center + Vec3::new(h.x, h.y, h.z),
            center + Vec3::new(h.x, h.y, -h.z),
        ];

        HalfEdgeMesh::build_from_polygons(
            &corners,
            &[
                [0u32, 1, 2, 3],
                [4, 5, 6, 7],
                [4, 7, 1, 0],
                [3, 2, 6, 5],
                [5, 4, 0, 3],
                [6, 2, 1, 7],
            ],
        )
        .expect("Box construction should not fail")
    }
}

pub struct Quad;
impl Quad {
    pub fn build(center: Vec3, normal: Vec3, right: Vec3, size: Vec2) -> HalfEdgeMesh {
        let normal = normal.normalize();
        let right = right.normalize();
        let forward = normal.cross(right);

        let hsize = size * 0.5;

        let v1 = center + hsize.x * right + hsize.y * forward;
        let v2 = center - hsize.x * right + hsize.y * forward;
        let v3 = center - hsize.x * right - hsize.y * forward;
        let v4 = center + hsize.x * right - hsize.y * forward;

        HalfEdgeMesh::build_from_polygons(&[v1, v2, v3, v4], &[[0u32, 1, 2, 3]])
            .expect("Quad construction should not fail")
    }
}

pub struct Circle;
impl Circle {
    pub fn build(center: Vec3, radius: f32, num_vertices: usize) -> HalfEdgeMesh {
        let angle_delta = (2.0 * PI) / num_vertices as f32;
        let verts = (0..num_vertices)
            .map(|i| {
                let q = Quat::from_rotation_y(angle_delta * i as f32);
                q * (Vec3::Z * radius) + center
            })
            .collect_vec();
        let polygon = (0..num_vertices).collect_vec();

        HalfEdgeMesh::build_from_polygons(&verts, &[polygon])
            .expect("Circle construction should not fail")
    }

    /// Like `build`, but the circle is left as an open boundary loop with no
    /// face on either side.
    pub fn build_open(center: Vec3, radius: f32, num_vertices: usize) -> HalfEdgeMesh {
        let mut circle = Self::build(center, radius, num_vertices);
        let face = circle
            .read_connectivity()
            .iter_faces()
            .map(|(f, _)| f)
            .next()
            .expect("The circle has a face");
        super::edit_ops::delete_face(&mut circle, face)
            .expect("Clearing the circle's face should not fail");
        circle
    }
}

pub struct UVSphere;
impl UVSphere {
    pub fn build(center: Vec3, segments: u32, rings: u32, radius: f32) -> HalfEdgeMesh {
        let mut vertices = Vec::<Vec3>::new();
        let mut polygons = Vec::<SVec<u32>>::new();

        let top_vertex = 0;
        vertices.push(center + Vec3::Y * radius);

        for i in 0..rings - 1 {
            let phi = PI * (i + 1) as f32 / rings as f32;
            for j in 0..segments {
                let theta = 2.0 * PI * j as f32 / segments as f32;
                let x = phi.sin() * theta.cos() * radius;
                let y = phi.cos() * radius;
                let z = phi.sin() * theta.sin() * radius;
                vertices.push(center + Vec3::new(x, y, z));
            }
        }

        let bottom_vertex = vertices.len() as u32;
        vertices.push(center - Vec3::Y * radius);

        // Top triangles
        for i in 0..segments {
            let i0 = i + 1;
            let i1 = (i + 1) % segments + 1;
            polygons.push(smallvec::smallvec![top_vertex, i1, i0]);
        }
        // Bottom triangles
        for i in 0..segments {
            let i0 = i + segments * (rings - 2) + 1;
            let i1 = (i + 1) % segments + segments * (rings - 2) + 1;
            polygons.push(smallvec::smallvec![bottom_vertex, i0, i1]);
        }
        // Middle quads
        for j in 0..rings - 2 {
            let j0 = j * segments + 1;
            let j1 = (j + 1) * segments + 1;
            for i in 0..segments {
                let i0 = j0 + i;
                let i1 = j0 + (i + 1) % segments;
                let i2 = j1 + (i + 1) % segments;
                let i3 = j1 + i;
                polygons.push(smallvec::smallvec![i0, i1, i2, i3]);
            }
        }

        HalfEdgeMesh::build_from_polygons(&vertices, &polygons)
            .expect("Sphere construction should not fail")
    }
}
