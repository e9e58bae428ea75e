// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial acceleration for nearest element queries. The trees are built on
//! demand from the current vertex or face set and returned to the caller; the
//! mesh never builds or caches one itself, so edits can't leave a stale index
//! behind.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::prelude::*;

/// A mesh element key paired with its position in space.
pub struct IndexedPoint<K: Copy> {
    pub key: K,
    pub position: Vec3,
}

impl<K: Copy> RTreeObject for IndexedPoint<K> {
    type Envelope = AABB<[f32; 3]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position.to_array())
    }
}

impl<K: Copy> PointDistance for IndexedPoint<K> {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        self.position.distance_squared(Vec3::from_slice(point))
    }
}

/// Builds an r-tree over all vertices of the mesh. This takes O(n) but in
/// turn allows very efficient nearest-neighbor queries.
pub fn vertex_tree(mesh: &HalfEdgeMesh) -> RTree<IndexedPoint<VertexId>> {
    let conn = mesh.read_connectivity();
    let positions = mesh.read_positions();
    RTree::bulk_load(
        conn.iter_vertices()
            .map(|(v, _)| IndexedPoint {
                key: v,
                position: positions[v],
            })
            .collect_vec(),
    )
}

/// Builds an r-tree over the vertex averages of all faces of the mesh, for
/// nearest-surface-region queries.
pub fn face_center_tree(mesh: &HalfEdgeMesh) -> RTree<IndexedPoint<FaceId>> {
    let conn = mesh.read_connectivity();
    let positions = mesh.read_positions();
    RTree::bulk_load(
        conn.iter_faces()
            .map(|(f, _)| IndexedPoint {
                key: f,
                position: conn.face_vertex_average(&positions, f),
            })
            .collect_vec(),
    )
}

/// Returns the element nearest to `point`, with its position.
pub fn nearest<K: Copy>(tree: &RTree<IndexedPoint<K>>, point: Vec3) -> Option<(Vec3, K)> {
    tree.nearest_neighbor(&point.to_array())
        .map(|entry| (entry.position, entry.key))
}

/// Returns the `k` elements nearest to `point`, closest first.
pub fn k_nearest<K: Copy>(
    tree: &RTree<IndexedPoint<K>>,
    point: Vec3,
    k: usize,
) -> Vec<(Vec3, K)> {
    tree.nearest_neighbor_iter(&point.to_array())
        .take(k)
        .map(|entry| (entry.position, entry.key))
        .collect_vec()
}
