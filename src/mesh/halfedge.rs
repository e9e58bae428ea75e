// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{
    prelude::*,
    sync::{BorrowedRef, InteriorMutable, MutableRef},
};

use glam::*;
use itertools::Itertools;
use slotmap::{SecondaryMap, SlotMap};

/// Implements indexing traits so the mesh data structure can be used to access
/// vertex, face or halfedge information using ids as indices.
pub mod mesh_index_impls;

/// Type-safe wrappers over the internal allocator indices used as pointers
pub mod id_types;
pub use id_types::*;

/// An API to represent type-safe and error-handled graph traversals over a mesh
pub mod traversals;
pub use traversals::*;

/// Per-element attribute storage: positions, normals and user-defined tags.
pub mod channels;
pub use channels::*;

/// Euler operators: structural edits that keep the halfedge graph consistent.
pub mod edit_ops;

/// Face triangulation: fan decomposition and ear clipping.
pub mod triangulate;

/// A read-only structural consistency check over the whole mesh.
pub mod validation;

/// Bulk mesh generators, like boxes, spheres or extruded polygons.
pub mod primitives;

/// On-demand r-tree construction for nearest element queries.
pub mod spatial_index;

/// HalfEdge meshes are a type of linked list. This means it is sometimes
/// impossible to ensure some algorithms will terminate when the mesh is
/// malformed. To ensure the code never goes into an infinite loop, this max
/// number of iterations will be performed before giving an error. This error
/// should be large enough, as faces with a very large number of vertices may
/// trigger it.
pub const MAX_LOOP_ITERATIONS: usize = 8192;

#[derive(Debug, Default, Clone)]
pub struct HalfEdge {
    pair: Option<HalfEdgeId>,
    next: Option<HalfEdgeId>,
    vertex: Option<VertexId>,
    face: Option<FaceId>,
}

#[derive(Debug, Default, Clone)]
pub struct Vertex {
    halfedge: Option<HalfEdgeId>,
}

#[derive(Debug, Default, Clone)]
pub struct Face {
    halfedge: Option<HalfEdgeId>,
}

#[derive(Debug, Clone, Default)]
pub struct MeshConnectivity {
    vertices: SlotMap<VertexId, Vertex>,
    faces: SlotMap<FaceId, Face>,
    halfedges: SlotMap<HalfEdgeId, HalfEdge>,
}

/// The owning aggregate for one mesh: connectivity plus attribute channels.
/// Elements are never shared between two meshes; `Clone` deep-copies the
/// whole reachable graph and every channel.
#[derive(Debug)]
pub struct HalfEdgeMesh {
    connectivity: InteriorMutable<MeshConnectivity>,
    pub channels: MeshChannels,
    default_channels: DefaultChannels,
}

impl Clone for HalfEdgeMesh {
    fn clone(&self) -> Self {
        HalfEdgeMesh {
            connectivity: InteriorMutable::new(self.connectivity.borrow().clone()),
            channels: self.channels.clone(),
            default_channels: self.default_channels.clone(),
        }
    }
}

pub type Positions = Channel<VertexId, Vec3>;

impl MeshConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the edges of a given face
    pub fn face_edges(&self, face_id: FaceId) -> SVec<HalfEdgeId> {
        let h0 = self[face_id].halfedge.expect("Face should have a halfedge");
        self.halfedge_loop(h0)
    }

    pub fn face_vertices(&self, face_id: FaceId) -> SVec<VertexId> {
        self.face_edges(face_id)
            .iter()
            .map(|e| self.at_halfedge(*e).vertex().end())
            .collect()
    }

    pub fn edge_endpoints(&self, edge: HalfEdgeId) -> (VertexId, VertexId) {
        let a = self.at_halfedge(edge).vertex().end();
        let b = self.at_halfedge(edge).next().vertex().end();
        (a, b)
    }

    pub fn halfedge_loop(&self, h0: HalfEdgeId) -> SVec<HalfEdgeId> {
        let mut ret = smallvec::smallvec![h0];
        let mut h = h0;

        let mut count = 0;

        loop {
            if count > MAX_LOOP_ITERATIONS {
                panic!("Max number of iterations reached. Is the mesh malformed?");
            }
            count += 1;

            h = self[h].next.expect("Halfedges should form a loop");
            if h == h0 {
                break;
            } else {
                ret.push(h);
            }
        }
        ret
    }

    /// Returns an iterator that follows the next pointer for halfedges
    /// starting at `h0` until closing the loop.
    pub fn halfedge_loop_iter(&self, h0: HalfEdgeId) -> HalfEdgeLoopIter<'_> {
        HalfEdgeLoopIter {
            conn: self,
            start: h0,
            next: h0,
            count: 0,
        }
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices.iter()
    }

    pub fn iter_faces(&self) -> impl Iterator<Item = (FaceId, &Face)> {
        self.faces.iter()
    }

    pub fn iter_halfedges(&self) -> impl Iterator<Item = (HalfEdgeId, &HalfEdge)> {
        self.halfedges.iter()
    }

    /// Adds a new vertex to the mesh, disconnected from everything else. Returns its handle.
    pub(crate) fn alloc_vertex(
        &mut self,
        positions: &mut Positions,
        position: Vec3,
        halfedge: Option<HalfEdgeId>,
    ) -> VertexId {
        let v = self.vertices.insert(Vertex { halfedge });
        positions[v] = position;
        v
    }

    /// Adds a new vertex to the mesh, disconnected from everything else.
    /// Returns its handle. Unlike `alloc_vertex`, this function does not set
    /// the vertex position, implicitly leaving it at zero.
    pub(crate) fn alloc_vertex_raw(&mut self, halfedge: Option<HalfEdgeId>) -> VertexId {
        self.vertices.insert(Vertex { halfedge })
    }

    /// Adds a new face to the mesh, disconnected from everything else. Returns its handle.
    pub(crate) fn alloc_face(&mut self, halfedge: Option<HalfEdgeId>) -> FaceId {
        self.faces.insert(Face { halfedge })
    }

    /// Adds a new halfedge to the mesh, disconnected from everything else. Returns its handle.
    pub(crate) fn alloc_halfedge(&mut self, halfedge: HalfEdge) -> HalfEdgeId {
        self.halfedges.insert(halfedge)
    }

    /// Removes a face from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    pub(crate) fn remove_face(&mut self, face: FaceId) {
        self.faces.remove(face);
    }

    /// Removes a halfedge from the mesh. This does not attempt to preserve
    /// mesh connectivity and should only be used as part of internal
    /// operations.
    pub(crate) fn remove_halfedge(&mut self, halfedge: HalfEdgeId) {
        self.halfedges.remove(halfedge);
    }

    /// Removes a vertex from the mesh. This does not attempt to preserve mesh
    /// connectivity and should only be used as part of internal operations.
    pub(crate) fn remove_vertex(&mut self, vertex: VertexId) {
        self.vertices.remove(vertex);
    }

    pub fn vertex_exists(&self, vertex: VertexId) -> bool {
        self.vertices.contains_key(vertex)
    }

    pub fn face_exists(&self, face: FaceId) -> bool {
        self.faces.contains_key(face)
    }

    pub fn halfedge_exists(&self, halfedge: HalfEdgeId) -> bool {
        self.halfedges.contains_key(halfedge)
    }

    /// Returns the average of a face's vertices. Note that this is different
    /// from the centroid. See:
    /// https://en.wikipedia.org/wiki/Centroid#Of_a_polygon
    pub fn face_vertex_average(&self, positions: &Positions, face_id: FaceId) -> Vec3 {
        let face_vertices = self
            .face_vertices(face_id)
            .iter()
            .map(|v| positions[*v])
            .collect::<SVec<_>>();
        face_vertices.iter().fold(Vec3::ZERO, |v1, v2| v1 + *v2) / face_vertices.len() as f32
    }

    /// Returns the normal of the face. The first three vertices are used to
    /// compute the normal. If the vertices of the face are not coplanar,
    /// the result will not be correct.
    pub fn face_normal(&self, positions: &Positions, face: FaceId) -> Option<Vec3> {
        let verts = self.face_vertices(face);
        if verts.len() >= 3 {
            let v01 = positions[verts[0]] - positions[verts[1]];
            let v12 = positions[verts[1]] - positions[verts[2]];
            Some(v01.cross(v12).normalize())
        } else {
            None
        }
    }

    /// Given a `self` in an inconsistent state, where some halfedges have no
    /// `pair` (because they're in the boundary), this method adds the missing
    /// pair halfedges, forming a loop across the boundaries of the mesh. The
    /// new halfedges are marked as boundary with a None face.
    pub fn cap_boundaries(&mut self) {
        let halfedges: Vec<HalfEdgeId> = self.iter_halfedges().map(|(h, _)| h).collect();

        for &h0 in halfedges.iter() {
            let mut boundary_halfedges = Vec::<HalfEdgeId>::new();
            if self[h0].pair.is_none() {
                let mut h_it = h0;
                loop {
                    let b = self.alloc_halfedge(HalfEdge::default());
                    boundary_halfedges.push(b);
                    self[h_it].pair = Some(b);
                    self[b].pair = Some(h_it);
                    self[b].vertex = Some(self.at_halfedge(h_it).next().vertex().end());

                    // Look for the next outgoing halfedge of this vertex
                    // that's in the boundary
                    h_it = self.at_halfedge(h_it).next().end();
                    while h_it != h0 && self[h_it].pair.is_some() {
                        // Pair-next cycles around the outgoing halfedges of a vertex
                        h_it = self.at_halfedge(h_it).pair().next().end();
                    }

                    if h_it == h0 {
                        break;
                    }
                }
            }

            for (&b_h, &b_h_next) in boundary_halfedges.iter().rev().circular_tuple_windows() {
                self[b_h].next = Some(b_h_next);
            }
        }
    }

    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }
}

impl HalfEdgeMesh {
    pub fn new() -> Self {
        let mut channels = MeshChannels::default();
        let default_channels = DefaultChannels::with_position(&mut channels);
        Self {
            channels,
            default_channels,
            connectivity: InteriorMutable::new(MeshConnectivity::new()),
        }
    }

    pub fn read_connectivity(&self) -> BorrowedRef<'_, MeshConnectivity> {
        self.connectivity.borrow()
    }

    pub fn write_connectivity(&self) -> MutableRef<'_, MeshConnectivity> {
        self.connectivity.borrow_mut()
    }

    pub fn read_positions(&self) -> BorrowedRef<'_, Positions> {
        self.channels
            .read_channel(self.default_channels.position)
            .expect("Could not read positions")
    }

    pub fn write_positions(&self) -> MutableRef<'_, Positions> {
        self.channels
            .write_channel(self.default_channels.position)
            .expect("Could not write positions")
    }

    pub fn read_face_normals(&self) -> Option<BorrowedRef<'_, Channel<FaceId, Vec3>>> {
        self.default_channels.face_normals.map(|ch_id| {
            self.channels
                .read_channel(ch_id)
                .expect("Could not read face normals")
        })
    }

    pub fn read_vertex_normals(&self) -> Option<BorrowedRef<'_, Channel<VertexId, Vec3>>> {
        self.default_channels.vertex_normals.map(|ch_id| {
            self.channels
                .read_channel(ch_id)
                .expect("Could not read vertex normals")
        })
    }

    /// Swaps this mesh's whole content (connectivity, channels, default
    /// channel registry) for `content`'s. The exclusive borrow on the
    /// connectivity cell is the mutual exclusion boundary: any concurrent
    /// reader still holding a borrow makes this panic rather than race.
    pub fn replace_content(&mut self, content: HalfEdgeMesh) {
        {
            let mut conn = self.connectivity.borrow_mut();
            *conn = content.connectivity.into_inner();
        }
        self.channels = content.channels;
        self.default_channels = content.default_channels;
    }

    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for (_, pos) in self.read_positions().iter() {
            min = min.min(*pos);
            max = max.max(*pos);
        }
        let center = (min + max) * 0.5;
        let size = max - min;
        (center, size)
    }

    /// Builds this mesh from a list of vertices, and a list of polygons,
    /// containing indices that reference those vertices.
    ///
    /// - Generic over Index: Use as much precision as you need / want.
    /// - Generic over Polygon: Use whatever input layout you want.
    ///
    /// If unsure, you can pass `Vec<Vec<u32>>` as `polygons`. You can also use
    /// `[[u32;3]]` or `&[&[u32]]`. Same for `u8`, `u16` or `usize` indices.
    #[profiling::function]
    pub fn build_from_polygons<Index, Polygon>(
        positions: &[Vec3],
        polygons: &[Polygon],
    ) -> Result<Self>
    where
        Index: num_traits::AsPrimitive<usize> + 'static + Eq + PartialEq + core::hash::Hash + Copy,
        Polygon: AsRef<[Index]>,
    {
        let mesh = Self::new();
        let mut conn = mesh.write_connectivity();
        let mut positions_ch = mesh.write_positions();

        // Maps indices from the `polygons` array to the allocated vertices in
        // the newly created halfedge mesh.
        let mut index_to_vertex = HashMap::<Index, VertexId>::new();

        // Used to compute the degree of a vertex, for manifoldness checks.
        let mut vertex_degree = HashMap::<VertexId, u32>::new();

        // First pass over polygon data to determine some initial properties
        for polygon in polygons.iter().map(|p| p.as_ref()) {
            if polygon.len() < 3 {
                bail!("Cannot build meshes where polygons have less than three vertices.")
            }
            if polygon.iter().duplicates().next().is_some() {
                bail!("Cannot build meshes where a polygon has duplicate vertices")
            }

            // Compute correspondence between vertices and indices. Also fill in vertex degree data.
            for index in polygon {
                let position = positions.get(index.as_()).ok_or_else(|| {
                    anyhow!("Out-of-bounds index in the polygon array {}", index.as_())
                })?;
                let v_id = index_to_vertex
                    .entry(*index)
                    .or_insert_with(|| conn.alloc_vertex(&mut positions_ch, *position, None));

                *vertex_degree.entry(*v_id).or_insert(0) += 1;
            }
        }

        // Maps pairs of indices to mesh halfedges
        let mut arc_to_halfedge = HashMap::<(Index, Index), HalfEdgeId>::new();

        // We can now start building connectivity information by doing a second
        // pass over the polygon list
        for polygon in polygons.iter().map(|p| p.as_ref()) {
            // Cyclically ordered list of the half edge ids of this face.
            let mut half_edges_in_face = SVec::new();

            let face = conn.alloc_face(None);

            for (&a, &b) in polygon.iter().circular_tuple_windows() {
                if arc_to_halfedge.get(&(a, b)).is_some() {
                    bail!(
                        "Found multiple oriented edges with the same indices.\
                         This means either (i) surface is non-manifold or (ii) faces \
                         are not oriented in the same direction"
                    )
                }

                let h = conn.alloc_halfedge(HalfEdge::default());
                // Link halfedge to face
                conn[h].face = Some(face);
                conn[face].halfedge = Some(h);

                // Link halfedge to source vertex
                let v_a = index_to_vertex[&a];
                conn[h].vertex = Some(v_a);
                conn[v_a].halfedge = Some(h);

                half_edges_in_face.push(h);

                arc_to_halfedge.insert((a, b), h);

                if let Some(&other) = arc_to_halfedge.get(&(b, a)) {
                    conn[h].pair = Some(other);
                    conn[other].pair = Some(h);
                }
            }

            for (&h1, &h2) in half_edges_in_face.iter().circular_tuple_windows() {
                conn[h1].next = Some(h2);
            }
        }

        // Construct the boundary halfedges. Right now, the boundary consists
        // of incomplete edges, i.e. half edges that do not have a pair.
        // Leaving it like this would complicate some kinds of traversal
        // because we can't rely on halfedges always having a pair. We create
        // pair halfedges that do not point to any face instead, linked
        // following a circle around the closed boundary.
        conn.cap_boundaries();

        // Do some final manifoldness checks
        for (v, vertex) in conn.iter_vertices() {
            if vertex.halfedge.is_none() {
                bail!("There is at least a single vertex that's disconnected from any polygon");
            }

            // Check that the number of halfedges emanating from this vertex
            // equals the number of polygons containing this vertex. If this
            // doesn't check out, it means our vertex is not a polygon "fan",
            // but some other (thus, non-manifold) structure
            let h0 = conn.at_vertex(v).halfedge().end();
            let mut h = h0;
            let mut count = 0;
            loop {
                if !conn.at_halfedge(h).is_boundary().unwrap() {
                    count += 1;
                }
                h = conn.at_halfedge(h).pair().next().end();

                if h == h0 {
                    break;
                }
            }

            if count != vertex_degree[&v] {
                bail!("At least one of the vertices is not a polygon fan, but some other nonmanifold structure instead.")
            }
        }

        drop(conn);
        drop(positions_ch);
        Ok(mesh)
    }

    /// Splices a deep copy of `other`'s content into this mesh. No
    /// connectivity is generated between the two parts. Attribute channels
    /// are carried over, remapped to the freshly allocated keys.
    pub fn merge_from(&mut self, other: &HalfEdgeMesh) {
        use slotmap::Key;

        let mut vmap = SecondaryMap::<VertexId, VertexId>::new();
        let mut hmap = SecondaryMap::<HalfEdgeId, HalfEdgeId>::new();
        let mut fmap = SecondaryMap::<FaceId, FaceId>::new();

        let mut this_conn = self.write_connectivity();
        let other_conn = other.read_connectivity();

        // On a first pass, we reserve new vertices, faces and halfedges
        // without setting any of their pointers and store their ids in a
        // mapping.
        for (vertex_id, _) in other_conn.iter_vertices() {
            vmap.insert(vertex_id, this_conn.alloc_vertex_raw(None));
        }
        for (face_id, _) in other_conn.iter_faces() {
            fmap.insert(face_id, this_conn.alloc_face(None));
        }
        for (halfedge_id, _) in other_conn.iter_halfedges() {
            hmap.insert(halfedge_id, this_conn.alloc_halfedge(HalfEdge::default()));
        }

        // The second pass uses the mapping and the original data to set all
        // the inner pointers.
        for (vertex_id, vertex) in other_conn.iter_vertices() {
            if let Some(h) = vertex.halfedge {
                this_conn[vmap[vertex_id]].halfedge = Some(hmap[h])
            }
        }
        for (face_id, face) in other_conn.iter_faces() {
            if let Some(h) = face.halfedge {
                this_conn[fmap[face_id]].halfedge = Some(hmap[h])
            }
        }
        for (halfedge_id, halfedge) in other_conn.iter_halfedges() {
            if let Some(pair) = halfedge.pair {
                this_conn[hmap[halfedge_id]].pair = Some(hmap[pair]);
            }
            if let Some(next) = halfedge.next {
                this_conn[hmap[halfedge_id]].next = Some(hmap[next]);
            }
            if let Some(vertex) = halfedge.vertex {
                this_conn[hmap[halfedge_id]].vertex = Some(vmap[vertex]);
            }
            if let Some(face) = halfedge.face {
                this_conn[hmap[halfedge_id]].face = Some(fmap[face]);
            }
        }
        drop(this_conn);
        drop(other_conn);

        // Finally, once the connectivity data is correct, carry over the
        // channels for the merged elements using the key mappings.
        let remaps = ElementRemaps {
            vertices: vmap.iter().map(|(a, b)| (a.data(), b.data())).collect(),
            faces: fmap.iter().map(|(a, b)| (a.data(), b.data())).collect(),
            halfedges: hmap.iter().map(|(a, b)| (a.data(), b.data())).collect(),
        };
        self.channels.merge_from(&other.channels, &remaps);
    }
}

impl Default for HalfEdgeMesh {
    fn default() -> Self {
        Self::new()
    }
}

pub struct HalfEdgeLoopIter<'a> {
    conn: &'a MeshConnectivity,
    start: HalfEdgeId,
    next: HalfEdgeId,
    count: usize,
}

impl<'a> Iterator for HalfEdgeLoopIter<'a> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= MAX_LOOP_ITERATIONS {
            panic!("Max number of iterations reached. Is the mesh malformed?");
        } else if self.count > 0 && self.next == self.start {
            None
        } else {
            let ret = self.next;
            self.next = self.conn.at_halfedge(self.next).next().end();
            self.count += 1;
            Some(ret)
        }
    }
}
