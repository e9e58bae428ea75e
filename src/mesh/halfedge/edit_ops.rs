// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{anyhow, bail};
use slotmap::Key;

use crate::prelude::*;

/// Removes `face`, clearing the face reference on every halfedge of its loop.
/// The halfedges become boundary halfedges; pairing is untouched, so the
/// surrounding loop remains traversable.
pub fn delete_face(mesh: &mut HalfEdgeMesh, face: FaceId) -> Result<()> {
    {
        let mut conn = mesh.write_connectivity();
        let halfedges = conn.at_face(face).halfedges()?;
        for h in halfedges.iter_cpy() {
            conn[h].face = None;
        }
        conn.remove_face(face);
    }
    mesh.channels
        .forget_element(ChannelKeyType::FaceId, face.data());
    Ok(())
}

/// Removes several faces at once, sweeps every element they orphaned and
/// rebuilds the boundary caps.
pub fn delete_faces(mesh: &mut HalfEdgeMesh, faces: &[FaceId]) -> Result<()> {
    {
        let mut conn = mesh.write_connectivity();
        // Check all ids before touching anything.
        for &f in faces {
            conn.at_face(f)?;
        }
        for &f in faces {
            conn.remove_face(f);
        }
    }
    for &f in faces {
        mesh.channels
            .forget_element(ChannelKeyType::FaceId, f.data());
    }
    cleanup(mesh);
    Ok(())
}

/// Removes `face` *and* the halfedges of its loop, disconnecting the region
/// entirely. The opposite halfedges are left unpaired; vertices whose
/// representative halfedge was removed are re-pointed to a surviving outgoing
/// halfedge, or orphaned for `cleanup` to sweep when none survives.
pub fn cut_face(mesh: &mut HalfEdgeMesh, face: FaceId) -> Result<()> {
    let halfedges = {
        let mut conn = mesh.write_connectivity();
        let halfedges = conn.at_face(face).halfedges()?;
        let loop_set: HashSet<HalfEdgeId> = halfedges.iter_cpy().collect();

        for h in halfedges.iter_cpy() {
            let v = conn.at_halfedge(h).vertex().try_end()?;
            if conn[v]
                .halfedge
                .map(|vh| loop_set.contains(&vh))
                .unwrap_or(false)
            {
                let survivor = conn
                    .at_vertex(v)
                    .outgoing_halfedges()
                    .ok()
                    .and_then(|outgoing| outgoing.iter_cpy().find(|h| !loop_set.contains(h)));
                conn[v].halfedge = survivor;
            }
        }

        for h in halfedges.iter_cpy() {
            if let Some(p) = conn[h].pair {
                if !loop_set.contains(&p) {
                    conn[p].pair = None;
                }
            }
        }
        for h in halfedges.iter_cpy() {
            conn.remove_halfedge(h);
        }
        conn.remove_face(face);
        halfedges
    };

    mesh.channels
        .forget_element(ChannelKeyType::FaceId, face.data());
    for h in halfedges.iter_cpy() {
        mesh.channels
            .forget_element(ChannelKeyType::HalfEdgeId, h.data());
    }
    Ok(())
}

/// Removes the undirected edge `{e, pair(e)}`, splicing the two adjacent
/// loops into one. When both sides had a face the faces are merged into a new
/// face inheriting the properties of the face on the pair side, and the new
/// face is returned. When only one side had a face (a boundary edge), the
/// face dissolves into the boundary and `None` is returned.
pub fn delete_edge(mesh: &mut HalfEdgeMesh, e: HalfEdgeId) -> Result<Option<FaceId>> {
    let mut conn = mesh.write_connectivity();

    let h1 = e;
    let h2 = conn.at_halfedge(h1).pair().try_end()?;
    let h1_next = conn.at_halfedge(h1).next().try_end()?;
    let h2_next = conn.at_halfedge(h2).next().try_end()?;
    if h1_next == h2 || h2_next == h1 {
        bail!("Cannot delete edge {h1:?}: it dangles off its loop")
    }
    let h1_prev = conn.at_halfedge(h1).previous().try_end()?;
    let h2_prev = conn.at_halfedge(h2).previous().try_end()?;
    let f1 = conn.at_halfedge(h1).face_or_boundary()?;
    let f2 = conn.at_halfedge(h2).face_or_boundary()?;
    let v = conn.at_halfedge(h1).vertex().try_end()?;
    let w = conn.at_halfedge(h2).vertex().try_end()?;

    // Vertices may point at the halfedges we're removing. The next around the
    // vertex survives the splice.
    if conn[v].halfedge == Some(h1) {
        conn[v].halfedge = Some(h2_next);
    }
    if conn[w].halfedge == Some(h2) {
        conn[w].halfedge = Some(h1_next);
    }

    // Splice both loops into one.
    conn[h1_prev].next = Some(h2_next);
    conn[h2_prev].next = Some(h1_next);

    let merged = if f1.is_some() && f2.is_some() {
        let new_face = conn.alloc_face(Some(h1_prev));
        let spliced = conn.halfedge_loop(h1_prev);
        for h in spliced.iter_cpy() {
            conn[h].face = Some(new_face);
        }
        Some(new_face)
    } else {
        // Only one side had a face: it dissolves into the boundary.
        let spliced = conn.halfedge_loop(h1_prev);
        for h in spliced.iter_cpy() {
            conn[h].face = None;
        }
        None
    };

    if let Some(f1) = f1 {
        conn.remove_face(f1);
    }
    if let Some(f2) = f2 {
        conn.remove_face(f2);
    }
    conn.remove_halfedge(h1);
    conn.remove_halfedge(h2);
    drop(conn);

    // The merged face keeps the properties of the face on the pair side.
    if let (Some(new_face), Some(f2)) = (merged, f2) {
        mesh.channels
            .copy_element(ChannelKeyType::FaceId, f2.data(), new_face.data());
    }
    for f in [f1, f2].into_iter().flatten() {
        mesh.channels
            .forget_element(ChannelKeyType::FaceId, f.data());
    }
    for h in [h1, h2] {
        mesh.channels
            .forget_element(ChannelKeyType::HalfEdgeId, h.data());
    }

    Ok(merged)
}

/// Splits a face by creating a new edge between vertices `v` and `w`. The
/// vertices must share a face, but not an edge. The new face inherits the
/// original face's properties.
pub fn split_face(mesh: &mut HalfEdgeMesh, v: VertexId, w: VertexId) -> Result<HalfEdgeId> {
    let mut conn = mesh.write_connectivity();

    let face = conn
        .at_vertex(v)
        .outgoing_halfedges()?
        .iter()
        .map(|h| conn.at_halfedge(*h).face().try_end())
        .collect::<Result<SVec<FaceId>, TraversalError>>()?
        .iter()
        .find(|f| conn.face_vertices(**f).contains(&w))
        .cloned()
        .ok_or_else(|| anyhow!("split_face: v and w must share a face"))?;

    if conn.at_vertex(v).halfedge_to(w).try_end().is_ok() {
        bail!("split_face: v and w cannot share an edge")
    }

    let face_halfedges = conn.face_edges(face);
    if face_halfedges.len() <= 3 {
        bail!("split_face: only quads or larger faces can be split")
    }

    let v_idx = face_halfedges
        .iter()
        .position(|h| conn.at_halfedge(*h).vertex().end() == v)
        .expect("v is in the face") as i32;
    let w_idx = face_halfedges
        .iter()
        .position(|h| conn.at_halfedge(*h).vertex().end() == w)
        .expect("w is in the face") as i32;

    // NOTE: Use rem_euclid so negative indices wrap up back at the end
    let h_vprev_v = face_halfedges[(v_idx - 1).rem_euclid(face_halfedges.len() as i32) as usize];
    let h_v_vnext = face_halfedges[v_idx as usize];
    let h_wprev_w = face_halfedges[(w_idx - 1).rem_euclid(face_halfedges.len() as i32) as usize];
    let h_w_wnext = face_halfedges[w_idx as usize];

    // Create new data
    let h_v_w = conn.alloc_halfedge(HalfEdge::default());
    let h_w_v = conn.alloc_halfedge(HalfEdge::default());
    let new_face = conn.alloc_face(None);

    conn[h_v_w].vertex = Some(v);
    conn[h_w_v].vertex = Some(w);

    conn[h_v_w].face = Some(face);
    conn[h_w_v].face = Some(new_face);

    conn[h_v_w].pair = Some(h_w_v);
    conn[h_w_v].pair = Some(h_v_w);

    conn[h_v_w].next = Some(h_w_wnext);
    conn[h_w_v].next = Some(h_v_vnext);

    conn[new_face].halfedge = Some(h_w_v);
    conn[face].halfedge = Some(h_v_w);

    // Fix connectivity
    conn[h_vprev_v].next = Some(h_v_w);
    conn[h_wprev_w].next = Some(h_w_v);

    // The halfedges of the original face that fall on the new face
    let (start, end) = {
        let start = v_idx;
        let mut end = (w_idx - 1).rem_euclid(face_halfedges.len() as i32);
        if end < start {
            end += face_halfedges.len() as i32
        }
        (start, end)
    };
    for i in start..=end {
        let h = face_halfedges[i as usize % face_halfedges.len()];
        conn[h].face = Some(new_face);
    }
    drop(conn);

    mesh.channels
        .copy_element(ChannelKeyType::FaceId, face.data(), new_face.data());

    Ok(h_v_w)
}

/// Divides an edge, creating a vertex in between and a new pair of halfedges.
///
/// ## Id Stability
/// Let (v, w) the (src, dst) endpoints of h, and x the new vertex id. It is
/// guaranteed that on the new mesh, the halfedge `h` will remain on the
/// second half of the edge, that is, from x to w. The new edge will go from
/// v to x.
pub fn divide_edge(
    conn: &mut MeshConnectivity,
    positions: &mut Positions,
    h: HalfEdgeId,
    interpolation_factor: f32,
) -> Result<VertexId> {
    // Select the necessary data elements
    let h_l = h;
    let h_r = conn.at_halfedge(h_l).pair().try_end()?;
    let h_l_prev = conn.at_halfedge(h_l).previous().try_end()?;
    let h_r_next = conn.at_halfedge(h_r).next().try_end()?;
    let f_l = conn.at_halfedge(h_l).face().try_end().ok();
    let f_r = conn.at_halfedge(h_r).face().try_end().ok();
    let (v, w) = conn.at_halfedge(h).src_dst_pair()?;

    // Calculate the new vertex position
    let v_pos = positions[v];
    let w_pos = positions[w];
    let pos = v_pos.lerp(w_pos, interpolation_factor);

    // Allocate new elements
    let x = conn.alloc_vertex(positions, pos, None);
    let h_l_2 = conn.alloc_halfedge(HalfEdge::default());
    let h_r_2 = conn.alloc_halfedge(HalfEdge::default());

    // --- Update connectivity ---

    // Next pointers
    conn[h_l_2].next = Some(h_l);
    conn[h_l_prev].next = Some(h_l_2);
    conn[h_r].next = Some(h_r_2);
    conn[h_r_2].next = Some(h_r_next);

    // Pair pointers
    conn[h_l_2].pair = Some(h_r_2);
    conn[h_r_2].pair = Some(h_l_2);
    conn[h_l].pair = Some(h_r);
    conn[h_r].pair = Some(h_l);

    // Vertex pointers
    conn[h_l].vertex = Some(x);
    conn[h_r].vertex = Some(w);
    conn[h_r_2].vertex = Some(x);
    conn[h_l_2].vertex = Some(v);

    // Face pointers: May be None for boundary
    conn[h_l_2].face = f_l;
    conn[h_r_2].face = f_r;

    conn[x].halfedge = Some(h_l);
    conn[v].halfedge = Some(h_l_2);

    Ok(x)
}

/// Merges the src and dst vertices of `h` so that only the first one remains
/// TODO: This does not handle the case where collapsing the edge leaves a
/// two-sided face behind.
pub fn collapse_edge(mesh: &mut HalfEdgeMesh, h: HalfEdgeId) -> Result<VertexId> {
    let mut conn = mesh.write_connectivity();

    let (v, w) = conn.at_halfedge(h).src_dst_pair()?;
    let t = conn.at_halfedge(h).pair().try_end()?;
    let h_next = conn.at_halfedge(h).next().try_end()?;
    let h_prev = conn.at_halfedge(h).previous().try_end()?;
    let t_next = conn.at_halfedge(t).next().try_end()?;
    let t_prev = conn.at_halfedge(t).previous().try_end()?;
    let w_outgoing = conn.at_vertex(w).outgoing_halfedges()?;
    let v_next_fan = conn.at_halfedge(h).cycle_around_fan().try_end()?;
    let f_h = conn.at_halfedge(h).face().try_end();
    let f_t = conn.at_halfedge(t).face().try_end();

    // --- Adjust connectivity ---
    for h_wo in w_outgoing {
        conn[h_wo].vertex = Some(v);
    }
    conn[t_prev].next = Some(t_next);
    conn[h_prev].next = Some(h_next);

    // Some face may point to the halfedges we're deleting. Fix that.
    if let Ok(f_h) = f_h {
        if conn.at_face(f_h).halfedge().try_end()? == h {
            conn[f_h].halfedge = Some(h_next);
        }
    }
    if let Ok(f_t) = f_t {
        if conn.at_face(f_t).halfedge().try_end()? == t {
            conn[f_t].halfedge = Some(t_next);
        }
    }
    // The vertex we're keeping may be pointing to one of the deleted halfedges.
    if conn.at_vertex(v).halfedge().try_end()? == h {
        conn[v].halfedge = Some(v_next_fan);
    }

    // --- Remove data ----
    conn.remove_halfedge(t);
    conn.remove_halfedge(h);
    conn.remove_vertex(w);
    drop(conn);

    mesh.channels
        .forget_element(ChannelKeyType::VertexId, w.data());
    for he in [h, t] {
        mesh.channels
            .forget_element(ChannelKeyType::HalfEdgeId, he.data());
    }

    Ok(v)
}

/// Flood-fills from `face` across face adjacency, accepting neighbors whose
/// normal is within `angle_tolerance` radians of the current face's normal
/// (squared-sine test, non-strict, so exactly coplanar faces fuse at a zero
/// tolerance). All accepted faces are merged into one new face whose loop is
/// the outer boundary of the region; the new face inherits `face`'s
/// properties. Returns the input face unchanged if no neighbor qualifies.
#[profiling::function]
pub fn fuse_coplanar_face(
    mesh: &mut HalfEdgeMesh,
    face: FaceId,
    angle_tolerance: f32,
) -> Result<FaceId> {
    struct OuterLink {
        halfedge: HalfEdgeId,
        src: VertexId,
        next: HalfEdgeId,
    }

    let (region, links) = {
        let conn = mesh.read_connectivity();
        let positions = mesh.read_positions();
        conn.at_face(face)?;

        let sin_sq = angle_tolerance.sin().powi(2);
        let mut region = vec![face];
        let mut region_set: HashSet<FaceId> = HashSet::from([face]);
        let mut frontier = vec![face];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for f in frontier.iter_cpy() {
                let f_normal = conn.face_normal(&positions, f);
                for h in conn.face_edges(f).iter_cpy() {
                    let neighbor = match conn.at_halfedge(h).pair().face_or_boundary()? {
                        Some(n) if !region_set.contains(&n) => n,
                        _ => continue,
                    };
                    let n_normal = conn.face_normal(&positions, neighbor);
                    if let (Some(a), Some(b)) = (f_normal, n_normal) {
                        if a.dot(b) >= 0.0 && a.cross(b).length_squared() <= sin_sq {
                            region_set.insert(neighbor);
                            region.push(neighbor);
                            next_frontier.push(neighbor);
                        }
                    }
                }
            }
            frontier = next_frontier;
        }

        if region.len() == 1 {
            return Ok(face);
        }

        // The outer halfedges: on a region face, with the pair side outside
        // the region (or on the boundary).
        let mut outer = Vec::new();
        for f in region.iter_cpy() {
            for h in conn.face_edges(f).iter_cpy() {
                let pair_face = conn.at_halfedge(h).pair().face_or_boundary()?;
                if pair_face.map(|pf| !region_set.contains(&pf)).unwrap_or(true) {
                    let src = conn.at_halfedge(h).vertex().try_end()?;
                    let dst = conn.at_halfedge(h).dst_vertex().try_end()?;
                    outer.push((h, src, dst));
                }
            }
        }

        // The next of an outer halfedge is the outer halfedge starting at its
        // destination vertex. If a vertex starts two outer halfedges, the
        // region touches itself there and can't be merged into a single loop.
        let mut by_src = HashMap::new();
        for (h, src, _) in outer.iter() {
            if by_src.insert(*src, *h).is_some() {
                bail!("Fusing around face {face:?} would pinch the region at vertex {src:?}")
            }
        }
        let links = outer
            .iter()
            .map(|(h, src, dst)| {
                by_src
                    .get(dst)
                    .map(|next| OuterLink {
                        halfedge: *h,
                        src: *src,
                        next: *next,
                    })
                    .ok_or_else(|| anyhow!("Outer boundary of region is not a closed loop"))
            })
            .collect::<Result<Vec<_>>>()?;
        (region, links)
    };

    let new_face = {
        let mut conn = mesh.write_connectivity();
        let new_face = conn.alloc_face(Some(links[0].halfedge));
        for link in &links {
            conn[link.halfedge].next = Some(link.next);
            conn[link.halfedge].face = Some(new_face);
            conn[link.src].halfedge = Some(link.halfedge);
        }
        for f in region.iter_cpy() {
            conn.remove_face(f);
        }
        new_face
    };

    mesh.channels
        .copy_element(ChannelKeyType::FaceId, face.data(), new_face.data());
    for f in region.iter_cpy() {
        mesh.channels
            .forget_element(ChannelKeyType::FaceId, f.data());
    }

    // Sweep the halfedges and vertices left inside the region.
    cleanup(mesh);

    Ok(new_face)
}

/// Fuses coplanar faces across the whole mesh until the face count stops
/// dropping. A single pass is not enough: merging two faces can make a third
/// neighbor coplanar-reachable.
#[profiling::function]
pub fn fuse_coplanar_faces(mesh: &mut HalfEdgeMesh, angle_tolerance: f32) -> Result<()> {
    loop {
        let faces_before = mesh.read_connectivity().num_faces();
        let faces: Vec<FaceId> = mesh
            .read_connectivity()
            .iter_faces()
            .map(|(f, _)| f)
            .collect();
        for f in faces {
            if mesh.read_connectivity().face_exists(f) {
                fuse_coplanar_face(mesh, f, angle_tolerance)?;
            }
        }
        if mesh.read_connectivity().num_faces() >= faces_before {
            break;
        }
    }
    Ok(())
}

/// Garbage collection pass: removes every halfedge not owned by a live face,
/// every vertex with no surviving outgoing halfedge and every face whose
/// representative halfedge died, then rebuilds the boundary caps. Channel
/// values of removed elements are swept. Boundary halfedge ids are not stable
/// across a cleanup.
#[profiling::function]
pub fn cleanup(mesh: &mut HalfEdgeMesh) {
    let mut removed_halfedges = Vec::new();
    let mut removed_vertices = Vec::new();
    let mut removed_faces = Vec::new();
    {
        let mut conn = mesh.write_connectivity();
        let all_halfedges: Vec<HalfEdgeId> = conn.iter_halfedges().map(|(h, _)| h).collect();

        // References to faces that no longer exist become boundary refs.
        for h in all_halfedges.iter_cpy() {
            if let Some(f) = conn[h].face {
                if !conn.face_exists(f) {
                    conn[h].face = None;
                }
            }
        }

        // Only face-owned halfedges survive; boundary caps are rebuilt below.
        // Wire edges with no face on either side are garbage.
        let mut keep = HashSet::new();
        let mut representative = HashMap::<VertexId, HalfEdgeId>::new();
        for h in all_halfedges.iter_cpy() {
            if conn[h].face.is_some() {
                keep.insert(h);
                if let Some(v) = conn[h].vertex {
                    representative.entry(v).or_insert(h);
                }
            }
        }

        for h in all_halfedges.iter_cpy() {
            if !keep.contains(&h) {
                conn.remove_halfedge(h);
                removed_halfedges.push(h);
            }
        }
        for h in keep.iter().copied() {
            if conn[h].pair.map(|p| !conn.halfedge_exists(p)).unwrap_or(false) {
                conn[h].pair = None;
            }
        }

        let all_vertices: Vec<VertexId> = conn.iter_vertices().map(|(v, _)| v).collect();
        for v in all_vertices.iter_cpy() {
            match representative.get(&v) {
                Some(&h) => conn[v].halfedge = Some(h),
                None => {
                    conn.remove_vertex(v);
                    removed_vertices.push(v);
                }
            }
        }

        let all_faces: Vec<FaceId> = conn.iter_faces().map(|(f, _)| f).collect();
        for f in all_faces.iter_cpy() {
            let has_live_loop = conn[f]
                .halfedge
                .map(|h| conn.halfedge_exists(h))
                .unwrap_or(false);
            if !has_live_loop {
                conn.remove_face(f);
                removed_faces.push(f);
            }
        }

        conn.cap_boundaries();
    }

    log::debug!(
        "cleanup swept {} halfedges, {} vertices, {} faces",
        removed_halfedges.len(),
        removed_vertices.len(),
        removed_faces.len()
    );

    for h in removed_halfedges {
        mesh.channels
            .forget_element(ChannelKeyType::HalfEdgeId, h.data());
    }
    for v in removed_vertices {
        mesh.channels
            .forget_element(ChannelKeyType::VertexId, v.data());
    }
    for f in removed_faces {
        mesh.channels
            .forget_element(ChannelKeyType::FaceId, f.data());
    }
}

pub fn transform(mesh: &mut HalfEdgeMesh, translate: Vec3, rotate: Vec3, scale: Vec3) -> Result<()> {
    let mut positions = mesh.write_positions();
    let conn = mesh.read_connectivity();

    for (v, _) in conn.iter_vertices() {
        positions[v] = Quat::from_euler(glam::EulerRot::XYZ, rotate.x, rotate.y, rotate.z)
            * (positions[v] * scale)
            + translate;
    }

    Ok(())
}

/// Generates the flat normals channel for this mesh
pub fn generate_flat_normals_channel(mesh: &HalfEdgeMesh) -> Result<Channel<FaceId, Vec3>> {
    use rayon::prelude::*;

    let positions = mesh.read_positions();
    let conn = mesh.read_connectivity();
    let conn_ref: &MeshConnectivity = &conn;
    let positions_ref: &Positions = &positions;

    let faces: Vec<FaceId> = conn.iter_faces().map(|(f, _)| f).collect();
    // NOTE: Faces with only 2 vertices get a zero normal.
    let computed: Vec<(FaceId, Vec3)> = faces
        .par_iter()
        .map(|&f| {
            (
                f,
                conn_ref
                    .face_normal(positions_ref, f)
                    .unwrap_or(Vec3::ZERO),
            )
        })
        .collect();

    let mut normals = Channel::<FaceId, Vec3>::new();
    for (f, n) in computed {
        normals[f] = n;
    }
    Ok(normals)
}

/// Computes the flat normal channel for this mesh and registers it as the
/// mesh's face normals. Flat normals are attached to faces.
pub fn set_flat_normals(mesh: &mut HalfEdgeMesh) -> Result<()> {
    let normals = generate_flat_normals_channel(mesh)?;
    let normals_ch_id = mesh
        .channels
        .replace_or_create_channel("face_normal", normals);

    mesh.default_channels.face_normals = Some(normals_ch_id);

    Ok(())
}

/// Generates the smooth normals channel for this mesh.
pub fn generate_smooth_normals_channel(mesh: &HalfEdgeMesh) -> Result<Channel<VertexId, Vec3>> {
    let positions = mesh.read_positions();
    let conn = mesh.read_connectivity();
    let mut normals = Channel::<VertexId, Vec3>::new();

    for (vertex, _) in conn.iter_vertices() {
        let adjacent_faces = conn.at_vertex(vertex).adjacent_faces()?;
        let mut normal = Vec3::ZERO;
        for face in adjacent_faces.iter_cpy() {
            normal += conn.face_normal(&positions, face).unwrap_or(Vec3::ZERO);
        }
        normals[vertex] = normal.normalize_or_zero();
    }

    Ok(normals)
}

/// Computes per-vertex normals by averaging the adjacent face normals and
/// registers them as the mesh's vertex normals.
pub fn set_smooth_normals(mesh: &mut HalfEdgeMesh) -> Result<()> {
    let normals = generate_smooth_normals_channel(mesh)?;
    let normals_ch_id = mesh
        .channels
        .replace_or_create_channel("vertex_normal", normals);

    mesh.default_channels.vertex_normals = Some(normals_ch_id);

    Ok(())
}

/// Writes `value` into the `channel_name` face channel for the given faces,
/// creating the channel if needed. Used for material and tag assignment.
pub fn set_face_tag(
    mesh: &mut HalfEdgeMesh,
    faces: &[FaceId],
    channel_name: &str,
    value: f32,
) -> Result<()> {
    {
        let conn = mesh.read_connectivity();
        for &f in faces {
            conn.at_face(f)?;
        }
    }
    let ch_id = mesh.channels.ensure_channel::<FaceId, f32>(channel_name);
    let mut channel = mesh.channels.write_channel(ch_id)?;
    for &f in faces {
        channel[f] = value;
    }
    Ok(())
}
