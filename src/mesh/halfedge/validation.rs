// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A read-only diagnostic pass over the whole halfedge structure. `validate`
//! re-checks the structural invariants and reports the first violation it
//! finds. It never mutates and never panics, even on malformed meshes, so it
//! is safe to call from tests and debugging tools at any point.

use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyError {
    /// A halfedge has no next pointer.
    MissingNext(HalfEdgeId),
    /// A halfedge has no tail vertex.
    MissingVertex(HalfEdgeId),
    /// A halfedge links to an element that is not alive anymore.
    DanglingReference(HalfEdgeId),
    /// pair(pair(h)) != h.
    BrokenPairing { halfedge: HalfEdgeId, pair: HalfEdgeId },
    /// A halfedge is its own pair.
    SelfPairing(HalfEdgeId),
    /// Following next from this halfedge never returns to it.
    OpenLoop(HalfEdgeId),
    /// A halfedge inside a face's loop reports a different face.
    ForeignLoopHalfEdge { face: FaceId, halfedge: HalfEdgeId },
    /// A face has no representative halfedge, or a dead one.
    InvalidFaceHalfEdge(FaceId),
    /// A vertex has no representative halfedge, or a dead one.
    InvalidVertexHalfEdge(VertexId),
    /// A vertex's representative halfedge does not start at the vertex.
    WrongVertexHalfEdge { vertex: VertexId, halfedge: HalfEdgeId },
    /// A halfedge starts at this vertex but cycling the vertex fan from the
    /// representative never reaches it.
    UnreachableFanHalfEdge { vertex: VertexId, halfedge: HalfEdgeId },
}

impl std::fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{self:?}"))
    }
}
impl std::error::Error for ConsistencyError {}

/// Re-checks the structural invariants over the whole of `conn` and reports
/// the first violation found. Read-only and side-effect free; not meant for
/// the hot path.
pub fn validate(conn: &MeshConnectivity) -> Result<(), ConsistencyError> {
    check_halfedge_links(conn)?;
    check_loops(conn)?;
    check_faces(conn)?;
    check_vertices(conn)?;
    Ok(())
}

fn check_halfedge_links(conn: &MeshConnectivity) -> Result<(), ConsistencyError> {
    for (h, data) in conn.iter_halfedges() {
        let next = data.next.ok_or(ConsistencyError::MissingNext(h))?;
        if !conn.halfedge_exists(next) {
            return Err(ConsistencyError::DanglingReference(h));
        }
        let vertex = data.vertex.ok_or(ConsistencyError::MissingVertex(h))?;
        if !conn.vertex_exists(vertex) {
            return Err(ConsistencyError::DanglingReference(h));
        }
        if let Some(face) = data.face {
            if !conn.face_exists(face) {
                return Err(ConsistencyError::DanglingReference(h));
            }
        }
        // An absent pair is an explicit open-edge state (a cut rim waiting to
        // be capped); a present pair must be a true involution.
        if let Some(pair) = data.pair {
            if pair == h {
                return Err(ConsistencyError::SelfPairing(h));
            }
            let pair_data = conn
                .halfedge(pair)
                .ok_or(ConsistencyError::DanglingReference(h))?;
            if pair_data.pair != Some(h) {
                return Err(ConsistencyError::BrokenPairing { halfedge: h, pair });
            }
        }
    }
    Ok(())
}

fn check_loops(conn: &MeshConnectivity) -> Result<(), ConsistencyError> {
    // Halfedges already known to sit on a closing loop, so each loop is only
    // walked once.
    let mut closing = HashSet::new();
    for (h0, _) in conn.iter_halfedges() {
        if closing.contains(&h0) {
            continue;
        }
        let mut path = vec![h0];
        let mut h = h0;
        loop {
            if path.len() > MAX_LOOP_ITERATIONS {
                return Err(ConsistencyError::OpenLoop(h0));
            }
            h = match conn.halfedge(h).and_then(|d| d.next) {
                Some(next) if conn.halfedge_exists(next) => next,
                _ => return Err(ConsistencyError::OpenLoop(h0)),
            };
            if h == h0 || closing.contains(&h) {
                break;
            }
            path.push(h);
        }
        closing.extend(path);
    }
    Ok(())
}

fn check_faces(conn: &MeshConnectivity) -> Result<(), ConsistencyError> {
    for (f, data) in conn.iter_faces() {
        let h0 = match data.halfedge {
            Some(h) if conn.halfedge_exists(h) => h,
            _ => return Err(ConsistencyError::InvalidFaceHalfEdge(f)),
        };
        // check_loops already proved the loop closes; this walk checks that
        // every member reports this face.
        let mut h = h0;
        let mut count = 0;
        loop {
            count += 1;
            if count > MAX_LOOP_ITERATIONS {
                return Err(ConsistencyError::OpenLoop(h0));
            }
            let data = match conn.halfedge(h) {
                Some(data) => data,
                None => return Err(ConsistencyError::DanglingReference(h)),
            };
            if data.face != Some(f) {
                return Err(ConsistencyError::ForeignLoopHalfEdge { face: f, halfedge: h });
            }
            h = match data.next {
                Some(next) => next,
                None => return Err(ConsistencyError::MissingNext(h)),
            };
            if h == h0 {
                break;
            }
        }
    }
    Ok(())
}

fn check_vertices(conn: &MeshConnectivity) -> Result<(), ConsistencyError> {
    // Outgoing halfedge counts, to compare against what the fan walk reaches.
    let mut outgoing_count = HashMap::<VertexId, usize>::new();
    for (_, data) in conn.iter_halfedges() {
        if let Some(v) = data.vertex {
            *outgoing_count.entry(v).or_insert(0) += 1;
        }
    }

    for (v, data) in conn.iter_vertices() {
        let h0 = match data.halfedge {
            Some(h) if conn.halfedge_exists(h) => h,
            _ => return Err(ConsistencyError::InvalidVertexHalfEdge(v)),
        };
        let h0_vertex = conn.halfedge(h0).and_then(|data| data.vertex);
        if h0_vertex != Some(v) {
            return Err(ConsistencyError::WrongVertexHalfEdge {
                vertex: v,
                halfedge: h0,
            });
        }

        // Walk the fan (next of pair) from the representative. When an
        // unpaired halfedge interrupts the walk the reachability check is
        // skipped: the fan is explicitly open.
        let mut reached = 1;
        let mut complete_fan = true;
        let mut h = h0;
        loop {
            if reached > MAX_LOOP_ITERATIONS {
                return Err(ConsistencyError::UnreachableFanHalfEdge {
                    vertex: v,
                    halfedge: h,
                });
            }
            let pair = match conn.halfedge(h).and_then(|d| d.pair) {
                Some(p) if conn.halfedge_exists(p) => p,
                _ => {
                    complete_fan = false;
                    break;
                }
            };
            h = match conn.halfedge(pair).and_then(|d| d.next) {
                Some(n) if conn.halfedge_exists(n) => n,
                _ => {
                    complete_fan = false;
                    break;
                }
            };
            if h == h0 {
                break;
            }
            reached += 1;
        }

        if complete_fan && reached != outgoing_count.get(&v).copied().unwrap_or(0) {
            return Err(ConsistencyError::UnreachableFanHalfEdge {
                vertex: v,
                halfedge: h0,
            });
        }
    }
    Ok(())
}
