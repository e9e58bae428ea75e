// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Some useful re-exports
pub mod prelude;

/// The halfedge graph data structure and main edit operations
pub mod mesh;

/// The background operation pipeline: queued construction, modification,
/// subdivision and simplification of meshes on a worker thread.
pub mod pipeline;

/// Interior mutability aliases used across the mesh types.
pub mod sync;

/// Small container and iterator helpers.
pub mod utils;

#[cfg(test)]
mod mesh_tests;
