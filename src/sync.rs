// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mesh types use interior mutability so that connectivity and attribute
//! channels can be borrowed independently through a shared reference. The
//! cells are atomic because mesh content is handed to a worker thread by the
//! operation pipeline, so everything in a mesh has to be Send.

use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};
use std::sync::Arc;

pub type InteriorMutable<T> = AtomicRefCell<T>;

pub type RefCounted<T> = Arc<T>;

pub type BorrowedRef<'a, T> = AtomicRef<'a, T>;

pub type MutableRef<'a, T> = AtomicRefMut<'a, T>;

#[allow(dead_code)]
fn is_sync() {
    use crate::prelude::HalfEdgeMesh;

    fn assert_thread_safe<T: Send + Sync + 'static>(_: T) {}
    assert_thread_safe(HalfEdgeMesh::new())
}
