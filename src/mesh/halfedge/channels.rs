// Copyright (C) 2023 the halfmesh contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::{any::Any, fmt::Debug, marker::PhantomData};

use crate::sync::{BorrowedRef, InteriorMutable, MutableRef, RefCounted};
use slotmap::{KeyData, SecondaryMap, SlotMap};

use super::*;

/// The key of a channel is the type of element the channel is attaching data
/// to. It can be Vertices, HalfEdges or Faces, and the `ChannelKey` is the
/// corresponding id type.
pub trait ChannelKey: slotmap::Key + Debug + Clone + Copy + Send + Sync + Sized + 'static {
    fn key_type() -> ChannelKeyType;
    fn name() -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKeyType {
    VertexId,
    FaceId,
    HalfEdgeId,
}

macro_rules! impl_channel_key {
    ($t:ident) => {
        impl ChannelKey for $t {
            fn key_type() -> ChannelKeyType {
                ChannelKeyType::$t
            }
            fn name() -> &'static str {
                stringify!($t)
            }
        }
    };
}
impl_channel_key!(VertexId);
impl_channel_key!(FaceId);
impl_channel_key!(HalfEdgeId);

/// The value of a channel is the data that is associated to a specific key.
/// Values can be scalars (f32), vectors (Vec3) or flags (bool).
pub trait ChannelValue: Default + Debug + Clone + Copy + Send + Sync + Sized + 'static {
    fn value_type() -> ChannelValueType;
    fn name() -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelValueType {
    Vec3,
    F32,
    Bool,
}

macro_rules! impl_channel_value {
    ($t:ident, $variant:ident) => {
        impl ChannelValue for $t {
            fn value_type() -> ChannelValueType {
                ChannelValueType::$variant
            }
            fn name() -> &'static str {
                stringify!($t)
            }
        }
    };
}
impl_channel_value!(Vec3, Vec3);
impl_channel_value!(f32, F32);
impl_channel_value!(bool, Bool);

/// A channel attaches a value of type `V` to every element keyed by `K` of a
/// single mesh. Storage is sparse: keys that were never written read back as
/// the channel's default value.
///
/// Using keys taken from a different mesh in a channel is considered an
/// error. It is not UB but will not behave as expected.
#[derive(Clone, Debug)]
pub struct Channel<K: ChannelKey, V: ChannelValue> {
    inner: SecondaryMap<K, V>,
    default: V,
}

slotmap::new_key_type! {
    /// Channels in a [`ChannelGroup`] are stored using a slotmap. This is the
    /// id type for this slotmap. There is a type-safe wrapper [`ChannelId`]
    /// that wraps this but is generic over the key and value types.
    pub struct RawChannelId;
}

/// A generic wrapper over a `RawChannelId`, providing some extra type safety
/// for the typed channel APIs.
pub struct ChannelId<K: ChannelKey, V: ChannelValue> {
    raw: RawChannelId,
    _phantom: PhantomData<(K, V)>,
}

impl<K: ChannelKey, V: ChannelValue> ChannelId<K, V> {
    pub fn new(raw: RawChannelId) -> Self {
        Self {
            raw,
            _phantom: PhantomData,
        }
    }
}

// NOTE: Manual impls because deriving would put unnecessary bounds on K, V.
impl<K: ChannelKey, V: ChannelValue> Clone for ChannelId<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.raw)
    }
}
impl<K: ChannelKey, V: ChannelValue> Copy for ChannelId<K, V> {}
impl<K: ChannelKey, V: ChannelValue> PartialEq for ChannelId<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<K: ChannelKey, V: ChannelValue> Eq for ChannelId<K, V> {}
impl<K: ChannelKey, V: ChannelValue> std::hash::Hash for ChannelId<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}
impl<K: ChannelKey, V: ChannelValue> Debug for ChannelId<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelId<{}, {}>({:?})", K::name(), V::name(), self.raw)
    }
}

impl<K: ChannelKey, V: ChannelValue> std::ops::Index<K> for Channel<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        // Will return the default value for never-accessed keys.
        self.inner.get(index).unwrap_or(&self.default)
    }
}
impl<K: ChannelKey, V: ChannelValue> std::ops::IndexMut<K> for Channel<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.inner
            .entry(index)
            // From the `entry` documentation in slotmap: May return None if
            // the key was removed from the originating slot map.
            .expect("Error indexing channel. Key was removed from the originating slotmap.")
            // Will insert the default value for never-accessed keys.
            .or_default()
    }
}

impl<K: ChannelKey, V: ChannelValue> Channel<K, V> {
    /// Constructs a new channel without adding it to a mesh.
    pub fn new() -> Self {
        Self::new_with_default(V::default())
    }

    /// Constructs a new channel without adding it to a mesh. This allows
    /// setting the `default` value of this channel.
    pub fn new_with_default(default: V) -> Self {
        Self {
            inner: SecondaryMap::new(),
            default,
        }
    }

    /// Iterates the stored entries, returning an iterator of keys and values
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.inner.iter()
    }

    /// Iterates the stored entries, returning a mut iterator of keys and values
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.inner.iter_mut()
    }

    /// Copies the value stored for `from` (if any) onto `to`.
    pub fn copy_key(&mut self, from: K, to: K) {
        if let Some(value) = self.inner.get(from).copied() {
            self.inner.insert(to, value);
        }
    }

    /// Drops the value stored for `key`, if any.
    pub fn forget_key(&mut self, key: K) {
        self.inner.remove(key);
    }
}

impl<K: ChannelKey, V: ChannelValue> Default for Channel<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`ChannelGroup`] is a homogeneous group of channels sharing the same key
/// and value types, registered under unique names. Channels are stored behind
/// shared ownership and interior mutability so that several channels of a
/// mesh can be borrowed independently through the mesh's shared reference.
#[derive(Debug)]
pub struct ChannelGroup<K: ChannelKey, V: ChannelValue> {
    channel_names: bimap::BiMap<String, ChannelId<K, V>>,
    channels: SlotMap<RawChannelId, RefCounted<InteriorMutable<Channel<K, V>>>>,
}

impl<K: ChannelKey, V: ChannelValue> Default for ChannelGroup<K, V> {
    fn default() -> Self {
        Self {
            channel_names: bimap::BiMap::new(),
            channels: SlotMap::with_key(),
        }
    }
}

impl<K: ChannelKey, V: ChannelValue> ChannelGroup<K, V> {
    /// Returns the channel id registered under `name`, creating an empty
    /// channel when the name is new.
    pub fn ensure_channel(&mut self, name: &str) -> ChannelId<K, V> {
        match self.channel_names.get_by_left(name) {
            Some(id) => *id,
            None => {
                let id = ChannelId::new(
                    self.channels
                        .insert(RefCounted::new(InteriorMutable::new(Channel::new()))),
                );
                self.channel_names.insert(name.into(), id);
                id
            }
        }
    }

    /// Creates a new channel registered under `name`. Fails if a channel with
    /// the same name already exists in the group.
    pub fn create_channel(&mut self, name: &str) -> Result<ChannelId<K, V>> {
        if self.channel_names.contains_left(name) {
            bail!(
                "A channel named '{name}' already exists for key {} and value {}",
                K::name(),
                V::name()
            );
        }
        Ok(self.ensure_channel(name))
    }

    pub fn channel_id(&self, name: &str) -> Option<ChannelId<K, V>> {
        self.channel_names.get_by_left(name).copied()
    }

    pub fn read_channel(&self, id: ChannelId<K, V>) -> Result<BorrowedRef<'_, Channel<K, V>>> {
        Ok(self
            .channels
            .get(id.raw)
            .ok_or_else(|| anyhow!("Channel does not exist: {id:?}"))?
            .borrow())
    }

    pub fn write_channel(&self, id: ChannelId<K, V>) -> Result<MutableRef<'_, Channel<K, V>>> {
        Ok(self
            .channels
            .get(id.raw)
            .ok_or_else(|| anyhow!("Channel does not exist: {id:?}"))?
            .borrow_mut())
    }

    /// Replaces the contents of the channel registered under `name` with
    /// `channel`, creating it when missing. Returns the channel id.
    pub fn replace_or_create_channel(
        &mut self,
        name: &str,
        channel: Channel<K, V>,
    ) -> ChannelId<K, V> {
        let id = self.ensure_channel(name);
        *self.channels[id.raw].borrow_mut() = channel;
        id
    }
}

/// The dynamic face of a [`ChannelGroup`]. Operators use this to copy, sweep
/// and merge attribute values across every channel attached to an element
/// kind without knowing the concrete value types.
pub trait DynChannelGroup: Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn DynChannelGroup>;
    fn empty_box(&self) -> Box<dyn DynChannelGroup>;
    /// Copies the values stored for element `from` onto element `to`, in
    /// every channel of the group.
    fn copy_key(&mut self, from: KeyData, to: KeyData);
    /// Drops the values stored for element `key` in every channel.
    fn forget_key(&mut self, key: KeyData);
    /// Copies every entry of `other`'s channels into same-named channels of
    /// this group, translating keys through `remap`. Entries whose key is not
    /// in `remap` are skipped.
    fn merge_keys(&mut self, other: &dyn DynChannelGroup, remap: &HashMap<KeyData, KeyData>);
}

impl<K: ChannelKey, V: ChannelValue> DynChannelGroup for ChannelGroup<K, V> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn DynChannelGroup> {
        // Cloning the slotmap keeps the raw channel ids stable, so ids held
        // by a DefaultChannels registry stay valid in the copy. The cells are
        // then replaced so the copy never shares storage with the original.
        let mut channels = self.channels.clone();
        for (_, cell) in channels.iter_mut() {
            let deep = cell.borrow().clone();
            *cell = RefCounted::new(InteriorMutable::new(deep));
        }
        Box::new(ChannelGroup::<K, V> {
            channel_names: self.channel_names.clone(),
            channels,
        })
    }

    fn empty_box(&self) -> Box<dyn DynChannelGroup> {
        Box::<ChannelGroup<K, V>>::default()
    }

    fn copy_key(&mut self, from: KeyData, to: KeyData) {
        for (_, cell) in self.channels.iter() {
            cell.borrow_mut().copy_key(K::from(from), K::from(to));
        }
    }

    fn forget_key(&mut self, key: KeyData) {
        for (_, cell) in self.channels.iter() {
            cell.borrow_mut().forget_key(K::from(key));
        }
    }

    fn merge_keys(&mut self, other: &dyn DynChannelGroup, remap: &HashMap<KeyData, KeyData>) {
        use slotmap::Key;
        let other = other
            .as_any()
            .downcast_ref::<ChannelGroup<K, V>>()
            .expect("Merged channel groups should have the same key and value types");
        for (name, other_id) in other.channel_names.iter() {
            let this_id = self.ensure_channel(name);
            let src = other.channels[other_id.raw].borrow();
            let mut dst = self.channels[this_id.raw].borrow_mut();
            for (k, v) in src.iter() {
                if let Some(new_key) = remap.get(&k.data()) {
                    dst[K::from(*new_key)] = *v;
                }
            }
        }
    }
}

/// Key mappings produced when one mesh's elements are spliced into another.
/// Used to carry channel values over to the freshly allocated keys.
pub struct ElementRemaps {
    pub vertices: HashMap<KeyData, KeyData>,
    pub faces: HashMap<KeyData, KeyData>,
    pub halfedges: HashMap<KeyData, KeyData>,
}

impl ElementRemaps {
    fn for_kind(&self, kty: ChannelKeyType) -> &HashMap<KeyData, KeyData> {
        match kty {
            ChannelKeyType::VertexId => &self.vertices,
            ChannelKeyType::FaceId => &self.faces,
            ChannelKeyType::HalfEdgeId => &self.halfedges,
        }
    }
}

/// The [`MeshChannels`] are one part of a [`HalfEdgeMesh`]. This struct
/// stores a heterogeneous set of channel groups, with potentially one
/// [`ChannelGroup`] for each key and value type combination.
#[derive(Default, Debug)]
pub struct MeshChannels {
    channels: HashMap<(ChannelKeyType, ChannelValueType), Box<dyn DynChannelGroup>>,
}

impl Clone for MeshChannels {
    fn clone(&self) -> Self {
        Self {
            channels: self
                .channels
                .iter()
                .map(|(k, v)| (*k, v.clone_box()))
                .collect(),
        }
    }
}

impl MeshChannels {
    fn group_mut<K: ChannelKey, V: ChannelValue>(&mut self) -> &mut ChannelGroup<K, V> {
        self.channels
            .entry((K::key_type(), V::value_type()))
            .or_insert_with(|| Box::<ChannelGroup<K, V>>::default())
            .as_any_mut()
            .downcast_mut::<ChannelGroup<K, V>>()
            .expect("Group should have the right key and value types")
    }

    fn group<K: ChannelKey, V: ChannelValue>(&self) -> Option<&ChannelGroup<K, V>> {
        self.channels
            .get(&(K::key_type(), V::value_type()))
            .and_then(|g| g.as_any().downcast_ref())
    }

    /// Returns the channel id registered under `name`, creating an empty
    /// channel when the name is new.
    pub fn ensure_channel<K: ChannelKey, V: ChannelValue>(&mut self, name: &str) -> ChannelId<K, V> {
        self.group_mut::<K, V>().ensure_channel(name)
    }

    /// Creates a new channel registered under `name`. Fails if a channel with
    /// the same name and types already exists.
    pub fn create_channel<K: ChannelKey, V: ChannelValue>(
        &mut self,
        name: &str,
    ) -> Result<ChannelId<K, V>> {
        self.group_mut::<K, V>().create_channel(name)
    }

    pub fn channel_id<K: ChannelKey, V: ChannelValue>(&self, name: &str) -> Option<ChannelId<K, V>> {
        self.group::<K, V>().and_then(|g| g.channel_id(name))
    }

    pub fn read_channel<K: ChannelKey, V: ChannelValue>(
        &self,
        id: ChannelId<K, V>,
    ) -> Result<BorrowedRef<'_, Channel<K, V>>> {
        self.group::<K, V>()
            .ok_or_else(|| anyhow!("No channels for key {} and value {}", K::name(), V::name()))?
            .read_channel(id)
    }

    pub fn read_channel_by_name<K: ChannelKey, V: ChannelValue>(
        &self,
        name: &str,
    ) -> Result<BorrowedRef<'_, Channel<K, V>>> {
        let id = self
            .channel_id::<K, V>(name)
            .ok_or_else(|| anyhow!("No channel named '{name}'"))?;
        self.read_channel(id)
    }

    pub fn write_channel<K: ChannelKey, V: ChannelValue>(
        &self,
        id: ChannelId<K, V>,
    ) -> Result<MutableRef<'_, Channel<K, V>>> {
        self.group::<K, V>()
            .ok_or_else(|| anyhow!("No channels for key {} and value {}", K::name(), V::name()))?
            .write_channel(id)
    }

    /// Replaces the contents of the channel registered under `name`,
    /// creating it when missing. Returns the channel id.
    pub fn replace_or_create_channel<K: ChannelKey, V: ChannelValue>(
        &mut self,
        name: &str,
        channel: Channel<K, V>,
    ) -> ChannelId<K, V> {
        self.group_mut::<K, V>()
            .replace_or_create_channel(name, channel)
    }

    /// Copies every channel value attached to element `from` onto element
    /// `to`, across all channels keyed by `kty`. This is how face properties
    /// survive splits and merges.
    pub fn copy_element(&mut self, kty: ChannelKeyType, from: KeyData, to: KeyData) {
        for ((k, _), group) in self.channels.iter_mut() {
            if *k == kty {
                group.copy_key(from, to);
            }
        }
    }

    /// Drops every channel value attached to element `key`. Called when an
    /// element is removed so no stale attribute data lingers.
    pub fn forget_element(&mut self, kty: ChannelKeyType, key: KeyData) {
        for ((k, _), group) in self.channels.iter_mut() {
            if *k == kty {
                group.forget_key(key);
            }
        }
    }

    /// Copies `other`'s channel entries into this mesh's channels, remapping
    /// keys through `remaps`. Missing groups and channels are created.
    pub fn merge_from(&mut self, other: &MeshChannels, remaps: &ElementRemaps) {
        for ((kty, vty), group) in other.channels.iter() {
            let remap = remaps.for_kind(*kty);
            self.channels
                .entry((*kty, *vty))
                .or_insert_with(|| group.empty_box())
                .merge_keys(group.as_ref(), remap);
        }
    }
}

/// This helper struct is stored in meshes and contains the channel ids for
/// some "well-known" channels that are always present. This avoids
/// unnecessary string lookups to fetch frequently used channels like
/// `position`.
#[derive(Debug, Clone)]
pub struct DefaultChannels {
    pub position: ChannelId<VertexId, Vec3>,
    pub vertex_normals: Option<ChannelId<VertexId, Vec3>>,
    pub face_normals: Option<ChannelId<FaceId, Vec3>>,
}

impl DefaultChannels {
    pub fn with_position(channels: &mut MeshChannels) -> Self {
        let position = channels.ensure_channel::<VertexId, Vec3>("position");
        Self {
            position,
            vertex_normals: None,
            face_normals: None,
        }
    }
}
