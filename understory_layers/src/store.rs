// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-key sparse layer storage.
//!
//! Each key keeps its occupied layers in a sorted `SmallVec`, searched with
//! binary search like a `vector_map`. Next to the slots sits an *order*
//! signal: the list of cells to consult, highest precedence first. Resolvers
//! subscribe to the order signal, not to the slots, so writing a literal into
//! an existing slot only wakes readers of that one cell, while creating or
//! replacing a slot republishes the order.
//!
//! Layer 0 has the highest precedence; larger indices are consulted later.

use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
use smallvec::SmallVec;
use understory_reactive::{NodeId, Runtime, Signal, Source};

/// Inline capacity for per-key layer lists.
///
/// Most keys are set on one or two layers.
pub(crate) const INLINE_LAYERS: usize = 4;

/// Cells to consult for one key, highest precedence first.
pub(crate) type LayerList<V> = SmallVec<[Source<Option<V>>; INLINE_LAYERS]>;

/// The content of one occupied layer.
enum Slot<V> {
    /// A literal cell created and owned by the store.
    Internal(Signal<Option<V>>),
    /// A cell owned elsewhere, read live.
    External(Source<Option<V>>),
}

impl<V> Copy for Slot<V> {}

impl<V> Clone for Slot<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(cell) => f.debug_tuple("Internal").field(&cell.id()).finish(),
            Self::External(source) => f.debug_tuple("External").field(&source.id()).finish(),
        }
    }
}

impl<V> Slot<V> {
    fn source(self) -> Source<Option<V>> {
        match self {
            Self::Internal(cell) => cell.into(),
            Self::External(source) => source,
        }
    }
}

struct KeyLayers<V> {
    /// Occupied layers, sorted by layer index.
    slots: SmallVec<[(u32, Slot<V>); INLINE_LAYERS]>,
    order: Signal<LayerList<V>>,
}

impl<V> fmt::Debug for KeyLayers<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLayers")
            .field("slots", &self.slots)
            .field("order", &self.order.id())
            .finish()
    }
}

impl<V: Clone + PartialEq + 'static> KeyLayers<V> {
    fn new(runtime: &Runtime) -> Self {
        Self {
            slots: SmallVec::new(),
            order: runtime.signal(LayerList::new()),
        }
    }

    #[inline]
    fn find(&self, layer: u32) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&layer, |(index, _)| *index)
    }

    fn publish(&self, runtime: &Runtime) {
        let order = self.slots.iter().map(|(_, slot)| slot.source()).collect();
        runtime.set(self.order, order);
    }

    fn write_literal(&mut self, runtime: &Runtime, layer: u32, value: Option<V>) {
        match self.find(layer) {
            Ok(idx) => {
                let slot = self.slots[idx].1;
                match slot {
                    Slot::Internal(cell) => {
                        runtime.set(cell, value);
                    }
                    Slot::External(_) => {
                        self.slots[idx].1 = Slot::Internal(runtime.signal(value));
                        self.publish(runtime);
                    }
                }
            }
            Err(idx) => {
                self.slots
                    .insert(idx, (layer, Slot::Internal(runtime.signal(value))));
                self.publish(runtime);
            }
        }
    }

    fn write_source(&mut self, runtime: &Runtime, layer: u32, source: Source<Option<V>>) {
        match self.find(layer) {
            Ok(idx) => {
                let previous = core::mem::replace(&mut self.slots[idx].1, Slot::External(source));
                match previous {
                    Slot::External(existing) if existing == source => {}
                    Slot::External(_) => self.publish(runtime),
                    Slot::Internal(cell) => {
                        self.publish(runtime);
                        runtime.dispose(cell);
                    }
                }
            }
            Err(idx) => {
                self.slots.insert(idx, (layer, Slot::External(source)));
                self.publish(runtime);
            }
        }
    }
}

/// Layered storage for every key of one
/// [`LayeredProperties`](crate::LayeredProperties).
///
/// Writes must happen inside a runtime batch: they may dispose cells, and
/// effects must not run while the store is borrowed.
pub(crate) struct LayerStore<K, V> {
    keys: HashMap<K, KeyLayers<V>>,
}

impl<K, V> fmt::Debug for LayerStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerStore")
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl<K, V> LayerStore<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone + PartialEq + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            keys: HashMap::new(),
        }
    }

    fn entry(&mut self, runtime: &Runtime, key: K) -> &mut KeyLayers<V> {
        self.keys
            .entry(key)
            .or_insert_with(|| KeyLayers::new(runtime))
    }

    /// Stores a literal (or undefined) value for `key` at `layer`.
    pub(crate) fn write_literal(&mut self, runtime: &Runtime, layer: u32, key: K, value: Option<V>) {
        self.entry(runtime, key).write_literal(runtime, layer, value);
    }

    /// Stores a live reference to `source` for `key` at `layer`.
    pub(crate) fn write_source(
        &mut self,
        runtime: &Runtime,
        layer: u32,
        key: K,
        source: Source<Option<V>>,
    ) {
        self.entry(runtime, key).write_source(runtime, layer, source);
    }

    /// Returns the cell currently backing `key` at `layer`.
    pub(crate) fn read_raw(&self, layer: u32, key: &K) -> Option<Source<Option<V>>> {
        let layers = self.keys.get(key)?;
        let idx = layers.find(layer).ok()?;
        Some(layers.slots[idx].1.source())
    }

    /// Returns the occupied layer indices of `key`, ascending.
    pub(crate) fn layer_indices(&self, key: &K) -> Vec<u32> {
        self.keys
            .get(key)
            .map(|layers| layers.slots.iter().map(|(index, _)| *index).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `key` has storage, even if every layer is undefined.
    #[inline]
    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }

    /// Returns the order signal for `key`, creating empty storage if needed.
    pub(crate) fn order(&mut self, runtime: &Runtime, key: K) -> Signal<LayerList<V>> {
        self.entry(runtime, key).order
    }

    /// Writes undefined into every slot at `layer`.
    ///
    /// Slots stay in place, so resolvers keep their subscriptions. Returns
    /// the number of keys touched.
    pub(crate) fn clear_layer(&mut self, runtime: &Runtime, layer: u32) -> usize {
        let mut touched = 0;
        for layers in self.keys.values_mut() {
            if layers.find(layer).is_ok() {
                layers.write_literal(runtime, layer, None);
                touched += 1;
            }
        }
        touched
    }
}

impl<K, V> LayerStore<K, V> {
    /// Empties the store, returning every node it owned.
    pub(crate) fn drain_nodes(&mut self) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        for (_, layers) in self.keys.drain() {
            nodes.push(layers.order.id());
            nodes.extend(layers.slots.iter().filter_map(|(_, slot)| match slot {
                Slot::Internal(cell) => Some(cell.id()),
                Slot::External(_) => None,
            }));
        }
        nodes
    }
}
