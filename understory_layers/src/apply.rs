// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Write-time key rewriting.
//!
//! Every public write goes through an [`Apply`] strategy before it reaches
//! storage. The strategy may forward the write unchanged ([`Identity`]),
//! expand a shorthand key into several longhand keys ([`AliasTable`]), or do
//! anything else expressible through [`RawSet`].

use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::properties::Shared;
use crate::value::PropertyValue;

/// Rewrites a write into zero or more raw writes.
///
/// Implemented for closures of the form
/// `Fn(K, PropertyValue<V>, &mut RawSet<'_, K, V>)`.
///
/// An `Apply` must not write back through the public
/// [`set`](crate::LayeredProperties::set) of the same object; raw writes are
/// the only way to store values from inside it.
pub trait Apply<K, V> {
    /// Handles one write of `value` to `key`.
    fn apply(&self, key: K, value: PropertyValue<V>, set: &mut RawSet<'_, K, V>);
}

impl<K, V, F> Apply<K, V> for F
where
    F: Fn(K, PropertyValue<V>, &mut RawSet<'_, K, V>),
{
    #[inline]
    fn apply(&self, key: K, value: PropertyValue<V>, set: &mut RawSet<'_, K, V>) {
        self(key, value, set);
    }
}

/// Stores every write as-is.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl<K, V> Apply<K, V> for Identity
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    #[inline]
    fn apply(&self, key: K, value: PropertyValue<V>, set: &mut RawSet<'_, K, V>) {
        set.set(key, value);
    }
}

/// Expands shorthand keys into their longhands.
///
/// Keys without an entry are stored unchanged.
///
/// # Example
///
/// ```rust
/// use understory_layers::{AliasTable, LayeredProperties};
/// use understory_reactive::Runtime;
///
/// let rt = Runtime::new();
/// let aliases = AliasTable::new().alias("margin", ["marginTop", "marginBottom"]);
/// let props = LayeredProperties::<&str, i32>::builder(&rt)
///     .apply(aliases)
///     .build();
///
/// props.set(0, "margin", Some(4));
/// assert_eq!(props.peek("marginTop"), Some(4));
/// assert_eq!(props.peek("marginBottom"), Some(4));
/// assert!(!props.contains_key(&"margin"));
/// ```
#[derive(Clone)]
pub struct AliasTable<K> {
    aliases: HashMap<K, SmallVec<[K; 4]>>,
}

impl<K> Default for AliasTable<K> {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for AliasTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.aliases.iter().map(|(k, v)| (k, v.as_slice())))
            .finish()
    }
}

impl<K: Clone + Eq + Hash> AliasTable<K> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an alias, builder style.
    #[must_use]
    pub fn alias(mut self, key: impl Into<K>, targets: impl IntoIterator<Item = K>) -> Self {
        self.insert(key.into(), targets);
        self
    }

    /// Adds or replaces an alias.
    pub fn insert(&mut self, key: K, targets: impl IntoIterator<Item = K>) {
        self.aliases.insert(key, targets.into_iter().collect());
    }

    /// Returns the longhands of `key`, if it is an alias.
    #[must_use]
    pub fn targets(&self, key: &K) -> Option<&[K]> {
        self.aliases.get(key).map(SmallVec::as_slice)
    }

    /// Returns the number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Returns `true` if the table has no aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl<K, V> Apply<K, V> for AliasTable<K>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    fn apply(&self, key: K, value: PropertyValue<V>, set: &mut RawSet<'_, K, V>) {
        match self.aliases.get(&key) {
            Some(targets) => {
                for target in targets {
                    set.set(target.clone(), value.clone());
                }
            }
            None => set.set(key, value),
        }
    }
}

/// The raw writer handed to [`Apply::apply`].
///
/// Writes through it bypass the strategy and land directly in storage, at
/// the layer of the originating write.
pub struct RawSet<'a, K, V> {
    target: &'a Shared<K, V>,
    layer: u32,
    writes: usize,
}

impl<K, V> fmt::Debug for RawSet<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSet")
            .field("layer", &self.layer)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl<'a, K, V> RawSet<'a, K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    pub(crate) fn new(target: &'a Shared<K, V>, layer: u32) -> Self {
        Self {
            target,
            layer,
            writes: 0,
        }
    }

    /// The layer being written.
    #[must_use]
    #[inline]
    pub fn layer(&self) -> u32 {
        self.layer
    }

    /// Number of raw writes issued so far.
    #[must_use]
    #[inline]
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Stores `value` for `key` at the current layer.
    pub fn set(&mut self, key: impl Into<K>, value: impl Into<PropertyValue<V>>) {
        self.target.write(self.layer, key.into(), value.into());
        self.writes += 1;
    }
}
