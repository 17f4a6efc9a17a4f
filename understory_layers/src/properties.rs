// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The layered property façade and its builder.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
use understory_reactive::{Computed, IntoSource, NodeId, ReactiveError, Runtime, Source, Tracker};

use crate::apply::{Apply, Identity, RawSet};
use crate::registry::{KeyRegistry, KeySubscription};
use crate::resolver::{read_defined, resolver};
use crate::store::LayerStore;
use crate::value::{DefaultValue, PropertyValue};

/// State shared by every clone of a [`LayeredProperties`].
pub(crate) struct Shared<K, V> {
    runtime: Runtime,
    apply: Box<dyn Apply<K, V>>,
    defaults: HashMap<K, DefaultValue<V>>,
    layers: RefCell<LayerStore<K, V>>,
    resolvers: RefCell<HashMap<K, Computed<Option<V>>>>,
    registry: KeyRegistry<K>,
    parent: RefCell<Option<KeySubscription<K>>>,
    /// Handed out by `signal` once destroyed; already disposed.
    detached: Cell<Option<Computed<Option<V>>>>,
    destroyed: Cell<bool>,
}

impl<K, V> Shared<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Routes a public write through the apply strategy.
    fn set(&self, layer: u32, key: K, value: PropertyValue<V>) {
        if self.destroyed.get() {
            return;
        }
        self.runtime.batch(|| {
            let mut raw = RawSet::new(self, layer);
            self.apply.apply(key, value, &mut raw);
            tracing::trace!(layer, writes = raw.writes(), "applied property write");
        });
    }

    /// Stores a value, bypassing the apply strategy.
    pub(crate) fn write(&self, layer: u32, key: K, value: PropertyValue<V>) {
        if self.destroyed.get() {
            return;
        }
        self.runtime.batch(|| {
            {
                let mut layers = self.layers.borrow_mut();
                match value {
                    PropertyValue::Value(value) => {
                        layers.write_literal(&self.runtime, layer, key.clone(), Some(value));
                    }
                    PropertyValue::Unset => {
                        layers.write_literal(&self.runtime, layer, key.clone(), None);
                    }
                    PropertyValue::Source(source) => {
                        layers.write_source(&self.runtime, layer, key.clone(), source);
                    }
                }
            }
            self.registry.register(&key);
        });
    }

    /// Returns the resolver for `key`, creating it on first use.
    fn resolver(&self, key: K) -> Computed<Option<V>> {
        if let Some(existing) = self.resolvers.borrow().get(&key) {
            return *existing;
        }
        let order = self.layers.borrow_mut().order(&self.runtime, key.clone());
        let fallback = self.defaults.get(&key).cloned();
        let created = resolver(&self.runtime, order, fallback);
        self.resolvers.borrow_mut().insert(key, created);
        created
    }

    /// Returns `true` if reading `key` could yield anything but undefined.
    fn may_resolve(&self, key: &K) -> bool {
        self.resolvers.borrow().contains_key(key)
            || self.defaults.contains_key(key)
            || self.layers.borrow().contains_key(key)
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let detached = self.runtime.computed(|_| None::<V>);
        self.detached.set(Some(detached));
        self.release([detached.id()]);
    }
}

impl<K, V> Shared<K, V> {
    /// Detaches from the parent and disposes every owned node plus `extra`.
    fn release(&self, extra: impl IntoIterator<Item = NodeId>) {
        let parent = self.parent.borrow_mut().take();
        if let Some(subscription) = parent {
            subscription.unsubscribe();
        }
        self.registry.clear_listeners();

        let mut nodes: Vec<NodeId> = self
            .resolvers
            .borrow_mut()
            .drain()
            .map(|(_, resolver)| resolver.id())
            .collect();
        nodes.extend(self.layers.borrow_mut().drain_nodes());
        nodes.extend(extra);

        let count = nodes.len();
        self.runtime.batch(|| {
            for node in nodes {
                self.runtime.dispose(node);
            }
        });
        tracing::debug!(disposed = count, "released layered properties");
    }
}

impl<K, V> Drop for Shared<K, V> {
    fn drop(&mut self) {
        if !self.destroyed.replace(true) {
            self.release(core::iter::empty());
        }
    }
}

/// Layered, reactive key/value properties.
///
/// Values are written into numbered layers; reading a key yields the value
/// of the lowest-numbered layer that defines it, or the key's default.
/// Reads through a [`Tracker`] are fine-grained: a computation depends only
/// on the layers it had to consult to find the winner.
///
/// `LayeredProperties` is a cheap handle; clones share the same storage.
///
/// # Example
///
/// ```rust
/// use understory_layers::LayeredProperties;
/// use understory_reactive::Runtime;
///
/// let rt = Runtime::new();
/// let props = LayeredProperties::<&str, u32>::builder(&rt)
///     .default("width", 100)
///     .build();
///
/// assert_eq!(props.peek("width"), Some(100));
/// props.set(1, "width", Some(50));
/// assert_eq!(props.peek("width"), Some(50));
/// props.set(0, "width", Some(10));
/// assert_eq!(props.peek("width"), Some(10));
/// props.clear_layer(0);
/// assert_eq!(props.peek("width"), Some(50));
/// ```
pub struct LayeredProperties<K, V> {
    shared: Rc<Shared<K, V>>,
}

impl<K, V> Clone for LayeredProperties<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K, V> fmt::Debug for LayeredProperties<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredProperties")
            .field("layers", &self.shared.layers.try_borrow().ok())
            .field("registry", &self.shared.registry)
            .field("destroyed", &self.shared.destroyed.get())
            .finish_non_exhaustive()
    }
}

impl<K, V> LayeredProperties<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Creates properties with no defaults that store every write as-is.
    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self::builder(runtime).build()
    }

    /// Starts configuring properties on `runtime`.
    #[must_use]
    pub fn builder(runtime: &Runtime) -> LayeredPropertiesBuilder<K, V> {
        LayeredPropertiesBuilder::new(runtime)
    }

    /// Returns the runtime these properties live in.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    /// Writes `value` for `key` at `layer`, through the apply strategy.
    ///
    /// Writing `None` (or [`PropertyValue::Unset`]) makes the layer
    /// undefined for that key; lower-precedence layers show through. Effects
    /// woken by the write run once, after the whole write has been stored.
    ///
    /// Does nothing once [`destroy`](Self::destroy) has been called.
    ///
    /// A [`PropertyValue::Source`] must come from this object's
    /// [`runtime`](Self::runtime). Handles carry no runtime identity, so a
    /// cell from another runtime is not rejected. It resolves to whatever
    /// node has the same ID here: a missing one reads as undefined, one of
    /// another type panics with [`ReactiveError::TypeMismatch`].
    pub fn set(&self, layer: u32, key: impl Into<K>, value: impl Into<PropertyValue<V>>) {
        self.shared.set(layer, key.into(), value.into());
    }

    /// Reads the resolved value of `key`, recording a dependency.
    ///
    /// Returns `None` if no layer defines the key and it has no default, or
    /// once the properties have been destroyed.
    #[must_use]
    pub fn get(&self, tx: &Tracker<'_>, key: impl Into<K>) -> Option<V> {
        if self.shared.destroyed.get() {
            return None;
        }
        read_defined(tx, self.shared.resolver(key.into()))
    }

    /// Reads the resolved value of `key` without recording a dependency.
    #[must_use]
    pub fn peek(&self, key: impl Into<K>) -> Option<V> {
        let key = key.into();
        if self.shared.destroyed.get() || !self.shared.may_resolve(&key) {
            return None;
        }
        let resolved = self.shared.resolver(key);
        match self.shared.runtime.try_peek(resolved) {
            Ok(value) => value,
            Err(ReactiveError::Disposed(_)) => None,
            Err(err) => panic!("{err}"),
        }
    }

    /// Returns the memoized resolver node for `key`.
    ///
    /// The same handle is returned for the same key until the properties
    /// are destroyed, so it can be stored as a layer of another
    /// `LayeredProperties`. After destruction a disposed handle is returned,
    /// which reads as undefined wherever it is nested.
    #[must_use]
    pub fn signal(&self, key: impl Into<K>) -> Computed<Option<V>> {
        if let Some(detached) = self.shared.detached.get() {
            return detached;
        }
        self.shared.resolver(key.into())
    }

    /// Makes `layer` undefined for every key that has a slot there.
    pub fn clear_layer(&self, layer: u32) {
        let shared = &self.shared;
        if shared.destroyed.get() {
            return;
        }
        shared.runtime.batch(|| {
            let touched = shared.layers.borrow_mut().clear_layer(&shared.runtime, layer);
            tracing::trace!(layer, touched, "cleared layer");
        });
    }

    /// Calls `listener` for every key ever stored, then for each new key as
    /// it is first stored.
    ///
    /// Keys are reported in discovery order, each at most once per listener.
    /// Keys written through an [`Apply`] strategy are the raw keys that were
    /// actually stored.
    pub fn subscribe_property_keys(&self, listener: impl Fn(&K) + 'static) -> KeySubscription<K> {
        self.shared.registry.subscribe(Rc::new(listener))
    }

    /// Tears the properties down.
    ///
    /// Unsubscribes from any parent, drops every key listener and disposes
    /// every node this object created. Other objects nesting one of its
    /// resolvers see that layer become undefined. Calling it again does
    /// nothing.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    /// Returns `true` once [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.get()
    }

    /// Every key stored so far, in discovery order.
    #[must_use]
    pub fn known_keys(&self) -> Vec<K> {
        self.shared.registry.keys()
    }

    /// Returns `true` if `key` has been stored on some layer.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.registry.contains(key)
    }

    /// The layers holding a slot for `key`, ascending.
    #[must_use]
    pub fn layer_indices(&self, key: &K) -> Vec<u32> {
        self.shared.layers.borrow().layer_indices(key)
    }

    /// The cell backing `key` at `layer`, if the layer has a slot for it.
    ///
    /// For a literal this is a cell the properties own. Writing a
    /// [`PropertyValue::Source`] to the same slot later disposes that cell,
    /// and reading a handle obtained earlier then fails with
    /// [`ReactiveError::Disposed`] (or panics through
    /// [`Runtime::peek`]).
    #[must_use]
    pub fn layer_source(&self, layer: u32, key: &K) -> Option<Source<Option<V>>> {
        self.shared.layers.borrow().read_raw(layer, key)
    }
}

/// Configures a [`LayeredProperties`].
pub struct LayeredPropertiesBuilder<K, V> {
    runtime: Runtime,
    apply: Option<Box<dyn Apply<K, V>>>,
    defaults: HashMap<K, DefaultValue<V>>,
    inherit: Option<(LayeredProperties<K, V>, u32)>,
}

impl<K, V> fmt::Debug for LayeredPropertiesBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredPropertiesBuilder")
            .field("custom_apply", &self.apply.is_some())
            .field("defaults", &self.defaults.len())
            .field("inherit_layer", &self.inherit.as_ref().map(|(_, layer)| *layer))
            .finish_non_exhaustive()
    }
}

impl<K, V> LayeredPropertiesBuilder<K, V>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Creates a builder with no defaults and the [`Identity`] strategy.
    #[must_use]
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            apply: None,
            defaults: HashMap::new(),
            inherit: None,
        }
    }

    /// Sets the strategy every public write goes through.
    #[must_use]
    pub fn apply(mut self, apply: impl Apply<K, V> + 'static) -> Self {
        self.apply = Some(Box::new(apply));
        self
    }

    /// Sets a closure as the write strategy.
    #[must_use]
    pub fn apply_fn<F>(self, apply: F) -> Self
    where
        F: Fn(K, PropertyValue<V>, &mut RawSet<'_, K, V>) + 'static,
    {
        self.apply(apply)
    }

    /// Sets a constant fallback for `key`.
    #[must_use]
    pub fn default(mut self, key: impl Into<K>, value: V) -> Self {
        self.defaults.insert(key.into(), DefaultValue::Value(value));
        self
    }

    /// Sets a live fallback for `key`.
    #[must_use]
    pub fn default_source(
        mut self,
        key: impl Into<K>,
        source: impl IntoSource<Value = Option<V>>,
    ) -> Self {
        self.defaults
            .insert(key.into(), DefaultValue::source(source));
        self
    }

    /// Adds several fallbacks at once.
    #[must_use]
    pub fn defaults(mut self, defaults: impl IntoIterator<Item = (K, DefaultValue<V>)>) -> Self {
        self.defaults.extend(defaults);
        self
    }

    /// Nests `parent` at `layer`.
    ///
    /// Every key the parent stores, now or later, gets the parent's resolver
    /// written at `layer`, bypassing this object's apply strategy. The
    /// subscription ends when either side is destroyed.
    ///
    /// # Panics
    ///
    /// Panics if `parent` lives in a different runtime.
    #[must_use]
    pub fn inherit(mut self, parent: &LayeredProperties<K, V>, layer: u32) -> Self {
        assert!(
            parent.runtime().ptr_eq(&self.runtime),
            "inherited properties must share a runtime"
        );
        self.inherit = Some((parent.clone(), layer));
        self
    }

    /// Builds the properties.
    #[must_use]
    pub fn build(self) -> LayeredProperties<K, V> {
        let shared = Rc::new(Shared {
            runtime: self.runtime,
            apply: self.apply.unwrap_or_else(|| Box::new(Identity)),
            defaults: self.defaults,
            layers: RefCell::new(LayerStore::new()),
            resolvers: RefCell::new(HashMap::new()),
            registry: KeyRegistry::new(),
            parent: RefCell::new(None),
            detached: Cell::new(None),
            destroyed: Cell::new(false),
        });

        if let Some((parent, layer)) = self.inherit {
            let child = Rc::downgrade(&shared);
            let source = Rc::downgrade(&parent.shared);
            let subscription = parent.subscribe_property_keys(move |key: &K| {
                let (Some(child), Some(parent)) = (child.upgrade(), source.upgrade()) else {
                    return;
                };
                if parent.destroyed.get() {
                    return;
                }
                let resolved = parent.resolver(key.clone());
                child.write(layer, key.clone(), PropertyValue::Source(resolved.into()));
            });
            *shared.parent.borrow_mut() = Some(subscription);
            tracing::debug!(layer, "inheriting from parent properties");
        }

        LayeredProperties { shared }
    }
}
