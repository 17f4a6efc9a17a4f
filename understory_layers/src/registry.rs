// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Key discovery.
//!
//! A [`KeyRegistry`] records every key that has ever been stored, in
//! insertion order, and tells listeners about each one exactly once. A new
//! listener first hears every key known so far, then every key stored later.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashSet;
use smallvec::SmallVec;

pub(crate) type Listener<K> = Rc<dyn Fn(&K)>;

struct RegistryState<K> {
    known: HashSet<K>,
    order: Vec<K>,
    listeners: Vec<(u64, Listener<K>)>,
    next_listener: u64,
}

pub(crate) struct KeyRegistry<K> {
    state: Rc<RefCell<RegistryState<K>>>,
}

impl<K> fmt::Debug for KeyRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("KeyRegistry")
            .field("keys", &state.order.len())
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

impl<K: Clone + Eq + Hash + 'static> KeyRegistry<K> {
    pub(crate) fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RegistryState {
                known: HashSet::new(),
                order: Vec::new(),
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Records `key`, notifying listeners if it is new.
    ///
    /// Returns `true` if the key was not known before.
    pub(crate) fn register(&self, key: &K) -> bool {
        let listeners: SmallVec<[(u64, Listener<K>); 4]> = {
            let mut state = self.state.borrow_mut();
            if !state.known.insert(key.clone()) {
                return false;
            }
            state.order.push(key.clone());
            state.listeners.iter().cloned().collect()
        };
        tracing::trace!(listeners = listeners.len(), "discovered property key");
        for (id, listener) in listeners {
            // A previous listener may have unsubscribed this one.
            if self.is_listening(id) {
                listener(key);
            }
        }
        true
    }

    /// Adds a listener and replays every known key to it.
    pub(crate) fn subscribe(&self, listener: Listener<K>) -> KeySubscription<K> {
        let (id, known) = {
            let mut state = self.state.borrow_mut();
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.push((id, listener.clone()));
            (id, state.order.clone())
        };
        for key in &known {
            if !self.is_listening(id) {
                break;
            }
            listener(key);
        }
        KeySubscription {
            registry: Rc::downgrade(&self.state),
            id,
        }
    }

    fn is_listening(&self, id: u64) -> bool {
        self.state
            .borrow()
            .listeners
            .iter()
            .any(|(listener, _)| *listener == id)
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.state.borrow().known.contains(key)
    }

    /// Known keys in discovery order.
    pub(crate) fn keys(&self) -> Vec<K> {
        self.state.borrow().order.clone()
    }
}

impl<K> KeyRegistry<K> {
    /// Drops every listener; later keys are recorded silently.
    pub(crate) fn clear_listeners(&self) {
        let listeners = core::mem::take(&mut self.state.borrow_mut().listeners);
        drop(listeners);
    }
}

/// Handle returned by
/// [`subscribe_property_keys`](crate::LayeredProperties::subscribe_property_keys).
///
/// Dropping the handle keeps the listener installed; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct KeySubscription<K> {
    registry: Weak<RefCell<RegistryState<K>>>,
    id: u64,
}

impl<K> KeySubscription<K> {
    /// Removes the listener. Keys discovered afterwards are not reported.
    pub fn unsubscribe(self) {
        let Some(state) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut state = state.borrow_mut();
            state
                .listeners
                .iter()
                .position(|(id, _)| *id == self.id)
                .map(|idx| state.listeners.remove(idx))
        };
        drop(removed);
    }

    /// Returns `true` while the listener is installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry.upgrade().is_some_and(|state| {
            state
                .borrow()
                .listeners
                .iter()
                .any(|(id, _)| *id == self.id)
        })
    }
}

impl<K> fmt::Debug for KeySubscription<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
