// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identification and typed handles.
//!
//! This module provides [`NodeId`] for runtime node identification and the
//! typed handles [`Signal<T>`], [`Computed<T>`], [`Source<T>`] and [`Effect`].

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// A runtime node identifier.
///
/// Nodes live in a generational arena owned by a [`Runtime`](crate::Runtime).
/// When a node is disposed its slot may be reused, but with a new generation,
/// so a stale `NodeId` never aliases a different node.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot of this node.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation of the arena slot this id was issued for.
    #[must_use]
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

// Manual trait implementations to avoid requiring T: Clone, etc.
macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: NodeId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            #[inline]
            pub(crate) const fn from_id(id: NodeId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            /// Returns the underlying node ID.
            #[must_use]
            #[inline]
            pub const fn id(self) -> NodeId {
                self.id
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> Clone for $name<T> {
            #[inline]
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> PartialEq for $name<T> {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> Hash for $name<T> {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.id)
                    .field("type", &core::any::type_name::<T>())
                    .finish()
            }
        }

        impl<T> From<$name<T>> for NodeId {
            #[inline]
            fn from(handle: $name<T>) -> Self {
                handle.id
            }
        }
    };
}

typed_handle! {
    /// A writable reactive cell.
    ///
    /// Created by [`Runtime::signal`](crate::Runtime::signal) and written with
    /// [`Runtime::set`](crate::Runtime::set). Writes are equality-gated: storing
    /// a value equal to the current one notifies nobody.
    Signal
}

typed_handle! {
    /// A lazily evaluated, memoized derivation.
    ///
    /// Created by [`Runtime::computed`](crate::Runtime::computed). The closure
    /// runs on first read and again only after something it read last time
    /// has changed.
    Computed
}

typed_handle! {
    /// A read-only view of either a [`Signal<T>`] or a [`Computed<T>`].
    ///
    /// Stored wherever a value is only ever read, e.g. a layer slot that
    /// refers to somebody else's cell.
    Source
}

impl<T> From<Signal<T>> for Source<T> {
    #[inline]
    fn from(signal: Signal<T>) -> Self {
        Self::from_id(signal.id())
    }
}

impl<T> From<Computed<T>> for Source<T> {
    #[inline]
    fn from(computed: Computed<T>) -> Self {
        Self::from_id(computed.id())
    }
}

/// Handles whose value can be read: [`Signal<T>`], [`Computed<T>`] and
/// [`Source<T>`].
///
/// Read accessors take `impl IntoSource` so the value type follows from the
/// handle.
pub trait IntoSource: Copy {
    /// The type of value behind the handle.
    type Value;

    /// Converts into a read-only handle.
    fn into_source(self) -> Source<Self::Value>;
}

impl<T> IntoSource for Signal<T> {
    type Value = T;

    #[inline]
    fn into_source(self) -> Source<T> {
        self.into()
    }
}

impl<T> IntoSource for Computed<T> {
    type Value = T;

    #[inline]
    fn into_source(self) -> Source<T> {
        self.into()
    }
}

impl<T> IntoSource for Source<T> {
    type Value = T;

    #[inline]
    fn into_source(self) -> Source<T> {
        self
    }
}

/// An eager observer created by [`Runtime::effect`](crate::Runtime::effect).
///
/// The handle is only needed to dispose the effect.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Effect {
    id: NodeId,
}

impl Effect {
    #[inline]
    pub(crate) const fn from_id(id: NodeId) -> Self {
        Self { id }
    }

    /// Returns the underlying node ID.
    #[must_use]
    #[inline]
    pub const fn id(self) -> NodeId {
        self.id
    }
}

impl From<Effect> for NodeId {
    #[inline]
    fn from(effect: Effect) -> Self {
        effect.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    #[test]
    fn node_id_basics() {
        let id = NodeId::new(3, 1);
        assert_eq!(id.index(), 3);
        assert_eq!(id.generation(), 1);
        assert_ne!(id, NodeId::new(3, 2));
        assert_eq!(format!("{id:?}"), "NodeId(3v1)");
    }

    #[test]
    fn handles_convert_to_source_with_same_id() {
        let id = NodeId::new(7, 0);
        let signal: Signal<String> = Signal::from_id(id);
        let computed: Computed<String> = Computed::from_id(id);

        assert_eq!(Source::from(signal).id(), id);
        assert_eq!(Source::from(computed).id(), id);
        assert_eq!(NodeId::from(signal), id);
        assert_eq!(signal.into_source(), computed.into_source());
    }

    #[test]
    fn handle_size() {
        use core::mem::size_of;
        assert_eq!(size_of::<Signal<String>>(), size_of::<NodeId>());
        assert_eq!(size_of::<Source<f64>>(), size_of::<NodeId>());
    }
}
