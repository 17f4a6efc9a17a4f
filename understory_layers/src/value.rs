// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What a layer or a default can hold.

use understory_reactive::{Computed, IntoSource, Signal, Source};

/// A value written into a layer.
///
/// `Unset` is the "undefined" value: the layer keeps its slot, but the
/// cascade falls through it.
///
/// # Example
///
/// ```rust
/// use understory_layers::PropertyValue;
///
/// assert_eq!(PropertyValue::from(Some(5)), PropertyValue::Value(5));
/// assert!(PropertyValue::<i32>::from(None).is_unset());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue<V> {
    /// A literal, stored in a cell owned by the layer.
    Value(V),
    /// A reference to somebody else's cell, read live.
    ///
    /// This is how one [`LayeredProperties`](crate::LayeredProperties) nests
    /// another: the parent's resolved node becomes a layer of the child.
    /// The handle must belong to the same [`Runtime`] as the properties it
    /// is written to; a handle from another runtime is not detected.
    ///
    /// [`Runtime`]: understory_reactive::Runtime
    Source(Source<Option<V>>),
    /// Nothing; the cascade falls through to the next layer.
    Unset,
}

impl<V> PropertyValue<V> {
    /// Returns `true` for [`PropertyValue::Unset`].
    #[must_use]
    #[inline]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns the literal, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&V> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Creates a [`PropertyValue::Source`] from any readable handle.
    #[must_use]
    pub fn source(source: impl IntoSource<Value = Option<V>>) -> Self {
        Self::Source(source.into_source())
    }
}

impl<V> From<Option<V>> for PropertyValue<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(value) => Self::Value(value),
            None => Self::Unset,
        }
    }
}

impl<V> From<Signal<Option<V>>> for PropertyValue<V> {
    fn from(signal: Signal<Option<V>>) -> Self {
        Self::Source(signal.into())
    }
}

impl<V> From<Computed<Option<V>>> for PropertyValue<V> {
    fn from(computed: Computed<Option<V>>) -> Self {
        Self::Source(computed.into())
    }
}

impl<V> From<Source<Option<V>>> for PropertyValue<V> {
    fn from(source: Source<Option<V>>) -> Self {
        Self::Source(source)
    }
}

/// The lowest-priority fallback for a key, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue<V> {
    /// A constant.
    Value(V),
    /// A live cell; may itself be undefined.
    Source(Source<Option<V>>),
}

impl<V> DefaultValue<V> {
    /// Creates a [`DefaultValue::Source`] from any readable handle.
    #[must_use]
    pub fn source(source: impl IntoSource<Value = Option<V>>) -> Self {
        Self::Source(source.into_source())
    }
}
