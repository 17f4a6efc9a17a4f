// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased node value storage.

use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

/// A type-erased node value that can be compared with another erased value.
///
/// Equality is what lets the runtime skip notifications when a write or a
/// recomputation produces the value that was already stored.
pub(crate) struct ErasedValue {
    inner: Box<dyn ErasedValueTrait>,
}

impl ErasedValue {
    pub(crate) fn new<T: PartialEq + 'static>(value: T) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    #[inline]
    pub(crate) fn type_id(&self) -> TypeId {
        self.inner.as_any().type_id()
    }

    pub(crate) fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref()
    }

    /// Values of different types are never equal.
    pub(crate) fn eq_erased(&self, other: &Self) -> bool {
        self.inner.eq_dyn(other.inner.as_any())
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type_id", &self.type_id())
            .finish_non_exhaustive()
    }
}

trait ErasedValueTrait: Any {
    fn as_any(&self) -> &dyn Any;
    fn eq_dyn(&self, other: &dyn Any) -> bool;
}

impl<T: PartialEq + 'static> ErasedValueTrait for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_dyn(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|other| self == other)
    }
}
