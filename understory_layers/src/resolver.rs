// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-key cascade.

use understory_reactive::{Computed, IntoSource, ReactiveError, Runtime, Signal, Tracker};

use crate::store::LayerList;
use crate::value::DefaultValue;

/// Creates the memoized resolver for one key.
///
/// The resolver walks `order` front to back and stops at the first defined
/// value, so only the layers up to and including the winner become
/// dependencies. If every layer is undefined it falls back to `fallback`.
pub(crate) fn resolver<V>(
    runtime: &Runtime,
    order: Signal<LayerList<V>>,
    fallback: Option<DefaultValue<V>>,
) -> Computed<Option<V>>
where
    V: Clone + PartialEq + 'static,
{
    runtime.computed(move |tx| {
        for layer in tx.get(order) {
            if let Some(value) = read_defined(tx, layer) {
                return Some(value);
            }
        }
        match &fallback {
            None => None,
            Some(DefaultValue::Value(value)) => Some(value.clone()),
            Some(DefaultValue::Source(source)) => read_defined(tx, *source),
        }
    })
}

/// Reads an optional value, treating a disposed node as undefined.
///
/// # Panics
///
/// Panics if the read closes a dependency cycle.
pub(crate) fn read_defined<S, V>(tx: &Tracker<'_>, source: S) -> Option<V>
where
    S: IntoSource<Value = Option<V>>,
    V: Clone + 'static,
{
    match tx.try_get(source) {
        Ok(value) => value,
        Err(ReactiveError::Disposed(_)) => None,
        Err(err) => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_defined_layer_wins() {
        let rt = Runtime::new();
        let top = rt.signal(None::<i32>);
        let bottom = rt.signal(Some(2));
        let order = rt.signal(LayerList::<i32>::from_iter([top.into(), bottom.into()]));
        let resolved = resolver(&rt, order, Some(DefaultValue::Value(0)));

        assert_eq!(rt.peek(resolved), Some(2));
        rt.set(top, Some(1));
        assert_eq!(rt.peek(resolved), Some(1));
        rt.set(top, None);
        rt.set(bottom, None);
        assert_eq!(rt.peek(resolved), Some(0));
    }

    #[test]
    fn reads_stop_at_the_winner() {
        let rt = Runtime::new();
        let top = rt.signal(Some(1));
        let bottom = rt.signal(Some(2));
        let order = rt.signal(LayerList::<i32>::from_iter([top.into(), bottom.into()]));
        let resolved = resolver(&rt, order, None);

        let (_, deps) = rt.track(|tx| tx.get(resolved));
        assert_eq!(deps, [resolved.id()]);
        let (_, deps) = rt.track(|tx| {
            for layer in tx.get(order) {
                if read_defined(tx, layer).is_some() {
                    break;
                }
            }
        });
        assert_eq!(deps, [order.id(), top.id()]);
    }

    #[test]
    fn disposed_layer_is_undefined() {
        let rt = Runtime::new();
        let top = rt.signal(Some(1));
        let order = rt.signal(LayerList::<i32>::from_iter([top.into()]));
        let default = rt.signal(Some(9));
        let resolved = resolver(&rt, order, Some(DefaultValue::Source(default.into())));

        assert_eq!(rt.peek(resolved), Some(1));
        rt.dispose(top);
        assert_eq!(rt.peek(resolved), Some(9));
    }
}
