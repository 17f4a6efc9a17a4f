// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end cascade behavior.

use std::cell::RefCell;
use std::rc::Rc;

use understory_layers::{AliasTable, LayeredProperties};
use understory_reactive::{ReactiveError, Runtime};

type Props = LayeredProperties<&'static str, &'static str>;

/// Records every value an effect observes for `key`.
fn watch<V: Clone + PartialEq + 'static>(
    props: &LayeredProperties<&'static str, V>,
    key: &'static str,
) -> Rc<RefCell<Vec<Option<V>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let reader = props.clone();
    props
        .runtime()
        .effect(move |tx| log.borrow_mut().push(reader.get(tx, key)));
    seen
}

#[test]
fn unknown_keys_are_undefined() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    let (value, _) = rt.track(|tx| props.get(tx, "color"));
    assert_eq!(value, None);
    assert_eq!(props.peek("color"), None);
    assert!(props.known_keys().is_empty());
}

#[test]
fn clearing_layers_falls_through() {
    let rt = Runtime::new();
    let props = Props::builder(&rt).default("color", "black").build();
    props.set(2, "color", Some("red"));
    props.set(1, "color", Some("green"));
    props.set(0, "color", Some("blue"));
    assert_eq!(props.peek("color"), Some("blue"));

    props.clear_layer(0);
    assert_eq!(props.peek("color"), Some("green"));
    props.clear_layer(1);
    assert_eq!(props.peek("color"), Some("red"));
    props.clear_layer(2);
    assert_eq!(props.peek("color"), Some("black"));

    let bare = Props::new(&rt);
    bare.set(2, "color", Some("red"));
    bare.clear_layer(2);
    assert_eq!(bare.peek("color"), None);
}

#[test]
fn alias_fans_out_to_longhands() {
    let rt = Runtime::new();
    let sides = [
        "borderWidthTop",
        "borderWidthRight",
        "borderWidthBottom",
        "borderWidthLeft",
    ];
    let props = LayeredProperties::<&str, u32>::builder(&rt)
        .apply(AliasTable::new().alias("borderWidth", sides))
        .build();

    props.set(0, "borderWidth", Some(5));
    for side in sides {
        assert_eq!(props.peek(side), Some(5));
    }

    props.set(0, "borderWidthTop", Some(10));
    assert_eq!(props.peek("borderWidthTop"), Some(10));
    for side in &sides[1..] {
        assert_eq!(props.peek(*side), Some(5));
    }
    assert_eq!(props.known_keys(), sides);
}

#[test]
fn closure_apply_sees_the_layer() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::builder(&rt)
        .apply_fn(|key, value, set| {
            if key == "size" {
                set.set("width", value.clone());
                set.set("height", value);
            } else if set.layer() > 0 {
                set.set(key, value);
            }
        })
        .build();

    props.set(1, "size", Some(3));
    props.set(0, "ignored", Some(1));
    props.set(1, "kept", Some(2));

    assert_eq!(props.peek("width"), Some(3));
    assert_eq!(props.peek("height"), Some(3));
    assert_eq!(props.peek("ignored"), None);
    assert_eq!(props.known_keys(), ["width", "height", "kept"]);
}

#[test]
fn signal_layers_fall_through_when_undefined() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    let layer0 = rt.signal(Some("blue"));
    let layer1 = rt.signal(Some("green"));
    props.set(0, "color", layer0);
    props.set(1, "color", layer1);
    props.set(2, "color", Some("red"));
    let seen = watch(&props, "color");
    assert_eq!(props.peek("color"), Some("blue"));

    rt.set(layer0, None);
    assert_eq!(props.peek("color"), Some("green"));
    rt.set(layer1, None);
    assert_eq!(props.peek("color"), Some("red"));
    rt.set(layer0, Some("teal"));

    assert_eq!(
        *seen.borrow(),
        [Some("blue"), Some("green"), Some("red"), Some("teal")]
    );
}

#[test]
fn nested_resolver_updates_transitively() {
    let rt = Runtime::new();
    let parent = Props::new(&rt);
    let child = Props::new(&rt);
    parent.set(1, "color", Some("red"));
    parent.set(0, "color", Some("orange"));
    child.set(1, "color", parent.signal("color"));
    child.set(0, "color", Some("green"));
    assert_eq!(child.peek("color"), Some("green"));

    child.set(0, "color", None);
    assert_eq!(child.peek("color"), Some("orange"));
    parent.set(0, "color", None);
    assert_eq!(child.peek("color"), Some("red"));
}

#[test]
fn inherit_tracks_parent_keys_live() {
    let rt = Runtime::new();
    let parent = Props::new(&rt);
    parent.set(0, "color", Some("red"));

    let child = Props::builder(&rt).inherit(&parent, 5).build();
    child.set(0, "font", Some("serif"));
    assert_eq!(child.peek("color"), Some("red"));
    assert_eq!(child.layer_indices(&"color"), [5]);

    // Keys the parent learns later reach the child too.
    parent.set(3, "cursor", Some("pointer"));
    assert_eq!(child.peek("cursor"), Some("pointer"));
    assert_eq!(child.known_keys(), ["color", "font", "cursor"]);

    // Own layers win over the inherited one.
    child.set(0, "color", Some("blue"));
    assert_eq!(child.peek("color"), Some("blue"));
    child.set(0, "color", None);
    parent.set(0, "color", Some("purple"));
    assert_eq!(child.peek("color"), Some("purple"));
}

#[test]
fn inheritance_chains_through_generations() {
    let rt = Runtime::new();
    let root = Props::new(&rt);
    let middle = Props::builder(&rt).inherit(&root, 10).build();
    let leaf = Props::builder(&rt).inherit(&middle, 10).build();

    root.set(0, "color", Some("red"));
    assert_eq!(leaf.peek("color"), Some("red"));
    middle.set(0, "color", Some("green"));
    assert_eq!(leaf.peek("color"), Some("green"));
}

#[test]
fn destroyed_parent_reads_as_undefined() {
    let rt = Runtime::new();
    let parent = Props::new(&rt);
    parent.set(0, "color", Some("red"));
    let child = Props::builder(&rt).default("color", "black").inherit(&parent, 1).build();
    let seen = watch(&child, "color");

    parent.destroy();
    assert_eq!(child.peek("color"), Some("black"));
    assert_eq!(*seen.borrow(), [Some("red"), Some("black")]);

    // The subscription ended with the parent.
    parent.set(0, "size", Some("large"));
    assert!(!child.contains_key(&"size"));
}

#[test]
fn destroyed_child_stops_following_parent() {
    let rt = Runtime::new();
    let parent = Props::new(&rt);
    let child = Props::builder(&rt).inherit(&parent, 1).build();
    child.destroy();

    parent.set(0, "color", Some("red"));
    assert!(!child.contains_key(&"color"));
    assert_eq!(child.peek("color"), None);
}

#[test]
fn key_discovery_replays_then_streams() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::new(&rt);
    props.set(0, "color", Some(1));
    props.set(0, "size", Some(10));

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let subscription = props.subscribe_property_keys(move |key| log.borrow_mut().push(*key));
    assert_eq!(*seen.borrow(), ["color", "size"]);

    props.set(0, "visible", Some(1));
    props.set(1, "visible", Some(0));
    props.set(2, "color", None);
    assert_eq!(*seen.borrow(), ["color", "size", "visible"]);

    subscription.unsubscribe();
    props.set(0, "hidden", Some(1));
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn undefined_writes_register_keys() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    props.set(0, "color", None);
    assert!(props.contains_key(&"color"));
    assert_eq!(props.peek("color"), None);
}

#[test]
fn resubscribing_replays_again() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    props.set(0, "color", Some("red"));

    let count = Rc::new(RefCell::new(0));
    let first = count.clone();
    props
        .subscribe_property_keys(move |_| *first.borrow_mut() += 1)
        .unsubscribe();
    let second = count.clone();
    let subscription = props.subscribe_property_keys(move |_| *second.borrow_mut() += 1);
    assert_eq!(*count.borrow(), 2);
    assert!(subscription.is_active());
}

#[test]
fn repeated_writes_notify_once() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    let seen = watch(&props, "color");

    props.set(0, "color", Some("red"));
    props.set(0, "color", Some("red"));
    let cell = rt.signal(Some("blue"));
    props.set(1, "color", cell);
    props.set(1, "color", cell);

    assert_eq!(*seen.borrow(), [None, Some("red")]);
}

#[test]
fn lower_layers_never_wake_readers() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::new(&rt);
    props.set(0, "width", Some(1));
    let seen = watch(&props, "width");

    props.set(1, "width", Some(2));
    props.set(7, "width", Some(3));
    props.set(1, "width", None);
    let cell = rt.signal(Some(4));
    props.set(2, "width", cell);
    rt.set(cell, Some(5));
    props.clear_layer(7);

    assert_eq!(*seen.borrow(), [Some(1)]);
}

#[test]
fn clearing_an_unused_layer_is_silent() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    props.set(1, "color", Some("red"));
    let seen = watch(&props, "color");

    props.clear_layer(0);
    props.clear_layer(42);
    props.clear_layer(1);
    props.clear_layer(1);

    assert_eq!(*seen.borrow(), [Some("red"), None]);
}

#[test]
fn read_dependencies_stop_at_the_winner() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::new(&rt);
    let top = rt.signal(Some(1));
    let bottom = rt.signal(Some(2));
    props.set(0, "width", top);
    props.set(1, "width", bottom);

    let resolver = props.signal("width");
    let (value, deps) = rt.track(|tx| props.get(tx, "width"));
    assert_eq!(value, Some(1));
    assert_eq!(deps, [resolver.id()]);

    // The resolver itself only consulted the winning layer.
    let seen = watch(&props, "width");
    rt.set(bottom, Some(20));
    rt.set(top, None);
    rt.set(bottom, Some(30));
    assert_eq!(*seen.borrow(), [Some(1), Some(20), Some(30)]);
}

#[test]
fn one_set_wakes_each_reader_once() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::builder(&rt)
        .apply(AliasTable::new().alias("padding", ["top", "bottom"]))
        .build();

    let runs = Rc::new(RefCell::new(0));
    let count = runs.clone();
    let reader = props.clone();
    rt.effect(move |tx| {
        let _ = (reader.get(tx, "top"), reader.get(tx, "bottom"));
        *count.borrow_mut() += 1;
    });

    props.set(0, "padding", Some(8));
    assert_eq!(*runs.borrow(), 2);
}

#[test]
fn panicking_apply_keeps_earlier_writes() {
    let rt = Runtime::new();
    let props = LayeredProperties::<&str, u32>::builder(&rt)
        .apply_fn(|key, value, set| {
            set.set("a", value);
            assert_ne!(key, "boom", "apply rejected the key");
        })
        .build();
    let seen = watch(&props, "a");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        props.set(0, "boom", Some(3));
    }));
    assert!(result.is_err());
    assert_eq!(props.peek("a"), Some(3));
    assert_eq!(*seen.borrow(), [None, Some(3)]);

    props.set(0, "x", Some(4));
    assert_eq!(props.peek("a"), Some(4));
    assert_eq!(*seen.borrow(), [None, Some(3), Some(4)]);
}

#[test]
fn replaced_literal_cells_are_disposed() {
    let rt = Runtime::new();
    let props = Props::new(&rt);
    props.set(0, "color", Some("red"));
    let literal = props.layer_source(0, &"color").expect("literal slot");
    assert_eq!(rt.peek(literal), Some("red"));

    let cell = rt.signal(Some("blue"));
    props.set(0, "color", cell);
    assert_eq!(rt.try_peek(literal), Err(ReactiveError::Disposed(literal.id())));
    assert_eq!(props.layer_source(0, &"color"), Some(cell.into()));
    assert_eq!(props.peek("color"), Some("blue"));
}
