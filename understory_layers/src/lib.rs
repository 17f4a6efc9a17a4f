// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Layers: layered, reactive property resolution.
//!
//! A [`LayeredProperties`] stores values for keys in numbered layers. The
//! resolved value of a key is the value of the lowest-numbered layer that
//! defines it, falling back to a per-key default. Every resolved value is a
//! memoized node of an [`understory_reactive::Runtime`], so effects and
//! computations that read a key re-run only when its resolved value changes.
//!
//! ## Core Concepts
//!
//! ### Layers
//!
//! Layer 0 has the highest precedence. A layer can hold:
//!
//! - **a literal** ([`PropertyValue::Value`]), stored in a cell the layer owns,
//! - **a live source** ([`PropertyValue::Source`]), somebody else's cell,
//! - **nothing** ([`PropertyValue::Unset`] or `None`): the layer is
//!   undefined and the cascade falls through.
//!
//! Resolution short-circuits: once a defined layer is found, layers below it
//! are not read and do not become dependencies.
//!
//! ### Apply Strategies
//!
//! Public writes pass through an [`Apply`] strategy that may rewrite them,
//! for instance expanding `borderWidth` into four side keys with an
//! [`AliasTable`]. Strategies write through [`RawSet`].
//!
//! ### Nesting
//!
//! [`LayeredProperties::signal`] returns a key's resolver node, which can be
//! stored as a layer of another object.
//! [`LayeredPropertiesBuilder::inherit`] does that automatically for every
//! key a parent ever stores.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_layers::LayeredProperties;
//! use understory_reactive::Runtime;
//!
//! const HOVER: u32 = 0;
//! const BASE: u32 = 1;
//!
//! let rt = Runtime::new();
//! let props = LayeredProperties::<&str, &str>::new(&rt);
//! props.set(BASE, "color", Some("gray"));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! let reader = props.clone();
//! rt.effect(move |tx| log.borrow_mut().push(reader.get(tx, "color")));
//!
//! props.set(HOVER, "color", Some("blue"));
//! props.clear_layer(HOVER);
//! assert_eq!(*seen.borrow(), [Some("gray"), Some("blue"), Some("gray")]);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod apply;
mod properties;
mod registry;
mod resolver;
mod store;
mod value;

pub use apply::{AliasTable, Apply, Identity, RawSet};
pub use properties::{LayeredProperties, LayeredPropertiesBuilder};
pub use registry::KeySubscription;
pub use value::{DefaultValue, PropertyValue};
