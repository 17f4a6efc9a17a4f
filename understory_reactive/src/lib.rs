// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Reactive: fine-grained reactive cells with explicit tracking.
//!
//! This crate provides the push-invalidate / pull-recompute primitive that
//! `understory_layers` resolves properties on top of:
//!
//! - **Signals** ([`Signal`]): writable cells with equality-gated writes.
//! - **Computeds** ([`Computed`]): lazily evaluated, memoized derivations.
//! - **Effects** ([`Effect`]): observers that re-run when something they read
//!   changes.
//! - **Tracking context** ([`Tracker`]): the explicit object every computation
//!   reads through. There is no ambient "current observer"; a read records a
//!   dependency only if it goes through [`Tracker::get`].
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let hovered = rt.signal(false);
//! let color = rt.computed(move |tx| if tx.get(hovered) { "blue" } else { "gray" });
//!
//! let runs = Rc::new(Cell::new(0));
//! let seen = runs.clone();
//! rt.effect(move |tx| {
//!     let _ = tx.get(color);
//!     seen.set(seen.get() + 1);
//! });
//! assert_eq!(runs.get(), 1);
//!
//! rt.set(hovered, true);
//! assert_eq!(rt.peek(color), "blue");
//! assert_eq!(runs.get(), 2);
//!
//! // Equal writes notify nobody.
//! rt.set(hovered, true);
//! assert_eq!(runs.get(), 2);
//! ```
//!
//! ## Propagation
//!
//! A write marks the direct observers of a signal *dirty* and everything
//! further downstream *check*. Nothing is recomputed at write time. Reading a
//! *check* node first refreshes its sources and recomputes only if one of
//! them actually produced a different value, so a computation whose result
//! did not change stops the wave.
//!
//! Dependencies are collected afresh on every evaluation. A computation that
//! returns early holds no edge to the inputs it skipped, and changes to those
//! inputs never reach it.
//!
//! ## Batching
//!
//! [`Runtime::batch`] defers effects until the outermost batch ends, so an
//! effect observing several written cells runs once.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.
//! The runtime is single-threaded (`!Send`); one runtime per thread.

#![no_std]

extern crate alloc;

mod error;
mod graph;
mod id;
mod runtime;
mod value;

pub use error::ReactiveError;
pub use id::{Computed, Effect, IntoSource, NodeId, Signal, Source};
pub use runtime::{Runtime, Tracker};
