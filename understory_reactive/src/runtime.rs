// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reactive runtime and its explicit tracking context.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::error::ReactiveError;
use crate::graph::{Edges, Graph, Node, NodeKind, NodeState, compute_fn, effect_fn};
use crate::id::{Computed, Effect, IntoSource, NodeId, Signal};
use crate::value::ErasedValue;

/// A handle on one reactive graph.
///
/// Cloning a `Runtime` is cheap and yields another handle on the same graph.
/// Handles created by one runtime must only be used with that runtime (or
/// its clones).
///
/// The runtime is single-threaded and fully synchronous: writes mark
/// dependents stale immediately, recomputation happens on the next read, and
/// effects run before the writing call returns (or when the outermost
/// [`batch`](Self::batch) ends).
///
/// # Example
///
/// ```rust
/// use understory_reactive::Runtime;
///
/// let rt = Runtime::new();
/// let width = rt.signal(10_u32);
/// let doubled = rt.computed(move |tx| tx.get(width) * 2);
///
/// assert_eq!(rt.peek(doubled), 20);
/// rt.set(width, 21);
/// assert_eq!(rt.peek(doubled), 42);
/// ```
#[derive(Clone, Default)]
pub struct Runtime {
    graph: Rc<RefCell<Graph>>,
}

impl Runtime {
    /// Creates a new, empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if both handles refer to the same graph.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.borrow().len()
    }

    /// Returns `true` if the node has not been disposed.
    #[must_use]
    pub fn is_alive(&self, id: impl Into<NodeId>) -> bool {
        self.graph.borrow().contains(id.into())
    }

    // =========================================================================
    // Node creation
    // =========================================================================

    /// Creates a writable cell holding `value`.
    pub fn signal<T: PartialEq + 'static>(&self, value: T) -> Signal<T> {
        let id = self
            .graph
            .borrow_mut()
            .insert(Node::signal(ErasedValue::new(value)));
        Signal::from_id(id)
    }

    /// Creates a lazily evaluated derivation.
    ///
    /// `f` does not run until the computed is first read. Every value it
    /// reads through the [`Tracker`] becomes a dependency for that evaluation
    /// only; the dependency set is collected afresh each time.
    pub fn computed<T, F>(&self, f: F) -> Computed<T>
    where
        T: PartialEq + 'static,
        F: Fn(&Tracker<'_>) -> T + 'static,
    {
        let compute = compute_fn(move |tx| ErasedValue::new(f(tx)));
        let id = self.graph.borrow_mut().insert(Node::computed(compute));
        Computed::from_id(id)
    }

    /// Creates an effect and runs it once.
    ///
    /// The effect re-runs whenever a value it read during its last run
    /// changes. Inside a [`batch`](Self::batch) the first run is deferred to
    /// the end of the batch.
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: FnMut(&Tracker<'_>) + 'static,
    {
        let id = {
            let mut graph = self.graph.borrow_mut();
            let id = graph.insert(Node::effect(effect_fn(f)));
            graph.pending.push_back(id);
            id
        };
        self.flush();
        Effect::from_id(id)
    }

    /// Disposes a node, unlinking it from the graph.
    ///
    /// Observers of the node are marked dirty; reading it afterwards yields
    /// [`ReactiveError::Disposed`]. Returns `false` if it was already gone.
    pub fn dispose(&self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        let removed = self.graph.borrow_mut().remove(id);
        let Some(node) = removed else {
            return false;
        };
        tracing::trace!(node = %id, kind = ?node.kind, "disposed reactive node");
        // Captured state may hold other runtime handles; drop it unborrowed.
        drop(node);
        self.flush();
        true
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Writes `value` into `signal`.
    ///
    /// Returns `true` if the stored value changed. Writing a value equal to
    /// the current one, or writing a disposed signal, does nothing and
    /// returns `false`.
    pub fn set<T: PartialEq + 'static>(&self, signal: Signal<T>, value: T) -> bool {
        self.flush();
        let id = signal.id();
        {
            let mut graph = self.graph.borrow_mut();
            let Some(node) = graph.get_mut(id) else {
                return false;
            };
            if node
                .value
                .as_ref()
                .and_then(ErasedValue::downcast_ref::<T>)
                .is_some_and(|current| *current == value)
            {
                return false;
            }
            let old = node.value.replace(ErasedValue::new(value));
            graph.mark_observers(id);
            drop(graph);
            drop(old);
        }
        self.flush();
        true
    }

    /// Mutates the value of `signal` in place.
    ///
    /// The mutation is applied to a clone and committed through
    /// [`set`](Self::set), so a mutation that leaves the value unchanged
    /// notifies nobody.
    pub fn update<T, F>(&self, signal: Signal<T>, f: F) -> bool
    where
        T: Clone + PartialEq + 'static,
        F: FnOnce(&mut T),
    {
        let Ok(mut value) = self.try_peek(signal) else {
            return false;
        };
        f(&mut value);
        self.set(signal, value)
    }

    /// Runs `f` with effect execution deferred until the outermost batch
    /// ends.
    ///
    /// Several writes inside one batch wake each affected effect at most
    /// once.
    ///
    /// If `f` unwinds, writes it already committed stay committed and the
    /// effects they woke stay queued. They run at the next [`set`](Self::set),
    /// `batch`, [`peek`](Self::peek) or [`track`](Self::track), before that
    /// call does anything else.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.flush();
        self.graph.borrow_mut().batch_depth += 1;
        let guard = BatchGuard { graph: &self.graph };
        let out = f();
        drop(guard);
        self.flush();
        out
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads a value without recording a dependency.
    ///
    /// A stale computed is brought up to date first.
    ///
    /// # Panics
    ///
    /// Panics with the [`ReactiveError`] that [`try_peek`](Self::try_peek)
    /// would return.
    #[must_use]
    pub fn peek<S>(&self, source: S) -> S::Value
    where
        S: IntoSource,
        S::Value: Clone + 'static,
    {
        self.try_peek(source).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Reads a value without recording a dependency.
    ///
    /// Effects left queued by an unwound batch or effect run first.
    pub fn try_peek<S>(&self, source: S) -> Result<S::Value, ReactiveError>
    where
        S: IntoSource,
        S::Value: Clone + 'static,
    {
        self.flush();
        self.read(source.into_source().id())
    }

    /// Runs `f` in a fresh tracking frame.
    ///
    /// Returns the result of `f` together with the nodes it read through the
    /// tracker, in first-read order. Nothing is subscribed; this is useful to
    /// inspect which inputs a piece of logic actually consults.
    pub fn track<R>(&self, f: impl FnOnce(&Tracker<'_>) -> R) -> (R, Vec<NodeId>) {
        self.flush();
        let tracker = Tracker::new(self);
        let out = f(&tracker);
        (out, tracker.into_sources().into_vec())
    }

    fn read<T: Clone + 'static>(&self, id: NodeId) -> Result<T, ReactiveError> {
        self.refresh(id)?;
        self.read_value(id)
    }

    fn read_value<T: Clone + 'static>(&self, id: NodeId) -> Result<T, ReactiveError> {
        let graph = self.graph.borrow();
        let node = graph.get(id).ok_or(ReactiveError::Disposed(id))?;
        node.value
            .as_ref()
            .and_then(ErasedValue::downcast_ref::<T>)
            .cloned()
            .ok_or(ReactiveError::TypeMismatch(id))
    }

    fn state(&self, id: NodeId) -> Result<NodeState, ReactiveError> {
        self.graph
            .borrow()
            .state(id)
            .ok_or(ReactiveError::Disposed(id))
    }

    /// Brings `id` up to date, recomputing only if a source actually changed.
    fn refresh(&self, id: NodeId) -> Result<(), ReactiveError> {
        let (state, sources) = {
            let graph = self.graph.borrow();
            let node = graph.get(id).ok_or(ReactiveError::Disposed(id))?;
            let sources = if node.state == NodeState::Check {
                node.sources.clone()
            } else {
                Edges::new()
            };
            (node.state, sources)
        };

        match state {
            NodeState::Clean => return Ok(()),
            NodeState::Running => return Err(ReactiveError::Cycle(id)),
            NodeState::Dirty => {}
            NodeState::Check => {
                for source in sources {
                    match self.refresh(source) {
                        Ok(()) => {}
                        Err(ReactiveError::Disposed(_)) => {
                            self.graph.borrow_mut().set_state(id, NodeState::Dirty);
                        }
                        Err(err) => return Err(err),
                    }
                    if self.state(id)? == NodeState::Dirty {
                        break;
                    }
                }
                if self.state(id)? != NodeState::Dirty {
                    self.graph.borrow_mut().set_state(id, NodeState::Clean);
                    return Ok(());
                }
            }
        }

        self.run(id)
    }

    /// Evaluates a computed or effect and relinks its sources.
    fn run(&self, id: NodeId) -> Result<(), ReactiveError> {
        let kind = {
            let mut graph = self.graph.borrow_mut();
            let node = graph.get_mut(id).ok_or(ReactiveError::Disposed(id))?;
            node.state = NodeState::Running;
            node.kind.clone()
        };

        let mut guard = RunGuard {
            graph: &self.graph,
            id,
            effect: matches!(kind, NodeKind::Effect(_)),
            armed: true,
        };
        let tracker = Tracker::new(self);
        let value = match &kind {
            NodeKind::Signal => None,
            NodeKind::Computed(compute) => Some(compute(&tracker)),
            NodeKind::Effect(run) => {
                let mut run = run.borrow_mut();
                (&mut *run)(&tracker);
                None
            }
        };
        guard.armed = false;

        let mut graph = self.graph.borrow_mut();
        if !graph.contains(id) {
            // Disposed by its own evaluation.
            return Ok(());
        }
        graph.relink(id, tracker.into_sources());

        let mut replaced = None;
        let mut changed = false;
        if let Some(node) = graph.get_mut(id) {
            node.state = NodeState::Clean;
            if let Some(value) = value {
                changed = node.value.as_ref().is_none_or(|old| !old.eq_erased(&value));
                if changed {
                    replaced = node.value.replace(value);
                }
            }
        }
        if changed {
            graph.mark_observers(id);
        }
        drop(graph);
        drop(replaced);
        Ok(())
    }

    /// Runs pending effects unless a batch or another flush is active.
    fn flush(&self) {
        {
            let mut graph = self.graph.borrow_mut();
            if graph.flushing || graph.batch_depth > 0 || graph.pending.is_empty() {
                return;
            }
            graph.flushing = true;
        }
        let _guard = FlushGuard { graph: &self.graph };

        let mut ran = 0_usize;
        loop {
            let next = self.graph.borrow_mut().pending.pop_front();
            let Some(id) = next else {
                break;
            };
            match self.refresh(id) {
                Ok(()) | Err(ReactiveError::Disposed(_)) => ran += 1,
                Err(err) => panic!("effect {id} failed: {err}"),
            }
        }
        tracing::trace!(effects = ran, "flushed pending effects");
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let graph = self.graph.try_borrow();
        let mut s = f.debug_struct("Runtime");
        match graph {
            Ok(graph) => s
                .field("nodes", &graph.len())
                .field("pending", &graph.pending.len())
                .field("batch_depth", &graph.batch_depth)
                .finish(),
            Err(_) => s.finish_non_exhaustive(),
        }
    }
}

/// The explicit tracking context handed to every computation.
///
/// Reads through [`get`](Self::get) become dependencies of the computation
/// the tracker was created for. Reads through [`peek`](Self::peek) do not.
pub struct Tracker<'rt> {
    runtime: &'rt Runtime,
    reads: RefCell<Edges>,
}

impl<'rt> Tracker<'rt> {
    fn new(runtime: &'rt Runtime) -> Self {
        Self {
            runtime,
            reads: RefCell::new(Edges::new()),
        }
    }

    /// Returns the runtime this tracker belongs to.
    #[must_use]
    #[inline]
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Reads a value and records it as a dependency.
    ///
    /// # Panics
    ///
    /// Panics with the [`ReactiveError`] that [`try_get`](Self::try_get)
    /// would return.
    #[must_use]
    pub fn get<S>(&self, source: S) -> S::Value
    where
        S: IntoSource,
        S::Value: Clone + 'static,
    {
        self.try_get(source).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Reads a value and records it as a dependency.
    ///
    /// Nothing is recorded if the read fails.
    pub fn try_get<S>(&self, source: S) -> Result<S::Value, ReactiveError>
    where
        S: IntoSource,
        S::Value: Clone + 'static,
    {
        let id = source.into_source().id();
        self.runtime.refresh(id)?;
        let value = self.runtime.read_value(id)?;
        let mut reads = self.reads.borrow_mut();
        if !reads.contains(&id) {
            reads.push(id);
        }
        Ok(value)
    }

    /// Reads a value without recording a dependency.
    #[must_use]
    pub fn peek<S>(&self, source: S) -> S::Value
    where
        S: IntoSource,
        S::Value: Clone + 'static,
    {
        // Never flushes: this runs inside an evaluation.
        self.runtime
            .read(source.into_source().id())
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Returns the nodes read so far, in first-read order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<NodeId> {
        self.reads.borrow().to_vec()
    }

    fn into_sources(self) -> Edges {
        self.reads.into_inner()
    }
}

impl fmt::Debug for Tracker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("reads", &self.reads.borrow().len())
            .finish_non_exhaustive()
    }
}

struct BatchGuard<'a> {
    graph: &'a RefCell<Graph>,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            graph.batch_depth -= 1;
        }
    }
}

struct FlushGuard<'a> {
    graph: &'a RefCell<Graph>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            graph.flushing = false;
        }
    }
}

/// Restores a node whose evaluation unwinds.
///
/// A computed is left dirty so the next read retries it. An effect keeps its
/// previous sources and goes back to clean, so the next change to one of
/// them queues it again.
struct RunGuard<'a> {
    graph: &'a RefCell<Graph>,
    id: NodeId,
    effect: bool,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Ok(mut graph) = self.graph.try_borrow_mut()
        {
            let state = if self.effect {
                NodeState::Clean
            } else {
                NodeState::Dirty
            };
            graph.set_state(self.id, state);
        }
    }
}
