// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node arena and dependency edges.
//!
//! [`Graph`] stores every node of a runtime in a generational arena together
//! with bidirectional edges: `sources` (what a node read during its last
//! evaluation) and `observers` (who read this node). Marking walks the
//! observer edges, like eager dirty propagation, but distinguishes nodes that
//! *must* recompute from nodes that only *might* have to.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use smallvec::SmallVec;

use crate::id::NodeId;
use crate::runtime::Tracker;
use crate::value::ErasedValue;

/// Inline capacity for per-node edge lists.
///
/// A cascade usually short-circuits after one or two reads.
const INLINE_EDGES: usize = 4;

pub(crate) type Edges = SmallVec<[NodeId; INLINE_EDGES]>;

pub(crate) type ComputeFn = Rc<dyn Fn(&Tracker<'_>) -> ErasedValue>;

pub(crate) type EffectFn = Rc<RefCell<dyn FnMut(&Tracker<'_>)>>;

pub(crate) fn compute_fn<F>(f: F) -> ComputeFn
where
    F: Fn(&Tracker<'_>) -> ErasedValue + 'static,
{
    Rc::new(f)
}

pub(crate) fn effect_fn<F>(f: F) -> EffectFn
where
    F: FnMut(&Tracker<'_>) + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Freshness of a node's cached value.
///
/// The ordering matters: marking only ever raises a state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NodeState {
    /// The cached value is valid.
    Clean,
    /// Some transitive source changed; sources must be refreshed to find out
    /// whether this node has to recompute.
    Check,
    /// A direct source changed value; the node must recompute.
    Dirty,
    /// The node is currently evaluating.
    Running,
}

#[derive(Clone)]
pub(crate) enum NodeKind {
    Signal,
    Computed(ComputeFn),
    Effect(EffectFn),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signal => "Signal",
            Self::Computed(_) => "Computed",
            Self::Effect(_) => "Effect",
        })
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) value: Option<ErasedValue>,
    pub(crate) state: NodeState,
    pub(crate) sources: Edges,
    pub(crate) observers: Edges,
}

impl Node {
    pub(crate) fn signal(value: ErasedValue) -> Self {
        Self::new(NodeKind::Signal, Some(value), NodeState::Clean)
    }

    pub(crate) fn computed(compute: ComputeFn) -> Self {
        Self::new(NodeKind::Computed(compute), None, NodeState::Dirty)
    }

    pub(crate) fn effect(run: EffectFn) -> Self {
        Self::new(NodeKind::Effect(run), None, NodeState::Dirty)
    }

    fn new(kind: NodeKind, value: Option<ErasedValue>, state: NodeState) -> Self {
        Self {
            kind,
            value,
            state,
            sources: Edges::new(),
            observers: Edges::new(),
        }
    }

    #[inline]
    pub(crate) fn is_effect(&self) -> bool {
        matches!(self.kind, NodeKind::Effect(_))
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The node arena of one runtime, plus its scheduling state.
#[derive(Debug, Default)]
pub(crate) struct Graph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    /// Effects waiting to be refreshed, in scheduling order.
    pub(crate) pending: VecDeque<NodeId>,
    pub(crate) batch_depth: u32,
    pub(crate) flushing: bool,
    /// Reused marking stack.
    scratch: Vec<(NodeId, NodeState)>,
}

impl Graph {
    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId::new(index, slot.generation);
        }
        let index = u32::try_from(self.slots.len()).expect("too many reactive nodes (u32)");
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId::new(index, 0)
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    #[inline]
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn state(&self, id: NodeId) -> Option<NodeState> {
        self.get(id).map(|node| node.state)
    }

    pub(crate) fn set_state(&mut self, id: NodeId, state: NodeState) {
        if let Some(node) = self.get_mut(id) {
            node.state = state;
        }
    }

    /// Removes a node, unlinking it from both sides of every edge.
    ///
    /// Former observers are marked dirty so they re-evaluate without it.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<Node> {
        let slot = self
            .slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;

        for &source in &node.sources {
            if let Some(source) = self.get_mut(source) {
                source.observers.retain(|observer| *observer != id);
            }
        }
        for &observer in &node.observers {
            if let Some(observer) = self.get_mut(observer) {
                observer.sources.retain(|source| *source != id);
            }
        }
        self.mark(node.observers.iter().copied());
        Some(node)
    }

    /// Replaces the source set of `id`, keeping observer lists in sync.
    pub(crate) fn relink(&mut self, id: NodeId, sources: Edges) {
        let Some(node) = self.get_mut(id) else {
            return;
        };
        let old = core::mem::replace(&mut node.sources, Edges::new());
        for source in old {
            if !sources.contains(&source)
                && let Some(source) = self.get_mut(source)
            {
                source.observers.retain(|observer| *observer != id);
            }
        }

        let mut linked = Edges::new();
        for source in sources {
            let Some(node) = self.get_mut(source) else {
                continue;
            };
            if !node.observers.contains(&id) {
                node.observers.push(id);
            }
            linked.push(source);
        }
        if let Some(node) = self.get_mut(id) {
            node.sources = linked;
        }
    }

    /// Marks the observers of `id` after its value changed.
    pub(crate) fn mark_observers(&mut self, id: NodeId) {
        let observers = match self.get(id) {
            Some(node) if !node.observers.is_empty() => node.observers.clone(),
            _ => return,
        };
        self.mark(observers);
    }

    /// Marks `direct` as [`NodeState::Dirty`] and everything downstream of
    /// them as [`NodeState::Check`].
    ///
    /// A node that is already at least as stale as requested stops the walk:
    /// its observers were marked when it was.
    fn mark(&mut self, direct: impl IntoIterator<Item = NodeId>) {
        let mut stack = core::mem::take(&mut self.scratch);
        stack.clear();
        stack.extend(direct.into_iter().map(|id| (id, NodeState::Dirty)));

        while let Some((id, state)) = stack.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            let previous = node.state;
            if previous >= state {
                continue;
            }
            node.state = state;
            if previous != NodeState::Clean {
                continue;
            }
            let is_effect = node.is_effect();
            stack.extend(
                node.observers
                    .iter()
                    .map(|&observer| (observer, NodeState::Check)),
            );
            if is_effect {
                self.pending.push_back(id);
            }
        }

        self.scratch = stack;
    }
}
