use core::fmt;

use arbor_core::{ActionId, ActionState, EntityId, TickContext};
use arbor_tools::{tags, TraceEvent, TraceSink};
use serde::{Deserialize, Serialize};

use crate::nodes::{ConditionalLeaf, ConditionalSelection, Sequence, TimedLeaf};
use crate::{BehaviorState, BehaviorTree};

/// Stable node identity; the key of the node arena and of every `node_mapping` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    ConditionalLeaf,
    TimedLeaf,
    Sequence,
    ConditionalSelection,
}

impl NodeKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeKind::ConditionalLeaf | NodeKind::TimedLeaf)
    }
}

/// One evaluation step of a tree.
///
/// Nodes are immutable once built and shared by every entity; all per-entity progress goes
/// through the [`BehaviorState`] handed to [`BehaviorNode::next_action`].
#[derive(Debug)]
pub enum BehaviorNode {
    ConditionalLeaf(ConditionalLeaf),
    TimedLeaf(TimedLeaf),
    Sequence(Sequence),
    ConditionalSelection(ConditionalSelection),
}

impl BehaviorNode {
    pub fn id(&self) -> NodeId {
        match self {
            BehaviorNode::ConditionalLeaf(n) => n.id(),
            BehaviorNode::TimedLeaf(n) => n.id(),
            BehaviorNode::Sequence(n) => n.id(),
            BehaviorNode::ConditionalSelection(n) => n.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            BehaviorNode::ConditionalLeaf(_) => NodeKind::ConditionalLeaf,
            BehaviorNode::TimedLeaf(_) => NodeKind::TimedLeaf,
            BehaviorNode::Sequence(_) => NodeKind::Sequence,
            BehaviorNode::ConditionalSelection(_) => NodeKind::ConditionalSelection,
        }
    }

    /// Child ids in evaluation order. Empty for leaves.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            BehaviorNode::ConditionalLeaf(_) | BehaviorNode::TimedLeaf(_) => Vec::new(),
            BehaviorNode::Sequence(n) => n.children().to_vec(),
            BehaviorNode::ConditionalSelection(n) => n.entries().iter().map(|e| e.child).collect(),
        }
    }

    /// Action started by this node, for leaves.
    pub fn action(&self) -> Option<ActionId> {
        match self {
            BehaviorNode::ConditionalLeaf(n) => Some(n.action()),
            BehaviorNode::TimedLeaf(n) => Some(n.action()),
            BehaviorNode::Sequence(_) | BehaviorNode::ConditionalSelection(_) => None,
        }
    }

    /// Advance `entity` through this node.
    ///
    /// Returns `Running` when an action was started or continues (`state.running_action()` is
    /// set); `Success`/`Failure` when the subtree is exhausted for this tick.
    pub fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        ctx: &mut EvalContext<'_>,
    ) -> ActionState {
        match self {
            BehaviorNode::ConditionalLeaf(n) => n.next_action(entity, state, ctx),
            BehaviorNode::TimedLeaf(n) => n.next_action(entity, state, ctx),
            BehaviorNode::Sequence(n) => n.next_action(entity, state, ctx),
            BehaviorNode::ConditionalSelection(n) => n.next_action(entity, state, ctx),
        }
    }
}

impl From<ConditionalLeaf> for BehaviorNode {
    fn from(value: ConditionalLeaf) -> Self {
        BehaviorNode::ConditionalLeaf(value)
    }
}

impl From<TimedLeaf> for BehaviorNode {
    fn from(value: TimedLeaf) -> Self {
        BehaviorNode::TimedLeaf(value)
    }
}

impl From<Sequence> for BehaviorNode {
    fn from(value: Sequence) -> Self {
        BehaviorNode::Sequence(value)
    }
}

impl From<ConditionalSelection> for BehaviorNode {
    fn from(value: ConditionalSelection) -> Self {
        BehaviorNode::ConditionalSelection(value)
    }
}

/// Everything a node needs besides the entity state: the node arena for child lookup, the
/// tick clock and the trace sink.
pub struct EvalContext<'a> {
    tree: &'a BehaviorTree,
    tick: &'a TickContext,
    trace: &'a mut dyn TraceSink,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        tree: &'a BehaviorTree,
        tick: &'a TickContext,
        trace: &'a mut dyn TraceSink,
    ) -> Self {
        Self { tree, tick, trace }
    }

    pub fn tick(&self) -> &'a TickContext {
        self.tick
    }

    pub fn tree(&self) -> &'a BehaviorTree {
        self.tree
    }

    /// Evaluate `node` for `entity`. An id missing from the arena evaluates to `Failure`.
    pub fn evaluate(
        &mut self,
        node: NodeId,
        entity: EntityId,
        state: &mut BehaviorState,
    ) -> ActionState {
        let tree = self.tree;
        let Some(target) = tree.get(node) else {
            tracing::warn!(entity = %entity, node = %node, "node is not part of the tree");
            return ActionState::Failure;
        };
        target.next_action(entity, state, self)
    }

    pub(crate) fn start_leaf(
        &mut self,
        entity: EntityId,
        leaf: NodeId,
        action: ActionId,
        state: &mut BehaviorState,
    ) {
        state.commit(leaf, action, self.tick.now);
        tracing::debug!(entity = %entity, leaf = %leaf, action = %action, "action started");
        self.emit(tags::ACTION_START, entity, u64::from(action.0));
    }

    pub(crate) fn finish_leaf(
        &mut self,
        entity: EntityId,
        leaf: NodeId,
        result: ActionState,
        state: &mut BehaviorState,
    ) {
        state.release(result);
        tracing::debug!(entity = %entity, leaf = %leaf, result = ?result, "action finished");
        self.emit(tags::ACTION_FINISH, entity, u64::from(leaf.0));
    }

    pub(crate) fn set_mapping(
        &mut self,
        entity: EntityId,
        node: NodeId,
        child: NodeId,
        state: &mut BehaviorState,
    ) {
        if state.set_node_mapping(node, child) != Some(child) {
            tracing::debug!(entity = %entity, node = %node, child = %child, "branch cached");
            self.emit(tags::MAPPING_SET, entity, u64::from(node.0));
        }
    }

    pub(crate) fn clear_mapping(
        &mut self,
        entity: EntityId,
        node: NodeId,
        state: &mut BehaviorState,
    ) {
        if state.remove_node_mapping(node).is_some() {
            self.emit(tags::MAPPING_CLEAR, entity, u64::from(node.0));
        }
    }

    /// A cached child no longer belongs to `node`: drop the entry and everything cached below
    /// the stale child, then let the caller rescan.
    pub(crate) fn stale_mapping(
        &mut self,
        entity: EntityId,
        node: NodeId,
        cached: NodeId,
        state: &mut BehaviorState,
    ) {
        tracing::warn!(
            entity = %entity,
            node = %node,
            cached = %cached,
            "discarding stale cached branch"
        );
        state.remove_node_mapping(node);
        self.forget_subtree(cached, state);
        self.emit(tags::MAPPING_STALE, entity, u64::from(node.0));
    }

    fn forget_subtree(&self, root: NodeId, state: &mut BehaviorState) {
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            let Some(node) = self.tree.get(id) else {
                continue;
            };
            if let Some(child) = state.remove_node_mapping(id) {
                pending.push(child);
            }
            if state.holds(id).is_some() {
                state.release(ActionState::Failure);
            }
            if !node.kind().is_leaf() {
                pending.extend(node.children());
            }
        }
    }

    fn emit(&mut self, tag: &'static str, entity: EntityId, b: u64) {
        self.trace.emit(
            TraceEvent::new(self.tick.tick, tag)
                .with_a(entity.stable_id())
                .with_b(b),
        );
    }
}
