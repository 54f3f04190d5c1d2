//! Per-entity runtime state of the evaluator.

use std::collections::BTreeMap;

use arbor_core::{ActionId, ActionState};

use crate::NodeId;

/// The leaf currently holding an entity, and when it took hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveLeaf {
    pub node: NodeId,
    pub since: f64,
}

/// Behavior component carried by every entity driven by a tree.
///
/// Nodes are shared by all entities, so everything that changes while an entity walks its
/// tree lives here:
/// - the action requested for the current tick and the last reported action state,
/// - `node_mapping`, the cached decision path (composite id -> selected child id). An entry
///   exists only while that composite has a committed, unresolved child,
/// - the leaf that holds the entity and the time it started.
#[doc(alias = "EBehavior")]
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorState {
    root: NodeId,
    running_action: Option<ActionId>,
    action_state: ActionState,
    node_mapping: BTreeMap<NodeId, NodeId>,
    active_leaf: Option<ActiveLeaf>,
    in_flight: Option<ActionId>,
}

impl BehaviorState {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            running_action: None,
            action_state: ActionState::Success,
            node_mapping: BTreeMap::new(),
            active_leaf: None,
            in_flight: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Reassign the root and reset all traversal state.
    ///
    /// Returns the action that was still executing, if any, so the caller can cancel it.
    #[must_use]
    pub fn set_root(&mut self, root: NodeId) -> Option<ActionId> {
        let interrupted = self.reset(ActionState::Success);
        self.root = root;
        interrupted
    }

    /// Action requested by a leaf for the current tick.
    pub fn running_action(&self) -> Option<ActionId> {
        self.running_action
    }

    pub fn action_state(&self) -> ActionState {
        self.action_state
    }

    /// Action that reported `Running` on the previous tick and has not been released yet.
    pub fn in_flight(&self) -> Option<ActionId> {
        self.in_flight
    }

    pub fn active_leaf(&self) -> Option<ActiveLeaf> {
        self.active_leaf
    }

    pub fn is_idle(&self) -> bool {
        self.running_action.is_none() && self.active_leaf.is_none()
    }

    #[doc(alias = "getSubNodeMapping")]
    pub fn sub_node_mapping(&self, node: NodeId) -> Option<NodeId> {
        self.node_mapping.get(&node).copied()
    }

    /// Returns the previously cached child.
    pub fn set_node_mapping(&mut self, node: NodeId, child: NodeId) -> Option<NodeId> {
        self.node_mapping.insert(node, child)
    }

    pub fn remove_node_mapping(&mut self, node: NodeId) -> Option<NodeId> {
        self.node_mapping.remove(&node)
    }

    pub fn clear_node_mapping(&mut self) {
        self.node_mapping.clear();
    }

    pub fn node_mappings(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.node_mapping.iter().map(|(node, child)| (*node, *child))
    }

    /// Record what the action subsystem reported for the requested action.
    ///
    /// The request slot is released; the holding leaf reads the report on the next evaluation.
    pub fn report(&mut self, state: ActionState) {
        self.action_state = state;
        self.in_flight = if state.is_running() {
            self.running_action
        } else {
            None
        };
        self.running_action = None;
    }

    /// Abort the current behavior: drops the requested action, the holding leaf and the whole
    /// cached decision path. The next evaluation starts from the root.
    ///
    /// Returns the action that was executing, if any.
    pub fn cancel(&mut self) -> Option<ActionId> {
        self.reset(ActionState::Failure)
    }

    fn reset(&mut self, action_state: ActionState) -> Option<ActionId> {
        let interrupted = self.in_flight.or(self.running_action);
        self.running_action = None;
        self.in_flight = None;
        self.action_state = action_state;
        self.active_leaf = None;
        self.node_mapping.clear();
        interrupted
    }

    pub(crate) fn holds(&self, node: NodeId) -> Option<f64> {
        self.active_leaf
            .filter(|leaf| leaf.node == node)
            .map(|leaf| leaf.since)
    }

    pub(crate) fn commit(&mut self, node: NodeId, action: ActionId, now: f64) {
        self.running_action = Some(action);
        self.action_state = ActionState::Running;
        self.active_leaf = Some(ActiveLeaf { node, since: now });
    }

    pub(crate) fn keep(&mut self, action: ActionId) {
        self.running_action = Some(action);
        self.action_state = ActionState::Running;
    }

    pub(crate) fn release(&mut self, result: ActionState) {
        self.running_action = None;
        self.action_state = result;
        self.active_leaf = None;
    }

    pub(crate) fn take_in_flight(&mut self) -> Option<ActionId> {
        self.in_flight.take()
    }
}
