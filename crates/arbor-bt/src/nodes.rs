use arbor_core::{ActionId, ActionState, EntityId};

use crate::condition::ConditionRef;
use crate::node::{EvalContext, NodeId};
use crate::BehaviorState;

/// Leaf that keeps its action alive while a guard condition says `Running`.
///
/// The guard is consulted only once the leaf holds the entity; first entry starts the action
/// unconditionally unless `guard_entry` is set.
#[derive(Debug, Clone)]
pub struct ConditionalLeaf {
    id: NodeId,
    action: ActionId,
    run_condition: ConditionRef,
    guard_entry: bool,
}

impl ConditionalLeaf {
    pub fn new(id: NodeId, action: ActionId, run_condition: ConditionRef) -> Self {
        Self {
            id,
            action,
            run_condition,
            guard_entry: false,
        }
    }

    /// Also require the guard to return `Running` before the action is first started.
    pub fn with_guard_entry(mut self, guard_entry: bool) -> Self {
        self.guard_entry = guard_entry;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    pub fn run_condition(&self) -> &ConditionRef {
        &self.run_condition
    }

    pub fn guard_entry(&self) -> bool {
        self.guard_entry
    }

    pub(crate) fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        ctx: &mut EvalContext<'_>,
    ) -> ActionState {
        if state.holds(self.id).is_some() {
            let verdict = match state.action_state() {
                ActionState::Running => self.run_condition.check(ctx.tick(), entity, state),
                reported => reported,
            };
            if verdict.is_running() {
                state.keep(self.action);
            } else {
                ctx.finish_leaf(entity, self.id, verdict, state);
            }
            return verdict;
        }

        if self.guard_entry && !self.run_condition.check(ctx.tick(), entity, state).is_running() {
            return ActionState::Failure;
        }

        ctx.start_leaf(entity, self.id, self.action, state);
        ActionState::Running
    }
}

/// Clock resolution below which elapsed time and a leaf duration compare as equal.
pub const TIME_EPSILON: f64 = 1e-9;

/// Leaf that runs its action for a fixed duration and then succeeds.
///
/// Elapsed time is compared strictly: the leaf still runs at exactly `duration` and completes
/// on the first evaluation after it. Overshoots below [`TIME_EPSILON`] count as exactly
/// `duration`, so a clock stepping by `0.1` still holds a `0.3` leaf on its third step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLeaf {
    id: NodeId,
    action: ActionId,
    duration: f64,
}

impl TimedLeaf {
    pub fn new(id: NodeId, action: ActionId, duration: f64) -> Self {
        Self {
            id,
            action,
            duration,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn action(&self) -> ActionId {
        self.action
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub(crate) fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        ctx: &mut EvalContext<'_>,
    ) -> ActionState {
        let Some(since) = state.holds(self.id) else {
            ctx.start_leaf(entity, self.id, self.action, state);
            return ActionState::Running;
        };

        if state.action_state() == ActionState::Failure {
            ctx.finish_leaf(entity, self.id, ActionState::Failure, state);
            return ActionState::Failure;
        }

        if ctx.tick().elapsed_since(since) - self.duration > TIME_EPSILON {
            ctx.finish_leaf(entity, self.id, ActionState::Success, state);
            return ActionState::Success;
        }

        state.keep(self.action);
        ActionState::Running
    }
}

/// Runs children in order, pinning the first child that reports `Running`.
///
/// A finished pinned child lets the scan continue with the next child in the same tick. A
/// failing child, or running out of children, drops the pin so the next evaluation starts
/// again from the first child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    id: NodeId,
    children: Vec<NodeId>,
}

impl Sequence {
    pub fn new(id: NodeId, children: Vec<NodeId>) -> Self {
        Self { id, children }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub(crate) fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        ctx: &mut EvalContext<'_>,
    ) -> ActionState {
        let mut start = 0;
        if let Some(cached) = state.sub_node_mapping(self.id) {
            match self.children.iter().position(|c| *c == cached) {
                Some(pos) => match ctx.evaluate(cached, entity, state) {
                    ActionState::Running => return ActionState::Running,
                    ActionState::Failure => {
                        ctx.clear_mapping(entity, self.id, state);
                        return ActionState::Failure;
                    }
                    ActionState::Success => start = pos + 1,
                },
                None => ctx.stale_mapping(entity, self.id, cached, state),
            }
        }

        for &child in &self.children[start..] {
            match ctx.evaluate(child, entity, state) {
                ActionState::Running => {
                    ctx.set_mapping(entity, self.id, child, state);
                    return ActionState::Running;
                }
                ActionState::Failure => {
                    ctx.clear_mapping(entity, self.id, state);
                    return ActionState::Failure;
                }
                ActionState::Success => {}
            }
        }

        ctx.clear_mapping(entity, self.id, state);
        ActionState::Success
    }
}

/// One row of a [`ConditionalSelection`] decision table.
#[derive(Debug, Clone)]
pub struct SelectionEntry {
    pub condition: ConditionRef,
    pub child: NodeId,
}

impl SelectionEntry {
    pub fn new(condition: ConditionRef, child: NodeId) -> Self {
        Self { condition, child }
    }
}

/// Decision table: enters the first child whose condition reports `Running`.
///
/// Table order is the tie-break. A running branch is cached and resumed directly on later
/// ticks without consulting the conditions; once it stops running the table is rescanned.
#[derive(Debug, Clone)]
pub struct ConditionalSelection {
    id: NodeId,
    entries: Vec<SelectionEntry>,
}

impl ConditionalSelection {
    pub fn new(id: NodeId, entries: Vec<SelectionEntry>) -> Self {
        Self { id, entries }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn entries(&self) -> &[SelectionEntry] {
        &self.entries
    }

    pub(crate) fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        ctx: &mut EvalContext<'_>,
    ) -> ActionState {
        let mut outcome = ActionState::Failure;
        if let Some(cached) = state.sub_node_mapping(self.id) {
            if self.entries.iter().any(|e| e.child == cached) {
                outcome = ctx.evaluate(cached, entity, state);
                if outcome.is_running() {
                    return ActionState::Running;
                }
                ctx.clear_mapping(entity, self.id, state);
            } else {
                ctx.stale_mapping(entity, self.id, cached, state);
            }
        }

        for entry in &self.entries {
            if !entry.condition.check(ctx.tick(), entity, state).is_running() {
                continue;
            }
            match ctx.evaluate(entry.child, entity, state) {
                ActionState::Running => {
                    ctx.set_mapping(entity, self.id, entry.child, state);
                    return ActionState::Running;
                }
                ActionState::Success => return ActionState::Success,
                ActionState::Failure => outcome = ActionState::Failure,
            }
        }

        outcome
    }
}
