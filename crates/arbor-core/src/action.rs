use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{EntityId, TickContext};

/// Identifier of an externally executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ActionId(pub u32);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Result vocabulary shared by conditions, actions and node evaluation.
///
/// `Success` is the resting value of a freshly built or reset behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionState {
    Running,
    #[default]
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActionOutcome {
    Success,
    Failure,
}

impl From<ActionOutcome> for ActionState {
    fn from(value: ActionOutcome) -> Self {
        match value {
            ActionOutcome::Success => ActionState::Success,
            ActionOutcome::Failure => ActionState::Failure,
        }
    }
}

impl ActionState {
    pub fn outcome(self) -> Option<ActionOutcome> {
        match self {
            ActionState::Running => None,
            ActionState::Success => Some(ActionOutcome::Success),
            ActionState::Failure => Some(ActionOutcome::Failure),
        }
    }

    pub fn is_running(self) -> bool {
        self == ActionState::Running
    }

    pub fn is_terminal(self) -> bool {
        !self.is_running()
    }
}

/// A unit of behavior executed one step per tick for a single entity.
pub trait Action: 'static {
    fn tick(&mut self, ctx: &TickContext, entity: EntityId) -> ActionState;

    fn cancel(&mut self, _ctx: &TickContext, _entity: EntityId) {}
}

/// Action-execution boundary used by the behavior system.
///
/// The evaluator only requests actions by id. Whatever `perform_action` returns is recorded as
/// the entity's action state and read by the tree on the following tick.
pub trait ActionSystem {
    fn perform_action(
        &mut self,
        ctx: &TickContext,
        action: ActionId,
        entity: EntityId,
    ) -> ActionState;

    /// Called when the tree stops requesting an action that last reported `Running`.
    fn cancel_action(&mut self, _ctx: &TickContext, _action: ActionId, _entity: EntityId) {}
}

/// Set of action ids a tree may reference. Used to validate configuration at build time.
pub trait ActionCatalog {
    fn contains_action(&self, action: ActionId) -> bool;
}

impl ActionCatalog for BTreeSet<ActionId> {
    fn contains_action(&self, action: ActionId) -> bool {
        self.contains(&action)
    }
}

impl ActionCatalog for [ActionId] {
    fn contains_action(&self, action: ActionId) -> bool {
        self.contains(&action)
    }
}

impl ActionCatalog for Vec<ActionId> {
    fn contains_action(&self, action: ActionId) -> bool {
        self.as_slice().contains_action(action)
    }
}

type ActionFactory = Box<dyn Fn(&TickContext, EntityId) -> Box<dyn Action>>;

struct RunningAction {
    id: ActionId,
    action: Box<dyn Action>,
}

/// In-process [`ActionSystem`] built from registered action factories.
///
/// Each entity runs at most one action instance. Requesting a different id cancels the
/// current instance first; a terminal status drops the instance and is kept until
/// [`ActionRuntime::take_just_finished`] consumes it.
#[derive(Default)]
pub struct ActionRuntime {
    factories: BTreeMap<ActionId, ActionFactory>,
    running: BTreeMap<EntityId, RunningAction>,
    just_finished: BTreeMap<EntityId, (ActionId, ActionOutcome)>,
}

impl ActionRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory used to instantiate `id`.
    pub fn register<F>(&mut self, id: ActionId, make: F) -> &mut Self
    where
        F: Fn(&TickContext, EntityId) -> Box<dyn Action> + 'static,
    {
        self.factories.insert(id, Box::new(make));
        self
    }

    pub fn with_action<F>(mut self, id: ActionId, make: F) -> Self
    where
        F: Fn(&TickContext, EntityId) -> Box<dyn Action> + 'static,
    {
        self.register(id, make);
        self
    }

    pub fn current(&self, entity: EntityId) -> Option<ActionId> {
        self.running.get(&entity).map(|r| r.id)
    }

    pub fn is_running(&self, entity: EntityId, action: ActionId) -> bool {
        self.current(entity) == Some(action)
    }

    pub fn cancel_current(&mut self, ctx: &TickContext, entity: EntityId) {
        if let Some(mut current) = self.running.remove(&entity) {
            tracing::debug!(entity = %entity, action = %current.id, "cancelling action");
            current.action.cancel(ctx, entity);
        }
        self.just_finished.remove(&entity);
    }

    pub fn take_just_finished(
        &mut self,
        entity: EntityId,
        action: ActionId,
    ) -> Option<ActionOutcome> {
        match self.just_finished.get(&entity) {
            Some((finished, outcome)) if *finished == action => {
                let outcome = *outcome;
                self.just_finished.remove(&entity);
                Some(outcome)
            }
            _ => None,
        }
    }
}

impl ActionSystem for ActionRuntime {
    fn perform_action(
        &mut self,
        ctx: &TickContext,
        action: ActionId,
        entity: EntityId,
    ) -> ActionState {
        if self.current(entity).is_some_and(|current| current != action) {
            self.cancel_current(ctx, entity);
        }

        let current = match self.running.entry(entity) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let Some(make) = self.factories.get(&action) else {
                    tracing::warn!(
                        entity = %entity,
                        action = %action,
                        "no factory registered for action"
                    );
                    return ActionState::Failure;
                };
                self.just_finished.remove(&entity);
                entry.insert(RunningAction {
                    id: action,
                    action: make(ctx, entity),
                })
            }
        };

        let state = current.action.tick(ctx, entity);
        if let Some(outcome) = state.outcome() {
            self.running.remove(&entity);
            self.just_finished.insert(entity, (action, outcome));
        }
        state
    }

    fn cancel_action(&mut self, ctx: &TickContext, action: ActionId, entity: EntityId) {
        if self.is_running(entity, action) {
            self.cancel_current(ctx, entity);
        }
    }
}

impl ActionCatalog for ActionRuntime {
    fn contains_action(&self, action: ActionId) -> bool {
        self.factories.contains_key(&action)
    }
}
