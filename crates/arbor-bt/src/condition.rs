use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arbor_core::{ActionState, EntityId, TickContext};

use crate::BehaviorState;

/// Pure predicate over an entity and its behavior state.
///
/// `Running` means "applicable / keep going"; `Success` and `Failure` are terminal verdicts.
/// Conditions are shared by every entity evaluating the node, hence `Send + Sync`.
pub trait BCondition: Send + Sync + 'static {
    fn check(&self, ctx: &TickContext, entity: EntityId, state: &BehaviorState) -> ActionState;
}

impl<F> BCondition for F
where
    F: Fn(&TickContext, EntityId, &BehaviorState) -> ActionState + Send + Sync + 'static,
{
    fn check(&self, ctx: &TickContext, entity: EntityId, state: &BehaviorState) -> ActionState {
        self(ctx, entity, state)
    }
}

/// Condition with a fixed verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Always(pub ActionState);

impl BCondition for Always {
    fn check(&self, _ctx: &TickContext, _entity: EntityId, _state: &BehaviorState) -> ActionState {
        self.0
    }
}

/// Adapt a boolean predicate: `true` keeps running, `false` fails.
pub fn while_true<F>(pred: F) -> impl BCondition
where
    F: Fn(&TickContext, EntityId, &BehaviorState) -> bool + Send + Sync + 'static,
{
    move |ctx: &TickContext, entity: EntityId, state: &BehaviorState| {
        if pred(ctx, entity, state) {
            ActionState::Running
        } else {
            ActionState::Failure
        }
    }
}

/// A named, shareable condition as stored in nodes.
#[derive(Clone)]
pub struct ConditionRef {
    name: Arc<str>,
    condition: Arc<dyn BCondition>,
}

impl ConditionRef {
    pub fn new(name: impl Into<Arc<str>>, condition: impl BCondition) -> Self {
        Self {
            name: name.into(),
            condition: Arc::new(condition),
        }
    }

    pub fn from_arc(name: impl Into<Arc<str>>, condition: Arc<dyn BCondition>) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, ctx: &TickContext, entity: EntityId, state: &BehaviorState) -> ActionState {
        self.condition.check(ctx, entity, state)
    }
}

impl fmt::Debug for ConditionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConditionRef").field(&self.name).finish()
    }
}

/// Condition lookup used when building trees from configuration.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    conditions: BTreeMap<String, ConditionRef>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `always_running`, `always_success` and `always_failure`.
    pub fn with_builtins() -> Self {
        Self::new()
            .with("always_running", Always(ActionState::Running))
            .with("always_success", Always(ActionState::Success))
            .with("always_failure", Always(ActionState::Failure))
    }

    pub fn register(&mut self, name: impl Into<String>, condition: impl BCondition) -> &mut Self {
        let name = name.into();
        let entry = ConditionRef::new(name.as_str(), condition);
        self.conditions.insert(name, entry);
        self
    }

    pub fn with(mut self, name: impl Into<String>, condition: impl BCondition) -> Self {
        self.register(name, condition);
        self
    }

    pub fn get(&self, name: &str) -> Option<ConditionRef> {
        self.conditions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conditions.keys().map(String::as_str)
    }
}
