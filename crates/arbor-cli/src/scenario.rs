//! Scripted simulation input for `arbor run`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use arbor_bt::{BehaviorConfig, BehaviorState, ConditionRegistry};
use arbor_core::{
    Action, ActionId, ActionOutcome, ActionRuntime, ActionState, ActionSystem, EntityId,
    TickContext,
};
use serde::{Deserialize, Serialize};

/// A simulation: how long to run, which conditions and actions exist, and which entities to
/// drive from which root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    #[serde(default = "default_dt")]
    pub dt_seconds: f64,

    #[serde(default)]
    pub config: BehaviorConfig,

    #[serde(default)]
    pub conditions: BTreeMap<String, ConditionScript>,

    #[serde(default)]
    pub actions: Vec<ActionScript>,

    #[serde(default)]
    pub entities: Vec<EntityScript>,
}

fn default_ticks() -> u64 {
    10
}

fn default_dt() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionScript {
    /// Always the same verdict.
    Constant { state: ActionState },
    /// `Running` before `tick`, `Failure` from then on.
    UntilTick { tick: u64 },
    /// `Failure` before `tick`, `Running` from then on.
    FromTick { tick: u64 },
    /// `Running` for the listed entities only.
    Entities { ids: Vec<u64> },
}

impl ConditionScript {
    fn check(&self, ctx: &TickContext, entity: EntityId) -> ActionState {
        let applies = match self {
            ConditionScript::Constant { state } => return *state,
            ConditionScript::UntilTick { tick } => ctx.tick < *tick,
            ConditionScript::FromTick { tick } => ctx.tick >= *tick,
            ConditionScript::Entities { ids } => ids.contains(&entity.stable_id()),
        };
        if applies {
            ActionState::Running
        } else {
            ActionState::Failure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptOutcome {
    #[default]
    Success,
    Failure,
}

impl From<ScriptOutcome> for ActionOutcome {
    fn from(value: ScriptOutcome) -> Self {
        match value {
            ScriptOutcome::Success => ActionOutcome::Success,
            ScriptOutcome::Failure => ActionOutcome::Failure,
        }
    }
}

/// An action that reports `Running` for `running_ticks` steps, then `outcome`. Without
/// `running_ticks` it never finishes on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionScript {
    pub id: ActionId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub running_ticks: Option<u32>,

    #[serde(default)]
    pub outcome: ScriptOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityScript {
    pub id: u64,
    pub root: String,
}

impl Scenario {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("invalid scenario YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario from {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("failed to parse scenario from {}", path.display()))
    }

    /// Builtin conditions plus every scripted one.
    pub fn conditions(&self) -> ConditionRegistry {
        let mut registry = ConditionRegistry::with_builtins();
        for (name, script) in &self.conditions {
            let script = script.clone();
            registry.register(
                name.as_str(),
                move |ctx: &TickContext, entity: EntityId, _state: &BehaviorState| {
                    script.check(ctx, entity)
                },
            );
        }
        registry
    }

    pub fn runtime(&self) -> ActionRuntime {
        let mut runtime = ActionRuntime::new();
        for script in &self.actions {
            let running_ticks = script.running_ticks;
            let outcome = ActionOutcome::from(script.outcome);
            runtime.register(script.id, move |_ctx, _entity| {
                Box::new(ScriptedAction {
                    remaining: running_ticks,
                    outcome,
                })
            });
        }
        runtime
    }

    pub fn action_name(&self, id: ActionId) -> String {
        self.actions
            .iter()
            .find(|script| script.id == id)
            .and_then(|script| script.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

struct ScriptedAction {
    remaining: Option<u32>,
    outcome: ActionOutcome,
}

impl Action for ScriptedAction {
    fn tick(&mut self, _ctx: &TickContext, _entity: EntityId) -> ActionState {
        match &mut self.remaining {
            None => ActionState::Running,
            Some(0) => self.outcome.into(),
            Some(left) => {
                *left -= 1;
                ActionState::Running
            }
        }
    }
}

/// Wraps an [`ActionSystem`] and records what was performed and cancelled.
pub struct ActionLog<'a, A: ActionSystem + ?Sized> {
    inner: &'a mut A,
    pub performed: Vec<(u64, EntityId, ActionId, ActionState)>,
    pub cancelled: Vec<(u64, EntityId, ActionId)>,
}

impl<'a, A: ActionSystem + ?Sized> ActionLog<'a, A> {
    pub fn new(inner: &'a mut A) -> Self {
        Self {
            inner,
            performed: Vec::new(),
            cancelled: Vec::new(),
        }
    }
}

impl<A: ActionSystem + ?Sized> ActionSystem for ActionLog<'_, A> {
    fn perform_action(
        &mut self,
        ctx: &TickContext,
        action: ActionId,
        entity: EntityId,
    ) -> ActionState {
        let state = self.inner.perform_action(ctx, action, entity);
        self.performed.push((ctx.tick, entity, action, state));
        state
    }

    fn cancel_action(&mut self, ctx: &TickContext, action: ActionId, entity: EntityId) {
        self.inner.cancel_action(ctx, action, entity);
        self.cancelled.push((ctx.tick, entity, action));
    }
}
