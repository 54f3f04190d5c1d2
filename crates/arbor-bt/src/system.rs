//! The per-tick driver: walks every tracked entity through its tree and hands the requested
//! action to the action subsystem.

use arbor_core::{
    ActionId, ActionState, ActionSystem, Aspect, ComponentKind, ComponentStore, EntityId,
    TickContext,
};
use arbor_tools::{tags, NullTraceSink, TraceEvent, TraceSink};
use indexmap::IndexSet;

use crate::error::{BuildError, Result};
use crate::node::EvalContext;
use crate::{BehaviorState, BehaviorTree, NodeId};

/// Owns the node arena and the set of entities carrying a behavior component.
///
/// One [`BehaviorSystem::update`] per tick, entities in activation order. At most one action
/// is requested per entity per tick.
pub struct BehaviorSystem {
    tree: BehaviorTree,
    active: IndexSet<EntityId>,
    trace: Box<dyn TraceSink>,
}

impl BehaviorSystem {
    pub fn new(tree: BehaviorTree) -> Self {
        Self {
            tree,
            active: IndexSet::new(),
            trace: Box::new(NullTraceSink),
        }
    }

    pub fn with_trace_sink(mut self, trace: impl TraceSink + 'static) -> Self {
        self.trace = Box::new(trace);
        self
    }

    pub fn tree(&self) -> &BehaviorTree {
        &self.tree
    }

    /// Tracked entities in activation order.
    pub fn tracked(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.active.iter().copied()
    }

    pub fn is_tracked(&self, entity: EntityId) -> bool {
        self.active.contains(&entity)
    }

    pub fn state_for(&self, root: NodeId) -> Result<BehaviorState> {
        self.tree.state_for(root)
    }

    pub fn state_for_named(&self, name: &str) -> Result<BehaviorState> {
        self.tree.state_for_named(name)
    }

    /// Start tracking `entity` if its aspect carries the behavior component.
    ///
    /// Re-activating an already tracked entity keeps its original position.
    pub fn on_entity_activated(
        &mut self,
        ctx: &TickContext,
        entity: EntityId,
        aspect: Aspect,
    ) -> bool {
        if !aspect.includes(ComponentKind::Behavior) {
            return false;
        }
        let inserted = self.active.insert(entity);
        if inserted {
            tracing::info!(entity = %entity, tick = ctx.tick, "entity tracked by behavior system");
            self.trace.emit(
                TraceEvent::new(ctx.tick, tags::ENTITY_ACTIVATED).with_a(entity.stable_id()),
            );
        }
        inserted
    }

    /// Stop tracking `entity`, cancelling the action it was executing.
    pub fn on_entity_deactivated<S, A>(
        &mut self,
        ctx: &TickContext,
        entity: EntityId,
        store: &mut S,
        actions: &mut A,
    ) -> bool
    where
        S: ComponentStore<BehaviorState> + ?Sized,
        A: ActionSystem + ?Sized,
    {
        let removed = self.active.shift_remove(&entity);
        if !removed {
            return false;
        }
        let interrupted = store.component_mut(entity).and_then(BehaviorState::cancel);
        if let Some(action) = interrupted {
            actions.cancel_action(ctx, action, entity);
        }
        tracing::info!(
            entity = %entity,
            tick = ctx.tick,
            "entity no longer tracked by behavior system"
        );
        self.trace.emit(
            TraceEvent::new(ctx.tick, tags::ENTITY_DEACTIVATED)
                .with_a(entity.stable_id())
                .with_b(interrupted.map_or(0, |a| u64::from(a.0))),
        );
        true
    }

    /// Run one tick for every tracked entity.
    pub fn update<S, A>(&mut self, ctx: &TickContext, store: &mut S, actions: &mut A)
    where
        S: ComponentStore<BehaviorState> + ?Sized,
        A: ActionSystem + ?Sized,
    {
        let Self {
            tree,
            active,
            trace,
        } = self;

        for &entity in active.iter() {
            let Some(state) = store.component_mut(entity) else {
                tracing::warn!(entity = %entity, "tracked entity has no behavior state");
                continue;
            };

            let previous = state.take_in_flight();
            if state.running_action().is_none() {
                let root = state.root();
                EvalContext::new(tree, ctx, &mut **trace).evaluate(root, entity, state);
            }

            let requested = state.running_action();
            if let Some(stale) = previous.filter(|p| Some(*p) != requested) {
                tracing::debug!(entity = %entity, action = %stale, "action preempted");
                actions.cancel_action(ctx, stale, entity);
                trace.emit(
                    TraceEvent::new(ctx.tick, tags::ACTION_PREEMPT)
                        .with_a(entity.stable_id())
                        .with_b(u64::from(stale.0)),
                );
            }

            if let Some(action) = requested {
                let report = actions.perform_action(ctx, action, entity);
                trace.emit(
                    TraceEvent::new(ctx.tick, tags::ACTION_PERFORM)
                        .with_a(entity.stable_id())
                        .with_b(u64::from(action.0)),
                );
                state.report(report);
            }
        }
    }

    /// Abort `entity`'s current behavior and tell the action subsystem to stop it.
    pub fn cancel<S, A>(
        &mut self,
        ctx: &TickContext,
        entity: EntityId,
        store: &mut S,
        actions: &mut A,
    ) -> Option<ActionId>
    where
        S: ComponentStore<BehaviorState> + ?Sized,
        A: ActionSystem + ?Sized,
    {
        let state = store.component_mut(entity)?;
        let interrupted = state.cancel();
        if let Some(action) = interrupted {
            actions.cancel_action(ctx, action, entity);
        }
        tracing::debug!(entity = %entity, "behavior cancelled");
        self.trace.emit(
            TraceEvent::new(ctx.tick, tags::CANCEL)
                .with_a(entity.stable_id())
                .with_b(interrupted.map_or(0, |a| u64::from(a.0))),
        );
        interrupted
    }

    /// Switch `entity` to another root, cancelling whatever it was executing.
    pub fn set_root<S, A>(
        &mut self,
        ctx: &TickContext,
        entity: EntityId,
        root: NodeId,
        store: &mut S,
        actions: &mut A,
    ) -> Result<()>
    where
        S: ComponentStore<BehaviorState> + ?Sized,
        A: ActionSystem + ?Sized,
    {
        if !self.tree.contains(root) {
            return Err(BuildError::UnknownRoot(root));
        }
        let Some(state) = store.component_mut(entity) else {
            tracing::warn!(entity = %entity, "cannot set root: entity has no behavior state");
            return Ok(());
        };
        if let Some(action) = state.set_root(root) {
            actions.cancel_action(ctx, action, entity);
        }
        Ok(())
    }

    /// Action state reported for `entity` on its latest tick.
    pub fn action_state<S>(&self, entity: EntityId, store: &S) -> Option<ActionState>
    where
        S: ComponentStore<BehaviorState> + ?Sized,
    {
        store.component(entity).map(BehaviorState::action_state)
    }
}
