use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arbor_bt::{
    Always, BehaviorNode, BehaviorState, BehaviorSystem, BehaviorTree, BuildError, ConditionRef,
    ConditionalLeaf, ConditionalSelection, NodeId, SelectionEntry, Sequence, TimedLeaf,
};
use arbor_core::{
    Action, ActionId, ActionRuntime, ActionState, ActionSystem, Aspect, ComponentKind, EntityId,
    FixedClock, TickContext,
};
use arbor_tools::{tags, SharedTraceLog};

const A: ActionId = ActionId(1);
const B: ActionId = ActionId(2);
const START: TickContext = TickContext {
    tick: 0,
    dt_seconds: 0.0,
    now: 0.0,
};

#[derive(Debug, Default)]
struct RecordingActions {
    performed: Vec<(u64, EntityId, ActionId)>,
    cancelled: Vec<(u64, EntityId, ActionId)>,
}

impl ActionSystem for RecordingActions {
    fn perform_action(
        &mut self,
        ctx: &TickContext,
        action: ActionId,
        entity: EntityId,
    ) -> ActionState {
        self.performed.push((ctx.tick, entity, action));
        ActionState::Running
    }

    fn cancel_action(&mut self, ctx: &TickContext, action: ActionId, entity: EntityId) {
        self.cancelled.push((ctx.tick, entity, action));
    }
}

fn behavior() -> Aspect {
    Aspect::of(&[ComponentKind::Behavior, ComponentKind::Transform])
}

fn tree(nodes: Vec<BehaviorNode>) -> BehaviorTree {
    BehaviorTree::from_nodes(nodes).expect("valid tree")
}

fn running() -> ConditionRef {
    ConditionRef::new("always_running", Always(ActionState::Running))
}

fn single_leaf() -> BehaviorTree {
    tree(vec![ConditionalLeaf::new(NodeId(0), A, running()).into()])
}

/// Selection that prefers A while `urgent` is set; B's guard gives way as soon as it is.
fn urgent_tree(urgent: &Arc<AtomicBool>) -> BehaviorTree {
    let wants_a = Arc::clone(urgent);
    let calm = Arc::clone(urgent);
    tree(vec![
        ConditionalSelection::new(
            NodeId(0),
            vec![
                SelectionEntry::new(
                    ConditionRef::new(
                        "urgent",
                        move |_ctx: &TickContext, _entity: EntityId, _state: &BehaviorState| {
                            if wants_a.load(Ordering::SeqCst) {
                                ActionState::Running
                            } else {
                                ActionState::Failure
                            }
                        },
                    ),
                    NodeId(1),
                ),
                SelectionEntry::new(running(), NodeId(2)),
            ],
        )
        .into(),
        ConditionalLeaf::new(NodeId(1), A, running()).into(),
        ConditionalLeaf::new(
            NodeId(2),
            B,
            ConditionRef::new(
                "calm",
                move |_ctx: &TickContext, _entity: EntityId, _state: &BehaviorState| {
                    if calm.load(Ordering::SeqCst) {
                        ActionState::Failure
                    } else {
                        ActionState::Running
                    }
                },
            ),
        )
        .into(),
    ])
}

#[test]
fn at_most_one_action_per_entity_per_tick() {
    let mut system = BehaviorSystem::new(tree(vec![
        Sequence::new(NodeId(0), vec![NodeId(1), NodeId(2)]).into(),
        TimedLeaf::new(NodeId(1), A, 1.0).into(),
        TimedLeaf::new(NodeId(2), B, 1.0).into(),
    ]));
    let mut store = BTreeMap::new();
    for id in [1u64, 2] {
        system.on_entity_activated(&START, EntityId(id), behavior());
        store.insert(EntityId(id), BehaviorState::new(NodeId(0)));
    }
    let mut actions = RecordingActions::default();
    let mut clock = FixedClock::new(0.5);

    for _ in 0..12 {
        let ctx = clock.advance();
        system.update(&ctx, &mut store, &mut actions);
    }

    let mut seen = BTreeMap::new();
    for (tick, entity, _) in &actions.performed {
        *seen.entry((*tick, *entity)).or_insert(0) += 1;
    }
    assert!(seen.values().all(|count| *count == 1));
    assert!(actions.performed.iter().any(|(_, _, action)| *action == B));
}

#[test]
fn entities_are_updated_in_activation_order() {
    let mut system = BehaviorSystem::new(single_leaf());
    let mut store = BTreeMap::new();
    for id in [3u64, 1, 2] {
        assert!(system.on_entity_activated(&START, EntityId(id), behavior()));
        store.insert(EntityId(id), BehaviorState::new(NodeId(0)));
    }
    let sprite = Aspect::of(&[ComponentKind::Sprite]);
    assert!(!system.on_entity_activated(&START, EntityId(4), sprite));
    assert!(!system.on_entity_activated(&START, EntityId(3), behavior()));

    let mut actions = RecordingActions::default();
    system.update(&TickContext::new(0, 0.0), &mut store, &mut actions);
    let order: Vec<_> = actions.performed.iter().map(|(_, entity, _)| *entity).collect();
    assert_eq!(order, vec![EntityId(3), EntityId(1), EntityId(2)]);

    let ctx = TickContext::new(1, 1.0);
    assert!(system.on_entity_deactivated(&ctx, EntityId(1), &mut store, &mut actions));
    assert!(!system.on_entity_deactivated(&ctx, EntityId(1), &mut store, &mut actions));
    assert_eq!(actions.cancelled, vec![(1, EntityId(1), A)]);
    assert_eq!(
        system.tracked().collect::<Vec<_>>(),
        vec![EntityId(3), EntityId(2)]
    );
    assert!(!system.is_tracked(EntityId(4)));
}

#[test]
fn entity_without_state_is_skipped() {
    let mut system = BehaviorSystem::new(single_leaf());
    system.on_entity_activated(&START, EntityId(5), behavior());
    system.on_entity_activated(&START, EntityId(1), behavior());
    let mut store = BTreeMap::from([(EntityId(1), BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();

    system.update(&TickContext::new(0, 0.0), &mut store, &mut actions);

    assert_eq!(actions.performed, vec![(0, EntityId(1), A)]);
}

#[test]
fn action_no_longer_requested_is_cancelled() {
    let urgent = Arc::new(AtomicBool::new(false));
    let mut system = BehaviorSystem::new(urgent_tree(&urgent));
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();

    system.update(&TickContext::new(0, 0.0), &mut store, &mut actions);
    urgent.store(true, Ordering::SeqCst);
    system.update(&TickContext::new(1, 1.0), &mut store, &mut actions);

    assert_eq!(actions.performed, vec![(0, entity, B), (1, entity, A)]);
    assert_eq!(actions.cancelled, vec![(1, entity, B)]);
    assert_eq!(store[&entity].sub_node_mapping(NodeId(0)), Some(NodeId(1)));
}

#[test]
fn cancel_resets_behavior_and_notifies_actions() {
    let urgent = Arc::new(AtomicBool::new(false));
    let mut system = BehaviorSystem::new(urgent_tree(&urgent));
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();

    system.update(&TickContext::new(0, 0.0), &mut store, &mut actions);
    let cancelled = system.cancel(&TickContext::new(1, 1.0), entity, &mut store, &mut actions);

    assert_eq!(cancelled, Some(B));
    assert_eq!(actions.cancelled, vec![(1, entity, B)]);
    let state = &store[&entity];
    assert!(state.is_idle());
    assert_eq!(state.action_state(), ActionState::Failure);
    assert_eq!(state.node_mappings().count(), 0);

    system.update(&TickContext::new(2, 2.0), &mut store, &mut actions);
    assert_eq!(actions.performed.last(), Some(&(2, entity, B)));
    assert_eq!(actions.cancelled.len(), 1);
}

#[test]
fn cancel_unknown_entity_is_a_no_op() {
    let mut system = BehaviorSystem::new(single_leaf());
    let mut store: BTreeMap<EntityId, BehaviorState> = BTreeMap::new();
    let mut actions = RecordingActions::default();

    let cancelled = system.cancel(&START, EntityId(9), &mut store, &mut actions);

    assert_eq!(cancelled, None);
    assert!(actions.cancelled.is_empty());
}

#[test]
fn set_root_switches_tree_and_cancels_running_action() {
    let mut system = BehaviorSystem::new(tree(vec![
        ConditionalLeaf::new(NodeId(1), A, running()).into(),
        ConditionalLeaf::new(NodeId(2), B, running()).into(),
    ]));
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, system.state_for(NodeId(1)).unwrap())]);
    let mut actions = RecordingActions::default();

    system.update(&TickContext::new(0, 0.0), &mut store, &mut actions);
    system
        .set_root(&TickContext::new(1, 1.0), entity, NodeId(2), &mut store, &mut actions)
        .unwrap();
    system.update(&TickContext::new(1, 1.0), &mut store, &mut actions);

    assert_eq!(actions.performed, vec![(0, entity, A), (1, entity, B)]);
    assert_eq!(actions.cancelled, vec![(1, entity, A)]);

    let err = system
        .set_root(&TickContext::new(2, 2.0), entity, NodeId(42), &mut store, &mut actions)
        .unwrap_err();
    assert!(matches!(err, BuildError::UnknownRoot(NodeId(42))));
}

#[test]
fn trace_sink_sees_every_step() {
    let log = SharedTraceLog::new();
    let mut system = BehaviorSystem::new(tree(vec![
        Sequence::new(NodeId(0), vec![NodeId(1), NodeId(2)]).into(),
        TimedLeaf::new(NodeId(1), A, 2.0).into(),
        TimedLeaf::new(NodeId(2), B, 3.0).into(),
    ]))
    .with_trace_sink(log.clone());
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();
    let mut clock = FixedClock::new(1.0);

    for _ in 0..8 {
        let ctx = clock.advance();
        system.update(&ctx, &mut store, &mut actions);
    }

    assert_eq!(log.count(tags::ENTITY_ACTIVATED), 1);
    assert_eq!(log.count(tags::ACTION_START), 2);
    assert_eq!(log.count(tags::ACTION_FINISH), 2);
    assert_eq!(log.count(tags::ACTION_PERFORM), 7);
    assert_eq!(log.count(tags::ACTION_PREEMPT), 2);
    assert_eq!(log.count(tags::MAPPING_SET), 2);
    assert_eq!(log.count(tags::MAPPING_CLEAR), 1);
}

#[derive(Default)]
struct Log {
    ticked: Vec<&'static str>,
    canceled: Vec<&'static str>,
}

struct Endless {
    name: &'static str,
    log: Rc<RefCell<Log>>,
}

impl Action for Endless {
    fn tick(&mut self, _ctx: &TickContext, _entity: EntityId) -> ActionState {
        self.log.borrow_mut().ticked.push(self.name);
        ActionState::Running
    }

    fn cancel(&mut self, _ctx: &TickContext, _entity: EntityId) {
        self.log.borrow_mut().canceled.push(self.name);
    }
}

#[test]
fn drives_the_reference_action_runtime() {
    let log = Rc::new(RefCell::new(Log::default()));
    let walk_log = Rc::clone(&log);
    let idle_log = Rc::clone(&log);
    let mut runtime = ActionRuntime::new()
        .with_action(A, move |_ctx, _entity| {
            Box::new(Endless {
                name: "walk",
                log: Rc::clone(&walk_log),
            })
        })
        .with_action(B, move |_ctx, _entity| {
            Box::new(Endless {
                name: "idle",
                log: Rc::clone(&idle_log),
            })
        });

    let mut system = BehaviorSystem::new(tree(vec![
        Sequence::new(NodeId(0), vec![NodeId(1), NodeId(2)]).into(),
        TimedLeaf::new(NodeId(1), A, 2.0).into(),
        ConditionalLeaf::new(NodeId(2), B, running()).into(),
    ]));
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut clock = FixedClock::new(1.0);

    for _ in 0..5 {
        let ctx = clock.advance();
        system.update(&ctx, &mut store, &mut runtime);
    }

    assert_eq!(runtime.current(entity), Some(B));
    let log = log.borrow();
    assert_eq!(log.ticked, vec!["walk", "walk", "walk", "idle", "idle"]);
    assert_eq!(log.canceled, vec!["walk"]);
}

#[test]
fn deactivation_stops_the_action_in_flight() {
    let log = Rc::new(RefCell::new(Log::default()));
    let walk_log = Rc::clone(&log);
    let mut runtime = ActionRuntime::new().with_action(A, move |_ctx, _entity| {
        Box::new(Endless {
            name: "walk",
            log: Rc::clone(&walk_log),
        })
    });
    let mut system = BehaviorSystem::new(single_leaf());
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut clock = FixedClock::new(1.0);

    system.update(&clock.advance(), &mut store, &mut runtime);
    assert_eq!(runtime.current(entity), Some(A));

    assert!(system.on_entity_deactivated(&clock.advance(), entity, &mut store, &mut runtime));
    assert_eq!(runtime.current(entity), None);
    assert_eq!(log.borrow().canceled, vec!["walk"]);
    assert!(store[&entity].is_idle());

    system.update(&clock.advance(), &mut store, &mut runtime);
    assert_eq!(log.borrow().ticked, vec!["walk"]);
}

#[test]
fn deactivating_an_idle_entity_cancels_nothing() {
    let mut system = BehaviorSystem::new(single_leaf());
    let entity = EntityId(1);
    system.on_entity_activated(&START, entity, behavior());
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();

    assert!(system.on_entity_deactivated(&START, entity, &mut store, &mut actions));
    assert!(actions.cancelled.is_empty());
}

#[test]
fn membership_events_carry_the_current_tick() {
    let log = SharedTraceLog::new();
    let mut system = BehaviorSystem::new(single_leaf()).with_trace_sink(log.clone());
    let entity = EntityId(4);
    let mut store = BTreeMap::from([(entity, BehaviorState::new(NodeId(0)))]);
    let mut actions = RecordingActions::default();

    system.on_entity_activated(&TickContext::new(3, 3.0), entity, behavior());
    system.update(&TickContext::new(3, 3.0), &mut store, &mut actions);
    system.on_entity_deactivated(&TickContext::new(9, 9.0), entity, &mut store, &mut actions);

    let trace = log.snapshot();
    let activated = trace.with_tag(tags::ENTITY_ACTIVATED).next().unwrap();
    let deactivated = trace.with_tag(tags::ENTITY_DEACTIVATED).next().unwrap();
    assert_eq!((activated.tick, activated.a), (3, 4));
    assert_eq!((deactivated.tick, deactivated.a, deactivated.b), (9, 4, u64::from(A.0)));
}
