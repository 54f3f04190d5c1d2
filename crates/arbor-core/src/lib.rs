//! Engine-agnostic primitives shared by the arbor behavior evaluator.
//!
//! Everything here is a collaborator boundary: ids, the action result vocabulary, the tick
//! clock, entity aspects and component storage. The tree itself lives in `arbor-bt`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod action;
pub mod entity;
pub mod tick;
pub mod world;

pub use action::{
    Action, ActionCatalog, ActionId, ActionOutcome, ActionRuntime, ActionState, ActionSystem,
};
pub use entity::{Aspect, ComponentKind, EntityId};
pub use tick::{FixedClock, TickContext};
pub use world::ComponentStore;
