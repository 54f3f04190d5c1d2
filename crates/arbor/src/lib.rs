//! Umbrella crate that re-exports the `arbor-*` building blocks.
//!
//! Enable `bt` (on by default) for the evaluator, or depend on `core` alone to implement an
//! action subsystem or an entity store against the shared boundary types.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use arbor_core as core;

#[cfg(feature = "tools")]
#[cfg_attr(docsrs, doc(cfg(feature = "tools")))]
pub use arbor_tools as tools;

#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub use arbor_bt as bt;

/// Common imports for driving trees.
#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub mod prelude {
    pub use arbor_bt::{
        BehaviorState, BehaviorSystem, BehaviorTree, ConditionRegistry, NodeId, TreeBuilder,
        TreeSpec,
    };
    pub use arbor_core::{
        ActionId, ActionState, ActionSystem, Aspect, ComponentKind, EntityId, TickContext,
    };
}
