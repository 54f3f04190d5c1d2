//! Resumable behavior-tree evaluator built on `arbor-core`.
//!
//! Trees are immutable arenas of [`BehaviorNode`]s shared by every entity. Each entity carries
//! a [`BehaviorState`] whose `node_mapping` caches the decision path, so a running behavior is
//! resumed in time proportional to the tree depth instead of being re-decided every tick.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod builder;
pub mod condition;
pub mod config;
pub mod error;
pub mod node;
pub mod nodes;
pub mod state;
pub mod system;
pub mod tree;

pub use builder::{BuildContext, NodeBuilderRegistry, NodeSpec, TreeBuilder, TreeSpec};
pub use condition::{while_true, Always, BCondition, ConditionRef, ConditionRegistry};
pub use config::BehaviorConfig;
pub use error::{BuildError, Result};
pub use node::{BehaviorNode, EvalContext, NodeId, NodeKind};
pub use nodes::{
    ConditionalLeaf, ConditionalSelection, SelectionEntry, Sequence, TimedLeaf, TIME_EPSILON,
};
pub use state::{ActiveLeaf, BehaviorState};
pub use system::BehaviorSystem;
pub use tree::BehaviorTree;
