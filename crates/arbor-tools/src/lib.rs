//! Tooling primitives for the arbor behavior evaluator.
//!
//! Trace events are plain data recorded during simulation and rendered later by tooling.
//! Engine-specific inspectors belong in adapter crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{
    tags, NullTraceSink, SharedTraceLog, TraceEvent, TraceLog, TraceSink, TracingSink,
    VecTraceSink,
};
