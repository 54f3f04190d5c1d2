//! Configuration errors raised while building trees.

use std::path::PathBuf;

use arbor_core::ActionId;
use thiserror::Error;

use crate::NodeId;

/// Fatal, build-time configuration error. No partially built tree is ever returned.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid tree YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid tree JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{node}: unknown node kind `{kind}`")]
    UnknownKind { node: NodeId, kind: String },

    #[error("{node}: invalid `{kind}` attributes: {source}")]
    InvalidAttributes {
        node: NodeId,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    #[error("{parent}: child {child} is not defined")]
    UnresolvedNode { parent: NodeId, child: NodeId },

    #[error("root `{name}` refers to undefined {node}")]
    UnresolvedRoot { name: String, node: NodeId },

    #[error("{0} is not part of the tree")]
    UnknownRoot(NodeId),

    #[error("no root named `{0}`")]
    UnknownRootName(String),

    #[error("{node}: {action} is not registered")]
    UnresolvedAction { node: NodeId, action: ActionId },

    #[error("{node}: unknown condition `{name}`")]
    UnknownCondition { node: NodeId, name: String },

    #[error("{parent}: sequence lists child {child} more than once")]
    RepeatedChild { parent: NodeId, child: NodeId },

    #[error("{0}: composite node has no children")]
    EmptyComposite(NodeId),

    #[error("{node}: duration must be a finite, non-negative number (got {duration})")]
    InvalidDuration { node: NodeId, duration: f64 },

    #[error("cycle detected through {0}")]
    Cycle(NodeId),

    #[error("{node}: tree is deeper than the configured maximum of {max}")]
    TooDeep { node: NodeId, max: usize },
}

pub type Result<T> = std::result::Result<T, BuildError>;
