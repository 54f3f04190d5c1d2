//! Build trees from serialized node attributes.
//!
//! A [`TreeSpec`] lists nodes as `{ id, kind, ...attributes }`. Each `kind` is resolved through
//! a [`NodeBuilderRegistry`], which turns the remaining attributes into a [`BehaviorNode`].
//! Conditions are referenced by name and resolved through a [`ConditionRegistry`]; action ids
//! may be checked against an [`ActionCatalog`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use arbor_core::{ActionCatalog, ActionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::condition::{ConditionRef, ConditionRegistry};
use crate::error::{BuildError, Result};
use crate::nodes::{ConditionalLeaf, ConditionalSelection, SelectionEntry, Sequence, TimedLeaf};
use crate::tree::TreeAssembly;
use crate::{BehaviorConfig, BehaviorNode, BehaviorTree, NodeId};

/// Serialized form of a whole tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    /// Named entry points, e.g. `guard: 1`.
    #[serde(default)]
    pub roots: BTreeMap<String, NodeId>,

    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

/// Serialized form of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl TreeSpec {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load from disk; `.json` files are parsed as JSON, everything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }
}

/// What a node builder can see besides its own spec.
pub struct BuildContext<'a> {
    conditions: &'a ConditionRegistry,
    config: &'a BehaviorConfig,
}

impl<'a> BuildContext<'a> {
    pub fn config(&self) -> &'a BehaviorConfig {
        self.config
    }

    pub fn condition(&self, node: NodeId, name: &str) -> Result<ConditionRef> {
        self.conditions
            .get(name)
            .ok_or_else(|| BuildError::UnknownCondition {
                node,
                name: name.to_string(),
            })
    }

    /// Deserialize the node's attributes into a typed struct.
    pub fn attributes<T: DeserializeOwned>(&self, spec: &NodeSpec) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(spec.attributes.clone())).map_err(
            |source| BuildError::InvalidAttributes {
                node: spec.id,
                kind: spec.kind.clone(),
                source,
            },
        )
    }
}

type NodeBuildFn = Box<dyn Fn(&NodeSpec, &BuildContext<'_>) -> Result<BehaviorNode> + Send + Sync>;

/// Builder function per node kind.
pub struct NodeBuilderRegistry {
    builders: BTreeMap<String, NodeBuildFn>,
}

impl NodeBuilderRegistry {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry with `sequence`, `conditional_selection`, `conditional_leaf` and `timed_leaf`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register("sequence", build_sequence)
            .register("conditional_selection", build_conditional_selection)
            .register("conditional_leaf", build_conditional_leaf)
            .register("timed_leaf", build_timed_leaf);
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, build: F) -> &mut Self
    where
        F: Fn(&NodeSpec, &BuildContext<'_>) -> Result<BehaviorNode> + Send + Sync + 'static,
    {
        self.builders.insert(kind.into(), Box::new(build));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn build(&self, spec: &NodeSpec, ctx: &BuildContext<'_>) -> Result<BehaviorNode> {
        let build = self
            .builders
            .get(&spec.kind)
            .ok_or_else(|| BuildError::UnknownKind {
                node: spec.id,
                kind: spec.kind.clone(),
            })?;
        build(spec, ctx)
    }
}

impl Default for NodeBuilderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for NodeBuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.builders.keys()).finish()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SequenceAttributes {
    children: Vec<NodeId>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SelectionAttributes {
    entries: Vec<EntryAttributes>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryAttributes {
    condition: String,
    child: NodeId,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionalLeafAttributes {
    action: ActionId,
    condition: String,
    #[serde(default)]
    guard_entry: Option<bool>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TimedLeafAttributes {
    action: ActionId,
    duration: f64,
}

fn build_sequence(spec: &NodeSpec, ctx: &BuildContext<'_>) -> Result<BehaviorNode> {
    let attrs: SequenceAttributes = ctx.attributes(spec)?;
    Ok(Sequence::new(spec.id, attrs.children).into())
}

fn build_conditional_selection(spec: &NodeSpec, ctx: &BuildContext<'_>) -> Result<BehaviorNode> {
    let attrs: SelectionAttributes = ctx.attributes(spec)?;
    let entries = attrs
        .entries
        .into_iter()
        .map(|entry| {
            let condition = ctx.condition(spec.id, &entry.condition)?;
            Ok(SelectionEntry::new(condition, entry.child))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ConditionalSelection::new(spec.id, entries).into())
}

fn build_conditional_leaf(spec: &NodeSpec, ctx: &BuildContext<'_>) -> Result<BehaviorNode> {
    let attrs: ConditionalLeafAttributes = ctx.attributes(spec)?;
    let condition = ctx.condition(spec.id, &attrs.condition)?;
    let guard_entry = attrs.guard_entry.unwrap_or(ctx.config().guard_entry);
    Ok(ConditionalLeaf::new(spec.id, attrs.action, condition)
        .with_guard_entry(guard_entry)
        .into())
}

fn build_timed_leaf(spec: &NodeSpec, ctx: &BuildContext<'_>) -> Result<BehaviorNode> {
    let attrs: TimedLeafAttributes = ctx.attributes(spec)?;
    Ok(TimedLeaf::new(spec.id, attrs.action, attrs.duration).into())
}

/// Turns a [`TreeSpec`] into a validated [`BehaviorTree`].
pub struct TreeBuilder<'a> {
    nodes: NodeBuilderRegistry,
    conditions: ConditionRegistry,
    config: BehaviorConfig,
    catalog: Option<&'a dyn ActionCatalog>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(conditions: ConditionRegistry) -> Self {
        Self {
            nodes: NodeBuilderRegistry::with_defaults(),
            conditions,
            config: BehaviorConfig::default(),
            catalog: None,
        }
    }

    pub fn with_config(mut self, config: BehaviorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_node_builders(mut self, nodes: NodeBuilderRegistry) -> Self {
        self.nodes = nodes;
        self
    }

    /// Reject leaves whose action id is not in `catalog`.
    pub fn with_catalog(mut self, catalog: &'a dyn ActionCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn node_builders_mut(&mut self) -> &mut NodeBuilderRegistry {
        &mut self.nodes
    }

    pub fn build(&self, spec: &TreeSpec) -> Result<BehaviorTree> {
        let ctx = BuildContext {
            conditions: &self.conditions,
            config: &self.config,
        };
        let nodes = spec
            .nodes
            .iter()
            .map(|node| self.nodes.build(node, &ctx))
            .collect::<Result<Vec<_>>>()?;

        let tree = TreeAssembly::new(&self.config).finish(nodes, spec.roots.clone(), self.catalog)?;
        tracing::info!(nodes = tree.len(), roots = spec.roots.len(), "behavior tree built");
        Ok(tree)
    }
}
