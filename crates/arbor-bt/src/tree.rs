//! Node arena shared by all entities.

use std::collections::{BTreeMap, BTreeSet};

use arbor_core::{ActionCatalog, ActionState, EntityId, TickContext};
use arbor_tools::{NullTraceSink, TraceSink};

use crate::error::{BuildError, Result};
use crate::node::{BehaviorNode, EvalContext, NodeId, NodeKind};
use crate::{BehaviorConfig, BehaviorState};

/// Immutable, validated set of nodes indexed by id, plus named entry points.
///
/// Only constructible through validation: every child id resolves, sequences list each child
/// once, there are no cycles and no path is deeper than the configured maximum.
#[derive(Debug, Default)]
pub struct BehaviorTree {
    nodes: BTreeMap<NodeId, BehaviorNode>,
    roots: BTreeMap<String, NodeId>,
}

impl BehaviorTree {
    /// Validate programmatically built nodes with the default configuration.
    pub fn from_nodes(nodes: impl IntoIterator<Item = BehaviorNode>) -> Result<Self> {
        TreeAssembly::new(&BehaviorConfig::default()).finish(nodes, BTreeMap::new(), None)
    }

    pub fn get(&self, id: NodeId) -> Option<&BehaviorNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BehaviorNode> {
        self.nodes.values()
    }

    /// Named entry point declared in the tree configuration.
    pub fn root(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.roots.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Fresh behavior state for `root`, rejecting ids outside the arena.
    pub fn state_for(&self, root: NodeId) -> Result<BehaviorState> {
        if !self.contains(root) {
            return Err(BuildError::UnknownRoot(root));
        }
        Ok(BehaviorState::new(root))
    }

    /// Fresh behavior state for a named root.
    pub fn state_for_named(&self, name: &str) -> Result<BehaviorState> {
        let root = self
            .root(name)
            .ok_or_else(|| BuildError::UnknownRootName(name.to_string()))?;
        self.state_for(root)
    }

    /// Evaluate `entity` from its root once, without tracing.
    pub fn next_action(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        tick: &TickContext,
    ) -> ActionState {
        self.next_action_traced(entity, state, tick, &mut NullTraceSink)
    }

    pub fn next_action_traced(
        &self,
        entity: EntityId,
        state: &mut BehaviorState,
        tick: &TickContext,
        trace: &mut dyn TraceSink,
    ) -> ActionState {
        let root = state.root();
        EvalContext::new(self, tick, trace).evaluate(root, entity, state)
    }
}

/// Validation pass shared by programmatic and configured trees.
pub(crate) struct TreeAssembly<'c> {
    config: &'c BehaviorConfig,
}

#[derive(Clone, Copy)]
enum Mark {
    Visiting,
    Done(usize),
}

impl<'c> TreeAssembly<'c> {
    pub(crate) fn new(config: &'c BehaviorConfig) -> Self {
        Self { config }
    }

    pub(crate) fn finish(
        &self,
        nodes: impl IntoIterator<Item = BehaviorNode>,
        roots: BTreeMap<String, NodeId>,
        catalog: Option<&dyn ActionCatalog>,
    ) -> Result<BehaviorTree> {
        let mut arena = BTreeMap::new();
        for node in nodes {
            let id = node.id();
            if arena.insert(id, node).is_some() {
                return Err(BuildError::DuplicateNode(id));
            }
        }

        for node in arena.values() {
            self.check_node(node, &arena, catalog)?;
        }

        for (name, id) in &roots {
            if !arena.contains_key(id) {
                return Err(BuildError::UnresolvedRoot {
                    name: name.clone(),
                    node: *id,
                });
            }
        }

        let mut marks = BTreeMap::new();
        for id in arena.keys() {
            self.height(*id, 1, &arena, &mut marks)?;
        }

        Ok(BehaviorTree {
            nodes: arena,
            roots,
        })
    }

    fn check_node(
        &self,
        node: &BehaviorNode,
        arena: &BTreeMap<NodeId, BehaviorNode>,
        catalog: Option<&dyn ActionCatalog>,
    ) -> Result<()> {
        let id = node.id();
        if let BehaviorNode::TimedLeaf(leaf) = node {
            let duration = leaf.duration();
            if !duration.is_finite() || duration < 0.0 {
                return Err(BuildError::InvalidDuration { node: id, duration });
            }
        }

        if let (Some(action), Some(catalog)) = (node.action(), catalog) {
            if !catalog.contains_action(action) {
                return Err(BuildError::UnresolvedAction { node: id, action });
            }
        }

        let children = node.children();
        if !node.kind().is_leaf() && children.is_empty() {
            return Err(BuildError::EmptyComposite(id));
        }
        let mut seen = BTreeSet::new();
        for child in children {
            if !arena.contains_key(&child) {
                return Err(BuildError::UnresolvedNode { parent: id, child });
            }
            // Sequences resume at the position of their cached child id.
            if node.kind() == NodeKind::Sequence && !seen.insert(child) {
                return Err(BuildError::RepeatedChild { parent: id, child });
            }
        }
        Ok(())
    }

    fn height(
        &self,
        id: NodeId,
        depth: usize,
        arena: &BTreeMap<NodeId, BehaviorNode>,
        marks: &mut BTreeMap<NodeId, Mark>,
    ) -> Result<usize> {
        let max = self.config.max_depth;
        if depth > max {
            return Err(BuildError::TooDeep { node: id, max });
        }
        match marks.get(&id) {
            Some(Mark::Visiting) => return Err(BuildError::Cycle(id)),
            Some(Mark::Done(height)) => {
                if depth + height - 1 > max {
                    return Err(BuildError::TooDeep { node: id, max });
                }
                return Ok(*height);
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        let mut height = 1;
        if let Some(node) = arena.get(&id) {
            for child in node.children() {
                height = height.max(1 + self.height(child, depth + 1, arena, marks)?);
            }
        }
        marks.insert(id, Mark::Done(height));
        Ok(height)
    }
}
