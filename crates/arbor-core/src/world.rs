use std::collections::{BTreeMap, HashMap};

use crate::EntityId;

/// Entity-storage boundary: component lookup by entity id.
///
/// The core does not prescribe how components are stored; an ECS adapter implements this for
/// each component type it exposes to the evaluator.
pub trait ComponentStore<C> {
    fn component(&self, entity: EntityId) -> Option<&C>;

    fn component_mut(&mut self, entity: EntityId) -> Option<&mut C>;
}

impl<C> ComponentStore<C> for BTreeMap<EntityId, C> {
    fn component(&self, entity: EntityId) -> Option<&C> {
        self.get(&entity)
    }

    fn component_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.get_mut(&entity)
    }
}

impl<C> ComponentStore<C> for HashMap<EntityId, C> {
    fn component(&self, entity: EntityId) -> Option<&C> {
        self.get(&entity)
    }

    fn component_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        self.get_mut(&entity)
    }
}
