//! Entity and component storage which systems iterate inside their
//! step bodies. The scheduler itself never looks at it.
//!
//! Each component type gets a small consecutive `ComponentId`, used
//! as an index into a vector of component managers rather than a
//! hash map. Every manager sits behind its own `RwLock`, so systems
//! touching different component types never contend.

mod sparse_set;

pub use sparse_set::SparseSet;

use crate::error::StorageError;
use crate::mappings::Mappings;
use bit_set::BitSet;
use hashbrown::HashMap;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::{Any, TypeId};
use std::iter;

/// An entity: an identifier which components are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub u64);

impl Entity {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// ID of a component type within one `EntitySpace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ComponentId(pub usize);

impl From<usize> for ComponentId {
    fn from(x: usize) -> Self {
        Self(x)
    }
}

pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}

/// A type-erased component manager.
trait Manager: Send + Sync {
    fn remove_entity(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> Manager for RwLock<SparseSet<C>> {
    fn remove_entity(&mut self, entity: Entity) {
        self.get_mut().remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

trait OrExtend<T> {
    fn get_mut_or_extend(&mut self, index: usize) -> &mut T;
}

impl<T: Default> OrExtend<T> for Vec<T> {
    fn get_mut_or_extend(&mut self, index: usize) -> &mut T {
        if index >= self.len() {
            self.extend(iter::repeat_with(T::default).take(index - self.len() + 1));
        }
        &mut self[index]
    }
}

/// Stores entities and their components.
///
/// Structural changes (creating and destroying entities or components)
/// need `&mut self`. Component values are reached through `&self`
/// via per-type locks, so a shared `EntitySpace` can be iterated
/// by several systems at once.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct EntitySpace {
    /// Component mask of every live entity, indexed by `ComponentId`.
    masks: HashMap<Entity, BitSet>,
    /// Component managers, indexed by `ComponentId`.
    #[derivative(Debug = "ignore")]
    managers: Vec<Option<Box<dyn Manager>>>,
    component_ids: Mappings<TypeId, ComponentId>,
    next_id: u64,
}

impl EntitySpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a space with room for `component_types` managers.
    pub fn with_capacity(component_types: usize) -> Self {
        Self {
            managers: Vec::with_capacity(component_types),
            ..Self::default()
        }
    }

    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity(self.next_id);
        self.next_id += 1;
        self.masks.insert(entity, BitSet::new());
        entity
    }

    /// Destroys an entity along with all its components.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), StorageError> {
        let mask = self
            .masks
            .remove(&entity)
            .ok_or(StorageError::UnknownEntity(entity))?;

        for component in mask.iter() {
            if let Some(Some(manager)) = self.managers.get_mut(component) {
                manager.remove_entity(entity);
            }
        }
        Ok(())
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.masks.contains_key(&entity)
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Returns the ID of component type `C`, allocating it and its
    /// manager if needed.
    pub fn register<C: Component>(&mut self) -> ComponentId {
        let id = self.component_ids.get_or_alloc(TypeId::of::<C>());
        let slot = self.managers.get_mut_or_extend(id.0);
        if slot.is_none() {
            *slot = Some(Box::new(RwLock::new(SparseSet::<C>::new())));
        }
        id
    }

    pub fn component_id<C: Component>(&self) -> Option<ComponentId> {
        self.component_ids.get(&TypeId::of::<C>())
    }

    /// Attaches `component` to `entity`, returning the component
    /// it replaced, if any.
    pub fn create_component<C: Component>(
        &mut self,
        entity: Entity,
        component: C,
    ) -> Result<Option<C>, StorageError> {
        if !self.contains(entity) {
            return Err(StorageError::UnknownEntity(entity));
        }

        let id = self.register::<C>();
        if let Some(mask) = self.masks.get_mut(&entity) {
            mask.insert(id.0);
        }

        let replaced = self
            .manager_mut::<C>(id)
            .and_then(|set| set.get_mut().insert(entity, component));
        Ok(replaced)
    }

    /// Detaches and returns the `C` component of `entity`.
    pub fn destroy_component<C: Component>(&mut self, entity: Entity) -> Option<C> {
        let id = self.component_id::<C>()?;
        if let Some(mask) = self.masks.get_mut(&entity) {
            mask.remove(id.0);
        }
        self.manager_mut::<C>(id)?.get_mut().remove(entity)
    }

    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        match (self.component_id::<C>(), self.masks.get(&entity)) {
            (Some(id), Some(mask)) => mask.contains(id.0),
            _ => false,
        }
    }

    /// Read access to every `C` component. `None` if no `C` was ever stored.
    pub fn components<C: Component>(&self) -> Option<RwLockReadGuard<'_, SparseSet<C>>> {
        self.manager::<C>().map(|set| set.read())
    }

    /// Write access to every `C` component. `None` if no `C` was ever stored.
    pub fn components_mut<C: Component>(&self) -> Option<RwLockWriteGuard<'_, SparseSet<C>>> {
        self.manager::<C>().map(|set| set.write())
    }

    pub fn get_component<C: Component>(
        &self,
        entity: Entity,
    ) -> Option<MappedRwLockReadGuard<'_, C>> {
        RwLockReadGuard::try_map(self.components::<C>()?, |set| set.get(entity)).ok()
    }

    /// Calls `f` with every `C` component.
    pub fn for_each<C: Component>(&self, mut f: impl FnMut(Entity, &C)) {
        if let Some(set) = self.components::<C>() {
            for (entity, component) in set.iter() {
                f(entity, component);
            }
        }
    }

    /// Calls `f` with every `C` component, in place.
    pub fn for_each_mut<C: Component>(&self, mut f: impl FnMut(Entity, &mut C)) {
        if let Some(mut set) = self.components_mut::<C>() {
            for (entity, component) in set.iter_mut() {
                f(entity, component);
            }
        }
    }

    fn manager<C: Component>(&self) -> Option<&RwLock<SparseSet<C>>> {
        let id = self.component_id::<C>()?;
        self.managers
            .get(id.0)?
            .as_ref()?
            .as_any()
            .downcast_ref()
    }

    fn manager_mut<C: Component>(&mut self, id: ComponentId) -> Option<&mut RwLock<SparseSet<C>>> {
        self.managers
            .get_mut(id.0)?
            .as_mut()?
            .as_any_mut()
            .downcast_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position(f32, f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity(f32, f32);

    #[test]
    fn components_round_trip() {
        let mut space = EntitySpace::new();
        let e1 = space.create_entity();
        let e2 = space.create_entity();

        space.create_component(e1, Position(1.0, 1.0)).unwrap();
        space.create_component(e2, Position(0.0, 1.0)).unwrap();
        space.create_component(e2, Velocity(2.0, 0.0)).unwrap();

        assert!(space.has_component::<Position>(e1));
        assert!(!space.has_component::<Velocity>(e1));
        assert_eq!(*space.get_component::<Velocity>(e2).unwrap(), Velocity(2.0, 0.0));
        assert_eq!(space.component_id::<Position>(), Some(ComponentId(0)));
        assert_eq!(space.component_id::<Velocity>(), Some(ComponentId(1)));
    }

    #[test]
    fn for_each_mut_updates_in_place() {
        let mut space = EntitySpace::new();
        for i in 0..4 {
            let entity = space.create_entity();
            space.create_component(entity, Position(i as f32, 0.0)).unwrap();
        }

        space.for_each_mut::<Position>(|_, position| position.1 += 1.0);

        let mut total = 0.0;
        space.for_each::<Position>(|_, position| total += position.0 + position.1);
        assert_eq!(total, 0.0 + 1.0 + 2.0 + 3.0 + 4.0);
    }

    #[test]
    fn destroy_entity_removes_components() {
        let mut space = EntitySpace::new();
        let e1 = space.create_entity();
        let e2 = space.create_entity();
        space.create_component(e1, Position(1.0, 1.0)).unwrap();
        space.create_component(e2, Position(2.0, 2.0)).unwrap();

        space.destroy_entity(e1).unwrap();

        assert!(!space.contains(e1));
        assert_eq!(space.len(), 1);
        assert_eq!(space.components::<Position>().unwrap().len(), 1);
        assert_eq!(
            space.destroy_entity(e1),
            Err(StorageError::UnknownEntity(e1))
        );
    }

    #[test]
    fn destroy_component() {
        let mut space = EntitySpace::new();
        let entity = space.create_entity();
        space.create_component(entity, Velocity(1.0, 0.0)).unwrap();

        assert_eq!(space.destroy_component::<Velocity>(entity), Some(Velocity(1.0, 0.0)));
        assert!(!space.has_component::<Velocity>(entity));
        assert_eq!(space.destroy_component::<Position>(entity), None);
    }

    #[test]
    fn unknown_entity_rejected() {
        let mut space = EntitySpace::new();
        let ghost = Entity(42);

        assert_eq!(
            space.create_component(ghost, Position(0.0, 0.0)),
            Err(StorageError::UnknownEntity(ghost))
        );
        assert!(space.component_id::<Position>().is_none());
        assert!(space.components::<Position>().is_none());
    }

    #[test]
    fn check_traits() {
        static_assertions::assert_impl_all!(EntitySpace: Send, Sync);
    }
}
