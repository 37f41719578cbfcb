//! The live entity store.
//!
//! [`Store`] owns all entities, their components, shared components and
//! dynamic buffers, plus the archetype layout table. Every mutation applied
//! here takes effect immediately; deferred mutation goes through
//! [`CommandBuffer`](crate::CommandBuffer) and lands here at playback.

use std::any::Any;
use std::collections::HashMap;

use crate::archetype::{ArchetypeHandle, ArchetypeLayout};
use crate::buffer::{BufferElement, BufferObject, TypedBuffer};
use crate::component::{Component, ComponentInfo, ComponentObject, ComponentTypeId};
use crate::entity::{Entity, EntityAllocator};
use crate::error::StoreError;

/// Everything attached to a single entity.
#[derive(Debug, Clone, Default)]
struct EntityRecord {
    components: HashMap<ComponentTypeId, Box<dyn ComponentObject>>,
    shared: HashMap<ComponentTypeId, Box<dyn ComponentObject>>,
    buffers: HashMap<ComponentTypeId, Box<dyn BufferObject>>,
}

/// A container of entities and their attached data.
#[derive(Debug, Default)]
pub struct Store {
    allocator: EntityAllocator,
    entities: HashMap<Entity, EntityRecord>,
    archetypes: Vec<ArchetypeLayout>,
}

impl Store {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Entities --

    /// Creates a new empty entity.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.entities.insert(entity, EntityRecord::default());
        entity
    }

    /// Creates an entity pre-populated with default-valued instances of every
    /// component in the archetype's layout.
    pub fn create_entity_from_archetype(
        &mut self,
        handle: ArchetypeHandle,
    ) -> Result<Entity, StoreError> {
        let layout = self
            .archetypes
            .get(handle.index())
            .ok_or(StoreError::UnknownArchetype(handle))?;
        let mut record = EntityRecord::default();
        for info in layout.components() {
            record
                .components
                .insert(info.type_id(), info.instantiate_default());
        }
        let entity = self.allocator.allocate();
        self.entities.insert(entity, record);
        Ok(entity)
    }

    /// Creates a deep copy of `template`: every component, shared component
    /// and buffer is cloned onto a fresh entity.
    pub fn instantiate(&mut self, template: Entity) -> Result<Entity, StoreError> {
        let record = self
            .entities
            .get(&template)
            .ok_or(StoreError::EntityNotFound(template))?
            .clone();
        let entity = self.allocator.allocate();
        self.entities.insert(entity, record);
        Ok(entity)
    }

    /// Destroys an entity and everything attached to it.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.entities
            .remove(&entity)
            .map(|_| ())
            .ok_or(StoreError::EntityNotFound(entity))
    }

    /// Returns `true` if the entity is alive in this store.
    #[must_use]
    pub fn exists(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // -- Components --

    /// Attaches `value` to the entity, replacing any existing component of
    /// the same type.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.add_boxed(entity, Box::new(value))
    }

    /// Overwrites an existing component. Unlike [`Store::add_component`] this
    /// fails if the entity does not already carry the component.
    pub fn set_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.set_boxed(entity, Box::new(value))
    }

    /// Removes a component from the entity.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), StoreError> {
        self.remove_by_id(entity, T::component_type_id(), T::type_name())
    }

    /// Returns `true` if the entity is alive and carries the component.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|record| record.components.contains_key(&T::component_type_id()))
    }

    /// Borrows a component from the entity.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        let record = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .components
            .get(&T::component_type_id())
            .and_then(|value| value.as_any().downcast_ref::<T>())
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    /// Mutably borrows a component from the entity.
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .components
            .get_mut(&T::component_type_id())
            .and_then(|value| value.as_any_mut().downcast_mut::<T>())
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    /// Attaches a shared component, replacing any existing one of the same
    /// type. Shared components live in their own namespace beside regular
    /// components.
    pub fn add_shared_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.add_shared_boxed(entity, Box::new(value))
    }

    /// Borrows a shared component from the entity.
    pub fn get_shared_component<T: Component>(&self, entity: Entity) -> Result<&T, StoreError> {
        let record = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .shared
            .get(&T::component_type_id())
            .and_then(|value| value.as_any().downcast_ref::<T>())
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    // -- Buffers --

    /// Ensures the entity carries a buffer of `T` and returns it mutably.
    /// Existing elements are kept; calling this twice is not destructive.
    pub fn get_or_create_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut Vec<T>, StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let buffer = record
            .buffers
            .entry(T::element_type_id())
            .or_insert_with(|| Box::new(TypedBuffer::<T>::new()));
        buffer
            .as_any_mut()
            .downcast_mut::<TypedBuffer<T>>()
            .map(TypedBuffer::elements_mut)
            .ok_or(StoreError::ElementTypeMismatch {
                expected: T::type_name(),
            })
    }

    /// Alias of [`Store::get_or_create_buffer`] matching the verb used when
    /// recording into command buffers.
    pub fn add_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut Vec<T>, StoreError> {
        self.get_or_create_buffer::<T>(entity)
    }

    /// Appends one element, creating the buffer if the entity lacks it.
    pub fn append_to_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
        element: T,
    ) -> Result<(), StoreError> {
        self.get_or_create_buffer::<T>(entity)?.push(element);
        Ok(())
    }

    /// Returns `true` if the entity is alive and carries a buffer of `T`.
    #[must_use]
    pub fn has_buffer<T: BufferElement>(&self, entity: Entity) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|record| record.buffers.contains_key(&T::element_type_id()))
    }

    /// Borrows the entity's buffer of `T`.
    pub fn get_buffer<T: BufferElement>(&self, entity: Entity) -> Result<&[T], StoreError> {
        let record = self
            .entities
            .get(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .buffers
            .get(&T::element_type_id())
            .and_then(|buffer| buffer.as_any().downcast_ref::<TypedBuffer<T>>())
            .map(TypedBuffer::elements)
            .ok_or(StoreError::BufferNotFound {
                entity,
                element: T::type_name(),
            })
    }

    /// Mutably borrows the entity's buffer of `T`.
    pub fn get_buffer_mut<T: BufferElement>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut Vec<T>, StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .buffers
            .get_mut(&T::element_type_id())
            .and_then(|buffer| buffer.as_any_mut().downcast_mut::<TypedBuffer<T>>())
            .map(TypedBuffer::elements_mut)
            .ok_or(StoreError::BufferNotFound {
                entity,
                element: T::type_name(),
            })
    }

    // -- Archetypes --

    /// Builds an archetype layout from a component list and returns a handle
    /// to it. Rejects empty lists.
    pub fn build_archetype(
        &mut self,
        components: Vec<ComponentInfo>,
    ) -> Result<ArchetypeHandle, StoreError> {
        let layout = ArchetypeLayout::new(components)?;
        let handle = ArchetypeHandle(self.archetypes.len() as u32);
        self.archetypes.push(layout);
        Ok(handle)
    }

    /// Looks up the layout behind a handle.
    pub fn layout(&self, handle: ArchetypeHandle) -> Result<&ArchetypeLayout, StoreError> {
        self.archetypes
            .get(handle.index())
            .ok_or(StoreError::UnknownArchetype(handle))
    }

    /// Number of archetype layouts built so far.
    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // -- Type-erased mutation (command playback) --

    pub(crate) fn add_boxed(
        &mut self,
        entity: Entity,
        value: Box<dyn ComponentObject>,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record.components.insert(value.type_id_dyn(), value);
        Ok(())
    }

    pub(crate) fn set_boxed(
        &mut self,
        entity: Entity,
        value: Box<dyn ComponentObject>,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        let type_id = value.type_id_dyn();
        if !record.components.contains_key(&type_id) {
            return Err(StoreError::ComponentNotFound {
                entity,
                component: value.type_name_dyn(),
            });
        }
        record.components.insert(type_id, value);
        Ok(())
    }

    pub(crate) fn remove_by_id(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        type_name: &'static str,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .components
            .remove(&type_id)
            .map(|_| ())
            .ok_or(StoreError::ComponentNotFound {
                entity,
                component: type_name,
            })
    }

    pub(crate) fn add_shared_boxed(
        &mut self,
        entity: Entity,
        value: Box<dyn ComponentObject>,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record.shared.insert(value.type_id_dyn(), value);
        Ok(())
    }

    /// Merges a recorded buffer into the entity: inserts it wholesale when
    /// the entity has no buffer of that element type, otherwise appends the
    /// recorded elements to the existing buffer.
    pub(crate) fn merge_buffer_boxed(
        &mut self,
        entity: Entity,
        mut incoming: Box<dyn BufferObject>,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        match record.buffers.get_mut(&incoming.element_type_id()) {
            Some(existing) => {
                for element in incoming.drain_erased() {
                    existing.push_erased(element)?;
                }
                Ok(())
            }
            None => {
                record.buffers.insert(incoming.element_type_id(), incoming);
                Ok(())
            }
        }
    }

    pub(crate) fn append_erased(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        element: Box<dyn Any + Send + Sync>,
        new_buffer: fn() -> Box<dyn BufferObject>,
    ) -> Result<(), StoreError> {
        let record = self
            .entities
            .get_mut(&entity)
            .ok_or(StoreError::EntityNotFound(entity))?;
        record
            .buffers
            .entry(type_id)
            .or_insert_with(new_buffer)
            .push_erased(element)
    }
}
