//! Concurrent command recording across worker slots.
//!
//! [`ParallelCommandBuffer`] fronts one [`CommandBuffer`] per worker slot so
//! threads can record through a shared reference. Each slot tags its pending
//! ids, keeping forward references minted on different threads distinct.
//! Playback replays slots in index order.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::archetype::ArchetypeHandle;
use crate::buffer::BufferElement;
use crate::command::CommandBuffer;
use crate::component::Component;
use crate::entity::Entity;
use crate::error::StoreError;
use crate::store::Store;

/// A set of per-slot command buffers recordable from multiple threads.
#[derive(Debug)]
pub struct ParallelCommandBuffer {
    slots: Vec<Mutex<CommandBuffer>>,
}

impl ParallelCommandBuffer {
    /// Creates a buffer with `slots` worker slots.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            slots: (0..slots)
                // Tag 0 is reserved for plain buffers.
                .map(|i| Mutex::new(CommandBuffer::for_slot(i as u32 + 1)))
                .collect(),
        }
    }

    /// Number of worker slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, slot: usize) -> Result<std::sync::MutexGuard<'_, CommandBuffer>, StoreError> {
        let lock = self.slots.get(slot).ok_or(StoreError::InvalidSlot {
            slot,
            slots: self.slots.len(),
        })?;
        // A poisoned slot still holds a coherent command list.
        Ok(lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    // -- Recording --

    /// Records entity creation on `slot` and returns the pending id.
    pub fn create_entity(&self, slot: usize) -> Result<Entity, StoreError> {
        Ok(self.slot(slot)?.create_entity())
    }

    /// Records creation from an archetype on `slot`.
    pub fn create_entity_from_archetype(
        &self,
        slot: usize,
        handle: ArchetypeHandle,
    ) -> Result<Entity, StoreError> {
        Ok(self.slot(slot)?.create_entity_from_archetype(handle))
    }

    /// Records a deep copy of `template` on `slot`.
    pub fn instantiate(&self, slot: usize, template: Entity) -> Result<Entity, StoreError> {
        Ok(self.slot(slot)?.instantiate(template))
    }

    /// Records entity destruction on `slot`.
    pub fn destroy(&self, slot: usize, entity: Entity) -> Result<(), StoreError> {
        self.slot(slot)?.destroy(entity);
        Ok(())
    }

    /// Records attaching `value` on `slot`.
    pub fn add_component<T: Component>(
        &self,
        slot: usize,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.add_component(entity, value);
        Ok(())
    }

    /// Records overwriting an existing component on `slot`.
    pub fn set_component<T: Component>(
        &self,
        slot: usize,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.set_component(entity, value);
        Ok(())
    }

    /// Records removing a component on `slot`.
    pub fn remove_component<T: Component>(
        &self,
        slot: usize,
        entity: Entity,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.remove_component::<T>(entity);
        Ok(())
    }

    /// Records attaching a shared component on `slot`.
    pub fn add_shared_component<T: Component>(
        &self,
        slot: usize,
        entity: Entity,
        value: T,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.add_shared_component(entity, value);
        Ok(())
    }

    /// Records a buffer of `T` pre-staged with `elements` on `slot`.
    pub fn add_buffer<T: BufferElement>(
        &self,
        slot: usize,
        entity: Entity,
        elements: Vec<T>,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.add_buffer::<T>(entity).extend(elements);
        Ok(())
    }

    /// Records appending one element on `slot`.
    pub fn append_to_buffer<T: BufferElement>(
        &self,
        slot: usize,
        entity: Entity,
        element: T,
    ) -> Result<(), StoreError> {
        self.slot(slot)?.append_to_buffer(entity, element);
        Ok(())
    }

    // -- Playback --

    /// Replays every slot against `store`, in slot order, and returns the
    /// combined pending-to-live mapping.
    pub fn apply_all(self, store: &mut Store) -> Result<HashMap<Entity, Entity>, StoreError> {
        let mut remap = HashMap::new();
        for slot in self.slots {
            let commands = slot
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            remap.extend(commands.apply(store)?);
        }
        Ok(remap)
    }
}
