//! The mutation-context facade.
//!
//! [`MutationContext`] gives composition code one surface over three
//! mutation backends: writing a [`Store`] directly, recording into a
//! [`CommandBuffer`] (optionally with read access to a store), or recording
//! into one slot of a [`ParallelCommandBuffer`]. Callers hold a context, not
//! a backend, so the same build code runs in main-thread and deferred
//! settings unchanged.
//!
//! Write operations are available on every backend. Read-dependent
//! operations (`has_component`, `get_component`, buffer reads,
//! `build_archetype`) need a live store and fail with
//! [`ComposeError::UnsupportedOperation`] on purely deferred backends.

use forge_component::{
    ArchetypeHandle, BufferElement, CommandBuffer, Component, ComponentInfo, Entity,
    ParallelCommandBuffer, Store,
};

use crate::components::DebugName;
use crate::error::ComposeError;

/// A unified handle over one of the three mutation backends.
pub enum MutationContext<'w> {
    /// Mutations apply to the store immediately.
    Direct(&'w mut Store),
    /// Mutations are recorded for later playback. When `store` is present,
    /// read-dependent operations are served from it.
    Deferred {
        commands: &'w mut CommandBuffer,
        store: Option<&'w mut Store>,
    },
    /// Mutations are recorded into one slot of a concurrent buffer.
    DeferredConcurrent {
        commands: &'w ParallelCommandBuffer,
        slot: usize,
    },
}

impl<'w> MutationContext<'w> {
    /// A context that mutates `store` immediately.
    #[must_use]
    pub fn from_store(store: &'w mut Store) -> Self {
        MutationContext::Direct(store)
    }

    /// A context that records into `commands`; reads are unsupported.
    #[must_use]
    pub fn from_commands(commands: &'w mut CommandBuffer) -> Self {
        MutationContext::Deferred {
            commands,
            store: None,
        }
    }

    /// A context that records into `commands` but serves reads from `store`.
    #[must_use]
    pub fn from_commands_and_store(commands: &'w mut CommandBuffer, store: &'w mut Store) -> Self {
        MutationContext::Deferred {
            commands,
            store: Some(store),
        }
    }

    /// A context that records into slot `slot` of `commands`.
    #[must_use]
    pub fn from_parallel(commands: &'w ParallelCommandBuffer, slot: usize) -> Self {
        MutationContext::DeferredConcurrent { commands, slot }
    }

    /// The backend's name, for diagnostics and error messages.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self {
            MutationContext::Direct(_) => "direct",
            MutationContext::Deferred { .. } => "deferred",
            MutationContext::DeferredConcurrent { .. } => "deferred-concurrent",
        }
    }

    fn unsupported(&self, operation: &'static str) -> ComposeError {
        ComposeError::UnsupportedOperation {
            operation,
            backend: self.backend_name(),
        }
    }

    // -- Entity lifecycle --

    /// Creates an empty entity. Deferred backends return a pending id.
    pub fn create_entity(&mut self) -> Result<Entity, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.create_entity()),
            MutationContext::Deferred { commands, .. } => Ok(commands.create_entity()),
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.create_entity(*slot)?)
            }
        }
    }

    /// Creates an entity from an archetype layout. Deferred backends defer
    /// handle validation to playback.
    pub fn create_entity_from_archetype(
        &mut self,
        handle: ArchetypeHandle,
    ) -> Result<Entity, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.create_entity_from_archetype(handle)?),
            MutationContext::Deferred { commands, .. } => {
                Ok(commands.create_entity_from_archetype(handle))
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.create_entity_from_archetype(*slot, handle)?)
            }
        }
    }

    /// Creates a deep copy of `template`.
    pub fn instantiate(&mut self, template: Entity) -> Result<Entity, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.instantiate(template)?),
            MutationContext::Deferred { commands, .. } => Ok(commands.instantiate(template)),
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.instantiate(*slot, template)?)
            }
        }
    }

    /// Destroys an entity.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.destroy(entity)?),
            MutationContext::Deferred { commands, .. } => {
                commands.destroy(entity);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.destroy(*slot, entity)?)
            }
        }
    }

    // -- Components --

    /// Attaches a default-valued `T`, replacing any existing component of
    /// the same type.
    pub fn add_component<T: Component + Default>(
        &mut self,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        self.add_component_value(entity, T::default())
    }

    /// Attaches `value`, replacing any existing component of the same type.
    pub fn add_component_value<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.add_component(entity, value)?),
            MutationContext::Deferred { commands, .. } => {
                commands.add_component(entity, value);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.add_component(*slot, entity, value)?)
            }
        }
    }

    /// Overwrites an existing component. On deferred backends the
    /// missing-component error only surfaces at playback.
    pub fn set_component_value<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.set_component(entity, value)?),
            MutationContext::Deferred { commands, .. } => {
                commands.set_component(entity, value);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.set_component(*slot, entity, value)?)
            }
        }
    }

    /// Removes a component from the entity.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.remove_component::<T>(entity)?),
            MutationContext::Deferred { commands, .. } => {
                commands.remove_component::<T>(entity);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.remove_component::<T>(*slot, entity)?)
            }
        }
    }

    /// Attaches a shared component.
    pub fn add_shared_component<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
    ) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.add_shared_component(entity, value)?),
            MutationContext::Deferred { commands, .. } => {
                commands.add_shared_component(entity, value);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.add_shared_component(*slot, entity, value)?)
            }
        }
    }

    /// Returns `true` if the entity carries `T`. Needs a live store.
    pub fn has_component<T: Component>(&self, entity: Entity) -> Result<bool, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.has_component::<T>(entity)),
            MutationContext::Deferred {
                store: Some(store), ..
            } => Ok(store.has_component::<T>(entity)),
            _ => Err(self.unsupported("has_component")),
        }
    }

    /// Borrows a component from the entity. Needs a live store.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.get_component::<T>(entity)?),
            MutationContext::Deferred {
                store: Some(store), ..
            } => Ok(store.get_component::<T>(entity)?),
            _ => Err(self.unsupported("get_component")),
        }
    }

    // -- Buffers --

    /// Attaches a buffer of `T` staged with `elements`. If the entity ends
    /// up with a buffer of `T` from elsewhere, the elements are appended.
    pub fn add_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
        elements: Vec<T>,
    ) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => {
                store.get_or_create_buffer::<T>(entity)?.extend(elements);
                Ok(())
            }
            MutationContext::Deferred { commands, .. } => {
                commands.add_buffer::<T>(entity).extend(elements);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.add_buffer(*slot, entity, elements)?)
            }
        }
    }

    /// Appends one element, creating the buffer if the entity lacks it.
    pub fn append_to_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
        element: T,
    ) -> Result<(), ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.append_to_buffer(entity, element)?),
            MutationContext::Deferred { commands, .. } => {
                commands.append_to_buffer(entity, element);
                Ok(())
            }
            MutationContext::DeferredConcurrent { commands, slot } => {
                Ok(commands.append_to_buffer(*slot, entity, element)?)
            }
        }
    }

    /// Borrows the entity's buffer of `T`. Needs a live store.
    pub fn get_buffer<T: BufferElement>(&self, entity: Entity) -> Result<&[T], ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.get_buffer::<T>(entity)?),
            MutationContext::Deferred {
                store: Some(store), ..
            } => Ok(store.get_buffer::<T>(entity)?),
            _ => Err(self.unsupported("get_buffer")),
        }
    }

    /// Returns the entity's buffer of `T` mutably, creating it if missing.
    ///
    /// On the hybrid deferred backend a live entity's existing buffer is
    /// served from the store; otherwise the returned buffer is a staged one
    /// that lands at playback.
    pub fn get_or_create_buffer<T: BufferElement>(
        &mut self,
        entity: Entity,
    ) -> Result<&mut Vec<T>, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.get_or_create_buffer::<T>(entity)?),
            MutationContext::Deferred {
                commands,
                store: Some(store),
            } => {
                if !entity.is_deferred() && store.has_buffer::<T>(entity) {
                    Ok(store.get_buffer_mut::<T>(entity)?)
                } else {
                    Ok(commands.add_buffer::<T>(entity))
                }
            }
            MutationContext::Deferred { store: None, .. }
            | MutationContext::DeferredConcurrent { .. } => {
                Err(self.unsupported("get_or_create_buffer"))
            }
        }
    }

    // -- Archetypes --

    /// Builds an archetype layout. Needs a live store.
    pub fn build_archetype(
        &mut self,
        components: Vec<ComponentInfo>,
    ) -> Result<ArchetypeHandle, ComposeError> {
        match self {
            MutationContext::Direct(store) => Ok(store.build_archetype(components)?),
            MutationContext::Deferred {
                store: Some(store), ..
            } => Ok(store.build_archetype(components)?),
            _ => Err(self.unsupported("build_archetype")),
        }
    }

    // -- Naming --

    /// Attaches a [`DebugName`] label to the entity, best effort.
    ///
    /// Naming never fails a build: if the backend rejects the write (dead
    /// entity, bad slot) the error is logged at debug level and dropped.
    pub fn set_name(&mut self, entity: Entity, name: &str) {
        let result = self.add_component_value(
            entity,
            DebugName {
                value: name.to_owned(),
            },
        );
        if let Err(error) = result {
            tracing::debug!(%entity, %error, "entity name dropped");
        }
    }
}

impl std::fmt::Debug for MutationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MutationContext({})", self.backend_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_component::StoreError;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Health {
        current: f32,
    }

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Waypoint(u32);

    impl BufferElement for Waypoint {
        fn type_name() -> &'static str {
            "Waypoint"
        }
    }

    #[test]
    fn test_direct_supports_reads() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let e = ctx.create_entity().unwrap();
        ctx.add_component_value(e, Health { current: 3.0 }).unwrap();
        assert!(ctx.has_component::<Health>(e).unwrap());
        assert_eq!(ctx.get_component::<Health>(e).unwrap().current, 3.0);
    }

    #[test]
    fn test_pure_deferred_rejects_reads() {
        let mut commands = CommandBuffer::new();
        let mut ctx = MutationContext::from_commands(&mut commands);

        let e = ctx.create_entity().unwrap();
        assert!(e.is_deferred());
        let err = ctx.has_component::<Health>(e).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::UnsupportedOperation {
                operation: "has_component",
                backend: "deferred",
            }
        ));
        assert!(matches!(
            ctx.get_or_create_buffer::<Waypoint>(e).unwrap_err(),
            ComposeError::UnsupportedOperation { .. }
        ));
    }

    #[test]
    fn test_concurrent_rejects_reads() {
        let commands = ParallelCommandBuffer::new(1);
        let ctx = MutationContext::from_parallel(&commands, 0);
        let err = ctx.has_component::<Health>(Entity::NULL).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::UnsupportedOperation {
                backend: "deferred-concurrent",
                ..
            }
        ));
    }

    #[test]
    fn test_hybrid_serves_reads_from_store() {
        let mut store = Store::new();
        let live = store.create_entity();
        store.add_component(live, Health { current: 8.0 }).unwrap();
        store.append_to_buffer(live, Waypoint(1)).unwrap();

        let mut commands = CommandBuffer::new();
        let mut ctx = MutationContext::from_commands_and_store(&mut commands, &mut store);

        assert!(ctx.has_component::<Health>(live).unwrap());
        assert_eq!(ctx.get_buffer::<Waypoint>(live).unwrap(), &[Waypoint(1)]);

        // Existing buffer is served live; the write is immediate.
        ctx.get_or_create_buffer::<Waypoint>(live)
            .unwrap()
            .push(Waypoint(2));
        assert_eq!(
            store.get_buffer::<Waypoint>(live).unwrap(),
            &[Waypoint(1), Waypoint(2)]
        );
    }

    #[test]
    fn test_hybrid_stages_buffer_for_pending_entity() {
        let mut store = Store::new();
        let mut commands = CommandBuffer::new();
        let mut ctx = MutationContext::from_commands_and_store(&mut commands, &mut store);

        let pending = ctx.create_entity().unwrap();
        ctx.get_or_create_buffer::<Waypoint>(pending)
            .unwrap()
            .push(Waypoint(9));

        let remap = commands.apply(&mut store).unwrap();
        assert_eq!(
            store.get_buffer::<Waypoint>(remap[&pending]).unwrap(),
            &[Waypoint(9)]
        );
    }

    #[test]
    fn test_deferred_matches_direct_after_playback() {
        let build = |ctx: &mut MutationContext<'_>| -> Entity {
            let e = ctx.create_entity().unwrap();
            ctx.add_component_value(e, Health { current: 1.0 }).unwrap();
            ctx.set_component_value(e, Health { current: 2.0 }).unwrap();
            ctx.append_to_buffer(e, Waypoint(5)).unwrap();
            e
        };

        let mut direct_store = Store::new();
        let direct = build(&mut MutationContext::from_store(&mut direct_store));

        let mut deferred_store = Store::new();
        let mut commands = CommandBuffer::new();
        let pending = build(&mut MutationContext::from_commands(&mut commands));
        let remap = commands.apply(&mut deferred_store).unwrap();
        let deferred = remap[&pending];

        assert_eq!(
            direct_store.get_component::<Health>(direct).unwrap(),
            deferred_store.get_component::<Health>(deferred).unwrap()
        );
        assert_eq!(
            direct_store.get_buffer::<Waypoint>(direct).unwrap(),
            deferred_store.get_buffer::<Waypoint>(deferred).unwrap()
        );
    }

    #[test]
    fn test_set_name_attaches_debug_name() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let e = ctx.create_entity().unwrap();
        ctx.set_name(e, "turret");
        assert_eq!(
            store.get_component::<DebugName>(e).unwrap().value,
            "turret"
        );
    }

    #[test]
    fn test_set_name_on_dead_entity_is_silent() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        // Never panics, never errors.
        ctx.set_name(Entity::from_raw(999), "ghost");
    }

    #[test]
    fn test_direct_set_on_missing_component_errors() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let e = ctx.create_entity().unwrap();
        assert!(matches!(
            ctx.set_component_value(e, Health::default()),
            Err(ComposeError::Store(StoreError::ComponentNotFound { .. }))
        ));
    }
}
