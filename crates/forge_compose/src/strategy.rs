//! Creation strategies.
//!
//! A strategy decides how the builder obtains its entity before any steps
//! run: empty, from a cached archetype, from a raw handle, or by copying a
//! template.

use std::marker::PhantomData;

use forge_component::{ArchetypeHandle, Entity};

use crate::context::MutationContext;
use crate::error::ComposeError;
use crate::registry::{ArchetypeDescriptor, ArchetypeRegistry};
use crate::variables::VariableMap;

/// Produces the entity an [`EntityBuilder`](crate::EntityBuilder) operates
/// on.
pub trait CreationStrategy: Send + Sync {
    fn create(
        &self,
        ctx: &mut MutationContext<'_>,
        variables: &VariableMap,
    ) -> Result<Entity, ComposeError>;
}

/// Creates a bare entity. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateEmpty;

impl CreationStrategy for CreateEmpty {
    fn create(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
    ) -> Result<Entity, ComposeError> {
        ctx.create_entity()
    }
}

/// Creates the entity from descriptor `D`, resolving the archetype through
/// the global [`ArchetypeRegistry`] and labelling the entity
/// `"<descriptor> <entity>"` best effort.
pub struct CreateFromArchetype<D: ArchetypeDescriptor> {
    marker: PhantomData<fn() -> D>,
}

impl<D: ArchetypeDescriptor> CreateFromArchetype<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<D: ArchetypeDescriptor> Default for CreateFromArchetype<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ArchetypeDescriptor> CreationStrategy for CreateFromArchetype<D> {
    fn create(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
    ) -> Result<Entity, ComposeError> {
        let handle = ArchetypeRegistry::global().get_or_create::<D>(ctx)?;
        let entity = ctx.create_entity_from_archetype(handle)?;
        ctx.set_name(entity, &format!("{} {}", D::name(), entity));
        Ok(entity)
    }
}

/// Creates the entity from an already-built archetype handle, bypassing the
/// registry.
#[derive(Debug, Clone, Copy)]
pub struct CreateFromHandle {
    handle: ArchetypeHandle,
}

impl CreateFromHandle {
    #[must_use]
    pub fn new(handle: ArchetypeHandle) -> Self {
        Self { handle }
    }
}

impl CreationStrategy for CreateFromHandle {
    fn create(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
    ) -> Result<Entity, ComposeError> {
        ctx.create_entity_from_archetype(self.handle)
    }
}

/// Creates the entity as a deep copy of a template entity.
#[derive(Debug, Clone, Copy)]
pub struct CreateFromTemplate {
    template: Entity,
}

impl CreateFromTemplate {
    #[must_use]
    pub fn new(template: Entity) -> Self {
        Self { template }
    }
}

impl CreationStrategy for CreateFromTemplate {
    fn create(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
    ) -> Result<Entity, ComposeError> {
        ctx.instantiate(self.template)
    }
}
