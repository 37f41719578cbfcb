//! Build steps.
//!
//! An [`EntityBuilder`](crate::EntityBuilder) is an ordered list of steps.
//! Most step kinds are singletons: re-issuing the same instruction mutates
//! the existing step in place instead of appending, so a builder never
//! replays stale values. Buffer steps are singletons too but accumulate
//! their elements.

use std::any::Any;
use std::marker::PhantomData;

use forge_component::{BufferElement, Component, ComponentTypeId, Entity};
use forge_spatial::{LocalToParent, Parent, Quat, Rotation, Scale, Translation, Vec3};

use crate::context::MutationContext;
use crate::error::ComposeError;
use crate::variables::VariableMap;

/// Identity of a step for singleton deduplication.
///
/// Two steps with equal kinds are the same logical instruction; the builder
/// keeps at most one of them (custom steps excepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Writes one component value, keyed by component type.
    Component(ComponentTypeId),
    /// Writes one shared component value.
    SharedComponent(ComponentTypeId),
    /// Removes one component type.
    RemoveComponent(ComponentTypeId),
    /// Stages a buffer of one element type.
    Buffer(ComponentTypeId),
    Translation,
    Rotation,
    Scale,
    Parent,
    Name,
    /// Custom steps are never deduplicated against each other.
    Custom(&'static str),
}

/// One instruction applied to the entity being built.
pub trait BuildStep: Send + Sync {
    /// The step's identity for deduplication.
    fn kind(&self) -> StepKind;

    /// Applies the instruction to `entity` through `ctx`.
    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError>;

    /// Downcast support so the builder can mutate an existing step.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Whether a component write tolerates the component being absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert or replace.
    Add,
    /// Replace only; absence is an error.
    Set,
}

pub(crate) struct ComponentValueStep<T: Component> {
    pub(crate) value: T,
    pub(crate) mode: WriteMode,
}

impl<T: Component> BuildStep for ComponentValueStep<T> {
    fn kind(&self) -> StepKind {
        StepKind::Component(T::component_type_id())
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        match self.mode {
            WriteMode::Add => ctx.add_component_value(entity, self.value.clone()),
            WriteMode::Set => ctx.set_component_value(entity, self.value.clone()),
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct AddSharedComponentStep<T: Component> {
    pub(crate) value: T,
}

impl<T: Component> BuildStep for AddSharedComponentStep<T> {
    fn kind(&self) -> StepKind {
        StepKind::SharedComponent(T::component_type_id())
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_shared_component(entity, self.value.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct RemoveComponentStep<T: Component> {
    pub(crate) marker: PhantomData<fn() -> T>,
}

impl<T: Component> BuildStep for RemoveComponentStep<T> {
    fn kind(&self) -> StepKind {
        StepKind::RemoveComponent(T::component_type_id())
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.remove_component::<T>(entity)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct AddBufferStep<T: BufferElement> {
    pub(crate) elements: Vec<T>,
}

impl<T: BufferElement> BuildStep for AddBufferStep<T> {
    fn kind(&self) -> StepKind {
        StepKind::Buffer(T::element_type_id())
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_buffer(entity, self.elements.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct SetTranslationStep {
    pub(crate) value: Vec3,
}

impl BuildStep for SetTranslationStep {
    fn kind(&self) -> StepKind {
        StepKind::Translation
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_component_value(entity, Translation { value: self.value })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct SetRotationStep {
    pub(crate) value: Quat,
}

impl BuildStep for SetRotationStep {
    fn kind(&self) -> StepKind {
        StepKind::Rotation
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_component_value(entity, Rotation { value: self.value })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct SetScaleStep {
    pub(crate) value: f32,
}

impl BuildStep for SetScaleStep {
    fn kind(&self) -> StepKind {
        StepKind::Scale
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_component_value(entity, Scale { value: self.value })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Reparents the entity: attaches [`Parent`] and the [`LocalToParent`]
/// marker together.
pub(crate) struct SetParentStep {
    pub(crate) parent: Entity,
}

impl BuildStep for SetParentStep {
    fn kind(&self) -> StepKind {
        StepKind::Parent
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.add_component_value(entity, Parent { value: self.parent })?;
        ctx.add_component_value(entity, LocalToParent)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub(crate) struct SetNameStep {
    pub(crate) name: String,
}

impl BuildStep for SetNameStep {
    fn kind(&self) -> StepKind {
        StepKind::Name
    }

    fn apply(
        &self,
        ctx: &mut MutationContext<'_>,
        _variables: &VariableMap,
        entity: Entity,
    ) -> Result<(), ComposeError> {
        ctx.set_name(entity, &self.name);
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
