//! Post-build entity wrapper.

use forge_component::{BufferElement, Component, Entity};

use crate::context::MutationContext;
use crate::error::ComposeError;
use crate::variables::VariableMap;

/// A just-built entity together with the context that built it and the
/// build's variables, for follow-up mutation without re-threading either.
pub struct BuiltEntity<'b, 'w> {
    entity: Entity,
    ctx: &'b mut MutationContext<'w>,
    variables: VariableMap,
}

impl<'b, 'w> BuiltEntity<'b, 'w> {
    pub(crate) fn new(
        entity: Entity,
        ctx: &'b mut MutationContext<'w>,
        variables: VariableMap,
    ) -> Self {
        Self {
            entity,
            ctx,
            variables,
        }
    }

    /// The built entity. A pending id on deferred backends.
    #[must_use]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The variables the build ran with.
    #[must_use]
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// The backing context.
    pub fn context(&mut self) -> &mut MutationContext<'w> {
        self.ctx
    }

    /// Attaches `value` to the entity.
    pub fn add_component_value<T: Component>(
        &mut self,
        value: T,
    ) -> Result<&mut Self, ComposeError> {
        self.ctx.add_component_value(self.entity, value)?;
        Ok(self)
    }

    /// Overwrites an existing component on the entity.
    pub fn set_component_value<T: Component>(
        &mut self,
        value: T,
    ) -> Result<&mut Self, ComposeError> {
        self.ctx.set_component_value(self.entity, value)?;
        Ok(self)
    }

    /// Removes a component from the entity.
    pub fn remove_component<T: Component>(&mut self) -> Result<&mut Self, ComposeError> {
        self.ctx.remove_component::<T>(self.entity)?;
        Ok(self)
    }

    /// Returns `true` if the entity carries `T`. Needs a live store.
    pub fn has_component<T: Component>(&self) -> Result<bool, ComposeError> {
        self.ctx.has_component::<T>(self.entity)
    }

    /// Borrows a component from the entity. Needs a live store.
    pub fn get_component<T: Component>(&self) -> Result<&T, ComposeError> {
        self.ctx.get_component::<T>(self.entity)
    }

    /// Attaches a shared component to the entity.
    pub fn add_shared_component<T: Component>(
        &mut self,
        value: T,
    ) -> Result<&mut Self, ComposeError> {
        self.ctx.add_shared_component(self.entity, value)?;
        Ok(self)
    }

    /// Appends one element to the entity's buffer of `T`.
    pub fn append_to_buffer<T: BufferElement>(
        &mut self,
        element: T,
    ) -> Result<&mut Self, ComposeError> {
        self.ctx.append_to_buffer(self.entity, element)?;
        Ok(self)
    }

    /// Returns the entity's buffer of `T` mutably, creating it if missing.
    /// Backend rules follow [`MutationContext::get_or_create_buffer`].
    pub fn get_or_create_buffer<T: BufferElement>(
        &mut self,
    ) -> Result<&mut Vec<T>, ComposeError> {
        self.ctx.get_or_create_buffer::<T>(self.entity)
    }

    /// Replaces the contents of the entity's buffer of `T` with `elements`.
    pub fn replace_buffer_elements<T: BufferElement>(
        &mut self,
        elements: impl IntoIterator<Item = T>,
    ) -> Result<&mut Self, ComposeError> {
        let buffer = self.ctx.get_or_create_buffer::<T>(self.entity)?;
        buffer.clear();
        buffer.extend(elements);
        Ok(self)
    }

    /// Labels the entity, best effort.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.ctx.set_name(self.entity, name);
        self
    }

    /// Stores a variable alongside the entity handle.
    pub fn set_variable<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.variables.set(value);
        self
    }

    /// Borrows a variable carried over from the build.
    #[must_use]
    pub fn get_variable<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.variables.get::<T>()
    }

    /// Destroys the entity, consuming the wrapper.
    pub fn destroy(self) -> Result<(), ComposeError> {
        self.ctx.destroy(self.entity)
    }

    pub(crate) fn into_variables(self) -> VariableMap {
        self.variables
    }
}

impl std::fmt::Debug for BuiltEntity<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltEntity({})", self.entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_component::Store;
    use forge_spatial::Translation;

    #[test]
    fn test_wrapper_mutates_through_context() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let entity = ctx.create_entity().unwrap();

        let mut built = BuiltEntity::new(entity, &mut ctx, VariableMap::new());
        built
            .add_component_value(Translation::new(1.0, 0.0, 0.0))
            .unwrap()
            .set_component_value(Translation::new(2.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(
            store.get_component::<Translation>(entity).unwrap().value.x,
            2.0
        );
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Waypoint(u32);

    impl BufferElement for Waypoint {
        fn type_name() -> &'static str {
            "Waypoint"
        }
    }

    #[test]
    fn test_wrapper_reads_and_buffer_replacement() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let entity = ctx.create_entity().unwrap();

        let mut built = BuiltEntity::new(entity, &mut ctx, VariableMap::new());
        assert!(!built.has_component::<Translation>().unwrap());

        built.get_or_create_buffer::<Waypoint>().unwrap().push(Waypoint(1));
        built
            .replace_buffer_elements([Waypoint(7), Waypoint(8)])
            .unwrap();
        assert_eq!(
            store.get_buffer::<Waypoint>(entity).unwrap(),
            &[Waypoint(7), Waypoint(8)]
        );
    }

    #[test]
    fn test_wrapper_variables_and_destroy() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let entity = ctx.create_entity().unwrap();

        let mut built = BuiltEntity::new(entity, &mut ctx, VariableMap::new());
        built.set_variable(3u32);
        assert_eq!(built.get_variable::<u32>(), Some(&3));

        built.destroy().unwrap();
        assert!(!store.exists(entity));
    }
}
