//! The entity builder.
//!
//! [`EntityBuilder`] collects an ordered list of [`BuildStep`]s plus a
//! [`CreationStrategy`], then replays them against a [`MutationContext`] in
//! one [`build`](EntityBuilder::build) call. The same builder description
//! works on every backend; on deferred backends the returned entity is a
//! pending id.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use forge_component::{BufferElement, Component, Entity};
use forge_spatial::{Quat, Vec3};

use crate::built::BuiltEntity;
use crate::context::MutationContext;
use crate::error::ComposeError;
use crate::steps::{
    AddBufferStep, AddSharedComponentStep, BuildStep, ComponentValueStep, RemoveComponentStep,
    SetNameStep, SetParentStep, SetRotationStep, SetScaleStep, SetTranslationStep, StepKind,
    WriteMode,
};
use crate::strategy::{
    CreateEmpty, CreateFromArchetype, CreateFromHandle, CreateFromTemplate, CreationStrategy,
};
use crate::registry::ArchetypeDescriptor;
use crate::variables::VariableMap;

static LEAKED_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Number of builders dropped without ever being built.
///
/// A builder that is described but never built is almost always a bug; the
/// drop is logged and counted here so tests and health checks can assert on
/// it.
#[must_use]
pub fn leaked_session_count() -> usize {
    LEAKED_SESSIONS.load(Ordering::Relaxed)
}

type PreBuildHook = Box<
    dyn FnOnce(&mut MutationContext<'_>, &mut VariableMap, Entity) -> Result<(), ComposeError>
        + Send
        + Sync,
>;
type PostBuildHook =
    Box<dyn FnOnce(&mut BuiltEntity<'_, '_>) -> Result<(), ComposeError> + Send + Sync>;

/// A reusable description of how to compose one entity.
///
/// # Examples
///
/// ```rust
/// use forge_component::Store;
/// use forge_compose::{EntityBuilder, MutationContext};
/// use forge_spatial::Vec3;
///
/// let mut store = Store::new();
/// let mut ctx = MutationContext::from_store(&mut store);
/// let entity = EntityBuilder::new()
///     .set_translation(Vec3::new(1.0, 2.0, 3.0))
///     .set_name("spawn point")
///     .build(&mut ctx)
///     .unwrap();
/// assert!(store.exists(entity));
/// ```
pub struct EntityBuilder {
    steps: Vec<Box<dyn BuildStep>>,
    strategy: Option<Box<dyn CreationStrategy>>,
    variables: VariableMap,
    pre_build: Vec<PreBuildHook>,
    post_build: Vec<PostBuildHook>,
    built: bool,
}

impl EntityBuilder {
    /// Creates a builder that starts from an empty entity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            strategy: None,
            variables: VariableMap::new(),
            pre_build: Vec::new(),
            post_build: Vec::new(),
            built: false,
        }
    }

    // -- Creation strategy --

    /// Replaces the creation strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl CreationStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Creates the entity from descriptor `D` via the global registry.
    #[must_use]
    pub fn create_from_archetype<D: ArchetypeDescriptor>(self) -> Self {
        self.with_strategy(CreateFromArchetype::<D>::new())
    }

    /// Creates the entity from an already-built archetype handle.
    #[must_use]
    pub fn create_from_handle(self, handle: forge_component::ArchetypeHandle) -> Self {
        self.with_strategy(CreateFromHandle::new(handle))
    }

    /// Creates the entity as a deep copy of `template`.
    #[must_use]
    pub fn create_from_template(self, template: Entity) -> Self {
        self.with_strategy(CreateFromTemplate::new(template))
    }

    // -- Components --

    /// Adds a default-valued `T`.
    #[must_use]
    pub fn add_component<T: Component + Default>(self) -> Self {
        self.add_component_value(T::default())
    }

    /// Adds `T` with `value`, replacing any existing component of the same
    /// type on the entity. Re-issuing for the same `T` updates the one
    /// existing step.
    #[must_use]
    pub fn add_component_value<T: Component>(mut self, value: T) -> Self {
        let step = self.singleton_step(StepKind::Component(T::component_type_id()), || {
            ComponentValueStep {
                value: value.clone(),
                mode: WriteMode::Add,
            }
        });
        step.value = value;
        // An add subsumes a previously recorded set for the same type.
        step.mode = WriteMode::Add;
        self
    }

    /// Overwrites `T` on the entity; the entity must already carry it when
    /// the step runs. If the builder already adds `T`, the add is kept and
    /// only its value updated.
    #[must_use]
    pub fn set_component_value<T: Component>(mut self, value: T) -> Self {
        let step = self.singleton_step(StepKind::Component(T::component_type_id()), || {
            ComponentValueStep {
                value: value.clone(),
                mode: WriteMode::Set,
            }
        });
        step.value = value;
        self
    }

    /// Removes `T` from the entity.
    #[must_use]
    pub fn remove_component<T: Component>(mut self) -> Self {
        self.singleton_step(StepKind::RemoveComponent(T::component_type_id()), || {
            RemoveComponentStep::<T> {
                marker: PhantomData,
            }
        });
        self
    }

    /// Adds a shared component with `value`.
    #[must_use]
    pub fn add_shared_component<T: Component>(mut self, value: T) -> Self {
        let step = self.singleton_step(StepKind::SharedComponent(T::component_type_id()), || {
            AddSharedComponentStep {
                value: value.clone(),
            }
        });
        step.value = value;
        self
    }

    // -- Buffers --

    /// Ensures the entity gets a buffer of `T`, initially empty.
    #[must_use]
    pub fn add_buffer<T: BufferElement>(mut self) -> Self {
        self.singleton_step(StepKind::Buffer(T::element_type_id()), || {
            AddBufferStep::<T> {
                elements: Vec::new(),
            }
        });
        self
    }

    /// Appends one element to the entity's staged buffer of `T`. Elements
    /// accumulate across calls in call order.
    #[must_use]
    pub fn add_buffer_element<T: BufferElement>(mut self, element: T) -> Self {
        self.singleton_step(StepKind::Buffer(T::element_type_id()), || {
            AddBufferStep::<T> {
                elements: Vec::new(),
            }
        })
        .elements
        .push(element);
        self
    }

    /// Appends several elements to the entity's staged buffer of `T`.
    #[must_use]
    pub fn add_buffer_elements<T: BufferElement>(
        mut self,
        elements: impl IntoIterator<Item = T>,
    ) -> Self {
        self.singleton_step(StepKind::Buffer(T::element_type_id()), || {
            AddBufferStep::<T> {
                elements: Vec::new(),
            }
        })
        .elements
        .extend(elements);
        self
    }

    // -- Spatial --

    /// Sets the entity's translation. Last call wins.
    #[must_use]
    pub fn set_translation(mut self, value: Vec3) -> Self {
        self.singleton_step(StepKind::Translation, || SetTranslationStep { value })
            .value = value;
        self
    }

    /// Sets the entity's rotation. Last call wins.
    #[must_use]
    pub fn set_rotation(mut self, value: Quat) -> Self {
        self.singleton_step(StepKind::Rotation, || SetRotationStep { value })
            .value = value;
        self
    }

    /// Sets the entity's uniform scale. Last call wins.
    #[must_use]
    pub fn set_scale(mut self, value: f32) -> Self {
        self.singleton_step(StepKind::Scale, || SetScaleStep { value }).value = value;
        self
    }

    /// Parents the entity under `parent`, marking it as locally positioned.
    /// Last call wins.
    #[must_use]
    pub fn set_parent(mut self, parent: Entity) -> Self {
        self.singleton_step(StepKind::Parent, || SetParentStep { parent })
            .parent = parent;
        self
    }

    // -- Misc --

    /// Labels the entity, best effort. Last call wins.
    #[must_use]
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.singleton_step(StepKind::Name, || SetNameStep { name: name.clone() })
            .name = name.clone();
        self
    }

    /// Appends a custom step. Custom steps are applied in insertion order
    /// and never deduplicated.
    #[must_use]
    pub fn add_step(mut self, step: impl BuildStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Stores a build variable readable by steps and hooks.
    #[must_use]
    pub fn set_variable<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.variables.set(value);
        self
    }

    /// Runs after the entity is created but before any step; may adjust
    /// build variables.
    #[must_use]
    pub fn pre_build(
        mut self,
        hook: impl FnOnce(&mut MutationContext<'_>, &mut VariableMap, Entity) -> Result<(), ComposeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.pre_build.push(Box::new(hook));
        self
    }

    /// Runs after every step has been applied, receiving the bound entity
    /// handle. Hooks run in registration order.
    #[must_use]
    pub fn post_build(
        mut self,
        hook: impl FnOnce(&mut BuiltEntity<'_, '_>) -> Result<(), ComposeError> + Send + Sync + 'static,
    ) -> Self {
        self.post_build.push(Box::new(hook));
        self
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    // -- Building --

    /// Creates the entity and applies every step in order.
    pub fn build(mut self, ctx: &mut MutationContext<'_>) -> Result<Entity, ComposeError> {
        let result = self.run(ctx);
        self.built = true;
        result
    }

    /// Like [`EntityBuilder::build`] but returns a [`BuiltEntity`] wrapper
    /// for follow-up mutation, carrying over the build variables.
    pub fn build_and_wrap<'b, 'w>(
        mut self,
        ctx: &'b mut MutationContext<'w>,
    ) -> Result<BuiltEntity<'b, 'w>, ComposeError> {
        let result = self.run(ctx);
        self.built = true;
        let variables = std::mem::take(&mut self.variables);
        let entity = result?;
        Ok(BuiltEntity::new(entity, ctx, variables))
    }

    fn run(&mut self, ctx: &mut MutationContext<'_>) -> Result<Entity, ComposeError> {
        let entity = match self.strategy.take() {
            Some(strategy) => strategy.create(ctx, &self.variables)?,
            None => CreateEmpty.create(ctx, &self.variables)?,
        };
        for hook in std::mem::take(&mut self.pre_build) {
            hook(ctx, &mut self.variables, entity)?;
        }
        for step in std::mem::take(&mut self.steps) {
            step.apply(ctx, &self.variables, entity)?;
        }
        let post_build = std::mem::take(&mut self.post_build);
        if !post_build.is_empty() {
            let mut handle = BuiltEntity::new(entity, ctx, std::mem::take(&mut self.variables));
            for hook in post_build {
                hook(&mut handle)?;
            }
            self.variables = handle.into_variables();
        }
        Ok(entity)
    }

    /// Finds the step with `kind`, creating it at the end of the list if
    /// absent, and returns it downcast to its concrete type.
    fn singleton_step<S: BuildStep + 'static>(
        &mut self,
        kind: StepKind,
        create: impl FnOnce() -> S,
    ) -> &mut S {
        let index = match self.steps.iter().position(|step| step.kind() == kind) {
            Some(index) => index,
            None => {
                self.steps.push(Box::new(create()));
                self.steps.len() - 1
            }
        };
        match self.steps[index].as_any_mut().downcast_mut::<S>() {
            Some(step) => step,
            // Each kind maps to exactly one concrete step type.
            None => unreachable!(),
        }
    }
}

impl Default for EntityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EntityBuilder {
    fn drop(&mut self) {
        if !self.built && !std::thread::panicking() {
            LEAKED_SESSIONS.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                steps = self.steps.len(),
                "entity builder dropped without being built"
            );
        }
    }
}

impl std::fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EntityBuilder({} steps, {})",
            self.steps.len(),
            if self.strategy.is_some() {
                "explicit strategy"
            } else {
                "empty entity"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::DebugName;
    use std::any::Any;
    use crate::registry::ArchetypeRegistry;
    use crate::ArchetypeDescriptor;
    use forge_component::{CommandBuffer, ComponentInfo, ParallelCommandBuffer, Store};
    use forge_spatial::{LocalToParent, Parent, Scale, Translation};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Component for Position {
        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Faction(u8);

    impl Component for Faction {
        fn type_name() -> &'static str {
            "Faction"
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
    fn test_build_empty_entity() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let entity = EntityBuilder::new().build(&mut ctx).unwrap();
        assert!(store.exists(entity));
    }

    #[test]
    fn test_singleton_steps_last_value_wins() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let builder = EntityBuilder::new()
            .set_translation(Vec3::new(1.0, 0.0, 0.0))
            .set_translation(Vec3::new(2.0, 0.0, 0.0))
            .set_translation(Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(builder.step_count(), 1);

        let entity = builder.build(&mut ctx).unwrap();
        assert_eq!(
            store.get_component::<Translation>(entity).unwrap().value,
            Vec3::new(3.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_add_then_set_collapses_to_one_adding_step() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        // The entity never carried Position, so a bare set would fail; the
        // earlier add keeps the step an add and only the value changes.
        let builder = EntityBuilder::new()
            .add_component::<Position>()
            .set_component_value(Position {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            });
        assert_eq!(builder.step_count(), 1);

        let entity = builder.build(&mut ctx).unwrap();
        assert_eq!(
            *store.get_component::<Position>(entity).unwrap(),
            Position {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }
        );
    }

    #[test]
    fn test_buffer_elements_accumulate_in_order() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let builder = EntityBuilder::new()
            .add_buffer_element(Waypoint(1))
            .add_buffer_element(Waypoint(2))
            .add_buffer_elements([Waypoint(3), Waypoint(4)]);
        assert_eq!(builder.step_count(), 1);

        let entity = builder.build(&mut ctx).unwrap();
        assert_eq!(
            store.get_buffer::<Waypoint>(entity).unwrap(),
            &[Waypoint(1), Waypoint(2), Waypoint(3), Waypoint(4)]
        );
    }

    #[test]
    fn test_steps_apply_in_insertion_order() {
        struct Recorder;
        impl BuildStep for Recorder {
            fn kind(&self) -> StepKind {
                StepKind::Custom("recorder")
            }
            fn apply(
                &self,
                ctx: &mut MutationContext<'_>,
                _variables: &VariableMap,
                entity: Entity,
            ) -> Result<(), ComposeError> {
                // Runs between the two spatial steps; translation must
                // already be visible.
                assert!(ctx.has_component::<Translation>(entity)?);
                assert!(!ctx.has_component::<Scale>(entity)?);
                Ok(())
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        EntityBuilder::new()
            .set_translation(Vec3::ONE)
            .add_step(Recorder)
            .set_scale(2.0)
            .build(&mut ctx)
            .unwrap();
    }

    #[test]
    fn test_set_parent_adds_marker() {
        let mut store = Store::new();
        let parent = store.create_entity();
        let mut ctx = MutationContext::from_store(&mut store);

        let child = EntityBuilder::new().set_parent(parent).build(&mut ctx).unwrap();
        assert_eq!(store.get_component::<Parent>(child).unwrap().value, parent);
        assert!(store.has_component::<LocalToParent>(child));
    }

    #[test]
    fn test_same_builder_description_works_deferred() {
        let describe = || {
            EntityBuilder::new()
                .set_translation(Vec3::new(4.0, 5.0, 6.0))
                .set_parent(Entity::from_raw(1))
                .add_component_value(Faction(3))
        };

        let mut direct_store = Store::new();
        direct_store.create_entity(); // entity 1, the parent
        let direct = describe()
            .build(&mut MutationContext::from_store(&mut direct_store))
            .unwrap();

        let mut deferred_store = Store::new();
        deferred_store.create_entity();
        let mut commands = CommandBuffer::new();
        let pending = describe()
            .build(&mut MutationContext::from_commands(&mut commands))
            .unwrap();
        assert!(pending.is_deferred());
        let remap = commands.apply(&mut deferred_store).unwrap();
        let deferred = remap[&pending];

        // Replay must preserve the translation recorded before the parent.
        assert_eq!(
            direct_store.get_component::<Translation>(direct).unwrap(),
            deferred_store
                .get_component::<Translation>(deferred)
                .unwrap()
        );
        assert_eq!(
            direct_store.get_component::<Faction>(direct).unwrap(),
            deferred_store.get_component::<Faction>(deferred).unwrap()
        );
        assert!(deferred_store.has_component::<LocalToParent>(deferred));
    }

    #[test]
    fn test_build_on_concurrent_slot() {
        let mut store = Store::new();
        let commands = ParallelCommandBuffer::new(2);

        std::thread::scope(|scope| {
            for slot in 0..2 {
                let commands = &commands;
                scope.spawn(move || {
                    let mut ctx = MutationContext::from_parallel(commands, slot);
                    EntityBuilder::new()
                        .add_component_value(Faction(slot as u8))
                        .build(&mut ctx)
                        .unwrap();
                });
            }
        });

        commands.apply_all(&mut store).unwrap();
        assert_eq!(store.entity_count(), 2);
    }

    #[test]
    fn test_variables_reach_hooks_and_steps() {
        struct SpawnCount(u32);

        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let entity = EntityBuilder::new()
            .set_variable(SpawnCount(0))
            .pre_build(|_ctx, variables, _entity| {
                if let Some(count) = variables.get_mut::<SpawnCount>() {
                    count.0 += 1;
                }
                Ok(())
            })
            .post_build(|built| {
                let count = built.get_variable::<SpawnCount>().map_or(0, |c| c.0);
                built.add_component_value(Faction(count as u8))?;
                Ok(())
            })
            .build(&mut ctx)
            .unwrap();

        assert_eq!(*store.get_component::<Faction>(entity).unwrap(), Faction(1));
    }

    #[test]
    fn test_build_and_wrap_allows_followup_mutation() {
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let entity = {
            let mut built = EntityBuilder::new()
                .set_name("drone")
                .build_and_wrap(&mut ctx)
                .unwrap();
            built.add_component_value(Faction(2)).unwrap();
            built.entity()
        };

        assert_eq!(store.get_component::<DebugName>(entity).unwrap().value, "drone");
        assert_eq!(*store.get_component::<Faction>(entity).unwrap(), Faction(2));
    }

    #[test]
    fn test_archetype_strategy_names_entity() {
        struct Probe;
        impl ArchetypeDescriptor for Probe {
            fn name() -> &'static str {
                "Probe"
            }
            fn components() -> Vec<ComponentInfo> {
                vec![ComponentInfo::of::<Position>()]
            }
        }

        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        ArchetypeRegistry::global().reset();

        let entity = EntityBuilder::new()
            .create_from_archetype::<Probe>()
            .build(&mut ctx)
            .unwrap();

        assert!(store.has_component::<Position>(entity));
        let name = &store.get_component::<DebugName>(entity).unwrap().value;
        assert!(name.starts_with("Probe "));
    }

    #[test]
    fn test_dropped_builder_is_counted() {
        let before = leaked_session_count();
        {
            let _builder = EntityBuilder::new().set_scale(1.5);
        }
        assert_eq!(leaked_session_count(), before + 1);

        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);
        let before = leaked_session_count();
        EntityBuilder::new().build(&mut ctx).unwrap();
        assert_eq!(leaked_session_count(), before);
    }
}
