//! Spawn demo — composes entities through every mutation backend.
//!
//! Builds a small squad three ways: directly against the store, through a
//! recorded command buffer, and concurrently from worker threads. The same
//! builder description is used throughout; only the context changes.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use forge_component::{
    CommandBuffer, Component, ComponentInfo, ParallelCommandBuffer, Store,
};
use forge_compose::{
    ArchetypeDescriptor, ArchetypeRegistration, ArchetypeRegistry, DebugName, EntityBuilder,
    MutationContext,
};
use forge_spatial::{Translation, Vec3};

#[derive(Debug, Clone, Default, PartialEq)]
struct Health {
    current: f32,
    max: f32,
}

impl Component for Health {
    fn type_name() -> &'static str {
        "Health"
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PatrolPoint(Vec3);

impl forge_component::BufferElement for PatrolPoint {
    fn type_name() -> &'static str {
        "PatrolPoint"
    }
}

struct Drone;

impl ArchetypeDescriptor for Drone {
    fn name() -> &'static str {
        "Drone"
    }

    fn components() -> Vec<ComponentInfo> {
        vec![
            ComponentInfo::of::<Health>(),
            ComponentInfo::of::<Translation>(),
        ]
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spawn=info".parse()?))
        .init();

    let mut store = Store::new();

    // Warm the archetype cache up front so deferred builds can use it.
    {
        let mut ctx = MutationContext::from_store(&mut store);
        ArchetypeRegistry::global().warm_up(&[ArchetypeRegistration::of::<Drone>()], &mut ctx)?;
    }

    // Direct: mutations land immediately.
    let leader = {
        let mut ctx = MutationContext::from_store(&mut store);
        EntityBuilder::new()
            .create_from_archetype::<Drone>()
            .set_translation(Vec3::new(0.0, 1.0, 0.0))
            .add_component_value(Health {
                current: 100.0,
                max: 100.0,
            })
            .set_name("squad leader")
            .build(&mut ctx)?
    };
    info!(%leader, "built directly");

    // Deferred: record now, play back later.
    let mut commands = CommandBuffer::new();
    let pending = {
        let mut ctx = MutationContext::from_commands(&mut commands);
        EntityBuilder::new()
            .create_from_archetype::<Drone>()
            .set_parent(leader)
            .add_buffer_element(PatrolPoint(Vec3::ZERO))
            .add_buffer_element(PatrolPoint(Vec3::X))
            .build(&mut ctx)?
    };
    let remap = commands.apply(&mut store)?;
    info!(pending = %pending, live = %remap[&pending], "deferred build played back");

    // Concurrent: each worker records into its own slot.
    let parallel = ParallelCommandBuffer::new(4);
    std::thread::scope(|scope| {
        for slot in 0..parallel.slot_count() {
            let parallel = &parallel;
            scope.spawn(move || {
                let mut ctx = MutationContext::from_parallel(parallel, slot);
                EntityBuilder::new()
                    .create_from_archetype::<Drone>()
                    .set_translation(Vec3::new(slot as f32, 0.0, 0.0))
                    .build(&mut ctx)
                    .expect("worker build failed");
            });
        }
    });
    let spawned = parallel.apply_all(&mut store)?.len();
    info!(spawned, total = store.entity_count(), "workers played back");

    let name = store.get_component::<DebugName>(leader)?;
    info!(leader = %name.value, "done");
    Ok(())
}
