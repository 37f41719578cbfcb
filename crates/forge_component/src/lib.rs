//! Entity/component substrate: entities, components, buffers, archetype
//! layouts, and the live store plus its deferred command-buffer front-ends.
//!
//! This crate is deliberately small. It knows nothing about composition
//! policy (builders, registries, mutation facades); those live in
//! `forge_compose` and talk to this crate through the types re-exported
//! below.

mod archetype;
mod buffer;
mod command;
mod component;
mod entity;
mod error;
mod parallel;
mod store;

pub use archetype::{ArchetypeHandle, ArchetypeLayout};
pub use buffer::BufferElement;
pub use command::CommandBuffer;
pub use component::{Component, ComponentInfo, ComponentObject, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use error::StoreError;
pub use parallel::ParallelCommandBuffer;
pub use store::Store;
