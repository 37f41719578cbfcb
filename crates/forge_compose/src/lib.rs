//! # forge_compose
//!
//! Entity-composition layer over the `forge_component` substrate. Three
//! pieces work together:
//!
//! - [`MutationContext`]: one mutation surface over direct store writes,
//!   recorded command buffers, and per-slot concurrent recording, so
//!   composition code is written once and runs on any backend.
//! - [`ArchetypeRegistry`]: memoized archetype construction from
//!   [`ArchetypeDescriptor`] types, with optional warm-up at startup.
//! - [`EntityBuilder`]: an ordered, deduplicated list of build steps plus a
//!   creation strategy, replayed against a context in one `build` call.

mod builder;
mod built;
mod components;
mod context;
mod error;
mod registry;
mod steps;
mod strategy;
mod variables;

pub use builder::{leaked_session_count, EntityBuilder};
pub use built::BuiltEntity;
pub use components::DebugName;
pub use context::MutationContext;
pub use error::ComposeError;
pub use registry::{ArchetypeDescriptor, ArchetypeRegistration, ArchetypeRegistry};
pub use steps::{BuildStep, StepKind, WriteMode};
pub use strategy::{
    CreateEmpty, CreateFromArchetype, CreateFromHandle, CreateFromTemplate, CreationStrategy,
};
pub use variables::VariableMap;
