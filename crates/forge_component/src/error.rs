//! Error type for store and command-buffer operations.

use thiserror::Error;

use crate::archetype::ArchetypeHandle;
use crate::entity::Entity;

/// Failures raised by the substrate: the live store, command-buffer playback
/// and the concurrent recording front-end.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity {0} not found")]
    EntityNotFound(Entity),

    #[error("component '{component}' not found on entity {entity}")]
    ComponentNotFound {
        entity: Entity,
        component: &'static str,
    },

    #[error("buffer of '{element}' not found on entity {entity}")]
    BufferNotFound {
        entity: Entity,
        element: &'static str,
    },

    #[error("buffer element type mismatch: expected '{expected}'")]
    ElementTypeMismatch { expected: &'static str },

    #[error("archetype must contain at least one component")]
    EmptyArchetype,

    #[error("unknown archetype handle {0}")]
    UnknownArchetype(ArchetypeHandle),

    #[error("worker slot {slot} out of range ({slots} slots)")]
    InvalidSlot { slot: usize, slots: usize },

    #[error("pending entity {0} was never created in the buffer being played back")]
    UnresolvedEntity(Entity),
}
