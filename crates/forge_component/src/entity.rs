//! Entity type and allocation utilities.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data.
//! Live ids are handed out by the [`EntityAllocator`] owned by the store;
//! command buffers hand out *pending* ids (forward references) that are
//! remapped to live ids at playback.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers — they carry no data of their own.
/// Components are attached to entities to give them meaning.
///
/// Ids fall in two ranges: live ids allocated by a store, and pending ids
/// allocated by a command buffer. A pending id is only meaningful inside the
/// buffer that produced it, until that buffer is played back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

/// Marks ids handed out by a command buffer before playback.
const DEFERRED_BIT: u64 = 1 << 63;

impl Entity {
    /// The null / invalid entity sentinel.
    pub const NULL: Entity = Entity(0);

    /// Create an entity from a raw `u64` identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is the null sentinel.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this id is a forward reference recorded by a
    /// command buffer and not yet resolved against a live store.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        self.0 & DEFERRED_BIT != 0
    }

    /// Construct a pending id for a command-buffer slot.
    ///
    /// The slot tag keeps pending ids from different worker slots distinct;
    /// plain (non-concurrent) buffers all use tag 0.
    pub(crate) const fn deferred(slot_tag: u32, seq: u32) -> Self {
        Entity(DEFERRED_BIT | ((slot_tag as u64) << 32) | seq as u64)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_deferred() {
            write!(f, "Entity(pending {})", self.0 & !DEFERRED_BIT)
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

/// Allocates monotonically increasing live entity ids.
///
/// The allocator lives in the store and is the single source of truth for
/// entity identity; this layer never invents ids on its own.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator. Ids start at 1 (0 is reserved for [`Entity::NULL`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity id.
    pub fn allocate(&mut self) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        Entity(id)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_null() {
        assert!(Entity::NULL.is_null());
        assert!(!Entity::from_raw(7).is_null());
    }

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();
        assert_eq!(e1.to_raw(), 1);
        assert_eq!(e2.to_raw(), 2);
        assert_eq!(alloc.count(), 2);
    }

    #[test]
    fn test_deferred_ids_are_marked() {
        let e = Entity::deferred(0, 1);
        assert!(e.is_deferred());
        assert!(!Entity::from_raw(1).is_deferred());
    }

    #[test]
    fn test_deferred_ids_differ_across_slots() {
        assert_ne!(Entity::deferred(1, 0), Entity::deferred(2, 0));
        assert_ne!(Entity::deferred(1, 0), Entity::deferred(1, 1));
    }
}
