//! Archetype handles and layouts.
//!
//! An archetype is a fixed set of component types describing an entity's
//! initial shape. Layouts are built once by the store and referred to by a
//! cheap copyable [`ArchetypeHandle`] afterwards.

use serde::{Deserialize, Serialize};

use crate::component::ComponentInfo;
use crate::error::StoreError;

/// An opaque handle to an archetype layout built by a store.
///
/// Handles are only meaningful for the store that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchetypeHandle(pub(crate) u32);

impl ArchetypeHandle {
    /// Index into the owning store's layout table.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ArchetypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Archetype(#{})", self.0)
    }
}

/// The component set behind a handle, deduplicated and sorted by type id so
/// equal sets produce identical layouts regardless of declaration order.
#[derive(Debug, Clone)]
pub struct ArchetypeLayout {
    components: Vec<ComponentInfo>,
}

impl ArchetypeLayout {
    /// Build a layout from a raw descriptor list.
    ///
    /// Duplicate component types collapse to one entry; an empty list is a
    /// construction failure rather than a silently useless layout.
    pub(crate) fn new(mut components: Vec<ComponentInfo>) -> Result<Self, StoreError> {
        if components.is_empty() {
            return Err(StoreError::EmptyArchetype);
        }
        components.sort_by_key(ComponentInfo::type_id);
        components.dedup_by_key(|info| info.type_id());
        Ok(Self { components })
    }

    /// The components in this layout, sorted by type id.
    #[must_use]
    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    /// Number of distinct component types in the layout.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns `true` if the layout has no components (never true for a
    /// successfully constructed layout).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    #[derive(Debug, Clone, Default)]
    struct A;
    impl Component for A {
        fn type_name() -> &'static str {
            "A"
        }
    }

    #[derive(Debug, Clone, Default)]
    struct B;
    impl Component for B {
        fn type_name() -> &'static str {
            "B"
        }
    }

    #[test]
    fn test_layout_dedups_and_sorts() {
        let layout = ArchetypeLayout::new(vec![
            ComponentInfo::of::<B>(),
            ComponentInfo::of::<A>(),
            ComponentInfo::of::<B>(),
        ])
        .unwrap();
        assert_eq!(layout.len(), 2);
        let ids: Vec<_> = layout.components().iter().map(|c| c.type_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_empty_layout_is_an_error() {
        assert!(matches!(
            ArchetypeLayout::new(Vec::new()),
            Err(StoreError::EmptyArchetype)
        ));
    }
}
