//! Core [`Component`] trait and runtime component descriptors.
//!
//! Every piece of data attached to an entity implements [`Component`]. The
//! trait requires `Send + Sync + Clone + 'static`: values are cloned when an
//! entity is instantiated from a template, and cross worker threads inside
//! concurrent command buffers.
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash, so the id is deterministic across builds and does
//! not depend on Rust's `TypeId` ordering.

use std::any::Any;

use serde::{Deserialize, Serialize};

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::from_name(T::type_name())
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use forge_component::Component;
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Send + Sync + Clone + 'static {
    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// Runtime descriptor for a component type, used when assembling archetypes.
///
/// Carries the id, the name (for error reporting), and a default-constructor
/// so a store can materialise an instance when creating an entity from an
/// archetype.
#[derive(Clone)]
pub struct ComponentInfo {
    type_id: ComponentTypeId,
    name: &'static str,
    default_fn: fn() -> Box<dyn ComponentObject>,
}

impl ComponentInfo {
    /// Build the descriptor for a component type.
    #[must_use]
    pub fn of<T: Component + Default>() -> Self {
        Self {
            type_id: ComponentTypeId::of::<T>(),
            name: T::type_name(),
            default_fn: || Box::new(T::default()),
        }
    }

    /// The component's unique type id.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// The component's human-readable name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Materialise a default-valued instance of the component.
    pub(crate) fn instantiate_default(&self) -> Box<dyn ComponentObject> {
        (self.default_fn)()
    }
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentInfo({})", self.name)
    }
}

impl PartialEq for ComponentInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentInfo {}

/// Object-safe view of a component value, used for type-erased storage in
/// the store and in recorded commands.
pub trait ComponentObject: Any + Send + Sync {
    /// The component's type id.
    fn type_id_dyn(&self) -> ComponentTypeId;

    /// The component's type name.
    fn type_name_dyn(&self) -> &'static str;

    /// Clone the value behind the erasure.
    fn clone_boxed(&self) -> Box<dyn ComponentObject>;

    /// Borrow as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentObject for T {
    fn type_id_dyn(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn type_name_dyn(&self) -> &'static str {
        T::type_name()
    }

    fn clone_boxed(&self) -> Box<dyn ComponentObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn ComponentObject> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl std::fmt::Debug for Box<dyn ComponentObject> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.type_name_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_type_id_is_stable() {
        assert_eq!(Health::component_type_id(), ComponentTypeId::of::<Health>());
        assert_eq!(
            Health::component_type_id(),
            ComponentTypeId::from_name("Health")
        );
    }

    #[test]
    fn test_type_id_differs_between_names() {
        assert_ne!(
            ComponentTypeId::from_name("Health"),
            ComponentTypeId::from_name("Velocity")
        );
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_component_info_default_construction() {
        let info = ComponentInfo::of::<Health>();
        assert_eq!(info.type_id(), Health::component_type_id());
        assert_eq!(info.name(), "Health");

        let value = info.instantiate_default();
        let health = value.as_any().downcast_ref::<Health>().unwrap();
        assert_eq!(*health, Health::default());
    }

    #[test]
    fn test_erased_clone_preserves_value() {
        let original = Health {
            current: 40.0,
            max: 100.0,
        };
        let boxed: Box<dyn ComponentObject> = Box::new(original.clone());
        let cloned = boxed.clone();
        let restored = cloned.as_any().downcast_ref::<Health>().unwrap();
        assert_eq!(*restored, original);
    }
}
