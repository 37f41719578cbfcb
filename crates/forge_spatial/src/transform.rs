//! Spatial components.
//!
//! Position, orientation and scale are separate components rather than one
//! combined transform, so composition steps can write each independently.
//! Parenting is expressed with [`Parent`] plus the [`LocalToParent`] marker
//! that tells transform systems to resolve the entity in its parent's space.

use forge_component::{Component, Entity};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// World-space (or, under [`LocalToParent`], parent-space) position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Translation {
    pub value: Vec3,
}

impl Translation {
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            value: Vec3::new(x, y, z),
        }
    }
}

impl Component for Translation {
    fn type_name() -> &'static str {
        "Translation"
    }
}

/// Orientation as a unit quaternion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rotation {
    pub value: Quat,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            value: Quat::IDENTITY,
        }
    }
}

impl Component for Rotation {
    fn type_name() -> &'static str {
        "Rotation"
    }
}

/// Uniform scale factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Scale {
    pub value: f32,
}

impl Default for Scale {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl Component for Scale {
    fn type_name() -> &'static str {
        "Scale"
    }
}

/// Link to the entity's parent in a transform hierarchy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Parent {
    pub value: Entity,
}

impl Default for Parent {
    fn default() -> Self {
        Self {
            value: Entity::NULL,
        }
    }
}

impl Component for Parent {
    fn type_name() -> &'static str {
        "Parent"
    }
}

/// Marker: the entity's spatial components are relative to its [`Parent`].
///
/// Always attached together with [`Parent`] when an entity is reparented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalToParent;

impl Component for LocalToParent {
    fn type_name() -> &'static str {
        "LocalToParent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_identity() {
        assert_eq!(Translation::default().value, Vec3::ZERO);
        assert_eq!(Rotation::default().value, Quat::IDENTITY);
        assert_eq!(Scale::default().value, 1.0);
        assert!(Parent::default().value.is_null());
    }

    #[test]
    fn test_type_ids_are_distinct() {
        let ids = [
            Translation::component_type_id(),
            Rotation::component_type_id(),
            Scale::component_type_id(),
            Parent::component_type_id(),
            LocalToParent::component_type_id(),
        ];
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
