//! # forge_spatial
//!
//! Spatial components for the entity-composition layer. Re-exports [`glam`]
//! for linear algebra and defines position/orientation/hierarchy types that
//! implement [`Component`](forge_component::Component).

pub mod transform;

// Re-export glam types for convenience.
pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use transform::{LocalToParent, Parent, Rotation, Scale, Translation};
