//! Dynamic per-entity element collections ("buffers").
//!
//! A buffer is an ordered `Vec<T>` attached to an entity, keyed by the
//! element type. Buffers are distinct from components: appends are
//! cumulative, and the collection as a whole is added/removed as a unit.

use std::any::Any;

use crate::component::ComponentTypeId;
use crate::error::StoreError;

/// Element type of a dynamic buffer.
///
/// Like components, buffer elements are identified by a string name hashed
/// with FNV-1a, and must be cloneable so template instantiation can deep-copy
/// the collection.
pub trait BufferElement: Send + Sync + Clone + 'static {
    /// A human-readable name for this element type.
    fn type_name() -> &'static str;

    /// Returns the type id the buffer is keyed by.
    fn element_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// Object-safe view of a typed buffer, for type-erased storage.
pub(crate) trait BufferObject: Any + Send + Sync {
    fn element_type_id(&self) -> ComponentTypeId;
    fn element_type_name(&self) -> &'static str;
    fn len(&self) -> usize;

    /// Push an erased element; fails if the element's concrete type does not
    /// match the buffer's element type.
    fn push_erased(&mut self, element: Box<dyn Any + Send + Sync>) -> Result<(), StoreError>;

    /// Remove and return every element, oldest first, as erased boxes.
    fn drain_erased(&mut self) -> Vec<Box<dyn Any + Send + Sync>>;

    fn clone_boxed(&self) -> Box<dyn BufferObject>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The concrete storage behind an erased buffer.
#[derive(Debug, Clone)]
pub(crate) struct TypedBuffer<T: BufferElement> {
    elements: Vec<T>,
}

impl<T: BufferElement> TypedBuffer<T> {
    pub(crate) fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub(crate) fn elements(&self) -> &[T] {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut Vec<T> {
        &mut self.elements
    }
}

impl<T: BufferElement> BufferObject for TypedBuffer<T> {
    fn element_type_id(&self) -> ComponentTypeId {
        T::element_type_id()
    }

    fn element_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn len(&self) -> usize {
        self.elements.len()
    }

    fn push_erased(&mut self, element: Box<dyn Any + Send + Sync>) -> Result<(), StoreError> {
        match element.downcast::<T>() {
            Ok(element) => {
                self.elements.push(*element);
                Ok(())
            }
            Err(_) => Err(StoreError::ElementTypeMismatch {
                expected: T::type_name(),
            }),
        }
    }

    fn drain_erased(&mut self) -> Vec<Box<dyn Any + Send + Sync>> {
        self.elements
            .drain(..)
            .map(|element| Box::new(element) as Box<dyn Any + Send + Sync>)
            .collect()
    }

    fn clone_boxed(&self) -> Box<dyn BufferObject> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn BufferObject> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl std::fmt::Debug for Box<dyn BufferObject> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<buffer of {} x{}>", self.element_type_name(), self.len())
    }
}
