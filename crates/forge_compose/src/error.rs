//! Error type for the composition layer.

use forge_component::StoreError;
use thiserror::Error;

/// Failures raised by mutation contexts, the archetype registry and entity
/// builders.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The operation needs a live store and the context only records
    /// commands.
    #[error("operation '{operation}' is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: &'static str,
        backend: &'static str,
    },

    /// A descriptor declared no components at all.
    #[error("archetype descriptor '{descriptor}' declares no components")]
    EmptyDescriptor { descriptor: &'static str },

    /// The store rejected the component set a descriptor produced.
    #[error("failed to build archetype for descriptor '{descriptor}'")]
    ArchetypeConstruction {
        descriptor: &'static str,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
