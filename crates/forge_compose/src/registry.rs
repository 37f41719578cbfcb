//! Cached archetype construction.
//!
//! Archetype layouts are expensive to rebuild and cheap to reference, so the
//! [`ArchetypeRegistry`] memoizes one [`ArchetypeHandle`] per descriptor
//! type. The cache entry is held locked while the layout is built, so
//! concurrent first requests for the same descriptor materialize it exactly
//! once.

use std::any::TypeId;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use forge_component::{ArchetypeHandle, ComponentInfo};
use once_cell::sync::Lazy;

use crate::context::MutationContext;
use crate::error::ComposeError;

/// Declares an archetype: a name and the component set entities of this
/// shape start with.
///
/// `components` is the base set; `extra_components` lets a descriptor extend
/// another descriptor's set without repeating it.
pub trait ArchetypeDescriptor: 'static {
    /// The descriptor's name, used in diagnostics and entity labels.
    fn name() -> &'static str;

    /// The base component set.
    fn components() -> Vec<ComponentInfo>;

    /// Additional components appended to the base set.
    fn extra_components() -> Vec<ComponentInfo> {
        Vec::new()
    }
}

/// Memoizes archetype handles per descriptor type.
#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    cache: DashMap<TypeId, ArchetypeHandle>,
}

static GLOBAL: Lazy<ArchetypeRegistry> = Lazy::new(ArchetypeRegistry::default);

impl ArchetypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by archetype creation strategies.
    #[must_use]
    pub fn global() -> &'static ArchetypeRegistry {
        &GLOBAL
    }

    /// Returns the cached handle for `D`, building the layout through `ctx`
    /// on first request.
    ///
    /// A descriptor whose combined component set is empty fails with
    /// [`ComposeError::EmptyDescriptor`] and is not cached. Building needs a
    /// context backend that supports `build_archetype`.
    pub fn get_or_create<D: ArchetypeDescriptor>(
        &self,
        ctx: &mut MutationContext<'_>,
    ) -> Result<ArchetypeHandle, ComposeError> {
        match self.cache.entry(TypeId::of::<D>()) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let mut components = D::components();
                components.extend(D::extra_components());
                if components.is_empty() {
                    return Err(ComposeError::EmptyDescriptor {
                        descriptor: D::name(),
                    });
                }
                let handle = ctx.build_archetype(components).map_err(|error| match error {
                    ComposeError::Store(source) => ComposeError::ArchetypeConstruction {
                        descriptor: D::name(),
                        source,
                    },
                    other => other,
                })?;
                entry.insert(handle);
                tracing::debug!(descriptor = D::name(), %handle, "archetype built");
                Ok(handle)
            }
        }
    }

    /// Number of cached handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drops every cached handle. Required when the backing store is torn
    /// down, since handles are only meaningful for the store that built
    /// them.
    pub fn reset(&self) {
        self.cache.clear();
    }

    /// Builds every registered archetype up front.
    ///
    /// A failing registration is logged and skipped so one bad descriptor
    /// does not block the rest; the first failure is returned once all
    /// registrations have been attempted.
    pub fn warm_up(
        &self,
        registrations: &[ArchetypeRegistration],
        ctx: &mut MutationContext<'_>,
    ) -> Result<(), ComposeError> {
        let mut first_failure = None;
        for registration in registrations {
            match (registration.register)(self, ctx) {
                Ok(handle) => {
                    tracing::debug!(descriptor = registration.name, %handle, "warmed up");
                }
                Err(error) => {
                    tracing::warn!(descriptor = registration.name, %error, "warm-up failed");
                    first_failure.get_or_insert(error);
                }
            }
        }
        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// One entry in a warm-up list, erasing the descriptor type behind a
/// registration function.
#[derive(Clone, Copy)]
pub struct ArchetypeRegistration {
    name: &'static str,
    register: fn(&ArchetypeRegistry, &mut MutationContext<'_>) -> Result<ArchetypeHandle, ComposeError>,
}

impl ArchetypeRegistration {
    /// The registration for descriptor `D`.
    #[must_use]
    pub fn of<D: ArchetypeDescriptor>() -> Self {
        Self {
            name: D::name(),
            register: |registry, ctx| registry.get_or_create::<D>(ctx),
        }
    }

    /// The descriptor's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for ArchetypeRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArchetypeRegistration({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_component::{Component, Store};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    struct Hull;
    impl Component for Hull {
        fn type_name() -> &'static str {
            "Hull"
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Engine;
    impl Component for Engine {
        fn type_name() -> &'static str {
            "Engine"
        }
    }

    struct Ship;
    impl ArchetypeDescriptor for Ship {
        fn name() -> &'static str {
            "Ship"
        }
        fn components() -> Vec<ComponentInfo> {
            vec![ComponentInfo::of::<Hull>()]
        }
        fn extra_components() -> Vec<ComponentInfo> {
            vec![ComponentInfo::of::<Engine>()]
        }
    }

    struct Station;
    impl ArchetypeDescriptor for Station {
        fn name() -> &'static str {
            "Station"
        }
        fn components() -> Vec<ComponentInfo> {
            vec![ComponentInfo::of::<Hull>()]
        }
    }

    struct Hollow;
    impl ArchetypeDescriptor for Hollow {
        fn name() -> &'static str {
            "Hollow"
        }
        fn components() -> Vec<ComponentInfo> {
            Vec::new()
        }
    }

    #[test]
    fn test_get_or_create_memoizes() {
        let registry = ArchetypeRegistry::new();
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let first = registry.get_or_create::<Ship>(&mut ctx).unwrap();
        let second = registry.get_or_create::<Ship>(&mut ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(store.archetype_count(), 1);
    }

    #[test]
    fn test_extra_components_are_included() {
        let registry = ArchetypeRegistry::new();
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let handle = registry.get_or_create::<Ship>(&mut ctx).unwrap();
        assert_eq!(store.layout(handle).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_descriptor_is_rejected_and_not_cached() {
        let registry = ArchetypeRegistry::new();
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let err = registry.get_or_create::<Hollow>(&mut ctx).unwrap_err();
        assert!(matches!(
            err,
            ComposeError::EmptyDescriptor {
                descriptor: "Hollow"
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reset_forces_rebuild() {
        let registry = ArchetypeRegistry::new();
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        registry.get_or_create::<Ship>(&mut ctx).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        registry.get_or_create::<Ship>(&mut ctx).unwrap();
        assert_eq!(store.archetype_count(), 2);
    }

    #[test]
    fn test_warm_up_continues_past_failures() {
        let registry = ArchetypeRegistry::new();
        let mut store = Store::new();
        let mut ctx = MutationContext::from_store(&mut store);

        let registrations = [
            ArchetypeRegistration::of::<Ship>(),
            ArchetypeRegistration::of::<Hollow>(),
            ArchetypeRegistration::of::<Station>(),
        ];
        let err = registry.warm_up(&registrations, &mut ctx).unwrap_err();

        // The bad descriptor is named, the good ones are still cached.
        assert!(matches!(
            err,
            ComposeError::EmptyDescriptor {
                descriptor: "Hollow"
            }
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_first_request_builds_once() {
        let registry = ArchetypeRegistry::new();
        let store = Mutex::new(Store::new());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let mut store = store.lock().unwrap();
                    let mut ctx = MutationContext::from_store(&mut store);
                    registry.get_or_create::<Ship>(&mut ctx).unwrap();
                });
            }
        });

        assert_eq!(registry.len(), 1);
        assert_eq!(store.into_inner().unwrap().archetype_count(), 1);
    }
}
