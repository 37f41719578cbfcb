//! Components owned by the composition layer itself.

use forge_component::Component;

/// A human-readable entity label.
///
/// Naming an entity through [`MutationContext::set_name`] attaches this
/// component; there is no separate name table.
///
/// [`MutationContext::set_name`]: crate::MutationContext::set_name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugName {
    pub value: String,
}

impl Component for DebugName {
    fn type_name() -> &'static str {
        "DebugName"
    }
}
