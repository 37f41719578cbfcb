//! Deferred mutation via recorded command buffers.
//!
//! A [`CommandBuffer`] records structural changes without touching the store.
//! Entities created through a buffer receive *pending* ids that can be used
//! in later commands of the same buffer (forward references); playback
//! resolves them to live ids and returns the mapping.

use std::any::Any;
use std::collections::HashMap;

use crate::archetype::ArchetypeHandle;
use crate::buffer::{BufferElement, BufferObject, TypedBuffer};
use crate::component::{Component, ComponentObject, ComponentTypeId};
use crate::entity::Entity;
use crate::error::StoreError;
use crate::store::Store;

/// One recorded mutation.
enum Command {
    Create {
        pending: Entity,
    },
    CreateFromArchetype {
        pending: Entity,
        handle: ArchetypeHandle,
    },
    Instantiate {
        pending: Entity,
        template: Entity,
    },
    Destroy {
        entity: Entity,
    },
    AddComponent {
        entity: Entity,
        value: Box<dyn ComponentObject>,
    },
    SetComponent {
        entity: Entity,
        value: Box<dyn ComponentObject>,
    },
    RemoveComponent {
        entity: Entity,
        type_id: ComponentTypeId,
        type_name: &'static str,
    },
    AddSharedComponent {
        entity: Entity,
        value: Box<dyn ComponentObject>,
    },
    AddBuffer {
        entity: Entity,
        buffer: Box<dyn BufferObject>,
    },
    AppendToBuffer {
        entity: Entity,
        type_id: ComponentTypeId,
        element: Box<dyn Any + Send + Sync>,
        new_buffer: fn() -> Box<dyn BufferObject>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Create { pending } => write!(f, "Create({pending})"),
            Command::CreateFromArchetype { pending, handle } => {
                write!(f, "CreateFromArchetype({pending}, {handle})")
            }
            Command::Instantiate { pending, template } => {
                write!(f, "Instantiate({pending} from {template})")
            }
            Command::Destroy { entity } => write!(f, "Destroy({entity})"),
            Command::AddComponent { entity, value } => {
                write!(f, "AddComponent({entity}, {})", value.type_name_dyn())
            }
            Command::SetComponent { entity, value } => {
                write!(f, "SetComponent({entity}, {})", value.type_name_dyn())
            }
            Command::RemoveComponent {
                entity, type_name, ..
            } => write!(f, "RemoveComponent({entity}, {type_name})"),
            Command::AddSharedComponent { entity, value } => {
                write!(f, "AddSharedComponent({entity}, {})", value.type_name_dyn())
            }
            Command::AddBuffer { entity, buffer } => {
                write!(f, "AddBuffer({entity}, {})", buffer.element_type_name())
            }
            Command::AppendToBuffer { entity, .. } => write!(f, "AppendToBuffer({entity})"),
        }
    }
}

/// Records structural changes for later playback against a [`Store`].
///
/// Commands replay in recording order. Playback consumes the buffer.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    slot_tag: u32,
    next_seq: u32,
}

impl CommandBuffer {
    /// Creates an empty command buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer whose pending ids carry a worker-slot tag, keeping
    /// them distinct from ids minted by sibling slots.
    pub(crate) fn for_slot(slot_tag: u32) -> Self {
        Self {
            commands: Vec::new(),
            slot_tag,
            next_seq: 0,
        }
    }

    fn pending(&mut self) -> Entity {
        let seq = self.next_seq;
        self.next_seq += 1;
        Entity::deferred(self.slot_tag, seq)
    }

    /// Number of recorded commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    // -- Recording --

    /// Records entity creation and returns the pending id.
    pub fn create_entity(&mut self) -> Entity {
        let pending = self.pending();
        self.commands.push(Command::Create { pending });
        pending
    }

    /// Records creation from an archetype. An unknown handle only surfaces
    /// at playback.
    pub fn create_entity_from_archetype(&mut self, handle: ArchetypeHandle) -> Entity {
        let pending = self.pending();
        self.commands
            .push(Command::CreateFromArchetype { pending, handle });
        pending
    }

    /// Records a deep copy of `template`. The template may itself be a
    /// pending id from this buffer.
    pub fn instantiate(&mut self, template: Entity) -> Entity {
        let pending = self.pending();
        self.commands.push(Command::Instantiate { pending, template });
        pending
    }

    /// Records entity destruction.
    pub fn destroy(&mut self, entity: Entity) {
        self.commands.push(Command::Destroy { entity });
    }

    /// Records attaching `value`, replacing any component of the same type.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands.push(Command::AddComponent {
            entity,
            value: Box::new(value),
        });
    }

    /// Records overwriting an existing component; playback fails if the
    /// entity does not carry it by then.
    pub fn set_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands.push(Command::SetComponent {
            entity,
            value: Box::new(value),
        });
    }

    /// Records removing a component.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.commands.push(Command::RemoveComponent {
            entity,
            type_id: T::component_type_id(),
            type_name: T::type_name(),
        });
    }

    /// Records attaching a shared component.
    pub fn add_shared_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.commands.push(Command::AddSharedComponent {
            entity,
            value: Box::new(value),
        });
    }

    /// Records a buffer of `T` and returns its element list for staging.
    ///
    /// At playback the staged elements are appended to the entity's existing
    /// buffer of `T`, or the buffer is inserted wholesale if absent.
    pub fn add_buffer<T: BufferElement>(&mut self, entity: Entity) -> &mut Vec<T> {
        self.commands.push(Command::AddBuffer {
            entity,
            buffer: Box::new(TypedBuffer::<T>::new()),
        });
        let Some(Command::AddBuffer { buffer, .. }) = self.commands.last_mut() else {
            unreachable!("command pushed above");
        };
        match buffer.as_any_mut().downcast_mut::<TypedBuffer<T>>() {
            Some(staged) => staged.elements_mut(),
            // The buffer was created with element type T two lines up.
            None => unreachable!(),
        }
    }

    /// Records appending one element, creating the buffer at playback if the
    /// entity lacks it.
    pub fn append_to_buffer<T: BufferElement>(&mut self, entity: Entity, element: T) {
        self.commands.push(Command::AppendToBuffer {
            entity,
            type_id: T::element_type_id(),
            element: Box::new(element),
            new_buffer: || Box::new(TypedBuffer::<T>::new()),
        });
    }

    // -- Playback --

    /// Replays every recorded command against `store` in recording order.
    ///
    /// Returns the mapping from pending ids to the live ids that creation
    /// commands produced. Referencing a pending id this buffer never created
    /// fails with [`StoreError::UnresolvedEntity`].
    pub fn apply(self, store: &mut Store) -> Result<HashMap<Entity, Entity>, StoreError> {
        let mut remap: HashMap<Entity, Entity> = HashMap::new();
        for command in self.commands {
            match command {
                Command::Create { pending } => {
                    let live = store.create_entity();
                    remap.insert(pending, live);
                }
                Command::CreateFromArchetype { pending, handle } => {
                    let live = store.create_entity_from_archetype(handle)?;
                    remap.insert(pending, live);
                }
                Command::Instantiate { pending, template } => {
                    let template = resolve(&remap, template)?;
                    let live = store.instantiate(template)?;
                    remap.insert(pending, live);
                }
                Command::Destroy { entity } => {
                    store.destroy(resolve(&remap, entity)?)?;
                }
                Command::AddComponent { entity, value } => {
                    store.add_boxed(resolve(&remap, entity)?, value)?;
                }
                Command::SetComponent { entity, value } => {
                    store.set_boxed(resolve(&remap, entity)?, value)?;
                }
                Command::RemoveComponent {
                    entity,
                    type_id,
                    type_name,
                } => {
                    store.remove_by_id(resolve(&remap, entity)?, type_id, type_name)?;
                }
                Command::AddSharedComponent { entity, value } => {
                    store.add_shared_boxed(resolve(&remap, entity)?, value)?;
                }
                Command::AddBuffer { entity, buffer } => {
                    store.merge_buffer_boxed(resolve(&remap, entity)?, buffer)?;
                }
                Command::AppendToBuffer {
                    entity,
                    type_id,
                    element,
                    new_buffer,
                } => {
                    store.append_erased(resolve(&remap, entity)?, type_id, element, new_buffer)?;
                }
            }
        }
        Ok(remap)
    }
}

fn resolve(remap: &HashMap<Entity, Entity>, entity: Entity) -> Result<Entity, StoreError> {
    if entity.is_deferred() {
        remap
            .get(&entity)
            .copied()
            .ok_or(StoreError::UnresolvedEntity(entity))
    } else {
        Ok(entity)
    }
}
