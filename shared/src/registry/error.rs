use thiserror::Error;

use crate::handle::NetHandle;

/// Errors that can occur during object registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every internal index up to the configured cap is in use
    #[error("Internal index space exhausted: all {max_object_count} indices are in use")]
    IndexSpaceExhausted { max_object_count: u32 },

    /// A handle was registered twice
    #[error("Handle {handle} is already registered")]
    HandleAlreadyRegistered { handle: NetHandle },

    /// A handle is not registered
    #[error("Handle {handle} is not registered")]
    UnknownHandle { handle: NetHandle },

    /// The object is being destroyed and can no longer be changed
    #[error("Object {handle} is pending destroy")]
    ObjectPendingDestroy { handle: NetHandle },

    /// A subobject was attached twice, or to itself
    #[error("Object {sub_object} cannot become a subobject of {owner}")]
    InvalidSubObject { owner: NetHandle, sub_object: NetHandle },

    /// A handle expected to be a subobject is a root
    #[error("Object {handle} is not a subobject")]
    NotASubObject { handle: NetHandle },

    /// An object was made dependent on itself
    #[error("Object {handle} cannot depend on itself")]
    SelfDependency { handle: NetHandle },

    /// The dependency already exists
    #[error("Object {dependent} is already a dependent of {parent}")]
    DuplicateDependentObject { parent: NetHandle, dependent: NetHandle },

    /// Linking would make the dependent-object graph cyclic
    #[error("Making {dependent} a dependent of {parent} would create a cycle")]
    DependentObjectCycle { parent: NetHandle, dependent: NetHandle },

    /// Subobjects travel with their root and cannot be scheduled as dependents
    #[error("Subobject {handle} cannot be a dependent object")]
    SubObjectCannotBeDependent { handle: NetHandle },

    /// The dependency to remove does not exist
    #[error("Object {dependent} is not a dependent of {parent}")]
    DependentObjectNotFound { parent: NetHandle, dependent: NetHandle },

    /// The member index is past the end of the protocol's member table
    #[error("Object {handle} has no member {member_index}")]
    MemberOutOfRange { handle: NetHandle, member_index: usize },

    /// The value does not fit the member's declared kind
    #[error("Value does not fit member '{member}' of object {handle}")]
    MemberKindMismatch { handle: NetHandle, member: String },
}
