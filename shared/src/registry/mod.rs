pub mod error;
mod object_data;
mod object_registry;

pub use error::RegistryError;
pub use object_data::{
    DependentObjectInfo, DependentSchedulingHint, DestroyFlags, ReplicatedObjectData, SubObjectCondition,
};
pub use object_registry::{MaxInternalIndexListener, ObjectRegistry};
