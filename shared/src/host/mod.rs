mod changelist_state;
mod comparator;
mod conditions;
mod custom_delta;
mod error;
mod retirement;
mod sending_rep_state;
mod serializer;
mod shared_serialization;

pub use changelist_state::RepChangelistState;
pub use comparator::{compare_properties, compare_role_properties};
pub use conditions::{build_inactive_parents, ChangedPropertyTracker, ReplicationFlags};
pub use custom_delta::{CustomDeltaState, ResendAllDataState};
pub use error::{RetirementError, SendError};
pub use retirement::{RetirementArena, RetirementHandle, RetirementList, RetirementRecord};
pub use sending_rep_state::SendingRepState;
pub use serializer::send_properties;
pub use shared_serialization::{SharedPropertyInfo, SharedPropertyKey, SharedSerialization};
