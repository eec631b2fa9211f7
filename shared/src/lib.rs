//! # Replica Shared
//! Layout-driven property replication: compiles a type description into a
//! flat command list, diffs object state into changelists, and sends and
//! receives those changes per connection with loss recovery.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replica_serde::{
    BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, SignedInteger,
    SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger,
};

mod changelist;
mod compat;
mod config;
mod fast_array;
mod host;
mod layout;
mod object_replicator;
mod remote;
mod rpc;
mod types;
mod wrapping_number;

pub use changelist::{
    build_full_changelist, filter_changelist, filter_changelist_to_active,
    is_empty as is_changelist_empty, merge_changelists, prune_changelist,
};
pub use compat::{
    receive_properties_compat, send_properties_compat, NetFieldExport, NetFieldExportGroup,
};
pub use config::{ConfigError, ReplicationConfig};
pub use fast_array::{
    read_fast_array_delta, write_fast_array_delta, FastArrayBaseState, FastArrayChangelistState,
    FastArrayDelta, FastArrayItem, FastArrayRefs, FastArrayValue, INDEX_NONE,
};
pub use host::{
    build_inactive_parents, compare_properties, compare_role_properties, send_properties,
    ChangedPropertyTracker, CustomDeltaState, RepChangelistState, ReplicationFlags,
    ResendAllDataState, RetirementArena, RetirementError, RetirementHandle, RetirementList,
    RetirementRecord, SendError, SendingRepState, SharedPropertyInfo, SharedPropertyKey,
    SharedSerialization,
};
pub use layout::{
    compatible_checksum, crc32, find_compatible_property, value_at_mut, CmdType, Codec,
    FieldDescriptor, FieldRole, FieldType, HandleToCmdIndex, Layout, LayoutError,
    NetStructDescriptor, ObjectData, ParentFlags, PropertyKind, ReadContext, RepCondition,
    RepLayoutCmd, RepNotifyCondition, RepParentCmd, TypeDescriptor, Value,
};
pub use object_replicator::{ObjectReplicator, ReceivedBunch};
pub use remote::{
    receive_properties, ReceiveError, ReceiveOutcome, ReceivingRepState, RepNotify, UnmappedRef,
    UnmappedReferences, UnmappedUpdate,
};
pub use rpc::{receive_properties_for_rpc, send_properties_for_rpc};
pub use types::{
    HostType, IdentityResolver, NetGuid, ObjectId, PacketIndex, ReferenceResolver,
    ReplicationFrame, Resolved,
};
pub use wrapping_number::{
    sequence_greater_or_equal, sequence_greater_than, sequence_less_than, PacketIdRange,
};
