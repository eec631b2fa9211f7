mod checksum;
mod cmd;
mod codec;
mod compiler;
mod descriptor;
mod error;
mod handle_table;
mod value;

pub use checksum::{compatible_checksum, crc32};
pub use cmd::{CmdType, ParentFlags, RepLayoutCmd, RepParentCmd};
pub use codec::{Codec, NetStructDescriptor, PropertyKind, ReadContext};
pub use compiler::{find_compatible_property, Layout};
pub use descriptor::{
    FieldDescriptor, FieldRole, FieldType, RepCondition, RepNotifyCondition, TypeDescriptor,
};
pub use error::LayoutError;
pub use handle_table::HandleToCmdIndex;
pub use value::{value_at_mut, ObjectData, Value};

pub(crate) use codec::{read_handle, read_varint, write_handle, write_varint};
