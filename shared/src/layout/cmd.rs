use std::sync::Arc;

use crate::layout::{
    codec::PropertyKind,
    compiler::Layout,
    descriptor::{FieldRole, RepCondition, RepNotifyCondition},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmdType {
    Property,
    DynamicArray,
    /// Closes a dynamic array's element commands, and the whole command list
    Return,
}

/// One flattened, replicable leaf (or dynamic array) of a layout.
#[derive(Clone, Debug)]
pub struct RepLayoutCmd {
    pub cmd_type: CmdType,
    /// Codec for property commands, `None` for arrays and returns
    pub kind: Option<PropertyKind>,
    pub name: String,
    /// Position of this command's value in the enclosing slot vector
    pub slot: usize,
    pub parent_index: usize,
    pub relative_handle: u16,
    /// One past this array's `Return` command
    pub end_cmd: usize,
    pub element_size: u32,
    /// Number of slots in one array element
    pub element_slots: usize,
    pub byte_size: u32,
    pub compatible_checksum: u32,
    /// Whether one encoding of this command can serve every connection
    pub shared_serialization: bool,
}

impl RepLayoutCmd {
    pub fn is_array(&self) -> bool {
        self.cmd_type == CmdType::DynamicArray
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParentFlags {
    pub lifetime: bool,
    pub conditional: bool,
    pub custom_delta: bool,
    pub net_serialize: bool,
    pub struct_property: bool,
    pub has_dynamic_array: bool,
    pub has_object_references: bool,
}

/// A top-level replicated field at one static array index.
#[derive(Clone, Debug)]
pub struct RepParentCmd {
    pub name: String,
    pub array_index: u32,
    /// First top-level slot owned by this parent
    pub slot: usize,
    pub cmd_start: usize,
    pub cmd_end: usize,
    pub condition: RepCondition,
    pub rep_notify: Option<RepNotifyCondition>,
    pub role: FieldRole,
    pub flags: ParentFlags,
    pub role_swap_index: Option<usize>,
    /// Compiled item layout for fast array parents
    pub item_layout: Option<Arc<Layout>>,
}
