use std::{collections::HashMap, sync::Arc};

use log::info;

use crate::{
    fast_array::FastArrayValue,
    layout::{
        checksum::compatible_checksum,
        cmd::{CmdType, ParentFlags, RepLayoutCmd, RepParentCmd},
        codec::PropertyKind,
        descriptor::{FieldRole, FieldType, RepCondition, TypeDescriptor},
        error::LayoutError,
        handle_table::{build_handle_table, HandleToCmdIndex},
        value::{ObjectData, Value},
    },
};

const ARRAY_BYTE_SIZE: u32 = 16;

/// Flattened replication layout compiled once per type and shared read-only.
#[derive(Debug)]
pub struct Layout {
    name: String,
    parents: Vec<RepParentCmd>,
    cmds: Vec<RepLayoutCmd>,
    handle_table: Vec<HandleToCmdIndex>,
    num_slots: usize,
    role_parents: Option<(usize, usize)>,
}

impl Layout {
    /// Compiles a type description into a layout.
    pub fn compile(descriptor: &TypeDescriptor) -> Result<Arc<Self>, LayoutError> {
        let mut builder = LayoutBuilder::default();

        for field in &descriptor.fields {
            if field.array_dim == 0 {
                return Err(LayoutError::ZeroArrayDim {
                    name: field.name.clone(),
                });
            }

            for static_index in 0..field.array_dim {
                let parent_index = builder.parents.len();
                let cmd_start = builder.cmds.len();
                let slot = builder.next_slot;

                let mut flags = ParentFlags {
                    lifetime: field.condition != RepCondition::Never,
                    conditional: field.condition != RepCondition::None,
                    struct_property: matches!(field.field_type, FieldType::Struct(_)),
                    ..ParentFlags::default()
                };

                let item_layout = if let FieldType::FastArray(item) = &field.field_type {
                    if item.fields.is_empty() {
                        return Err(LayoutError::EmptyStruct {
                            name: item.name.clone(),
                        });
                    }
                    if contains_fast_array(item) {
                        return Err(LayoutError::NestedCustomDelta {
                            name: field.name.clone(),
                        });
                    }
                    flags.custom_delta = true;
                    builder.next_slot += 1;
                    Some(Layout::compile(item)?)
                } else {
                    let mut next_slot = builder.next_slot;
                    builder.init_from_field(
                        &field.field_type,
                        &field.name,
                        static_index,
                        0,
                        &mut next_slot,
                        parent_index,
                    )?;
                    builder.next_slot = next_slot;
                    None
                };

                let cmd_end = builder.cmds.len();
                for cmd in &builder.cmds[cmd_start..cmd_end] {
                    match cmd.cmd_type {
                        CmdType::DynamicArray => flags.has_dynamic_array = true,
                        CmdType::Property => {
                            if let Some(kind) = &cmd.kind {
                                flags.has_object_references |= kind.has_object_references();
                                flags.net_serialize |= matches!(
                                    kind,
                                    PropertyKind::NetStruct(_) | PropertyKind::Custom(_)
                                );
                            }
                        }
                        CmdType::Return => {}
                    }
                }

                builder.parents.push(RepParentCmd {
                    name: field.name.clone(),
                    array_index: static_index,
                    slot,
                    cmd_start,
                    cmd_end,
                    condition: field.condition,
                    rep_notify: field.rep_notify,
                    role: field.role,
                    flags,
                    role_swap_index: None,
                    item_layout,
                });
            }
        }

        let role_parents = builder.link_roles()?;

        builder.cmds.push(RepLayoutCmd {
            cmd_type: CmdType::Return,
            kind: None,
            name: String::new(),
            slot: 0,
            parent_index: 0,
            relative_handle: 0,
            end_cmd: 0,
            element_size: 0,
            element_slots: 0,
            byte_size: 0,
            compatible_checksum: 0,
            shared_serialization: false,
        });

        let top_end = builder.cmds.len() - 1;
        check_collisions(&builder.cmds, 0, top_end)?;
        mark_shared_serialization(&mut builder.cmds, &builder.parents, 0, top_end);

        let handle_table = build_handle_table(&builder.cmds, 0, top_end);

        info!(
            "Compiled layout `{}`: {} parents, {} commands, {} handles",
            descriptor.name,
            builder.parents.len(),
            builder.cmds.len(),
            handle_table.len()
        );

        Ok(Arc::new(Self {
            name: descriptor.name.clone(),
            parents: builder.parents,
            cmds: builder.cmds,
            handle_table,
            num_slots: builder.next_slot,
            role_parents,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parents(&self) -> &[RepParentCmd] {
        &self.parents
    }

    pub fn cmds(&self) -> &[RepLayoutCmd] {
        &self.cmds
    }

    pub fn handle_table(&self) -> &[HandleToCmdIndex] {
        &self.handle_table
    }

    /// Index one past the last top-level command (the final `Return`).
    pub fn top_level_end(&self) -> usize {
        self.cmds.len() - 1
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// `(role, remote_role)` parent indices, when the type has them.
    pub fn role_parents(&self) -> Option<(usize, usize)> {
        self.role_parents
    }

    pub fn is_role_parent(&self, parent_index: usize) -> bool {
        self.parents[parent_index].role != FieldRole::None
    }

    pub fn custom_delta_parents(&self) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.flags.custom_delta)
            .map(|(index, _)| index)
    }

    /// Top-level command index for a relative handle.
    pub fn cmd_for_handle(&self, handle: u16) -> Option<usize> {
        if handle == 0 {
            return None;
        }
        self.handle_table
            .get(usize::from(handle) - 1)
            .map(|entry| entry.cmd_index)
    }

    /// Archetype data: every slot at its default value, arrays empty.
    pub fn default_data(&self) -> ObjectData {
        let mut data = Vec::with_capacity(self.num_slots);
        for parent in &self.parents {
            if parent.flags.custom_delta {
                data.push(Value::FastArray(FastArrayValue::new()));
            } else {
                self.push_level_defaults(parent.cmd_start, parent.cmd_end, &mut data);
            }
        }
        data
    }

    /// Default slot vector for one element of the array at `array_cmd`.
    pub fn default_element(&self, array_cmd: usize) -> ObjectData {
        let cmd = &self.cmds[array_cmd];
        let mut element = Vec::with_capacity(cmd.element_slots);
        self.push_level_defaults(array_cmd + 1, cmd.end_cmd - 1, &mut element);
        element
    }

    fn push_level_defaults(&self, cmd_start: usize, cmd_end: usize, out: &mut ObjectData) {
        let mut cmd_index = cmd_start;
        while cmd_index < cmd_end {
            let cmd = &self.cmds[cmd_index];
            match cmd.cmd_type {
                CmdType::DynamicArray => {
                    out.push(Value::Array(Vec::new()));
                    cmd_index = cmd.end_cmd;
                    continue;
                }
                CmdType::Property => {
                    if let Some(kind) = &cmd.kind {
                        out.push(kind.default_value());
                    }
                }
                CmdType::Return => {}
            }
            cmd_index += 1;
        }
    }
}

/// Finds the command at one nesting level whose checksum matches.
pub fn find_compatible_property(
    cmds: &[RepLayoutCmd],
    cmd_start: usize,
    cmd_end: usize,
    checksum: u32,
) -> Option<usize> {
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if cmd.compatible_checksum == checksum {
            return Some(cmd_index);
        }
        cmd_index = if cmd.is_array() {
            cmd.end_cmd
        } else {
            cmd_index + 1
        };
    }
    None
}

#[derive(Default)]
struct LayoutBuilder {
    parents: Vec<RepParentCmd>,
    cmds: Vec<RepLayoutCmd>,
    next_slot: usize,
    // relative handle of the last command pushed at each open nesting level
    level_handles: Vec<u32>,
}

impl LayoutBuilder {
    fn init_from_field(
        &mut self,
        field_type: &FieldType,
        name: &str,
        static_index: u32,
        parent_checksum: u32,
        slot: &mut usize,
        parent_index: usize,
    ) -> Result<(), LayoutError> {
        match field_type {
            FieldType::Property(kind) => {
                check_enum_bits(kind, name)?;
                let relative_handle = self.next_handle(name)?;
                self.cmds.push(RepLayoutCmd {
                    cmd_type: CmdType::Property,
                    kind: Some(kind.clone()),
                    name: name.to_string(),
                    slot: *slot,
                    parent_index,
                    relative_handle,
                    end_cmd: 0,
                    element_size: 0,
                    element_slots: 0,
                    byte_size: kind.byte_size(),
                    compatible_checksum: compatible_checksum(
                        name,
                        kind.type_name(),
                        static_index,
                        parent_checksum,
                    ),
                    shared_serialization: false,
                });
                *slot += 1;
            }
            FieldType::Struct(descriptor) => {
                if descriptor.fields.is_empty() {
                    return Err(LayoutError::EmptyStruct {
                        name: descriptor.name.clone(),
                    });
                }
                let struct_checksum =
                    compatible_checksum(name, &descriptor.name, static_index, parent_checksum);
                for field in &descriptor.fields {
                    if field.array_dim == 0 {
                        return Err(LayoutError::ZeroArrayDim {
                            name: field.name.clone(),
                        });
                    }
                    for index in 0..field.array_dim {
                        self.init_from_field(
                            &field.field_type,
                            &field.name,
                            index,
                            struct_checksum,
                            slot,
                            parent_index,
                        )?;
                    }
                }
            }
            FieldType::Array(inner) => {
                let relative_handle = self.next_handle(name)?;
                let array_checksum =
                    compatible_checksum(name, "array", static_index, parent_checksum);
                let cmd_index = self.cmds.len();
                self.cmds.push(RepLayoutCmd {
                    cmd_type: CmdType::DynamicArray,
                    kind: None,
                    name: name.to_string(),
                    slot: *slot,
                    parent_index,
                    relative_handle,
                    end_cmd: 0,
                    element_size: 0,
                    element_slots: 0,
                    byte_size: ARRAY_BYTE_SIZE,
                    compatible_checksum: array_checksum,
                    shared_serialization: false,
                });
                *slot += 1;

                self.level_handles.push(0);
                let mut element_slot = 0;
                let result = self.init_from_field(
                    inner,
                    name,
                    0,
                    array_checksum,
                    &mut element_slot,
                    parent_index,
                );
                self.level_handles.pop();
                result?;

                self.cmds.push(RepLayoutCmd {
                    cmd_type: CmdType::Return,
                    kind: None,
                    name: String::new(),
                    slot: 0,
                    parent_index,
                    relative_handle: 0,
                    end_cmd: 0,
                    element_size: 0,
                    element_slots: 0,
                    byte_size: 0,
                    compatible_checksum: 0,
                    shared_serialization: false,
                });

                let end_cmd = self.cmds.len();
                let element_size = level_byte_size(&self.cmds, cmd_index + 1, end_cmd - 1);
                if element_size == 0 {
                    return Err(LayoutError::ZeroSizeElement {
                        name: name.to_string(),
                    });
                }
                check_collisions(&self.cmds, cmd_index + 1, end_cmd - 1)?;

                let array_cmd = &mut self.cmds[cmd_index];
                array_cmd.end_cmd = end_cmd;
                array_cmd.element_size = element_size;
                array_cmd.element_slots = element_slot;
            }
            FieldType::FastArray(_) => {
                return Err(LayoutError::NestedCustomDelta {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn next_handle(&mut self, name: &str) -> Result<u16, LayoutError> {
        if self.level_handles.is_empty() {
            self.level_handles.push(0);
        }
        let Some(handle) = self.level_handles.last_mut() else {
            return Err(LayoutError::TooManyHandles {
                name: name.to_string(),
            });
        };
        *handle += 1;
        u16::try_from(*handle).map_err(|_| LayoutError::TooManyHandles {
            name: name.to_string(),
        })
    }

    fn link_roles(&mut self) -> Result<Option<(usize, usize)>, LayoutError> {
        let role = self.find_role(FieldRole::Role)?;
        let remote_role = self.find_role(FieldRole::RemoteRole)?;

        match (role, remote_role) {
            (None, None) => Ok(None),
            (Some(role), Some(remote_role)) => {
                self.parents[role].role_swap_index = Some(remote_role);
                self.parents[remote_role].role_swap_index = Some(role);
                let remote = &mut self.parents[remote_role];
                remote.condition = RepCondition::Custom;
                remote.flags.conditional = true;
                remote.flags.lifetime = true;
                Ok(Some((role, remote_role)))
            }
            (role, remote_role) => Err(LayoutError::RolePairMismatch {
                has_role: role.is_some(),
                has_remote_role: remote_role.is_some(),
            }),
        }
    }

    fn find_role(&self, role: FieldRole) -> Result<Option<usize>, LayoutError> {
        let mut found = None;
        for (index, parent) in self.parents.iter().enumerate() {
            if parent.role != role {
                continue;
            }
            let single_property = parent.cmd_end == parent.cmd_start + 1
                && self.cmds[parent.cmd_start].cmd_type == CmdType::Property;
            if found.is_some() || !single_property || parent.array_index != 0 {
                return Err(LayoutError::InvalidRoleField {
                    name: parent.name.clone(),
                });
            }
            found = Some(index);
        }
        Ok(found)
    }
}

/// Enum widths must fit a byte, including inside natively serialized
/// structs.
fn check_enum_bits(kind: &PropertyKind, name: &str) -> Result<(), LayoutError> {
    match kind {
        PropertyKind::Enum { bits } if *bits == 0 || *bits > 8 => {
            Err(LayoutError::InvalidEnumBits {
                name: name.to_string(),
                bits: *bits,
            })
        }
        PropertyKind::NetStruct(descriptor) => {
            for (field_name, field_kind) in &descriptor.fields {
                check_enum_bits(field_kind, &format!("{}.{}", name, field_name))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn contains_fast_array(descriptor: &TypeDescriptor) -> bool {
    fn field_has(field_type: &FieldType) -> bool {
        match field_type {
            FieldType::FastArray(_) => true,
            FieldType::Property(_) => false,
            FieldType::Array(inner) => field_has(inner),
            FieldType::Struct(descriptor) => contains_fast_array(descriptor),
        }
    }
    descriptor
        .fields
        .iter()
        .any(|field| field_has(&field.field_type))
}

fn level_byte_size(cmds: &[RepLayoutCmd], cmd_start: usize, cmd_end: usize) -> u32 {
    let mut size = 0;
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        size += cmd.byte_size;
        cmd_index = if cmd.is_array() {
            cmd.end_cmd
        } else {
            cmd_index + 1
        };
    }
    size
}

fn check_collisions(
    cmds: &[RepLayoutCmd],
    cmd_start: usize,
    cmd_end: usize,
) -> Result<(), LayoutError> {
    let mut seen: HashMap<u32, usize> = HashMap::new();
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if let Some(previous) = seen.insert(cmd.compatible_checksum, cmd_index) {
            return Err(LayoutError::ChecksumCollision {
                first: cmds[previous].name.clone(),
                second: cmd.name.clone(),
                checksum: cmd.compatible_checksum,
            });
        }
        cmd_index = if cmd.is_array() {
            cmd.end_cmd
        } else {
            cmd_index + 1
        };
    }
    Ok(())
}

// Returns whether every command in the range is shareable.
fn mark_shared_serialization(
    cmds: &mut [RepLayoutCmd],
    parents: &[RepParentCmd],
    cmd_start: usize,
    cmd_end: usize,
) -> bool {
    let mut all_shared = true;
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let shared = match cmds[cmd_index].cmd_type {
            CmdType::DynamicArray => {
                let end_cmd = cmds[cmd_index].end_cmd;
                let inner = mark_shared_serialization(cmds, parents, cmd_index + 1, end_cmd - 1);
                cmds[cmd_index].shared_serialization = inner;
                cmd_index = end_cmd;
                all_shared &= inner;
                continue;
            }
            CmdType::Property => {
                let cmd = &cmds[cmd_index];
                let not_remote_role = parents[cmd.parent_index].role != FieldRole::RemoteRole;
                cmd.kind.as_ref().map_or(false, |kind| {
                    kind.is_shareable() && !kind.has_object_references()
                }) && not_remote_role
            }
            CmdType::Return => false,
        };
        cmds[cmd_index].shared_serialization = shared;
        all_shared &= shared;
        cmd_index += 1;
    }
    all_shared
}
