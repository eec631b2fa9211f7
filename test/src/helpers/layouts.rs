use std::sync::Arc;

use replica_shared::{
    FieldDescriptor, FieldRole, FieldType, Layout, ObjectData, PropertyKind, RepCondition,
    RepNotifyCondition, TypeDescriptor, Value,
};

/// Slot indices of the sample layouts, in field order.
pub mod slots {
    pub const HEALTH: usize = 0;
    pub const NAME: usize = 1;
    pub const ITEMS: usize = 2;
    pub const SECRET: usize = 3;
    pub const TARGET: usize = 4;

    pub const ROLE: usize = 0;
    pub const REMOTE_ROLE: usize = 1;
    pub const SPEED: usize = 2;

    pub const BAG: usize = 0;
    pub const GOLD: usize = 1;
}

pub fn item_descriptor() -> Arc<TypeDescriptor> {
    Arc::new(
        TypeDescriptor::new("Item")
            .with_field(FieldDescriptor::property("id", PropertyKind::I32))
            .with_field(FieldDescriptor::property("count", PropertyKind::U16)),
    )
}

/// One element of an `Item` array or fast array.
pub fn item(id: i32, count: u16) -> ObjectData {
    vec![Value::I32(id), Value::U16(count)]
}

/// `health`, `name`, `items`, owner-only `secret` and an object reference
/// `target`. Handles 1 to 5 at the top level.
pub fn character_layout() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Character")
            .with_field(
                FieldDescriptor::property("health", PropertyKind::F32)
                    .with_rep_notify(RepNotifyCondition::OnChanged),
            )
            .with_field(FieldDescriptor::property("name", PropertyKind::Str))
            .with_field(
                FieldDescriptor::new(
                    "items",
                    FieldType::Array(Box::new(FieldType::Struct(item_descriptor()))),
                )
                .with_rep_notify(RepNotifyCondition::OnChanged),
            )
            .with_field(
                FieldDescriptor::property("secret", PropertyKind::U32)
                    .with_condition(RepCondition::OwnerOnly),
            )
            .with_field(
                FieldDescriptor::property("target", PropertyKind::ObjectRef)
                    .with_rep_notify(RepNotifyCondition::OnChanged),
            ),
    )
    .expect("character layout compiles")
}

/// A role pair and a speed.
pub fn pawn_layout() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Pawn")
            .with_field(
                FieldDescriptor::property("role", PropertyKind::Enum { bits: 3 })
                    .with_role(FieldRole::Role),
            )
            .with_field(
                FieldDescriptor::property("remote_role", PropertyKind::Enum { bits: 3 })
                    .with_role(FieldRole::RemoteRole),
            )
            .with_field(FieldDescriptor::property("speed", PropertyKind::F32)),
    )
    .expect("pawn layout compiles")
}

/// A fast array of items, `bag`, and a plain `gold` counter.
pub fn inventory_layout() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Inventory")
            .with_field(FieldDescriptor::new("bag", FieldType::FastArray(item_descriptor())))
            .with_field(FieldDescriptor::property("gold", PropertyKind::U32)),
    )
    .expect("inventory layout compiles")
}
