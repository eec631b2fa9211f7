use std::sync::Arc;

use crate::layout::codec::PropertyKind;

/// When a property is eligible to be sent to a given connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RepCondition {
    #[default]
    None,
    InitialOnly,
    OwnerOnly,
    SkipOwner,
    SimulatedOnly,
    SimulatedOnlyNoReplay,
    AutonomousOnly,
    SimulatedOrPhysics,
    SimulatedOrPhysicsNoReplay,
    InitialOrOwner,
    /// Active unless toggled off through the object's property tracker
    Custom,
    ReplayOrOwner,
    ReplayOnly,
    SkipReplay,
    Never,
}

/// When a receiver should be told a property was updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepNotifyCondition {
    /// Only when the received value differs from the previous one
    OnChanged,
    /// Every time the property is received
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldRole {
    #[default]
    None,
    /// The local role, swapped with `RemoteRole` on receive
    Role,
    RemoteRole,
}

#[derive(Clone, Debug)]
pub enum FieldType {
    Property(PropertyKind),
    /// Struct whose fields are flattened into individual commands
    Struct(Arc<TypeDescriptor>),
    /// Dynamic array of the inner type
    Array(Box<FieldType>),
    /// Identified-item array replicated through custom delta serialization
    FastArray(Arc<TypeDescriptor>),
}

#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub array_dim: u32,
    pub condition: RepCondition,
    pub rep_notify: Option<RepNotifyCondition>,
    pub role: FieldRole,
}

impl FieldDescriptor {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            array_dim: 1,
            condition: RepCondition::None,
            rep_notify: None,
            role: FieldRole::None,
        }
    }

    pub fn property(name: &str, kind: PropertyKind) -> Self {
        Self::new(name, FieldType::Property(kind))
    }

    pub fn with_array_dim(mut self, array_dim: u32) -> Self {
        self.array_dim = array_dim;
        self
    }

    pub fn with_condition(mut self, condition: RepCondition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_rep_notify(mut self, rep_notify: RepNotifyCondition) -> Self {
        self.rep_notify = Some(rep_notify);
        self
    }

    pub fn with_role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }
}

/// Reflection data for a replicated type or a flattened struct.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}
