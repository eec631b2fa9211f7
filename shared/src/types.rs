use log::warn;

pub type PacketIndex = u16;
pub type ReplicationFrame = u32;

/// Identifies a live object on the local side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Wire token standing in for an object reference. Zero is the null token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetGuid(pub u32);

impl NetGuid {
    pub const NULL: NetGuid = NetGuid(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Which side of a replication link the local peer is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    /// The side that owns the authoritative object state.
    Authority,
    /// A side that receives state.
    Observer,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Authority => HostType::Observer,
            HostType::Observer => HostType::Authority,
        }
    }
}

/// Outcome of resolving a wire token back into a local object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolved {
    Null,
    Mapped(ObjectId),
    /// The token is known but its object has not arrived yet.
    Pending,
}

/// Maps object references to and from wire tokens.
pub trait ReferenceResolver {
    fn object_to_token(&self, object: ObjectId) -> NetGuid;
    fn token_to_object(&self, token: NetGuid) -> Resolved;
}

/// Resolver where every object's token is its own id. Ids that do not fit
/// a token are sent as null.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityResolver;

impl ReferenceResolver for IdentityResolver {
    fn object_to_token(&self, object: ObjectId) -> NetGuid {
        u32::try_from(object.0).map_or_else(
            |_| {
                warn!("Object {} has no token, sending a null reference", object.0);
                NetGuid::NULL
            },
            NetGuid,
        )
    }

    fn token_to_object(&self, token: NetGuid) -> Resolved {
        if token.is_null() {
            Resolved::Null
        } else {
            Resolved::Mapped(ObjectId(u64::from(token.0)))
        }
    }
}
