mod error;
mod receiver;
mod receiving_rep_state;
mod unmapped;

pub use error::ReceiveError;
pub use receiver::{receive_properties, ReceiveOutcome};
pub use receiving_rep_state::{ReceivingRepState, RepNotify};
pub use unmapped::{UnmappedRef, UnmappedReferences, UnmappedUpdate};

pub(crate) use receiver::{
    missing_slot, prepare_array, receive_embedded, receive_property, EmbeddedOwner, ReceiveParams,
};
