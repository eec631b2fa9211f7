//! Arrays replicated item by item. Items carry stable ids and replication
//! keys, so a connection is sent only the items whose keys moved since its
//! last acknowledged state.

mod base_state;
mod history;
mod item;
mod serializer;

pub use base_state::FastArrayBaseState;
pub use history::FastArrayChangelistState;
pub use item::{FastArrayItem, FastArrayValue, INDEX_NONE};
pub use serializer::{
    read_fast_array_delta, write_fast_array_delta, FastArrayDelta, FastArrayRefs,
};
