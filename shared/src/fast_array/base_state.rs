use std::collections::HashMap;

use crate::fast_array::item::INDEX_NONE;

/// What one connection is known to hold of a fast array: the array key,
/// each item's key by id, and how far into the shared item history it has
/// been sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FastArrayBaseState {
    pub array_replication_key: i32,
    pub id_to_key: HashMap<i32, i32>,
    pub history_number: i32,
}

impl Default for FastArrayBaseState {
    fn default() -> Self {
        Self {
            array_replication_key: INDEX_NONE,
            id_to_key: HashMap::new(),
            history_number: 0,
        }
    }
}

impl FastArrayBaseState {
    pub fn knows_item(&self, id: i32) -> bool {
        self.id_to_key.contains_key(&id)
    }
}
