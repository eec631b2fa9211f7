//! Changelists are flat `u16` sequences of handles. A dynamic array entry is
//! `handle, jump_count, inner entries..., 0` where `jump_count` is the number
//! of inner entries, and every level ends with a `0`.

mod iterator;
mod merge;

pub(crate) use iterator::{ChangelistCursor, HandleIterator};
pub(crate) use merge::check_array_bounds;
pub use merge::{
    build_full_changelist, filter_changelist, filter_changelist_to_active, is_empty,
    merge_changelists, prune_changelist,
};
