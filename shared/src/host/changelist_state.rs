use std::{collections::HashMap, sync::Arc};

use log::trace;

use crate::{
    changelist::{is_empty, merge_changelists},
    config::ReplicationConfig,
    fast_array::FastArrayChangelistState,
    host::{
        comparator::compare_properties,
        conditions::{ChangedPropertyTracker, ReplicationFlags},
        error::SendError,
        shared_serialization::SharedSerialization,
    },
    layout::{Layout, ObjectData, Value},
    types::ReplicationFrame,
};

/// Connection-independent send state of one object: the shadow copy of its
/// last compared values, a ring of recent changelists and the encodings
/// shared by every connection.
///
/// History entries are numbered by monotonically increasing indices; the
/// live ones are `history_start()..history_end()`. When the ring is full the
/// two oldest entries are merged, so the live entries together always cover
/// every change since the object was created.
#[derive(Debug)]
pub struct RepChangelistState {
    layout: Arc<Layout>,
    config: ReplicationConfig,
    shadow: ObjectData,
    history: Vec<Vec<u16>>,
    history_start: u32,
    history_end: u32,
    compare_index: u32,
    last_compare_frame: Option<ReplicationFrame>,
    shared: SharedSerialization,
    tracker: ChangedPropertyTracker,
    fast_arrays: HashMap<usize, FastArrayChangelistState>,
}

impl RepChangelistState {
    pub fn new(layout: Arc<Layout>, config: &ReplicationConfig) -> Self {
        let fast_arrays = layout
            .custom_delta_parents()
            .filter_map(|parent_index| {
                layout.parents()[parent_index]
                    .item_layout
                    .as_ref()
                    .map(|item_layout| {
                        (
                            parent_index,
                            FastArrayChangelistState::new(
                                item_layout.clone(),
                                config.fast_array_history_size,
                            ),
                        )
                    })
            })
            .collect();

        Self {
            shadow: layout.default_data(),
            history: vec![Vec::new(); config.shared_history_size.max(2)],
            history_start: 0,
            history_end: 0,
            compare_index: 0,
            last_compare_frame: None,
            shared: SharedSerialization::new(),
            tracker: ChangedPropertyTracker::new(&layout),
            fast_arrays,
            config: config.clone(),
            layout,
        }
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn shadow(&self) -> &[Value] {
        &self.shadow
    }

    /// Bumped by every compare that actually ran.
    pub fn compare_index(&self) -> u32 {
        self.compare_index
    }

    pub fn history_start(&self) -> u32 {
        self.history_start
    }

    pub fn history_end(&self) -> u32 {
        self.history_end
    }

    /// Changelist recorded under history `index`, if it is still live.
    pub fn history_entry(&self, index: u32) -> Option<&[u16]> {
        if index < self.history_start || index >= self.history_end {
            return None;
        }
        Some(&self.history[self.slot(index)])
    }

    pub fn shared_serialization(&self) -> &SharedSerialization {
        &self.shared
    }

    pub fn tracker(&self) -> &ChangedPropertyTracker {
        &self.tracker
    }

    /// Turns a `Custom` condition parent on or off for every connection.
    /// Cached encodings are dropped on a change, since they may hold values
    /// the compare no longer tracks.
    pub fn set_custom_active(&mut self, parent_index: usize, active: bool) {
        if self.tracker.set_custom_active(parent_index, active) {
            self.shared.reset();
        }
    }

    pub fn fast_array_history(&self, parent_index: usize) -> Option<&FastArrayChangelistState> {
        self.fast_arrays.get(&parent_index)
    }

    pub(crate) fn fast_array_histories(&self) -> &HashMap<usize, FastArrayChangelistState> {
        &self.fast_arrays
    }

    /// Compares `data` against the shadow and records what changed.
    ///
    /// When shadow state is shared, an object is compared at most once per
    /// `frame` unless the caller is sending the initial state or has never
    /// seen a compare. Returns whether a new history entry was recorded.
    pub fn update(
        &mut self,
        data: &[Value],
        frame: ReplicationFrame,
        flags: &ReplicationFlags,
        last_compare_index: u32,
    ) -> Result<bool, SendError> {
        let force = flags.net_initial || !self.config.share_shadow_state || last_compare_index <= 1;
        if !force && self.last_compare_frame == Some(frame) {
            return Ok(false);
        }
        self.last_compare_frame = Some(frame);
        self.compare_index += 1;

        for (parent_index, history) in self.fast_arrays.iter_mut() {
            let slot = self.layout.parents()[*parent_index].slot;
            if let Some(array) = data.get(slot).and_then(Value::as_fast_array) {
                history.update(array)?;
            }
        }

        let changed = compare_properties(
            &self.layout,
            &mut self.shadow,
            data,
            flags.net_initial,
            Some(&self.tracker),
        )?;
        if is_empty(&changed) {
            return Ok(false);
        }

        if (self.history_end - self.history_start) as usize == self.history.len() {
            self.merge_oldest(data);
        }
        let slot = self.slot(self.history_end);
        self.history[slot] = changed;
        self.history_end += 1;

        self.shared.reset();
        if self.config.share_serialized_data {
            let mut merged = vec![0];
            for index in self.history_start..self.history_end {
                let dirty = &self.history[self.slot(index)];
                merged = merge_changelists(&self.layout, data, dirty, &merged);
            }
            self.shared.build(&self.layout, data, &merged);
        }

        trace!(
            "`{}` changelist {} recorded at frame {} (compare {})",
            self.layout.name(),
            self.history_end - 1,
            frame,
            self.compare_index
        );
        Ok(true)
    }

    fn merge_oldest(&mut self, data: &[Value]) {
        let first_slot = self.slot(self.history_start);
        let first = std::mem::take(&mut self.history[first_slot]);
        self.history_start += 1;
        let second_slot = self.slot(self.history_start);
        self.history[second_slot] =
            merge_changelists(&self.layout, data, &first, &self.history[second_slot]);
    }

    fn slot(&self, index: u32) -> usize {
        index as usize % self.history.len()
    }
}
