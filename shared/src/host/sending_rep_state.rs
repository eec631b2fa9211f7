use std::{collections::VecDeque, sync::Arc};

use log::{debug, trace};

use replica_serde::BitWriter;

use crate::{
    changelist::{
        filter_changelist, filter_changelist_to_active, is_empty, merge_changelists,
        prune_changelist,
    },
    compat::{send_properties_compat, NetFieldExportGroup},
    config::ReplicationConfig,
    host::{
        changelist_state::RepChangelistState,
        comparator::compare_role_properties,
        conditions::{build_inactive_parents, ReplicationFlags},
        custom_delta::ResendAllDataState,
        error::SendError,
        serializer::send_properties,
    },
    layout::{Layout, Value},
    types::{PacketIndex, ReferenceResolver},
    wrapping_number::PacketIdRange,
};

#[derive(Clone, Debug)]
struct ChangeHistoryEntry {
    changed: Vec<u16>,
    packet_range: Option<PacketIdRange>,
    resend: bool,
}

/// Per-connection send state of one object: which shared changelists the
/// connection has been sent, what is in flight and what was lost.
#[derive(Clone, Debug)]
pub struct SendingRepState {
    layout: Arc<Layout>,
    max_history: usize,
    /// The connection acknowledges internally (a recording), so nothing is
    /// ever resent and the self-describing format is used
    internal_ack: bool,
    last_changelist_index: u32,
    last_compare_index: u32,
    history: VecDeque<ChangeHistoryEntry>,
    num_naks: usize,
    open_acked: bool,
    pre_open_ack_history: Vec<Vec<u16>>,
    inactive_parents: Vec<bool>,
    inactive_changelist: Vec<u16>,
    lifetime_changelist: Vec<u16>,
    checkpoint_changelist: Vec<u16>,
    saved_role: Option<Value>,
    saved_remote_role: Option<Value>,
    out_ack_packet_id: Option<PacketIndex>,
    exports: NetFieldExportGroup,
}

impl SendingRepState {
    pub fn new(
        layout: Arc<Layout>,
        config: &ReplicationConfig,
        flags: ReplicationFlags,
        internal_ack: bool,
    ) -> Self {
        Self {
            max_history: config.connection_history_size.max(2),
            internal_ack,
            last_changelist_index: 0,
            last_compare_index: 0,
            history: VecDeque::new(),
            num_naks: 0,
            open_acked: internal_ack,
            pre_open_ack_history: Vec::new(),
            inactive_parents: build_inactive_parents(&layout, &flags, None),
            inactive_changelist: vec![0],
            lifetime_changelist: vec![0],
            checkpoint_changelist: vec![0],
            saved_role: None,
            saved_remote_role: None,
            out_ack_packet_id: None,
            exports: NetFieldExportGroup::for_layout(&layout),
            layout,
        }
    }

    pub fn last_compare_index(&self) -> u32 {
        self.last_compare_index
    }

    pub fn last_changelist_index(&self) -> u32 {
        self.last_changelist_index
    }

    pub fn num_naks(&self) -> usize {
        self.num_naks
    }

    pub fn is_internal_ack(&self) -> bool {
        self.internal_ack
    }

    pub fn inactive_parents(&self) -> &[bool] {
        &self.inactive_parents
    }

    /// Changes held back because their parents were inactive.
    pub fn inactive_changelist(&self) -> &[u16] {
        &self.inactive_changelist
    }

    pub fn lifetime_changelist(&self) -> &[u16] {
        &self.lifetime_changelist
    }

    /// Number of sends not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.history.len()
    }

    /// Writes every change the connection has not been sent yet, plus
    /// anything lost in transit. Returns whether anything was written.
    pub fn replicate_properties(
        &mut self,
        changelist_state: &RepChangelistState,
        data: &[Value],
        flags: ReplicationFlags,
        resend: ResendAllDataState,
        writer: &mut BitWriter,
        resolver: &dyn ReferenceResolver,
    ) -> Result<bool, SendError> {
        let layout = self.layout.clone();

        let mut newly_active = vec![0];
        let inactive_parents =
            build_inactive_parents(&layout, &flags, Some(changelist_state.tracker()));
        if inactive_parents != self.inactive_parents {
            self.inactive_parents = inactive_parents;
            let (still_inactive, activated) =
                filter_changelist(&layout, &self.inactive_changelist, &self.inactive_parents);
            self.inactive_changelist = still_inactive;
            newly_active = activated;
        }

        let role_changes = compare_role_properties(
            &layout,
            data,
            &mut self.saved_role,
            &mut self.saved_remote_role,
        );

        if resend != ResendAllDataState::None {
            return self.resend_all(data, resend, writer, resolver);
        }

        let flush_pre_open = self.open_acked && !self.pre_open_ack_history.is_empty();
        let compare_unchanged = self.last_compare_index == changelist_state.compare_index();
        self.last_compare_index = changelist_state.compare_index();

        if (compare_unchanged || self.last_changelist_index == changelist_state.history_end())
            && self.num_naks == 0
            && !flush_pre_open
            && is_empty(&newly_active)
            && is_empty(&role_changes)
        {
            self.update_changelist_history(data, None);
            return Ok(false);
        }

        self.last_changelist_index = self
            .last_changelist_index
            .max(changelist_state.history_start());

        let mut changed = vec![0];
        for index in self.last_changelist_index..changelist_state.history_end() {
            if let Some(entry) = changelist_state.history_entry(index) {
                changed = merge_changelists(&layout, data, entry, &changed);
            }
        }
        changed = merge_changelists(&layout, data, &newly_active, &changed);
        changed = merge_changelists(&layout, data, &role_changes, &changed);
        self.last_changelist_index = changelist_state.history_end();

        if is_empty(&changed) && self.num_naks == 0 && !flush_pre_open {
            self.update_changelist_history(data, None);
            return Ok(false);
        }

        self.update_changelist_history(data, Some(&mut changed));

        if flush_pre_open {
            for lost in std::mem::take(&mut self.pre_open_ack_history) {
                changed = merge_changelists(&layout, data, &lost, &changed);
            }
        }

        let (inactive, active) = filter_changelist(&layout, &changed, &self.inactive_parents);
        if !is_empty(&inactive) {
            self.inactive_changelist =
                merge_changelists(&layout, data, &inactive, &self.inactive_changelist);
        }

        let overrides = self.role_overrides();
        if self.internal_ack {
            self.lifetime_changelist =
                merge_changelists(&layout, data, &changed, &self.lifetime_changelist);
            self.checkpoint_changelist =
                merge_changelists(&layout, data, &changed, &self.checkpoint_changelist);
            return send_properties_compat(
                &layout,
                data,
                &active,
                writer,
                &mut self.exports,
                &overrides,
                resolver,
            );
        }

        let wrote = send_properties(
            &layout,
            data,
            &active,
            writer,
            Some(changelist_state.shared_serialization()),
            &overrides,
            resolver,
        )?;
        if wrote {
            self.history.push_back(ChangeHistoryEntry {
                changed: active,
                packet_range: None,
                resend: false,
            });
        }
        Ok(wrote)
    }

    fn resend_all(
        &mut self,
        data: &[Value],
        resend: ResendAllDataState,
        writer: &mut BitWriter,
        resolver: &dyn ReferenceResolver,
    ) -> Result<bool, SendError> {
        let layout = self.layout.clone();
        let source = match resend {
            ResendAllDataState::SinceCheckpoint => &self.checkpoint_changelist,
            _ => &self.lifetime_changelist,
        };
        let pruned = prune_changelist(&layout, data, source);
        let active = filter_changelist_to_active(&layout, &pruned, &self.inactive_parents);
        if is_empty(&active) {
            return Ok(false);
        }
        debug!("Resending `{}` ({:?})", layout.name(), resend);
        // the stream is read from scratch
        self.exports.reset_exported();
        let overrides = self.role_overrides();
        send_properties_compat(
            &layout,
            data,
            &active,
            writer,
            &mut self.exports,
            &overrides,
            resolver,
        )
    }

    // Role fields go out as last compared for this connection.
    fn role_overrides(&self) -> Vec<(usize, Value)> {
        let Some((role, remote_role)) = self.layout.role_parents() else {
            return Vec::new();
        };
        [(role, &self.saved_role), (remote_role, &self.saved_remote_role)]
            .into_iter()
            .filter_map(|(parent_index, saved)| {
                saved
                    .clone()
                    .map(|value| (self.layout.parents()[parent_index].cmd_start, value))
            })
            .collect()
    }

    /// Retires acknowledged sends and, when `out` is given, merges lost sends
    /// (and everything, when the history is about to overflow) into it.
    fn update_changelist_history(&mut self, data: &[Value], mut out: Option<&mut Vec<u16>>) {
        let dump = self.history.len() + 1 >= self.max_history;
        let ack = self.out_ack_packet_id;
        let layout = self.layout.clone();

        let mut retained = VecDeque::with_capacity(self.history.len());
        for entry in self.history.drain(..) {
            let Some(range) = entry.packet_range else {
                retained.push_back(entry);
                continue;
            };
            let acked = ack.map_or(false, |ack| range.is_acked_by(ack));
            if !acked && !entry.resend && !dump {
                retained.push_back(entry);
                continue;
            }
            if entry.resend || !acked {
                let Some(out) = out.as_deref_mut() else {
                    retained.push_back(entry);
                    continue;
                };
                let merged = merge_changelists(&layout, data, &entry.changed, out);
                *out = merged;
            }
            if entry.resend {
                self.num_naks = self.num_naks.saturating_sub(1);
            }
        }
        self.history = retained;
    }

    /// Stamps the sends written since the last call with their packets.
    /// Unreliable sends made before the peer opened the object are kept
    /// aside and resent once it has.
    pub fn post_replicate(&mut self, range: PacketIdRange, reliable: bool) {
        for entry in self.history.iter_mut().filter(|entry| entry.packet_range.is_none()) {
            entry.packet_range = Some(range);
            if !reliable && !self.open_acked {
                self.pre_open_ack_history.push(entry.changed.clone());
            }
        }
    }

    /// Marks every send carried by the lost packet for resending.
    pub fn received_nak(&mut self, nak: PacketIndex) {
        for entry in self.history.iter_mut() {
            let Some(range) = entry.packet_range else {
                continue;
            };
            if !entry.resend && range.contains(nak) {
                entry.resend = true;
                self.num_naks += 1;
                trace!("`{}` send in {:?} lost, will resend", self.layout.name(), range);
            }
        }
    }

    /// Records the latest acknowledged packet and frees the sends it covers.
    pub fn update_acked(&mut self, ack: PacketIndex) {
        self.out_ack_packet_id = Some(ack);
        self.history.retain(|entry| {
            entry.resend
                || entry
                    .packet_range
                    .map_or(true, |range| !range.is_acked_by(ack))
        });
    }

    /// The peer has confirmed it opened the object.
    pub fn open_acked(&mut self) {
        self.open_acked = true;
    }

    pub fn is_open_acked(&self) -> bool {
        self.open_acked
    }

    /// Nothing sent is unacknowledged or waiting to be resent.
    pub fn all_acked(&self) -> bool {
        self.history.is_empty()
            && self.num_naks == 0
            && self.open_acked
            && self.pre_open_ack_history.is_empty()
    }

    /// Starts a new checkpoint: later resends since checkpoint only cover
    /// changes made from now on.
    pub fn set_checkpoint(&mut self) {
        self.checkpoint_changelist = vec![0];
    }

    /// Forgets everything in flight. The next send starts from the oldest
    /// shared history entry.
    pub fn reset(&mut self) {
        self.history.clear();
        self.num_naks = 0;
        self.pre_open_ack_history.clear();
        self.last_changelist_index = 0;
        self.last_compare_index = 0;
        self.out_ack_packet_id = None;
        self.saved_role = None;
        self.saved_remote_role = None;
    }
}
