use std::sync::Arc;

use log::{debug, error, warn};

use replica_serde::{BitReader, BitWrite, BitWriter, Serde};

use crate::{
    compat::receive_properties_compat,
    config::ReplicationConfig,
    fast_array::{read_fast_array_delta, FastArrayDelta, FastArrayRefs},
    host::{
        CustomDeltaState, RepChangelistState, ReplicationFlags, ResendAllDataState, RetirementError,
        SendError, SendingRepState,
    },
    layout::{read_varint, Layout, ObjectData, Value},
    remote::{
        receive_properties, ReceiveError, ReceiveOutcome, ReceivingRepState, RepNotify,
        UnmappedUpdate,
    },
    types::{HostType, PacketIndex, ReferenceResolver, ReplicationFrame},
    wrapping_number::PacketIdRange,
};

/// Everything one received bunch changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceivedBunch {
    pub outcome: ReceiveOutcome,
    /// Item changes per fast array parent
    pub fast_array_deltas: Vec<(usize, FastArrayDelta)>,
}

/// Replication of one object over one connection, in both directions.
///
/// A bunch is a `has properties` bit, then (if set) a `self-describing` bit
/// and the property records, then the custom-delta properties framed as
/// `parent + 1, bit count, payload` and closed by `0`.
#[derive(Debug)]
pub struct ObjectReplicator {
    layout: Arc<Layout>,
    config: ReplicationConfig,
    host_type: HostType,
    sending: SendingRepState,
    receiving: ReceivingRepState,
    custom_delta: CustomDeltaState,
    resend_all: ResendAllDataState,
    /// The most recent replicate wrote nothing
    last_bunch_empty: bool,
}

impl ObjectReplicator {
    /// `internal_ack` connections (recordings) never lose packets and are
    /// sent the self-describing format.
    pub fn new(
        layout: Arc<Layout>,
        config: &ReplicationConfig,
        host_type: HostType,
        flags: ReplicationFlags,
        internal_ack: bool,
    ) -> Self {
        Self {
            sending: SendingRepState::new(layout.clone(), config, flags, internal_ack),
            receiving: ReceivingRepState::new(&layout),
            custom_delta: CustomDeltaState::new(&layout),
            resend_all: ResendAllDataState::None,
            last_bunch_empty: false,
            config: config.clone(),
            host_type,
            layout,
        }
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    pub fn sending_state(&self) -> &SendingRepState {
        &self.sending
    }

    pub fn receiving_state(&self) -> &ReceivingRepState {
        &self.receiving
    }

    /// See [`ReceivingRepState::set_skip_role_swap`].
    pub fn set_skip_role_swap(&mut self, skip: bool) {
        self.receiving.set_skip_role_swap(skip);
    }

    pub fn custom_delta_state(&self) -> &CustomDeltaState {
        &self.custom_delta
    }

    /// Compares the object (at most once per frame across connections) and
    /// writes a bunch with whatever this connection is owed. Returns whether
    /// a bunch was written; nothing is left in `writer` otherwise.
    pub fn replicate_properties(
        &mut self,
        changelist_state: &mut RepChangelistState,
        data: &[Value],
        frame: ReplicationFrame,
        flags: ReplicationFlags,
        writer: &mut BitWriter,
        resolver: &dyn ReferenceResolver,
    ) -> Result<bool, SendError> {
        changelist_state.update(data, frame, &flags, self.sending.last_compare_index())?;

        let resend = std::mem::take(&mut self.resend_all);
        let compat = self.sending.is_internal_ack() || resend != ResendAllDataState::None;
        let mark = writer.mark();
        // restored if the bunch fails part way
        let sending = self.sending.clone();

        let result =
            self.write_bunch(changelist_state, data, flags, resend, compat, writer, resolver);
        match result {
            Ok(wrote) => {
                if !wrote {
                    writer.rollback(mark);
                }
                self.last_bunch_empty = !wrote;
                Ok(wrote)
            }
            Err(err) => {
                writer.rollback(mark);
                self.sending = sending;
                self.resend_all = resend;
                self.last_bunch_empty = false;
                warn!("`{}` failed to replicate: {}", self.layout.name(), err);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write_bunch(
        &mut self,
        changelist_state: &RepChangelistState,
        data: &[Value],
        flags: ReplicationFlags,
        resend: ResendAllDataState,
        compat: bool,
        writer: &mut BitWriter,
        resolver: &dyn ReferenceResolver,
    ) -> Result<bool, SendError> {
        let mut properties = BitWriter::new();
        let wrote_properties = self.sending.replicate_properties(
            changelist_state,
            data,
            flags,
            resend,
            &mut properties,
            resolver,
        )?;

        writer.write_bit(wrote_properties);
        if wrote_properties {
            writer.write_bit(compat);
            writer.append(&properties);
        }

        let wrote_custom = self.custom_delta.replicate(
            &self.layout,
            data,
            changelist_state.fast_array_histories(),
            self.sending.inactive_parents(),
            resend,
            &self.config,
            writer,
            resolver,
        )?;

        Ok(wrote_properties || wrote_custom)
    }

    /// Records the packets that carried the last bunch.
    pub fn post_send_bunch(
        &mut self,
        range: PacketIdRange,
        reliable: bool,
    ) -> Result<(), RetirementError> {
        self.sending.post_replicate(range, reliable);
        self.custom_delta.post_send(range)
    }

    pub fn received_nak(&mut self, nak: PacketIndex) -> Result<(), RetirementError> {
        self.sending.received_nak(nak);
        self.custom_delta.received_nak(nak)
    }

    pub fn update_acked(&mut self, ack: PacketIndex) -> Result<(), RetirementError> {
        self.sending.update_acked(ack);
        self.custom_delta.update_acked(ack)
    }

    /// The peer confirmed it opened the object.
    pub fn open_acked(&mut self) {
        self.sending.open_acked();
    }

    /// The last replicate found nothing to send and everything sent before
    /// has been acknowledged, so the connection may stop considering the
    /// object until it changes.
    pub fn ready_for_dormancy(&self) -> bool {
        self.last_bunch_empty && self.sending.all_acked() && self.custom_delta.all_acked()
    }

    /// Applies a bunch written by [`replicate_properties`](Self::replicate_properties).
    pub fn received_bunch(
        &mut self,
        data: &mut ObjectData,
        reader: &mut BitReader,
        resolver: &dyn ReferenceResolver,
    ) -> Result<ReceivedBunch, ReceiveError> {
        self.read_bunch(data, reader, resolver).map_err(|err| {
            error!("`{}` rejected a bunch: {}", self.layout.name(), err);
            err
        })
    }

    fn read_bunch(
        &mut self,
        data: &mut ObjectData,
        reader: &mut BitReader,
        resolver: &dyn ReferenceResolver,
    ) -> Result<ReceivedBunch, ReceiveError> {
        let mut bunch = ReceivedBunch::default();

        if bool::de(reader)? {
            let compat = bool::de(reader)?;
            bunch.outcome = if compat {
                receive_properties_compat(
                    &self.layout,
                    &mut self.receiving,
                    data,
                    reader,
                    resolver,
                    &self.config,
                    self.host_type,
                )?
            } else {
                receive_properties(
                    &self.layout,
                    &mut self.receiving,
                    data,
                    reader,
                    resolver,
                    &self.config,
                )?
            };
        }

        loop {
            let handle = read_varint(reader)?;
            if handle == 0 {
                break;
            }
            let parent_index = (handle - 1) as usize;
            let num_bits = read_varint(reader)?;
            let mut payload = reader.sub_reader(num_bits)?;

            let Some(parent) = self
                .layout
                .parents()
                .get(parent_index)
                .filter(|parent| parent.flags.custom_delta)
            else {
                return Err(ReceiveError::UnknownCustomDeltaField {
                    parent_index: handle - 1,
                });
            };
            let (Some(item_layout), Some(array)) = (
                parent.item_layout.as_ref(),
                data.get_mut(parent.slot).and_then(Value::as_fast_array_mut),
            ) else {
                return Err(ReceiveError::MissingSlot {
                    name: parent.name.clone(),
                });
            };

            let refs = FastArrayRefs {
                unmapped: self.receiving.unmapped_mut(),
                parent_index,
                slot: parent.slot,
            };
            let delta = read_fast_array_delta(
                item_layout,
                array,
                &mut payload,
                resolver,
                &self.config,
                Some(refs),
            )?;
            if payload.bits_left() != 0 {
                return Err(ReceiveError::PayloadSizeMismatch {
                    name: parent.name.clone(),
                    bits_left: payload.bits_left(),
                });
            }
            if !delta.is_empty() {
                self.receiving.queue_rep_notify(parent_index);
            }
            bunch.fast_array_deltas.push((parent_index, delta));
        }

        bunch.outcome.has_unmapped = self.receiving.has_unmapped();
        Ok(bunch)
    }

    /// Drains the notifications owed to application code.
    pub fn call_rep_notifies(&mut self) -> Vec<RepNotify> {
        self.receiving.take_rep_notifies(&self.layout)
    }

    /// Retries references to objects that had not arrived yet.
    pub fn update_unmapped_objects(
        &mut self,
        data: &mut [Value],
        resolver: &dyn ReferenceResolver,
    ) -> UnmappedUpdate {
        self.receiving.update_unmapped(data, resolver)
    }

    /// The next send repeats everything since the object was opened.
    pub fn start_replaying(&mut self) {
        self.set_resend_all(ResendAllDataState::SinceOpen);
    }

    /// Makes the next send repeat everything since `state` in the
    /// self-describing format. Applies to one send.
    pub fn set_resend_all(&mut self, state: ResendAllDataState) {
        debug!("`{}` will resend all data ({:?})", self.layout.name(), state);
        self.resend_all = state;
    }

    /// Marks now as the base of later [`ResendAllDataState::SinceCheckpoint`]
    /// sends.
    pub fn set_checkpoint(&mut self) {
        self.sending.set_checkpoint();
        self.custom_delta.set_checkpoint();
    }

    /// Discards everything in flight, as when the connection stops
    /// replicating the object.
    pub fn stop_replicating(&mut self) -> Result<(), RetirementError> {
        self.sending.reset();
        self.resend_all = ResendAllDataState::None;
        self.custom_delta.reset()
    }
}
