use std::{collections::BTreeMap, sync::Arc};

use log::debug;

use replica_shared::{
    BitReader, BitWriter, HostType, IdentityResolver, Layout, ObjectData, ObjectReplicator,
    PacketIdRange, PacketIndex, ReceiveError, ReceivedBunch, RepChangelistState,
    ReplicationConfig, ReplicationFlags, ReplicationFrame, SendError, UnmappedUpdate, Value,
};

use crate::helpers::resolver::TestResolver;

/// One object replicated from an authority to a single observer over a
/// link where the test decides the fate of every packet.
pub struct TestLink {
    pub config: ReplicationConfig,
    pub changelist_state: RepChangelistState,
    pub server: ObjectReplicator,
    pub client: ObjectReplicator,
    pub server_data: ObjectData,
    pub client_data: ObjectData,
    pub flags: ReplicationFlags,
    pub resolver: TestResolver,
    frame: ReplicationFrame,
    next_packet: PacketIndex,
    in_flight: BTreeMap<PacketIndex, Vec<u8>>,
    sent_bits: u64,
}

impl TestLink {
    pub fn new(layout: Arc<Layout>) -> Self {
        Self::with_config(layout, ReplicationConfig::default(), false)
    }

    pub fn with_config(layout: Arc<Layout>, config: ReplicationConfig, internal_ack: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let flags = ReplicationFlags {
            net_initial: true,
            ..ReplicationFlags::default()
        };
        Self {
            changelist_state: RepChangelistState::new(layout.clone(), &config),
            server: ObjectReplicator::new(
                layout.clone(),
                &config,
                HostType::Authority,
                flags,
                internal_ack,
            ),
            client: ObjectReplicator::new(
                layout.clone(),
                &config,
                HostType::Observer,
                flags,
                false,
            ),
            server_data: layout.default_data(),
            client_data: layout.default_data(),
            flags,
            resolver: TestResolver::everything(),
            frame: 0,
            next_packet: 0,
            in_flight: BTreeMap::new(),
            sent_bits: 0,
            config,
        }
    }

    pub fn frame(&self) -> ReplicationFrame {
        self.frame
    }

    pub fn sent_bits(&self) -> u64 {
        self.sent_bits
    }

    pub fn payload(&self, packet: PacketIndex) -> Option<&[u8]> {
        self.in_flight.get(&packet).map(Vec::as_slice)
    }

    pub fn set(&mut self, slot: usize, value: Value) {
        self.server_data[slot] = value;
    }

    /// Advances a frame and replicates. Returns the packet carrying the
    /// bunch, if one was written.
    pub fn send(&mut self) -> Option<PacketIndex> {
        self.try_send().expect("replicate properties")
    }

    pub fn try_send(&mut self) -> Result<Option<PacketIndex>, SendError> {
        self.frame += 1;
        let mut writer = BitWriter::new();
        let wrote = self.server.replicate_properties(
            &mut self.changelist_state,
            &self.server_data,
            self.frame,
            self.flags,
            &mut writer,
            &IdentityResolver,
        )?;
        if !wrote {
            return Ok(None);
        }

        let packet = self.next_packet;
        self.next_packet = self.next_packet.wrapping_add(1);
        // the opening bunch goes out reliably
        let reliable = self.flags.net_initial;
        self.server
            .post_send_bunch(PacketIdRange::single(packet), reliable)
            .expect("post send");
        self.flags.net_initial = false;

        self.sent_bits += u64::from(writer.bits_written());
        self.in_flight.insert(packet, writer.to_bytes());
        Ok(Some(packet))
    }

    /// Hands a packet to the observer and acknowledges it.
    pub fn try_deliver(&mut self, packet: PacketIndex) -> Result<ReceivedBunch, ReceiveError> {
        let bytes = self
            .in_flight
            .remove(&packet)
            .expect("delivered packet is in flight");
        let mut reader = BitReader::new(&bytes);
        let bunch = self
            .client
            .received_bunch(&mut self.client_data, &mut reader, &self.resolver)?;

        self.server.update_acked(packet).expect("update acked");
        self.server.open_acked();
        Ok(bunch)
    }

    pub fn deliver(&mut self, packet: PacketIndex) -> ReceivedBunch {
        self.try_deliver(packet).expect("observer applies bunch")
    }

    /// Loses a packet and tells the authority about it.
    pub fn drop_packet(&mut self, packet: PacketIndex) {
        self.in_flight.remove(&packet);
        debug!("Dropping packet {}", packet);
        self.server.received_nak(packet).expect("received nak");
    }

    pub fn send_and_deliver(&mut self) -> Option<ReceivedBunch> {
        let packet = self.send()?;
        Some(self.deliver(packet))
    }

    /// Sends until the authority has nothing left to say. Returns how many
    /// bunches that took.
    pub fn sync(&mut self) -> usize {
        let mut bunches = 0;
        while self.send_and_deliver().is_some() {
            bunches += 1;
            assert!(bunches < 16, "link did not settle");
        }
        bunches
    }

    pub fn take_notifies(&mut self) -> Vec<String> {
        self.client
            .call_rep_notifies()
            .into_iter()
            .map(|notify| notify.name)
            .collect()
    }

    pub fn update_unmapped(&mut self) -> UnmappedUpdate {
        self.client
            .update_unmapped_objects(&mut self.client_data, &self.resolver)
    }

    /// Slot by slot equality, with fast arrays compared by item id and data
    /// only.
    pub fn is_converged(&self) -> bool {
        self.server_data.len() == self.client_data.len()
            && self
                .server_data
                .iter()
                .zip(self.client_data.iter())
                .all(|(server, client)| match (server, client) {
                    (Value::FastArray(server), Value::FastArray(client)) => {
                        let items = |array: &replica_shared::FastArrayValue| {
                            array
                                .items
                                .iter()
                                .map(|item| (item.id, item.data.clone()))
                                .collect::<Vec<_>>()
                        };
                        items(server) == items(client)
                    }
                    _ => server == client,
                })
    }
}
