use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use replica_serde::BitWriter;

use crate::{
    config::ReplicationConfig,
    fast_array::{write_fast_array_delta, FastArrayBaseState, FastArrayChangelistState},
    host::{
        error::{RetirementError, SendError},
        retirement::{RetirementArena, RetirementList, RetirementRecord},
    },
    layout::{write_varint, Layout, Value},
    types::{PacketIndex, ReferenceResolver},
    wrapping_number::PacketIdRange,
};

/// Which base a custom-delta property is diffed against when a recording
/// connection asks for everything again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResendAllDataState {
    /// Normal operation, diff against what the connection holds
    #[default]
    None,
    /// Everything since the object was opened. A fast array's state at
    /// creation is the empty base, so the diff runs against
    /// [`FastArrayBaseState::default`] and no creation snapshot is kept.
    SinceOpen,
    /// Everything since the last checkpoint
    SinceCheckpoint,
}

#[derive(Debug, Default)]
struct CustomDeltaProperty {
    retirement: RetirementList,
    recent: FastArrayBaseState,
    checkpoint: Option<FastArrayBaseState>,
}

/// Per-connection state of every custom-delta (fast array) property of one
/// object.
#[derive(Debug, Default)]
pub struct CustomDeltaState {
    properties: BTreeMap<usize, CustomDeltaProperty>,
    arena: RetirementArena,
}

impl CustomDeltaState {
    pub fn new(layout: &Layout) -> Self {
        Self {
            properties: layout
                .custom_delta_parents()
                .map(|parent_index| (parent_index, CustomDeltaProperty::default()))
                .collect(),
            arena: RetirementArena::new(),
        }
    }

    /// The state the connection is believed to hold of one property.
    pub fn recent_state(&self, parent_index: usize) -> Option<&FastArrayBaseState> {
        self.properties.get(&parent_index).map(|property| &property.recent)
    }

    pub fn outstanding_records(&self) -> usize {
        self.arena.len()
    }

    /// Writes a delta for every active custom-delta parent that changed,
    /// each framed as `parent + 1, bit count, payload`, and a closing `0`.
    /// Returns whether any property was written.
    #[allow(clippy::too_many_arguments)]
    pub fn replicate(
        &mut self,
        layout: &Layout,
        data: &[Value],
        histories: &HashMap<usize, FastArrayChangelistState>,
        inactive_parents: &[bool],
        resend: ResendAllDataState,
        config: &ReplicationConfig,
        writer: &mut BitWriter,
        resolver: &dyn ReferenceResolver,
    ) -> Result<bool, SendError> {
        let mut sent = Vec::new();
        let mut body = BitWriter::new();

        // nothing is committed until every property has been written
        for (parent_index, property) in self.properties.iter() {
            let parent_index = *parent_index;
            if inactive_parents.get(parent_index).copied().unwrap_or(false) {
                continue;
            }
            let parent = &layout.parents()[parent_index];
            let (Some(item_layout), Some(array)) = (
                parent.item_layout.as_ref(),
                data.get(parent.slot).and_then(Value::as_fast_array),
            ) else {
                continue;
            };

            let base = match resend {
                ResendAllDataState::None => property.recent.clone(),
                ResendAllDataState::SinceOpen => FastArrayBaseState::default(),
                ResendAllDataState::SinceCheckpoint => {
                    property.checkpoint.clone().unwrap_or_default()
                }
            };

            let mut payload = BitWriter::new();
            let Some(new_state) = write_fast_array_delta(
                item_layout,
                array,
                &base,
                histories.get(&parent_index),
                config,
                &mut payload,
                resolver,
            )?
            else {
                continue;
            };

            write_varint(&mut body, parent_index as u32 + 1);
            write_varint(&mut body, payload.bits_written());
            body.append(&payload);
            trace!(
                "Custom delta `{}` sent ({} bits)",
                parent.name,
                payload.bits_written()
            );
            sent.push((parent_index, new_state));
        }

        writer.append(&body);
        write_varint(writer, 0);

        let wrote = !sent.is_empty();
        if resend == ResendAllDataState::None {
            for (parent_index, new_state) in sent {
                let Some(property) = self.properties.get_mut(&parent_index) else {
                    continue;
                };
                let previous = std::mem::replace(&mut property.recent, new_state);
                property
                    .retirement
                    .push(&mut self.arena, RetirementRecord::new(previous))?;
            }
        }
        Ok(wrote)
    }

    /// Stamps every unsent record with the packets that carried it.
    pub fn post_send(&mut self, range: PacketIdRange) -> Result<(), RetirementError> {
        for property in self.properties.values() {
            property.retirement.fill_ranges(&mut self.arena, range)?;
        }
        Ok(())
    }

    /// Rolls each property back to the state it had before the lost packet.
    pub fn received_nak(&mut self, nak: PacketIndex) -> Result<(), RetirementError> {
        for (parent_index, property) in self.properties.iter_mut() {
            if let Some(restored) = property.retirement.received_nak(&mut self.arena, nak)? {
                debug!(
                    "Custom delta parent {} rolled back to key {}",
                    parent_index, restored.array_replication_key
                );
                property.recent = restored;
            }
        }
        Ok(())
    }

    pub fn update_acked(&mut self, ack: PacketIndex) -> Result<(), RetirementError> {
        for property in self.properties.values_mut() {
            property.retirement.free_acked(&mut self.arena, ack)?;
        }
        Ok(())
    }

    /// No custom-delta send is awaiting acknowledgment.
    pub fn all_acked(&self) -> bool {
        self.properties
            .values()
            .all(|property| property.retirement.is_empty())
    }

    /// Remembers what each property holds now as the checkpoint base.
    pub fn set_checkpoint(&mut self) {
        for property in self.properties.values_mut() {
            property.checkpoint = Some(property.recent.clone());
        }
    }

    /// Forgets every in-flight send and everything the peer holds.
    pub fn reset(&mut self) -> Result<(), RetirementError> {
        for property in self.properties.values_mut() {
            property.retirement.clear(&mut self.arena)?;
            property.recent = FastArrayBaseState::default();
            property.checkpoint = None;
        }
        Ok(())
    }
}
