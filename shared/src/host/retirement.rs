use log::debug;
use thunderdome::{Arena, Index};

use crate::{
    fast_array::FastArrayBaseState,
    host::error::RetirementError,
    types::PacketIndex,
    wrapping_number::{sequence_greater_than, PacketIdRange},
};

/// Generation-checked index of a record in a [`RetirementArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetirementHandle(Index);

impl RetirementHandle {
    fn stale(self) -> RetirementError {
        RetirementError::StaleHandle { slot: self.0.slot() }
    }
}

/// One custom-delta send awaiting acknowledgment, holding the base state
/// from before the send.
#[derive(Clone, Debug)]
pub struct RetirementRecord {
    pub packet_range: Option<PacketIdRange>,
    pub base_state: FastArrayBaseState,
    next: Option<RetirementHandle>,
}

impl RetirementRecord {
    pub fn new(base_state: FastArrayBaseState) -> Self {
        Self {
            packet_range: None,
            base_state,
            next: None,
        }
    }
}

/// Records of every list of one object replicator.
#[derive(Clone, Debug, Default)]
pub struct RetirementArena {
    records: Arena<RetirementRecord>,
}

impl RetirementArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: RetirementRecord) -> RetirementHandle {
        RetirementHandle(self.records.insert(record))
    }

    pub fn get(&self, handle: RetirementHandle) -> Result<&RetirementRecord, RetirementError> {
        self.records.get(handle.0).ok_or_else(|| handle.stale())
    }

    pub fn get_mut(
        &mut self,
        handle: RetirementHandle,
    ) -> Result<&mut RetirementRecord, RetirementError> {
        self.records.get_mut(handle.0).ok_or_else(|| handle.stale())
    }

    pub fn remove(
        &mut self,
        handle: RetirementHandle,
    ) -> Result<RetirementRecord, RetirementError> {
        self.records.remove(handle.0).ok_or_else(|| handle.stale())
    }
}

/// Send-ordered retirement records of one (connection, custom-delta field).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetirementList {
    head: Option<RetirementHandle>,
    tail: Option<RetirementHandle>,
}

impl RetirementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn push(
        &mut self,
        arena: &mut RetirementArena,
        record: RetirementRecord,
    ) -> Result<RetirementHandle, RetirementError> {
        let handle = arena.insert(record);
        match self.tail {
            Some(tail) => arena.get_mut(tail)?.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        Ok(handle)
    }

    pub fn len(&self, arena: &RetirementArena) -> Result<usize, RetirementError> {
        let mut count = 0;
        let mut current = self.head;
        while let Some(handle) = current {
            count += 1;
            current = arena.get(handle)?.next;
        }
        Ok(count)
    }

    /// Stamps every record sent without a packet range.
    pub fn fill_ranges(
        &self,
        arena: &mut RetirementArena,
        range: PacketIdRange,
    ) -> Result<(), RetirementError> {
        let mut current = self.head;
        while let Some(handle) = current {
            let record = arena.get_mut(handle)?;
            if record.packet_range.is_none() {
                record.packet_range = Some(range);
            }
            current = record.next;
        }
        Ok(())
    }

    /// Frees records from the front whose packets are acknowledged.
    pub fn free_acked(
        &mut self,
        arena: &mut RetirementArena,
        ack: PacketIndex,
    ) -> Result<(), RetirementError> {
        while let Some(head) = self.head {
            let acked = arena
                .get(head)?
                .packet_range
                .map_or(false, |range| range.is_acked_by(ack));
            if !acked {
                break;
            }
            self.pop_front(arena)?;
        }
        Ok(())
    }

    /// Handles a lost packet. Records sent before it are treated as
    /// acknowledged; if a record covers it, that record's base state is
    /// returned and it and every later record are discarded.
    pub fn received_nak(
        &mut self,
        arena: &mut RetirementArena,
        nak: PacketIndex,
    ) -> Result<Option<FastArrayBaseState>, RetirementError> {
        let mut previous: Option<RetirementHandle> = None;
        let mut current = self.head;

        while let Some(handle) = current {
            let record = arena.get(handle)?;
            let next = record.next;
            let Some(range) = record.packet_range else {
                previous = Some(handle);
                current = next;
                continue;
            };

            if previous.is_none() && sequence_greater_than(nak, range.last) {
                self.pop_front(arena)?;
                current = self.head;
                continue;
            }

            if range.contains(nak) {
                let restored = arena.remove(handle)?.base_state;
                let mut doomed = next;
                while let Some(later) = doomed {
                    doomed = arena.remove(later)?.next;
                }
                match previous {
                    Some(previous) => arena.get_mut(previous)?.next = None,
                    None => self.head = None,
                }
                self.tail = previous;
                debug!(
                    "Restoring base state {} for lost packet {} ({}..={})",
                    restored.array_replication_key, nak, range.first, range.last
                );
                return Ok(Some(restored));
            }

            previous = Some(handle);
            current = next;
        }
        Ok(None)
    }

    pub fn clear(&mut self, arena: &mut RetirementArena) -> Result<(), RetirementError> {
        while self.head.is_some() {
            self.pop_front(arena)?;
        }
        Ok(())
    }

    fn pop_front(&mut self, arena: &mut RetirementArena) -> Result<(), RetirementError> {
        if let Some(head) = self.head {
            self.head = arena.remove(head)?.next;
            if self.head.is_none() {
                self.tail = None;
            }
        }
        Ok(())
    }
}
