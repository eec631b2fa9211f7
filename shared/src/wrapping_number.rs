use crate::types::PacketIndex;

/// Returns whether packet id `s1` comes after `s2`, allowing for wrap-around.
/// sequence_greater_than(2,1) will return true
/// sequence_greater_than(1,2) will return false
/// sequence_greater_than(1,1) will return false
/// sequence_greater_than(0,65535) will return true
pub fn sequence_greater_than(s1: PacketIndex, s2: PacketIndex) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether packet id `s1` comes before `s2`, allowing for wrap-around.
pub fn sequence_less_than(s1: PacketIndex, s2: PacketIndex) -> bool {
    sequence_greater_than(s2, s1)
}

/// `s1 >= s2` in wrapping order.
pub fn sequence_greater_or_equal(s1: PacketIndex, s2: PacketIndex) -> bool {
    s1 == s2 || sequence_greater_than(s1, s2)
}

/// Inclusive range of packet ids an outgoing payload was split across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketIdRange {
    pub first: PacketIndex,
    pub last: PacketIndex,
}

impl PacketIdRange {
    pub fn new(first: PacketIndex, last: PacketIndex) -> Self {
        Self { first, last }
    }

    pub fn single(id: PacketIndex) -> Self {
        Self { first: id, last: id }
    }

    pub fn contains(&self, id: PacketIndex) -> bool {
        sequence_greater_or_equal(id, self.first) && sequence_greater_or_equal(self.last, id)
    }

    /// True once `ack` covers every packet in this range.
    pub fn is_acked_by(&self, ack: PacketIndex) -> bool {
        sequence_greater_or_equal(ack, self.last)
    }
}
