use thiserror::Error;

/// Errors produced when validating a [`ReplicationConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_rep_array_size` must be within `1..=65535`.
    #[error("max_rep_array_size must be between 1 and 65535, got {value}")]
    MaxRepArraySize { value: u32 },

    /// `max_rep_array_memory` must be at least one byte.
    #[error("max_rep_array_memory must be at least 1, got {value}")]
    MaxRepArrayMemory { value: u32 },

    /// A history buffer is too small to hold an entry plus its successor.
    #[error("{field} must be at least 2, got {value}")]
    HistoryTooSmall { field: &'static str, value: usize },

    /// The shared history is indexed modulo its size.
    #[error("shared_history_size must be a power of two, got {value}")]
    SharedHistoryNotPowerOfTwo { value: usize },
}

/// Tunables for layout compilation, comparison, serialization and receive
/// bounds. Built once and handed to every component at construction time.
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Largest dynamic array, in elements, a receiver will accept.
    pub max_rep_array_size: u32,
    /// Largest dynamic array, in bytes (`count * element size`), a receiver
    /// will accept.
    pub max_rep_array_memory: u32,
    /// Encode shareable properties once per tick and copy the bits into
    /// every connection's stream.
    pub share_serialized_data: bool,
    /// Compare an object at most once per frame and fan the result out to
    /// all connections.
    pub share_shadow_state: bool,
    /// Send identified-item arrays as per-item deltas instead of in full.
    pub support_fast_array_delta: bool,
    /// Depth of the shared changelist history per object.
    pub shared_history_size: usize,
    /// Depth of each connection's in-flight changelist history.
    pub connection_history_size: usize,
    /// Depth of each fast array's per-item changelist history.
    pub fast_array_history_size: usize,
    /// Log skipped change notifications.
    pub log_skipped_rep_notifies: bool,
}

impl ReplicationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rep_array_size < 1 || self.max_rep_array_size > u32::from(u16::MAX) {
            return Err(ConfigError::MaxRepArraySize {
                value: self.max_rep_array_size,
            });
        }
        if self.max_rep_array_memory < 1 {
            return Err(ConfigError::MaxRepArrayMemory {
                value: self.max_rep_array_memory,
            });
        }
        for (field, value) in [
            ("shared_history_size", self.shared_history_size),
            ("connection_history_size", self.connection_history_size),
            ("fast_array_history_size", self.fast_array_history_size),
        ] {
            if value < 2 {
                return Err(ConfigError::HistoryTooSmall { field, value });
            }
        }
        if !self.shared_history_size.is_power_of_two() {
            return Err(ConfigError::SharedHistoryNotPowerOfTwo {
                value: self.shared_history_size,
            });
        }
        Ok(())
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_rep_array_size: 2048,
            max_rep_array_memory: 65536,
            share_serialized_data: true,
            share_shadow_state: true,
            support_fast_array_delta: true,
            shared_history_size: 64,
            connection_history_size: 32,
            fast_array_history_size: 32,
            log_skipped_rep_notifies: false,
        }
    }
}
