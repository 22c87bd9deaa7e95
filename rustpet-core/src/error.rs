//! Error types for rustpet-core.

use thiserror::Error;

/// Result type alias for rustpet-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for channel mapping and batch handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// PCB channel slot outside the 128-entry geometry table.
    #[error("PCB channel slot out of range: {0} (expected 0..=127)")]
    SlotOutOfRange(usize),

    /// Geometric channel ID does not fit in 64 bits.
    #[error("absolute channel ID {0} overflows the geometric ID encoding")]
    ChannelIdOverflow(u64),

    /// Channel IDs of the batch were already rewritten to geometric IDs.
    #[error("channel IDs are already geometric; conversion must be applied once")]
    AlreadyGeometric,

    /// Batches with different channel ID spaces cannot be merged.
    #[error("cannot mix batches with {left:?} and {right:?} channel IDs")]
    MixedIdSpace {
        left: crate::batch::ChannelIdSpace,
        right: crate::batch::ChannelIdSpace,
    },

    /// Column vectors of a batch disagree in length.
    #[error("column length mismatch: {column} has {found} values, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        found: usize,
    },
}
