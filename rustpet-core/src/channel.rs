//! PETsys channel addressing.
//!
//! An absolute channel ID packs `(slave, chip, channel)` with fixed radix:
//! 4096 channels per slave, 64 channels per chip.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Channels served by one ASIC.
pub const CHANNELS_PER_CHIP: u64 = 64;

/// Channels served by one slave (64 chips of 64 channels).
pub const CHANNELS_PER_SLAVE: u64 = 4096;

/// Raw hardware channel ID as written by the acquisition software.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AbsoluteChannelId(pub u64);

impl AbsoluteChannelId {
    /// Wraps a raw absolute channel ID.
    #[inline]
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Builds an ID from its hierarchical address, or `None` if it does not
    /// fit in a `u64`.
    ///
    /// `chip` must be below 64 and `channel` below 64 for the address to
    /// decompose back to the same parts.
    #[inline]
    #[must_use]
    pub fn from_parts(slave: u64, chip: u8, channel: u8) -> Option<Self> {
        slave
            .checked_mul(CHANNELS_PER_SLAVE)?
            .checked_add(u64::from(chip) * CHANNELS_PER_CHIP + u64::from(channel))
            .map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Slave (front-end board) index.
    #[inline]
    #[must_use]
    pub fn slave_id(&self) -> u64 {
        self.0 / CHANNELS_PER_SLAVE
    }

    /// Chip index within the slave (0..64).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chip_id(&self) -> u8 {
        ((self.0 % CHANNELS_PER_SLAVE) / CHANNELS_PER_CHIP) as u8
    }

    /// Channel index within the chip (0..64).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn channel_id(&self) -> u8 {
        (self.0 % CHANNELS_PER_CHIP) as u8
    }

    /// PCB slot in the geometry table: even chips use 0-63, odd chips 64-127.
    #[inline]
    #[must_use]
    pub fn pcb_slot(&self) -> u8 {
        64 * (self.chip_id() % 2) + self.channel_id()
    }
}

impl From<u64> for AbsoluteChannelId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Display/indexing channel ID: `10000 * slave + 100 * chip + pixel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeometricChannelId(pub u64);

impl GeometricChannelId {
    /// Converts an absolute channel ID through the PCB geometry table.
    ///
    /// # Errors
    /// Returns an error if the encoded value overflows `u64`.
    pub fn from_absolute(abs: AbsoluteChannelId) -> crate::Result<Self> {
        crate::geometry::to_geo_channel_id(abs.0).map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub fn slave_id(&self) -> u64 {
        self.0 / 10_000
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn chip_id(&self) -> u8 {
        ((self.0 % 10_000) / 100) as u8
    }

    /// Pixel index within the chip's quadrant (`flat_index mod 64`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn pixel(&self) -> u8 {
        (self.0 % 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose() {
        let id = AbsoluteChannelId::new(2 * 4096 + 5 * 64 + 17);
        assert_eq!(id.slave_id(), 2);
        assert_eq!(id.chip_id(), 5);
        assert_eq!(id.channel_id(), 17);
        assert_eq!(id.pcb_slot(), 64 + 17);
    }

    #[test]
    fn test_from_parts() {
        let id = AbsoluteChannelId::from_parts(3, 7, 63).unwrap();
        assert_eq!(id.as_u64(), 3 * 4096 + 7 * 64 + 63);
        assert_eq!(id.pcb_slot(), 127);
    }

    #[test]
    fn test_from_parts_overflow() {
        assert_eq!(AbsoluteChannelId::from_parts(u64::MAX / 4096 + 1, 0, 0), None);
        let last_slave = u64::MAX / 4096;
        let top = AbsoluteChannelId::from_parts(last_slave, 63, 63).unwrap();
        assert_eq!(top.as_u64(), u64::MAX);
    }

    #[test]
    fn test_geometric_fields() {
        let abs = AbsoluteChannelId::from_parts(1, 4, 0).unwrap();
        let geo = GeometricChannelId::from_absolute(abs).unwrap();
        // even chip, slot 0 -> flat 32
        assert_eq!(geo.as_u64(), 10_432);
        assert_eq!(geo.slave_id(), 1);
        assert_eq!(geo.chip_id(), 4);
        assert_eq!(geo.pixel(), 32);
    }
}
