//! PCB channel geometry and geometric channel ID conversion.
//!
//! PETsys channel numbering follows the PCB trace routing, not the physical
//! position of the sensor pixel. The 128-entry [`PCB_LAYOUT`] table maps a
//! PCB channel slot to its `(row, column)` on the sensor array. Slots 0-63
//! belong to even chips, slots 64-127 to odd chips; the second half sits on
//! rows 8-15.
//!
//! The table is measured wiring data and has no closed form. Do not reorder.

use crate::channel::AbsoluteChannelId;
use crate::error::{Error, Result};

/// Number of PCB channel slots covered by the geometry table.
pub const PCB_SLOTS: usize = 128;

/// Number of columns in one sensor row.
pub const COLUMNS_PER_ROW: u8 = 8;

/// Row offset of the odd-chip quadrant.
const Q: u8 = 8;

/// PCB channel slot -> `(row, column)` on the sensor array.
#[rustfmt::skip]
pub const PCB_LAYOUT: [(u8, u8); PCB_SLOTS] = [
    // even chips, slots 0-63
    (4, 0), (4, 1), (7, 2), (5, 0), (5, 3), (5, 2), (4, 3), (7, 0),
    (6, 1), (7, 3), (5, 1), (6, 3), (4, 2), (6, 2), (6, 0), (7, 1),
    (3, 0), (3, 1), (2, 0), (2, 1), (0, 0), (1, 0), (0, 1), (1, 1),
    (3, 2), (1, 2), (2, 2), (4, 4), (0, 2), (3, 3), (0, 3), (1, 3),
    (2, 3), (3, 4), (2, 4), (0, 4), (1, 4), (0, 5), (5, 4), (1, 5),
    (2, 5), (3, 5), (1, 6), (0, 6), (0, 7), (3, 6), (1, 7), (2, 6),
    (3, 7), (2, 7), (6, 5), (6, 6), (7, 6), (4, 6), (5, 6), (6, 7),
    (7, 7), (7, 5), (7, 4), (4, 5), (5, 7), (5, 5), (6, 4), (4, 7),
    // odd chips, slots 64-127
    (Q + 3, 7), (Q + 3, 6), (Q + 2, 4), (Q + 2, 6), (Q + 3, 4), (Q + 1, 7), (Q + 1, 5), (Q, 7),
    (Q + 1, 6), (Q + 3, 3), (Q + 2, 7), (Q + 2, 3), (Q + 3, 5), (Q, 5), (Q + 2, 5), (Q, 6),
    (Q + 4, 7), (Q + 6, 7), (Q + 5, 7), (Q + 7, 7), (Q + 5, 6), (Q + 4, 6), (Q + 6, 6), (Q + 7, 6),
    (Q + 4, 5), (Q + 6, 5), (Q + 5, 5), (Q + 1, 4), (Q + 7, 5), (Q + 7, 4), (Q + 6, 4), (Q + 4, 4),
    (Q + 5, 4), (Q + 5, 3), (Q + 6, 3), (Q + 4, 3), (Q + 7, 3), (Q + 7, 2), (Q, 4), (Q + 6, 2),
    (Q + 7, 1), (Q + 5, 2), (Q + 6, 1), (Q + 4, 2), (Q + 7, 0), (Q + 5, 1), (Q + 6, 0), (Q + 4, 1),
    (Q + 5, 0), (Q + 4, 0), (Q, 2), (Q + 2, 1), (Q, 1), (Q + 3, 1), (Q + 1, 1), (Q + 1, 0),
    (Q, 0), (Q + 1, 2), (Q + 1, 3), (Q + 3, 2), (Q + 2, 0), (Q + 2, 2), (Q, 3), (Q + 3, 0),
];

/// Flat geometric index (`8 * row + column`) per PCB slot.
pub const GEO_CHANNELS: [u8; PCB_SLOTS] = build_geo_channels();

const fn build_geo_channels() -> [u8; PCB_SLOTS] {
    let mut out = [0u8; PCB_SLOTS];
    let mut slot = 0;
    while slot < PCB_SLOTS {
        let (row, col) = PCB_LAYOUT[slot];
        out[slot] = row * COLUMNS_PER_ROW + col;
        slot += 1;
    }
    out
}

/// A PCB slot paired with its flat geometric index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoChannelEntry {
    /// PCB channel slot (0..=127).
    pub slot: u8,
    /// `8 * row + column` for that slot (0..=127).
    pub flat_index: u8,
}

/// Iterates the derived slot -> flat index table in slot order.
pub fn geo_channels() -> impl Iterator<Item = GeoChannelEntry> {
    GEO_CHANNELS
        .iter()
        .zip(0u8..)
        .map(|(&flat_index, slot)| GeoChannelEntry { slot, flat_index })
}

/// Returns the `(row, column)` sensor position of a PCB slot.
///
/// # Errors
/// Returns [`Error::SlotOutOfRange`] for slots outside `0..=127`.
pub fn pcb_position(slot: usize) -> Result<(u8, u8)> {
    PCB_LAYOUT
        .get(slot)
        .copied()
        .ok_or(Error::SlotOutOfRange(slot))
}

/// Returns the flat geometric index `8 * row + column` of a PCB slot.
///
/// # Errors
/// Returns [`Error::SlotOutOfRange`] for slots outside `0..=127`.
pub fn to_geo(slot: usize) -> Result<u8> {
    GEO_CHANNELS
        .get(slot)
        .copied()
        .ok_or(Error::SlotOutOfRange(slot))
}

/// Converts a PETsys absolute channel ID into a geometric channel ID.
///
/// The result is `10000 * slave + 100 * chip + (flat_index mod 64)`, where
/// the flat index comes from the PCB slot `64 * (chip mod 2) + channel`.
///
/// # Errors
/// Returns [`Error::ChannelIdOverflow`] when the encoded value exceeds `u64`.
pub fn to_geo_channel_id(abs_channel_id: u64) -> Result<u64> {
    let abs = AbsoluteChannelId::new(abs_channel_id);
    let flat = to_geo(usize::from(abs.pcb_slot()))?;
    abs.slave_id()
        .checked_mul(10_000)
        .and_then(|v| v.checked_add(100 * u64::from(abs.chip_id())))
        .and_then(|v| v.checked_add(u64::from(flat % 64)))
        .ok_or(Error::ChannelIdOverflow(abs_channel_id))
}

/// Rewrites a column of absolute channel IDs into geometric IDs.
///
/// The column is left untouched if any value fails to convert.
///
/// # Errors
/// Propagates the first conversion error.
pub fn convert_channel_ids(ids: &mut [u64]) -> Result<()> {
    let converted = ids
        .iter()
        .map(|&id| to_geo_channel_id(id))
        .collect::<Result<Vec<_>>>()?;
    ids.copy_from_slice(&converted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slot_zero() {
        assert_eq!(pcb_position(0).unwrap(), (4, 0));
        assert_eq!(to_geo(0).unwrap(), 32);
        assert_eq!(to_geo_channel_id(0).unwrap(), 32);
    }

    #[test]
    fn test_table_is_permutation() {
        let flat: HashSet<u8> = GEO_CHANNELS.iter().copied().collect();
        assert_eq!(flat.len(), PCB_SLOTS);
        assert!(flat.iter().all(|&f| usize::from(f) < PCB_SLOTS));
    }

    #[test]
    fn test_quadrant_halves() {
        for slot in 0..64 {
            assert!(to_geo(slot).unwrap() < 64, "slot {slot}");
        }
        for slot in 64..128 {
            assert!((64..128).contains(&to_geo(slot).unwrap()), "slot {slot}");
        }
        let even: HashSet<u8> = GEO_CHANNELS[..64].iter().map(|f| f % 64).collect();
        let odd: HashSet<u8> = GEO_CHANNELS[64..].iter().map(|f| f % 64).collect();
        assert_eq!(even.len(), 64);
        assert_eq!(odd.len(), 64);
    }

    #[test]
    fn test_known_slots() {
        assert_eq!(to_geo(2).unwrap(), 58);
        assert_eq!(to_geo(20).unwrap(), 0);
        assert_eq!(to_geo(56).unwrap(), 63);
        assert_eq!(to_geo(64).unwrap(), 95);
        assert_eq!(to_geo(71).unwrap(), 71);
        assert_eq!(to_geo(120).unwrap(), 64);
        assert_eq!(to_geo(127).unwrap(), 88);
    }

    #[test]
    fn test_slot_out_of_range() {
        assert_eq!(to_geo(128), Err(Error::SlotOutOfRange(128)));
        assert!(pcb_position(usize::MAX).is_err());
    }

    #[test]
    fn test_geo_channel_id_odd_chip() {
        // slave 1, chip 3, channel 0 -> slot 64 -> flat 95 -> 95 % 64 = 31
        let abs = 4096 + 3 * 64;
        assert_eq!(to_geo_channel_id(abs).unwrap(), 10_000 + 300 + 31);
    }

    #[test]
    fn test_geo_channel_id_overflow() {
        assert_eq!(
            to_geo_channel_id(u64::MAX),
            Err(Error::ChannelIdOverflow(u64::MAX))
        );
    }

    #[test]
    fn test_geo_channels_iter() {
        let entries: Vec<_> = geo_channels().collect();
        assert_eq!(entries.len(), PCB_SLOTS);
        assert_eq!(
            entries[0],
            GeoChannelEntry {
                slot: 0,
                flat_index: 32
            }
        );
        assert_eq!(entries[127].slot, 127);
    }

    #[test]
    fn test_convert_column_is_atomic() {
        let mut ids = vec![0, 1, u64::MAX];
        assert!(convert_channel_ids(&mut ids).is_err());
        assert_eq!(ids, vec![0, 1, u64::MAX]);

        let mut ids = vec![0, 1];
        convert_channel_ids(&mut ids).unwrap();
        assert_eq!(ids, vec![32, 33]);
    }
}
