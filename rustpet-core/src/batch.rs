//! Columnar event batches.
//!
//! Coincidence and singles records are stored in Structure of Arrays
//! (`SoA`) layout: one vector per field. Every batch remembers whether its
//! channel-ID columns hold raw absolute IDs or geometric IDs, so the
//! destructive geometric rewrite happens at most once.

use crate::error::{Error, Result};
use crate::geometry::convert_channel_ids;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which numbering the channel-ID columns of a batch use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelIdSpace {
    /// Raw PETsys absolute channel IDs.
    #[default]
    Absolute,
    /// IDs rewritten through the PCB geometry table.
    Geometric,
}

/// Operations shared by the coincidence and singles batch layouts.
pub trait EventBatch: Default + Send {
    /// Row view of a single record.
    type Event: Copy;

    /// Number of records.
    fn len(&self) -> usize;

    /// Returns true if the batch holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one record.
    fn push(&mut self, event: Self::Event);

    /// Channel ID numbering of this batch.
    fn id_space(&self) -> ChannelIdSpace;

    /// Multiplies every time column by `factor`.
    fn scale_time(&mut self, factor: f64);

    /// Appends all records of `other`.
    ///
    /// # Errors
    /// Fails if both batches are non-empty and use different ID spaces.
    fn append(&mut self, other: &Self) -> Result<()>;

    /// Rewrites every channel-ID column into geometric IDs, in place.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyGeometric`] on a second call, or a conversion
    /// error (the batch is left unchanged in that case).
    fn convert_to_geometric(&mut self) -> Result<()>;
}

fn merged_space(
    this: ChannelIdSpace,
    this_empty: bool,
    other: ChannelIdSpace,
    other_empty: bool,
) -> Result<ChannelIdSpace> {
    if this_empty {
        return Ok(other);
    }
    if other_empty || this == other {
        return Ok(this);
    }
    Err(Error::MixedIdSpace {
        left: this,
        right: other,
    })
}

fn check_len(column: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::ColumnLengthMismatch {
            column,
            expected,
            found,
        })
    }
}

/// One coincidence record: a left and a right detector hit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidenceEvent {
    /// Left hit time stamp (picoseconds unless scaled at load).
    pub time_l: f64,
    /// Left hit integrated charge.
    pub charge_l: f64,
    /// Left hit channel ID.
    pub channel_id_l: u64,
    /// Right hit time stamp.
    pub time_r: f64,
    /// Right hit integrated charge.
    pub charge_r: f64,
    /// Right hit channel ID.
    pub channel_id_r: u64,
}

impl CoincidenceEvent {
    /// Left minus right time stamp.
    #[inline]
    #[must_use]
    pub fn time_difference(&self) -> f64 {
        self.time_l - self.time_r
    }

    /// The `(left, right)` channel pair.
    #[inline]
    #[must_use]
    pub fn channel_pair(&self) -> (u64, u64) {
        (self.channel_id_l, self.channel_id_r)
    }
}

/// A batch of coincidence records in `SoA` layout.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidenceBatch {
    /// Left hit time stamps.
    pub time_l: Vec<f64>,
    /// Left hit charges.
    pub charge_l: Vec<f64>,
    /// Left hit channel IDs, absolute or geometric per the batch marker.
    pub channel_id_l: Vec<u64>,
    /// Right hit time stamps.
    pub time_r: Vec<f64>,
    /// Right hit charges.
    pub charge_r: Vec<f64>,
    /// Right hit channel IDs.
    pub channel_id_r: Vec<u64>,
    id_space: ChannelIdSpace,
}

impl CoincidenceBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time_l: Vec::with_capacity(capacity),
            charge_l: Vec::with_capacity(capacity),
            channel_id_l: Vec::with_capacity(capacity),
            time_r: Vec::with_capacity(capacity),
            charge_r: Vec::with_capacity(capacity),
            channel_id_r: Vec::with_capacity(capacity),
            id_space: ChannelIdSpace::Absolute,
        }
    }

    /// Builds a batch from complete columns.
    ///
    /// # Errors
    /// Returns [`Error::ColumnLengthMismatch`] if the columns differ in length.
    pub fn from_columns(
        time_l: Vec<f64>,
        charge_l: Vec<f64>,
        channel_id_l: Vec<u64>,
        time_r: Vec<f64>,
        charge_r: Vec<f64>,
        channel_id_r: Vec<u64>,
    ) -> Result<Self> {
        let n = time_l.len();
        check_len("ChargeL", n, charge_l.len())?;
        check_len("ChannelIDL", n, channel_id_l.len())?;
        check_len("TimeR", n, time_r.len())?;
        check_len("ChargeR", n, charge_r.len())?;
        check_len("ChannelIDR", n, channel_id_r.len())?;
        Ok(Self {
            time_l,
            charge_l,
            channel_id_l,
            time_r,
            charge_r,
            channel_id_r,
            id_space: ChannelIdSpace::Absolute,
        })
    }

    /// Declares the channel ID numbering of externally built columns.
    #[must_use]
    pub fn with_id_space(mut self, id_space: ChannelIdSpace) -> Self {
        self.id_space = id_space;
        self
    }

    /// Returns the record at `index`, or `None` if any column is shorter.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<CoincidenceEvent> {
        Some(CoincidenceEvent {
            time_l: *self.time_l.get(index)?,
            charge_l: *self.charge_l.get(index)?,
            channel_id_l: *self.channel_id_l.get(index)?,
            time_r: *self.time_r.get(index)?,
            charge_r: *self.charge_r.get(index)?,
            channel_id_r: *self.channel_id_r.get(index)?,
        })
    }

    /// Iterates over records in file order.
    pub fn iter(&self) -> impl Iterator<Item = CoincidenceEvent> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Clears all columns. The ID space marker is reset to absolute.
    pub fn clear(&mut self) {
        self.time_l.clear();
        self.charge_l.clear();
        self.channel_id_l.clear();
        self.time_r.clear();
        self.charge_r.clear();
        self.channel_id_r.clear();
        self.id_space = ChannelIdSpace::Absolute;
    }
}

impl EventBatch for CoincidenceBatch {
    type Event = CoincidenceEvent;

    fn len(&self) -> usize {
        self.time_l.len()
    }

    fn push(&mut self, event: CoincidenceEvent) {
        self.time_l.push(event.time_l);
        self.charge_l.push(event.charge_l);
        self.channel_id_l.push(event.channel_id_l);
        self.time_r.push(event.time_r);
        self.charge_r.push(event.charge_r);
        self.channel_id_r.push(event.channel_id_r);
    }

    fn id_space(&self) -> ChannelIdSpace {
        self.id_space
    }

    fn scale_time(&mut self, factor: f64) {
        self.time_l.iter_mut().for_each(|t| *t *= factor);
        self.time_r.iter_mut().for_each(|t| *t *= factor);
    }

    fn append(&mut self, other: &Self) -> Result<()> {
        self.id_space = merged_space(
            self.id_space,
            self.is_empty(),
            other.id_space,
            other.is_empty(),
        )?;
        self.time_l.extend_from_slice(&other.time_l);
        self.charge_l.extend_from_slice(&other.charge_l);
        self.channel_id_l.extend_from_slice(&other.channel_id_l);
        self.time_r.extend_from_slice(&other.time_r);
        self.charge_r.extend_from_slice(&other.charge_r);
        self.channel_id_r.extend_from_slice(&other.channel_id_r);
        Ok(())
    }

    fn convert_to_geometric(&mut self) -> Result<()> {
        if self.id_space == ChannelIdSpace::Geometric {
            return Err(Error::AlreadyGeometric);
        }
        let mut left = self.channel_id_l.clone();
        convert_channel_ids(&mut left)?;
        convert_channel_ids(&mut self.channel_id_r)?;
        self.channel_id_l = left;
        self.id_space = ChannelIdSpace::Geometric;
        Ok(())
    }
}

/// One singles record.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SinglesEvent {
    /// Hit time stamp.
    pub time: f64,
    /// Integrated charge.
    pub charge: f64,
    /// Channel ID.
    pub channel_id: u64,
}

/// A batch of singles records in `SoA` layout.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SinglesBatch {
    /// Hit time stamps.
    pub time: Vec<f64>,
    /// Hit charges.
    pub charge: Vec<f64>,
    /// Channel IDs, absolute or geometric per the batch marker.
    pub channel_id: Vec<u64>,
    id_space: ChannelIdSpace,
}

impl SinglesBatch {
    /// Creates a new empty batch with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            charge: Vec::with_capacity(capacity),
            channel_id: Vec::with_capacity(capacity),
            id_space: ChannelIdSpace::Absolute,
        }
    }

    /// Builds a batch from complete columns.
    ///
    /// # Errors
    /// Returns [`Error::ColumnLengthMismatch`] if the columns differ in length.
    pub fn from_columns(time: Vec<f64>, charge: Vec<f64>, channel_id: Vec<u64>) -> Result<Self> {
        check_len("Charge", time.len(), charge.len())?;
        check_len("ChannelID", time.len(), channel_id.len())?;
        Ok(Self {
            time,
            charge,
            channel_id,
            id_space: ChannelIdSpace::Absolute,
        })
    }

    /// Declares the channel ID numbering of externally built columns.
    #[must_use]
    pub fn with_id_space(mut self, id_space: ChannelIdSpace) -> Self {
        self.id_space = id_space;
        self
    }

    /// Returns the record at `index`, or `None` if any column is shorter.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<SinglesEvent> {
        Some(SinglesEvent {
            time: *self.time.get(index)?,
            charge: *self.charge.get(index)?,
            channel_id: *self.channel_id.get(index)?,
        })
    }

    /// Iterates over records in file order.
    pub fn iter(&self) -> impl Iterator<Item = SinglesEvent> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// Clears all columns. The ID space marker is reset to absolute.
    pub fn clear(&mut self) {
        self.time.clear();
        self.charge.clear();
        self.channel_id.clear();
        self.id_space = ChannelIdSpace::Absolute;
    }
}

impl EventBatch for SinglesBatch {
    type Event = SinglesEvent;

    fn len(&self) -> usize {
        self.time.len()
    }

    fn push(&mut self, event: SinglesEvent) {
        self.time.push(event.time);
        self.charge.push(event.charge);
        self.channel_id.push(event.channel_id);
    }

    fn id_space(&self) -> ChannelIdSpace {
        self.id_space
    }

    fn scale_time(&mut self, factor: f64) {
        self.time.iter_mut().for_each(|t| *t *= factor);
    }

    fn append(&mut self, other: &Self) -> Result<()> {
        self.id_space = merged_space(
            self.id_space,
            self.is_empty(),
            other.id_space,
            other.is_empty(),
        )?;
        self.time.extend_from_slice(&other.time);
        self.charge.extend_from_slice(&other.charge);
        self.channel_id.extend_from_slice(&other.channel_id);
        Ok(())
    }

    fn convert_to_geometric(&mut self) -> Result<()> {
        if self.id_space == ChannelIdSpace::Geometric {
            return Err(Error::AlreadyGeometric);
        }
        convert_channel_ids(&mut self.channel_id)?;
        self.id_space = ChannelIdSpace::Geometric;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(id_l: u64, id_r: u64) -> CoincidenceEvent {
        CoincidenceEvent {
            time_l: 1000.0,
            charge_l: 12.5,
            channel_id_l: id_l,
            time_r: 400.0,
            charge_r: 9.0,
            channel_id_r: id_r,
        }
    }

    #[test]
    fn test_coincidence_batch_operations() {
        let mut batch = CoincidenceBatch::with_capacity(4);
        assert!(batch.is_empty());

        batch.push(event(0, 1));
        batch.push(event(2, 3));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(1).unwrap().channel_pair(), (2, 3));
        assert!(batch.get(2).is_none());
        assert_relative_eq!(batch.get(0).unwrap().time_difference(), 600.0);

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_scale_time_only_touches_time() {
        let mut batch = CoincidenceBatch::default();
        batch.push(event(0, 1));
        batch.scale_time(1e-3);
        assert_relative_eq!(batch.time_l[0], 1.0);
        assert_relative_eq!(batch.time_r[0], 0.4);
        assert_relative_eq!(batch.charge_l[0], 12.5);

        let mut singles = SinglesBatch::default();
        singles.push(SinglesEvent {
            time: 50.0,
            charge: 3.0,
            channel_id: 7,
        });
        singles.scale_time(2.0);
        assert_relative_eq!(singles.time[0], 100.0);
        assert_relative_eq!(singles.charge[0], 3.0);
    }

    #[test]
    fn test_convert_once() {
        let mut batch = CoincidenceBatch::default();
        batch.push(event(0, 1));
        batch.convert_to_geometric().unwrap();
        assert_eq!(batch.id_space(), ChannelIdSpace::Geometric);
        assert_eq!(batch.channel_id_l, vec![32]);
        assert_eq!(batch.channel_id_r, vec![33]);

        assert_eq!(batch.convert_to_geometric(), Err(Error::AlreadyGeometric));
        assert_eq!(batch.channel_id_l, vec![32]);
    }

    #[test]
    fn test_failed_convert_leaves_batch_unchanged() {
        let mut batch = CoincidenceBatch::default();
        batch.push(event(1, u64::MAX));
        let before = batch.clone();
        assert!(batch.convert_to_geometric().is_err());
        assert_eq!(batch, before);
        assert_eq!(batch.id_space(), ChannelIdSpace::Absolute);
    }

    #[test]
    fn test_append_refuses_mixed_spaces() {
        let mut absolute = CoincidenceBatch::default();
        absolute.push(event(0, 1));
        let mut geometric = absolute.clone();
        geometric.convert_to_geometric().unwrap();

        let mut merged = absolute.clone();
        assert!(matches!(
            merged.append(&geometric),
            Err(Error::MixedIdSpace { .. })
        ));

        let mut empty = CoincidenceBatch::default();
        empty.append(&geometric).unwrap();
        assert_eq!(empty.id_space(), ChannelIdSpace::Geometric);
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn test_from_columns_length_check() {
        let err = SinglesBatch::from_columns(vec![1.0, 2.0], vec![1.0], vec![0, 0]).unwrap_err();
        assert_eq!(
            err,
            Error::ColumnLengthMismatch {
                column: "Charge",
                expected: 2,
                found: 1
            }
        );

        let batch = SinglesBatch::from_columns(vec![1.0], vec![2.0], vec![64])
            .unwrap()
            .with_id_space(ChannelIdSpace::Geometric);
        assert_eq!(batch.iter().count(), 1);
        assert_eq!(batch.id_space(), ChannelIdSpace::Geometric);
    }

    #[test]
    fn test_get_with_unsynced_columns() {
        let mut batch = CoincidenceBatch::default();
        batch.push(event(1, 2));
        batch.push(event(3, 4));
        batch.charge_r.pop();
        assert!(batch.get(0).is_some());
        assert!(batch.get(1).is_none());
        assert_eq!(batch.iter().count(), 1);

        let mut singles = SinglesBatch::default();
        singles.time.push(1.0);
        assert!(singles.get(0).is_none());
        assert_eq!(singles.iter().count(), 0);
    }
}
