//! Column layouts of PETsys text output.
//!
//! Coincidence files carry ten or more columns; positions 2, 3, 4 hold the
//! left hit (time, charge, channel) and 7, 8, 9 the right hit. Singles files
//! have exactly three columns: time, charge, channel.

use crate::{Error, Result};
use csv::StringRecord;
use rustpet_core::{CoincidenceBatch, CoincidenceEvent, EventBatch, SinglesBatch, SinglesEvent};
use std::str::FromStr;

/// Maps one text row onto a record of a batch type.
pub trait RowLayout {
    /// Batch type filled by this layout.
    type Batch: EventBatch;

    /// Short name used in log messages.
    const NAME: &'static str;

    /// Parses one row.
    ///
    /// # Errors
    /// Returns an error if the row has the wrong shape or a non-numeric field.
    fn parse_row(record: &StringRecord, line: u64) -> Result<<Self::Batch as EventBatch>::Event>;
}

fn field<T: FromStr>(
    record: &StringRecord,
    column: usize,
    line: u64,
    expected: &'static str,
) -> Result<T> {
    let raw = record.get(column).unwrap_or_default();
    raw.parse().map_err(|_| Error::Parse {
        line,
        column,
        value: raw.to_string(),
        expected,
    })
}

fn float(record: &StringRecord, column: usize, line: u64) -> Result<f64> {
    field(record, column, line, "a number")
}

fn channel(record: &StringRecord, column: usize, line: u64) -> Result<u64> {
    field(record, column, line, "a channel ID")
}

/// Coincidence layout: `TimeL, ChargeL, ChannelIDL, TimeR, ChargeR, ChannelIDR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoincidenceLayout;

impl CoincidenceLayout {
    /// Minimum number of columns in a coincidence row.
    pub const MIN_COLUMNS: usize = 10;
}

impl RowLayout for CoincidenceLayout {
    type Batch = CoincidenceBatch;
    const NAME: &'static str = "coincidence";

    fn parse_row(record: &StringRecord, line: u64) -> Result<CoincidenceEvent> {
        if record.len() < Self::MIN_COLUMNS {
            return Err(Error::TooFewColumns {
                line,
                minimum: Self::MIN_COLUMNS,
                found: record.len(),
            });
        }
        Ok(CoincidenceEvent {
            time_l: float(record, 2, line)?,
            charge_l: float(record, 3, line)?,
            channel_id_l: channel(record, 4, line)?,
            time_r: float(record, 7, line)?,
            charge_r: float(record, 8, line)?,
            channel_id_r: channel(record, 9, line)?,
        })
    }
}

/// Singles layout: `Time, Charge, ChannelID`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglesLayout;

impl SinglesLayout {
    /// Number of columns in a singles row.
    pub const COLUMNS: usize = 3;
}

impl RowLayout for SinglesLayout {
    type Batch = SinglesBatch;
    const NAME: &'static str = "singles";

    fn parse_row(record: &StringRecord, line: u64) -> Result<SinglesEvent> {
        if record.len() != Self::COLUMNS {
            return Err(Error::ColumnCount {
                line,
                expected: Self::COLUMNS,
                found: record.len(),
            });
        }
        Ok(SinglesEvent {
            time: float(record, 0, line)?,
            charge: float(record, 1, line)?,
            channel_id: channel(record, 2, line)?,
        })
    }
}
