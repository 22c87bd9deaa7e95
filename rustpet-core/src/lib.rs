//! rustpet-core: Channel geometry and event batches for PETsys detector data.
//!
//! This crate provides the PCB geometry table, the absolute -> geometric
//! channel ID conversion, and the columnar batches holding coincidence and
//! singles records.
//!

pub mod batch;
pub mod channel;
pub mod error;
pub mod geometry;

pub use batch::{
    ChannelIdSpace, CoincidenceBatch, CoincidenceEvent, EventBatch, SinglesBatch, SinglesEvent,
};
pub use channel::{AbsoluteChannelId, GeometricChannelId, CHANNELS_PER_CHIP, CHANNELS_PER_SLAVE};
pub use error::{Error, Result};
pub use geometry::{
    convert_channel_ids, geo_channels, pcb_position, to_geo, to_geo_channel_id, GeoChannelEntry,
    GEO_CHANNELS, PCB_LAYOUT, PCB_SLOTS,
};
