//! rustpet-io: Tab-separated file ingestion for rustpet.
//!
//! This crate reads PETsys coincidence and singles text output into
//! columnar batches, either eagerly or as a lazy sequence of chunks.
//!

mod error;
pub mod layout;
mod options;
mod reader;

pub use error::{Error, Result};
pub use layout::{CoincidenceLayout, RowLayout, SinglesLayout};
pub use options::LoadOptions;
pub use reader::{load_coincidences, load_singles, ChunkedReader, Loaded, TsvFileReader};
