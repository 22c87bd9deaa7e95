//! Tab-separated file readers.
//!

use crate::layout::{CoincidenceLayout, RowLayout, SinglesLayout};
use crate::{LoadOptions, Result};
use csv::{Position, ReaderBuilder, StringRecord, Trim};
use rustpet_core::{CoincidenceBatch, EventBatch, SinglesBatch};
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

fn open_tsv(path: &Path, has_header: bool) -> Result<csv::Reader<File>> {
    let reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_header)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Reads up to `limit` rows into a fresh batch. Returns the batch and
/// whether the end of the file was reached.
fn fill_batch<L: RowLayout>(
    reader: &mut csv::Reader<File>,
    record: &mut StringRecord,
    limit: usize,
) -> Result<(L::Batch, bool)> {
    let mut batch = L::Batch::default();
    while batch.len() < limit {
        if !reader.read_record(record)? {
            return Ok((batch, true));
        }
        let line = record.position().map_or(0, Position::line);
        batch.push(L::parse_row(record, line)?);
    }
    Ok((batch, false))
}

/// Lazy reader yielding batches of at most `chunk_size` records.
///
/// Each chunk is an independent batch with its time columns already scaled.
/// After the first error the iterator is exhausted.
pub struct ChunkedReader<L: RowLayout> {
    reader: csv::Reader<File>,
    record: StringRecord,
    chunk_size: usize,
    time_scale: f64,
    chunks_read: usize,
    done: bool,
    _layout: PhantomData<L>,
}

impl<L: RowLayout> ChunkedReader<L> {
    /// Number of chunks produced so far.
    #[must_use]
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Reads all remaining chunks into one batch.
    ///
    /// # Errors
    /// Returns the first parse or I/O error.
    pub fn collect_batch(self) -> Result<L::Batch> {
        let mut all = L::Batch::default();
        for chunk in self {
            all.append(&chunk?)?;
        }
        Ok(all)
    }
}

impl<L: RowLayout> Iterator for ChunkedReader<L> {
    type Item = Result<L::Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match fill_batch::<L>(&mut self.reader, &mut self.record, self.chunk_size) {
            Ok((mut batch, eof)) => {
                self.done = eof;
                if batch.is_empty() {
                    return None;
                }
                batch.scale_time(self.time_scale);
                self.chunks_read += 1;
                log::debug!(
                    "read {} chunk {} ({} records)",
                    L::NAME,
                    self.chunks_read,
                    batch.len()
                );
                Some(Ok(batch))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Result of a load call: one table, or a lazy chunk sequence when a chunk
/// size was requested.
pub enum Loaded<L: RowLayout> {
    /// Whole file in memory.
    Table(L::Batch),
    /// Lazy batches.
    Chunks(ChunkedReader<L>),
}

impl<L: RowLayout> Loaded<L> {
    /// Returns the whole table, draining chunks if necessary.
    ///
    /// # Errors
    /// Returns the first error of a chunked read.
    pub fn into_table(self) -> Result<L::Batch> {
        match self {
            Loaded::Table(batch) => Ok(batch),
            Loaded::Chunks(chunks) => chunks.collect_batch(),
        }
    }
}

/// Reader for PETsys tab-separated coincidence and singles output.
pub struct TsvFileReader {
    path: PathBuf,
    options: LoadOptions,
}

impl TsvFileReader {
    /// Opens a file for reading with default options.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or cannot be accessed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::metadata(&path)?;
        Ok(Self {
            path,
            options: LoadOptions::default(),
        })
    }

    /// Sets the load options.
    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the time scale factor.
    #[must_use]
    pub fn with_time_scale(mut self, factor: f64) -> Self {
        self.options.time_scale = factor;
        self
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the active options.
    #[must_use]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Reads every row into one batch using layout `L`.
    ///
    /// # Errors
    /// Returns an error on I/O failure or on the first malformed row.
    pub fn read<L: RowLayout>(&self) -> Result<L::Batch> {
        self.options.validate()?;
        let mut reader = open_tsv(&self.path, self.options.has_header)?;
        let mut record = StringRecord::new();
        let (mut batch, _) = fill_batch::<L>(&mut reader, &mut record, usize::MAX)?;
        batch.scale_time(self.options.time_scale);
        log::debug!(
            "read {} {} records from {}",
            batch.len(),
            L::NAME,
            self.path.display()
        );
        Ok(batch)
    }

    /// Returns a lazy reader producing batches of `chunk_size` rows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn chunks<L: RowLayout>(&self, chunk_size: usize) -> Result<ChunkedReader<L>> {
        self.options.validate()?;
        Ok(ChunkedReader {
            reader: open_tsv(&self.path, self.options.has_header)?,
            record: StringRecord::new(),
            chunk_size: chunk_size.max(1),
            time_scale: self.options.time_scale,
            chunks_read: 0,
            done: false,
            _layout: PhantomData,
        })
    }

    /// Reads eagerly, or lazily when the options carry a chunk size.
    ///
    /// # Errors
    /// Returns an error on I/O failure or (eager mode) a malformed row.
    pub fn load<L: RowLayout>(&self) -> Result<Loaded<L>> {
        match self.options.chunk_size {
            Some(size) => self.chunks(size).map(Loaded::Chunks),
            None => self.read::<L>().map(Loaded::Table),
        }
    }

    /// Reads a coincidence file into one batch.
    ///
    /// # Errors
    /// See [`Self::read`].
    pub fn read_coincidences(&self) -> Result<CoincidenceBatch> {
        self.read::<CoincidenceLayout>()
    }

    /// Reads a singles file into one batch.
    ///
    /// # Errors
    /// See [`Self::read`].
    pub fn read_singles(&self) -> Result<SinglesBatch> {
        self.read::<SinglesLayout>()
    }

    /// Lazy coincidence batches.
    ///
    /// # Errors
    /// See [`Self::chunks`].
    pub fn coincidence_chunks(&self, chunk_size: usize) -> Result<ChunkedReader<CoincidenceLayout>> {
        self.chunks(chunk_size)
    }

    /// Lazy singles batches.
    ///
    /// # Errors
    /// See [`Self::chunks`].
    pub fn singles_chunks(&self, chunk_size: usize) -> Result<ChunkedReader<SinglesLayout>> {
        self.chunks(chunk_size)
    }
}

/// Loads a coincidence file (eager, or chunked if `options.chunk_size` is set).
///
/// # Errors
/// See [`TsvFileReader::load`].
pub fn load_coincidences<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<Loaded<CoincidenceLayout>> {
    TsvFileReader::open(path)?
        .with_options(options.clone())
        .load()
}

/// Loads a singles file (eager, or chunked if `options.chunk_size` is set).
///
/// # Errors
/// See [`TsvFileReader::load`].
pub fn load_singles<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> Result<Loaded<SinglesLayout>> {
    TsvFileReader::open(path)?
        .with_options(options.clone())
        .load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use approx::assert_relative_eq;
    use rustpet_core::ChannelIdSpace;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "a\tb\tTimeL\tChargeL\tChannelIDL\tc\td\tTimeR\tChargeR\tChannelIDR";

    fn coincidence_line(time_l: u64, id_l: u64, time_r: u64, id_r: u64) -> String {
        format!("0\t1\t{time_l}\t12.5\t{id_l}\t0\t1\t{time_r}\t8.75\t{id_r}")
    }

    fn write_file(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn coincidence_file(rows: usize) -> NamedTempFile {
        let mut lines = vec![HEADER.to_string()];
        for i in 0..rows as u64 {
            lines.push(coincidence_line(1000 + i, i, 2000 + i, 64 + i));
        }
        write_file(&lines)
    }

    #[test]
    fn test_read_coincidences() {
        let file = coincidence_file(3);
        let batch = TsvFileReader::open(file.path())
            .unwrap()
            .read_coincidences()
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.channel_id_l, vec![0, 1, 2]);
        assert_eq!(batch.channel_id_r, vec![64, 65, 66]);
        assert_relative_eq!(batch.time_l[1], 1001.0);
        assert_relative_eq!(batch.charge_r[2], 8.75);
        assert_eq!(batch.id_space(), ChannelIdSpace::Absolute);
    }

    #[test]
    fn test_time_scale_applies_to_time_only() {
        let file = coincidence_file(1);
        let batch = TsvFileReader::open(file.path())
            .unwrap()
            .with_time_scale(1e-3)
            .read_coincidences()
            .unwrap();
        assert_relative_eq!(batch.time_l[0], 1.0);
        assert_relative_eq!(batch.time_r[0], 2.0);
        assert_relative_eq!(batch.charge_l[0], 12.5);
    }

    #[test]
    fn test_chunks() {
        let file = coincidence_file(5);
        let reader = TsvFileReader::open(file.path()).unwrap();
        let chunks: Vec<_> = reader
            .coincidence_chunks(2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let sizes: Vec<usize> = chunks.iter().map(EventBatch::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(chunks[2].channel_id_l, vec![4]);
    }

    #[test]
    fn test_load_dispatches_on_chunk_size() {
        let file = coincidence_file(4);
        let eager = load_coincidences(file.path(), &LoadOptions::default()).unwrap();
        assert!(matches!(eager, Loaded::Table(ref b) if b.len() == 4));

        let opts = LoadOptions::default().with_chunk_size(3);
        let lazy = load_coincidences(file.path(), &opts).unwrap();
        assert!(matches!(lazy, Loaded::Chunks(_)));
        assert_eq!(lazy.into_table().unwrap().len(), 4);
    }

    #[test]
    fn test_without_header() {
        let file = write_file(&[coincidence_line(5, 1, 6, 2)]);
        let opts = LoadOptions::default().with_header(false);
        let batch = TsvFileReader::open(file.path())
            .unwrap()
            .with_options(opts)
            .read_coincidences()
            .unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_malformed_row_fails_whole_load() {
        let file = write_file(&[
            HEADER.to_string(),
            coincidence_line(1, 1, 2, 2),
            "0\t1\tx\t12.5\t3\t0\t1\t4\t8.75\t4".to_string(),
        ]);
        let err = TsvFileReader::open(file.path())
            .unwrap()
            .read_coincidences()
            .unwrap_err();
        assert!(matches!(err, Error::Parse { line: 3, column: 2, .. }));
    }

    #[test]
    fn test_chunk_error_ends_iteration() {
        let file = write_file(&[
            HEADER.to_string(),
            coincidence_line(1, 1, 2, 2),
            "1\t2\t3".to_string(),
            coincidence_line(3, 3, 4, 4),
        ]);
        let mut chunks = TsvFileReader::open(file.path())
            .unwrap()
            .coincidence_chunks(1)
            .unwrap();
        assert!(chunks.next().unwrap().is_ok());
        assert!(matches!(
            chunks.next().unwrap(),
            Err(Error::TooFewColumns { line: 3, .. })
        ));
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_read_singles() {
        let file = write_file(&[
            "Time\tCharge\tChannelID".to_string(),
            "100\t4.5\t7".to_string(),
            "250\t6.0\t8".to_string(),
        ]);
        let opts = LoadOptions::default().with_time_scale(2.0);
        let batch = load_singles(file.path(), &opts)
            .unwrap()
            .into_table()
            .unwrap();
        assert_eq!(batch.channel_id, vec![7, 8]);
        assert_relative_eq!(batch.time[1], 500.0);
        assert_relative_eq!(batch.charge[0], 4.5);
    }

    #[test]
    fn test_singles_wrong_width() {
        let file = write_file(&["T\tC\tID".to_string(), "1\t2\t3\t4".to_string()]);
        let err = TsvFileReader::open(file.path())
            .unwrap()
            .read_singles()
            .unwrap_err();
        assert!(matches!(err, Error::ColumnCount { expected: 3, found: 4, .. }));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            TsvFileReader::open("/nonexistent/rustpet/input.tsv"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_empty_file() {
        let file = write_file(&[HEADER.to_string()]);
        let reader = TsvFileReader::open(file.path()).unwrap();
        assert!(reader.read_coincidences().unwrap().is_empty());
        assert_eq!(reader.coincidence_chunks(10).unwrap().count(), 0);
    }
}
