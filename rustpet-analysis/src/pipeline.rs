//! File-level entry points driven by [`AnalysisConfig`].

use crate::config::AnalysisConfig;
use crate::pairs::{ChannelPair, ChannelPairCounts};
use crate::Result;
use rayon::prelude::*;
use rustpet_core::{CoincidenceBatch, EventBatch};
use rustpet_io::{load_coincidences, Loaded};
use std::collections::BTreeSet;
use std::path::Path;

/// Loads a whole coincidence file, converting channel IDs to geometric IDs
/// when the configuration asks for it. Chunks, if configured, are read in
/// order and appended.
///
/// # Errors
/// Returns an error for invalid configuration, I/O or parse failures, or a
/// channel ID that cannot be converted.
pub fn load_coincidence_table<P: AsRef<Path>>(
    path: P,
    config: &AnalysisConfig,
) -> Result<CoincidenceBatch> {
    config.validate()?;
    let path = path.as_ref();
    let mut batch = load_coincidences(path, &config.load_options())?.into_table()?;
    if config.geometric_ids {
        batch.convert_to_geometric()?;
    }
    log::info!(
        "loaded {} coincidences from {} ({:?} channel IDs)",
        batch.len(),
        path.display(),
        batch.id_space()
    );
    Ok(batch)
}

/// Counts channel pairs of a coincidence file and returns the pairs seen at
/// least `threshold` times.
///
/// With a chunk size configured the file is streamed: chunks are converted
/// and counted in parallel as they are read, then merged.
///
/// # Errors
/// Returns the first configuration, ingestion or conversion error.
pub fn scan_channel_pairs<P: AsRef<Path>>(
    path: P,
    config: &AnalysisConfig,
    threshold: u64,
) -> Result<BTreeSet<ChannelPair>> {
    config.validate()?;
    let path = path.as_ref();
    let counts = match load_coincidences(path, &config.load_options())? {
        Loaded::Table(mut batch) => {
            if config.geometric_ids {
                batch.convert_to_geometric()?;
            }
            ChannelPairCounts::from_batch(&batch)
        }
        Loaded::Chunks(chunks) => chunks
            .par_bridge()
            .map(|chunk| -> Result<ChannelPairCounts> {
                let mut batch = chunk?;
                if config.geometric_ids {
                    batch.convert_to_geometric()?;
                }
                Ok(ChannelPairCounts::from_batch(&batch))
            })
            .try_reduce(ChannelPairCounts::new, |a, b| Ok(a.merged(b)))?,
    };

    let frequent = counts.frequent(threshold);
    log::info!(
        "{}: {} coincidences, {} distinct pairs, {} with count >= {threshold}",
        path.display(),
        counts.total(),
        counts.distinct(),
        frequent.len()
    );
    Ok(frequent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use rustpet_core::{to_geo_channel_id, ChannelIdSpace};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with_pairs(pairs: &[(u64, u64)]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a\tb\tTimeL\tChargeL\tIDL\tc\td\tTimeR\tChargeR\tIDR").unwrap();
        for (i, (l, r)) in pairs.iter().enumerate() {
            writeln!(file, "0\t0\t{i}\t10.0\t{l}\t0\t0\t{i}\t11.0\t{r}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_with_conversion() {
        let file = file_with_pairs(&[(0, 64), (4096, 1)]);
        let config = AnalysisConfig {
            geometric_ids: true,
            ..AnalysisConfig::default()
        };
        let batch = load_coincidence_table(file.path(), &config).unwrap();
        assert_eq!(batch.id_space(), ChannelIdSpace::Geometric);
        assert_eq!(batch.channel_id_l[0], 32);
        assert_eq!(batch.channel_id_l[1], to_geo_channel_id(4096).unwrap());
        assert_eq!(batch.channel_id_r[0], to_geo_channel_id(64).unwrap());
    }

    #[test]
    fn test_streamed_scan_matches_eager() {
        let pairs: Vec<(u64, u64)> = (0..50u64).map(|i| (i % 4, 64 + i % 2)).collect();
        let file = file_with_pairs(&pairs);

        let eager = scan_channel_pairs(file.path(), &AnalysisConfig::default(), 5).unwrap();
        let chunked = AnalysisConfig {
            chunk_size: Some(7),
            ..AnalysisConfig::default()
        };
        let streamed = scan_channel_pairs(file.path(), &chunked, 5).unwrap();
        assert_eq!(eager, streamed);
        assert_eq!(eager.len(), 4);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let file = file_with_pairs(&[(1, 2)]);
        let config = AnalysisConfig {
            chunk_size: Some(0),
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            scan_channel_pairs(file.path(), &config, 1),
            Err(Error::InvalidConfig(_))
        ));
    }
}
