// crates/citypop-core/src/snapshot.rs

//! Warm-start snapshots: a published [`Dataset`] as bincode, gzip'd when the
//! `compact` feature is on. Loading sniffs the gzip magic, so plain and
//! compressed files both read back.

use crate::error::Result;
use crate::model::Dataset;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

#[cfg(feature = "compact")]
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Write `dataset` to `path`, replacing any existing file.
pub fn save(dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    #[cfg(feature = "compact")]
    {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        bincode::serialize_into(&mut encoder, dataset)?;
        encoder.finish()?.flush()?;
    }
    #[cfg(not(feature = "compact"))]
    {
        let mut writer = writer;
        bincode::serialize_into(&mut writer, dataset)?;
        writer.flush()?;
    }

    info!(path = %path.display(), records = dataset.len(), "snapshot written");
    Ok(())
}

/// Read a dataset written by [`save`].
pub fn load(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let gzipped = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    let stream: Box<dyn Read> = if gzipped {
        #[cfg(feature = "compact")]
        {
            Box::new(GzDecoder::new(reader))
        }
        #[cfg(not(feature = "compact"))]
        {
            return Err(crate::error::CityError::Config(format!(
                "{} is gzip-compressed but the 'compact' feature is disabled",
                path.display()
            )));
        }
    } else {
        Box::new(reader)
    };

    let dataset: Dataset = bincode::deserialize_from(stream)?;
    info!(
        path = %path.display(),
        records = dataset.len(),
        refreshed_at = %dataset.refreshed_at,
        "snapshot loaded"
    );
    Ok(dataset)
}
