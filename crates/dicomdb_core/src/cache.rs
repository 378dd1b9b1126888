//! Fast-access volume cache.
//!
//! A database folder may carry a sibling cache folder holding one
//! binary volume per series, named by the series' last UID component.
//! The cache is an optimization only: it is rebuilt from the instance
//! files whenever it is absent and invalidated whenever a series'
//! pixel content changes.

use crate::dataset::Volume;
use crate::error::DbResult;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the cache folder inside the database root.
pub(crate) const CACHE_DIR: &str = "volume_cache";

/// Magic bytes identifying a cached volume file.
const MAGIC: [u8; 4] = *b"DCVC";

/// Format version for cached volumes.
const VERSION: u8 = 1;

/// Path of the cached volume for a series.
pub(crate) fn volume_path(root: &Path, series_uid: &str) -> PathBuf {
    root.join(CACHE_DIR).join(format!("{series_uid}.vol"))
}

/// Loads a cached volume, if present and readable.
///
/// A corrupt cache file is treated as absent (with a logged warning);
/// callers fall back to rebuilding from the instance files.
pub(crate) fn load_volume(root: &Path, series_uid: &str) -> Option<Volume> {
    let path = volume_path(root, series_uid);
    if !path.exists() {
        return None;
    }
    let result = (|| -> std::io::Result<Option<Volume>> {
        let mut reader = BufReader::new(File::open(&path)?);
        let mut header = [0u8; 5];
        reader.read_exact(&mut header)?;
        if header[..4] != MAGIC || header[4] != VERSION {
            return Ok(None);
        }
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        Ok(ciborium::de::from_reader(body.as_slice()).ok())
    })();
    match result {
        Ok(Some(volume)) => Some(volume),
        Ok(None) => {
            warn!(path = %path.display(), "corrupt volume cache file, ignoring");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read volume cache");
            None
        }
    }
}

/// Writes the cached volume for a series.
pub(crate) fn save_volume(root: &Path, series_uid: &str, volume: &Volume) -> DbResult<()> {
    let path = volume_path(root, series_uid);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&MAGIC)?;
    writer.write_all(&[VERSION])?;
    let mut body = Vec::new();
    ciborium::ser::into_writer(volume, &mut body)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Deletes the cached volume for a series, if any.
pub(crate) fn invalidate(root: &Path, series_uid: &str) {
    let path = volume_path(root, series_uid);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to invalidate volume cache"),
    }
}
