//! Convenience constructors for new series.
//!
//! These wrap the record-creation ladder for the common case of
//! turning a pixel volume into a fully parented series in one call.

use crate::database::Database;
use crate::dataset::Volume;
use crate::error::DbResult;
use crate::record::Record;
use dicomdb_codec::{Tag, Value};

/// Creates an empty series, with a fresh patient and study above it.
pub fn series_in(db: &Database) -> DbResult<Record> {
    db.new_series(&[])
}

/// Creates a series holding the given volume as its pixel content.
///
/// Slice `i` of the volume becomes instance number `i + 1`. With
/// `pixels_first` the volume is interpreted as `(rows, cols, slices)`.
pub fn as_series(
    db: &Database,
    volume: &Volume,
    pixels_first: bool,
    attrs: &[(Tag, Value)],
) -> DbResult<Record> {
    let series = db.new_series(attrs)?;
    series.set_pixel_array(volume, pixels_first)?;
    Ok(series)
}

/// Creates a series populated with zeros of the given shape.
///
/// Shorthand for [`as_series`] with a zero-filled volume.
pub fn zeros(db: &Database, shape: (usize, usize, usize)) -> DbResult<Record> {
    as_series(db, &Volume::zeros(shape), false, &[])
}
