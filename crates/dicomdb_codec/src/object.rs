//! In-memory representation of one decoded instance.

use crate::error::{CodecError, CodecResult};
use crate::tags::{Tag, HIERARCHY};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel values of a single instance, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelData {
    /// Number of rows in the pixel grid.
    pub rows: u32,
    /// Number of columns in the pixel grid.
    pub cols: u32,
    /// Row-major pixel values, `rows * cols` long.
    pub values: Vec<f32>,
}

impl PixelData {
    /// Creates pixel data after validating the buffer length.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `values.len() != rows * cols`.
    pub fn new(rows: u32, cols: u32, values: Vec<f32>) -> CodecResult<Self> {
        let expected = rows as usize * cols as usize;
        if values.len() != expected {
            return Err(CodecError::shape_mismatch(expected, values.len()));
        }
        Ok(Self { rows, cols, values })
    }

    /// Number of values implied by the grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Whether the grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One decoded instance: an attribute map plus optional pixel data.
///
/// A `DataObject` is the unit the codec reads from and writes to disk.
/// It holds no file handle and no position in any hierarchy beyond the
/// identifier attributes themselves; the core engine decides where it
/// lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    attrs: BTreeMap<Tag, Value>,
    pixel: Option<PixelData>,
}

impl DataObject {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets an attribute value.
    #[must_use]
    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.attrs.get(&tag)
    }

    /// Gets an attribute as a string slice.
    #[must_use]
    pub fn get_str(&self, tag: Tag) -> Option<&str> {
        self.attrs.get(&tag).and_then(Value::as_str)
    }

    /// Gets an attribute as an integer.
    #[must_use]
    pub fn get_int(&self, tag: Tag) -> Option<i64> {
        self.attrs.get(&tag).and_then(Value::as_int)
    }

    /// Sets an attribute value.
    pub fn set(&mut self, tag: Tag, value: impl Into<Value>) {
        self.attrs.insert(tag, value.into());
    }

    /// Removes an attribute, returning its prior value.
    pub fn remove(&mut self, tag: Tag) -> Option<Value> {
        self.attrs.remove(&tag)
    }

    /// Iterates over all attributes in keyword order.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> {
        self.attrs.iter().map(|(t, v)| (*t, v))
    }

    /// Number of attributes present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether no attributes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Returns the four hierarchy identifiers, if all are present.
    #[must_use]
    pub fn uid_tuple(&self) -> Option<[String; 4]> {
        let mut uids: [String; 4] = Default::default();
        for (i, tag) in HIERARCHY.iter().enumerate() {
            uids[i] = self.get_str(*tag)?.to_string();
        }
        Some(uids)
    }

    /// Stamps the leading `uids.len()` hierarchy identifiers onto this
    /// object, overwriting any existing values at those levels.
    ///
    /// Identifiers beyond the supplied prefix are left untouched; this
    /// is the mechanism by which copy, move and merge re-parent data.
    pub fn set_uid_tuple(&mut self, uids: &[String]) {
        for (tag, uid) in HIERARCHY.iter().zip(uids.iter()) {
            self.attrs.insert(*tag, Value::Str(uid.clone()));
        }
    }

    /// Returns the pixel data, if any.
    #[must_use]
    pub fn pixel_data(&self) -> Option<&PixelData> {
        self.pixel.as_ref()
    }

    /// Sets the pixel data and records the `Rows`/`Columns` attributes
    /// to match its grid.
    pub fn set_pixel_data(&mut self, pixel: PixelData) {
        self.set(Tag::Rows, i64::from(pixel.rows));
        self.set(Tag::Columns, i64::from(pixel.cols));
        self.pixel = Some(pixel);
    }

    /// Clears the pixel data.
    pub fn clear_pixel_data(&mut self) {
        self.pixel = None;
    }

    /// Validates internal consistency before encoding.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` when the pixel buffer length disagrees
    /// with the declared grid, or with the `Rows`/`Columns` attributes.
    pub fn validate(&self) -> CodecResult<()> {
        if let Some(pixel) = &self.pixel {
            if pixel.values.len() != pixel.len() {
                return Err(CodecError::shape_mismatch(pixel.len(), pixel.values.len()));
            }
            let rows = self.get_int(Tag::Rows).unwrap_or(0);
            let cols = self.get_int(Tag::Columns).unwrap_or(0);
            let declared = (rows * cols).max(0) as usize;
            if declared != pixel.values.len() {
                return Err(CodecError::shape_mismatch(declared, pixel.values.len()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_remove() {
        let mut obj = DataObject::new();
        assert!(obj.is_empty());
        obj.set(Tag::PatientName, "DOE^JANE");
        obj.set(Tag::InstanceNumber, 3i64);
        assert_eq!(obj.get_str(Tag::PatientName), Some("DOE^JANE"));
        assert_eq!(obj.get_int(Tag::InstanceNumber), Some(3));
        assert_eq!(obj.remove(Tag::PatientName), Some(Value::Str("DOE^JANE".into())));
        assert_eq!(obj.get(Tag::PatientName), None);
    }

    #[test]
    fn uid_tuple_requires_all_four() {
        let mut obj = DataObject::new();
        obj.set(Tag::PatientId, "p");
        obj.set(Tag::StudyInstanceUid, "st");
        obj.set(Tag::SeriesInstanceUid, "se");
        assert!(obj.uid_tuple().is_none());
        obj.set(Tag::SopInstanceUid, "i");
        let uids = obj.uid_tuple().unwrap();
        assert_eq!(uids, ["p", "st", "se", "i"].map(String::from));
    }

    #[test]
    fn set_uid_tuple_stamps_prefix_only() {
        let mut obj = DataObject::new();
        obj.set(Tag::SeriesInstanceUid, "keep");
        obj.set_uid_tuple(&["p".into(), "st".into()]);
        assert_eq!(obj.get_str(Tag::PatientId), Some("p"));
        assert_eq!(obj.get_str(Tag::StudyInstanceUid), Some("st"));
        assert_eq!(obj.get_str(Tag::SeriesInstanceUid), Some("keep"));
    }

    #[test]
    fn pixel_data_shape_checked() {
        assert!(PixelData::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(matches!(
            PixelData::new(2, 2, vec![0.0; 3]),
            Err(CodecError::ShapeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn set_pixel_data_records_grid() {
        let mut obj = DataObject::new();
        obj.set_pixel_data(PixelData::new(2, 3, vec![0.0; 6]).unwrap());
        assert_eq!(obj.get_int(Tag::Rows), Some(2));
        assert_eq!(obj.get_int(Tag::Columns), Some(3));
        assert!(obj.validate().is_ok());
    }

    #[test]
    fn validate_catches_grid_disagreement() {
        let mut obj = DataObject::new();
        obj.set_pixel_data(PixelData::new(2, 2, vec![0.0; 4]).unwrap());
        obj.set(Tag::Rows, 3i64);
        assert!(matches!(obj.validate(), Err(CodecError::ShapeMismatch { .. })));
    }
}
