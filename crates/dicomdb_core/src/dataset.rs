//! In-memory datasets and pixel volumes.

use crate::error::{DbError, DbResult};
use dicomdb_codec::DataObject;
use serde::{Deserialize, Serialize};

/// A transient, decoded view of one or more instances.
///
/// Datasets are materialized lazily by `Record::read()` and discarded
/// after use; they are never persisted as such. Writing a dataset back
/// through a record stamps the record's identity onto every instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    objects: Vec<DataObject>,
}

impl DataSet {
    /// Creates an empty dataset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dataset from decoded objects.
    #[must_use]
    pub fn from_objects(objects: Vec<DataObject>) -> Self {
        Self { objects }
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the dataset holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The decoded instances, in read order.
    #[must_use]
    pub fn objects(&self) -> &[DataObject] {
        &self.objects
    }

    /// Mutable access to the decoded instances.
    pub fn objects_mut(&mut self) -> &mut [DataObject] {
        &mut self.objects
    }

    /// Appends an instance.
    pub fn push(&mut self, object: DataObject) {
        self.objects.push(object);
    }
}

impl IntoIterator for DataSet {
    type Item = DataObject;
    type IntoIter = std::vec::IntoIter<DataObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

/// A dense 3-dimensional pixel volume.
///
/// The canonical layout is slices-last-minor: shape `(slices, rows,
/// cols)` with the values of slice `i` stored contiguously. The
/// `pixels_first` variants of the record API transpose to and from
/// shape `(rows, cols, slices)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    shape: (usize, usize, usize),
    values: Vec<f32>,
}

impl Volume {
    /// Creates a volume from a shape and a value buffer.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the buffer length disagrees with the
    /// shape.
    pub fn from_values(shape: (usize, usize, usize), values: Vec<f32>) -> DbResult<Self> {
        let expected = shape.0 * shape.1 * shape.2;
        if values.len() != expected {
            return Err(DbError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// Creates a zero-filled volume.
    #[must_use]
    pub fn zeros(shape: (usize, usize, usize)) -> Self {
        Self {
            shape,
            values: vec![0.0; shape.0 * shape.1 * shape.2],
        }
    }

    /// Returns the shape.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// Returns the flat value buffer.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns the value at `(i, j, k)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f32 {
        self.values[(i * self.shape.1 + j) * self.shape.2 + k]
    }

    /// Sets the value at `(i, j, k)`.
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f32) {
        self.values[(i * self.shape.1 + j) * self.shape.2 + k] = value;
    }

    /// Returns the contiguous values of the outermost index `i`.
    #[must_use]
    pub fn slice(&self, i: usize) -> &[f32] {
        let len = self.shape.1 * self.shape.2;
        &self.values[i * len..(i + 1) * len]
    }

    /// Transposes `(slices, rows, cols)` to `(rows, cols, slices)`.
    #[must_use]
    pub fn to_pixels_first(&self) -> Self {
        let (s, r, c) = self.shape;
        let mut out = Volume::zeros((r, c, s));
        for i in 0..s {
            for j in 0..r {
                for k in 0..c {
                    out.set(j, k, i, self.get(i, j, k));
                }
            }
        }
        out
    }

    /// Transposes `(rows, cols, slices)` back to `(slices, rows, cols)`.
    #[must_use]
    pub fn to_pixels_last(&self) -> Self {
        let (r, c, s) = self.shape;
        let mut out = Volume::zeros((s, r, c));
        for j in 0..r {
            for k in 0..c {
                for i in 0..s {
                    out.set(i, j, k, self.get(j, k, i));
                }
            }
        }
        out
    }
}
