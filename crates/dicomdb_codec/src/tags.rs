//! The supported attribute vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four hierarchy identifiers, ordered by generation (patient,
/// study, series, instance).
pub const HIERARCHY: [Tag; 4] = [
    Tag::PatientId,
    Tag::StudyInstanceUid,
    Tag::SeriesInstanceUid,
    Tag::SopInstanceUid,
];

/// A supported attribute keyword.
///
/// The vocabulary is a closed enumeration: attribute access goes through
/// typed `get`/`set` calls keyed by `Tag` rather than free-form string
/// lookup. Serialized forms use the standard DICOM keyword spelling, so
/// encoded files stay readable by keyword.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tag {
    /// Patient identifier (hierarchy level 0).
    #[serde(rename = "PatientID")]
    PatientId,
    /// Study instance UID (hierarchy level 1).
    #[serde(rename = "StudyInstanceUID")]
    StudyInstanceUid,
    /// Series instance UID (hierarchy level 2).
    #[serde(rename = "SeriesInstanceUID")]
    SeriesInstanceUid,
    /// SOP instance UID (hierarchy level 3).
    #[serde(rename = "SOPInstanceUID")]
    SopInstanceUid,
    /// Patient name.
    #[serde(rename = "PatientName")]
    PatientName,
    /// Patient sex.
    #[serde(rename = "PatientSex")]
    PatientSex,
    /// Patient birth date (YYYYMMDD).
    #[serde(rename = "PatientBirthDate")]
    PatientBirthDate,
    /// Study description.
    #[serde(rename = "StudyDescription")]
    StudyDescription,
    /// Study date (YYYYMMDD).
    #[serde(rename = "StudyDate")]
    StudyDate,
    /// Series description.
    #[serde(rename = "SeriesDescription")]
    SeriesDescription,
    /// Series number.
    #[serde(rename = "SeriesNumber")]
    SeriesNumber,
    /// Instance number.
    #[serde(rename = "InstanceNumber")]
    InstanceNumber,
    /// SOP class UID.
    #[serde(rename = "SOPClassUID")]
    SopClassUid,
    /// Modality (CT, MR, ...).
    #[serde(rename = "Modality")]
    Modality,
    /// Acquisition time.
    #[serde(rename = "AcquisitionTime")]
    AcquisitionTime,
    /// Slice location in mm.
    #[serde(rename = "SliceLocation")]
    SliceLocation,
    /// Number of pixel rows.
    #[serde(rename = "Rows")]
    Rows,
    /// Number of pixel columns.
    #[serde(rename = "Columns")]
    Columns,
    /// Pixel spacing (row, column) in mm.
    #[serde(rename = "PixelSpacing")]
    PixelSpacing,
    /// Slice thickness in mm.
    #[serde(rename = "SliceThickness")]
    SliceThickness,
    /// Rescale slope.
    #[serde(rename = "RescaleSlope")]
    RescaleSlope,
    /// Rescale intercept.
    #[serde(rename = "RescaleIntercept")]
    RescaleIntercept,
}

impl Tag {
    /// Returns the DICOM keyword string for this tag.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Tag::PatientId => "PatientID",
            Tag::StudyInstanceUid => "StudyInstanceUID",
            Tag::SeriesInstanceUid => "SeriesInstanceUID",
            Tag::SopInstanceUid => "SOPInstanceUID",
            Tag::PatientName => "PatientName",
            Tag::PatientSex => "PatientSex",
            Tag::PatientBirthDate => "PatientBirthDate",
            Tag::StudyDescription => "StudyDescription",
            Tag::StudyDate => "StudyDate",
            Tag::SeriesDescription => "SeriesDescription",
            Tag::SeriesNumber => "SeriesNumber",
            Tag::InstanceNumber => "InstanceNumber",
            Tag::SopClassUid => "SOPClassUID",
            Tag::Modality => "Modality",
            Tag::AcquisitionTime => "AcquisitionTime",
            Tag::SliceLocation => "SliceLocation",
            Tag::Rows => "Rows",
            Tag::Columns => "Columns",
            Tag::PixelSpacing => "PixelSpacing",
            Tag::SliceThickness => "SliceThickness",
            Tag::RescaleSlope => "RescaleSlope",
            Tag::RescaleIntercept => "RescaleIntercept",
        }
    }

    /// Looks up a tag by its DICOM keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        ALL.iter().copied().find(|t| t.keyword() == keyword)
    }

    /// Whether this tag is one of the four hierarchy identifiers.
    #[must_use]
    pub fn is_hierarchy(self) -> bool {
        HIERARCHY.contains(&self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Every supported tag, in declaration order.
const ALL: [Tag; 22] = [
    Tag::PatientId,
    Tag::StudyInstanceUid,
    Tag::SeriesInstanceUid,
    Tag::SopInstanceUid,
    Tag::PatientName,
    Tag::PatientSex,
    Tag::PatientBirthDate,
    Tag::StudyDescription,
    Tag::StudyDate,
    Tag::SeriesDescription,
    Tag::SeriesNumber,
    Tag::InstanceNumber,
    Tag::SopClassUid,
    Tag::Modality,
    Tag::AcquisitionTime,
    Tag::SliceLocation,
    Tag::Rows,
    Tag::Columns,
    Tag::PixelSpacing,
    Tag::SliceThickness,
    Tag::RescaleSlope,
    Tag::RescaleIntercept,
];
