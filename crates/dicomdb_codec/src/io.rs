//! File encode/decode boundary.
//!
//! The on-disk layout is:
//!
//! ```text
//! bytes 0..4   magic "DCDB"
//! byte  4      format version
//! bytes 5..    CBOR-encoded DataObject
//! ```
//!
//! Reads are scoped: open, decode, close. The file handle is released
//! when the call returns, whether or not decoding succeeded.

use crate::error::{CodecError, CodecResult};
use crate::object::DataObject;
use crate::tags::HIERARCHY;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes identifying a dicomdb instance file.
pub const MAGIC: [u8; 4] = *b"DCDB";

/// Current format version for newly written files.
pub const FORMAT_VERSION: u8 = 1;

/// Encodes an object to bytes.
///
/// # Errors
///
/// Returns `ShapeMismatch` if the object's pixel data is inconsistent,
/// or `Decode` if CBOR serialization fails.
pub fn encode_object(object: &DataObject) -> CodecResult<Vec<u8>> {
    object.validate()?;
    let mut buffer = Vec::with_capacity(64);
    buffer.extend_from_slice(&MAGIC);
    buffer.push(FORMAT_VERSION);
    ciborium::ser::into_writer(object, &mut buffer)
        .map_err(|e| CodecError::decode(format!("CBOR encode failed: {e}")))?;
    Ok(buffer)
}

/// Decodes an object from bytes.
///
/// # Errors
///
/// Returns `Decode` if the magic or version is wrong or the CBOR body
/// is malformed, and `MissingHierarchy` if any of the four hierarchy
/// identifiers is absent.
pub fn decode_object(bytes: &[u8]) -> CodecResult<DataObject> {
    if bytes.len() < MAGIC.len() + 1 {
        return Err(CodecError::decode("file too short"));
    }
    if bytes[..4] != MAGIC {
        return Err(CodecError::decode("not a dicomdb file (bad magic)"));
    }
    let version = bytes[4];
    if version != FORMAT_VERSION {
        return Err(CodecError::decode(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let object: DataObject = ciborium::de::from_reader(&bytes[5..])
        .map_err(|e| CodecError::decode(format!("CBOR decode failed: {e}")))?;
    for tag in HIERARCHY {
        if object.get_str(tag).is_none() {
            return Err(CodecError::MissingHierarchy {
                keyword: tag.keyword(),
            });
        }
    }
    Ok(object)
}

/// Reads and decodes one instance file.
///
/// # Errors
///
/// Returns `Io` if the file cannot be opened or read, otherwise the
/// errors of [`decode_object`].
pub fn read_object(path: &Path) -> CodecResult<DataObject> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_object(&bytes)
}

/// Encodes and writes one instance file.
///
/// Parent directories are created as needed. The write is validated
/// before the file is touched, so a shape mismatch never leaves a
/// partial file behind.
///
/// # Errors
///
/// Returns the errors of [`encode_object`], or `Io` on write failure.
pub fn write_object(path: &Path, object: &DataObject) -> CodecResult<()> {
    let bytes = encode_object(object)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
