//! # dicomdb Codec
//!
//! Attribute encoding/decoding for dicomdb instance files.
//!
//! Every instance in a dicomdb database is one file on disk. This crate
//! owns the boundary between those files and the in-memory attribute
//! representation the core engine works with:
//!
//! - [`Tag`]: the stable vocabulary of supported attribute keywords
//! - [`Value`]: the dynamic attribute value type
//! - [`DataObject`]: one decoded instance (attribute map + pixel data)
//! - [`read_object`] / [`write_object`]: the two-operation file boundary
//!
//! The on-disk format is a small header (magic + format version)
//! followed by a CBOR body. Files without the magic are rejected as
//! foreign files, which lets a database folder scan skip unrelated
//! content instead of aborting.
//!
//! ## Usage
//!
//! ```no_run
//! use dicomdb_codec::{read_object, write_object, DataObject, Tag};
//! use std::path::Path;
//!
//! let mut obj = DataObject::new();
//! obj.set(Tag::PatientName, "DOE^JOHN");
//! write_object(Path::new("instance.dcdb"), &obj).unwrap();
//!
//! let back = read_object(Path::new("instance.dcdb")).unwrap();
//! assert_eq!(back.get_str(Tag::PatientName), Some("DOE^JOHN"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod io;
mod object;
mod tags;
mod value;

pub use error::{CodecError, CodecResult};
pub use io::{decode_object, encode_object, read_object, write_object, FORMAT_VERSION, MAGIC};
pub use object::{DataObject, PixelData};
pub use tags::{Tag, HIERARCHY};
pub use value::Value;
