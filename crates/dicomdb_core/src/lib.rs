//! # dicomdb Core
//!
//! Core engine for dicomdb, an embedded single-session database for
//! hierarchical medical-imaging records. This crate provides:
//!
//! - The [`Register`]: an in-memory tabular index with one row per
//!   instance file, tracking hierarchy identifiers, cached descriptive
//!   attributes and `created`/`removed` staging flags
//! - The [`Record`] tree: navigable Database / Patient / Study /
//!   Series / Instance views re-derived from the register on every
//!   query
//! - The staging/commit protocol: `remove()` stages deletions,
//!   `save()` commits them, `restore()` rolls them back
//! - The [`Database`] session facade with explicit open/close
//!
//! The register is the single source of truth for hierarchy and
//! staging state; record objects never hold file content. Every read
//! goes register → file → codec → [`DataSet`]; every write goes the
//! other way, followed by a register update.
//!
//! A session is single-threaded and synchronous. Concurrent access to
//! the same on-disk folder from two processes is unsupported and can
//! corrupt state. Staging flags live in memory only: a crash between a
//! file mutation and the matching register update can leave the two
//! inconsistent.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
mod cache;
mod config;
pub mod create;
mod database;
mod dataset;
mod error;
mod filter;
mod record;
mod register;
mod status;
mod types;

pub use config::Config;
pub use database::{Database, Summary};
pub use dataset::{DataSet, Volume};
pub use error::{DbError, DbResult};
pub use filter::Filter;
pub use record::Record;
pub use register::{Register, RegisterRow};
pub use status::{NullStatus, StatusCallback};
pub use types::{new_uid, Generation};

// The attribute vocabulary and value types come from the codec crate.
pub use dicomdb_codec::{DataObject, PixelData, Tag, Value};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
