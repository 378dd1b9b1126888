//! Thin convenience facade.
//!
//! Every function here opens a database session, delegates to the
//! record tree, resolves staged changes where it mutates, and closes
//! the session. Entities are addressed externally as 1–4 element
//! tuples of identifiers below a root path; callers never see row
//! indices.

use crate::database::{Database, Summary};
use crate::error::{DbError, DbResult};
use crate::filter::Filter;
use crate::record::Record;
use crate::types::Generation;
use std::path::Path;

/// Opens a database session.
pub fn open(path: &Path) -> DbResult<Database> {
    Database::open(path)
}

/// Identifier tuples of the patients in a database folder.
pub fn patients(path: &Path, filter: &Filter) -> DbResult<Vec<Vec<String>>> {
    list(path, &[], Generation::Patient, filter)
}

/// Identifier tuples of the studies below an entity (the whole folder
/// for an empty tuple, one patient for a 1-tuple).
pub fn studies(path: &Path, entity: &[String], filter: &Filter) -> DbResult<Vec<Vec<String>>> {
    list(path, entity, Generation::Study, filter)
}

/// Identifier tuples of the series below an entity.
pub fn series(path: &Path, entity: &[String], filter: &Filter) -> DbResult<Vec<Vec<String>>> {
    list(path, entity, Generation::Series, filter)
}

fn list(
    path: &Path,
    entity: &[String],
    generation: Generation,
    filter: &Filter,
) -> DbResult<Vec<Vec<String>>> {
    let db = Database::open(path)?;
    let records = db.record_at(entity)?.records(generation, filter)?;
    let out = records.iter().map(|r| r.uids().to_vec()).collect();
    db.close()?;
    Ok(out)
}

/// Resolves an entity that must have data behind it.
fn existing(db: &Database, entity: &[String]) -> DbResult<Record> {
    let record = db.record_at(entity)?;
    if record.instances()?.is_empty() {
        return Err(DbError::not_found(format!("no entity at {entity:?}")));
    }
    Ok(record)
}

/// Copies an entity under an ancestor entity and commits. Returns the
/// identifier tuple of the copy.
pub fn copy(path: &Path, from: &[String], to: &[String]) -> DbResult<Vec<String>> {
    let db = Database::open(path)?;
    let source = existing(&db, from)?;
    let ancestor = db.record_at(to)?;
    let result = source.copy_to(&ancestor)?;
    let uids = result.uids().to_vec();
    db.save()?;
    db.close()?;
    Ok(uids)
}

/// Moves an entity under an ancestor entity and commits. Returns the
/// identifier tuple of the moved entity.
pub fn move_entity(path: &Path, from: &[String], to: &[String]) -> DbResult<Vec<String>> {
    let db = Database::open(path)?;
    let source = existing(&db, from)?;
    let ancestor = db.record_at(to)?;
    let result = source.move_to(&ancestor)?;
    let uids = result.uids().to_vec();
    db.save()?;
    db.close()?;
    Ok(uids)
}

/// Deletes an entity and commits.
pub fn delete(path: &Path, entity: &[String]) -> DbResult<()> {
    let db = Database::open(path)?;
    existing(&db, entity)?.remove()?;
    db.save()?;
    db.close()?;
    Ok(())
}

/// Entity counts for a database folder.
pub fn summary(path: &Path) -> DbResult<Summary> {
    let db = Database::open(path)?;
    let summary = db.summary()?;
    db.close()?;
    Ok(summary)
}
