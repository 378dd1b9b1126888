//! Copy and move command implementations.

use std::path::Path;
use tracing::info;

/// Copies an entity under an ancestor entity and commits.
pub fn run_copy(path: &Path, from: &[String], to: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    info!("Copying {from:?} under {to:?} in {path:?}");
    let copied = dicomdb_core::api::copy(path, from, to)?;
    println!("Copied to {}", copied.join(" / "));
    Ok(())
}

/// Moves an entity under an ancestor entity and commits.
pub fn run_move(path: &Path, from: &[String], to: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    info!("Moving {from:?} under {to:?} in {path:?}");
    let moved = dicomdb_core::api::move_entity(path, from, to)?;
    println!("Moved to {}", moved.join(" / "));
    Ok(())
}
