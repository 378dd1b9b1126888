//! Delete command implementation.

use std::path::Path;
use tracing::info;

/// Deletes an entity and commits.
pub fn run(path: &Path, at: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    info!("Deleting {at:?} in {path:?}");
    dicomdb_core::api::delete(path, at)?;
    println!("Deleted {}", at.join(" / "));
    Ok(())
}
