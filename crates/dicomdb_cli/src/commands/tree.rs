//! Tree command implementation.

use std::path::Path;

/// Prints the patient/study/series hierarchy of a database folder.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = dicomdb_core::Database::open(path)?;
    print!("{}", db.tree_text()?);
    db.close()?;
    Ok(())
}
