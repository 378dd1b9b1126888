//! Summary command implementation.

use std::path::Path;

/// Prints entity counts for a database folder.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let summary = dicomdb_core::api::summary(path)?;

    match format {
        "json" => {
            let value = serde_json::json!({
                "path": path.display().to_string(),
                "patients": summary.patients,
                "studies": summary.studies,
                "series": summary.series,
                "instances": summary.instances,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!("dicomdb Database Summary");
            println!("========================");
            println!();
            println!("Path: {}", path.display());
            println!();
            println!("Patients:  {}", summary.patients);
            println!("Studies:   {}", summary.studies);
            println!("Series:    {}", summary.series);
            println!("Instances: {}", summary.instances);
        }
    }

    Ok(())
}
