//! JSON run report.
//!
//! Files are organized by the local date the run started:
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 071502.json
//!     └── 190044.json
//! ```

use crate::error::{Error, Result};
use crate::models::RunReport;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`RunReport`] to `{json_output_dir}/{date}/{HHMMSS}.json`.
///
/// Returns the path of the written file.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(report: &RunReport, json_output_dir: &str) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;

    let full_json_dir = PathBuf::from(json_output_dir)
        .join(report.started_at.date_naive().to_string());

    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(Error::io(full_json_dir, e));
    }

    let output_json_filename =
        full_json_dir.join(format!("{}.json", report.started_at.format("%H%M%S")));

    fs::write(&output_json_filename, json)
        .await
        .map_err(|e| Error::io(&output_json_filename, e))?;
    info!(path = %output_json_filename.display(), "Wrote run report");

    Ok(output_json_filename)
}
