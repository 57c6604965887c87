use anyhow::{Context, Result};
use std::path::Path;

use crate::pipeline::MetricResult;

/// Write results as CSV with a header row; nulls become empty fields.
pub fn write_csv(path: &Path, results: &[MetricResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for r in results {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}
