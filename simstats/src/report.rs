//! Persists a keyed result set as a two-column CSV artifact.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use anyhow::Result;

use crate::Diff;

/// One header row, then key,value per entry. Keys print via `Display`, so
/// string ids and numeric timesteps both come out sortable by downstream
/// tools; `Diff::Infinite` prints as `inf`. A row that fails to write is
/// warned about and skipped; the rest of the report still completes.
pub fn write_report<K: Display>(
    path: &str,
    headers: [&str; 2],
    rows: &BTreeMap<K, Diff>,
) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs_err::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&headers)?;
    for (key, value) in rows {
        if let Err(err) = writer.write_record(&[key.to_string(), value.to_string()]) {
            warn!("Skipping row {} of {}: {}", key, path, err);
        }
    }
    writer.flush()?;
    info!("Wrote {}", path);
    Ok(())
}
