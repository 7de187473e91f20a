use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::pipeline::processing::CleanReport;
use crate::types::CleanedTable;

/// Sibling path used while a file is being written.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write to a staging file and rename it into place, so readers only ever see
/// a complete file.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    ensure_parent(path)?;
    let staging = staging_path(path);
    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(File::create(&staging)?);
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            fs::rename(&staging, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&staging);
            Err(e)
        }
    }
}

/// Write the cleaned table as CSV with the original column order.
pub fn write_cleaned_feed(table: &CleanedTable, path: &Path) -> Result<()> {
    write_atomically(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(table.layout.headers())?;
        for record in &table.records {
            writer.write_record(table.layout.join_row(record))?;
        }
        writer.flush()?;
        Ok(())
    })?;
    info!("Saved cleaned data -> {} ({} rows)", path.display(), table.len());
    Ok(())
}

/// Path of the JSON report that accompanies a cleaned file.
pub fn report_path_for(cleaned_path: &Path) -> PathBuf {
    let stem = cleaned_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cleaned");
    cleaned_path.with_file_name(format!("{stem}.report.json"))
}

pub fn write_clean_report(report: &CleanReport, path: &Path) -> Result<()> {
    write_atomically(path, |out| {
        serde_json::to_writer_pretty(&mut *out, report)?;
        out.write_all(b"\n")?;
        Ok(())
    })?;
    info!("Saved cleaning report -> {}", path.display());
    Ok(())
}
