//! Output formatting and persistence for analysis results.
//!
//! Result tables are CSV encoded as UTF-8 with a leading BOM so spreadsheet
//! tools pick up the Hangul road names; summaries are pretty-printed JSON.

use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::HourlySeries;
use crate::schema::HOURS;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Logs any value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Creates `path` and returns a CSV writer positioned after the BOM.
fn bom_writer(path: &Path) -> Result<Writer<BufWriter<File>>> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    out.write_all(BOM)?;

    Ok(WriterBuilder::new().has_headers(true).from_writer(out))
}

/// Writes one row per record, with a header taken from the field names.
/// Overwrites `path`.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing CSV table");
    let mut writer = bom_writer(path)?;

    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Writes a `LINK ID` column followed by `{prefix}0..{prefix}23`.
pub fn write_hourly_table(path: &Path, prefix: &str, series: &[HourlySeries]) -> Result<()> {
    debug!(path = %path.display(), rows = series.len(), "Writing hourly table");
    let mut writer = bom_writer(path)?;

    let mut header = Vec::with_capacity(HOURS + 1);
    header.push("LINK ID".to_string());
    header.extend((0..HOURS).map(|h| format!("{prefix}{h}")));
    writer.write_record(&header)?;

    for s in series {
        let mut row = Vec::with_capacity(HOURS + 1);
        row.push(s.link_id.to_string());
        row.extend(s.values.iter().map(f64::to_string));
        writer.write_record(&row)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Writes `value` as pretty-printed JSON, overwriting `path`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
