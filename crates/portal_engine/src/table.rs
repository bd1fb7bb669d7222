//! The per-run CSV table.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use portal_core::EnrichedRecord;
use portal_logging::portal_info;
use serde_json::Value;
use thiserror::Error;

use crate::{AtomicFileWriter, PersistError};

/// Column headers, in output order.
pub const TABLE_HEADERS: [&str; 17] = [
    "source_id",
    "ra",
    "dec",
    "t0",
    "E(B-V)",
    "D_L",
    "photo_z",
    "w1mpro",
    "w2mpro",
    "w3mpro",
    "w1mpro-w2mpro",
    "w2mpro-w3mpro",
    "classifications",
    "is_galactic_b10",
    "is_galactic_b15",
    "is_galactic_b20",
    "group_id",
];

#[derive(Debug, Error)]
pub enum TableError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer could not be flushed: {0}")]
    Buffer(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// `data_extraction_<YYYYmmdd_HHMMSS>.csv` for a run started at `started`.
pub fn table_filename(started: DateTime<Local>) -> String {
    format!("data_extraction_{}.csv", started.format("%Y%m%d_%H%M%S"))
}

fn float_cell(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{value:?}"),
        _ => String::new(),
    }
}

fn bool_cell(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => String::new(),
    }
}

fn json_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => bool_cell(Some(*flag)),
        Some(other) => other.to_string(),
    }
}

fn row_cells(row: &EnrichedRecord) -> [String; 17] {
    [
        row.source_id.to_string(),
        float_cell(Some(row.ra)),
        float_cell(Some(row.dec)),
        json_cell(row.t0.as_ref()),
        float_cell(row.ebv),
        float_cell(row.luminosity_distance),
        json_cell(row.photo_z.as_ref()),
        json_cell(row.w1mpro.as_ref()),
        json_cell(row.w2mpro.as_ref()),
        json_cell(row.w3mpro.as_ref()),
        float_cell(row.w1_w2),
        float_cell(row.w2_w3),
        row.classifications.clone().unwrap_or_default(),
        bool_cell(row.galactic.within_10),
        bool_cell(row.galactic.within_15),
        bool_cell(row.galactic.within_20),
        row.group_id.to_string(),
    ]
}

/// Encodes the header and every row.
pub fn render_table(rows: &[EnrichedRecord]) -> Result<Vec<u8>, TableError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(TABLE_HEADERS)?;
    for row in rows {
        writer.write_record(row_cells(row))?;
    }
    writer
        .into_inner()
        .map_err(|err| TableError::Buffer(err.error().to_string()))
}

/// Writes one table per run into `dir`; returns the file's path.
pub fn write_table(
    dir: &Path,
    rows: &[EnrichedRecord],
    started: DateTime<Local>,
) -> Result<PathBuf, TableError> {
    let bytes = render_table(rows)?;
    let path = AtomicFileWriter::new(dir.to_path_buf()).write(&table_filename(started), bytes)?;
    portal_info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(path)
}
