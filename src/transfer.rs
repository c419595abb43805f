//! Import and export between CSV files and the table.
//!
//! Every outcome becomes a [`Notification`]. A failed import leaves the
//! table untouched.

use std::fs;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::codec;
use crate::domain::DeckError;
use crate::table::TableState;

pub const EXPORT_FILE_NAME: &str = "table-data.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: "Success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

pub fn import_file(table: &mut TableState, path: &Path) -> Notification {
    match read_csv_file(path) {
        Ok(text) => import_text(table, &text),
        Err(e) => {
            warn!("Import of {} failed: {e}", path.display());
            Notification::error(e.to_string())
        }
    }
}

pub fn import_text(table: &mut TableState, text: &str) -> Notification {
    let start_time = Instant::now();
    match codec::decode(text).map_err(DeckError::from) {
        Ok(records) => {
            let count = records.len();
            table.set_dataset(records);
            info!(
                "Imported {count} records in {}ms",
                start_time.elapsed().as_millis()
            );
            Notification::success("CSV data imported successfully.")
        }
        Err(e) => {
            warn!("Rejected CSV import: {e}");
            Notification::error(e.to_string())
        }
    }
}

/// Visible columns of every filtered row, across all pages.
pub fn export_text(table: &TableState) -> Result<String, DeckError> {
    let columns = table.visible_fields();
    if columns.is_empty() {
        return Err(DeckError::LoadingFailed(
            "No visible columns to export".to_string(),
        ));
    }
    Ok(codec::encode(table.filtered_records(), columns)?)
}

pub fn export_file(table: &TableState, dir: &Path) -> Notification {
    let path = dir.join(EXPORT_FILE_NAME);
    let result = export_text(table).and_then(|csv| {
        fs::create_dir_all(dir)?;
        fs::write(&path, csv)?;
        Ok(())
    });
    match result {
        Ok(()) => {
            debug!(
                "Exported {} rows to {}",
                table.projection().filtered_count(),
                path.display()
            );
            Notification::success("Data exported to CSV.")
        }
        Err(e) => {
            warn!("Export to {} failed: {e}", path.display());
            Notification::error(format!("Export failed: {e}"))
        }
    }
}

fn read_csv_file(path: &Path) -> Result<String, DeckError> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(DeckError::LoadingFailed("Not a file!".into()));
    }
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(fs::read_to_string(path)?),
        _ => Err(DeckError::UnknownFileType),
    }
}
