use std::io::{self, ErrorKind};
use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::schema::Field;

pub const HELP_TEXT: &str = "\
 datadeck - table viewer

 Pages
   n / PageDown      next page
   p / PageUp        previous page
   g / Home          first page
   G / End           last page

 Columns
   h / Left          select previous column
   l / Right         select next column
   s                 sort selected column (asc / desc)
   S                 clear sort
   1 .. 7            show / hide column (id, name, email, age, role, department, location)
   0                 show all columns

 Filter
   /                 search all columns
   f                 filter selected column

 Data
   i                 import a CSV file
   e                 export visible columns and filtered rows to table-data.csv

   ?                 help
   Esc               close popup / dismiss message
   q                 quit
";

/// Errors raised while turning CSV text into records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Error parsing CSV: {0}")]
    ParseFailure(String),
    #[error("Invalid CSV format or missing required columns (row {row}: missing {})", join_fields(.missing))]
    InvalidSchema { row: usize, missing: Vec<Field> },
    #[error("CSV contains no data rows")]
    Empty,
    #[error("Duplicate id \"{id}\" in row {row}")]
    DuplicateId { id: String, row: usize },
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Error writing CSV: {0}")]
    Encode(String),
}

impl From<csv::Error> for CodecError {
    fn from(err: csv::Error) -> Self {
        CodecError::Encode(err.to_string())
    }
}

/// Failures of the key-value store backing persisted ui state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading stored state failed: {0}")]
    Read(String),
    #[error("writing stored state failed: {0}")]
    Write(String),
}

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("io error: {0}")]
    IoError(io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found")]
    FileNotFound,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Unknown file type, only .csv files can be imported")]
    UnknownFileType,
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<io::Error> for DeckError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => DeckError::FileNotFound,
            ErrorKind::PermissionDenied => DeckError::PermissionDenied,
            _ => DeckError::IoError(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    GlobalFilter,
    ColumnFilter(Field),
    Import,
}

impl CMDMode {
    pub fn prompt(&self) -> String {
        match self {
            CMDMode::GlobalFilter => "search: ".to_string(),
            CMDMode::ColumnFilter(field) => format!("filter {}: ", field.name()),
            CMDMode::Import => "import: ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    Exit,
    Help,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    MoveLeft,
    MoveRight,
    ToggleSort,
    ClearSort,
    ToggleColumn(Field),
    ShowAllColumns,
    Search,
    FilterColumn,
    Import,
    Export,
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct DeckConfig {
    pub event_poll_time: u64,
    pub store_path: PathBuf,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Default for DeckConfig {
    fn default() -> Self {
        let data_dir = dirs::config_dir()
            .map(|d| d.join("datadeck"))
            .unwrap_or_else(|| PathBuf::from(".datadeck"));
        Self {
            event_poll_time: 100,
            store_path: data_dir.join("storage.json"),
            export_dir: PathBuf::from("."),
            log_file: data_dir.join("datadeck.log"),
        }
    }
}
