//! Spreadsheet access behind a narrow repository interface.
//!
//! Every backend exposes the same three calls. Each call is a single blocking
//! attempt; retries, if any, are the caller's business (there are none today).

pub mod google;
pub mod memory;
pub mod sqlite;

use crate::sheet::Table;
use serde::Serialize;
use thiserror::Error;

/// Logical address of a worksheet. This, and never a client handle, is what
/// the read cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetTarget {
    pub sheet: String,
    pub worksheet: String,
}

impl SheetTarget {
    pub fn new(sheet: impl Into<String>, worksheet: impl Into<String>) -> Self {
        SheetTarget {
            sheet: sheet.into(),
            worksheet: worksheet.into(),
        }
    }
}

/// A cell as written on the append path. Numbers stay numbers so the remote
/// side parses them as typed input.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(v) => format_number(*v),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Number(v) => serde_json::json!(v),
        }
    }
}

/// `85.0` renders as `85`, `85.5` as `85.5`, matching how a sheet displays it.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not connect to the spreadsheet service: {0}")]
    Connection(String),
    #[error("spreadsheet '{0}' was not found, check the name")]
    SheetNotFound(String),
    #[error("worksheet '{worksheet}' was not found in '{sheet}'")]
    WorksheetNotFound { sheet: String, worksheet: String },
    #[error("spreadsheet service request failed: {0}")]
    Transport(String),
    #[error("store backend failed: {0}")]
    Backend(String),
    #[error("sheet data is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Read,
    Write,
}

impl StoreError {
    pub fn code(&self, op: StoreOp) -> &'static str {
        match self {
            StoreError::Connection(_) => "connection_failed",
            StoreError::SheetNotFound(_) => "sheet_not_found",
            StoreError::WorksheetNotFound { .. } => "worksheet_not_found",
            StoreError::Malformed(_) => "sheet_unreadable",
            StoreError::Transport(_) | StoreError::Backend(_) => match op {
                StoreOp::Read => "remote_read_failed",
                StoreOp::Write => "remote_write_failed",
            },
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => StoreError::Connection(e.to_string()),
            _ => StoreError::Transport(e.to_string()),
        }
    }
}

pub trait SheetStore {
    fn backend_name(&self) -> &'static str;

    /// Every row of the worksheet, first row as header.
    fn read_all(&self, target: &SheetTarget) -> Result<Table, StoreError>;

    /// Appends one row after the last non-empty row, as typed input.
    fn append_row(&self, target: &SheetTarget, row: &[CellValue]) -> Result<(), StoreError>;

    /// Replaces the whole worksheet (header included) with `table`.
    fn overwrite_all(&self, target: &SheetTarget, table: &Table) -> Result<(), StoreError>;
}
