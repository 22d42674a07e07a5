use super::{CellValue, SheetStore, SheetTarget, StoreError};
use crate::sheet::Table;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
struct WorksheetGrid {
    sheet_id: i64,
    rows: i64,
    cols: i64,
}

#[derive(Debug, Clone)]
struct OpenedSheet {
    id: String,
    /// worksheet title -> grid
    worksheets: HashMap<String, WorksheetGrid>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    grid_properties: GridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    #[serde(default)]
    row_count: i64,
    #[serde(default)]
    column_count: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Google Sheets over its REST API, authenticated with a bearer token that
/// is minted outside this process.
pub struct GoogleSheetsStore {
    http: Client,
    token: String,
    opened: RefCell<HashMap<String, OpenedSheet>>,
}

impl GoogleSheetsStore {
    pub fn new(token: &str) -> Result<Self, StoreError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(StoreError::Connection(
                "no access token configured for the google backend".into(),
            ));
        }
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(GoogleSheetsStore {
            http,
            token: token.to_string(),
            opened: RefCell::new(HashMap::new()),
        })
    }

    fn send(&self, req: RequestBuilder) -> Result<reqwest::blocking::Response, StoreError> {
        let resp = req.bearer_auth(&self.token).send()?;
        Ok(resp.error_for_status()?)
    }

    /// Opens a spreadsheet by its display name, like a user would in Drive.
    fn open(&self, sheet: &str) -> Result<OpenedSheet, StoreError> {
        if let Some(o) = self.opened.borrow().get(sheet) {
            return Ok(o.clone());
        }

        let q = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            sheet.replace('\\', "\\\\").replace('\'', "\\'"),
            SPREADSHEET_MIME
        );
        let list: DriveFileList = self
            .send(self.http.get(DRIVE_FILES_URL).query(&[
                ("q", q.as_str()),
                ("fields", "files(id)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ]))?
            .json()?;
        let Some(file) = list.files.into_iter().next() else {
            return Err(StoreError::SheetNotFound(sheet.to_string()));
        };

        let meta: SpreadsheetMeta = self
            .send(
                self.http
                    .get(spreadsheet_url(&file.id, &[])?)
                    .query(&[("fields", "sheets.properties(sheetId,title,gridProperties)")]),
            )?
            .json()?;
        let opened = OpenedSheet {
            id: file.id,
            worksheets: meta
                .sheets
                .into_iter()
                .map(|s| {
                    let p = s.properties;
                    let grid = WorksheetGrid {
                        sheet_id: p.sheet_id,
                        rows: p.grid_properties.row_count,
                        cols: p.grid_properties.column_count,
                    };
                    (p.title, grid)
                })
                .collect(),
        };
        self.opened
            .borrow_mut()
            .insert(sheet.to_string(), opened.clone());
        Ok(opened)
    }

    fn open_worksheet(&self, target: &SheetTarget) -> Result<(OpenedSheet, WorksheetGrid), StoreError> {
        let opened = self.open(&target.sheet)?;
        let Some(grid) = opened.worksheets.get(&target.worksheet).copied() else {
            return Err(StoreError::WorksheetNotFound {
                sheet: target.sheet.clone(),
                worksheet: target.worksheet.clone(),
            });
        };
        Ok((opened, grid))
    }

    fn remember_grid(&self, target: &SheetTarget, grid: WorksheetGrid) {
        if let Some(o) = self.opened.borrow_mut().get_mut(&target.sheet) {
            o.worksheets.insert(target.worksheet.clone(), grid);
        }
    }
}

fn spreadsheet_url(id: &str, tail: &[&str]) -> Result<Url, StoreError> {
    let mut url =
        Url::parse(SHEETS_BASE_URL).map_err(|e| StoreError::Transport(e.to_string()))?;
    {
        let mut segs = url
            .path_segments_mut()
            .map_err(|_| StoreError::Transport("base url cannot carry a path".into()))?;
        segs.push(id);
        for t in tail {
            segs.push(t);
        }
    }
    Ok(url)
}

/// A1 range covering the whole worksheet: the quoted title alone.
fn whole_sheet_range(worksheet: &str) -> String {
    format!("'{}'", worksheet.replace('\'', "''"))
}

fn json_cell_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Cell payload for `updateCells`. Numeric text is written as a number so a
/// rewritten sheet keeps numeric grades numeric.
fn entered_value(cell: &str) -> serde_json::Value {
    match cell.trim().parse::<f64>() {
        Ok(v) if !cell.trim().is_empty() && v.is_finite() => json!({ "numberValue": v }),
        _ => json!({ "stringValue": cell }),
    }
}

impl SheetStore for GoogleSheetsStore {
    fn backend_name(&self) -> &'static str {
        "google"
    }

    fn read_all(&self, target: &SheetTarget) -> Result<Table, StoreError> {
        let started = Instant::now();
        let (opened, _) = self.open_worksheet(target)?;
        let range: ValueRange = self
            .send(
                self.http
                    .get(spreadsheet_url(
                        &opened.id,
                        &["values", &whole_sheet_range(&target.worksheet)],
                    )?)
                    .query(&[
                        ("majorDimension", "ROWS"),
                        ("valueRenderOption", "FORMATTED_VALUE"),
                    ]),
            )?
            .json()?;
        let values: Vec<Vec<String>> = range
            .values
            .iter()
            .map(|r| r.iter().map(json_cell_text).collect())
            .collect();
        debug!(
            sheet = %target.sheet,
            worksheet = %target.worksheet,
            rows = values.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "google read"
        );
        Ok(Table::from_values(values))
    }

    fn append_row(&self, target: &SheetTarget, row: &[CellValue]) -> Result<(), StoreError> {
        let (opened, _) = self.open_worksheet(target)?;
        let range = format!("{}:append", whole_sheet_range(&target.worksheet));
        let values: Vec<serde_json::Value> = row.iter().map(CellValue::to_json).collect();
        self.send(
            self.http
                .post(spreadsheet_url(&opened.id, &["values", &range])?)
                .query(&[
                    ("valueInputOption", "USER_ENTERED"),
                    ("insertDataOption", "INSERT_ROWS"),
                ])
                .json(&json!({ "values": [values] })),
        )?;
        Ok(())
    }

    fn overwrite_all(&self, target: &SheetTarget, table: &Table) -> Result<(), StoreError> {
        let (opened, grid) = self.open_worksheet(target)?;
        let (body, grown) = overwrite_body(grid, table);
        let url = spreadsheet_url(&format!("{}:batchUpdate", opened.id), &[])?;
        self.send(self.http.post(url).json(&body))?;
        if grown != grid {
            self.remember_grid(target, grown);
        }
        Ok(())
    }
}

/// `batchUpdate` body that replaces every cell of the worksheet with `table`.
/// The grid is grown first when the table does not fit, all in one request
/// so the rewrite applies together or not at all. Returns the grid size
/// after the update.
fn overwrite_body(grid: WorksheetGrid, table: &Table) -> (serde_json::Value, WorksheetGrid) {
    let values = table.to_values();
    let need_rows = values.len() as i64;
    let need_cols = values.iter().map(|r| r.len()).max().unwrap_or(0) as i64;

    let mut requests = Vec::new();
    let mut grown = grid;
    if need_rows > grid.rows {
        requests.push(json!({
            "appendDimension": {
                "sheetId": grid.sheet_id,
                "dimension": "ROWS",
                "length": need_rows - grid.rows
            }
        }));
        grown.rows = need_rows;
    }
    if need_cols > grid.cols {
        requests.push(json!({
            "appendDimension": {
                "sheetId": grid.sheet_id,
                "dimension": "COLUMNS",
                "length": need_cols - grid.cols
            }
        }));
        grown.cols = need_cols;
    }

    let rows: Vec<serde_json::Value> = values
        .iter()
        .map(|r| {
            let cells: Vec<serde_json::Value> = r
                .iter()
                .map(|c| json!({ "userEnteredValue": entered_value(c) }))
                .collect();
            json!({ "values": cells })
        })
        .collect();
    requests.push(json!({
        "updateCells": {
            "range": { "sheetId": grid.sheet_id },
            "fields": "userEnteredValue"
        }
    }));
    requests.push(json!({
        "updateCells": {
            "start": { "sheetId": grid.sheet_id, "rowIndex": 0, "columnIndex": 0 },
            "rows": rows,
            "fields": "userEnteredValue"
        }
    }));
    (json!({ "requests": requests }), grown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_a_connection_error() {
        assert!(matches!(
            GoogleSheetsStore::new("  "),
            Err(StoreError::Connection(_))
        ));
    }

    #[test]
    fn worksheet_titles_are_quoted_and_encoded() {
        assert_eq!(whole_sheet_range("Sheet1"), "'Sheet1'");
        assert_eq!(whole_sheet_range("Bob's"), "'Bob''s'");
        let url = spreadsheet_url("abc", &["values", "'Парақ 1'"]).expect("url");
        assert!(url.as_str().starts_with(
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/"
        ));
        assert!(!url.as_str().contains(' '));
    }

    #[test]
    fn numeric_cells_are_entered_as_numbers() {
        assert_eq!(entered_value("85"), json!({ "numberValue": 85.0 }));
        assert_eq!(entered_value("Физика"), json!({ "stringValue": "Физика" }));
        assert_eq!(entered_value(""), json!({ "stringValue": "" }));
    }

    fn two_row_table() -> Table {
        Table::new(
            vec!["Студент".into(), "Баға".into(), "Түсініктеме".into()],
            vec![vec!["А".into(), "90".into(), "".into()]],
        )
    }

    #[test]
    fn overwrite_grows_a_small_grid_in_the_same_batch() {
        let grid = WorksheetGrid { sheet_id: 7, rows: 1, cols: 2 };
        let (body, grown) = overwrite_body(grid, &two_row_table());
        let reqs = body["requests"].as_array().expect("requests");
        assert_eq!(reqs.len(), 4);
        assert_eq!(reqs[0]["appendDimension"]["dimension"], json!("ROWS"));
        assert_eq!(reqs[0]["appendDimension"]["length"], json!(1));
        assert_eq!(reqs[1]["appendDimension"]["dimension"], json!("COLUMNS"));
        assert_eq!(reqs[1]["appendDimension"]["length"], json!(1));
        assert!(reqs[3]["updateCells"]["rows"].is_array());
        assert_eq!(grown, WorksheetGrid { sheet_id: 7, rows: 2, cols: 3 });
    }

    #[test]
    fn overwrite_into_a_large_grid_only_rewrites_cells() {
        let grid = WorksheetGrid { sheet_id: 7, rows: 1000, cols: 26 };
        let (body, grown) = overwrite_body(grid, &two_row_table());
        let reqs = body["requests"].as_array().expect("requests");
        assert_eq!(reqs.len(), 2);
        assert!(reqs.iter().all(|r| r.get("appendDimension").is_none()));
        assert_eq!(grown, grid);
    }
}
