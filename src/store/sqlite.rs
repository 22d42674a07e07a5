use super::{CellValue, SheetStore, SheetTarget, StoreError};
use crate::db;
use crate::sheet::Table;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Workbook kept in a SQLite file inside the workspace. Same contract as the
/// remote service: append and overwrite are each a single transaction.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(SqliteStore {
            conn: db::open_db(workspace)?,
        })
    }

    #[cfg(test)]
    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore { conn }
    }

    /// Registers the worksheet and writes `header` as row 0 if it is new.
    pub fn ensure_worksheet(&self, target: &SheetTarget, header: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO worksheets(sheet, worksheet, created_at, updated_at)
             VALUES(?, ?, datetime('now'), datetime('now'))",
            (&target.sheet, &target.worksheet),
        )?;
        if inserted > 0 {
            tx.execute(
                "INSERT INTO sheet_rows(sheet, worksheet, row_idx, cells_json) VALUES(?, ?, 0, ?)",
                (&target.sheet, &target.worksheet, encode_row(header)?),
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn check_target(&self, target: &SheetTarget) -> Result<(), StoreError> {
        let sheet_known: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM worksheets WHERE sheet = ? LIMIT 1",
                [&target.sheet],
                |r| r.get(0),
            )
            .optional()?;
        if sheet_known.is_none() {
            return Err(StoreError::SheetNotFound(target.sheet.clone()));
        }
        let ws_known: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM worksheets WHERE sheet = ? AND worksheet = ?",
                (&target.sheet, &target.worksheet),
                |r| r.get(0),
            )
            .optional()?;
        if ws_known.is_none() {
            return Err(StoreError::WorksheetNotFound {
                sheet: target.sheet.clone(),
                worksheet: target.worksheet.clone(),
            });
        }
        Ok(())
    }
}

fn encode_row(cells: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(cells).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode_row(raw: &str, row_idx: i64) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Malformed(format!("row {}: {}", row_idx, e)))
}

impl SheetStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn read_all(&self, target: &SheetTarget) -> Result<Table, StoreError> {
        self.check_target(target)?;
        let mut stmt = self.conn.prepare(
            "SELECT row_idx, cells_json FROM sheet_rows
             WHERE sheet = ? AND worksheet = ?
             ORDER BY row_idx",
        )?;
        let raw_rows = stmt
            .query_map((&target.sheet, &target.worksheet), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut values = Vec::with_capacity(raw_rows.len());
        for (idx, raw) in raw_rows {
            values.push(decode_row(&raw, idx)?);
        }
        Ok(Table::from_values(values))
    }

    fn append_row(&self, target: &SheetTarget, row: &[CellValue]) -> Result<(), StoreError> {
        self.check_target(target)?;
        let cells: Vec<String> = row.iter().map(CellValue::to_text).collect();
        let tx = self.conn.unchecked_transaction()?;
        let next_idx: i64 = tx.query_row(
            "SELECT COALESCE(MAX(row_idx) + 1, 0) FROM sheet_rows WHERE sheet = ? AND worksheet = ?",
            (&target.sheet, &target.worksheet),
            |r| r.get(0),
        )?;
        tx.execute(
            "INSERT INTO sheet_rows(sheet, worksheet, row_idx, cells_json) VALUES(?, ?, ?, ?)",
            (&target.sheet, &target.worksheet, next_idx, encode_row(&cells)?),
        )?;
        tx.execute(
            "UPDATE worksheets SET updated_at = datetime('now') WHERE sheet = ? AND worksheet = ?",
            (&target.sheet, &target.worksheet),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn overwrite_all(&self, target: &SheetTarget, table: &Table) -> Result<(), StoreError> {
        self.check_target(target)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM sheet_rows WHERE sheet = ? AND worksheet = ?",
            (&target.sheet, &target.worksheet),
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO sheet_rows(sheet, worksheet, row_idx, cells_json) VALUES(?, ?, ?, ?)",
            )?;
            for (i, row) in table.to_values().iter().enumerate() {
                insert.execute((&target.sheet, &target.worksheet, i as i64, encode_row(row)?))?;
            }
        }
        tx.execute(
            "UPDATE worksheets SET updated_at = datetime('now') WHERE sheet = ? AND worksheet = ?",
            (&target.sheet, &target.worksheet),
        )?;
        tx.commit()?;
        Ok(())
    }
}
