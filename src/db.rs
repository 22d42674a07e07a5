use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradesheet.sqlite3";

/// Opens (or creates) the local workbook that backs the `sqlite` store.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS worksheets(
            sheet TEXT NOT NULL,
            worksheet TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(sheet, worksheet)
        )",
        [],
    )?;

    // Row 0 of every worksheet is its header row.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sheet_rows(
            sheet TEXT NOT NULL,
            worksheet TEXT NOT NULL,
            row_idx INTEGER NOT NULL,
            cells_json TEXT NOT NULL,
            PRIMARY KEY(sheet, worksheet, row_idx),
            FOREIGN KEY(sheet, worksheet) REFERENCES worksheets(sheet, worksheet)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sheet_rows_ws ON sheet_rows(sheet, worksheet)",
        [],
    )?;

    Ok(())
}
