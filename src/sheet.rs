use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Column names of the grade sheet, in the exact order rows are appended.
pub const SCHEMA_HEADER: [&str; 6] = [
    "Күні",
    "Пән",
    "Студент",
    "Баға",
    "Түсініктеме",
    "Енгізілген уақыт",
];

pub const COL_DATE: usize = 0;
pub const COL_SUBJECT: usize = 1;
pub const COL_STUDENT: usize = 2;
pub const COL_GRADE: usize = 3;
pub const COL_COMMENT: usize = 4;
pub const COL_RECORDED_AT: usize = 5;

/// Full contents of one worksheet: the first remote row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let mut t = Table { header, rows };
        t.normalize_widths();
        t
    }

    /// Builds a table from raw grid values where row 0 holds the field names.
    /// Trailing fully-empty rows (common in remote sheets) are dropped.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Table::default();
        }
        let header = values.remove(0);
        while values
            .last()
            .map(|r| r.iter().all(|c| c.trim().is_empty()))
            .unwrap_or(false)
        {
            values.pop();
        }
        Table::new(header, values)
    }

    pub fn to_values(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.header.clone());
        out.extend(self.rows.iter().cloned());
        out
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name.trim())
    }

    /// Removes columns whose header is blank or a pandas-style leftover index
    /// (`Unnamed: N`). Those appear when a sheet was once exported with an index.
    pub fn drop_blank_index_columns(mut self) -> Self {
        let keep: Vec<bool> = self
            .header
            .iter()
            .map(|h| {
                let h = h.trim();
                !(h.is_empty() || h.starts_with("Unnamed:"))
            })
            .collect();
        if keep.iter().all(|k| *k) {
            return self;
        }
        self.header = filter_by_mask(&self.header, &keep);
        self.rows = self
            .rows
            .iter()
            .map(|r| filter_by_mask(r, &keep))
            .collect();
        self
    }

    /// Content stamp used for optional optimistic checks before an overwrite.
    pub fn version(&self) -> String {
        let mut hasher = Sha256::new();
        for row in self.to_values() {
            for cell in row {
                hasher.update(cell.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }

    fn normalize_widths(&mut self) {
        let width = self.header.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            } else if row.len() > width {
                row.truncate(width);
            }
        }
    }
}

fn filter_by_mask(cells: &[String], keep: &[bool]) -> Vec<String> {
    cells
        .iter()
        .zip(keep.iter())
        .filter(|(_, k)| **k)
        .map(|(c, _)| c.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    MissingKeyColumn(String),
    BlankKey,
    RowOutOfRange { row: usize, len: usize },
    ColOutOfRange { col: usize, len: usize },
    WidthMismatch { expected: usize, got: usize },
}

impl BufferError {
    pub fn code(&self) -> &'static str {
        match self {
            BufferError::MissingKeyColumn(_) => "sheet_unreadable",
            _ => "bad_params",
        }
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::MissingKeyColumn(name) => {
                write!(f, "sheet has no '{}' column to key rows by", name)
            }
            BufferError::BlankKey => write!(f, "a new row needs a student"),
            BufferError::RowOutOfRange { row, len } => {
                write!(f, "row {} out of range (rows: {})", row, len)
            }
            BufferError::ColOutOfRange { col, len } => {
                write!(f, "col {} out of range (cols: {})", col, len)
            }
            BufferError::WidthMismatch { expected, got } => {
                write!(f, "row has {} cells, expected {}", got, expected)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferRow {
    pub student: String,
    pub cells: Vec<String>,
}

/// Editable copy of a sheet, keyed by the student column.
///
/// Once built it is the only copy the grid edits; the remote sheet is not
/// consulted again until the buffer is saved or replaced by a reload.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    pub id: String,
    pub key_name: String,
    key_pos: usize,
    pub columns: Vec<String>,
    pub rows: Vec<BufferRow>,
    pub loaded_version: String,
}

impl EditBuffer {
    pub fn from_table(id: String, table: Table, key_name: &str) -> Result<Self, BufferError> {
        let table = table.drop_blank_index_columns();
        let loaded_version = table.version();
        let Some(key_pos) = table.column(key_name) else {
            return Err(BufferError::MissingKeyColumn(key_name.to_string()));
        };

        let columns = table
            .header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_pos)
            .map(|(_, h)| h.clone())
            .collect();
        let rows = table
            .rows
            .into_iter()
            .map(|mut r| {
                let student = r.remove(key_pos);
                BufferRow { student, cells: r }
            })
            .collect();

        Ok(EditBuffer {
            id,
            key_name: table.header[key_pos].clone(),
            key_pos,
            columns,
            rows,
            loaded_version,
        })
    }

    /// Puts the key back as an ordinary column at its original position.
    pub fn to_table(&self) -> Table {
        let mut header = self.columns.clone();
        header.insert(self.key_pos.min(header.len()), self.key_name.clone());
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut cells = r.cells.clone();
                cells.insert(self.key_pos.min(cells.len()), r.student.clone());
                cells
            })
            .collect();
        Table::new(header, rows)
    }

    /// Grid column count: the key column is shown first.
    pub fn col_count(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn grid_header(&self) -> Vec<String> {
        let mut h = Vec::with_capacity(self.col_count());
        h.push(self.key_name.clone());
        h.extend(self.columns.iter().cloned());
        h
    }

    pub fn add_row(&mut self, student: String, cells: Option<Vec<String>>) -> Result<usize, BufferError> {
        if student.trim().is_empty() {
            return Err(BufferError::BlankKey);
        }
        let cells = match cells {
            Some(c) if c.len() != self.columns.len() => {
                return Err(BufferError::WidthMismatch {
                    expected: self.columns.len(),
                    got: c.len(),
                })
            }
            Some(c) => c,
            None => vec![String::new(); self.columns.len()],
        };
        self.rows.push(BufferRow { student, cells });
        Ok(self.rows.len() - 1)
    }

    pub fn delete_row(&mut self, row: usize) -> Result<BufferRow, BufferError> {
        if row >= self.rows.len() {
            return Err(BufferError::RowOutOfRange {
                row,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(row))
    }

    /// `col` 0 addresses the student key, `col` n addresses `columns[n - 1]`.
    pub fn set_cell(&mut self, row: usize, col: usize, value: String) -> Result<(), BufferError> {
        let len = self.rows.len();
        let col_count = self.col_count();
        let Some(r) = self.rows.get_mut(row) else {
            return Err(BufferError::RowOutOfRange { row, len });
        };
        if col >= col_count {
            return Err(BufferError::ColOutOfRange {
                col,
                len: col_count,
            });
        }
        if col == 0 {
            r.student = value;
        } else {
            r.cells[col - 1] = value;
        }
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.to_table().version() != self.loaded_version
    }
}
