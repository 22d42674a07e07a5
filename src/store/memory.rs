use super::{CellValue, SheetStore, SheetTarget, StoreError};
use crate::sheet::Table;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Process-local workbook. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    sheets: RefCell<HashMap<String, HashMap<String, Vec<Vec<String>>>>>,
    writes: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the worksheet with `header` unless it already exists.
    pub fn ensure_worksheet(&self, target: &SheetTarget, header: &[String]) {
        let mut sheets = self.sheets.borrow_mut();
        let ws = sheets.entry(target.sheet.clone()).or_default();
        ws.entry(target.worksheet.clone())
            .or_insert_with(|| vec![header.to_vec()]);
    }

    #[cfg(test)]
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Makes every following write fail with a transport error.
    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    fn with_worksheet<T>(
        &self,
        target: &SheetTarget,
        f: impl FnOnce(&mut Vec<Vec<String>>) -> T,
    ) -> Result<T, StoreError> {
        let mut sheets = self.sheets.borrow_mut();
        let Some(ws) = sheets.get_mut(&target.sheet) else {
            return Err(StoreError::SheetNotFound(target.sheet.clone()));
        };
        let Some(values) = ws.get_mut(&target.worksheet) else {
            return Err(StoreError::WorksheetNotFound {
                sheet: target.sheet.clone(),
                worksheet: target.worksheet.clone(),
            });
        };
        Ok(f(values))
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Transport("simulated write failure".into()));
        }
        Ok(())
    }
}

impl SheetStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn read_all(&self, target: &SheetTarget) -> Result<Table, StoreError> {
        self.with_worksheet(target, |values| Table::from_values(values.clone()))
    }

    fn append_row(&self, target: &SheetTarget, row: &[CellValue]) -> Result<(), StoreError> {
        self.check_write()?;
        self.with_worksheet(target, |values| {
            values.push(row.iter().map(CellValue::to_text).collect());
        })?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn overwrite_all(&self, target: &SheetTarget, table: &Table) -> Result<(), StoreError> {
        self.check_write()?;
        self.with_worksheet(target, |values| {
            *values = table.to_values();
        })?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::SCHEMA_HEADER;

    fn target() -> SheetTarget {
        SheetTarget::new("Grades", "Sheet1")
    }

    fn header() -> Vec<String> {
        SCHEMA_HEADER.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_sheet_and_worksheet_are_distinguished() {
        let store = MemoryStore::new();
        store.ensure_worksheet(&target(), &header());
        match store.read_all(&SheetTarget::new("Other", "Sheet1")) {
            Err(StoreError::SheetNotFound(name)) => assert_eq!(name, "Other"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            store.read_all(&SheetTarget::new("Grades", "Sheet9")),
            Err(StoreError::WorksheetNotFound { .. })
        ));
    }

    #[test]
    fn failed_write_leaves_sheet_untouched() {
        let store = MemoryStore::new();
        store.ensure_worksheet(&target(), &header());
        store.set_fail_writes(true);
        let row = vec![CellValue::Text("x".into())];
        assert!(store.append_row(&target(), &row).is_err());
        assert_eq!(store.read_all(&target()).expect("read").rows.len(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn append_formats_numbers_like_a_sheet() {
        let store = MemoryStore::new();
        store.ensure_worksheet(&target(), &header());
        store
            .append_row(
                &target(),
                &[CellValue::Number(85.0), CellValue::Number(72.5)],
            )
            .expect("append");
        let t = store.read_all(&target()).expect("read");
        assert_eq!(t.rows[0][0], "85");
        assert_eq!(t.rows[0][1], "72.5");
    }
}
