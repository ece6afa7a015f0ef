// ============================================================
// Layer 4 — CSV Table Loader
// ============================================================
// Reads a headered CSV file into a `Table` and writes tables
// back out. The row index of a loaded table is the 0-based
// data-row number in the source file; written tables carry
// their index as the first column.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::table::{LatentTable, Table};

/// Loads one CSV file into memory.
pub struct CsvTableLoader {
    path: PathBuf,
}

impl CsvTableLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open CSV '{}'", self.path.display()))?;

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("Cannot read header of '{}'", self.path.display()))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Bad CSV record {} in '{}'", line + 1, self.path.display()))?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let index = (0..rows.len()).collect();
        tracing::debug!(
            "Loaded {} rows x {} columns from '{}'",
            rows.len(), columns.len(), self.path.display()
        );
        Table::new(columns, index, rows)
    }
}

/// Write a table as CSV with a leading `index` column.
pub fn write_table(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    let mut header = vec!["index".to_string()];
    header.extend(table.columns.iter().cloned());
    writer.write_record(&header)?;

    for (idx, row) in table.index.iter().zip(&table.rows) {
        let mut record = vec![idx.to_string()];
        record.extend(row.iter().cloned());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write latent vectors as CSV; columns are named `z0, z1, ...`.
pub fn write_latent(latent: &LatentTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    let mut header = vec!["index".to_string()];
    header.extend((0..latent.width()).map(|i| format!("z{i}")));
    writer.write_record(&header)?;

    for (idx, row) in latent.index.iter().zip(&latent.rows) {
        let mut record = vec![idx.to_string()];
        record.extend(row.iter().map(|v| format!("{v:.6}")));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_assigns_row_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adult.csv");
        fs::write(&path, "age,sex\n39, Male\n50,Female\n").unwrap();

        let table = CsvTableLoader::new(&path).load().unwrap();
        assert_eq!(table.columns, vec!["age", "sex"]);
        assert_eq!(table.index, vec![0, 1]);
        assert_eq!(table.rows[0], vec!["39", "Male"]);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = CsvTableLoader::new("/nonexistent/data.csv").load().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/data.csv"));
    }

    #[test]
    fn test_write_table_prepends_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(
            vec!["age".into()],
            vec![7],
            vec![vec!["40".into()]],
        )
        .unwrap();

        write_table(&table, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "index,age\n7,40\n");
    }
}
