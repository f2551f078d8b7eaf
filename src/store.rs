use crate::table::{Cell, Table};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// CSV-backed table storage.
/// Written files are date-stamped: `<YYYYMMDD><name>.csv`.
pub struct TableStore {
    /// Filename prefix for written tables; defaults to today's date
    pub file_prefix: String,
}

impl TableStore {
    pub fn new() -> Self {
        TableStore {
            file_prefix: chrono::Local::now().format("%Y%m%d").to_string(),
        }
    }

    /// Store writing files under a fixed prefix instead of today's date
    pub fn with_prefix(prefix: &str) -> Self {
        TableStore {
            file_prefix: prefix.to_string(),
        }
    }

    /// Read a CSV file into a table. Fields are decoded leniently so
    /// Latin-1 spreadsheet exports survive (as lossy UTF-8), then parsed
    /// cell by cell. Ragged records are an error.
    pub fn read(&self, path: &Path) -> Result<Table> {
        let mut rdr = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

        let headers: Vec<String> = rdr
            .byte_headers()
            .with_context(|| format!("Failed to read headers from {}", path.display()))?
            .iter()
            .map(|field| String::from_utf8_lossy(field).trim().to_string())
            .collect();

        let mut table = Table::new(headers);
        for record in rdr.byte_records() {
            let record =
                record.with_context(|| format!("Malformed CSV record in {}", path.display()))?;
            let row: Vec<Cell> = record
                .iter()
                .map(|field| Cell::parse(&String::from_utf8_lossy(field)))
                .collect();
            table.push_row(row);
        }

        Ok(table)
    }

    /// Write a table as `<prefix><name>.csv` under `dir`, creating the
    /// directory if needed. Returns the path written.
    pub fn write(&self, table: &Table, name: &str, dir: &Path) -> Result<PathBuf> {
        if table.columns.is_empty() {
            bail!("No data to write for {}", name);
        }

        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

        let path = dir.join(format!("{}{}.csv", self.file_prefix, name));
        let mut wtr = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        wtr.write_record(&table.columns)?;
        for row in &table.rows {
            let fields: Vec<String> = row.iter().map(Cell::to_field).collect();
            wtr.write_record(&fields)?;
        }
        wtr.flush()?;

        Ok(path)
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}
