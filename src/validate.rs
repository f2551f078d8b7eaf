// 📋 Input Validation - Checks the data root before the pipeline runs
// Three passes: folders exist, files are year-prefixed CSVs, headers parse
// and carry each kind's required columns

use crate::registry::{DatasetKind, DatasetRegistry};
use crate::store::TableStore;
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Validates analyst-supplied input before any matching runs.
/// Any violation is fatal: the pipeline assumes validated data and
/// never re-checks schemas.
pub struct InputValidator {
    /// Directory holding the equity_data/, carbon_data/ and
    /// financial_data/ folders
    pub root: PathBuf,
}

impl InputValidator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        InputValidator { root: root.into() }
    }

    /// Run all checks and load every dataset into a registry.
    /// Fails fast on the first violation.
    pub fn validate(&self, store: &TableStore) -> Result<DatasetRegistry> {
        self.validate_folders()?;
        self.validate_files()?;
        self.validate_data(store)
    }

    /// Every dataset folder must exist under the root
    pub fn validate_folders(&self) -> Result<()> {
        for kind in DatasetKind::ALL {
            let folder = self.root.join(kind.folder_name());
            if !folder.is_dir() {
                bail!("Required folder not present: {}", folder.display());
            }
        }
        info!("folders validated under {}", self.root.display());
        Ok(())
    }

    /// Every data file must be a CSV named with a leading four-digit year
    pub fn validate_files(&self) -> Result<()> {
        for kind in DatasetKind::ALL {
            for path in self.data_files(kind)? {
                let name = file_name(&path);
                if !name.ends_with(".csv") {
                    bail!("File type is not csv: {}", path.display());
                }
                if year_of(&name).is_none() {
                    bail!("File name must start with YYYY: {}", path.display());
                }
            }
            info!("files validated in {}", kind.folder_name());
        }
        Ok(())
    }

    /// Read every file, check its headers, and collect the tables into
    /// a registry keyed by the filename's year and the folder's kind.
    /// Canonical columns are enforced here so a malformed file fails the
    /// run before any year has been matched.
    pub fn validate_data(&self, store: &TableStore) -> Result<DatasetRegistry> {
        let mut registry = DatasetRegistry::new();
        for kind in DatasetKind::ALL {
            for path in self.data_files(kind)? {
                let name = file_name(&path);
                let year = match year_of(&name) {
                    Some(year) => year.to_string(),
                    None => bail!("File name must start with YYYY: {}", path.display()),
                };
                let table = store.read(&path)?;
                check_headers(&table.columns)
                    .with_context(|| format!("File {} needs to be formatted correctly", name))?;
                for column in kind.required_columns() {
                    if !table.has_column(column) {
                        bail!(
                            "File {} has no {} column required for {} data",
                            name,
                            column,
                            kind.label()
                        );
                    }
                }
                registry.insert(&year, kind, table);
            }
            info!("data validated in {}", kind.folder_name());
        }
        Ok(registry)
    }

    /// Visible files in a kind's folder, sorted by name
    fn data_files(&self, kind: DatasetKind) -> Result<Vec<PathBuf>> {
        let folder = self.root.join(kind.folder_name());
        let entries = fs::read_dir(&folder)
            .with_context(|| format!("Failed to scan {}", folder.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            // editor droppings and .gitignore
            if file_name(&path).starts_with('.') {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// The four-digit year prefix of a filename, if it has one
fn year_of(name: &str) -> Option<&str> {
    match name.get(..4) {
        Some(prefix) if prefix.bytes().all(|b| b.is_ascii_digit()) => Some(prefix),
        _ => None,
    }
}

fn check_headers(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        bail!("no column headers");
    }
    let mut seen = HashSet::new();
    for col in columns {
        if col.is_empty() {
            bail!("empty column header");
        }
        if !seen.insert(col) {
            bail!("duplicate column header: {}", col);
        }
    }
    // a header row that parses entirely numeric almost certainly means
    // the file lost its header line
    if columns.iter().all(|c| c.parse::<f64>().is_ok()) {
        bail!("column headers look like data values");
    }
    Ok(())
}
