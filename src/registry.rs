// Dataset catalog - validated per-year input tables by category

use crate::table::{Table, COL_COMPANY, COL_MARKET_CAP, COL_MARKET_VALUE, COL_STOCKS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// DATASET KIND
// ============================================================================

/// The three input dataset categories, one folder each under the data root
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DatasetKind {
    Equity,
    Carbon,
    Financial,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Equity,
        DatasetKind::Carbon,
        DatasetKind::Financial,
    ];

    /// Folder under the data root holding this kind's yearly CSV files
    pub fn folder_name(&self) -> &'static str {
        match self {
            DatasetKind::Equity => "equity_data",
            DatasetKind::Carbon => "carbon_data",
            DatasetKind::Financial => "financial_data",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatasetKind::Equity => "equity",
            DatasetKind::Carbon => "carbon",
            DatasetKind::Financial => "financial",
        }
    }

    /// Headers this kind's files must carry for the pipeline to run.
    /// Checked at intake so a malformed file fails validation, not a
    /// half-finished run.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Equity => &[COL_STOCKS, COL_MARKET_VALUE],
            DatasetKind::Carbon => &[COL_COMPANY],
            DatasetKind::Financial => &[COL_COMPANY, COL_MARKET_CAP],
        }
    }
}

// ============================================================================
// DATASET REGISTRY
// ============================================================================

/// Validated input tables keyed by reporting year and dataset kind.
/// Populated once by the validation layer; the pipeline only reads it.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    tables: BTreeMap<String, BTreeMap<DatasetKind, Table>>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        DatasetRegistry {
            tables: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, year: &str, kind: DatasetKind, table: Table) {
        self.tables
            .entry(year.to_string())
            .or_default()
            .insert(kind, table);
    }

    /// Look up one year's table of a kind. Absence is a degraded-year
    /// condition for the caller to handle, never an error here.
    pub fn get(&self, year: &str, kind: DatasetKind) -> Option<&Table> {
        self.tables.get(year).and_then(|by_kind| by_kind.get(&kind))
    }

    /// All years present in any dataset, ascending
    pub fn years(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Kinds absent for a year, in canonical order
    pub fn missing_kinds(&self, year: &str) -> Vec<DatasetKind> {
        DatasetKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.get(year, *kind).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn year_count(&self) -> usize {
        self.tables.len()
    }
}
