// Tabular data model shared by every stage: CSV intake, matching,
// merging, consolidation and metric derivation.

use serde::{Deserialize, Serialize};

/// Holding identifier column in the equity dataset
pub const COL_STOCKS: &str = "Stocks";
/// Holding market value column in the equity dataset
pub const COL_MARKET_VALUE: &str = "EndingMarketValue";
/// Issuer name column in the carbon and financial datasets
pub const COL_COMPANY: &str = "Company";
/// Issuer market capitalization column, in billions
pub const COL_MARKET_CAP: &str = "MarketCap(B)";

/// A single table cell. CSV fields parse into the narrowest fitting variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// Missing value: empty field, or "nan" from spreadsheet exports
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Parse one raw CSV field
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            // non-finite literals stay text so no Inf ever enters a table
            Ok(v) if v.is_finite() => Cell::Number(v),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Non-null cell rendered as a display string (names, lookup keys)
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(v) => Some(format!("{}", v)),
        }
    }

    /// CSV output form; Null writes as an empty field
    pub fn to_field(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(v) => format!("{}", v),
        }
    }
}

/// In-memory table: ordered column names plus rows of cells.
/// Every row holds exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a column, padding existing rows with nulls.
    /// Reuses an existing column of the same name; returns the column index.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Null);
        }
        self.columns.len() - 1
    }

    /// Append a row, padding with nulls to the current width
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Numeric view of one column; None per cell that is not a number
    pub fn numbers(&self, col: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row[col].as_number()).collect()
    }
}
