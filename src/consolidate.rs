// Collapses holding rows that resolved to the same issuer into one row,
// so multiple share classes aggregate to issuer-level exposure

use crate::metrics::FuelType;
use crate::table::{Cell, Table, COL_COMPANY, COL_MARKET_VALUE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// CONSOLIDATION REPORT
// ============================================================================

/// What one consolidation pass did to a year's master table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub rows_before: usize,
    pub rows_after: usize,
    /// Issuers that had more than one holding row
    pub issuers_consolidated: usize,
    pub null_issuer_rows: usize,
}

// ============================================================================
// DUPLICATE CONSOLIDATOR
// ============================================================================

/// Merges duplicate-issuer rows. Flow columns (market value, per-fuel
/// tonnage) sum across the group; every other column is issuer-level and
/// copies from the group's first row. Unique-issuer and null-issuer rows
/// pass through untouched; each aggregate row is appended after them.
pub struct DuplicateConsolidator;

impl DuplicateConsolidator {
    pub fn new() -> Self {
        DuplicateConsolidator
    }

    pub fn consolidate(&self, table: &mut Table, fuels: &[FuelType]) -> ConsolidationReport {
        let rows_before = table.row_count();

        let company_col = match table.column_index(COL_COMPANY) {
            Some(idx) => idx,
            None => {
                // nothing to group on, the table passes through untouched
                return ConsolidationReport {
                    rows_before,
                    rows_after: rows_before,
                    issuers_consolidated: 0,
                    null_issuer_rows: rows_before,
                };
            }
        };

        let mut flow_cols = Vec::new();
        if let Some(idx) = table.column_index(COL_MARKET_VALUE) {
            flow_cols.push(idx);
        }
        for fuel in fuels {
            if let Some(idx) = table.column_index(&fuel.tonnage_column()) {
                flow_cols.push(idx);
            }
        }

        // group row indices by issuer, preserving first appearance order
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        let mut null_issuer_rows = 0;
        for (idx, row) in table.rows.iter().enumerate() {
            match row[company_col].to_text() {
                Some(name) => {
                    if !groups.contains_key(&name) {
                        order.push(name.clone());
                    }
                    groups.entry(name).or_default().push(idx);
                }
                None => null_issuer_rows += 1,
            }
        }

        let mut keep: Vec<Vec<Cell>> = Vec::new();
        for row in &table.rows {
            match row[company_col].to_text() {
                Some(name) if groups[&name].len() > 1 => {} // replaced below
                _ => keep.push(row.clone()),
            }
        }

        let mut issuers_consolidated = 0;
        for name in &order {
            let members = &groups[name];
            if members.len() < 2 {
                continue;
            }
            issuers_consolidated += 1;
            let mut combined = table.rows[members[0]].clone();
            for &col in &flow_cols {
                combined[col] = sum_cells(&table.rows, members, col);
            }
            keep.push(combined);
        }

        table.rows = keep;

        let report = ConsolidationReport {
            rows_before,
            rows_after: table.row_count(),
            issuers_consolidated,
            null_issuer_rows,
        };
        debug_assert_eq!(report.rows_after, order.len() + null_issuer_rows);
        report
    }
}

impl Default for DuplicateConsolidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum a column over the group's rows; all-null groups stay null, not zero
fn sum_cells(rows: &[Vec<Cell>], members: &[usize], col: usize) -> Cell {
    let mut total = None;
    for &idx in members {
        if let Some(v) = rows[idx][col].as_number() {
            total = Some(total.unwrap_or(0.0) + v);
        }
    }
    match total {
        Some(v) => Cell::Number(v),
        None => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn num(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn coal_fuel() -> Vec<FuelType> {
        vec![FuelType {
            name: "Coal".to_string(),
            unit: "GtCO2".to_string(),
        }]
    }

    /// Master-table shape after intensity and tonnage derivation
    fn create_master_table() -> Table {
        Table::new(vec![
            "Stocks".to_string(),
            "EndingMarketValue".to_string(),
            "Company".to_string(),
            "MarketCap(B)".to_string(),
            "CoalIntensity(GtCO2)/$B".to_string(),
            "Coal(tCO2)".to_string(),
        ])
    }

    #[test]
    fn test_duplicate_issuer_rows_combine() {
        let mut table = create_master_table();
        table.push_row(vec![text("COAL CO A"), num(100.0), text("Coal Co"), num(20.0), num(0.5), num(10.0)]);
        table.push_row(vec![text("COAL CO B"), num(200.0), text("Coal Co"), num(20.0), num(0.5), num(20.0)]);

        let report = DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        assert_eq!(report.rows_before, 2);
        assert_eq!(report.rows_after, 1);
        assert_eq!(report.issuers_consolidated, 1);

        let row = &table.rows[0];
        // flow columns summed
        assert_eq!(row[1], num(300.0));
        assert_eq!(row[5], num(30.0));
        // issuer-level columns copied from the first duplicate
        assert_eq!(row[0], text("COAL CO A"));
        assert_eq!(row[2], text("Coal Co"));
        assert_eq!(row[3], num(20.0));
        assert_eq!(row[4], num(0.5));
    }

    #[test]
    fn test_unique_and_null_rows_pass_through() {
        let mut table = create_master_table();
        table.push_row(vec![text("COAL CO A"), num(100.0), text("Coal Co"), num(20.0), num(0.5), num(10.0)]);
        table.push_row(vec![text("UNMATCHED"), num(50.0), Cell::Null, Cell::Null, Cell::Null, Cell::Null]);

        let report = DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        assert_eq!(report.rows_after, 2);
        assert_eq!(report.issuers_consolidated, 0);
        assert_eq!(report.null_issuer_rows, 1);
        assert_eq!(table.rows[0][0], text("COAL CO A"));
        assert_eq!(table.rows[1][0], text("UNMATCHED"));
    }

    #[test]
    fn test_aggregate_row_is_appended_after_pass_through_rows() {
        let mut table = create_master_table();
        table.push_row(vec![text("COAL CO A"), num(100.0), text("Coal Co"), num(20.0), num(0.5), num(10.0)]);
        table.push_row(vec![text("GAS CO"), num(70.0), text("Gas Co"), num(10.0), Cell::Null, Cell::Null]);
        table.push_row(vec![text("COAL CO B"), num(200.0), text("Coal Co"), num(20.0), num(0.5), num(20.0)]);

        DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], text("GAS CO"));
        // the Coal Co aggregate lands at the end
        assert_eq!(table.rows[1][0], text("COAL CO A"));
        assert_eq!(table.rows[1][1], num(300.0));
    }

    #[test]
    fn test_all_null_flow_column_stays_null() {
        let mut table = create_master_table();
        table.push_row(vec![text("COAL CO A"), num(100.0), text("Coal Co"), num(20.0), Cell::Null, Cell::Null]);
        table.push_row(vec![text("COAL CO B"), num(200.0), text("Coal Co"), num(20.0), Cell::Null, Cell::Null]);

        DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        // market value still sums, but the absent tonnage is not coerced to 0
        assert_eq!(table.rows[0][1], num(300.0));
        assert!(table.rows[0][5].is_null());
    }

    #[test]
    fn test_partial_null_flow_sums_present_values() {
        let mut table = create_master_table();
        table.push_row(vec![text("COAL CO A"), num(100.0), text("Coal Co"), num(20.0), num(0.5), num(10.0)]);
        table.push_row(vec![text("COAL CO B"), Cell::Null, text("Coal Co"), num(20.0), num(0.5), Cell::Null]);

        DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        assert_eq!(table.rows[0][1], num(100.0));
        assert_eq!(table.rows[0][5], num(10.0));
    }

    #[test]
    fn test_consolidation_invariant() {
        let mut table = create_master_table();
        table.push_row(vec![text("A"), num(1.0), text("Coal Co"), num(20.0), num(0.5), num(1.0)]);
        table.push_row(vec![text("B"), num(2.0), text("Coal Co"), num(20.0), num(0.5), num(2.0)]);
        table.push_row(vec![text("C"), num(3.0), text("Gas Co"), num(10.0), Cell::Null, Cell::Null]);
        table.push_row(vec![text("D"), num(4.0), Cell::Null, Cell::Null, Cell::Null, Cell::Null]);

        let report = DuplicateConsolidator::new().consolidate(&mut table, &coal_fuel());

        // rows after = distinct non-null issuers + null-issuer rows
        assert_eq!(report.rows_after, 2 + 1);
        assert_eq!(report.rows_after, table.row_count());
    }
}
