// Master-table assembly: one row per holding, matched issuer data overlaid

use crate::matching::IssuerMatch;
use crate::table::{Cell, Table, COL_COMPANY};
use anyhow::{bail, Result};
use tracing::warn;

/// Builds the per-year master table from the three validated datasets
/// plus the matcher's (issuer, holding) pairs.
pub struct RecordMerger;

impl RecordMerger {
    pub fn new() -> Self {
        RecordMerger
    }

    /// Master schema is the column union in first-seen order: equity
    /// columns, then unseen carbon columns, then unseen financial columns.
    /// One row per holding, seeded from the equity data.
    ///
    /// Per match pair, in pair order: overlay the issuer's disclosure row,
    /// then that issuer's financial row when one exists. Nulls never
    /// overwrite, a present value replaces whatever is there, and a row
    /// contested by two issuers keeps the last overlay. The equity columns
    /// are re-applied at the end so holding-native data always wins.
    pub fn merge_year(
        &self,
        equity: &Table,
        carbon: &Table,
        financial: &Table,
        pairs: &[IssuerMatch],
    ) -> Result<Table> {
        let fin_company = match financial.column_index(COL_COMPANY) {
            Some(idx) => idx,
            None => bail!("financial dataset has no {} column", COL_COMPANY),
        };

        let mut columns = equity.columns.clone();
        for name in carbon.columns.iter().chain(financial.columns.iter()) {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }
        let width = columns.len();
        let mut master = Table::new(columns);

        for row in &equity.rows {
            let mut seeded = row.clone();
            seeded.resize(width, Cell::Null);
            master.rows.push(seeded);
        }

        let carbon_map = column_map(carbon, &master);
        let financial_map = column_map(financial, &master);

        let mut overlaid = vec![false; master.row_count()];
        for pair in pairs {
            if overlaid[pair.holding_row] {
                warn!(
                    holding = %pair.holding,
                    issuer = %pair.issuer,
                    "holding row matched by more than one issuer, last overlay wins"
                );
            }
            overlay(
                &mut master,
                pair.holding_row,
                &carbon.rows[pair.issuer_row],
                &carbon_map,
            );
            if let Some(fin_row) = find_financial_row(financial, fin_company, &pair.issuer) {
                overlay(
                    &mut master,
                    pair.holding_row,
                    &financial.rows[fin_row],
                    &financial_map,
                );
            }
            overlaid[pair.holding_row] = true;
        }

        // holding-native columns win over anything a disclosure shares
        let equity_map: Vec<Option<usize>> = (0..equity.column_count()).map(Some).collect();
        for (row_idx, row) in equity.rows.iter().enumerate() {
            overlay(&mut master, row_idx, row, &equity_map);
        }

        Ok(master)
    }
}

impl Default for RecordMerger {
    fn default() -> Self {
        Self::new()
    }
}

/// Map each source column index to its master column index
fn column_map(source: &Table, master: &Table) -> Vec<Option<usize>> {
    source
        .columns
        .iter()
        .map(|name| master.column_index(name))
        .collect()
}

/// Copy the source row's non-null cells into one master row
fn overlay(master: &mut Table, row: usize, source_row: &[Cell], map: &[Option<usize>]) {
    for (src_idx, target) in map.iter().enumerate() {
        if let Some(col) = target {
            if !source_row[src_idx].is_null() {
                master.rows[row][*col] = source_row[src_idx].clone();
            }
        }
    }
}

/// First financial row whose issuer name equals `issuer` exactly
fn find_financial_row(financial: &Table, company_col: usize, issuer: &str) -> Option<usize> {
    financial
        .rows
        .iter()
        .position(|row| row[company_col].to_text().as_deref() == Some(issuer))
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

    fn create_equity_table() -> Table {
        let mut table = Table::new(vec!["Stocks".to_string(), "EndingMarketValue".to_string()]);
        table.push_row(vec![text("GAS CO A"), num(100.0)]);
        table.push_row(vec![text("OIL CO"), num(200.0)]);
        table
    }

    fn create_carbon_table() -> Table {
        let mut table = Table::new(vec!["Company".to_string(), "Gas(GtCO2)".to_string()]);
        table.push_row(vec![text("Gas Co"), num(5.0)]);
        table
    }

    fn create_financial_table() -> Table {
        let mut table = Table::new(vec!["Company".to_string(), "MarketCap(B)".to_string()]);
        table.push_row(vec![text("Gas Co"), num(10.0)]);
        table
    }

    fn gas_co_pair() -> IssuerMatch {
        IssuerMatch {
            issuer_row: 0,
            issuer: "Gas Co".to_string(),
            holding_row: 0,
            holding: "GAS CO A".to_string(),
            score: 100,
        }
    }

    #[test]
    fn test_row_conservation() {
        let merger = RecordMerger::new();
        let equity = create_equity_table();
        let master = merger
            .merge_year(&equity, &create_carbon_table(), &create_financial_table(), &[])
            .unwrap();

        assert_eq!(master.row_count(), equity.row_count());
    }

    #[test]
    fn test_column_union_order() {
        let merger = RecordMerger::new();
        let master = merger
            .merge_year(
                &create_equity_table(),
                &create_carbon_table(),
                &create_financial_table(),
                &[],
            )
            .unwrap();

        assert_eq!(
            master.columns,
            vec!["Stocks", "EndingMarketValue", "Company", "Gas(GtCO2)", "MarketCap(B)"]
        );
    }

    #[test]
    fn test_match_overlays_carbon_and_financial() {
        let merger = RecordMerger::new();
        let master = merger
            .merge_year(
                &create_equity_table(),
                &create_carbon_table(),
                &create_financial_table(),
                &[gas_co_pair()],
            )
            .unwrap();

        let company = master.column_index("Company").unwrap();
        let reserve = master.column_index("Gas(GtCO2)").unwrap();
        let cap = master.column_index("MarketCap(B)").unwrap();

        assert_eq!(master.rows[0][company], text("Gas Co"));
        assert_eq!(master.rows[0][reserve], num(5.0));
        assert_eq!(master.rows[0][cap], num(10.0));

        // the unmatched holding keeps null issuer columns
        assert!(master.rows[1][company].is_null());
        assert!(master.rows[1][reserve].is_null());
        assert!(master.rows[1][cap].is_null());
    }

    #[test]
    fn test_equity_wins_shared_columns() {
        // carbon dataset carries a conflicting market value column
        let mut carbon = Table::new(vec![
            "Company".to_string(),
            "Gas(GtCO2)".to_string(),
            "EndingMarketValue".to_string(),
        ]);
        carbon.push_row(vec![text("Gas Co"), num(5.0), num(999.0)]);

        let merger = RecordMerger::new();
        let master = merger
            .merge_year(&create_equity_table(), &carbon, &create_financial_table(), &[gas_co_pair()])
            .unwrap();

        let value = master.column_index("EndingMarketValue").unwrap();
        assert_eq!(master.rows[0][value], num(100.0));
    }

    #[test]
    fn test_null_source_never_clobbers() {
        let mut carbon = Table::new(vec![
            "Company".to_string(),
            "Gas(GtCO2)".to_string(),
            "Sector".to_string(),
        ]);
        carbon.push_row(vec![text("Gas Co"), num(5.0), Cell::Null]);

        let mut equity = Table::new(vec![
            "Stocks".to_string(),
            "EndingMarketValue".to_string(),
            "Sector".to_string(),
        ]);
        equity.push_row(vec![text("GAS CO A"), num(100.0), text("Energy")]);

        let merger = RecordMerger::new();
        let master = merger
            .merge_year(&equity, &carbon, &create_financial_table(), &[gas_co_pair()])
            .unwrap();

        let sector = master.column_index("Sector").unwrap();
        assert_eq!(master.rows[0][sector], text("Energy"));
    }

    #[test]
    fn test_issuer_without_financial_row_leaves_cap_null() {
        let mut financial = Table::new(vec!["Company".to_string(), "MarketCap(B)".to_string()]);
        financial.push_row(vec![text("Other Co"), num(3.0)]);

        let merger = RecordMerger::new();
        let master = merger
            .merge_year(&create_equity_table(), &create_carbon_table(), &financial, &[gas_co_pair()])
            .unwrap();

        let cap = master.column_index("MarketCap(B)").unwrap();
        assert!(master.rows[0][cap].is_null());
    }

    #[test]
    fn test_contested_row_keeps_last_overlay() {
        let mut carbon = Table::new(vec!["Company".to_string(), "Gas(GtCO2)".to_string()]);
        carbon.push_row(vec![text("Gas Co"), num(5.0)]);
        carbon.push_row(vec![text("Gas Co Holdings"), num(8.0)]);

        let pairs = vec![
            gas_co_pair(),
            IssuerMatch {
                issuer_row: 1,
                issuer: "Gas Co Holdings".to_string(),
                holding_row: 0,
                holding: "GAS CO A".to_string(),
                score: 100,
            },
        ];

        let merger = RecordMerger::new();
        let master = merger
            .merge_year(&create_equity_table(), &carbon, &create_financial_table(), &pairs)
            .unwrap();

        let company = master.column_index("Company").unwrap();
        let reserve = master.column_index("Gas(GtCO2)").unwrap();
        assert_eq!(master.rows[0][company], text("Gas Co Holdings"));
        assert_eq!(master.rows[0][reserve], num(8.0));
    }

    #[test]
    fn test_financial_without_company_column_fails() {
        let financial = Table::new(vec!["MarketCap(B)".to_string()]);
        let merger = RecordMerger::new();

        let result = merger.merge_year(
            &create_equity_table(),
            &create_carbon_table(),
            &financial,
            &[],
        );
        assert!(result.is_err());
    }
}
