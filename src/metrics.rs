// 📊 Carbon Metrics Engine - Intensity, tonnage held, percentile ranks
// Fuel types are discovered from column names, never hard-coded

use crate::table::{Cell, Table, COL_MARKET_CAP, COL_MARKET_VALUE};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// FUEL TYPES
// ============================================================================

/// One disclosed fuel, discovered from a `Name(Unit)` reserve column.
/// Carries the naming of every column derived for that fuel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelType {
    pub name: String,
    pub unit: String,
}

impl FuelType {
    /// Scan a table's columns for `Name(Unit)` reserve headers. Identifier
    /// columns (issuer name, market cap) never count as fuels. Runs once
    /// per year, before any derived columns exist, so the fuel list stays
    /// stable through the rest of the run.
    pub fn discover(table: &Table) -> Vec<FuelType> {
        let mut fuels = Vec::new();
        for col in &table.columns {
            if col.contains("Company") || col.contains("MarketCap") {
                continue;
            }
            let open = match col.find('(') {
                Some(idx) => idx,
                None => continue,
            };
            if !col.ends_with(')') {
                continue;
            }
            let name = &col[..open];
            let unit = &col[open + 1..col.len() - 1];
            if name.is_empty() || unit.is_empty() {
                continue;
            }
            fuels.push(FuelType {
                name: name.to_string(),
                unit: unit.to_string(),
            });
        }
        fuels
    }

    pub fn reserve_column(&self) -> String {
        format!("{}({})", self.name, self.unit)
    }

    pub fn intensity_column(&self) -> String {
        format!("{}Intensity({})/$B", self.name, self.unit)
    }

    pub fn tonnage_column(&self) -> String {
        format!("{}(tCO2)", self.name)
    }

    pub fn reserve_pctile_column(&self) -> String {
        format!("{}Pctile", self.name)
    }

    pub fn tonnage_pctile_column(&self) -> String {
        format!("{}(tCO2)Pctile", self.name)
    }
}

// ============================================================================
// CARBON METRICS ENGINE
// ============================================================================

/// Derives per-fuel exposure metrics on the master table. Intensity and
/// tonnage are computed for every fuel first; percentile ranking runs as
/// a separate pass once the table has its final row set.
pub struct CarbonMetricsEngine;

impl CarbonMetricsEngine {
    pub fn new() -> Self {
        CarbonMetricsEngine
    }

    /// Add `<Fuel>Intensity(<Unit>)/$B` and `<Fuel>(tCO2)` per fuel.
    ///
    /// Intensity = reserve / market cap, null when either side is null,
    /// the cap is zero, or the quotient is not finite; no infinity ever
    /// lands in the table. Tonnage = intensity * holding market value,
    /// null-propagating with the same finiteness guard.
    pub fn derive_exposure(&self, table: &mut Table, fuels: &[FuelType]) -> Result<()> {
        let cap_col = match table.column_index(COL_MARKET_CAP) {
            Some(idx) => idx,
            None => bail!("master table has no {} column", COL_MARKET_CAP),
        };
        let value_col = match table.column_index(COL_MARKET_VALUE) {
            Some(idx) => idx,
            None => bail!("master table has no {} column", COL_MARKET_VALUE),
        };

        for fuel in fuels {
            let reserve_col = match table.column_index(&fuel.reserve_column()) {
                Some(idx) => idx,
                None => continue,
            };
            let intensity_col = table.add_column(&fuel.intensity_column());
            let tonnage_col = table.add_column(&fuel.tonnage_column());

            for row_idx in 0..table.row_count() {
                let reserve = table.rows[row_idx][reserve_col].as_number();
                let cap = table.rows[row_idx][cap_col].as_number();
                let intensity = match (reserve, cap) {
                    (Some(r), Some(c)) if c != 0.0 => Some(r / c).filter(|v| v.is_finite()),
                    _ => None,
                };
                let value = table.rows[row_idx][value_col].as_number();
                let tonnage = match (intensity, value) {
                    (Some(i), Some(v)) => Some(i * v).filter(|t| t.is_finite()),
                    _ => None,
                };
                table.rows[row_idx][intensity_col] = to_cell(intensity);
                table.rows[row_idx][tonnage_col] = to_cell(tonnage);
            }
        }

        Ok(())
    }

    /// Add `<Fuel>Pctile` and `<Fuel>(tCO2)Pctile` per fuel: the fractional
    /// average rank of the reserve and tonnage values over all rows present.
    /// Null metric values get a null rank; non-null ranks lie in (0, 1].
    pub fn rank_percentiles(&self, table: &mut Table, fuels: &[FuelType]) {
        for fuel in fuels {
            self.rank_column(table, &fuel.reserve_column(), &fuel.reserve_pctile_column());
            self.rank_column(table, &fuel.tonnage_column(), &fuel.tonnage_pctile_column());
        }
    }

    fn rank_column(&self, table: &mut Table, source: &str, target: &str) {
        let source_col = match table.column_index(source) {
            Some(idx) => idx,
            None => return,
        };
        let values = table.numbers(source_col);
        let ranks = percentile_ranks(&values);
        let target_col = table.add_column(target);
        for (row_idx, rank) in ranks.into_iter().enumerate() {
            table.rows[row_idx][target_col] = to_cell(rank);
        }
    }
}

impl Default for CarbonMetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_cell(value: Option<f64>) -> Cell {
    match value {
        Some(v) => Cell::Number(v),
        None => Cell::Null,
    }
}

/// Fractional average-rank percentiles: rank / non-null count, with tied
/// values sharing the mean of their positional ranks
fn percentile_ranks(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.map(|v| (idx, v)))
        .collect();
    let count = present.len();
    if count == 0 {
        return out;
    }

    present.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut start = 0;
    while start < count {
        let mut end = start;
        while end + 1 < count && present[end + 1].1 == present[start].1 {
            end += 1;
        }
        // positional ranks are 1-based; a tie group shares its average
        let rank = (start + 1 + end + 1) as f64 / 2.0;
        for &(row_idx, _) in &present[start..=end] {
            out[row_idx] = Some(rank / count as f64);
        }
        start = end + 1;
    }

    out
}
