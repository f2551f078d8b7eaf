// ⚖️ Screening Pipeline - Sequences one year at a time, isolated
// A year missing any dataset is reported and skipped, never fatal

use crate::consolidate::{ConsolidationReport, DuplicateConsolidator};
use crate::matching::{EntityMatcher, MatchPolicy};
use crate::merge::RecordMerger;
use crate::metrics::{CarbonMetricsEngine, FuelType};
use crate::registry::{DatasetKind, DatasetRegistry};
use crate::table::{Table, COL_COMPANY, COL_MARKET_VALUE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// YEAR RESULTS
// ============================================================================

/// Per-year summary figures for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: String,
    pub holdings: usize,
    pub issuers: usize,
    pub issuers_matched: usize,
    pub match_pairs: usize,
    /// Market value with a matched issuer over total market value, in [0,1]
    pub fraction_matched: f64,
    pub fuels: Vec<String>,
    pub rows_final: usize,
}

/// One completed year: the final table plus its summary
#[derive(Debug, Clone)]
pub struct YearResult {
    pub year: String,
    pub table: Table,
    pub summary: YearSummary,
    pub consolidation: ConsolidationReport,
}

/// Outcome per year; skipped years name their missing datasets
#[derive(Debug, Clone)]
pub enum YearOutcome {
    Completed(YearResult),
    Skipped {
        year: String,
        missing: Vec<DatasetKind>,
    },
}

impl YearOutcome {
    pub fn year(&self) -> &str {
        match self {
            YearOutcome::Completed(result) => &result.year,
            YearOutcome::Skipped { year, .. } => year,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, YearOutcome::Completed(_))
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// Skipped-year entry in the serialized report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedYear {
    pub year: String,
    pub missing: Vec<String>,
}

/// Run-level report, serializable for downstream tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub policy: String,
    pub completed: Vec<YearSummary>,
    pub skipped: Vec<SkippedYear>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineReport {
    pub fn from_outcomes(policy: MatchPolicy, outcomes: &[YearOutcome]) -> Self {
        let mut completed = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                YearOutcome::Completed(result) => completed.push(result.summary.clone()),
                YearOutcome::Skipped { year, missing } => skipped.push(SkippedYear {
                    year: year.clone(),
                    missing: missing.iter().map(|kind| kind.label().to_string()).collect(),
                }),
            }
        }
        PipelineReport {
            policy: policy.label().to_string(),
            completed,
            skipped,
            generated_at: chrono::Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} year(s) screened, {} skipped, policy {}",
            self.completed.len(),
            self.skipped.len(),
            self.policy
        )
    }
}

// ============================================================================
// SCREENING PIPELINE
// ============================================================================

/// Sequences matcher, merger, metrics and consolidator per year.
/// Years are independent: no state crosses a year boundary, and an
/// empty registry yields an empty outcome list rather than an error.
pub struct ScreeningPipeline {
    pub matcher: EntityMatcher,
    pub merger: RecordMerger,
    pub consolidator: DuplicateConsolidator,
    pub metrics: CarbonMetricsEngine,
}

impl ScreeningPipeline {
    pub fn new(policy: MatchPolicy) -> Self {
        ScreeningPipeline {
            matcher: EntityMatcher::new(policy),
            merger: RecordMerger::new(),
            consolidator: DuplicateConsolidator::new(),
            metrics: CarbonMetricsEngine::new(),
        }
    }

    /// Process every year in the registry, ascending
    pub fn run(&self, registry: &DatasetRegistry) -> Result<Vec<YearOutcome>> {
        let mut outcomes = Vec::new();
        for year in registry.years() {
            outcomes.push(self.run_year(registry, &year)?);
        }
        Ok(outcomes)
    }

    fn run_year(&self, registry: &DatasetRegistry, year: &str) -> Result<YearOutcome> {
        let (equity, carbon, financial) = match (
            registry.get(year, DatasetKind::Equity),
            registry.get(year, DatasetKind::Carbon),
            registry.get(year, DatasetKind::Financial),
        ) {
            (Some(equity), Some(carbon), Some(financial)) => (equity, carbon, financial),
            _ => {
                let missing = registry.missing_kinds(year);
                warn!(year, ?missing, "incomplete datasets, year skipped");
                return Ok(YearOutcome::Skipped {
                    year: year.to_string(),
                    missing,
                });
            }
        };

        let matches = self
            .matcher
            .match_year(equity, carbon)
            .with_context(|| format!("matching failed for {}", year))?;
        info!(
            year,
            issuers = matches.issuers_total,
            matched = matches.issuers_matched,
            pairs = matches.pairs.len(),
            "issuers matched"
        );

        let mut master = self
            .merger
            .merge_year(equity, carbon, financial, &matches.pairs)
            .with_context(|| format!("merge failed for {}", year))?;
        debug_assert_eq!(master.row_count(), equity.row_count());

        // the summary ratio reflects matching, so it reads the table
        // before consolidation reshapes the rows
        let fraction_matched = fraction_matched(&master);

        let fuels = FuelType::discover(&master);
        self.metrics
            .derive_exposure(&mut master, &fuels)
            .with_context(|| format!("metric derivation failed for {}", year))?;
        let consolidation = self.consolidator.consolidate(&mut master, &fuels);
        self.metrics.rank_percentiles(&mut master, &fuels);

        let summary = YearSummary {
            year: year.to_string(),
            holdings: equity.row_count(),
            issuers: matches.issuers_total,
            issuers_matched: matches.issuers_matched,
            match_pairs: matches.pairs.len(),
            fraction_matched,
            fuels: fuels.iter().map(|fuel| fuel.name.clone()).collect(),
            rows_final: master.row_count(),
        };
        info!(year, fraction_matched, rows = summary.rows_final, "year screened");

        Ok(YearOutcome::Completed(YearResult {
            year: year.to_string(),
            table: master,
            summary,
            consolidation,
        }))
    }
}

/// Share of portfolio market value sitting in rows with a matched issuer.
/// A portfolio with no market value at all reports 0.0.
fn fraction_matched(master: &Table) -> f64 {
    let company_col = master.column_index(COL_COMPANY);
    let value_col = match master.column_index(COL_MARKET_VALUE) {
        Some(idx) => idx,
        None => return 0.0,
    };

    let mut total = 0.0;
    let mut matched = 0.0;
    for row in &master.rows {
        let value = match row[value_col].as_number() {
            Some(v) => v,
            None => continue,
        };
        total += value;
        let has_issuer = company_col.map(|col| !row[col].is_null()).unwrap_or(false);
        if has_issuer {
            matched += value;
        }
    }

    if total == 0.0 {
        0.0
    } else {
        matched / total
    }
}
