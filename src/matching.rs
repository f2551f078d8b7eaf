// 🔍 Entity Matcher - Resolve issuer disclosure names to equity holdings
// Two policies: exact token-set equality, fuzzy token-set ratio >= 90

use crate::table::{Table, COL_COMPANY, COL_STOCKS};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// NAME NORMALIZATION & SCORING
// ============================================================================

/// Lowercase a company name and split it into alphanumeric tokens
pub fn normalize_name(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Order-insensitive fuzzy similarity on a 0-100 scale.
///
/// Both names are tokenized; the sorted shared tokens, alone and with each
/// side's leftover tokens appended, form three candidate strings, and the
/// score is the best pairwise edit-distance ratio among them. A name whose
/// tokens are a subset of the other's scores 100, which is what lets a
/// share-class suffix ("GAS CO A" vs "Gas Co") land on the same issuer.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let tokens_a: BTreeSet<String> = normalize_name(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = normalize_name(b).into_iter().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 0;
    }

    let shared: Vec<String> = tokens_a.intersection(&tokens_b).cloned().collect();
    let only_a: Vec<String> = tokens_a.difference(&tokens_b).cloned().collect();
    let only_b: Vec<String> = tokens_b.difference(&tokens_a).cloned().collect();

    let base = shared.join(" ");
    let with_a = join_tokens(&base, &only_a);
    let with_b = join_tokens(&base, &only_b);

    let best = ratio(&base, &with_a)
        .max(ratio(&base, &with_b))
        .max(ratio(&with_a, &with_b));
    best.round() as u8
}

fn join_tokens(base: &str, rest: &[String]) -> String {
    if base.is_empty() {
        rest.join(" ")
    } else if rest.is_empty() {
        base.to_string()
    } else {
        format!("{} {}", base, rest.join(" "))
    }
}

/// Plain edit-distance ratio on a 0-100 scale
fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b) * 100.0
}

/// True when two names reduce to the same token set, ignoring case,
/// punctuation and word order. Empty names never count as equal.
pub fn token_sets_equal(a: &str, b: &str) -> bool {
    let tokens_a: BTreeSet<String> = normalize_name(a).into_iter().collect();
    let tokens_b: BTreeSet<String> = normalize_name(b).into_iter().collect();
    !tokens_a.is_empty() && tokens_a == tokens_b
}

// ============================================================================
// MATCH POLICY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Conservative reconciliation: names must normalize to identical
    /// token sets; an extra share-class token breaks the match
    ExactTokenSet,

    /// Looser reconciliation: token-set ratio at or above the matcher's
    /// threshold counts as a candidate
    FuzzyPartial,
}

impl MatchPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            MatchPolicy::ExactTokenSet => "exact",
            MatchPolicy::FuzzyPartial => "fuzzy",
        }
    }

    /// Parse a policy name as given on the command line
    pub fn from_label(label: &str) -> Option<MatchPolicy> {
        match label {
            "exact" => Some(MatchPolicy::ExactTokenSet),
            "fuzzy" => Some(MatchPolicy::FuzzyPartial),
            _ => None,
        }
    }
}

// ============================================================================
// MATCH RESULTS
// ============================================================================

/// One (issuer row, holding row) pair at or above threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerMatch {
    pub issuer_row: usize,
    pub issuer: String,
    pub holding_row: usize,
    pub holding: String,
    /// Similarity score (0-100)
    pub score: u8,
}

/// All pairs found for one year, plus the counts reporting needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub pairs: Vec<IssuerMatch>,
    pub issuers_total: usize,
    pub issuers_matched: usize,
    pub holdings_total: usize,
    /// Rows whose name cell was null and could not participate
    pub unnamed_skipped: usize,
}

// ============================================================================
// ENTITY MATCHER
// ============================================================================

pub struct EntityMatcher {
    /// Scoring policy, selected explicitly by the caller
    pub policy: MatchPolicy,

    /// Minimum token-set ratio for a fuzzy candidate (default: 90)
    pub fuzzy_threshold: u8,
}

impl EntityMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        EntityMatcher {
            policy,
            fuzzy_threshold: 90,
        }
    }

    /// Match every issuer in the carbon table against every holding in the
    /// equity table. One issuer may match several holdings (share classes);
    /// every candidate at threshold is kept, deliberately without tie-break.
    /// Issuers with zero candidates are reported in the counts, not errors.
    pub fn match_year(&self, equity: &Table, carbon: &Table) -> Result<MatchOutcome> {
        let stocks_col = match equity.column_index(COL_STOCKS) {
            Some(idx) => idx,
            None => bail!("equity dataset has no {} column", COL_STOCKS),
        };
        let company_col = match carbon.column_index(COL_COMPANY) {
            Some(idx) => idx,
            None => bail!("carbon dataset has no {} column", COL_COMPANY),
        };

        let holdings = named_rows(equity, stocks_col);
        let issuers = named_rows(carbon, company_col);
        let unnamed_skipped = (equity.row_count() - holdings.len())
            + (carbon.row_count() - issuers.len());

        let mut pairs = Vec::new();
        let mut issuers_matched = 0;

        for (issuer_row, issuer) in &issuers {
            let mut found = false;
            for (holding_row, holding) in &holdings {
                if let Some(score) = self.score_pair(holding, issuer) {
                    pairs.push(IssuerMatch {
                        issuer_row: *issuer_row,
                        issuer: issuer.clone(),
                        holding_row: *holding_row,
                        holding: holding.clone(),
                        score,
                    });
                    found = true;
                }
            }
            if found {
                issuers_matched += 1;
            }
        }

        Ok(MatchOutcome {
            pairs,
            issuers_total: issuers.len(),
            issuers_matched,
            holdings_total: holdings.len(),
            unnamed_skipped,
        })
    }

    /// Score one candidate pair under the configured policy
    fn score_pair(&self, holding: &str, issuer: &str) -> Option<u8> {
        match self.policy {
            MatchPolicy::ExactTokenSet => {
                if token_sets_equal(holding, issuer) {
                    Some(100)
                } else {
                    None
                }
            }
            MatchPolicy::FuzzyPartial => {
                let score = token_set_ratio(holding, issuer);
                if score >= self.fuzzy_threshold {
                    Some(score)
                } else {
                    None
                }
            }
        }
    }
}

/// Rows with a usable (non-null) name cell, as (row index, name)
fn named_rows(table: &Table, col: usize) -> Vec<(usize, String)> {
    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row[col].to_text().map(|name| (idx, name)))
        .collect()
}
