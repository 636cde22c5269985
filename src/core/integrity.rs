use tracing::warn;

use super::config::EngineConfig;
use super::types::{CapTableEntry, ValidationIssue};

/// Advisory checks on a finished ledger. Findings are returned, never raised.
pub fn validate_cap_table(config: &EngineConfig, entries: &[CapTableEntry]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let total_equity: f64 = entries.iter().map(|entry| entry.equity).sum();
    let drift = (total_equity - 100.0).abs();
    if drift > config.equity_sum_tolerance {
        warn!(total_equity, "equity sum outside tolerance");
        issues.push(ValidationIssue::warning(format!(
            "Total equity is {total_equity:.2}%, should be 100%"
        )));
    } else if drift > config.equity_drift_threshold {
        warn!(total_equity, "equity sum drifted");
        issues.push(ValidationIssue::drift(format!(
            "Total equity drifted to {total_equity:.2}% (within the {:.1} point tolerance)",
            config.equity_sum_tolerance
        )));
    }

    let negative: Vec<&str> = entries
        .iter()
        .filter(|entry| entry.shares < 0)
        .map(|entry| entry.stakeholder.as_str())
        .collect();
    if !negative.is_empty() {
        warn!(holders = negative.len(), "negative share balances");
        issues.push(ValidationIssue::warning(format!(
            "Negative shares found for: {}",
            negative.join(", ")
        )));
    }

    issues
}
