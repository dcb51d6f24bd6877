//! Execution strategy selection
//!
//! A change set is applied in place with `ALTER TABLE` only when that cannot
//! lose data or leave the table half-converted. Anything riskier goes through
//! the clone-and-swap rebuild.

use serde::Serialize;
use std::fmt;

use crate::schema::diff::ChangeSet;

/// How a change set is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    Direct,
    SafeRebuild,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::SafeRebuild => f.write_str("safe rebuild"),
        }
    }
}

/// Strategy plus the rules that selected it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub strategy: Strategy,
    pub reasons: Vec<String>,
}

/// Classify a change set
pub fn classify(change_set: &ChangeSet, force: bool) -> Strategy {
    assess(change_set, force).strategy
}

/// Classify a change set and explain the decision
pub fn assess(change_set: &ChangeSet, force: bool) -> RiskAssessment {
    let mut reasons = Vec::new();
    let modified = change_set.modify_columns.len();

    if modified > 1 {
        reasons.push(format!("{} column modifications", modified));
    }
    if modified > 0 && change_set.has_index_changes() {
        reasons.push("column modification combined with index changes".to_string());
    }
    for change in change_set.modify_columns.iter().filter(|c| c.changes_type()) {
        reasons.push(format!("type change on {}", change.column.name));
    }
    if change_set.drop_columns.len() > 1 {
        reasons.push(format!("{} column drops", change_set.drop_columns.len()));
    }

    if reasons.is_empty() {
        return RiskAssessment {
            strategy: Strategy::Direct,
            reasons,
        };
    }

    if force && change_set.is_drop_only() {
        reasons.push("forced: drop-only change set applied directly".to_string());
        return RiskAssessment {
            strategy: Strategy::Direct,
            reasons,
        };
    }

    RiskAssessment {
        strategy: Strategy::SafeRebuild,
        reasons,
    }
}
