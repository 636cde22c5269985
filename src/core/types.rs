use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RoundType {
    #[serde(rename = "SAFE", alias = "safe")]
    Safe,
    #[serde(rename = "PRICED", alias = "priced")]
    Priced,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakeholderType {
    Founder,
    Esop,
    Investor,
}

/// Stable identity of a cap table holder, independent of its display label.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum HolderId {
    /// Keyed by the founder's id.
    Founder(String),
    Esop,
    /// Keyed by the id of the round that introduced the investor.
    Investor(String),
}

impl HolderId {
    pub fn stakeholder_type(&self) -> StakeholderType {
        match self {
            HolderId::Founder(_) => StakeholderType::Founder,
            HolderId::Esop => StakeholderType::Esop,
            HolderId::Investor(_) => StakeholderType::Investor,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FounderRole {
    #[serde(rename = "CEO")]
    Ceo,
    #[serde(rename = "CTO")]
    Cto,
    #[serde(rename = "Co-Founder")]
    CoFounder,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Founder {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FounderRole>,
    /// Percent, 0-100. Fixed at scenario creation.
    pub initial_equity: f64,
    #[serde(default)]
    pub current_shares: i64,
    #[serde(default)]
    pub current_equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsopPool {
    pub pool_size: f64,
    pub is_pre_money: bool,
    #[serde(default)]
    pub allocated_shares: i64,
    #[serde(default)]
    pub available_shares: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SafeTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfn: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsopAdjustment {
    pub new_pool_size: f64,
    pub is_pre_money: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FounderSecondary {
    pub founder_id: String,
    pub shares_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRound {
    pub id: String,
    pub name: String,
    pub round_type: RoundType,
    pub capital_raised: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation: Option<f64>,
    pub is_pre_money: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_terms: Option<SafeTerms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esop_adjustment: Option<EsopAdjustment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_secondary: Option<Vec<FounderSecondary>>,
    #[serde(default)]
    pub date: String,
    pub investor_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapTableEntry {
    pub holder_id: HolderId,
    pub stakeholder: String,
    pub stakeholder_type: StakeholderType,
    pub shares: i64,
    pub equity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapTableSnapshot {
    pub round_id: String,
    pub round_name: String,
    pub pre_money_valuation: f64,
    pub post_money_valuation: f64,
    pub entries: Vec<CapTableEntry>,
    pub total_shares: i64,
}

impl CapTableEntry {
    /// The stakeholder type always follows from the holder identity.
    pub fn new(
        holder_id: HolderId,
        stakeholder: String,
        shares: i64,
        equity: f64,
        round_id: Option<String>,
    ) -> Self {
        Self {
            stakeholder_type: holder_id.stakeholder_type(),
            holder_id,
            stakeholder,
            shares,
            equity,
            round_id,
        }
    }
}

impl CapTableSnapshot {
    pub fn entry(&self, holder_id: &HolderId) -> Option<&CapTableEntry> {
        self.entries.iter().find(|entry| &entry.holder_id == holder_id)
    }

    pub fn total_equity(&self) -> f64 {
        self.entries.iter().map(|entry| entry.equity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub founders: Vec<Founder>,
    #[serde(default, rename = "initialESOP", alias = "initialEsop")]
    pub initial_esop: Option<EsopPool>,
    #[serde(default)]
    pub funding_rounds: Vec<FundingRound>,
    #[serde(default)]
    pub cap_table: Vec<CapTableSnapshot>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDilution {
    pub round_id: String,
    pub round_name: String,
    pub equity_before: f64,
    pub equity_after: f64,
    pub dilution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DilutionRecord {
    pub founder_id: String,
    pub founder_name: String,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_dilution: f64,
    pub round_by_round_dilution: Vec<RoundDilution>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitReturn {
    pub holder_id: HolderId,
    pub stakeholder: String,
    pub stakeholder_type: StakeholderType,
    pub equity: f64,
    pub cash_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitScenario {
    pub exit_valuation: f64,
    pub returns: Vec<ExitReturn>,
}

impl ExitScenario {
    pub fn total_cash_return(&self) -> f64 {
        self.returns.iter().map(|r| r.cash_return).sum()
    }
}

/// Where in the pipeline an issue was raised.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum IssueStage {
    InitialTable,
    Round { round_id: String, round_name: String },
    Integrity,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// The round was not applied; the ledger carried forward unchanged.
    RoundSkipped,
    /// The run stopped; only the snapshots produced so far are returned.
    Fatal,
    /// Final ledger is outside the accepted tolerance.
    Warning,
    /// Final ledger drifted from full ownership but stays within tolerance.
    Drift,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(flatten)]
    pub stage: IssueStage,
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn round_skipped(round: &FundingRound, message: impl Into<String>) -> Self {
        Self {
            stage: IssueStage::Round {
                round_id: round.id.clone(),
                round_name: round.name.clone(),
            },
            kind: IssueKind::RoundSkipped,
            message: message.into(),
        }
    }

    pub fn fatal(stage: IssueStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: IssueKind::Fatal,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            stage: IssueStage::Integrity,
            kind: IssueKind::Warning,
            message: message.into(),
        }
    }

    pub fn drift(message: impl Into<String>) -> Self {
        Self {
            stage: IssueStage::Integrity,
            kind: IssueKind::Drift,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == IssueKind::Fatal
    }

    pub fn is_round_skipped(&self) -> bool {
        self.kind == IssueKind::RoundSkipped
    }

    pub fn is_warning(&self) -> bool {
        self.kind == IssueKind::Warning
    }

    pub fn is_drift(&self) -> bool {
        self.kind == IssueKind::Drift
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.stage) {
            (IssueKind::Fatal, _) => write!(f, "Fatal error: {}", self.message),
            (_, IssueStage::Round { round_name, .. }) => {
                write!(f, "Round {round_name}: {}", self.message)
            }
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub scenario: Scenario,
    pub cap_table: Vec<CapTableSnapshot>,
    pub dilution_analysis: Vec<DilutionRecord>,
    pub validation_errors: Vec<ValidationIssue>,
}

impl CalculationResult {
    pub fn latest_snapshot(&self) -> Option<&CapTableSnapshot> {
        self.cap_table.last()
    }

    /// Issues rendered as plain strings.
    pub fn error_messages(&self) -> Vec<String> {
        self.validation_errors
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}
