mod config;
mod dilution;
mod engine;
mod error;
mod exit;
mod integrity;
mod types;

pub use config::{
    EQUITY_SUM_TOLERANCE, EngineConfig, INITIAL_SHARES, SAFE_FALLBACK_VALUATION, round_to,
};
pub use dilution::analyze_dilution;
pub use engine::{build_initial_entries, calculate_cap_table, calculate_cap_table_with};
pub use error::{FatalError, RoundError};
pub use exit::{calculate_exit_returns, calculate_exit_returns_with};
pub use integrity::validate_cap_table;
pub use types::{
    CalculationResult, CapTableEntry, CapTableSnapshot, DilutionRecord, EsopAdjustment, EsopPool,
    ExitReturn, ExitScenario, Founder, FounderRole, FounderSecondary, FundingRound, HolderId,
    IssueKind, IssueStage, RoundDilution, RoundType, SafeTerms, Scenario, StakeholderType,
    ValidationIssue,
};
