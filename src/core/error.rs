use thiserror::Error;

/// Failure local to one round. The round is skipped and the ledger carries forward.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundError {
    #[error("Priced round must have valuation")]
    MissingValuation,

    #[error("SAFE round must have SAFE terms")]
    MissingSafeTerms,

    #[error("Founder {founder_id} is not on the cap table")]
    UnknownFounder { founder_id: String },

    #[error(
        "Founder {founder_id} cannot sell more shares than owned ({requested} requested, {owned} held)"
    )]
    OversoldSecondary {
        founder_id: String,
        owned: i64,
        requested: i64,
    },

    #[error("share price must be positive and finite, got {price}")]
    InvalidSharePrice { price: f64 },

    #[error("ESOP pool size must be at least 0% and below 100%, got {pool_size}%")]
    InvalidPoolSize { pool_size: f64 },

    #[error("Round id {round_id} was already applied")]
    DuplicateRound { round_id: String },

    #[error("share count overflow")]
    ShareOverflow,

    #[error("cap table has no outstanding shares")]
    EmptyLedger,
}

/// Failure that stops the whole calculation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FatalError {
    #[error("scenario has no founders")]
    NoFounders,

    #[error("founder id {founder_id} appears more than once")]
    DuplicateFounder { founder_id: String },

    #[error("founder {founder_id} has non-finite initial equity {equity}")]
    InvalidFounderEquity { founder_id: String, equity: f64 },

    #[error("initial share count must be positive, got {0}")]
    InvalidInitialShares(i64),
}
