use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::config::{EngineConfig, whole_shares};
use super::dilution::analyze_dilution;
use super::error::{FatalError, RoundError};
use super::integrity::validate_cap_table;
use super::types::{
    CalculationResult, CapTableEntry, CapTableSnapshot, EsopPool, Founder, FounderSecondary,
    FundingRound, HolderId, IssueStage, RoundType, Scenario, ValidationIssue,
};

const INITIAL_ROUND_ID: &str = "initial";
const INITIAL_ROUND_NAME: &str = "Initial";
const ESOP_LABEL: &str = "ESOP Pool";
const SAFE_SUFFIX: &str = " (SAFE)";

/// Working ownership state between snapshots.
#[derive(Debug, Clone)]
struct Ledger {
    entries: Vec<CapTableEntry>,
    total_shares: i64,
}

#[derive(Debug)]
struct RoundOutcome {
    ledger: Ledger,
    pre_money_valuation: f64,
    post_money_valuation: f64,
}

pub fn calculate_cap_table(scenario: &Scenario, rounds: &[FundingRound]) -> CalculationResult {
    calculate_cap_table_with(&EngineConfig::default(), scenario, rounds)
}

/// Replays `rounds` in order on top of the scenario's initial ownership.
///
/// Round ids identify investors, so a round whose id was already applied is
/// skipped. Never fails: a round that cannot be applied is recorded as a skipped-round
/// issue and the ledger carries forward unchanged. A fatal error stops the run
/// and returns the snapshots produced up to that point.
pub fn calculate_cap_table_with(
    config: &EngineConfig,
    scenario: &Scenario,
    rounds: &[FundingRound],
) -> CalculationResult {
    let started = Instant::now();
    let mut snapshots = Vec::with_capacity(rounds.len() + 1);
    let mut issues = Vec::new();

    let ledger = match evolve(config, scenario, rounds, &mut snapshots, &mut issues) {
        Ok(ledger) => ledger,
        Err(err) => {
            warn!(scenario = %scenario.id, error = %err, "cap table calculation aborted");
            issues.push(ValidationIssue::fatal(
                IssueStage::InitialTable,
                err.to_string(),
            ));
            return CalculationResult {
                scenario: scenario.clone(),
                cap_table: snapshots,
                dilution_analysis: Vec::new(),
                validation_errors: issues,
            };
        }
    };

    let dilution_analysis = analyze_dilution(config, &scenario.founders, &snapshots);
    issues.extend(validate_cap_table(config, &ledger.entries));

    info!(
        scenario = %scenario.id,
        rounds = rounds.len(),
        snapshots = snapshots.len(),
        total_shares = ledger.total_shares,
        issues = issues.len(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "cap table calculated"
    );

    CalculationResult {
        scenario: attach_history(scenario, rounds, &snapshots),
        cap_table: snapshots,
        dilution_analysis,
        validation_errors: issues,
    }
}

fn evolve(
    config: &EngineConfig,
    scenario: &Scenario,
    rounds: &[FundingRound],
    snapshots: &mut Vec<CapTableSnapshot>,
    issues: &mut Vec<ValidationIssue>,
) -> Result<Ledger, FatalError> {
    let mut ledger = Ledger {
        entries: build_initial_entries(config, &scenario.founders, scenario.initial_esop.as_ref())?,
        total_shares: config.initial_shares,
    };
    snapshots.push(ledger.snapshot(INITIAL_ROUND_ID, INITIAL_ROUND_NAME, 0.0, 0.0));

    for round in rounds {
        match ledger.apply_round(config, round) {
            Ok(outcome) => {
                debug!(
                    round = %round.id,
                    round_type = ?round.round_type,
                    total_shares = outcome.ledger.total_shares,
                    "round applied"
                );
                ledger = outcome.ledger;
                snapshots.push(ledger.snapshot(
                    &round.id,
                    &round.name,
                    outcome.pre_money_valuation,
                    outcome.post_money_valuation,
                ));
            }
            Err(err) => {
                warn!(round = %round.id, error = %err, "round skipped");
                issues.push(ValidationIssue::round_skipped(round, err.to_string()));
            }
        }
    }

    Ok(ledger)
}

/// Builds the first ownership rows from the founder list and optional ESOP pool.
///
/// Shares are `round(percent / 100 * initial_shares)`. Equity is not checked
/// to sum to 100 here.
pub fn build_initial_entries(
    config: &EngineConfig,
    founders: &[Founder],
    esop: Option<&EsopPool>,
) -> Result<Vec<CapTableEntry>, FatalError> {
    if config.initial_shares <= 0 {
        return Err(FatalError::InvalidInitialShares(config.initial_shares));
    }
    if founders.is_empty() {
        return Err(FatalError::NoFounders);
    }

    let initial_shares = config.initial_shares as f64;
    let mut seen = HashSet::with_capacity(founders.len());
    let mut entries = Vec::with_capacity(founders.len() + 1);

    for founder in founders {
        if !seen.insert(founder.id.as_str()) {
            return Err(FatalError::DuplicateFounder {
                founder_id: founder.id.clone(),
            });
        }
        if !founder.initial_equity.is_finite() {
            return Err(FatalError::InvalidFounderEquity {
                founder_id: founder.id.clone(),
                equity: founder.initial_equity,
            });
        }

        entries.push(CapTableEntry::new(
            HolderId::Founder(founder.id.clone()),
            founder.name.clone(),
            whole_shares(founder.initial_equity / 100.0 * initial_shares),
            config.round_equity(founder.initial_equity),
            None,
        ));
    }

    if let Some(pool) = esop.filter(|pool| pool.pool_size > 0.0) {
        entries.push(esop_entry(
            whole_shares(pool.pool_size / 100.0 * initial_shares),
            config.round_equity(pool.pool_size),
        ));
    }

    Ok(entries)
}

fn esop_entry(shares: i64, equity: f64) -> CapTableEntry {
    CapTableEntry::new(HolderId::Esop, ESOP_LABEL.to_string(), shares, equity, None)
}

fn pool_fraction(pool_size: f64) -> Result<f64, RoundError> {
    if !pool_size.is_finite() || !(0.0..100.0).contains(&pool_size) {
        return Err(RoundError::InvalidPoolSize { pool_size });
    }
    Ok(pool_size / 100.0)
}

fn shares_at_price(capital: f64, price: f64) -> Result<i64, RoundError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(RoundError::InvalidSharePrice { price });
    }
    Ok(whole_shares(capital / price))
}

impl Ledger {
    fn snapshot(
        &self,
        round_id: &str,
        round_name: &str,
        pre_money_valuation: f64,
        post_money_valuation: f64,
    ) -> CapTableSnapshot {
        CapTableSnapshot {
            round_id: round_id.to_string(),
            round_name: round_name.to_string(),
            pre_money_valuation,
            post_money_valuation,
            entries: self.entries.clone(),
            total_shares: self.total_shares,
        }
    }

    /// Applies one round to a copy of the ledger: pre-money ESOP top-up,
    /// issuance, post-money ESOP top-up, secondary sales, then equity
    /// re-normalization. Each step consumes the share count left by the last.
    fn apply_round(
        &self,
        config: &EngineConfig,
        round: &FundingRound,
    ) -> Result<RoundOutcome, RoundError> {
        if self.entry(&HolderId::Investor(round.id.clone())).is_some() {
            return Err(RoundError::DuplicateRound {
                round_id: round.id.clone(),
            });
        }

        let mut ledger = self.clone();

        if let Some(adjustment) = round.esop_adjustment.as_ref().filter(|a| a.is_pre_money) {
            ledger.top_up_esop_pre_money(adjustment.new_pool_size)?;
        }

        let (pre_money_valuation, post_money_valuation) = match round.round_type {
            RoundType::Priced => ledger.issue_priced(config, round)?,
            RoundType::Safe => ledger.issue_safe(config, round)?,
        };

        if let Some(adjustment) = round.esop_adjustment.as_ref().filter(|a| !a.is_pre_money) {
            ledger.top_up_esop_post_money(adjustment.new_pool_size)?;
        }

        if let Some(sales) = &round.founder_secondary {
            ledger.sell_secondary(sales)?;
        }

        ledger.renormalize(config)?;

        Ok(RoundOutcome {
            ledger,
            pre_money_valuation,
            post_money_valuation,
        })
    }

    fn issue_priced(
        &mut self,
        config: &EngineConfig,
        round: &FundingRound,
    ) -> Result<(f64, f64), RoundError> {
        let valuation = round
            .valuation
            .filter(|valuation| *valuation != 0.0)
            .ok_or(RoundError::MissingValuation)?;

        let (pre_money, post_money) = if round.is_pre_money {
            (valuation, valuation + round.capital_raised)
        } else {
            (valuation - round.capital_raised, valuation)
        };

        let share_price = pre_money / self.total_shares as f64;
        let new_shares = shares_at_price(round.capital_raised, share_price)?;
        self.push_investor(config, round, round.investor_name.clone(), new_shares)?;

        Ok((pre_money, post_money))
    }

    /// Converts the SAFE immediately at its cap (or the fallback valuation),
    /// less any discount. No later priced round re-converts it.
    fn issue_safe(
        &mut self,
        config: &EngineConfig,
        round: &FundingRound,
    ) -> Result<(f64, f64), RoundError> {
        let terms = round
            .safe_terms
            .as_ref()
            .ok_or(RoundError::MissingSafeTerms)?;

        let estimated_valuation = terms
            .valuation_cap
            .filter(|cap| *cap > 0.0)
            .unwrap_or(config.safe_fallback_valuation);
        let discount = terms.discount.unwrap_or(0.0);

        let base_price = estimated_valuation / self.total_shares as f64;
        let effective_price = base_price * (1.0 - discount / 100.0);
        let new_shares = shares_at_price(round.capital_raised, effective_price)?;
        let label = format!("{}{SAFE_SUFFIX}", round.investor_name);
        self.push_investor(config, round, label, new_shares)?;

        Ok((
            estimated_valuation,
            estimated_valuation + round.capital_raised,
        ))
    }

    fn push_investor(
        &mut self,
        config: &EngineConfig,
        round: &FundingRound,
        label: String,
        new_shares: i64,
    ) -> Result<(), RoundError> {
        let total_shares = self
            .total_shares
            .checked_add(new_shares)
            .ok_or(RoundError::ShareOverflow)?;
        let equity = new_shares as f64 / total_shares as f64 * 100.0;

        self.entries.push(CapTableEntry::new(
            HolderId::Investor(round.id.clone()),
            label,
            new_shares,
            config.round_equity(equity),
            Some(round.id.clone()),
        ));
        self.total_shares = total_shares;
        Ok(())
    }

    /// Grows the denominator so that everyone outside the pool keeps
    /// `100 - pool_size` percent between them; their share counts stay put.
    fn top_up_esop_pre_money(&mut self, pool_size: f64) -> Result<(), RoundError> {
        let fraction = pool_fraction(pool_size)?;
        let new_total = whole_shares(self.total_shares as f64 / (1.0 - fraction));
        let pool_shares = whole_shares(new_total as f64 * fraction);

        self.set_esop_shares(pool_shares, pool_size);
        self.total_shares = new_total;
        Ok(())
    }

    /// Issues new pool shares until the pool is `pool_size` percent of the
    /// enlarged total. A smaller target never shrinks the pool.
    fn top_up_esop_post_money(&mut self, pool_size: f64) -> Result<(), RoundError> {
        let fraction = pool_fraction(pool_size)?;
        let current = self.esop_shares();
        let additional = whole_shares(
            (self.total_shares as f64 * fraction - current as f64) / (1.0 - fraction),
        );
        let issued = additional.max(0);

        let pool_shares = current
            .checked_add(issued)
            .ok_or(RoundError::ShareOverflow)?;
        let total_shares = self
            .total_shares
            .checked_add(issued)
            .ok_or(RoundError::ShareOverflow)?;

        self.set_esop_shares(pool_shares, pool_size);
        self.total_shares = total_shares;
        Ok(())
    }

    fn entry(&self, holder_id: &HolderId) -> Option<&CapTableEntry> {
        self.entries.iter().find(|entry| &entry.holder_id == holder_id)
    }

    fn esop_shares(&self) -> i64 {
        self.entry(&HolderId::Esop).map_or(0, |entry| entry.shares)
    }

    fn set_esop_shares(&mut self, shares: i64, pool_size: f64) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.holder_id == HolderId::Esop)
        {
            Some(entry) => entry.shares = shares,
            None => self.entries.push(esop_entry(shares, pool_size)),
        }
    }

    /// Removes sold shares from each founder; the total is unchanged.
    fn sell_secondary(&mut self, sales: &[FounderSecondary]) -> Result<(), RoundError> {
        for sale in sales {
            let holder_id = HolderId::Founder(sale.founder_id.clone());
            let entry = self
                .entries
                .iter_mut()
                .find(|entry| entry.holder_id == holder_id)
                .ok_or_else(|| RoundError::UnknownFounder {
                    founder_id: sale.founder_id.clone(),
                })?;

            if sale.shares_amount > entry.shares {
                return Err(RoundError::OversoldSecondary {
                    founder_id: sale.founder_id.clone(),
                    owned: entry.shares,
                    requested: sale.shares_amount,
                });
            }
            entry.shares -= sale.shares_amount;
        }
        Ok(())
    }

    fn renormalize(&mut self, config: &EngineConfig) -> Result<(), RoundError> {
        if self.total_shares <= 0 {
            return Err(RoundError::EmptyLedger);
        }
        let total = self.total_shares as f64;
        for entry in &mut self.entries {
            entry.equity = config.round_equity(entry.shares as f64 / total * 100.0);
        }
        Ok(())
    }
}

/// Copy of the scenario carrying the rounds, the snapshot history and each
/// founder's holdings in the latest snapshot.
fn attach_history(
    scenario: &Scenario,
    rounds: &[FundingRound],
    snapshots: &[CapTableSnapshot],
) -> Scenario {
    let latest = snapshots.last();
    let founders = scenario
        .founders
        .iter()
        .map(|founder| {
            let holder_id = HolderId::Founder(founder.id.clone());
            let entry = latest.and_then(|snapshot| snapshot.entry(&holder_id));
            Founder {
                current_shares: entry.map_or(0, |e| e.shares),
                current_equity: entry.map_or(0.0, |e| e.equity),
                ..founder.clone()
            }
        })
        .collect();

    Scenario {
        founders,
        funding_rounds: rounds.to_vec(),
        cap_table: snapshots.to_vec(),
        ..scenario.clone()
    }
}
