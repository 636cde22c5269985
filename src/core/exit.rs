use super::config::EngineConfig;
use super::types::{CapTableSnapshot, ExitReturn, ExitScenario};

pub fn calculate_exit_returns(snapshot: &CapTableSnapshot, exit_valuation: f64) -> ExitScenario {
    calculate_exit_returns_with(&EngineConfig::default(), snapshot, exit_valuation)
}

/// Pays each holder `equity% * exit_valuation`, rounded to cents.
///
/// The snapshot is trusted as-is; its equity is not re-derived from shares.
pub fn calculate_exit_returns_with(
    config: &EngineConfig,
    snapshot: &CapTableSnapshot,
    exit_valuation: f64,
) -> ExitScenario {
    let returns = snapshot
        .entries
        .iter()
        .map(|entry| ExitReturn {
            holder_id: entry.holder_id.clone(),
            stakeholder: entry.stakeholder.clone(),
            stakeholder_type: entry.stakeholder_type,
            equity: entry.equity,
            cash_return: config.round_cash(entry.equity / 100.0 * exit_valuation),
        })
        .collect();

    ExitScenario {
        exit_valuation,
        returns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::calculate_cap_table;
    use crate::core::engine::tests::{priced_round, sample_scenario};
    use crate::core::types::{HolderId, StakeholderType};
    use proptest::prelude::{prop_assert, proptest};

    #[test]
    fn exit_returns_cover_every_holder() {
        let result = calculate_cap_table(
            &sample_scenario(),
            &[priced_round("seed-1", 2_000_000.0, 10_000_000.0)],
        );
        let latest = result.latest_snapshot().expect("snapshot");
        let exit = calculate_exit_returns(latest, 100_000_000.0);

        assert_eq!(exit.exit_valuation, 100_000_000.0);
        assert_eq!(exit.returns.len(), latest.entries.len());
        assert!((exit.total_cash_return() - 100_000_000.0).abs() <= 1.0);

        let alice = exit
            .returns
            .iter()
            .find(|r| r.holder_id == HolderId::Founder("founder-1".to_string()))
            .expect("alice");
        assert_eq!(alice.stakeholder, "Alice");
        assert_eq!(alice.stakeholder_type, StakeholderType::Founder);
        assert!(alice.cash_return > 40_000_000.0);
        assert_eq!(alice.cash_return, 50_000_000.0);
    }

    #[test]
    fn cash_is_rounded_to_cents() {
        let result = calculate_cap_table(
            &sample_scenario(),
            &[priced_round("seed-1", 1_000_000.0, 10_000_000.0)],
        );
        let exit = calculate_exit_returns(&result.cap_table[1], 1_234_567.89);
        for ret in &exit.returns {
            let cents = ret.cash_return * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6);
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_exit_returns_sum_to_exit_valuation(
            valuation_k in 1_000u32..500_000,
            capital_k in 100u32..100_000,
            exit_m in 1u32..50_000,
        ) {
            let round = priced_round("r", capital_k as f64 * 1_000.0, valuation_k as f64 * 1_000.0);
            let result = calculate_cap_table(&sample_scenario(), &[round]);
            let exit_valuation = exit_m as f64 * 1_000_000.0;
            let exit = calculate_exit_returns(result.latest_snapshot().expect("snapshot"), exit_valuation);

            // Equity is rounded to 6 places per holder.
            let tolerance = exit.returns.len() as f64 * exit_valuation * 5e-9 + 1.0;
            prop_assert!((exit.total_cash_return() - exit_valuation).abs() <= tolerance);
        }
    }
}
