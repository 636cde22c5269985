use super::config::EngineConfig;
use super::types::{CapTableSnapshot, DilutionRecord, Founder, HolderId, RoundDilution};

/// Per-founder equity loss across consecutive snapshots, in founder order.
///
/// Founders are matched by id. A founder missing from a snapshot counts as 0%.
pub fn analyze_dilution(
    config: &EngineConfig,
    founders: &[Founder],
    snapshots: &[CapTableSnapshot],
) -> Vec<DilutionRecord> {
    founders
        .iter()
        .map(|founder| founder_dilution(config, founder, snapshots))
        .collect()
}

fn founder_dilution(
    config: &EngineConfig,
    founder: &Founder,
    snapshots: &[CapTableSnapshot],
) -> DilutionRecord {
    let holder_id = HolderId::Founder(founder.id.clone());
    let equity_in = |snapshot: &CapTableSnapshot| {
        snapshot
            .entry(&holder_id)
            .map_or(0.0, |entry| entry.equity)
    };

    let mut previous = founder.initial_equity;
    let mut rounds = Vec::with_capacity(snapshots.len().saturating_sub(1));
    for snapshot in snapshots.iter().skip(1) {
        let current = equity_in(snapshot);
        rounds.push(RoundDilution {
            round_id: snapshot.round_id.clone(),
            round_name: snapshot.round_name.clone(),
            equity_before: config.round_equity(previous),
            equity_after: config.round_equity(current),
            dilution: config.round_equity(previous - current),
        });
        previous = current;
    }

    let final_equity = snapshots
        .last()
        .map_or(founder.initial_equity, |snapshot| equity_in(snapshot));

    DilutionRecord {
        founder_id: founder.id.clone(),
        founder_name: founder.name.clone(),
        initial_equity: config.round_equity(founder.initial_equity),
        final_equity: config.round_equity(final_equity),
        total_dilution: config.round_equity(founder.initial_equity - final_equity),
        round_by_round_dilution: rounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::calculate_cap_table;
    use crate::core::engine::tests::{founder, priced_round, sample_scenario};

    #[test]
    fn no_rounds_means_no_dilution() {
        let scenario = sample_scenario();
        let result = calculate_cap_table(&scenario, &[]);
        let analysis = analyze_dilution(&EngineConfig::default(), &scenario.founders, &result.cap_table);

        assert_eq!(analysis.len(), 2);
        for record in &analysis {
            assert!(record.round_by_round_dilution.is_empty());
            assert_eq!(record.total_dilution, 0.0);
            assert_eq!(record.final_equity, record.initial_equity);
        }
    }

    #[test]
    fn each_round_records_before_and_after() {
        let rounds = [
            priced_round("seed", 1_000_000.0, 10_000_000.0),
            priced_round("series-a", 5_000_000.0, 20_000_000.0),
        ];
        let result = calculate_cap_table(&sample_scenario(), &rounds);
        let alice = &result.dilution_analysis[0];

        assert_eq!(alice.founder_id, "founder-1");
        assert_eq!(alice.round_by_round_dilution.len(), 2);
        let seed = &alice.round_by_round_dilution[0];
        let series_a = &alice.round_by_round_dilution[1];
        assert_eq!(seed.round_id, "seed");
        assert_eq!(seed.equity_before, 60.0);
        assert_eq!(seed.equity_after, series_a.equity_before);
        assert!(series_a.dilution > 0.0);

        let stepwise: f64 = alice
            .round_by_round_dilution
            .iter()
            .map(|round| round.dilution)
            .sum();
        assert!((stepwise - alice.total_dilution).abs() < 1e-5);
        assert_eq!(alice.final_equity, series_a.equity_after);
    }

    #[test]
    fn founder_missing_from_snapshots_counts_as_zero() {
        let result = calculate_cap_table(&sample_scenario(), &[priced_round("seed", 1.0, 10.0)]);
        let stranger = founder("ghost", "Ghost", 5.0);
        let analysis = analyze_dilution(&EngineConfig::default(), &[stranger], &result.cap_table);

        assert_eq!(analysis[0].final_equity, 0.0);
        assert_eq!(analysis[0].total_dilution, 5.0);
        assert_eq!(analysis[0].round_by_round_dilution[0].equity_after, 0.0);
    }

    #[test]
    fn founders_sharing_a_name_are_tracked_separately() {
        let mut scenario = sample_scenario();
        scenario.founders[1].name = "Alice".to_string();
        let result = calculate_cap_table(&scenario, &[priced_round("seed", 1_000_000.0, 10_000_000.0)]);

        let analysis = &result.dilution_analysis;
        assert_eq!(analysis[0].initial_equity, 60.0);
        assert_eq!(analysis[1].initial_equity, 30.0);
        assert!(analysis[0].final_equity > analysis[1].final_equity);
    }

    #[test]
    fn empty_history_keeps_initial_equity() {
        let analysis = analyze_dilution(&EngineConfig::default(), &sample_scenario().founders, &[]);
        assert_eq!(analysis[0].final_equity, 60.0);
        assert_eq!(analysis[0].total_dilution, 0.0);
    }
}
