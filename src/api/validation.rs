use std::collections::HashSet;

use serde::Serialize;

use crate::core::{FundingRound, RoundType, Scenario};

/// Founder + pool equity must hit 100 within this many points.
const EQUITY_TOTAL_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

#[derive(Default)]
struct Violations(Vec<FieldError>);

impl Violations {
    fn check(&mut self, ok: bool, path: impl Into<String>, message: &str) {
        if !ok {
            self.0.push(FieldError {
                path: path.into(),
                message: message.to_string(),
            });
        }
    }
}

fn is_percent(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_scenario(scenario: &Scenario) -> Vec<FieldError> {
    let mut v = Violations::default();

    v.check(
        !scenario.name.trim().is_empty(),
        "scenario.name",
        "Scenario name is required",
    );
    v.check(
        !scenario.founders.is_empty(),
        "scenario.founders",
        "At least one founder is required",
    );

    let mut ids = HashSet::new();
    for (idx, founder) in scenario.founders.iter().enumerate() {
        let path = format!("scenario.founders[{idx}]");
        v.check(!founder.id.is_empty(), format!("{path}.id"), "Founder id is required");
        v.check(
            founder.id.is_empty() || ids.insert(founder.id.as_str()),
            format!("{path}.id"),
            "Founder id must be unique",
        );
        v.check(
            !founder.name.trim().is_empty(),
            format!("{path}.name"),
            "Founder name is required",
        );
        v.check(
            is_percent(founder.initial_equity),
            format!("{path}.initialEquity"),
            "Initial equity must be between 0 and 100%",
        );
    }

    let pool_size = scenario
        .initial_esop
        .as_ref()
        .map_or(0.0, |pool| pool.pool_size);
    v.check(
        is_percent(pool_size),
        "scenario.initialESOP.poolSize",
        "ESOP pool size must be between 0 and 100%",
    );

    if !scenario.founders.is_empty() {
        let founders_total: f64 = scenario.founders.iter().map(|f| f.initial_equity).sum();
        let total = if pool_size > 0.0 {
            founders_total + pool_size
        } else {
            founders_total
        };
        v.check(
            (total - 100.0).abs() < EQUITY_TOTAL_EPSILON,
            "scenario",
            "Total equity must equal 100%. Either founder equity alone or founder equity plus ESOP must total 100%",
        );
    }

    v.0
}

pub fn validate_funding_rounds(rounds: &[FundingRound]) -> Vec<FieldError> {
    let mut v = Violations::default();
    let mut ids = HashSet::new();

    for (idx, round) in rounds.iter().enumerate() {
        let path = format!("fundingRounds[{idx}]");

        v.check(
            ids.insert(round.id.as_str()),
            format!("{path}.id"),
            "Round id must be unique",
        );
        v.check(
            !round.name.trim().is_empty(),
            format!("{path}.name"),
            "Round name is required",
        );
        v.check(
            !round.investor_name.trim().is_empty(),
            format!("{path}.investorName"),
            "Investor name is required",
        );
        v.check(
            is_positive(round.capital_raised),
            format!("{path}.capitalRaised"),
            "Capital raised must be positive",
        );
        if let Some(valuation) = round.valuation {
            v.check(
                is_positive(valuation),
                format!("{path}.valuation"),
                "Valuation must be positive",
            );
        }

        match round.round_type {
            RoundType::Priced => v.check(
                round.valuation.is_some(),
                format!("{path}.valuation"),
                "Priced rounds require valuation",
            ),
            RoundType::Safe => v.check(
                round.safe_terms.is_some(),
                format!("{path}.safeTerms"),
                "SAFE rounds require SAFE terms",
            ),
        }

        if let Some(terms) = &round.safe_terms {
            v.check(
                terms.valuation_cap.is_some() || terms.discount.is_some(),
                format!("{path}.safeTerms"),
                "SAFE must have either valuation cap or discount (or both)",
            );
            if let Some(cap) = terms.valuation_cap {
                v.check(
                    is_positive(cap),
                    format!("{path}.safeTerms.valuationCap"),
                    "Valuation cap must be positive",
                );
            }
            if let Some(discount) = terms.discount {
                v.check(
                    is_percent(discount),
                    format!("{path}.safeTerms.discount"),
                    "Discount must be between 0 and 100%",
                );
            }
        }

        if let Some(adjustment) = &round.esop_adjustment {
            v.check(
                is_percent(adjustment.new_pool_size),
                format!("{path}.esopAdjustment.newPoolSize"),
                "New pool size must be between 0 and 100%",
            );
        }

        for (sale_idx, sale) in round.founder_secondary.iter().flatten().enumerate() {
            let sale_path = format!("{path}.founderSecondary[{sale_idx}]");
            v.check(
                !sale.founder_id.is_empty(),
                format!("{sale_path}.founderId"),
                "Founder id is required",
            );
            v.check(
                sale.shares_amount > 0,
                format!("{sale_path}.sharesAmount"),
                "Shares amount must be positive",
            );
        }
    }

    v.0
}

pub fn validate_exit_valuation(exit_valuation: f64) -> Vec<FieldError> {
    let mut v = Violations::default();
    v.check(
        is_positive(exit_valuation),
        "exitValuation",
        "Exit valuation must be positive",
    );
    v.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EsopAdjustment, EsopPool, Founder, FounderSecondary, SafeTerms};

    fn founder(id: &str, equity: f64) -> Founder {
        Founder {
            id: id.to_string(),
            name: format!("Founder {id}"),
            role: None,
            initial_equity: equity,
            current_shares: 0,
            current_equity: 0.0,
        }
    }

    fn scenario(founders: Vec<Founder>, pool_size: Option<f64>) -> Scenario {
        Scenario {
            id: "s".to_string(),
            name: "Scenario".to_string(),
            description: String::new(),
            founders,
            initial_esop: pool_size.map(|pool_size| EsopPool {
                pool_size,
                is_pre_money: true,
                allocated_shares: 0,
                available_shares: 0,
            }),
            funding_rounds: Vec::new(),
            cap_table: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn round(id: &str, round_type: RoundType) -> FundingRound {
        FundingRound {
            id: id.to_string(),
            name: "Seed".to_string(),
            round_type,
            capital_raised: 1_000_000.0,
            valuation: Some(10_000_000.0),
            is_pre_money: true,
            safe_terms: None,
            esop_adjustment: None,
            founder_secondary: None,
            date: "2025-06-01".to_string(),
            investor_name: "Seed VC".to_string(),
        }
    }

    fn paths(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn founders_plus_pool_totalling_100_pass() {
        let s = scenario(vec![founder("a", 60.0), founder("b", 30.0)], Some(10.0));
        assert!(validate_scenario(&s).is_empty());
    }

    #[test]
    fn founders_alone_must_total_100_without_pool() {
        let s = scenario(vec![founder("a", 60.0), founder("b", 30.0)], Some(0.0));
        let errors = validate_scenario(&s);
        assert_eq!(paths(&errors), vec!["scenario"]);
        assert!(errors[0].message.starts_with("Total equity must equal 100%"));
    }

    #[test]
    fn scenario_field_violations_are_all_reported() {
        let mut s = scenario(vec![founder("a", 120.0), founder("a", -20.0)], Some(150.0));
        s.name = " ".to_string();
        s.founders[1].name.clear();

        let errors = validate_scenario(&s);
        assert_eq!(
            paths(&errors),
            vec![
                "scenario.name",
                "scenario.founders[0].initialEquity",
                "scenario.founders[1].id",
                "scenario.founders[1].name",
                "scenario.founders[1].initialEquity",
                "scenario.initialESOP.poolSize",
                "scenario",
            ]
        );
    }

    #[test]
    fn empty_founder_list_is_rejected() {
        let errors = validate_scenario(&scenario(Vec::new(), None));
        assert_eq!(paths(&errors), vec!["scenario.founders"]);
    }

    #[test]
    fn well_formed_rounds_pass() {
        let mut safe = round("safe-1", RoundType::Safe);
        safe.valuation = None;
        safe.safe_terms = Some(SafeTerms {
            valuation_cap: Some(5_000_000.0),
            discount: Some(20.0),
            mfn: None,
        });
        let mut priced = round("seed-1", RoundType::Priced);
        priced.esop_adjustment = Some(EsopAdjustment {
            new_pool_size: 15.0,
            is_pre_money: true,
        });
        priced.founder_secondary = Some(vec![FounderSecondary {
            founder_id: "a".to_string(),
            shares_amount: 1_000,
        }]);

        assert!(validate_funding_rounds(&[safe, priced]).is_empty());
    }

    #[test]
    fn priced_round_requires_valuation() {
        let mut priced = round("r", RoundType::Priced);
        priced.valuation = None;
        let errors = validate_funding_rounds(&[priced]);
        assert_eq!(paths(&errors), vec!["fundingRounds[0].valuation"]);
        assert_eq!(errors[0].message, "Priced rounds require valuation");
    }

    #[test]
    fn safe_terms_need_cap_or_discount() {
        let mut safe = round("r", RoundType::Safe);
        safe.safe_terms = Some(SafeTerms::default());
        let errors = validate_funding_rounds(&[safe]);
        assert_eq!(paths(&errors), vec!["fundingRounds[0].safeTerms"]);

        let mut bare = round("r", RoundType::Safe);
        bare.safe_terms = None;
        let errors = validate_funding_rounds(&[bare]);
        assert_eq!(errors[0].message, "SAFE rounds require SAFE terms");
    }

    #[test]
    fn round_ranges_are_checked() {
        let mut bad = round("r", RoundType::Priced);
        bad.capital_raised = 0.0;
        bad.valuation = Some(-1.0);
        bad.investor_name.clear();
        bad.esop_adjustment = Some(EsopAdjustment {
            new_pool_size: 101.0,
            is_pre_money: false,
        });
        bad.safe_terms = Some(SafeTerms {
            valuation_cap: Some(0.0),
            discount: Some(120.0),
            mfn: None,
        });
        bad.founder_secondary = Some(vec![FounderSecondary {
            founder_id: String::new(),
            shares_amount: 0,
        }]);
        let duplicate = round("r", RoundType::Priced);

        let errors = validate_funding_rounds(&[bad, duplicate]);
        assert_eq!(
            paths(&errors),
            vec![
                "fundingRounds[0].investorName",
                "fundingRounds[0].capitalRaised",
                "fundingRounds[0].valuation",
                "fundingRounds[0].safeTerms.valuationCap",
                "fundingRounds[0].safeTerms.discount",
                "fundingRounds[0].esopAdjustment.newPoolSize",
                "fundingRounds[0].founderSecondary[0].founderId",
                "fundingRounds[0].founderSecondary[0].sharesAmount",
                "fundingRounds[1].id",
            ]
        );
    }

    #[test]
    fn exit_valuation_must_be_positive() {
        assert!(validate_exit_valuation(50_000_000.0).is_empty());
        assert_eq!(validate_exit_valuation(0.0).len(), 1);
        assert_eq!(validate_exit_valuation(f64::NAN).len(), 1);
    }
}
