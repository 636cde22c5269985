/// Share count every simulation starts from.
pub const INITIAL_SHARES: i64 = 10_000_000;
/// Decimal places kept on equity percentages.
pub const EQUITY_PRECISION: u32 = 6;
/// Decimal places kept on cash amounts.
pub const CASH_PRECISION: u32 = 2;
/// Conversion valuation for a SAFE issued without a cap.
pub const SAFE_FALLBACK_VALUATION: f64 = 10_000_000.0;
/// Allowed drift, in percentage points, of the summed equity away from 100.
pub const EQUITY_SUM_TOLERANCE: f64 = 5.5;
/// Drift, in percentage points, past which a within-tolerance ledger is still reported.
pub const EQUITY_DRIFT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub initial_shares: i64,
    pub equity_precision: u32,
    pub cash_precision: u32,
    pub safe_fallback_valuation: f64,
    pub equity_sum_tolerance: f64,
    pub equity_drift_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_shares: INITIAL_SHARES,
            equity_precision: EQUITY_PRECISION,
            cash_precision: CASH_PRECISION,
            safe_fallback_valuation: SAFE_FALLBACK_VALUATION,
            equity_sum_tolerance: EQUITY_SUM_TOLERANCE,
            equity_drift_threshold: EQUITY_DRIFT_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn round_equity(&self, value: f64) -> f64 {
        round_to(value, self.equity_precision)
    }

    pub fn round_cash(&self, value: f64) -> f64 {
        round_to(value, self.cash_precision)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Nearest whole share count; saturates instead of wrapping on overflow.
pub(crate) fn whole_shares(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_keeps_requested_decimals() {
        assert_eq!(round_to(54.545454545, 6), 54.545455);
        assert_eq!(round_to(1234.5678, 2), 1234.57);
        assert_eq!(round_to(-0.0000004, 6), 0.0);
    }

    #[test]
    fn default_config_matches_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.initial_shares, 10_000_000);
        assert_eq!(config.equity_precision, 6);
        assert_eq!(config.cash_precision, 2);
        assert_eq!(config.safe_fallback_valuation, 10_000_000.0);
        assert_eq!(config.equity_sum_tolerance, 5.5);
        assert_eq!(config.equity_drift_threshold, 1.0);
    }

    #[test]
    fn whole_shares_saturates_on_non_finite_input() {
        assert_eq!(whole_shares(2.5), 3);
        assert_eq!(whole_shares(f64::INFINITY), i64::MAX);
        assert_eq!(whole_shares(f64::NAN), 0);
    }
}
