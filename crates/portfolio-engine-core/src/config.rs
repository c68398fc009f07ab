use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;
use crate::types::Rate;
use crate::PortfolioResult;

/// Engine-wide constants. Every field has a default so partial JSON
/// documents deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Annual risk-free rate used for Sharpe ratios.
    pub risk_free_rate: Rate,
    /// Annualisation factor for daily statistics.
    pub trading_days_per_year: u32,
    /// Trading days of price history requested from the provider.
    pub lookback_days: u32,
    /// Minimum share of non-missing closes a symbol needs to be kept.
    pub coverage_threshold: Rate,
    /// Symbols always added to the optimization universe.
    pub diversification_symbols: Vec<String>,
    /// Benchmark used for beta.
    pub market_index: String,
    /// Overlapping observations required before beta is estimated.
    pub min_beta_observations: usize,
    /// Weights below this are zeroed before renormalisation.
    pub weight_cutoff: Rate,
    /// Aggressive target return = multiplier * mean(expected returns).
    pub aggressive_return_multiplier: Decimal,
    /// |weight change| above which a recommendation is emitted.
    pub recommendation_threshold: Rate,
    /// |value change| / total value above which a trade is emitted.
    pub rebalance_trade_threshold: Rate,
    /// |value change| / total value above which a trade is HIGH priority.
    pub high_priority_threshold: Rate,
    /// Deviation reported to callers as the rebalancing trigger.
    pub rebalancing_threshold: Rate,
    /// Proportional transaction cost.
    pub transaction_cost_rate: Rate,
    /// |correlation| above which a pair is flagged.
    pub high_correlation_threshold: Decimal,
    /// Assumed correlation of every asset with a stress scenario.
    pub stress_correlation: Decimal,
    /// Seed for Monte Carlo draws.
    pub monte_carlo_seed: u64,
    /// Geometric (true) or arithmetic (false) annualisation of mean returns.
    pub compounding_returns: bool,
    pub cache: CacheConfig,
}

/// Settings for the per-symbol cache owned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime. `None` disables caching entirely.
    pub ttl_seconds: Option<u64>,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: None,
            max_entries: 64,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: dec!(0.02),
            trading_days_per_year: 252,
            lookback_days: 504,
            coverage_threshold: dec!(0.80),
            diversification_symbols: ["SPY", "QQQ", "VTI", "BND", "GLD", "VEA", "VWO"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            market_index: "SPY".into(),
            min_beta_observations: 30,
            weight_cutoff: dec!(0.01),
            aggressive_return_multiplier: dec!(1.2),
            recommendation_threshold: dec!(0.05),
            rebalance_trade_threshold: dec!(0.01),
            high_priority_threshold: dec!(0.05),
            rebalancing_threshold: dec!(0.05),
            transaction_cost_rate: dec!(0.001),
            high_correlation_threshold: dec!(0.7),
            stress_correlation: dec!(0.8),
            monte_carlo_seed: 42,
            compounding_returns: true,
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject settings that would make downstream math meaningless.
    pub fn validate(&self) -> PortfolioResult<()> {
        if self.trading_days_per_year == 0 {
            return Err(invalid("trading_days_per_year", "Must be positive"));
        }
        if self.lookback_days < 2 {
            return Err(invalid("lookback_days", "At least 2 days are required"));
        }
        if self.coverage_threshold < Decimal::ZERO || self.coverage_threshold > Decimal::ONE {
            return Err(invalid("coverage_threshold", "Must be between 0 and 1"));
        }
        if self.weight_cutoff < Decimal::ZERO || self.weight_cutoff >= Decimal::ONE {
            return Err(invalid("weight_cutoff", "Must be in [0, 1)"));
        }
        for (field, value) in [
            ("recommendation_threshold", self.recommendation_threshold),
            ("rebalance_trade_threshold", self.rebalance_trade_threshold),
            ("high_priority_threshold", self.high_priority_threshold),
            ("rebalancing_threshold", self.rebalancing_threshold),
            ("transaction_cost_rate", self.transaction_cost_rate),
        ] {
            if value < Decimal::ZERO {
                return Err(invalid(field, "Must be non-negative"));
            }
        }
        if self.high_correlation_threshold < Decimal::ZERO
            || self.high_correlation_threshold > Decimal::ONE
        {
            return Err(invalid("high_correlation_threshold", "Must be between 0 and 1"));
        }
        if self.market_index.trim().is_empty() {
            return Err(invalid("market_index", "Benchmark symbol required"));
        }
        if self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries", "Must be positive"));
        }
        Ok(())
    }

    pub fn annualization(&self) -> Decimal {
        Decimal::from(self.trading_days_per_year)
    }
}

fn invalid(field: &str, reason: &str) -> PortfolioError {
    PortfolioError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.risk_free_rate, dec!(0.02));
        assert_eq!(cfg.diversification_symbols.len(), 7);
        assert_eq!(cfg.annualization(), dec!(252));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"risk_free_rate": "0.03", "cache": {"ttl_seconds": 60}}"#)
                .unwrap();
        assert_eq!(cfg.risk_free_rate, dec!(0.03));
        assert_eq!(cfg.market_index, "SPY");
        assert_eq!(cfg.cache.ttl_seconds, Some(60));
        assert_eq!(cfg.cache.max_entries, 64);
    }

    #[test]
    fn test_invalid_coverage_rejected() {
        let cfg = EngineConfig {
            coverage_threshold: dec!(1.5),
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_annualization_rejected() {
        let cfg = EngineConfig {
            trading_days_per_year: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
