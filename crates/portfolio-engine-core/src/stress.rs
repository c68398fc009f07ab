use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PortfolioError;
use crate::types::{Money, Rate};
use crate::PortfolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A uniform shock applied to every position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub description: String,
    /// Scenario return as a decimal (-0.20 = 20% decline).
    pub scenario_return: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub description: String,
    /// Fraction of portfolio value gained (positive) or lost (negative).
    pub portfolio_impact: Rate,
    pub dollar_impact: Money,
}

impl StressScenario {
    pub fn new(name: &str, description: &str, scenario_return: Rate) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            scenario_return,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Market crash, interest-rate shock and volatility spike.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario::new("market_crash", "20% market decline", dec!(-0.20)),
        StressScenario::new("interest_rate_shock", "10% interest rate shock", dec!(-0.10)),
        StressScenario::new("volatility_spike", "15% volatility spike", dec!(-0.15)),
    ]
}

/// Impact of each scenario on a weighted portfolio.
///
/// `portfolio_impact = Σ scenario_return * weight * correlation`, with the
/// same assumed correlation for every position. Results are keyed by
/// scenario name.
pub fn run_scenarios(
    weights: &BTreeMap<String, Decimal>,
    total_value: Money,
    scenarios: &[StressScenario],
    correlation: Decimal,
) -> PortfolioResult<BTreeMap<String, StressTestResult>> {
    let mut results = BTreeMap::new();
    for scenario in scenarios {
        if scenario.name.trim().is_empty() {
            return Err(PortfolioError::InvalidInput {
                field: "scenarios.name".into(),
                reason: "Scenario name must not be empty".into(),
            });
        }
        let portfolio_impact: Decimal = weights
            .values()
            .map(|w| scenario.scenario_return * *w * correlation)
            .sum();
        results.insert(
            scenario.name.clone(),
            StressTestResult {
                description: scenario.description.clone(),
                portfolio_impact,
                dollar_impact: portfolio_impact * total_value,
            },
        );
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
        entries.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    #[test]
    fn test_default_scenarios() {
        let w = weights(&[("AAPL", dec!(0.6)), ("BND", dec!(0.4))]);
        let results = run_scenarios(&w, dec!(10000), &default_scenarios(), dec!(0.8)).unwrap();

        assert_eq!(results.len(), 3);
        let crash = &results["market_crash"];
        assert_eq!(crash.description, "20% market decline");
        assert_eq!(crash.portfolio_impact, dec!(-0.16));
        assert_eq!(crash.dollar_impact, dec!(-1600));
        assert_eq!(results["interest_rate_shock"].portfolio_impact, dec!(-0.08));
        assert_eq!(results["volatility_spike"].dollar_impact, dec!(-1200));
    }

    #[test]
    fn test_zero_scenario_has_no_impact() {
        let w = weights(&[("A", dec!(0.9)), ("B", dec!(0.07)), ("C", dec!(0.03))]);
        let flat = vec![StressScenario::new("flat", "no move", Decimal::ZERO)];
        let results = run_scenarios(&w, dec!(123456.78), &flat, dec!(0.8)).unwrap();
        assert_eq!(results["flat"].portfolio_impact, Decimal::ZERO);
        assert_eq!(results["flat"].dollar_impact, Decimal::ZERO);
    }

    #[test]
    fn test_custom_rally() {
        let w = weights(&[("A", dec!(1))]);
        let rally = vec![StressScenario::new("rally", "10% rally", dec!(0.10))];
        let results = run_scenarios(&w, dec!(1000), &rally, dec!(0.8)).unwrap();
        assert_eq!(results["rally"].dollar_impact, dec!(80));
    }

    #[test]
    fn test_unnamed_scenario_rejected() {
        let bad = vec![StressScenario::new(" ", "x", dec!(-0.1))];
        assert!(run_scenarios(&BTreeMap::new(), dec!(1), &bad, dec!(0.8)).is_err());
    }
}
