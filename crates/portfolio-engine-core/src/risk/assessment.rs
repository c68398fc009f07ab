use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::concentration::ConcentrationLevel;
use super::correlation::{analyze_correlations, CorrelationAnalysis};
use super::metrics::{
    asset_metrics, portfolio_metrics, AssetRiskMetrics, BenchmarkReturns, PortfolioRiskMetrics,
};
use crate::config::EngineConfig;
use crate::statistics::ReturnSeries;
use crate::stress::{default_scenarios, run_scenarios, StressTestResult};
use crate::types::{
    portfolio_weights, total_value, with_metadata, ComputationOutput, Holding, Rate,
};
use crate::PortfolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRating {
    Low,
    Medium,
    High,
    /// No holdings or no usable price data.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub overall_risk_rating: RiskRating,
    pub primary_risks: Vec<String>,
    /// 0-100, higher is riskier.
    pub risk_score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub individual_metrics: BTreeMap<String, AssetRiskMetrics>,
    pub portfolio_metrics: Option<PortfolioRiskMetrics>,
    pub correlation_analysis: Option<CorrelationAnalysis>,
    pub stress_tests: BTreeMap<String, StressTestResult>,
    pub risk_summary: RiskSummary,
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Full risk report for `holdings` over their aligned daily returns.
///
/// Weights cover every holding; symbols missing from `returns` still count
/// toward concentration but contribute no return or stress impact.
pub fn assess_portfolio_risk(
    returns: &ReturnSeries,
    holdings: &[Holding],
    benchmark: Option<&BenchmarkReturns>,
    config: &EngineConfig,
) -> PortfolioResult<ComputationOutput<RiskReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let total = total_value(holdings);
    let weights = portfolio_weights(holdings);

    let unpriced: Vec<&String> = weights.keys().filter(|s| returns.get(s).is_none()).collect();
    if !unpriced.is_empty() {
        warnings.push(format!(
            "No usable price history for: {}",
            unpriced
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if benchmark.is_none() {
        warnings.push(format!(
            "Benchmark {} unavailable; beta defaults to 1.0",
            config.market_index
        ));
    }

    let individual_metrics = asset_metrics(returns, &weights, benchmark, config);
    let portfolio = portfolio_metrics(returns, &weights, benchmark, config);
    let correlation = analyze_correlations(returns, config.high_correlation_threshold);

    let priced: BTreeMap<String, Decimal> = weights
        .iter()
        .filter(|(s, _)| returns.get(s).is_some())
        .map(|(s, w)| (s.clone(), *w))
        .collect();
    let stress_tests = run_scenarios(
        &priced,
        total,
        &default_scenarios(),
        config.stress_correlation,
    )?;

    let report = RiskReport {
        risk_summary: summarize(&portfolio),
        recommendations: risk_recommendations(&portfolio, &individual_metrics),
        individual_metrics,
        portfolio_metrics: Some(portfolio),
        correlation_analysis: Some(correlation),
        stress_tests,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical simulation risk metrics (VaR, ES, drawdown, beta, HHI)",
        &serde_json::json!({
            "observations": returns.len(),
            "periods_per_year": config.trading_days_per_year,
            "risk_free_rate": config.risk_free_rate.to_string(),
            "benchmark": config.market_index,
            "stress_correlation": config.stress_correlation.to_string(),
        }),
        warnings,
        elapsed,
        report,
    ))
}

/// Neutral report returned when there is nothing to measure.
pub fn empty_report() -> RiskReport {
    RiskReport {
        individual_metrics: BTreeMap::new(),
        portfolio_metrics: None,
        correlation_analysis: None,
        stress_tests: BTreeMap::new(),
        risk_summary: RiskSummary {
            overall_risk_rating: RiskRating::Unknown,
            primary_risks: vec!["No portfolio data available".into()],
            risk_score: 0,
        },
        recommendations: vec!["Please add holdings to calculate risk metrics".into()],
    }
}

pub fn summarize(portfolio: &PortfolioRiskMetrics) -> RiskSummary {
    let m = &portfolio.metrics;
    RiskSummary {
        overall_risk_rating: risk_rating(m.volatility, m.max_drawdown),
        primary_risks: primary_risks(portfolio),
        risk_score: risk_score(m.volatility, m.max_drawdown),
    }
}

/// LOW below 15% vol and 10% drawdown, MEDIUM below 25% and 20%, else HIGH.
pub fn risk_rating(volatility: Rate, max_drawdown: Rate) -> RiskRating {
    let dd = max_drawdown.abs();
    if volatility < dec!(0.15) && dd < dec!(0.10) {
        RiskRating::Low
    } else if volatility < dec!(0.25) && dd < dec!(0.20) {
        RiskRating::Medium
    } else {
        RiskRating::High
    }
}

/// 50 adjusted by volatility and drawdown bands, clamped to 0..=100.
pub fn risk_score(volatility: Rate, max_drawdown: Rate) -> u32 {
    let mut score: i32 = 50;

    if volatility > dec!(0.30) {
        score += 20;
    } else if volatility > dec!(0.20) {
        score += 10;
    } else if volatility < dec!(0.10) {
        score -= 10;
    }

    let dd = max_drawdown.abs();
    if dd > dec!(0.20) {
        score += 15;
    } else if dd > dec!(0.10) {
        score += 5;
    } else if dd < dec!(0.05) {
        score -= 5;
    }

    score.clamp(0, 100) as u32
}

pub fn primary_risks(portfolio: &PortfolioRiskMetrics) -> Vec<String> {
    let m = &portfolio.metrics;
    let mut risks = Vec::new();
    if m.volatility > dec!(0.20) {
        risks.push("High volatility".to_string());
    }
    if m.max_drawdown.abs() > dec!(0.15) {
        risks.push("Large potential losses".to_string());
    }
    if portfolio.concentration_risk.concentration_level == ConcentrationLevel::High {
        risks.push("High concentration risk".to_string());
    }
    if m.beta > dec!(1.2) {
        risks.push("High market sensitivity".to_string());
    }
    if risks.is_empty() {
        risks.push("Well-diversified portfolio".to_string());
    }
    risks
}

pub fn risk_recommendations(
    portfolio: &PortfolioRiskMetrics,
    individual: &BTreeMap<String, AssetRiskMetrics>,
) -> Vec<String> {
    let mut recs = Vec::new();
    let vol = portfolio.metrics.volatility;
    if vol > dec!(0.25) {
        recs.push(
            "Consider reducing portfolio volatility through diversification or defensive assets"
                .to_string(),
        );
    } else if vol < dec!(0.10) {
        recs.push(
            "Portfolio may be too conservative; consider adding growth assets".to_string(),
        );
    }

    if portfolio.concentration_risk.concentration_level == ConcentrationLevel::High {
        recs.push("Reduce concentration risk by diversifying across more positions".to_string());
    }

    for (symbol, asset) in individual {
        if asset.metrics.volatility > dec!(0.40) {
            recs.push(format!(
                "Consider reducing position in {symbol} due to high volatility"
            ));
        }
        if asset.weight > dec!(0.20) {
            recs.push(format!("Reduce overweight position in {symbol}"));
        }
    }

    if recs.is_empty() {
        recs.push("Portfolio risk profile appears well-balanced".to_string());
    }
    recs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::concentration::concentration_risk;
    use crate::risk::metrics::ReturnMetrics;
    use chrono::NaiveDate;

    fn metrics(volatility: Decimal, max_drawdown: Decimal, beta: Decimal) -> ReturnMetrics {
        ReturnMetrics {
            volatility,
            sharpe_ratio: Decimal::ZERO,
            var_95: dec!(-0.02),
            var_99: dec!(-0.03),
            expected_shortfall_95: dec!(-0.025),
            expected_shortfall_99: dec!(-0.035),
            max_drawdown,
            beta,
        }
    }

    fn portfolio(volatility: Decimal, max_drawdown: Decimal, weights: &[(&str, Decimal)]) -> PortfolioRiskMetrics {
        let w: BTreeMap<String, Decimal> = weights.iter().map(|(s, w)| (s.to_string(), *w)).collect();
        PortfolioRiskMetrics {
            metrics: metrics(volatility, max_drawdown, Decimal::ONE),
            concentration_risk: concentration_risk(&w),
        }
    }

    // ------------------------------------------------------------------
    // Rating boundaries
    // ------------------------------------------------------------------
    #[test]
    fn test_rating_boundaries() {
        assert_eq!(risk_rating(dec!(0.10), dec!(-0.05)), RiskRating::Low);
        assert_eq!(risk_rating(dec!(0.22), dec!(-0.18)), RiskRating::Medium);
        assert_eq!(risk_rating(dec!(0.35), dec!(-0.30)), RiskRating::High);
        // Exactly on a band edge moves up a band
        assert_eq!(risk_rating(dec!(0.15), dec!(-0.01)), RiskRating::Medium);
        assert_eq!(risk_rating(dec!(0.10), dec!(-0.20)), RiskRating::High);
    }

    #[test]
    fn test_risk_score_bands() {
        assert_eq!(risk_score(dec!(0.35), dec!(-0.30)), 85);
        assert_eq!(risk_score(dec!(0.22), dec!(-0.18)), 65);
        assert_eq!(risk_score(dec!(0.05), dec!(-0.01)), 35);
        assert_eq!(risk_score(dec!(0.15), dec!(-0.07)), 50);
    }

    #[test]
    fn test_primary_risks() {
        let calm = portfolio(dec!(0.12), dec!(-0.05), &[("A", dec!(0.25)), ("B", dec!(0.25)), ("C", dec!(0.25)), ("D", dec!(0.25))]);
        assert_eq!(primary_risks(&calm), vec!["Well-diversified portfolio"]);

        let mut wild = portfolio(dec!(0.30), dec!(-0.25), &[("A", dec!(1))]);
        wild.metrics.beta = dec!(1.5);
        assert_eq!(
            primary_risks(&wild),
            vec![
                "High volatility",
                "Large potential losses",
                "High concentration risk",
                "High market sensitivity"
            ]
        );
    }

    #[test]
    fn test_risk_recommendations() {
        let p = portfolio(dec!(0.30), dec!(-0.25), &[("A", dec!(0.9)), ("B", dec!(0.1))]);
        let mut individual = BTreeMap::new();
        individual.insert(
            "A".to_string(),
            AssetRiskMetrics {
                metrics: metrics(dec!(0.45), dec!(-0.3), Decimal::ONE),
                weight: dec!(0.9),
            },
        );
        let recs = risk_recommendations(&p, &individual);
        assert_eq!(recs.len(), 4);
        assert!(recs[0].starts_with("Consider reducing portfolio volatility"));
        assert_eq!(recs[2], "Consider reducing position in A due to high volatility");
        assert_eq!(recs[3], "Reduce overweight position in A");

        let balanced = portfolio(dec!(0.12), dec!(-0.05), &[("A", dec!(0.2)), ("B", dec!(0.2)), ("C", dec!(0.2)), ("D", dec!(0.2)), ("E", dec!(0.2))]);
        assert_eq!(
            risk_recommendations(&balanced, &BTreeMap::new()),
            vec!["Portfolio risk profile appears well-balanced"]
        );
    }

    #[test]
    fn test_empty_report() {
        let report = empty_report();
        assert_eq!(report.risk_summary.overall_risk_rating, RiskRating::Unknown);
        assert_eq!(report.risk_summary.risk_score, 0);
        assert_eq!(report.risk_summary.primary_risks, vec!["No portfolio data available"]);
        assert!(report.portfolio_metrics.is_none());
    }

    #[test]
    fn test_assess_partial_pricing() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let n = 40;
        let mut returns = BTreeMap::new();
        returns.insert(
            "A".to_string(),
            (0..n).map(|i| Decimal::new((i % 5) as i64 - 2, 2)).collect::<Vec<_>>(),
        );
        returns.insert(
            "B".to_string(),
            (0..n).map(|i| Decimal::new((i % 3) as i64 - 1, 2)).collect::<Vec<_>>(),
        );
        let series = ReturnSeries {
            dates: (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect(),
            returns,
            excluded: vec![],
        };
        let holdings = vec![
            Holding::new("A", dec!(5000)),
            Holding::new("B", dec!(3000)),
            Holding::new("ZZZ", dec!(2000)),
        ];
        let out = assess_portfolio_risk(&series, &holdings, None, &EngineConfig::default()).unwrap();
        let report = &out.result;

        assert_eq!(report.individual_metrics.len(), 2);
        assert_eq!(report.individual_metrics["A"].weight, dec!(0.5));
        let conc = &report.portfolio_metrics.as_ref().unwrap().concentration_risk;
        assert_eq!(conc.num_positions, 3);
        // ZZZ carries 20% of value but has no prices: only 80% is stressed
        assert_eq!(report.stress_tests["market_crash"].portfolio_impact, dec!(-0.128));
        assert!(out.warnings.iter().any(|w| w.contains("ZZZ")));
        assert_ne!(report.risk_summary.overall_risk_rating, RiskRating::Unknown);
    }
}
