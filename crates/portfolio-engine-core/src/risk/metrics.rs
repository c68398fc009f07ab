use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::concentration::{concentration_risk, ConcentrationRisk};
use crate::config::EngineConfig;
use crate::linalg::sqrt_decimal;
use crate::statistics::{
    intersect_by_date, mean, percentile, sample_covariance, sample_std, sample_variance,
    ReturnSeries,
};
use crate::types::Rate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Daily returns of the market index used for beta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReturns {
    pub symbol: String,
    pub dates: Vec<NaiveDate>,
    pub returns: Vec<Decimal>,
}

impl BenchmarkReturns {
    /// Pull `symbol` out of an aligned return series.
    pub fn from_series(series: &ReturnSeries, symbol: &str) -> Option<Self> {
        series.get(symbol).map(|returns| Self {
            symbol: symbol.to_string(),
            dates: series.dates.clone(),
            returns: returns.to_vec(),
        })
    }
}

/// Metrics shared by single assets and the whole portfolio. VaR, expected
/// shortfall and drawdown are daily-return fractions (negative = loss).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    pub volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub var_95: Rate,
    pub var_99: Rate,
    pub expected_shortfall_95: Rate,
    pub expected_shortfall_99: Rate,
    pub max_drawdown: Rate,
    pub beta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRiskMetrics {
    #[serde(flatten)]
    pub metrics: ReturnMetrics,
    /// Share of total market value.
    pub weight: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRiskMetrics {
    #[serde(flatten)]
    pub metrics: ReturnMetrics,
    pub concentration_risk: ConcentrationRisk,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Metrics for every held symbol that has return data.
///
/// Sharpe ratios here do not subtract the risk-free rate.
pub fn asset_metrics(
    returns: &ReturnSeries,
    weights: &BTreeMap<String, Decimal>,
    benchmark: Option<&BenchmarkReturns>,
    config: &EngineConfig,
) -> BTreeMap<String, AssetRiskMetrics> {
    weights
        .iter()
        .filter_map(|(symbol, weight)| {
            let series = returns.get(symbol)?;
            let metrics = return_metrics(&returns.dates, series, Decimal::ZERO, benchmark, config);
            Some((
                symbol.clone(),
                AssetRiskMetrics {
                    metrics,
                    weight: *weight,
                },
            ))
        })
        .collect()
}

/// Metrics of the constant-weight portfolio, Sharpe net of the risk-free rate.
pub fn portfolio_metrics(
    returns: &ReturnSeries,
    weights: &BTreeMap<String, Decimal>,
    benchmark: Option<&BenchmarkReturns>,
    config: &EngineConfig,
) -> PortfolioRiskMetrics {
    let series = portfolio_returns(returns, weights);
    PortfolioRiskMetrics {
        metrics: return_metrics(
            &returns.dates,
            &series,
            config.risk_free_rate,
            benchmark,
            config,
        ),
        concentration_risk: concentration_risk(weights),
    }
}

/// Daily `Σ wᵢ rᵢ` with weights held fixed. Symbols without returns contribute nothing.
pub fn portfolio_returns(returns: &ReturnSeries, weights: &BTreeMap<String, Decimal>) -> Vec<Decimal> {
    let mut out = vec![Decimal::ZERO; returns.len()];
    for (symbol, weight) in weights {
        if let Some(series) = returns.get(symbol) {
            for (acc, r) in out.iter_mut().zip(series.iter()) {
                *acc += *weight * *r;
            }
        }
    }
    out
}

pub fn return_metrics(
    dates: &[NaiveDate],
    returns: &[Decimal],
    risk_free_rate: Rate,
    benchmark: Option<&BenchmarkReturns>,
    config: &EngineConfig,
) -> ReturnMetrics {
    let periods = config.annualization();
    let volatility = annualized_volatility(returns, periods);
    let sharpe_ratio = if volatility.is_zero() {
        Decimal::ZERO
    } else {
        (mean(returns) * periods - risk_free_rate) / volatility
    };

    let var_95 = historical_var(returns, dec!(5));
    let var_99 = historical_var(returns, dec!(1));

    ReturnMetrics {
        volatility,
        sharpe_ratio,
        var_95,
        var_99,
        expected_shortfall_95: expected_shortfall(returns, var_95),
        expected_shortfall_99: expected_shortfall(returns, var_99),
        max_drawdown: max_drawdown(returns),
        beta: beta(dates, returns, benchmark, config.min_beta_observations),
    }
}

pub fn annualized_volatility(returns: &[Decimal], periods_per_year: Decimal) -> Rate {
    sample_std(returns) * sqrt_decimal(periods_per_year)
}

/// Historical VaR: the `percentile`-th percentile of returns. Zero when empty.
pub fn historical_var(returns: &[Decimal], percentile_rank: Decimal) -> Rate {
    percentile(returns, percentile_rank).unwrap_or(Decimal::ZERO)
}

/// Mean of the returns at or below `var`.
pub fn expected_shortfall(returns: &[Decimal], var: Rate) -> Rate {
    let tail: Vec<Decimal> = returns.iter().copied().filter(|r| *r <= var).collect();
    if tail.is_empty() {
        var
    } else {
        mean(&tail)
    }
}

/// Worst peak-to-trough decline of cumulative growth, as a non-positive fraction.
pub fn max_drawdown(returns: &[Decimal]) -> Rate {
    let mut cumulative = Decimal::ONE;
    let mut peak: Option<Decimal> = None;
    let mut worst = Decimal::ZERO;

    for r in returns {
        cumulative *= Decimal::ONE + *r;
        let running_max = peak.map_or(cumulative, |p| p.max(cumulative));
        peak = Some(running_max);
        if running_max > Decimal::ZERO {
            worst = worst.min(cumulative / running_max - Decimal::ONE);
        }
    }
    worst
}

/// `cov(r, m) / var(m)` on the dates shared with the benchmark.
///
/// Defaults to 1.0 without a benchmark, with fewer than
/// `min_observations` overlapping days, or when the benchmark is flat.
pub fn beta(
    dates: &[NaiveDate],
    returns: &[Decimal],
    benchmark: Option<&BenchmarkReturns>,
    min_observations: usize,
) -> Decimal {
    let Some(benchmark) = benchmark else {
        debug!("no benchmark series, beta defaults to 1");
        return Decimal::ONE;
    };
    let (asset, market) = intersect_by_date(dates, returns, &benchmark.dates, &benchmark.returns);
    if asset.len() < min_observations {
        debug!(
            overlap = asset.len(),
            required = min_observations,
            "insufficient overlap with benchmark, beta defaults to 1"
        );
        return Decimal::ONE;
    }
    // sample covariance over population variance of the market
    let n = Decimal::from(market.len() as u64);
    let market_variance = sample_variance(&market) * (n - Decimal::ONE) / n;
    if market_variance.is_zero() {
        return Decimal::ONE;
    }
    sample_covariance(&asset, &market) / market_variance
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
