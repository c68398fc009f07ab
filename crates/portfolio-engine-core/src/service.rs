use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::SymbolCache;
use crate::config::EngineConfig;
use crate::error::PortfolioError;
use crate::market_data::{Lookback, PriceHistoryProvider};
use crate::optimization::{
    generate_recommendations, optimize_allocation, plan_rebalancing, EfficientFrontier,
    FrontierSweep, OptimizationMethod, PositionRecommendation, RebalancingPlan,
};
use crate::risk::{assess_portfolio_risk, empty_report, BenchmarkReturns, RiskReport};
use crate::statistics::{align_returns, estimate, ReturnSeries};
use crate::stress::{default_scenarios, run_scenarios, StressScenario, StressTestResult};
use crate::types::{
    portfolio_weights, total_value, with_metadata, ComputationOutput, Holding, Rate,
    RiskTolerance,
};
use crate::PortfolioResult;

#[cfg(feature = "monte_carlo")]
use crate::monte_carlo::{simulate_portfolio_paths, MonteCarloOutput, PathCompounding, SimulationParameters};
#[cfg(feature = "monte_carlo")]
use crate::statistics::annualize;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// Investment horizon in years. Echoed back, not used by the optimizer.
    #[serde(default = "default_time_horizon_years")]
    pub time_horizon: u32,
    /// Annual return to target. Only honoured for aggressive tolerance.
    #[serde(default)]
    pub target_return: Option<Rate>,
}

fn default_time_horizon_years() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Cleaned weights over the optimized universe.
    pub weights: BTreeMap<String, Decimal>,
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub recommendations: Vec<PositionRecommendation>,
    pub rebalancing: RebalancingPlan,
    pub risk_tolerance: RiskTolerance,
    pub time_horizon: u32,
    pub method: OptimizationMethod,
    /// Symbols dropped before optimization for thin price history.
    pub excluded_symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestRequest {
    pub holdings: Vec<Holding>,
    /// Replaces the three default scenarios when present.
    #[serde(default)]
    pub scenarios: Option<Vec<StressScenario>>,
}

#[cfg(feature = "monte_carlo")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub symbols: Vec<String>,
    pub initial_value: f64,
    #[serde(default = "crate::monte_carlo::simulation::default_num_simulations")]
    pub num_simulations: u32,
    #[serde(default = "crate::monte_carlo::simulation::default_time_horizon")]
    pub time_horizon: u32,
    /// Overrides `EngineConfig::monte_carlo_seed`.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Compound each path with its own equal-weighted asset mean instead of
    /// the step mean pooled over all simulations.
    #[serde(default)]
    pub per_path: bool,
    /// Compound each path with these weights. Symbols missing here get zero
    /// weight. Takes precedence over `per_path`.
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierRequest {
    pub symbols: Vec<String>,
    #[serde(default = "default_frontier_points")]
    pub num_points: usize,
}

fn default_frontier_points() -> usize {
    20
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Entry point tying a price source to the analytics.
///
/// Every call is independent: the only state carried between requests is
/// the optional market-index cache, enabled through `config.cache`.
pub struct PortfolioService<P: PriceHistoryProvider> {
    provider: P,
    config: EngineConfig,
    benchmark_cache: Option<Mutex<SymbolCache<BenchmarkReturns>>>,
}

impl<P: PriceHistoryProvider> PortfolioService<P> {
    pub fn new(provider: P, config: EngineConfig) -> PortfolioResult<Self> {
        config.validate()?;
        let benchmark_cache = SymbolCache::from_config(&config.cache).map(Mutex::new);
        Ok(Self {
            provider,
            config,
            benchmark_cache,
        })
    }

    pub fn with_default_config(provider: P) -> Self {
        Self {
            provider,
            config: EngineConfig::default(),
            benchmark_cache: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Optimal weights over holdings plus the diversification set, with
    /// position recommendations and a rebalancing plan against `holdings`.
    pub fn optimize_portfolio(
        &self,
        request: &OptimizationRequest,
    ) -> PortfolioResult<ComputationOutput<OptimizationResult>> {
        let start = Instant::now();
        validate_holdings(&request.holdings)?;

        let universe: Vec<String> = request
            .holdings
            .iter()
            .map(|h| h.symbol.clone())
            .chain(self.config.diversification_symbols.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!(
            symbols = universe.len(),
            risk_tolerance = %request.risk_tolerance,
            "optimizing portfolio"
        );

        let returns = self.load_returns(&universe)?;
        let stats = estimate(
            &returns,
            self.config.annualization(),
            self.config.compounding_returns,
        )
        .map_err(|e| match e {
            PortfolioError::DataInsufficient(msg) => PortfolioError::OptimizationInfeasible(msg),
            other => other,
        })?;

        let allocation = optimize_allocation(
            &stats,
            request.risk_tolerance,
            request.target_return,
            &self.config,
        )?;
        let mut warnings = allocation.warnings;
        if !returns.excluded.is_empty() {
            warnings.push(format!(
                "Excluded for insufficient price history: {}",
                returns.excluded.join(", ")
            ));
        }
        let allocation = allocation.result;

        let recommendations =
            generate_recommendations(&request.holdings, &allocation.weights, &self.config);
        let rebalancing = plan_rebalancing(&request.holdings, &allocation.weights, &self.config);

        let result = OptimizationResult {
            weights: allocation.weights,
            expected_return: allocation.performance.expected_return,
            volatility: allocation.performance.volatility,
            sharpe_ratio: allocation.performance.sharpe_ratio,
            recommendations,
            rebalancing,
            risk_tolerance: request.risk_tolerance,
            time_horizon: request.time_horizon,
            method: allocation.method,
            excluded_symbols: returns.excluded,
        };

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Modern Portfolio Theory optimization with rebalancing plan",
            &serde_json::json!({
                "universe": universe,
                "lookback_days": self.config.lookback_days,
                "observations": stats.observations,
                "compounding_returns": self.config.compounding_returns,
                "risk_free_rate": self.config.risk_free_rate.to_string(),
            }),
            warnings,
            elapsed,
            result,
        ))
    }

    /// Risk report for `holdings`. Missing holdings or price data yield the
    /// neutral empty report rather than an error.
    pub fn assess_risk(&self, holdings: &[Holding]) -> PortfolioResult<ComputationOutput<RiskReport>> {
        let start = Instant::now();
        validate_holdings(holdings)?;

        if holdings.is_empty() || total_value(holdings) <= Decimal::ZERO {
            info!("no holdings to assess, returning empty risk report");
            return Ok(self.empty_risk_output(start, "No holdings supplied"));
        }

        let symbols: Vec<String> = holdings
            .iter()
            .map(|h| h.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let returns = match self.load_returns(&symbols) {
            Ok(r) => r,
            Err(e) => {
                info!(error = %e, "no usable market data, returning empty risk report");
                return Ok(self.empty_risk_output(start, &e.to_string()));
            }
        };

        let benchmark = self.benchmark_returns();
        assess_portfolio_risk(&returns, holdings, benchmark.as_ref(), &self.config)
    }

    /// The three default scenarios applied to `holdings`.
    pub fn run_stress_tests(
        &self,
        holdings: &[Holding],
    ) -> PortfolioResult<ComputationOutput<BTreeMap<String, StressTestResult>>> {
        self.run_custom_stress_tests(holdings, &default_scenarios())
    }

    pub fn run_custom_stress_tests(
        &self,
        holdings: &[Holding],
        scenarios: &[StressScenario],
    ) -> PortfolioResult<ComputationOutput<BTreeMap<String, StressTestResult>>> {
        let start = Instant::now();
        validate_holdings(holdings)?;

        let mut warnings = Vec::new();
        let weights = portfolio_weights(holdings);
        if weights.is_empty() {
            warnings.push("Portfolio has no value; all impacts are zero".to_string());
        }
        let results = run_scenarios(
            &weights,
            total_value(holdings),
            scenarios,
            self.config.stress_correlation,
        )?;

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Uniform scenario shocks scaled by assumed correlation",
            &serde_json::json!({
                "scenarios": scenarios.len(),
                "correlation": self.config.stress_correlation.to_string(),
            }),
            warnings,
            elapsed,
            results,
        ))
    }

    /// Forward-simulate portfolio value over `request.time_horizon` days.
    #[cfg(feature = "monte_carlo")]
    pub fn run_monte_carlo(
        &self,
        request: &MonteCarloRequest,
    ) -> PortfolioResult<ComputationOutput<MonteCarloOutput>> {
        if request.symbols.is_empty() {
            return Err(PortfolioError::InvalidInput {
                field: "symbols".into(),
                reason: "At least one symbol is required".into(),
            });
        }
        let symbols: Vec<String> = request
            .symbols
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let returns = self.load_returns(&symbols)?;
        let stats = annualize(
            &returns,
            self.config.annualization(),
            self.config.compounding_returns,
        )?;

        let compounding = match &request.weights {
            None if request.per_path => PathCompounding::PathMean,
            None => PathCompounding::CrossSectionalMean,
            Some(weights) => PathCompounding::Weighted(
                stats
                    .symbols
                    .iter()
                    .map(|s| weights.get(s).copied().unwrap_or(0.0))
                    .collect(),
            ),
        };
        let params = SimulationParameters {
            initial_value: request.initial_value,
            num_simulations: request.num_simulations,
            time_horizon: request.time_horizon,
            seed: request.seed.unwrap_or(self.config.monte_carlo_seed),
            compounding,
        };
        info!(
            symbols = stats.len(),
            simulations = params.num_simulations,
            horizon = params.time_horizon,
            "running monte carlo simulation"
        );

        let mut output = simulate_portfolio_paths(&stats, &params)?;
        if !returns.excluded.is_empty() {
            output.warnings.push(format!(
                "Excluded for insufficient price history: {}",
                returns.excluded.join(", ")
            ));
        }
        Ok(output)
    }

    /// Evenly spaced efficient portfolios for `symbols`, plus the
    /// max-Sharpe and min-volatility anchors.
    pub fn efficient_frontier(
        &self,
        symbols: &[String],
        num_points: usize,
    ) -> PortfolioResult<ComputationOutput<FrontierSweep>> {
        let start = Instant::now();
        let symbols: Vec<String> = symbols
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let returns = self.load_returns(&symbols)?;
        let stats = estimate(
            &returns,
            self.config.annualization(),
            self.config.compounding_returns,
        )
        .map_err(|e| match e {
            PortfolioError::DataInsufficient(msg) => PortfolioError::OptimizationInfeasible(msg),
            other => other,
        })?;
        let frontier = EfficientFrontier::new(&stats, self.config.risk_free_rate)?;
        let sweep = frontier.sweep(num_points)?;

        let mut warnings = Vec::new();
        if sweep.max_sharpe.is_none() {
            warnings.push(format!(
                "No asset returns more than the risk-free rate {}",
                self.config.risk_free_rate
            ));
        }

        let elapsed = start.elapsed().as_micros() as u64;
        Ok(with_metadata(
            "Efficient frontier by target-return sweep (active-set QP)",
            &serde_json::json!({
                "symbols": stats.symbols,
                "num_points": num_points,
                "observations": stats.observations,
            }),
            warnings,
            elapsed,
            sweep,
        ))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lookback(&self) -> Lookback {
        Lookback::days(self.config.lookback_days)
    }

    /// One provider call, then coverage filtering and alignment.
    fn load_returns(&self, symbols: &[String]) -> PortfolioResult<ReturnSeries> {
        let table = self.provider.fetch(symbols, self.lookback())?;
        if table.is_empty() {
            return Err(PortfolioError::NoMarketData(format!(
                "Provider returned no prices for [{}]",
                symbols.join(", ")
            )));
        }
        let missing: Vec<&String> = symbols
            .iter()
            .filter(|s| !table.closes.contains_key(*s))
            .collect();
        if !missing.is_empty() {
            debug!(?missing, "provider has no history for some symbols");
        }
        align_returns(&table, self.config.coverage_threshold)
    }

    /// Market-index returns for beta, through the cache when enabled.
    /// Any failure degrades to `None` (beta then defaults to 1.0).
    fn benchmark_returns(&self) -> Option<BenchmarkReturns> {
        let index = &self.config.market_index;
        if let Some(cache) = &self.benchmark_cache {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(index) {
                return Some(hit);
            }
        }

        let fetched = self
            .load_returns(std::slice::from_ref(index))
            .map(|series| BenchmarkReturns::from_series(&series, index));
        let benchmark = match fetched {
            Ok(Some(b)) => b,
            Ok(None) => {
                warn!(index = %index, "market index excluded for insufficient history");
                return None;
            }
            Err(e) => {
                warn!(index = %index, error = %e, "market index unavailable");
                return None;
            }
        };

        if let Some(cache) = &self.benchmark_cache {
            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.insert(index.clone(), benchmark.clone());
        }
        Some(benchmark)
    }

    fn empty_risk_output(&self, start: Instant, reason: &str) -> ComputationOutput<RiskReport> {
        let elapsed = start.elapsed().as_micros() as u64;
        with_metadata(
            "Historical simulation risk metrics (VaR, ES, drawdown, beta, HHI)",
            &serde_json::json!({ "benchmark": self.config.market_index }),
            vec![reason.to_string()],
            elapsed,
            empty_report(),
        )
    }
}

fn validate_holdings(holdings: &[Holding]) -> PortfolioResult<()> {
    for h in holdings {
        if h.symbol.trim().is_empty() {
            return Err(PortfolioError::InvalidInput {
                field: "holdings.symbol".into(),
                reason: "Symbol must not be empty".into(),
            });
        }
        if h.market_value < Decimal::ZERO {
            return Err(PortfolioError::InvalidInput {
                field: "holdings.market_value".into(),
                reason: format!("Market value for {} must be non-negative", h.symbol),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
