use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::PortfolioError;
use crate::linalg::cholesky;
use crate::statistics::AnnualizedStatistics;
use crate::types::{with_metadata_f64, ComputationOutput};
use crate::PortfolioResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How one simulated step of asset returns becomes a portfolio return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "weights")]
pub enum PathCompounding {
    /// Mean of every asset return drawn at the step, pooled over all
    /// simulations. Every path receives the same growth factor.
    #[default]
    CrossSectionalMean,
    /// Equal-weighted mean of the path's own asset returns.
    PathMean,
    /// Fixed-weight average of the path's own asset returns, one weight per
    /// simulated symbol.
    Weighted(Vec<f64>),
}

impl PathCompounding {
    fn is_pooled(&self) -> bool {
        matches!(self, PathCompounding::CrossSectionalMean)
    }
}

/// Inputs that shape a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub initial_value: f64,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Number of steps, in trading days.
    #[serde(default = "default_time_horizon")]
    pub time_horizon: u32,
    pub seed: u64,
    #[serde(default)]
    pub compounding: PathCompounding,
}

pub(crate) fn default_num_simulations() -> u32 {
    1_000
}

pub(crate) fn default_time_horizon() -> u32 {
    252
}

/// Distribution of terminal portfolio values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
}

/// Echo of what was simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub initial_value: f64,
    pub num_simulations: u32,
    pub time_horizon: u32,
    pub symbols: Vec<String>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub distribution_stats: DistributionStats,
    /// One row per simulation, `time_horizon + 1` values each.
    pub paths: Vec<Vec<f64>>,
    pub parameters: SimulationSummary,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate portfolio value paths from the multivariate normal
/// N(μ, Σ) described by `stats`.
///
/// Each step draws one correlated return per asset and simulation as
/// `μ + L z`, where `L` is the Cholesky factor of Σ and `z` is standard
/// normal. Draws run step by step, then simulation, then asset. The
/// portfolio value is multiplied by `1 + r_p`, with `r_p` chosen by
/// `params.compounding`. Paths start at `initial_value`. The same seed
/// always yields the same paths.
pub fn simulate_portfolio_paths(
    stats: &AnnualizedStatistics,
    params: &SimulationParameters,
) -> PortfolioResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(stats, params)?;

    let n = stats.len();
    let mu: Vec<f64> = stats
        .expected_returns
        .iter()
        .map(|m| m.to_f64().unwrap_or(0.0))
        .collect();
    let factor = match cholesky(&stats.covariance) {
        Ok(l) => l
            .iter()
            .map(|row| row.iter().map(|v| v.to_f64().unwrap_or(0.0)).collect())
            .collect::<Vec<Vec<f64>>>(),
        Err(e) => {
            warn!(error = %e, "covariance not positive definite, simulating assets independently");
            warnings.push(
                "Covariance matrix is not positive definite; assets simulated independently"
                    .into(),
            );
            diagonal_factor(stats)
        }
    };
    let mix = step_weights(n, &params.compounding);

    let normal = Normal::new(0.0, 1.0).map_err(|e| PortfolioError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let steps = params.time_horizon as usize;
    let sims = params.num_simulations as usize;
    let mut paths: Vec<Vec<f64>> = (0..sims)
        .map(|_| {
            let mut path = Vec::with_capacity(steps + 1);
            path.push(params.initial_value);
            path
        })
        .collect();
    let mut z = vec![0.0; n];
    let mut step_returns = vec![0.0; sims];
    for t in 0..steps {
        for r in step_returns.iter_mut() {
            for zi in z.iter_mut() {
                *zi = rng.sample(normal);
            }
            *r = (0..n)
                .map(|i| {
                    let shock: f64 =
                        factor[i].iter().zip(&z).take(i + 1).map(|(l, z)| l * z).sum();
                    mix[i] * (mu[i] + shock)
                })
                .sum();
        }
        if params.compounding.is_pooled() {
            // equal asset weights, so the mean of per-simulation means is the
            // mean over the whole (simulation x asset) slice
            let pooled = step_returns.iter().sum::<f64>() / sims as f64;
            step_returns.iter_mut().for_each(|r| *r = pooled);
        }
        for (path, r) in paths.iter_mut().zip(&step_returns) {
            let value = path[t] * (1.0 + r);
            path.push(value);
        }
    }

    let finals: Vec<f64> = paths
        .iter()
        .map(|p| p.last().copied().unwrap_or(params.initial_value))
        .collect();
    let distribution_stats = distribution_stats(&finals);
    debug!(
        simulations = params.num_simulations,
        horizon = params.time_horizon,
        mean = distribution_stats.mean,
        "monte carlo simulation complete"
    );

    if distribution_stats.min <= 0.0 {
        warnings.push("Some simulated paths lose the entire portfolio value".into());
    }

    let output = MonteCarloOutput {
        distribution_stats,
        paths,
        parameters: SimulationSummary {
            initial_value: params.initial_value,
            num_simulations: params.num_simulations,
            time_horizon: params.time_horizon,
            symbols: stats.symbols.clone(),
            seed: params.seed,
        },
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Monte Carlo Portfolio Simulation (multivariate normal, Cholesky-correlated)",
        &serde_json::json!({
            "compounding": params.compounding,
            "step_distribution": "annualized mean and covariance applied per step",
            "seed": params.seed,
            "rng": "StdRng",
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate(stats: &AnnualizedStatistics, params: &SimulationParameters) -> PortfolioResult<()> {
    if stats.is_empty() {
        return Err(PortfolioError::DataInsufficient(
            "No symbols to simulate".into(),
        ));
    }
    if params.num_simulations == 0 {
        return Err(PortfolioError::InvalidInput {
            field: "num_simulations".into(),
            reason: "At least one simulation is required".into(),
        });
    }
    if !params.initial_value.is_finite() || params.initial_value <= 0.0 {
        return Err(PortfolioError::InvalidInput {
            field: "initial_value".into(),
            reason: "Initial value must be a positive number".into(),
        });
    }
    if let PathCompounding::Weighted(weights) = &params.compounding {
        if weights.len() != stats.len() {
            return Err(PortfolioError::InvalidInput {
                field: "compounding.weights".into(),
                reason: format!(
                    "Expected {} weights, got {}",
                    stats.len(),
                    weights.len()
                ),
            });
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PortfolioError::InvalidInput {
                field: "compounding.weights".into(),
                reason: "Weights must be finite and non-negative".into(),
            });
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(PortfolioError::InvalidInput {
                field: "compounding.weights".into(),
                reason: "Weights must not all be zero".into(),
            });
        }
    }
    Ok(())
}

/// Per-asset multipliers that turn a step's asset returns into `r_p`.
fn step_weights(n: usize, compounding: &PathCompounding) -> Vec<f64> {
    match compounding {
        PathCompounding::CrossSectionalMean | PathCompounding::PathMean => {
            vec![1.0 / n as f64; n]
        }
        PathCompounding::Weighted(weights) => {
            let total: f64 = weights.iter().sum();
            weights.iter().map(|w| w / total).collect()
        }
    }
}

/// Uncorrelated fallback: `L = diag(σᵢ)`.
fn diagonal_factor(stats: &AnnualizedStatistics) -> Vec<Vec<f64>> {
    let n = stats.len();
    let mut l = vec![vec![0.0; n]; n];
    for (i, row) in l.iter_mut().enumerate() {
        let var = stats.covariance[i][i].to_f64().unwrap_or(0.0);
        row[i] = var.max(0.0).sqrt();
    }
    l
}

fn distribution_stats(values: &[f64]) -> DistributionStats {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    DistributionStats {
        mean,
        median: percentile_sorted(&sorted, 50.0),
        std: variance.sqrt(),
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        percentile_5: percentile_sorted(&sorted, 5.0),
        percentile_25: percentile_sorted(&sorted, 25.0),
        percentile_75: percentile_sorted(&sorted, 75.0),
        percentile_95: percentile_sorted(&sorted, 95.0),
    }
}

/// Linear interpolation between closest ranks; `p` in 0-100.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = p / 100.0 * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = (lo + 1).min(len - 1);
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
