use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};

use super::qp::QuadraticProgram;
use crate::config::EngineConfig;
use crate::error::PortfolioError;
use crate::linalg::{cholesky, dot, quad_form, sqrt_decimal};
use crate::statistics::{mean, AnnualizedStatistics};
use crate::types::{with_metadata, ComputationOutput, Rate, RiskTolerance};
use crate::PortfolioResult;

/// Off-diagonal pairs may differ by this much and still count as symmetric.
const SYMMETRY_TOLERANCE: Decimal = dec!(0.0000001);
/// Slack when comparing a target return against achievable returns.
const RETURN_TOLERANCE: Decimal = dec!(0.000000000001);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Objective actually used to produce a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    MaxSharpe,
    EfficientReturn,
    /// Target return was unreachable; the max-Sharpe portfolio was used instead.
    MaxSharpeFallback,
}

/// Result of a single frontier solve.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontierOutcome {
    Optimal(Vec<Decimal>),
    FallbackUsed { weights: Vec<Decimal>, reason: String },
    Infeasible(String),
}

impl FrontierOutcome {
    pub fn weights(&self) -> Option<&[Decimal]> {
        match self {
            FrontierOutcome::Optimal(w) => Some(w),
            FrontierOutcome::FallbackUsed { weights, .. } => Some(weights),
            FrontierOutcome::Infeasible(_) => None,
        }
    }

    /// Weights, or `OptimizationInfeasible` carrying the reason.
    pub fn into_weights(self) -> PortfolioResult<Vec<Decimal>> {
        match self {
            FrontierOutcome::Optimal(w) => Ok(w),
            FrontierOutcome::FallbackUsed { weights, .. } => Ok(weights),
            FrontierOutcome::Infeasible(reason) => {
                Err(PortfolioError::OptimizationInfeasible(reason))
            }
        }
    }
}

/// Expected return, volatility and Sharpe ratio of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPerformance {
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: Decimal,
}

/// Optimizer output handed to recommendation and rebalancing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedAllocation {
    pub symbols: Vec<String>,
    /// Solver weights, indexed like `symbols`.
    pub raw_weights: Vec<Decimal>,
    /// Weights after the cutoff and renormalisation.
    pub weights: BTreeMap<String, Decimal>,
    /// Evaluated on the raw weights.
    pub performance: PortfolioPerformance,
    pub method: OptimizationMethod,
    pub target_return: Option<Rate>,
    pub fallback_reason: Option<String>,
}

/// A solved point on the frontier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierPoint {
    pub expected_return: Rate,
    pub volatility: Rate,
    pub sharpe_ratio: Decimal,
    pub weights: BTreeMap<String, Decimal>,
}

/// Evenly spaced efficient portfolios plus the two anchor portfolios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSweep {
    pub points: Vec<FrontierPoint>,
    pub max_sharpe: Option<FrontierPoint>,
    pub min_volatility: FrontierPoint,
}

/// Long-only, fully invested mean-variance optimizer over annualized statistics.
#[derive(Debug, Clone)]
pub struct EfficientFrontier<'a> {
    stats: &'a AnnualizedStatistics,
    risk_free_rate: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Optimize for `tolerance`, clean the weights and evaluate the result.
///
/// Conservative and moderate maximise the Sharpe ratio. Aggressive targets
/// `target_return`, defaulting to `aggressive_return_multiplier * mean(μ)`,
/// and falls back to max-Sharpe when that target is out of reach.
pub fn optimize_allocation(
    stats: &AnnualizedStatistics,
    tolerance: RiskTolerance,
    target_return: Option<Rate>,
    config: &EngineConfig,
) -> PortfolioResult<ComputationOutput<OptimizedAllocation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let frontier = EfficientFrontier::new(stats, config.risk_free_rate)?;

    let (outcome, method, target) = match tolerance {
        RiskTolerance::Conservative | RiskTolerance::Moderate => {
            (frontier.max_sharpe(), OptimizationMethod::MaxSharpe, None)
        }
        RiskTolerance::Aggressive => {
            let target = target_return.unwrap_or_else(|| {
                config.aggressive_return_multiplier * mean(&stats.expected_returns)
            });
            match frontier.efficient_return(target) {
                FrontierOutcome::Infeasible(reason) => {
                    warn!(target_return = %target, %reason, "target return unreachable, using max Sharpe");
                    let fallback = match frontier.max_sharpe() {
                        FrontierOutcome::Optimal(weights) => {
                            FrontierOutcome::FallbackUsed { weights, reason }
                        }
                        other => other,
                    };
                    (fallback, OptimizationMethod::MaxSharpeFallback, Some(target))
                }
                ok => (ok, OptimizationMethod::EfficientReturn, Some(target)),
            }
        }
    };

    let fallback_reason = match &outcome {
        FrontierOutcome::FallbackUsed { reason, .. } => {
            warnings.push(format!("Target return not achievable: {reason}"));
            Some(reason.clone())
        }
        _ => None,
    };
    let raw_weights = outcome.into_weights()?;
    let performance = frontier.performance(&raw_weights);
    let weights = clean_weights(&stats.symbols, &raw_weights, config.weight_cutoff);

    let max_weight = weights.values().copied().max().unwrap_or(Decimal::ZERO);
    if max_weight > dec!(0.40) {
        warnings.push(format!("Concentrated allocation: max weight {max_weight:.4}"));
    }
    if performance.volatility > dec!(0.30) {
        warnings.push(format!(
            "High portfolio volatility: {:.4}",
            performance.volatility
        ));
    }

    debug!(
        method = ?method,
        expected_return = %performance.expected_return,
        volatility = %performance.volatility,
        "optimization complete"
    );

    let output = OptimizedAllocation {
        symbols: stats.symbols.clone(),
        raw_weights,
        weights,
        performance,
        method,
        target_return: target,
        fallback_reason,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Long-only mean-variance optimization (active-set QP)",
        &serde_json::json!({
            "n_assets": stats.len(),
            "observations": stats.observations,
            "risk_free_rate": config.risk_free_rate.to_string(),
            "risk_tolerance": tolerance.to_string(),
            "weight_cutoff": config.weight_cutoff.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Zero weights below `cutoff` and renormalise the rest to sum to one.
///
/// Every symbol keeps an entry; dropped ones map to zero. If nothing
/// survives the cutoff the input weights are returned unchanged.
pub fn clean_weights(
    symbols: &[String],
    weights: &[Decimal],
    cutoff: Rate,
) -> BTreeMap<String, Decimal> {
    let kept: Vec<Decimal> = weights
        .iter()
        .map(|w| if *w < cutoff { Decimal::ZERO } else { *w })
        .collect();
    let total: Decimal = kept.iter().sum();

    symbols
        .iter()
        .zip(weights.iter().zip(kept.iter()))
        .map(|(s, (raw, k))| {
            let w = if total.is_zero() { *raw } else { *k / total };
            (s.clone(), w)
        })
        .collect()
}

impl<'a> EfficientFrontier<'a> {
    /// Validate the statistics: at least two assets, matching dimensions,
    /// and a symmetric positive definite covariance matrix.
    pub fn new(stats: &'a AnnualizedStatistics, risk_free_rate: Rate) -> PortfolioResult<Self> {
        let n = stats.len();
        if n < 2 {
            return Err(PortfolioError::OptimizationInfeasible(format!(
                "At least 2 assets required, got {n}"
            )));
        }
        if stats.expected_returns.len() != n {
            return Err(PortfolioError::InvalidInput {
                field: "expected_returns".into(),
                reason: format!(
                    "Expected {} returns but got {}",
                    n,
                    stats.expected_returns.len()
                ),
            });
        }
        if stats.covariance.len() != n || stats.covariance.iter().any(|row| row.len() != n) {
            return Err(PortfolioError::InvalidInput {
                field: "covariance".into(),
                reason: format!("Expected {n}x{n} matrix"),
            });
        }
        let sigma = &stats.covariance;
        for i in 0..n {
            for j in (i + 1)..n {
                if (sigma[i][j] - sigma[j][i]).abs() > SYMMETRY_TOLERANCE {
                    return Err(PortfolioError::OptimizationInfeasible(format!(
                        "Covariance not symmetric at [{i},{j}]"
                    )));
                }
            }
        }
        cholesky(sigma).map_err(|e| {
            PortfolioError::OptimizationInfeasible(format!("Covariance unusable: {e}"))
        })?;

        Ok(Self {
            stats,
            risk_free_rate,
        })
    }

    fn n(&self) -> usize {
        self.stats.len()
    }

    fn mu(&self) -> &[Decimal] {
        &self.stats.expected_returns
    }

    /// Maximise `(wᵀμ - rf) / √(wᵀΣw)`.
    ///
    /// Solved as `min yᵀΣy s.t. (μ - rf)ᵀy = 1, y ≥ 0` and rescaled with
    /// `w = y / Σy`. Needs at least one asset returning more than `rf`.
    pub fn max_sharpe(&self) -> FrontierOutcome {
        let excess: Vec<Decimal> = self.mu().iter().map(|m| *m - self.risk_free_rate).collect();
        let Some((best, best_excess)) = argmax(&excess) else {
            return FrontierOutcome::Infeasible("No assets".into());
        };
        if best_excess <= Decimal::ZERO {
            return FrontierOutcome::Infeasible(format!(
                "No asset has an expected return above the risk-free rate {}",
                self.risk_free_rate
            ));
        }

        let mut start = vec![Decimal::ZERO; self.n()];
        start[best] = Decimal::ONE / best_excess;

        let qp = QuadraticProgram::new(self.stats.covariance.clone(), vec![excess], vec![Decimal::ONE]);
        match qp.solve(start) {
            Ok(sol) => normalized(sol.x),
            Err(e) => FrontierOutcome::Infeasible(e.to_string()),
        }
    }

    /// Global minimum-variance long-only portfolio.
    pub fn min_volatility(&self) -> FrontierOutcome {
        let n = self.n();
        let start = vec![Decimal::ONE / Decimal::from(n as u64); n];
        let qp = QuadraticProgram::new(
            self.stats.covariance.clone(),
            vec![vec![Decimal::ONE; n]],
            vec![Decimal::ONE],
        );
        match qp.solve(start) {
            Ok(sol) => normalized(sol.x),
            Err(e) => FrontierOutcome::Infeasible(e.to_string()),
        }
    }

    /// Minimum-variance portfolio with expected return of at least `target`.
    pub fn efficient_return(&self, target: Rate) -> FrontierOutcome {
        let mu = self.mu();
        let (Some((hi, max_ret)), Some((lo, min_ret))) = (argmax(mu), argmin(mu)) else {
            return FrontierOutcome::Infeasible("No assets".into());
        };
        if target > max_ret + RETURN_TOLERANCE {
            return FrontierOutcome::Infeasible(format!(
                "Target return {target} exceeds the maximum achievable {max_ret}"
            ));
        }

        let min_vol = match self.min_volatility() {
            FrontierOutcome::Optimal(w) => w,
            other => return other,
        };
        if dot(&min_vol, mu) >= target - RETURN_TOLERANCE {
            return FrontierOutcome::Optimal(min_vol);
        }

        if max_ret - target <= RETURN_TOLERANCE {
            // Only the top-returning assets reach the target; take the least volatile.
            let corner = (0..self.n())
                .filter(|&i| max_ret - mu[i] <= RETURN_TOLERANCE)
                .min_by(|&a, &b| {
                    self.stats.covariance[a][a].cmp(&self.stats.covariance[b][b])
                })
                .unwrap_or(hi);
            let mut w = vec![Decimal::ZERO; self.n()];
            w[corner] = Decimal::ONE;
            return FrontierOutcome::Optimal(w);
        }

        // min_ret <= μᵀw_mv < target < max_ret, so hi != lo.
        let alpha = (target - min_ret) / (max_ret - min_ret);
        let mut start = vec![Decimal::ZERO; self.n()];
        start[hi] = alpha;
        start[lo] = Decimal::ONE - alpha;

        let qp = QuadraticProgram::new(
            self.stats.covariance.clone(),
            vec![vec![Decimal::ONE; self.n()], mu.to_vec()],
            vec![Decimal::ONE, target],
        );
        match qp.solve(start) {
            Ok(sol) => normalized(sol.x),
            Err(e) => FrontierOutcome::Infeasible(e.to_string()),
        }
    }

    pub fn performance(&self, weights: &[Decimal]) -> PortfolioPerformance {
        let expected_return = dot(weights, self.mu());
        let volatility = sqrt_decimal(quad_form(weights, &self.stats.covariance));
        let sharpe_ratio = if volatility.is_zero() {
            Decimal::ZERO
        } else {
            (expected_return - self.risk_free_rate) / volatility
        };
        PortfolioPerformance {
            expected_return,
            volatility,
            sharpe_ratio,
        }
    }

    /// Sweep `num_points` target returns from the min-volatility return to max(μ).
    ///
    /// Targets the solver cannot reach are skipped. The max-Sharpe anchor is
    /// absent when no asset beats the risk-free rate.
    pub fn sweep(&self, num_points: usize) -> PortfolioResult<FrontierSweep> {
        let min_vol = self.min_volatility().into_weights()?;
        let min_volatility = self.point(&min_vol);
        let max_sharpe = self.max_sharpe().weights().map(|w| self.point(w));

        let start_ret = min_volatility.expected_return;
        let max_ret = argmax(self.mu()).map(|(_, r)| r).unwrap_or(start_ret);

        let mut points = Vec::with_capacity(num_points);
        if num_points <= 1 || max_ret <= start_ret {
            points.push(min_volatility.clone());
        } else {
            let step = (max_ret - start_ret) / Decimal::from((num_points - 1) as u64);
            for i in 0..num_points {
                let target = start_ret + step * Decimal::from(i as u64);
                match self.efficient_return(target) {
                    FrontierOutcome::Infeasible(reason) => {
                        debug!(target_return = %target, %reason, "frontier point skipped");
                    }
                    outcome => {
                        if let Some(w) = outcome.weights() {
                            points.push(self.point(w));
                        }
                    }
                }
            }
        }

        Ok(FrontierSweep {
            points,
            max_sharpe,
            min_volatility,
        })
    }

    fn point(&self, weights: &[Decimal]) -> FrontierPoint {
        let perf = self.performance(weights);
        FrontierPoint {
            expected_return: perf.expected_return,
            volatility: perf.volatility,
            sharpe_ratio: perf.sharpe_ratio,
            weights: self
                .stats
                .symbols
                .iter()
                .cloned()
                .zip(weights.iter().copied())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clamp solver noise below zero and rescale to sum to one.
fn normalized(x: Vec<Decimal>) -> FrontierOutcome {
    let clamped: Vec<Decimal> = x.into_iter().map(|v| v.max(Decimal::ZERO)).collect();
    let total: Decimal = clamped.iter().sum();
    if total <= Decimal::ZERO {
        return FrontierOutcome::Infeasible("Solver returned an all-zero allocation".into());
    }
    FrontierOutcome::Optimal(clamped.into_iter().map(|v| v / total).collect())
}

/// First index of the largest value.
fn argmax(values: &[Decimal]) -> Option<(usize, Decimal)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

/// First index of the smallest value.
fn argmin(values: &[Decimal]) -> Option<(usize, Decimal)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(mu: &[Decimal], sigma: Vec<Vec<Decimal>>) -> AnnualizedStatistics {
        AnnualizedStatistics {
            symbols: (0..mu.len()).map(|i| format!("A{i}")).collect(),
            expected_returns: mu.to_vec(),
            covariance: sigma,
            observations: 500,
        }
    }

    fn three_asset() -> AnnualizedStatistics {
        stats(
            &[dec!(0.10), dec!(0.06), dec!(0.14)],
            vec![
                vec![dec!(0.04), dec!(0.006), dec!(0.012)],
                vec![dec!(0.006), dec!(0.01), dec!(0.002)],
                vec![dec!(0.012), dec!(0.002), dec!(0.09)],
            ],
        )
    }

    fn assert_valid_weights(w: &[Decimal]) {
        let total: Decimal = w.iter().sum();
        assert!((total - Decimal::ONE).abs() < dec!(0.000001), "sum {total}");
        assert!(w.iter().all(|x| *x >= Decimal::ZERO), "negative weight in {w:?}");
    }

    // ------------------------------------------------------------------
    // 1. Max Sharpe is a valid long-only allocation
    // ------------------------------------------------------------------
    #[test]
    fn test_max_sharpe_weights_valid() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let w = ef.max_sharpe().into_weights().unwrap();
        assert_valid_weights(&w);
    }

    // ------------------------------------------------------------------
    // 2. Max Sharpe beats min volatility and equal weight on Sharpe
    // ------------------------------------------------------------------
    #[test]
    fn test_max_sharpe_dominates() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let tangency = ef.performance(&ef.max_sharpe().into_weights().unwrap());
        let min_vol = ef.performance(&ef.min_volatility().into_weights().unwrap());
        let equal = ef.performance(&[dec!(1) / dec!(3); 3]);

        assert!(tangency.sharpe_ratio >= min_vol.sharpe_ratio - dec!(0.000001));
        assert!(tangency.sharpe_ratio >= equal.sharpe_ratio - dec!(0.000001));
        assert!(min_vol.volatility <= tangency.volatility + dec!(0.000001));
    }

    // ------------------------------------------------------------------
    // 3. Two uncorrelated assets: closed-form tangency weights
    // ------------------------------------------------------------------
    #[test]
    fn test_two_asset_closed_form() {
        // Diagonal Σ: w ∝ excess / variance -> (0.08/0.04, 0.03/0.01) = (2, 3)
        let s = stats(
            &[dec!(0.10), dec!(0.05)],
            vec![vec![dec!(0.04), dec!(0)], vec![dec!(0), dec!(0.01)]],
        );
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let w = ef.max_sharpe().into_weights().unwrap();
        assert!((w[0] - dec!(0.4)).abs() < dec!(0.000001));
        assert!((w[1] - dec!(0.6)).abs() < dec!(0.000001));
    }

    // ------------------------------------------------------------------
    // 4. Efficient return meets its target
    // ------------------------------------------------------------------
    #[test]
    fn test_efficient_return_hits_target() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let w = ef.efficient_return(dec!(0.12)).into_weights().unwrap();
        assert_valid_weights(&w);
        let perf = ef.performance(&w);
        assert!(perf.expected_return >= dec!(0.12) - dec!(0.000001));
    }

    // ------------------------------------------------------------------
    // 5. Unreachable target is infeasible, not an error
    // ------------------------------------------------------------------
    #[test]
    fn test_efficient_return_above_max_is_infeasible() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        assert!(matches!(
            ef.efficient_return(dec!(0.50)),
            FrontierOutcome::Infeasible(_)
        ));
    }

    // ------------------------------------------------------------------
    // 6. Target at max(μ) is the single top asset
    // ------------------------------------------------------------------
    #[test]
    fn test_efficient_return_at_max() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let w = ef.efficient_return(dec!(0.14)).into_weights().unwrap();
        assert_eq!(w, vec![dec!(0), dec!(0), dec!(1)]);
    }

    // ------------------------------------------------------------------
    // 7. Aggressive falls back to max Sharpe
    // ------------------------------------------------------------------
    #[test]
    fn test_aggressive_fallback() {
        let s = three_asset();
        let cfg = EngineConfig::default();
        let out = optimize_allocation(&s, RiskTolerance::Aggressive, Some(dec!(0.9)), &cfg).unwrap();
        assert_eq!(out.result.method, OptimizationMethod::MaxSharpeFallback);
        assert!(out.result.fallback_reason.is_some());
        assert!(!out.warnings.is_empty());

        let moderate = optimize_allocation(&s, RiskTolerance::Moderate, None, &cfg).unwrap();
        assert_eq!(out.result.raw_weights, moderate.result.raw_weights);
    }

    // ------------------------------------------------------------------
    // 8. Aggressive default target = 1.2 x mean(μ)
    // ------------------------------------------------------------------
    #[test]
    fn test_aggressive_default_target() {
        let s = three_asset();
        let out = optimize_allocation(&s, RiskTolerance::Aggressive, None, &EngineConfig::default())
            .unwrap();
        // mean = 0.10, target = 0.12
        assert_eq!(out.result.target_return, Some(dec!(0.12)));
        assert_eq!(out.result.method, OptimizationMethod::EfficientReturn);
        assert!(out.result.performance.expected_return >= dec!(0.12) - dec!(0.000001));
    }

    // ------------------------------------------------------------------
    // 9. No asset above the risk-free rate
    // ------------------------------------------------------------------
    #[test]
    fn test_max_sharpe_requires_excess_return() {
        let s = stats(
            &[dec!(0.01), dec!(0.015)],
            vec![vec![dec!(0.04), dec!(0)], vec![dec!(0), dec!(0.01)]],
        );
        let result = optimize_allocation(&s, RiskTolerance::Moderate, None, &EngineConfig::default());
        assert!(matches!(result, Err(PortfolioError::OptimizationInfeasible(_))));
    }

    // ------------------------------------------------------------------
    // 10. Singular covariance and too few assets
    // ------------------------------------------------------------------
    #[test]
    fn test_unusable_covariance_rejected() {
        let singular = stats(
            &[dec!(0.1), dec!(0.1)],
            vec![vec![dec!(0.04), dec!(0.04)], vec![dec!(0.04), dec!(0.04)]],
        );
        assert!(matches!(
            EfficientFrontier::new(&singular, dec!(0.02)),
            Err(PortfolioError::OptimizationInfeasible(_))
        ));

        let single = stats(&[dec!(0.1)], vec![vec![dec!(0.04)]]);
        assert!(matches!(
            EfficientFrontier::new(&single, dec!(0.02)),
            Err(PortfolioError::OptimizationInfeasible(_))
        ));
    }

    // ------------------------------------------------------------------
    // 11. Weight cleaning
    // ------------------------------------------------------------------
    #[test]
    fn test_clean_weights_cutoff_and_renormalize() {
        let symbols: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        let cleaned = clean_weights(&symbols, &[dec!(0.695), dec!(0.3), dec!(0.005)], dec!(0.01));
        assert_eq!(cleaned["C"], Decimal::ZERO);
        let total: Decimal = cleaned.values().sum();
        assert!((total - Decimal::ONE).abs() < dec!(0.000001));
        assert!(cleaned.values().all(|w| w.is_zero() || *w >= dec!(0.01)));
        assert!(cleaned["A"] > dec!(0.695));
    }

    // ------------------------------------------------------------------
    // 12. Frontier sweep is monotone in return
    // ------------------------------------------------------------------
    #[test]
    fn test_frontier_sweep() {
        let s = three_asset();
        let ef = EfficientFrontier::new(&s, dec!(0.02)).unwrap();
        let sweep = ef.sweep(6).unwrap();
        assert!(!sweep.points.is_empty());
        assert!(sweep.max_sharpe.is_some());
        for pair in sweep.points.windows(2) {
            assert!(pair[1].expected_return >= pair[0].expected_return - dec!(0.000001));
            assert!(pair[1].volatility >= pair[0].volatility - dec!(0.000001));
        }
    }

    // ------------------------------------------------------------------
    // 13. Determinism
    // ------------------------------------------------------------------
    #[test]
    fn test_repeat_runs_identical() {
        let s = three_asset();
        let cfg = EngineConfig::default();
        let a = optimize_allocation(&s, RiskTolerance::Moderate, None, &cfg).unwrap();
        let b = optimize_allocation(&s, RiskTolerance::Moderate, None, &cfg).unwrap();
        assert_eq!(a.result.raw_weights, b.result.raw_weights);
        assert_eq!(a.result.weights, b.result.weights);
    }
}
