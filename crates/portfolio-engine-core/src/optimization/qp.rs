//! Primal active-set solver for the convex quadratic programs behind the
//! efficient frontier:
//!
//! ```text
//! minimize    ½ xᵀ Q x
//! subject to  A x = b
//!             x ≥ 0
//! ```
//!
//! `Q` must be positive definite on the feasible set. Each iteration solves
//! the equality-constrained subproblem on the free variables through its KKT
//! system, then either steps toward that solution (fixing the first variable
//! that hits zero) or releases the fixed variable with the most negative
//! bound multiplier.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::PortfolioError;
use crate::linalg::{dot, mat_vec, quad_form, solve_linear_system};
use crate::PortfolioResult;

/// Primal values below this are treated as zero.
const PRIMAL_TOLERANCE: Decimal = dec!(0.000000000000000001);
/// Bound multipliers above `-DUAL_TOLERANCE` are treated as non-negative.
const DUAL_TOLERANCE: Decimal = dec!(0.000000000001);
/// Allowed residual of `A x - b` at the starting point.
const FEASIBILITY_TOLERANCE: Decimal = dec!(0.00000001);

#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    pub q: Vec<Vec<Decimal>>,
    pub a: Vec<Vec<Decimal>>,
    pub b: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QpSolution {
    pub x: Vec<Decimal>,
    pub objective: Decimal,
    pub iterations: usize,
}

impl QuadraticProgram {
    pub fn new(q: Vec<Vec<Decimal>>, a: Vec<Vec<Decimal>>, b: Vec<Decimal>) -> Self {
        Self { q, a, b }
    }

    fn dimension(&self) -> usize {
        self.q.len()
    }

    /// Solve from a feasible starting point.
    pub fn solve(&self, start: Vec<Decimal>) -> PortfolioResult<QpSolution> {
        self.validate(&start)?;

        let n = self.dimension();
        let m = self.a.len();
        let max_iterations = 50 + 10 * (n + m);

        let mut x = start;
        let mut free: Vec<bool> = x.iter().map(|v| *v > PRIMAL_TOLERANCE).collect();

        for iteration in 0..max_iterations {
            let (z, nu) = self.solve_subproblem(&free)?;

            let blocked = (0..n).any(|i| free[i] && z[i] < -PRIMAL_TOLERANCE);
            if !blocked {
                x = z.into_iter().map(|v| v.max(Decimal::ZERO)).collect();

                // Bound multipliers for fixed variables: (Qx)_i + (Aᵀν)_i
                let qx = mat_vec(&self.q, &x);
                let entering = (0..n)
                    .filter(|&i| !free[i])
                    .map(|i| {
                        let a_col: Vec<Decimal> = self.a.iter().map(|row| row[i]).collect();
                        (i, qx[i] + dot(&a_col, &nu))
                    })
                    .filter(|(_, mu)| *mu < -DUAL_TOLERANCE)
                    .min_by(|a, b| a.1.cmp(&b.1));

                match entering {
                    None => {
                        let objective = quad_form(&x, &self.q) / dec!(2);
                        return Ok(QpSolution {
                            x,
                            objective,
                            iterations: iteration + 1,
                        });
                    }
                    Some((i, _)) => free[i] = true,
                }
                continue;
            }

            // Step toward z until the first free variable reaches zero.
            let mut alpha = Decimal::ONE;
            let mut blocking = None;
            for i in 0..n {
                if free[i] && z[i] < -PRIMAL_TOLERANCE {
                    let ratio = x[i] / (x[i] - z[i]);
                    if ratio < alpha {
                        alpha = ratio;
                        blocking = Some(i);
                    }
                }
            }
            for i in 0..n {
                if free[i] {
                    let step = alpha * (z[i] - x[i]);
                    x[i] += step;
                }
            }
            if let Some(i) = blocking {
                x[i] = Decimal::ZERO;
                free[i] = false;
            }
            for i in 0..n {
                if free[i] && x[i] <= PRIMAL_TOLERANCE {
                    x[i] = Decimal::ZERO;
                    free[i] = false;
                }
            }
        }

        Err(PortfolioError::OptimizationInfeasible(format!(
            "Active-set solver did not converge after {max_iterations} iterations"
        )))
    }

    /// Minimise over free variables with fixed ones held at zero.
    /// Returns the full-length primal vector and the equality multipliers.
    fn solve_subproblem(&self, free: &[bool]) -> PortfolioResult<(Vec<Decimal>, Vec<Decimal>)> {
        let idx: Vec<usize> = (0..free.len()).filter(|&i| free[i]).collect();
        let k = idx.len();
        let m = self.a.len();
        if k == 0 {
            return Err(PortfolioError::OptimizationInfeasible(
                "Working set left no free variables".into(),
            ));
        }

        let size = k + m;
        let mut kkt = vec![vec![Decimal::ZERO; size]; size];
        let mut rhs = vec![Decimal::ZERO; size];
        for (r, &i) in idx.iter().enumerate() {
            for (c, &j) in idx.iter().enumerate() {
                kkt[r][c] = self.q[i][j];
            }
            for (e, row) in self.a.iter().enumerate() {
                kkt[r][k + e] = row[i];
                kkt[k + e][r] = row[i];
            }
        }
        for (e, value) in self.b.iter().enumerate() {
            rhs[k + e] = *value;
        }

        let sol = solve_linear_system(&kkt, &rhs).map_err(|e| match e {
            PortfolioError::SingularMatrix(msg) => PortfolioError::OptimizationInfeasible(
                format!("Degenerate working set: {msg}"),
            ),
            other => other,
        })?;

        let mut z = vec![Decimal::ZERO; free.len()];
        for (r, &i) in idx.iter().enumerate() {
            z[i] = sol[r];
        }
        Ok((z, sol[k..].to_vec()))
    }

    fn validate(&self, start: &[Decimal]) -> PortfolioResult<()> {
        let n = self.dimension();
        if n == 0 {
            return Err(PortfolioError::InvalidInput {
                field: "q".into(),
                reason: "Empty problem".into(),
            });
        }
        if self.q.iter().any(|row| row.len() != n)
            || self.a.iter().any(|row| row.len() != n)
            || self.a.len() != self.b.len()
            || start.len() != n
        {
            return Err(PortfolioError::InvalidInput {
                field: "quadratic_program".into(),
                reason: "Inconsistent dimensions".into(),
            });
        }
        if start.iter().any(|v| *v < Decimal::ZERO) {
            return Err(PortfolioError::InvalidInput {
                field: "start".into(),
                reason: "Starting point violates x >= 0".into(),
            });
        }
        for (row, target) in self.a.iter().zip(self.b.iter()) {
            if (dot(row, start) - *target).abs() > FEASIBILITY_TOLERANCE {
                return Err(PortfolioError::InvalidInput {
                    field: "start".into(),
                    reason: "Starting point violates A x = b".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn test_unconstrained_interior_solution() {
        // min x1² + x2² s.t. x1 + x2 = 1 -> (0.5, 0.5)
        let qp = QuadraticProgram::new(
            vec![vec![dec!(2), dec!(0)], vec![dec!(0), dec!(2)]],
            vec![vec![dec!(1), dec!(1)]],
            vec![dec!(1)],
        );
        let sol = qp.solve(vec![dec!(1), dec!(0)]).unwrap();
        assert!(approx(sol.x[0], dec!(0.5)));
        assert!(approx(sol.x[1], dec!(0.5)));
        assert!(approx(sol.objective, dec!(0.5)));
    }

    #[test]
    fn test_bound_becomes_active() {
        // Unconstrained min-variance would short asset 2 (huge variance, high
        // correlation with 1). Long-only forces it to zero.
        let q = vec![
            vec![dec!(0.01), dec!(0.019)],
            vec![dec!(0.019), dec!(0.04)],
        ];
        let qp = QuadraticProgram::new(q, vec![vec![dec!(1), dec!(1)]], vec![dec!(1)]);
        let sol = qp.solve(vec![dec!(0.5), dec!(0.5)]).unwrap();
        assert!(approx(sol.x[0], Decimal::ONE));
        assert_eq!(sol.x[1], Decimal::ZERO);
    }

    #[test]
    fn test_two_equalities() {
        // min Σ x_i² s.t. Σx = 1, 0.1 x1 + 0.2 x2 + 0.3 x3 = 0.2
        let q = vec![
            vec![dec!(2), dec!(0), dec!(0)],
            vec![dec!(0), dec!(2), dec!(0)],
            vec![dec!(0), dec!(0), dec!(2)],
        ];
        let a = vec![
            vec![dec!(1), dec!(1), dec!(1)],
            vec![dec!(0.1), dec!(0.2), dec!(0.3)],
        ];
        let qp = QuadraticProgram::new(q, a, vec![dec!(1), dec!(0.2)]);
        let sol = qp.solve(vec![dec!(0.5), dec!(0), dec!(0.5)]).unwrap();
        for xi in &sol.x {
            assert!(approx(*xi, dec!(1) / dec!(3)));
        }
    }

    #[test]
    fn test_infeasible_start_rejected() {
        let qp = QuadraticProgram::new(
            vec![vec![dec!(1), dec!(0)], vec![dec!(0), dec!(1)]],
            vec![vec![dec!(1), dec!(1)]],
            vec![dec!(1)],
        );
        assert!(qp.solve(vec![dec!(0.2), dec!(0.2)]).is_err());
        assert!(qp.solve(vec![dec!(1.5), dec!(-0.5)]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let q = vec![
            vec![dec!(0.04), dec!(0.006), dec!(0.002)],
            vec![dec!(0.006), dec!(0.01), dec!(0.001)],
            vec![dec!(0.002), dec!(0.001), dec!(0.09)],
        ];
        let qp = QuadraticProgram::new(q, vec![vec![dec!(1); 3]], vec![dec!(1)]);
        let start = vec![dec!(1) / dec!(3); 3];
        let a = qp.solve(start.clone());
        let b = qp.solve(start);
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
