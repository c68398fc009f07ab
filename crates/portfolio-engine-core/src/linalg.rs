//! Dense Decimal linear algebra used by the statistics and optimization code.
//!
//! Matrices are row-major `Vec<Vec<Decimal>>`; the problem sizes here are
//! tens of assets at most, so nothing is blocked or cached.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::PortfolioError;
use crate::PortfolioResult;

/// Pivots below this magnitude are treated as zero.
const PIVOT_TOLERANCE: Decimal = dec!(0.000000000000000001);

/// Dot product.
pub fn dot(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

/// Matrix-vector multiplication.
pub fn mat_vec(mat: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    mat.iter().map(|row| dot(row, v)).collect()
}

/// Quadratic form `wᵀ Σ w`.
pub fn quad_form(w: &[Decimal], sigma: &[Vec<Decimal>]) -> Decimal {
    dot(w, &mat_vec(sigma, w))
}

/// Square root, zero for non-positive input.
pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
pub fn solve_linear_system(a: &[Vec<Decimal>], b: &[Decimal]) -> PortfolioResult<Vec<Decimal>> {
    let n = a.len();
    if b.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(PortfolioError::InvalidInput {
            field: "linear_system".into(),
            reason: format!("Expected {n}x{n} system with {n} right-hand values"),
        });
    }

    let mut aug: Vec<Vec<Decimal>> = a
        .iter()
        .zip(b.iter())
        .map(|(row, rhs)| {
            let mut r = row.clone();
            r.push(*rhs);
            r
        })
        .collect();

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            let val = aug[row][col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < PIVOT_TOLERANCE {
            return Err(PortfolioError::SingularMatrix(format!(
                "Pivot {max_val} in column {col} is effectively zero"
            )));
        }

        if max_row != col {
            aug.swap(col, max_row);
        }

        let pivot_row = aug[col].clone();
        let pivot = pivot_row[col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            if factor.is_zero() {
                continue;
            }
            for (cell, &pv) in aug[row].iter_mut().zip(pivot_row.iter()).skip(col) {
                *cell -= factor * pv;
            }
        }
    }

    // Back substitution
    let mut x = vec![Decimal::ZERO; n];
    for row in (0..n).rev() {
        let mut acc = aug[row][n];
        for k in (row + 1)..n {
            acc -= aug[row][k] * x[k];
        }
        x[row] = acc / aug[row][row];
    }
    Ok(x)
}

/// Lower-triangular Cholesky factor `L` with `L Lᵀ = A`.
///
/// Fails when `A` is not symmetric positive definite: a diagonal pivot at
/// or below `tolerance * max(diag(A))` is rejected.
#[allow(clippy::needless_range_loop)]
pub fn cholesky(a: &[Vec<Decimal>]) -> PortfolioResult<Vec<Vec<Decimal>>> {
    let n = a.len();
    let max_diag = (0..n)
        .map(|i| a[i].get(i).copied().unwrap_or(Decimal::ZERO))
        .fold(Decimal::ZERO, Decimal::max);
    let floor = max_diag * dec!(0.0000000001);

    let mut l = vec![vec![Decimal::ZERO; n]; n];
    for i in 0..n {
        if a[i].len() != n {
            return Err(PortfolioError::InvalidInput {
                field: "matrix".into(),
                reason: format!("Row {} has {} columns, expected {}", i, a[i].len(), n),
            });
        }
        for j in 0..=i {
            let mut sum = Decimal::ZERO;
            for k in 0..j {
                sum += l[i][k] * l[j][k];
            }
            if i == j {
                let diag = a[i][i] - sum;
                if diag <= floor || diag <= Decimal::ZERO {
                    return Err(PortfolioError::SingularMatrix(format!(
                        "Matrix is not positive definite (pivot {diag} at {i})"
                    )));
                }
                l[i][j] = sqrt_decimal(diag);
            } else {
                l[i][j] = (a[i][j] - sum) / l[j][j];
            }
        }
    }
    Ok(l)
}
