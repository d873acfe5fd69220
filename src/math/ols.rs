//! Least squares solvers.
//!
//! The default model is linear in its coefficients, so every fit reduces to
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2 + Σ_j λ_j β_j^2
//! ```
//!
//! Implementation choices:
//! - The ridge term is applied by augmenting the design with `sqrt(λ_j)·e_j`
//!   rows whose target is zero, then solving an ordinary least squares problem.
//! - SVD handles the tall, possibly rank-deficient designs that short histories
//!   produce. (Nalgebra's `QR::solve` is intended for square systems.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve a ridge-penalized least squares problem.
///
/// `penalties[j]` is the λ applied to coefficient `j`; zero leaves it free.
/// Returns `None` unless there is exactly one penalty per column.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    if penalties.len() != x.ncols() {
        return None;
    }

    let penalized: Vec<(usize, f64)> = penalties
        .iter()
        .enumerate()
        .filter(|(_, lambda)| **lambda > 0.0)
        .map(|(j, lambda)| (j, lambda.sqrt()))
        .collect();
    if penalized.is_empty() {
        return solve_least_squares(x, y);
    }

    let n = x.nrows();
    let p = x.ncols();
    let mut xa = DMatrix::<f64>::zeros(n + penalized.len(), p);
    xa.rows_mut(0, n).copy_from(x);
    for (row, (j, scale)) in penalized.iter().enumerate() {
        xa[(n + row, *j)] = *scale;
    }
    let mut ya = DVector::<f64>::zeros(n + penalized.len());
    ya.rows_mut(0, n).copy_from(y);

    solve_least_squares(&xa, &ya)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ridge_needs_one_penalty_per_column() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        assert!(solve_ridge(&x, &y, &[0.0]).is_none());
        assert!(solve_ridge(&x, &y, &[0.0, 1.0, 1.0]).is_none());
        assert!(solve_ridge(&x, &y, &[0.0, 0.0]).is_some());
    }

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_without_penalties_matches_ols() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_ridge(&x, &y, &[0.0, 0.0]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ridge_shrinks_penalized_coefficient() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let free = solve_ridge(&x, &y, &[0.0, 0.0]).unwrap();
        let shrunk = solve_ridge(&x, &y, &[0.0, 10.0]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
    }
}
