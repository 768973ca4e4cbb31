use std::cmp::Ordering;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array1;

use crate::error::AnalysisError;

/// Largest |a_ij - a_ji| accepted as symmetric.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Eigenvalues and matching eigenvectors (one per column) of a symmetric matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition {
    pub eigenvalues: Array1<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl EigenDecomposition {
    /// Decompose `matrix`, keeping the order the solver returns.
    pub fn from_symmetric(matrix: &DMatrix<f64>) -> Result<Self, AnalysisError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(AnalysisError::configuration(format!(
                "eigen-decomposition expects a square matrix, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        let deviation = max_asymmetry(matrix);
        if deviation > SYMMETRY_TOLERANCE {
            return Err(AnalysisError::AsymmetricMatrix { deviation });
        }
        if matrix.nrows() == 0 {
            return Ok(Self {
                eigenvalues: Array1::zeros(0),
                eigenvectors: DMatrix::zeros(0, 0),
            });
        }

        let eigen = SymmetricEigen::new(matrix.clone());
        Ok(Self {
            eigenvalues: Array1::from(eigen.eigenvalues.iter().copied().collect::<Vec<_>>()),
            eigenvectors: eigen.eigenvectors,
        })
    }

    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }

    /// Copy with components reordered by decreasing eigenvalue.
    pub fn sorted_descending(&self) -> Self {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|a, b| {
            self.eigenvalues[*b]
                .partial_cmp(&self.eigenvalues[*a])
                .unwrap_or(Ordering::Equal)
        });
        let eigenvalues = order.iter().map(|idx| self.eigenvalues[*idx]).collect();
        let rows = self.eigenvectors.nrows();
        let eigenvectors =
            DMatrix::from_fn(rows, order.len(), |i, j| self.eigenvectors[(i, order[j])]);
        Self {
            eigenvalues,
            eigenvectors,
        }
    }

    /// λᵢ / Σλ in stored order.
    pub fn explained_ratios(&self) -> Result<Array1<f64>, AnalysisError> {
        let total = self.eigenvalues.sum();
        if !(total > 0.0) {
            return Err(AnalysisError::degenerate(
                "explained variance",
                format!("eigenvalue sum {total:e} is not positive"),
            ));
        }
        Ok(self.eigenvalues.mapv(|v| v / total))
    }

    /// Pairs of eigenvectors whose dot product exceeds `tolerance`.
    pub fn orthogonality_violations(&self, tolerance: f64) -> Vec<(usize, usize, f64)> {
        let count = self.eigenvectors.ncols();
        let mut violations = Vec::new();
        for left in 0..count {
            for right in (left + 1)..count {
                let dot = self
                    .eigenvectors
                    .column(left)
                    .dot(&self.eigenvectors.column(right));
                if dot.abs() > tolerance {
                    violations.push((left, right, dot));
                }
            }
        }
        violations
    }
}

fn max_asymmetry(matrix: &DMatrix<f64>) -> f64 {
    let size = matrix.nrows();
    let mut deviation = 0.0f64;
    for i in 0..size {
        for j in (i + 1)..size {
            deviation = deviation.max((matrix[(i, j)] - matrix[(j, i)]).abs());
        }
    }
    deviation
}

/// Running sum of `values`.
pub fn cumulative(values: &Array1<f64>) -> Array1<f64> {
    let mut total = 0.0;
    values
        .iter()
        .map(|v| {
            total += v;
            total
        })
        .collect()
}
