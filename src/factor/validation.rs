use nalgebra::DMatrix;
use ndarray::Array1;

use crate::report::NumericalWarning;

/// Checks that principal component scores are centred and that each
/// component's variance reproduces its eigenvalue.
pub struct ScoreValidator {
    tolerance: f64,
}

impl ScoreValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn validate(&self, scores: &DMatrix<f64>, eigenvalues: &Array1<f64>) -> Vec<NumericalWarning> {
        let n = scores.nrows();
        if n == 0 {
            return Vec::new();
        }
        let mut warnings = Vec::new();
        for (component, column) in scores.column_iter().enumerate() {
            let sum = column.sum();
            if sum.abs() > self.tolerance {
                warnings.push(NumericalWarning::ScoreSumNonZero { component, sum });
            }
            let variance = column.iter().map(|s| s * s).sum::<f64>() / n as f64;
            let eigenvalue = eigenvalues[component];
            if (variance - eigenvalue).abs() > self.tolerance {
                warnings.push(NumericalWarning::ScoreVarianceMismatch {
                    component,
                    variance,
                    eigenvalue,
                });
            }
        }
        warnings
    }
}
