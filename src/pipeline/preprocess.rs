use std::fmt;
use std::sync::Arc;

use log::debug;
use once_cell::sync::OnceCell;

use crate::correlation::{CorrelationAnalysis, CorrelationMatrix, NormalizedMatrix};
use crate::error::AnalysisError;
use crate::factor::FactorAnalysis;
use crate::matrix::SampleMatrix;

/// Input matrix plus the intermediates several analyses share.
///
/// The standardized matrix, its correlation matrix and the factor analysis are
/// computed on first use and reused afterwards.
#[derive(Clone)]
pub struct PreparedMatrix {
    matrix: Arc<SampleMatrix>,
    tolerance: f64,
    normalized: Arc<OnceCell<Arc<NormalizedMatrix>>>,
    correlation: Arc<OnceCell<Arc<CorrelationMatrix>>>,
    factor: Arc<OnceCell<Arc<FactorAnalysis>>>,
}

impl PreparedMatrix {
    pub fn new(matrix: impl Into<Arc<SampleMatrix>>, tolerance: f64) -> Self {
        Self {
            matrix: matrix.into(),
            tolerance,
            normalized: Arc::new(OnceCell::new()),
            correlation: Arc::new(OnceCell::new()),
            factor: Arc::new(OnceCell::new()),
        }
    }

    pub fn matrix(&self) -> &SampleMatrix {
        &self.matrix
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn normalized(&self) -> Result<Arc<NormalizedMatrix>, AnalysisError> {
        self.normalized
            .get_or_try_init(|| {
                debug!("Normalizing {} channels", self.matrix.channels());
                CorrelationAnalysis::normalize(&self.matrix).map(Arc::new)
            })
            .map(Arc::clone)
    }

    pub fn correlation(&self) -> Result<Arc<CorrelationMatrix>, AnalysisError> {
        self.correlation
            .get_or_try_init(|| {
                let normalized = self.normalized()?;
                Ok(Arc::new(CorrelationAnalysis::correlation_matrix(&normalized)))
            })
            .map(Arc::clone)
    }

    pub fn factor(&self) -> Result<Arc<FactorAnalysis>, AnalysisError> {
        self.factor
            .get_or_try_init(|| {
                let normalized = self.normalized()?;
                let correlation = self.correlation()?;
                FactorAnalysis::compute(&normalized, &correlation, self.tolerance).map(Arc::new)
            })
            .map(Arc::clone)
    }
}

impl fmt::Debug for PreparedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedMatrix")
            .field("rows", &self.matrix.rows())
            .field("channels", &self.matrix.channels())
            .field("normalized", &self.normalized.get().is_some())
            .field("correlation", &self.correlation.get().is_some())
            .field("factor", &self.factor.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SampleMatrix {
        SampleMatrix::from_channels(&[
            vec![1.0, 2.0, 4.0, 3.0, 5.0],
            vec![2.0, 1.0, 0.0, 3.0, 1.5],
            vec![0.5, 0.7, 0.1, 0.9, 0.4],
        ])
        .expect("matrix")
    }

    #[test]
    fn intermediates_are_computed_once_and_shared() {
        let prepared = PreparedMatrix::new(sample(), 1e-6);
        assert!(format!("{:?}", prepared).contains("factor: false"));

        let first = prepared.correlation().expect("correlation");
        let second = prepared.correlation().expect("correlation");
        assert!(Arc::ptr_eq(&first, &second));

        let clone = prepared.clone();
        let factor = clone.factor().expect("factor");
        assert!(Arc::ptr_eq(&factor, &prepared.factor().expect("factor")));
        assert!(format!("{:?}", prepared).contains("factor: true"));
    }

    #[test]
    fn degenerate_input_fails_each_access() {
        let matrix =
            SampleMatrix::from_channels(&[vec![1.0, 2.0], vec![3.0, 3.0]]).expect("matrix");
        let prepared = PreparedMatrix::new(matrix, 1e-6);
        assert!(prepared.normalized().is_err());
        assert!(prepared.factor().unwrap_err().is_degenerate());
    }
}
