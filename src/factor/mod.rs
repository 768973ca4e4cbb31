//! Principal component (factor) analysis over the channel correlation matrix.

pub mod eigen;
pub mod validation;

use log::debug;
use nalgebra::DMatrix;
use ndarray::Array1;

pub use eigen::EigenDecomposition;
pub use validation::ScoreValidator;

use crate::correlation::{CorrelationAnalysis, CorrelationMatrix, NormalizedMatrix};
use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, NumericalWarning, ReportLine, Series};

#[derive(Debug, Clone)]
pub struct FactorAnalysis {
    pub decomposition: EigenDecomposition,
    pub explained: Array1<f64>,
    pub cumulative: Array1<f64>,
    /// Z × V: one row per observation, one column per component.
    pub scores: DMatrix<f64>,
    pub warnings: Vec<NumericalWarning>,
}

impl FactorAnalysis {
    pub fn from_matrix(matrix: &SampleMatrix, tolerance: f64) -> Result<Self, AnalysisError> {
        let normalized = CorrelationAnalysis::normalize(matrix)?;
        let correlation = CorrelationAnalysis::correlation_matrix(&normalized);
        Self::compute(&normalized, &correlation, tolerance)
    }

    /// Decompose `correlation` and project `normalized` onto its eigenvectors.
    /// Orthogonality and score problems beyond `tolerance` become warnings.
    pub fn compute(
        normalized: &NormalizedMatrix,
        correlation: &CorrelationMatrix,
        tolerance: f64,
    ) -> Result<Self, AnalysisError> {
        let decomposition = EigenDecomposition::from_symmetric(correlation.as_dmatrix())?;
        let explained = decomposition.explained_ratios()?;
        let cumulative = eigen::cumulative(&explained);

        let mut warnings: Vec<NumericalWarning> = decomposition
            .orthogonality_violations(tolerance)
            .into_iter()
            .map(|(left, right, dot)| NumericalWarning::NonOrthogonal { left, right, dot })
            .collect();

        let scores = normalized.as_dmatrix() * &decomposition.eigenvectors;
        warnings.extend(ScoreValidator::new(tolerance).validate(&scores, &decomposition.eigenvalues));
        debug!(
            "Factor analysis: {} components over {} observations, {} warnings",
            decomposition.len(),
            scores.nrows(),
            warnings.len()
        );

        Ok(Self {
            decomposition,
            explained,
            cumulative,
            scores,
            warnings,
        })
    }

    pub fn components(&self) -> usize {
        self.decomposition.len()
    }

    /// Scores of the leading `components` components as a sample matrix.
    pub fn project(&self, components: usize) -> SampleMatrix {
        let count = components.min(self.scores.ncols());
        SampleMatrix::from_dmatrix(self.scores.columns(0, count).into_owned())
    }

    /// Report eigenvalues, explained variance and the first `principal_series`
    /// component score series.
    pub fn report(&self, principal_series: usize) -> AnalysisResult {
        let mut result = AnalysisResult::new("factor analysis");
        for idx in 0..self.components() {
            let number = idx + 1;
            result.push_line(ReportLine::number(
                format!("eigenvalue {number}"),
                self.decomposition.eigenvalues[idx],
            ));
            result.push_line(ReportLine::number(
                format!("explained {number} %"),
                self.explained[idx] * 100.0,
            ));
            result.push_line(ReportLine::number(
                format!("cumulative {number} %"),
                self.cumulative[idx] * 100.0,
            ));
        }
        result.push_series(Series::new(
            "explained variance",
            self.explained
                .iter()
                .enumerate()
                .map(|(idx, ratio)| [(idx + 1) as f64, ratio * 100.0])
                .collect(),
        ));
        for idx in 0..principal_series.min(self.components()) {
            let column: Vec<f64> = self.scores.column(idx).iter().copied().collect();
            result.push_series(Series::indexed(format!("component {}", idx + 1), &column));
        }
        for warning in &self.warnings {
            result.push_warning(warning.clone());
        }
        result
    }

    pub fn analyze(
        matrix: &SampleMatrix,
        tolerance: f64,
        principal_series: usize,
    ) -> Result<AnalysisResult, AnalysisError> {
        Ok(Self::from_matrix(matrix, tolerance)?.report(principal_series))
    }
}
