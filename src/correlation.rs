//! Standardization, Pearson correlation and the derived partial / multiple
//! correlation coefficients.

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, NumericalWarning, ReportLine, ReportValue, Series};

/// Matrix whose columns have mean 0 and population standard deviation 1.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMatrix {
    data: DMatrix<f64>,
    means: Vec<f64>,
    std_devs: Vec<f64>,
}

impl NormalizedMatrix {
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }
}

/// Pair of channels whose correlation exceeds the significance threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificantPair {
    pub left: usize,
    pub right: usize,
    pub r: f64,
}

/// `1 - r^2` at or below this is treated as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-10;

/// Square symmetric matrix of Pearson coefficients between channels.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    data: DMatrix<f64>,
}

impl CorrelationMatrix {
    /// R = (1/n)·Zᵗ·Z for a standardized matrix Z. Off-diagonal coefficients
    /// are clamped to [-1, 1] so rounding on collinear channels cannot leave
    /// them outside the valid range.
    pub fn from_normalized(normalized: &NormalizedMatrix) -> Self {
        let z = normalized.as_dmatrix();
        let n = z.nrows().max(1) as f64;
        let product = z.tr_mul(z) / n;
        let size = product.nrows();
        let data = DMatrix::from_fn(size, size, |i, j| {
            let value = 0.5 * (product[(i, j)] + product[(j, i)]);
            if i == j { value } else { value.clamp(-1.0, 1.0) }
        });
        Self { data }
    }

    /// Wrap an already computed coefficient matrix. It must be square and
    /// symmetric; values are taken as given.
    pub fn from_coefficients(data: DMatrix<f64>) -> Result<Self, AnalysisError> {
        if data.nrows() != data.ncols() {
            return Err(AnalysisError::configuration(format!(
                "correlation matrix is {}x{}, expected square",
                data.nrows(),
                data.ncols()
            )));
        }
        let deviation = (&data - data.transpose()).amax();
        if deviation > 1e-12 {
            return Err(AnalysisError::AsymmetricMatrix { deviation });
        }
        Ok(Self { data })
    }

    pub fn size(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    pub fn as_dmatrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.data
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }

    /// Pairs `i < j` with `|r_ij| > threshold`, in lexicographic order.
    pub fn significant_pairs(&self, threshold: f64) -> Vec<SignificantPair> {
        let size = self.size();
        let mut pairs = Vec::new();
        for left in 0..size {
            for right in (left + 1)..size {
                let r = self.get(left, right);
                if r.abs() > threshold {
                    pairs.push(SignificantPair { left, right, r });
                }
            }
        }
        pairs
    }

    /// Correlation of `a` and `b` with the linear effect of `c` removed.
    pub fn partial(&self, a: usize, b: usize, c: usize) -> Result<f64, AnalysisError> {
        self.check_indices(&[a, b, c])?;
        let (r_ab, r_ac, r_bc) = (self.get(a, b), self.get(a, c), self.get(b, c));
        // Each factor must be positive on its own: two negative factors would
        // give a positive product for |r| > 1.
        let left = 1.0 - r_ac * r_ac;
        let right = 1.0 - r_bc * r_bc;
        if left <= COLLINEAR_TOLERANCE || right <= COLLINEAR_TOLERANCE {
            return Err(AnalysisError::degenerate(
                format!("partial correlation r{}{}.{}", a + 1, b + 1, c + 1),
                format!("1 - r_ac^2 = {left:e}, 1 - r_bc^2 = {right:e}, both must be positive"),
            ));
        }
        Ok((r_ab - r_ac * r_bc) / (left * right).sqrt())
    }

    /// Multiple correlation of `a` on the pair (`b`, `c`).
    pub fn multiple(&self, a: usize, b: usize, c: usize) -> Result<f64, AnalysisError> {
        self.check_indices(&[a, b, c])?;
        let (r_ab, r_ac, r_bc) = (self.get(a, b), self.get(a, c), self.get(b, c));
        let context = || format!("multiple correlation R{}.{}{}", a + 1, b + 1, c + 1);
        let denominator = 1.0 - r_bc * r_bc;
        if denominator <= COLLINEAR_TOLERANCE {
            return Err(AnalysisError::degenerate(
                context(),
                format!("1 - r_bc^2 = {denominator:e} is not positive"),
            ));
        }
        let ratio = (r_ab * r_ab + r_ac * r_ac - 2.0 * r_ab * r_ac * r_bc) / denominator;
        if ratio < 0.0 {
            return Err(AnalysisError::degenerate(
                context(),
                format!("ratio {ratio:e} is negative"),
            ));
        }
        Ok(ratio.sqrt())
    }

    /// Mean absolute correlation of each channel with every other channel.
    pub fn independence_scores(&self) -> Vec<f64> {
        let size = self.size();
        if size < 2 {
            return vec![0.0; size];
        }
        (0..size)
            .map(|i| {
                let total: f64 = (0..size)
                    .filter(|j| *j != i)
                    .map(|j| self.get(i, j).abs())
                    .sum();
                total / (size - 1) as f64
            })
            .collect()
    }

    fn check_indices(&self, indices: &[usize]) -> Result<(), AnalysisError> {
        match indices.iter().find(|idx| **idx >= self.size()) {
            Some(idx) => Err(AnalysisError::configuration(format!(
                "channel index {} outside correlation matrix of size {}",
                idx,
                self.size()
            ))),
            None => Ok(()),
        }
    }
}

pub struct CorrelationAnalysis;

impl CorrelationAnalysis {
    /// Standardize every channel. Fails on the first constant channel.
    pub fn normalize(matrix: &SampleMatrix) -> Result<NormalizedMatrix, AnalysisError> {
        let rows = matrix.rows();
        if rows == 0 {
            return Err(AnalysisError::input_format(0, "matrix has no observations"));
        }
        let source = matrix.as_dmatrix();
        let mut data = source.clone();
        let mut means = Vec::with_capacity(matrix.channels());
        let mut std_devs = Vec::with_capacity(matrix.channels());

        for (channel, mut column) in data.column_iter_mut().enumerate() {
            let first = column[0];
            let constant = column.iter().all(|x| *x == first);
            let mean = column.sum() / rows as f64;
            let variance = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / rows as f64;
            if constant || variance <= 0.0 {
                return Err(AnalysisError::degenerate(
                    format!("channel {}", channel + 1),
                    "zero variance, cannot normalize",
                ));
            }
            let std_dev = variance.sqrt();
            column.apply(|x| *x = (*x - mean) / std_dev);
            means.push(mean);
            std_devs.push(std_dev);
        }

        Ok(NormalizedMatrix {
            data,
            means,
            std_devs,
        })
    }

    pub fn correlation_matrix(normalized: &NormalizedMatrix) -> CorrelationMatrix {
        CorrelationMatrix::from_normalized(normalized)
    }

    pub fn analyze(matrix: &SampleMatrix, threshold: f64) -> Result<AnalysisResult, AnalysisError> {
        let normalized = Self::normalize(matrix)?;
        let correlation = Self::correlation_matrix(&normalized);
        Ok(Self::study(&correlation, threshold))
    }

    /// Report the matrix, its significant pairs, the partial and multiple
    /// coefficients for the leading pairs and per-channel independence.
    pub fn study(correlation: &CorrelationMatrix, threshold: f64) -> AnalysisResult {
        let mut result = AnalysisResult::new("correlation analysis");

        for (idx, row) in correlation.rows().iter().enumerate() {
            let cells: Vec<String> = row.iter().map(|r| format!("{r:.4}")).collect();
            result.push_line(ReportLine::text(format!("r row {}", idx + 1), cells.join(" ")));
        }

        let pairs = correlation.significant_pairs(threshold);
        result.push_line(ReportLine::integer("significant pairs", pairs.len() as i64));
        for pair in &pairs {
            result.push_line(ReportLine::number(
                format!("r{},{}", pair.left + 1, pair.right + 1),
                pair.r,
            ));
        }
        debug!(
            "{} of {} channel pairs exceed |r| > {}",
            pairs.len(),
            correlation.size() * correlation.size().saturating_sub(1) / 2,
            threshold
        );

        if pairs.len() >= 3 {
            let (a, b, c) = (pairs[0].left, pairs[1].left, pairs[2].left);
            let label = format!("{},{},{}", a + 1, b + 1, c + 1);
            if a == b || b == c || a == c {
                result.push_line(ReportLine {
                    label: format!("partial/multiple correlation ({label})"),
                    value: ReportValue::Undefined(
                        "leading significant pairs do not name three distinct channels"
                            .to_string(),
                    ),
                });
            } else {
                push_coefficient(
                    &mut result,
                    format!("partial correlation ({label})"),
                    correlation.partial(a, b, c),
                );
                push_coefficient(
                    &mut result,
                    format!("multiple correlation ({label})"),
                    correlation.multiple(a, b, c),
                );
            }
        } else {
            result.push_line(ReportLine {
                label: "partial/multiple correlation".to_string(),
                value: ReportValue::Undefined(format!(
                    "skipped, {} significant pairs and 3 are needed",
                    pairs.len()
                )),
            });
        }

        let scores = correlation.independence_scores();
        for (channel, score) in scores.iter().enumerate() {
            result.push_line(ReportLine::number(
                format!("channel {} independence", channel + 1),
                *score,
            ));
        }
        result.push_series(Series::new(
            "independence",
            scores
                .iter()
                .enumerate()
                .map(|(idx, score)| [(idx + 1) as f64, *score])
                .collect(),
        ));
        result
    }
}

fn push_coefficient(
    result: &mut AnalysisResult,
    label: String,
    value: Result<f64, AnalysisError>,
) {
    match value {
        Ok(value) => result.push_line(ReportLine::number(label, value)),
        Err(AnalysisError::DegenerateStatistics { context, reason }) => {
            result.push_line(ReportLine::optional(label, None, &reason));
            result.push_warning(NumericalWarning::Degenerate { context, reason });
        }
        Err(other) => {
            let reason = other.to_string();
            result.push_line(ReportLine::optional(label, None, &reason));
        }
    }
}
