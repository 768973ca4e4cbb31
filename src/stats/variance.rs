//! One-way and two-factor analysis of variance over channel groups.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::TwoFactorDesign;
use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, NumericalWarning, ReportLine};

const ZERO_WITHIN: &str = "within-group variance is zero";
const ZERO_TOTAL: &str = "total variance is zero";

/// One-way ANOVA where each channel is a group of `points` observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneWayAnova {
    pub channel_means: Vec<f64>,
    /// Unweighted mean of the channel means.
    pub grand_mean: f64,
    pub sum_squares_within: f64,
    pub sum_squares_between: f64,
    pub variance_within: f64,
    pub variance_between: f64,
    pub f_statistic: Option<f64>,
}

impl OneWayAnova {
    pub fn compute(matrix: &SampleMatrix) -> Result<Self, AnalysisError> {
        let channels = matrix.channels();
        let points = matrix.rows();
        if channels < 2 {
            return Err(AnalysisError::configuration(format!(
                "one-way ANOVA needs at least 2 channels, got {}",
                channels
            )));
        }
        if points < 2 {
            return Err(AnalysisError::configuration(format!(
                "one-way ANOVA needs at least 2 points per channel, got {}",
                points
            )));
        }

        let data = matrix.as_dmatrix();
        let channel_means: Vec<f64> = data
            .column_iter()
            .map(|column| column.sum() / points as f64)
            .collect();
        let grand_mean = channel_means.iter().sum::<f64>() / channels as f64;

        let sum_squares_within: f64 = data
            .column_iter()
            .zip(&channel_means)
            .map(|(column, mean)| column.iter().map(|x| (x - mean).powi(2)).sum::<f64>())
            .sum();
        let sum_squares_between: f64 = channel_means
            .iter()
            .map(|mean| points as f64 * (mean - grand_mean).powi(2))
            .sum();

        let variance_within = sum_squares_within / (channels * (points - 1)) as f64;
        let variance_between = sum_squares_between / (channels - 1) as f64;
        let f_statistic = ratio(variance_between, variance_within);

        Ok(Self {
            channel_means,
            grand_mean,
            sum_squares_within,
            sum_squares_between,
            variance_within,
            variance_between,
            f_statistic,
        })
    }

    pub fn analyze(matrix: &SampleMatrix) -> Result<AnalysisResult, AnalysisError> {
        let anova = Self::compute(matrix)?;
        let mut result = AnalysisResult::new("one-way variance analysis");
        result.push_line(ReportLine::number("grand mean", anova.grand_mean));
        result.push_line(ReportLine::number("S_w", anova.sum_squares_within));
        result.push_line(ReportLine::number("S_b", anova.sum_squares_between));
        result.push_line(ReportLine::number("sigma2_w", anova.variance_within));
        result.push_line(ReportLine::number("sigma2_b", anova.variance_between));
        result.push_line(ReportLine::optional("F", anova.f_statistic, ZERO_WITHIN));
        if anova.f_statistic.is_none() {
            result.push_warning(NumericalWarning::Degenerate {
                context: "one-way F".to_string(),
                reason: ZERO_WITHIN.to_string(),
            });
        }
        Ok(result)
    }
}

/// F ratio with its numerator and denominator degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FTest {
    pub value: Option<f64>,
    pub df_numerator: usize,
    pub df_denominator: usize,
}

/// Two-factor ANOVA over a `k × m × n` grid (channel × row block × replication).
///
/// `q1` is the sum of squared observations and `q2..q4` are cell and level
/// totals squared and divided by their observation counts, so the variance
/// terms below are proper mean squares. `q3` uses a fresh total per factor-A
/// level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorAnova {
    pub design: TwoFactorDesign,
    pub grand_total: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
    pub q5: f64,
    pub total_variance: f64,
    pub variance_a: f64,
    pub variance_b: f64,
    pub variance_ab: f64,
    pub f_a: FTest,
    pub f_b: FTest,
    pub f_ab: FTest,
}

impl TwoFactorAnova {
    pub fn compute(
        matrix: &SampleMatrix,
        design: TwoFactorDesign,
    ) -> Result<Self, AnalysisError> {
        design.validate(matrix.rows(), matrix.channels())?;
        let TwoFactorDesign {
            a_levels: k,
            b_levels: m,
            replications: n,
        } = design;
        let data = matrix.as_dmatrix();

        let mut grand_total = 0.0;
        let mut sum_of_squares = 0.0;
        let mut cell_square_sum = 0.0;
        let mut a_square_sum = 0.0;
        let mut b_totals = vec![0.0f64; m];

        for a in 0..k {
            let column = data.column(a);
            let mut a_total = 0.0;
            for (b, b_total) in b_totals.iter_mut().enumerate() {
                let cell = column.rows(b * n, n);
                let cell_total = cell.sum();
                sum_of_squares += cell.iter().map(|x| x * x).sum::<f64>();
                cell_square_sum += cell_total * cell_total;
                a_total += cell_total;
                *b_total += cell_total;
            }
            a_square_sum += a_total * a_total;
            grand_total += a_total;
        }
        let b_square_sum: f64 = b_totals.iter().map(|t| t * t).sum();

        let total = (k * m * n) as f64;
        let q1 = sum_of_squares;
        let q2 = cell_square_sum / n as f64;
        let q3 = a_square_sum / (m * n) as f64;
        let q4 = b_square_sum / (k * n) as f64;
        let q5 = grand_total * grand_total / total;

        let total_variance = (q1 - q5) / (total - 1.0);
        let variance_a = (q3 - q5) / (k - 1) as f64;
        let variance_b = (q4 - q5) / (m - 1) as f64;
        let variance_ab = (q2 - q3 - q4 + q5) / ((k - 1) * (m - 1)) as f64;

        let df_denominator = k * (m - 1);
        let f_a = FTest {
            value: ratio(variance_a, total_variance),
            df_numerator: k - 1,
            df_denominator,
        };
        let f_b = FTest {
            value: ratio(variance_b, total_variance),
            df_numerator: m - 1,
            df_denominator,
        };
        let f_ab = FTest {
            value: ratio(variance_ab, total_variance),
            df_numerator: (k - 1) * (m - 1),
            df_denominator,
        };
        debug!(
            "Two-factor ANOVA over {}x{}x{} grid: S0^2={:.6}",
            k, m, n, total_variance
        );

        Ok(Self {
            design,
            grand_total,
            q1,
            q2,
            q3,
            q4,
            q5,
            total_variance,
            variance_a,
            variance_b,
            variance_ab,
            f_a,
            f_b,
            f_ab,
        })
    }

    pub fn analyze(
        matrix: &SampleMatrix,
        design: TwoFactorDesign,
    ) -> Result<AnalysisResult, AnalysisError> {
        let anova = Self::compute(matrix, design)?;
        let mut result = AnalysisResult::new("two-factor variance analysis");
        result.push_line(ReportLine::text(
            "design",
            format!(
                "A={} levels, B={} levels, n={} per cell",
                design.a_levels, design.b_levels, design.replications
            ),
        ));
        result.push_line(ReportLine::number("T", anova.grand_total));
        let terms = [
            ("Q1", anova.q1, "sum of squared observations"),
            ("Q2", anova.q2, "sum of squared cell totals / n"),
            (
                "Q3",
                anova.q3,
                "sum of squared factor-A level totals / (m*n), each level total accumulated fresh",
            ),
            ("Q4", anova.q4, "sum of squared factor-B level totals / (k*n)"),
            ("Q5", anova.q5, "T^2 / (k*m*n)"),
        ];
        for (label, value, note) in terms {
            result.push_line(ReportLine::number(label, value));
            result.push_line(ReportLine::text(format!("{label} note"), note));
        }
        result.push_line(ReportLine::number("SA^2", anova.variance_a));
        result.push_line(ReportLine::number("SB^2", anova.variance_b));
        result.push_line(ReportLine::number("SAB^2", anova.variance_ab));
        result.push_line(ReportLine::number("S0^2", anova.total_variance));
        for (label, test) in [("FA", anova.f_a), ("FB", anova.f_b), ("FAB", anova.f_ab)] {
            result.push_line(ReportLine::optional(label, test.value, ZERO_TOTAL));
            result.push_line(ReportLine::text(
                format!("{label} df"),
                format!("({}, {})", test.df_numerator, test.df_denominator),
            ));
        }
        if anova.f_a.value.is_none() {
            result.push_warning(NumericalWarning::Degenerate {
                context: "two-factor F".to_string(),
                reason: ZERO_TOTAL.to_string(),
            });
        }
        Ok(result)
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}
