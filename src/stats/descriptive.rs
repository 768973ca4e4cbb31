//! Per-channel summary statistics.

use std::cmp::Ordering;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, NumericalWarning, ReportLine, Series};

const ZERO_VARIANCE: &str = "zero variance";

/// Summary of one channel.
///
/// Moments that depend on a non-zero variance are `None` for constant
/// channels instead of NaN or infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: usize,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub harmonic_mean: Option<f64>,
    pub variance: f64,
    pub median: f64,
    pub mode: f64,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    pub gini_mean_difference: f64,
}

impl ChannelSummary {
    pub fn compute(channel: usize, values: &[f64]) -> Result<Self, AnalysisError> {
        if values.is_empty() {
            return Err(AnalysisError::input_format(
                0,
                format!("channel {} has no observations", channel + 1),
            ));
        }
        let count = values.len();
        let n = count as f64;
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let constant = sorted[0] == sorted[count - 1];

        let mean = if constant {
            sorted[0]
        } else {
            values.iter().sum::<f64>() / n
        };
        let variance = if constant {
            0.0
        } else {
            central_moment(values, mean, 2)
        };

        let (skewness, kurtosis) = if variance > 0.0 {
            (
                Some(central_moment(values, mean, 3) / variance.powf(1.5)),
                Some(central_moment(values, mean, 4) / (variance * variance) - 3.0),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            channel,
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            harmonic_mean: harmonic_mean(values),
            variance,
            median: sorted[count / 2],
            mode: mode_of_sorted(&sorted),
            skewness,
            kurtosis,
            gini_mean_difference: gini_mean_difference(&sorted),
        })
    }

    pub fn is_degenerate(&self) -> bool {
        self.skewness.is_none()
    }

    fn report_lines(&self) -> Vec<ReportLine> {
        let prefix = format!("channel {}", self.channel + 1);
        vec![
            ReportLine::integer(format!("{prefix} count"), self.count as i64),
            ReportLine::number(format!("{prefix} mean"), self.mean),
            ReportLine::optional(
                format!("{prefix} harmonic mean"),
                self.harmonic_mean,
                "reciprocal sum is zero",
            ),
            ReportLine::number(format!("{prefix} variance"), self.variance),
            ReportLine::number(format!("{prefix} median"), self.median),
            ReportLine::number(format!("{prefix} mode"), self.mode),
            ReportLine::optional(format!("{prefix} skewness"), self.skewness, ZERO_VARIANCE),
            ReportLine::optional(format!("{prefix} kurtosis"), self.kurtosis, ZERO_VARIANCE),
            ReportLine::number(
                format!("{prefix} gini mean difference"),
                self.gini_mean_difference,
            ),
            ReportLine::number(format!("{prefix} min"), self.min),
            ReportLine::number(format!("{prefix} max"), self.max),
        ]
    }
}

pub struct DescriptiveStatistics;

impl DescriptiveStatistics {
    /// Summarize every channel. Channels are computed in parallel and returned
    /// in channel order.
    pub fn summarize(matrix: &SampleMatrix) -> Result<Vec<ChannelSummary>, AnalysisError> {
        if matrix.rows() == 0 {
            return Err(AnalysisError::input_format(0, "matrix has no observations"));
        }
        let summaries: Vec<ChannelSummary> = (0..matrix.channels())
            .into_par_iter()
            .map(|channel| ChannelSummary::compute(channel, &matrix.column(channel)))
            .collect::<Result<_, _>>()?;
        debug!("Summarized {} channels", summaries.len());
        Ok(summaries)
    }

    pub fn analyze(matrix: &SampleMatrix) -> Result<AnalysisResult, AnalysisError> {
        let summaries = Self::summarize(matrix)?;
        let mut result = AnalysisResult::new("descriptive statistics");
        for summary in &summaries {
            result.lines.extend(summary.report_lines());
            if summary.is_degenerate() {
                result.push_warning(NumericalWarning::Degenerate {
                    context: format!("channel {}", summary.channel + 1),
                    reason: ZERO_VARIANCE.to_string(),
                });
            }
            result.push_series(Series::indexed(
                format!("channel {}", summary.channel + 1),
                &matrix.column(summary.channel),
            ));
        }
        Ok(result)
    }
}

fn central_moment(values: &[f64], mean: f64, order: i32) -> f64 {
    values.iter().map(|x| (x - mean).powi(order)).sum::<f64>() / values.len() as f64
}

/// Harmonic mean over the non-zero values. Zero when every value is zero;
/// `None` when the reciprocals cancel out exactly.
pub fn harmonic_mean(values: &[f64]) -> Option<f64> {
    let (count, reciprocal_sum) = values
        .iter()
        .filter(|v| **v != 0.0)
        .fold((0usize, 0.0f64), |(count, sum), v| (count + 1, sum + 1.0 / v));
    if count == 0 {
        return Some(0.0);
    }
    if reciprocal_sum == 0.0 {
        return None;
    }
    Some(count as f64 / reciprocal_sum)
}

/// Most frequent value of an ascending slice; the smallest value wins ties.
fn mode_of_sorted(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_count = 0usize;
    let mut idx = 0;
    while idx < sorted.len() {
        let value = sorted[idx];
        let run = sorted[idx..].iter().take_while(|v| **v == value).count();
        if run > best_count {
            best = value;
            best_count = run;
        }
        idx += run;
    }
    best
}

/// Mean absolute difference over all N² ordered pairs, divided by 2N.
///
/// Each gap between neighbouring sorted values is crossed by k·(N − k)
/// unordered pairs, so the pair sum is built from gaps alone and a constant
/// channel yields exactly zero.
fn gini_mean_difference(sorted: &[f64]) -> f64 {
    let count = sorted.len();
    let n = count as f64;
    let pair_sum: f64 = sorted
        .windows(2)
        .enumerate()
        .map(|(idx, pair)| {
            let k = (idx + 1) as f64;
            k * (n - k) * (pair[1] - pair[0])
        })
        .sum::<f64>()
        * 2.0;
    let mean_abs_diff = pair_sum / (n * n);
    mean_abs_diff / (2.0 * n)
}
