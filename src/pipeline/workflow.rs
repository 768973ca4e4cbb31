use std::fmt;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::clustering::ClusterStudy;
use crate::config::AnalysisConfig;
use crate::correlation::CorrelationAnalysis;
use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::pipeline::preprocess::PreparedMatrix;
use crate::report::AnalysisResult;
use crate::spectral::FourierAnalysis;
use crate::stats::{DescriptiveStatistics, OneWayAnova, TwoFactorAnova};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Statistics,
    OneWayVariance,
    TwoFactorVariance,
    Correlation,
    Factor,
    Clusters,
    Fourier,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 7] = [
        AnalysisKind::Statistics,
        AnalysisKind::OneWayVariance,
        AnalysisKind::TwoFactorVariance,
        AnalysisKind::Correlation,
        AnalysisKind::Factor,
        AnalysisKind::Clusters,
        AnalysisKind::Fourier,
    ];
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisKind::Statistics => "statistics",
            AnalysisKind::OneWayVariance => "one-way variance",
            AnalysisKind::TwoFactorVariance => "two-factor variance",
            AnalysisKind::Correlation => "correlation",
            AnalysisKind::Factor => "factor",
            AnalysisKind::Clusters => "clusters",
            AnalysisKind::Fourier => "fourier",
        };
        f.write_str(name)
    }
}

/// Analysis that could not run on the prepared input.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFailure {
    pub kind: AnalysisKind,
    pub error: AnalysisError,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub results: Vec<AnalysisResult>,
    pub failures: Vec<PipelineFailure>,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn result(&self, title: &str) -> Option<&AnalysisResult> {
        self.results.iter().find(|result| result.title == title)
    }
}

/// Runs the analyses over one prepared matrix. A failing analysis is recorded
/// and the remaining ones still run.
pub struct AnalysisPipeline {
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn prepare(&self, matrix: SampleMatrix) -> PreparedMatrix {
        PreparedMatrix::new(matrix, self.config.validation_tolerance)
    }

    pub fn run_one(
        &self,
        kind: AnalysisKind,
        prepared: &PreparedMatrix,
    ) -> Result<AnalysisResult, AnalysisError> {
        let matrix = prepared.matrix();
        match kind {
            AnalysisKind::Statistics => DescriptiveStatistics::analyze(matrix),
            AnalysisKind::OneWayVariance => OneWayAnova::analyze(matrix),
            AnalysisKind::TwoFactorVariance => {
                let design = self.config.design_for(matrix.rows(), matrix.channels());
                TwoFactorAnova::analyze(matrix, design)
            }
            AnalysisKind::Correlation => {
                let correlation = prepared.correlation()?;
                Ok(CorrelationAnalysis::study(
                    &correlation,
                    self.config.correlation_threshold,
                ))
            }
            AnalysisKind::Factor => Ok(prepared.factor()?.report(self.config.principal_series)),
            AnalysisKind::Clusters => {
                let scores = match prepared.factor() {
                    Ok(factor) => Some(factor.project(factor.components())),
                    Err(err) => {
                        warn!("Clustering raw data only: {}", err);
                        None
                    }
                };
                ClusterStudy::analyze(
                    matrix,
                    scores.as_ref(),
                    &self.config.clustering,
                    &self.config.cluster_counts,
                )
            }
            AnalysisKind::Fourier => Ok(FourierAnalysis::analyze(matrix)),
        }
    }

    pub fn run(&self, prepared: &PreparedMatrix) -> PipelineReport {
        self.run_selected(prepared, &AnalysisKind::ALL)
    }

    pub fn run_selected(&self, prepared: &PreparedMatrix, kinds: &[AnalysisKind]) -> PipelineReport {
        let start = Instant::now();
        let mut report = PipelineReport::default();
        for &kind in kinds {
            let step = Instant::now();
            match self.run_one(kind, prepared) {
                Ok(result) => {
                    info!("Finished {} analysis in {:.2?}", kind, step.elapsed());
                    report.results.push(result);
                }
                Err(error) => {
                    warn!("Skipping {} analysis: {}", kind, error);
                    report.failures.push(PipelineFailure { kind, error });
                }
            }
        }
        report.elapsed = start.elapsed();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwoFactorDesign;

    fn waves(channels: usize, points: usize) -> SampleMatrix {
        let data: Vec<Vec<f64>> = (0..channels)
            .map(|c| {
                (0..points)
                    .map(|i| {
                        let t = i as f64;
                        (t * (0.1 + 0.03 * c as f64)).sin() + 0.2 * ((t + c as f64) * 0.9).cos()
                    })
                    .collect()
            })
            .collect();
        SampleMatrix::from_channels(&data).expect("matrix")
    }

    fn small_config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.channels = 3;
        config.cluster_counts = vec![3, 2];
        config.clustering.seed = Some(11);
        config
    }

    #[test]
    fn every_analysis_runs_on_well_formed_input() {
        let pipeline = AnalysisPipeline::new(small_config());
        let prepared = pipeline.prepare(waves(3, 40));
        let report = pipeline.run(&prepared);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.results.len(), AnalysisKind::ALL.len());
        assert!(report.result("factor analysis").is_some());
        assert!(report.result("cluster analysis").is_some());
    }

    #[test]
    fn mismatched_design_only_skips_two_factor() {
        let mut config = small_config();
        config.two_factor = Some(TwoFactorDesign::new(3, 7, 7));
        let pipeline = AnalysisPipeline::new(config);
        let report = pipeline.run(&pipeline.prepare(waves(3, 40)));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, AnalysisKind::TwoFactorVariance);
        assert_eq!(report.results.len(), AnalysisKind::ALL.len() - 1);
    }

    #[test]
    fn constant_channel_degrades_dependent_analyses() {
        let mut channels: Vec<Vec<f64>> = (0..3).map(|c| waves(3, 20).column(c)).collect();
        channels[1] = vec![2.0; 20];
        let matrix = SampleMatrix::from_channels(&channels).expect("matrix");
        let pipeline = AnalysisPipeline::new(small_config());
        let report = pipeline.run(&pipeline.prepare(matrix));

        let failed: Vec<AnalysisKind> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(failed, vec![AnalysisKind::Correlation, AnalysisKind::Factor]);
        let stats = report.result("descriptive statistics").expect("statistics");
        assert_eq!(stats.warnings.len(), 1);
        let clusters = report.result("cluster analysis").expect("clusters");
        assert!(clusters.number("raw k=3 iterations").is_some());
        assert!(clusters.number("pca k=3 iterations").is_none());
    }
}
