//! k-means clustering over matrix rows.

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::error::AnalysisError;
use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, ReportLine, Series};

/// Outcome of one k-means run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    /// Point indices per cluster, ascending.
    pub clusters: Vec<Vec<usize>>,
    /// Cluster id per point.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

impl ClusterAssignment {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(Vec::len).collect()
    }
}

pub struct KMeans {
    config: ClusterConfig,
}

impl KMeans {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Run with a generator seeded from the configured seed, or the clock.
    pub fn fit(&self, matrix: &SampleMatrix) -> Result<ClusterAssignment, AnalysisError> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed.unwrap_or_else(random_seed));
        self.fit_with_rng(matrix, &mut rng)
    }

    pub fn fit_with_rng<R: Rng>(
        &self,
        matrix: &SampleMatrix,
        rng: &mut R,
    ) -> Result<ClusterAssignment, AnalysisError> {
        if matrix.rows() == 0 || matrix.channels() == 0 {
            return Err(AnalysisError::configuration(
                "cannot cluster an empty matrix",
            ));
        }
        self.config.validate(matrix.rows())?;
        let k = self.config.k;
        let points: Vec<Vec<f64>> = (0..matrix.rows()).map(|i| matrix.row(i)).collect();
        let dims = matrix.channels();

        let mut centroids: Vec<Vec<f64>> = (0..k)
            .map(|_| points[rng.gen_range(0..points.len())].clone())
            .collect();
        let mut labels: Vec<Option<usize>> = vec![None; points.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let nearest: Vec<usize> = points
                .par_iter()
                .map(|point| nearest_centroid(point, &centroids))
                .collect();
            let mut changed = false;
            for (label, best) in labels.iter_mut().zip(&nearest) {
                if *label != Some(*best) {
                    changed = true;
                    *label = Some(*best);
                }
            }

            let mut sums = vec![vec![0.0f64; dims]; k];
            let mut counts = vec![0usize; k];
            for (point, cluster) in points.iter().zip(&nearest) {
                counts[*cluster] += 1;
                for (sum, value) in sums[*cluster].iter_mut().zip(point) {
                    *sum += value;
                }
            }
            let updated: Vec<Vec<f64>> = sums
                .into_iter()
                .zip(&counts)
                .map(|(sum, count)| {
                    if *count == 0 {
                        debug!("Reseeding empty cluster");
                        points[rng.gen_range(0..points.len())].clone()
                    } else {
                        sum.into_iter().map(|s| s / *count as f64).collect()
                    }
                })
                .collect();

            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new).sqrt())
                .fold(0.0f64, f64::max);
            centroids = updated;

            if !changed || shift < self.config.tolerance {
                converged = true;
                break;
            }
        }

        let labels: Vec<usize> = labels.into_iter().map(|l| l.unwrap_or(0)).collect();
        let mut clusters = vec![Vec::new(); k];
        for (point, label) in labels.iter().enumerate() {
            clusters[*label].push(point);
        }
        debug!(
            "k-means with k={} finished after {} iterations (converged: {})",
            k, iterations, converged
        );

        Ok(ClusterAssignment {
            clusters,
            labels,
            centroids,
            iterations,
            converged,
        })
    }

    /// Cluster `matrix` and report sizes plus a scatter of the first two
    /// coordinates per cluster.
    pub fn analyze(
        &self,
        matrix: &SampleMatrix,
        label: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let assignment = self.fit(matrix)?;
        let mut result = AnalysisResult::new(format!("k-means {label} (k={})", assignment.k()));
        push_assignment(&mut result, &assignment, matrix, label);
        Ok(result)
    }
}

/// k-means over the raw matrix and, when given, the principal component
/// scores, once per requested cluster count.
pub struct ClusterStudy;

impl ClusterStudy {
    pub fn analyze(
        matrix: &SampleMatrix,
        scores: Option<&SampleMatrix>,
        base: &ClusterConfig,
        counts: &[usize],
    ) -> Result<AnalysisResult, AnalysisError> {
        let base_seed = base.seed.unwrap_or_else(random_seed);
        let mut sources = vec![("raw", matrix)];
        if let Some(scores) = scores {
            sources.push(("pca", scores));
        }

        let mut result = AnalysisResult::new("cluster analysis");
        let mut run = 0u64;
        for (source, data) in sources {
            for &k in counts {
                let config = ClusterConfig {
                    k,
                    seed: Some(base_seed.wrapping_add(run)),
                    ..base.clone()
                };
                run += 1;
                let assignment = KMeans::new(config).fit(data)?;
                let label = format!("{source} k={k}");
                info!(
                    "Clustered {} points into {} groups ({})",
                    data.rows(),
                    k,
                    label
                );
                push_assignment(&mut result, &assignment, data, &label);
            }
        }
        Ok(result)
    }
}

fn push_assignment(
    result: &mut AnalysisResult,
    assignment: &ClusterAssignment,
    matrix: &SampleMatrix,
    label: &str,
) {
    result.push_line(ReportLine::integer(
        format!("{label} iterations"),
        assignment.iterations as i64,
    ));
    result.push_line(ReportLine::text(
        format!("{label} converged"),
        if assignment.converged { "yes" } else { "no" },
    ));
    for (idx, members) in assignment.clusters.iter().enumerate() {
        result.push_line(ReportLine::integer(
            format!("{label} cluster {} size", idx + 1),
            members.len() as i64,
        ));
        let points = members
            .iter()
            .map(|row| {
                let y = if matrix.channels() > 1 {
                    matrix.get(*row, 1)
                } else {
                    0.0
                };
                [matrix.get(*row, 0), y]
            })
            .collect();
        result.push_series(Series::new(format!("{label} cluster {}", idx + 1), points));
    }
}

/// Index of the closest centroid; the lowest index wins ties.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

fn squared_distance(left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> SampleMatrix {
        let mut rows = Vec::new();
        for i in 0..20 {
            let jitter = (i as f64 * 0.7).sin() * 0.1;
            rows.push(vec![jitter, 1.0 + jitter]);
            rows.push(vec![10.0 + jitter, 12.0 - jitter]);
        }
        SampleMatrix::from_rows(&rows).expect("matrix")
    }

    #[test]
    fn single_cluster_centroid_is_the_column_mean() {
        let matrix = two_blobs();
        let assignment = KMeans::new(ClusterConfig::default().with_k(1).with_seed(3))
            .fit(&matrix)
            .expect("fit");
        assert_eq!(assignment.clusters.len(), 1);
        assert_eq!(assignment.clusters[0].len(), matrix.rows());
        for channel in 0..matrix.channels() {
            let column = matrix.column(channel);
            let mean = column.iter().sum::<f64>() / column.len() as f64;
            assert!((assignment.centroids[0][channel] - mean).abs() < 1e-9);
        }
        assert!(assignment.converged);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let matrix = two_blobs();
        let engine = KMeans::new(ClusterConfig::default().with_k(2).with_seed(42));
        let first = engine.fit(&matrix).expect("fit");
        let second = engine.fit(&matrix).expect("fit");
        assert_eq!(first, second);
        assert_eq!(first.labels.len(), matrix.rows());
        assert_eq!(first.sizes().iter().sum::<usize>(), matrix.rows());
    }

    #[test]
    fn separated_blobs_split_evenly() {
        let matrix = two_blobs();
        // Seeds are tried until the initial centroids land in different blobs.
        let assignment = (0..64u64)
            .map(|seed| {
                KMeans::new(ClusterConfig::default().with_k(2).with_seed(seed))
                    .fit(&matrix)
                    .expect("fit")
            })
            .find(|a| a.sizes() == vec![20, 20])
            .expect("a seed separating the blobs");
        assert!(assignment.converged);
        assert_ne!(assignment.labels[0], assignment.labels[1]);
    }

    #[test]
    fn invalid_cluster_counts_are_configuration_errors() {
        let matrix = two_blobs();
        for k in [0, 41] {
            let err = KMeans::new(ClusterConfig::default().with_k(k))
                .fit(&matrix)
                .unwrap_err();
            assert!(matches!(err, AnalysisError::Configuration { .. }));
        }
        let empty = SampleMatrix::from_rows(&[]).expect("empty");
        assert!(KMeans::new(ClusterConfig::default().with_k(1)).fit(&empty).is_err());
    }

    #[test]
    fn empty_clusters_are_reseeded_from_data_points() {
        use rand::rngs::mock::StepRng;

        let matrix = SampleMatrix::from_rows(&[
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![5.0, 5.0],
            vec![5.0, 5.0],
        ])
        .expect("matrix");
        // A constant generator starts every centroid on the first point, so
        // clusters 2 and 3 come up empty and must be reseeded.
        let mut rng = StepRng::new(0, 0);
        let assignment = KMeans::new(ClusterConfig::default().with_k(3))
            .fit_with_rng(&matrix, &mut rng)
            .expect("fit");

        assert_eq!(assignment.centroids.len(), 3);
        for centroid in &assignment.centroids {
            assert_eq!(centroid.len(), 2);
            assert!(centroid.iter().all(|x| x.is_finite()), "{centroid:?}");
        }
        assert_eq!(
            assignment.centroids,
            vec![vec![5.0, 5.0], vec![0.0, 0.0], vec![0.0, 0.0]]
        );
        assert_eq!(assignment.labels, vec![1, 1, 0, 0]);
        assert_eq!(assignment.sizes(), vec![2, 2, 0]);
        assert!(assignment.converged);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let centroids = vec![vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 5.0]];
        assert_eq!(nearest_centroid(&[0.0, 0.0], &centroids), 0);
        assert_eq!(nearest_centroid(&[-0.9, 0.0], &centroids), 1);
    }

    #[test]
    fn report_lists_sizes_and_scatter() {
        let matrix = two_blobs();
        let result = KMeans::new(ClusterConfig::default().with_k(2).with_seed(1))
            .analyze(&matrix, "raw")
            .expect("analysis");
        let total = result.number("raw cluster 1 size").expect("size")
            + result.number("raw cluster 2 size").expect("size");
        assert_eq!(total, 40.0);
        assert!(result.series.contains_key("raw cluster 1"));
    }

    #[test]
    fn study_runs_every_source_and_count() {
        let matrix = two_blobs();
        let scores = matrix.map(|x| x * 0.5);
        let base = ClusterConfig::default().with_seed(9);
        let result =
            ClusterStudy::analyze(&matrix, Some(&scores), &base, &[3, 2]).expect("study");
        for label in ["raw k=3", "raw k=2", "pca k=3", "pca k=2"] {
            assert!(result.number(&format!("{label} iterations")).is_some(), "{label}");
        }
        assert!(result.series.contains_key("pca k=3 cluster 3"));

        let again =
            ClusterStudy::analyze(&matrix, Some(&scores), &base, &[3, 2]).expect("study");
        assert_eq!(result, again);
    }
}
