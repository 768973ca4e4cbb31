//! Discrete Fourier analysis of individual channels.
//!
//! Coefficients follow the trigonometric form
//! `A[j] = (1/N)·Σ x[i]·cos(2πij/N)` and `B[j] = (2/N)·Σ x[i]·sin(2πij/N)` for
//! `j` in `0..=N/2`, computed with an FFT.

use log::debug;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::matrix::SampleMatrix;
use crate::report::{AnalysisResult, ReportLine, Series};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierCoefficients {
    /// Length of the transformed signal.
    pub samples: usize,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
}

impl FourierCoefficients {
    pub fn forward(signal: &[f64]) -> Self {
        let n = signal.len();
        if n == 0 {
            return Self {
                samples: 0,
                a: Vec::new(),
                b: Vec::new(),
            };
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let mut buffer: Vec<Complex<f64>> =
            signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        fft.process(&mut buffer);

        let half = n / 2;
        let scale = n as f64;
        let a = buffer[..=half].iter().map(|c| c.re / scale).collect();
        let b = buffer[..=half]
            .iter()
            .enumerate()
            .map(|(j, c)| if j == 0 { 0.0 } else { -2.0 * c.im / scale })
            .collect();
        Self { samples: n, a, b }
    }

    /// Amplitude `sqrt(A² + B²)` per frequency.
    pub fn spectrum(&self) -> Vec<f64> {
        self.a
            .iter()
            .zip(&self.b)
            .map(|(a, b)| (a * a + b * b).sqrt())
            .collect()
    }

    /// `d[i] = Σ A[j]·cos(2πji/N) + Σ B[j]·sin(2πji/N)` over `j` in `0..=N/2`.
    pub fn inverse(&self) -> Vec<f64> {
        let n = self.samples;
        if n == 0 {
            return Vec::new();
        }

        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        for (j, (a, b)) in self.a.iter().zip(&self.b).enumerate() {
            // Re((A − iB)·e^{iθ}) = A·cos θ + B·sin θ
            buffer[j] = Complex::new(*a, -*b);
        }
        let mut planner = FftPlanner::<f64>::new();
        let ifft = planner.plan_fft_inverse(n);
        ifft.process(&mut buffer);
        buffer.into_iter().map(|c| c.re).collect()
    }

    /// Frequency index with the largest amplitude, ignoring the constant term.
    pub fn peak_frequency(&self) -> Option<usize> {
        self.spectrum()
            .into_iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, left), (_, right)| left.total_cmp(right))
            .map(|(idx, _)| idx)
    }
}

/// Transform, spectrum and reconstruction of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpectrum {
    pub channel: usize,
    pub coefficients: FourierCoefficients,
    pub spectrum: Vec<f64>,
    pub restored: Vec<f64>,
    pub max_error: f64,
}

impl ChannelSpectrum {
    pub fn compute(channel: usize, signal: &[f64]) -> Self {
        let coefficients = FourierCoefficients::forward(signal);
        let spectrum = coefficients.spectrum();
        let restored = coefficients.inverse();
        let max_error = signal
            .iter()
            .zip(&restored)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f64, f64::max);
        Self {
            channel,
            coefficients,
            spectrum,
            restored,
            max_error,
        }
    }
}

pub struct FourierAnalysis;

impl FourierAnalysis {
    /// Transform every channel in parallel, preserving channel order.
    pub fn transform(matrix: &SampleMatrix) -> Vec<ChannelSpectrum> {
        (0..matrix.channels())
            .into_par_iter()
            .map(|channel| ChannelSpectrum::compute(channel, &matrix.column(channel)))
            .collect()
    }

    pub fn analyze(matrix: &SampleMatrix) -> AnalysisResult {
        let spectra = Self::transform(matrix);
        let mut result = AnalysisResult::new("fourier analysis");
        let mut worst = 0.0f64;

        for entry in &spectra {
            let number = entry.channel + 1;
            if let Some(peak) = entry.coefficients.peak_frequency() {
                result.push_line(ReportLine::integer(
                    format!("channel {number} peak frequency"),
                    peak as i64,
                ));
            }
            result.push_line(ReportLine::number(
                format!("channel {number} reconstruction error"),
                entry.max_error,
            ));
            result.push_series(Series::indexed(format!("spectrum {number}"), &entry.spectrum));
            result.push_series(Series::indexed(format!("restored {number}"), &entry.restored));
            worst = worst.max(entry.max_error);
        }
        result.push_line(ReportLine::number("max reconstruction error", worst));
        debug!(
            "Fourier analysis of {} channels, worst reconstruction error {:e}",
            spectra.len(),
            worst
        );
        result
    }
}
