use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Value carried by a report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReportValue {
    Number(f64),
    Integer(i64),
    Text(String),
    /// Quantity that could not be computed, with the reason.
    Undefined(String),
}

impl ReportValue {
    pub fn from_option(value: Option<f64>, reason: &str) -> Self {
        match value {
            Some(v) => ReportValue::Number(v),
            None => ReportValue::Undefined(reason.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ReportValue::Number(v) => Some(*v),
            ReportValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportValue::Number(v) => write!(f, "{:.6}", v),
            ReportValue::Integer(v) => write!(f, "{}", v),
            ReportValue::Text(text) => f.write_str(text),
            ReportValue::Undefined(reason) => write!(f, "undefined ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub label: String,
    pub value: ReportValue,
}

impl ReportLine {
    pub fn number(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value: ReportValue::Number(value),
        }
    }

    pub fn integer(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value: ReportValue::Integer(value),
        }
    }

    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: ReportValue::Text(text.into()),
        }
    }

    pub fn optional(label: impl Into<String>, value: Option<f64>, reason: &str) -> Self {
        Self {
            label: label.into(),
            value: ReportValue::from_option(value, reason),
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.value)
    }
}

/// Ordered (x, y) points destined for a visualization sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

impl Series {
    pub fn new(name: impl Into<String>, points: Vec<[f64; 2]>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Series whose x coordinate is the sample index.
    pub fn indexed(name: impl Into<String>, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64, *v])
            .collect();
        Self::new(name, points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Non-fatal structural findings attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericalWarning {
    NonOrthogonal {
        left: usize,
        right: usize,
        dot: f64,
    },
    ScoreSumNonZero {
        component: usize,
        sum: f64,
    },
    ScoreVarianceMismatch {
        component: usize,
        variance: f64,
        eigenvalue: f64,
    },
    Degenerate {
        context: String,
        reason: String,
    },
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalWarning::NonOrthogonal { left, right, dot } => write!(
                f,
                "eigenvectors {} and {} are not orthogonal (dot product {:.6})",
                left + 1,
                right + 1,
                dot
            ),
            NumericalWarning::ScoreSumNonZero { component, sum } => write!(
                f,
                "component {} scores do not sum to zero (sum {:.6})",
                component + 1,
                sum
            ),
            NumericalWarning::ScoreVarianceMismatch {
                component,
                variance,
                eigenvalue,
            } => write!(
                f,
                "component {} variance {:.6} differs from eigenvalue {:.6}",
                component + 1,
                variance,
                eigenvalue
            ),
            NumericalWarning::Degenerate { context, reason } => {
                write!(f, "{}: {}", context, reason)
            }
        }
    }
}

/// Uniform output of every analysis: labeled lines, named series and warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub lines: Vec<ReportLine>,
    pub series: IndexMap<String, Series>,
    pub warnings: Vec<NumericalWarning>,
}

impl AnalysisResult {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn push_line(&mut self, line: ReportLine) {
        self.lines.push(line);
    }

    /// Insert a series, replacing any previous series with the same name.
    pub fn push_series(&mut self, series: Series) {
        self.series.insert(series.name.clone(), series);
    }

    pub fn push_warning(&mut self, warning: NumericalWarning) {
        log::warn!("{}: {}", self.title, warning);
        self.warnings.push(warning);
    }

    pub fn line(&self, label: &str) -> Option<&ReportLine> {
        self.lines.iter().find(|line| line.label == label)
    }

    pub fn number(&self, label: &str) -> Option<f64> {
        self.line(label).and_then(|line| line.value.as_number())
    }
}
