use thiserror::Error;

/// Errors raised by the analysis engine.
///
/// Structural problems (`InputFormat`, `Configuration`) abort the call that hit
/// them. `DegenerateStatistics` is usually caught by per-channel callers and
/// turned into a flagged value so the remaining channels still get analyzed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Row {row}: {message}")]
    InputFormat { row: usize, message: String },

    #[error("Degenerate statistics for {context}: {reason}")]
    DegenerateStatistics { context: String, reason: String },

    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Matrix is not symmetric (max deviation {deviation:e})")]
    AsymmetricMatrix { deviation: f64 },
}

impl AnalysisError {
    pub fn input_format(row: usize, message: impl Into<String>) -> Self {
        Self::InputFormat {
            row,
            message: message.into(),
        }
    }

    pub fn degenerate(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DegenerateStatistics {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Self::DegenerateStatistics { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_row() {
        let err = AnalysisError::input_format(7, "expected 12 values, found 11");
        assert_eq!(err.to_string(), "Row 7: expected 12 values, found 11");
        assert!(!err.is_degenerate());
    }

    #[test]
    fn degenerate_errors_are_recognized() {
        let err = AnalysisError::degenerate("channel 3", "zero variance");
        assert!(err.is_degenerate());
        assert!(err.to_string().contains("channel 3"));
    }
}
