//! Error types for analysis operations.

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Error type for analysis operations.
///
/// The pipeline never catches and continues on a per-record basis: indicator
/// correctness depends on complete, correctly-ordered timelines, so a
/// malformed record fails the whole batch for that invocation. Messages carry
/// machine/date/field context so the caller can log meaningfully; the core
/// itself never logs errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// A required column is structurally absent from an input table.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A date, time or enum-like value could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// An internal invariant was violated during computation.
    #[error("data integrity error: {0}")]
    DataIntegrityError(String),
}

impl AnalysisError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AnalysisError::ValidationError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        AnalysisError::ParseError(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        AnalysisError::DataIntegrityError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = AnalysisError::validation("required column `maquina_id` is missing");
        assert_eq!(
            err.to_string(),
            "validation error: required column `maquina_id` is missing"
        );

        let err = AnalysisError::parse("hora_registro `25:99:00` (TMF001, 2024-05-01)");
        assert!(err.to_string().starts_with("parse error"));
    }
}
