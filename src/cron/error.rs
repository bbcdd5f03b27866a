//! Error types for cron expression evaluation

use thiserror::Error;

/// Result type for cron operations
pub type CronResult<T> = Result<T, CronError>;

/// Cron parsing and evaluation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    /// Expression does not have exactly 5 fields
    #[error("cron expression must have 5 fields, found {found}")]
    WrongFieldCount { found: usize },

    /// A field failed to parse or is out of range
    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// No matching instant within the one-year search horizon
    #[error("no occurrence of '{expression}' within one year")]
    NoMatch { expression: String },
}

impl CronError {
    /// Create an invalid field error
    pub fn invalid_field(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a no-match error
    pub fn no_match(expression: impl Into<String>) -> Self {
        Self::NoMatch {
            expression: expression.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CronError::WrongFieldCount { found: 3 };
        assert!(err.to_string().contains("5 fields"));
        assert!(err.to_string().contains('3'));

        let err = CronError::invalid_field("minute", "61", "value 61 outside 0-59");
        assert!(err.to_string().contains("minute"));
        assert!(err.to_string().contains("61"));
    }
}
