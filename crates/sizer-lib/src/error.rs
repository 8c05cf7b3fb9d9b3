//! Error type shared by the sizing library and the CLI

use thiserror::Error;

/// Exit status for invalid flag or configuration values
pub const EXIT_VALIDATION: i32 = 2;

/// Exit status when host memory or CPU count cannot be determined
pub const EXIT_PROBE_UNAVAILABLE: i32 = 3;

/// Exit status when no worker process matches the pool pattern
pub const EXIT_NO_MATCHING_PROCESSES: i32 = 4;

/// Exit status for every other failure
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, Error)]
pub enum SizerError {
    /// A caller-supplied value was rejected before any computation ran
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Host memory or CPU count could not be read
    #[error("resource probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// No running process matched the identification pattern
    #[error("no running processes match pattern '{pattern}'")]
    NoMatchingProcesses { pattern: String },

    #[error("load test failed: {0}")]
    LoadTest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SizerError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => EXIT_VALIDATION,
            Self::ProbeUnavailable(_) => EXIT_PROBE_UNAVAILABLE,
            Self::NoMatchingProcesses { .. } => EXIT_NO_MATCHING_PROCESSES,
            Self::LoadTest(_) | Self::Io(_) | Self::Serialization(_) => EXIT_FAILURE,
        }
    }
}

pub type Result<T> = std::result::Result<T, SizerError>;

/// Reject negative, NaN and infinite values for a named input
pub fn ensure_non_negative(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(SizerError::validation(field, format!("{} is not a finite number", value)));
    }
    if value < 0.0 {
        return Err(SizerError::validation(field, format!("{} must not be negative", value)));
    }
    Ok(value)
}

/// Parse a non-negative decimal number, as accepted on the command line
pub fn parse_non_negative(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SizerError::validation(field, format!("'{}' is not a number", raw)))?;
    ensure_non_negative(field, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes = [
            SizerError::validation("buffer", "bad").exit_code(),
            SizerError::ProbeUnavailable("no memory".into()).exit_code(),
            SizerError::NoMatchingProcesses { pattern: "php-fpm".into() }.exit_code(),
            SizerError::LoadTest("refused".into()).exit_code(),
        ];
        assert_eq!(codes, [2, 3, 4, 1]);
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(parse_non_negative("buffer", "10").unwrap(), 10.0);
        assert_eq!(parse_non_negative("buffer", " 0.5 ").unwrap(), 0.5);
        assert!(parse_non_negative("buffer", "-5").is_err());
        assert!(parse_non_negative("buffer", "ten").is_err());
        assert!(parse_non_negative("buffer", "NaN").is_err());
        assert!(parse_non_negative("buffer", "inf").is_err());
    }

    #[test]
    fn test_validation_message_names_field() {
        let err = parse_non_negative("buffer", "-5").unwrap_err();
        assert_eq!(err.to_string(), "invalid buffer: -5 must not be negative");
        assert_eq!(err.exit_code(), EXIT_VALIDATION);
    }
}
