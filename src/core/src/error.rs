use thiserror::Error;

/// Image warden error types
#[derive(Error, Debug)]
pub enum WardenError {
    /// A rule declares both a validation and a mutation payload
    #[error("Wrong rule type: rule '{rule}' should be either Validation or Mutation")]
    ConflictingRuleType { rule: String },

    /// A rule's image name or registry pattern is not a valid regular expression
    #[error("Invalid pattern in rule '{rule}': {pattern} - {message}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        message: String,
    },

    /// A SemVer rule's tag constraint could not be parsed
    #[error("Invalid constraint in rule '{rule}': {constraint} - {message}")]
    InvalidConstraint {
        rule: String,
        constraint: String,
        message: String,
    },

    /// Image reference could not be parsed
    #[error("Bad image reference: {0}")]
    InvalidReference(String),

    /// Report repository failure
    #[error("Store error: {0}")]
    Store(String),

    /// Registry digest lookup failed
    #[error("Inspect error: {image} - {message}")]
    Inspect { image: String, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        WardenError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for WardenError {
    fn from(err: serde_yaml::Error) -> Self {
        WardenError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for WardenError {
    fn from(err: rusqlite::Error) -> Self {
        WardenError::Store(err.to_string())
    }
}

/// Result type alias for image warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_rule_type_display() {
        let error = WardenError::ConflictingRuleType {
            rule: "No Latest".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Wrong rule type: rule 'No Latest' should be either Validation or Mutation"
        );
    }

    #[test]
    fn test_invalid_pattern_display() {
        let error = WardenError::InvalidPattern {
            rule: "nginx".to_string(),
            pattern: "docker(".to_string(),
            message: "unclosed group".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid pattern in rule 'nginx': docker( - unclosed group"
        );
    }

    #[test]
    fn test_invalid_constraint_display() {
        let error = WardenError::InvalidConstraint {
            rule: "alpine".to_string(),
            constraint: ">= banana".to_string(),
            message: "unexpected character".to_string(),
        };
        assert!(error.to_string().starts_with("Invalid constraint in rule 'alpine'"));
    }

    #[test]
    fn test_invalid_reference_display() {
        let error = WardenError::InvalidReference("missing tag".to_string());
        assert_eq!(error.to_string(), "Bad image reference: missing tag");
    }

    #[test]
    fn test_inspect_error_display() {
        let error = WardenError::Inspect {
            image: "nginx:latest".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Inspect error: nginx:latest - connection refused"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: WardenError = io_error.into();
        assert!(matches!(error, WardenError::Io(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: WardenError = result.unwrap_err().into();
        assert!(matches!(error, WardenError::Serialization(_)));
    }

    #[test]
    fn test_sqlite_error_conversion() {
        let error: WardenError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(error, WardenError::Store(_)));
    }
}
