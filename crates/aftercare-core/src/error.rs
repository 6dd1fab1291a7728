use thiserror::Error;

/// Top-level error type for the Aftercare system.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates convert
/// their own failures into these variants so that the `?` operator works
/// seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AftercareError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Patient lookup error: {0}")]
    Lookup(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Router error: {0}")]
    Router(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AftercareError {
    fn from(err: toml::de::Error) -> Self {
        AftercareError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AftercareError {
    fn from(err: toml::ser::Error) -> Self {
        AftercareError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AftercareError {
    fn from(err: serde_json::Error) -> Self {
        AftercareError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Aftercare operations.
pub type Result<T> = std::result::Result<T, AftercareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AftercareError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AftercareError = io_err.into();
        assert!(matches!(err, AftercareError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(parsed.is_err());
        let err: AftercareError = parsed.unwrap_err().into();
        assert!(matches!(err, AftercareError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(parsed.is_err());
        let err: AftercareError = parsed.unwrap_err().into();
        assert!(matches!(err, AftercareError::Serialization(_)));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AftercareError, &str)> = vec![
            (
                AftercareError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                AftercareError::Session("lock poisoned".to_string()),
                "Session error: lock poisoned",
            ),
            (
                AftercareError::Lookup("db unreachable".to_string()),
                "Patient lookup error: db unreachable",
            ),
            (
                AftercareError::Retrieval("index offline".to_string()),
                "Retrieval error: index offline",
            ),
            (
                AftercareError::Generation("timeout".to_string()),
                "Generation error: timeout",
            ),
            (
                AftercareError::Router("illegal transition".to_string()),
                "Router error: illegal transition",
            ),
            (
                AftercareError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                AftercareError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
