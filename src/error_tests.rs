//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Configuration("weights sum to 0.9".to_string());
        assert_eq!(err.to_string(), "Configuration error: weights sum to 0.9");

        let err = EngineError::InsufficientData("no components".to_string());
        assert_eq!(err.to_string(), "Insufficient data: no components");

        let err = EngineError::Range("odds 0.5".to_string());
        assert_eq!(err.to_string(), "Value out of range: odds 0.5");
    }

    #[test]
    fn test_entrant_scoped_errors() {
        assert!(EngineError::InsufficientData("x".into()).is_entrant_scoped());
        assert!(EngineError::Range("x".into()).is_entrant_scoped());
        assert!(!EngineError::Configuration("x".into()).is_entrant_scoped());
        assert!(!EngineError::Internal("x".into()).is_entrant_scoped());
    }

    #[test]
    fn test_from_serde_error() {
        let err: EngineError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, EngineError::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_from_config_error() {
        let err: EngineError = config::ConfigError::Message("bad".to_string()).into();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
