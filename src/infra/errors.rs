// src/infra/errors.rs — Error types for mathsel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MathselError {
    // Completion service errors (transient from the driver's point of view)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Run-stopping errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // Infra
    #[error("Dataset error at line {line}: {message}")]
    Dataset { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MathselError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MathselError::Provider {
                retriable: true,
                ..
            } | MathselError::RateLimited { .. }
        )
    }

    /// Errors that indicate a misconfigured run rather than a transient
    /// condition. The task driver stops instead of retrying on these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MathselError::Config(_) | MathselError::NotImplemented(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_is_fatal() {
        assert!(MathselError::Config("missing prompt".into()).is_fatal());
        assert!(MathselError::NotImplemented("three-way".into()).is_fatal());
    }

    #[test]
    fn test_provider_error_is_not_fatal() {
        let err = MathselError::Provider {
            provider: "openai".into(),
            message: "HTTP 502".into(),
            retriable: true,
        };
        assert!(!err.is_fatal());
        assert!(err.is_retriable());
    }

    #[test]
    fn test_rate_limited_is_retriable() {
        let err = MathselError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 5000,
        };
        assert!(err.is_retriable());
        assert!(err.to_string().contains("5000ms"));
    }

    #[test]
    fn test_dataset_error_display() {
        let err = MathselError::Dataset {
            line: 3,
            message: "missing field `question`".into(),
        };
        assert_eq!(
            err.to_string(),
            "Dataset error at line 3: missing field `question`"
        );
    }
}
