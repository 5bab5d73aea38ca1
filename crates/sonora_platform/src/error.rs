//! Platform Error Types

use thiserror::Error;

/// Errors from selecting a native host
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Host API not found: {0}")]
    HostNotFound(String),

    #[error("Host API {name} unavailable: {reason}")]
    HostUnavailable { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::HostNotFound("PipeWire".into());
        assert!(err.to_string().contains("PipeWire"));

        let err = PlatformError::HostUnavailable {
            name: "JACK".into(),
            reason: "server not running".into(),
        };
        assert_eq!(err.to_string(), "Host API JACK unavailable: server not running");
    }
}
