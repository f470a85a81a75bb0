//! Error types for Relaycam

use thiserror::Error;

/// Result type alias using RelaycamError
pub type Result<T> = std::result::Result<T, RelaycamError>;

/// Main error type for Relaycam operations
#[derive(Debug, Error)]
pub enum RelaycamError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Frame format does not match the device descriptor
    #[error("Format mismatch: {0}")]
    Format(String),

    /// Device engine error
    #[error("Device error: {0}")]
    Device(String),

    /// Control channel error
    #[error("Control channel error: {0}")]
    Control(String),

    /// No running daemon to talk to
    #[error("No active device session")]
    NoActiveSession,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RelaycamError>,
    },
}

impl RelaycamError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a control channel error
    pub fn control(msg: impl Into<String>) -> Self {
        Self::Control(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<serde_json::Error> for RelaycamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Control(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_chains() {
        let err: Result<()> = Err(RelaycamError::device("pool exhausted"));
        let err = err.context("starting source").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("starting source"));
        assert!(msg.contains("pool exhausted"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RelaycamError = io.into();
        assert!(matches!(err, RelaycamError::Io(_)));
    }
}
