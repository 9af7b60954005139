//! Error types for the ingestion pipeline.
//!
//! All errors implement `std::error::Error` and carry enough context to decide
//! whether the failing cycle can simply be retried.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: connection failures, non-success HTTP status codes
//! - **File Errors**: problems reading or writing replay recordings
//! - **Parse Errors**: response bodies or messages that are not valid packets
//! - **Packet Errors**: packets missing the body field or subject record a
//!   queue projects
//! - **Configuration Errors**: invalid queue descriptors or endpoints
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use paddock::TelemetryError;
//!
//! let error = TelemetryError::connection_failed("telemetry server not reachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to reach telemetry source: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Telemetry endpoint {url} answered with status {status}")]
    Http { url: String, status: u16 },

    #[error("Recording file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Field '{field}' not found in packet body")]
    FieldNotFound { field: String },

    #[error("Subject index {index} out of range for '{field}' ({len} records)")]
    SubjectOutOfRange { field: String, index: usize, len: usize },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid pipeline configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Connection { .. } => true,
            TelemetryError::Http { status, .. } => *status >= 500 || *status == 429,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::File { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::FieldNotFound { .. } => false,
            TelemetryError::SubjectOutOfRange { .. } => false,
            TelemetryError::InvalidConfig { .. } => false,
        }
    }

    /// Returns whether this error only invalidates a single packet.
    ///
    /// Such errors are dropped at the assembler boundary and processing
    /// continues with the next frame.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            TelemetryError::Parse { .. }
                | TelemetryError::FieldNotFound { .. }
                | TelemetryError::SubjectOutOfRange { .. }
        )
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure the telemetry server is running",
                "Check the host and port of the live endpoint",
                "Verify the game is sending UDP telemetry to the server",
            ],
            TelemetryError::Http { .. } => vec![
                "Check the endpoint path (default /api/live)",
                "Inspect the telemetry server logs",
                "Retry on the next poll cycle",
            ],
            TelemetryError::File { .. } => vec![
                "Check the recording exists and is readable",
                "Check directory permissions for new recordings",
                "Ensure sufficient disk space",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check the server and client agree on the packet JSON shape",
                "Verify the recording was written one packet per line",
            ],
            TelemetryError::FieldNotFound { .. } => vec![
                "Check the queue's record field matches the body category name",
                "Verify the packet type is routed to the right queue",
            ],
            TelemetryError::SubjectOutOfRange { .. } => vec![
                "Check the subject selector of the queue",
                "Verify the header's player car index",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the request timeout",
                "Check network latency to the telemetry server",
            ],
            TelemetryError::InvalidConfig { .. } => vec![
                "Give every queue descriptor a unique record field",
                "Use a positive history cap",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl ToString) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.to_string() }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        TelemetryError::InvalidConfig { reason: reason.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::parse("packet JSON", err)
    }
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return TelemetryError::parse("live response body", err);
        }
        if let Some(status) = err.status() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            return TelemetryError::Http { url, status: status.as_u16() };
        }
        TelemetryError::connection_failed_with_source("HTTP request failed", Box::new(err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TelemetryError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TelemetryError::connection_failed_with_source("WebSocket failure", Box::new(err))
    }
}
