//! senseBox Pipeline Library
//!
//! Core ingestion and analytics for a crowd-sourced environmental sensor
//! network. Devices ("boxes") push measurements in heterogeneous wire formats;
//! this library turns them into canonical records and runs streaming analytics
//! over ordered measurement cursors.
//!
//! This library provides tools for:
//! - Decoding JSON, CSV, Luftdaten, hackAir and raw byte payloads into measurements
//! - Resolving measurement locations against a box's location timeline
//! - Outlier detection over sliding windows
//! - Activity classification of boxes
//! - Windowed descriptive statistics per sensor
//! - Inverse-distance-weighted interpolation over hex, square and triangle grids

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod decoder;
        pub mod location_resolver;
        pub mod stream_stages;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{LocationEvent, Measurement, MeasurementValue, Point, SenseBox, Sensor};
pub use config::Config;

/// Result type alias for the senseBox pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for decoding, validation and stream processing
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Payload could not be decoded in the given wire format
    #[error("Decode error ({format}): {message}")]
    Decode {
        format: &'static str,
        message: String,
    },

    /// Value, timestamp or location outside of its domain
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Measurement addressed a sensor the box does not own
    #[error("Sensor {sensor_id} does not belong to box {box_id}")]
    SensorMismatch { sensor_id: String, box_id: String },

    /// Content type has no registered decoder
    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// Statistic undefined for the given input (e.g. an empty window)
    #[error("Computation error: {message}")]
    Computation { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// JSON (de)serialization failed
    #[error("JSON error: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    /// CSV reader failed
    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline stopped because its consumer went away
    #[error("Processing cancelled: {reason}")]
    Cancelled { reason: String },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a decode error for the named wire format
    pub fn decode(format: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            format,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a sensor mismatch error
    pub fn sensor_mismatch(sensor_id: impl Into<String>, box_id: impl Into<String>) -> Self {
        Self::SensorMismatch {
            sensor_id: sensor_id.into(),
            box_id: box_id.into(),
        }
    }

    /// Create an unsupported content type error
    pub fn unsupported_content_type(content_type: impl Into<String>) -> Self {
        Self::UnsupportedContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a computation error
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error was caused by the client's input.
    ///
    /// Client errors are reported back as such and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::Validation { .. }
                | Self::SensorMismatch { .. }
                | Self::UnsupportedContentType { .. }
        )
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Json { source: error }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::Csv { source: error }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::Validation {
            message: format!("Date/time parsing failed: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(Error::decode("csv", "bad line").is_client_error());
        assert!(Error::validation("bad value").is_client_error());
        assert!(Error::sensor_mismatch("s1", "b1").is_client_error());
        assert!(!Error::computation("empty window").is_client_error());
        assert!(!Error::internal("boom").is_client_error());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let error = Error::decode("csv", "line 3 has 7 fields");
        assert_eq!(error.to_string(), "Decode error (csv): line 3 has 7 fields");

        let error = Error::sensor_mismatch("abc", "box1");
        assert!(error.to_string().contains("abc"));
        assert!(error.to_string().contains("box1"));
    }
}
