//! Typed failures for the camera and classification seams
//!
//! Binaries wrap these in `anyhow` with context; the controller turns them
//! into alerts and never lets them escape.

use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between a captured image and a prediction label
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The prediction service answered with a non-success status
    #[error("API error: {body}")]
    Api { status: StatusCode, body: String },

    /// The captured image could not be read from disk
    #[error("could not read captured image {uri}: {source}")]
    Payload {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The captured image could not be fetched (blob payloads only)
    #[error("could not fetch captured image {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    /// The image reference is neither a local file nor an http(s) URL
    #[error("unsupported image reference '{0}'")]
    UnsupportedRef(String),

    /// Connectivity or body-read failure talking to the prediction service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The endpoint is not an http(s) URL
    #[error("invalid endpoint '{endpoint}': {reason}")]
    Endpoint { endpoint: String, reason: String },

    /// The success body was not valid JSON
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not a recognizable image")]
    NotAnImage(String),

    #[error("camera device error: {0}")]
    Device(String),
}
