//! Error types for the Compute Engine client.

use thiserror::Error;

/// Errors raised by [`super::ComputeApi`] implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputeError {
    /// Raised when the client cannot be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
    /// Raised when the request never produced an HTTP response.
    #[error("request to {url} failed: {message}")]
    Transport {
        /// URL that was requested.
        url: String,
        /// Transport error message.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("API error ({status}) for {url}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// URL that was requested.
        url: String,
        /// Response body, usually a JSON error document.
        body: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode {resource} response: {message}")]
    Decode {
        /// Resource being decoded (for example `images`).
        resource: String,
        /// Decoder error message.
        message: String,
    },
}
