//! Error types for `HttpClient` calls.
//!
//! # Design
//! Two failures are synthesized by the client itself: `InvalidUrl` before any
//! I/O and `EmptyBody` when a response carries nothing usable. Transport and
//! JSON errors pass through untouched so callers see the original message.
//! An image that fails to decode is reported as `EmptyBody`; the decoder's
//! own error is only logged.

use thiserror::Error;

/// Outcome of a failed fetch. Every call reports at most one of these.
#[derive(Debug, Error)]
pub enum FetchError {
    /// `base_url + endpoint` is not an absolute URL that is also a strict
    /// URI. No request was sent.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The transport failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response had no body, or an image body could not be decoded.
    #[error("no data received")]
    EmptyBody,

    /// The body was not valid JSON for the requested type.
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

/// A transport-level failure (DNS, connect, TLS, timeout, I/O), carried as-is.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct TransportError(Box<dyn std::error::Error + Send + Sync>);

impl TransportError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}
