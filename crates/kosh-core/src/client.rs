//! Resource client seam consumed by the engines.
//!
//! # Design
//! - The engines only ever see raw JSON bytes over `GET`/`POST`/`DELETE`.
//! - Non-2xx responses are classified into [`ClientError::NotFound`],
//!   [`ClientError::Conflict`], or [`ClientError::Status`] so callers can
//!   branch on the status class without inspecting codes.
//! - Retry and timeout policy belong to implementations, never to callers.

use std::error::Error;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Result type for resource client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by a [`ResourceClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered 404.
    #[error("resource not found")]
    NotFound {
        /// Request path.
        path: String,
        /// Server-provided message when available.
        message: Option<String>,
    },
    /// The server answered 409.
    #[error("resource conflict")]
    Conflict {
        /// Request path.
        path: String,
        /// Server-provided message when available.
        message: Option<String>,
    },
    /// Any other non-2xx status.
    #[error("unexpected response status")]
    Status {
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Server-provided message when available.
        message: Option<String>,
    },
    /// The request never produced a response.
    #[error("request transport failure")]
    Transport {
        /// Request path.
        path: String,
        /// Underlying transport error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The response body did not match the expected shape.
    #[error("response body could not be decoded")]
    Decode {
        /// Request path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The request body could not be encoded.
    #[error("request body could not be encoded")]
    Encode {
        /// Request path.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// Classify a non-2xx status into the matching variant.
    #[must_use]
    pub fn from_status(path: impl Into<String>, status: u16, message: Option<String>) -> Self {
        let path = path.into();
        match status {
            404 => Self::NotFound { path, message },
            409 => Self::Conflict { path, message },
            _ => Self::Status {
                path,
                status,
                message,
            },
        }
    }

    /// HTTP status associated with the failure, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } | Self::Encode { .. } => None,
        }
    }

    /// Request path the failure relates to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotFound { path, .. }
            | Self::Conflict { path, .. }
            | Self::Status { path, .. }
            | Self::Transport { path, .. }
            | Self::Decode { path, .. }
            | Self::Encode { path, .. } => path,
        }
    }

    /// Server-provided message, when one was returned.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Status { message, .. } => message.as_deref(),
            Self::Transport { .. } | Self::Decode { .. } | Self::Encode { .. } => None,
        }
    }
}

/// Minimal HTTP capability required by the engines.
///
/// Paths are absolute (`/rack/{id}`) with path segments already
/// percent-encoded. Implementations return the raw response body for 2xx
/// responses and a classified [`ClientError`] otherwise.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Issue a `GET` and return the response body.
    async fn get(&self, path: &str) -> ClientResult<Vec<u8>>;

    /// Issue a `POST` with a JSON body and return the response body.
    async fn post(&self, path: &str, body: &Value) -> ClientResult<Vec<u8>>;

    /// Issue a `DELETE`.
    async fn delete(&self, path: &str) -> ClientResult<()>;
}
