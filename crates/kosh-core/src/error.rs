//! # Design
//!
//! - One error enum for every core operation, with constant messages.
//! - Fields carry the context (row index, lookup key, progress) so the CLI can
//!   build user-facing text without re-parsing strings.
//! - [`CoreError::category`] collapses variants into the taxonomy the CLI maps
//!   onto exit codes.

use thiserror::Error;
use uuid::Uuid;

use crate::client::ClientError;
use crate::identity::EntityKind;
use crate::layout::ReplaceProgress;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the resolver, the engines, and the codec.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A desired-state record or argument failed validation.
    #[error("invalid input")]
    InvalidInput {
        /// Index of the offending record in the input document, when any.
        row: Option<usize>,
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// The input document could not be parsed.
    #[error("malformed input document")]
    MalformedDocument {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A referenced entity does not exist.
    #[error("referenced entity not found")]
    NotFound {
        /// Entity kind that was looked up.
        kind: EntityKind,
        /// Key supplied by the caller.
        key: String,
    },
    /// A short identifier or name matched several entities.
    #[error("identifier is ambiguous")]
    Ambiguous {
        /// Entity kind that was looked up.
        kind: EntityKind,
        /// Key supplied by the caller.
        key: String,
        /// Number of candidates that matched.
        matches: usize,
    },
    /// A destructive replacement was attempted against existing state
    /// without confirmation.
    #[error("rack already has a layout")]
    Conflict {
        /// Rack whose layout would be replaced.
        rack_id: Uuid,
        /// Number of slots currently present.
        existing: usize,
    },
    /// A delete/create sequence stopped part way through.
    #[error("layout replacement interrupted")]
    PartialFailure {
        /// Rack left in a partial state.
        rack_id: Uuid,
        /// Mutations completed before the failure.
        progress: ReplaceProgress,
        /// Failure that stopped the sequence.
        #[source]
        source: ClientError,
    },
    /// A resource client call failed outside a mutation sequence.
    #[error("resource client failure")]
    Remote {
        /// Operation that issued the call.
        operation: &'static str,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },
}

/// Coarse classification of [`CoreError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed desired state; nothing was sent.
    InvalidInput,
    /// A reference did not resolve.
    NotFound,
    /// A reference resolved to several candidates.
    Ambiguous,
    /// Existing state blocks the change.
    Conflict,
    /// Mutations were partially applied.
    PartialFailure,
    /// Any other remote failure.
    Remote,
}

impl CoreError {
    pub(crate) fn invalid(row: Option<usize>, field: &'static str, reason: &'static str) -> Self {
        Self::InvalidInput { row, field, reason }
    }

    pub(crate) fn remote(operation: &'static str, source: ClientError) -> Self {
        Self::Remote { operation, source }
    }

    /// Map a lookup failure to [`CoreError::NotFound`] when the server
    /// answered 404, otherwise to [`CoreError::Remote`].
    pub(crate) fn lookup(
        kind: EntityKind,
        key: &str,
        operation: &'static str,
        source: ClientError,
    ) -> Self {
        match source {
            ClientError::NotFound { .. } => Self::NotFound {
                kind,
                key: key.to_string(),
            },
            other => Self::remote(operation, other),
        }
    }

    /// Taxonomy bucket for the error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput { .. } | Self::MalformedDocument { .. } => {
                ErrorCategory::InvalidInput
            }
            Self::NotFound { .. }
            | Self::Remote {
                source: ClientError::NotFound { .. },
                ..
            } => ErrorCategory::NotFound,
            Self::Ambiguous { .. } => ErrorCategory::Ambiguous,
            Self::Conflict { .. }
            | Self::Remote {
                source: ClientError::Conflict { .. },
                ..
            } => ErrorCategory::Conflict,
            Self::PartialFailure { .. } => ErrorCategory::PartialFailure,
            Self::Remote { .. } => ErrorCategory::Remote,
        }
    }
}
