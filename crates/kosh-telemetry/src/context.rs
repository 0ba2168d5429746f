//! Span helpers for one CLI invocation.

use tracing::Span;

use crate::init::build_sha;

/// Span wrapping a single command, carrying its request id.
#[must_use]
pub fn command_span(command: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "command",
        command = %command,
        request_id = %request_id,
        build_sha = %build_sha()
    )
}
