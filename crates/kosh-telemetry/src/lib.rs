#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Logging primitives for the kosh CLI.
//!
//! Layout: init.rs (subscriber installation), context.rs (per-command spans).
//! Logs always go to stderr; stdout belongs to rendered command output.

pub mod context;
pub mod init;

pub use context::command_span;
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
