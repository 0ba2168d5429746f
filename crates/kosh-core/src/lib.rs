#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! Identity resolution and rack reconciliation for the kosh inventory CLI.
//!
//! Layout:
//! - `client.rs`: the [`ResourceClient`] seam and its error type.
//! - `api.rs`: typed [`Inventory`] endpoints over a resource client.
//! - `identity.rs`: [`Resolver`] and the per-invocation [`IdentityCache`].
//! - `layout.rs`: [`LayoutReconciler`], the delete-then-create replacement.
//! - `assignments.rs`: bulk device assignment replacement.
//! - `codec.rs`: export/import document shapes.
//! - `settings.rs`: device setting and tag key conventions.

pub mod api;
pub mod assignments;
pub mod client;
pub mod codec;
pub mod error;
pub mod identity;
pub mod layout;
pub mod settings;

pub use api::Inventory;
pub use assignments::{replace_assignments, validate_assignments};
pub use client::{ClientError, ClientResult, ResourceClient};
pub use codec::{
    AssignmentRecord, DesiredLayoutEntry, ProductRef, decode_assignments, decode_layout,
    encode_layout,
};
pub use error::{CoreError, CoreResult, ErrorCategory};
pub use identity::{EntityKind, IdentityCache, KeySpace, Resolution, Resolver};
pub use layout::{
    LayoutPlan, LayoutReconciler, ReplacePolicy, ReplaceProgress, ResolvedSlot, export_layout,
    products_for, validate_entries,
};
