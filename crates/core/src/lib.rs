#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Core
//!
//! Strongly-typed identifiers shared by every Weft crate.
//!
//! Each identifier is a [`domain-key`](https://crates.io/crates/domain-key)
//! `Uuid<D>` wrapper parameterized by its own domain marker, so a
//! [`WorkflowId`] can never be passed where an [`ExecutionId`] is expected.
//! All of them are `Copy` (16 bytes), serialize as UUID strings, and support
//! `v4()`, `nil()`, `parse()`, `Display`, `FromStr`, `Eq`, `Ord`, and `Hash`.

pub mod id;

pub use id::{CredentialId, ExecutionId, NodeId, UserId, WorkflowId};
