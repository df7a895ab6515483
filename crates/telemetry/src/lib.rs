#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Telemetry
//!
//! Fan-out distribution of execution lifecycle events.
//!
//! The [`EventBus`] is a thin wrapper over [`tokio::sync::broadcast`]:
//! events are fire-and-forget projections for API layers (WebSocket
//! pushes, activity feeds), **not** the source of truth — the persisted
//! execution record is. Dropping events under backpressure is acceptable.

pub mod event;

pub use event::{EventBus, EventSubscriber, ExecutionEvent};
