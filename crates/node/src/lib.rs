#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Node
//!
//! The contract between the Weft engine and node implementations.
//!
//! This crate defines **what** nodes are and **how they communicate** with
//! the engine, but not how the engine schedules them. Core pieces:
//!
//! - [`Node`] — the executable unit: a descriptor plus an async `execute`
//! - [`NodeInput`] — everything the engine hands a node: port values,
//!   identifiers, variables, resolved config, credentials, a sibling-node
//!   runner, and a cancellation token
//! - [`NodeOutcome`] — what a node returns: plain outputs, a decision with
//!   branch routing, or a human-interaction suspension
//! - [`ResourceClass`] — concurrency admission classes (`standard`, `llm`,
//!   `ai`)
//! - [`TriggerNode`] — optional capability for long-lived event sources
//! - [`NodeRegistry`] / [`NodeFactory`] — process-local discovery by
//!   `node_type` key
//! - [`CredentialResolver`] — port trait the runtime implements to turn
//!   credential ids into plaintext maps

pub mod credentials;
pub mod error;
pub mod input;
pub mod node;
pub mod outcome;
pub mod port;
pub mod registry;
pub mod resource;
pub mod trigger;

pub use credentials::{CredentialData, CredentialResolver};
pub use error::NodeError;
pub use input::{NodeInput, NodeRunner};
pub use node::{Node, NodeDescriptor};
pub use outcome::{BranchRouting, InteractionRequest, NodeOutcome};
pub use port::{PortMap, PortSpec, PortType};
pub use registry::{NodeFactory, NodeRegistry};
pub use resource::ResourceClass;
pub use trigger::{TriggerCallback, TriggerNode};
