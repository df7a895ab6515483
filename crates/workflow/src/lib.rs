#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Weft Workflow
//!
//! Workflow definitions, the derived execution graph, and structural
//! validation for the Weft workflow engine.
//!
//! A [`WorkflowDefinition`] is the user-provided description of a workflow:
//! an ordered list of [`NodeConfig`]s and the [`Connection`]s between their
//! ports. The engine never schedules against the definition directly;
//! [`GraphBuilder`] derives an [`ExecutionGraph`] per run, resolving which
//! connections impose execution order and which are capability edges
//! (`tools` / `memory` target ports) that only carry data.

pub mod builder;
pub mod connection;
pub mod definition;
pub mod error;
pub mod graph;
pub mod overrides;

pub use builder::{GraphBuilder, build_execution_graph};
pub use connection::{BranchKey, CAPABILITY_PORTS, Connection, PortKey};
pub use definition::{NodeCategory, NodeConfig, WorkflowDefinition};
pub use error::{ValidationError, validate};
pub use graph::{ExecutionGraph, NodeDependencies};
pub use overrides::ExecutionOverrides;

/// Serde helpers for durations serialized as integer milliseconds.
pub mod serde_ms {
    /// `Option<Duration>` as an optional integer of milliseconds.
    pub mod opt {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use std::time::Duration;

        /// Serialize an `Option<Duration>` as milliseconds.
        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(d) => (d.as_millis() as u64).serialize(s),
                None => s.serialize_none(),
            }
        }

        /// Deserialize an optional integer of milliseconds.
        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            let opt: Option<u64> = Option::deserialize(d)?;
            Ok(opt.map(Duration::from_millis))
        }
    }
}
