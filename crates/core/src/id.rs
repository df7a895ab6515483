//! Unique identifiers for Weft entities.
//!
//! Identifier types are UUID wrappers generated with
//! [`domain_key::define_uuid!`], one domain marker per entity. Mixing two
//! identifier types is a compile error, which matters in an engine where
//! workflow ids, execution ids, and node ids all travel together through
//! the scheduling path.

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

define_uuid!(pub WorkflowIdDomain => WorkflowId);
define_uuid!(pub ExecutionIdDomain => ExecutionId);
define_uuid!(pub NodeIdDomain => NodeId);
define_uuid!(pub CredentialIdDomain => CredentialId);
define_uuid!(pub UserIdDomain => UserId);
