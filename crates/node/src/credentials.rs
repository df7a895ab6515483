//! Credential resolution port.

use std::collections::HashMap;

use async_trait::async_trait;
use weft_core::CredentialId;

use crate::error::NodeError;

/// Decrypted credential payload (field name → value).
pub type CredentialData = serde_json::Map<String, serde_json::Value>;

/// Port trait the runtime implements to turn credential ids into
/// plaintext data.
///
/// Storage and encryption are entirely outside the engine; the executor
/// only calls `resolve` with the ids a node declares and injects the
/// result into [`NodeInput`](crate::NodeInput).
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve the given credential ids to their decrypted payloads.
    ///
    /// Unknown ids are an error — a node configured with a credential the
    /// store cannot produce must not run with silently missing secrets.
    async fn resolve(
        &self,
        ids: &[CredentialId],
    ) -> Result<HashMap<CredentialId, CredentialData>, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver {
        known: HashMap<CredentialId, CredentialData>,
    }

    #[async_trait]
    impl CredentialResolver for StaticResolver {
        async fn resolve(
            &self,
            ids: &[CredentialId],
        ) -> Result<HashMap<CredentialId, CredentialData>, NodeError> {
            ids.iter()
                .map(|id| {
                    self.known
                        .get(id)
                        .map(|data| (*id, data.clone()))
                        .ok_or_else(|| NodeError::fatal(format!("unknown credential: {id}")))
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn resolves_known_ids() {
        let id = CredentialId::v4();
        let mut data = CredentialData::new();
        data.insert("api_key".into(), serde_json::json!("s3cret"));

        let resolver = StaticResolver {
            known: HashMap::from([(id, data)]),
        };

        let resolved = resolver.resolve(&[id]).await.unwrap();
        assert_eq!(resolved[&id]["api_key"], serde_json::json!("s3cret"));
    }

    #[tokio::test]
    async fn unknown_id_is_an_error() {
        let resolver = StaticResolver {
            known: HashMap::new(),
        };
        let err = resolver.resolve(&[CredentialId::v4()]).await.unwrap_err();
        assert!(err.to_string().contains("unknown credential"));
    }
}
