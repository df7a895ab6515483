//! Resource classes for concurrency admission.

use serde::{Deserialize, Serialize};

/// Concurrency admission class a node draws permits from.
///
/// A node declares zero or more classes; the executor acquires a permit
/// from every declared pool before dispatch. The derived `Ord` is the
/// canonical acquisition order — acquiring in a single global order keeps
/// multi-class nodes deadlock-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// General-purpose pool, sized by `max_concurrent_nodes`.
    Standard,
    /// LLM completion pool, sized by `ai_concurrent_limit`.
    Llm,
    /// Broader AI pool (vision, embeddings), sized by `ai_concurrent_limit`.
    Ai,
}

impl ResourceClass {
    /// All classes in canonical acquisition order.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Llm, Self::Ai];
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Llm => write!(f, "llm"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order() {
        let mut classes = vec![ResourceClass::Ai, ResourceClass::Standard, ResourceClass::Llm];
        classes.sort();
        assert_eq!(
            classes,
            vec![ResourceClass::Standard, ResourceClass::Llm, ResourceClass::Ai]
        );
        assert_eq!(classes, ResourceClass::ALL.to_vec());
    }

    #[test]
    fn display_names() {
        assert_eq!(ResourceClass::Standard.to_string(), "standard");
        assert_eq!(ResourceClass::Llm.to_string(), "llm");
        assert_eq!(ResourceClass::Ai.to_string(), "ai");
    }

    #[test]
    fn serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&ResourceClass::Llm).unwrap(),
            "\"llm\""
        );
        let back: ResourceClass = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(back, ResourceClass::Standard);
    }
}
