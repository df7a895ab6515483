//! Port descriptors and port value containers.

use serde::{Deserialize, Serialize};

use weft_workflow::PortKey;

/// A mapping of port name → value, as produced and consumed by nodes.
pub type PortMap = serde_json::Map<String, serde_json::Value>;

/// Declared shape of a port value.
///
/// Connections do not enforce type equality at the executor level; port
/// types exist for editor hints and node-local coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// UTF-8 text.
    Text,
    /// Numeric value.
    Number,
    /// Boolean value.
    Boolean,
    /// Reference to a media object (image, audio, file).
    Media,
    /// JSON object.
    Map,
    /// JSON array.
    Sequence,
    /// Any JSON value.
    Universal,
}

/// Static description of an input or output port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, unique per direction within a node.
    pub name: PortKey,
    /// Declared value shape.
    pub port_type: PortType,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Short description shown in the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether a connection into this port is required.
    #[serde(default)]
    pub required: bool,
    /// Default value used when the port is unconnected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl PortSpec {
    /// Create a port spec with the given name and type.
    #[must_use]
    pub fn new(name: impl Into<PortKey>, port_type: PortType) -> Self {
        Self {
            name: name.into(),
            port_type,
            display_name: None,
            description: None,
            required: false,
            default_value: None,
        }
    }

    /// Create an untyped port.
    #[must_use]
    pub fn universal(name: impl Into<PortKey>) -> Self {
        Self::new(name, PortType::Universal)
    }

    /// Mark this port as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value for an unconnected port.
    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
