//! Node Data Structures
//!
//! A node is a labeled entity with a free-form JSON object payload and a stable
//! identifier that is either an integer or a string.
//!
//! # Storage
//!
//! The stored `attribute` column holds the payload with the node's `id` merged
//! in as a field, and that is what gets embedded. [`Node::attributes`] never
//! contains the injected `id`, so attributes round-trip exactly. The `id`
//! attribute key is therefore reserved.
//!
//! # Examples
//!
//! ```rust
//! use personal_graph_core::models::{Node, NodeId};
//! use serde_json::json;
//!
//! let jack = Node::new("1", "Jack", json!({"age": 30}).as_object().cloned().unwrap());
//! assert_eq!(jack.id, NodeId::Text("1".to_string()));
//!
//! let numbered = Node::new(7_i64, "James", Default::default());
//! assert_eq!(numbered.id, NodeId::Int(7));
//! ```

use crate::operations::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Free-form JSON object payload of a node or edge
pub type Attributes = Map<String, Value>;

/// Attribute key under which a node's id is stored
pub(crate) const ID_KEY: &str = "id";

/// Stable node identifier
///
/// Stored untyped in SQLite, so `Int(1)` and `Text("1")` are different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Text(String),
}

impl NodeId {
    /// Fresh UUID v4 string identifier
    pub fn generate() -> Self {
        NodeId::Text(Uuid::new_v4().to_string())
    }

    pub fn to_json(&self) -> Value {
        match self {
            NodeId::Int(i) => Value::from(*i),
            NodeId::Text(s) => Value::from(s.as_str()),
        }
    }

    /// Decode an `id`, `source` or `target` column
    pub(crate) fn from_sql(value: libsql::Value, table: &'static str) -> Result<Self, GraphError> {
        match value {
            libsql::Value::Integer(i) => Ok(NodeId::Int(i)),
            libsql::Value::Text(s) => Ok(NodeId::Text(s)),
            other => Err(GraphError::corrupt_row(
                table,
                format!("node id has unsupported type: {:?}", other),
            )),
        }
    }
}

impl From<&NodeId> for libsql::Value {
    fn from(id: &NodeId) -> Self {
        match id {
            NodeId::Int(i) => libsql::Value::Integer(*i),
            NodeId::Text(s) => libsql::Value::Text(s.clone()),
        }
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Int(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Text(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        NodeId::Text(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Int(i) => write!(f, "{}", i),
            NodeId::Text(s) => f.write_str(s),
        }
    }
}

/// A labeled entity in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, label: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            attributes,
        }
    }

    /// Build a node from a JSON document that must be an object
    pub fn from_json_str(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        attributes: &str,
    ) -> Result<Self, GraphError> {
        match serde_json::from_str::<Value>(attributes)? {
            Value::Object(map) => Ok(Self::new(id, label, map)),
            other => Err(GraphError::InvalidAttributes(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// Payload as stored and embedded: attributes plus the `id` field
    pub fn stored_payload(&self) -> Attributes {
        stored_payload(&self.id, &self.attributes)
    }
}

/// Merge the node id into its attributes
pub(crate) fn stored_payload(id: &NodeId, attributes: &Attributes) -> Attributes {
    let mut payload = attributes.clone();
    payload.insert(ID_KEY.to_string(), id.to_json());
    payload
}

/// A node together with its embedding slot
#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub embed_id: i64,
    pub node: Node,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_id_serde_untagged() {
        let ids: Vec<NodeId> = serde_json::from_value(json!([1, "two"])).unwrap();
        assert_eq!(ids, vec![NodeId::Int(1), NodeId::Text("two".to_string())]);
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([1, "two"]));
    }

    #[test]
    fn test_node_id_sql_roundtrip() {
        for id in [NodeId::Int(42), NodeId::from("abc")] {
            let value = libsql::Value::from(&id);
            assert_eq!(NodeId::from_sql(value, "nodes").unwrap(), id);
        }
        assert!(NodeId::from_sql(libsql::Value::Null, "nodes").is_err());
    }

    #[test]
    fn test_stored_payload_injects_id() {
        let node = Node::new("1", "Jack", json!({"age": 30}).as_object().cloned().unwrap());
        let payload = node.stored_payload();
        assert_eq!(Value::Object(payload), json!({"age": 30, "id": "1"}));
        assert!(!node.attributes.contains_key(ID_KEY));
    }

    #[test]
    fn test_from_json_str_rejects_non_objects() {
        assert!(Node::from_json_str("1", "Jack", r#"{"a": 1}"#).is_ok());
        assert!(matches!(
            Node::from_json_str("1", "Jack", "[1, 2]"),
            Err(GraphError::InvalidAttributes(_))
        ));
        assert!(matches!(
            Node::from_json_str("1", "Jack", "not json"),
            Err(GraphError::Serialization(_))
        ));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }
}
