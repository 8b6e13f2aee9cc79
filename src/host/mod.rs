//! Host graph capability.
//!
//! The engine never owns graph nodes. Everything it knows about the host
//! compositing graph goes through [`GraphHost`]: node creation, position and
//! size queries, channel introspection and knob access.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a node owned by the host graph.
///
/// Handles are issued by the host and compared by value. Display names are a
/// separate, display-only attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw host identifier.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw host identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Kind of node the engine asks the host to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Image sequence reader.
    Read,
    /// Thumbnail companion of a read.
    PostageStamp,
    /// Pass-through connection point.
    Dot,
    /// Binary merge operation.
    Merge,
    /// Channel extraction.
    Shuffle,
    /// Visual grouping container.
    Backdrop,
}

impl NodeKind {
    /// Class name of the node kind in the host application.
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::PostageStamp => "PostageStamp",
            Self::Dot => "Dot",
            Self::Merge => "Merge2",
            Self::Shuffle => "Shuffle2",
            Self::Backdrop => "BackdropNode",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Value of a named node knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnobValue {
    /// Boolean toggle.
    Bool(bool),
    /// Integer value (positions, frames, packed colors).
    Int(i64),
    /// Floating point value (sizes, font sizes).
    Float(f64),
    /// Text value (file paths, channel names, operations).
    Text(String),
}

impl KnobValue {
    /// Get the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is numeric.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get the value as a float, if it is numeric.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for KnobValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for KnobValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KnobValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for KnobValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for KnobValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for KnobValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for KnobValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Request to create a node in the host graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    /// Kind of node.
    pub kind: NodeKind,
    /// Display name. The host may pick one when absent.
    pub name: Option<String>,
    /// Initial knob values.
    pub knobs: BTreeMap<String, KnobValue>,
    /// Input slots in order. `None` leaves the slot unconnected.
    pub inputs: Vec<Option<NodeId>>,
}

impl NodeSpec {
    /// Start a spec for the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            knobs: BTreeMap::new(),
            inputs: Vec::new(),
        }
    }

    /// Pass-through dot.
    pub fn dot() -> Self {
        Self::new(NodeKind::Dot)
    }

    /// Merge node with the given operation.
    pub fn merge(operation: &str) -> Self {
        Self::new(NodeKind::Merge).knob("operation", operation)
    }

    /// Set the display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an initial knob value.
    pub fn knob(mut self, name: &str, value: impl Into<KnobValue>) -> Self {
        self.knobs.insert(name.to_string(), value.into());
        self
    }

    /// Append one input.
    pub fn input(mut self, node: NodeId) -> Self {
        self.inputs.push(Some(node));
        self
    }

    /// Append several inputs in order.
    pub fn inputs(mut self, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        self.inputs.extend(nodes.into_iter().map(Some));
        self
    }

    /// Append an unconnected slot, so the next input lands one slot further.
    pub fn empty_input(mut self) -> Self {
        self.inputs.push(None);
        self
    }

    /// Connected inputs in slot order.
    pub fn connected_inputs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().flatten().copied()
    }
}

/// Abstract capability over the host compositing graph.
///
/// All calls are synchronous. Implementations must return stable results for
/// `all_nodes` and `nodes_of_kind` (creation order) so layouts are
/// reproducible.
pub trait GraphHost {
    /// Error type for host operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a node and return its handle.
    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, Self::Error>;

    /// Top-left position of a node.
    fn position(&self, node: NodeId) -> Result<(i32, i32), Self::Error>;

    /// Move a node so its top-left corner is at `(x, y)`.
    fn set_position(&mut self, node: NodeId, x: i32, y: i32) -> Result<(), Self::Error>;

    /// On-screen size of a node.
    fn size(&self, node: NodeId) -> Result<(i32, i32), Self::Error>;

    /// Channel names flowing out of a node (e.g. `RGBA_key.red`).
    fn channels(&self, node: NodeId) -> Result<Vec<String>, Self::Error>;

    /// Read a knob, `None` when the node has no such knob.
    fn knob(&self, node: NodeId, name: &str) -> Result<Option<KnobValue>, Self::Error>;

    /// Write a knob.
    fn set_knob(&mut self, node: NodeId, name: &str, value: KnobValue) -> Result<(), Self::Error>;

    /// Display name of a node.
    fn name(&self, node: NodeId) -> Result<String, Self::Error>;

    /// Connected inputs of a node, in slot order.
    fn inputs(&self, node: NodeId) -> Result<Vec<NodeId>, Self::Error>;

    /// Input slots of a node. `None` marks an unconnected slot.
    fn input_slots(&self, node: NodeId) -> Result<Vec<Option<NodeId>>, Self::Error>;

    /// All nodes of a kind, in creation order.
    fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeId>;

    /// All nodes, in creation order.
    fn all_nodes(&self) -> Vec<NodeId>;
}

pub use memory::{InMemoryGraph, InMemoryError, GraphSnapshot, NodeSnapshot};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_spec_builder() {
        let a = NodeId::new(1);
        let b = NodeId::new(2);
        let spec = NodeSpec::merge("plus")
            .named("diffuse_plus_spec")
            .knob("A", "rgb")
            .inputs([b, a]);

        assert_eq!(spec.kind, NodeKind::Merge);
        assert_eq!(spec.name.as_deref(), Some("diffuse_plus_spec"));
        assert_eq!(spec.knobs.get("operation").and_then(|v| v.as_text()), Some("plus"));
        assert_eq!(spec.inputs, vec![Some(b), Some(a)]);
    }

    #[test]
    fn test_empty_input_shifts_next_slot() {
        let node = NodeId::new(7);
        let spec = NodeSpec::merge("plus").empty_input().input(node);
        assert_eq!(spec.inputs, vec![None, Some(node)]);
        assert_eq!(spec.connected_inputs().collect::<Vec<_>>(), vec![node]);
    }

    #[test]
    fn test_knob_value_conversions() {
        assert_eq!(KnobValue::from(3_i32).as_float(), Some(3.0));
        assert_eq!(KnobValue::from(2.9).as_int(), Some(2));
        assert_eq!(KnobValue::from(true).as_bool(), Some(true));
        assert_eq!(KnobValue::from("x").as_int(), None);
    }

    #[test]
    fn test_knob_value_serializes_untagged() {
        let json = serde_json::to_string(&KnobValue::from("over")).unwrap();
        assert_eq!(json, "\"over\"");
        let json = serde_json::to_string(&KnobValue::from(1001_i64)).unwrap();
        assert_eq!(json, "1001");
    }
}
